//! Side-information response splitting
//!
//! The hint-generation prompt asks the model for three numbered sections.
//! Models do not format the headings consistently, so each section is
//! recognised by a closed list of heading spellings. The lists live in
//! [`HEADINGS`]; adding a spelling is a one-line change there.
//!
//! Matching is plain substring search. A heading phrase echoed inside a
//! section body will cut that body short, and a spelling missing from the
//! table yields a missing field.

use serde::{Deserialize, Serialize};

use crate::table::{ResultTable, TableResult};

/// Column holding the raw hint-generation response
pub const FULL_RESPONSE: &str = "full_response";

/// One of the three sections of a hint-generation response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Description,
    DirectHint,
    IndirectHint,
}

impl Section {
    pub fn all() -> [Section; 3] {
        [Section::Description, Section::DirectHint, Section::IndirectHint]
    }

    /// Column name used in the result table
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Description => "description",
            Section::DirectHint => "direct_hint",
            Section::IndirectHint => "indirect_hint",
        }
    }

    /// The section whose heading terminates this one
    pub fn next(&self) -> Option<Section> {
        match self {
            Section::Description => Some(Section::DirectHint),
            Section::DirectHint => Some(Section::IndirectHint),
            Section::IndirectHint => None,
        }
    }

    /// Heading spellings for this section, in priority order
    pub fn headings(&self) -> impl Iterator<Item = &'static str> + '_ {
        HEADINGS
            .iter()
            .filter(move |(section, _)| section == self)
            .map(|(_, heading)| *heading)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "description" => Ok(Section::Description),
            "direct_hint" => Ok(Section::DirectHint),
            "indirect_hint" => Ok(Section::IndirectHint),
            other => Err(format!("Unknown section: {}", other)),
        }
    }
}

/// Recognised headings. Order within a section is the matching priority.
pub const HEADINGS: &[(Section, &str)] = &[
    (Section::Description, "1. **Description:**"),
    (Section::Description, "### 1. Description:"),
    (Section::Description, "1. **Description**:"),
    (Section::DirectHint, "2. **Direct hint:**"),
    (Section::DirectHint, "### 2. Direct Hint:"),
    (Section::DirectHint, "2. **Direct hint**:"),
    (Section::DirectHint, "### 2. Direct hint:"),
    (Section::DirectHint, "2. **Direct Hint:**"),
    (Section::DirectHint, "2. **Direct Hint**:"),
    (Section::IndirectHint, "3. **Indirect hint:**"),
    (Section::IndirectHint, "### 3. Indirect Hint:"),
    (Section::IndirectHint, "3. **Indirect hint**:"),
    (Section::IndirectHint, "### 3. Indirect hint:"),
    (Section::IndirectHint, "3. **Indirect Hint:**"),
    (Section::IndirectHint, "3. **Indirect Hint**:"),
];

/// Extract one section body from a hint-generation response.
///
/// The body starts right after the first heading spelling (in priority
/// order) found anywhere in the text, and ends at the first spelling of the
/// next section's heading found after that point, or at the end of the
/// text. Returns `None` when the response is missing or no heading of the
/// requested section occurs.
pub fn extract_section(response: Option<&str>, section: Section) -> Option<String> {
    let text = response?;

    let start = section
        .headings()
        .find_map(|heading| text.find(heading).map(|idx| idx + heading.len()))?;

    let end = section
        .next()
        .and_then(|next| {
            next.headings()
                .find_map(|heading| text[start..].find(heading).map(|idx| start + idx))
        })
        .unwrap_or(text.len());

    Some(text[start..end].trim().to_string())
}

/// The three fields derived from one hint-generation response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintBundle {
    pub description: Option<String>,
    pub direct_hint: Option<String>,
    pub indirect_hint: Option<String>,
}

impl HintBundle {
    /// Split a full response into its sections
    pub fn from_response(response: Option<&str>) -> Self {
        Self {
            description: extract_section(response, Section::Description),
            direct_hint: extract_section(response, Section::DirectHint),
            indirect_hint: extract_section(response, Section::IndirectHint),
        }
    }

    pub fn get(&self, section: Section) -> Option<&str> {
        match section {
            Section::Description => self.description.as_deref(),
            Section::DirectHint => self.direct_hint.as_deref(),
            Section::IndirectHint => self.indirect_hint.as_deref(),
        }
    }
}

/// Number of rows where each section could not be extracted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitReport {
    pub rows: usize,
    pub missing_description: usize,
    pub missing_direct_hint: usize,
    pub missing_indirect_hint: usize,
}

impl SplitReport {
    pub fn missing(&self, section: Section) -> usize {
        match section {
            Section::Description => self.missing_description,
            Section::DirectHint => self.missing_direct_hint,
            Section::IndirectHint => self.missing_indirect_hint,
        }
    }

    fn missing_mut(&mut self, section: Section) -> &mut usize {
        match section {
            Section::Description => &mut self.missing_description,
            Section::DirectHint => &mut self.missing_direct_hint,
            Section::IndirectHint => &mut self.missing_indirect_hint,
        }
    }
}

/// Fill the `description`, `direct_hint` and `indirect_hint` columns from
/// `full_response`. Existing values in those columns are replaced.
pub fn split_responses(table: &mut ResultTable) -> TableResult<SplitReport> {
    table.require_columns(&[FULL_RESPONSE])?;
    for section in Section::all() {
        table.ensure_column(section.as_str());
    }

    let mut report = SplitReport {
        rows: table.len(),
        ..Default::default()
    };

    for row in 0..table.len() {
        let bundle = HintBundle::from_response(table.get(row, FULL_RESPONSE)?);
        for section in Section::all() {
            let value = bundle.get(section);
            if value.is_none() {
                *report.missing_mut(section) += 1;
            }
            table.set(row, section.as_str(), value)?;
        }
    }

    for section in Section::all() {
        tracing::info!(
            "Number of missing values in {}: {}",
            section,
            report.missing(section)
        );
    }

    Ok(report)
}
