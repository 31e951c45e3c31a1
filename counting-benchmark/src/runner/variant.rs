//! Hint combinations for the count-with-hints stage

use serde::{Deserialize, Serialize};

use crate::extract::Section;

/// Which hint fields are included in a counting prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HintVariant {
    pub description: bool,
    pub direct: bool,
    pub indirect: bool,
}

impl HintVariant {
    pub const fn new(description: bool, direct: bool, indirect: bool) -> Self {
        Self {
            description,
            direct,
            indirect,
        }
    }

    pub const ALL_HINTS: HintVariant = HintVariant::new(true, true, true);
    pub const DESCRIPTION_ONLY: HintVariant = HintVariant::new(true, false, false);
    pub const DIRECT_ONLY: HintVariant = HintVariant::new(false, true, false);
    pub const INDIRECT_ONLY: HintVariant = HintVariant::new(false, false, true);

    /// The four variants reported in the paper
    pub fn paper() -> [HintVariant; 4] {
        [
            Self::ALL_HINTS,
            Self::DESCRIPTION_ONLY,
            Self::DIRECT_ONLY,
            Self::INDIRECT_ONLY,
        ]
    }

    /// All eight on/off combinations
    pub fn all() -> Vec<HintVariant> {
        (0..8u8)
            .map(|bits| HintVariant::new(bits & 4 != 0, bits & 2 != 0, bits & 1 != 0))
            .collect()
    }

    /// Result column, e.g. `response_desc_true_direct_false_indirect_false`
    pub fn column_name(&self) -> String {
        format!(
            "response_desc_{}_direct_{}_indirect_{}",
            self.description, self.direct, self.indirect
        )
    }

    pub fn enabled(&self, section: Section) -> bool {
        match section {
            Section::Description => self.description,
            Section::DirectHint => self.direct,
            Section::IndirectHint => self.indirect,
        }
    }

    /// Hint columns read by this variant
    pub fn sections(&self) -> Vec<Section> {
        Section::all()
            .into_iter()
            .filter(|s| self.enabled(*s))
            .collect()
    }
}

impl std::fmt::Display for HintVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sections().iter().map(|s| s.as_str()).collect();
        if names.is_empty() {
            write!(f, "no hints")
        } else {
            write!(f, "{}", names.join("+"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names() {
        assert_eq!(
            HintVariant::ALL_HINTS.column_name(),
            "response_desc_true_direct_true_indirect_true"
        );
        assert_eq!(
            HintVariant::DIRECT_ONLY.column_name(),
            "response_desc_false_direct_true_indirect_false"
        );
    }

    #[test]
    fn test_all_combinations_are_distinct() {
        let all = HintVariant::all();
        assert_eq!(all.len(), 8);
        let columns: std::collections::HashSet<_> = all.iter().map(|v| v.column_name()).collect();
        assert_eq!(columns.len(), 8);
        for variant in HintVariant::paper() {
            assert!(all.contains(&variant));
        }
    }

    #[test]
    fn test_sections_and_display() {
        assert_eq!(
            HintVariant::new(true, false, true).sections(),
            vec![Section::Description, Section::IndirectHint]
        );
        assert_eq!(HintVariant::new(false, true, true).to_string(), "direct_hint+indirect_hint");
        assert_eq!(HintVariant::new(false, false, false).to_string(), "no hints");
    }
}
