//! Prompt templates sent alongside each image

/// Ask for a bare count of `object_name`
pub fn basic_count_prompt(object_name: &str) -> String {
    format!(
        "Count the number of {object_name} in this image. \
         Respond with a single integer only, with no words, units or punctuation."
    )
}

/// Ask for the three-part side information used as hints.
///
/// The headings requested here are the primary spellings the section
/// extractor looks for.
pub fn side_information_prompt(object_name: &str) -> String {
    format!(
        "You will later be asked to count the {object_name} in this image. \
         Before counting, write side information that would help someone count them accurately. \
         Use exactly these three numbered headings:\n\n\
         1. **Description:** Describe the scene and how the {object_name} are arranged \
         (rows, clusters, overlap, occlusion).\n\n\
         2. **Direct hint:** Give a concrete strategy for counting the {object_name} in this image.\n\n\
         3. **Indirect hint:** Give background knowledge about {object_name} that constrains \
         a plausible count (typical group sizes, packaging, spacing).\n\n\
         Do not state a final count."
    )
}

/// Ask for a bare count, prefixed with whichever hints are enabled.
///
/// Empty hint strings are left out entirely.
pub fn count_with_hint_prompt(
    object_name: &str,
    description: &str,
    direct_hint: &str,
    indirect_hint: &str,
) -> String {
    let mut prompt = String::new();

    let hints = [
        ("Description of the image", description),
        ("Direct hint", direct_hint),
        ("Indirect hint", indirect_hint),
    ];
    let present: Vec<_> = hints.iter().filter(|(_, text)| !text.trim().is_empty()).collect();

    if !present.is_empty() {
        prompt.push_str("Use the following information about this image:\n\n");
        for (label, text) in present {
            prompt.push_str(&format!("{}: {}\n\n", label, text.trim()));
        }
    }

    prompt.push_str(&basic_count_prompt(object_name));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_prompt_names_object() {
        let prompt = basic_count_prompt("sea shells");
        assert!(prompt.contains("number of sea shells"));
        assert!(prompt.contains("single integer"));
    }

    #[test]
    fn test_side_information_prompt_uses_extractor_headings() {
        let prompt = side_information_prompt("apples");
        assert!(prompt.contains("1. **Description:**"));
        assert!(prompt.contains("2. **Direct hint:**"));
        assert!(prompt.contains("3. **Indirect hint:**"));
    }

    #[test]
    fn test_hint_prompt_skips_empty_hints() {
        let prompt = count_with_hint_prompt("birds", "", "Count by wire.", "  ");
        assert!(prompt.contains("Direct hint: Count by wire."));
        assert!(!prompt.contains("Description of the image"));
        assert!(!prompt.contains("Indirect hint"));
        assert!(prompt.ends_with(&basic_count_prompt("birds")));
    }

    #[test]
    fn test_hint_prompt_without_hints_is_basic() {
        assert_eq!(count_with_hint_prompt("cups", "", "", ""), basic_count_prompt("cups"));
    }
}
