//! Language name ↔ code lookups over the edition's language table.

use crate::config::EditionProfile;

/// Code for a language display name in the edition's language, or an empty
/// string when the name is unknown.
pub fn name_to_code(profile: &EditionProfile, name: &str) -> String {
    profile
        .languages
        .get(name.trim())
        .cloned()
        .unwrap_or_default()
}

/// Display name for a language code, or an empty string when the code is
/// unknown. When several names share a code the alphabetically first name
/// wins, whatever their order in the profile file.
pub fn code_to_name(profile: &EditionProfile, code: &str) -> String {
    let code = code.trim();
    profile
        .languages
        .iter()
        .find(|(_, value)| value.as_str() == code)
        .map(|(name, _)| name.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_profile;

    #[test]
    fn lookups_in_both_directions() {
        let profile = builtin_profile("de").unwrap();
        assert_eq!(name_to_code(profile, "Englisch"), "en");
        assert_eq!(name_to_code(profile, " Deutsch "), "de");
        assert_eq!(code_to_name(profile, "en"), "Englisch");
    }

    #[test]
    fn shared_code_resolves_to_first_name_alphabetically() {
        let profile = EditionProfile::from_yaml_str(
            "edition: xx\nlanguage_heading:\n  kind: heading_text\npos_heading:\n  kind: heading_text\nlanguages:\n  Niederländisch: nl\n  Holländisch: nl\n",
        )
        .unwrap();
        assert_eq!(code_to_name(&profile, "nl"), "Holländisch");
        assert_eq!(name_to_code(&profile, "Niederländisch"), "nl");
    }

    #[test]
    fn unknown_values_are_empty() {
        let profile = builtin_profile("pl").unwrap();
        assert_eq!(name_to_code(profile, "chiński standardowy"), "");
        assert_eq!(code_to_name(profile, "xx"), "");
    }
}
