//! Raw tag → canonical tag translation.

use crate::config::EditionProfile;
use crate::model::push_unique;

/// Moves every raw tag with a canonical form into `tags`; the rest stay in
/// `raw_tags` in their original order.
pub fn translate_raw_tags(profile: &EditionProfile, tags: &mut Vec<String>, raw_tags: &mut Vec<String>) {
    let mut untranslated = Vec::new();
    for raw in raw_tags.drain(..) {
        match profile.tags.get(raw.trim()) {
            Some(canonical) => {
                for tag in canonical {
                    push_unique(tags, tag.clone());
                }
            }
            None => push_unique(&mut untranslated, raw),
        }
    }
    *raw_tags = untranslated;
}

/// Whether `term` appears in the edition's tag table.
pub fn is_known_tag(profile: &EditionProfile, term: &str) -> bool {
    profile.tags.contains_key(term.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_profile;

    #[test]
    fn known_tags_move_unknown_stay() {
        let profile = builtin_profile("zh").unwrap();
        let mut tags = Vec::new();
        let mut raw_tags = vec!["現代標準漢語".to_string(), "同音詞".to_string(), "臺灣".to_string()];
        translate_raw_tags(profile, &mut tags, &mut raw_tags);
        assert_eq!(tags, vec!["Standard-Chinese", "Taiwan"]);
        assert_eq!(raw_tags, vec!["同音詞"]);
    }

    #[test]
    fn multi_tag_translation() {
        let profile = builtin_profile("pl").unwrap();
        let mut tags = vec!["masculine".to_string()];
        let mut raw_tags = vec!["rodzaj męskorzeczowy".to_string()];
        translate_raw_tags(profile, &mut tags, &mut raw_tags);
        assert_eq!(tags, vec!["masculine", "inanimate"]);
        assert!(raw_tags.is_empty());
    }
}
