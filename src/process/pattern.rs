/// Case-insensitive wildcard pattern for process names.
///
/// `*text*` matches anywhere, `*text` at the end, `text*` at the start and a
/// pattern without `*` must equal the whole text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Contains(String),
    Suffix(String),
    Prefix(String),
    Exact(String),
}

impl Pattern {
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if let Some(inner) = lower.strip_prefix('*').and_then(|rest| rest.strip_suffix('*')) {
            Pattern::Contains(inner.to_string())
        } else if let Some(rest) = lower.strip_prefix('*') {
            Pattern::Suffix(rest.to_string())
        } else if let Some(rest) = lower.strip_suffix('*') {
            Pattern::Prefix(rest.to_string())
        } else {
            Pattern::Exact(lower)
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        match self {
            Pattern::Contains(needle) => text.contains(needle.as_str()),
            Pattern::Suffix(needle) => text.ends_with(needle.as_str()),
            Pattern::Prefix(needle) => text.starts_with(needle.as_str()),
            Pattern::Exact(needle) => text == *needle,
        }
    }
}

pub fn matches_pattern(text: &str, pattern: &str) -> bool {
    Pattern::parse(pattern).matches(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognises_all_forms() {
        assert_eq!(Pattern::parse("*Cursor*"), Pattern::Contains("cursor".into()));
        assert_eq!(Pattern::parse("*.exe"), Pattern::Suffix(".exe".into()));
        assert_eq!(Pattern::parse("Cursor*"), Pattern::Prefix("cursor".into()));
        assert_eq!(Pattern::parse("Cursor.exe"), Pattern::Exact("cursor.exe".into()));
    }

    #[test]
    fn contains_matches_substring() {
        assert!(matches_pattern("anycursorthing", "*cursor*"));
        assert!(matches_pattern("/opt/Cursor/cursor --no-sandbox", "*cursor*"));
        assert!(!matches_pattern("code", "*cursor*"));
    }

    #[test]
    fn prefix_matches_only_at_start() {
        assert!(matches_pattern("cursor --type=renderer", "cursor*"));
        assert!(matches_pattern("CURSOR", "cursor*"));
        assert!(!matches_pattern("mycursor", "cursor*"));
    }

    #[test]
    fn suffix_matches_only_at_end() {
        assert!(matches_pattern("/usr/bin/cursor", "*cursor"));
        assert!(!matches_pattern("cursor-helper", "*cursor"));
    }

    #[test]
    fn exact_is_case_insensitive_whole_text() {
        assert!(matches_pattern("cursor", "Cursor"));
        assert!(matches_pattern("CURSOR", "Cursor"));
        assert!(!matches_pattern("cursor2", "Cursor"));
        assert!(!matches_pattern("anycursorthing", "Cursor"));
    }

    #[test]
    fn lone_star_matches_everything() {
        assert!(matches_pattern("anything", "*"));
        assert!(matches_pattern("", "*"));
    }
}
