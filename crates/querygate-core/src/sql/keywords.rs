use regex::Regex;
use std::sync::OnceLock;

/// Write and DDL keywords that must never appear in a generated statement.
pub const BLOCKED_SQL_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "ALTER", "DROP", "TRUNCATE", "CREATE", "GRANT", "REVOKE",
    "MERGE",
];

fn blocked_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternation = BLOCKED_SQL_KEYWORDS.join("|");
        Regex::new(&format!(r"(?i)\b({})\b", alternation)).expect("static pattern")
    })
}

/// First blocked keyword occurring as a whole word anywhere in `sql`,
/// including inside literals and comments.
pub fn find_blocked_keyword(sql: &str) -> Option<String> {
    blocked_re()
        .find(sql)
        .map(|m| m.as_str().to_ascii_uppercase())
}

pub fn contains_blocked_keyword(sql: &str) -> bool {
    blocked_re().is_match(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_word_only() {
        assert!(!contains_blocked_keyword(
            "SELECT last_update, deleted_at, created_by FROM film"
        ));
        assert!(contains_blocked_keyword("select 1; drop table film"));
    }

    #[test]
    fn reports_first_keyword_uppercased() {
        assert_eq!(
            find_blocked_keyword("SELECT 'x' -- then Truncate it"),
            Some("TRUNCATE".to_string())
        );
        assert_eq!(find_blocked_keyword("SELECT 1"), None);
    }
}
