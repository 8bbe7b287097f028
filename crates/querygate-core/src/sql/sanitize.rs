use regex::Regex;
use std::sync::OnceLock;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```(?:sql)?\s*(.*?)```").expect("static pattern"))
}

fn statement_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(select|with)\b").expect("static pattern"))
}

/// Isolate the statement text of a raw model completion.
///
/// Keeps the interior of the first fenced block when there is one, then drops
/// any commentary before the first `SELECT`/`WITH`. Empty in, empty out.
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.trim();
    if text.is_empty() {
        return String::new();
    }

    if let Some(inner) = fence_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
    {
        text = inner;
    }

    if let Some(m) = statement_start_re().find(text) {
        if m.start() > 0 {
            text = text[m.start()..].trim();
        }
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_fenced_interior() {
        let raw = "Sure!\n```sql\nSELECT * FROM film;\n```\nLet me know.";
        assert_eq!(sanitize(raw), "SELECT * FROM film;");
    }

    #[test]
    fn untagged_fence_is_accepted() {
        assert_eq!(sanitize("```\nWITH x AS (SELECT 1) SELECT * FROM x\n```"), "WITH x AS (SELECT 1) SELECT * FROM x");
    }

    #[test]
    fn strips_preamble() {
        assert_eq!(
            sanitize("Here is your query: select count(*) from customer"),
            "select count(*) from customer"
        );
    }

    #[test]
    fn keyword_inside_word_is_not_a_start() {
        assert_eq!(
            sanitize("Preselected answer: SELECT 1"),
            "SELECT 1"
        );
    }

    #[test]
    fn empty_input_yields_empty() {
        assert_eq!(sanitize("   \n "), "");
    }

    #[test]
    fn sanitize_is_a_fixed_point() {
        for raw in [
            "SELECT * FROM actor LIMIT 5;",
            "Answer:\n```sql\nselect 1\n```",
            "  with t as (select 1) select * from t  ",
            "no sql here",
        ] {
            let once = sanitize(raw);
            assert_eq!(sanitize(&once), once, "{}", raw);
        }
    }
}
