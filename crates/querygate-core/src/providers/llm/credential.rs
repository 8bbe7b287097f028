//! Credential references: `env:NAME`, `plain:VALUE`, or a bare value.

/// Resolve `reference`, then `env:<default_env>`, returning the first hit or "".
///
/// A bare reference naming a set environment variable yields that variable's
/// value; otherwise the bare text is the credential itself.
pub fn resolve_credential(reference: Option<&str>, default_env: Option<&str>) -> String {
    resolve_with(reference, default_env, env_lookup)
}

pub fn resolve_with<F>(reference: Option<&str>, default_env: Option<&str>, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut candidates: Vec<String> = Vec::new();
    if let Some(r) = reference.filter(|r| !r.is_empty()) {
        candidates.push(r.to_string());
    }
    if let Some(env) = default_env.filter(|e| !e.is_empty()) {
        candidates.push(format!("env:{}", env));
    }

    let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());
    for candidate in &candidates {
        if let Some(name) = candidate.strip_prefix("env:") {
            match lookup(name.trim()) {
                Some(v) => return v,
                None => continue,
            }
        }
        if let Some(value) = candidate.strip_prefix("plain:") {
            return value.to_string();
        }
        return lookup(candidate).unwrap_or_else(|| candidate.clone());
    }
    String::new()
}

fn env_lookup(name: &str) -> Option<String> {
    if name.is_empty() || name.contains(['=', '\0']) {
        return None;
    }
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env() -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<&str, &str> =
            [("OPENAI_API_KEY", "sk-default"), ("TEAM_KEY", "sk-team")].into();
        move |k| vars.get(k).map(|v| v.to_string())
    }

    #[test]
    fn env_reference() {
        assert_eq!(resolve_with(Some("env:TEAM_KEY"), None, env()), "sk-team");
    }

    #[test]
    fn unset_env_reference_falls_through_to_default() {
        assert_eq!(
            resolve_with(Some("env:MISSING"), Some("OPENAI_API_KEY"), env()),
            "sk-default"
        );
    }

    #[test]
    fn plain_escape_is_taken_verbatim() {
        assert_eq!(resolve_with(Some("plain:env:X"), None, env()), "env:X");
    }

    #[test]
    fn bare_value_names_variable_or_is_literal() {
        assert_eq!(resolve_with(Some("TEAM_KEY"), None, env()), "sk-team");
        assert_eq!(
            resolve_with(Some("sk-literal"), Some("OPENAI_API_KEY"), env()),
            "sk-literal"
        );
    }

    #[test]
    fn nothing_resolves_to_empty() {
        assert_eq!(resolve_with(None, Some("NOPE"), env()), "");
        assert_eq!(resolve_with(None, None, env()), "");
    }
}
