//! Structural read-only validation of a sanitized candidate.
//!
//! The candidate is parsed with the PostgreSQL dialect; statement kind, query
//! bodies and table references are read from the AST, so identifiers inside string
//! literals or comments never count as references.

use crate::errors::GateError;
use crate::model::{ObjectRef, SchemaObject};
use serde::{Deserialize, Serialize};
use sqlparser::ast::{ObjectName, Query, SetExpr, Statement, Visit, Visitor};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::HashSet;
use std::ops::ControlFlow;

pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_MAX_ROWS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    Empty,
    MultiStatement,
    Parse,
    NotReadOnly,
    NotAllowlisted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub sql: String,
    pub errors: Vec<String>,
    pub referenced_objects: Vec<ObjectRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl ValidationOutcome {
    fn accepted(sql: String, refs: Vec<ObjectRef>) -> Self {
        Self {
            ok: true,
            sql,
            errors: vec![],
            referenced_objects: refs,
            rejection: None,
        }
    }

    fn rejected(rejection: Rejection, sql: String, errors: Vec<String>) -> Self {
        Self {
            ok: false,
            sql,
            errors,
            referenced_objects: vec![],
            rejection: Some(rejection),
        }
    }

    pub fn into_result(self) -> Result<Self, GateError> {
        match self.rejection {
            None => Ok(self),
            Some(Rejection::Parse) => Err(GateError::Parse(self.errors.join("; "))),
            Some(_) => Err(GateError::Policy(self.errors)),
        }
    }
}

/// Closed set of `(schema, object)` pairs a candidate may reference.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    keys: HashSet<String>,
}

impl Allowlist {
    pub fn new(objects: &[SchemaObject]) -> Self {
        Self {
            keys: objects.iter().map(SchemaObject::key).collect(),
        }
    }

    pub fn contains(&self, r: &ObjectRef) -> bool {
        self.keys.contains(&r.key())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SqlValidator {
    pub default_schema: String,
    pub max_rows: u64,
}

impl Default for SqlValidator {
    fn default() -> Self {
        Self {
            default_schema: DEFAULT_SCHEMA.to_string(),
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl SqlValidator {
    pub fn new(default_schema: impl Into<String>, max_rows: u64) -> Self {
        Self {
            default_schema: default_schema.into(),
            max_rows,
        }
    }

    pub fn validate(&self, sql: &str, allowlist: &Allowlist) -> ValidationOutcome {
        let sql = sql.trim().to_string();
        if sql.is_empty() {
            return ValidationOutcome::rejected(
                Rejection::Empty,
                sql,
                vec!["Generated SQL is empty".into()],
            );
        }

        if has_multiple_statements(&sql) {
            return ValidationOutcome::rejected(
                Rejection::MultiStatement,
                sql,
                vec!["Multiple SQL statements are not allowed".into()],
            );
        }

        let statements = match parse(&sql) {
            Ok(s) => s,
            Err(e) => return ValidationOutcome::rejected(Rejection::Parse, sql, vec![e]),
        };

        let query = match single_query(&statements) {
            Ok(q) => q,
            Err(e) => return ValidationOutcome::rejected(Rejection::NotReadOnly, sql, vec![e]),
        };

        let mut collector = ShapeCollector::default();
        let _ = statements[0].visit(&mut collector);

        if !collector.violations.is_empty() {
            return ValidationOutcome::rejected(Rejection::NotReadOnly, sql, collector.violations);
        }

        let sql = if has_row_limit(query) {
            sql
        } else {
            // own line, so a trailing line comment cannot swallow the cap
            let capped = format!("{}\nLIMIT {};", strip_trailing_terminator(&sql), self.max_rows);
            let applied = parse(&capped).and_then(|stmts| {
                single_query(&stmts)
                    .map(has_row_limit)
                    .map_err(|e| format!("SQL parse error: {}", e))
            });
            match applied {
                Ok(true) => capped,
                Ok(false) => {
                    return ValidationOutcome::rejected(
                        Rejection::Parse,
                        sql,
                        vec!["could not apply row cap: limit not recognized".into()],
                    )
                }
                Err(e) => {
                    return ValidationOutcome::rejected(
                        Rejection::Parse,
                        sql,
                        vec![format!("could not apply row cap: {}", e)],
                    )
                }
            }
        };

        let refs = collector.references(&self.default_schema);
        let unknown: Vec<&ObjectRef> = refs.iter().filter(|r| !allowlist.contains(r)).collect();
        if !unknown.is_empty() {
            let names: Vec<String> = unknown.iter().map(|r| r.key()).collect();
            let mut outcome = ValidationOutcome::rejected(
                Rejection::NotAllowlisted,
                sql,
                vec![format!(
                    "Unknown or non-allowlisted objects referenced: {}",
                    names.join(", ")
                )],
            );
            outcome.referenced_objects = refs;
            return outcome;
        }

        ValidationOutcome::accepted(sql, refs)
    }
}

/// True when text remains after one trailing terminator is removed and it still
/// holds a terminator.
pub fn has_multiple_statements(sql: &str) -> bool {
    strip_trailing_terminator(sql).contains(';')
}

fn strip_trailing_terminator(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

fn parse(sql: &str) -> Result<Vec<Statement>, String> {
    Parser::parse_sql(&PostgreSqlDialect {}, sql).map_err(|e| format!("SQL parse error: {}", e))
}

fn single_query(statements: &[Statement]) -> Result<&Query, String> {
    if statements.len() != 1 {
        return Err("Only one SQL statement is allowed".into());
    }
    match &statements[0] {
        Statement::Query(q) => Ok(q.as_ref()),
        _ => Err("Only SELECT queries are allowed".into()),
    }
}

fn has_row_limit(query: &Query) -> bool {
    query.limit.is_some() || query.fetch.is_some()
}

fn write_kind(body: &SetExpr) -> Option<&'static str> {
    match body {
        SetExpr::Select(select) if select.into.is_some() => Some("SELECT INTO"),
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => None,
        // nested queries are visited on their own
        SetExpr::Query(_) => None,
        SetExpr::SetOperation { left, right, .. } => write_kind(left).or_else(|| write_kind(right)),
        SetExpr::Insert(_) => Some("INSERT"),
        SetExpr::Update(_) => Some("UPDATE"),
        #[allow(unreachable_patterns)]
        _ => Some("statement"),
    }
}

#[derive(Default)]
struct ShapeCollector {
    relations: Vec<ObjectName>,
    cte_names: HashSet<String>,
    violations: Vec<String>,
}

impl Visitor for ShapeCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.cte_names.insert(cte.alias.name.value.to_lowercase());
            }
        }
        if let Some(kind) = write_kind(&query.body) {
            self.violations
                .push(format!("Data-modifying {} is not allowed", kind));
        }
        if !query.locks.is_empty() {
            self.violations
                .push("Row-locking clauses (FOR UPDATE/FOR SHARE) are not allowed".into());
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        self.relations.push(relation.clone());
        ControlFlow::Continue(())
    }
}

impl ShapeCollector {
    fn references(&self, default_schema: &str) -> Vec<ObjectRef> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for name in &self.relations {
            let parts: Vec<String> = name.0.iter().map(|i| normalize_ident(&i.value)).collect();
            let r = match parts.as_slice() {
                [] => continue,
                [object] => {
                    if self.cte_names.contains(object) {
                        continue;
                    }
                    ObjectRef {
                        schema: normalize_ident(default_schema),
                        object: object.clone(),
                        raw: name.to_string(),
                    }
                }
                [.., schema, object] => ObjectRef {
                    schema: schema.clone(),
                    object: object.clone(),
                    raw: name.to_string(),
                },
            };
            if seen.insert(r.key()) {
                out.push(r);
            }
        }
        out
    }
}

fn normalize_ident(s: &str) -> String {
    s.trim().trim_matches('"').trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Allowlist {
        Allowlist::new(&[
            SchemaObject::new("public", "customer"),
            SchemaObject::new("public", "payment"),
            SchemaObject::new("public", "film"),
        ])
    }

    fn validator() -> SqlValidator {
        SqlValidator::new("public", 100)
    }

    #[test]
    fn accepts_select_and_appends_limit() {
        let out = validator().validate("SELECT * FROM customer;", &catalog());
        assert!(out.ok, "{:?}", out.errors);
        assert_eq!(out.sql, "SELECT * FROM customer\nLIMIT 100;");
        assert_eq!(out.referenced_objects.len(), 1);
        assert_eq!(out.referenced_objects[0].key(), "public.customer");
    }

    #[test]
    fn existing_limit_is_left_unchanged() {
        let sql = "SELECT * FROM film LIMIT 5";
        let out = validator().validate(sql, &catalog());
        assert!(out.ok);
        assert_eq!(out.sql, sql);
    }

    #[test]
    fn limit_is_applied_exactly_once() {
        let v = validator();
        let first = v.validate("select count(*) from payment", &catalog());
        let second = v.validate(&first.sql, &catalog());
        assert!(second.ok);
        assert_eq!(first.sql, second.sql);
        assert_eq!(second.sql.to_uppercase().matches("LIMIT").count(), 1);
    }

    #[test]
    fn trailing_line_comment_keeps_the_row_cap() {
        let v = validator();
        let out = v.validate("SELECT * FROM customer -- all", &catalog());
        assert!(out.ok, "{:?}", out.errors);
        assert_eq!(out.sql, "SELECT * FROM customer -- all\nLIMIT 100;");

        let reparsed = parse(&out.sql).unwrap();
        assert!(has_row_limit(single_query(&reparsed).unwrap()));

        let again = v.validate(&out.sql, &catalog());
        assert_eq!(again.sql, out.sql);
    }

    #[test]
    fn rejects_multiple_statements() {
        let out = validator().validate("SELECT 1; SELECT 2;", &catalog());
        assert!(!out.ok);
        assert_eq!(out.rejection, Some(Rejection::MultiStatement));
        assert_eq!(out.errors, vec!["Multiple SQL statements are not allowed"]);
    }

    #[test]
    fn single_trailing_terminator_is_fine() {
        assert!(validator().validate("SELECT 1 ;  ", &catalog()).ok);
    }

    #[test]
    fn rejects_writes() {
        for sql in [
            "DELETE FROM customer",
            "UPDATE film SET title = 'x'",
            "DROP TABLE film",
        ] {
            let out = validator().validate(sql, &catalog());
            assert!(!out.ok, "{}", sql);
            assert_eq!(out.rejection, Some(Rejection::NotReadOnly), "{}", sql);
        }
    }

    #[test]
    fn rejects_select_into_and_locks() {
        let out = validator().validate("SELECT * INTO backup FROM customer", &catalog());
        assert_eq!(out.rejection, Some(Rejection::NotReadOnly));

        let out = validator().validate("SELECT * FROM customer FOR UPDATE", &catalog());
        assert_eq!(out.rejection, Some(Rejection::NotReadOnly));
    }

    #[test]
    fn names_every_unknown_reference() {
        let out = validator().validate(
            "SELECT * FROM customer c JOIN secrets s ON s.id = c.id JOIN audit.log l ON true",
            &catalog(),
        );
        assert!(!out.ok);
        assert_eq!(out.rejection, Some(Rejection::NotAllowlisted));
        assert!(out.errors[0].contains("public.secrets"));
        assert!(out.errors[0].contains("audit.log"));
        assert!(!out.errors[0].contains("public.customer"));
    }

    #[test]
    fn string_literals_are_not_references() {
        let out = validator().validate(
            "SELECT 'FROM secrets; JOIN x' AS note FROM customer",
            &catalog(),
        );
        // a terminator inside a literal still trips the textual multi-statement check
        assert_eq!(out.rejection, Some(Rejection::MultiStatement));

        let out = validator().validate("SELECT 'JOIN secrets' AS note FROM customer", &catalog());
        assert!(out.ok, "{:?}", out.errors);
    }

    #[test]
    fn cte_names_are_not_catalog_references() {
        let out = validator().validate(
            "WITH totals AS (SELECT customer_id, sum(amount) AS s FROM payment GROUP BY 1) \
             SELECT * FROM totals",
            &catalog(),
        );
        assert!(out.ok, "{:?}", out.errors);
        assert_eq!(out.referenced_objects.len(), 1);
        assert_eq!(out.referenced_objects[0].key(), "public.payment");
    }

    #[test]
    fn quoted_and_qualified_names_resolve() {
        let out = validator().validate(r#"SELECT * FROM "public"."Customer""#, &catalog());
        assert!(out.ok, "{:?}", out.errors);
    }

    #[test]
    fn empty_allowlist_rejects_any_reference() {
        let out = validator().validate("SELECT * FROM customer", &Allowlist::default());
        assert_eq!(out.rejection, Some(Rejection::NotAllowlisted));
        assert!(validator().validate("SELECT 1", &Allowlist::default()).ok);
    }

    #[test]
    fn unparseable_sql_maps_to_parse_error() {
        let out = validator().validate("SELECT * FROM customer WHERE (", &catalog());
        assert_eq!(out.rejection, Some(Rejection::Parse));
        assert!(matches!(out.into_result(), Err(GateError::Parse(_))));
    }

    #[test]
    fn empty_candidate_is_policy_violation() {
        let out = validator().validate("  ", &catalog());
        assert_eq!(out.rejection, Some(Rejection::Empty));
        assert!(matches!(out.into_result(), Err(GateError::Policy(_))));
    }
}
