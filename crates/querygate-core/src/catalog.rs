//! Catalog snapshot files: the allowlisted objects of one data source.
//!
//! Accepted shapes (YAML or JSON): a list whose entries are either
//! `"schema.object"` / `"object"` strings or `{schema_name, object_name}` maps,
//! or a map with such a list under `objects` or `items`.

use crate::model::SchemaObject;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Name(String),
    Object {
        #[serde(alias = "schema")]
        schema_name: Option<String>,
        #[serde(alias = "object", alias = "name")]
        object_name: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<Entry>),
    Wrapped {
        #[serde(alias = "items")]
        objects: Vec<Entry>,
    },
}

pub fn load_catalog(path: &Path, default_schema: &str) -> anyhow::Result<Vec<SchemaObject>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    parse_catalog(&raw, default_schema)
        .with_context(|| format!("invalid catalog {}", path.display()))
}

pub fn parse_catalog(raw: &str, default_schema: &str) -> anyhow::Result<Vec<SchemaObject>> {
    let file: CatalogFile = serde_yaml::from_str(raw).context("expected a list of objects")?;
    let entries = match file {
        CatalogFile::List(e) | CatalogFile::Wrapped { objects: e } => e,
    };

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let obj = match entry {
            Entry::Name(name) => match name.trim().rsplit_once('.') {
                Some((schema, object)) => SchemaObject::new(schema.trim(), object.trim()),
                None => SchemaObject::new(default_schema, name.trim()),
            },
            Entry::Object {
                schema_name,
                object_name,
            } => SchemaObject::new(
                schema_name
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| default_schema.to_string()),
                object_name.trim(),
            ),
        };
        if obj.schema_name.is_empty() || obj.object_name.is_empty() {
            bail!("catalog entry has an empty name");
        }
        out.push(obj);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_entries_and_default_schema() {
        let objs = parse_catalog(
            r#"["public.film", "actor", {"schema_name": "sales", "object_name": "orders"}, {"name": "rental"}]"#,
            "public",
        )
        .unwrap();
        let keys: Vec<String> = objs.iter().map(SchemaObject::key).collect();
        assert_eq!(
            keys,
            vec!["public.film", "public.actor", "sales.orders", "public.rental"]
        );
    }

    #[test]
    fn wrapped_yaml_list() {
        let objs = parse_catalog("items:\n  - schema: public\n    object: film\n", "x").unwrap();
        assert_eq!(objs, vec![SchemaObject::new("public", "film")]);
    }

    #[test]
    fn rejects_blank_names() {
        assert!(parse_catalog(r#"["public."]"#, "public").is_err());
        assert!(parse_catalog("42", "public").is_err());
    }
}
