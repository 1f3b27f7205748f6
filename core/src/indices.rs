//! C3 — Transformation Indices: the read-only, process-lifetime metadata
//! snapshot (spec.md §3, §4.3).
//!
//! Built and owned by an external metadata-extraction job (spec.md §6); the
//! core only reads it. Deserializable so the CLI's `--indices-path` flag can
//! load a JSON snapshot without the core ever touching the filesystem.

use std::collections::{BTreeMap, BTreeSet};

use getset::Getters;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub oracle_type: String,
    pub owner: Option<String>,
    pub is_custom_type: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct Indices {
    /// `columns["schema.table"]["column"] = ColumnInfo`.
    columns: BTreeMap<String, BTreeMap<String, ColumnInfo>>,
    /// `synonyms[name] = "schema.object"` (or `"schema.package.object"`).
    synonyms: BTreeMap<String, String>,
    /// `"schema.package.routine"` set.
    package_routines: BTreeSet<String>,
    /// `type_methods["schema.type"] = {method_name, ...}`.
    type_methods: BTreeMap<String, BTreeSet<String>>,
    /// `"schema.sequence"` set.
    sequences: BTreeSet<String>,
}

/// Canonicalizes a qualified name to lower case for case-insensitive
/// lookups (spec.md §4.3).
pub fn canonicalize(name: &str) -> String {
    name.to_lowercase()
}

impl Indices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve_synonym(&self, name: &str) -> Option<&str> {
        self.synonyms.get(&canonicalize(name)).map(String::as_str)
    }

    pub fn column_type(&self, qualified_table: &str, column: &str) -> Option<&ColumnInfo> {
        self.columns
            .get(&canonicalize(qualified_table))
            .and_then(|cols| cols.get(&canonicalize(column)))
    }

    pub fn table_columns(&self, qualified_table: &str) -> Option<&BTreeMap<String, ColumnInfo>> {
        self.columns.get(&canonicalize(qualified_table))
    }

    pub fn has_type_method(&self, qualified_type: &str, method: &str) -> bool {
        self.type_methods
            .get(&canonicalize(qualified_type))
            .is_some_and(|methods| methods.contains(&canonicalize(method)))
    }

    pub fn is_package_routine(&self, qualified_name: &str) -> bool {
        self.package_routines.contains(&canonicalize(qualified_name))
    }

    pub fn is_sequence(&self, qualified_name: &str) -> bool {
        self.sequences.contains(&canonicalize(qualified_name))
    }

    // --- builders used by tests and by whatever loads the external snapshot ---

    pub fn with_column(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        oracle_type: impl Into<String>,
    ) -> Self {
        self.columns
            .entry(canonicalize(&table.into()))
            .or_default()
            .insert(
                canonicalize(&column.into()),
                ColumnInfo {
                    oracle_type: oracle_type.into(),
                    owner: None,
                    is_custom_type: false,
                },
            );
        self
    }

    pub fn with_synonym(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.synonyms.insert(canonicalize(&name.into()), target.into());
        self
    }

    pub fn with_package_routine(mut self, qualified_name: impl Into<String>) -> Self {
        self.package_routines.insert(canonicalize(&qualified_name.into()));
        self
    }

    pub fn with_type_method(
        mut self,
        qualified_type: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.type_methods
            .entry(canonicalize(&qualified_type.into()))
            .or_default()
            .insert(canonicalize(&method.into()));
        self
    }

    pub fn with_sequence(mut self, qualified_name: impl Into<String>) -> Self {
        self.sequences.insert(canonicalize(&qualified_name.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_case_insensitive() {
        let idx = Indices::new().with_synonym("Seq", "hr.seq");
        assert_eq!(idx.resolve_synonym("SEQ"), Some("hr.seq"));
        assert_eq!(idx.resolve_synonym("seq"), Some("hr.seq"));
    }

    #[test]
    fn column_type_round_trips() {
        let idx = Indices::new().with_column("hr.emp", "sal", "NUMBER(8,2)");
        assert_eq!(
            idx.column_type("HR.EMP", "SAL").unwrap().oracle_type,
            "NUMBER(8,2)"
        );
    }

    #[test]
    fn serde_round_trip() {
        let idx = Indices::new()
            .with_column("hr.emp", "sal", "NUMBER")
            .with_sequence("hr.seq");
        let json = serde_json::to_string(&idx).unwrap();
        let back: Indices = serde_json::from_str(&json).unwrap();
        assert!(back.is_sequence("hr.seq"));
        assert_eq!(back.column_type("hr.emp", "sal").unwrap().oracle_type, "NUMBER");
    }
}
