//! C2 — Inline Type Registry: RECORD / TABLE OF / VARRAY / INDEX BY /
//! %ROWTYPE / %TYPE definitions and resolution (spec.md §4.2).

use std::collections::HashMap;

use crate::ast::{DotChain, InlineFieldDef, InlineTypeCategory, InlineTypeDecl};
use crate::diagnostics::{Diagnostic, TranspileError};
use crate::indices::Indices;

/// One registration scope (current block / package / schema). The registry
/// holds a stack of these and resolves through the three-level cascade
/// spec.md §4.2 describes.
#[derive(Debug, Default)]
struct Scope {
    types: HashMap<String, InlineTypeDecl>,
}

#[derive(Debug, Default)]
pub struct InlineTypeRegistry {
    /// Innermost (current block) last.
    scopes: Vec<Scope>,
}

impl InlineTypeRegistry {
    pub fn new() -> Self {
        // schema scope, package scope, block scope — always present so
        // `resolve` never has to special-case a missing level.
        Self {
            scopes: vec![Scope::default(), Scope::default(), Scope::default()],
        }
    }

    fn block_scope_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("registry always has 3 scopes")
    }

    pub fn push_block_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_block_scope(&mut self) {
        if self.scopes.len() > 3 {
            self.scopes.pop();
        }
    }

    /// Registers `definition` under `name` at the current (innermost) block
    /// scope.
    pub fn register(&mut self, name: &str, definition: InlineTypeDecl) {
        self.block_scope_mut()
            .types
            .insert(name.to_lowercase(), definition);
    }

    pub fn register_at_package_scope(&mut self, name: &str, definition: InlineTypeDecl) {
        self.scopes[1].types.insert(name.to_lowercase(), definition);
    }

    /// Three-level cascade: current block scope -> package scope -> schema
    /// scope, innermost block first.
    pub fn resolve(&self, name: &str) -> Option<&InlineTypeDecl> {
        let key = name.to_lowercase();
        for scope in self.scopes.iter().rev() {
            if let Some(decl) = scope.types.get(&key) {
                return Some(decl);
            }
        }
        None
    }

    /// `%ROWTYPE(table)`: synthesizes a RECORD mirroring the table's
    /// columns. Returns `None` (caller falls back to `text`) with a
    /// diagnostic when the table cannot be found (spec.md §4.2).
    pub fn resolve_rowtype(
        &self,
        table: &str,
        indices: &Indices,
    ) -> (Option<InlineTypeDecl>, Option<Diagnostic>) {
        match indices.table_columns(table) {
            Some(columns) => {
                let fields = columns
                    .iter()
                    .map(|(name, info)| InlineFieldDef {
                        name: name.clone(),
                        oracle_type: info.oracle_type.clone(),
                    })
                    .collect();
                (
                    Some(InlineTypeDecl {
                        name: format!("{table}%rowtype"),
                        category: InlineTypeCategory::RowType,
                        element_type: None,
                        fields,
                        size_limit: None,
                        index_key_type: None,
                    }),
                    None,
                )
            }
            None => (
                None,
                Some(Diagnostic::warning(format!(
                    "%ROWTYPE: table '{table}' not found in metadata, falling back to text"
                ))),
            ),
        }
    }

    /// `%TYPE(ref)` resolution per spec.md §4.2. `declaring_name` is the
    /// name of the variable currently being declared, to detect the fatal
    /// self-reference case (`v%TYPE` where `v` is being declared).
    pub fn resolve_percent_type(
        &self,
        ref_chain: &DotChain,
        declaring_name: &str,
        lookup_variable: impl Fn(&str) -> Option<String>,
        indices: &Indices,
    ) -> Result<(String, Option<Diagnostic>), TranspileError> {
        if ref_chain.len() == 1 && ref_chain[0].eq_ignore_ascii_case(declaring_name) {
            return Err(TranspileError::SemanticViolation(format!(
                "'{declaring_name}%TYPE' references its own declaration"
            )));
        }

        if ref_chain.len() >= 2 {
            let field = ref_chain.last().unwrap();
            let left_parts = &ref_chain[..ref_chain.len() - 1];
            let left_qualified = left_parts.join(".");

            // left is a known variable whose inline type has that field
            if left_parts.len() == 1 {
                if let Some(var_type_name) = lookup_variable(&left_parts[0]) {
                    if let Some(decl) = self.resolve(&var_type_name) {
                        if let Some(f) =
                            decl.fields.iter().find(|f| f.name.eq_ignore_ascii_case(field))
                        {
                            return Ok((f.oracle_type.clone(), None));
                        }
                    }
                }
            }

            // otherwise, if left is a table (possibly schema-qualified), use
            // that column's type
            if let Some(info) = indices.column_type(&left_qualified, field) {
                return Ok((info.oracle_type.clone(), None));
            }

            let diag = Diagnostic::warning(format!(
                "%TYPE: could not resolve '{}', falling back to text",
                ref_chain.join(".")
            ));
            return Ok(("text".to_string(), Some(diag)));
        }

        // no dot: the variable's own type
        if let Some(var_type_name) = lookup_variable(&ref_chain[0]) {
            return Ok((var_type_name, None));
        }

        let diag = Diagnostic::warning(format!(
            "%TYPE: variable '{}' not found, falling back to text",
            ref_chain[0]
        ));
        Ok(("text".to_string(), Some(diag)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::InlineFieldDef;

    fn record_decl(fields: &[(&str, &str)]) -> InlineTypeDecl {
        InlineTypeDecl {
            name: "r".into(),
            category: InlineTypeCategory::Record,
            element_type: None,
            fields: fields
                .iter()
                .map(|(n, t)| InlineFieldDef {
                    name: n.to_string(),
                    oracle_type: t.to_string(),
                })
                .collect(),
            size_limit: None,
            index_key_type: None,
        }
    }

    #[test]
    fn cascade_prefers_innermost_scope() {
        let mut reg = InlineTypeRegistry::new();
        reg.register_at_package_scope("r", record_decl(&[("x", "NUMBER")]));
        reg.push_block_scope();
        reg.register("r", record_decl(&[("x", "VARCHAR2(10)")]));
        assert_eq!(
            reg.resolve("r").unwrap().fields[0].oracle_type,
            "VARCHAR2(10)"
        );
        reg.pop_block_scope();
        assert_eq!(reg.resolve("r").unwrap().fields[0].oracle_type, "NUMBER");
    }

    #[test]
    fn rowtype_falls_back_when_table_missing() {
        let reg = InlineTypeRegistry::new();
        let indices = Indices::new();
        let (decl, diag) = reg.resolve_rowtype("hr.missing", &indices);
        assert!(decl.is_none());
        assert!(diag.is_some());
    }

    #[test]
    fn rowtype_mirrors_table_columns() {
        let reg = InlineTypeRegistry::new();
        let indices = Indices::new().with_column("hr.emp", "sal", "NUMBER(8,2)");
        let (decl, diag) = reg.resolve_rowtype("hr.emp", &indices);
        assert!(diag.is_none());
        let decl = decl.unwrap();
        assert_eq!(decl.fields[0].name, "sal");
    }

    #[test]
    fn percent_type_self_reference_is_fatal() {
        let reg = InlineTypeRegistry::new();
        let indices = Indices::new();
        let err = reg
            .resolve_percent_type(&vec!["v".to_string()], "v", |_| None, &indices)
            .unwrap_err();
        assert!(matches!(err, TranspileError::SemanticViolation(_)));
    }

    #[test]
    fn percent_type_resolves_via_table_column() {
        let reg = InlineTypeRegistry::new();
        let indices = Indices::new().with_column("hr.emp", "sal", "NUMBER(8,2)");
        let (ty, diag) = reg
            .resolve_percent_type(
                &vec!["hr".to_string(), "emp".to_string(), "sal".to_string()],
                "v_sal",
                |_| None,
                &indices,
            )
            .unwrap();
        assert_eq!(ty, "NUMBER(8,2)");
        assert!(diag.is_none());
    }
}
