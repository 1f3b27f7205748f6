//! C10 — Top-level Driver (spec.md §6): the three entry points an external
//! caller (the CLI, or the enclosing schema-migration job) actually calls.
//! The core never parses source text; `oracle_source` is carried through
//! purely so the result object can report it alongside the outcome.

use crate::ast::{Query, Routine, TranslationUnit};
use crate::context::TransformationContext;
use crate::diagnostics::{Diagnostic, TranspileError};
use crate::env::Env;
use crate::indices::Indices;
use crate::inline_types::InlineTypeRegistry;

/// Tag naming which `TranspileError` variant failed, for callers that want
/// to branch on kind without matching the full error (spec.md §6, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ParseError,
    UnsupportedConstruct,
    SemanticViolation,
    TransformationBug,
}

fn error_kind(err: &TranspileError) -> ErrorKind {
    match err {
        TranspileError::ParseError(_) => ErrorKind::ParseError,
        TranspileError::UnsupportedConstruct(_) => ErrorKind::UnsupportedConstruct,
        TranspileError::SemanticViolation(_) => ErrorKind::SemanticViolation,
        TranspileError::TransformationBug(_) => ErrorKind::TransformationBug,
    }
}

/// spec.md §6's "Result object": success carries the rewritten source and
/// any non-fatal diagnostics collected along the way; failure carries the
/// fatal error kind/message and whatever diagnostics were collected before
/// the error was hit.
#[derive(Debug, Clone, PartialEq)]
pub enum TranspileResult {
    Success { oracle_source: String, postgres_source: String, diagnostics: Vec<Diagnostic> },
    Failure { oracle_source: String, error_kind: ErrorKind, error_message: String, diagnostics: Vec<Diagnostic> },
}

fn run<T>(
    oracle_source: &str,
    schema: &str,
    indices: &Indices,
    f: impl FnOnce(&mut Env) -> Result<T, TranspileError>,
    render: impl FnOnce(T) -> String,
) -> TranspileResult {
    let mut ctx = TransformationContext::new(schema);
    let mut inline_types = InlineTypeRegistry::new();
    let mut diagnostics = Vec::new();
    let mut env = Env { ctx: &mut ctx, indices, inline_types: &mut inline_types, diagnostics: &mut diagnostics };

    match f(&mut env) {
        Ok(value) => TranspileResult::Success {
            oracle_source: oracle_source.to_string(),
            postgres_source: render(value),
            diagnostics,
        },
        Err(err) => TranspileResult::Failure {
            oracle_source: oracle_source.to_string(),
            error_kind: error_kind(&err),
            error_message: err.to_string(),
            diagnostics,
        },
    }
}

/// Transforms a standalone query (spec.md §4.8).
pub fn transform_sql(oracle_source: &str, query: &Query, schema: &str, indices: &Indices) -> TranspileResult {
    run(oracle_source, schema, indices, |env| crate::sql::rewrite_query(query, env), |s| s)
}

/// Transforms a PROCEDURE or FUNCTION (spec.md §4.9, "Routine emission").
pub fn transform_routine(oracle_source: &str, routine: &Routine, schema: &str, indices: &Indices) -> TranspileResult {
    run(oracle_source, schema, indices, |env| crate::procedural::rewrite_routine(routine, env), |s| s)
}

/// Transforms an anonymous PL/SQL block.
pub fn transform_anonymous_block(oracle_source: &str, unit: &TranslationUnit, schema: &str, indices: &Indices) -> TranspileResult {
    let TranslationUnit::AnonymousBlock { declarations, body, handlers } = unit else {
        return TranspileResult::Failure {
            oracle_source: oracle_source.to_string(),
            error_kind: ErrorKind::TransformationBug,
            error_message: "transform_anonymous_block called with a non-block translation unit".to_string(),
            diagnostics: Vec::new(),
        };
    };
    run(
        oracle_source,
        schema,
        indices,
        |env| crate::procedural::rewrite_body(declarations, body, handlers, env),
        |s| format!("DO $$ {s} $$;"),
    )
}

/// `dump-ast`: a plain textual dump of the input tree, not a rewrite
/// (spec.md §6, "optionally accompanied by a textual AST dump").
pub fn dump_ast(unit: &TranslationUnit) -> String {
    crate::ast::dump(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Query, QueryBlock, SelectItem, TableRef};

    fn trivial_select() -> Query {
        Query::Block(QueryBlock {
            select_list: vec![SelectItem {
                expr: crate::ast::Expr::Ident(vec!["empno".into()]),
                alias: None,
                is_star: false,
                star_qualifier: None,
            }],
            from: vec![TableRef::Base { name: vec!["emp".into()], alias: None }],
            where_clause: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            connect_by: None,
        })
    }

    #[test]
    fn transform_sql_success_carries_oracle_source_through() {
        let indices = Indices::new();
        let query = trivial_select();
        let result = transform_sql("SELECT empno FROM emp", &query, "hr", &indices);
        match result {
            TranspileResult::Success { oracle_source, postgres_source, .. } => {
                assert_eq!(oracle_source, "SELECT empno FROM emp");
                assert_eq!(postgres_source, "SELECT empno FROM hr.emp");
            }
            TranspileResult::Failure { .. } => panic!("expected success"),
        }
    }

    #[test]
    fn transform_routine_failure_reports_error_kind() {
        let indices = Indices::new();
        let routine = Routine {
            kind: crate::ast::RoutineKind::Procedure,
            schema: None,
            name: "p".into(),
            params: vec![],
            return_type: None,
            declarations: vec![],
            body: vec![crate::ast::Stmt::Loop {
                label: None,
                kind: crate::ast::LoopKind::Basic,
                body: vec![],
            }],
            handlers: vec![],
        };
        let result = transform_routine("PROCEDURE p IS BEGIN LOOP END LOOP; END;", &routine, "hr", &indices);
        match result {
            TranspileResult::Failure { error_kind, .. } => {
                assert_eq!(error_kind, ErrorKind::UnsupportedConstruct);
            }
            TranspileResult::Success { .. } => panic!("expected failure"),
        }
    }
}
