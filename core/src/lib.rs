//! `plsql2pg-core` — the PL/SQL → PL/pgSQL transpiler core (spec.md §1).
//!
//! Consumes an externally-parsed Oracle SQL/PL-SQL tree (`ast::TranslationUnit`)
//! plus a read-only metadata snapshot (`indices::Indices`) and emits
//! semantically equivalent PostgreSQL source, or a fatal `TranspileError`.

pub mod ast;
pub mod context;
pub mod diagnostics;
pub mod driver;
pub mod env;
pub mod exceptions;
pub mod expr;
pub mod indices;
pub mod inline_types;
pub mod outer_join;
pub mod procedural;
pub mod rownum;
pub mod sql;
pub mod types;

pub use context::TransformationContext;
pub use diagnostics::{Diagnostic, Severity, TranspileError};
pub use driver::{dump_ast, transform_anonymous_block, transform_routine, transform_sql, ErrorKind, TranspileResult};
pub use env::Env;
pub use indices::Indices;
pub use inline_types::InlineTypeRegistry;
