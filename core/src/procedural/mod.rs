//! C9 — Procedural Rewriter (spec.md §4.9): declarations, statements,
//! cursors, exception handlers, and routine/block emission.

pub mod cursors;
pub mod declarations;
pub mod raise;
mod statements;

use crate::ast::{ExceptionHandler, ParamMode, Routine, RoutineKind};
use crate::diagnostics::TranspileError;
use crate::env::Env;
use crate::exceptions::standard_exception_condition;

pub use statements::rewrite_stmts;

/// `CREATE OR REPLACE FUNCTION schema.name(params) RETURNS ... LANGUAGE
/// plpgsql AS $$ ... $$;` (spec.md §4.9, "Routine emission").
pub fn rewrite_routine(routine: &Routine, env: &mut Env) -> Result<String, TranspileError> {
    let schema = routine.schema.clone().unwrap_or_else(|| env.ctx.current_schema().to_string());
    let name = routine.name.to_lowercase();
    let params = rewrite_params(routine, env);
    let returns = match (routine.kind, &routine.return_type) {
        (RoutineKind::Function, Some(oracle_type)) => {
            let (pg_type, diag) = crate::types::to_pg(oracle_type);
            if let Some(d) = diag {
                env.push_diag(d);
            }
            pg_type
        }
        (RoutineKind::Function, None) => {
            env.push_diag(crate::diagnostics::Diagnostic::warning(format!(
                "function '{name}' has no declared return type, assuming void"
            )));
            "void".to_string()
        }
        (RoutineKind::Procedure, _) => "void".to_string(),
    };

    let indices = env.indices;
    let inline_types = &mut *env.inline_types;
    let diagnostics = &mut *env.diagnostics;
    let body = env.ctx.with_scope(move |ctx| {
        let mut inner = Env { ctx, indices, inline_types, diagnostics };
        rewrite_body(&routine.declarations, &routine.body, &routine.handlers, &mut inner)
    })?;

    Ok(format!(
        "CREATE OR REPLACE FUNCTION {schema}.{name}({params}) RETURNS {returns} LANGUAGE plpgsql AS $$ {body} $$;"
    ))
}

fn rewrite_params(routine: &Routine, env: &mut Env) -> String {
    let mut parts = Vec::new();
    for p in &routine.params {
        if p.mode == ParamMode::Out {
            // Pure OUT parameters are excluded from the signature (spec.md
            // §4.9: "exclude pure OUT from the signature").
            continue;
        }
        let (pg_type, diag) = crate::types::to_pg(&p.oracle_type);
        if let Some(d) = diag {
            env.push_diag(d);
        }
        let mode_kw = match p.mode {
            ParamMode::In => "",
            ParamMode::InOut => "INOUT ",
            ParamMode::Out => unreachable!("filtered above"),
        };
        parts.push(format!("{mode_kw}{} {pg_type}", p.name.to_lowercase()));
    }
    parts.join(", ")
}

/// Shared by `rewrite_routine` and `TranslationUnit::AnonymousBlock`:
/// `[DECLARE decls] BEGIN stmts [EXCEPTION handlers] END;`, with the cursor
/// tracking declarations and cursor FOR-loop `RECORD` declarations injected
/// after every other declaration once the whole body has been visited and
/// tracking-need is fully known (spec.md §8 property 8, §4.9).
pub fn rewrite_body(
    declarations: &[crate::ast::Declaration],
    stmts: &[crate::ast::Stmt],
    handlers: &[ExceptionHandler],
    env: &mut Env,
) -> Result<String, TranspileError> {
    cursors::prescan_cursor_attribute_uses(stmts, handlers, env.ctx);
    let mut decl_lines = declarations::rewrite_declarations(declarations, env)?;
    let stmts_sql = rewrite_stmts(stmts, env)?;

    for cursor in env.ctx.tracked_cursors() {
        decl_lines.push(cursors::tracking_declarations(&cursor));
    }
    for rec in env.ctx.loop_records() {
        decl_lines.push(format!("{rec} RECORD;"));
    }

    let declare_section = if decl_lines.is_empty() {
        String::new()
    } else {
        format!("DECLARE {} ", decl_lines.join(" "))
    };

    let handlers_section = if handlers.is_empty() {
        String::new()
    } else {
        format!(" EXCEPTION {}", rewrite_handlers(handlers, env)?)
    };

    Ok(format!("{declare_section}BEGIN {stmts_sql}{handlers_section} END;"))
}

pub fn rewrite_block(
    declarations: &[crate::ast::Declaration],
    body: &[crate::ast::Stmt],
    handlers: &[ExceptionHandler],
    env: &mut Env,
) -> Result<String, TranspileError> {
    let indices = env.indices;
    let inline_types = &mut *env.inline_types;
    let diagnostics = &mut *env.diagnostics;
    env.ctx.with_scope(move |ctx| {
        let mut inner = Env { ctx, indices, inline_types, diagnostics };
        rewrite_body(declarations, body, handlers, &mut inner)
    })
}

fn rewrite_handlers(handlers: &[ExceptionHandler], env: &mut Env) -> Result<String, TranspileError> {
    let mut parts = Vec::with_capacity(handlers.len());
    for h in handlers {
        let body_sql = rewrite_stmts(&h.body, env)?;
        let when_clause = if h.is_others {
            "OTHERS".to_string()
        } else {
            let mut names = Vec::with_capacity(h.names.len());
            for n in &h.names {
                names.push(rewrite_handler_name(n, env)?);
            }
            names.join(" OR ")
        };
        parts.push(format!("WHEN {when_clause} THEN {body_sql}"));
    }
    Ok(parts.join(" "))
}

fn rewrite_handler_name(name: &str, env: &mut Env) -> Result<String, TranspileError> {
    if let Some(condition) = standard_exception_condition(name) {
        return Ok(condition.to_string());
    }
    // PostgreSQL `WHEN` clauses name conditions, not raw SQLSTATEs; a
    // user-defined exception has no condition name, so it's matched by its
    // assigned SQLSTATE via `sqlstate '<code>'`.
    let sqlstate = env.ctx.lookup_sqlstate(name)?;
    Ok(format!("sqlstate '{sqlstate}'"))
}
