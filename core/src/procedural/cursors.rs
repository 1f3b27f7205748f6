//! Cursor declarations, OPEN/FETCH/CLOSE tracking injection, and LOOP
//! variants (spec.md §4.8 "Cursor FOR", §4.9 "LOOP", "Cursor declaration",
//! "OPEN / FETCH / CLOSE").

use crate::ast::{CursorDecl, DmlKind, Expr, ExceptionHandler, LoopKind, Param, Stmt};
use crate::context::TransformationContext;
use crate::diagnostics::TranspileError;
use crate::env::Env;

/// `CURSOR n [(p t, ...)] [RETURN r] IS select` → `n CURSOR [(p pg_t,
/// ...)] FOR select`.
pub fn rewrite_cursor_decl(decl: &CursorDecl, env: &mut Env) -> Result<String, TranspileError> {
    env.ctx.note_cursor_seen(&decl.name);
    let query_sql = crate::sql::rewrite_query(&decl.query, env)?;
    let params = rewrite_params(&decl.params, env);
    Ok(format!(
        "{} CURSOR{} FOR {query_sql};",
        decl.name.to_lowercase(),
        params
    ))
}

fn rewrite_params(params: &[Param], env: &Env) -> String {
    if params.is_empty() {
        return String::new();
    }
    let rendered = params
        .iter()
        .map(|p| {
            let (pg_type, _) = crate::types::to_pg(&p.oracle_type);
            format!("{} {pg_type}", p.name.to_lowercase())
        })
        .collect::<Vec<_>>()
        .join(", ");
    let _ = env;
    format!(" ({rendered})")
}

/// `OPEN c;` — injects `c__isopen := TRUE;` immediately after when `c`'s
/// tracking was triggered (spec.md §4.9 invariant: tracking variables are
/// declared exactly when any attribute of that cursor was used).
pub fn rewrite_open(name: &str, args: &[Expr], env: &mut Env) -> Result<String, TranspileError> {
    env.ctx.note_cursor_seen(name);
    let lower = name.to_lowercase();
    let mut rendered_args = Vec::with_capacity(args.len());
    for a in args {
        rendered_args.push(crate::expr::rewrite(a, env)?);
    }
    let arg_suffix = if rendered_args.is_empty() {
        String::new()
    } else {
        format!("({})", rendered_args.join(", "))
    };
    let mut out = format!("OPEN {lower}{arg_suffix};");
    if env.ctx.cursor_needs_tracking(name) {
        out.push_str(&format!(" {lower}__isopen := TRUE;"));
    }
    Ok(out)
}

/// `FETCH c INTO ...;` — injects the found/rowcount bump when tracked.
pub fn rewrite_fetch(name: &str, into: &[Expr], env: &mut Env) -> Result<String, TranspileError> {
    let lower = name.to_lowercase();
    let mut rendered = Vec::with_capacity(into.len());
    for e in into {
        rendered.push(crate::expr::rewrite(e, env)?);
    }
    let mut out = format!("FETCH {lower} INTO {};", rendered.join(", "));
    if env.ctx.cursor_needs_tracking(name) {
        out.push_str(&format!(
            " {lower}__found := FOUND; {lower}__rowcount := {lower}__rowcount + 1;"
        ));
    }
    Ok(out)
}

/// `CLOSE c;` — injects `c__isopen := FALSE;` when tracked.
pub fn rewrite_close(name: &str, env: &Env) -> String {
    let lower = name.to_lowercase();
    let mut out = format!("CLOSE {lower};");
    if env.ctx.cursor_needs_tracking(name) {
        out.push_str(&format!(" {lower}__isopen := FALSE;"));
    }
    out
}

/// The three declarations injected at the enclosing body for a cursor
/// whose tracking was triggered (spec.md §8 S6, property 8). The caller
/// (`procedural::declarations`) calls this once per declared/opened
/// cursor after the whole body has been rewritten, since tracking-need is
/// only known once every reference has been visited.
pub fn tracking_declarations(cursor: &str) -> String {
    let lower = cursor.to_lowercase();
    format!(
        "{lower}__found boolean; {lower}__rowcount integer := 0; {lower}__isopen boolean := FALSE;"
    )
}

/// Walks a whole body (and nested blocks/handlers) up front to register
/// every `cursor%ATTR` use before any statement is rewritten. Needed
/// because `OPEN`/`FETCH`/`CLOSE` each decide whether to emit their
/// tracking companion statement based on `cursor_needs_tracking`, but the
/// attribute read that turns tracking on may appear in a *later* statement
/// of the same body than the `OPEN` (spec.md §8 S6) — a single left-to-right
/// pass can't see that far ahead, so this runs first.
pub fn prescan_cursor_attribute_uses(
    stmts: &[Stmt],
    handlers: &[ExceptionHandler],
    ctx: &mut TransformationContext,
) {
    scan_stmts(stmts, ctx);
    for h in handlers {
        scan_stmts(&h.body, ctx);
    }
}

fn scan_stmts(stmts: &[Stmt], ctx: &mut TransformationContext) {
    for s in stmts {
        match s {
            Stmt::Assign(a) => {
                scan_expr(&a.target, ctx);
                scan_expr(&a.value, ctx);
            }
            Stmt::If { branches, else_branch } => {
                for (cond, body) in branches {
                    scan_expr(cond, ctx);
                    scan_stmts(body, ctx);
                }
                if let Some(b) = else_branch {
                    scan_stmts(b, ctx);
                }
            }
            Stmt::CaseStmt { subject, whens, else_branch } => {
                if let Some(s) = subject {
                    scan_expr(s, ctx);
                }
                for (cond, body) in whens {
                    scan_expr(cond, ctx);
                    scan_stmts(body, ctx);
                }
                if let Some(b) = else_branch {
                    scan_stmts(b, ctx);
                }
            }
            Stmt::Loop { kind, body, .. } => {
                match kind {
                    LoopKind::NumericRange { lo, hi, .. } => {
                        scan_expr(lo, ctx);
                        scan_expr(hi, ctx);
                    }
                    LoopKind::While(cond) => scan_expr(cond, ctx),
                    LoopKind::CursorForSelect { .. } | LoopKind::CursorForNamed { .. } | LoopKind::Basic => {}
                }
                scan_stmts(body, ctx);
            }
            Stmt::Exit { when, .. } | Stmt::Continue { when, .. } => {
                if let Some(w) = when {
                    scan_expr(w, ctx);
                }
            }
            Stmt::CursorOpen { args, .. } => args.iter().for_each(|a| scan_expr(a, ctx)),
            Stmt::CursorFetch { into, .. } => into.iter().for_each(|e| scan_expr(e, ctx)),
            Stmt::SelectInto { into, .. } => into.iter().for_each(|e| scan_expr(e, ctx)),
            Stmt::Dml(kind) => scan_dml(kind, ctx),
            Stmt::RaiseApplicationError { code, message } => {
                scan_expr(code, ctx);
                scan_expr(message, ctx);
            }
            Stmt::Call { args, into, .. } => {
                args.iter().for_each(|a| scan_expr(a, ctx));
                if let Some(i) = into {
                    scan_expr(i, ctx);
                }
            }
            Stmt::Block { body, handlers, .. } => {
                scan_stmts(body, ctx);
                for h in handlers {
                    scan_stmts(&h.body, ctx);
                }
            }
            Stmt::Null | Stmt::CursorClose { .. } | Stmt::Raise { .. } => {}
        }
    }
}

fn scan_dml(kind: &DmlKind, ctx: &mut TransformationContext) {
    match kind {
        DmlKind::Insert { values, .. } => values.iter().for_each(|v| scan_expr(v, ctx)),
        DmlKind::Update { assignments, where_clause, .. } => {
            for a in assignments {
                scan_expr(&a.value, ctx);
            }
            if let Some(w) = where_clause {
                scan_expr(w, ctx);
            }
        }
        DmlKind::Delete { where_clause, .. } => {
            if let Some(w) = where_clause {
                scan_expr(w, ctx);
            }
        }
    }
}

/// Finds `cursor%ATTR` reads nested anywhere inside one expression.
/// Subqueries (`Exists`/`Quantified`) aren't walked into — a cursor
/// attribute inside a nested SQL statement isn't a construct any of the
/// scenarios this reader supports can produce.
fn scan_expr(expr: &Expr, ctx: &mut TransformationContext) {
    match expr {
        Expr::CursorAttribute { cursor, .. } => ctx.register_cursor_attribute_use(cursor),
        Expr::Call { args, .. } | Expr::Aggregate { args, .. } => {
            args.iter().for_each(|a| scan_expr(a, ctx));
        }
        Expr::BinaryOp { left, right, .. } => {
            scan_expr(left, ctx);
            scan_expr(right, ctx);
        }
        Expr::UnaryOp { operand, .. } => scan_expr(operand, ctx),
        Expr::Concat(parts) => parts.iter().for_each(|p| scan_expr(p, ctx)),
        Expr::Case { subject, whens, else_ } => {
            if let Some(s) = subject {
                scan_expr(s, ctx);
            }
            for (cond, result) in whens {
                scan_expr(cond, ctx);
                scan_expr(result, ctx);
            }
            if let Some(e) = else_ {
                scan_expr(e, ctx);
            }
        }
        Expr::Window { func, partition_by, order_by, .. } => {
            scan_expr(func, ctx);
            partition_by.iter().for_each(|p| scan_expr(p, ctx));
            order_by.iter().for_each(|o| scan_expr(&o.expr, ctx));
        }
        Expr::Ident(_)
        | Expr::IntLiteral(_)
        | Expr::NumLiteral(_)
        | Expr::StringLiteral(_)
        | Expr::NullLiteral
        | Expr::BindVar(_)
        | Expr::Exists(_)
        | Expr::Quantified { .. }
        | Expr::InlineFieldAccess { .. }
        | Expr::Rownum
        | Expr::Sysdate
        | Expr::RownumPredicate { .. } => {}
    }
}

/// Rewrites one LOOP statement's header + body. `WHILE`, bare `LOOP`, and
/// `FOR r IN named_cursor LOOP` are fatal (spec.md §4.9).
pub fn rewrite_loop(
    label: Option<&str>,
    kind: &LoopKind,
    body: &[Stmt],
    env: &mut Env,
) -> Result<String, TranspileError> {
    let label_prefix = label.map(|l| format!("<<{l}>> ")).unwrap_or_default();
    let (header, needs_record_decl) = rewrite_loop_header(kind, env)?;
    let body_sql = super::rewrite_stmts(body, env)?;
    let record_note = needs_record_decl.unwrap_or_default();
    Ok(format!("{label_prefix}{header} {record_note}{body_sql} END LOOP;"))
}

fn rewrite_loop_header(kind: &LoopKind, env: &mut Env) -> Result<(String, Option<String>), TranspileError> {
    match kind {
        LoopKind::NumericRange { var, reverse, lo, hi } => {
            let lo_sql = crate::expr::rewrite(lo, env)?;
            let hi_sql = crate::expr::rewrite(hi, env)?;
            let var_lower = var.to_lowercase();
            // REVERSE swaps bounds: `FOR i IN REVERSE a..b` ->
            // `FOR i IN REVERSE b..a` (spec.md §4.8, "Numeric FOR REVERSE").
            let (first, second) = if *reverse { (hi_sql, lo_sql) } else { (lo_sql, hi_sql) };
            let reverse_kw = if *reverse { "REVERSE " } else { "" };
            Ok((format!("FOR {var_lower} IN {reverse_kw}{first}..{second} LOOP"), None))
        }
        LoopKind::CursorForSelect { record_var, query } => {
            env.ctx.register_loop_record(record_var);
            let query_sql = crate::sql::rewrite_query(query, env)?;
            Ok((
                format!("FOR {} IN ({query_sql}) LOOP", record_var.to_lowercase()),
                None,
            ))
        }
        LoopKind::CursorForNamed { cursor_name, .. } => Err(TranspileError::UnsupportedConstruct(format!(
            "FOR loop over named cursor '{cursor_name}' is not supported; rewrite as a FOR loop over an inline SELECT"
        ))),
        LoopKind::While(_) => Err(TranspileError::UnsupportedConstruct(
            "WHILE loops are not supported; rewrite using EXIT WHEN inside a basic LOOP is also unsupported — use a bounded FOR loop".to_string(),
        )),
        LoopKind::Basic => Err(TranspileError::UnsupportedConstruct(
            "bare LOOP ... END LOOP is not supported; use a bounded FOR loop with EXIT WHEN".to_string(),
        )),
    }
}
