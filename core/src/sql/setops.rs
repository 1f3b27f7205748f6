//! Set operations, `WITH`/CTE handling, and the CONNECT BY → recursive CTE
//! rewrite (spec.md §4.8, "Subquery set-ops", "WITH", "CONNECT BY").

use crate::ast::{ConnectBy, Cte, Expr, Query, QueryBlock, SetOp};
use crate::context::AliasTarget;
use crate::diagnostics::TranspileError;
use crate::env::Env;

pub fn set_op_keyword(op: SetOp) -> &'static str {
    match op {
        SetOp::Union => "UNION",
        SetOp::UnionAll => "UNION ALL",
        SetOp::Intersect => "INTERSECT",
        // mandatory MINUS -> EXCEPT rewrite (spec.md §4.8)
        SetOp::Minus => "EXCEPT",
    }
}

/// `WITH ctes AS (...) body`. Emits `WITH RECURSIVE` when any CTE body
/// references its own name (spec.md §4.8, "WITH").
pub fn rewrite_with(ctes: &[Cte], body: &Query, env: &mut Env) -> Result<String, TranspileError> {
    let recursive = ctes.iter().any(|c| cte_is_recursive(c));

    let mut rendered = Vec::with_capacity(ctes.len());
    for cte in ctes {
        env.ctx.register_cte(&cte.name);
        let cols = if cte.columns.is_empty() {
            String::new()
        } else {
            format!(" ({})", cte.columns.iter().map(|c| c.to_lowercase()).collect::<Vec<_>>().join(", "))
        };
        let inner = super::rewrite_query(&cte.query, env)?;
        rendered.push(format!("{}{} AS ({})", cte.name.to_lowercase(), cols, inner));
    }

    let body_sql = super::rewrite_query(body, env)?;
    let keyword = if recursive { "WITH RECURSIVE" } else { "WITH" };
    Ok(format!("{keyword} {} {body_sql}", rendered.join(", ")))
}

fn cte_is_recursive(cte: &Cte) -> bool {
    query_references_name(&cte.query, &cte.name)
}

fn query_references_name(query: &Query, name: &str) -> bool {
    match query {
        Query::Block(qb) => qb.from.iter().any(|t| table_ref_is_name(t, name)),
        Query::SetOp { left, right, .. } => {
            query_references_name(left, name) || query_references_name(right, name)
        }
        Query::With { body, .. } => query_references_name(body, name),
    }
}

fn table_ref_is_name(t: &crate::ast::TableRef, name: &str) -> bool {
    match t {
        crate::ast::TableRef::Base { name: n, .. } => {
            n.len() == 1 && n[0].eq_ignore_ascii_case(name)
        }
        crate::ast::TableRef::CteRef { name: n, .. } => n.eq_ignore_ascii_case(name),
        crate::ast::TableRef::Subquery { .. } => false,
    }
}

/// Rewrites a query block carrying a `CONNECT BY` clause into a recursive
/// CTE (spec.md §9 Open Question #3: reimplemented as an AST-level rewrite
/// rather than post-emission regex). `LEVEL` becomes the synthesized
/// `level` column; every distinct `SYS_CONNECT_BY_PATH(expr, sep)` call in
/// the select list becomes its own synthesized path column, threaded
/// through the anchor/recursive arms and renamed at every reference.
pub fn rewrite_connect_by(qb: &QueryBlock, connect_by: &ConnectBy, env: &mut Env) -> Result<String, TranspileError> {
    if qb.from.len() != 1 {
        return Err(TranspileError::UnsupportedConstruct(
            "CONNECT BY over more than one FROM table is not supported".to_string(),
        ));
    }
    let table = super::select::rewrite_from(&qb.from, env)?
        .ok_or_else(|| TranspileError::TransformationBug("CONNECT BY requires a real FROM table".to_string()))?;

    let cte_name = "connect_by_tree";
    let condition = crate::expr::rewrite(&connect_by.condition, env)?;

    let anchor_where = connect_by
        .start_with
        .as_ref()
        .map(|e| crate::expr::rewrite(e, env))
        .transpose()?
        .map(|w| format!(" WHERE {w}"))
        .unwrap_or_default();

    // Every distinct `SYS_CONNECT_BY_PATH(expr, sep)` call in the select
    // list becomes its own synthesized path column, carried through both
    // CTE arms and accumulated one level at a time; every other item passes
    // through unchanged in both arms (spec.md §4.8, §9 Open Question #3).
    let mut path_columns: Vec<(String, String, String)> = Vec::new();
    let mut anchor_items = Vec::with_capacity(qb.select_list.len());
    let mut recursive_items = Vec::with_capacity(qb.select_list.len());

    for item in &qb.select_list {
        if let Some((path_expr, sep_expr)) = sys_connect_by_path_args(&item.expr) {
            let expr_sql = crate::expr::rewrite(path_expr, env)?;
            let sep_sql = crate::expr::rewrite(sep_expr, env)?;
            let col_name = match path_columns.iter().find(|(_, e, s)| *e == expr_sql && *s == sep_sql) {
                Some((col, _, _)) => col.clone(),
                None => {
                    let col = item
                        .alias
                        .clone()
                        .map(|a| a.to_lowercase())
                        .unwrap_or_else(|| format!("connect_by_path_{}", path_columns.len() + 1));
                    path_columns.push((col.clone(), expr_sql.clone(), sep_sql.clone()));
                    col
                }
            };
            anchor_items.push(format!("{sep_sql} || {expr_sql} AS {col_name}"));
            recursive_items.push(format!("t.{col_name} || {sep_sql} || {expr_sql}"));
        } else {
            let rendered = super::select::rewrite_select_item(item, env)?;
            anchor_items.push(rendered.clone());
            recursive_items.push(rendered);
        }
    }

    let anchor = format!("SELECT {}, 1 AS level FROM {table}{anchor_where}", anchor_items.join(", "));
    let recursive = format!(
        "SELECT {}, t.level + 1 FROM {table} JOIN {cte_name} t ON {condition}",
        recursive_items.join(", ")
    );

    env.ctx.register_cte(cte_name);
    env.ctx.register_alias(cte_name, AliasTarget::Cte(cte_name.to_string()));

    let mut out = format!("WITH RECURSIVE {cte_name} AS ({anchor} UNION ALL {recursive}) SELECT * FROM {cte_name}");
    if let Some(w) = &qb.where_clause {
        out.push_str(" WHERE ");
        out.push_str(&crate::expr::rewrite(w, env)?);
    }
    Ok(out)
}

/// Matches a `SYS_CONNECT_BY_PATH(expr, sep)` call, returning its two
/// arguments, or `None` for any other expression.
fn sys_connect_by_path_args(expr: &Expr) -> Option<(&Expr, &Expr)> {
    match expr {
        Expr::Call { target, args } if args.len() == 2 => {
            let name = target.last()?;
            if name.eq_ignore_ascii_case("sys_connect_by_path") {
                Some((&args[0], &args[1]))
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{SelectItem, TableRef};
    use crate::context::TransformationContext;
    use crate::diagnostics::Diagnostic;
    use crate::indices::Indices;
    use crate::inline_types::InlineTypeRegistry;

    fn env_with<'a>(
        ctx: &'a mut TransformationContext,
        indices: &'a Indices,
        reg: &'a mut InlineTypeRegistry,
        diags: &'a mut Vec<Diagnostic>,
    ) -> Env<'a> {
        Env { ctx, indices, inline_types: reg, diagnostics: diags }
    }

    fn ident(parts: &[&str]) -> Expr {
        Expr::Ident(parts.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn sys_connect_by_path_gets_its_own_synthesized_column() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);

        let qb = QueryBlock {
            select_list: vec![
                SelectItem { expr: ident(&["empno"]), alias: None, is_star: false, star_qualifier: None },
                SelectItem {
                    expr: Expr::Call {
                        target: vec!["SYS_CONNECT_BY_PATH".into()],
                        args: vec![ident(&["ename"]), Expr::StringLiteral("/".into())],
                    },
                    alias: Some("path".into()),
                    is_star: false,
                    star_qualifier: None,
                },
            ],
            from: vec![TableRef::Base { name: vec!["emp".into()], alias: None }],
            where_clause: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            connect_by: None,
        };
        let connect_by = ConnectBy {
            condition: Expr::BinaryOp {
                op: crate::ast::BinaryOp::Eq,
                left: Box::new(ident(&["empno"])),
                right: Box::new(ident(&["t", "mgr"])),
                left_outer_marker: false,
                right_outer_marker: false,
            },
            start_with: Some(Expr::BinaryOp {
                op: crate::ast::BinaryOp::Eq,
                left: Box::new(ident(&["mgr"])),
                right: Box::new(Expr::NullLiteral),
                left_outer_marker: false,
                right_outer_marker: false,
            }),
            nocycle: false,
        };

        let out = rewrite_connect_by(&qb, &connect_by, &mut env).unwrap();
        assert!(out.contains("'/' || ename AS path"));
        assert!(out.contains("t.path || '/' || ename"));
        assert!(out.contains("1 AS level"));
        assert!(out.contains("t.level + 1"));
    }
}
