//! C8 — SQL Statement Rewriter (spec.md §4.8).

pub mod dml;
pub mod select;
pub mod setops;

use std::collections::HashSet;

use crate::ast::{BinaryOp, Expr, NullsClause2, OrderByItem, Query, QueryBlock};
use crate::diagnostics::TranspileError;
use crate::env::Env;
use crate::{outer_join, rownum};

/// Top-level query dispatch: block / set-op / WITH.
pub fn rewrite_query(query: &Query, env: &mut Env) -> Result<String, TranspileError> {
    match query {
        Query::Block(qb) => rewrite_query_block(qb, env),
        Query::SetOp { op, left, right } => {
            let l = rewrite_query(left, env)?;
            let r = rewrite_query(right, env)?;
            Ok(format!("{l} {} {r}", setops::set_op_keyword(*op)))
        }
        Query::With { ctes, body } => setops::rewrite_with(ctes, body, env),
    }
}

/// One query block: analyzer pre-pass (C5/C6) strictly precedes the
/// transformation visit (spec.md §5, "Ordering"); both contexts are pushed
/// before any child is visited and popped on every exit path via the
/// context's own `with_*` methods (spec.md Invariant 4).
fn rewrite_query_block(qb: &QueryBlock, env: &mut Env) -> Result<String, TranspileError> {
    if let Some(connect_by) = &qb.connect_by {
        return setops::rewrite_connect_by(qb, connect_by, env);
    }

    let outer_ctx = outer_join::analyze(&qb.from, qb.where_clause.as_ref())?;
    let (rownum_ctx, matched_rownum) = rownum::analyze(qb.where_clause.as_ref());
    let remaining_where = build_remaining_where(&outer_ctx, matched_rownum.as_ref());
    let from_is_ansi_join = !outer_ctx.is_trivial();

    let indices = env.indices;
    let inline_types = &mut *env.inline_types;
    let diagnostics = &mut *env.diagnostics;
    let outer_ctx_for_stack = outer_ctx.clone();

    env.ctx.with_outer_join_context(outer_ctx_for_stack, move |ctx| {
        ctx.with_rownum_context(rownum_ctx, move |ctx| {
            let mut inner_env = Env { ctx, indices, inline_types, diagnostics };
            build_query_block_sql(qb, &outer_ctx, from_is_ansi_join, remaining_where, rownum_ctx, &mut inner_env)
        })
    })
}

/// Non-outer-join WHERE predicates after rewriting: the input set minus
/// the `(+)`-marked predicates minus the matched ROWNUM predicate (spec.md
/// §8 property 2) — exactly `outer_ctx.plain_conditions` with the matched
/// ROWNUM node filtered out, since the analyzer already separated every
/// `(+)`-marked top-level conjunct into its entries.
fn build_remaining_where(
    outer_ctx: &outer_join::OuterJoinContext,
    matched_rownum: Option<&Expr>,
) -> Option<Expr> {
    outer_ctx
        .plain_conditions
        .iter()
        .filter(|c| Some(*c) != matched_rownum)
        .cloned()
        .reduce(|acc, next| Expr::BinaryOp {
            op: BinaryOp::And,
            left: Box::new(acc),
            right: Box::new(next),
            left_outer_marker: false,
            right_outer_marker: false,
        })
}

fn build_query_block_sql(
    qb: &QueryBlock,
    outer_ctx: &outer_join::OuterJoinContext,
    from_is_ansi_join: bool,
    remaining_where: Option<Expr>,
    rownum_ctx: rownum::RownumContext,
    env: &mut Env,
) -> Result<String, TranspileError> {
    let select_list = select::rewrite_select_list(&qb.select_list, env)?;

    let from_sql = if from_is_ansi_join {
        Some(render_ansi_joins(&qb.from, outer_ctx, env)?)
    } else {
        select::rewrite_from(&qb.from, env)?
    };

    let mut out = format!("SELECT {select_list}");
    if let Some(from) = from_sql {
        out.push_str(" FROM ");
        out.push_str(&from);
    }
    if let Some(w) = &remaining_where {
        out.push_str(" WHERE ");
        out.push_str(&crate::expr::rewrite(w, env)?);
    }
    if !qb.group_by.is_empty() {
        let mut parts = Vec::with_capacity(qb.group_by.len());
        for g in &qb.group_by {
            parts.push(crate::expr::rewrite(g, env)?);
        }
        out.push_str(" GROUP BY ");
        out.push_str(&parts.join(", "));
    }
    if let Some(h) = &qb.having {
        out.push_str(" HAVING ");
        out.push_str(&crate::expr::rewrite(h, env)?);
    }
    if !qb.order_by.is_empty() {
        out.push_str(" ORDER BY ");
        out.push_str(&rewrite_order_by_items(&qb.order_by, env)?);
    }
    if rownum_ctx.has_simple_limit {
        out.push_str(&format!(" LIMIT {}", rownum_ctx.limit_value));
    }

    Ok(out)
}

/// Renders FROM as ANSI `LEFT/RIGHT JOIN ... ON ...` once a non-trivial
/// outer-join context was found (spec.md §4.8, "Query block"). Each entry is
/// paired with the FROM table named by its `left_key`/`right_key` — whichever
/// of the two isn't already part of the accumulated join chain — rather than
/// by position, since entries are grouped (and ordered) by table-pair key,
/// not by the original positional order of the FROM list. Tables not covered
/// by any outer-join entry are comma-joined onto the result.
fn render_ansi_joins(
    from: &[crate::ast::TableRef],
    outer_ctx: &outer_join::OuterJoinContext,
    env: &mut Env,
) -> Result<String, TranspileError> {
    let mut key_to_sql = std::collections::HashMap::new();
    let mut base_parts = Vec::with_capacity(from.len());
    for t in from {
        let sql = select::rewrite_table_ref(t, env)?;
        if let Some(key) = outer_join::table_key(t) {
            key_to_sql.insert(key, sql.clone());
        }
        base_parts.push(sql);
    }

    let mut out = base_parts.first().cloned().unwrap_or_default();
    let mut consumed: HashSet<String> = HashSet::new();
    if let Some(key) = from.first().and_then(outer_join::table_key) {
        consumed.insert(key);
    }

    for entry in &outer_ctx.entries {
        let join_kw = match entry.side {
            outer_join::JoinSide::Left => "LEFT JOIN",
            outer_join::JoinSide::Right => "RIGHT JOIN",
        };
        let target_key = if consumed.contains(&entry.left_key) {
            entry.right_key.clone()
        } else {
            entry.left_key.clone()
        };
        let target = key_to_sql.get(&target_key).cloned().unwrap_or_else(|| target_key.clone());
        consumed.insert(target_key);
        let mut conds = Vec::with_capacity(entry.conditions.len());
        for c in &entry.conditions {
            conds.push(crate::expr::rewrite(c, env)?);
        }
        out.push_str(&format!(" {join_kw} {target} ON {}", conds.join(" AND ")));
    }

    for t in from {
        if let Some(key) = outer_join::table_key(t) {
            if consumed.insert(key.clone()) {
                if let Some(sql) = key_to_sql.get(&key) {
                    out.push_str(&format!(", {sql}"));
                }
            }
        }
    }

    Ok(out)
}

/// ORDER BY rendering. Mandatory rewrite: `DESC` without an explicit NULLS
/// clause emits `NULLS FIRST` (spec.md §4.8, §8 property 4).
pub fn rewrite_order_by_items(items: &[OrderByItem], env: &mut Env) -> Result<String, TranspileError> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        let expr = crate::expr::rewrite(&item.expr, env)?;
        let dir = if item.desc { " DESC" } else { "" };
        let nulls = match (item.desc, item.nulls) {
            (true, None) => " NULLS FIRST",
            (_, Some(NullsClause2::First)) => " NULLS FIRST",
            (_, Some(NullsClause2::Last)) => " NULLS LAST",
            (false, None) => "",
        };
        parts.push(format!("{expr}{dir}{nulls}"));
    }
    Ok(parts.join(", "))
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
    fn dual_only_from_is_omitted() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let qb = QueryBlock {
            select_list: vec![SelectItem { expr: Expr::IntLiteral(1), alias: None, is_star: false, star_qualifier: None }],
            from: vec![TableRef::Base { name: vec!["dual".into()], alias: None }],
            where_clause: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            connect_by: None,
        };
        let out = rewrite_query_block(&qb, &mut env).unwrap();
        assert_eq!(out, "SELECT 1");
    }

    #[test]
    fn desc_without_nulls_gets_nulls_first() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let items = vec![OrderByItem { expr: ident(&["empno"]), desc: true, nulls: None }];
        let out = rewrite_order_by_items(&items, &mut env).unwrap();
        assert_eq!(out, "empno DESC NULLS FIRST");
    }

    #[test]
    fn outer_join_marker_removed_from_where_and_ansi_join_emitted() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let where_clause = Expr::BinaryOp {
            op: BinaryOp::Eq,
            left: Box::new(ident(&["a", "id"])),
            right: Box::new(ident(&["b", "id"])),
            left_outer_marker: false,
            right_outer_marker: true,
        };
        let qb = QueryBlock {
            select_list: vec![SelectItem { expr: ident(&["a", "id"]), alias: None, is_star: false, star_qualifier: None }],
            from: vec![
                TableRef::Base { name: vec!["a".into()], alias: None },
                TableRef::Base { name: vec!["b".into()], alias: None },
            ],
            where_clause: Some(where_clause),
            group_by: vec![],
            having: None,
            order_by: vec![],
            connect_by: None,
        };
        let out = rewrite_query_block(&qb, &mut env).unwrap();
        assert!(out.contains("LEFT JOIN"));
        assert!(!out.contains("WHERE"));
    }

    #[test]
    fn rownum_limit_survives_into_emitted_sql() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let where_clause = Expr::BinaryOp {
            op: BinaryOp::And,
            left: Box::new(Expr::BinaryOp {
                op: BinaryOp::Eq,
                left: Box::new(ident(&["dept"])),
                right: Box::new(Expr::IntLiteral(10)),
                left_outer_marker: false,
                right_outer_marker: false,
            }),
            right: Box::new(Expr::BinaryOp {
                op: BinaryOp::Le,
                left: Box::new(Expr::Rownum),
                right: Box::new(Expr::IntLiteral(5)),
                left_outer_marker: false,
                right_outer_marker: false,
            }),
            left_outer_marker: false,
            right_outer_marker: false,
        };
        let qb = QueryBlock {
            select_list: vec![SelectItem { expr: ident(&["empno"]), alias: None, is_star: false, star_qualifier: None }],
            from: vec![TableRef::Base { name: vec!["emp".into()], alias: None }],
            where_clause: Some(where_clause),
            group_by: vec![],
            having: None,
            order_by: vec![OrderByItem { expr: ident(&["empno"]), desc: true, nulls: None }],
            connect_by: None,
        };
        let out = rewrite_query_block(&qb, &mut env).unwrap();
        assert_eq!(
            out,
            "SELECT empno FROM hr.emp WHERE dept = 10 ORDER BY empno DESC NULLS FIRST LIMIT 5"
        );
    }
}
