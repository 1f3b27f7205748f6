//! C6 — ROWNUM Analyzer: detects simple `ROWNUM <= N` / `ROWNUM < N`
//! patterns for LIMIT rewrite (spec.md §4.6).

use crate::ast::{BinaryOp, Expr, RownumCmp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RownumContext {
    pub has_simple_limit: bool,
    pub limit_value: i64,
    pub operator: RownumCmp,
}

impl RownumContext {
    fn none() -> Self {
        RownumContext { has_simple_limit: false, limit_value: 0, operator: RownumCmp::Le }
    }
}

/// Looks for a top-level (AND-ed, not nested under OR or any other
/// expression) `ROWNUM <= N` / `ROWNUM < N` / mirrored `N >= ROWNUM` /
/// `N > ROWNUM` with `N` a positive integer literal. Returns the context to
/// push and, when a match fires, the matched predicate node so the caller
/// can drop it from WHERE.
pub fn analyze(where_clause: Option<&Expr>) -> (RownumContext, Option<Expr>) {
    let Some(where_clause) = where_clause else {
        return (RownumContext::none(), None);
    };

    for cond in split_and(where_clause) {
        if let Some((cmp, n)) = match_rownum_predicate(cond) {
            let limit_value = match cmp {
                RownumCmp::Le => n,
                RownumCmp::Lt => n - 1,
            };
            return (
                RownumContext { has_simple_limit: true, limit_value, operator: cmp },
                Some(cond.clone()),
            );
        }
    }
    (RownumContext::none(), None)
}

fn split_and(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::BinaryOp { op: BinaryOp::And, left, right, .. } => {
            let mut out = split_and(left);
            out.extend(split_and(right));
            out
        }
        other => vec![other],
    }
}

fn positive_int_literal(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::IntLiteral(n) if *n > 0 => Some(*n),
        _ => None,
    }
}

fn is_rownum(expr: &Expr) -> bool {
    matches!(expr, Expr::Rownum)
}

fn match_rownum_predicate(expr: &Expr) -> Option<(RownumCmp, i64)> {
    match expr {
        Expr::BinaryOp { op: BinaryOp::Le, left, right, .. } if is_rownum(left) => {
            positive_int_literal(right).map(|n| (RownumCmp::Le, n))
        }
        Expr::BinaryOp { op: BinaryOp::Lt, left, right, .. } if is_rownum(left) => {
            positive_int_literal(right).map(|n| (RownumCmp::Lt, n))
        }
        // mirrored: N >= ROWNUM behaves like ROWNUM <= N
        Expr::BinaryOp { op: BinaryOp::Ge, left, right, .. } if is_rownum(right) => {
            positive_int_literal(left).map(|n| (RownumCmp::Le, n))
        }
        // N > ROWNUM behaves like ROWNUM < N
        Expr::BinaryOp { op: BinaryOp::Gt, left, right, .. } if is_rownum(right) => {
            positive_int_literal(left).map(|n| (RownumCmp::Lt, n))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(n: i64) -> Expr {
        Expr::IntLiteral(n)
    }

    fn binop(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
            left_outer_marker: false,
            right_outer_marker: false,
        }
    }

    #[test]
    fn rownum_le_yields_limit_n() {
        let where_clause = binop(BinaryOp::Le, Expr::Rownum, lit(5));
        let (ctx, matched) = analyze(Some(&where_clause));
        assert!(ctx.has_simple_limit);
        assert_eq!(ctx.limit_value, 5);
        assert!(matched.is_some());
    }

    #[test]
    fn rownum_lt_yields_limit_n_minus_one() {
        let where_clause = binop(BinaryOp::Lt, Expr::Rownum, lit(5));
        let (ctx, _) = analyze(Some(&where_clause));
        assert_eq!(ctx.limit_value, 4);
    }

    #[test]
    fn mirrored_form_n_ge_rownum_matches() {
        let where_clause = binop(BinaryOp::Ge, lit(5), Expr::Rownum);
        let (ctx, _) = analyze(Some(&where_clause));
        assert!(ctx.has_simple_limit);
        assert_eq!(ctx.limit_value, 5);
    }

    #[test]
    fn non_integer_bound_does_not_match() {
        let where_clause = binop(BinaryOp::Le, Expr::Rownum, Expr::StringLiteral("x".into()));
        let (ctx, _) = analyze(Some(&where_clause));
        assert!(!ctx.has_simple_limit);
    }

    #[test]
    fn combined_with_or_does_not_match() {
        let rownum_pred = binop(BinaryOp::Le, Expr::Rownum, lit(5));
        let where_clause = binop(BinaryOp::Or, rownum_pred, lit(1));
        let (ctx, _) = analyze(Some(&where_clause));
        assert!(!ctx.has_simple_limit);
    }
}
