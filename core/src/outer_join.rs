//! C5 — Outer-Join Analyzer: discovers Oracle `(+)` conditions over one
//! query block's FROM/WHERE and builds a join plan (spec.md §4.5).

use std::collections::{BTreeMap, HashSet};

use crate::ast::{BinaryOp, Expr, TableRef};
use crate::diagnostics::TranspileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

/// One `(left_key, right_key, side, [condition_nodes])` entry, keyed by the
/// ordered pair of table keys that share it (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct OuterJoinEntry {
    pub left_key: String,
    pub right_key: String,
    pub side: JoinSide,
    pub conditions: Vec<Expr>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OuterJoinContext {
    pub entries: Vec<OuterJoinEntry>,
    pub participating_tables: HashSet<String>,
    /// WHERE conditions with no `(+)` marker at all, retained as regular
    /// predicates.
    pub plain_conditions: Vec<Expr>,
}

impl OuterJoinContext {
    pub fn is_trivial(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn table_key(t: &TableRef) -> Option<String> {
    match t {
        TableRef::Base { name, alias } => Some(
            alias
                .clone()
                .unwrap_or_else(|| name.last().cloned().unwrap_or_default())
                .to_lowercase(),
        ),
        TableRef::Subquery { alias, .. } => Some(alias.to_lowercase()),
        TableRef::CteRef { name, alias } => Some(alias.clone().unwrap_or_else(|| name.clone()).to_lowercase()),
    }
}

/// Walks one side of a binary comparison to find which, if any, table key
/// the `(+)` marker on that side would apply to. We only need the key of
/// the opposite side's column reference to group conditions by table pair,
/// so this reads the first identifier segment of a dot-chain expression,
/// recursing into a wrapping function call (e.g. `TRUNC(b.d(+))`) to reach
/// the underlying column when present.
fn leading_key(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident(chain) if !chain.is_empty() => Some(chain[0].to_lowercase()),
        Expr::Call { args, .. } => args.first().and_then(leading_key),
        _ => None,
    }
}

/// Analyzes FROM + WHERE of one query block. Collects table keys, then
/// walks top-level AND-ed WHERE conditions classifying `(+)`-marked
/// comparisons.
pub fn analyze(from: &[TableRef], where_clause: Option<&Expr>) -> Result<OuterJoinContext, TranspileError> {
    let mut ctx = OuterJoinContext::default();
    for t in from {
        if let Some(key) = table_key(t) {
            ctx.participating_tables.insert(key);
        }
    }

    let Some(where_clause) = where_clause else {
        return Ok(ctx);
    };

    if contains_outer_marker(where_clause) && top_level_has_or_with_marker(where_clause) {
        return Err(TranspileError::SemanticViolation(
            "Oracle (+) outer-join marker cannot be combined with OR at the top level".to_string(),
        ));
    }

    // `BTreeMap`, not `HashMap`: emission order of `entries` below must be
    // stable across runs (spec.md §8 property 1), same reasoning as
    // `context.rs`'s `cursor_attribute_uses`.
    let mut grouped: BTreeMap<(String, String), OuterJoinEntry> = BTreeMap::new();
    for cond in split_and(where_clause) {
        match cond {
            Expr::BinaryOp {
                left,
                right,
                left_outer_marker,
                right_outer_marker,
                ..
            } if *left_outer_marker || *right_outer_marker => {
                if *left_outer_marker && *right_outer_marker {
                    return Err(TranspileError::SemanticViolation(
                        "(+) cannot mark both sides of the same comparison".to_string(),
                    ));
                }
                // marker on the right operand -> LEFT join (the table owning
                // the right operand is the optional side); marker on the
                // left operand -> RIGHT join (spec.md §4.5).
                let side = if *right_outer_marker { JoinSide::Left } else { JoinSide::Right };
                let left_table = leading_key(left).unwrap_or_default();
                let right_table = leading_key(right).unwrap_or_default();
                let pair = (left_table.clone(), right_table.clone());
                let entry = grouped.entry(pair).or_insert_with(|| OuterJoinEntry {
                    left_key: left_table,
                    right_key: right_table,
                    side,
                    conditions: Vec::new(),
                });
                if entry.side != side {
                    return Err(TranspileError::SemanticViolation(format!(
                        "mixed LEFT/RIGHT (+) markers for table pair ({}, {})",
                        entry.left_key, entry.right_key
                    )));
                }
                entry.conditions.push(cond.clone());
            }
            other => ctx.plain_conditions.push(other.clone()),
        }
    }

    ctx.entries = grouped.into_values().collect();
    Ok(ctx)
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

fn contains_outer_marker(expr: &Expr) -> bool {
    match expr {
        Expr::BinaryOp { left_outer_marker, right_outer_marker, left, right, .. } => {
            *left_outer_marker
                || *right_outer_marker
                || contains_outer_marker(left)
                || contains_outer_marker(right)
        }
        Expr::UnaryOp { operand, .. } => contains_outer_marker(operand),
        _ => false,
    }
}

/// Rejects `(+)` used anywhere beneath a top-level OR (spec.md §4.5 step 4).
fn top_level_has_or_with_marker(expr: &Expr) -> bool {
    match expr {
        Expr::BinaryOp { op: BinaryOp::Or, left, right, .. } => {
            contains_outer_marker(left) || contains_outer_marker(right)
        }
        Expr::BinaryOp { op: BinaryOp::And, left, right, .. } => {
            top_level_has_or_with_marker(left) || top_level_has_or_with_marker(right)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(parts: &[&str]) -> Expr {
        Expr::Ident(parts.iter().map(|s| s.to_string()).collect())
    }

    fn cmp(left: Expr, right: Expr, right_marker: bool) -> Expr {
        Expr::BinaryOp {
            op: BinaryOp::Eq,
            left: Box::new(left),
            right: Box::new(right),
            left_outer_marker: false,
            right_outer_marker: right_marker,
        }
    }

    #[test]
    fn classifies_left_join_from_right_side_marker() {
        let from = vec![
            TableRef::Base { name: vec!["a".into()], alias: None },
            TableRef::Base { name: vec!["b".into()], alias: None },
        ];
        let where_clause = cmp(ident(&["a", "id"]), ident(&["b", "id"]), true);
        let ctx = analyze(&from, Some(&where_clause)).unwrap();
        assert_eq!(ctx.entries.len(), 1);
        assert_eq!(ctx.entries[0].side, JoinSide::Left);
    }

    #[test]
    fn rejects_mixed_sides_for_same_pair() {
        let from = vec![
            TableRef::Base { name: vec!["a".into()], alias: None },
            TableRef::Base { name: vec!["b".into()], alias: None },
        ];
        let c1 = cmp(ident(&["a", "id"]), ident(&["b", "id"]), true);
        let c2 = Expr::BinaryOp {
            op: BinaryOp::And,
            left: Box::new(c1),
            right: Box::new(cmp(ident(&["a", "x"]), ident(&["b", "y"]), false).flip_to_left_marker()),
            left_outer_marker: false,
            right_outer_marker: false,
        };
        let err = analyze(&from, Some(&c2)).unwrap_err();
        assert!(matches!(err, TranspileError::SemanticViolation(_)));
    }

    #[test]
    fn plain_conditions_without_marker_pass_through() {
        let from = vec![TableRef::Base { name: vec!["emp".into()], alias: None }];
        let where_clause = Expr::BinaryOp {
            op: BinaryOp::Eq,
            left: Box::new(ident(&["dept"])),
            right: Box::new(Expr::IntLiteral(10)),
            left_outer_marker: false,
            right_outer_marker: false,
        };
        let ctx = analyze(&from, Some(&where_clause)).unwrap();
        assert!(ctx.entries.is_empty());
        assert_eq!(ctx.plain_conditions.len(), 1);
    }

    trait FlipMarker {
        fn flip_to_left_marker(self) -> Expr;
    }
    impl FlipMarker for Expr {
        fn flip_to_left_marker(self) -> Expr {
            match self {
                Expr::BinaryOp { op, left, right, .. } => Expr::BinaryOp {
                    op,
                    left,
                    right,
                    left_outer_marker: true,
                    right_outer_marker: false,
                },
                other => other,
            }
        }
    }
}
