//! C7 — Expression Rewriter (spec.md §4.7).

mod functions;

use crate::ast::{BinaryOp, CursorAttr, DotChain, Expr, NullsClause, Quantifier, UnaryOp};
use crate::context::AliasTarget;
use crate::diagnostics::{Diagnostic, TranspileError};
use crate::env::Env;
use crate::sql;

/// Rewrites one expression to PostgreSQL text.
pub fn rewrite(expr: &Expr, env: &mut Env) -> Result<String, TranspileError> {
    match expr {
        Expr::Ident(chain) => rewrite_ident(chain, env),
        Expr::Call { target, args } => rewrite_call(target, args, env),
        Expr::IntLiteral(n) => Ok(n.to_string()),
        Expr::NumLiteral(s) => Ok(s.clone()),
        Expr::StringLiteral(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        Expr::NullLiteral => Ok("NULL".to_string()),
        Expr::BindVar(Some(name)) => Ok(name.clone()),
        Expr::BindVar(None) => Err(TranspileError::UnsupportedConstruct(
            "positional bind parameters (:1, ?) are not supported; use named bind variables"
                .to_string(),
        )),
        Expr::BinaryOp { op, left, right, .. } => rewrite_binary(*op, left, right, env),
        Expr::UnaryOp { op, operand } => rewrite_unary(*op, operand, env),
        Expr::Concat(parts) => rewrite_concat(parts, env),
        Expr::Case { subject, whens, else_ } => rewrite_case_expr(subject.as_deref(), whens, else_.as_deref(), env),
        Expr::Exists(query) => Ok(format!("EXISTS ({})", sql::rewrite_query(query, env)?)),
        Expr::Quantified { quantifier, subquery } => {
            let q = sql::rewrite_query(subquery, env)?;
            Ok(format!("{} ({q})", rewrite_quantifier(*quantifier)))
        }
        Expr::Aggregate { name, distinct, args } => rewrite_aggregate(name, *distinct, args, env),
        Expr::Window { func, partition_by, order_by, frame, respect_or_ignore_nulls } => {
            rewrite_window(func, partition_by, order_by, frame.as_deref(), *respect_or_ignore_nulls, env)
        }
        Expr::CursorAttribute { cursor, attr } => rewrite_cursor_attribute(cursor, *attr, env),
        Expr::InlineFieldAccess { var, path } => rewrite_inline_field_access(var, path, env),
        Expr::Rownum => Ok("ROWNUM".to_string()), // only reached if analyzer didn't remove it
        Expr::Sysdate => Ok("CURRENT_TIMESTAMP".to_string()),
        Expr::RownumPredicate { .. } => Ok(String::new()),
    }
}

/// Identifiers / qualified names (spec.md §4.7 bullet 1).
fn rewrite_ident(chain: &DotChain, env: &mut Env) -> Result<String, TranspileError> {
    if chain.is_empty() {
        return Err(TranspileError::TransformationBug("empty identifier dot-chain".to_string()));
    }

    // single-segment: variable, or bare column/name
    if chain.len() == 1 {
        return Ok(chain[0].to_lowercase());
    }

    // `seq.NEXTVAL`/`seq.CURRVAL` arrive as a plain trailing-segment dot-chain,
    // not a `Call` node (spec.md §4.7 bullet 1.i) — detect it here.
    let last = chain.last().unwrap();
    if last.eq_ignore_ascii_case("nextval") || last.eq_ignore_ascii_case("currval") {
        return rewrite_sequence_pseudo_column(chain, env);
    }

    // inline-typed variable field read (spec.md §4.7 bullet "Inline-type
    // field read"), only when not on the LHS of an assignment (handled
    // separately by procedural::rewrite_assignment).
    if !env.ctx.is_assignment_target() {
        if let Some(var) = env.ctx.lookup_variable(&chain[0]) {
            if var.inline_type.is_some() {
                return rewrite_inline_field_access(&chain[0], &chain[1..], env);
            }
        }
    }

    Ok(qualify_dot_chain(chain))
}

fn qualify_dot_chain(chain: &DotChain) -> String {
    chain.iter().map(|s| s.to_lowercase()).collect::<Vec<_>>().join(".")
}

/// `a.b.c(...)` / bare `f(...)` call dispatch (spec.md §4.7 bullet 1.ii and
/// "Simple function call").
fn rewrite_call(target: &DotChain, args: &[Expr], env: &mut Env) -> Result<String, TranspileError> {
    let last = target.last().expect("call target never empty").clone();

    // NEXTVAL / CURRVAL are always no-arg trailing segments on a dot-chain,
    // never an actual call node in this AST, but a caller may still route
    // them here; handle defensively.
    if args.is_empty() && (last.eq_ignore_ascii_case("nextval") || last.eq_ignore_ascii_case("currval")) {
        return rewrite_sequence_pseudo_column(target, env);
    }

    let rewritten_args: Vec<String> = args
        .iter()
        .map(|a| rewrite(a, env))
        .collect::<Result<_, _>>()?;

    if target.len() == 1 {
        if let Some(rewritten) = functions::rewrite_call(&last, &rewritten_args) {
            return Ok(rewritten);
        }
        // qualify unqualified user function names with the current schema
        return Ok(format!("{}.{}({})", env.ctx.current_schema(), last.to_lowercase(), rewritten_args.join(", ")));
    }

    // a.b(...) or a.b.c(...): disambiguate type-member method vs package function
    if target.len() >= 2 {
        let a = &target[0];
        let penultimate = &target[target.len() - 2];
        let is_type_member = env.ctx.resolve_alias(a).is_some()
            && {
                let owner_chain = &target[..target.len() - 1];
                let qualified_col = owner_chain.join(".");
                env.indices
                    .column_type(&qualified_col, penultimate)
                    .map(|info| info.is_custom_type)
                    .unwrap_or(false)
                    || env.indices.has_type_method(penultimate, &last)
            }
            && env.indices.has_type_method(penultimate, &last);

        if is_type_member {
            let receiver = target[..target.len() - 1].join(".").to_lowercase();
            return Ok(format!("{}__{}({}{})", penultimate.to_lowercase(), last.to_lowercase(), receiver, prefix_args(&rewritten_args)));
        }

        return rewrite_package_function_call(target, &last, &rewritten_args, env);
    }

    Ok(format!("{}({})", last.to_lowercase(), rewritten_args.join(", ")))
}

fn prefix_args(args: &[String]) -> String {
    if args.is_empty() {
        String::new()
    } else {
        format!(", {}", args.join(", "))
    }
}

/// `pkg.fn(args)` -> `pkg__fn(args)`, preserving a cross-schema prefix only
/// when the resolved schema differs from the current schema (spec.md §4.7
/// bullet 1.ii).
fn rewrite_package_function_call(
    target: &DotChain,
    last: &str,
    rewritten_args: &[String],
    env: &mut Env,
) -> Result<String, TranspileError> {
    let qualified = target.join(".").to_lowercase();
    let (schema, package) = match target.len() {
        2 => (None, target[0].clone()),
        _ => (Some(target[target.len() - 3].clone()), target[target.len() - 2].clone()),
    };

    let resolved_schema = if let Some(resolved) = env.indices.resolve_synonym(&qualified) {
        resolved.rsplit_once('.').map(|(s, _)| s.to_string())
    } else {
        schema.clone()
    };

    let flattened = format!("{}__{}", package.to_lowercase(), last.to_lowercase());
    let call = format!("{}({})", flattened, rewritten_args.join(", "));

    match resolved_schema {
        Some(s) if s.to_lowercase() != env.ctx.current_schema().to_lowercase() => {
            Ok(format!("{}.{}", s.to_lowercase(), call))
        }
        _ => Ok(call),
    }
}

/// NEXTVAL/CURRVAL dot-chain (spec.md §4.7 bullet 1.i, spec.md §8 property 3).
fn rewrite_sequence_pseudo_column(target: &DotChain, env: &mut Env) -> Result<String, TranspileError> {
    let func = target.last().unwrap().to_lowercase();
    let seq_ref = &target[..target.len() - 1];
    let qualified = seq_ref.join(".").to_lowercase();

    let resolved = if seq_ref.len() == 1 {
        if let Some(syn) = env.indices.resolve_synonym(&qualified) {
            syn.to_string()
        } else {
            format!("{}.{}", env.ctx.current_schema(), qualified)
        }
    } else {
        qualified
    };

    Ok(format!("{func}('{resolved}')"))
}

fn rewrite_binary(op: BinaryOp, left: &Expr, right: &Expr, env: &mut Env) -> Result<String, TranspileError> {
    // ROWNUM context suppression: if the enclosing ROWNUM context already
    // matched this exact sub-expression, drop it from the output (spec.md
    // §4.7 bullet "Logical ops").
    if let Some(rownum_ctx) = env.ctx.current_rownum_context() {
        if rownum_ctx.has_simple_limit && is_matched_rownum_predicate(op, left, right) {
            return Ok(String::new());
        }
    }

    match op {
        BinaryOp::Pow => Ok(format!("({} ^ {})", rewrite(left, env)?, rewrite(right, env)?)),
        BinaryOp::Mod => Ok(format!("MOD({}, {})", rewrite(left, env)?, rewrite(right, env)?)),
        BinaryOp::Add | BinaryOp::Sub => rewrite_arithmetic_or_date(op, left, right, env),
        BinaryOp::NotEq => Ok(format!("({} <> {})", rewrite(left, env)?, rewrite(right, env)?)),
        BinaryOp::Eq | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            let l = rewrite(left, env)?;
            let r = rewrite(right, env)?;
            Ok(format!("{} {} {}", l, op_symbol(op), r))
        }
        BinaryOp::And | BinaryOp::Or => {
            let l = rewrite(left, env)?;
            let r = rewrite(right, env)?;
            if l.is_empty() {
                return Ok(r);
            }
            if r.is_empty() {
                return Ok(l);
            }
            Ok(format!("{} {} {}", l, op_symbol(op), r))
        }
        BinaryOp::Mul | BinaryOp::Div => {
            Ok(format!("({} {} {})", rewrite(left, env)?, op_symbol(op), rewrite(right, env)?))
        }
    }
}

fn is_matched_rownum_predicate(op: BinaryOp, left: &Expr, right: &Expr) -> bool {
    use crate::ast::Expr::Rownum;
    matches!(
        (op, left, right),
        (BinaryOp::Le | BinaryOp::Lt, Rownum, _) | (BinaryOp::Ge | BinaryOp::Gt, _, Rownum)
    )
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Pow => "^",
        BinaryOp::Eq => "=",
        BinaryOp::NotEq => "<>",
        BinaryOp::Lt => "<",
        BinaryOp::Gt => ">",
        BinaryOp::Le => "<=",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "AND",
        BinaryOp::Or => "OR",
        BinaryOp::Mod => "MOD",
    }
}

/// `+`/`-` where at least one operand is DATE-typed uses the (heuristic,
/// Open Question #1) type evaluator to pick a date-arithmetic rewrite;
/// otherwise passes through as plain arithmetic.
fn rewrite_arithmetic_or_date(op: BinaryOp, left: &Expr, right: &Expr, env: &mut Env) -> Result<String, TranspileError> {
    let left_is_date = expr_is_date_like(left, env);
    let right_is_date = expr_is_date_like(right, env);

    let l = rewrite(left, env)?;
    let r = rewrite(right, env)?;
    let sym = op_symbol(op);

    if left_is_date && !right_is_date {
        // default Oracle `date + n` is a day-add
        return Ok(format!("({l} {sym} ({r} || ' days')::interval)"));
    }
    if right_is_date && !left_is_date && op == BinaryOp::Add {
        return Ok(format!("({r} {sym} ({l} || ' days')::interval)"));
    }

    Ok(format!("({l} {sym} {r})"))
}

fn expr_is_date_like(expr: &Expr, env: &Env) -> bool {
    match expr {
        Expr::Sysdate => true,
        Expr::Ident(chain) if chain.len() == 1 => env
            .ctx
            .lookup_variable(&chain[0])
            .is_some_and(|v| crate::types::is_date_like(&v.oracle_type)),
        Expr::Ident(chain) if chain.len() >= 2 => {
            let table = chain[..chain.len() - 1].join(".");
            let column = chain.last().unwrap();
            env.indices
                .column_type(&table, column)
                .is_some_and(|info| crate::types::is_date_like(&info.oracle_type))
        }
        _ => false,
    }
}

fn rewrite_unary(op: UnaryOp, operand: &Expr, env: &mut Env) -> Result<String, TranspileError> {
    let o = rewrite(operand, env)?;
    Ok(match op {
        UnaryOp::Not => format!("NOT {o}"),
        UnaryOp::IsNull => format!("{o} IS NULL"),
        UnaryOp::IsNotNull => format!("{o} IS NOT NULL"),
        UnaryOp::IsNan => format!("{o} = 'NaN'"),
        UnaryOp::IsInfinite => format!("{o} = 'Infinity'"),
        UnaryOp::Neg => format!("(-{o})"),
    })
}

/// `a || b` -> `CONCAT(a, b)` (spec.md §4.7 bullet "Concatenation"; §8
/// property 5).
fn rewrite_concat(parts: &[Expr], env: &mut Env) -> Result<String, TranspileError> {
    let rewritten: Vec<String> = parts.iter().map(|p| rewrite(p, env)).collect::<Result<_, _>>()?;
    Ok(format!("CONCAT({})", rewritten.join(", ")))
}

/// Both CASE expressions and CASE statements emit `END`/`END CASE`
/// respectively (spec.md §4.7 hard requirement); this is the expression
/// form, which always emits `END` — the statement form lives in
/// `procedural::rewrite_case_statement`.
fn rewrite_case_expr(subject: Option<&Expr>, whens: &[(Expr, Expr)], else_: Option<&Expr>, env: &mut Env) -> Result<String, TranspileError> {
    let mut out = String::from("CASE");
    if let Some(s) = subject {
        out.push(' ');
        out.push_str(&rewrite(s, env)?);
    }
    for (cond, result) in whens {
        out.push_str(" WHEN ");
        out.push_str(&rewrite(cond, env)?);
        out.push_str(" THEN ");
        out.push_str(&rewrite(result, env)?);
    }
    if let Some(e) = else_ {
        out.push_str(" ELSE ");
        out.push_str(&rewrite(e, env)?);
    }
    out.push_str(" END");
    Ok(out)
}

fn rewrite_quantifier(q: Quantifier) -> &'static str {
    match q {
        // SOME -> ANY (spec.md §4.7 "Quantified")
        Quantifier::Some | Quantifier::Any => "ANY",
        Quantifier::All => "ALL",
    }
}

fn rewrite_aggregate(name: &str, distinct: bool, args: &[Expr], env: &mut Env) -> Result<String, TranspileError> {
    let rewritten: Vec<String> = args.iter().map(|a| rewrite(a, env)).collect::<Result<_, _>>()?;
    let distinct_kw = if distinct { "DISTINCT " } else { "" };
    Ok(format!("{}({}{})", name.to_uppercase(), distinct_kw, rewritten.join(", ")))
}

fn rewrite_window(
    func: &Expr,
    partition_by: &[Expr],
    order_by: &[crate::ast::OrderByItem],
    frame: Option<&str>,
    nulls: Option<NullsClause>,
    env: &mut Env,
) -> Result<String, TranspileError> {
    let func_str = rewrite(func, env)?;
    let nulls_suffix = match nulls {
        Some(NullsClause::RespectNulls) => " RESPECT NULLS",
        Some(NullsClause::IgnoreNulls) => " IGNORE NULLS",
        None => "",
    };

    let mut over = String::new();
    if !partition_by.is_empty() {
        let parts: Vec<String> = partition_by.iter().map(|e| rewrite(e, env)).collect::<Result<_, _>>()?;
        over.push_str("PARTITION BY ");
        over.push_str(&parts.join(", "));
    }
    if !order_by.is_empty() {
        if !over.is_empty() {
            over.push(' ');
        }
        over.push_str("ORDER BY ");
        over.push_str(&sql::rewrite_order_by_items(order_by, env)?);
    }
    if let Some(f) = frame {
        if !over.is_empty() {
            over.push(' ');
        }
        over.push_str(f);
    }

    Ok(format!("{func_str}{nulls_suffix} OVER ({over})"))
}

/// Explicit and implicit cursor attributes (spec.md §4.7 "Cursor
/// attributes"). Every use marks the cursor as needing tracking.
fn rewrite_cursor_attribute(cursor: &str, attr: CursorAttr, env: &mut Env) -> Result<String, TranspileError> {
    env.ctx.register_cursor_attribute_use(cursor);
    let lower = cursor.to_lowercase();
    if lower == "sql" {
        return Ok(match attr {
            CursorAttr::Found => "(sql__rowcount > 0)".to_string(),
            CursorAttr::NotFound => "(sql__rowcount = 0)".to_string(),
            CursorAttr::RowCount => "sql__rowcount".to_string(),
            CursorAttr::IsOpen => "FALSE".to_string(),
        });
    }
    Ok(match attr {
        CursorAttr::Found => format!("{lower}__found"),
        CursorAttr::NotFound => format!("NOT {lower}__found"),
        CursorAttr::RowCount => format!("{lower}__rowcount"),
        CursorAttr::IsOpen => format!("{lower}__isopen"),
    })
}

/// Inline-type field read (spec.md §4.7): scalar leaf ->
/// `(v->>'f')::pg_type`, nested object -> `v->'f'`.
fn rewrite_inline_field_access(var: &str, path: &[String], env: &mut Env) -> Result<String, TranspileError> {
    let var_lower = var.to_lowercase();
    if path.is_empty() {
        return Ok(var_lower);
    }

    let inline_type_name = env
        .ctx
        .lookup_variable(var)
        .and_then(|v| v.inline_type.clone());

    let mut access = var_lower;
    let mut current_type = inline_type_name;
    for (i, field) in path.iter().enumerate() {
        let is_leaf = i == path.len() - 1;
        let field_decl = current_type
            .as_deref()
            .and_then(|t| env.inline_types.resolve(t))
            .and_then(|decl| decl.fields.iter().find(|f| f.name.eq_ignore_ascii_case(field)));

        match field_decl {
            Some(f) if is_leaf => {
                let (pg_type, diag) = crate::types::to_pg(&f.oracle_type);
                if let Some(d) = diag {
                    env.push_diag(d);
                }
                access = format!("({access}->>'{field}')::{pg_type}");
            }
            Some(_) => {
                access = format!("{access}->'{field}'");
                current_type = None; // nested field types not modeled beyond one level
            }
            None => {
                // Open Question #2: fall back to jsonb rewrite even without
                // proof the variable is jsonb-backed (spec.md §9, DESIGN.md).
                env.push_diag(Diagnostic::warning(format!(
                    "inline field access '{var}.{}' could not be proven jsonb-typed; emitting a jsonb access anyway",
                    path.join(".")
                )));
                if is_leaf {
                    access = format!("({access}->>'{field}')::text");
                } else {
                    access = format!("{access}->'{field}'");
                }
            }
        }
    }
    Ok(access)
}

/// Resolves whether `name` (the first segment of a dot-chain already known
/// to be an alias) points at a table or a CTE — used by `sql::from` but
/// exposed here since it is pure alias-map plumbing shared with
/// expressions that qualify a column by its table alias.
pub fn alias_points_to_cte(name: &str, env: &Env) -> bool {
    matches!(env.ctx.resolve_alias(name), Some(AliasTarget::Cte(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TransformationContext;
    use crate::indices::Indices;
    use crate::inline_types::InlineTypeRegistry;

    fn env_with<'a>(
        ctx: &'a mut TransformationContext,
        indices: &'a Indices,
        inline_types: &'a mut InlineTypeRegistry,
        diags: &'a mut Vec<Diagnostic>,
    ) -> Env<'a> {
        Env { ctx, indices, inline_types, diagnostics: diags }
    }

    #[test]
    fn concat_becomes_concat_call() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let e = Expr::Concat(vec![
            Expr::StringLiteral("id=".into()),
            Expr::Ident(vec!["seq".into(), "currval".into()]),
        ]);
        // currval handled via Call normally; here just check plain concat shape
        let e2 = Expr::Concat(vec![Expr::StringLiteral("a".into()), Expr::StringLiteral("b".into())]);
        let out = rewrite(&e2, &mut env).unwrap();
        assert_eq!(out, "CONCAT('a', 'b')");
        let _ = e;
    }

    #[test]
    fn not_equal_variants_normalize_to_ne() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let e = Expr::BinaryOp {
            op: BinaryOp::NotEq,
            left: Box::new(Expr::Ident(vec!["a".into()])),
            right: Box::new(Expr::Ident(vec!["b".into()])),
            left_outer_marker: false,
            right_outer_marker: false,
        };
        assert_eq!(rewrite(&e, &mut env).unwrap(), "(a <> b)");
    }

    #[test]
    fn sequence_nextval_currval() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let out = rewrite_call(&vec!["seq".into(), "NEXTVAL".into()], &[], &mut env).unwrap();
        assert_eq!(out, "nextval('hr.seq')");
    }

    #[test]
    fn case_expression_ends_with_end_not_end_case() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let e = Expr::Case {
            subject: None,
            whens: vec![(Expr::IntLiteral(1), Expr::StringLiteral("one".into()))],
            else_: None,
        };
        let out = rewrite(&e, &mut env).unwrap();
        assert!(out.trim_end().ends_with("END"));
        assert!(!out.contains("END CASE"));
    }

    #[test]
    fn positional_bind_var_is_fatal() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let err = rewrite(&Expr::BindVar(None), &mut env).unwrap_err();
        assert!(matches!(err, TranspileError::UnsupportedConstruct(_)));
    }
}
