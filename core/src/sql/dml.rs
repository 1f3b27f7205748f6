//! INSERT / UPDATE / DELETE rewriting (spec.md §4.8, "INSERT / UPDATE /
//! DELETE").

use crate::ast::{Assignment, DmlKind};
use crate::diagnostics::TranspileError;
use crate::env::Env;

pub fn rewrite(kind: &DmlKind, env: &mut Env) -> Result<String, TranspileError> {
    match kind {
        DmlKind::Insert { table, columns, values } => rewrite_insert(table, columns, values, env),
        DmlKind::Update { table, alias, assignments, where_clause } => {
            rewrite_update(table, alias.as_deref(), assignments, where_clause.as_ref(), env)
        }
        DmlKind::Delete { table, alias, where_clause } => {
            rewrite_delete(table, alias.as_deref(), where_clause.as_ref(), env)
        }
    }
}

fn qualify_target(table: &[String], env: &Env) -> String {
    let qualified = table.join(".").to_lowercase();
    if table.len() == 1 {
        format!("{}.{}", env.ctx.current_schema(), qualified)
    } else {
        qualified
    }
}

fn rewrite_insert(
    table: &[String],
    columns: &[String],
    values: &[crate::ast::Expr],
    env: &mut Env,
) -> Result<String, TranspileError> {
    let target = qualify_target(table, env);
    let cols = columns.iter().map(|c| c.to_lowercase()).collect::<Vec<_>>().join(", ");
    let mut rewritten_values = Vec::with_capacity(values.len());
    for v in values {
        rewritten_values.push(crate::expr::rewrite(v, env)?);
    }
    Ok(format!(
        "INSERT INTO {target} ({cols}) VALUES ({})",
        rewritten_values.join(", ")
    ))
}

fn rewrite_update(
    table: &[String],
    alias: Option<&str>,
    assignments: &[Assignment],
    where_clause: Option<&crate::ast::Expr>,
    env: &mut Env,
) -> Result<String, TranspileError> {
    let target = qualify_target(table, env);
    if let Some(a) = alias {
        env.ctx
            .register_alias(a, crate::context::AliasTarget::Table(target.clone()));
    }

    let mut sets = Vec::with_capacity(assignments.len());
    for a in assignments {
        let lhs = crate::expr::rewrite(&a.target, env)?;
        let rhs = crate::expr::rewrite(&a.value, env)?;
        sets.push(format!("{lhs} = {rhs}"));
    }

    let alias_suffix = alias.map(|a| format!(" {}", a.to_lowercase())).unwrap_or_default();
    let mut out = format!("UPDATE {target}{alias_suffix} SET {}", sets.join(", "));
    if let Some(w) = where_clause {
        out.push_str(" WHERE ");
        out.push_str(&crate::expr::rewrite(w, env)?);
    }
    Ok(out)
}

/// Always emits `DELETE FROM` (Oracle permits bare `DELETE table`; spec.md
/// §4.8 makes the `FROM` mandatory in the emitted form).
fn rewrite_delete(
    table: &[String],
    alias: Option<&str>,
    where_clause: Option<&crate::ast::Expr>,
    env: &mut Env,
) -> Result<String, TranspileError> {
    let target = qualify_target(table, env);
    if let Some(a) = alias {
        env.ctx
            .register_alias(a, crate::context::AliasTarget::Table(target.clone()));
    }

    let alias_suffix = alias.map(|a| format!(" {}", a.to_lowercase())).unwrap_or_default();
    let mut out = format!("DELETE FROM {target}{alias_suffix}");
    if let Some(w) = where_clause {
        out.push_str(" WHERE ");
        out.push_str(&crate::expr::rewrite(w, env)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
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

    #[test]
    fn delete_always_emits_delete_from() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let out = rewrite(
            &DmlKind::Delete { table: vec!["emp".into()], alias: None, where_clause: None },
            &mut env,
        )
        .unwrap();
        assert_eq!(out, "DELETE FROM hr.emp");
    }

    #[test]
    fn insert_qualifies_bare_table_name() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let out = rewrite(
            &DmlKind::Insert {
                table: vec!["emp".into()],
                columns: vec!["id".into()],
                values: vec![Expr::IntLiteral(1)],
            },
            &mut env,
        )
        .unwrap();
        assert_eq!(out, "INSERT INTO hr.emp (id) VALUES (1)");
    }
}
