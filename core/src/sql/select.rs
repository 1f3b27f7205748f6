//! FROM / table-reference resolution and SELECT list emission (spec.md
//! §4.8, "SELECT list" and "FROM / table reference").

use crate::ast::{SelectItem, TableRef};
use crate::context::AliasTarget;
use crate::diagnostics::TranspileError;
use crate::env::Env;

/// Resolves and emits one `FROM` list. Registers every alias it
/// encounters in the context so later WHERE/SELECT references can
/// disambiguate.
pub fn rewrite_from(from: &[TableRef], env: &mut Env) -> Result<Option<String>, TranspileError> {
    if is_dual_only(from) {
        return Ok(None);
    }

    let mut parts = Vec::with_capacity(from.len());
    for t in from {
        parts.push(rewrite_table_ref(t, env)?);
    }
    Ok(Some(parts.join(", ")))
}

fn is_dual_only(from: &[TableRef]) -> bool {
    from.len() == 1
        && matches!(
            from.first(),
            Some(TableRef::Base { name, .. })
                if matches!(name.last().map(|s| s.to_uppercase()), Some(ref s) if s == "DUAL")
        )
}

pub fn rewrite_table_ref(t: &TableRef, env: &mut Env) -> Result<String, TranspileError> {
    match t {
        TableRef::Base { name, alias } => {
            let qualified = name.join(".").to_lowercase();
            let resolved = if env.ctx.is_cte(&name[0]) {
                name.join(".").to_lowercase()
            } else if let Some(syn) = env.indices.resolve_synonym(&qualified) {
                syn.to_string()
            } else if name.len() == 1 {
                format!("{}.{}", env.ctx.current_schema(), qualified)
            } else {
                qualified
            };

            let key = alias.clone().unwrap_or_else(|| name.last().unwrap().clone());
            if env.ctx.is_cte(&name[0]) {
                env.ctx.register_alias(&key, AliasTarget::Cte(resolved.clone()));
            } else {
                env.ctx.register_alias(&key, AliasTarget::Table(resolved.clone()));
            }

            Ok(match alias {
                Some(a) => format!("{resolved} {}", a.to_lowercase()),
                None => resolved,
            })
        }
        TableRef::Subquery { query, alias } => {
            let inner = super::rewrite_query(query, env)?;
            env.ctx.register_alias(alias, AliasTarget::Table(alias.to_lowercase()));
            Ok(format!("({inner}) {}", alias.to_lowercase()))
        }
        TableRef::CteRef { name, alias } => {
            let key = alias.clone().unwrap_or_else(|| name.clone());
            env.ctx.register_alias(&key, AliasTarget::Cte(name.to_lowercase()));
            Ok(match alias {
                Some(a) => format!("{} {}", name.to_lowercase(), a.to_lowercase()),
                None => name.to_lowercase(),
            })
        }
    }
}

/// Emits the SELECT list (spec.md §4.8, "SELECT list").
pub fn rewrite_select_list(items: &[SelectItem], env: &mut Env) -> Result<String, TranspileError> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(rewrite_select_item(item, env)?);
    }
    Ok(parts.join(", "))
}

pub(crate) fn rewrite_select_item(item: &SelectItem, env: &mut Env) -> Result<String, TranspileError> {
    if item.is_star {
        return Ok(match &item.star_qualifier {
            Some(q) => format!("{}.*", q.to_lowercase()),
            None => "*".to_string(),
        });
    }
    let expr = crate::expr::rewrite(&item.expr, env)?;
    Ok(match &item.alias {
        Some(a) => format!("{expr} AS {}", a.to_lowercase()),
        None => expr,
    })
}
