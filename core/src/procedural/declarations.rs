//! `DECLARE` section rewriting: variable/inline-type/exception/pragma/
//! cursor declarations (spec.md §4.9, "Variable declaration", "Exception
//! declarations and PRAGMA").

use crate::ast::{Declaration, TypeRef, VarDecl};
use crate::context::VariableInfo;
use crate::diagnostics::TranspileError;
use crate::env::Env;

/// Rewrites every declaration in order, registering variables/types/
/// exceptions/cursors into the context/registry as a side effect. Returns
/// the declaration lines to emit (exception names and PRAGMA links
/// register state but emit nothing themselves — Oracle's `DECLARE`
/// section has no PostgreSQL equivalent for a bare named condition).
pub fn rewrite_declarations(decls: &[Declaration], env: &mut Env) -> Result<Vec<String>, TranspileError> {
    let mut lines = Vec::new();
    for decl in decls {
        if let Some(line) = rewrite_one(decl, env)? {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn rewrite_one(decl: &Declaration, env: &mut Env) -> Result<Option<String>, TranspileError> {
    match decl {
        Declaration::Var(var) => rewrite_var_decl(var, env).map(Some),
        Declaration::InlineType(inline) => {
            env.inline_types.register(&inline.name, inline.clone());
            Ok(None)
        }
        Declaration::Exception(exc) => {
            env.ctx.declare_exception(&exc.name);
            Ok(None)
        }
        Declaration::Pragma(pragma) => {
            if let Some(diag) = env
                .ctx
                .link_exception_to_code(&pragma.exception_name, pragma.oracle_code)
            {
                env.push_diag(diag);
            }
            Ok(None)
        }
        Declaration::Cursor(cursor) => super::cursors::rewrite_cursor_decl(cursor, env).map(Some),
    }
}

fn rewrite_var_decl(var: &VarDecl, env: &mut Env) -> Result<String, TranspileError> {
    let name_lower = var.name.to_lowercase();

    let (pg_type, oracle_type_text, inline_type_name) = resolve_type_ref(&var.type_ref, &var.name, env)?;

    let constant_kw = if var.is_constant { "CONSTANT " } else { "" };
    let not_null_kw = if var.not_null { " NOT NULL" } else { "" };

    let default_sql = match (&var.default_expr, &inline_type_name) {
        (Some(expr), _) => {
            let rewritten = crate::expr::rewrite(expr, env)?;
            format!(" := {rewritten}")
        }
        // inline-typed variable with no explicit initializer gets the
        // empty-object default (spec.md §8 S5).
        (None, Some(_)) => " := '{}'::jsonb".to_string(),
        (None, None) => String::new(),
    };

    env.ctx.register_variable(
        &var.name,
        VariableInfo {
            oracle_type: oracle_type_text,
            pg_type: pg_type.clone(),
            is_constant: var.is_constant,
            inline_type: inline_type_name,
        },
    );

    Ok(format!("{name_lower} {constant_kw}{pg_type}{not_null_kw}{default_sql};"))
}

/// Resolves a `TypeRef` to `(pg_type, oracle_type_text, inline_type_name)`.
fn resolve_type_ref(
    type_ref: &TypeRef,
    declaring_name: &str,
    env: &mut Env,
) -> Result<(String, String, Option<String>), TranspileError> {
    match type_ref {
        TypeRef::Scalar(oracle_type) => {
            let (pg_type, diag) = crate::types::to_pg(oracle_type);
            if let Some(d) = diag {
                env.push_diag(d);
            }
            Ok((pg_type, oracle_type.clone(), None))
        }
        TypeRef::RowType(table) => {
            let (decl, diag) = env.inline_types.resolve_rowtype(table, env.indices);
            if let Some(d) = diag {
                env.push_diag(d);
            }
            match decl {
                Some(decl) => {
                    let type_name = decl.name.clone();
                    env.inline_types.register(&type_name, decl);
                    Ok(("jsonb".to_string(), format!("{table}%ROWTYPE"), Some(type_name)))
                }
                None => Ok(("text".to_string(), format!("{table}%ROWTYPE"), None)),
            }
        }
        TypeRef::PercentType(chain) => {
            let lookup = |name: &str| -> Option<String> {
                env.ctx.lookup_variable(name).map(|v| v.oracle_type.clone())
            };
            let (oracle_type, diag) =
                env.inline_types
                    .resolve_percent_type(chain, declaring_name, lookup, env.indices)?;
            if let Some(d) = diag {
                env.push_diag(d);
            }
            let (pg_type, diag2) = crate::types::to_pg(&oracle_type);
            if let Some(d) = diag2 {
                env.push_diag(d);
            }
            Ok((pg_type, oracle_type, None))
        }
        TypeRef::InlineRef(name) => match env.inline_types.resolve(name) {
            Some(_) => Ok(("jsonb".to_string(), name.clone(), Some(name.clone()))),
            None => {
                env.push_diag(crate::diagnostics::Diagnostic::warning(format!(
                    "unknown inline type '{name}', falling back to text"
                )));
                Ok(("text".to_string(), name.clone(), None))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{InlineFieldDef, InlineTypeCategory, InlineTypeDecl};
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
    fn inline_record_var_gets_jsonb_default() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        env.inline_types.register(
            "r",
            InlineTypeDecl {
                name: "r".into(),
                category: InlineTypeCategory::Record,
                element_type: None,
                fields: vec![InlineFieldDef { name: "x".into(), oracle_type: "NUMBER".into() }],
                size_limit: None,
                index_key_type: None,
            },
        );
        let decls = vec![Declaration::Var(VarDecl {
            name: "v".into(),
            type_ref: TypeRef::InlineRef("r".into()),
            is_constant: false,
            not_null: false,
            default_expr: None,
        })];
        let lines = rewrite_declarations(&decls, &mut env).unwrap();
        assert_eq!(lines[0], "v jsonb := '{}'::jsonb;");
    }

    #[test]
    fn scalar_var_with_default_expr() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let decls = vec![Declaration::Var(VarDecl {
            name: "n".into(),
            type_ref: TypeRef::Scalar("NUMBER".into()),
            is_constant: true,
            not_null: false,
            default_expr: Some(crate::ast::Expr::IntLiteral(7)),
        })];
        let lines = rewrite_declarations(&decls, &mut env).unwrap();
        assert_eq!(lines[0], "n CONSTANT numeric := 7;");
    }
}
