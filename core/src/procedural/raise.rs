//! `RAISE` / `RAISE_APPLICATION_ERROR` rewriting (spec.md §4.9, "RAISE",
//! "RAISE_APPLICATION_ERROR").

use crate::ast::Expr;
use crate::diagnostics::TranspileError;
use crate::env::Env;
use crate::exceptions::standard_exception_condition;

/// Bare `RAISE;` re-raise, `RAISE name;` for a user exception or a
/// standard Oracle name.
pub fn rewrite_raise(name: Option<&str>, env: &mut Env) -> Result<String, TranspileError> {
    let Some(name) = name else {
        return Ok("RAISE;".to_string());
    };

    if let Some(condition) = standard_exception_condition(name) {
        return Ok(format!("RAISE EXCEPTION USING ERRCODE = '{condition}';"));
    }

    let sqlstate = env.ctx.lookup_sqlstate(name)?;
    Ok(format!("RAISE EXCEPTION USING ERRCODE = '{sqlstate}';"))
}

/// `RAISE_APPLICATION_ERROR(-200NN, 'message')` → `RAISE EXCEPTION
/// 'message' USING ERRCODE = 'P00NN', HINT = 'Original Oracle error code:
/// -200NN'` (spec.md §4.9, spec.md §8 S4). A non-literal code falls back
/// to a generic auto-assigned SQLSTATE and includes the expression text in
/// the hint instead of the numeric code.
pub fn rewrite_raise_application_error(
    code: &Expr,
    message: &Expr,
    env: &mut Env,
) -> Result<String, TranspileError> {
    let message_sql = crate::expr::rewrite(message, env)?;

    match code {
        Expr::IntLiteral(n) => {
            let sqlstate = crate::exceptions::sqlstate_from_pragma_code(*n as i32).ok_or_else(|| {
                TranspileError::SemanticViolation(format!(
                    "RAISE_APPLICATION_ERROR code {n} is outside -20000..-20999"
                ))
            })?;
            Ok(format!(
                "RAISE EXCEPTION {message_sql} USING ERRCODE = '{sqlstate}', HINT = 'Original Oracle error code: {n}';"
            ))
        }
        other => {
            let code_sql = crate::expr::rewrite(other, env)?;
            let sqlstate = env.ctx.lookup_sqlstate("raise_application_error")?;
            Ok(format!(
                "RAISE EXCEPTION {message_sql} USING ERRCODE = '{sqlstate}', HINT = 'Original Oracle error code: ' || {code_sql};"
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn raise_application_error_matches_spec_example() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let out = rewrite_raise_application_error(
            &Expr::IntLiteral(-20055),
            &Expr::StringLiteral("bad".into()),
            &mut env,
        )
        .unwrap();
        assert_eq!(
            out,
            "RAISE EXCEPTION 'bad' USING ERRCODE = 'P0055', HINT = 'Original Oracle error code: -20055';"
        );
    }

    #[test]
    fn standard_exception_name_maps_to_condition() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        let out = rewrite_raise(Some("zero_divide"), &mut env).unwrap();
        assert_eq!(out, "RAISE EXCEPTION USING ERRCODE = 'division_by_zero';");
    }

    #[test]
    fn bare_raise_is_passthrough() {
        let mut ctx = TransformationContext::new("hr");
        let indices = Indices::new();
        let mut reg = InlineTypeRegistry::new();
        let mut diags = vec![];
        let mut env = env_with(&mut ctx, &indices, &mut reg, &mut diags);
        assert_eq!(rewrite_raise(None, &mut env).unwrap(), "RAISE;");
    }
}
