//! C1 — Type Converter: pure function Oracle scalar type -> PostgreSQL
//! scalar type (spec.md §4.1).

use crate::diagnostics::Diagnostic;

/// Converts an Oracle scalar type name (possibly with precision/scale,
/// e.g. `NUMBER(10,2)`, `VARCHAR2(100)`) to its PostgreSQL equivalent.
///
/// Unknown scalar types fall back to `text` with a diagnostic (spec.md §7,
/// "Locally recovered situations").
pub fn to_pg(oracle_type: &str) -> (String, Option<Diagnostic>) {
    let trimmed = oracle_type.trim();
    let base = base_type_name(trimmed);

    match base.as_str() {
        "NUMBER" | "INTEGER" | "INT" | "SMALLINT" | "DECIMAL" | "NUMERIC" | "FLOAT"
        | "BINARY_FLOAT" | "BINARY_DOUBLE" => ("numeric".to_string(), None),
        "VARCHAR2" | "VARCHAR" | "CHAR" | "NVARCHAR2" | "NCHAR" | "CLOB" | "NCLOB" | "LONG" => {
            ("text".to_string(), None)
        }
        "DATE" | "TIMESTAMP" => ("timestamp".to_string(), None),
        "BLOB" | "RAW" | "LONG RAW" | "BFILE" => ("bytea".to_string(), None),
        "XMLTYPE" => ("xml".to_string(), None),
        "BOOLEAN" => ("boolean".to_string(), None),
        // Complex Oracle system types (e.g. anydata, nested tables exposed
        // via the Oracle Type API) have no natural scalar PostgreSQL
        // equivalent; jsonb is the same fallback used for inline RECORD /
        // collection types (spec.md §3, "Inline Type Definition").
        "SYS.ANYDATA" | "SYS.ANYTYPE" | "ANYDATA" | "ANYTYPE" | "XMLSEQUENCETYPE" => {
            ("jsonb".to_string(), None)
        }
        _ => {
            if looks_like_object_type(trimmed) {
                (object_type_pg_name(trimmed), None)
            } else {
                let diag = Diagnostic::warning(format!(
                    "unknown Oracle scalar type '{trimmed}', falling back to text"
                ));
                ("text".to_string(), Some(diag))
            }
        }
    }
}

/// Strips a parenthesized precision/scale/length suffix: `NUMBER(10,2)` ->
/// `NUMBER`.
fn base_type_name(oracle_type: &str) -> String {
    let upper = oracle_type.to_uppercase();
    match upper.find('(') {
        Some(idx) => upper[..idx].trim().to_string(),
        None => upper.trim().to_string(),
    }
}

/// Heuristic: a dotted `schema.type_name` with no known-scalar leaf is
/// assumed to be a user-defined object type, mapped to
/// `schema.type_name` per spec.md §4.1. This is deliberately permissive —
/// `Indices::type_methods` is the authoritative source for "is this really
/// a user type", but §4.1 only specifies the *mapping*, not resolution, so
/// this function stays a pure syntactic check.
fn looks_like_object_type(oracle_type: &str) -> bool {
    oracle_type.contains('.') && !oracle_type.contains('(')
}

fn object_type_pg_name(oracle_type: &str) -> String {
    oracle_type.to_lowercase()
}

/// Open Question #1 (spec.md §9, DESIGN.md): the source's date-arithmetic
/// detection is heuristic, not full type inference. This hook is the single
/// place that heuristic lives; `core::expr` calls it rather than
/// reimplementing the check.
pub fn is_date_like(oracle_type: &str) -> bool {
    let base = base_type_name(oracle_type);
    base == "DATE" || base.starts_with("TIMESTAMP")
}
