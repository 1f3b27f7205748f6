//! Standard Oracle exception name -> PostgreSQL condition name table
//! (spec.md Glossary, "Standard exception map"), plus the `PRAGMA
//! EXCEPTION_INIT` <-> SQLSTATE formula (spec.md §4.9).

/// Maps a standard Oracle exception name (case-insensitive) to its
/// PostgreSQL condition name, used when emitting `RAISE standard_name;`
/// and `WHEN standard_name THEN`.
pub fn standard_exception_condition(name: &str) -> Option<&'static str> {
    let upper = name.to_uppercase();
    Some(match upper.as_str() {
        "NO_DATA_FOUND" => "no_data_found",
        "TOO_MANY_ROWS" => "too_many_rows",
        "ZERO_DIVIDE" => "division_by_zero",
        "VALUE_ERROR" | "INVALID_NUMBER" => "invalid_text_representation",
        "DUP_VAL_ON_INDEX" => "unique_violation",
        "INVALID_CURSOR" => "invalid_cursor_state",
        "CURSOR_ALREADY_OPEN" => "duplicate_cursor",
        "TIMEOUT_ON_RESOURCE" => "lock_not_available",
        "LOGIN_DENIED" => "invalid_authorization_specification",
        "NOT_LOGGED_ON" => "connection_does_not_exist",
        "PROGRAM_ERROR" => "internal_error",
        "STORAGE_ERROR" => "out_of_memory",
        "ROWTYPE_MISMATCH" => "datatype_mismatch",
        "COLLECTION_IS_NULL" => "null_value_not_allowed",
        "SUBSCRIPT_OUTSIDE_LIMIT" | "SUBSCRIPT_BEYOND_COUNT" => "array_subscript_error",
        "TRANSACTION_BACKED_OUT" => "transaction_rollback",
        "FOREIGN_KEY_VIOLATION" => "foreign_key_violation",
        "CHECK_VIOLATION" => "check_violation",
        _ => return None,
    })
}

/// `PRAGMA EXCEPTION_INIT(name, -200NN)` formula: the emitted SQLSTATE is
/// `'P' || lpad(|code| - 20000, 4, '0')`. Returns `None` when `code` is
/// outside `-20000..=-20999` (spec.md §4.9: "yields a diagnostic comment
/// and no linkage").
pub fn sqlstate_from_pragma_code(oracle_code: i32) -> Option<String> {
    if !(-20999..=-20000).contains(&oracle_code) {
        return None;
    }
    let nn = -oracle_code - 20000;
    Some(format!("P{nn:04}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_standard_names_case_insensitively() {
        assert_eq!(standard_exception_condition("zero_divide"), Some("division_by_zero"));
        assert_eq!(standard_exception_condition("NO_DATA_FOUND"), Some("no_data_found"));
        assert_eq!(standard_exception_condition("not_a_real_one"), None);
    }

    #[test]
    fn pragma_formula_matches_spec_example() {
        // spec.md S4: -20055 -> P0055
        assert_eq!(sqlstate_from_pragma_code(-20055), Some("P0055".to_string()));
        assert_eq!(sqlstate_from_pragma_code(-20000), Some("P0000".to_string()));
        assert_eq!(sqlstate_from_pragma_code(-20999), Some("P0999".to_string()));
    }

    #[test]
    fn pragma_out_of_range_yields_none() {
        assert_eq!(sqlstate_from_pragma_code(-19999), None);
        assert_eq!(sqlstate_from_pragma_code(-21000), None);
        assert_eq!(sqlstate_from_pragma_code(100), None);
    }
}
