//! Oracle-specific function rewrite table (spec.md §4.7, "Simple function
//! call"). A plain lookup table of `(uppercased name -> rewrite fn)`, per
//! the Design Notes' "Dynamic dispatch for function-rewrites" guidance — no
//! trait objects needed, just `fn(&[String]) -> String`.

/// Looks up and applies an Oracle-specific rewrite for `name` given its
/// already-rewritten argument expressions. Returns `None` when `name` has
/// no special-case rewrite (caller falls through to schema-qualification).
pub fn rewrite_call(name: &str, args: &[String]) -> Option<String> {
    let upper = name.to_uppercase();
    let f: fn(&[String]) -> String = match upper.as_str() {
        "ADD_MONTHS" => add_months,
        "MONTHS_BETWEEN" => months_between,
        "LAST_DAY" => last_day,
        "TRUNC" => trunc,
        "ROUND" => round,
        "INSTR" => instr,
        "LPAD" => lpad,
        "RPAD" => rpad,
        "TRANSLATE" => translate,
        "NVL" => nvl,
        "NVL2" => nvl2,
        "SUBSTR" => substr,
        "TO_CHAR" => to_char,
        "TO_NUMBER" => to_number,
        "TO_DATE" => to_date,
        _ => return None,
    };
    Some(f(args))
}

fn add_months(args: &[String]) -> String {
    // ADD_MONTHS(d, n) -> d + (n || ' months')::interval
    format!("({} + ({} || ' months')::interval)", args[0], args[1])
}

fn months_between(args: &[String]) -> String {
    format!(
        "(EXTRACT(YEAR FROM age({0}, {1})) * 12 + EXTRACT(MONTH FROM age({0}, {1})))",
        args[0], args[1]
    )
}

fn last_day(args: &[String]) -> String {
    format!("(date_trunc('month', {}) + interval '1 month' - interval '1 day')", args[0])
}

fn trunc(args: &[String]) -> String {
    // Ambiguous in Oracle between numeric TRUNC(n[,d]) and date TRUNC(d[,fmt]);
    // the expression rewriter resolves this via the type evaluator before
    // falling back here (see expr::rewrite_arithmetic_or_date), this
    // fallback assumes the date form, which is the one spec.md's S1 exercises.
    // Oracle's TRUNC(date) returns a DATE; Postgres's date_trunc() always
    // returns a timestamp, so the bare (no explicit format) form needs an
    // explicit `::date` cast back to preserve the original result type.
    if args.len() > 1 {
        format!("date_trunc('{}', {})", strip_quotes(&args[1]).to_lowercase(), args[0])
    } else {
        format!("DATE_TRUNC('day', {})::date", args[0])
    }
}

fn round(args: &[String]) -> String {
    if args.len() > 1 {
        format!("ROUND(({})::numeric, {})", args[0], args[1])
    } else {
        format!("ROUND(({})::numeric)", args[0])
    }
}

fn instr(args: &[String]) -> String {
    format!("POSITION({} IN {})", args[1], args[0])
}

fn lpad(args: &[String]) -> String {
    format!("LPAD({})", args.join(", "))
}

fn rpad(args: &[String]) -> String {
    format!("RPAD({})", args.join(", "))
}

fn translate(args: &[String]) -> String {
    format!("TRANSLATE({})", args.join(", "))
}

fn nvl(args: &[String]) -> String {
    format!("COALESCE({}, {})", args[0], args[1])
}

fn nvl2(args: &[String]) -> String {
    format!("(CASE WHEN {} IS NOT NULL THEN {} ELSE {} END)", args[0], args[1], args[2])
}

fn substr(args: &[String]) -> String {
    format!("SUBSTRING({})", args.join(", "))
}

fn to_char(args: &[String]) -> String {
    format!("TO_CHAR({})", args.join(", "))
}

fn to_number(args: &[String]) -> String {
    if args.len() > 1 {
        format!("TO_NUMBER({})", args.join(", "))
    } else {
        format!("({})::numeric", args[0])
    }
}

fn to_date(args: &[String]) -> String {
    format!("TO_TIMESTAMP({})", args.join(", "))
}

fn strip_quotes(s: &str) -> String {
    s.trim_matches('\'').to_string()
}
