//! End-to-end coverage for the six worked scenarios (spec.md §8, S1-S6),
//! driven through the same entry points an external caller uses
//! (`transform_sql`/`transform_anonymous_block`), with hand-built AST
//! literals standing in for the externally-parsed tree the core never
//! builds itself.

use plsql2pg_core::ast::*;
use plsql2pg_core::{Indices, TranspileResult};

fn ident(parts: &[&str]) -> Expr {
    Expr::Ident(parts.iter().map(|s| s.to_string()).collect())
}

fn cmp(op: BinaryOp, left: Expr, right: Expr, left_marker: bool, right_marker: bool) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
        left_outer_marker: left_marker,
        right_outer_marker: right_marker,
    }
}

fn and(left: Expr, right: Expr) -> Expr {
    cmp(BinaryOp::And, left, right, false, false)
}

fn success(result: TranspileResult) -> String {
    match result {
        TranspileResult::Success { postgres_source, .. } => postgres_source,
        TranspileResult::Failure { error_message, .. } => panic!("expected success, got: {error_message}"),
    }
}

/// S1 - Outer join + date function.
#[test]
fn s1_outer_join_and_date_function() {
    let query = Query::Block(QueryBlock {
        select_list: vec![
            SelectItem { expr: ident(&["a", "id"]), alias: None, is_star: false, star_qualifier: None },
            SelectItem { expr: ident(&["b", "val"]), alias: None, is_star: false, star_qualifier: None },
        ],
        from: vec![
            TableRef::Base { name: vec!["a".into()], alias: None },
            TableRef::Base { name: vec!["b".into()], alias: None },
        ],
        where_clause: Some(and(
            cmp(BinaryOp::Eq, ident(&["a", "id"]), ident(&["b", "id"]), false, true),
            cmp(
                BinaryOp::Eq,
                Expr::Call { target: vec!["TRUNC".into()], args: vec![ident(&["a", "d"])] },
                Expr::Call { target: vec!["TRUNC".into()], args: vec![ident(&["b", "d"])] },
                false,
                true,
            ),
        )),
        group_by: vec![],
        having: None,
        order_by: vec![],
        connect_by: None,
    });

    let indices = Indices::new();
    let result = plsql2pg_core::transform_sql(
        "SELECT a.id, b.val FROM a, b WHERE a.id = b.id(+) AND TRUNC(a.d) = TRUNC(b.d(+))",
        &query,
        "hr",
        &indices,
    );
    assert_eq!(
        success(result),
        "SELECT a.id, b.val FROM hr.a LEFT JOIN hr.b ON a.id = b.id AND DATE_TRUNC('day', a.d)::date = DATE_TRUNC('day', b.d)::date"
    );
}

/// S2 - ROWNUM limit + DESC nulls.
#[test]
fn s2_rownum_limit_and_desc_nulls() {
    let query = Query::Block(QueryBlock {
        select_list: vec![SelectItem { expr: ident(&["empno"]), alias: None, is_star: false, star_qualifier: None }],
        from: vec![TableRef::Base { name: vec!["emp".into()], alias: None }],
        where_clause: Some(and(
            cmp(BinaryOp::Eq, ident(&["dept"]), Expr::IntLiteral(10), false, false),
            cmp(BinaryOp::Le, Expr::Rownum, Expr::IntLiteral(5), false, false),
        )),
        group_by: vec![],
        having: None,
        order_by: vec![OrderByItem { expr: ident(&["empno"]), desc: true, nulls: None }],
        connect_by: None,
    });

    let indices = Indices::new();
    let result = plsql2pg_core::transform_sql(
        "SELECT empno FROM emp WHERE dept = 10 AND ROWNUM <= 5 ORDER BY empno DESC",
        &query,
        "hr",
        &indices,
    );
    assert_eq!(
        success(result),
        "SELECT empno FROM hr.emp WHERE dept = 10 ORDER BY empno DESC NULLS FIRST LIMIT 5"
    );
}

/// S3 - Sequence pseudo-columns + concatenation.
#[test]
fn s3_sequence_and_concat() {
    let query = Query::Block(QueryBlock {
        select_list: vec![
            SelectItem { expr: ident(&["seq", "NEXTVAL"]), alias: None, is_star: false, star_qualifier: None },
            SelectItem {
                expr: Expr::Concat(vec![Expr::StringLiteral("id=".into()), ident(&["seq", "CURRVAL"])]),
                alias: None,
                is_star: false,
                star_qualifier: None,
            },
        ],
        from: vec![TableRef::Base { name: vec!["dual".into()], alias: None }],
        where_clause: None,
        group_by: vec![],
        having: None,
        order_by: vec![],
        connect_by: None,
    });

    let indices = Indices::new();
    let result =
        plsql2pg_core::transform_sql("SELECT seq.NEXTVAL, 'id=' || seq.CURRVAL FROM dual", &query, "hr", &indices);
    assert_eq!(success(result), "SELECT nextval('hr.seq'), CONCAT('id=', currval('hr.seq'))");
}

/// S4 - RAISE_APPLICATION_ERROR, driven end-to-end through an anonymous block.
#[test]
fn s4_raise_application_error() {
    let unit = TranslationUnit::AnonymousBlock {
        declarations: vec![],
        body: vec![Stmt::RaiseApplicationError {
            code: Expr::IntLiteral(-20055),
            message: Expr::StringLiteral("bad".into()),
        }],
        handlers: vec![],
    };

    let indices = Indices::new();
    let result = plsql2pg_core::transform_anonymous_block(
        "RAISE_APPLICATION_ERROR(-20055, 'bad');",
        &unit,
        "hr",
        &indices,
    );
    let out = success(result);
    assert!(out.contains("RAISE EXCEPTION 'bad' USING ERRCODE = 'P0055', HINT = 'Original Oracle error code: -20055';"));
}

/// S5 - Inline RECORD with a jsonb default and a jsonb_set field write.
#[test]
fn s5_inline_record() {
    let unit = TranslationUnit::AnonymousBlock {
        declarations: vec![
            Declaration::InlineType(InlineTypeDecl {
                name: "r".into(),
                category: InlineTypeCategory::Record,
                element_type: None,
                fields: vec![
                    InlineFieldDef { name: "x".into(), oracle_type: "NUMBER".into() },
                    InlineFieldDef { name: "y".into(), oracle_type: "VARCHAR2(10)".into() },
                ],
                size_limit: None,
                index_key_type: None,
            }),
            Declaration::Var(VarDecl {
                name: "v".into(),
                type_ref: TypeRef::InlineRef("r".into()),
                is_constant: false,
                not_null: false,
                default_expr: None,
            }),
        ],
        body: vec![Stmt::Assign(Assignment {
            target: ident(&["v", "x"]),
            value: Expr::IntLiteral(7),
        })],
        handlers: vec![],
    };

    let indices = Indices::new();
    let result = plsql2pg_core::transform_anonymous_block(
        "TYPE r IS RECORD(x NUMBER, y VARCHAR2(10)); v r; v.x := 7;",
        &unit,
        "hr",
        &indices,
    );
    let out = success(result);
    assert!(out.contains("v jsonb := '{}'::jsonb;"));
    assert!(out.contains("v := jsonb_set(v, '{x}', to_jsonb(7));"));
}

/// S6 - Cursor attributes: tracking declarations plus the OPEN/FETCH/CLOSE
/// companion statements, even though the `%FOUND` read that turns tracking
/// on only appears after the `OPEN` in program order.
#[test]
fn s6_cursor_attributes() {
    let unit = TranslationUnit::AnonymousBlock {
        declarations: vec![],
        body: vec![
            Stmt::CursorOpen { name: "c".into(), args: vec![] },
            Stmt::CursorFetch { name: "c".into(), into: vec![ident(&["r"])] },
            Stmt::If {
                branches: vec![(
                    Expr::CursorAttribute { cursor: "c".into(), attr: CursorAttr::Found },
                    vec![Stmt::Null],
                )],
                else_branch: None,
            },
            Stmt::CursorClose { name: "c".into() },
        ],
        handlers: vec![],
    };

    let indices = Indices::new();
    let result = plsql2pg_core::transform_anonymous_block(
        "OPEN c; FETCH c INTO r; IF c%FOUND THEN NULL; END IF; CLOSE c;",
        &unit,
        "hr",
        &indices,
    );
    let out = success(result);
    assert!(out.contains("c__found boolean; c__rowcount integer := 0; c__isopen boolean := FALSE;"));
    assert!(out.contains("OPEN c; c__isopen := TRUE;"));
    assert!(out.contains("FETCH c INTO r; c__found := FOUND; c__rowcount := c__rowcount + 1;"));
    assert!(out.contains("IF c__found THEN NULL; END IF;"));
    assert!(out.contains("CLOSE c; c__isopen := FALSE;"));
}
