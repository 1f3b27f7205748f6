//! The input parse tree.
//!
//! The core never parses Oracle SQL/PL-SQL itself (spec.md §1: the ANTLR
//! grammar is an external collaborator). It consumes a tree shaped like
//! this module, built by whatever front end holds the real grammar. Per the
//! Design Notes (spec.md §9) the tree is a plain tagged-variant sum type,
//! not a class hierarchy: every rewrite in `expr`, `sql`, and `procedural`
//! is an exhaustive `match` over these variants.

use std::collections::BTreeMap;

/// A dot-chain identifier, e.g. `a.b.c`. Never empty.
pub type DotChain = Vec<String>;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A bare or qualified name, not yet known to be a column, package
    /// function, or sequence pseudo-column reference; `expr::rewrite_ident`
    /// disambiguates using the transformation context.
    Ident(DotChain),
    /// `name(args)` or `a.b.c(args)` — could be a simple function call, a
    /// package function, or a type member method.
    Call { target: DotChain, args: Vec<Expr> },
    IntLiteral(i64),
    NumLiteral(String),
    StringLiteral(String),
    NullLiteral,
    /// Bind variable. `Some(name)` for `:name`, `None` for positional
    /// `:1`/`?`, which is fatal per spec.md §4.7.
    BindVar(Option<String>),
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        /// Oracle `(+)` outer-join marker on this side of a comparison,
        /// analyzed out by `outer_join` before the expression rewriter
        /// ever sees the node again.
        left_outer_marker: bool,
        right_outer_marker: bool,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Concat(Vec<Expr>),
    Case {
        /// `Some(e)` for simple `CASE e WHEN ...`, `None` for searched `CASE
        /// WHEN cond ...`.
        subject: Option<Box<Expr>>,
        whens: Vec<(Expr, Expr)>,
        else_: Option<Box<Expr>>,
    },
    Exists(Box<Query>),
    Quantified {
        quantifier: Quantifier,
        subquery: Box<Query>,
    },
    /// `COUNT(*)`, `SUM(DISTINCT x)`, etc.
    Aggregate {
        name: String,
        distinct: bool,
        args: Vec<Expr>,
    },
    Window {
        func: Box<Expr>,
        partition_by: Vec<Expr>,
        order_by: Vec<OrderByItem>,
        frame: Option<String>,
        respect_or_ignore_nulls: Option<NullsClause>,
    },
    /// `cursor%FOUND`, `SQL%ROWCOUNT`, etc. `cursor` is `"sql"` (any case)
    /// for the implicit cursor.
    CursorAttribute { cursor: String, attr: CursorAttr },
    /// `v.field1.field2` where `v` resolves to an inline-typed variable;
    /// disambiguated from a plain `Ident` dot-chain once the context is
    /// available (`expr::rewrite_ident` promotes a matching `Ident` into
    /// this variant).
    InlineFieldAccess { var: String, path: Vec<String> },
    Rownum,
    Sysdate,
    /// ROWNUM-marker-bearing sub-expression that the ROWNUM analyzer asked
    /// the caller to drop from WHERE; retained only so a caller printing
    /// the original tree for diagnostics can see what was removed.
    RownumPredicate { cmp: RownumCmp, bound: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    IsNull,
    IsNotNull,
    IsNan,
    IsInfinite,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Some,
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorAttr {
    Found,
    NotFound,
    RowCount,
    IsOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsClause {
    RespectNulls,
    IgnoreNulls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RownumCmp {
    Le,
    Lt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub desc: bool,
    pub nulls: Option<NullsClause2>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsClause2 {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
    /// `table.*` / bare `*`.
    pub is_star: bool,
    pub star_qualifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Base {
        /// As written, possibly bare, possibly schema-qualified, possibly a
        /// synonym, possibly `DUAL`/`SYS.DUAL`.
        name: DotChain,
        alias: Option<String>,
    },
    Subquery {
        query: Box<Query>,
        alias: String,
    },
    CteRef {
        name: String,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub columns: Vec<String>,
    pub query: Box<Query>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    UnionAll,
    Intersect,
    /// Oracle `MINUS`, mandatory rewrite to `EXCEPT`.
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectBy {
    pub condition: Expr,
    pub start_with: Option<Expr>,
    pub nocycle: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryBlock {
    pub select_list: Vec<SelectItem>,
    pub from: Vec<TableRef>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub connect_by: Option<ConnectBy>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Block(QueryBlock),
    SetOp {
        op: SetOp,
        left: Box<Query>,
        right: Box<Query>,
    },
    With {
        ctes: Vec<Cte>,
        body: Box<Query>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DmlKind {
    Insert {
        table: DotChain,
        columns: Vec<String>,
        values: Vec<Expr>,
    },
    Update {
        table: DotChain,
        alias: Option<String>,
        assignments: Vec<Assignment>,
        where_clause: Option<Expr>,
    },
    Delete {
        table: DotChain,
        alias: Option<String>,
        where_clause: Option<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub mode: ParamMode,
    pub oracle_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InlineTypeCategory {
    Record,
    TableOf,
    Varray,
    IndexBy,
    RowType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFieldDef {
    pub name: String,
    pub oracle_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineTypeDecl {
    pub name: String,
    pub category: InlineTypeCategory,
    /// For TABLE_OF/VARRAY/INDEX_BY.
    pub element_type: Option<String>,
    /// For RECORD, and the synthesized %ROWTYPE record.
    pub fields: Vec<InlineFieldDef>,
    /// For VARRAY.
    pub size_limit: Option<u32>,
    /// For INDEX BY.
    pub index_key_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    /// A plain Oracle scalar type name, e.g. `NUMBER(10,2)`.
    Scalar(String),
    /// `name%ROWTYPE`.
    RowType(String),
    /// `ref%TYPE`, `ref` being a dot-chain (variable, or variable.field, or
    /// table.column).
    PercentType(DotChain),
    /// A name previously registered via `TYPE name IS ...`.
    InlineRef(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub type_ref: TypeRef,
    pub is_constant: bool,
    pub not_null: bool,
    pub default_expr: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionDecl {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PragmaExceptionInit {
    pub exception_name: String,
    pub oracle_code: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CursorDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub query: Box<Query>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Var(VarDecl),
    InlineType(InlineTypeDecl),
    Exception(ExceptionDecl),
    Pragma(PragmaExceptionInit),
    Cursor(CursorDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Empty means `WHEN OTHERS`.
    pub names: Vec<String>,
    pub is_others: bool,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopKind {
    /// `FOR i IN [REVERSE] lo..hi LOOP`.
    NumericRange {
        var: String,
        reverse: bool,
        lo: Expr,
        hi: Expr,
    },
    /// `FOR rec IN (select) LOOP`.
    CursorForSelect { record_var: String, query: Box<Query> },
    /// `FOR rec IN named_cursor LOOP` — fatal per spec.md §4.9.
    CursorForNamed { record_var: String, cursor_name: String },
    /// `WHILE cond LOOP` — fatal per spec.md §4.9.
    While(Expr),
    /// Bare `LOOP ... END LOOP` — fatal per spec.md §4.9.
    Basic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign(Assignment),
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },
    CaseStmt {
        subject: Option<Expr>,
        whens: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },
    Loop {
        label: Option<String>,
        kind: LoopKind,
        body: Vec<Stmt>,
    },
    Exit {
        label: Option<String>,
        when: Option<Expr>,
    },
    Continue {
        label: Option<String>,
        when: Option<Expr>,
    },
    Null,
    CursorOpen {
        name: String,
        args: Vec<Expr>,
    },
    CursorFetch {
        name: String,
        into: Vec<Expr>,
    },
    CursorClose {
        name: String,
    },
    SelectInto {
        query: Box<Query>,
        into: Vec<Expr>,
    },
    Dml(DmlKind),
    Raise {
        /// `None` for bare `RAISE;` (re-raise).
        name: Option<String>,
    },
    RaiseApplicationError {
        code: Expr,
        message: Expr,
    },
    /// Standalone call, with or without `INTO`.
    Call {
        target: DotChain,
        args: Vec<Expr>,
        into: Option<Expr>,
    },
    Block {
        declarations: Vec<Declaration>,
        body: Vec<Stmt>,
        handlers: Vec<ExceptionHandler>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Procedure,
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    pub kind: RoutineKind,
    pub schema: Option<String>,
    pub name: String,
    pub params: Vec<Param>,
    /// Oracle return type text, for `RoutineKind::Function`.
    pub return_type: Option<String>,
    pub declarations: Vec<Declaration>,
    pub body: Vec<Stmt>,
    pub handlers: Vec<ExceptionHandler>,
}

/// Top-level unit the driver (C10) accepts: either a bare query or a
/// procedural routine.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationUnit {
    Sql(Query),
    Routine(Routine),
    AnonymousBlock {
        declarations: Vec<Declaration>,
        body: Vec<Stmt>,
        handlers: Vec<ExceptionHandler>,
    },
}

/// A minimal textual dump used by `dump-ast`; not a parser round-trip
/// format.
pub fn dump(unit: &TranslationUnit) -> String {
    format!("{unit:#?}")
}

/// Helper used by tests to assemble a quick metadata map literal without
/// pulling in the full JSON `Indices` loader.
pub type StringMap = BTreeMap<String, String>;
