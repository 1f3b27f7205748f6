//! A minimal recursive-descent reader for exactly the constructs named in
//! spec.md §8 (S1-S6) and their close variants. This is a convenience front
//! end for the CLI only — it is explicitly *not* a reimplementation of the
//! Oracle PL/SQL ANTLR grammar the core assumes as its real input (spec.md
//! §1, §6). Anything outside its narrow coverage fails with a plain
//! `String` parse error; the CLI surfaces that as a `ParseError`-flavored
//! failure result.

use plsql2pg_core::ast::*;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(String),
    Str(String),
    BindVar(Option<String>),
    Punct(&'static str),
    Eof,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { chars: src.char_indices().peekable(), src }
    }

    fn tokenize(mut self) -> Result<Vec<Tok>, String> {
        let mut out = Vec::new();
        loop {
            self.skip_ws_and_comments();
            let Some(&(i, c)) = self.chars.peek() else {
                out.push(Tok::Eof);
                return Ok(out);
            };
            if c.is_alphabetic() || c == '_' {
                out.push(self.lex_ident());
            } else if c.is_ascii_digit() {
                out.push(self.lex_number());
            } else if c == '\'' {
                out.push(self.lex_string()?);
            } else if c == ':' {
                out.push(self.lex_colon_or_bind());
            } else {
                out.push(self.lex_punct(i)?);
            }
        }
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
                self.chars.next();
            }
            if self.starts_with("--") {
                while !matches!(self.chars.peek(), Some((_, '\n')) | None) {
                    self.chars.next();
                }
                continue;
            }
            if self.starts_with("/*") {
                self.chars.next();
                self.chars.next();
                while !self.starts_with("*/") && self.chars.peek().is_some() {
                    self.chars.next();
                }
                self.chars.next();
                self.chars.next();
                continue;
            }
            break;
        }
    }

    fn starts_with(&mut self, s: &str) -> bool {
        let Some(&(i, _)) = self.chars.peek() else { return false };
        self.src[i..].starts_with(s)
    }

    fn lex_ident(&mut self) -> Tok {
        let (start, _) = *self.chars.peek().unwrap();
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' || c == '#' {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        Tok::Ident(self.src[start..end].to_string())
    }

    fn lex_number(&mut self) -> Tok {
        let (start, _) = *self.chars.peek().unwrap();
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                end = i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        Tok::Number(self.src[start..end].to_string())
    }

    fn lex_string(&mut self) -> Result<Tok, String> {
        self.chars.next();
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\'')) => {
                    if matches!(self.chars.peek(), Some((_, '\''))) {
                        self.chars.next();
                        s.push('\'');
                    } else {
                        return Ok(Tok::Str(s));
                    }
                }
                Some((_, c)) => s.push(c),
                None => return Err("unterminated string literal".to_string()),
            }
        }
    }

    fn lex_colon_or_bind(&mut self) -> Tok {
        self.chars.next();
        if matches!(self.chars.peek(), Some((_, '='))) {
            self.chars.next();
            return Tok::Punct(":=");
        }
        match self.chars.peek() {
            Some(&(i, c)) if c.is_alphabetic() || c == '_' => {
                let start = i;
                let mut end = start;
                while let Some(&(j, c2)) = self.chars.peek() {
                    if c2.is_alphanumeric() || c2 == '_' {
                        end = j + c2.len_utf8();
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                Tok::BindVar(Some(self.src[start..end].to_string()))
            }
            _ => Tok::BindVar(None),
        }
    }

    fn lex_punct(&mut self, _i: usize) -> Result<Tok, String> {
        for two in ["<=", ">=", "<>", "!=", "||", "(+", ".."] {
            if self.starts_with(two) {
                for _ in 0..two.chars().count() {
                    self.chars.next();
                }
                // `(+)` is lexed as the three-char marker token as a unit.
                if two == "(+" && self.starts_with(")") {
                    self.chars.next();
                    return Ok(Tok::Punct("(+)"));
                }
                return Ok(Tok::Punct(match two {
                    "<=" => "<=",
                    ">=" => ">=",
                    "<>" | "!=" => "<>",
                    "||" => "||",
                    ".." => "..",
                    other => other,
                }));
            }
        }
        let (_, c) = self.chars.next().unwrap();
        let s: &'static str = match c {
            '(' => "(",
            ')' => ")",
            ',' => ",",
            '.' => ".",
            '=' => "=",
            '<' => "<",
            '>' => ">",
            '+' => "+",
            '-' => "-",
            '*' => "*",
            '/' => "/",
            ';' => ";",
            '%' => "%",
            _ => return Err(format!("unexpected character '{c}'")),
        };
        Ok(Tok::Punct(s))
    }
}

pub struct Parser {
    toks: Vec<Tok>,
    pos: usize,
    /// Oracle lets `(+)` trail the column reference wherever it sits, not
    /// just at the top of a comparison operand (e.g. `TRUNC(b.d(+))`). Set
    /// whenever a `(+)` is consumed anywhere while parsing an operand;
    /// `comparison()` resets and reads it around each side.
    outer_marker_seen: bool,
}

type PResult<T> = Result<T, String>;

impl Parser {
    pub fn new(src: &str) -> PResult<Self> {
        let toks = Lexer::new(src).tokenize()?;
        Ok(Parser { toks, pos: 0, outer_marker_seen: false })
    }

    fn peek(&self) -> &Tok {
        &self.toks[self.pos]
    }

    fn advance(&mut self) -> Tok {
        let t = self.toks[self.pos].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn is_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Ident(s) if s.eq_ignore_ascii_case(kw))
    }

    fn eat_kw(&mut self, kw: &str) -> PResult<()> {
        if self.is_kw(kw) {
            self.advance();
            Ok(())
        } else {
            Err(format!("expected keyword '{kw}', found {:?}", self.peek()))
        }
    }

    fn eat_punct(&mut self, p: &str) -> PResult<()> {
        if matches!(self.peek(), Tok::Punct(q) if *q == p) {
            self.advance();
            Ok(())
        } else {
            Err(format!("expected '{p}', found {:?}", self.peek()))
        }
    }

    fn at_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Tok::Punct(q) if *q == p)
    }

    fn ident(&mut self) -> PResult<String> {
        match self.advance() {
            Tok::Ident(s) => Ok(s),
            other => Err(format!("expected identifier, found {other:?}")),
        }
    }

    /// `a.b.c` — a dot-chain of identifiers.
    fn dot_chain(&mut self) -> PResult<DotChain> {
        let mut chain = vec![self.ident()?];
        while self.at_punct(".") {
            self.advance();
            chain.push(self.ident()?);
        }
        Ok(chain)
    }

    // ---- top-level entry points ----

    pub fn parse_query(&mut self) -> PResult<Query> {
        let q = self.query()?;
        Ok(q)
    }

    pub fn parse_block_body(&mut self) -> PResult<(Vec<Declaration>, Vec<Stmt>, Vec<ExceptionHandler>)> {
        let declarations = if self.is_kw("declare") {
            self.advance();
            self.declarations_until(&["begin"])?
        } else {
            Vec::new()
        };
        self.eat_kw("begin")?;
        let body = self.stmts_until(&["exception", "end"])?;
        let handlers = if self.is_kw("exception") {
            self.advance();
            self.exception_handlers()?
        } else {
            Vec::new()
        };
        self.eat_kw("end")?;
        if matches!(self.peek(), Tok::Ident(_)) {
            self.advance();
        }
        self.eat_punct(";")?;
        Ok((declarations, body, handlers))
    }

    pub fn parse_routine(&mut self) -> PResult<Routine> {
        let kind = if self.is_kw("procedure") {
            self.advance();
            RoutineKind::Procedure
        } else if self.is_kw("function") {
            self.advance();
            RoutineKind::Function
        } else {
            return Err("expected PROCEDURE or FUNCTION".to_string());
        };
        let name = self.ident()?;
        let params = if self.at_punct("(") {
            self.advance();
            let mut params = Vec::new();
            while !self.at_punct(")") {
                let pname = self.ident()?;
                let mode = if self.is_kw("in") {
                    self.advance();
                    if self.is_kw("out") {
                        self.advance();
                        ParamMode::InOut
                    } else {
                        ParamMode::In
                    }
                } else if self.is_kw("out") {
                    self.advance();
                    ParamMode::Out
                } else {
                    ParamMode::In
                };
                let oracle_type = self.type_name()?;
                params.push(Param { name: pname, mode, oracle_type });
                if self.at_punct(",") {
                    self.advance();
                } else {
                    break;
                }
            }
            self.eat_punct(")")?;
            params
        } else {
            Vec::new()
        };
        let return_type = if kind == RoutineKind::Function {
            self.eat_kw("return")?;
            Some(self.type_name()?)
        } else {
            None
        };
        if self.is_kw("is") || self.is_kw("as") {
            self.advance();
        }
        let (declarations, body, handlers) = self.parse_routine_body()?;
        Ok(Routine { kind, schema: None, name, params, return_type, declarations, body, handlers })
    }

    fn parse_routine_body(&mut self) -> PResult<(Vec<Declaration>, Vec<Stmt>, Vec<ExceptionHandler>)> {
        let declarations = self.declarations_until(&["begin"])?;
        self.eat_kw("begin")?;
        let body = self.stmts_until(&["exception", "end"])?;
        let handlers = if self.is_kw("exception") {
            self.advance();
            self.exception_handlers()?
        } else {
            Vec::new()
        };
        self.eat_kw("end")?;
        if matches!(self.peek(), Tok::Ident(_)) {
            self.advance();
        }
        self.eat_punct(";")?;
        Ok((declarations, body, handlers))
    }

    /// A bare type name for params/declarations: `NUMBER(10,2)`,
    /// `VARCHAR2(100)`, a plain name, or `a.b%ROWTYPE`/`a.b%TYPE`.
    fn type_name(&mut self) -> PResult<String> {
        let mut s = self.ident()?;
        if self.at_punct("(") {
            self.advance();
            s.push('(');
            let mut first = true;
            while !self.at_punct(")") {
                if !first {
                    s.push(',');
                }
                first = false;
                match self.advance() {
                    Tok::Number(n) => s.push_str(&n),
                    Tok::Ident(i) => s.push_str(&i),
                    other => return Err(format!("unexpected token in type args: {other:?}")),
                }
                if self.at_punct(",") {
                    self.advance();
                }
            }
            self.advance();
            s.push(')');
        }
        Ok(s)
    }

    // ---- declarations ----

    fn declarations_until(&mut self, stop_kws: &[&str]) -> PResult<Vec<Declaration>> {
        let mut decls = Vec::new();
        while !stop_kws.iter().any(|kw| self.is_kw(kw)) {
            decls.push(self.declaration()?);
        }
        Ok(decls)
    }

    fn declaration(&mut self) -> PResult<Declaration> {
        if self.is_kw("pragma") {
            self.advance();
            self.eat_kw("exception_init")?;
            self.eat_punct("(")?;
            let name = self.ident()?;
            self.eat_punct(",")?;
            let sign = if self.at_punct("-") {
                self.advance();
                -1
            } else {
                1
            };
            let n: i32 = match self.advance() {
                Tok::Number(s) => s.parse().map_err(|_| "bad pragma code".to_string())?,
                other => return Err(format!("expected number, found {other:?}")),
            };
            self.eat_punct(")")?;
            self.eat_punct(";")?;
            return Ok(Declaration::Pragma(PragmaExceptionInit { exception_name: name, oracle_code: sign * n }));
        }
        if self.is_kw("type") {
            return self.inline_type_decl();
        }
        let name = self.ident()?;
        if self.is_kw("exception") {
            self.advance();
            self.eat_punct(";")?;
            return Ok(Declaration::Exception(ExceptionDecl { name }));
        }
        if self.is_kw("cursor") {
            self.advance();
            let params = if self.at_punct("(") {
                self.advance();
                let mut ps = Vec::new();
                while !self.at_punct(")") {
                    let pname = self.ident()?;
                    let oracle_type = self.type_name()?;
                    ps.push(Param { name: pname, mode: ParamMode::In, oracle_type });
                    if self.at_punct(",") {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.eat_punct(")")?;
                ps
            } else {
                Vec::new()
            };
            self.eat_kw("is")?;
            let query = Box::new(self.query()?);
            self.eat_punct(";")?;
            return Ok(Declaration::Cursor(CursorDecl { name, params, query }));
        }
        // variable declaration
        let type_ref = self.type_ref()?;
        let is_constant = false;
        let not_null = if self.is_kw("not") {
            self.advance();
            self.eat_kw("null")?;
            true
        } else {
            false
        };
        let default_expr = if self.at_punct(":=") || self.is_kw("default") {
            self.advance();
            Some(self.expr()?)
        } else {
            None
        };
        self.eat_punct(";")?;
        Ok(Declaration::Var(VarDecl { name, type_ref, is_constant, not_null, default_expr }))
    }

    fn type_ref(&mut self) -> PResult<TypeRef> {
        let chain = self.dot_chain()?;
        if self.at_punct("%") {
            self.advance();
            if self.is_kw("rowtype") {
                self.advance();
                return Ok(TypeRef::RowType(chain.join(".")));
            }
            self.eat_kw("type")?;
            return Ok(TypeRef::PercentType(chain));
        }
        if chain.len() == 1 {
            // Could be a scalar type name (possibly with precision) or a
            // previously-declared inline type name; the core disambiguates
            // via the registry, so a bare name becomes `InlineRef` only
            // when it is lower-case-only and not a known scalar keyword —
            // simpler: scalar types always have an upper-case Oracle
            // spelling in this reader's accepted input, inline names don't.
            let name = &chain[0];
            if name.chars().next().is_some_and(|c| c.is_uppercase()) {
                let mut full = name.clone();
                if self.at_punct("(") {
                    self.advance();
                    full.push('(');
                    let mut first = true;
                    while !self.at_punct(")") {
                        if !first {
                            full.push(',');
                        }
                        first = false;
                        match self.advance() {
                            Tok::Number(n) => full.push_str(&n),
                            Tok::Ident(i) => full.push_str(&i),
                            other => return Err(format!("unexpected token in type args: {other:?}")),
                        }
                        if self.at_punct(",") {
                            self.advance();
                        }
                    }
                    self.advance();
                    full.push(')');
                }
                return Ok(TypeRef::Scalar(full));
            }
            return Ok(TypeRef::InlineRef(name.clone()));
        }
        Ok(TypeRef::PercentType(chain))
    }

    fn inline_type_decl(&mut self) -> PResult<Declaration> {
        self.eat_kw("type")?;
        let name = self.ident()?;
        self.eat_kw("is")?;
        if self.is_kw("record") {
            self.advance();
            self.eat_punct("(")?;
            let mut fields = Vec::new();
            while !self.at_punct(")") {
                let fname = self.ident()?;
                let ftype = self.type_name()?;
                fields.push(InlineFieldDef { name: fname, oracle_type: ftype });
                if self.at_punct(",") {
                    self.advance();
                } else {
                    break;
                }
            }
            self.eat_punct(")")?;
            self.eat_punct(";")?;
            return Ok(Declaration::InlineType(InlineTypeDecl {
                name,
                category: InlineTypeCategory::Record,
                element_type: None,
                fields,
                size_limit: None,
                index_key_type: None,
            }));
        }
        self.eat_kw("table")?;
        self.eat_kw("of")?;
        let element_type = self.type_name()?;
        let index_key_type = if self.is_kw("index") {
            self.advance();
            self.eat_kw("by")?;
            Some(self.type_name()?)
        } else {
            None
        };
        self.eat_punct(";")?;
        Ok(Declaration::InlineType(InlineTypeDecl {
            name,
            category: if index_key_type.is_some() { InlineTypeCategory::IndexBy } else { InlineTypeCategory::TableOf },
            element_type: Some(element_type),
            fields: Vec::new(),
            size_limit: None,
            index_key_type,
        }))
    }

    fn exception_handlers(&mut self) -> PResult<Vec<ExceptionHandler>> {
        let mut handlers = Vec::new();
        while self.is_kw("when") {
            self.advance();
            let mut is_others = false;
            let mut names = Vec::new();
            if self.is_kw("others") {
                self.advance();
                is_others = true;
            } else {
                names.push(self.ident()?);
                while self.is_kw("or") {
                    self.advance();
                    names.push(self.ident()?);
                }
            }
            self.eat_kw("then")?;
            let body = self.stmts_until(&["when", "end"])?;
            handlers.push(ExceptionHandler { names, is_others, body });
        }
        Ok(handlers)
    }

    // ---- statements ----

    fn stmts_until(&mut self, stop_kws: &[&str]) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !stop_kws.iter().any(|kw| self.is_kw(kw)) {
            stmts.push(self.stmt()?);
        }
        Ok(stmts)
    }

    fn stmt(&mut self) -> PResult<Stmt> {
        if self.is_kw("null") {
            self.advance();
            self.eat_punct(";")?;
            return Ok(Stmt::Null);
        }
        if self.is_kw("if") {
            return self.if_stmt();
        }
        if self.is_kw("case") {
            return self.case_stmt();
        }
        if self.is_kw("loop") || self.is_kw("while") || self.is_kw("for") {
            return self.loop_stmt();
        }
        if self.is_kw("exit") {
            self.advance();
            let label = self.optional_label();
            let when = if self.is_kw("when") {
                self.advance();
                Some(self.expr()?)
            } else {
                None
            };
            self.eat_punct(";")?;
            return Ok(Stmt::Exit { label, when });
        }
        if self.is_kw("continue") {
            self.advance();
            let label = self.optional_label();
            let when = if self.is_kw("when") {
                self.advance();
                Some(self.expr()?)
            } else {
                None
            };
            self.eat_punct(";")?;
            return Ok(Stmt::Continue { label, when });
        }
        if self.is_kw("open") {
            self.advance();
            let name = self.ident()?;
            let args = if self.at_punct("(") {
                self.advance();
                let a = self.expr_list_until(")")?;
                self.eat_punct(")")?;
                a
            } else {
                Vec::new()
            };
            self.eat_punct(";")?;
            return Ok(Stmt::CursorOpen { name, args });
        }
        if self.is_kw("fetch") {
            self.advance();
            let name = self.ident()?;
            self.eat_kw("into")?;
            let into = self.expr_list_until(";")?;
            self.eat_punct(";")?;
            return Ok(Stmt::CursorFetch { name, into });
        }
        if self.is_kw("close") {
            self.advance();
            let name = self.ident()?;
            self.eat_punct(";")?;
            return Ok(Stmt::CursorClose { name });
        }
        if self.is_kw("raise") {
            self.advance();
            if self.at_punct(";") {
                self.advance();
                return Ok(Stmt::Raise { name: None });
            }
            let name = self.ident()?;
            self.eat_punct(";")?;
            return Ok(Stmt::Raise { name: Some(name) });
        }
        if self.is_kw("begin") {
            let (declarations, body, handlers) = self.parse_routine_body_inline()?;
            return Ok(Stmt::Block { declarations, body, handlers });
        }
        if self.is_kw("select") {
            return self.select_into_stmt();
        }
        if self.is_kw("insert") || self.is_kw("update") || self.is_kw("delete") {
            let kind = self.dml()?;
            self.eat_punct(";")?;
            return Ok(Stmt::Dml(kind));
        }

        // Remaining forms all start with a dot-chain: assignment,
        // `raise_application_error(...)`, or a standalone call.
        let chain = self.dot_chain()?;
        if chain.len() == 1 && chain[0].eq_ignore_ascii_case("raise_application_error") {
            self.eat_punct("(")?;
            let code = self.expr()?;
            self.eat_punct(",")?;
            let message = self.expr()?;
            self.eat_punct(")")?;
            self.eat_punct(";")?;
            return Ok(Stmt::RaiseApplicationError { code, message });
        }
        if self.at_punct(":=") {
            self.advance();
            let value = self.expr()?;
            self.eat_punct(";")?;
            return Ok(Stmt::Assign(Assignment { target: Expr::Ident(chain), value }));
        }
        if self.at_punct("(") {
            self.advance();
            let args = self.expr_list_until(")")?;
            self.eat_punct(")")?;
            let into = if self.is_kw("into") {
                self.advance();
                Some(self.expr()?)
            } else {
                None
            };
            self.eat_punct(";")?;
            return Ok(Stmt::Call { target: chain, args, into });
        }
        let into = if self.is_kw("into") {
            self.advance();
            Some(self.expr()?)
        } else {
            None
        };
        self.eat_punct(";")?;
        Ok(Stmt::Call { target: chain, args: Vec::new(), into })
    }

    fn parse_routine_body_inline(&mut self) -> PResult<(Vec<Declaration>, Vec<Stmt>, Vec<ExceptionHandler>)> {
        self.eat_kw("begin")?;
        let body = self.stmts_until(&["exception", "end"])?;
        let handlers = if self.is_kw("exception") {
            self.advance();
            self.exception_handlers()?
        } else {
            Vec::new()
        };
        self.eat_kw("end")?;
        self.eat_punct(";")?;
        Ok((Vec::new(), body, handlers))
    }

    /// Bare statement labels (`<<label>> LOOP ...`) aren't part of this
    /// reader's accepted input; `EXIT`/`CONTINUE` never carry one here.
    fn optional_label(&mut self) -> Option<String> {
        None
    }

    fn select_into_stmt(&mut self) -> PResult<Stmt> {
        self.advance();
        let select_list = self.select_list()?;
        self.eat_kw("into")?;
        let into = self.expr_list_simple()?;
        let from = self.from_clause()?;
        let where_clause = self.where_clause()?;
        let query = Box::new(Query::Block(QueryBlock {
            select_list,
            from,
            where_clause,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            connect_by: None,
        }));
        self.eat_punct(";")?;
        Ok(Stmt::SelectInto { query, into })
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        self.eat_kw("if")?;
        let mut branches = Vec::new();
        loop {
            let cond = self.expr()?;
            self.eat_kw("then")?;
            let body = self.stmts_until(&["elsif", "else", "end"])?;
            branches.push((cond, body));
            if self.is_kw("elsif") {
                self.advance();
                continue;
            }
            break;
        }
        let else_branch = if self.is_kw("else") {
            self.advance();
            Some(self.stmts_until(&["end"])?)
        } else {
            None
        };
        self.eat_kw("end")?;
        self.eat_kw("if")?;
        self.eat_punct(";")?;
        Ok(Stmt::If { branches, else_branch })
    }

    fn case_stmt(&mut self) -> PResult<Stmt> {
        self.eat_kw("case")?;
        let subject = if self.is_kw("when") { None } else { Some(self.expr()?) };
        let mut whens = Vec::new();
        while self.is_kw("when") {
            self.advance();
            let cond = self.expr()?;
            self.eat_kw("then")?;
            let body = self.stmts_until(&["when", "else", "end"])?;
            whens.push((cond, body));
        }
        let else_branch = if self.is_kw("else") {
            self.advance();
            Some(self.stmts_until(&["end"])?)
        } else {
            None
        };
        self.eat_kw("end")?;
        self.eat_kw("case")?;
        self.eat_punct(";")?;
        Ok(Stmt::CaseStmt { subject, whens, else_branch })
    }

    fn loop_stmt(&mut self) -> PResult<Stmt> {
        let kind = if self.is_kw("loop") {
            self.advance();
            LoopKind::Basic
        } else if self.is_kw("while") {
            self.advance();
            let cond = self.expr()?;
            self.eat_kw("loop")?;
            LoopKind::While(cond)
        } else {
            self.eat_kw("for")?;
            let var = self.ident()?;
            self.eat_kw("in")?;
            if self.at_punct("(") {
                self.advance();
                let query = Box::new(self.query()?);
                self.eat_punct(")")?;
                self.eat_kw("loop")?;
                LoopKind::CursorForSelect { record_var: var, query }
            } else {
                let reverse = if self.is_kw("reverse") {
                    self.advance();
                    true
                } else {
                    false
                };
                if matches!(self.peek(), Tok::Ident(_)) && !self.next_is_range_bound() {
                    let cursor_name = self.ident()?;
                    self.eat_kw("loop")?;
                    LoopKind::CursorForNamed { record_var: var, cursor_name }
                } else {
                    let lo = self.expr()?;
                    self.eat_punct("..")?;
                    let hi = self.expr()?;
                    self.eat_kw("loop")?;
                    LoopKind::NumericRange { var, reverse, lo, hi }
                }
            }
        };
        let body = self.stmts_until(&["end"])?;
        self.eat_kw("end")?;
        self.eat_kw("loop")?;
        self.eat_punct(";")?;
        Ok(Stmt::Loop { label: None, kind, body })
    }

    /// Disambiguates `FOR i IN lo..hi LOOP` from `FOR r IN cursor_name
    /// LOOP`: a bare identifier immediately followed by `..` is a range
    /// lower bound, not a cursor name.
    fn next_is_range_bound(&self) -> bool {
        matches!(self.toks.get(self.pos + 1), Some(Tok::Punct("..")))
    }

    fn dml(&mut self) -> PResult<DmlKind> {
        if self.is_kw("insert") {
            self.advance();
            self.eat_kw("into")?;
            let table = self.dot_chain()?;
            self.eat_punct("(")?;
            let mut columns = Vec::new();
            while !self.at_punct(")") {
                columns.push(self.ident()?);
                if self.at_punct(",") {
                    self.advance();
                } else {
                    break;
                }
            }
            self.eat_punct(")")?;
            self.eat_kw("values")?;
            self.eat_punct("(")?;
            let values = self.expr_list_until(")")?;
            self.eat_punct(")")?;
            return Ok(DmlKind::Insert { table, columns, values });
        }
        if self.is_kw("update") {
            self.advance();
            let table = self.dot_chain()?;
            let alias = if matches!(self.peek(), Tok::Ident(s) if !s.eq_ignore_ascii_case("set")) {
                Some(self.ident()?)
            } else {
                None
            };
            self.eat_kw("set")?;
            let mut assignments = Vec::new();
            loop {
                let col = self.ident()?;
                self.eat_punct("=")?;
                let value = self.expr()?;
                assignments.push(Assignment { target: Expr::Ident(vec![col]), value });
                if self.at_punct(",") {
                    self.advance();
                } else {
                    break;
                }
            }
            let where_clause = self.where_clause()?;
            return Ok(DmlKind::Update { table, alias, assignments, where_clause });
        }
        self.eat_kw("delete")?;
        if self.is_kw("from") {
            self.advance();
        }
        let table = self.dot_chain()?;
        let alias =
            if matches!(self.peek(), Tok::Ident(s) if !s.eq_ignore_ascii_case("where")) { Some(self.ident()?) } else { None };
        let where_clause = self.where_clause()?;
        Ok(DmlKind::Delete { table, alias, where_clause })
    }

    fn expr_list_until(&mut self, stop: &str) -> PResult<Vec<Expr>> {
        let mut exprs = Vec::new();
        if self.at_punct(stop) {
            return Ok(exprs);
        }
        exprs.push(self.expr()?);
        self.consume_outer_marker();
        while self.at_punct(",") {
            self.advance();
            exprs.push(self.expr()?);
            self.consume_outer_marker();
        }
        Ok(exprs)
    }

    // ---- queries ----

    fn query(&mut self) -> PResult<Query> {
        if self.is_kw("with") {
            self.advance();
            let mut ctes = Vec::new();
            loop {
                let name = self.ident()?;
                let columns = if self.at_punct("(") {
                    self.advance();
                    let mut cols = Vec::new();
                    while !self.at_punct(")") {
                        cols.push(self.ident()?);
                        if self.at_punct(",") {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    self.eat_punct(")")?;
                    cols
                } else {
                    Vec::new()
                };
                self.eat_kw("as")?;
                self.eat_punct("(")?;
                let query = Box::new(self.query()?);
                self.eat_punct(")")?;
                ctes.push(Cte { name, columns, query });
                if self.at_punct(",") {
                    self.advance();
                } else {
                    break;
                }
            }
            let body = Box::new(self.query()?);
            return Ok(Query::With { ctes, body });
        }
        let mut left = self.query_block()?;
        loop {
            let op = if self.is_kw("union") {
                self.advance();
                if self.is_kw("all") {
                    self.advance();
                    SetOp::UnionAll
                } else {
                    SetOp::Union
                }
            } else if self.is_kw("intersect") {
                self.advance();
                SetOp::Intersect
            } else if self.is_kw("minus") {
                self.advance();
                SetOp::Minus
            } else {
                break;
            };
            let right = self.query_block()?;
            left = Query::SetOp { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn query_block(&mut self) -> PResult<Query> {
        self.eat_kw("select")?;
        let select_list = self.select_list()?;
        let from = if self.is_kw("from") { self.from_clause()? } else { Vec::new() };
        let where_clause = self.where_clause()?;
        let connect_by = self.connect_by_clause()?;
        let group_by = if self.is_kw("group") {
            self.advance();
            self.eat_kw("by")?;
            self.expr_list_simple()?
        } else {
            Vec::new()
        };
        let having = if self.is_kw("having") {
            self.advance();
            Some(self.expr()?)
        } else {
            None
        };
        let order_by = if self.is_kw("order") {
            self.advance();
            self.eat_kw("by")?;
            self.order_by_list()?
        } else {
            Vec::new()
        };
        Ok(Query::Block(QueryBlock { select_list, from, where_clause, group_by, having, order_by, connect_by }))
    }

    fn connect_by_clause(&mut self) -> PResult<Option<ConnectBy>> {
        let start_with = if self.is_kw("start") {
            self.advance();
            self.eat_kw("with")?;
            Some(self.expr()?)
        } else {
            None
        };
        if self.is_kw("connect") {
            self.advance();
            self.eat_kw("by")?;
            let nocycle = if self.is_kw("nocycle") {
                self.advance();
                true
            } else {
                false
            };
            let condition = self.expr()?;
            return Ok(Some(ConnectBy { condition, start_with, nocycle }));
        }
        if start_with.is_some() {
            return Err("START WITH without CONNECT BY".to_string());
        }
        Ok(None)
    }

    fn expr_list_simple(&mut self) -> PResult<Vec<Expr>> {
        let mut v = vec![self.expr()?];
        while self.at_punct(",") {
            self.advance();
            v.push(self.expr()?);
        }
        Ok(v)
    }

    fn order_by_list(&mut self) -> PResult<Vec<OrderByItem>> {
        let mut items = vec![self.order_by_item()?];
        while self.at_punct(",") {
            self.advance();
            items.push(self.order_by_item()?);
        }
        Ok(items)
    }

    fn order_by_item(&mut self) -> PResult<OrderByItem> {
        let expr = self.expr()?;
        let desc = if self.is_kw("desc") {
            self.advance();
            true
        } else {
            if self.is_kw("asc") {
                self.advance();
            }
            false
        };
        let nulls = if self.is_kw("nulls") {
            self.advance();
            if self.is_kw("first") {
                self.advance();
                Some(NullsClause2::First)
            } else {
                self.eat_kw("last")?;
                Some(NullsClause2::Last)
            }
        } else {
            None
        };
        Ok(OrderByItem { expr, desc, nulls })
    }

    fn select_list(&mut self) -> PResult<Vec<SelectItem>> {
        let mut items = vec![self.select_item()?];
        while self.at_punct(",") {
            self.advance();
            items.push(self.select_item()?);
        }
        Ok(items)
    }

    fn select_item(&mut self) -> PResult<SelectItem> {
        if self.at_punct("*") {
            self.advance();
            return Ok(SelectItem { expr: Expr::NullLiteral, alias: None, is_star: true, star_qualifier: None });
        }
        let expr = self.expr()?;
        let alias = if self.is_kw("as") {
            self.advance();
            Some(self.ident()?)
        } else if matches!(self.peek(), Tok::Ident(s) if !is_clause_kw(s)) {
            Some(self.ident()?)
        } else {
            None
        };
        Ok(SelectItem { expr, alias, is_star: false, star_qualifier: None })
    }

    fn from_clause(&mut self) -> PResult<Vec<TableRef>> {
        self.eat_kw("from")?;
        let mut tables = vec![self.table_ref()?];
        while self.at_punct(",") {
            self.advance();
            tables.push(self.table_ref()?);
        }
        Ok(tables)
    }

    fn table_ref(&mut self) -> PResult<TableRef> {
        if self.at_punct("(") {
            self.advance();
            let query = Box::new(self.query()?);
            self.eat_punct(")")?;
            let alias = self.ident()?;
            return Ok(TableRef::Subquery { query, alias });
        }
        let name = self.dot_chain()?;
        let alias = if matches!(self.peek(), Tok::Ident(s) if !is_clause_kw(s)) { Some(self.ident()?) } else { None };
        Ok(TableRef::Base { name, alias })
    }

    fn where_clause(&mut self) -> PResult<Option<Expr>> {
        if self.is_kw("where") {
            self.advance();
            Ok(Some(self.expr()?))
        } else {
            Ok(None)
        }
    }

    // ---- expressions (precedence climbing) ----

    fn expr(&mut self) -> PResult<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> PResult<Expr> {
        let mut left = self.and_expr()?;
        while self.is_kw("or") {
            self.advance();
            let right = self.and_expr()?;
            left = bin(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> PResult<Expr> {
        let mut left = self.not_expr()?;
        while self.is_kw("and") {
            self.advance();
            let right = self.not_expr()?;
            left = bin(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> PResult<Expr> {
        if self.is_kw("not") {
            self.advance();
            let operand = Box::new(self.not_expr()?);
            return Ok(Expr::UnaryOp { op: UnaryOp::Not, operand });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> PResult<Expr> {
        self.outer_marker_seen = false;
        let left = self.concat_expr()?;
        let left_outer_marker = self.consume_outer_marker() || self.outer_marker_seen;
        let op = if self.at_punct("=") {
            self.advance();
            BinaryOp::Eq
        } else if self.at_punct("<>") {
            self.advance();
            BinaryOp::NotEq
        } else if self.at_punct("<=") {
            self.advance();
            BinaryOp::Le
        } else if self.at_punct(">=") {
            self.advance();
            BinaryOp::Ge
        } else if self.at_punct("<") {
            self.advance();
            BinaryOp::Lt
        } else if self.at_punct(">") {
            self.advance();
            BinaryOp::Gt
        } else if self.is_kw("is") {
            self.advance();
            let negate = if self.is_kw("not") {
                self.advance();
                true
            } else {
                false
            };
            self.eat_kw("null")?;
            return Ok(Expr::UnaryOp {
                op: if negate { UnaryOp::IsNotNull } else { UnaryOp::IsNull },
                operand: Box::new(left),
            });
        } else {
            return Ok(left);
        };
        self.outer_marker_seen = false;
        let right = self.concat_expr()?;
        let right_outer_marker = self.consume_outer_marker() || self.outer_marker_seen;
        Ok(Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right), left_outer_marker, right_outer_marker })
    }

    /// Consumes a trailing `(+)` if present, also recording it in
    /// `outer_marker_seen` so a caller further up the operand (e.g.
    /// `comparison()`) sees it even though it didn't consume it itself.
    fn consume_outer_marker(&mut self) -> bool {
        if self.at_punct("(+)") {
            self.advance();
            self.outer_marker_seen = true;
            true
        } else {
            false
        }
    }

    fn concat_expr(&mut self) -> PResult<Expr> {
        let first = self.additive()?;
        if !self.at_punct("||") {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.at_punct("||") {
            self.advance();
            parts.push(self.additive()?);
        }
        Ok(Expr::Concat(parts))
    }

    fn additive(&mut self) -> PResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.at_punct("+") {
                BinaryOp::Add
            } else if self.at_punct("-") {
                BinaryOp::Sub
            } else {
                break;
            };
            self.advance();
            let right = self.multiplicative()?;
            left = bin(op, left, right);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = if self.at_punct("*") {
                BinaryOp::Mul
            } else if self.at_punct("/") {
                BinaryOp::Div
            } else {
                break;
            };
            self.advance();
            let right = self.unary()?;
            left = bin(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.at_punct("-") {
            self.advance();
            let operand = Box::new(self.unary()?);
            return Ok(Expr::UnaryOp { op: UnaryOp::Neg, operand });
        }
        self.primary()
    }

    fn primary(&mut self) -> PResult<Expr> {
        if self.at_punct("(") {
            self.advance();
            let e = self.expr()?;
            self.eat_punct(")")?;
            return Ok(e);
        }
        match self.peek().clone() {
            Tok::Number(n) => {
                self.advance();
                if n.contains('.') {
                    Ok(Expr::NumLiteral(n))
                } else {
                    Ok(Expr::IntLiteral(n.parse().map_err(|_| format!("bad integer literal '{n}'"))?))
                }
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Expr::StringLiteral(s))
            }
            Tok::BindVar(name) => {
                self.advance();
                Ok(Expr::BindVar(name))
            }
            Tok::Ident(name) => {
                if name.eq_ignore_ascii_case("rownum") {
                    self.advance();
                    return Ok(Expr::Rownum);
                }
                if name.eq_ignore_ascii_case("sysdate") {
                    self.advance();
                    return Ok(Expr::Sysdate);
                }
                if name.eq_ignore_ascii_case("null") {
                    self.advance();
                    return Ok(Expr::NullLiteral);
                }
                if name.eq_ignore_ascii_case("case") {
                    return self.case_expr();
                }
                if name.eq_ignore_ascii_case("exists") {
                    self.advance();
                    self.eat_punct("(")?;
                    let q = Box::new(self.query()?);
                    self.eat_punct(")")?;
                    return Ok(Expr::Exists(q));
                }
                let chain = self.dot_chain()?;
                if self.at_punct("%") {
                    self.advance();
                    let attr_name = self.ident()?;
                    let attr = match attr_name.to_uppercase().as_str() {
                        "FOUND" => CursorAttr::Found,
                        "NOTFOUND" => CursorAttr::NotFound,
                        "ROWCOUNT" => CursorAttr::RowCount,
                        "ISOPEN" => CursorAttr::IsOpen,
                        other => return Err(format!("unknown cursor attribute '%{other}'")),
                    };
                    return Ok(Expr::CursorAttribute { cursor: chain.join("."), attr });
                }
                if self.at_punct("(") {
                    self.advance();
                    let distinct = if self.is_kw("distinct") {
                        self.advance();
                        true
                    } else {
                        false
                    };
                    if self.at_punct("*") && is_aggregate_name(chain.last().unwrap()) {
                        self.advance();
                        self.eat_punct(")")?;
                        return Ok(Expr::Aggregate { name: chain.join(".").to_lowercase(), distinct, args: Vec::new() });
                    }
                    let args = self.expr_list_until(")")?;
                    self.eat_punct(")")?;
                    if distinct || is_aggregate_name(chain.last().unwrap()) {
                        return Ok(Expr::Aggregate { name: chain.join(".").to_lowercase(), distinct, args });
                    }
                    return Ok(Expr::Call { target: chain, args });
                }
                Ok(Expr::Ident(chain))
            }
            other => Err(format!("unexpected token {other:?} in expression")),
        }
    }

    fn case_expr(&mut self) -> PResult<Expr> {
        self.eat_kw("case")?;
        let subject = if self.is_kw("when") { None } else { Some(Box::new(self.expr()?)) };
        let mut whens = Vec::new();
        while self.is_kw("when") {
            self.advance();
            let cond = self.expr()?;
            self.eat_kw("then")?;
            let result = self.expr()?;
            whens.push((cond, result));
        }
        let else_ = if self.is_kw("else") {
            self.advance();
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        self.eat_kw("end")?;
        Ok(Expr::Case { subject, whens, else_ })
    }
}

fn is_aggregate_name(name: &str) -> bool {
    matches!(name.to_uppercase().as_str(), "COUNT" | "SUM" | "AVG" | "MIN" | "MAX")
}

fn is_clause_kw(s: &str) -> bool {
    matches!(
        s.to_lowercase().as_str(),
        "from" | "where" | "group" | "having" | "order" | "connect" | "start" | "union" | "intersect" | "minus" | "as"
    )
}

fn bin(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right), left_outer_marker: false, right_outer_marker: false }
}
