//! Shunting-yard-via-precedence-climbing parser, turning the token
//! stream from [`crate::lexer`] into a [`crate::expr::Expr`] tree, and
//! lowering `SELECT ... FROM ... WHERE ...` into a
//! [`crate::expr::SelectSpec`] at parse time rather than leaving it to a
//! special-case evaluator path.
//!
//! Also houses the statement grammar (`crate::stmt::Stmt`): statements
//! reference expressions constantly enough that splitting the two
//! recursive-descent parsers across the token stream isn't worth the
//! indirection.

use crate::error::{ParseError, Result};
use crate::expr::{AssignOp, BinOp, Expr, JoinKind, ObjectMember, SelectSpec, UnOp};
use crate::lexer::{Keyword, Lexer, Token, TokenKind};
use crate::stmt::{Stmt, StmtKind};
use jvalue::{Number, Span, Value};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file_id: u32,
    /// Kept around only so a `name: ...` command statement can hand its
    /// plugin's `argparser` the original raw text rather than a
    /// re-rendered token stream.
    src: String,
}

/// Parses a single expression. Aggregate folding (the `AG` node wrap)
/// only happens inside `SELECT` column/`HAVING` expressions (see
/// [`Parser::parse_select`]) — a bare top-level aggregate call like
/// `sum(data.price)` is handled entirely at eval time via the
/// "aggregate with array first arg" dispatch, with no `AG` node
/// involved.
pub fn parse_expr(src: &str, file_id: u32) -> Result<Expr> {
    (|| {
        let mut p = Parser::new(src, file_id)?;
        let e = p.parse_assignment()?;
        p.expect_eof()?;
        Ok(e)
    })()
    .map_err(|err: ParseError| {
        tracing::debug!(%err, src, "expression parse failed");
        err
    })
}

/// Parses a `;`-separated sequence of statements into a single
/// [`Stmt::Block`].
pub fn parse_program(src: &str, file_id: u32) -> Result<Stmt> {
    let mut p = Parser::new(src, file_id)?;
    let block = p.parse_stmt_list(&[]);
    let block = block.and_then(|b| {
        p.expect_eof()?;
        Ok(b)
    });
    block
        .map(|block| Stmt { kind: StmtKind::Block(block), span: Span::new(file_id, 0, src.len() as u32) })
        .map_err(|err| {
            tracing::debug!(%err, src, "program parse failed");
            err
        })
}

impl Parser {
    fn new(src: &str, file_id: u32) -> Result<Self> {
        let tokens = Lexer::new(src, file_id).tokenize()?;
        Ok(Parser { tokens, pos: 0, file_id, src: src.to_string() })
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens.get(self.pos + offset).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek(), TokenKind::Punct(q) if *q == p)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &'static str) -> Result<Span> {
        let span = self.peek_span();
        if self.eat_punct(p) {
            Ok(span)
        } else {
            Err(self.unexpected(p))
        }
    }

    fn is_kw(&self, k: Keyword) -> bool {
        matches!(self.peek(), TokenKind::Keyword(kw) if *kw == k)
    }

    fn eat_kw(&mut self, k: Keyword) -> bool {
        if self.is_kw(k) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, k: Keyword, what: &'static str) -> Result<()> {
        if self.eat_kw(k) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.peek() {
            TokenKind::Eof => ParseError::UnexpectedEof { expected },
            other => ParseError::UnexpectedToken {
                found: other.to_string(),
                expected,
                span: self.peek_span(),
            },
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        if matches!(self.peek(), TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    // ---- expression grammar, loosest to tightest ----

    fn parse_assignment(&mut self) -> Result<Expr> {
        let lhs = self.parse_ternary()?;
        if self.eat_punct("=") {
            let rhs = self.parse_assignment()?;
            return Ok(Expr::Assign { op: AssignOp::Set, target: Box::new(lhs), value: Box::new(rhs) });
        }
        if self.eat_punct("?=") {
            let rhs = self.parse_assignment()?;
            return Ok(Expr::Assign {
                op: AssignOp::SetIfNotNull,
                target: Box::new(lhs),
                value: Box::new(rhs),
            });
        }
        if self.eat_punct("<<") {
            let rhs = self.parse_assignment()?;
            return Ok(Expr::Append { target: Box::new(lhs), value: Box::new(rhs) });
        }
        Ok(lhs)
    }

    fn parse_ternary(&mut self) -> Result<Expr> {
        let cond = self.parse_coalesce()?;
        if self.eat_punct("?") {
            let then_ = self.parse_assignment()?;
            self.expect_punct(":")?;
            let else_ = self.parse_assignment()?;
            return Ok(Expr::Ternary { cond: Box::new(cond), then: Box::new(then_), else_: Box::new(else_) });
        }
        Ok(cond)
    }

    /// `??` and `?:` are both treated as the coalesce operator: return the
    /// left side unless it's null, else the right. The distinct `?:`
    /// spelling also appears in object-literal member syntax, parsed
    /// separately in [`Parser::parse_object`].
    fn parse_coalesce(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_each_join()?;
        while self.eat_punct("??") || self.eat_punct("?:") {
            let rhs = self.parse_each_join()?;
            lhs = Expr::Coalesce { lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    /// The `@`/`@@`/`@=`/`@<`/`@>` family: each/group iteration and the
    /// three join kinds, bound looser than boolean operators so a whole
    /// boolean expression can serve as the each/join body.
    fn parse_each_join(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_or()?;
        loop {
            if self.eat_punct("@@") {
                let rhs = self.parse_or()?;
                lhs = Expr::Each { source: Box::new(lhs), body: Box::new(rhs), group: true };
            } else if self.eat_punct("@=") {
                let rhs = self.parse_or()?;
                lhs = Expr::Join { kind: JoinKind::Natural, left: Box::new(lhs), right: Box::new(rhs) };
            } else if self.eat_punct("@<") {
                let rhs = self.parse_or()?;
                lhs = Expr::Join { kind: JoinKind::Left, left: Box::new(lhs), right: Box::new(rhs) };
            } else if self.eat_punct("@>") {
                let rhs = self.parse_or()?;
                lhs = Expr::Join { kind: JoinKind::Right, left: Box::new(lhs), right: Box::new(rhs) };
            } else if self.eat_punct("@") {
                let rhs = self.parse_or()?;
                lhs = Expr::Each { source: Box::new(lhs), body: Box::new(rhs), group: false };
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat_kw(Keyword::Or) {
            let span = self.peek_span();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary { op: BinOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        while self.eat_kw(Keyword::And) {
            let span = self.peek_span();
            let rhs = self.parse_not()?;
            lhs = Expr::Binary { op: BinOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.is_kw(Keyword::Not) {
            let span = self.peek_span();
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary { op: UnOp::Not, operand: Box::new(operand), span });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let lhs = self.parse_between_like_in()?;
        let op = match self.peek() {
            TokenKind::Punct("==") => BinOp::Eq,
            TokenKind::Punct("===") => BinOp::StrictEq,
            TokenKind::Punct("!=") => BinOp::Ne,
            TokenKind::Punct("!==") => BinOp::StrictNe,
            TokenKind::Punct("<") => BinOp::Lt,
            TokenKind::Punct("<=") => BinOp::Le,
            TokenKind::Punct(">=") => BinOp::Ge,
            TokenKind::Punct(">") => BinOp::Gt,
            TokenKind::Punct("=*") => BinOp::CiEq,
            TokenKind::Punct("!=*") => BinOp::CiNe,
            _ => return Ok(lhs),
        };
        let span = self.peek_span();
        self.advance();
        let rhs = self.parse_between_like_in()?;
        Ok(Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span })
    }

    fn parse_between_like_in(&mut self) -> Result<Expr> {
        let lhs = self.parse_bitwise()?;
        if self.eat_kw(Keyword::Between) {
            let low = self.parse_bitwise()?;
            self.expect_kw(Keyword::And, "AND")?;
            let high = self.parse_bitwise()?;
            return Ok(Expr::Between { value: Box::new(lhs), low: Box::new(low), high: Box::new(high) });
        }
        if self.eat_kw(Keyword::Like) {
            let span = self.peek_span();
            let rhs = self.parse_bitwise()?;
            return Ok(Expr::Binary { op: BinOp::Like, lhs: Box::new(lhs), rhs: Box::new(rhs), span });
        }
        if self.is_kw(Keyword::Not) && matches!(self.peek_at(1), TokenKind::Keyword(Keyword::In)) {
            self.advance();
            self.advance();
            let span = self.peek_span();
            let rhs = self.parse_bitwise()?;
            return Ok(Expr::Binary { op: BinOp::NotIn, lhs: Box::new(lhs), rhs: Box::new(rhs), span });
        }
        if self.eat_kw(Keyword::In) {
            let span = self.peek_span();
            let rhs = self.parse_bitwise()?;
            return Ok(Expr::Binary { op: BinOp::In, lhs: Box::new(lhs), rhs: Box::new(rhs), span });
        }
        if self.eat_kw(Keyword::Is) {
            let negate = self.eat_kw(Keyword::Not);
            self.expect_kw(Keyword::Null, "NULL")?;
            return Ok(Expr::IsNull { value: Box::new(lhs), negate });
        }
        Ok(lhs)
    }

    fn parse_bitwise(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Punct("&") => BinOp::BitAnd,
                TokenKind::Punct("|") => BinOp::BitOr,
                TokenKind::Punct("^") => BinOp::BitXor,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            if self.eat_punct("...") || self.eat_punct("..") {
                let rhs = self.parse_multiplicative()?;
                lhs = Expr::Call {
                    name: "__range".to_string(),
                    args: vec![lhs, rhs],
                    span: self.peek_span(),
                    ag_offset: None,
                };
                continue;
            }
            let op = match self.peek() {
                TokenKind::Punct("+") => BinOp::Add,
                TokenKind::Punct("-") => BinOp::Sub,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Punct("*") => BinOp::Mul,
                TokenKind::Punct("/") => BinOp::Div,
                TokenKind::Punct("%") => BinOp::Mod,
                _ => break,
            };
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.is_punct("-") {
            let span = self.peek_span();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary { op: UnOp::Neg, operand: Box::new(operand), span });
        }
        if self.is_punct("~") {
            let span = self.peek_span();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary { op: UnOp::BitNot, operand: Box::new(operand), span });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_punct(".") {
                let name = self.expect_ident()?;
                if self.is_punct("(") {
                    let span = self.peek_span();
                    let mut args = vec![expr];
                    args.extend(self.parse_call_args()?);
                    expr = Expr::Call { name, args, span, ag_offset: None };
                } else {
                    expr = Expr::Member { object: Box::new(expr), name };
                }
                continue;
            }
            if self.eat_punct("..") {
                let name = self.expect_ident()?;
                expr = Expr::DeepMember { object: Box::new(expr), name };
                continue;
            }
            if self.eat_punct("[") {
                if let TokenKind::Ident(key) = self.peek().clone() {
                    if matches!(self.peek_at(1), TokenKind::Punct(":")) {
                        self.advance();
                        self.advance();
                        let value = self.parse_assignment()?;
                        self.expect_punct("]")?;
                        expr = Expr::KeyValueIndex { object: Box::new(expr), key, value: Box::new(value) };
                        continue;
                    }
                }
                let index = self.parse_assignment()?;
                self.expect_punct("]")?;
                expr = Expr::Index { object: Box::new(expr), index: Box::new(index) };
                continue;
            }
            if self.is_punct("(") {
                let span = self.peek_span();
                let args = self.parse_call_args()?;
                expr = match expr {
                    Expr::Name(name) => Expr::Call { name, args, span, ag_offset: None },
                    other => {
                        return Err(ParseError::Other(format!(
                            "cannot call non-function expression {other:?}"
                        )))
                    }
                };
                continue;
            }
            break;
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        if !self.is_punct(")") {
            loop {
                args.push(self.parse_assignment()?);
                if self.eat_punct(",") {
                    continue;
                }
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Number(text) => {
                self.advance();
                let n = Number::parse(&text).ok_or_else(|| ParseError::Other(format!("bad number {text:?}")))?;
                Ok(Expr::Literal(Value::Number(n)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            TokenKind::Regex { pattern, global, ignore_case } => {
                self.advance();
                Ok(Expr::Regex { pattern, global, ignore_case })
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::literal_null())
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                Ok(Expr::This)
            }
            TokenKind::Keyword(Keyword::Select) => {
                self.advance();
                self.parse_select()
            }
            TokenKind::Keyword(Keyword::Values) => {
                self.advance();
                self.expect_punct("(")?;
                let keys = self.parse_assignment()?;
                self.expect_punct(",")?;
                let values = self.parse_assignment()?;
                self.expect_punct(")")?;
                Ok(Expr::Values { keys: Box::new(keys), values: Box::new(values) })
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Name(name))
            }
            TokenKind::Punct("$") => {
                self.advance();
                let name = self.expect_ident()?;
                let suffix = if self.eat_punct("[") {
                    let e = self.parse_assignment()?;
                    self.expect_punct("]")?;
                    Some(Box::new(e))
                } else {
                    None
                };
                Ok(Expr::EnvVar { name, suffix })
            }
            TokenKind::Punct("(") => {
                self.advance();
                let inner = self.parse_assignment()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("[") => self.parse_array(),
            TokenKind::Punct("{") => self.parse_object(),
            _ => Err(ParseError::UnexpectedToken {
                found: self.peek().to_string(),
                expected: "expression",
                span,
            }),
        }
    }

    fn parse_array(&mut self) -> Result<Expr> {
        self.expect_punct("[")?;
        let mut items = Vec::new();
        if !self.is_punct("]") {
            loop {
                items.push(self.parse_assignment()?);
                if self.eat_punct(",") {
                    continue;
                }
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(Expr::Array(items))
    }

    fn parse_object(&mut self) -> Result<Expr> {
        self.expect_punct("{")?;
        let mut members = Vec::new();
        if !self.is_punct("}") {
            loop {
                let key = match self.peek().clone() {
                    TokenKind::Ident(name) => {
                        self.advance();
                        Expr::Literal(Value::string(name))
                    }
                    TokenKind::String(s) => {
                        self.advance();
                        Expr::Literal(Value::string(s))
                    }
                    TokenKind::Punct("[") => {
                        self.advance();
                        let e = self.parse_assignment()?;
                        self.expect_punct("]")?;
                        e
                    }
                    _ => return Err(self.unexpected("object member name")),
                };
                let skip_if_null = if self.eat_punct("?:") {
                    true
                } else {
                    self.expect_punct(":")?;
                    false
                };
                let value = self.parse_assignment()?;
                members.push(ObjectMember { key: Box::new(key), value: Box::new(value), skip_if_null });
                if self.eat_punct(",") {
                    continue;
                }
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Object(members))
    }

    /// Lowers a `SELECT` into a [`SelectSpec`], folding aggregate calls
    /// in the column list and `HAVING` clause into `AG` nodes since
    /// those are the only points a `SELECT` evaluates an expression once
    /// per group of rows.
    fn parse_select(&mut self) -> Result<Expr> {
        let distinct = self.eat_kw(Keyword::Distinct);
        let mut columns = Vec::new();
        loop {
            let expr = fold_aggregates(self.parse_assignment()?);
            let alias = if self.eat_kw(Keyword::As) { Some(self.expect_ident()?) } else { None };
            columns.push((Box::new(expr), alias));
            if self.eat_punct(",") {
                continue;
            }
            break;
        }
        let from = if self.eat_kw(Keyword::From) {
            Some(Box::new(self.parse_or()?))
        } else {
            None
        };
        let where_ = if self.eat_kw(Keyword::Where) {
            Some(Box::new(self.parse_or()?))
        } else {
            None
        };
        let mut group_by = Vec::new();
        if self.eat_kw(Keyword::Group) {
            self.expect_kw(Keyword::By, "BY")?;
            loop {
                group_by.push(Box::new(self.parse_or()?));
                if self.eat_punct(",") {
                    continue;
                }
                break;
            }
        }
        let having = if self.eat_kw(Keyword::Having) {
            Some(Box::new(fold_aggregates(self.parse_or()?)))
        } else {
            None
        };
        let mut order_by = Vec::new();
        if self.eat_kw(Keyword::Order) {
            self.expect_kw(Keyword::By, "BY")?;
            loop {
                let leading_desc = self.eat_kw(Keyword::True);
                let key = self.parse_or()?;
                let trailing_desc = self.eat_kw(Keyword::Descending);
                order_by.push((Box::new(key), leading_desc || trailing_desc));
                if self.eat_punct(",") {
                    continue;
                }
                break;
            }
        }
        let limit = if self.eat_kw(Keyword::Limit) { Some(Box::new(self.parse_or()?)) } else { None };
        Ok(Expr::Select(Box::new(SelectSpec {
            columns,
            from,
            where_,
            group_by,
            having,
            order_by,
            limit,
            distinct,
        })))
    }

    // ---- statements ----

    /// Parses statements until one of `terminators` is the next token (or
    /// end of input), consuming `;` separators between them.
    fn parse_stmt_list(&mut self, terminators: &[&str]) -> Result<Vec<Stmt>> {
        let mut out = Vec::new();
        loop {
            while self.eat_punct(";") {}
            if matches!(self.peek(), TokenKind::Eof)
                || terminators.iter().any(|t| self.is_punct(t))
            {
                break;
            }
            out.push(self.parse_stmt()?);
            while self.eat_punct(";") {}
        }
        Ok(out)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let span = self.peek_span();
        if self.is_punct("{") {
            self.advance();
            let body = self.parse_stmt_list(&["}"])?;
            self.expect_punct("}")?;
            return Ok(Stmt { kind: StmtKind::Block(body), span });
        }
        if self.eat_kw(Keyword::If) {
            self.expect_punct("(")?;
            let cond = self.parse_assignment()?;
            self.expect_punct(")")?;
            let then_branch = Box::new(self.parse_stmt()?);
            let else_branch = if self.eat_kw(Keyword::Else) {
                Some(Box::new(self.parse_stmt()?))
            } else {
                None
            };
            return Ok(Stmt { kind: StmtKind::If { cond, then_branch, else_branch }, span });
        }
        if self.eat_kw(Keyword::While) {
            self.expect_punct("(")?;
            let cond = self.parse_assignment()?;
            self.expect_punct(")")?;
            let body = Box::new(self.parse_stmt()?);
            return Ok(Stmt { kind: StmtKind::While { cond, body }, span });
        }
        if self.eat_kw(Keyword::For) {
            self.expect_punct("(")?;
            let init = if self.is_punct(";") { None } else { Some(Box::new(self.parse_stmt_no_semi()?)) };
            self.expect_punct(";")?;
            let cond = if self.is_punct(";") { None } else { Some(self.parse_assignment()?) };
            self.expect_punct(";")?;
            let step = if self.is_punct(")") { None } else { Some(self.parse_assignment()?) };
            self.expect_punct(")")?;
            let body = Box::new(self.parse_stmt()?);
            return Ok(Stmt { kind: StmtKind::For { init, cond, step, body }, span });
        }
        if self.eat_kw(Keyword::Break) {
            return Ok(Stmt { kind: StmtKind::Break, span });
        }
        if self.eat_kw(Keyword::Continue) {
            return Ok(Stmt { kind: StmtKind::Continue, span });
        }
        if self.eat_kw(Keyword::Return) {
            let value = if self.is_punct(";") || self.is_punct("}") || matches!(self.peek(), TokenKind::Eof) {
                None
            } else {
                Some(self.parse_assignment()?)
            };
            return Ok(Stmt { kind: StmtKind::Return(value), span });
        }
        if self.eat_kw(Keyword::Function) {
            let name = self.expect_ident()?;
            self.expect_punct("(")?;
            let mut params = Vec::new();
            if !self.is_punct(")") {
                loop {
                    params.push(self.expect_ident()?);
                    if self.eat_punct(",") {
                        continue;
                    }
                    break;
                }
            }
            self.expect_punct(")")?;
            let body = Box::new(self.parse_stmt()?);
            return Ok(Stmt { kind: StmtKind::FunctionDecl { name, params, body }, span });
        }
        self.parse_stmt_no_semi()
    }

    /// The subset of statement forms legal as a `for`-loop initializer:
    /// a declaration or a bare expression, neither of which consume a
    /// trailing `;` themselves (the caller does, uniformly).
    fn parse_stmt_no_semi(&mut self) -> Result<Stmt> {
        let span = self.peek_span();
        if self.eat_kw(Keyword::Var) || self.is_kw(Keyword::Const) {
            let is_const = self.is_kw(Keyword::Const);
            if is_const {
                self.advance();
            }
            let name = self.expect_ident()?;
            let init = if self.eat_punct("=") { Some(self.parse_assignment()?) } else { None };
            return Ok(Stmt { kind: StmtKind::VarDecl { is_const, name, init }, span });
        }
        if let Some(stmt) = self.try_parse_command(span)? {
            return Ok(stmt);
        }
        let expr = self.parse_assignment()?;
        Ok(Stmt { kind: StmtKind::ExprStmt(expr), span })
    }

    /// Recognizes `name: rest-of-statement` at statement position as a
    /// plugin command without needing the registry at parse time:
    /// whether `name` is actually a registered command is a runtime
    /// question (see `StmtKind::Command`'s handling in
    /// `crate::eval::run_stmt`), resolved against whatever commands the
    /// host has registered. This only captures the shape — a bare
    /// identifier immediately followed by `:` isn't otherwise valid at
    /// the start of an expression statement, so there's no ambiguity
    /// with e.g. `cond ? a : b` (which never starts with `:`) or an
    /// object literal's `key: value` (which never starts a statement).
    ///
    /// The raw text from just after the `:` up to the statement's
    /// top-level terminator (`;`, `}`, or end of input) is handed to
    /// the command's own `argparser` unparsed.
    fn try_parse_command(&mut self, span: Span) -> Result<Option<Stmt>> {
        let (TokenKind::Ident(name), TokenKind::Punct(colon)) = (self.peek().clone(), self.peek_at(1).clone())
        else {
            return Ok(None);
        };
        if colon != ":" {
            return Ok(None);
        }
        self.advance(); // name
        self.advance(); // ':'
        let arg_start = self.peek_span().start as usize;
        let mut depth = 0i32;
        loop {
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::Punct(p) if depth == 0 && (*p == ";" || *p == "}") => break,
                TokenKind::Punct(p) if p == "(" || p == "[" || p == "{" => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::Punct(p) if p == ")" || p == "]" || p == "}" => {
                    depth -= 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
        let arg_end = if self.pos > 0 { self.tokens[self.pos - 1].span.end as usize } else { arg_start };
        let arg_end = arg_end.max(arg_start);
        let arg = self.src[arg_start..arg_end].trim().to_string();
        Ok(Some(Stmt { kind: StmtKind::Command { name, arg }, span }))
    }
}

/// Walks `expr`, assigning each aggregate-call callsite an `ag_offset`
/// in evaluation order and, if any were found, wrapping the whole tree
/// in an `AggWrap`. A bare aggregate call is left alone
/// (`ag_offset: None`) — the evaluator treats that as the "aggregate
/// with array first arg" form instead.
fn fold_aggregates(expr: Expr) -> Expr {
    let mut offsets = Vec::new();
    let inner = assign_ag_offsets(expr, &mut offsets);
    if offsets.is_empty() {
        inner
    } else {
        Expr::AggWrap { inner: Box::new(inner), offsets }
    }
}

fn assign_ag_offsets(expr: Expr, offsets: &mut Vec<usize>) -> Expr {
    let rec = |e: Expr, offsets: &mut Vec<usize>| assign_ag_offsets(e, offsets);
    let rec_box = |e: Box<Expr>, offsets: &mut Vec<usize>| Box::new(assign_ag_offsets(*e, offsets));
    match expr {
        Expr::Call { name, args, span, ag_offset } => {
            let args = args.into_iter().map(|a| rec(a, offsets)).collect();
            if ag_offset.is_none() && crate::builtins::is_aggregate_name(&name) {
                let off = offsets.len();
                offsets.push(off);
                Expr::Call { name, args, span, ag_offset: Some(off) }
            } else {
                Expr::Call { name, args, span, ag_offset }
            }
        }
        Expr::Binary { op, lhs, rhs, span } => {
            Expr::Binary { op, lhs: rec_box(lhs, offsets), rhs: rec_box(rhs, offsets), span }
        }
        Expr::Unary { op, operand, span } => Expr::Unary { op, operand: rec_box(operand, offsets), span },
        Expr::Ternary { cond, then, else_ } => Expr::Ternary {
            cond: rec_box(cond, offsets),
            then: rec_box(then, offsets),
            else_: rec_box(else_, offsets),
        },
        Expr::Coalesce { lhs, rhs } => Expr::Coalesce { lhs: rec_box(lhs, offsets), rhs: rec_box(rhs, offsets) },
        Expr::Member { object, name } => Expr::Member { object: rec_box(object, offsets), name },
        Expr::DeepMember { object, name } => Expr::DeepMember { object: rec_box(object, offsets), name },
        Expr::Index { object, index } => {
            Expr::Index { object: rec_box(object, offsets), index: rec_box(index, offsets) }
        }
        Expr::KeyValueIndex { object, key, value } => {
            Expr::KeyValueIndex { object: rec_box(object, offsets), key, value: rec_box(value, offsets) }
        }
        Expr::Between { value, low, high } => Expr::Between {
            value: rec_box(value, offsets),
            low: rec_box(low, offsets),
            high: rec_box(high, offsets),
        },
        Expr::IsNull { value, negate } => Expr::IsNull { value: rec_box(value, offsets), negate },
        Expr::Array(items) => Expr::Array(items.into_iter().map(|e| rec(e, offsets)).collect()),
        Expr::Object(members) => Expr::Object(
            members
                .into_iter()
                .map(|m| ObjectMember {
                    key: rec_box(m.key, offsets),
                    value: rec_box(m.value, offsets),
                    skip_if_null: m.skip_if_null,
                })
                .collect(),
        ),
        Expr::Assign { op, target, value } => {
            Expr::Assign { op, target: rec_box(target, offsets), value: rec_box(value, offsets) }
        }
        Expr::Append { target, value } => {
            Expr::Append { target: rec_box(target, offsets), value: rec_box(value, offsets) }
        }
        Expr::Each { source, body, group } => {
            Expr::Each { source: rec_box(source, offsets), body: rec_box(body, offsets), group }
        }
        Expr::Join { kind, left, right } => {
            Expr::Join { kind, left: rec_box(left, offsets), right: rec_box(right, offsets) }
        }
        Expr::Values { keys, values } => {
            Expr::Values { keys: rec_box(keys, offsets), values: rec_box(values, offsets) }
        }
        other @ (Expr::Literal(_)
        | Expr::Name(_)
        | Expr::This
        | Expr::EnvVar { .. }
        | Expr::Regex { .. }
        | Expr::Select(_)
        | Expr::AggWrap { .. }) => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_arithmetic_with_precedence() {
        let e = parse_expr("5 + 3 * 2", 0).unwrap();
        assert!(matches!(e, Expr::Binary { op: BinOp::Add, .. }));
    }

    #[test]
    fn parses_method_call_sugar() {
        let e = parse_expr("x.f(1)", 0).unwrap();
        let Expr::Call { name, args, .. } = e else { panic!("expected call") };
        assert_eq!(name, "f");
        assert_eq!(args.len(), 2);
        assert!(matches!(args[0], Expr::Name(_)));
    }

    #[test]
    fn parses_each_operator() {
        let e = parse_expr("[1,2,3,4] @ this * 2", 0).unwrap();
        assert!(matches!(e, Expr::Each { group: false, .. }));
    }

    #[test]
    fn parses_bitwise_union_on_objects() {
        let e = parse_expr("{x:1} | {y:2}", 0).unwrap();
        assert!(matches!(e, Expr::Binary { op: BinOp::BitOr, .. }));
    }

    #[test]
    fn parses_select_with_group_by_wraps_aggregate_column() {
        let e = parse_expr("SELECT a, sum(b) FROM data GROUP BY a ORDER BY a", 0).unwrap();
        let Expr::Select(spec) = e else { panic!("expected select") };
        assert_eq!(spec.columns.len(), 2);
        assert!(matches!(&*spec.columns[1].0, Expr::AggWrap { .. }));
        assert!(spec.from.is_some());
        assert_eq!(spec.group_by.len(), 1);
        assert_eq!(spec.order_by.len(), 1);
    }

    #[test]
    fn parses_key_value_subscript() {
        let e = parse_expr("data[id:5]", 0).unwrap();
        assert!(matches!(e, Expr::KeyValueIndex { .. }));
    }

    #[test]
    fn parses_between_like_in() {
        assert!(matches!(parse_expr("x BETWEEN 1 AND 10", 0).unwrap(), Expr::Between { .. }));
        assert!(matches!(
            parse_expr("\"Hello\" LIKE \"h_llo\"", 0).unwrap(),
            Expr::Binary { op: BinOp::Like, .. }
        ));
        assert!(matches!(parse_expr("x IN y", 0).unwrap(), Expr::Binary { op: BinOp::In, .. }));
    }

    #[test]
    fn parses_object_skip_if_null_member() {
        let e = parse_expr("{a: 1, b ?: null}", 0).unwrap();
        let Expr::Object(members) = e else { panic!("expected object") };
        assert!(!members[0].skip_if_null);
        assert!(members[1].skip_if_null);
    }

    #[test]
    fn parses_if_while_program() {
        let stmt = parse_program("if (x > 0) { y = 1; } else { y = 2; }", 0).unwrap();
        let StmtKind::Block(body) = stmt.kind else { panic!() };
        assert_eq!(body.len(), 1);
        assert!(matches!(body[0].kind, StmtKind::If { .. }));
    }
}
