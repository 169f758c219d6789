//! Recursive-descent parser
//!
//! Precedence, loosest first: `lambda`, conditional expression, `or`, `and`,
//! `not`, comparisons, `+ -`, `* / // %`, unary sign, `**`, calls/subscripts.

use crate::ast::{BinOp, CmpOp, Expr, FunctionDef, Program, Stmt, Target, UnaryOp};
use crate::error::{ScriptError, ScriptResult};
use crate::lexer::{tokenize, Tok, Token};
use std::sync::Arc;

const KEYWORDS: &[&str] = &[
    "and", "assert", "break", "continue", "def", "elif", "else", "for", "from", "if", "import",
    "in", "is", "lambda", "not", "or", "pass", "return", "while", "None", "True", "False",
];

/// Parse a statement block
pub fn parse_program(src: &str) -> ScriptResult<Program> {
    let mut parser = Parser::new(tokenize(src)?);
    let mut body = Vec::new();
    parser.skip_newlines();
    while !parser.at(&Tok::Eof) {
        body.push(parser.statement()?);
        parser.skip_newlines();
    }
    Ok(Program { body })
}

/// Parse a single expression; anything after it is an error
pub fn parse_expression(src: &str) -> ScriptResult<Expr> {
    let mut parser = Parser::new(tokenize(src)?);
    parser.skip_newlines();
    let expr = parser.expr_list()?;
    parser.skip_newlines();
    if !parser.at(&Tok::Eof) {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.pos)
            .map_or(&Tok::Eof, |t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if n == kw)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> ScriptResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(ScriptError::syntax(
                self.line(),
                format!("expected '{op}', found {}", describe(self.peek())),
            ))
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> ScriptResult<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(ScriptError::syntax(
                self.line(),
                format!("expected '{kw}', found {}", describe(self.peek())),
            ))
        }
    }

    fn identifier(&mut self) -> ScriptResult<String> {
        match self.peek().clone() {
            Tok::Name(name) if !KEYWORDS.contains(&name.as_str()) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(ScriptError::syntax(
                self.line(),
                format!("expected a name, found {}", describe(self.peek())),
            )),
        }
    }

    fn unexpected(&self) -> ScriptError {
        ScriptError::syntax(self.line(), format!("unexpected {}", describe(self.peek())))
    }

    fn skip_newlines(&mut self) {
        while self.at(&Tok::Newline) {
            self.pos += 1;
        }
    }

    fn end_of_simple(&mut self) -> ScriptResult<()> {
        match self.peek() {
            Tok::Newline => {
                self.pos += 1;
                Ok(())
            }
            Tok::Eof | Tok::Dedent => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    // ---- statements -----------------------------------------------------

    fn statement(&mut self) -> ScriptResult<Stmt> {
        if self.eat_keyword("if") {
            return self.if_statement();
        }
        if self.eat_keyword("while") {
            let cond = self.expr()?;
            let body = self.block()?;
            return Ok(Stmt::While(cond, body));
        }
        if self.eat_keyword("for") {
            let target = self.target_list()?;
            self.expect_keyword("in")?;
            let iter = self.expr_list()?;
            let body = self.block()?;
            return Ok(Stmt::For(target, iter, body));
        }
        if self.eat_keyword("def") {
            let name = self.identifier()?;
            self.expect_op("(")?;
            let params = self.params(")")?;
            self.expect_op(")")?;
            let body = self.block()?;
            return Ok(Stmt::Def(Arc::new(FunctionDef { name, params, body })));
        }
        let stmt = self.simple_statement()?;
        self.end_of_simple()?;
        Ok(stmt)
    }

    fn if_statement(&mut self) -> ScriptResult<Stmt> {
        let mut branches = Vec::new();
        let cond = self.expr()?;
        branches.push((cond, self.block()?));
        let mut orelse = Vec::new();
        loop {
            if self.eat_keyword("elif") {
                let cond = self.expr()?;
                branches.push((cond, self.block()?));
            } else if self.eat_keyword("else") {
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If { branches, orelse })
    }

    /// `':' simple_stmt NEWLINE` or `':' NEWLINE INDENT stmt+ DEDENT`
    fn block(&mut self) -> ScriptResult<Vec<Stmt>> {
        self.expect_op(":")?;
        if !self.at(&Tok::Newline) {
            let stmt = self.simple_statement()?;
            self.end_of_simple()?;
            return Ok(vec![stmt]);
        }
        self.skip_newlines();
        if !self.at(&Tok::Indent) {
            return Err(ScriptError::syntax(self.line(), "expected an indented block"));
        }
        self.pos += 1;
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(&Tok::Dedent) {
                self.pos += 1;
                break;
            }
            if self.at(&Tok::Eof) {
                break;
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn simple_statement(&mut self) -> ScriptResult<Stmt> {
        if self.eat_keyword("pass") {
            return Ok(Stmt::Pass);
        }
        if self.eat_keyword("break") {
            return Ok(Stmt::Break);
        }
        if self.eat_keyword("continue") {
            return Ok(Stmt::Continue);
        }
        if self.eat_keyword("return") {
            if matches!(self.peek(), Tok::Newline | Tok::Eof | Tok::Dedent) {
                return Ok(Stmt::Return(None));
            }
            return Ok(Stmt::Return(Some(self.expr_list()?)));
        }
        if self.eat_keyword("assert") {
            let cond = self.expr()?;
            let msg = if self.eat_op(",") { Some(self.expr()?) } else { None };
            return Ok(Stmt::Assert(cond, msg));
        }
        if self.eat_keyword("from") {
            let module = self.identifier()?;
            self.expect_keyword("import")?;
            if self.eat_op("*") {
                return Ok(Stmt::Import { module, names: None });
            }
            let mut names = vec![self.identifier()?];
            while self.eat_op(",") {
                names.push(self.identifier()?);
            }
            return Ok(Stmt::Import {
                module,
                names: Some(names),
            });
        }

        let expr = self.expr_list()?;
        if self.eat_op("=") {
            let target = to_target(expr, self.line())?;
            let value = self.expr_list()?;
            return Ok(Stmt::Assign(target, value));
        }
        for (symbol, op) in AUGMENTED {
            if self.eat_op(symbol) {
                let Expr::Name(name) = expr else {
                    return Err(ScriptError::syntax(
                        self.line(),
                        "augmented assignment needs a plain name",
                    ));
                };
                let value = self.expr_list()?;
                return Ok(Stmt::AugAssign(name, *op, value));
            }
        }
        Ok(Stmt::Expr(expr))
    }

    fn target_list(&mut self) -> ScriptResult<Target> {
        let first = Target::Name(self.identifier()?);
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_keyword("in") {
                break;
            }
            items.push(Target::Name(self.identifier()?));
        }
        Ok(Target::Tuple(items))
    }

    fn params(&mut self, close: &str) -> ScriptResult<Vec<String>> {
        let mut params = Vec::new();
        while !self.at_op(close) {
            let name = self.identifier()?;
            if params.contains(&name) {
                return Err(ScriptError::syntax(
                    self.line(),
                    format!("duplicate argument '{name}'"),
                ));
            }
            params.push(name);
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(params)
    }

    // ---- expressions ----------------------------------------------------

    /// Comma-separated expressions; more than one (or a trailing comma) is a tuple
    fn expr_list(&mut self) -> ScriptResult<Expr> {
        let first = self.expr()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.ends_expr_list() {
                break;
            }
            items.push(self.expr()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn ends_expr_list(&self) -> bool {
        matches!(self.peek(), Tok::Newline | Tok::Eof | Tok::Dedent)
            || self.at_op(")")
            || self.at_op("]")
            || self.at_op("=")
    }

    fn expr(&mut self) -> ScriptResult<Expr> {
        if self.eat_keyword("lambda") {
            let params = self.params(":")?;
            self.expect_op(":")?;
            let body = self.expr()?;
            return Ok(Expr::Lambda(Arc::new(FunctionDef {
                name: "<lambda>".to_string(),
                params,
                body: vec![Stmt::Return(Some(body))],
            })));
        }
        let then = self.or_expr()?;
        if self.eat_keyword("if") {
            let cond = self.or_expr()?;
            self.expect_keyword("else")?;
            let orelse = self.expr()?;
            return Ok(Expr::IfElse {
                cond: Box::new(cond),
                then: Box::new(then),
                orelse: Box::new(orelse),
            });
        }
        Ok(then)
    }

    fn or_expr(&mut self) -> ScriptResult<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> ScriptResult<Expr> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> ScriptResult<Expr> {
        if self.eat_keyword("not") {
            let inner = self.not_expr()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ScriptResult<Expr> {
        let first = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek() {
            Tok::Op("==") => CmpOp::Eq,
            Tok::Op("!=") => CmpOp::Ne,
            Tok::Op("<") => CmpOp::Lt,
            Tok::Op("<=") => CmpOp::Le,
            Tok::Op(">") => CmpOp::Gt,
            Tok::Op(">=") => CmpOp::Ge,
            Tok::Name(n) if n == "in" => CmpOp::In,
            Tok::Name(n) if n == "is" => {
                self.pos += 1;
                return Some(if self.eat_keyword("not") { CmpOp::IsNot } else { CmpOp::Is });
            }
            Tok::Name(n) if n == "not" => {
                let next_is_in = matches!(
                    self.tokens.get(self.pos + 1).map(|t| &t.tok),
                    Some(Tok::Name(n)) if n == "in"
                );
                if !next_is_in {
                    return None;
                }
                self.pos += 2;
                return Some(CmpOp::NotIn);
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn arith(&mut self) -> ScriptResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = if self.eat_op("+") {
                BinOp::Add
            } else if self.eat_op("-") {
                BinOp::Sub
            } else {
                break;
            };
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> ScriptResult<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = if self.eat_op("*") {
                BinOp::Mul
            } else if self.eat_op("/") {
                BinOp::Div
            } else if self.eat_op("//") {
                BinOp::FloorDiv
            } else if self.eat_op("%") {
                BinOp::Mod
            } else {
                break;
            };
            let right = self.factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn factor(&mut self) -> ScriptResult<Expr> {
        if self.eat_op("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.factor()?)));
        }
        if self.eat_op("+") {
            return Ok(Expr::Unary(UnaryOp::Pos, Box::new(self.factor()?)));
        }
        self.power()
    }

    fn power(&mut self) -> ScriptResult<Expr> {
        let base = self.postfix()?;
        if self.eat_op("**") {
            // right-associative, and binds tighter than a unary sign on its left
            let exp = self.factor()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> ScriptResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op("(") {
                let mut args = Vec::new();
                while !self.at_op(")") {
                    args.push(self.expr()?);
                    if !self.eat_op(",") {
                        break;
                    }
                }
                self.expect_op(")")?;
                expr = Expr::Call(Box::new(expr), args);
            } else if self.eat_op("[") {
                expr = self.subscript(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn subscript(&mut self, target: Expr) -> ScriptResult<Expr> {
        let start = if self.at_op(":") { None } else { Some(Box::new(self.expr()?)) };
        if self.eat_op(":") {
            let stop = if self.at_op("]") { None } else { Some(Box::new(self.expr()?)) };
            self.expect_op("]")?;
            return Ok(Expr::Slice {
                target: Box::new(target),
                start,
                stop,
            });
        }
        self.expect_op("]")?;
        let index = start.ok_or_else(|| ScriptError::syntax(self.line(), "empty subscript"))?;
        Ok(Expr::Index(Box::new(target), index))
    }

    fn atom(&mut self) -> ScriptResult<Expr> {
        let line = self.line();
        match self.advance() {
            Tok::Int(v) => Ok(Expr::Int(v)),
            Tok::Float(v) => Ok(Expr::Float(v)),
            Tok::Str(mut s) => {
                // adjacent literals concatenate
                while let Tok::Str(next) = self.peek().clone() {
                    self.pos += 1;
                    s.push_str(&next);
                }
                Ok(Expr::Str(s))
            }
            Tok::Name(name) => match name.as_str() {
                "None" => Ok(Expr::None),
                "True" => Ok(Expr::Bool(true)),
                "False" => Ok(Expr::Bool(false)),
                kw if KEYWORDS.contains(&kw) => {
                    Err(ScriptError::syntax(line, format!("unexpected keyword '{kw}'")))
                }
                _ => Ok(Expr::Name(name)),
            },
            Tok::Op("(") => {
                if self.eat_op(")") {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let inner = self.expr_list()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Tok::Op("[") => {
                let mut items = Vec::new();
                while !self.at_op("]") {
                    items.push(self.expr()?);
                    if !self.eat_op(",") {
                        break;
                    }
                }
                self.expect_op("]")?;
                Ok(Expr::List(items))
            }
            other => Err(ScriptError::syntax(line, format!("unexpected {}", describe(&other)))),
        }
    }
}

const AUGMENTED: &[(&str, BinOp)] = &[
    ("+=", BinOp::Add),
    ("-=", BinOp::Sub),
    ("*=", BinOp::Mul),
    ("/=", BinOp::Div),
    ("//=", BinOp::FloorDiv),
    ("%=", BinOp::Mod),
    ("**=", BinOp::Pow),
];

fn to_target(expr: Expr, line: usize) -> ScriptResult<Target> {
    match expr {
        Expr::Name(name) => Ok(Target::Name(name)),
        Expr::Tuple(items) | Expr::List(items) => items
            .into_iter()
            .map(|e| to_target(e, line))
            .collect::<ScriptResult<Vec<_>>>()
            .map(Target::Tuple),
        _ => Err(ScriptError::syntax(line, "cannot assign to expression")),
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Int(v) => format!("number {v}"),
        Tok::Float(v) => format!("number {v}"),
        Tok::Str(_) => "string literal".to_string(),
        Tok::Name(n) => format!("'{n}'"),
        Tok::Op(op) => format!("'{op}'"),
        Tok::Newline => "end of line".to_string(),
        Tok::Indent => "indent".to_string(),
        Tok::Dedent => "dedent".to_string(),
        Tok::Eof => "end of input".to_string(),
    }
}
