use thiserror::Error;

use crate::ast::{AssignTarget, BinaryOp, Block, Expr, ExternalKind, LambdaBody, Param, Program, Stmt, UnaryOp};
use crate::lexer::{Lexer, Span, Spanned, Token};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] crate::lexer::Error),
    #[error("{0}: expected {1}, got {2:?}")]
    Expected(Span, &'static str, Token),
    #[error("{0}: unexpected end of input")]
    UnexpectedEof(Span),
    #[error("{0}: illegal {1}")]
    Illegal(Span, &'static str),
}

pub fn parse(src: &str) -> Result<Program, Error> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(src, tokens).parse_program()
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Spanned<Token>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, tokens: Vec<Spanned<Token>>) -> Self {
        Self { src, tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].value
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn advance(&mut self) -> Spanned<Token> {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, tok: &Token) -> bool {
        self.peek() == tok
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.check(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Token, what: &'static str) -> Result<Spanned<Token>, Error> {
        if self.check(tok) {
            Ok(self.advance())
        } else {
            Err(Error::Expected(self.peek_span(), what, self.peek().clone()))
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Token::Newline | Token::Semicolon) {
            self.advance();
        }
    }

    fn expect_terminator(&mut self) -> Result<(), Error> {
        if matches!(self.peek(), Token::Newline | Token::Semicolon | Token::Eof) {
            self.skip_newlines();
            Ok(())
        } else if matches!(self.peek(), Token::RBrace) {
            Ok(())
        } else {
            Err(Error::Expected(self.peek_span(), "newline or ';'", self.peek().clone()))
        }
    }

    fn expect_ident(&mut self, what: &'static str) -> Result<String, Error> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(Error::Expected(self.peek_span(), what, other)),
        }
    }

    // ---- top level ----

    fn parse_program(mut self) -> Result<Program, Error> {
        let mut stmts = Vec::new();
        self.skip_newlines();

        while !self.check(&Token::Eof) {
            stmts.push(self.parse_stmt()?);
            self.skip_newlines();
        }

        Ok(Program { stmts })
    }

    fn parse_block(&mut self) -> Result<Block, Error> {
        self.expect(&Token::LBrace, "'{'")?;
        self.skip_newlines();

        let mut stmts = Vec::new();

        while !self.check(&Token::RBrace) {
            stmts.push(self.parse_stmt()?);
            self.skip_newlines();
        }

        self.expect(&Token::RBrace, "'}'")?;
        Ok(Block { stmts })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, Error> {
        self.expect(&Token::LParen, "'('")?;
        let mut params = Vec::new();

        while !self.check(&Token::RParen) {
            let name = self.expect_ident("parameter name")?;
            params.push(Param { name });

            if !self.eat(&Token::Comma) {
                break;
            }
        }

        self.expect(&Token::RParen, "')'")?;
        Ok(params)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, Error> {
        let span = self.peek_span();

        match self.peek().clone() {
            Token::Var => self.parse_var_decl(),
            Token::Fn => self.parse_fn_decl(false),
            Token::Static if self.tokens.get(self.pos + 1).map(|t| &t.value) == Some(&Token::Fn) => {
                self.advance();
                self.parse_fn_decl(true)
            }
            Token::Class => self.parse_class_decl(),
            Token::External => self.parse_external_decl(),
            Token::Import => self.parse_import(),
            Token::Print => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_terminator()?;
                Ok(Stmt::Print(expr))
            }
            Token::Assert => self.parse_assert(),
            Token::Return => self.parse_return(),
            Token::Break => {
                self.advance();
                self.expect_terminator()?;
                Ok(Stmt::Break(span))
            }
            Token::Continue => {
                self.advance();
                self.expect_terminator()?;
                Ok(Stmt::Continue(span))
            }
            Token::If => self.parse_if(),
            Token::For => self.parse_for(),
            _ => self.parse_expr_or_assign_stmt(),
        }
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, Error> {
        let span = self.peek_span();
        self.advance(); // var
        let name = self.expect_ident("variable name")?;

        let ty = if self.eat(&Token::Colon) {
            Some(self.expect_ident("type name")?)
        } else {
            None
        };

        let init = if self.eat(&Token::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        self.expect_terminator()?;
        Ok(Stmt::VarDecl { name, ty, init, span })
    }

    fn parse_fn_decl(&mut self, is_static: bool) -> Result<Stmt, Error> {
        self.advance(); // fn
        let name = self.expect_ident("function name")?;
        let params = self.parse_params()?;
        self.skip_newlines_in_signature();
        let body = self.parse_block()?;

        Ok(Stmt::FuncDecl {
            name,
            is_static,
            params,
            body,
        })
    }

    fn skip_newlines_in_signature(&mut self) {
        while matches!(self.peek(), Token::Newline) {
            self.advance();
        }
    }

    fn parse_class_decl(&mut self) -> Result<Stmt, Error> {
        let span = self.peek_span();
        self.advance(); // class
        let name = self.expect_ident("class name")?;
        self.skip_newlines_in_signature();
        let body = self.parse_block()?;
        Ok(Stmt::ClassDecl { name, body, span })
    }

    fn parse_external_decl(&mut self) -> Result<Stmt, Error> {
        self.advance(); // external
        let kind = match self.peek().clone() {
            Token::Class => {
                self.advance();
                ExternalKind::Class
            }
            Token::Fn => {
                self.advance();
                ExternalKind::Function
            }
            other => return Err(Error::Expected(self.peek_span(), "'class' or 'fn'", other)),
        };

        let name = self.expect_ident("external name")?;
        self.expect_terminator()?;
        Ok(Stmt::ExternalDecl { kind, name })
    }

    fn parse_import(&mut self) -> Result<Stmt, Error> {
        let span = self.peek_span();
        self.advance(); // import

        let relative = self.eat(&Token::Dot);
        let mut path = vec![self.expect_ident("import path segment")?];

        while self.eat(&Token::Dot) {
            path.push(self.expect_ident("import path segment")?);
        }

        self.expect_terminator()?;
        Ok(Stmt::Import { path, relative, span })
    }

    fn parse_assert(&mut self) -> Result<Stmt, Error> {
        let span = self.peek_span();
        self.advance(); // assert
        self.expect(&Token::LParen, "'('")?;

        let cond_start = self.peek_span().offset;
        let cond = self.parse_expr()?;
        let cond_end = self.peek_span().offset;
        let cond_src = self.src[cond_start..cond_end].trim().to_string();

        let message = if self.eat(&Token::Comma) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        self.expect(&Token::RParen, "')'")?;
        self.expect_terminator()?;

        Ok(Stmt::Assert {
            cond,
            cond_src,
            message,
            span,
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Error> {
        let span = self.peek_span();
        self.advance(); // return

        let value = if matches!(self.peek(), Token::Newline | Token::Semicolon | Token::Eof | Token::RBrace) {
            None
        } else {
            Some(self.parse_expr()?)
        };

        self.expect_terminator()?;
        Ok(Stmt::Return { value, span })
    }

    fn parse_if(&mut self) -> Result<Stmt, Error> {
        self.advance(); // if
        let mut branches = Vec::new();

        let cond = self.parse_expr()?;
        self.skip_newlines_in_signature();
        let body = self.parse_block()?;
        branches.push((cond, body));

        let mut else_branch = None;

        loop {
            self.skip_newlines_lookahead();

            if self.eat(&Token::Elif) {
                let cond = self.parse_expr()?;
                self.skip_newlines_in_signature();
                let body = self.parse_block()?;
                branches.push((cond, body));
            } else if self.eat(&Token::Else) {
                self.skip_newlines_in_signature();
                else_branch = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }

        Ok(Stmt::If { branches, else_branch })
    }

    // `elif`/`else` may follow on the next line after a closing brace;
    // peek past newlines without consuming them if nothing matches.
    fn skip_newlines_lookahead(&mut self) {
        let save = self.pos;

        while matches!(self.peek(), Token::Newline) {
            self.advance();
        }

        if !matches!(self.peek(), Token::Elif | Token::Else) {
            self.pos = save;
        }
    }

    fn parse_for(&mut self) -> Result<Stmt, Error> {
        let span = self.peek_span();
        self.advance(); // for
        let var = self.expect_ident("loop variable")?;
        self.expect(&Token::In, "'in'")?;
        let iter = self.parse_expr()?;
        self.skip_newlines_in_signature();
        let body = self.parse_block()?;
        Ok(Stmt::For { var, iter, body, span })
    }

    fn parse_expr_or_assign_stmt(&mut self) -> Result<Stmt, Error> {
        let span = self.peek_span();
        let expr = self.parse_expr()?;

        if self.eat(&Token::Assign) {
            let target = expr_to_assign_target(expr, span)?;
            let value = self.parse_expr()?;
            self.expect_terminator()?;
            return Ok(Stmt::Assign { target, value, span });
        }

        self.expect_terminator()?;
        Ok(Stmt::ExprStmt(expr))
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Expr, Error> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_and()?;

        loop {
            let span = self.peek_span();
            let op = match self.peek() {
                Token::OrOr => BinaryOp::Or,
                Token::XorXor => BinaryOp::Xor,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }

        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_equality()?;

        while self.check(&Token::AndAnd) {
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }

        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_relational()?;

        loop {
            let span = self.peek_span();
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }

        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_additive()?;

        loop {
            let span = self.peek_span();
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::LtEq => BinaryOp::LtEq,
                Token::Gt => BinaryOp::Gt,
                Token::GtEq => BinaryOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }

        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_multiplicative()?;

        loop {
            let span = self.peek_span();
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }

        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_power()?;

        loop {
            let span = self.peek_span();
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_power()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }

        Ok(lhs)
    }

    // Right associative.
    fn parse_power(&mut self) -> Result<Expr, Error> {
        let lhs = self.parse_unary()?;

        if self.check(&Token::StarStar) {
            let span = self.peek_span();
            self.advance();
            let rhs = self.parse_power()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            });
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        let span = self.peek_span();

        let op = match self.peek() {
            Token::Minus => Some(UnaryOp::Neg),
            Token::Bang => Some(UnaryOp::Not),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let rhs = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                rhs: Box::new(rhs),
                span,
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = self.parse_primary()?;

        loop {
            let span = self.peek_span();

            if self.eat(&Token::Dot) {
                let name = self.expect_ident("field name")?;
                expr = Expr::Field {
                    base: Box::new(expr),
                    name,
                    span,
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_expr()?;
                self.expect(&Token::RBracket, "']'")?;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                    span,
                };
            } else if self.check(&Token::LParen) {
                let args = self.parse_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, Error> {
        self.expect(&Token::LParen, "'('")?;
        let mut args = Vec::new();

        while !self.check(&Token::RParen) {
            args.push(self.parse_expr()?);

            if !self.eat(&Token::Comma) {
                break;
            }
        }

        self.expect(&Token::RParen, "')'")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        let span = self.peek_span();

        match self.peek().clone() {
            Token::None => {
                self.advance();
                Ok(Expr::None)
            }
            Token::Bool(b) => {
                self.advance();
                Ok(Expr::Bool(b))
            }
            Token::Int(n) => {
                self.advance();
                Ok(Expr::Int(n))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::SelfKw => {
                self.advance();
                Ok(Expr::SelfExpr)
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            Token::LBracket => self.parse_vector_literal(),
            Token::LBrace => self.parse_map_literal(),
            Token::Fn => self.parse_lambda(),
            other => Err(Error::Expected(span, "expression", other)),
        }
    }

    fn parse_vector_literal(&mut self) -> Result<Expr, Error> {
        self.expect(&Token::LBracket, "'['")?;
        let mut elems = Vec::new();

        while !self.check(&Token::RBracket) {
            elems.push(self.parse_expr()?);

            if !self.eat(&Token::Comma) {
                break;
            }
        }

        self.expect(&Token::RBracket, "']'")?;
        Ok(Expr::Vector(elems))
    }

    fn parse_map_literal(&mut self) -> Result<Expr, Error> {
        self.expect(&Token::LBrace, "'{'")?;
        let mut entries = Vec::new();

        while !self.check(&Token::RBrace) {
            let key = self.parse_expr()?;
            self.expect(&Token::Colon, "':'")?;
            let value = self.parse_expr()?;
            entries.push((key, value));

            if !self.eat(&Token::Comma) {
                break;
            }
        }

        self.expect(&Token::RBrace, "'}'")?;
        Ok(Expr::Map(entries))
    }

    fn parse_lambda(&mut self) -> Result<Expr, Error> {
        self.advance(); // fn
        let params = self.parse_params()?;

        if self.check(&Token::LBrace) {
            let body = self.parse_block()?;
            Ok(Expr::Lambda {
                params,
                body: LambdaBody::Block(body),
            })
        } else {
            let expr = self.parse_expr()?;
            Ok(Expr::Lambda {
                params,
                body: LambdaBody::Expr(Box::new(expr)),
            })
        }
    }
}

fn expr_to_assign_target(expr: Expr, span: Span) -> Result<AssignTarget, Error> {
    match expr {
        Expr::Ident(name) => Ok(AssignTarget::Ident(name)),
        Expr::Field { base, name, .. } => Ok(AssignTarget::Field { base: *base, name }),
        Expr::Index { base, index, .. } => Ok(AssignTarget::Index {
            base: *base,
            index: *index,
        }),
        _ => Err(Error::Illegal(span, "assignment target")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_and_binary() {
        let prog = parse("var x = 1 + 2 * 3\n").unwrap();
        assert_eq!(prog.stmts.len(), 1);
        match &prog.stmts[0] {
            Stmt::VarDecl { name, init: Some(_), .. } => assert_eq!(name, "x"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_if_elif_else() {
        let prog = parse("if a == 1 {\n print a\n} elif a == 2 {\n print a\n} else {\n print a\n}\n").unwrap();
        match &prog.stmts[0] {
            Stmt::If { branches, else_branch } => {
                assert_eq!(branches.len(), 2);
                assert!(else_branch.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_for_loop() {
        let prog = parse("for x in [1, 2, 3] {\n print x\n}\n").unwrap();
        assert!(matches!(prog.stmts[0], Stmt::For { .. }));
    }

    #[test]
    fn parse_call_chain() {
        let prog = parse("cc.compile([\"a.c\"])\n").unwrap();
        assert!(matches!(prog.stmts[0], Stmt::ExprStmt(Expr::Call { .. })));
    }

    #[test]
    fn parse_assert_with_message() {
        let prog = parse(r#"assert(1 == 2, "nope")"#).unwrap();
        assert!(matches!(prog.stmts[0], Stmt::Assert { message: Some(_), .. }));
    }
}
