use std::rc::Rc;

use crate::foundation::error::{ImagegenError, ImagegenResult};
use crate::script::ast::{BinaryOp, Block, Expr, FuncBody, Stmt, TableField, UnaryOp};
use crate::script::lexer::{Token, TokenKind, lex};

/// Parse a whole template chunk.
pub(crate) fn parse_chunk(chunk: &str, src: &str) -> ImagegenResult<Block> {
    let tokens = lex(chunk, src)?;
    let mut p = Parser {
        chunk,
        tokens,
        pos: 0,
    };
    let block = p.block()?;
    p.expect(TokenKind::Eof)?;
    Ok(block)
}

struct Parser<'a> {
    chunk: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

// Binding powers, lowest first. `..` and `^` are right associative.
fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8, u8)> {
    Some(match kind {
        TokenKind::Or => (BinaryOp::Or, 1, 2),
        TokenKind::And => (BinaryOp::And, 3, 4),
        TokenKind::EqEq => (BinaryOp::Eq, 5, 6),
        TokenKind::Ne => (BinaryOp::Ne, 5, 6),
        TokenKind::Lt => (BinaryOp::Lt, 5, 6),
        TokenKind::Le => (BinaryOp::Le, 5, 6),
        TokenKind::Gt => (BinaryOp::Gt, 5, 6),
        TokenKind::Ge => (BinaryOp::Ge, 5, 6),
        TokenKind::DotDot => (BinaryOp::Concat, 8, 7),
        TokenKind::Plus => (BinaryOp::Add, 9, 10),
        TokenKind::Minus => (BinaryOp::Sub, 9, 10),
        TokenKind::Star => (BinaryOp::Mul, 11, 12),
        TokenKind::Slash => (BinaryOp::Div, 11, 12),
        TokenKind::Percent => (BinaryOp::Mod, 11, 12),
        TokenKind::Caret => (BinaryOp::Pow, 15, 14),
        _ => return None,
    })
}

const UNARY_BP: u8 = 13;

impl Parser<'_> {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, off: usize) -> &TokenKind {
        let i = (self.pos + off).min(self.tokens.len() - 1);
        &self.tokens[i].kind
    }

    fn line(&self) -> usize {
        self.tokens[self.pos].line
    }

    fn bump(&mut self) -> TokenKind {
        let t = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, msg: impl std::fmt::Display) -> ImagegenError {
        ImagegenError::script(format!("{}:{}: {msg}", self.chunk, self.line()))
    }

    fn expect(&mut self, kind: TokenKind) -> ImagegenResult<()> {
        if *self.peek() == kind {
            self.bump();
            Ok(())
        } else {
            Err(self.err(format!("expected {kind:?}, found {:?}", self.peek())))
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if *self.peek() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> ImagegenResult<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Ok(name)
            }
            other => Err(self.err(format!("expected name, found {other:?}"))),
        }
    }

    fn block_ends(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Eof | TokenKind::End | TokenKind::Else | TokenKind::Elseif
        )
    }

    fn block(&mut self) -> ImagegenResult<Block> {
        let mut stmts = Vec::new();
        while !self.block_ends() {
            if self.consume(TokenKind::Semi) {
                continue;
            }
            if matches!(self.peek(), TokenKind::Return) {
                self.bump();
                let values = if self.block_ends() || *self.peek() == TokenKind::Semi {
                    Vec::new()
                } else {
                    self.expr_list()?
                };
                self.consume(TokenKind::Semi);
                stmts.push(Stmt::Return { values });
                if !self.block_ends() {
                    return Err(self.err("'return' must be the last statement in a block"));
                }
                break;
            }
            stmts.push(self.statement()?);
        }
        Ok(Block { stmts })
    }

    fn statement(&mut self) -> ImagegenResult<Stmt> {
        let line = self.line();
        match self.peek() {
            TokenKind::Local => {
                self.bump();
                if self.consume(TokenKind::Function) {
                    let name = self.ident()?;
                    let func = self.func_body(line)?;
                    return Ok(Stmt::LocalFunction { name, func });
                }
                let mut names = vec![self.ident()?];
                while self.consume(TokenKind::Comma) {
                    names.push(self.ident()?);
                }
                let values = if self.consume(TokenKind::Assign) {
                    self.expr_list()?
                } else {
                    Vec::new()
                };
                Ok(Stmt::Local {
                    names,
                    values,
                    line,
                })
            }
            TokenKind::Function => {
                self.bump();
                // function a.b.c(...) is sugar for a.b.c = function(...)
                let mut target = Expr::Name(self.ident()?);
                while self.consume(TokenKind::Dot) {
                    let key = self.ident()?;
                    target = Expr::Index {
                        obj: Box::new(target),
                        key: Box::new(Expr::Str(Rc::from(key.as_str()))),
                        line,
                    };
                }
                let func = self.func_body(line)?;
                Ok(Stmt::Assign {
                    targets: vec![target],
                    values: vec![Expr::Function(func)],
                    line,
                })
            }
            TokenKind::Do => {
                self.bump();
                let body = self.block()?;
                self.expect(TokenKind::End)?;
                Ok(Stmt::Do(body))
            }
            TokenKind::If => {
                self.bump();
                let mut branches = Vec::new();
                let cond = self.expr()?;
                self.expect(TokenKind::Then)?;
                branches.push((cond, self.block()?));
                let mut otherwise = None;
                loop {
                    if self.consume(TokenKind::Elseif) {
                        let cond = self.expr()?;
                        self.expect(TokenKind::Then)?;
                        branches.push((cond, self.block()?));
                    } else if self.consume(TokenKind::Else) {
                        otherwise = Some(self.block()?);
                        self.expect(TokenKind::End)?;
                        break;
                    } else {
                        self.expect(TokenKind::End)?;
                        break;
                    }
                }
                Ok(Stmt::If {
                    branches,
                    otherwise,
                })
            }
            TokenKind::While => {
                self.bump();
                let cond = self.expr()?;
                self.expect(TokenKind::Do)?;
                let body = self.block()?;
                self.expect(TokenKind::End)?;
                Ok(Stmt::While { cond, body })
            }
            TokenKind::For => {
                self.bump();
                let first = self.ident()?;
                if self.consume(TokenKind::Assign) {
                    let start = self.expr()?;
                    self.expect(TokenKind::Comma)?;
                    let end = self.expr()?;
                    let step = if self.consume(TokenKind::Comma) {
                        Some(self.expr()?)
                    } else {
                        None
                    };
                    self.expect(TokenKind::Do)?;
                    let body = self.block()?;
                    self.expect(TokenKind::End)?;
                    return Ok(Stmt::NumericFor {
                        var: first,
                        start,
                        end,
                        step,
                        body,
                        line,
                    });
                }
                let mut vars = vec![first];
                while self.consume(TokenKind::Comma) {
                    vars.push(self.ident()?);
                }
                self.expect(TokenKind::In)?;
                let iter = self.expr()?;
                self.expect(TokenKind::Do)?;
                let body = self.block()?;
                self.expect(TokenKind::End)?;
                Ok(Stmt::GenericFor {
                    vars,
                    iter,
                    body,
                    line,
                })
            }
            TokenKind::Break => {
                self.bump();
                Ok(Stmt::Break)
            }
            _ => self.expr_statement(line),
        }
    }

    fn expr_statement(&mut self, line: usize) -> ImagegenResult<Stmt> {
        let first = self.suffixed_expr()?;
        if matches!(self.peek(), TokenKind::Assign | TokenKind::Comma) {
            let mut targets = vec![first];
            while self.consume(TokenKind::Comma) {
                targets.push(self.suffixed_expr()?);
            }
            self.expect(TokenKind::Assign)?;
            for t in &targets {
                if !matches!(t, Expr::Name(_) | Expr::Index { .. }) {
                    return Err(self.err("cannot assign to this expression"));
                }
            }
            let values = self.expr_list()?;
            return Ok(Stmt::Assign {
                targets,
                values,
                line,
            });
        }
        if matches!(first, Expr::Call { .. }) {
            Ok(Stmt::Call { call: first })
        } else {
            Err(self.err("syntax error: expected assignment or function call"))
        }
    }

    fn func_body(&mut self, line: usize) -> ImagegenResult<Rc<FuncBody>> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.consume(TokenKind::RParen) {
            loop {
                params.push(self.ident()?);
                if self.consume(TokenKind::RParen) {
                    break;
                }
                self.expect(TokenKind::Comma)?;
            }
        }
        let body = self.block()?;
        self.expect(TokenKind::End)?;
        Ok(Rc::new(FuncBody { params, body, line }))
    }

    fn expr_list(&mut self) -> ImagegenResult<Vec<Expr>> {
        let mut out = vec![self.expr()?];
        while self.consume(TokenKind::Comma) {
            out.push(self.expr()?);
        }
        Ok(out)
    }

    fn expr(&mut self) -> ImagegenResult<Expr> {
        self.expr_bp(0)
    }

    fn expr_bp(&mut self, min_bp: u8) -> ImagegenResult<Expr> {
        let line = self.line();
        let unary = match self.peek() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Hash => Some(UnaryOp::Len),
            _ => None,
        };
        let mut left = if let Some(op) = unary {
            self.bump();
            let expr = self.expr_bp(UNARY_BP)?;
            Expr::Unary {
                op,
                expr: Box::new(expr),
                line,
            }
        } else {
            self.simple_expr()?
        };

        loop {
            let Some((op, lbp, rbp)) = binary_op(self.peek()) else {
                break;
            };
            if lbp < min_bp {
                break;
            }
            let line = self.line();
            self.bump();
            let right = self.expr_bp(rbp)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn simple_expr(&mut self) -> ImagegenResult<Expr> {
        let line = self.line();
        match self.peek().clone() {
            TokenKind::Nil => {
                self.bump();
                Ok(Expr::Nil)
            }
            TokenKind::True => {
                self.bump();
                Ok(Expr::True)
            }
            TokenKind::False => {
                self.bump();
                Ok(Expr::False)
            }
            TokenKind::Number(n) => {
                self.bump();
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.bump();
                Ok(Expr::Str(Rc::from(s.as_str())))
            }
            TokenKind::LBrace => self.table(),
            TokenKind::Function => {
                self.bump();
                Ok(Expr::Function(self.func_body(line)?))
            }
            _ => self.suffixed_expr(),
        }
    }

    fn primary_expr(&mut self) -> ImagegenResult<Expr> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Ok(Expr::Name(name))
            }
            TokenKind::LParen => {
                self.bump();
                let e = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            other => Err(self.err(format!("unexpected {other:?}"))),
        }
    }

    fn suffixed_expr(&mut self) -> ImagegenResult<Expr> {
        let mut e = self.primary_expr()?;
        loop {
            let line = self.line();
            match self.peek().clone() {
                TokenKind::Dot => {
                    self.bump();
                    let key = self.ident()?;
                    e = Expr::Index {
                        obj: Box::new(e),
                        key: Box::new(Expr::Str(Rc::from(key.as_str()))),
                        line,
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let key = self.expr()?;
                    self.expect(TokenKind::RBracket)?;
                    e = Expr::Index {
                        obj: Box::new(e),
                        key: Box::new(key),
                        line,
                    };
                }
                TokenKind::LParen => {
                    self.bump();
                    let args = if self.consume(TokenKind::RParen) {
                        Vec::new()
                    } else {
                        let args = self.expr_list()?;
                        self.expect(TokenKind::RParen)?;
                        args
                    };
                    e = Expr::Call {
                        callee: Box::new(e),
                        args,
                        line,
                    };
                }
                TokenKind::LBrace => {
                    let arg = self.table()?;
                    e = Expr::Call {
                        callee: Box::new(e),
                        args: vec![arg],
                        line,
                    };
                }
                TokenKind::Str(s) => {
                    self.bump();
                    e = Expr::Call {
                        callee: Box::new(e),
                        args: vec![Expr::Str(Rc::from(s.as_str()))],
                        line,
                    };
                }
                _ => return Ok(e),
            }
        }
    }

    fn table(&mut self) -> ImagegenResult<Expr> {
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.consume(TokenKind::RBrace) {
            let named = *self.peek_at(1) == TokenKind::Assign;
            let field = match self.peek().clone() {
                TokenKind::Ident(name) if named => {
                    self.bump();
                    self.bump();
                    TableField::Named(Rc::from(name.as_str()), self.expr()?)
                }
                TokenKind::LBracket => {
                    self.bump();
                    let key = self.expr()?;
                    self.expect(TokenKind::RBracket)?;
                    self.expect(TokenKind::Assign)?;
                    TableField::Keyed(key, self.expr()?)
                }
                _ => TableField::Positional(self.expr()?),
            };
            fields.push(field);
            if !(self.consume(TokenKind::Comma) || self.consume(TokenKind::Semi)) {
                self.expect(TokenKind::RBrace)?;
                break;
            }
        }
        Ok(Expr::Table(fields))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/script/parser.rs"]
mod tests;
