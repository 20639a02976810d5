use anyhow::Result;

use crate::lexer::Lexer;
use crate::parser::ast::{IterKind, Node};
use crate::parser::precedence::power;
use crate::token::{Token, TokenKind};

pub mod ast;
mod precedence;

/// Pratt parser over the scanner's token stream. Prefix, infix and keyword
/// dispatch are direct matches on the token kind / keyword literal; the
/// `allow_destruct` counter decides whether `{` and `[` open literals or
/// binding patterns, exactly at the positions where patterns are legal.
pub struct Parser {
    lexer: Lexer,
    curr: Token,
    peek: Token,
    allow_destruct: u32,
    no_in: bool,
}

pub fn parse_str(source: &str) -> Result<Node> {
    Parser::new(source).parse()
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let mut lexer = Lexer::new(source);
        let curr = scan_skipping_comments(&mut lexer);
        let peek = scan_skipping_comments(&mut lexer);
        Self {
            lexer,
            curr,
            peek,
            allow_destruct: 0,
            no_in: false,
        }
    }

    /// Parses the whole program. On a statement error the parser resyncs to
    /// the next EOL and keeps going; the first error is reported at the end.
    pub fn parse(&mut self) -> Result<Node> {
        let mut nodes = Vec::new();
        let mut first_error = None;
        while !self.done() {
            self.skip_eol();
            if self.done() {
                break;
            }
            if let Some(label) = self.take_label() {
                nodes.push(label);
                continue;
            }
            match self.parse_node(precedence::LOWEST) {
                Ok(node) => {
                    nodes.push(node);
                    self.skip_eol();
                }
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                    self.resync();
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(Node::block_or_node(nodes)),
        }
    }

    fn parse_node(&mut self, pow: i32) -> Result<Node> {
        let mut left = self.parse_prefix()?;
        while !self.done() && !self.is(TokenKind::Eol) && pow < self.current_power() {
            left = self.parse_infix(left)?;
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Node> {
        match self.curr.kind {
            TokenKind::Number => self.parse_number(),
            TokenKind::Str => self.parse_string(),
            TokenKind::Boolean => self.parse_bool(),
            TokenKind::Ident => self.parse_identifier(),
            TokenKind::Keyword => self.parse_keyword(),
            TokenKind::Template => self.parse_template(),
            TokenKind::Add
            | TokenKind::Sub
            | TokenKind::Not
            | TokenKind::Bnot
            | TokenKind::Increment
            | TokenKind::Decrement => self.parse_unary(),
            TokenKind::Lparen => self.parse_group(),
            TokenKind::Lbrace => self.parse_brace(),
            TokenKind::Lsquare => self.parse_square(),
            TokenKind::Spread => self.parse_spread(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_infix(&mut self, left: Node) -> Result<Node> {
        match self.curr.kind {
            TokenKind::Eq
            | TokenKind::Seq
            | TokenKind::Ne
            | TokenKind::Sne
            | TokenKind::Lt
            | TokenKind::Le
            | TokenKind::Gt
            | TokenKind::Ge
            | TokenKind::Add
            | TokenKind::Sub
            | TokenKind::Mul
            | TokenKind::Div
            | TokenKind::Pow
            | TokenKind::Mod
            | TokenKind::Nullish
            | TokenKind::And
            | TokenKind::Or
            | TokenKind::Lshift
            | TokenKind::Rshift
            | TokenKind::Band
            | TokenKind::Bor
            | TokenKind::Bxor => self.parse_binary(left),
            kind if kind.strip_assign().is_some() => self.parse_assign(left),
            TokenKind::Question => self.parse_ternary(left),
            TokenKind::Lparen => self.parse_call(left),
            TokenKind::Lsquare => self.parse_index(left),
            TokenKind::Arrow => self.parse_arrow(left),
            TokenKind::Dot | TokenKind::Optional => self.parse_member(left),
            TokenKind::Keyword => self.parse_operator_keyword(left),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_keyword(&mut self) -> Result<Node> {
        match self.curr.literal.as_str() {
            "let" => self.parse_let(),
            "const" => self.parse_const(),
            "if" => self.parse_if(),
            "else" => self.parse_else(),
            "switch" => self.parse_switch(),
            "case" => self.parse_case(),
            "for" => self.parse_for(),
            "do" => self.parse_do(),
            "while" => self.parse_while(),
            "break" => self.parse_break(),
            "continue" => self.parse_continue(),
            "try" => self.parse_try(),
            "catch" => self.parse_catch(),
            "finally" => self.parse_finally(),
            "throw" => self.parse_throw(),
            "function" => self.parse_function(),
            "return" => self.parse_return(),
            "null" => self.parse_null(),
            "undefined" => self.parse_undefined(),
            "typeof" => self.parse_typeof(),
            "import" => self.parse_import(),
            "export" => self.parse_export(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_number(&mut self) -> Result<Node> {
        let digits = self.curr.literal.clone();
        let parsed = if let Some(rest) = digits.strip_prefix("0x") {
            i64::from_str_radix(rest, 16).ok().map(|n| n as f64)
        } else if let Some(rest) = digits.strip_prefix("0o") {
            i64::from_str_radix(rest, 8).ok().map(|n| n as f64)
        } else if let Some(rest) = digits.strip_prefix("0b") {
            i64::from_str_radix(rest, 2).ok().map(|n| n as f64)
        } else {
            digits.parse::<f64>().ok()
        };
        let Some(value) = parsed else {
            return Err(self.unexpected());
        };
        self.next();
        Ok(Node::Number(value))
    }

    fn parse_string(&mut self) -> Result<Node> {
        let node = Node::Str(self.curr.literal.clone());
        self.next();
        Ok(node)
    }

    fn parse_bool(&mut self) -> Result<Node> {
        let node = Node::Bool(self.curr.literal == "true");
        self.next();
        Ok(node)
    }

    fn parse_identifier(&mut self) -> Result<Node> {
        let node = Node::var(self.curr.literal.clone());
        self.next();
        Ok(node)
    }

    fn parse_null(&mut self) -> Result<Node> {
        self.next();
        Ok(Node::Null)
    }

    fn parse_undefined(&mut self) -> Result<Node> {
        self.next();
        Ok(Node::Undefined)
    }

    fn parse_typeof(&mut self) -> Result<Node> {
        self.next();
        let node = self.parse_node(precedence::UNARY)?;
        Ok(Node::Typeof(Box::new(node)))
    }

    fn parse_unary(&mut self) -> Result<Node> {
        let op = self.curr.kind;
        self.next();
        let expr = self.parse_node(precedence::UNARY)?;
        Ok(Node::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_spread(&mut self) -> Result<Node> {
        self.next();
        let node = self.parse_node(precedence::ASSIGN)?;
        Ok(Node::spread(node))
    }

    fn parse_group(&mut self) -> Result<Node> {
        self.expect(TokenKind::Lparen)?;
        let mut nodes = Vec::new();
        while !self.done() && !self.is(TokenKind::Rparen) {
            nodes.push(self.parse_node(precedence::COMMA)?);
            if self.is(TokenKind::Comma) {
                self.next();
                if self.is(TokenKind::Rparen) {
                    return Err(self.unexpected());
                }
            } else if !self.is(TokenKind::Rparen) {
                return Err(self.unexpected());
            }
        }
        self.expect(TokenKind::Rparen)?;
        Ok(Node::Seq(nodes))
    }

    fn parse_brace(&mut self) -> Result<Node> {
        if self.allow_destruct > 0 {
            self.parse_object_binding()
        } else {
            self.parse_object()
        }
    }

    fn parse_object(&mut self) -> Result<Node> {
        self.expect(TokenKind::Lbrace)?;
        let mut list = Vec::new();
        while !self.done() && !self.is(TokenKind::Rbrace) {
            let ident = self.expect_property_name()?;
            if self.is(TokenKind::Comma) || self.is(TokenKind::Rbrace) {
                // shorthand entry
                list.push((ident.clone(), Node::Var(ident)));
                if self.is(TokenKind::Comma) {
                    self.next();
                }
                continue;
            }
            self.expect(TokenKind::Colon)?;
            let node = self.parse_node(precedence::COMMA)?;
            list.push((ident, node));
            if self.is(TokenKind::Comma) {
                self.next();
            } else if !self.is(TokenKind::Rbrace) {
                return Err(self.unexpected());
            }
        }
        self.expect(TokenKind::Rbrace)?;
        Ok(Node::Object(list))
    }

    fn parse_object_binding(&mut self) -> Result<Node> {
        self.expect(TokenKind::Lbrace)?;
        let mut list = Vec::new();
        while !self.done() && !self.is(TokenKind::Rbrace) {
            if self.is(TokenKind::Spread) {
                self.next();
                if !self.is(TokenKind::Ident) {
                    return Err(self.unexpected());
                }
                let rest = self.curr.literal.clone();
                self.next();
                if !self.is(TokenKind::Rbrace) {
                    return Err(self.unexpected());
                }
                list.push((rest.clone(), Node::spread(Node::Var(rest))));
                continue;
            }
            let ident = self.expect_property_name()?;
            let mut target = Node::Var(ident.clone());
            if self.is(TokenKind::Colon) {
                self.next();
                target = match self.curr.kind {
                    TokenKind::Lbrace => self.parse_object_binding()?,
                    TokenKind::Lsquare => self.parse_array_binding()?,
                    TokenKind::Ident => {
                        let renamed = Node::Var(self.curr.literal.clone());
                        self.next();
                        renamed
                    }
                    _ => return Err(self.unexpected()),
                };
            }
            if self.is(TokenKind::Assign) {
                self.next();
                let default = self.parse_node(precedence::COMMA)?;
                target = Node::assign(target, default);
            }
            list.push((ident, target));
            if self.is(TokenKind::Comma) {
                self.next();
            } else if !self.is(TokenKind::Rbrace) {
                return Err(self.unexpected());
            }
        }
        self.expect(TokenKind::Rbrace)?;
        Ok(Node::BindingObject(list))
    }

    fn parse_square(&mut self) -> Result<Node> {
        if self.allow_destruct > 0 {
            self.parse_array_binding()
        } else {
            self.parse_array()
        }
    }

    fn parse_array(&mut self) -> Result<Node> {
        self.expect(TokenKind::Lsquare)?;
        let mut list = Vec::new();
        while !self.done() && !self.is(TokenKind::Rsquare) {
            if self.is(TokenKind::Comma) {
                self.next();
                list.push(Node::Discard);
                continue;
            }
            list.push(self.parse_node(precedence::COMMA)?);
            if self.is(TokenKind::Comma) {
                self.next();
            } else if !self.is(TokenKind::Rsquare) {
                return Err(self.unexpected());
            }
        }
        self.expect(TokenKind::Rsquare)?;
        Ok(Node::Array(list))
    }

    fn parse_array_binding(&mut self) -> Result<Node> {
        self.expect(TokenKind::Lsquare)?;
        let mut list = Vec::new();
        while !self.done() && !self.is(TokenKind::Rsquare) {
            if self.is(TokenKind::Comma) {
                self.next();
                list.push(Node::Discard);
                continue;
            }
            let mut node = match self.curr.kind {
                TokenKind::Ident => {
                    let var = Node::Var(self.curr.literal.clone());
                    self.next();
                    var
                }
                TokenKind::Lbrace => self.parse_object_binding()?,
                TokenKind::Lsquare => self.parse_array_binding()?,
                TokenKind::Spread => {
                    self.next();
                    if self.is(TokenKind::Ident) {
                        let var = Node::Var(self.curr.literal.clone());
                        self.next();
                        Node::spread(var)
                    } else {
                        Node::spread(self.parse_array_binding()?)
                    }
                }
                _ => return Err(self.unexpected()),
            };
            let is_spread = matches!(node, Node::Spread(_));
            if !is_spread && self.is(TokenKind::Assign) {
                self.next();
                let default = self.parse_node(precedence::COMMA)?;
                node = Node::assign(node, default);
            }
            list.push(node);
            if self.is(TokenKind::Comma) {
                self.next();
                if is_spread && self.is(TokenKind::Rsquare) {
                    return Err(self.unexpected());
                }
            } else if !self.is(TokenKind::Rsquare) {
                return Err(self.unexpected());
            }
        }
        self.expect(TokenKind::Rsquare)?;
        Ok(Node::BindingArray(list))
    }

    /// Parses the target of a `let`/`const`. Returns the target node and
    /// whether the statement is already complete (`let x` with no value).
    fn parse_binding(&mut self, let_mode: bool) -> Result<(Node, bool)> {
        self.allow_destruct += 1;
        self.next();
        let node = self.parse_node(precedence::ASSIGN);
        self.allow_destruct -= 1;
        let node = node?;
        if let_mode && (self.is(TokenKind::Eol) || self.done()) {
            if !matches!(node, Node::Var(_)) {
                return Err(self.unexpected());
            }
            return Ok((node, true));
        }
        self.expect(TokenKind::Assign)?;
        Ok((node, false))
    }

    fn parse_let(&mut self) -> Result<Node> {
        let (ident, done) = self.parse_binding(true)?;
        if done {
            return Ok(Node::Let {
                ident: Box::new(ident),
                expr: None,
            });
        }
        let expr = self.parse_node(precedence::LOWEST)?;
        Ok(Node::Let {
            ident: Box::new(ident),
            expr: Some(Box::new(expr)),
        })
    }

    fn parse_const(&mut self) -> Result<Node> {
        let (ident, _) = self.parse_binding(false)?;
        let expr = self.parse_node(precedence::LOWEST)?;
        Ok(Node::Const {
            ident: Box::new(ident),
            expr: Box::new(expr),
        })
    }

    fn parse_if(&mut self) -> Result<Node> {
        self.next();
        let cdt = self.parse_condition()?;
        let csq = self.parse_body()?;
        let alt = if self.is_kw("else") {
            Some(Box::new(self.parse_keyword()?))
        } else {
            None
        };
        Ok(Node::If {
            cdt: Box::new(cdt),
            csq: Box::new(csq),
            alt,
        })
    }

    fn parse_else(&mut self) -> Result<Node> {
        self.next();
        if self.is_kw("if") {
            self.parse_keyword()
        } else {
            self.parse_body()
        }
    }

    fn parse_switch(&mut self) -> Result<Node> {
        self.next();
        let cdt = self.parse_condition()?;
        self.expect(TokenKind::Lbrace)?;
        self.skip_eol();
        let mut cases = Vec::new();
        while !self.done() && !self.is(TokenKind::Rbrace) {
            if !self.is(TokenKind::Keyword) {
                return Err(self.unexpected());
            }
            if self.curr.literal == "default" {
                break;
            }
            if self.curr.literal != "case" {
                return Err(self.unexpected());
            }
            cases.push(self.parse_case()?);
        }
        let default = if self.is_kw("default") {
            Some(Box::new(self.parse_default()?))
        } else {
            self.expect(TokenKind::Rbrace)?;
            None
        };
        Ok(Node::Switch {
            cdt: Box::new(cdt),
            cases,
            default,
        })
    }

    fn parse_case(&mut self) -> Result<Node> {
        self.next();
        let predicate = self.parse_node(precedence::ASSIGN)?;
        self.expect(TokenKind::Colon)?;
        self.skip_eol();
        let mut nodes = Vec::new();
        while !self.done() && !self.is(TokenKind::Rbrace) {
            if self.is_kw("case") || self.is_kw("default") {
                break;
            }
            nodes.push(self.parse_node(precedence::LOWEST)?);
            self.skip_eol();
        }
        Ok(Node::Case {
            predicate: Box::new(predicate),
            body: Box::new(Node::block_or_node(nodes)),
        })
    }

    fn parse_default(&mut self) -> Result<Node> {
        self.next();
        self.expect(TokenKind::Colon)?;
        self.skip_eol();
        let mut nodes = Vec::new();
        while !self.done() && !self.is(TokenKind::Rbrace) {
            nodes.push(self.parse_node(precedence::LOWEST)?);
            self.skip_eol();
        }
        self.expect(TokenKind::Rbrace)?;
        Ok(Node::block_or_node(nodes))
    }

    /// Parses the parenthesised part of a `for` header, deciding between the
    /// classic three-part form and `for (x of …)` / `for (x in …)`.
    fn parse_for(&mut self) -> Result<Node> {
        self.lexer.toggle_keep_eol();
        self.next();
        self.expect(TokenKind::Lparen)?;

        let mut init = None;
        if !self.is(TokenKind::Eol) {
            let target = if self.is_kw("let") || self.is_kw("const") {
                let constant = self.curr.literal == "const";
                self.allow_destruct += 1;
                self.no_in = true;
                self.next();
                let target = self.parse_node(precedence::ASSIGN);
                self.allow_destruct -= 1;
                self.no_in = false;
                let target = target?;
                if let Some(kind) = self.iter_keyword() {
                    return self.parse_foreach(kind, target);
                }
                if self.is(TokenKind::Assign) {
                    self.next();
                    let expr = self.parse_node(precedence::LOWEST)?;
                    if constant {
                        Node::Const {
                            ident: Box::new(target),
                            expr: Box::new(expr),
                        }
                    } else {
                        Node::Let {
                            ident: Box::new(target),
                            expr: Some(Box::new(expr)),
                        }
                    }
                } else if constant {
                    return Err(self.unexpected());
                } else {
                    Node::Let {
                        ident: Box::new(target),
                        expr: None,
                    }
                }
            } else {
                self.no_in = true;
                let node = self.parse_node(precedence::LOWEST);
                self.no_in = false;
                let node = node?;
                if let Some(kind) = self.iter_keyword() {
                    return self.parse_foreach(kind, node);
                }
                node
            };
            init = Some(Box::new(target));
        }
        self.expect(TokenKind::Eol)?;

        let mut cdt = None;
        if !self.is(TokenKind::Eol) {
            cdt = Some(Box::new(self.parse_node(precedence::LOWEST)?));
        }
        self.expect(TokenKind::Eol)?;

        let mut incr = None;
        if !self.is(TokenKind::Rparen) {
            incr = Some(Box::new(self.parse_node(precedence::LOWEST)?));
        }
        self.expect(TokenKind::Rparen)?;
        self.lexer.toggle_keep_eol();

        let body = self.parse_body()?;
        Ok(Node::For {
            init,
            cdt,
            incr,
            body: Box::new(body),
        })
    }

    fn iter_keyword(&self) -> Option<IterKind> {
        if self.is_kw("of") {
            Some(IterKind::Of)
        } else if self.is_kw("in") {
            Some(IterKind::In)
        } else {
            None
        }
    }

    fn parse_foreach(&mut self, kind: IterKind, ident: Node) -> Result<Node> {
        self.next();
        let iter = self.parse_node(precedence::LOWEST)?;
        self.expect(TokenKind::Rparen)?;
        self.lexer.toggle_keep_eol();
        let body = self.parse_body()?;
        Ok(Node::Foreach {
            kind,
            ident: Box::new(ident),
            iter: Box::new(iter),
            body: Box::new(body),
        })
    }

    fn parse_do(&mut self) -> Result<Node> {
        self.next();
        let body = self.parse_body()?;
        if !self.is_kw("while") {
            return Err(self.unexpected());
        }
        self.next();
        let cdt = self.parse_condition()?;
        Ok(Node::Do {
            cdt: Box::new(cdt),
            body: Box::new(body),
        })
    }

    fn parse_while(&mut self) -> Result<Node> {
        self.next();
        let cdt = self.parse_condition()?;
        let body = self.parse_body()?;
        Ok(Node::While {
            cdt: Box::new(cdt),
            body: Box::new(body),
        })
    }

    fn parse_break(&mut self) -> Result<Node> {
        self.next();
        Ok(Node::Break(self.take_ident()))
    }

    fn parse_continue(&mut self) -> Result<Node> {
        self.next();
        Ok(Node::Continue(self.take_ident()))
    }

    fn parse_try(&mut self) -> Result<Node> {
        self.next();
        let body = self.parse_body()?;
        let catch = if self.is_kw("catch") {
            Some(Box::new(self.parse_keyword()?))
        } else {
            None
        };
        let finally = if self.is_kw("finally") {
            Some(Box::new(self.parse_keyword()?))
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            return Err(self.unexpected());
        }
        Ok(Node::Try {
            body: Box::new(body),
            catch,
            finally,
        })
    }

    fn parse_catch(&mut self) -> Result<Node> {
        self.next();
        let ident = if self.is(TokenKind::Lparen) {
            self.allow_destruct += 1;
            let ident = self.parse_condition();
            self.allow_destruct -= 1;
            Some(Box::new(ident?))
        } else {
            None
        };
        let body = self.parse_body()?;
        Ok(Node::Catch {
            ident,
            body: Box::new(body),
        })
    }

    fn parse_finally(&mut self) -> Result<Node> {
        self.next();
        self.parse_body()
    }

    fn parse_throw(&mut self) -> Result<Node> {
        self.next();
        let node = self.parse_node(precedence::LOWEST)?;
        Ok(Node::Throw(Box::new(node)))
    }

    fn parse_return(&mut self) -> Result<Node> {
        self.next();
        if self.is(TokenKind::Eol) || self.is(TokenKind::Rbrace) || self.done() {
            return Ok(Node::Return(Box::new(Node::Undefined)));
        }
        let node = self.parse_node(precedence::LOWEST)?;
        Ok(Node::Return(Box::new(node)))
    }

    fn parse_function(&mut self) -> Result<Node> {
        self.next();
        let ident = if self.is(TokenKind::Ident) {
            let name = self.curr.literal.clone();
            self.next();
            Some(name)
        } else {
            None
        };
        let args = self.parse_args()?;
        let body = self.parse_body()?;
        Ok(Node::Func {
            ident,
            args: Box::new(args),
            body: Box::new(body),
        })
    }

    fn parse_args(&mut self) -> Result<Node> {
        self.allow_destruct += 1;
        let args = self.parse_args_inner();
        self.allow_destruct -= 1;
        args
    }

    fn parse_args_inner(&mut self) -> Result<Node> {
        self.expect(TokenKind::Lparen)?;
        let mut nodes = Vec::new();
        while !self.done() && !self.is(TokenKind::Rparen) {
            let node = self.parse_node(precedence::COMMA)?;
            let is_spread = matches!(node, Node::Spread(_));
            nodes.push(node);
            if is_spread && !self.is(TokenKind::Rparen) {
                return Err(self.unexpected());
            }
            if self.is(TokenKind::Comma) {
                self.next();
                if self.is(TokenKind::Rparen) {
                    return Err(self.unexpected());
                }
            } else if !self.is(TokenKind::Rparen) {
                return Err(self.unexpected());
            }
        }
        self.expect(TokenKind::Rparen)?;
        Ok(Node::Seq(nodes))
    }

    fn parse_binary(&mut self, left: Node) -> Result<Node> {
        let op = self.curr.kind;
        self.next();
        // exponent is right-associative: its operand re-enters one level down
        let rhs_power = if op == TokenKind::Pow {
            power(op) - 1
        } else {
            power(op)
        };
        let right = self.parse_node(rhs_power)?;
        Ok(Node::binary(op, left, right))
    }

    fn parse_assign(&mut self, left: Node) -> Result<Node> {
        let op = self.curr.kind;
        self.next();

        let paused = self.allow_destruct;
        self.allow_destruct = 0;
        let expr = self.parse_node(precedence::ASSIGN);
        self.allow_destruct = paused;
        let expr = expr?;

        let op = op.strip_assign().ok_or_else(|| self.unexpected())?;
        let expr = if op == TokenKind::Assign {
            expr
        } else {
            Node::binary(op, left.clone(), expr)
        };
        Ok(Node::assign(left, expr))
    }

    fn parse_ternary(&mut self, left: Node) -> Result<Node> {
        self.next();
        let csq = self.parse_node(precedence::ASSIGN)?;
        self.expect(TokenKind::Colon)?;
        let alt = self.parse_node(precedence::COMMA)?;
        Ok(Node::If {
            cdt: Box::new(left),
            csq: Box::new(csq),
            alt: Some(Box::new(alt)),
        })
    }

    fn parse_call(&mut self, left: Node) -> Result<Node> {
        let args = self.parse_group()?;
        Ok(Node::Call {
            ident: Box::new(left),
            args: Box::new(args),
        })
    }

    fn parse_index(&mut self, left: Node) -> Result<Node> {
        self.expect(TokenKind::Lsquare)?;
        let index = self.parse_node(precedence::LOWEST)?;
        self.expect(TokenKind::Rsquare)?;
        Ok(Node::Index {
            expr: Box::new(left),
            index: Box::new(index),
        })
    }

    fn parse_arrow(&mut self, left: Node) -> Result<Node> {
        self.next();
        let body = match self.curr.kind {
            TokenKind::Lparen if self.peek.kind == TokenKind::Lbrace => {
                // `=> ({…})` returns an object literal
                self.next();
                let body = self.parse_object()?;
                self.expect(TokenKind::Rparen)?;
                body
            }
            TokenKind::Lbrace => self.parse_body()?,
            _ => self.parse_node(precedence::COMMA)?,
        };
        Ok(Node::Arrow {
            args: Box::new(left),
            body: Box::new(body),
        })
    }

    fn parse_member(&mut self, left: Node) -> Result<Node> {
        let optional = self.curr.kind == TokenKind::Optional;
        self.next();
        let next = self.parse_node(precedence::OBJECT)?;
        Ok(Node::Member {
            curr: Box::new(left),
            next: Box::new(next),
            optional,
        })
    }

    fn parse_operator_keyword(&mut self, left: Node) -> Result<Node> {
        match self.curr.literal.as_str() {
            "in" => {
                self.next();
                let right = self.parse_node(precedence::COMPARE)?;
                Ok(Node::In {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            "instanceof" => {
                self.next();
                let right = self.parse_node(precedence::COMPARE)?;
                Ok(Node::InstanceOf {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_template(&mut self) -> Result<Node> {
        self.expect(TokenKind::Template)?;
        let mut nodes = Vec::new();
        while !self.done() && !self.is(TokenKind::Template) {
            if self.is(TokenKind::Str) {
                nodes.push(Node::Str(self.curr.literal.clone()));
                self.next();
                continue;
            }
            self.expect(TokenKind::BegSub)?;
            nodes.push(self.parse_node(precedence::LOWEST)?);
            self.expect(TokenKind::EndSub)?;
        }
        self.expect(TokenKind::Template)?;
        Ok(Node::Template(nodes))
    }

    fn parse_import(&mut self) -> Result<Node> {
        self.next();
        match self.curr.kind {
            TokenKind::Str => {
                let file = self.curr.literal.clone();
                self.next();
                Ok(Node::Import {
                    ident: None,
                    default: None,
                    file,
                })
            }
            TokenKind::Mul => self.parse_import_star(None),
            TokenKind::Ident => {
                let default = Node::Var(self.curr.literal.clone());
                self.next();
                if self.is_kw("from") {
                    let file = self.parse_from()?;
                    return Ok(Node::Import {
                        ident: Some(Box::new(default)),
                        default: None,
                        file,
                    });
                }
                self.expect(TokenKind::Comma)?;
                match self.curr.kind {
                    TokenKind::Mul => self.parse_import_star(Some(default)),
                    TokenKind::Lbrace => self.parse_import_list(Some(default)),
                    _ => Err(self.unexpected()),
                }
            }
            TokenKind::Lbrace => self.parse_import_list(None),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_import_star(&mut self, default: Option<Node>) -> Result<Node> {
        self.next();
        self.expect_kw("as")?;
        if !self.is(TokenKind::Ident) {
            return Err(self.unexpected());
        }
        let ident = Node::Var(self.curr.literal.clone());
        self.next();
        let file = self.parse_from()?;
        Ok(Node::Import {
            ident: Some(Box::new(ident)),
            default: default.map(Box::new),
            file,
        })
    }

    fn parse_import_list(&mut self, default: Option<Node>) -> Result<Node> {
        let list = self.parse_alias_list()?;
        let file = self.parse_from()?;
        Ok(Node::Import {
            ident: Some(Box::new(list)),
            default: default.map(Box::new),
            file,
        })
    }

    fn parse_export(&mut self) -> Result<Node> {
        self.next();
        match self.curr.kind {
            TokenKind::Keyword => {
                let default = self.curr.literal == "default";
                if default {
                    self.next();
                }
                let node = self.parse_node(precedence::LOWEST)?;
                Ok(Node::Export {
                    node: Some(Box::new(node)),
                    default,
                    file: None,
                })
            }
            TokenKind::Lbrace => {
                let list = self.parse_alias_list()?;
                let file = if self.is_kw("from") {
                    Some(self.parse_from()?)
                } else {
                    None
                };
                Ok(Node::Export {
                    node: Some(Box::new(list)),
                    default: false,
                    file,
                })
            }
            TokenKind::Mul => {
                self.next();
                let ident = if self.is_kw("as") {
                    self.next();
                    if !self.is(TokenKind::Ident) {
                        return Err(self.unexpected());
                    }
                    let ident = Node::Var(self.curr.literal.clone());
                    self.next();
                    Some(Box::new(ident))
                } else {
                    None
                };
                let file = self.parse_from()?;
                Ok(Node::Export {
                    node: ident,
                    default: false,
                    file: Some(file),
                })
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_alias_list(&mut self) -> Result<Node> {
        self.expect(TokenKind::Lbrace)?;
        let mut list = Vec::new();
        while !self.done() && !self.is(TokenKind::Rbrace) {
            let named = self.is(TokenKind::Ident)
                || self.is(TokenKind::Str)
                || self.is_kw("default");
            if !named {
                return Err(self.unexpected());
            }
            let ident = self.curr.literal.clone();
            self.next();
            let alias = if self.is_kw("as") {
                self.next();
                if !self.is(TokenKind::Ident) && !self.is(TokenKind::Str) {
                    return Err(self.unexpected());
                }
                let alias = self.curr.literal.clone();
                self.next();
                Some(alias)
            } else {
                None
            };
            list.push(Node::Alias { ident, alias });
            if self.is(TokenKind::Comma) {
                self.next();
                if self.is(TokenKind::Rbrace) {
                    return Err(self.unexpected());
                }
            } else if !self.is(TokenKind::Rbrace) {
                return Err(self.unexpected());
            }
        }
        self.expect(TokenKind::Rbrace)?;
        Ok(Node::Seq(list))
    }

    fn parse_from(&mut self) -> Result<String> {
        self.expect_kw("from")?;
        if !self.is(TokenKind::Str) {
            return Err(self.unexpected());
        }
        let file = self.curr.literal.clone();
        self.next();
        Ok(file)
    }

    fn parse_body(&mut self) -> Result<Node> {
        self.expect(TokenKind::Lbrace)?;
        self.skip_eol();
        let mut nodes = Vec::new();
        while !self.done() && !self.is(TokenKind::Rbrace) {
            if let Some(label) = self.take_label() {
                nodes.push(label);
                self.skip_eol();
                continue;
            }
            nodes.push(self.parse_node(precedence::LOWEST)?);
            self.skip_eol();
        }
        self.expect(TokenKind::Rbrace)?;
        Ok(Node::block_or_node(nodes))
    }

    fn parse_condition(&mut self) -> Result<Node> {
        self.expect(TokenKind::Lparen)?;
        let expr = self.parse_node(precedence::LOWEST)?;
        self.expect(TokenKind::Rparen)?;
        Ok(expr)
    }

    /// Statement-position `name:` label. Handled here rather than in the
    /// identifier prefix so ternary consequents keep their colon.
    fn take_label(&mut self) -> Option<Node> {
        if self.is(TokenKind::Ident) && self.peek.kind == TokenKind::Colon {
            let label = Node::Label(self.curr.literal.clone());
            self.next();
            self.next();
            Some(label)
        } else {
            None
        }
    }

    fn take_ident(&mut self) -> Option<String> {
        if self.is(TokenKind::Ident) {
            let ident = self.curr.literal.clone();
            self.next();
            Some(ident)
        } else {
            None
        }
    }

    fn expect_property_name(&mut self) -> Result<String> {
        match self.curr.kind {
            TokenKind::Ident | TokenKind::Str | TokenKind::Number | TokenKind::Boolean => {
                let name = self.curr.literal.clone();
                self.next();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn current_power(&self) -> i32 {
        if self.curr.kind == TokenKind::Keyword
            && !self.no_in
            && (self.curr.literal == "in" || self.curr.literal == "instanceof")
        {
            return precedence::COMPARE;
        }
        power(self.curr.kind)
    }

    fn resync(&mut self) {
        while !self.is(TokenKind::Eol) && !self.done() {
            self.next();
        }
        self.lexer.reset();
        self.allow_destruct = 0;
        self.no_in = false;
        self.skip_eol();
    }

    fn skip_eol(&mut self) {
        while self.is(TokenKind::Eol) {
            self.next();
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.is(kind) {
            self.next();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<()> {
        if self.is_kw(kw) {
            self.next();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> anyhow::Error {
        anyhow::anyhow!(
            "({}:{}) unexpected token {}",
            self.curr.pos.line,
            self.curr.pos.column,
            self.curr
        )
    }

    fn done(&self) -> bool {
        self.is(TokenKind::Eof)
    }

    fn is(&self, kind: TokenKind) -> bool {
        self.curr.kind == kind
    }

    fn is_kw(&self, kw: &str) -> bool {
        self.curr.kind == TokenKind::Keyword && self.curr.literal == kw
    }

    fn next(&mut self) {
        self.curr = std::mem::replace(&mut self.peek, scan_skipping_comments(&mut self.lexer));
    }
}

fn scan_skipping_comments(lexer: &mut Lexer) -> Token {
    loop {
        let token = lexer.scan();
        if token.kind != TokenKind::Comment {
            return token;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Node::*;
    use indoc::indoc;

    fn parse(source: &str) -> Node {
        parse_str(source).expect("parse failed")
    }

    fn num(value: f64) -> Node {
        Number(value)
    }

    #[test]
    fn parses_let_with_binary_expression() {
        let node = parse("let x = 1 + 2 * 3");
        let expected = Let {
            ident: Box::new(Node::var("x")),
            expr: Some(Box::new(Node::binary(
                TokenKind::Add,
                num(1.0),
                Node::binary(TokenKind::Mul, num(2.0), num(3.0)),
            ))),
        };
        assert_eq!(node, expected);
    }

    #[test]
    fn exponent_is_right_associative() {
        let node = parse("2 ** 3 ** 2");
        let expected = Node::binary(
            TokenKind::Pow,
            num(2.0),
            Node::binary(TokenKind::Pow, num(3.0), num(2.0)),
        );
        assert_eq!(node, expected);
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let node = parse("a && b || c");
        let expected = Node::binary(
            TokenKind::Or,
            Node::binary(TokenKind::And, Node::var("a"), Node::var("b")),
            Node::var("c"),
        );
        assert_eq!(node, expected);
    }

    #[test]
    fn parses_array_binding_with_holes_and_rest() {
        let node = parse("let [a, , b = 1, ...rest] = xs");
        let Let { ident, expr } = node else {
            panic!("expected let, got {node:?}");
        };
        assert_eq!(
            *ident,
            BindingArray(vec![
                Node::var("a"),
                Discard,
                Node::assign(Node::var("b"), num(1.0)),
                Node::spread(Node::var("rest")),
            ])
        );
        assert_eq!(expr.as_deref(), Some(&Node::var("xs")));
    }

    #[test]
    fn parses_object_binding_with_rename_and_default() {
        let node = parse("let {x, y: z = 9, ...rest} = o");
        let Let { ident, .. } = node else {
            panic!("expected let, got {node:?}");
        };
        assert_eq!(
            *ident,
            BindingObject(vec![
                ("x".to_string(), Node::var("x")),
                ("y".to_string(), Node::assign(Node::var("z"), num(9.0))),
                ("rest".to_string(), Node::spread(Node::var("rest"))),
            ])
        );
    }

    #[test]
    fn braces_outside_bindings_are_object_literals() {
        let node = parse("let o = {a: 1, b}");
        let Let { expr, .. } = node else {
            panic!("expected let, got {node:?}");
        };
        assert_eq!(
            expr.as_deref(),
            Some(&Object(vec![
                ("a".to_string(), num(1.0)),
                ("b".to_string(), Node::var("b")),
            ]))
        );
    }

    #[test]
    fn compound_assignment_lowers_to_binary() {
        let node = parse("x += 2");
        let expected = Node::assign(
            Node::var("x"),
            Node::binary(TokenKind::Add, Node::var("x"), num(2.0)),
        );
        assert_eq!(node, expected);
    }

    #[test]
    fn ternary_parses_as_if_with_identifier_branches() {
        let node = parse("a ? b : c");
        let expected = If {
            cdt: Box::new(Node::var("a")),
            csq: Box::new(Node::var("b")),
            alt: Some(Box::new(Node::var("c"))),
        };
        assert_eq!(node, expected);
    }

    #[test]
    fn parses_classic_for_header() {
        let source = indoc! {"
            for (let i = 0; i < 3; i += 1) {
                print(i)
            }
        "};
        let For {
            init, cdt, incr, ..
        } = parse(source)
        else {
            panic!("expected for loop");
        };
        assert!(matches!(init.as_deref(), Some(Let { .. })));
        assert!(matches!(
            cdt.as_deref(),
            Some(Binary {
                op: TokenKind::Lt,
                ..
            })
        ));
        assert!(matches!(incr.as_deref(), Some(Assign { .. })));
    }

    #[test]
    fn parses_empty_for_header() {
        let For {
            init, cdt, incr, ..
        } = parse("for (;;) { break }")
        else {
            panic!("expected for loop");
        };
        assert!(init.is_none());
        assert!(cdt.is_none());
        assert!(incr.is_none());
    }

    #[test]
    fn parses_for_of_with_const_binding() {
        let Foreach {
            kind, ident, iter, ..
        } = parse("for (const c of \"abc\") { s = s + c }")
        else {
            panic!("expected foreach");
        };
        assert_eq!(kind, IterKind::Of);
        assert_eq!(*ident, Node::var("c"));
        assert_eq!(*iter, Str("abc".to_string()));
    }

    #[test]
    fn parses_for_in_over_object() {
        let Foreach { kind, .. } = parse("for (k in o) { print(k) }") else {
            panic!("expected foreach");
        };
        assert_eq!(kind, IterKind::In);
    }

    #[test]
    fn parses_arrow_with_expression_body() {
        let Arrow { args, body } = parse("x => x * 2") else {
            panic!("expected arrow");
        };
        assert_eq!(*args, Node::var("x"));
        assert_eq!(
            *body,
            Node::binary(TokenKind::Mul, Node::var("x"), num(2.0))
        );
    }

    #[test]
    fn parses_arrow_object_literal_body() {
        let Arrow { body, .. } = parse("x => ({a: 1})") else {
            panic!("expected arrow");
        };
        assert!(matches!(*body, Object(_)));
    }

    #[test]
    fn parses_call_with_spread_argument() {
        let Call { args, .. } = parse("f(...xs, 1)") else {
            panic!("expected call");
        };
        let Seq(args) = *args else {
            panic!("expected seq args");
        };
        assert_eq!(args[0], Node::spread(Node::var("xs")));
        assert_eq!(args[1], num(1.0));
    }

    #[test]
    fn parses_member_chain_and_optional_chaining() {
        let node = parse("a.b?.c");
        let Member {
            curr,
            next,
            optional,
        } = node
        else {
            panic!("expected member");
        };
        assert!(optional);
        assert_eq!(*next, Node::var("c"));
        assert!(matches!(*curr, Member { optional: false, .. }));
    }

    #[test]
    fn parses_template_with_substitutions() {
        let Template(nodes) = parse("`hi ${1 + 2}`") else {
            panic!("expected template");
        };
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0], Str("hi ".to_string()));
        assert!(matches!(
            nodes[1],
            Binary {
                op: TokenKind::Add,
                ..
            }
        ));
    }

    #[test]
    fn parses_switch_with_cases_and_default() {
        let source = indoc! {r#"
            switch (x) {
                case 1:
                    print("one")
                case 2:
                    print("two")
                default:
                    print("many")
            }
        "#};
        let Switch { cases, default, .. } = parse(source) else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 2);
        assert!(default.is_some());
    }

    #[test]
    fn parses_try_catch_finally() {
        let source = indoc! {r#"
            try {
                throw "oops"
            } catch (e) {
                console.log(e)
            } finally {
                print("done")
            }
        "#};
        let Try { catch, finally, .. } = parse(source) else {
            panic!("expected try");
        };
        assert!(matches!(catch.as_deref(), Some(Catch { ident: Some(_), .. })));
        assert!(finally.is_some());
    }

    #[test]
    fn rejects_try_without_catch_or_finally() {
        assert!(parse_str("try { 1 }").is_err());
    }

    #[test]
    fn parses_typeof_tighter_than_comparison() {
        let node = parse("typeof 1 === \"float\"");
        let Binary { op, left, .. } = node else {
            panic!("expected binary");
        };
        assert_eq!(op, TokenKind::Seq);
        assert!(matches!(*left, Typeof(_)));
    }

    #[test]
    fn parses_in_operator_as_comparison() {
        let Binary { op, left, .. } = parse("\"a\" in o == true") else {
            panic!("expected binary");
        };
        assert_eq!(op, TokenKind::Eq);
        assert!(matches!(*left, In { .. }));
    }

    #[test]
    fn parses_import_and_export_forms() {
        assert!(matches!(parse("import \"mod\""), Import { .. }));
        assert!(matches!(parse("import x from \"mod\""), Import { .. }));
        assert!(matches!(
            parse("import {a, b as c} from \"mod\""),
            Import { .. }
        ));
        assert!(matches!(parse("import * as m from \"mod\""), Import { .. }));
        assert!(matches!(
            parse("export {a as b}"),
            Export { default: false, .. }
        ));
        assert!(matches!(
            parse("export default function f() { return 1 }"),
            Export { default: true, .. }
        ));
    }

    #[test]
    fn const_requires_initializer() {
        assert!(parse_str("const x").is_err());
    }

    #[test]
    fn parsing_is_deterministic() {
        let source = indoc! {r#"
            function f(a, b = 2) {
                return a + b
            }
            let {x, y} = {x: 1, y: 2}
            print(f(x, y))
        "#};
        assert_eq!(parse(source), parse(source));
    }

    #[test]
    fn reports_position_of_unexpected_token() {
        let error = parse_str("let = 1").expect_err("expected parse failure");
        let message = error.to_string();
        assert!(message.contains("unexpected token"), "{message}");
        assert!(message.contains("(1:5)"), "{message}");
    }

    #[test]
    fn resyncs_after_error_and_reports_first() {
        let source = indoc! {"
            let = broken
            let ok = 1
        "};
        let error = parse_str(source).expect_err("expected parse failure");
        assert!(error.to_string().contains("(1:5)"));
    }

    #[test]
    fn statement_label_parses_before_loop() {
        let source = indoc! {"
            outer:
            while (x) {
                break outer
            }
        "};
        let Block(nodes) = parse(source) else {
            panic!("expected block");
        };
        assert_eq!(nodes[0], Label("outer".to_string()));
        assert!(matches!(nodes[1], While { .. }));
    }
}
