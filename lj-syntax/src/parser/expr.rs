use tracing::trace;

use super::Parser;
use crate::error::ParseResult;
use crate::lexer::tokenize_expression;
use crate::nodes::{BinOpKind, CallArgs, CompareOp, Const, Ctx, Expr, Keyword, Operand, Pair};
use crate::token::{Token, TokenKind, TokenRule, TokenStream, TokenType};

fn boxed(expr: Expr) -> Box<Expr> {
    Box::new(expr)
}

impl Parser {
    /// Parses an assignment target: a single name when `name_only` is set,
    /// otherwise a primary or a simplified tuple of primaries.
    pub fn parse_assign_target(
        &mut self,
        with_tuple: bool,
        name_only: bool,
        extra_end_rules: &[TokenRule],
    ) -> ParseResult<Expr> {
        let target = if name_only {
            let token = self.stream.expect_type(TokenType::Name)?;
            Expr::Name {
                name: token.name().unwrap_or_default().to_string(),
                ctx: Ctx::Store,
                line: token.line,
            }
        } else {
            let mut target = if with_tuple {
                self.parse_tuple(true, true, extra_end_rules, false)?
            } else {
                self.parse_primary()?
            };
            target.set_ctx(Ctx::Store);
            target
        };
        if !target.can_assign() {
            return self.fail(
                format!("can't assign to '{}'", target.kind_name()),
                Some(target.line()),
            );
        }
        Ok(target)
    }

    pub fn parse_expression(&mut self, with_condexpr: bool, with_filter: bool) -> ParseResult<Expr> {
        if with_condexpr {
            self.parse_condexpr(with_filter)
        } else {
            self.parse_or(with_filter)
        }
    }

    fn parse_condexpr(&mut self, with_filter: bool) -> ParseResult<Expr> {
        let mut line = self.stream.current().line;
        let mut expr1 = self.parse_or(with_filter)?;
        while self.stream.skip_if_name("if") {
            let test = self.parse_or(with_filter)?;
            let expr2 = if self.stream.skip_if_name("else") {
                Some(boxed(self.parse_condexpr(true)?))
            } else {
                None
            };
            expr1 = Expr::CondExpr {
                test: boxed(test),
                expr1: boxed(expr1),
                expr2,
                line,
            };
            line = self.stream.current().line;
        }
        Ok(expr1)
    }

    fn parse_or(&mut self, with_filter: bool) -> ParseResult<Expr> {
        let mut line = self.stream.current().line;
        let mut left = self.parse_and(with_filter)?;
        while self.stream.skip_if_name("or") {
            let right = self.parse_and(with_filter)?;
            left = Expr::Or {
                left: boxed(left),
                right: boxed(right),
                line,
            };
            line = self.stream.current().line;
        }
        Ok(left)
    }

    fn parse_and(&mut self, with_filter: bool) -> ParseResult<Expr> {
        let mut line = self.stream.current().line;
        let mut left = self.parse_not(with_filter)?;
        while self.stream.skip_if_name("and") {
            let right = self.parse_not(with_filter)?;
            left = Expr::And {
                left: boxed(left),
                right: boxed(right),
                line,
            };
            line = self.stream.current().line;
        }
        Ok(left)
    }

    fn parse_not(&mut self, with_filter: bool) -> ParseResult<Expr> {
        if self.stream.current().is_name("not") {
            let line = self.stream.next().line;
            let node = self.parse_not(with_filter)?;
            return Ok(Expr::Not {
                node: boxed(node),
                line,
            });
        }
        self.parse_compare(with_filter)
    }

    fn parse_compare(&mut self, with_filter: bool) -> ParseResult<Expr> {
        let mut line = self.stream.current().line;
        let expr = self.parse_math1(with_filter)?;
        let mut ops = Vec::new();
        loop {
            let op = match self.stream.current().ty() {
                TokenType::Eq => Some(CompareOp::Eq),
                TokenType::Ne => Some(CompareOp::Ne),
                TokenType::Lt => Some(CompareOp::Lt),
                TokenType::LtEq => Some(CompareOp::LtEq),
                TokenType::Gt => Some(CompareOp::Gt),
                TokenType::GtEq => Some(CompareOp::GtEq),
                _ => None,
            };
            let op = if let Some(op) = op {
                self.stream.next();
                op
            } else if self.stream.skip_if_name("in") {
                CompareOp::In
            } else if self.stream.current().is_name("not") && self.stream.look().is_name("in") {
                self.stream.skip(2);
                CompareOp::NotIn
            } else {
                break;
            };
            let operand = self.parse_math1(with_filter)?;
            ops.push(Operand { op, expr: operand });
            line = self.stream.current().line;
        }
        if ops.is_empty() {
            return Ok(expr);
        }
        Ok(Expr::Compare {
            expr: boxed(expr),
            ops,
            line,
        })
    }

    fn parse_math1(&mut self, with_filter: bool) -> ParseResult<Expr> {
        let mut line = self.stream.current().line;
        let mut left = self.parse_concat(with_filter)?;
        loop {
            let op = match self.stream.current().ty() {
                TokenType::Add => BinOpKind::Add,
                TokenType::Sub => BinOpKind::Sub,
                _ => break,
            };
            self.stream.next();
            let right = self.parse_concat(with_filter)?;
            left = Expr::BinOp {
                op,
                left: boxed(left),
                right: boxed(right),
                line,
            };
            line = self.stream.current().line;
        }
        Ok(left)
    }

    fn parse_concat(&mut self, with_filter: bool) -> ParseResult<Expr> {
        let line = self.stream.current().line;
        let mut nodes = vec![self.parse_math2(with_filter)?];
        while self.stream.skip_if_type(TokenType::Tilde) {
            nodes.push(self.parse_math2(with_filter)?);
        }
        if nodes.len() == 1 {
            return Ok(nodes.remove(0));
        }
        Ok(Expr::Concat { nodes, line })
    }

    fn parse_math2(&mut self, with_filter: bool) -> ParseResult<Expr> {
        let mut line = self.stream.current().line;
        let mut left = self.parse_pow(with_filter)?;
        loop {
            let op = match self.stream.current().ty() {
                TokenType::Mul => BinOpKind::Mul,
                TokenType::Div => BinOpKind::Div,
                TokenType::FloorDiv => BinOpKind::FloorDiv,
                TokenType::Mod => BinOpKind::Mod,
                _ => break,
            };
            self.stream.next();
            let right = self.parse_pow(with_filter)?;
            left = Expr::BinOp {
                op,
                left: boxed(left),
                right: boxed(right),
                line,
            };
            line = self.stream.current().line;
        }
        Ok(left)
    }

    fn parse_pow(&mut self, with_filter: bool) -> ParseResult<Expr> {
        let mut line = self.stream.current().line;
        let mut left = self.parse_unary(with_filter)?;
        while self.stream.skip_if_type(TokenType::Pow) {
            let right = self.parse_unary(with_filter)?;
            left = Expr::BinOp {
                op: BinOpKind::Pow,
                left: boxed(left),
                right: boxed(right),
                line,
            };
            line = self.stream.current().line;
        }
        Ok(left)
    }

    fn parse_unary(&mut self, with_filter: bool) -> ParseResult<Expr> {
        let line = self.stream.current().line;
        let node = match self.stream.current().ty() {
            TokenType::Sub => {
                self.stream.next();
                Expr::Neg {
                    node: boxed(self.parse_unary(false)?),
                    line,
                }
            }
            TokenType::Add => {
                self.stream.next();
                Expr::Pos {
                    node: boxed(self.parse_unary(false)?),
                    line,
                }
            }
            _ => self.parse_primary()?,
        };
        let node = self.parse_postfix(node)?;
        if with_filter {
            return self.parse_filter_expr(node);
        }
        Ok(node)
    }

    pub fn parse_primary(&mut self) -> ParseResult<Expr> {
        let token = self.stream.current().clone();
        let node = match &token.kind {
            TokenKind::Name(name) => {
                let value = match name.as_str() {
                    "true" | "True" => Some(Const::Bool(true)),
                    "false" | "False" => Some(Const::Bool(false)),
                    "none" | "None" => Some(Const::None),
                    _ => None,
                };
                self.stream.next();
                match value {
                    Some(value) => Expr::constant(value, token.line),
                    None => Expr::name(name.clone(), token.line),
                }
            }
            TokenKind::String(first) => {
                self.stream.next();
                let mut buf = first.clone();
                while let TokenKind::String(next) = &self.stream.current().kind {
                    buf.push_str(next);
                    self.stream.next();
                }
                Expr::constant(Const::Str(buf), token.line)
            }
            TokenKind::Integer(value) => {
                self.stream.next();
                Expr::constant(Const::Int(*value), token.line)
            }
            TokenKind::Float(value) => {
                self.stream.next();
                Expr::constant(Const::Float(*value), token.line)
            }
            TokenKind::LParen => {
                self.stream.next();
                let node = self.parse_tuple(false, true, &[], true)?;
                self.stream.expect_type(TokenType::RParen)?;
                node
            }
            TokenKind::LBracket => self.parse_list()?,
            TokenKind::LBrace => self.parse_dict()?,
            TokenKind::Sequence { .. } => self.parse_sequence()?,
            _ => return self.fail(format!("unexpected '{}'", token.describe()), Some(token.line)),
        };
        Ok(node)
    }

    /// Like `parse_expression`, but comma-separated expressions become a
    /// `Tuple`. `simplified` restricts items to primaries; an empty tuple is
    /// only accepted inside explicit parentheses.
    pub fn parse_tuple(
        &mut self,
        simplified: bool,
        with_condexpr: bool,
        extra_end_rules: &[TokenRule],
        explicit_parentheses: bool,
    ) -> ParseResult<Expr> {
        let mut line = self.stream.current().line;
        let mut items = Vec::new();
        let mut is_tuple = false;
        loop {
            if !items.is_empty() {
                self.stream.expect_type(TokenType::Comma)?;
            }
            if self.is_tuple_end(extra_end_rules) {
                break;
            }
            let item = if simplified {
                self.parse_primary()?
            } else {
                self.parse_expression(with_condexpr, true)?
            };
            items.push(item);
            if self.stream.current().ty() == TokenType::Comma {
                is_tuple = true;
            } else {
                break;
            }
            line = self.stream.current().line;
        }

        if !is_tuple {
            if let Some(item) = items.pop() {
                return Ok(item);
            }
            if !explicit_parentheses {
                let got = self.stream.current().describe();
                return self.fail(format!("Expected an expression, got '{got}'"), None);
            }
        }
        Ok(Expr::Tuple {
            items,
            ctx: Ctx::Load,
            line,
        })
    }

    fn parse_list(&mut self) -> ParseResult<Expr> {
        let token = self.stream.expect_type(TokenType::LBracket)?;
        let mut items = Vec::new();
        while self.stream.current().ty() != TokenType::RBracket {
            if !items.is_empty() {
                self.stream.expect_type(TokenType::Comma)?;
            }
            if self.stream.current().ty() == TokenType::RBracket {
                break;
            }
            items.push(self.parse_expression(true, true)?);
        }
        self.stream.expect_type(TokenType::RBracket)?;
        Ok(Expr::List {
            items,
            line: token.line,
        })
    }

    fn parse_dict(&mut self) -> ParseResult<Expr> {
        let token = self.stream.expect_type(TokenType::LBrace)?;
        let mut items = Vec::new();
        while self.stream.current().ty() != TokenType::RBrace {
            if !items.is_empty() {
                self.stream.expect_type(TokenType::Comma)?;
            }
            if self.stream.current().ty() == TokenType::RBrace {
                break;
            }
            let key = self.parse_expression(true, true)?;
            self.stream.expect_type(TokenType::Colon)?;
            let value = self.parse_expression(true, true)?;
            let line = key.line();
            items.push(Pair { key, value, line });
        }
        self.stream.expect_type(TokenType::RBrace)?;
        Ok(Expr::Dict {
            items,
            line: token.line,
        })
    }

    /// Rewrites `(start..stop)` into the tree of
    /// `(start, stop)|range(inclusive=true)`, parsed by an isolated parser
    /// that shares only the environment.
    fn parse_sequence(&mut self) -> ParseResult<Expr> {
        let token = self.stream.expect_type(TokenType::Sequence)?;
        let TokenKind::Sequence { start, stop } = &token.kind else {
            return self.fail("expected range literal", Some(token.line));
        };
        trace!(start = %start, stop = %stop, line = token.line, "rewriting range literal");

        let line = token.line;
        let at = |kind: TokenKind| Token::new(kind, line, token.span);
        let mut tokens = vec![at(TokenKind::LParen)];
        tokens.extend(self.range_bound(start, &token)?);
        tokens.push(at(TokenKind::Comma));
        tokens.extend(self.range_bound(stop, &token)?);
        tokens.extend([
            at(TokenKind::RParen),
            at(TokenKind::Pipe),
            at(TokenKind::Name("range".to_string())),
            at(TokenKind::LParen),
            at(TokenKind::Name("inclusive".to_string())),
            at(TokenKind::Assign),
            at(TokenKind::Name("true".to_string())),
            at(TokenKind::RParen),
        ]);

        let stream = TokenStream::new(
            tokens,
            self.stream.name().map(str::to_string),
            self.stream.filename().map(str::to_string),
        );
        let mut nested = Parser::with_stream(self.env.clone(), stream);
        let expr = nested.parse_expression(true, true)?;
        if !nested.stream.is_eof() {
            let got = nested.stream.current().describe();
            return self.fail(format!("invalid range literal near '{got}'"), Some(line));
        }
        Ok(expr)
    }

    fn range_bound(&self, text: &str, token: &Token) -> ParseResult<Vec<Token>> {
        let tokens = tokenize_expression(text, token.line, token.span.lo)
            .map_err(|err| err.with_template(self.stream.name(), self.stream.filename()))?;
        if tokens.is_empty() {
            return self.fail("empty range bound", Some(token.line));
        }
        // each bound must be exactly one expression so nothing leaks into the tuple
        let mut bound = Parser::with_stream(
            self.env.clone(),
            TokenStream::new(tokens.clone(), None, None),
        );
        let single = bound.parse_expression(false, false).is_ok() && bound.stream.is_eof();
        if !single {
            return self.fail(format!("invalid range bound '{text}'"), Some(token.line));
        }
        Ok(tokens)
    }

    fn parse_postfix(&mut self, mut node: Expr) -> ParseResult<Expr> {
        loop {
            node = match self.stream.current().ty() {
                TokenType::Dot | TokenType::LBracket => self.parse_subscript(node)?,
                TokenType::LParen => self.parse_call(node)?,
                _ => return Ok(node),
            };
        }
    }

    fn parse_filter_expr(&mut self, mut node: Expr) -> ParseResult<Expr> {
        loop {
            let current = self.stream.current();
            node = if current.ty() == TokenType::Pipe {
                self.parse_filter(Some(node), false)?
            } else if current.is_name("is") {
                self.parse_test(node)?
            } else if current.ty() == TokenType::LParen {
                self.parse_call(node)?
            } else {
                return Ok(node);
            };
        }
    }

    fn parse_subscript(&mut self, node: Expr) -> ParseResult<Expr> {
        let token = self.stream.next();
        match token.ty() {
            TokenType::Dot => {
                let attr = self.stream.next();
                match attr.kind {
                    TokenKind::Name(name) => Ok(Expr::Getattr {
                        node: boxed(node),
                        attr: name,
                        line: token.line,
                    }),
                    TokenKind::Integer(index) => Ok(Expr::Getitem {
                        node: boxed(node),
                        arg: boxed(Expr::constant(Const::Int(index), attr.line)),
                        line: token.line,
                    }),
                    _ => self.fail("expected name or number", Some(attr.line)),
                }
            }
            TokenType::LBracket => {
                let mut args = Vec::new();
                while self.stream.current().ty() != TokenType::RBracket {
                    if !args.is_empty() {
                        self.stream.expect_type(TokenType::Comma)?;
                    }
                    args.push(self.parse_subscribed()?);
                }
                self.stream.expect_type(TokenType::RBracket)?;
                let arg = if args.len() == 1 {
                    args.remove(0)
                } else {
                    Expr::Tuple {
                        items: args,
                        ctx: Ctx::Load,
                        line: token.line,
                    }
                };
                Ok(Expr::Getitem {
                    node: boxed(node),
                    arg: boxed(arg),
                    line: token.line,
                })
            }
            _ => self.fail("expected subscript expression", Some(token.line)),
        }
    }

    fn parse_subscribed(&mut self) -> ParseResult<Expr> {
        let line = self.stream.current().line;
        let start = if self.stream.skip_if_type(TokenType::Colon) {
            None
        } else {
            let node = self.parse_expression(true, true)?;
            if !self.stream.skip_if_type(TokenType::Colon) {
                return Ok(node);
            }
            Some(boxed(node))
        };

        let stop = match self.stream.current().ty() {
            TokenType::Colon | TokenType::RBracket | TokenType::Comma => None,
            _ => Some(boxed(self.parse_expression(true, true)?)),
        };

        let step = if self.stream.skip_if_type(TokenType::Colon) {
            match self.stream.current().ty() {
                TokenType::RBracket | TokenType::Comma => None,
                _ => Some(boxed(self.parse_expression(true, true)?)),
            }
        } else {
            None
        };

        Ok(Expr::Slice {
            start,
            stop,
            step,
            line,
        })
    }

    fn parse_call(&mut self, node: Expr) -> ParseResult<Expr> {
        let line = self.stream.current().line;
        let args = self.parse_call_args()?;
        Ok(Expr::Call {
            node: boxed(node),
            args,
            line,
        })
    }

    /// Parses an argument list opened either by `(` or, for the Liquid
    /// filter form `| name: a, b`, by `:`. The colon form runs to the next
    /// pipe or tag end and its positional arguments take no filters.
    pub fn parse_call_args(&mut self) -> ParseResult<CallArgs> {
        let token = self.stream.current().clone();
        let (end_types, with_filter): (&[TokenType], bool) = match token.ty() {
            TokenType::LParen => (&[TokenType::RParen], true),
            TokenType::Colon => (
                &[TokenType::Pipe, TokenType::VariableEnd, TokenType::BlockEnd],
                false,
            ),
            _ => {
                return self.fail(
                    format!("expected token '(' or ':', got '{}'", token.describe()),
                    Some(token.line),
                );
            }
        };
        self.stream.next();

        let mut call = CallArgs::default();
        let mut require_comma = false;
        let at_end = |parser: &Parser| end_types.contains(&parser.stream.current().ty());
        let ensure = |parser: &Parser, ok: bool| -> ParseResult<()> {
            if ok {
                Ok(())
            } else {
                parser.fail(
                    "invalid syntax for function call expression",
                    Some(token.line),
                )
            }
        };

        while !at_end(self) {
            if require_comma {
                self.stream.expect_type(TokenType::Comma)?;
                if at_end(self) {
                    break;
                }
            }
            match self.stream.current().ty() {
                TokenType::Mul => {
                    ensure(self, call.dyn_args.is_none() && call.dyn_kwargs.is_none())?;
                    self.stream.next();
                    call.dyn_args = Some(boxed(self.parse_expression(true, true)?));
                }
                TokenType::Pow => {
                    ensure(self, call.dyn_kwargs.is_none())?;
                    self.stream.next();
                    call.dyn_kwargs = Some(boxed(self.parse_expression(true, true)?));
                }
                _ => {
                    ensure(self, call.dyn_args.is_none() && call.dyn_kwargs.is_none())?;
                    let is_kwarg = self.stream.current().ty() == TokenType::Name
                        && self.stream.look().ty() == TokenType::Assign;
                    if is_kwarg {
                        let key = self.stream.current().name().unwrap_or_default().to_string();
                        self.stream.skip(2);
                        let value = self.parse_expression(true, with_filter)?;
                        let line = value.line();
                        call.kwargs.push(Keyword { key, value, line });
                    } else {
                        ensure(self, call.kwargs.is_empty())?;
                        call.args.push(self.parse_expression(true, with_filter)?);
                    }
                }
            }
            require_comma = true;
        }
        if token.ty() == TokenType::LParen {
            self.stream.next();
        }
        Ok(call)
    }

    /// Applies a chain of `| name[.name](args)` filters to `node`. With
    /// `start_inline` the first filter is not preceded by a pipe.
    pub fn parse_filter(&mut self, node: Option<Expr>, start_inline: bool) -> ParseResult<Expr> {
        let mut node = node;
        let mut start_inline = start_inline;
        while self.stream.current().ty() == TokenType::Pipe || start_inline {
            if !start_inline {
                self.stream.next();
            }
            let token = self.stream.expect_type(TokenType::Name)?;
            let name = self.parse_dotted_name(&token)?;
            let args = match self.stream.current().ty() {
                TokenType::Colon | TokenType::LParen => self.parse_call_args()?,
                _ => CallArgs::default(),
            };
            node = Some(Expr::Filter {
                node: node.map(boxed),
                name,
                args,
                line: token.line,
            });
            start_inline = false;
        }
        match node {
            Some(node) => Ok(node),
            None => self.fail("expected filter", None),
        }
    }

    fn parse_dotted_name(&mut self, first: &Token) -> ParseResult<String> {
        let mut name = first.name().unwrap_or_default().to_string();
        while self.stream.skip_if_type(TokenType::Dot) {
            let part = self.stream.expect_type(TokenType::Name)?;
            name.push('.');
            name.push_str(part.name().unwrap_or_default());
        }
        Ok(name)
    }

    fn parse_test(&mut self, node: Expr) -> ParseResult<Expr> {
        let token = self.stream.next();
        let negated = self.stream.skip_if_name("not");
        let name_token = self.stream.expect_type(TokenType::Name)?;
        let name = self.parse_dotted_name(&name_token)?;

        let current = self.stream.current();
        let args = if current.ty() == TokenType::LParen {
            self.parse_call_args()?
        } else if matches!(
            current.ty(),
            TokenType::Name
                | TokenType::String
                | TokenType::Integer
                | TokenType::Float
                | TokenType::LParen
                | TokenType::LBracket
                | TokenType::LBrace
        ) && !current.is_name("else")
            && !current.is_name("or")
            && !current.is_name("and")
        {
            if current.is_name("is") {
                return self.fail("You cannot chain multiple tests with is", None);
            }
            CallArgs::positional(vec![self.parse_primary()?])
        } else {
            CallArgs::default()
        };

        let test = Expr::Test {
            node: boxed(node),
            name,
            args,
            line: token.line,
        };
        if negated {
            return Ok(Expr::Not {
                node: boxed(test),
                line: token.line,
            });
        }
        Ok(test)
    }
}
