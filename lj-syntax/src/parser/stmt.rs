use super::Parser;
use crate::error::{ParseResult, SyntaxErrorKind};
use crate::nodes::{BinOpKind, CallArgs, Const, Ctx, Expr, ImportName, Keyword, Stmt};
use crate::token::{TokenRule, TokenType};

fn end_tag(name: &str) -> TokenRule {
    TokenRule::name(format!("end{name}"))
}

impl Parser {
    /// `set`, `assign` and `capture` share one grammar and differ only in
    /// their closing tag.
    pub(super) fn parse_set(&mut self, tag: &str) -> ParseResult<Stmt> {
        let line = self.stream.next().line;
        let target = self.parse_assign_target(true, false, &[])?;
        if self.stream.skip_if_type(TokenType::Assign) {
            let node = self.parse_tuple(false, true, &[], false)?;
            return Ok(Stmt::Assign { target, node, line });
        }
        let body = self.parse_statements(&[end_tag(tag)], true)?;
        Ok(Stmt::AssignBlock { target, body, line })
    }

    /// Iterable of a `for` tag with its `reversed`, `limit:` and `offset:`
    /// modifiers applied. Reversal always happens after slicing.
    fn parse_for_iter(&mut self) -> ParseResult<Expr> {
        let extra_end_rules = [
            TokenRule::name("recursive"),
            TokenRule::name("reversed"),
            TokenRule::name("limit"),
            TokenRule::name("offset"),
        ];
        let mut iter = self.parse_tuple(false, false, &extra_end_rules, false)?;
        let line = iter.line();

        let mut reverse = false;
        let mut limit = None;
        let mut offset = None;
        loop {
            let current = self.stream.current();
            if current.is_name("reversed") {
                self.stream.next();
                reverse = true;
            } else if current.is_name("limit") {
                self.stream.next();
                self.stream.expect_type(TokenType::Colon)?;
                limit = Some(self.parse_expression(true, true)?);
            } else if current.is_name("offset") {
                self.stream.next();
                self.stream.expect_type(TokenType::Colon)?;
                offset = Some(self.parse_expression(true, true)?);
            } else {
                break;
            }
        }

        if limit.is_some() || offset.is_some() {
            let start = offset.unwrap_or_else(|| Expr::constant(Const::Int(0), line));
            let stop = match limit {
                Some(limit) => Expr::BinOp {
                    op: BinOpKind::Add,
                    left: Box::new(start.clone()),
                    right: Box::new(limit),
                    line,
                },
                None => Expr::constant(Const::None, line),
            };
            iter = Expr::Getitem {
                node: Box::new(iter),
                arg: Box::new(Expr::Slice {
                    start: Some(Box::new(start)),
                    stop: Some(Box::new(stop)),
                    step: None,
                    line,
                }),
                line,
            };
        }
        if reverse {
            iter = Expr::Filter {
                node: Some(Box::new(iter)),
                name: "reverse".to_string(),
                args: CallArgs::default(),
                line,
            };
        }
        Ok(iter)
    }

    pub(super) fn parse_for(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.expect_name("for")?.line;
        let target = self.parse_assign_target(true, false, &[TokenRule::name("in")])?;
        self.stream.expect_name("in")?;
        let iter = self.parse_for_iter()?;
        let test = if self.stream.skip_if_name("if") {
            Some(self.parse_expression(true, true)?)
        } else {
            None
        };
        let recursive = self.stream.skip_if_name("recursive");
        let body = self.parse_statements(&[TokenRule::name("endfor"), TokenRule::name("else")], false)?;
        let else_ = if self.stream.next().is_name("endfor") {
            Vec::new()
        } else {
            self.parse_statements(&[TokenRule::name("endfor")], true)?
        };
        Ok(Stmt::For {
            target,
            iter,
            body,
            else_,
            test,
            recursive,
            line,
        })
    }

    /// Shared by `if` and `unless`; `elif` branches nest as a single `If` in
    /// the parent's `else_`. Only the outermost test is negated.
    fn parse_if_chain(&mut self, line: usize, tag: &str, negate: bool) -> ParseResult<Stmt> {
        let mut test = self.parse_tuple(false, false, &[], false)?;
        if negate {
            let test_line = test.line();
            test = Expr::Not {
                node: Box::new(test),
                line: test_line,
            };
        }
        let body = self.parse_statements(
            &[TokenRule::name("elif"), TokenRule::name("else"), end_tag(tag)],
            false,
        )?;
        let token = self.stream.next();
        let else_ = if token.is_name("elif") {
            let elif_line = self.stream.current().line;
            vec![self.parse_if_chain(elif_line, tag, false)?]
        } else if token.is_name("else") {
            self.parse_statements(&[end_tag(tag)], true)?
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            test,
            body,
            else_,
            line,
        })
    }

    pub(super) fn parse_if(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.expect_name("if")?.line;
        self.parse_if_chain(line, "if", false)
    }

    pub(super) fn parse_unless(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.expect_name("unless")?.line;
        self.parse_if_chain(line, "unless", true)
    }

    pub(super) fn parse_break(&mut self) -> ParseResult<Stmt> {
        Ok(Stmt::Break {
            line: self.stream.next().line,
        })
    }

    pub(super) fn parse_continue(&mut self) -> ParseResult<Stmt> {
        Ok(Stmt::Continue {
            line: self.stream.next().line,
        })
    }

    pub(super) fn parse_with(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.next().line;
        let mut targets = Vec::new();
        let mut values = Vec::new();
        while self.stream.current().ty() != TokenType::BlockEnd {
            if !targets.is_empty() {
                self.stream.expect_type(TokenType::Comma)?;
            }
            let mut target = self.parse_assign_target(true, false, &[])?;
            target.set_ctx(Ctx::Param);
            targets.push(target);
            self.stream.expect_type(TokenType::Assign)?;
            values.push(self.parse_expression(true, true)?);
        }
        let body = self.parse_statements(&[TokenRule::name("endwith")], true)?;
        Ok(Stmt::With {
            targets,
            values,
            body,
            line,
        })
    }

    pub(super) fn parse_autoescape(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.next().line;
        let value = self.parse_expression(true, true)?;
        let options = vec![Keyword {
            key: "autoescape".to_string(),
            line: value.line(),
            value,
        }];
        let body = self.parse_statements(&[TokenRule::name("endautoescape")], true)?;
        Ok(Stmt::Scope {
            body: vec![Stmt::ScopedEvalContextModifier {
                options,
                body,
                line,
            }],
            line,
        })
    }

    pub(super) fn parse_block(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.next().line;
        let name_token = self.stream.expect_type(TokenType::Name)?;
        let name = name_token.name().unwrap_or_default().to_string();
        let scoped = self.stream.skip_if_name("scoped");
        if self.stream.current().ty() == TokenType::Sub {
            return self.fail(
                "Block names have to be valid identifiers and may not contain hyphens, \
                 use an underscore instead.",
                None,
            );
        }
        let body = self.parse_statements(&[TokenRule::name("endblock")], true)?;
        self.stream.skip_if_name(&name);
        Ok(Stmt::Block {
            name,
            scoped,
            body,
            line,
        })
    }

    pub(super) fn parse_extends(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.next().line;
        let template = self.parse_expression(true, true)?;
        Ok(Stmt::Extends { template, line })
    }

    /// Consumes a trailing `with context` / `without context`, if present.
    fn parse_context_modifier(&mut self) -> Option<bool> {
        let current = self.stream.current();
        if (current.is_name("with") || current.is_name("without"))
            && self.stream.look().is_name("context")
        {
            let with_context = self.stream.next().is_name("with");
            self.stream.next();
            return Some(with_context);
        }
        None
    }

    fn parse_include_parts(&mut self) -> ParseResult<(usize, Expr, bool, bool)> {
        let line = self.stream.next().line;
        let template = self.parse_expression(true, true)?;
        let ignore_missing =
            self.stream.current().is_name("ignore") && self.stream.look().is_name("missing");
        if ignore_missing {
            self.stream.skip(2);
        }
        let with_context = self.parse_context_modifier().unwrap_or(true);
        Ok((line, template, ignore_missing, with_context))
    }

    pub(super) fn parse_include(&mut self) -> ParseResult<Stmt> {
        let (line, template, ignore_missing, with_context) = self.parse_include_parts()?;
        Ok(Stmt::Include {
            template,
            ignore_missing,
            with_context,
            line,
        })
    }

    pub(super) fn parse_section(&mut self) -> ParseResult<Stmt> {
        let (line, template, ignore_missing, with_context) = self.parse_include_parts()?;
        Ok(Stmt::Section {
            template,
            ignore_missing,
            with_context,
            line,
        })
    }

    pub(super) fn parse_import(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.next().line;
        let template = self.parse_expression(true, true)?;
        self.stream.expect_name("as")?;
        let target = target_name(self.parse_assign_target(true, true, &[])?);
        let with_context = self.parse_context_modifier().unwrap_or(false);
        Ok(Stmt::Import {
            template,
            target,
            with_context,
            line,
        })
    }

    pub(super) fn parse_from(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.next().line;
        let template = self.parse_expression(true, true)?;
        self.stream.expect_name("import")?;
        let mut names = Vec::new();
        let mut with_context = None;

        loop {
            if !names.is_empty() {
                self.stream.expect_type(TokenType::Comma)?;
            }
            if self.stream.current().ty() != TokenType::Name {
                break;
            }
            if let Some(modifier) = self.parse_context_modifier() {
                with_context = Some(modifier);
                break;
            }
            let target = self.parse_assign_target(true, true, &[])?;
            let target_line = target.line();
            let name = target_name(target);
            if name.starts_with('_') {
                return Err(self.error(
                    SyntaxErrorKind::Assertion,
                    "names starting with an underline can not be imported",
                    Some(target_line),
                ));
            }
            let alias = if self.stream.skip_if_name("as") {
                Some(target_name(self.parse_assign_target(true, true, &[])?))
            } else {
                None
            };
            names.push(ImportName { name, alias });
            if let Some(modifier) = self.parse_context_modifier() {
                with_context = Some(modifier);
                break;
            }
            if self.stream.current().ty() != TokenType::Comma {
                break;
            }
        }

        let with_context = match with_context {
            Some(with_context) => with_context,
            None => {
                self.stream.skip_if_type(TokenType::Comma);
                false
            }
        };
        Ok(Stmt::FromImport {
            template,
            names,
            with_context,
            line,
        })
    }

    /// `(a, b=1, ...)`; once a default appears every later parameter needs one.
    fn parse_signature(&mut self) -> ParseResult<(Vec<Expr>, Vec<Expr>)> {
        let mut args = Vec::new();
        let mut defaults = Vec::new();
        self.stream.expect_type(TokenType::LParen)?;
        while self.stream.current().ty() != TokenType::RParen {
            if !args.is_empty() {
                self.stream.expect_type(TokenType::Comma)?;
            }
            let mut arg = self.parse_assign_target(true, true, &[])?;
            arg.set_ctx(Ctx::Param);
            if self.stream.skip_if_type(TokenType::Assign) {
                defaults.push(self.parse_expression(true, true)?);
            } else if !defaults.is_empty() {
                return self.fail("non-default argument follows default argument", None);
            }
            args.push(arg);
        }
        self.stream.expect_type(TokenType::RParen)?;
        Ok((args, defaults))
    }

    pub(super) fn parse_call_block(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.next().line;
        let (args, defaults) = if self.stream.current().ty() == TokenType::LParen {
            self.parse_signature()?
        } else {
            (Vec::new(), Vec::new())
        };
        let call = self.parse_expression(true, true)?;
        if !matches!(call, Expr::Call { .. }) {
            return self.fail("expected call", Some(line));
        }
        let body = self.parse_statements(&[TokenRule::name("endcall")], true)?;
        Ok(Stmt::CallBlock {
            call,
            args,
            defaults,
            body,
            line,
        })
    }

    pub(super) fn parse_filter_block(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.next().line;
        let filter = self.parse_filter(None, true)?;
        let body = self.parse_statements(&[TokenRule::name("endfilter")], true)?;
        Ok(Stmt::FilterBlock { filter, body, line })
    }

    pub(super) fn parse_macro(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.next().line;
        let name = target_name(self.parse_assign_target(true, true, &[])?);
        let (args, defaults) = self.parse_signature()?;
        let body = self.parse_statements(&[TokenRule::name("endmacro")], true)?;
        Ok(Stmt::Macro {
            name,
            args,
            defaults,
            body,
            line,
        })
    }

    pub(super) fn parse_print(&mut self) -> ParseResult<Stmt> {
        let line = self.stream.next().line;
        let mut nodes = Vec::new();
        while self.stream.current().ty() != TokenType::BlockEnd {
            if !nodes.is_empty() {
                self.stream.expect_type(TokenType::Comma)?;
            }
            nodes.push(self.parse_expression(true, true)?);
        }
        Ok(Stmt::Output { nodes, line })
    }
}

fn target_name(target: Expr) -> String {
    match target {
        Expr::Name { name, .. } | Expr::InternalName { name, .. } => name,
        _ => String::new(),
    }
}
