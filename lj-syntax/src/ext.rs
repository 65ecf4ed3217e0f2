//! Bundled Liquid-dialect tags.

use crate::environment::Extension;
use crate::error::ParseResult;
use crate::nodes::{CompareOp, Ctx, Expr, Operand, Stmt};
use crate::parser::{Parser, Statement};
use crate::token::{TokenRule, TokenType};

/// `{% case x %}{% when a, b %}..{% else %}..{% endcase %}`, lowered to an
/// assignment of the subject to a fresh internal name plus an `If` chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaseExtension;

struct WhenBranch {
    values: Vec<Expr>,
    body: Vec<Stmt>,
    line: usize,
}

impl Extension for CaseExtension {
    fn name(&self) -> &'static str {
        "case"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["case"]
    }

    fn parse(&self, parser: &mut Parser) -> ParseResult<Statement> {
        let line = parser.stream().next().line;
        let subject = parser.parse_expression(true, true)?;
        let mut target = parser.free_identifier(line);
        target.set_ctx(Ctx::Store);

        let branch_ends = [
            TokenRule::name("when"),
            TokenRule::name("else"),
            TokenRule::name("endcase"),
        ];
        // anything between `case` and the first `when` is ignored
        parser.parse_statements(&branch_ends, false)?;

        let mut branches = Vec::new();
        let mut fallback = Vec::new();
        loop {
            let token = parser.stream().next();
            if token.is_name("when") {
                let values = parse_when_values(parser)?;
                let body = parser.parse_statements(&branch_ends, false)?;
                branches.push(WhenBranch {
                    values,
                    body,
                    line: token.line,
                });
            } else if token.is_name("else") {
                fallback = parser.parse_statements(&[TokenRule::name("endcase")], false)?;
            } else {
                break;
            }
        }

        let mut chain = fallback;
        for branch in branches.into_iter().rev() {
            let test = branch
                .values
                .into_iter()
                .map(|value| Expr::Compare {
                    expr: Box::new(Expr::InternalName {
                        name: internal_name(&target),
                        line: branch.line,
                    }),
                    ops: vec![Operand {
                        op: CompareOp::Eq,
                        expr: value,
                    }],
                    line: branch.line,
                })
                .reduce(|left, right| Expr::Or {
                    left: Box::new(left),
                    right: Box::new(right),
                    line: branch.line,
                });
            let Some(test) = test else {
                continue;
            };
            chain = vec![Stmt::If {
                test,
                body: branch.body,
                else_: chain,
                line: branch.line,
            }];
        }

        let mut statements = vec![Stmt::Assign {
            target,
            node: subject,
            line,
        }];
        statements.extend(chain);
        Ok(Statement::Multiple(statements))
    }
}

/// `when a, b` and `when a or b` both list alternatives.
fn parse_when_values(parser: &mut Parser) -> ParseResult<Vec<Expr>> {
    let mut values = Vec::new();
    loop {
        let expr = parser.parse_expression(false, true)?;
        flatten_or(expr, &mut values);
        if !parser.stream().skip_if_type(TokenType::Comma) {
            break;
        }
    }
    Ok(values)
}

fn flatten_or(expr: Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Or { left, right, .. } => {
            flatten_or(*left, out);
            flatten_or(*right, out);
        }
        other => out.push(other),
    }
}

fn internal_name(target: &Expr) -> String {
    match target {
        Expr::InternalName { name, .. } => name.clone(),
        _ => String::new(),
    }
}

/// `{% do expr %}` evaluates an expression and discards the result.
#[derive(Debug, Default, Clone, Copy)]
pub struct DoExtension;

impl Extension for DoExtension {
    fn name(&self) -> &'static str {
        "do"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["do"]
    }

    fn parse(&self, parser: &mut Parser) -> ParseResult<Statement> {
        let line = parser.stream().next().line;
        let node = parser.parse_tuple(false, true, &[], false)?;
        Ok(Statement::Single(Stmt::ExprStmt { node, line }))
    }
}
