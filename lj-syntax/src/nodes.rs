use std::sync::Arc;

use crate::environment::Environment;

/// How a name-like node is used: read, written, or bound as a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ctx {
    Load,
    Store,
    Param,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Const {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOpKind {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOpKind::Add => "+",
            BinOpKind::Sub => "-",
            BinOpKind::Mul => "*",
            BinOpKind::Div => "/",
            BinOpKind::FloorDiv => "//",
            BinOpKind::Mod => "%",
            BinOpKind::Pow => "**",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        }
    }
}

/// One `(operator, operand)` link of a comparison chain.
#[derive(Clone, Debug, PartialEq)]
pub struct Operand {
    pub op: CompareOp,
    pub expr: Expr,
}

/// `key: value` entry of a dict literal.
#[derive(Clone, Debug, PartialEq)]
pub struct Pair {
    pub key: Expr,
    pub value: Expr,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Keyword {
    pub key: String,
    pub value: Expr,
    pub line: usize,
}

/// Argument shape shared by calls, filters and tests.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<Expr>,
    pub kwargs: Vec<Keyword>,
    pub dyn_args: Option<Box<Expr>>,
    pub dyn_kwargs: Option<Box<Expr>>,
}

impl CallArgs {
    pub fn positional(args: Vec<Expr>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
            && self.kwargs.is_empty()
            && self.dyn_args.is_none()
            && self.dyn_kwargs.is_none()
    }

    pub fn kwarg(&self, key: &str) -> Option<&Expr> {
        self.kwargs
            .iter()
            .find(|keyword| keyword.key == key)
            .map(|keyword| &keyword.value)
    }

    fn children(&self) -> impl Iterator<Item = &Expr> {
        self.args
            .iter()
            .chain(self.kwargs.iter().map(|keyword| &keyword.value))
            .chain(self.dyn_args.as_deref())
            .chain(self.dyn_kwargs.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Const {
        value: Const,
        line: usize,
    },
    TemplateData {
        data: String,
        line: usize,
    },
    Name {
        name: String,
        ctx: Ctx,
        line: usize,
    },
    /// Parser-generated identifier; never produced from template text.
    InternalName {
        name: String,
        line: usize,
    },
    Tuple {
        items: Vec<Expr>,
        ctx: Ctx,
        line: usize,
    },
    List {
        items: Vec<Expr>,
        line: usize,
    },
    Dict {
        items: Vec<Pair>,
        line: usize,
    },
    Getattr {
        node: Box<Expr>,
        attr: String,
        line: usize,
    },
    Getitem {
        node: Box<Expr>,
        arg: Box<Expr>,
        line: usize,
    },
    Slice {
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
        line: usize,
    },
    Call {
        node: Box<Expr>,
        args: CallArgs,
        line: usize,
    },
    /// `node` is `None` for the filter of a `{% filter %}` block.
    Filter {
        node: Option<Box<Expr>>,
        name: String,
        args: CallArgs,
        line: usize,
    },
    Test {
        node: Box<Expr>,
        name: String,
        args: CallArgs,
        line: usize,
    },
    CondExpr {
        test: Box<Expr>,
        expr1: Box<Expr>,
        expr2: Option<Box<Expr>>,
        line: usize,
    },
    And {
        left: Box<Expr>,
        right: Box<Expr>,
        line: usize,
    },
    Or {
        left: Box<Expr>,
        right: Box<Expr>,
        line: usize,
    },
    Not {
        node: Box<Expr>,
        line: usize,
    },
    Neg {
        node: Box<Expr>,
        line: usize,
    },
    Pos {
        node: Box<Expr>,
        line: usize,
    },
    BinOp {
        op: BinOpKind,
        left: Box<Expr>,
        right: Box<Expr>,
        line: usize,
    },
    Concat {
        nodes: Vec<Expr>,
        line: usize,
    },
    Compare {
        expr: Box<Expr>,
        ops: Vec<Operand>,
        line: usize,
    },
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::Const { line, .. }
            | Expr::TemplateData { line, .. }
            | Expr::Name { line, .. }
            | Expr::InternalName { line, .. }
            | Expr::Tuple { line, .. }
            | Expr::List { line, .. }
            | Expr::Dict { line, .. }
            | Expr::Getattr { line, .. }
            | Expr::Getitem { line, .. }
            | Expr::Slice { line, .. }
            | Expr::Call { line, .. }
            | Expr::Filter { line, .. }
            | Expr::Test { line, .. }
            | Expr::CondExpr { line, .. }
            | Expr::And { line, .. }
            | Expr::Or { line, .. }
            | Expr::Not { line, .. }
            | Expr::Neg { line, .. }
            | Expr::Pos { line, .. }
            | Expr::BinOp { line, .. }
            | Expr::Concat { line, .. }
            | Expr::Compare { line, .. } => *line,
        }
    }

    /// Lower-case variant name, as used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Const { .. } => "const",
            Expr::TemplateData { .. } => "templatedata",
            Expr::Name { .. } => "name",
            Expr::InternalName { .. } => "internalname",
            Expr::Tuple { .. } => "tuple",
            Expr::List { .. } => "list",
            Expr::Dict { .. } => "dict",
            Expr::Getattr { .. } => "getattr",
            Expr::Getitem { .. } => "getitem",
            Expr::Slice { .. } => "slice",
            Expr::Call { .. } => "call",
            Expr::Filter { .. } => "filter",
            Expr::Test { .. } => "test",
            Expr::CondExpr { .. } => "condexpr",
            Expr::And { .. } => "and",
            Expr::Or { .. } => "or",
            Expr::Not { .. } => "not",
            Expr::Neg { .. } => "neg",
            Expr::Pos { .. } => "pos",
            Expr::BinOp { .. } => "binop",
            Expr::Concat { .. } => "concat",
            Expr::Compare { .. } => "compare",
        }
    }

    pub fn name(name: impl Into<String>, line: usize) -> Self {
        Expr::Name {
            name: name.into(),
            ctx: Ctx::Load,
            line,
        }
    }

    pub fn constant(value: Const, line: usize) -> Self {
        Expr::Const { value, line }
    }

    /// Recursively marks names and tuples as load, store or parameter.
    pub fn set_ctx(&mut self, new_ctx: Ctx) {
        match self {
            Expr::Name { ctx, .. } => *ctx = new_ctx,
            Expr::Tuple { items, ctx, .. } => {
                *ctx = new_ctx;
                for item in items {
                    item.set_ctx(new_ctx);
                }
            }
            _ => {}
        }
    }

    pub fn can_assign(&self) -> bool {
        match self {
            Expr::Name { name, .. } => !matches!(
                name.as_str(),
                "true" | "false" | "none" | "True" | "False" | "None"
            ),
            Expr::InternalName { .. } => true,
            Expr::Tuple { items, .. } => items.iter().all(Expr::can_assign),
            _ => false,
        }
    }

    /// Visits this expression and every nested expression, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(Node<'a>)) {
        visit(Node::Expr(self));
        match self {
            Expr::Const { .. }
            | Expr::TemplateData { .. }
            | Expr::Name { .. }
            | Expr::InternalName { .. } => {}
            Expr::Tuple { items, .. } | Expr::List { items, .. } => {
                for item in items {
                    item.walk(visit);
                }
            }
            Expr::Dict { items, .. } => {
                for pair in items {
                    pair.key.walk(visit);
                    pair.value.walk(visit);
                }
            }
            Expr::Getattr { node, .. }
            | Expr::Not { node, .. }
            | Expr::Neg { node, .. }
            | Expr::Pos { node, .. } => node.walk(visit),
            Expr::Getitem { node, arg, .. } => {
                node.walk(visit);
                arg.walk(visit);
            }
            Expr::Slice {
                start, stop, step, ..
            } => {
                for part in [start, stop, step].into_iter().flatten() {
                    part.walk(visit);
                }
            }
            Expr::Call { node, args, .. } | Expr::Test { node, args, .. } => {
                node.walk(visit);
                for arg in args.children() {
                    arg.walk(visit);
                }
            }
            Expr::Filter { node, args, .. } => {
                if let Some(node) = node {
                    node.walk(visit);
                }
                for arg in args.children() {
                    arg.walk(visit);
                }
            }
            Expr::CondExpr {
                test, expr1, expr2, ..
            } => {
                test.walk(visit);
                expr1.walk(visit);
                if let Some(expr2) = expr2 {
                    expr2.walk(visit);
                }
            }
            Expr::And { left, right, .. }
            | Expr::Or { left, right, .. }
            | Expr::BinOp { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::Concat { nodes, .. } => {
                for node in nodes {
                    node.walk(visit);
                }
            }
            Expr::Compare { expr, ops, .. } => {
                expr.walk(visit);
                for operand in ops {
                    operand.expr.walk(visit);
                }
            }
        }
    }
}

/// A name imported by `{% from ... import name as alias %}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Output {
        nodes: Vec<Expr>,
        line: usize,
    },
    Extends {
        template: Expr,
        line: usize,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        else_: Vec<Stmt>,
        test: Option<Expr>,
        recursive: bool,
        line: usize,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        else_: Vec<Stmt>,
        line: usize,
    },
    Break {
        line: usize,
    },
    Continue {
        line: usize,
    },
    With {
        targets: Vec<Expr>,
        values: Vec<Expr>,
        body: Vec<Stmt>,
        line: usize,
    },
    Scope {
        body: Vec<Stmt>,
        line: usize,
    },
    ScopedEvalContextModifier {
        options: Vec<Keyword>,
        body: Vec<Stmt>,
        line: usize,
    },
    Block {
        name: String,
        scoped: bool,
        body: Vec<Stmt>,
        line: usize,
    },
    Include {
        template: Expr,
        ignore_missing: bool,
        with_context: bool,
        line: usize,
    },
    Section {
        template: Expr,
        ignore_missing: bool,
        with_context: bool,
        line: usize,
    },
    Import {
        template: Expr,
        target: String,
        with_context: bool,
        line: usize,
    },
    FromImport {
        template: Expr,
        names: Vec<ImportName>,
        with_context: bool,
        line: usize,
    },
    Macro {
        name: String,
        args: Vec<Expr>,
        defaults: Vec<Expr>,
        body: Vec<Stmt>,
        line: usize,
    },
    CallBlock {
        call: Expr,
        args: Vec<Expr>,
        defaults: Vec<Expr>,
        body: Vec<Stmt>,
        line: usize,
    },
    FilterBlock {
        filter: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    Assign {
        target: Expr,
        node: Expr,
        line: usize,
    },
    AssignBlock {
        target: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    ExprStmt {
        node: Expr,
        line: usize,
    },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::Output { line, .. }
            | Stmt::Extends { line, .. }
            | Stmt::For { line, .. }
            | Stmt::If { line, .. }
            | Stmt::Break { line }
            | Stmt::Continue { line }
            | Stmt::With { line, .. }
            | Stmt::Scope { line, .. }
            | Stmt::ScopedEvalContextModifier { line, .. }
            | Stmt::Block { line, .. }
            | Stmt::Include { line, .. }
            | Stmt::Section { line, .. }
            | Stmt::Import { line, .. }
            | Stmt::FromImport { line, .. }
            | Stmt::Macro { line, .. }
            | Stmt::CallBlock { line, .. }
            | Stmt::FilterBlock { line, .. }
            | Stmt::Assign { line, .. }
            | Stmt::AssignBlock { line, .. }
            | Stmt::ExprStmt { line, .. } => *line,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Output { .. } => "output",
            Stmt::Extends { .. } => "extends",
            Stmt::For { .. } => "for",
            Stmt::If { .. } => "if",
            Stmt::Break { .. } => "break",
            Stmt::Continue { .. } => "continue",
            Stmt::With { .. } => "with",
            Stmt::Scope { .. } => "scope",
            Stmt::ScopedEvalContextModifier { .. } => "scopedevalcontextmodifier",
            Stmt::Block { .. } => "block",
            Stmt::Include { .. } => "include",
            Stmt::Section { .. } => "section",
            Stmt::Import { .. } => "import",
            Stmt::FromImport { .. } => "fromimport",
            Stmt::Macro { .. } => "macro",
            Stmt::CallBlock { .. } => "callblock",
            Stmt::FilterBlock { .. } => "filterblock",
            Stmt::Assign { .. } => "assign",
            Stmt::AssignBlock { .. } => "assignblock",
            Stmt::ExprStmt { .. } => "exprstmt",
        }
    }

    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(Node<'a>)) {
        visit(Node::Stmt(self));
        match self {
            Stmt::Output { nodes, .. } => {
                for node in nodes {
                    node.walk(visit);
                }
            }
            Stmt::Extends { template, .. }
            | Stmt::Include { template, .. }
            | Stmt::Section { template, .. }
            | Stmt::Import { template, .. }
            | Stmt::FromImport { template, .. } => template.walk(visit),
            Stmt::For {
                target,
                iter,
                body,
                else_,
                test,
                ..
            } => {
                target.walk(visit);
                iter.walk(visit);
                if let Some(test) = test {
                    test.walk(visit);
                }
                walk_body(body, visit);
                walk_body(else_, visit);
            }
            Stmt::If {
                test, body, else_, ..
            } => {
                test.walk(visit);
                walk_body(body, visit);
                walk_body(else_, visit);
            }
            Stmt::Break { .. } | Stmt::Continue { .. } => {}
            Stmt::With {
                targets,
                values,
                body,
                ..
            } => {
                for expr in targets.iter().chain(values) {
                    expr.walk(visit);
                }
                walk_body(body, visit);
            }
            Stmt::Scope { body, .. } | Stmt::Block { body, .. } => walk_body(body, visit),
            Stmt::ScopedEvalContextModifier { options, body, .. } => {
                for option in options {
                    option.value.walk(visit);
                }
                walk_body(body, visit);
            }
            Stmt::Macro {
                args,
                defaults,
                body,
                ..
            } => {
                for expr in args.iter().chain(defaults) {
                    expr.walk(visit);
                }
                walk_body(body, visit);
            }
            Stmt::CallBlock {
                call,
                args,
                defaults,
                body,
                ..
            } => {
                call.walk(visit);
                for expr in args.iter().chain(defaults) {
                    expr.walk(visit);
                }
                walk_body(body, visit);
            }
            Stmt::FilterBlock { filter, body, .. } => {
                filter.walk(visit);
                walk_body(body, visit);
            }
            Stmt::Assign { target, node, .. } => {
                target.walk(visit);
                node.walk(visit);
            }
            Stmt::AssignBlock { target, body, .. } => {
                target.walk(visit);
                walk_body(body, visit);
            }
            Stmt::ExprStmt { node, .. } => node.walk(visit),
        }
    }
}

fn walk_body<'a>(body: &'a [Stmt], visit: &mut dyn FnMut(Node<'a>)) {
    for stmt in body {
        stmt.walk(visit);
    }
}

/// Borrowed view of any tree node, handed out by `walk`.
#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    Expr(&'a Expr),
    Stmt(&'a Stmt),
}

impl Node<'_> {
    pub fn line(&self) -> usize {
        match self {
            Node::Expr(expr) => expr.line(),
            Node::Stmt(stmt) => stmt.line(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Expr(expr) => expr.kind_name(),
            Node::Stmt(stmt) => stmt.kind_name(),
        }
    }
}

/// Root of a parsed template, tied to the environment it was parsed with.
#[derive(Clone, Debug)]
pub struct Template {
    pub body: Vec<Stmt>,
    pub environment: Arc<Environment>,
}

impl Template {
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(Node<'a>)) {
        for stmt in &self.body {
            stmt.walk(visit);
        }
    }

    /// Collects every expression node matching `pred`, in walk order.
    pub fn find_all<'a>(&'a self, pred: impl Fn(&Expr) -> bool) -> Vec<&'a Expr> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if let Node::Expr(expr) = node
                && pred(expr)
            {
                found.push(expr);
            }
        });
        found
    }
}
