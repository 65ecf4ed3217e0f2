#![allow(dead_code, unused_imports)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use filters::{FilterArgs, FilterError, StandardFilter, Value};
pub use syntax::{
    BinOpKind, CallArgs, CompareOp, Const, Ctx, Environment, Expr, Node, Stmt, SyntaxErrorKind,
    Template, TemplateSyntaxError, parse,
};

pub fn liquid_env() -> Arc<Environment> {
    Arc::new(Environment::liquid())
}

pub fn parse_liquid(source: &str) -> Template {
    parse(&liquid_env(), source, Some("test"), None).expect("template should parse")
}

pub fn parse_error(source: &str) -> TemplateSyntaxError {
    match parse(&liquid_env(), source, Some("test"), None) {
        Ok(template) => panic!("expected syntax error, parsed {:?}", template.body),
        Err(err) => err,
    }
}

/// Expressions printed by the template's top-level output statements.
pub fn output_exprs(template: &Template) -> Vec<&Expr> {
    template
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Output { nodes, .. } => Some(nodes),
            _ => None,
        })
        .flatten()
        .filter(|expr| !matches!(expr, Expr::TemplateData { .. }))
        .collect()
}

pub fn single_expr(source: &str) -> Expr {
    let template = parse_liquid(source);
    let exprs = output_exprs(&template);
    assert_eq!(exprs.len(), 1, "expected one printed expression in {source}");
    exprs[0].clone()
}

#[derive(Debug, PartialEq)]
pub enum RenderError {
    Filter(FilterError),
    UnknownFilter(String),
    Unsupported(&'static str),
}

impl From<FilterError> for RenderError {
    fn from(value: FilterError) -> Self {
        RenderError::Filter(value)
    }
}

pub fn render(source: &str, context: serde_json::Value) -> Result<String, RenderError> {
    let template = parse_liquid(source);
    render_template(&template, context)
}

pub fn render_ok(source: &str, context: serde_json::Value) -> String {
    render(source, context).expect("template should render")
}

pub fn render_template(
    template: &Template,
    context: serde_json::Value,
) -> Result<String, RenderError> {
    let mut root = HashMap::new();
    if let Value::Map(map) = Value::from(context) {
        root.extend(map);
    }
    let mut renderer = Renderer {
        scopes: vec![root],
        out: String::new(),
    };
    renderer.exec_body(&template.body)?;
    Ok(renderer.out)
}

enum Flow {
    Normal,
    Break,
    Continue,
}

/// Minimal tree-walking evaluator for exercising parser output.
struct Renderer {
    scopes: Vec<HashMap<String, Value>>,
    out: String,
}

impl Renderer {
    fn lookup(&self, name: &str) -> Value {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
            .unwrap_or_default()
    }

    fn store(&mut self, target: &Expr, value: Value) -> Result<(), RenderError> {
        match target {
            Expr::Name { name, .. } | Expr::InternalName { name, .. } => {
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.clone(), value);
                }
                Ok(())
            }
            Expr::Tuple { items, .. } => {
                let values = value.into_items();
                for (index, item) in items.iter().enumerate() {
                    self.store(item, values.get(index).cloned().unwrap_or_default())?;
                }
                Ok(())
            }
            _ => Err(RenderError::Unsupported("assignment target")),
        }
    }

    fn exec_body(&mut self, body: &[Stmt]) -> Result<Flow, RenderError> {
        for stmt in body {
            match self.exec(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn capture(&mut self, body: &[Stmt]) -> Result<String, RenderError> {
        let saved = std::mem::take(&mut self.out);
        let result = self.exec_body(body);
        let captured = std::mem::replace(&mut self.out, saved);
        result?;
        Ok(captured)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, RenderError> {
        match stmt {
            Stmt::Output { nodes, .. } => {
                for node in nodes {
                    let value = self.eval(node)?;
                    self.out.push_str(&value.to_string());
                }
            }
            Stmt::If {
                test, body, else_, ..
            } => {
                let branch = if self.eval(test)?.is_truthy() {
                    body
                } else {
                    else_
                };
                return self.exec_body(branch);
            }
            Stmt::For {
                target,
                iter,
                body,
                else_,
                test,
                ..
            } => {
                let mut items = self.eval(iter)?.into_items();
                self.scopes.push(HashMap::new());
                if let Some(test) = test {
                    let mut kept = Vec::new();
                    for item in items {
                        self.store(target, item.clone())?;
                        if self.eval(test)?.is_truthy() {
                            kept.push(item);
                        }
                    }
                    items = kept;
                }
                let mut result = Ok(Flow::Normal);
                for item in &items {
                    self.store(target, item.clone())?;
                    match self.exec_body(body) {
                        Ok(Flow::Break) => break,
                        Ok(_) => {}
                        Err(err) => {
                            result = Err(err);
                            break;
                        }
                    }
                }
                self.scopes.pop();
                result?;
                if items.is_empty() {
                    return self.exec_body(else_);
                }
            }
            Stmt::Break { .. } => return Ok(Flow::Break),
            Stmt::Continue { .. } => return Ok(Flow::Continue),
            Stmt::Assign { target, node, .. } => {
                let value = self.eval(node)?;
                self.store(target, value)?;
            }
            Stmt::AssignBlock { target, body, .. } => {
                let captured = self.capture(body)?;
                self.store(target, Value::Str(captured))?;
            }
            Stmt::ExprStmt { node, .. } => {
                self.eval(node)?;
            }
            Stmt::With {
                targets,
                values,
                body,
                ..
            } => {
                let values = values
                    .iter()
                    .map(|value| self.eval(value))
                    .collect::<Result<Vec<_>, _>>()?;
                self.scopes.push(HashMap::new());
                for (target, value) in targets.iter().zip(values) {
                    self.store(target, value)?;
                }
                let result = self.exec_body(body);
                self.scopes.pop();
                return result;
            }
            Stmt::Scope { body, .. } | Stmt::ScopedEvalContextModifier { body, .. } => {
                return self.exec_body(body);
            }
            Stmt::FilterBlock { filter, body, .. } => {
                let captured = self.capture(body)?;
                let value = self.apply_filter_chain(filter, Value::Str(captured))?;
                self.out.push_str(&value.to_string());
            }
            _ => return Err(RenderError::Unsupported(stmt.kind_name())),
        }
        Ok(Flow::Normal)
    }

    /// Evaluates a `{% filter %}` chain whose innermost filter has no input.
    fn apply_filter_chain(&mut self, filter: &Expr, input: Value) -> Result<Value, RenderError> {
        match filter {
            Expr::Filter {
                node, name, args, ..
            } => {
                let value = match node {
                    Some(node) => self.apply_filter_chain(node, input)?,
                    None => input,
                };
                self.call_filter(name, &value, args)
            }
            other => self.eval(other),
        }
    }

    fn call_filter(
        &mut self,
        name: &str,
        value: &Value,
        args: &CallArgs,
    ) -> Result<Value, RenderError> {
        let filter = StandardFilter::from_name(name)
            .ok_or_else(|| RenderError::UnknownFilter(name.to_string()))?;
        let mut filter_args = FilterArgs::new(
            args.args
                .iter()
                .map(|arg| self.eval(arg))
                .collect::<Result<Vec<_>, _>>()?,
        );
        for keyword in &args.kwargs {
            let value = self.eval(&keyword.value)?;
            filter_args = filter_args.with_kwarg(keyword.key.clone(), value);
        }
        Ok(filter.apply(value, &filter_args)?)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RenderError> {
        Ok(match expr {
            Expr::Const { value, .. } => match value {
                Const::None => Value::None,
                Const::Bool(value) => Value::Bool(*value),
                Const::Int(value) => Value::Int(*value),
                Const::Float(value) => Value::Float(*value),
                Const::Str(value) => Value::Str(value.clone()),
            },
            Expr::TemplateData { data, .. } => Value::Str(data.clone()),
            Expr::Name { name, .. } | Expr::InternalName { name, .. } => self.lookup(name),
            Expr::Tuple { items, .. } | Expr::List { items, .. } => Value::List(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Dict { items, .. } => {
                let mut map = BTreeMap::new();
                for pair in items {
                    let key = self.eval(&pair.key)?.to_string();
                    let value = self.eval(&pair.value)?;
                    map.insert(key, value);
                }
                Value::Map(map)
            }
            Expr::Getattr { node, attr, .. } => {
                self.eval(node)?.field(attr).unwrap_or_default()
            }
            Expr::Getitem { node, arg, .. } => {
                let container = self.eval(node)?;
                if let Expr::Slice {
                    start, stop, step, ..
                } = arg.as_ref()
                {
                    let start = self.eval_bound(start.as_deref())?;
                    let stop = self.eval_bound(stop.as_deref())?;
                    let step = self.eval_bound(step.as_deref())?;
                    return slice(container, start, stop, step);
                }
                let key = self.eval(arg)?;
                index(&container, &key)
            }
            Expr::Filter {
                node, name, args, ..
            } => {
                let value = match node {
                    Some(node) => self.eval(node)?,
                    None => Value::Undefined,
                };
                self.call_filter(name, &value, args)?
            }
            Expr::Test {
                node, name, args, ..
            } => {
                let value = self.eval(node)?;
                let arg = match args.args.first() {
                    Some(arg) => Some(self.eval(arg)?),
                    None => None,
                };
                Value::Bool(run_test(name, &value, arg.as_ref())?)
            }
            Expr::CondExpr {
                test, expr1, expr2, ..
            } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(expr1)?
                } else {
                    match expr2 {
                        Some(expr2) => self.eval(expr2)?,
                        None => Value::Undefined,
                    }
                }
            }
            Expr::And { left, right, .. } => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    self.eval(right)?
                } else {
                    left
                }
            }
            Expr::Or { left, right, .. } => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    left
                } else {
                    self.eval(right)?
                }
            }
            Expr::Not { node, .. } => Value::Bool(!self.eval(node)?.is_truthy()),
            Expr::Neg { node, .. } => {
                let value = self.eval(node)?;
                StandardFilter::Times.apply(&value, &FilterArgs::new(vec![Value::Int(-1)]))?
            }
            Expr::Pos { node, .. } => self.eval(node)?,
            Expr::BinOp {
                op, left, right, ..
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                let filter = match op {
                    BinOpKind::Add => StandardFilter::Plus,
                    BinOpKind::Sub => StandardFilter::Minus,
                    BinOpKind::Mul => StandardFilter::Times,
                    BinOpKind::Div | BinOpKind::FloorDiv => StandardFilter::DividedBy,
                    BinOpKind::Mod => StandardFilter::Modulo,
                    BinOpKind::Pow => return Err(RenderError::Unsupported("power")),
                };
                filter.apply(&left, &FilterArgs::new(vec![right]))?
            }
            Expr::Concat { nodes, .. } => {
                let mut text = String::new();
                for node in nodes {
                    text.push_str(&self.eval(node)?.to_string());
                }
                Value::Str(text)
            }
            Expr::Compare { expr, ops, .. } => {
                let mut left = self.eval(expr)?;
                for operand in ops {
                    let right = self.eval(&operand.expr)?;
                    if !compare(operand.op, &left, &right) {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Value::Bool(true)
            }
            Expr::Slice { .. } => return Err(RenderError::Unsupported("bare slice")),
            Expr::Call { .. } => return Err(RenderError::Unsupported("call")),
        })
    }

    fn eval_bound(&mut self, bound: Option<&Expr>) -> Result<Option<i64>, RenderError> {
        let Some(bound) = bound else {
            return Ok(None);
        };
        match self.eval(bound)? {
            Value::Undefined | Value::None => Ok(None),
            value => Ok(Some(filters::to_index(&value)?)),
        }
    }
}

fn slice(
    container: Value,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Value, RenderError> {
    if step.is_some_and(|step| step != 1) {
        return Err(RenderError::Unsupported("slice step"));
    }
    let items = container.into_items();
    let len = items.len() as i64;
    let clamp = |bound: i64| {
        if bound < 0 {
            (bound + len).max(0)
        } else {
            bound.min(len)
        }
    };
    let start = clamp(start.unwrap_or(0));
    let stop = clamp(stop.unwrap_or(len));
    if start >= stop {
        return Ok(Value::List(Vec::new()));
    }
    Ok(Value::List(items[start as usize..stop as usize].to_vec()))
}

fn index(container: &Value, key: &Value) -> Value {
    match (container, key) {
        (Value::List(items), Value::Int(index)) => {
            let index = if *index < 0 {
                *index + items.len() as i64
            } else {
                *index
            };
            usize::try_from(index)
                .ok()
                .and_then(|index| items.get(index).cloned())
                .unwrap_or_default()
        }
        (container, key) => container.field(&key.to_string()).unwrap_or_default(),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    use std::cmp::Ordering;
    match op {
        CompareOp::Eq => left == right,
        CompareOp::Ne => left != right,
        CompareOp::Lt => left.compare(right) == Ordering::Less,
        CompareOp::LtEq => left.compare(right) != Ordering::Greater,
        CompareOp::Gt => left.compare(right) == Ordering::Greater,
        CompareOp::GtEq => left.compare(right) != Ordering::Less,
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => !contains(right, left),
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::List(items) => items.contains(needle),
        Value::Str(text) => text.contains(&needle.to_string()),
        Value::Map(map) => map.contains_key(&needle.to_string()),
        _ => false,
    }
}

fn run_test(name: &str, value: &Value, arg: Option<&Value>) -> Result<bool, RenderError> {
    Ok(match name {
        "defined" => !matches!(value, Value::Undefined),
        "undefined" => matches!(value, Value::Undefined),
        "none" => matches!(value, Value::None),
        "even" => matches!(value, Value::Int(value) if value % 2 == 0),
        "odd" => matches!(value, Value::Int(value) if value % 2 != 0),
        "divisibleby" => match (value, arg) {
            (Value::Int(value), Some(Value::Int(by))) if *by != 0 => value % by == 0,
            _ => false,
        },
        _ => return Err(RenderError::Unsupported("test")),
    })
}
