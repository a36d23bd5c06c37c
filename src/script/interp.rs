use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::foundation::error::{ImagegenError, ImagegenResult};
use crate::script::ast::{BinaryOp, Block, Expr, FuncBody, Stmt, TableField, UnaryOp};
use crate::script::parser::parse_chunk;
use crate::script::value::{Function, Table, TableKey, TableRef, Value};

const MAX_CALL_DEPTH: usize = 200;

/// Lexical scope handle captured by closures.
pub type Env = Rc<Scope>;

#[derive(Debug, Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Env>,
}

impl Scope {
    fn child(parent: &Env) -> Env {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
        })
    }

    fn declare(&self, name: &str, value: Value) {
        self.vars.borrow_mut().insert(name.to_owned(), value);
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.vars.borrow().get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    fn assign(&self, name: &str, value: Value) -> Result<(), Value> {
        if let Some(slot) = self.vars.borrow_mut().get_mut(name) {
            *slot = value;
            return Ok(());
        }
        match &self.parent {
            Some(p) => p.assign(name, value),
            None => Err(value),
        }
    }
}

enum Flow {
    Normal,
    Break,
    Return(Vec<Value>),
}

/// Tree-walking interpreter for template chunks.
///
/// Globals live in a plain [`Table`] so the host can read the post-execution state directly.
///
/// Script calls recurse on the native stack. Reaching the 200-call limit in an unoptimised build
/// needs more than the 2 MiB a spawned thread gets by default; [`crate::job::load_scene`] runs
/// templates on a thread sized for it.
pub struct Interpreter {
    chunk: String,
    globals: TableRef,
    depth: usize,
}

impl Interpreter {
    /// Create an interpreter with an empty global table.
    ///
    /// `chunk` names the source in error messages.
    pub fn new(chunk: impl Into<String>) -> Self {
        Self {
            chunk: chunk.into(),
            globals: Rc::new(RefCell::new(Table::new())),
            depth: 0,
        }
    }

    pub fn chunk(&self) -> &str {
        &self.chunk
    }

    pub fn globals(&self) -> &TableRef {
        &self.globals
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.globals.borrow_mut().set_str(name, value);
    }

    pub fn get_global(&self, name: &str) -> Value {
        self.globals.borrow().get_str(name)
    }

    /// Parse and run `src` as the main chunk, returning whatever the chunk returned.
    #[tracing::instrument(skip(self, src), fields(chunk = %self.chunk))]
    pub fn exec_source(&mut self, src: &str) -> ImagegenResult<Vec<Value>> {
        let block = parse_chunk(&self.chunk, src)?;
        let env: Env = Rc::new(Scope::default());
        match self.exec_block(&block, &env)? {
            Flow::Normal => Ok(Vec::new()),
            Flow::Return(values) => Ok(values),
            Flow::Break => Err(ImagegenError::script(format!(
                "{}: 'break' outside a loop",
                self.chunk
            ))),
        }
    }

    /// Call a function value with `args`.
    pub fn call(&mut self, f: &Value, args: Vec<Value>, line: usize) -> ImagegenResult<Vec<Value>> {
        let Value::Function(func) = f else {
            return Err(self.err(line, format!("attempt to call a {} value", f.type_name())));
        };
        match func.as_ref() {
            Function::Native { call, .. } => {
                call(args).map_err(|e| e.at(&format!("{}:{line}", self.chunk)))
            }
            Function::Host { call, .. } => call(self, args, line),
            Function::Closure { body, env, .. } => {
                if self.depth >= MAX_CALL_DEPTH {
                    return Err(self.err(line, "stack overflow"));
                }
                self.depth += 1;
                let out = self.call_closure(body, env, args);
                self.depth -= 1;
                out
            }
        }
    }

    fn call_closure(
        &mut self,
        body: &FuncBody,
        env: &Env,
        args: Vec<Value>,
    ) -> ImagegenResult<Vec<Value>> {
        let scope = Scope::child(env);
        let mut args = args.into_iter();
        for p in &body.params {
            scope.declare(p, args.next().unwrap_or_default());
        }
        match self.exec_block(&body.body, &scope)? {
            Flow::Normal => Ok(Vec::new()),
            Flow::Return(values) => Ok(values),
            Flow::Break => Err(self.err(body.line, "'break' outside a loop")),
        }
    }

    pub(crate) fn err(&self, line: usize, msg: impl std::fmt::Display) -> ImagegenError {
        ImagegenError::script(format!("{}:{line}: {msg}", self.chunk))
    }

    fn exec_block(&mut self, block: &Block, parent: &Env) -> ImagegenResult<Flow> {
        let env = Scope::child(parent);
        for stmt in &block.stmts {
            match self.exec_stmt(stmt, &env)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> ImagegenResult<Flow> {
        match stmt {
            Stmt::Local { names, values, .. } => {
                let mut values = self.eval_list(values, env)?.into_iter();
                for name in names {
                    env.declare(name, values.next().unwrap_or_default());
                }
            }
            Stmt::Assign {
                targets,
                values,
                line,
            } => {
                let mut values = self.eval_list(values, env)?.into_iter();
                for target in targets {
                    let v = values.next().unwrap_or_default();
                    self.assign(target, v, env, *line)?;
                }
            }
            Stmt::Call { call } => {
                self.eval_multi(call, env)?;
            }
            Stmt::Do(body) => return self.exec_block(body, env),
            Stmt::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond, env)?.truthy() {
                        return self.exec_block(body, env);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(body, env);
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(cond, env)?.truthy() {
                    match self.exec_block(body, env)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal => {}
                    }
                }
            }
            Stmt::NumericFor {
                var,
                start,
                end,
                step,
                body,
                line,
            } => {
                let start = self.for_number(start, env, *line, "initial")?;
                let end = self.for_number(end, env, *line, "limit")?;
                let step = match step {
                    Some(e) => self.for_number(e, env, *line, "step")?,
                    None => 1.0,
                };
                if step == 0.0 {
                    return Err(self.err(*line, "'for' step is zero"));
                }
                let mut i = start;
                while (step > 0.0 && i <= end) || (step < 0.0 && i >= end) {
                    let scope = Scope::child(env);
                    scope.declare(var, Value::Number(i));
                    match self.exec_block(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal => {}
                    }
                    i += step;
                }
            }
            Stmt::GenericFor {
                vars,
                iter,
                body,
                line,
            } => {
                let mut init = self.eval_multi(iter, env)?.into_iter();
                let f = init.next().unwrap_or_default();
                let state = init.next().unwrap_or_default();
                let mut control = init.next().unwrap_or_default();
                loop {
                    let results = self.call(&f, vec![state.clone(), control.clone()], *line)?;
                    let first = results.first().cloned().unwrap_or_default();
                    if first.is_nil() {
                        break;
                    }
                    control = first;
                    let scope = Scope::child(env);
                    let mut results = results.into_iter();
                    for v in vars {
                        scope.declare(v, results.next().unwrap_or_default());
                    }
                    match self.exec_block(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal => {}
                    }
                }
            }
            Stmt::LocalFunction { name, func } => {
                // Declared first so the body can recurse.
                env.declare(name, Value::Nil);
                let f = Value::Function(Rc::new(Function::Closure {
                    name: Rc::from(name.as_str()),
                    body: func.clone(),
                    env: env.clone(),
                }));
                env.declare(name, f);
            }
            Stmt::Return { values } => {
                return Ok(Flow::Return(self.eval_list(values, env)?));
            }
            Stmt::Break => return Ok(Flow::Break),
        }
        Ok(Flow::Normal)
    }

    fn for_number(
        &mut self,
        e: &Expr,
        env: &Env,
        line: usize,
        what: &str,
    ) -> ImagegenResult<f64> {
        let v = self.eval(e, env)?;
        v.coerce_number()
            .ok_or_else(|| self.err(line, format!("'for' {what} value must be a number")))
    }

    fn assign(&mut self, target: &Expr, value: Value, env: &Env, line: usize) -> ImagegenResult<()> {
        match target {
            Expr::Name(name) => {
                if let Err(value) = env.assign(name, value) {
                    self.globals.borrow_mut().set_str(name, value);
                }
                Ok(())
            }
            Expr::Index { obj, key, line } => {
                let obj = self.eval(obj, env)?;
                let key = self.eval(key, env)?;
                match &obj {
                    Value::Table(t) => {
                        let key = TableKey::from_value(&key).ok_or_else(|| {
                            self.err(*line, format!("invalid table key ({})", key.type_name()))
                        })?;
                        t.borrow_mut().set(key, value);
                        Ok(())
                    }
                    other => Err(self.err(
                        *line,
                        format!("attempt to assign a field of a {} value", other.type_name()),
                    )),
                }
            }
            _ => Err(self.err(line, "cannot assign to this expression")),
        }
    }

    fn eval_list(&mut self, exprs: &[Expr], env: &Env) -> ImagegenResult<Vec<Value>> {
        let mut out = Vec::with_capacity(exprs.len());
        for (i, e) in exprs.iter().enumerate() {
            if i + 1 == exprs.len() {
                out.extend(self.eval_multi(e, env)?);
            } else {
                out.push(self.eval(e, env)?);
            }
        }
        Ok(out)
    }

    /// Evaluate keeping every result of a trailing call.
    fn eval_multi(&mut self, e: &Expr, env: &Env) -> ImagegenResult<Vec<Value>> {
        match e {
            Expr::Call { callee, args, line } => {
                let f = self.eval(callee, env)?;
                let args = self.eval_list(args, env)?;
                self.call(&f, args, *line)
            }
            other => Ok(vec![self.eval(other, env)?]),
        }
    }

    fn eval(&mut self, e: &Expr, env: &Env) -> ImagegenResult<Value> {
        Ok(match e {
            Expr::Nil => Value::Nil,
            Expr::True => Value::Bool(true),
            Expr::False => Value::Bool(false),
            Expr::Number(n) => Value::Number(*n),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::Name(name) => env
                .lookup(name)
                .unwrap_or_else(|| self.globals.borrow().get_str(name)),
            Expr::Index { obj, key, line } => {
                let obj = self.eval(obj, env)?;
                let key = self.eval(key, env)?;
                self.index(&obj, &key, *line)?
            }
            Expr::Call { .. } => self.eval_multi(e, env)?.into_iter().next().unwrap_or_default(),
            Expr::Function(body) => Value::Function(Rc::new(Function::Closure {
                name: Rc::from("anonymous"),
                body: body.clone(),
                env: env.clone(),
            })),
            Expr::Table(fields) => self.table(fields, env)?,
            Expr::Binary {
                op,
                left,
                right,
                line,
            } => self.binary(*op, left, right, env, *line)?,
            Expr::Unary { op, expr, line } => {
                let v = self.eval(expr, env)?;
                match op {
                    UnaryOp::Not => Value::Bool(!v.truthy()),
                    UnaryOp::Neg => Value::Number(-self.arith_operand(&v, *line)?),
                    UnaryOp::Len => match &v {
                        Value::Str(s) => Value::Number(s.len() as f64),
                        Value::Table(t) => Value::Number(t.borrow().len() as f64),
                        other => {
                            return Err(self.err(
                                *line,
                                format!("attempt to get length of a {} value", other.type_name()),
                            ));
                        }
                    },
                }
            }
        })
    }

    fn index(&self, obj: &Value, key: &Value, line: usize) -> ImagegenResult<Value> {
        match obj {
            Value::Table(t) => Ok(TableKey::from_value(key)
                .map(|k| t.borrow().get(&k))
                .unwrap_or_default()),
            Value::UserData(u) => Ok(key
                .as_str()
                .and_then(|k| u.get_field(k))
                .unwrap_or_default()),
            other => Err(self.err(
                line,
                format!(
                    "attempt to index a {} value (key '{}')",
                    other.type_name(),
                    key.display()
                ),
            )),
        }
    }

    fn table(&mut self, fields: &[TableField], env: &Env) -> ImagegenResult<Value> {
        let mut t = Table::new();
        // Positional fields keep their slot even when the value is nil.
        let mut positional = Vec::new();
        for (i, field) in fields.iter().enumerate() {
            match field {
                TableField::Positional(e) => {
                    let values = if i + 1 == fields.len() {
                        self.eval_multi(e, env)?
                    } else {
                        vec![self.eval(e, env)?]
                    };
                    positional.extend(values);
                }
                TableField::Named(name, e) => {
                    let v = self.eval(e, env)?;
                    t.set(TableKey::Str(name.clone()), v);
                }
                TableField::Keyed(k, e) => {
                    let k = self.eval(k, env)?;
                    let v = self.eval(e, env)?;
                    if let Some(key) = TableKey::from_value(&k) {
                        t.set(key, v);
                    }
                }
            }
        }
        t.set_positional(positional);
        Ok(Value::new_table(t))
    }

    fn arith_operand(&self, v: &Value, line: usize) -> ImagegenResult<f64> {
        v.coerce_number().ok_or_else(|| {
            self.err(
                line,
                format!("attempt to perform arithmetic on a {} value", v.type_name()),
            )
        })
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        env: &Env,
        line: usize,
    ) -> ImagegenResult<Value> {
        // Short-circuit operators return one of their operands.
        match op {
            BinaryOp::And => {
                let l = self.eval(left, env)?;
                return if l.truthy() { self.eval(right, env) } else { Ok(l) };
            }
            BinaryOp::Or => {
                let l = self.eval(left, env)?;
                return if l.truthy() { Ok(l) } else { self.eval(right, env) };
            }
            _ => {}
        }

        let l = self.eval(left, env)?;
        let r = self.eval(right, env)?;
        Ok(match op {
            BinaryOp::Eq => Value::Bool(l.raw_eq(&r)),
            BinaryOp::Ne => Value::Bool(!l.raw_eq(&r)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ord = match (&l, &r) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                    _ => {
                        return Err(self.err(
                            line,
                            format!("attempt to compare {} with {}", l.type_name(), r.type_name()),
                        ));
                    }
                };
                let Some(ord) = ord else {
                    return Ok(Value::Bool(false));
                };
                Value::Bool(match op {
                    BinaryOp::Lt => ord.is_lt(),
                    BinaryOp::Le => ord.is_le(),
                    BinaryOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                })
            }
            BinaryOp::Concat => {
                let part = |v: &Value| match v {
                    Value::Str(_) | Value::Number(_) => Ok(v.display()),
                    other => Err(self.err(
                        line,
                        format!("attempt to concatenate a {} value", other.type_name()),
                    )),
                };
                let mut s = part(&l)?;
                s.push_str(&part(&r)?);
                Value::from(s)
            }
            _ => {
                let a = self.arith_operand(&l, line)?;
                let b = self.arith_operand(&r, line)?;
                Value::Number(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Mod => a - (a / b).floor() * b,
                    _ => a.powf(b),
                })
            }
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/script/interp.rs"]
mod tests;
