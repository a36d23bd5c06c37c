use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::foundation::error::ImagegenResult;
use crate::script::ast::FuncBody;
use crate::script::interp::{Env, Interpreter};

/// Host-provided function callable from templates.
pub type NativeFn = dyn Fn(Vec<Value>) -> ImagegenResult<Vec<Value>>;

/// Host function that calls back into the interpreter (`pcall`, `table.sort`).
///
/// Receives the call-site line and is responsible for locating its own errors.
pub type HostFn = dyn Fn(&mut Interpreter, Vec<Value>, usize) -> ImagegenResult<Vec<Value>>;

/// Shared, mutable table handle.
pub type TableRef = Rc<RefCell<Table>>;

/// Host object exposed to templates.
///
/// The marshaller extracts these by concrete type, so values built by the injected constructors
/// are recognised without re-parsing tables.
pub trait UserData: fmt::Debug {
    /// Name reported by `type()` and in validation messages.
    fn type_name(&self) -> &'static str;

    /// Read-only field access (`v.x`, `font.name`).
    fn get_field(&self, _key: &str) -> Option<Value> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Untyped script value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Table(TableRef),
    Function(Rc<Function>),
    UserData(Rc<dyn UserData>),
}

pub enum Function {
    Native {
        name: &'static str,
        call: Box<NativeFn>,
    },
    Host {
        name: &'static str,
        call: Box<HostFn>,
    },
    Closure {
        name: Rc<str>,
        body: Rc<FuncBody>,
        env: Env,
    },
}

impl Function {
    pub(crate) fn name(&self) -> &str {
        match self {
            Self::Native { name, .. } | Self::Host { name, .. } => name,
            Self::Closure { name, .. } => name,
        }
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }

    pub fn native(
        name: &'static str,
        call: impl Fn(Vec<Value>) -> ImagegenResult<Vec<Value>> + 'static,
    ) -> Self {
        Self::Function(Rc::new(Function::Native {
            name,
            call: Box::new(call),
        }))
    }

    pub fn host(
        name: &'static str,
        call: impl Fn(&mut Interpreter, Vec<Value>, usize) -> ImagegenResult<Vec<Value>> + 'static,
    ) -> Self {
        Self::Function(Rc::new(Function::Host {
            name,
            call: Box::new(call),
        }))
    }

    pub fn user_data(data: impl UserData + 'static) -> Self {
        Self::UserData(Rc::new(data))
    }

    pub fn new_table(table: Table) -> Self {
        Self::Table(Rc::new(RefCell::new(table)))
    }

    /// Build a sequence table from string items.
    pub fn string_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut t = Table::default();
        for s in items {
            t.push(Value::str(s.as_ref()));
        }
        Self::new_table(t)
    }

    /// Type name as reported to templates and in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Table(_) => "table",
            Self::Function(_) => "function",
            Self::UserData(u) => u.type_name(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Number, or a string that parses as one.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Str(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Downcast a userdata value to a concrete host type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::UserData(u) => u.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Text form used by `tostring`, `print` and `..`.
    pub fn display(&self) -> String {
        match self {
            Self::Nil => "nil".to_owned(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Str(s) => s.to_string(),
            Self::Table(t) => format!("table: {:p}", Rc::as_ptr(t)),
            Self::Function(f) => format!("function: {}", f.name()),
            Self::UserData(u) => format!("{u:?}"),
        }
    }

    /// Raw equality (`==`): by value for scalars, by identity for reference types.
    pub fn raw_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Table(a), Self::Table(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::UserData(a), Self::UserData(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            other => f.write_str(&other.display()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let v = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()? as f64
    } else {
        if body.is_empty() || body.starts_with(['+', '-']) {
            return None;
        }
        body.parse::<f64>().ok()?
    };
    Some(if neg { -v } else { v })
}

/// Table key. Floats with an integral value normalise to `Int`, as in Lua.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
}

impl TableKey {
    /// Convert a value into a key; `None` for nil, NaN and reference types.
    pub fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Some(Self::Int(*n as i64)),
            Value::Number(n) => Some(Self::Float(n.to_bits())),
            Value::Str(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number(*i as f64),
            Self::Float(bits) => Value::Number(f64::from_bits(*bits)),
            Self::Str(s) => Value::Str(s.clone()),
        }
    }
}

/// Lua-style table: a dense array part for keys `1..=n` plus an ordered map for the rest.
///
/// The map is a `BTreeMap` so `pairs` iteration is deterministic.
#[derive(Clone, Debug, Default)]
pub struct Table {
    array: Vec<Value>,
    map: BTreeMap<TableKey, Value>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length operator (`#t`): size of the array part.
    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty() && self.map.is_empty()
    }

    pub fn get(&self, key: &TableKey) -> Value {
        if let TableKey::Int(i) = key
            && *i >= 1
            && (*i as usize) <= self.array.len()
        {
            return self.array[(*i - 1) as usize].clone();
        }
        self.map.get(key).cloned().unwrap_or_default()
    }

    pub fn get_str(&self, key: &str) -> Value {
        self.map
            .get(&TableKey::Str(Rc::from(key)))
            .cloned()
            .unwrap_or_default()
    }

    /// 1-based positional lookup.
    pub fn get_index(&self, index: usize) -> Value {
        self.get(&TableKey::Int(index as i64))
    }

    pub fn set(&mut self, key: TableKey, value: Value) {
        if let TableKey::Int(i) = key
            && i >= 1
        {
            let idx = i as usize;
            let len = self.array.len();
            if idx <= len {
                if value.is_nil() && idx == len {
                    self.array.pop();
                    while matches!(self.array.last(), Some(Value::Nil)) {
                        self.array.pop();
                    }
                } else {
                    self.array[idx - 1] = value;
                }
                return;
            }
            if idx == len + 1 && !value.is_nil() {
                self.array.push(value);
                self.migrate_from_map();
                return;
            }
        }
        if value.is_nil() {
            self.map.remove(&key);
        } else {
            self.map.insert(key, value);
        }
    }

    pub fn set_str(&mut self, key: &str, value: Value) {
        self.set(TableKey::Str(Rc::from(key)), value);
    }

    /// Store constructor positional values at `1..=n`.
    ///
    /// Every slot is kept, nil included, so `#t` and [`Table::sequence`] cover each positional
    /// field and a nil in the middle of a list stays visible to consumers.
    pub fn set_positional(&mut self, values: Vec<Value>) {
        for (i, v) in values.into_iter().enumerate() {
            self.map.remove(&TableKey::Int(i as i64 + 1));
            if i < self.array.len() {
                self.array[i] = v;
            } else {
                self.array.push(v);
            }
        }
        self.migrate_from_map();
    }

    pub fn push(&mut self, value: Value) {
        let next = self.array.len() as i64 + 1;
        self.set(TableKey::Int(next), value);
    }

    /// Array items in order. May hold nil slots written by a table constructor.
    pub fn sequence(&self) -> &[Value] {
        &self.array
    }

    /// All entries, array part first, then map entries in key order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        let mut out = Vec::with_capacity(self.array.len() + self.map.len());
        for (i, v) in self.array.iter().enumerate() {
            if !v.is_nil() {
                out.push((Value::Number((i + 1) as f64), v.clone()));
            }
        }
        for (k, v) in &self.map {
            out.push((k.to_value(), v.clone()));
        }
        out
    }

    fn migrate_from_map(&mut self) {
        loop {
            let next = TableKey::Int(self.array.len() as i64 + 1);
            match self.map.remove(&next) {
                Some(v) => self.array.push(v),
                None => break,
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/script/value.rs"]
mod tests;
