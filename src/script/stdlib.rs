use std::cell::Cell;
use std::fmt::Write as _;
use std::time::Instant;

use chrono::{
    DateTime, Datelike, Local, Months, NaiveDate, TimeDelta, TimeZone, Timelike, Utc,
};

use crate::foundation::error::{ImagegenError, ImagegenResult};
use crate::script::interp::Interpreter;
use crate::script::value::{Table, TableKey, Value, format_number};

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn number_arg(func: &str, args: &[Value], i: usize) -> ImagegenResult<f64> {
    let v = arg(args, i);
    v.coerce_number().ok_or_else(|| {
        ImagegenError::script(format!(
            "bad argument #{} to '{func}' (number expected, got {})",
            i + 1,
            v.type_name()
        ))
    })
}

fn string_arg(func: &str, args: &[Value], i: usize) -> ImagegenResult<String> {
    match arg(args, i) {
        Value::Str(s) => Ok(s.to_string()),
        Value::Number(n) => Ok(format_number(n)),
        other => Err(ImagegenError::script(format!(
            "bad argument #{} to '{func}' (string expected, got {})",
            i + 1,
            other.type_name()
        ))),
    }
}

fn table_arg(func: &str, args: &[Value], i: usize) -> ImagegenResult<Value> {
    let v = arg(args, i);
    if v.as_table().is_none() {
        return Err(ImagegenError::script(format!(
            "bad argument #{} to '{func}' (table expected, got {})",
            i + 1,
            v.type_name()
        )));
    }
    Ok(v)
}

fn one(v: impl Into<Value>) -> ImagegenResult<Vec<Value>> {
    Ok(vec![v.into()])
}

/// Attach the call site to errors raised by host functions.
fn located(interp: &Interpreter, line: usize) -> impl Fn(ImagegenError) -> ImagegenError + '_ {
    move |e| e.at(&format!("{}:{line}", interp.chunk()))
}

/// Install the base library into the interpreter globals.
pub fn install(interp: &Interpreter) {
    interp.set_global(
        "print",
        Value::native("print", |args| {
            let line = args
                .iter()
                .map(Value::display)
                .collect::<Vec<_>>()
                .join("\t");
            tracing::info!(target: "imagegen::template", "{line}");
            Ok(Vec::new())
        }),
    );
    interp.set_global(
        "type",
        Value::native("type", |args| {
            let v = arg(&args, 0);
            let name = match &v {
                Value::UserData(_) => "userdata",
                other => other.type_name(),
            };
            one(name)
        }),
    );
    interp.set_global(
        "tostring",
        Value::native("tostring", |args| one(arg(&args, 0).display())),
    );
    interp.set_global(
        "tonumber",
        Value::native("tonumber", |args| {
            Ok(vec![
                arg(&args, 0)
                    .coerce_number()
                    .map(Value::Number)
                    .unwrap_or_default(),
            ])
        }),
    );
    interp.set_global(
        "error",
        Value::native("error", |args| {
            Err(ImagegenError::script(arg(&args, 0).display()))
        }),
    );
    interp.set_global(
        "assert",
        Value::native("assert", |args| {
            if arg(&args, 0).truthy() {
                return Ok(args);
            }
            let msg = match arg(&args, 1) {
                Value::Nil => "assertion failed!".to_owned(),
                other => other.display(),
            };
            Err(ImagegenError::script(msg))
        }),
    );
    interp.set_global(
        "ipairs",
        Value::native("ipairs", |args| {
            let t = table_arg("ipairs", &args, 0)?;
            let step = Value::native("ipairs_iter", |args| {
                let i = arg(&args, 1).as_number().unwrap_or(0.0) as usize + 1;
                let v = match arg(&args, 0) {
                    Value::Table(t) => t.borrow().get_index(i),
                    _ => Value::Nil,
                };
                if v.is_nil() {
                    return one(Value::Nil);
                }
                Ok(vec![Value::Number(i as f64), v])
            });
            Ok(vec![step, t, Value::Number(0.0)])
        }),
    );
    interp.set_global(
        "pairs",
        Value::native("pairs", |args| {
            let t = table_arg("pairs", &args, 0)?;
            // Iterates a snapshot; mutations during the loop are not observed.
            let entries = t.as_table().map(|t| t.borrow().entries()).unwrap_or_default();
            let cursor = Cell::new(0usize);
            let step = Value::native("pairs_iter", move |_| {
                let i = cursor.get();
                cursor.set(i + 1);
                Ok(match entries.get(i) {
                    Some((k, v)) => vec![k.clone(), v.clone()],
                    None => vec![Value::Nil],
                })
            });
            Ok(vec![step])
        }),
    );

    interp.set_global(
        "pcall",
        Value::host("pcall", |interp, mut args, line| {
            if args.is_empty() {
                return Err(interp.err(line, "bad argument #1 to 'pcall' (value expected)"));
            }
            let f = args.remove(0);
            match interp.call(&f, args, line) {
                Ok(mut out) => {
                    out.insert(0, Value::Bool(true));
                    Ok(out)
                }
                Err(e) => {
                    tracing::debug!(target: "imagegen::template", error = %e, "pcall caught");
                    Ok(vec![Value::Bool(false), Value::from(e.message())])
                }
            }
        }),
    );

    interp.set_global("math", math_lib());
    interp.set_global("string", string_lib());
    interp.set_global("table", table_lib());
    interp.set_global("bit32", bit32_lib());
    interp.set_global("os", os_lib());
}

fn math_lib() -> Value {
    fn unary(name: &'static str, f: fn(f64) -> f64) -> Value {
        Value::native(name, move |args| one(f(number_arg(name, &args, 0)?)))
    }

    let mut t = Table::new();
    t.set_str("floor", unary("floor", f64::floor));
    t.set_str("ceil", unary("ceil", f64::ceil));
    t.set_str("abs", unary("abs", f64::abs));
    t.set_str("sqrt", unary("sqrt", f64::sqrt));
    t.set_str("sin", unary("sin", f64::sin));
    t.set_str("cos", unary("cos", f64::cos));
    t.set_str("rad", unary("rad", f64::to_radians));
    t.set_str(
        "min",
        Value::native("min", |args| {
            let mut m = number_arg("min", &args, 0)?;
            for i in 1..args.len() {
                m = m.min(number_arg("min", &args, i)?);
            }
            one(m)
        }),
    );
    t.set_str(
        "max",
        Value::native("max", |args| {
            let mut m = number_arg("max", &args, 0)?;
            for i in 1..args.len() {
                m = m.max(number_arg("max", &args, i)?);
            }
            one(m)
        }),
    );
    t.set_str("pi", Value::Number(std::f64::consts::PI));
    t.set_str("huge", Value::Number(f64::INFINITY));
    Value::new_table(t)
}

fn string_lib() -> Value {
    let mut t = Table::new();
    t.set_str(
        "upper",
        Value::native("upper", |args| one(string_arg("upper", &args, 0)?.to_uppercase())),
    );
    t.set_str(
        "lower",
        Value::native("lower", |args| one(string_arg("lower", &args, 0)?.to_lowercase())),
    );
    t.set_str(
        "len",
        Value::native("len", |args| one(string_arg("len", &args, 0)?.len() as f64)),
    );
    t.set_str(
        "rep",
        Value::native("rep", |args| {
            let s = string_arg("rep", &args, 0)?;
            let n = number_arg("rep", &args, 1)?.max(0.0) as usize;
            one(s.repeat(n))
        }),
    );
    t.set_str(
        "sub",
        Value::native("sub", |args| {
            let s = string_arg("sub", &args, 0)?;
            let len = s.len() as i64;
            let norm = |i: i64| if i < 0 { (len + i + 1).max(1) } else { i.max(1) };
            let start = norm(number_arg("sub", &args, 1)? as i64);
            let end = match arg(&args, 2) {
                Value::Nil => len,
                _ => {
                    let e = number_arg("sub", &args, 2)? as i64;
                    if e < 0 { len + e + 1 } else { e.min(len) }
                }
            };
            if start > end {
                return one("");
            }
            let bytes = &s.as_bytes()[(start - 1) as usize..end as usize];
            one(String::from_utf8_lossy(bytes).into_owned())
        }),
    );
    t.set_str(
        "format",
        Value::native("format", |args| {
            let fmt = string_arg("format", &args, 0)?;
            one(format_values(&fmt, &args[1..])?)
        }),
    );
    Value::new_table(t)
}

fn table_lib() -> Value {
    let mut t = Table::new();
    t.set_str(
        "insert",
        Value::native("insert", |args| {
            let target = table_arg("insert", &args, 0)?;
            let Some(tbl) = target.as_table() else {
                return Ok(Vec::new());
            };
            let mut tbl = tbl.borrow_mut();
            if args.len() >= 3 {
                let pos = number_arg("insert", &args, 1)? as usize;
                let len = tbl.len();
                if pos < 1 || pos > len + 1 {
                    return Err(ImagegenError::script(
                        "bad argument #2 to 'insert' (position out of bounds)",
                    ));
                }
                for i in (pos..=len).rev() {
                    let v = tbl.get_index(i);
                    tbl.set(TableKey::Int(i as i64 + 1), v);
                }
                tbl.set(TableKey::Int(pos as i64), arg(&args, 2));
            } else {
                tbl.push(arg(&args, 1));
            }
            Ok(Vec::new())
        }),
    );
    t.set_str(
        "concat",
        Value::native("concat", |args| {
            let target = table_arg("concat", &args, 0)?;
            let sep = match arg(&args, 1) {
                Value::Nil => String::new(),
                _ => string_arg("concat", &args, 1)?,
            };
            let mut parts = Vec::new();
            if let Some(tbl) = target.as_table() {
                for (i, v) in tbl.borrow().sequence().iter().enumerate() {
                    match v {
                        Value::Str(_) | Value::Number(_) => parts.push(v.display()),
                        other => {
                            return Err(ImagegenError::script(format!(
                                "invalid value (at index {}) in table for 'concat' ({})",
                                i + 1,
                                other.type_name()
                            )));
                        }
                    }
                }
            }
            one(parts.join(&sep))
        }),
    );
    t.set_str(
        "remove",
        Value::native("remove", |args| {
            let target = table_arg("remove", &args, 0)?;
            let Some(tbl) = target.as_table() else {
                return Ok(Vec::new());
            };
            let mut tbl = tbl.borrow_mut();
            let len = tbl.len();
            let pos = match arg(&args, 1) {
                Value::Nil => len,
                _ => number_arg("remove", &args, 1)? as usize,
            };
            if len == 0 && pos == 0 {
                return one(Value::Nil);
            }
            if pos < 1 || pos > len + 1 {
                return Err(ImagegenError::script(
                    "bad argument #2 to 'remove' (position out of bounds)",
                ));
            }
            let removed = tbl.get_index(pos);
            for i in pos..len {
                let v = tbl.get_index(i + 1);
                tbl.set(TableKey::Int(i as i64), v);
            }
            if pos <= len {
                tbl.set(TableKey::Int(len as i64), Value::Nil);
            }
            one(removed)
        }),
    );
    t.set_str(
        "sort",
        Value::host("sort", |interp, args, line| {
            let target = table_arg("sort", &args, 0).map_err(located(interp, line))?;
            let Some(tbl) = target.as_table() else {
                return Ok(Vec::new());
            };
            let comp = arg(&args, 1);
            if !comp.is_nil() && !matches!(comp, Value::Function(_)) {
                return Err(interp.err(
                    line,
                    format!(
                        "bad argument #2 to 'sort' (function expected, got {})",
                        comp.type_name()
                    ),
                ));
            }
            // Sort a snapshot so the comparator may read the table.
            let items = tbl.borrow().sequence().to_vec();
            let sorted = merge_sort(items, &mut |a: &Value, b: &Value| match &comp {
                Value::Nil => default_less(a, b).map_err(located(interp, line)),
                f => {
                    let out = interp.call(f, vec![a.clone(), b.clone()], line)?;
                    Ok(out.first().is_some_and(Value::truthy))
                }
            })?;
            let mut tbl = tbl.borrow_mut();
            for (i, v) in sorted.into_iter().enumerate() {
                tbl.set(TableKey::Int(i as i64 + 1), v);
            }
            Ok(Vec::new())
        }),
    );
    Value::new_table(t)
}

fn default_less(a: &Value, b: &Value) -> ImagegenResult<bool> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(x < y),
        (Value::Str(x), Value::Str(y)) => Ok(x < y),
        _ => Err(ImagegenError::script(format!(
            "attempt to compare {} with {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Stable merge sort with a fallible `less`; never panics on an inconsistent comparator.
fn merge_sort(
    mut items: Vec<Value>,
    less: &mut dyn FnMut(&Value, &Value) -> ImagegenResult<bool>,
) -> ImagegenResult<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, less)?;
    let right = merge_sort(right, less)?;
    let mut out = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if less(&right[j], &left[i])? {
            out.push(right[j].clone());
            j += 1;
        } else {
            out.push(left[i].clone());
            i += 1;
        }
    }
    out.extend_from_slice(&left[i..]);
    out.extend_from_slice(&right[j..]);
    Ok(out)
}

/// Reduce a number to its 32-bit unsigned representation, as `bit32` does.
fn to_u32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    (n.floor() as i64).rem_euclid(1 << 32) as u32
}

fn u32_arg(func: &str, args: &[Value], i: usize) -> ImagegenResult<u32> {
    number_arg(func, args, i).map(to_u32)
}

fn shift_left(x: u32, disp: i64) -> u32 {
    match disp {
        d if d <= -32 || d >= 32 => 0,
        d if d >= 0 => x << d,
        d => x >> -d,
    }
}

fn bit32_lib() -> Value {
    fn fold(name: &'static str, init: u32, op: fn(u32, u32) -> u32) -> Value {
        Value::native(name, move |args| {
            let mut acc = init;
            for i in 0..args.len() {
                acc = op(acc, u32_arg(name, &args, i)?);
            }
            one(f64::from(acc))
        })
    }

    let mut t = Table::new();
    t.set_str("band", fold("band", u32::MAX, |a, b| a & b));
    t.set_str("bor", fold("bor", 0, |a, b| a | b));
    t.set_str("bxor", fold("bxor", 0, |a, b| a ^ b));
    t.set_str(
        "btest",
        Value::native("btest", |args| {
            let mut acc = u32::MAX;
            for i in 0..args.len() {
                acc &= u32_arg("btest", &args, i)?;
            }
            one(Value::Bool(acc != 0))
        }),
    );
    t.set_str(
        "bnot",
        Value::native("bnot", |args| one(f64::from(!u32_arg("bnot", &args, 0)?))),
    );
    t.set_str(
        "lshift",
        Value::native("lshift", |args| {
            let x = u32_arg("lshift", &args, 0)?;
            let disp = number_arg("lshift", &args, 1)? as i64;
            one(f64::from(shift_left(x, disp)))
        }),
    );
    t.set_str(
        "rshift",
        Value::native("rshift", |args| {
            let x = u32_arg("rshift", &args, 0)?;
            let disp = number_arg("rshift", &args, 1)? as i64;
            one(f64::from(shift_left(x, -disp)))
        }),
    );
    t.set_str(
        "arshift",
        Value::native("arshift", |args| {
            let x = u32_arg("arshift", &args, 0)? as i32;
            let disp = number_arg("arshift", &args, 1)? as i64;
            let out = match disp {
                d if d < 0 => shift_left(x as u32, -d),
                d if d >= 32 && x < 0 => u32::MAX,
                d if d >= 32 => 0,
                d => (x >> d) as u32,
            };
            one(f64::from(out))
        }),
    );
    t.set_str(
        "extract",
        Value::native("extract", |args| {
            let x = u32_arg("extract", &args, 0)?;
            let (field, width) = bit_field("extract", &args, 1)?;
            let mask = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
            one(f64::from((x >> field) & mask))
        }),
    );
    t.set_str(
        "replace",
        Value::native("replace", |args| {
            let x = u32_arg("replace", &args, 0)?;
            let v = u32_arg("replace", &args, 1)?;
            let (field, width) = bit_field("replace", &args, 2)?;
            let mask = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
            one(f64::from((x & !(mask << field)) | ((v & mask) << field)))
        }),
    );
    Value::new_table(t)
}

/// `(field, width)` arguments starting at `i`; width defaults to 1 and the field must fit.
fn bit_field(func: &str, args: &[Value], i: usize) -> ImagegenResult<(u32, u32)> {
    let field = number_arg(func, args, i)? as i64;
    let width = match arg(args, i + 1) {
        Value::Nil => 1,
        _ => number_arg(func, args, i + 1)? as i64,
    };
    if field < 0 {
        return Err(ImagegenError::script(format!(
            "bad argument #{} to '{func}' (field cannot be negative)",
            i + 1
        )));
    }
    if width <= 0 {
        return Err(ImagegenError::script(format!(
            "bad argument #{} to '{func}' (width must be positive)",
            i + 2
        )));
    }
    if field + width > 32 {
        return Err(ImagegenError::script(format!(
            "trying to access non-existent bits in '{func}'"
        )));
    }
    Ok((field as u32, width as u32))
}

fn os_lib() -> Value {
    let started = Instant::now();
    let mut t = Table::new();
    t.set_str(
        "clock",
        Value::native("clock", move |_| one(started.elapsed().as_secs_f64())),
    );
    t.set_str(
        "time",
        Value::native("time", |args| match arg(&args, 0) {
            Value::Nil => one(Utc::now().timestamp() as f64),
            Value::Table(fields) => one(time_from_fields(&fields.borrow())? as f64),
            other => Err(ImagegenError::script(format!(
                "bad argument #1 to 'time' (table expected, got {})",
                other.type_name()
            ))),
        }),
    );
    t.set_str(
        "date",
        Value::native("date", |args| {
            let format = match arg(&args, 0) {
                Value::Nil => "%c".to_owned(),
                _ => string_arg("date", &args, 0)?,
            };
            let stamp = match arg(&args, 1) {
                Value::Nil => Utc::now().timestamp(),
                _ => number_arg("date", &args, 1)? as i64,
            };
            let utc = DateTime::from_timestamp(stamp, 0).ok_or_else(|| {
                ImagegenError::script("bad argument #2 to 'date' (time out of range)")
            })?;
            match format.strip_prefix('!') {
                Some(rest) => format_date(&utc, rest),
                None => format_date(&utc.with_timezone(&Local), &format),
            }
        }),
    );
    Value::new_table(t)
}

/// `os.time{ year, month, day, hour = 12, min = 0, sec = 0 }` in local time.
fn time_from_fields(fields: &Table) -> ImagegenResult<i64> {
    let field = |key: &str, default: Option<i64>| -> ImagegenResult<i64> {
        match fields.get_str(key) {
            Value::Nil => default.ok_or_else(|| {
                ImagegenError::script(format!("field '{key}' missing in date table"))
            }),
            v => v
                .coerce_number()
                .map(|n| n as i64)
                .ok_or_else(|| ImagegenError::script(format!("field '{key}' is not a number"))),
        }
    };
    let year = field("year", None)?;
    let month = field("month", None)?;
    let day = field("day", None)?;
    let hour = field("hour", Some(12))?;
    let min = field("min", Some(0))?;
    let sec = field("sec", Some(0))?;

    let out_of_range = || ImagegenError::script("date table out of range");
    let base = i32::try_from(year)
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(out_of_range)?;
    let months = month - 1;
    let shifted = match u32::try_from(months.unsigned_abs()) {
        Ok(n) if months >= 0 => base.checked_add_months(Months::new(n)),
        Ok(n) => base.checked_sub_months(Months::new(n)),
        Err(_) => None,
    };
    // Out-of-range fields carry over, as with C mktime.
    let mut naive = shifted.ok_or_else(out_of_range)?;
    for delta in [
        TimeDelta::try_days(day - 1),
        TimeDelta::try_hours(hour),
        TimeDelta::try_minutes(min),
        TimeDelta::try_seconds(sec),
    ] {
        naive = delta
            .and_then(|d| naive.checked_add_signed(d))
            .ok_or_else(out_of_range)?;
    }
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| ImagegenError::script("date table does not name a local time"))
}

fn format_date<Tz: TimeZone>(dt: &DateTime<Tz>, format: &str) -> ImagegenResult<Vec<Value>>
where
    Tz::Offset: std::fmt::Display,
{
    if format.starts_with("*t") {
        let mut t = Table::new();
        t.set_str("year", Value::Number(f64::from(dt.year())));
        t.set_str("month", Value::Number(f64::from(dt.month())));
        t.set_str("day", Value::Number(f64::from(dt.day())));
        t.set_str("hour", Value::Number(f64::from(dt.hour())));
        t.set_str("min", Value::Number(f64::from(dt.minute())));
        t.set_str("sec", Value::Number(f64::from(dt.second())));
        t.set_str(
            "wday",
            Value::Number(f64::from(dt.weekday().number_from_sunday())),
        );
        t.set_str("yday", Value::Number(f64::from(dt.ordinal())));
        t.set_str("isdst", Value::Bool(false));
        return one(Value::new_table(t));
    }
    let mut out = String::new();
    write!(out, "{}", dt.format(format)).map_err(|_| {
        ImagegenError::script(format!(
            "bad argument #1 to 'date' (invalid conversion specifier '{format}')"
        ))
    })?;
    one(out)
}

/// Minimal `string.format`: `%d %i %s %f %x %X %%` with optional precision.
fn format_values(fmt: &str, args: &[Value]) -> ImagegenResult<String> {
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    let mut next_arg = 0usize;
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            precision = digits.parse::<usize>().ok();
        }
        let spec = chars
            .next()
            .ok_or_else(|| ImagegenError::script("invalid conversion '%' to 'format'"))?;
        if spec == '%' {
            out.push('%');
            continue;
        }
        let v = args.get(next_arg).cloned().unwrap_or_default();
        // Argument #1 is the format string itself.
        let pos = next_arg + 2;
        next_arg += 1;
        let num = |v: &Value| {
            v.coerce_number().ok_or_else(|| {
                ImagegenError::script(format!(
                    "bad argument #{pos} to 'format' (number expected, got {})",
                    v.type_name()
                ))
            })
        };
        match spec {
            'd' | 'i' => out.push_str(&format!("{}", num(&v)? as i64)),
            'f' => out.push_str(&format!("{:.*}", precision.unwrap_or(6), num(&v)?)),
            'x' => out.push_str(&format!("{:x}", num(&v)? as i64)),
            'X' => out.push_str(&format!("{:X}", num(&v)? as i64)),
            's' => {
                let s = v.display();
                match precision {
                    Some(p) => out.extend(s.chars().take(p)),
                    None => out.push_str(&s),
                }
            }
            other => {
                return Err(ImagegenError::script(format!(
                    "invalid conversion '%{other}' to 'format'"
                )));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/script/stdlib.rs"]
mod tests;
