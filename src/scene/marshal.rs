//! Typed extraction from untyped script values.
//!
//! Every constructor validates field by field and returns either a complete value or the first
//! failure encountered. Nested primitives (`pos`, `font`, ...) must already be host objects built
//! by the injected constructors; raw sub-tables are rejected rather than parsed recursively.

use std::any::Any;
use std::str::FromStr;

use crate::foundation::core::clamp_packed_color;
use crate::foundation::error::{ImagegenError, ImagegenResult};
use crate::scene::model::{
    Blend, BlendMode, Brush, Drawable, DrawableKind, Font, FontStyle, HAlign, ImageParams,
    LabelParams, Pen, Scene, UnknownKeyword, VAlign, Vector,
};
use crate::script::value::{Table, UserData, Value};

/// Host types that templates can pass around as userdata.
pub trait ScriptType: Clone + 'static {
    /// Name used in "expected ..." diagnostics.
    const NAME: &'static str;
}

impl ScriptType for Vector {
    const NAME: &'static str = "Vec";
}
impl ScriptType for Blend {
    const NAME: &'static str = "Blend";
}
impl ScriptType for Brush {
    const NAME: &'static str = "Brush";
}
impl ScriptType for Pen {
    const NAME: &'static str = "Pen";
}
impl ScriptType for Font {
    const NAME: &'static str = "Font";
}
impl ScriptType for Drawable {
    const NAME: &'static str = "Drawable (Image or Label)";
}
impl ScriptType for Scene {
    const NAME: &'static str = "Scene";
}

/// Positional constructor arguments, e.g. `Vec(x, y)`.
struct Args<'a> {
    construct: &'static str,
    args: &'a [Value],
}

impl Args<'_> {
    fn get(&self, i: usize) -> &Value {
        self.args.get(i).unwrap_or(&Value::Nil)
    }

    fn mismatch(&self, i: usize, expected: &str) -> ImagegenError {
        ImagegenError::validation(format!(
            "{}: bad argument #{} (expected {expected}, got {})",
            self.construct,
            i + 1,
            self.get(i).type_name()
        ))
    }

    fn number(&self, i: usize) -> ImagegenResult<f64> {
        self.get(i)
            .as_number()
            .ok_or_else(|| self.mismatch(i, "number"))
    }

    fn opt_number(&self, i: usize) -> ImagegenResult<Option<f64>> {
        match self.get(i) {
            Value::Nil => Ok(None),
            _ => self.number(i).map(Some),
        }
    }

    fn string(&self, i: usize) -> ImagegenResult<&str> {
        self.get(i).as_str().ok_or_else(|| self.mismatch(i, "string"))
    }

    fn opt_string(&self, i: usize) -> ImagegenResult<Option<&str>> {
        match self.get(i) {
            Value::Nil => Ok(None),
            _ => self.string(i).map(Some),
        }
    }

    fn table(&self, i: usize) -> ImagegenResult<Table> {
        match self.get(i) {
            Value::Table(t) => Ok(t.borrow().clone()),
            _ => Err(self.mismatch(i, "table")),
        }
    }

    fn keyword<T: FromStr<Err = UnknownKeyword>>(&self, i: usize, s: &str) -> ImagegenResult<T> {
        s.parse().map_err(|e: UnknownKeyword| {
            ImagegenError::validation(format!("{}: argument #{}: {e}", self.construct, i + 1))
        })
    }
}

/// Keyed fields of a constructor table, e.g. `Image{ file = ..., pos = ... }`.
struct Fields<'a> {
    construct: String,
    table: &'a Table,
}

impl Fields<'_> {
    fn mismatch(&self, key: &str, expected: &str, found: &Value) -> ImagegenError {
        if found.is_nil() {
            return ImagegenError::validation(format!(
                "{}: missing required field '{key}' ({expected})",
                self.construct
            ));
        }
        ImagegenError::validation(format!(
            "{}: field '{key}' expected {expected}, got {}",
            self.construct,
            found.type_name()
        ))
    }

    fn required_string(&self, key: &str) -> ImagegenResult<String> {
        let v = self.table.get_str(key);
        v.as_str()
            .map(str::to_owned)
            .ok_or_else(|| self.mismatch(key, "string", &v))
    }

    /// Optional string; numbers are converted to their text form.
    fn optional_string(&self, key: &str) -> ImagegenResult<Option<String>> {
        match self.table.get_str(key) {
            Value::Nil => Ok(None),
            Value::Str(s) => Ok(Some(s.to_string())),
            v @ Value::Number(_) => Ok(Some(v.display())),
            other => Err(self.mismatch(key, "string", &other)),
        }
    }

    fn optional_number(&self, key: &str) -> ImagegenResult<Option<f64>> {
        match self.table.get_str(key) {
            Value::Nil => Ok(None),
            Value::Number(n) => Ok(Some(n)),
            other => Err(self.mismatch(key, "number", &other)),
        }
    }

    /// Optional number; numeric strings are accepted.
    fn optional_number_coerced(&self, key: &str) -> ImagegenResult<Option<f64>> {
        let v = self.table.get_str(key);
        if v.is_nil() {
            return Ok(None);
        }
        v.coerce_number()
            .map(Some)
            .ok_or_else(|| self.mismatch(key, "number", &v))
    }

    fn required<T: ScriptType>(&self, key: &str) -> ImagegenResult<T> {
        let v = self.table.get_str(key);
        extract::<T>(&v).ok_or_else(|| self.mismatch(key, T::NAME, &v))
    }

    fn optional<T: ScriptType>(&self, key: &str) -> ImagegenResult<Option<T>> {
        let v = self.table.get_str(key);
        if v.is_nil() {
            return Ok(None);
        }
        extract::<T>(&v)
            .map(Some)
            .ok_or_else(|| self.mismatch(key, T::NAME, &v))
    }

    fn keyword<T>(&self, key: &str) -> ImagegenResult<T>
    where
        T: FromStr<Err = UnknownKeyword> + Default,
    {
        match self.optional_string(key)? {
            None => Ok(T::default()),
            Some(s) => s.parse().map_err(|e: UnknownKeyword| {
                ImagegenError::validation(format!("{}: field '{key}': {e}", self.construct))
            }),
        }
    }

    /// Optional sequence; each element goes through `item`, failing on the first bad one.
    fn optional_list<T>(
        &self,
        key: &str,
        expected: &str,
        item: impl Fn(&Value) -> Option<T>,
    ) -> ImagegenResult<Vec<T>> {
        let v = self.table.get_str(key);
        let t = match &v {
            Value::Nil => return Ok(Vec::new()),
            Value::Table(t) => t.borrow(),
            other => return Err(self.mismatch(key, "table", other)),
        };
        let mut out = Vec::with_capacity(t.len());
        for (i, elem) in t.sequence().iter().enumerate() {
            let parsed = item(elem).ok_or_else(|| {
                ImagegenError::validation(format!(
                    "{}: field '{key}' item #{} expected {expected}, got {}",
                    self.construct,
                    i + 1,
                    elem.type_name()
                ))
            })?;
            out.push(parsed);
        }
        Ok(out)
    }
}

fn extract<T: ScriptType>(v: &Value) -> Option<T> {
    v.downcast_ref::<T>().cloned()
}

impl Vector {
    /// `Vec(x, y)`
    pub fn from_args(args: &[Value]) -> ImagegenResult<Self> {
        let a = Args {
            construct: "Vec",
            args,
        };
        Ok(Self::new(a.number(0)? as f32, a.number(1)? as f32))
    }
}

impl Blend {
    /// `Blend(type, fraction?)`
    pub fn from_args(args: &[Value]) -> ImagegenResult<Self> {
        let a = Args {
            construct: "Blend",
            args,
        };
        let ty = a.string(0)?;
        if ty.is_empty() {
            return Err(a.mismatch(0, "non-empty string"));
        }
        let mode: BlendMode = a.keyword(0, ty)?;
        let fraction = a.opt_number(1)?.map_or(1.0, |f| f as f32);
        Ok(Self { mode, fraction })
    }
}

impl Brush {
    /// `Brush(color)`
    pub fn from_args(args: &[Value]) -> ImagegenResult<Self> {
        let a = Args {
            construct: "Brush",
            args,
        };
        Ok(Self {
            color: clamp_packed_color(a.number(0)?),
        })
    }
}

impl Pen {
    /// `Pen(color, width?)`
    pub fn from_args(args: &[Value]) -> ImagegenResult<Self> {
        let a = Args {
            construct: "Pen",
            args,
        };
        let color = clamp_packed_color(a.number(0)?);
        let width = a.opt_number(1)?.map_or(1.0, |w| w as f32);
        Ok(Self { color, width })
    }
}

impl Font {
    /// `Font(name, size, style?)`
    pub fn from_args(args: &[Value]) -> ImagegenResult<Self> {
        let a = Args {
            construct: "Font",
            args,
        };
        let name = a.string(0)?;
        if name.is_empty() {
            return Err(a.mismatch(0, "non-empty string"));
        }
        let size = a.number(1)?;
        if size.is_nan() || size < 0.0 {
            return Err(ImagegenError::validation(format!(
                "Font: argument #2 must be a non-negative number, got {size}"
            )));
        }
        let style = match a.opt_string(2)? {
            None => FontStyle::Regular,
            Some(s) => a.keyword(2, s)?,
        };
        Ok(Self {
            name: name.to_owned(),
            size: size as f32,
            style,
        })
    }
}

/// Shared `pos`/`ang`/`blend` fields, parsed before any variant field.
struct Base {
    pos: Vector,
    ang: f32,
    blend: Option<Blend>,
}

impl Base {
    fn parse(construct: &'static str, table: &Table) -> ImagegenResult<Self> {
        let f = Fields {
            construct: construct.to_owned(),
            table,
        };
        let pos = f.required::<Vector>("pos")?;
        let ang = f.optional_number("ang")?.unwrap_or(0.0) as f32;
        let blend = f.optional::<Blend>("blend")?;
        Ok(Self { pos, ang, blend })
    }

    /// Diagnostics for variant fields name the already-validated position.
    fn provenance(&self, construct: &str) -> String {
        format!("{construct} at ({}, {})", self.pos.x, self.pos.y)
    }

    fn finish(self, kind: DrawableKind) -> Drawable {
        Drawable {
            pos: self.pos,
            ang: self.ang,
            blend: self.blend,
            kind,
        }
    }
}

impl Drawable {
    /// `Image{ pos, ang?, blend?, file, size? }`
    pub fn image_from_args(args: &[Value]) -> ImagegenResult<Self> {
        let table = Args {
            construct: "Image",
            args,
        }
        .table(0)?;
        let base = Base::parse("Image", &table)?;
        let f = Fields {
            construct: base.provenance("Image"),
            table: &table,
        };
        let file = f.required_string("file")?;
        let size = f.optional::<Vector>("size")?;
        Ok(base.finish(DrawableKind::Image(ImageParams { file, size })))
    }

    /// `Label{ pos, ang?, blend?, text, font, brush?, pen?, wrap?, halign?, valign? }`
    pub fn label_from_args(args: &[Value]) -> ImagegenResult<Self> {
        let table = Args {
            construct: "Label",
            args,
        }
        .table(0)?;
        let base = Base::parse("Label", &table)?;
        let f = Fields {
            construct: base.provenance("Label"),
            table: &table,
        };
        let text = f.required_string("text")?;
        let font = f.required::<Font>("font")?;
        let brush = f.optional::<Brush>("brush")?;
        let pen = f.optional::<Pen>("pen")?;
        let wrap = f.optional_number_coerced("wrap")?.unwrap_or(0.0) as f32;
        let halign = f.keyword::<HAlign>("halign")?;
        let valign = f.keyword::<VAlign>("valign")?;
        Ok(base.finish(DrawableKind::Label(LabelParams {
            text,
            font,
            brush,
            pen,
            wrap,
            halign,
            valign,
        })))
    }
}

impl Scene {
    /// `Scene{ background, objects?, fonts? }`
    pub fn from_args(args: &[Value]) -> ImagegenResult<Self> {
        let table = Args {
            construct: "Main",
            args,
        }
        .table(0)?;
        Self::from_table(&table)
    }

    /// Marshal a script value: a `Scene` object is taken as is, a table is validated.
    pub fn from_value(value: &Value) -> ImagegenResult<Self> {
        if let Some(scene) = value.downcast_ref::<Scene>() {
            return Ok(scene.clone());
        }
        match value {
            Value::Table(t) => Self::from_table(&t.borrow()),
            other => Err(ImagegenError::validation(format!(
                "Main: expected table or Scene, got {}",
                other.type_name()
            ))),
        }
    }

    /// Validate in order: background, objects (in list order), fonts.
    pub fn from_table(table: &Table) -> ImagegenResult<Self> {
        let f = Fields {
            construct: "Main".to_owned(),
            table,
        };
        let background = f.required_string("background")?;
        let objects = f.optional_list("objects", Drawable::NAME, extract::<Drawable>)?;
        let fonts = f.optional_list("fonts", "string", |v| match v {
            Value::Str(s) => Some(s.to_string()),
            Value::Number(_) => Some(v.display()),
            _ => None,
        })?;
        Ok(Self {
            background,
            objects,
            fonts,
        })
    }
}

impl UserData for Vector {
    fn type_name(&self) -> &'static str {
        "Vec"
    }

    fn get_field(&self, key: &str) -> Option<Value> {
        match key {
            "x" => Some(Value::Number(f64::from(self.x))),
            "y" => Some(Value::Number(f64::from(self.y))),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl UserData for Blend {
    fn type_name(&self) -> &'static str {
        "Blend"
    }

    fn get_field(&self, key: &str) -> Option<Value> {
        match key {
            "type" => Some(Value::str(self.mode.name())),
            "fraction" => Some(Value::Number(f64::from(self.fraction))),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl UserData for Brush {
    fn type_name(&self) -> &'static str {
        "Brush"
    }

    fn get_field(&self, key: &str) -> Option<Value> {
        (key == "color").then(|| Value::Number(f64::from(self.color)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl UserData for Pen {
    fn type_name(&self) -> &'static str {
        "Pen"
    }

    fn get_field(&self, key: &str) -> Option<Value> {
        match key {
            "color" => Some(Value::Number(f64::from(self.color))),
            "width" => Some(Value::Number(f64::from(self.width))),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl UserData for Font {
    fn type_name(&self) -> &'static str {
        "Font"
    }

    fn get_field(&self, key: &str) -> Option<Value> {
        match key {
            "name" => Some(Value::str(&self.name)),
            "size" => Some(Value::Number(f64::from(self.size))),
            "style" => Some(Value::str(self.style.name())),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl UserData for Drawable {
    fn type_name(&self) -> &'static str {
        self.kind_name()
    }

    fn get_field(&self, key: &str) -> Option<Value> {
        match (key, &self.kind) {
            ("pos", _) => Some(Value::user_data(self.pos)),
            ("ang", _) => Some(Value::Number(f64::from(self.ang))),
            ("blend", _) => self.blend.map(Value::user_data),
            ("file", DrawableKind::Image(img)) => Some(Value::str(&img.file)),
            ("size", DrawableKind::Image(img)) => img.size.map(Value::user_data),
            ("text", DrawableKind::Label(lbl)) => Some(Value::str(&lbl.text)),
            ("font", DrawableKind::Label(lbl)) => Some(Value::user_data(lbl.font.clone())),
            ("brush", DrawableKind::Label(lbl)) => lbl.brush.map(Value::user_data),
            ("pen", DrawableKind::Label(lbl)) => lbl.pen.map(Value::user_data),
            ("wrap", DrawableKind::Label(lbl)) => Some(Value::Number(f64::from(lbl.wrap))),
            ("halign", DrawableKind::Label(lbl)) => Some(Value::str(lbl.halign.name())),
            ("valign", DrawableKind::Label(lbl)) => Some(Value::str(lbl.valign.name())),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl UserData for Scene {
    fn type_name(&self) -> &'static str {
        "Scene"
    }

    fn get_field(&self, key: &str) -> Option<Value> {
        match key {
            "background" => Some(Value::str(&self.background)),
            "fonts" => Some(Value::string_array(&self.fonts)),
            "objects" => {
                let mut list = Table::new();
                list.set_positional(self.objects.iter().cloned().map(Value::user_data).collect());
                Some(Value::new_table(list))
            }
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/marshal.rs"]
mod tests;
