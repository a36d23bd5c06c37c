use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::foundation::core::{Point, Rgba8, Size};

/// Declares a closed, case-insensitively parsed keyword enum.
macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every accepted keyword, in declaration order.
            pub const NAMES: &'static [&'static str] = &[$($text),+];

            /// What the keyword names, for diagnostics.
            pub const WHAT: &'static str = $what;

            /// Canonical lowercase keyword.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownKeyword;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(UnknownKeyword {
                    value: s.to_owned(),
                    what: $what,
                    expected: Self::NAMES,
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

/// Keyword that is not a member of the target enum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownKeyword {
    pub value: String,
    pub what: &'static str,
    pub expected: &'static [&'static str],
}

impl fmt::Display for UnknownKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is not a valid {} (expected one of: {})",
            self.value,
            self.what,
            self.expected.join(", ")
        )
    }
}

keyword_enum! {
    /// Compositing rule used when a drawable lands on the canvas.
    ///
    /// Separable modes blend colors and composite source-over; the Porter-Duff modes select
    /// coverage regions.
    BlendMode, "blend mode" {
        #[default]
        Normal => "normal",
        Multiply => "multiply",
        Add => "add",
        Subtract => "subtract",
        Screen => "screen",
        Darken => "darken",
        Lighten => "lighten",
        Overlay => "overlay",
        HardLight => "hardlight",
        Src => "src",
        Atop => "atop",
        Over => "over",
        In => "in",
        Out => "out",
        Dest => "dest",
        DestAtop => "destatop",
        DestOver => "destover",
        DestIn => "destin",
        DestOut => "destout",
        Clear => "clear",
        Xor => "xor",
    }
}

keyword_enum! {
    FontStyle, "font style" {
        #[default]
        Regular => "regular",
        Bold => "bold",
        Italic => "italic",
        BoldItalic => "bolditalic",
    }
}

keyword_enum! {
    HAlign, "horizontal alignment" {
        #[default]
        Left => "left",
        Right => "right",
        Center => "center",
    }
}

keyword_enum! {
    VAlign, "vertical alignment" {
        #[default]
        Top => "top",
        Bottom => "bottom",
        Center => "center",
    }
}

/// 2D point or extent (script name `Vec`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}

impl Vector {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }

    pub fn to_size(self) -> Size {
        Size::new(f64::from(self.x), f64::from(self.y))
    }

    /// Integer pixel position, truncating toward zero.
    pub fn to_pixel_point(self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }

    /// Integer pixel extent, truncating toward zero. May be zero or negative.
    pub fn to_pixel_size(self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Blend {
    pub mode: BlendMode,
    /// Opacity multiplier. Not range checked; the compositor clamps per pixel.
    pub fraction: f32,
}

impl Default for Blend {
    fn default() -> Self {
        Self {
            mode: BlendMode::Normal,
            fraction: 1.0,
        }
    }
}

/// Solid fill color, packed `0xRRGGBBAA`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Brush {
    pub color: u32,
}

impl Brush {
    pub fn rgba(self) -> Rgba8 {
        Rgba8::from_packed(self.color)
    }
}

/// Solid outline, packed `0xRRGGBBAA`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Pen {
    pub color: u32,
    pub width: f32,
}

impl Pen {
    pub fn rgba(self) -> Rgba8 {
        Rgba8::from_packed(self.color)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Font {
    /// Family name, resolved at draw time.
    pub name: String,
    pub size: f32,
    pub style: FontStyle,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImageParams {
    /// Asset path; `@` prefix means template-relative.
    pub file: String,
    /// Target size; the bitmap is stretched to it when present.
    pub size: Option<Vector>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelParams {
    pub text: String,
    pub font: Font,
    pub brush: Option<Brush>,
    pub pen: Option<Pen>,
    /// Wrap width in pixels; `0` disables wrapping.
    pub wrap: f32,
    pub halign: HAlign,
    pub valign: VAlign,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DrawableKind {
    Image(ImageParams),
    Label(LabelParams),
}

/// Positioned, rotatable, blendable unit placed on the canvas.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Drawable {
    pub pos: Vector,
    /// Rotation in degrees, clockwise on screen.
    pub ang: f32,
    pub blend: Option<Blend>,
    #[serde(flatten)]
    pub kind: DrawableKind,
}

impl Drawable {
    /// Variant name as used by the template constructors.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            DrawableKind::Image(_) => "Image",
            DrawableKind::Label(_) => "Label",
        }
    }

    /// Effective blend: the explicit one, else normal at full opacity.
    pub fn effective_blend(&self) -> Blend {
        self.blend.unwrap_or_default()
    }
}

/// One validated render job description.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Scene {
    pub background: String,
    /// Drawn in order; later entries land on top.
    pub objects: Vec<Drawable>,
    pub fonts: Vec<String>,
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
