pub use kurbo::{Affine, Point, Size, Vec2};

/// Straight-alpha RGBA8 color.
///
/// Packed `u32` colors use `0xRRGGBBAA` order: red in the most significant byte, alpha in the
/// least significant one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Unpack a `0xRRGGBBAA` value.
    pub fn from_packed(packed: u32) -> Self {
        let [r, g, b, a] = packed.to_be_bytes();
        Self { r, g, b, a }
    }

    /// Pack into `0xRRGGBBAA`.
    pub fn to_packed(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }
}

/// Clamp an arbitrary script number into the packed color range.
///
/// NaN maps to 0. Values are clamped to `[0, u32::MAX]` and then truncated.
pub fn clamp_packed_color(value: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, f64::from(u32::MAX)) as u32
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
