use std::io::ErrorKind;
use std::path::Path;

use crate::assets::svg_raster::{rasterize_svg_to_premul_rgba8, svg_raster_size};
use crate::foundation::error::{ImagegenError, ImagegenResult};
use crate::foundation::math::{premultiply_rgba8_in_place, unpremultiply_rgba8_in_place};

/// Raster image in premultiplied RGBA8, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Vec<u8>,
}

impl Bitmap {
    /// Fully transparent bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba8_premul: vec![0; byte_len(width, height)],
        }
    }

    /// Wrap already-premultiplied bytes.
    pub fn from_premul(width: u32, height: u32, rgba8_premul: Vec<u8>) -> ImagegenResult<Self> {
        if rgba8_premul.len() != byte_len(width, height) {
            return Err(ImagegenError::processing(format!(
                "bitmap byte length {} does not match {width}x{height}",
                rgba8_premul.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul,
        })
    }

    /// Premultiply straight-alpha bytes.
    pub fn from_straight(width: u32, height: u32, mut rgba8: Vec<u8>) -> ImagegenResult<Self> {
        premultiply_rgba8_in_place(&mut rgba8);
        Self::from_premul(width, height, rgba8)
    }

    /// Straight-alpha copy of the pixel data.
    pub fn to_straight(&self) -> Vec<u8> {
        let mut out = self.rgba8_premul.clone();
        unpremultiply_rgba8_in_place(&mut out);
        out
    }

    /// Premultiplied pixel at `(x, y)`; `None` outside the bitmap.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = &self.rgba8_premul[i..i + 4];
        Some([px[0], px[1], px[2], px[3]])
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(4)
}

/// Read an asset file. A missing file is a processing failure; other errors are I/O failures.
pub fn read_asset(path: &Path) -> ImagegenResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            ImagegenError::processing(format!("file not found: '{}'", path.display()))
        }
        _ => ImagegenError::io(format!("read '{}'", path.display()), e),
    })
}

/// Decode an encoded raster image (PNG, JPEG, GIF, BMP, ...).
pub fn decode_image(bytes: &[u8]) -> ImagegenResult<Bitmap> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| ImagegenError::processing(format!("decode image: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Bitmap::from_straight(width, height, rgba.into_raw())
}

pub fn parse_svg(bytes: &[u8]) -> ImagegenResult<usvg::Tree> {
    let opts = usvg::Options::default();
    usvg::Tree::from_data(bytes, &opts)
        .map_err(|e| ImagegenError::processing(format!("parse svg: {e}")))
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}

/// Load a bitmap from disk.
///
/// SVG files are rasterized directly at `svg_size` when given, otherwise at their intrinsic
/// size. `svg_size` is ignored for raster formats.
#[tracing::instrument(level = "debug", skip(svg_size))]
pub fn load_bitmap(path: &Path, svg_size: Option<(u32, u32)>) -> ImagegenResult<Bitmap> {
    let bytes = read_asset(path)?;
    let with_path = |e: ImagegenError| match e {
        ImagegenError::Processing(msg) => {
            ImagegenError::processing(format!("'{}': {msg}", path.display()))
        }
        other => other,
    };

    if is_svg(path) {
        let tree = parse_svg(&bytes).map_err(with_path)?;
        let (w, h) = svg_raster_size(&tree, svg_size).map_err(with_path)?;
        let rgba = rasterize_svg_to_premul_rgba8(&tree, w, h)?;
        return Bitmap::from_premul(w, h, rgba);
    }
    decode_image(&bytes).map_err(with_path)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
