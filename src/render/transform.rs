use std::sync::Arc;

use image::imageops::FilterType;

use crate::assets::decode::Bitmap;
use crate::foundation::core::Affine;
use crate::foundation::error::{ImagegenError, ImagegenResult};

/// Largest layer `vello_cpu` can rasterize into.
pub(crate) const MAX_LAYER_DIM: u32 = u16::MAX as u32;

/// Stretch `bitmap` to exactly `width` x `height` with a bicubic filter. Aspect ratio is not
/// preserved.
pub fn resize_bicubic(bitmap: &Bitmap, width: u32, height: u32) -> ImagegenResult<Bitmap> {
    if width == 0 || height == 0 {
        return Err(ImagegenError::processing(format!(
            "resize target must be positive, got {width}x{height}"
        )));
    }
    if width == bitmap.width && height == bitmap.height {
        return Ok(bitmap.clone());
    }
    let src = image::RgbaImage::from_raw(bitmap.width, bitmap.height, bitmap.rgba8_premul.clone())
        .ok_or_else(|| ImagegenError::processing("bitmap byte length mismatch"))?;
    let mut out = image::imageops::resize(&src, width, height, FilterType::CatmullRom).into_raw();
    // Cubic overshoot can push premultiplied color above alpha.
    for px in out.chunks_exact_mut(4) {
        let a = px[3];
        for c in &mut px[..3] {
            *c = (*c).min(a);
        }
    }
    Bitmap::from_premul(width, height, out)
}

/// Extent of a `width` x `height` box after rotating by `degrees`.
pub fn rotated_extent(width: u32, height: u32, degrees: f32) -> (u32, u32) {
    let rad = f64::from(degrees).to_radians();
    let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
    let (w, h) = (f64::from(width), f64::from(height));
    // Tolerance keeps exact right angles from rounding up a pixel.
    let nw = (w * cos + h * sin - 1e-6).ceil().max(1.0);
    let nh = (w * sin + h * cos - 1e-6).ceil().max(1.0);
    (nw as u32, nh as u32)
}

/// Rotate `bitmap` by `degrees` (clockwise on screen) about its center.
///
/// The result is sized to the rotated bounding box. Returns the bitmap and the signed size change
/// `(dw, dh)` relative to the input; an axis that shrinks reports a negative delta.
pub fn rotate(bitmap: &Bitmap, degrees: f32) -> ImagegenResult<(Bitmap, (i64, i64))> {
    let (nw, nh) = rotated_extent(bitmap.width, bitmap.height, degrees);
    let (w, h) = (f64::from(bitmap.width), f64::from(bitmap.height));
    let transform = Affine::translate((f64::from(nw) / 2.0, f64::from(nh) / 2.0))
        * Affine::rotate(f64::from(degrees).to_radians())
        * Affine::translate((-w / 2.0, -h / 2.0));

    let paint = vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap_from_bitmap(bitmap)?)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    };
    let out = rasterize(nw, nh, |ctx| {
        ctx.set_transform(affine_to_cpu(transform));
        ctx.set_paint(paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
    })?;
    let delta = (
        i64::from(nw) - i64::from(bitmap.width),
        i64::from(nh) - i64::from(bitmap.height),
    );
    Ok((out, delta))
}

/// Run `draw` against a fresh `width` x `height` context and read back the pixels.
pub(crate) fn rasterize(
    width: u32,
    height: u32,
    draw: impl FnOnce(&mut vello_cpu::RenderContext),
) -> ImagegenResult<Bitmap> {
    let (w, h) = layer_dims(width, height)?;
    let mut ctx = vello_cpu::RenderContext::new(w, h);
    draw(&mut ctx);
    ctx.flush();
    let mut pixmap = vello_cpu::Pixmap::new(w, h);
    ctx.render_to_pixmap(&mut pixmap);
    Bitmap::from_premul(width, height, pixmap.data_as_u8_slice().to_vec())
}

fn layer_dims(width: u32, height: u32) -> ImagegenResult<(u16, u16)> {
    if width == 0 || height == 0 || width > MAX_LAYER_DIM || height > MAX_LAYER_DIM {
        return Err(ImagegenError::processing(format!(
            "layer size {width}x{height} out of range (1..={MAX_LAYER_DIM})"
        )));
    }
    Ok((width as u16, height as u16))
}

pub(crate) fn pixmap_from_bitmap(bitmap: &Bitmap) -> ImagegenResult<vello_cpu::Pixmap> {
    let (w, h) = layer_dims(bitmap.width, bitmap.height)?;
    let pixels = bitmap
        .rgba8_premul
        .chunks_exact(4)
        .map(|px| vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect::<Vec<_>>();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}

pub(crate) fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

#[cfg(test)]
#[path = "../../tests/unit/render/transform.rs"]
mod tests;
