use crate::foundation::error::{ImagegenError, ImagegenResult};

const MAX_DIM: u32 = 16_384;

/// Raster size for an SVG: its intrinsic size, or `target` when given.
pub(crate) fn svg_raster_size(
    tree: &usvg::Tree,
    target: Option<(u32, u32)>,
) -> ImagegenResult<(u32, u32)> {
    fn to_px(v: f32) -> ImagegenResult<u32> {
        if !v.is_finite() || v <= 0.0 {
            return Err(ImagegenError::processing("svg has invalid width/height"));
        }
        Ok((v.ceil() as u32).max(1))
    }

    let (w, h) = match target {
        Some(size) => size,
        None => {
            let size = tree.size();
            (to_px(size.width())?, to_px(size.height())?)
        }
    };
    if w == 0 || h == 0 {
        return Err(ImagegenError::processing(format!(
            "svg raster size must be positive, got {w}x{h}"
        )));
    }
    if w > MAX_DIM || h > MAX_DIM {
        return Err(ImagegenError::processing(format!(
            "svg raster size too large: {w}x{h} (max {MAX_DIM}x{MAX_DIM})"
        )));
    }
    Ok((w, h))
}

/// Render `tree` stretched to `width` x `height`. Output is premultiplied RGBA8.
pub(crate) fn rasterize_svg_to_premul_rgba8(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> ImagegenResult<Vec<u8>> {
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| ImagegenError::processing("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.take())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/svg_raster.rs"]
mod tests;
