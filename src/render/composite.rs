use crate::assets::decode::Bitmap;
use crate::scene::model::{Blend, BlendMode};

/// Premultiplied RGBA in `[0, 1]`.
type Px = [f32; 4];

fn load(bytes: &[u8]) -> Px {
    [
        f32::from(bytes[0]) / 255.0,
        f32::from(bytes[1]) / 255.0,
        f32::from(bytes[2]) / 255.0,
        f32::from(bytes[3]) / 255.0,
    ]
}

fn store(px: Px, out: &mut [u8]) {
    let a = px[3].clamp(0.0, 1.0);
    out[3] = (a * 255.0).round() as u8;
    for c in 0..3 {
        // Premultiplied color never exceeds alpha.
        out[c] = (px[c].clamp(0.0, a) * 255.0).round() as u8;
    }
}

/// Separable blend function `B(backdrop, source)` on straight color channels.
fn blend_channel(mode: BlendMode, cb: f32, cs: f32) -> f32 {
    fn screen(cb: f32, cs: f32) -> f32 {
        cb + cs - cb * cs
    }
    fn hard_light(cb: f32, cs: f32) -> f32 {
        if cs <= 0.5 {
            2.0 * cs * cb
        } else {
            screen(cb, 2.0 * cs - 1.0)
        }
    }

    match mode {
        BlendMode::Multiply => cs * cb,
        BlendMode::Add => (cs + cb).min(1.0),
        BlendMode::Subtract => (cb - cs).max(0.0),
        BlendMode::Screen => screen(cb, cs),
        BlendMode::Darken => cs.min(cb),
        BlendMode::Lighten => cs.max(cb),
        BlendMode::Overlay => hard_light(cs, cb),
        BlendMode::HardLight => hard_light(cb, cs),
        _ => cs,
    }
}

/// Porter-Duff coverage factors `(Fa, Fb)` for source and destination.
fn porter_duff(mode: BlendMode, sa: f32, da: f32) -> Option<(f32, f32)> {
    Some(match mode {
        BlendMode::Src => (1.0, 0.0),
        BlendMode::Atop => (da, 1.0 - sa),
        BlendMode::Over => (1.0, 1.0 - sa),
        BlendMode::In => (da, 0.0),
        BlendMode::Out => (1.0 - da, 0.0),
        BlendMode::Dest => (0.0, 1.0),
        BlendMode::DestAtop => (1.0 - da, sa),
        BlendMode::DestOver => (1.0 - da, 1.0),
        BlendMode::DestIn => (0.0, sa),
        BlendMode::DestOut => (0.0, 1.0 - sa),
        BlendMode::Clear => (0.0, 0.0),
        BlendMode::Xor => (1.0 - da, 1.0 - sa),
        _ => return None,
    })
}

/// Blend one premultiplied source pixel onto a destination pixel.
pub(crate) fn blend_pixel(mode: BlendMode, dst: Px, src: Px) -> Px {
    let (sa, da) = (src[3], dst[3]);

    if let Some((fa, fb)) = porter_duff(mode, sa, da) {
        return [
            src[0] * fa + dst[0] * fb,
            src[1] * fa + dst[1] * fb,
            src[2] * fa + dst[2] * fb,
            sa * fa + da * fb,
        ];
    }

    let mut out = [0.0; 4];
    out[3] = sa + da * (1.0 - sa);
    for c in 0..3 {
        let cs = if sa > 0.0 { src[c] / sa } else { 0.0 };
        let cb = if da > 0.0 { dst[c] / da } else { 0.0 };
        let mixed = blend_channel(mode, cb, cs);
        out[c] = (1.0 - da) * src[c] + sa * da * mixed + (1.0 - sa) * dst[c];
    }
    out
}

/// Composite `layer` onto `canvas` with its top-left corner at `origin`.
///
/// Only the layer's footprint (clipped to the canvas) is touched, so region-replacing modes such
/// as `src` or `clear` act inside that rectangle. `blend.fraction` scales source alpha and is
/// clamped to `[0, 1]`.
pub fn composite(canvas: &mut Bitmap, layer: &Bitmap, origin: (i32, i32), blend: Blend) {
    let fraction = if blend.fraction.is_nan() {
        0.0
    } else {
        blend.fraction.clamp(0.0, 1.0)
    };

    let (ox, oy) = (i64::from(origin.0), i64::from(origin.1));
    let x0 = ox.max(0);
    let y0 = oy.max(0);
    let x1 = (ox + i64::from(layer.width)).min(i64::from(canvas.width));
    let y1 = (oy + i64::from(layer.height)).min(i64::from(canvas.height));
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let cw = canvas.width as usize;
    let lw = layer.width as usize;
    for y in y0..y1 {
        for x in x0..x1 {
            let di = ((y as usize) * cw + (x as usize)) * 4;
            let si = (((y - oy) as usize) * lw + ((x - ox) as usize)) * 4;

            let mut src = load(&layer.rgba8_premul[si..si + 4]);
            for c in &mut src {
                *c *= fraction;
            }
            let dst = load(&canvas.rgba8_premul[di..di + 4]);
            let out = blend_pixel(blend.mode, dst, src);
            store(out, &mut canvas.rgba8_premul[di..di + 4]);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
