use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use parley::layout::PositionedLayoutItem;
use parley::style::{FontFamily, FontStack, FontWeight, StyleProperty};

use crate::assets::decode::{Bitmap, read_asset};
use crate::foundation::core::{Affine, Point, Rgba8};
use crate::foundation::error::{ImagegenError, ImagegenResult};
use crate::render::transform::{MAX_LAYER_DIM, affine_to_cpu, rasterize};
use crate::scene::model::{FontStyle, HAlign, LabelParams, VAlign};

/// Rasterized label ready for compositing.
#[derive(Debug)]
pub struct TextLayer {
    /// Canvas position of the layer's top-left corner.
    pub origin: (i32, i32),
    pub bitmap: Bitmap,
}

/// Per-job font state: installed font files plus system fallback.
///
/// Family lookup checks installed families first (case-insensitively), then the system
/// collection. Nothing here is shared between jobs.
pub struct FontRegistry {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
    /// Lowercased family name to the name as registered.
    installed: HashMap<String, String>,
    /// `vello_cpu` font handles keyed by (blob id, face index).
    render_fonts: HashMap<(u64, u32), vello_cpu::peniko::FontData>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontRegistry")
            .field("installed", &self.installed)
            .finish_non_exhaustive()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            installed: HashMap::new(),
            render_fonts: HashMap::new(),
        }
    }

    /// Register every face in a font file. Returns the family names it provided.
    pub fn install_file(&mut self, path: &Path) -> ImagegenResult<Vec<String>> {
        let bytes = read_asset(path)?;
        self.install_bytes(bytes)
            .map_err(|e| ImagegenError::processing(format!("'{}': {e}", path.display())))
    }

    pub fn install_bytes(&mut self, bytes: Vec<u8>) -> Result<Vec<String>, String> {
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes), None);
        if families.is_empty() {
            return Err("no font faces found".to_owned());
        }

        let mut names = Vec::with_capacity(families.len());
        for (id, _) in families {
            let Some(name) = self.font_ctx.collection.family_name(id) else {
                continue;
            };
            let name = name.to_owned();
            self.installed.insert(name.to_lowercase(), name.clone());
            names.push(name);
        }
        Ok(names)
    }

    pub fn installed_families(&self) -> impl Iterator<Item = &str> {
        self.installed.values().map(String::as_str)
    }

    /// Resolve a family name: installed fonts first, then system fonts.
    pub fn resolve_family(&mut self, name: &str) -> ImagegenResult<String> {
        if let Some(found) = self.installed.get(&name.to_lowercase()) {
            return Ok(found.clone());
        }
        let id = self
            .font_ctx
            .collection
            .family_id(name)
            .ok_or_else(|| ImagegenError::processing(format!("Font family '{name}' not found")))?;
        Ok(self
            .font_ctx
            .collection
            .family_name(id)
            .unwrap_or(name)
            .to_owned())
    }

    fn layout(
        &mut self,
        family: String,
        label: &LabelParams,
    ) -> ImagegenResult<parley::Layout<()>> {
        let size = label.font.size;
        if !size.is_finite() || size <= 0.0 {
            return Err(ImagegenError::processing(format!(
                "font size must be positive, got {size}"
            )));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, &label.text, 1.0, true);
        builder.push_default(StyleProperty::FontStack(FontStack::Single(
            FontFamily::Named(Cow::Owned(family)),
        )));
        builder.push_default(StyleProperty::FontSize(size));
        if matches!(label.font.style, FontStyle::Bold | FontStyle::BoldItalic) {
            builder.push_default(StyleProperty::FontWeight(FontWeight::BOLD));
        }
        if matches!(label.font.style, FontStyle::Italic | FontStyle::BoldItalic) {
            builder.push_default(StyleProperty::FontStyle(parley::style::FontStyle::Italic));
        }

        let mut layout = builder.build(&label.text);
        let alignment = match label.halign {
            HAlign::Left => parley::Alignment::Left,
            HAlign::Center => parley::Alignment::Center,
            HAlign::Right => parley::Alignment::Right,
        };
        let wrap = (label.wrap > 0.0).then_some(label.wrap);
        layout.break_all_lines(wrap);
        layout.align(wrap, alignment, parley::AlignmentOptions::default());
        Ok(layout)
    }

    fn render_font(
        &mut self,
        blob_id: u64,
        data: &[u8],
        index: u32,
    ) -> vello_cpu::peniko::FontData {
        self.render_fonts
            .entry((blob_id, index))
            .or_insert_with(|| {
                vello_cpu::peniko::FontData::new(
                    vello_cpu::peniko::Blob::from(data.to_vec()),
                    index,
                )
            })
            .clone()
    }

    /// Lay out and rasterize a label.
    ///
    /// The text block is anchored at `pos` by its alignment (left/center/right of the block on
    /// x, top/center/bottom on y) and rotated by `ang` degrees about that anchor. Returns `None`
    /// when nothing would be visible.
    pub fn render_label(
        &mut self,
        label: &LabelParams,
        pos: Point,
        ang: f32,
    ) -> ImagegenResult<Option<TextLayer>> {
        let family = self.resolve_family(&label.font.name)?;
        if label.brush.is_none() && label.pen.is_none() {
            return Ok(None);
        }
        let layout = self.layout(family, label)?;

        let block_w = if label.wrap > 0.0 {
            f64::from(label.wrap)
        } else {
            f64::from(layout.width())
        };
        let block_h = f64::from(layout.height());
        if block_w <= 0.0 || block_h <= 0.0 {
            return Ok(None);
        }

        let dx = match label.halign {
            HAlign::Left => 0.0,
            HAlign::Center => block_w / 2.0,
            HAlign::Right => block_w,
        };
        let dy = match label.valign {
            VAlign::Top => 0.0,
            VAlign::Center => block_h / 2.0,
            VAlign::Bottom => block_h,
        };
        let block_to_canvas = Affine::translate(pos.to_vec2())
            * Affine::rotate(f64::from(ang).to_radians())
            * Affine::translate((-dx, -dy));

        // Stroke width can reach outside the layout box.
        let pad = label.pen.map_or(0.0, |p| f64::from(p.width.max(0.0))) + 2.0;
        let bbox = block_to_canvas
            .transform_rect_bbox(kurbo::Rect::new(-pad, -pad, block_w + pad, block_h + pad));
        let x0 = bbox.x0.floor();
        let y0 = bbox.y0.floor();
        let w = (bbox.x1.ceil() - x0).max(1.0);
        let h = (bbox.y1.ceil() - y0).max(1.0);
        if w > f64::from(MAX_LAYER_DIM) || h > f64::from(MAX_LAYER_DIM) {
            return Err(ImagegenError::processing(format!(
                "label too large to rasterize ({w}x{h})"
            )));
        }
        let to_layer = affine_to_cpu(Affine::translate((-x0, -y0)) * block_to_canvas);

        let mut runs = Vec::new();
        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let face = run.run().font();
                let font = self.render_font(face.data.id(), face.data.data(), face.index);
                let glyphs = run
                    .positioned_glyphs()
                    .map(|g| vello_cpu::Glyph {
                        id: g.id,
                        x: g.x,
                        y: g.y,
                    })
                    .collect::<Vec<_>>();
                runs.push((font, run.run().font_size(), glyphs));
            }
        }

        let bitmap = rasterize(w as u32, h as u32, |ctx| {
            ctx.set_transform(to_layer);
            if let Some(brush) = label.brush {
                ctx.set_paint(cpu_color(brush.rgba()));
                for (font, size, glyphs) in &runs {
                    ctx.glyph_run(font)
                        .font_size(*size)
                        .fill_glyphs(glyphs.iter().copied());
                }
            }
            if let Some(pen) = label.pen {
                ctx.set_stroke(vello_cpu::kurbo::Stroke::new(f64::from(pen.width)));
                ctx.set_paint(cpu_color(pen.rgba()));
                for (font, size, glyphs) in &runs {
                    ctx.glyph_run(font)
                        .font_size(*size)
                        .stroke_glyphs(glyphs.iter().copied());
                }
            }
        })?;

        tracing::debug!(
            family = %label.font.name,
            runs = runs.len(),
            width = w,
            height = h,
            "label rasterized"
        );
        Ok(Some(TextLayer {
            origin: (x0 as i32, y0 as i32),
            bitmap,
        }))
    }
}

fn cpu_color(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

#[cfg(test)]
#[path = "../../tests/unit/render/text.rs"]
mod tests;
