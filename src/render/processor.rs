use std::path::{Path, PathBuf};

use crate::assets::decode::{Bitmap, load_bitmap};
use crate::assets::paths::AssetResolver;
use crate::foundation::error::{ImagegenError, ImagegenResult};
use crate::render::composite::composite;
use crate::render::text::FontRegistry;
use crate::render::transform::{resize_bicubic, rotate};
use crate::scene::model::{Drawable, DrawableKind, ImageParams, LabelParams, Scene};

/// Options for a [`Processor`].
#[derive(Clone, Debug, Default)]
pub struct ProcessorOpts {
    /// Base directory for paths without the `@` sentinel. `None` uses the process working
    /// directory.
    pub working_dir: Option<PathBuf>,
}

/// Counters for one processed scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Drawables composited onto the canvas.
    pub objects_drawn: u64,
    /// Drawables that produced no pixels (e.g. a label with neither brush nor pen).
    pub objects_empty: u64,
    /// Font files registered.
    pub fonts_installed: u64,
    /// Font files that failed to register (logged, not fatal).
    pub fonts_failed: u64,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
}

/// Renders one scene onto a canvas.
///
/// A processor owns its font registry and canvas; separate jobs use separate processors.
#[derive(Debug)]
pub struct Processor {
    resolver: AssetResolver,
    fonts: FontRegistry,
    canvas: Option<Bitmap>,
}

impl Processor {
    /// Processor for the template at `template`.
    pub fn new(template: &Path, opts: ProcessorOpts) -> ImagegenResult<Self> {
        let resolver = AssetResolver::for_template(template, opts.working_dir)?;
        Ok(Self::with_resolver(resolver))
    }

    pub fn with_resolver(resolver: AssetResolver) -> Self {
        Self {
            resolver,
            fonts: FontRegistry::new(),
            canvas: None,
        }
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    /// Current canvas, if a scene has been processed.
    pub fn canvas(&self) -> Option<&Bitmap> {
        self.canvas.as_ref()
    }

    pub fn into_canvas(self) -> Option<Bitmap> {
        self.canvas
    }

    /// Load the background, install fonts and draw every object in list order.
    ///
    /// On failure the canvas keeps whatever was drawn before the failing object.
    #[tracing::instrument(skip(self, scene), fields(objects = scene.objects.len()))]
    pub fn process(&mut self, scene: &Scene) -> ImagegenResult<RenderStats> {
        let bg_path = self.resolver.resolve(&scene.background);
        let canvas = load_bitmap(&bg_path, None).map_err(|e| with_context(e, "background"))?;
        tracing::debug!(
            path = %bg_path.display(),
            width = canvas.width,
            height = canvas.height,
            "background loaded"
        );
        let mut stats = RenderStats {
            width: canvas.width,
            height: canvas.height,
            ..RenderStats::default()
        };
        self.canvas = Some(canvas);

        for font in &scene.fonts {
            let path = self.resolver.resolve(font);
            match self.fonts.install_file(&path) {
                Ok(families) => {
                    stats.fonts_installed += 1;
                    tracing::debug!(path = %path.display(), ?families, "font installed");
                }
                Err(e) => {
                    stats.fonts_failed += 1;
                    tracing::warn!(path = %path.display(), error = %e, "font install failed");
                }
            }
        }

        for (i, obj) in scene.objects.iter().enumerate() {
            let what = format!("object #{} ({})", i + 1, obj.kind_name());
            let drawn = self.draw(obj).map_err(|e| with_context(e, &what))?;
            if drawn {
                stats.objects_drawn += 1;
            } else {
                stats.objects_empty += 1;
            }
        }

        tracing::info!(
            drawn = stats.objects_drawn,
            fonts = stats.fonts_installed,
            width = stats.width,
            height = stats.height,
            "scene processed"
        );
        Ok(stats)
    }

    fn draw(&mut self, obj: &Drawable) -> ImagegenResult<bool> {
        match &obj.kind {
            DrawableKind::Image(img) => self.draw_image(obj, img),
            DrawableKind::Label(lbl) => self.draw_label(obj, lbl),
        }
    }

    fn draw_image(&mut self, obj: &Drawable, img: &ImageParams) -> ImagegenResult<bool> {
        let target = match img.size {
            None => None,
            Some(size) => {
                let (w, h) = size.to_pixel_size();
                if w <= 0 || h <= 0 {
                    return Err(ImagegenError::processing(format!(
                        "size must be positive, got {w}x{h}"
                    )));
                }
                Some((w as u32, h as u32))
            }
        };

        let path = self.resolver.resolve(&img.file);
        let mut bitmap = load_bitmap(&path, target)?;
        if let Some((w, h)) = target {
            bitmap = resize_bicubic(&bitmap, w, h)?;
        }

        let (px, py) = obj.pos.to_pixel_point();
        let (mut x, mut y) = (i64::from(px), i64::from(py));
        if obj.ang != 0.0 {
            // Keep the rotated bitmap centred on the unrotated target, growing or shrinking.
            let (rotated, (dw, dh)) = rotate(&bitmap, obj.ang)?;
            x -= dw / 2;
            y -= dh / 2;
            bitmap = rotated;
        }

        let origin = (
            x.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            y.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
        );
        let canvas = self.canvas_mut()?;
        composite(canvas, &bitmap, origin, obj.effective_blend());
        Ok(true)
    }

    fn draw_label(&mut self, obj: &Drawable, lbl: &LabelParams) -> ImagegenResult<bool> {
        let Some(layer) = self.fonts.render_label(lbl, obj.pos.to_point(), obj.ang)? else {
            return Ok(false);
        };
        let canvas = self.canvas_mut()?;
        composite(canvas, &layer.bitmap, layer.origin, obj.effective_blend());
        Ok(true)
    }

    fn canvas_mut(&mut self) -> ImagegenResult<&mut Bitmap> {
        self.canvas
            .as_mut()
            .ok_or_else(|| ImagegenError::processing("no canvas loaded"))
    }

    /// Encode the canvas as an RGBA PNG.
    #[tracing::instrument(skip(self))]
    pub fn save_png(&self, path: &Path) -> ImagegenResult<()> {
        let canvas = self
            .canvas
            .as_ref()
            .ok_or_else(|| ImagegenError::processing("nothing to save: no scene processed"))?;
        let img = image::RgbaImage::from_raw(canvas.width, canvas.height, canvas.to_straight())
            .ok_or_else(|| ImagegenError::processing("canvas byte length mismatch"))?;
        img.save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| match e {
                image::ImageError::IoError(io) => {
                    ImagegenError::io(format!("write '{}'", path.display()), io)
                }
                other => ImagegenError::processing(format!(
                    "encode png '{}': {other}",
                    path.display()
                )),
            })
    }
}

/// Prefix processing and I/O failures with the element being rendered.
fn with_context(e: ImagegenError, what: &str) -> ImagegenError {
    match e {
        ImagegenError::Processing(msg) => ImagegenError::processing(format!("{what}: {msg}")),
        ImagegenError::Io { context, source } => {
            ImagegenError::io(format!("{what}: {context}"), source)
        }
        other => other,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/processor.rs"]
mod tests;
