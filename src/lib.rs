//! imagegen renders raster images from scripted scene templates.
//!
//! A template is a small Lua-flavoured script that builds a scene: a background image plus an
//! ordered list of bitmaps and text labels, each positioned, optionally resized or rotated, and
//! blended onto the canvas. The pipeline is:
//!
//! - Run the template in a [`TemplateContext`] and marshal its result into a typed [`Scene`]
//! - Render the scene with a [`Processor`]
//! - Save the canvas as PNG
//!
//! [`job::run`] does all three.
#![forbid(unsafe_code)]

/// Asset path resolution and decoding.
pub mod assets;
mod foundation;
/// End-to-end render jobs.
pub mod job;
/// Rendering pipeline.
pub mod render;
/// Typed scene graph.
pub mod scene;
/// Embedded template language.
pub mod script;
/// Template host.
pub mod template;

pub use crate::assets::decode::Bitmap;
pub use crate::assets::paths::AssetResolver;
pub use crate::foundation::core::{Affine, Point, Rgba8, Size, Vec2, clamp_packed_color};
pub use crate::foundation::error::{ErrorCategory, ImagegenError, ImagegenResult};
pub use crate::job::{JobOpts, JobReport};
pub use crate::render::processor::{Processor, ProcessorOpts, RenderStats};
pub use crate::scene::model::{
    Blend, BlendMode, Brush, Drawable, DrawableKind, Font, FontStyle, HAlign, ImageParams,
    LabelParams, Pen, Scene, VAlign, Vector,
};
pub use crate::template::TemplateContext;
