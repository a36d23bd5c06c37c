//! Scene rendering: canvas, transforms, text and compositing.

/// Blend-mode compositor for premultiplied layers.
pub mod composite;
/// Scene processor: background, fonts, draw loop, PNG output.
pub mod processor;
/// Font registry and label rasterization.
pub mod text;
/// Resize and rotation of bitmaps.
pub mod transform;
