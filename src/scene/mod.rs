//! Typed scene graph and its construction from script values.

/// Script-value to scene marshalling and host object bindings.
pub mod marshal;
/// Scene graph types: primitives, drawables and the scene root.
pub mod model;
