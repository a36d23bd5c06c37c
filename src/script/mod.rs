//! Embedded template language.
//!
//! A small Lua-flavoured language: enough to build tables, loop, branch and call host
//! constructors. Values are `Rc`-based, so an interpreter is confined to one thread.

/// Syntax tree.
pub mod ast;
/// Tree-walking evaluator.
pub mod interp;
pub(crate) mod lexer;
pub(crate) mod parser;
/// Base library (`print`, `pairs`, `math`, `string`, `table`, ...).
pub mod stdlib;
/// Untyped value and table model.
pub mod value;
