//! Image preprocessing building blocks.

pub mod augment;
pub mod loader;

pub use augment::*;
pub use loader::*;
