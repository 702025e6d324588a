//! impmail Web - HTML templates
//!
//! Templates are compiled into the binary and rendered with minijinja.
//! Names ending in `.html` are auto-escaped.

mod templates;
mod zip;

pub use templates::Templates;
pub use zip::{format_size, ZipContents, ZipEntry};
