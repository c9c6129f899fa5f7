//! Terminal output for keg: color detection and styled status rendering.

pub mod styles;
pub mod terminal;
