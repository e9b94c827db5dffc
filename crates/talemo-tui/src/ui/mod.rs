//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, the login overlay and the quit dialog
//! - `input`: keyboard handling
//! - `styles`: colors and text styles

pub mod input;
pub mod render;
pub mod styles;
