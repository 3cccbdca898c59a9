//! Soft-wrap renderer for the line editor.
//!
//! Computes the minimal byte sequence moving the terminal from the last
//! painted frame to the current logical state: prompt offset, styled and
//! wrapped buffer rows, hint rows, and cursor repositioning, using only
//! the small VT subset in [`vt`].

pub mod color;
pub mod frame;
pub mod layout;
pub mod prompt;
pub mod vt;

pub use color::Color;
pub use frame::{FrameCache, FrameTarget, HintRow, clear_screen, refresh, write_prompt};
pub use layout::{Layout, Span};
pub use prompt::{Prompt, visible_width};
