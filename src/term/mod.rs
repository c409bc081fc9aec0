//! Terminal model: cell grid, attributes, and the VT sequence parser.
//!
//! - **cell**: value types for one grid cell and its 16-color attribute
//! - **screen**: the `rows x cols` grid with cursor, scroll region and
//!   bounded scrollback
//! - **parser**: character-level escape-sequence state machine driving
//!   the screen

pub mod cell;
pub mod parser;
pub mod screen;

pub use cell::{Attr, AttrFlags, Cell, Palette, Rgb};
pub use parser::Parser;
pub use screen::{ScreenBuffer, Snapshot};
