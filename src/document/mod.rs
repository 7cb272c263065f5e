//! Document state management and text utilities.
//!
//! This module provides:
//! - `LineIndex` for offset <-> line/column conversion
//! - `Position`, `Interval` and `Location` for addressing text
//! - `Section` and `SectionSegmenter` for splitting documents by grammar
//! - `GlobalState`, `DocumentState` and `SectionState` for document lifecycle

mod location;
mod queries;
mod section;
mod state;
mod text;

pub use location::{Interval, Location, Position};
pub use section::{Section, SectionSegmenter, DEFAULT_GRAMMAR};
pub use state::{DocumentState, GlobalState, SectionState};
pub use text::LineIndex;
