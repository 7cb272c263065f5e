//! LSP protocol feature implementations.
//!
//! This module converts handler results into LSP types:
//! - Diagnostics from parser/compiler findings
//! - Completion items from the section under the cursor
//! - Document symbols from sections and their declarations
//! - Locations for go-to-definition

mod completion;
mod diagnostics;
mod navigation;
mod symbols;

pub use completion::to_completion_response;
pub use diagnostics::to_diagnostics;
pub use navigation::{position_from_lsp, to_lsp_location};
pub use symbols::document_symbols;
