//! HTML report generation.
//!
//! Every page is rendered through Handlebars from built-in templates that a
//! `templates_dir` may override by name. Page files get opaque unique names and
//! all links between pages are relative, so the report folder can be moved as
//! a whole.

mod assets;
pub mod diff_view;
mod error;
mod generator;
mod helpers;
pub mod highlight;
mod templates;

pub use diff_view::{side_by_side, DiffRow, RowKind};
pub use error::ReportError;
pub use generator::{FileLink, IndexEntry, IndexPage, ReportGenerator};
pub use helpers::grey_hex;
pub use highlight::{language_for, CLexerHighlighter, Highlighter};
