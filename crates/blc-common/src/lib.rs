pub mod errors;
pub mod manifest;
pub mod phase;
pub mod span;

pub use errors::{Diagnostic, DiagnosticBag, Severity};
pub use phase::Phase;
pub use span::{LineMap, Position, Span};
