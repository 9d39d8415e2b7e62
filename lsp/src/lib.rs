//! Diagnostics bridge between an editor and the solidhunter analyzer CLI.
//!
//! Document events flow through the [`Orchestrator`], which runs the
//! analyzer, decodes its findings, and publishes the newest result per
//! document. [`serve`] wraps it in a stdio editor session.

pub mod analyzer;
pub mod codec;
pub mod decode;
pub mod finding;
pub mod orchestrator;
pub mod types;

pub(crate) mod protocol;
pub(crate) mod server;
pub(crate) mod workspace;

pub use analyzer::{Analyzer, CommandAnalyzer, InvokeError};
pub use decode::decode;
pub use orchestrator::{DiagnosticsUpdate, DocumentEvent, Orchestrator, Ticket, Validation};
pub use protocol::{file_uri_to_path, uri_file_name};
pub use server::{Exit, serve};
pub use types::{AnalyzerConfig, DIAGNOSTIC_SOURCE, Diagnostic, Position, Range, Severity};
