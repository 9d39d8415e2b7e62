//! Validation orchestrator: decides when to lint and what gets published.
//!
//! Each tracked document moves `Idle → Validating → Idle`. Every request takes
//! a fresh generation number; only the request holding a document's latest
//! generation may publish, so a slow run can never overwrite the diagnostics
//! of a newer snapshot. In-flight processes are not cancelled, their results
//! are dropped on arrival.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::analyzer::{Analyzer, InvokeError};
use crate::decode::decode;
use crate::protocol;
use crate::types::{AnalyzerConfig, Diagnostic};
use crate::workspace::ConfigPathCache;

/// Document lifecycle event that triggers validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    Opened,
    Saved,
    Changed,
}

/// Diagnostics to display for one document, replacing any previous set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsUpdate {
    pub uri: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// What happened to a validation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Diagnostics were published for the document. Empty after a failed run.
    Published(Vec<Diagnostic>),
    /// A newer request (or a close) overtook this one; nothing was published.
    Superseded,
    /// The language identifier is not handled.
    Skipped,
}

impl Validation {
    #[must_use]
    pub fn diagnostics(&self) -> Option<&[Diagnostic]> {
        match self {
            Self::Published(items) => Some(items),
            Self::Superseded | Self::Skipped => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Validating,
}

#[derive(Debug)]
struct DocumentState {
    generation: u64,
    phase: Phase,
}

/// A claimed validation generation for one document.
#[derive(Debug)]
pub struct Ticket {
    uri: String,
    generation: u64,
    event: DocumentEvent,
}

impl Ticket {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Where the analyzer should read the document from.
enum Target {
    Disk(PathBuf),
    Memory(PathBuf),
}

pub struct Orchestrator<A> {
    analyzer: A,
    config: AnalyzerConfig,
    config_path: ConfigPathCache,
    documents: Mutex<HashMap<String, DocumentState>>,
    /// Shared across documents so a reopened document never reuses a
    /// generation still held by an older in-flight request.
    next_generation: AtomicU64,
    publish_tx: mpsc::Sender<DiagnosticsUpdate>,
}

impl<A: Analyzer> Orchestrator<A> {
    pub fn new(
        analyzer: A,
        config: AnalyzerConfig,
        publish_tx: mpsc::Sender<DiagnosticsUpdate>,
    ) -> Self {
        let config_path = ConfigPathCache::new(config.config_file_name());
        Self {
            analyzer,
            config,
            config_path,
            documents: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            publish_tx,
        }
    }

    /// Record the editor's workspace folders and resolve the config path
    /// from them if it is not cached yet.
    pub fn set_workspace_folders(&self, folders: Vec<PathBuf>) {
        self.config_path.set_workspace_folders(folders);
        let _ = self.config_path.resolve();
    }

    /// Validate the in-memory `content` of a document.
    pub async fn validate_document(
        &self,
        uri: &str,
        language_id: &str,
        content: &str,
    ) -> Validation {
        self.on_document_event(DocumentEvent::Changed, uri, language_id, content)
            .await
    }

    /// Validate a document after a lifecycle event.
    ///
    /// Open and save events lint the file on disk when it exists; changes
    /// always lint the supplied snapshot.
    pub async fn on_document_event(
        &self,
        event: DocumentEvent,
        uri: &str,
        language_id: &str,
        content: &str,
    ) -> Validation {
        match self.begin_validation(event, uri, language_id).await {
            Some(ticket) => self.complete_validation(ticket, content).await,
            None => Validation::Skipped,
        }
    }

    /// Claim the newest generation for `uri`, superseding any request still
    /// in flight for it.
    ///
    /// Callers that hand the rest of the work to another task must call this
    /// in event order; [`complete_validation`](Self::complete_validation) may
    /// then run concurrently. Returns `None` for unhandled languages.
    pub async fn begin_validation(
        &self,
        event: DocumentEvent,
        uri: &str,
        language_id: &str,
    ) -> Option<Ticket> {
        if !self.config.handles_language(language_id) {
            tracing::trace!(uri, language_id, "Skipping document in unhandled language");
            return None;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut documents = self.documents.lock().await;
        let state = documents
            .entry(uri.to_string())
            .or_insert(DocumentState {
                generation,
                phase: Phase::Idle,
            });
        state.generation = generation;
        state.phase = Phase::Validating;

        Some(Ticket {
            uri: uri.to_string(),
            generation,
            event,
        })
    }

    /// Run the analyzer for a claimed generation and publish the outcome if
    /// it is still the newest one.
    pub async fn complete_validation(&self, ticket: Ticket, content: &str) -> Validation {
        let Ticket {
            uri,
            generation,
            event,
        } = ticket;
        tracing::debug!(uri = %uri, generation, ?event, "Validating document");

        let diagnostics = match self.lint(event, &uri, content).await {
            Ok(output) => decode(&output),
            Err(e) => {
                tracing::warn!(uri = %uri, "Validation failed: {e}");
                Vec::new()
            }
        };

        self.finish(&uri, generation, diagnostics).await
    }

    /// Stop tracking a document and clear its diagnostics.
    ///
    /// Results still in flight for it are discarded when they arrive.
    pub async fn close_document(&self, uri: &str) {
        let mut documents = self.documents.lock().await;
        documents.remove(uri);
        self.publish(uri, Vec::new()).await;
    }

    /// Whether a request for `uri` is currently running.
    pub async fn is_validating(&self, uri: &str) -> bool {
        self.documents
            .lock()
            .await
            .get(uri)
            .is_some_and(|state| state.phase == Phase::Validating)
    }

    async fn finish(
        &self,
        uri: &str,
        generation: u64,
        diagnostics: Vec<Diagnostic>,
    ) -> Validation {
        // Holding the lock while publishing orders the staleness check and the
        // send against any newer request for the same document.
        let mut documents = self.documents.lock().await;
        match documents.get_mut(uri) {
            Some(state) if state.generation == generation => {
                state.phase = Phase::Idle;
                tracing::debug!(uri, count = diagnostics.len(), "Publishing diagnostics");
                self.publish(uri, diagnostics.clone()).await;
                Validation::Published(diagnostics)
            }
            _ => {
                tracing::debug!(uri, generation, "Discarding superseded result");
                Validation::Superseded
            }
        }
    }

    async fn publish(&self, uri: &str, diagnostics: Vec<Diagnostic>) {
        let update = DiagnosticsUpdate {
            uri: uri.to_string(),
            diagnostics,
        };
        if self.publish_tx.send(update).await.is_err() {
            tracing::debug!(uri, "Diagnostics receiver dropped");
        }
    }

    async fn lint(
        &self,
        event: DocumentEvent,
        uri: &str,
        content: &str,
    ) -> Result<String, InvokeError> {
        let target = resolve_target(event, uri).await;
        let config = self.config_path.resolve();
        let attempts = u32::from(self.config.retries()) + 1;

        let mut attempt = 1;
        loop {
            let result = match &target {
                Target::Disk(path) => self.analyzer.lint_file(path, config).await,
                Target::Memory(path) => self.analyzer.lint_content(path, content, config).await,
            };
            match result {
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::debug!(uri, attempt, "Retrying analyzer after: {e}");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

async fn resolve_target(event: DocumentEvent, uri: &str) -> Target {
    match protocol::file_uri_to_path(uri) {
        Some(path) => {
            let on_disk = matches!(event, DocumentEvent::Opened | DocumentEvent::Saved)
                && tokio::fs::try_exists(&path).await.unwrap_or(false);
            if on_disk {
                Target::Disk(path)
            } else {
                Target::Memory(path)
            }
        }
        None => Target::Memory(PathBuf::from(
            protocol::uri_file_name(uri).unwrap_or_default(),
        )),
    }
}
