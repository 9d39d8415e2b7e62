//! Stdio session: the editor-facing loop around the orchestrator.
//!
//! Reads framed messages, answers the handful of requests a diagnostics-only
//! server needs, and turns document notifications into validation runs. The
//! read loop never waits on the analyzer: each run completes on its own task.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::analyzer::Analyzer;
use crate::codec::{CodecError, FrameReader, FrameWriter};
use crate::orchestrator::{DiagnosticsUpdate, DocumentEvent, Orchestrator};
use crate::protocol::{
    self, DidChangeParams, DidCloseParams, DidOpenParams, DidSaveParams, InitializeParams,
};
use crate::types::AnalyzerConfig;

const WRITER_CHANNEL_CAPACITY: usize = 64;

const PUBLISH_CHANNEL_CAPACITY: usize = 256;

enum WriterCommand {
    Send(Value),
    Shutdown,
}

enum IncomingFrame {
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response,
}

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// `exit` after `shutdown`.
    Clean,
    /// `exit` without a prior `shutdown`.
    WithoutShutdown,
    /// The editor closed the stream.
    Disconnected,
}

impl Exit {
    /// Process exit code expected by editors.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::WithoutShutdown | Self::Disconnected => 1,
        }
    }
}

fn parse_incoming(frame: &Value) -> Option<IncomingFrame> {
    let id = frame.get("id");
    let method = frame
        .get("method")
        .and_then(|m| m.as_str())
        .map(String::from);
    let has_result_or_error = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, has_result_or_error) {
        (Some(_), None, true) => Some(IncomingFrame::Response),
        (Some(id), Some(method), _) => Some(IncomingFrame::Request {
            id: id.clone(),
            method,
            params: frame.get("params").cloned(),
        }),
        (None, Some(method), _) => Some(IncomingFrame::Notification {
            method,
            params: frame.get("params").cloned(),
        }),
        _ => None,
    }
}

fn parse_params<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Option<T> {
    match serde_json::from_value(params.unwrap_or(Value::Null)) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("Ignoring {method} with malformed params: {e}");
            None
        }
    }
}

struct OpenDocument {
    language_id: String,
    text: String,
}

struct Session<A> {
    orchestrator: Arc<Orchestrator<A>>,
    writer_tx: mpsc::Sender<WriterCommand>,
    documents: HashMap<String, OpenDocument>,
    initialized: bool,
    shutdown_requested: bool,
}

impl<A: Analyzer> Session<A> {
    async fn send(&self, frame: Value) {
        if self.writer_tx.send(WriterCommand::Send(frame)).await.is_err() {
            tracing::warn!("Editor connection writer closed");
        }
    }

    /// Returns `Some` when the session should end.
    async fn dispatch(&mut self, frame: &Value) -> Option<Exit> {
        let Some(incoming) = parse_incoming(frame) else {
            tracing::trace!("Ignoring malformed JSON-RPC frame");
            return None;
        };

        match incoming {
            IncomingFrame::Request { id, method, params } => {
                let reply = self.handle_request(&id, &method, params);
                self.send(reply).await;
                None
            }
            IncomingFrame::Notification { method, params } => {
                self.handle_notification(&method, params).await
            }
            IncomingFrame::Response => {
                tracing::trace!("Ignoring response from editor");
                None
            }
        }
    }

    fn handle_request(&mut self, id: &Value, method: &str, params: Option<Value>) -> Value {
        match method {
            "initialize" => {
                let params: InitializeParams = match params {
                    None => InitializeParams::default(),
                    Some(params) => match parse_params(method, Some(params)) {
                        Some(parsed) => parsed,
                        None => {
                            return protocol::error_response(
                                id,
                                protocol::INVALID_PARAMS,
                                "malformed initialize params",
                            );
                        }
                    },
                };
                let folders = params.folder_paths();
                tracing::info!(folders = folders.len(), "Initializing session");
                self.orchestrator.set_workspace_folders(folders);
                self.initialized = true;
                protocol::response(id, protocol::initialize_result())
            }
            _ if !self.initialized => protocol::error_response(
                id,
                protocol::SERVER_NOT_INITIALIZED,
                "server not initialized",
            ),
            "shutdown" => {
                self.shutdown_requested = true;
                protocol::response(id, Value::Null)
            }
            _ => {
                tracing::debug!("Editor sent unsupported request: {method}");
                protocol::error_response(
                    id,
                    protocol::METHOD_NOT_FOUND,
                    &format!("Method not found: {method}"),
                )
            }
        }
    }

    async fn handle_notification(&mut self, method: &str, params: Option<Value>) -> Option<Exit> {
        match method {
            "exit" => {
                return Some(if self.shutdown_requested {
                    Exit::Clean
                } else {
                    Exit::WithoutShutdown
                });
            }
            _ if !self.initialized => {
                tracing::debug!("Dropping {method} received before initialize");
            }
            "textDocument/didOpen" => {
                let params: DidOpenParams = parse_params(method, params)?;
                let doc = params.text_document;
                self.documents.insert(
                    doc.uri.clone(),
                    OpenDocument {
                        language_id: doc.language_id,
                        text: doc.text,
                    },
                );
                self.validate(DocumentEvent::Opened, &doc.uri).await;
            }
            "textDocument/didChange" => {
                let params: DidChangeParams = parse_params(method, params)?;
                let uri = params.text_document.uri;
                // Full sync: the last change carries the whole document.
                let Some(change) = params.content_changes.into_iter().last() else {
                    return None;
                };
                let Some(doc) = self.documents.get_mut(&uri) else {
                    tracing::debug!(uri = %uri, "Change for document that was never opened");
                    return None;
                };
                doc.text = change.text;
                self.validate(DocumentEvent::Changed, &uri).await;
            }
            "textDocument/didSave" => {
                let params: DidSaveParams = parse_params(method, params)?;
                let uri = params.text_document.uri;
                if let (Some(doc), Some(text)) = (self.documents.get_mut(&uri), params.text) {
                    doc.text = text;
                }
                self.validate(DocumentEvent::Saved, &uri).await;
            }
            "textDocument/didClose" => {
                let params: DidCloseParams = parse_params(method, params)?;
                let uri = params.text_document.uri;
                if self.documents.remove(&uri).is_some() {
                    self.orchestrator.close_document(&uri).await;
                }
            }
            "workspace/didChangeConfiguration" => {
                tracing::debug!(
                    documents = self.documents.len(),
                    "Settings changed, revalidating"
                );
                let uris: Vec<String> = self.documents.keys().cloned().collect();
                for uri in uris {
                    self.validate(DocumentEvent::Changed, &uri).await;
                }
            }
            "initialized"
            | "workspace/didChangeWorkspaceFolders"
            | "workspace/didChangeWatchedFiles" => {
                tracing::debug!("Received {method}");
            }
            _ => {
                tracing::trace!("Ignoring notification: {method}");
            }
        }
        None
    }

    /// Claim a generation in event order, then lint off the read loop.
    async fn validate(&self, event: DocumentEvent, uri: &str) {
        let Some(doc) = self.documents.get(uri) else {
            tracing::debug!(uri, "Validation requested for unknown document");
            return;
        };
        let Some(ticket) = self
            .orchestrator
            .begin_validation(event, uri, &doc.language_id)
            .await
        else {
            return;
        };

        let orchestrator = self.orchestrator.clone();
        let text = doc.text.clone();
        tokio::spawn(async move {
            orchestrator.complete_validation(ticket, &text).await;
        });
    }
}

/// Serve one editor connection until `exit` or end of stream.
pub async fn serve<R, W, A>(
    input: R,
    output: W,
    analyzer: A,
    config: AnalyzerConfig,
) -> Result<Exit>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    A: Analyzer,
{
    let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
    let writer_handle = tokio::spawn(async move {
        let mut writer = FrameWriter::new(output);
        while let Some(cmd) = writer_rx.recv().await {
            match cmd {
                WriterCommand::Send(frame) => {
                    if let Err(e) = writer.write_frame(&frame).await {
                        tracing::warn!("Editor write error: {e}");
                        break;
                    }
                }
                WriterCommand::Shutdown => break,
            }
        }
    });

    let (publish_tx, mut publish_rx) =
        mpsc::channel::<DiagnosticsUpdate>(PUBLISH_CHANNEL_CAPACITY);
    let publisher_writer_tx = writer_tx.clone();
    let publisher_handle = tokio::spawn(async move {
        while let Some(update) = publish_rx.recv().await {
            let notification = protocol::publish_diagnostics(update.uri, &update.diagnostics);
            let frame = match serde_json::to_value(&notification) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Failed to serialize diagnostics: {e}");
                    continue;
                }
            };
            if publisher_writer_tx
                .send(WriterCommand::Send(frame))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let mut session = Session {
        orchestrator: Arc::new(Orchestrator::new(analyzer, config, publish_tx)),
        writer_tx,
        documents: HashMap::new(),
        initialized: false,
        shutdown_requested: false,
    };

    let mut reader = FrameReader::new(input);
    let exit = loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => {
                if let Some(exit) = session.dispatch(&frame).await {
                    break exit;
                }
            }
            Ok(None) => {
                tracing::info!("Editor closed the connection");
                break Exit::Disconnected;
            }
            Err(CodecError::Json(e)) => {
                tracing::warn!("Discarding frame with malformed JSON body: {e}");
                session
                    .send(protocol::error_response(
                        &Value::Null,
                        protocol::PARSE_ERROR,
                        "Parse error",
                    ))
                    .await;
            }
            Err(e) => {
                publisher_handle.abort();
                let _ = session.writer_tx.send(WriterCommand::Shutdown).await;
                return Err(e).context("reading from editor");
            }
        }
    };

    publisher_handle.abort();
    let _ = session.writer_tx.send(WriterCommand::Shutdown).await;
    writer_handle.await.context("joining editor writer")?;
    tracing::info!(?exit, "Session ended");
    Ok(exit)
}
