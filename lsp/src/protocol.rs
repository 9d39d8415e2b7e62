//! Editor-protocol message shapes used by the session layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Diagnostic;

pub(crate) const PARSE_ERROR: i64 = -32700;
pub(crate) const METHOD_NOT_FOUND: i64 = -32601;
pub(crate) const SERVER_NOT_INITIALIZED: i64 = -32002;
pub(crate) const INVALID_PARAMS: i64 = -32602;

/// Full document sync.
const TEXT_DOCUMENT_SYNC_FULL: u8 = 1;

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

pub(crate) fn response(id: &Value, result: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub(crate) fn error_response(id: &Value, code: i64, message: &str) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}

pub(crate) fn initialize_result() -> Value {
    serde_json::json!({
        "capabilities": {
            "textDocumentSync": {
                "openClose": true,
                "change": TEXT_DOCUMENT_SYNC_FULL,
                "save": { "includeText": true }
            },
            "workspace": {
                "workspaceFolders": { "supported": true }
            }
        },
        "serverInfo": {
            "name": "solidhunter-ls",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitializeParams {
    #[serde(default)]
    pub workspace_folders: Option<Vec<WorkspaceFolder>>,
    #[serde(default)]
    pub root_uri: Option<String>,
}

impl InitializeParams {
    /// Local workspace folders, in editor order; `rootUri` only when no
    /// folders were sent.
    pub fn folder_paths(&self) -> Vec<PathBuf> {
        match &self.workspace_folders {
            Some(folders) if !folders.is_empty() => folders
                .iter()
                .filter_map(|f| file_uri_to_path(&f.uri))
                .collect(),
            _ => self
                .root_uri
                .as_deref()
                .and_then(file_uri_to_path)
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkspaceFolder {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidOpenParams {
    pub text_document: TextDocumentItem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TextDocumentItem {
    pub uri: String,
    pub language_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidChangeParams {
    pub text_document: TextDocumentIdentifier,
    pub content_changes: Vec<ContentChange>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentChange {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidSaveParams {
    pub text_document: TextDocumentIdentifier,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidCloseParams {
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextDocumentIdentifier {
    pub uri: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PublishDiagnosticsParams {
    pub uri: String,
    pub diagnostics: Vec<LspDiagnostic>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LspDiagnostic {
    pub range: LspRange,
    pub severity: u8,
    pub source: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LspRange {
    pub start: LspPosition,
    pub end: LspPosition,
}

#[derive(Debug, Serialize)]
pub(crate) struct LspPosition {
    pub line: u32,
    pub character: u32,
}

impl From<&Diagnostic> for LspDiagnostic {
    fn from(diag: &Diagnostic) -> Self {
        let range = diag.range();
        Self {
            range: LspRange {
                start: LspPosition {
                    line: range.start.line,
                    character: range.start.character,
                },
                end: LspPosition {
                    line: range.end.line,
                    character: range.end.character,
                },
            },
            severity: diag.severity().as_lsp(),
            source: diag.source(),
            message: diag.message().to_string(),
        }
    }
}

pub(crate) fn publish_diagnostics(uri: String, diagnostics: &[Diagnostic]) -> Notification {
    let params = PublishDiagnosticsParams {
        uri,
        diagnostics: diagnostics.iter().map(LspDiagnostic::from).collect(),
    };
    Notification::new(
        "textDocument/publishDiagnostics",
        serde_json::to_value(params).ok(),
    )
}

pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
}

/// Last path segment of any URI (e.g. `untitled:Untitled-1` → `Untitled-1`).
pub fn uri_file_name(uri: &str) -> Option<String> {
    let parsed = url::Url::parse(uri).ok()?;
    parsed
        .path()
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Position, Range, Severity};

    #[test]
    fn test_initialize_result_capabilities() {
        let result = initialize_result();
        let sync = &result["capabilities"]["textDocumentSync"];
        assert_eq!(sync["openClose"], true);
        assert_eq!(sync["change"], 1);
        assert_eq!(sync["save"]["includeText"], true);
        assert_eq!(
            result["capabilities"]["workspace"]["workspaceFolders"]["supported"],
            true
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_initialize_params_prefers_workspace_folders() {
        let json = serde_json::json!({
            "processId": 1,
            "rootUri": "file:///root",
            "workspaceFolders": [
                { "uri": "file:///ws/first", "name": "first" },
                { "uri": "file:///ws/second", "name": "second" }
            ]
        });
        let params: InitializeParams = serde_json::from_value(json).unwrap();
        assert_eq!(
            params.folder_paths(),
            vec![PathBuf::from("/ws/first"), PathBuf::from("/ws/second")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_initialize_params_falls_back_to_root_uri() {
        let json = serde_json::json!({ "rootUri": "file:///root", "workspaceFolders": null });
        let params: InitializeParams = serde_json::from_value(json).unwrap();
        assert_eq!(params.folder_paths(), vec![PathBuf::from("/root")]);

        let params: InitializeParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(params.folder_paths().is_empty());
    }

    #[test]
    fn test_publish_diagnostics_shape() {
        let diag = Diagnostic::new(
            Severity::Warning,
            Range::new(Position::new(4, 9), Position::new(4, 20)),
            "bad name".to_string(),
        );
        let notif = publish_diagnostics("file:///ws/test.sol".to_string(), &[diag]);
        let json = serde_json::to_value(&notif).unwrap();
        assert_eq!(json["method"], "textDocument/publishDiagnostics");
        assert_eq!(json["params"]["uri"], "file:///ws/test.sol");
        let d = &json["params"]["diagnostics"][0];
        assert_eq!(d["severity"], 2);
        assert_eq!(d["source"], "solidhunter");
        assert_eq!(d["message"], "bad name");
        assert_eq!(d["range"]["start"]["line"], 4);
        assert_eq!(d["range"]["start"]["character"], 9);
        assert_eq!(d["range"]["end"]["character"], 20);
    }

    #[test]
    fn test_publish_empty_list_keeps_array() {
        let notif = publish_diagnostics("file:///ws/test.sol".to_string(), &[]);
        let json = serde_json::to_value(&notif).unwrap();
        assert_eq!(json["params"]["diagnostics"], serde_json::json!([]));
    }

    #[test]
    fn test_error_response_shape() {
        let json = error_response(&serde_json::json!(7), METHOD_NOT_FOUND, "nope");
        assert_eq!(json["id"], 7);
        assert_eq!(json["error"]["code"], -32601);
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_did_change_params() {
        let json = serde_json::json!({
            "textDocument": { "uri": "file:///ws/a.sol", "version": 3 },
            "contentChanges": [{ "text": "old" }, { "text": "new" }]
        });
        let params: DidChangeParams = serde_json::from_value(json).unwrap();
        assert_eq!(params.text_document.uri, "file:///ws/a.sol");
        assert_eq!(params.content_changes.last().unwrap().text, "new");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_uri_to_path() {
        assert_eq!(
            file_uri_to_path("file:///home/test/a.sol"),
            Some(PathBuf::from("/home/test/a.sol"))
        );
        assert!(file_uri_to_path("not-a-uri").is_none());
        assert!(file_uri_to_path("untitled:Untitled-1").is_none());
    }

    #[test]
    fn test_uri_file_name() {
        assert_eq!(
            uri_file_name("untitled:Untitled-1").as_deref(),
            Some("Untitled-1")
        );
        assert_eq!(
            uri_file_name("file:///ws/Token.sol").as_deref(),
            Some("Token.sol")
        );
        assert!(uri_file_name("nope").is_none());
    }
}
