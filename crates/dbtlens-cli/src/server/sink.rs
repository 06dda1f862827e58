use crate::protocol::ServerMessage;
use dbtlens_core::{Diagnostic, EditorSink, Progress};
use tokio::sync::mpsc;
use tracing::trace;

/// Forwards engine notifications to the writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    outgoing: mpsc::UnboundedSender<ServerMessage>,
}

impl ChannelSink {
    pub fn new(outgoing: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { outgoing }
    }

    fn send(&self, message: ServerMessage) {
        if self.outgoing.send(message).is_err() {
            trace!("writer gone, dropping notification");
        }
    }
}

impl EditorSink for ChannelSink {
    fn publish_diagnostics(&self, uri: &str, version: i32, diagnostics: Vec<Diagnostic>) {
        self.send(ServerMessage::PublishDiagnostics {
            uri: uri.to_string(),
            version,
            diagnostics,
        });
    }

    fn compiled_text_changed(&self, uri: &str, text: &str) {
        self.send(ServerMessage::CompiledText {
            uri: uri.to_string(),
            text: text.to_string(),
        });
    }

    fn progress(&self, uri: &str, progress: Progress) {
        self.send(ServerMessage::Progress {
            uri: uri.to_string(),
            kind: progress,
        });
    }
}
