use super::pipeline::{analysis_pass, compile_pass, derived_name};
use super::{ChangeOutcome, CompileOutcome, DocumentSession, SessionState};
use crate::catalog::{CatalogRegistry, ObjectName};
use crate::config::EngineConfig;
use crate::engine::Engines;
use crate::error::{AnalysisError, CompileError, SessionError};
use crate::features;
use crate::text::TextSnapshot;
use crate::types::{
    Analysis, CompletionItem, Diagnostic, Hover, Position, Progress, SignatureHelp, TextEdit,
};
use serde::Serialize;
use std::future::pending;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

const COMMAND_BUFFER: usize = 64;

/// A point-in-time view of a session, for inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: SessionState,
    pub raw_version: i32,
    pub compiled_version: i32,
    pub raw: String,
    pub compiled: String,
    pub diagnostics: Vec<Diagnostic>,
}

enum Command {
    Change {
        version: i32,
        edits: Vec<TextEdit>,
        reply: oneshot::Sender<Result<ChangeOutcome, SessionError>>,
    },
    ForceRecompile,
    Hover {
        position: Position,
        reply: oneshot::Sender<Option<Hover>>,
    },
    Completion {
        position: Position,
        reply: oneshot::Sender<Vec<CompletionItem>>,
    },
    SignatureHelp {
        position: Position,
        reply: oneshot::Sender<Option<SignatureHelp>>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap handle to a running [`SessionDriver`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    uri: Arc<str>,
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Change { .. } => "Change",
            Self::ForceRecompile => "ForceRecompile",
            Self::Hover { .. } => "Hover",
            Self::Completion { .. } => "Completion",
            Self::SignatureHelp { .. } => "SignatureHelp",
            Self::Status { .. } => "Status",
            Self::Close { .. } => "Close",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply)).await?;
        response
            .await
            .map_err(|_| SessionError::Closed(self.uri.to_string()))
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed(self.uri.to_string()))
    }

    pub async fn change(&self, version: i32, edits: Vec<TextEdit>) -> Result<ChangeOutcome, SessionError> {
        self.request(|reply| Command::Change {
            version,
            edits,
            reply,
        })
        .await?
    }

    pub async fn force_recompile(&self) -> Result<(), SessionError> {
        self.send(Command::ForceRecompile).await
    }

    pub async fn hover(&self, position: Position) -> Result<Option<Hover>, SessionError> {
        self.request(|reply| Command::Hover { position, reply }).await
    }

    pub async fn completion(&self, position: Position) -> Result<Vec<CompletionItem>, SessionError> {
        self.request(|reply| Command::Completion { position, reply })
            .await
    }

    pub async fn signature_help(&self, position: Position) -> Result<Option<SignatureHelp>, SessionError> {
        self.request(|reply| Command::SignatureHelp { position, reply })
            .await
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Stops the driver. In-flight calls finish in the background and their
    /// results are dropped.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Close { reply }).await
    }
}

struct InFlight<T> {
    snapshot: Arc<TextSnapshot>,
    handle: JoinHandle<T>,
}

/// Owns one [`DocumentSession`] on a tokio task.
///
/// Commands are handled strictly in order. Compiles and analyses run as
/// spawned tasks, at most one at a time, so edits keep flowing while a pass
/// is in flight.
pub struct SessionDriver {
    session: DocumentSession,
    engines: Engines,
    catalog: CatalogRegistry,
    derived: Option<ObjectName>,
    commands: mpsc::Receiver<Command>,
    compile: Option<InFlight<Result<String, CompileError>>>,
    analysis: Option<InFlight<Result<Analysis, AnalysisError>>>,
    reanalyze: bool,
    progress_open: bool,
}

impl SessionDriver {
    /// Opens `raw` and starts its driver on the current runtime.
    pub fn spawn(
        raw: Arc<TextSnapshot>,
        engines: Engines,
        catalog: CatalogRegistry,
        config: &EngineConfig,
    ) -> SessionHandle {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let uri: Arc<str> = Arc::from(raw.uri.as_str());
        let driver = Self {
            derived: derived_name(&raw.uri, &config.template),
            session: DocumentSession::open(raw, config.debounce(), Instant::now()),
            engines,
            catalog,
            commands,
            compile: None,
            analysis: None,
            reanalyze: false,
            progress_open: false,
        };
        tokio::spawn(driver.run());
        SessionHandle {
            uri,
            commands: commands_tx,
        }
    }

    async fn run(mut self) {
        self.begin_progress();
        loop {
            let deadline = self.session.deadline();
            let idle = self.compile.is_none() && self.analysis.is_none();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Close { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                _ = until(deadline), if idle => self.start_compile(),
                joined = join(&mut self.compile) => {
                    if let Some(InFlight { snapshot, .. }) = self.compile.take() {
                        let result = joined.unwrap_or_else(|err| {
                            Err(CompileError::new(format!("template expansion aborted: {err}")))
                        });
                        self.on_compiled(&snapshot, result);
                    }
                }
                joined = join(&mut self.analysis) => {
                    if let Some(InFlight { snapshot, .. }) = self.analysis.take() {
                        let result = joined.unwrap_or_else(|err| {
                            Err(AnalysisError::new(format!("analysis aborted: {err}")))
                        });
                        self.on_analyzed(&snapshot, result);
                    }
                }
            }
        }
        debug!(uri = %self.session.uri(), "session driver stopped");
    }

    fn handle(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::Change {
                version,
                edits,
                reply,
            } => {
                let outcome = self.session.apply_change(version, &edits, now);
                match outcome {
                    Ok(ChangeOutcome::Mirrored) => {
                        let compiled = Arc::clone(self.session.compiled());
                        self.engines
                            .sink
                            .compiled_text_changed(&compiled.uri, &compiled.content);
                        self.request_analysis();
                    }
                    Ok(ChangeOutcome::Scheduled(_)) => self.begin_progress(),
                    Err(ref err) => warn!(%err, "rejected edit"),
                }
                let _ = reply.send(outcome);
            }
            Command::ForceRecompile => {
                self.session.force_recompile(now);
                self.begin_progress();
            }
            Command::Hover { position, reply } => {
                let catalog = self.catalog.snapshot();
                let result = self.session.last_analysis().map(Arc::as_ref);
                let _ = reply.send(features::hover(
                    &self.session.raw().content,
                    position,
                    result,
                    &catalog,
                ));
            }
            Command::Completion { position, reply } => {
                let catalog = self.catalog.snapshot();
                let result = self.session.last_analysis().map(Arc::as_ref);
                let _ = reply.send(features::completion(
                    &self.session.raw().content,
                    position,
                    result,
                    &catalog,
                ));
            }
            Command::SignatureHelp { position, reply } => {
                let catalog = self.catalog.snapshot();
                let _ = reply.send(features::signature_help(
                    &self.session.raw().content,
                    position,
                    &catalog,
                ));
            }
            Command::Status { reply } => {
                let _ = reply.send(SessionStatus {
                    state: self.session.state(),
                    raw_version: self.session.raw().version,
                    compiled_version: self.session.compiled().version,
                    raw: self.session.raw().content.clone(),
                    compiled: self.session.compiled().content.clone(),
                    diagnostics: self.session.diagnostics().to_vec(),
                });
            }
            Command::Close { .. } => {}
        }
    }

    fn start_compile(&mut self) {
        let Some(source) = self.session.start_compile(Instant::now()) else {
            return;
        };
        self.begin_progress();
        let handle = tokio::spawn(compile_pass(self.engines.clone(), Arc::clone(&source)));
        self.compile = Some(InFlight {
            snapshot: source,
            handle,
        });
    }

    fn request_analysis(&mut self) {
        if self.compile.is_some() || self.analysis.is_some() {
            self.reanalyze = true;
        } else {
            self.start_analysis();
        }
    }

    fn start_analysis(&mut self) {
        self.reanalyze = false;
        self.begin_progress();
        self.session.start_analysis();
        let compiled = Arc::clone(self.session.compiled());
        let handle = tokio::spawn(analysis_pass(
            self.engines.clone(),
            self.catalog.clone(),
            Arc::clone(&compiled),
            self.derived.clone(),
        ));
        self.analysis = Some(InFlight {
            snapshot: compiled,
            handle,
        });
    }

    fn on_compiled(&mut self, source: &TextSnapshot, result: Result<String, CompileError>) {
        let outcome = self.session.finish_compile(source, result, Instant::now());
        let uri = self.session.uri().to_string();
        match outcome {
            CompileOutcome::Analyze(compiled) => {
                self.engines.sink.compiled_text_changed(&uri, &compiled.content);
                self.start_analysis();
            }
            CompileOutcome::Stale => {
                let compiled = Arc::clone(self.session.compiled());
                self.engines.sink.compiled_text_changed(&uri, &compiled.content);
            }
            CompileOutcome::Failed(diagnostics) => self.publish(diagnostics),
        }
        self.end_progress_if_quiet();
    }

    fn on_analyzed(&mut self, compiled: &Arc<TextSnapshot>, result: Result<Analysis, AnalysisError>) {
        match self.session.finish_analysis(compiled, result) {
            Some(diagnostics) => {
                self.publish(diagnostics);
                if self.reanalyze {
                    self.start_analysis();
                }
            }
            None => self.start_analysis(),
        }
        self.end_progress_if_quiet();
    }

    fn publish(&self, diagnostics: Vec<Diagnostic>) {
        let raw = self.session.raw();
        self.engines
            .sink
            .publish_diagnostics(&raw.uri, raw.version, diagnostics);
    }

    fn begin_progress(&mut self) {
        if !self.progress_open {
            self.progress_open = true;
            self.engines.sink.progress(self.session.uri(), Progress::Begin);
        }
    }

    fn end_progress_if_quiet(&mut self) {
        let quiet = self.compile.is_none() && self.analysis.is_none() && self.session.scheduler().is_quiet();
        if self.progress_open && quiet {
            self.progress_open = false;
            self.engines.sink.progress(self.session.uri(), Progress::End);
        }
    }

    fn shutdown(&mut self) {
        self.session.close();
        if let Some(compile) = self.compile.take() {
            compile.handle.abort();
        }
        if let Some(analysis) = self.analysis.take() {
            analysis.handle.abort();
        }
        if self.progress_open {
            self.progress_open = false;
            self.engines.sink.progress(self.session.uri(), Progress::End);
        }
        self.publish(Vec::new());
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn join<T>(in_flight: &mut Option<InFlight<T>>) -> Result<T, JoinError> {
    match in_flight {
        Some(in_flight) => (&mut in_flight.handle).await,
        None => pending().await,
    }
}
