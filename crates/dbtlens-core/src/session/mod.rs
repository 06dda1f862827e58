//! One open document: its raw and compiled snapshot chains and the state
//! machine that keeps them in step.
//!
//! [`DocumentSession`] is synchronous and owns no tasks; [`SessionDriver`]
//! runs it on a tokio task and performs the external calls it asks for.
//!
//! ```text
//! Idle ──edit──▶ PendingCompile ──timer──▶ Compiling ──ok──▶ CatalogSyncing ──▶ Ready
//!   ▲                                          │                   │
//!   │                                          └──err──▶ Error ◀───┘ (analysis error)
//!   └──────────────────── next edit ◀──── Ready / Error
//! ```

mod driver;
mod identifier;
mod pipeline;

pub use driver::{SessionDriver, SessionHandle, SessionStatus};
pub use identifier::{identifier_range, prefix_range, range_text, text_before_bracket};
pub use pipeline::derived_name;

use crate::error::{AnalysisError, CompileError, SessionError};
use crate::position::{align_column, align_range, locate_position, translate_line};
use crate::scheduler::{Decision, RecompileReason, RecompileScheduler};
use crate::text::{apply_edit, line_text, TextSnapshot};
use crate::types::{Analysis, Diagnostic, Position, Range, TextEdit};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    PendingCompile,
    Compiling,
    CatalogSyncing,
    Ready,
    Error,
}

/// The last successful analysis and the compiled text it describes.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub compiled: Arc<TextSnapshot>,
    pub analysis: Analysis,
}

/// What an accepted edit batch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The edits were applied to both chains; the compiled text needs a
    /// fresh analysis.
    Mirrored,
    /// A recompile was scheduled.
    Scheduled(RecompileReason),
}

/// What to do after a compile finished.
#[derive(Debug, Clone)]
pub enum CompileOutcome {
    /// Analyze this compiled snapshot.
    Analyze(Arc<TextSnapshot>),
    /// Edits arrived during the compile; a rerun is armed and analysis of
    /// this result is skipped.
    Stale,
    /// Expansion failed; publish these diagnostics.
    Failed(Vec<Diagnostic>),
}

#[derive(Debug)]
pub struct DocumentSession {
    raw: Arc<TextSnapshot>,
    compiled: Arc<TextSnapshot>,
    scheduler: RecompileScheduler,
    state: SessionState,
    last_analysis: Option<Arc<AnalysisResult>>,
    diagnostics: Vec<Diagnostic>,
}

impl DocumentSession {
    /// Opens a session and arms the first compile.
    ///
    /// The compiled chain starts as a copy of the raw text so that mirrored
    /// edits have something to apply to before the first compile lands.
    pub fn open(raw: Arc<TextSnapshot>, debounce: Duration, now: Instant) -> Self {
        let compiled = Arc::clone(&raw);
        let mut session = Self {
            raw,
            compiled,
            scheduler: RecompileScheduler::new(debounce),
            state: SessionState::Idle,
            last_analysis: None,
            diagnostics: Vec::new(),
        };
        session.schedule(RecompileReason::Opened, now);
        session
    }

    pub fn uri(&self) -> &str {
        &self.raw.uri
    }

    pub fn raw(&self) -> &Arc<TextSnapshot> {
        &self.raw
    }

    pub fn compiled(&self) -> &Arc<TextSnapshot> {
        &self.compiled
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn scheduler(&self) -> &RecompileScheduler {
        &self.scheduler
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    pub fn last_analysis(&self) -> Option<&Arc<AnalysisResult>> {
        self.last_analysis.as_ref()
    }

    /// Diagnostics last published, in raw coordinates.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Applies an edit batch targeting `version`.
    pub fn apply_change(
        &mut self,
        version: i32,
        edits: &[TextEdit],
        now: Instant,
    ) -> Result<ChangeOutcome, SessionError> {
        if version <= self.raw.version {
            return Err(SessionError::OutOfOrderVersion {
                uri: self.raw.uri.clone(),
                current: self.raw.version,
                received: version,
            });
        }

        match self.scheduler.decide(&self.raw.content, edits) {
            Decision::Mirror => match self.mirror(edits) {
                Some((raw, compiled)) => {
                    debug!(uri = %self.raw.uri, version, edits = edits.len(), "mirrored edits");
                    self.raw = self.raw.with_content(version, raw);
                    self.compiled = self.compiled.with_content(version, compiled);
                    if matches!(self.state, SessionState::Ready | SessionState::Error) {
                        self.state = SessionState::Idle;
                    }
                    Ok(ChangeOutcome::Mirrored)
                }
                None => Ok(self.recompile(version, edits, RecompileReason::Unaligned, now)),
            },
            Decision::Recompile(reason) => Ok(self.recompile(version, edits, reason, now)),
        }
    }

    fn recompile(
        &mut self,
        version: i32,
        edits: &[TextEdit],
        reason: RecompileReason,
        now: Instant,
    ) -> ChangeOutcome {
        self.raw = self.raw.with_edits(version, edits);
        self.schedule(reason, now);
        ChangeOutcome::Scheduled(reason)
    }

    /// Arms a recompile regardless of the decision policy.
    pub fn force_recompile(&mut self, now: Instant) {
        self.schedule(RecompileReason::Forced, now);
    }

    fn schedule(&mut self, reason: RecompileReason, now: Instant) {
        debug!(uri = %self.raw.uri, version = self.raw.version, %reason, "recompile requested");
        self.scheduler.request_compile(now);
        if !self.scheduler.job().in_flight {
            self.state = SessionState::PendingCompile;
        }
    }

    /// Applies each edit to copies of both texts, placing its range in the
    /// compiled text against the texts it applies to. Returns `None`, leaving
    /// the session untouched, when some range has no exact compiled place.
    fn mirror(&self, edits: &[TextEdit]) -> Option<(String, String)> {
        let mut raw = self.raw.content.clone();
        let mut compiled = self.compiled.content.clone();
        for edit in edits {
            let mirrored = match edit.range {
                Some(range) => {
                    let range = align_range(&raw, &compiled, range)?.collapse_if_inverted();
                    TextEdit::replace(range, edit.text.clone())
                }
                None => edit.clone(),
            };
            compiled = apply_edit(&compiled, &mirrored);
            raw = apply_edit(&raw, edit);
        }
        Some((raw, compiled))
    }

    /// Starts the compile if its timer has fired, returning the raw snapshot
    /// to expand.
    pub fn start_compile(&mut self, now: Instant) -> Option<Arc<TextSnapshot>> {
        if !self.scheduler.start_due(now) {
            return None;
        }
        self.state = SessionState::Compiling;
        info!(uri = %self.raw.uri, version = self.raw.version, "compiling");
        Some(Arc::clone(&self.raw))
    }

    /// Records the result of expanding `source`.
    pub fn finish_compile(
        &mut self,
        source: &TextSnapshot,
        result: Result<String, CompileError>,
        now: Instant,
    ) -> CompileOutcome {
        let rerun = self.scheduler.finish(now, result.is_ok());
        match result {
            Ok(text) => {
                self.compiled = self.raw.with_content(source.version, text);
                if rerun {
                    debug!(uri = %source.uri, version = source.version, "compile result is stale");
                    self.state = SessionState::PendingCompile;
                    CompileOutcome::Stale
                } else {
                    self.state = SessionState::CatalogSyncing;
                    CompileOutcome::Analyze(Arc::clone(&self.compiled))
                }
            }
            Err(err) if rerun => {
                debug!(uri = %source.uri, %err, "stale compile failed");
                self.state = SessionState::PendingCompile;
                CompileOutcome::Stale
            }
            Err(err) => {
                info!(uri = %source.uri, %err, "compile failed");
                self.state = SessionState::Error;
                self.diagnostics = vec![Diagnostic::error(Range::default(), err.message)];
                CompileOutcome::Failed(self.diagnostics.clone())
            }
        }
    }

    /// Marks the start of an analysis of `compiled`.
    pub fn start_analysis(&mut self) {
        if self.scheduler.is_quiet() {
            self.state = SessionState::CatalogSyncing;
        }
    }

    /// Records the analysis of `compiled`.
    ///
    /// Returns `None` when `compiled` has been superseded; the caller should
    /// analyze the current compiled snapshot instead.
    pub fn finish_analysis(
        &mut self,
        compiled: &Arc<TextSnapshot>,
        result: Result<Analysis, AnalysisError>,
    ) -> Option<Vec<Diagnostic>> {
        if !Arc::ptr_eq(compiled, &self.compiled) {
            debug!(uri = %compiled.uri, version = compiled.version, "discarding superseded analysis");
            return None;
        }

        let failed = result.is_err();
        self.diagnostics = match result {
            Ok(analysis) => {
                self.last_analysis = Some(Arc::new(AnalysisResult {
                    compiled: Arc::clone(compiled),
                    analysis,
                }));
                Vec::new()
            }
            Err(err) => vec![self.translate_error(&err)],
        };

        if self.scheduler.job().in_flight {
            self.state = SessionState::Compiling;
        } else if self.scheduler.deadline().is_some() {
            self.state = SessionState::PendingCompile;
        } else {
            self.state = if failed {
                SessionState::Error
            } else {
                SessionState::Ready
            };
        }
        Some(self.diagnostics.clone())
    }

    /// Places an analysis error on the raw identifier it points at.
    fn translate_error(&self, err: &AnalysisError) -> Diagnostic {
        let location = err.location();
        let compiled_position = location.position();
        let line = translate_line(&self.compiled.content, &self.raw.content, compiled_position.line);
        let character = match (
            line_text(&self.compiled.content, compiled_position.line),
            line_text(&self.raw.content, line),
        ) {
            (Some(compiled_line), Some(raw_line)) => {
                align_column(compiled_line, raw_line, compiled_position.character)
                    .unwrap_or(compiled_position.character)
            }
            _ => compiled_position.character,
        };
        let range = identifier_range(&self.raw.content, Position::new(line, character));
        debug!(
            uri = %self.raw.uri,
            compiled_line = compiled_position.line,
            raw_line = line,
            "translated analysis error"
        );
        Diagnostic::error(range, location.description)
    }

    /// Translates a raw cursor into compiled coordinates.
    pub fn to_compiled(&self, position: Position) -> Position {
        let compiled = self
            .last_analysis
            .as_ref()
            .map_or(&self.compiled, |result| &result.compiled);
        locate_position(&self.raw.content, &compiled.content, position)
    }

    /// Drops all compile state. The chains are kept for inspection.
    pub fn close(&mut self) {
        self.scheduler.reset();
        self.state = SessionState::Idle;
        self.last_analysis = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Range;

    const DEBOUNCE: Duration = Duration::from_millis(300);

    fn open(content: &str) -> (DocumentSession, Instant) {
        let now = Instant::now();
        let raw = TextSnapshot::new("file:///models/m.sql", 1, content, "sql");
        (DocumentSession::open(raw, DEBOUNCE, now), now)
    }

    fn compile(session: &mut DocumentSession, now: Instant, text: &str) -> CompileOutcome {
        let source = session.start_compile(now + DEBOUNCE).expect("compile due");
        session.finish_compile(&source, Ok(text.to_string()), now + DEBOUNCE)
    }

    #[test]
    fn open_arms_the_first_compile() {
        let (session, now) = open("SELECT 1");
        assert_eq!(session.state(), SessionState::PendingCompile);
        assert_eq!(session.deadline(), Some(now + DEBOUNCE));
    }

    #[test]
    fn edit_outside_directive_is_mirrored() {
        let (mut session, now) = open("SELECT {{ ref('a') }} AS x");
        compile(&mut session, now, "SELECT \"project.dataset.a\" AS x");

        let edit = TextEdit::replace(Range::on_line(0, 25, 26), "y");
        let outcome = session.apply_change(2, &[edit], now).unwrap();

        assert_eq!(outcome, ChangeOutcome::Mirrored);
        assert_eq!(session.raw().content, "SELECT {{ ref('a') }} AS y");
        assert_eq!(session.compiled().content, "SELECT \"project.dataset.a\" AS y");
        assert_eq!(session.raw().version, 2);
        assert_eq!(session.compiled().version, 2);
    }

    #[test]
    fn edit_before_directive_on_same_line_is_mirrored() {
        let (mut session, now) = open("SELECT x, {{ ref('a') }}.id");
        compile(&mut session, now, "SELECT x, \"project.dataset.a\".id");

        let edit = TextEdit::replace(Range::on_line(0, 7, 8), "y");
        let outcome = session.apply_change(2, &[edit], now).unwrap();

        assert_eq!(outcome, ChangeOutcome::Mirrored);
        assert_eq!(session.compiled().content, "SELECT y, \"project.dataset.a\".id");
    }

    #[test]
    fn edits_in_one_batch_align_against_each_other() {
        let (mut session, now) = open("SELECT a, {{ ref('t') }}.id AS x");
        compile(&mut session, now, "SELECT a, `t`.id AS x");

        let edits = [
            TextEdit::replace(Range::on_line(0, 7, 8), "alpha"),
            TextEdit::replace(Range::on_line(0, 35, 36), "y"),
        ];
        session.apply_change(2, &edits, now).unwrap();

        assert_eq!(session.raw().content, "SELECT alpha, {{ ref('t') }}.id AS y");
        assert_eq!(session.compiled().content, "SELECT alpha, `t`.id AS y");
    }

    #[test]
    fn edit_between_directives_recompiles() {
        let (mut session, now) = open("SELECT {{ a }} + x + {{ b }}");
        compile(&mut session, now, "SELECT 1 + x + 2");

        let edit = TextEdit::replace(Range::on_line(0, 17, 18), "y");
        let outcome = session.apply_change(2, &[edit], now).unwrap();

        assert_eq!(outcome, ChangeOutcome::Scheduled(RecompileReason::Unaligned));
        assert_eq!(session.raw().content, "SELECT {{ a }} + y + {{ b }}");
        assert_eq!(session.compiled().content, "SELECT 1 + x + 2");
        assert_eq!(session.compiled().version, 1);
        assert_eq!(session.state(), SessionState::PendingCompile);
    }

    #[test]
    fn mirrored_edit_lands_on_matching_compiled_line() {
        let (mut session, now) = open("SELECT\n  {{ ref('a') }}.id,\n  x\nFROM t");
        compile(&mut session, now, "SELECT\n  `p`.`d`.`a`.id,\n  x\nFROM t");

        let edit = TextEdit::replace(Range::on_line(2, 2, 3), "y");
        session.apply_change(2, &[edit], now).unwrap();

        assert_eq!(session.compiled().content, "SELECT\n  `p`.`d`.`a`.id,\n  y\nFROM t");
    }

    #[test]
    fn edit_inside_directive_schedules_compile() {
        let (mut session, now) = open("SELECT {{ ref('a') }} AS x");
        compile(&mut session, now, "SELECT a AS x");

        let edit = TextEdit::replace(Range::on_line(0, 15, 16), "b");
        let outcome = session.apply_change(2, &[edit], now).unwrap();

        assert_eq!(outcome, ChangeOutcome::Scheduled(RecompileReason::TouchesDirective));
        assert_eq!(session.state(), SessionState::PendingCompile);
        assert_eq!(session.compiled().version, 1);
        assert_eq!(session.raw().version, 2);
    }

    #[test]
    fn out_of_order_versions_leave_session_unchanged() {
        let (mut session, now) = open("SELECT 1");
        let err = session
            .apply_change(1, &[TextEdit::full("SELECT 2")], now)
            .unwrap_err();
        assert!(matches!(err, SessionError::OutOfOrderVersion { current: 1, received: 1, .. }));
        assert_eq!(session.raw().content, "SELECT 1");
    }

    #[test]
    fn edit_during_compile_makes_result_stale() {
        let (mut session, now) = open("SELECT {{ x }}");
        let source = session.start_compile(now + DEBOUNCE).unwrap();
        assert_eq!(session.state(), SessionState::Compiling);

        session
            .apply_change(2, &[TextEdit::replace(Range::on_line(0, 0, 0), "-- c\n")], now)
            .unwrap();
        let outcome = session.finish_compile(&source, Ok("SELECT 1".into()), now + DEBOUNCE);

        assert!(matches!(outcome, CompileOutcome::Stale));
        assert_eq!(session.compiled().content, "SELECT 1");
        assert_eq!(session.compiled().version, 1);
        assert_eq!(session.state(), SessionState::PendingCompile);
        assert!(session.deadline().is_some());
    }

    #[test]
    fn compile_error_is_reported_at_origin() {
        let (mut session, now) = open("SELECT {{ broken");
        let source = session.start_compile(now + DEBOUNCE).unwrap();
        let outcome =
            session.finish_compile(&source, Err(CompileError::new("unexpected end")), now + DEBOUNCE);

        let CompileOutcome::Failed(diagnostics) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range, Range::default());
        assert_eq!(diagnostics[0].message, "unexpected end");
        assert_eq!(session.state(), SessionState::Error);
    }

    #[test]
    fn analysis_error_lands_on_raw_identifier() {
        let raw = "{{ config(materialized='table') }}\n\
                   {% set x = 1 %}\n\
                   SELECT\n  id\n  FROM t WHERE pausd";
        let compiled = "\n\nSELECT\n  id\n  FROM t WHERE pausd";
        let (mut session, now) = open(raw);
        let CompileOutcome::Analyze(snapshot) = compile(&mut session, now, compiled) else {
            panic!("expected analysis");
        };

        let err = AnalysisError::new("Unrecognized name: pausd; Did you mean paused? [at 5:16]");
        let diagnostics = session.finish_analysis(&snapshot, Err(err)).unwrap();

        assert_eq!(diagnostics[0].range, Range::on_line(4, 15, 20));
        assert_eq!(diagnostics[0].message, "Unrecognized name: pausd; Did you mean paused?");
        assert_eq!(session.state(), SessionState::Error);
    }

    #[test]
    fn superseded_analysis_is_discarded() {
        let (mut session, now) = open("SELECT a FROM t");
        let CompileOutcome::Analyze(snapshot) = compile(&mut session, now, "SELECT a FROM t") else {
            panic!("expected analysis");
        };
        session
            .apply_change(2, &[TextEdit::replace(Range::on_line(0, 7, 8), "b")], now)
            .unwrap();

        assert!(session.finish_analysis(&snapshot, Ok(Analysis::default())).is_none());
        let current = Arc::clone(session.compiled());
        assert_eq!(current.content, "SELECT b FROM t");
        assert!(session.finish_analysis(&current, Ok(Analysis::default())).is_some());
        assert_eq!(session.state(), SessionState::Ready);
    }
}
