//! Full-recompile versus mirror decisions and the debounced compile job.

use crate::directive::{contains_directive_syntax, find_spans, touches_any_span};
use crate::text::{apply_edit, offset_at};
use crate::types::{Span, TextEdit};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default trailing debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecompileReason {
    /// A compilation is already running.
    InFlight,
    /// The inserted text (or its immediate neighbourhood) contains directive
    /// delimiters.
    DirectiveSyntax,
    /// Nothing has compiled successfully yet.
    NeverCompiled,
    /// An edit overlaps or abuts an existing directive.
    TouchesDirective,
    /// A whole-document replacement in a templated document.
    FullReplacement,
    /// Explicitly requested by the editor.
    Forced,
    /// The document was just opened.
    Opened,
    /// A mirrored edit had no exact place in the compiled text.
    Unaligned,
}

impl fmt::Display for RecompileReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InFlight => "compile in flight",
            Self::DirectiveSyntax => "directive syntax in edit",
            Self::NeverCompiled => "never compiled",
            Self::TouchesDirective => "edit touches directive",
            Self::FullReplacement => "full replacement",
            Self::Forced => "forced",
            Self::Opened => "opened",
            Self::Unaligned => "edit not alignable",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Mirror,
    Recompile(RecompileReason),
}

/// Compile bookkeeping for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationJob {
    pub in_flight: bool,
    pub pending_rerun: bool,
    /// Set after the first successful compilation.
    pub compiled_once: bool,
    pub deadline: Option<Instant>,
}

/// Decides how each edit batch is propagated and owns the debounce timer.
#[derive(Debug, Clone)]
pub struct RecompileScheduler {
    debounce: Duration,
    job: CompilationJob,
}

impl Default for RecompileScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl RecompileScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            job: CompilationJob::default(),
        }
    }

    pub fn job(&self) -> &CompilationJob {
        &self.job
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Chooses between mirroring `edits` into the compiled text and a full
    /// recompile. `raw` is the text the first edit applies to.
    pub fn decide(&self, raw: &str, edits: &[TextEdit]) -> Decision {
        let decision = self.evaluate(raw, edits);
        debug!(?decision, edits = edits.len(), "scheduling decision");
        decision
    }

    fn evaluate(&self, raw: &str, edits: &[TextEdit]) -> Decision {
        if self.job.in_flight {
            return Decision::Recompile(RecompileReason::InFlight);
        }
        if introduces_directive_syntax(raw, edits) {
            return Decision::Recompile(RecompileReason::DirectiveSyntax);
        }
        if find_spans(raw).next().is_none() {
            return Decision::Mirror;
        }
        if !self.job.compiled_once {
            return Decision::Recompile(RecompileReason::NeverCompiled);
        }

        let mut current = raw.to_string();
        for edit in edits {
            let Some(range) = edit.range else {
                return Decision::Recompile(RecompileReason::FullReplacement);
            };
            let range = range.collapse_if_inverted();
            let span = Span::new(offset_at(&current, range.start), offset_at(&current, range.end));
            if touches_any_span(find_spans(&current), span) {
                return Decision::Recompile(RecompileReason::TouchesDirective);
            }
            current = apply_edit(&current, edit);
        }
        Decision::Mirror
    }

    /// Arms (or restarts) the debounce timer. While a compile is running the
    /// request is remembered as a pending rerun instead.
    pub fn request_compile(&mut self, now: Instant) {
        if self.job.in_flight {
            self.job.pending_rerun = true;
        } else {
            self.job.deadline = Some(now + self.debounce);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.job.deadline
    }

    /// Marks the job in flight if its timer has fired.
    pub fn start_due(&mut self, now: Instant) -> bool {
        match self.job.deadline {
            Some(deadline) if deadline <= now && !self.job.in_flight => {
                self.job.deadline = None;
                self.job.in_flight = true;
                true
            }
            _ => false,
        }
    }

    /// Records the end of a compile. Returns true when a pending rerun re-armed
    /// the timer.
    pub fn finish(&mut self, now: Instant, succeeded: bool) -> bool {
        self.job.in_flight = false;
        if succeeded {
            self.job.compiled_once = true;
        }
        if self.job.pending_rerun {
            self.job.pending_rerun = false;
            self.job.deadline = Some(now + self.debounce);
            true
        } else {
            false
        }
    }

    /// True when no compile is running, queued or armed.
    pub fn is_quiet(&self) -> bool {
        !self.job.in_flight && !self.job.pending_rerun && self.job.deadline.is_none()
    }

    pub fn reset(&mut self) {
        self.job = CompilationJob::default();
    }
}

/// Inserted text is checked together with one character on each side so that
/// completing a delimiter such as `{` + `{` is caught.
fn introduces_directive_syntax(raw: &str, edits: &[TextEdit]) -> bool {
    let mut current = raw.to_string();
    for edit in edits {
        if contains_directive_syntax(&edit.text) {
            return true;
        }
        if let Some(range) = edit.range {
            let range = range.collapse_if_inverted();
            let start = offset_at(&current, range.start);
            let end = offset_at(&current, range.end).max(start);
            let before = current[..start].chars().next_back();
            let after = current[end..].chars().next();

            let mut window = String::with_capacity(edit.text.len() + 8);
            window.extend(before);
            window.push_str(&edit.text);
            window.extend(after);
            if contains_directive_syntax(&window) {
                return true;
            }
        }
        current = apply_edit(&current, edit);
    }
    false
}
