//! Display layer — view models for the model table and the detail dialog.
//!
//! Views are pure functions of the catalog plus a `SweepState` snapshot;
//! the only mutable piece is `DetailDialog`, which owns its own re-probe
//! result slot and error explanation so it never races the sweep.

use serde::Serialize;

use crate::catalog::{
    format_context_window, format_context_window_full, BaselineStatus, Catalog, ModelDescriptor,
};
use crate::interpreter::Interpretation;
use crate::probe::ProbeOutcome;
use crate::sequencer::{SweepEntry, SweepState};

// ── Status Badges ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayStatus {
    Working,
    Blocked,
    QuotaExhausted,
    Error,
    Pending,
}

impl DisplayStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DisplayStatus::Working => "Working",
            DisplayStatus::Blocked => "Blocked",
            DisplayStatus::QuotaExhausted => "Quota exceeded",
            DisplayStatus::Error => "Error",
            DisplayStatus::Pending => "Checking...",
        }
    }

    pub fn animated(&self) -> bool {
        matches!(self, DisplayStatus::Pending)
    }
}

impl From<&ProbeOutcome> for DisplayStatus {
    fn from(o: &ProbeOutcome) -> Self {
        match o {
            ProbeOutcome::Working => DisplayStatus::Working,
            ProbeOutcome::Blocked(_) => DisplayStatus::Blocked,
            ProbeOutcome::QuotaExhausted(_) => DisplayStatus::QuotaExhausted,
            ProbeOutcome::Error(_) => DisplayStatus::Error,
        }
    }
}

impl From<BaselineStatus> for DisplayStatus {
    fn from(s: BaselineStatus) -> Self {
        match s {
            BaselineStatus::Working => DisplayStatus::Working,
            BaselineStatus::Blocked => DisplayStatus::Blocked,
            BaselineStatus::QuotaExhausted => DisplayStatus::QuotaExhausted,
        }
    }
}

/// Badge for a table row. Missing entries render as pending too.
pub fn display_status(entry: Option<&SweepEntry>) -> DisplayStatus {
    match entry {
        None | Some(SweepEntry::Pending) => DisplayStatus::Pending,
        Some(SweepEntry::Done(o)) => o.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub status: DisplayStatus,
    pub label: &'static str,
    pub animated: bool,
}

impl From<DisplayStatus> for Badge {
    fn from(status: DisplayStatus) -> Self {
        Self {
            status,
            label: status.label(),
            animated: status.animated(),
        }
    }
}

// ── Table ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Summary {
    /// No sweep has started (no key).
    Idle,
    Checking { completed: usize, total: usize },
    Done { working: usize, total: usize },
}

impl Summary {
    pub fn from_state(catalog: Catalog, state: &SweepState) -> Self {
        let total = catalog.len();
        if state.is_empty() {
            return Summary::Idle;
        }
        let completed = catalog
            .iter()
            .filter(|m| matches!(state.get(m.id), Some(SweepEntry::Done(_))))
            .count();
        if completed < total {
            return Summary::Checking { completed, total };
        }
        let working = catalog
            .iter()
            .filter(|m| {
                state
                    .get(m.id)
                    .and_then(SweepEntry::outcome)
                    .is_some_and(ProbeOutcome::is_working)
            })
            .count();
        Summary::Done { working, total }
    }

    /// Headline text for the table header.
    pub fn headline(&self) -> Option<String> {
        match self {
            Summary::Idle => None,
            Summary::Checking { completed, total } => {
                Some(format!("Checking models… {}/{}", completed, total))
            }
            Summary::Done { working, total } => Some(format!("{} working / {} total", working, total)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRow {
    pub id: &'static str,
    pub name: &'static str,
    pub model_type: &'static str,
    pub context_window: String,
    pub badge: Badge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub summary: Summary,
    pub headline: Option<String>,
    /// Refresh is offered only with a key and not while checking.
    pub refresh_enabled: bool,
    pub rows: Vec<ModelRow>,
}

pub fn table_view(catalog: Catalog, state: &SweepState, has_key: bool) -> TableView {
    let summary = Summary::from_state(catalog, state);
    let checking = matches!(summary, Summary::Checking { .. });
    let rows = catalog
        .iter()
        .map(|m| ModelRow {
            id: m.id,
            name: m.name,
            model_type: m.model_type.as_str(),
            context_window: format_context_window(m.context_window),
            badge: display_status(state.get(m.id)).into(),
        })
        .collect();

    TableView {
        headline: summary.headline(),
        summary,
        refresh_enabled: has_key && !checking,
        rows,
    }
}

// ── Detail Dialog ───────────────────────────────────────────────────

/// Explanation of the dialog's current error, as the user sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Explanation {
    /// Nothing to explain.
    None,
    /// Interpretation in flight; show a placeholder.
    Loading,
    Ready { message: String },
}

/// An in-flight re-probe, tied to the dialog instance that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetestTicket {
    generation: u64,
    pub model_id: &'static str,
}

/// One open detail dialog. Holds its own re-probe result and the
/// interpretation of whatever error it currently shows.
///
/// `generation` tells instances apart: a result started under one
/// instance is never written into a later one, even for the same model.
#[derive(Debug, Clone)]
pub struct DetailDialog {
    model: &'static ModelDescriptor,
    generation: u64,
    retest: Option<ProbeOutcome>,
    testing: bool,
    /// Raw error the explanation belongs to, plus the explanation.
    explained: Option<(String, Option<Interpretation>)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailView {
    pub id: &'static str,
    pub name: &'static str,
    pub model_type: &'static str,
    pub context_window: String,
    pub badge: Badge,
    /// Result of the dialog's own re-probe, if one ran.
    pub retest: Option<ProbeOutcome>,
    pub testing: bool,
    pub error: Option<String>,
    pub explanation: Explanation,
}

impl DetailDialog {
    pub fn open(model: &'static ModelDescriptor, generation: u64) -> Self {
        Self {
            model,
            generation,
            retest: None,
            testing: false,
            explained: None,
        }
    }

    pub fn model(&self) -> &'static ModelDescriptor {
        self.model
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The dialog's own result wins; otherwise the sweep's settled entry.
    pub fn effective_outcome<'a>(&'a self, sweep: Option<&'a SweepEntry>) -> Option<&'a ProbeOutcome> {
        self.retest.as_ref().or_else(|| sweep.and_then(SweepEntry::outcome))
    }

    /// The raw error currently on display, if any.
    pub fn current_error(&self, sweep: Option<&SweepEntry>) -> Option<String> {
        self.effective_outcome(sweep)
            .and_then(ProbeOutcome::reason)
            .map(str::to_string)
    }

    /// Mark a re-probe as in flight. `None` when one already is.
    pub fn begin_retest(&mut self) -> Option<RetestTicket> {
        if self.testing {
            return None;
        }
        self.testing = true;
        self.retest = None;
        Some(RetestTicket {
            generation: self.generation,
            model_id: self.model.id,
        })
    }

    /// Store a re-probe result, unless it was started by another dialog
    /// instance. Returns whether it was stored.
    pub fn finish_retest(&mut self, ticket: RetestTicket, outcome: ProbeOutcome) -> bool {
        if ticket.generation != self.generation || !self.testing {
            return false;
        }
        self.testing = false;
        self.retest = Some(outcome);
        true
    }

    /// Give up on an in-flight re-probe without a result.
    pub fn abandon_retest(&mut self, ticket: RetestTicket) {
        if ticket.generation == self.generation {
            self.testing = false;
        }
    }

    /// If `raw` still needs interpreting, claim it and return true. The
    /// caller then runs the interpreter and hands the result to
    /// `finish_explanation`.
    pub fn claim_explanation(&mut self, raw: &str) -> bool {
        match &self.explained {
            Some((current, _)) if current == raw => false,
            _ => {
                self.explained = Some((raw.to_string(), None));
                true
            }
        }
    }

    /// Store an interpretation, unless the dialog was replaced or moved on
    /// to a different error in the meantime.
    pub fn finish_explanation(
        &mut self,
        generation: u64,
        raw: &str,
        interpretation: Interpretation,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        match &mut self.explained {
            Some((current, slot)) if current == raw => {
                *slot = Some(interpretation);
                true
            }
            _ => false,
        }
    }

    pub fn view(&self, sweep: Option<&SweepEntry>) -> DetailView {
        let status: DisplayStatus = match self.effective_outcome(sweep) {
            Some(o) => o.into(),
            None => self.model.baseline_status.into(),
        };
        let error = self.current_error(sweep);
        let explanation = match (&error, &self.explained) {
            (None, _) => Explanation::None,
            (Some(raw), Some((current, Some(i)))) if raw == current => Explanation::Ready {
                message: i.message.clone(),
            },
            (Some(_), _) => Explanation::Loading,
        };

        DetailView {
            id: self.model.id,
            name: self.model.name,
            model_type: self.model.model_type.title(),
            context_window: format_context_window_full(self.model.context_window),
            badge: Badge::from(status),
            retest: self.retest.clone(),
            testing: self.testing,
            error,
            explanation,
        }
    }
}
