use steplink_protocol::{Point, StepId};
use thiserror::Error;

use crate::element::ElementId;

/// Collaborator interface violations. Everything the engine can recover from
/// locally is a [`SyncNotice`] instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unknown step `{0}`")]
    UnknownStep(StepId),
    #[error("step `{0}` already exists")]
    DuplicateStep(StepId),
    #[error("step `{uid}` has an invalid range {start}..{end}")]
    InvalidRange { uid: StepId, start: f64, end: f64 },
    #[error("element {0} does not belong to step `{1}`")]
    ForeignElement(ElementId, StepId),
    #[error("config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Recoverable conditions. They are logged and journaled, never returned as
/// errors from data-mutation calls.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncNotice {
    /// The predecessor uid does not resolve to a step in the chart; the
    /// owner is treated as having no predecessor.
    #[error("step `{owner}` references missing predecessor `{predecessor}`")]
    DanglingReference { owner: StepId, predecessor: StepId },
    /// Geometry was requested before `element` was attached and measurable.
    #[error("arrow of `{owner}` waits for element {element} to become ready")]
    NotReadyYet { owner: StepId, element: ElementId },
    /// A pointer event did not land on any element.
    #[error("no element under the pointer")]
    HitResolutionMiss { point: Option<Point> },
    /// A deferred predecessor update whose candidate was superseded.
    #[error("dropped stale predecessor update for `{owner}`")]
    StaleProposal {
        owner: StepId,
        candidate: Option<StepId>,
    },
    /// Following predecessors from `owner` leads back to `owner` (or exceeds
    /// the configured depth).
    #[error("predecessor chain of `{owner}` is cyclic")]
    PredecessorCycle { owner: StepId },
}
