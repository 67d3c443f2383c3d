use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable unique identifier of a step or sub-step.
///
/// Predecessor relations are expressed as `StepId`s, never as owning
/// pointers: a relation is a lookup key into the chart's step collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A nested bar inside a step. Sub-steps share their parent's timeline and
/// never have predecessors of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubStep {
    pub uid: StepId,
    #[serde(default)]
    pub caption: String,
    pub start: f64,
    pub end: f64,
}

impl SubStep {
    pub fn new(uid: impl Into<StepId>, caption: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            uid: uid.into(),
            caption: caption.into(),
            start,
            end,
        }
    }
}

/// One task bar of the chart as the data model describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub uid: StepId,
    #[serde(default)]
    pub caption: String,
    /// Start of the step's range (a timestamp or a column index).
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub read_only: bool,
    /// The step this one is linked from, if any.
    #[serde(default)]
    pub predecessor: Option<StepId>,
    #[serde(default)]
    pub sub_steps: Vec<SubStep>,
}

impl Step {
    pub fn new(uid: impl Into<StepId>, caption: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            uid: uid.into(),
            caption: caption.into(),
            start,
            end,
            read_only: false,
            predecessor: None,
            sub_steps: Vec::new(),
        }
    }

    pub fn with_predecessor(mut self, predecessor: impl Into<StepId>) -> Self {
        self.predecessor = Some(predecessor.into());
        self
    }

    pub fn with_sub_step(mut self, sub_step: SubStep) -> Self {
        self.sub_steps.push(sub_step);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A whole chart as loaded from disk or received from the data model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartDocument {
    pub steps: Vec<Step>,
}

impl ChartDocument {
    /// Earliest start and latest end across all steps, or `None` when empty.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        if self.steps.is_empty() {
            return None;
        }
        let start = self
            .steps
            .iter()
            .map(|s| s.start)
            .fold(f64::INFINITY, f64::min);
        let end = self
            .steps
            .iter()
            .map(|s| s.end)
            .fold(f64::NEG_INFINITY, f64::max);
        Some((start, end))
    }
}
