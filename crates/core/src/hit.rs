use serde::{Deserialize, Serialize};
use steplink_protocol::{Point, StepId};

use crate::arrow::Endpoint;
use crate::element::ElementId;
use crate::layout::Layout;

/// A raw pointer event in viewport coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Mouse { client_x: f64, client_y: f64 },
    /// `touches` are the active contacts; on touch end they are empty and
    /// the lifted contact is only in `changed_touches`.
    Touch {
        touches: Vec<Point>,
        changed_touches: Vec<Point>,
    },
}

impl PointerEvent {
    pub fn mouse(x: f64, y: f64) -> Self {
        Self::Mouse {
            client_x: x,
            client_y: y,
        }
    }

    pub fn touch(x: f64, y: f64) -> Self {
        Self::Touch {
            touches: vec![Point::new(x, y)],
            changed_touches: vec![Point::new(x, y)],
        }
    }

    pub fn touch_end(x: f64, y: f64) -> Self {
        Self::Touch {
            touches: Vec::new(),
            changed_touches: vec![Point::new(x, y)],
        }
    }

    /// Client coordinates of the mouse or of the first touch contact.
    pub fn client_point(&self) -> Option<Point> {
        match self {
            Self::Mouse { client_x, client_y } => Some(Point::new(*client_x, *client_y)),
            Self::Touch {
                touches,
                changed_touches,
            } => touches.first().or_else(|| changed_touches.first()).copied(),
        }
    }
}

/// Maps viewport coordinates to the element under the pointer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HitResolver;

impl HitResolver {
    /// Topmost element at `point` that `skip` does not exclude.
    pub fn element_at(
        &self,
        layout: &impl Layout,
        point: Point,
        skip: impl Fn(ElementId) -> bool,
    ) -> Option<ElementId> {
        layout.elements_at(point).into_iter().find(|e| !skip(*e))
    }

    pub fn resolve(
        &self,
        layout: &impl Layout,
        event: &PointerEvent,
        skip: impl Fn(ElementId) -> bool,
    ) -> Option<ElementId> {
        self.element_at(layout, event.client_point()?, skip)
    }
}

/// A request to change a predecessor relation by dragging an arrow endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelinkProposal {
    /// Owner of the dragged arrow.
    pub owner: StepId,
    /// The predecessor the arrow currently starts from.
    pub predecessor: StepId,
    pub endpoint: Endpoint,
    /// Element under the pointer.
    pub target: ElementId,
    /// Step or sub-step `target` belongs to, if any.
    pub target_step: Option<StepId>,
}

/// Receives relink proposals; typically forwards them to the data model.
pub trait RelinkHandler {
    /// Returns whether the proposal was accepted.
    fn on_relation_selected(&mut self, proposal: &RelinkProposal) -> bool;
}

impl<F> RelinkHandler for F
where
    F: FnMut(&RelinkProposal) -> bool,
{
    fn on_relation_selected(&mut self, proposal: &RelinkProposal) -> bool {
        self(proposal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelinkOutcome {
    /// No drag in progress.
    Idle,
    /// Nothing under the pointer; the drag continues unchanged.
    Missed,
    Rejected,
    Accepted,
}
