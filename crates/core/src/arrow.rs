use serde::{Deserialize, Serialize};
use steplink_protocol::{Point, StepId};
use tracing::trace;

use crate::element::ElementId;
use crate::geometry::{ArrowGeometry, ArrowGeometryResolver};
use crate::layout::Layout;
use crate::render_tree::RenderTree;

/// Which end of an arrow the user grabbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endpoint {
    /// The tail, anchored on the predecessor.
    Start,
    /// The head, anchored on the owning step.
    End,
}

/// Lifecycle of an existing link. A step without a resolvable predecessor
/// has no link at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// Created, but its element is not registered into the render tree yet.
    Pending,
    /// Registered; geometry is applied whenever it can be computed.
    Linked,
}

/// An in-progress endpoint drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub endpoint: Endpoint,
    /// Last pointer position seen during the drag.
    pub pointer: Option<Point>,
}

/// The arrow from a step's predecessor into the step.
#[derive(Debug, Clone)]
pub struct ArrowLink {
    owner: StepId,
    source: StepId,
    element: ElementId,
    state: LinkState,
    geometry: Option<ArrowGeometry>,
    read_only: bool,
    handlers_wired: bool,
    drag: Option<DragState>,
}

impl ArrowLink {
    pub(crate) fn new(owner: StepId, source: StepId, element: ElementId) -> Self {
        Self {
            owner,
            source,
            element,
            state: LinkState::Pending,
            geometry: None,
            read_only: false,
            handlers_wired: false,
            drag: None,
        }
    }

    /// The dependent step the arrow points into.
    pub fn owner(&self) -> &StepId {
        &self.owner
    }

    /// The predecessor the arrow starts from.
    pub fn source(&self) -> &StepId {
        &self.source
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_linked(&self) -> bool {
        self.state == LinkState::Linked
    }

    pub fn geometry(&self) -> Option<&ArrowGeometry> {
        self.geometry.as_ref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn handlers_wired(&self) -> bool {
        self.handlers_wired
    }

    pub fn drag(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    /// Point the arrow at a different predecessor. The old geometry no
    /// longer describes it.
    pub(crate) fn retarget(&mut self, source: StepId) {
        if self.source != source {
            self.source = source;
            self.geometry = None;
            self.drag = None;
        }
    }

    /// Register into the render tree. Returns `false` if already linked.
    pub fn attach(&mut self, tree: &mut impl RenderTree) -> bool {
        if self.state == LinkState::Linked {
            return false;
        }
        tree.register_content_element(self.element);
        self.state = LinkState::Linked;
        true
    }

    /// Unregister from the render tree. Returns `false` if not linked.
    pub fn detach(&mut self, tree: &mut impl RenderTree) -> bool {
        if self.state == LinkState::Pending {
            return false;
        }
        tree.unregister_content_element(self.element);
        self.state = LinkState::Pending;
        self.drag = None;
        true
    }

    /// Recompute geometry from the current boxes of `source` and `target`
    /// and apply it. When either is not measurable the previous geometry is
    /// kept and `None` is returned.
    pub fn redraw(
        &mut self,
        resolver: &ArrowGeometryResolver,
        layout: &impl Layout,
        source: ElementId,
        target: ElementId,
    ) -> Option<ArrowGeometry> {
        let geometry = resolver.resolve(layout, source, target)?;
        trace!(owner = %self.owner, ?geometry, "arrow redrawn");
        self.geometry = Some(geometry);
        Some(geometry)
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
        if read_only {
            self.drag = None;
        }
    }

    pub(crate) fn wire_handlers(&mut self) {
        self.handlers_wired = true;
    }

    /// Whether endpoint dragging is currently possible.
    pub fn is_interactive(&self) -> bool {
        self.is_linked() && self.handlers_wired && !self.read_only && self.geometry.is_some()
    }

    /// Endpoint handle within `radius` of `point`, preferring the head.
    pub fn handle_at(&self, point: Point, radius: f64) -> Option<Endpoint> {
        if !self.is_interactive() {
            return None;
        }
        let geometry = self.geometry.as_ref()?;
        if geometry.absolute_end().distance_to(point) <= radius {
            Some(Endpoint::End)
        } else if geometry.absolute_start().distance_to(point) <= radius {
            Some(Endpoint::Start)
        } else {
            None
        }
    }

    pub(crate) fn begin_drag(&mut self, endpoint: Endpoint) -> bool {
        if !self.is_interactive() {
            return false;
        }
        self.drag = Some(DragState {
            endpoint,
            pointer: None,
        });
        true
    }

    pub(crate) fn drag_to(&mut self, point: Point) {
        if let Some(drag) = self.drag.as_mut() {
            drag.pointer = Some(point);
        }
    }

    pub(crate) fn end_drag(&mut self) -> Option<DragState> {
        self.drag.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutSurface;
    use crate::render_tree::ContentLayer;
    use steplink_protocol::Rect;

    const SOURCE: ElementId = ElementId::from_raw(1);
    const TARGET: ElementId = ElementId::from_raw(2);
    const ARROW: ElementId = ElementId::from_raw(3);

    fn surface() -> LayoutSurface {
        let mut surface = LayoutSurface::new();
        surface.place(SOURCE, Rect::new(0.0, 0.0, 50.0, 10.0));
        surface.place(TARGET, Rect::new(80.0, 20.0, 50.0, 10.0));
        surface
    }

    fn linked_arrow(surface: &LayoutSurface, layer: &mut ContentLayer) -> ArrowLink {
        let mut arrow = ArrowLink::new(StepId::from("b"), StepId::from("a"), ARROW);
        arrow.wire_handlers();
        arrow.attach(layer);
        arrow.redraw(&ArrowGeometryResolver::new(4.0), surface, SOURCE, TARGET);
        arrow
    }

    #[test]
    fn attach_is_idempotent() {
        let mut layer = ContentLayer::new();
        let mut arrow = ArrowLink::new(StepId::from("b"), StepId::from("a"), ARROW);
        assert_eq!(arrow.state(), LinkState::Pending);
        assert!(arrow.attach(&mut layer));
        assert!(!arrow.attach(&mut layer));
        assert_eq!(layer.len(), 1);

        assert!(arrow.detach(&mut layer));
        assert!(!arrow.detach(&mut layer));
        assert!(layer.is_empty());
        assert_eq!(arrow.state(), LinkState::Pending);
    }

    #[test]
    fn redraw_twice_yields_identical_geometry() {
        let surface = surface();
        let resolver = ArrowGeometryResolver::new(4.0);
        let mut arrow = ArrowLink::new(StepId::from("b"), StepId::from("a"), ARROW);
        let first = arrow.redraw(&resolver, &surface, SOURCE, TARGET);
        let second = arrow.redraw(&resolver, &surface, SOURCE, TARGET);
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(arrow.geometry().copied(), second);
    }

    #[test]
    fn redraw_keeps_geometry_when_not_ready() {
        let mut surface = surface();
        let resolver = ArrowGeometryResolver::new(4.0);
        let mut arrow = ArrowLink::new(StepId::from("b"), StepId::from("a"), ARROW);
        let before = arrow.redraw(&resolver, &surface, SOURCE, TARGET);

        surface.place(SOURCE, Rect::new(0.0, 0.0, 0.0, 0.0));
        assert!(arrow.redraw(&resolver, &surface, SOURCE, TARGET).is_none());
        assert_eq!(arrow.geometry().copied(), before);
    }

    #[test]
    fn handles_sit_on_the_endpoints() {
        let surface = surface();
        let mut layer = ContentLayer::new();
        let arrow = linked_arrow(&surface, &mut layer);

        assert_eq!(arrow.handle_at(Point::new(80.0, 25.0), 3.0), Some(Endpoint::End));
        assert_eq!(arrow.handle_at(Point::new(51.0, 5.0), 3.0), Some(Endpoint::Start));
        assert_eq!(arrow.handle_at(Point::new(65.0, 15.0), 3.0), None);
    }

    #[test]
    fn read_only_arrows_cannot_be_dragged() {
        let surface = surface();
        let mut layer = ContentLayer::new();
        let mut arrow = linked_arrow(&surface, &mut layer);

        assert!(arrow.begin_drag(Endpoint::End));
        arrow.set_read_only(true);
        assert!(arrow.drag().is_none());
        assert!(!arrow.begin_drag(Endpoint::End));
        assert_eq!(arrow.handle_at(Point::new(80.0, 25.0), 3.0), None);
    }

    #[test]
    fn retarget_drops_stale_geometry() {
        let surface = surface();
        let mut layer = ContentLayer::new();
        let mut arrow = linked_arrow(&surface, &mut layer);
        arrow.retarget(StepId::from("a"));
        assert!(arrow.geometry().is_some());
        arrow.retarget(StepId::from("z"));
        assert!(arrow.geometry().is_none());
        assert_eq!(arrow.source().as_str(), "z");
    }
}
