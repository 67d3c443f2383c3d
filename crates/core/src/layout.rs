use indexmap::IndexMap;
use steplink_protocol::{Point, Rect};

use crate::element::ElementId;

/// Layout and measurement collaborator.
///
/// Answers must reflect post-layout reality. Before an element is first
/// attached its box is undefined and `bounding_box` returns `None`.
pub trait Layout {
    /// Attached and measurable (non-zero layout box).
    fn is_ready(&self, element: ElementId) -> bool;

    fn bounding_box(&self, element: ElementId) -> Option<Rect>;

    /// Elements whose box contains `point`, topmost first.
    fn elements_at(&self, point: Point) -> Vec<ElementId>;
}

/// In-memory layout: a z-ordered set of attached element boxes. Elements
/// placed later are drawn on top.
#[derive(Debug, Default)]
pub struct LayoutSurface {
    boxes: IndexMap<ElementId, Rect>,
}

impl LayoutSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `element` with `rect`, or move an attached element without
    /// changing its stacking order.
    pub fn place(&mut self, element: ElementId, rect: Rect) {
        self.boxes.insert(element, rect);
    }

    pub fn remove(&mut self, element: ElementId) -> Option<Rect> {
        self.boxes.shift_remove(&element)
    }

    pub fn is_attached(&self, element: ElementId) -> bool {
        self.boxes.contains_key(&element)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

impl Layout for LayoutSurface {
    fn is_ready(&self, element: ElementId) -> bool {
        self.boxes.get(&element).is_some_and(Rect::has_area)
    }

    fn bounding_box(&self, element: ElementId) -> Option<Rect> {
        self.boxes.get(&element).copied()
    }

    fn elements_at(&self, point: Point) -> Vec<ElementId> {
        self.boxes
            .iter()
            .rev()
            .filter(|(_, rect)| rect.contains(point))
            .map(|(id, _)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ElementId = ElementId::from_raw(1);
    const B: ElementId = ElementId::from_raw(2);

    #[test]
    fn readiness_requires_a_measurable_box() {
        let mut surface = LayoutSurface::new();
        assert!(!surface.is_ready(A));
        assert!(surface.bounding_box(A).is_none());

        surface.place(A, Rect::new(0.0, 0.0, 0.0, 10.0));
        assert!(surface.is_attached(A));
        assert!(!surface.is_ready(A));

        surface.place(A, Rect::new(0.0, 0.0, 5.0, 10.0));
        assert!(surface.is_ready(A));
    }

    #[test]
    fn elements_at_lists_topmost_first() {
        let mut surface = LayoutSurface::new();
        surface.place(A, Rect::new(0.0, 0.0, 10.0, 10.0));
        surface.place(B, Rect::new(5.0, 5.0, 10.0, 10.0));
        assert_eq!(surface.elements_at(Point::new(6.0, 6.0)), vec![B, A]);
        assert_eq!(surface.elements_at(Point::new(1.0, 1.0)), vec![A]);
        assert!(surface.elements_at(Point::new(50.0, 50.0)).is_empty());

        // Moving keeps the stacking order.
        surface.place(A, Rect::new(4.0, 4.0, 10.0, 10.0));
        assert_eq!(surface.elements_at(Point::new(6.0, 6.0)), vec![B, A]);
    }

    #[test]
    fn remove_detaches() {
        let mut surface = LayoutSurface::new();
        surface.place(A, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(surface.remove(A).is_some());
        assert!(!surface.is_ready(A));
        assert!(surface.is_empty());
    }
}
