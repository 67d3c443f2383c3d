use serde::{Deserialize, Serialize};
use steplink_protocol::{Point, Rect};

use crate::element::ElementId;
use crate::layout::Layout;

/// Horizontal direction of an arrow, tail to head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// The head lies at or right of the tail.
    Forward,
    /// The target starts before the predecessor ends; the path detours.
    Backward,
}

/// Placement of an arrow: its containing box in viewport coordinates and the
/// endpoints relative to that box's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrowGeometry {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    /// Tail, on the predecessor's right edge.
    pub start: Point,
    /// Head, on the dependent's left edge.
    pub end: Point,
    pub orientation: Orientation,
    pub padding: f64,
}

impl ArrowGeometry {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.left, self.top, self.width, self.height)
    }

    pub fn absolute_start(&self) -> Point {
        self.start.translate(self.left, self.top)
    }

    pub fn absolute_end(&self) -> Point {
        self.end.translate(self.left, self.top)
    }

    /// Orthogonal route from tail to head, relative to the containing box.
    pub fn path(&self) -> Vec<Point> {
        let (s, e) = (self.start, self.end);
        match self.orientation {
            Orientation::Forward => {
                let elbow_x = s.x + (e.x - s.x) / 2.0;
                vec![s, Point::new(elbow_x, s.y), Point::new(elbow_x, e.y), e]
            }
            Orientation::Backward => {
                // Leave to the right, cross between the rows, enter from the left.
                let mid_y = if (s.y - e.y).abs() < f64::EPSILON {
                    s.y + self.padding
                } else {
                    (s.y + e.y) / 2.0
                };
                let out_x = s.x + self.padding;
                let in_x = e.x - self.padding;
                vec![
                    s,
                    Point::new(out_x, s.y),
                    Point::new(out_x, mid_y),
                    Point::new(in_x, mid_y),
                    Point::new(in_x, e.y),
                    e,
                ]
            }
        }
    }

    /// `path` in viewport coordinates.
    pub fn absolute_path(&self) -> Vec<Point> {
        self.path()
            .into_iter()
            .map(|p| p.translate(self.left, self.top))
            .collect()
    }
}

/// Computes arrow geometry from two measured boxes. Holds no state between
/// calls, so a stale measurement can never leak into a later result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowGeometryResolver {
    padding: f64,
}

impl Default for ArrowGeometryResolver {
    fn default() -> Self {
        Self::new(8.0)
    }
}

impl ArrowGeometryResolver {
    pub fn new(padding: f64) -> Self {
        Self {
            padding: padding.max(0.0),
        }
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    /// Geometry of an arrow from `source` (predecessor bar) to `target`
    /// (dependent bar). `None` when either box is not measurable yet.
    pub fn compute(&self, source: Rect, target: Rect) -> Option<ArrowGeometry> {
        if !source.has_area() || !target.has_area() {
            return None;
        }

        let tail = Point::new(source.right(), source.center_y());
        let head = Point::new(target.x, target.center_y());
        let bounds = Rect::spanning(tail, head).inflate(self.padding);
        if !bounds.has_area() {
            return None;
        }

        let orientation = if head.x >= tail.x {
            Orientation::Forward
        } else {
            Orientation::Backward
        };

        Some(ArrowGeometry {
            top: bounds.y,
            left: bounds.x,
            width: bounds.w,
            height: bounds.h,
            start: tail.translate(-bounds.x, -bounds.y),
            end: head.translate(-bounds.x, -bounds.y),
            orientation,
            padding: self.padding,
        })
    }

    /// Measure both elements through `layout` and compute. `None` unless
    /// both are ready.
    pub fn resolve(
        &self,
        layout: &impl Layout,
        source: ElementId,
        target: ElementId,
    ) -> Option<ArrowGeometry> {
        if !layout.is_ready(source) || !layout.is_ready(target) {
            return None;
        }
        self.compute(layout.bounding_box(source)?, layout.bounding_box(target)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutSurface;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn forward_arrow_spans_both_anchors() {
        let resolver = ArrowGeometryResolver::new(4.0);
        let source = Rect::new(0.0, 0.0, 100.0, 20.0);
        let target = Rect::new(150.0, 40.0, 50.0, 20.0);
        let g = resolver.compute(source, target).expect("measurable boxes");

        assert_eq!(g.orientation, Orientation::Forward);
        assert!(approx(g.left, 96.0));
        assert!(approx(g.top, 6.0));
        assert!(approx(g.width, 58.0));
        assert!(approx(g.height, 48.0));
        assert_eq!(g.absolute_start(), Point::new(100.0, 10.0));
        assert_eq!(g.absolute_end(), Point::new(150.0, 50.0));
        assert_eq!(g.start, Point::new(4.0, 4.0));
    }

    #[test]
    fn backward_arrow_detours_inside_its_box() {
        let resolver = ArrowGeometryResolver::new(5.0);
        let source = Rect::new(50.0, 0.0, 100.0, 10.0);
        let target = Rect::new(20.0, 30.0, 40.0, 10.0);
        let g = resolver.compute(source, target).expect("measurable boxes");

        assert_eq!(g.orientation, Orientation::Backward);
        let path = g.path();
        assert_eq!(path.first(), Some(&g.start));
        assert_eq!(path.last(), Some(&g.end));
        let bounds = Rect::new(0.0, 0.0, g.width, g.height);
        for p in &path {
            assert!(p.x >= 0.0 && p.x <= bounds.w, "{p:?} outside {bounds:?}");
            assert!(p.y >= 0.0 && p.y <= bounds.h, "{p:?} outside {bounds:?}");
        }
    }

    #[test]
    fn same_row_arrow_still_has_height() {
        let resolver = ArrowGeometryResolver::new(3.0);
        let g = resolver
            .compute(
                Rect::new(0.0, 0.0, 10.0, 10.0),
                Rect::new(20.0, 0.0, 10.0, 10.0),
            )
            .expect("measurable boxes");
        assert!(approx(g.height, 6.0));
        assert!(g.bounds().has_area());
    }

    #[test]
    fn zero_sized_boxes_are_not_computable() {
        let resolver = ArrowGeometryResolver::default();
        let real = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(resolver.compute(Rect::new(0.0, 0.0, 0.0, 0.0), real).is_none());
        assert!(resolver.compute(real, Rect::new(5.0, 5.0, 10.0, 0.0)).is_none());
    }

    #[test]
    fn zero_padding_on_touching_anchors_is_not_computable() {
        // Tail and head coincide: the containing box would collapse.
        let resolver = ArrowGeometryResolver::new(0.0);
        assert!(
            resolver
                .compute(
                    Rect::new(0.0, 0.0, 10.0, 10.0),
                    Rect::new(10.0, 0.0, 10.0, 10.0)
                )
                .is_none()
        );
    }

    #[test]
    fn compute_is_pure() {
        let resolver = ArrowGeometryResolver::new(4.0);
        let a = Rect::new(0.0, 0.0, 30.0, 10.0);
        let b = Rect::new(40.0, 20.0, 30.0, 10.0);
        assert_eq!(resolver.compute(a, b), resolver.compute(a, b));
    }

    #[test]
    fn resolve_waits_for_readiness() {
        let resolver = ArrowGeometryResolver::new(4.0);
        let mut surface = LayoutSurface::new();
        let s = ElementId::from_raw(1);
        let t = ElementId::from_raw(2);
        surface.place(s, Rect::new(0.0, 0.0, 30.0, 10.0));
        assert!(resolver.resolve(&surface, s, t).is_none());

        surface.place(t, Rect::new(40.0, 20.0, 30.0, 10.0));
        assert!(resolver.resolve(&surface, s, t).is_some());
    }
}
