use steplink_protocol::{Step, StepId, SubStep};

use crate::arrow::ArrowLink;
use crate::element::{ElementAllocator, ElementId};

/// One child of a step bar. Decorations always precede sub-steps.
#[derive(Debug, Clone)]
pub enum BarChild {
    Decoration(ElementId),
    SubStep(SubStepNode),
}

impl BarChild {
    pub fn element(&self) -> ElementId {
        match self {
            Self::Decoration(id) => *id,
            Self::SubStep(sub) => sub.element,
        }
    }

    pub fn as_sub_step(&self) -> Option<&SubStepNode> {
        match self {
            Self::SubStep(sub) => Some(sub),
            Self::Decoration(_) => None,
        }
    }
}

/// A sub-step bar, positioned relative to its parent bar.
#[derive(Debug, Clone)]
pub struct SubStepNode {
    data: SubStep,
    element: ElementId,
    left: f64,
    width: f64,
    width_updates: u32,
}

impl SubStepNode {
    fn new(data: SubStep, element: ElementId) -> Self {
        Self {
            data,
            element,
            left: 0.0,
            width: 0.0,
            width_updates: 0,
        }
    }

    pub fn uid(&self) -> &StepId {
        &self.data.uid
    }

    pub fn data(&self) -> &SubStep {
        &self.data
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Offset from the parent bar's left edge.
    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// How many width passes have positioned this sub-step.
    pub fn width_updates(&self) -> u32 {
        self.width_updates
    }

    /// Place the sub-step inside a parent spanning `parent_start..parent_end`
    /// that is `parent_width` wide on screen.
    pub(crate) fn update_width(&mut self, parent_start: f64, parent_end: f64, parent_width: f64) {
        let span = parent_end - parent_start;
        if span > 0.0 && parent_width > 0.0 {
            let scale = parent_width / span;
            let start = self.data.start.clamp(parent_start, parent_end);
            let end = self.data.end.clamp(start, parent_end);
            self.left = (start - parent_start) * scale;
            self.width = (end - start) * scale;
        } else {
            self.left = 0.0;
            self.width = parent_width.max(0.0);
        }
        self.width_updates += 1;
    }
}

/// A step in the chart tree.
///
/// `predecessor` is the relation as the data model states it. `linked` is the
/// relation currently applied to the visuals; it only changes once the step
/// is ready, and is always `None` when `predecessor` does not resolve.
#[derive(Debug)]
pub struct StepNode {
    uid: StepId,
    caption: String,
    start: f64,
    end: f64,
    read_only: bool,
    predecessor: Option<StepId>,
    element: ElementId,
    children: Vec<BarChild>,
    width: f64,
    linked: Option<StepId>,
    pub(crate) arrow: Option<ArrowLink>,
    has_sub_steps_marker: bool,
}

impl StepNode {
    pub(crate) fn new(step: Step, element: ElementId, alloc: &mut ElementAllocator) -> Self {
        let Step {
            uid,
            caption,
            start,
            end,
            read_only,
            predecessor,
            sub_steps,
        } = step;
        let children = sub_steps
            .into_iter()
            .map(|s| BarChild::SubStep(SubStepNode::new(s, alloc.allocate())))
            .collect();
        Self {
            uid,
            caption,
            start,
            end,
            read_only,
            predecessor,
            element,
            children,
            width: 0.0,
            linked: None,
            arrow: None,
            has_sub_steps_marker: false,
        }
    }

    pub fn uid(&self) -> &StepId {
        &self.uid
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub(crate) fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn predecessor(&self) -> Option<&StepId> {
        self.predecessor.as_ref()
    }

    pub(crate) fn set_predecessor(&mut self, predecessor: Option<StepId>) {
        self.predecessor = predecessor;
    }

    /// The predecessor currently drawn for this step.
    pub fn linked_predecessor(&self) -> Option<&StepId> {
        self.linked.as_ref()
    }

    pub(crate) fn set_linked_predecessor(&mut self, linked: Option<StepId>) {
        self.linked = linked;
    }

    /// The step bar element.
    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub(crate) fn set_width(&mut self, width: f64) {
        self.width = width.max(0.0);
    }

    pub fn arrow(&self) -> Option<&ArrowLink> {
        self.arrow.as_ref()
    }

    pub fn has_arrow(&self) -> bool {
        self.arrow.is_some()
    }

    pub fn children(&self) -> &[BarChild] {
        &self.children
    }

    /// Sub-steps in rendering order, skipping every other child kind.
    pub fn sub_steps(&self) -> Vec<&SubStepNode> {
        self.children.iter().filter_map(BarChild::as_sub_step).collect()
    }

    /// Number of children in front of the first sub-step. A raw child index
    /// minus this offset is a sub-step index.
    pub fn count_non_sub_step_children(&self) -> usize {
        self.children
            .iter()
            .filter(|c| matches!(c, BarChild::Decoration(_)))
            .count()
    }

    pub fn child_index_of(&self, element: ElementId) -> Option<usize> {
        self.children.iter().position(|c| c.element() == element)
    }

    /// Sub-step rendered at raw child position `index`, or `None` when the
    /// index is a decoration or out of range.
    pub fn sub_step_at_child_index(&self, index: usize) -> Option<&SubStepNode> {
        let sub_index = index.checked_sub(self.count_non_sub_step_children())?;
        self.sub_steps().get(sub_index).copied()
    }

    pub fn sub_step_by_element(&self, element: ElementId) -> Option<&SubStepNode> {
        self.sub_step_at_child_index(self.child_index_of(element)?)
    }

    pub fn step_uid_by_sub_step_element(&self, element: ElementId) -> Option<&StepId> {
        self.sub_step_by_element(element).map(SubStepNode::uid)
    }

    /// Whether the bar carries the "has sub-steps" marker.
    pub fn has_sub_steps_marker(&self) -> bool {
        self.has_sub_steps_marker
    }

    /// Recompute the marker from the sub-step list. Returns `true` if it
    /// changed.
    pub(crate) fn refresh_sub_step_marker(&mut self) -> bool {
        let present = self.children.iter().any(|c| c.as_sub_step().is_some());
        let changed = present != self.has_sub_steps_marker;
        self.has_sub_steps_marker = present;
        changed
    }

    /// Position every sub-step inside the current width, in list order.
    /// Returns the uids in the order they were updated.
    pub(crate) fn update_sub_step_widths(&mut self) -> Vec<StepId> {
        let (start, end, width) = (self.start, self.end, self.width);
        self.children
            .iter_mut()
            .filter_map(|c| match c {
                BarChild::SubStep(sub) => {
                    sub.update_width(start, end, width);
                    Some(sub.uid().clone())
                }
                BarChild::Decoration(_) => None,
            })
            .collect()
    }

    /// Replace the sub-step list. Returns the elements that were dropped.
    pub(crate) fn replace_sub_steps(
        &mut self,
        sub_steps: Vec<SubStep>,
        alloc: &mut ElementAllocator,
    ) -> Vec<ElementId> {
        let mut removed = Vec::new();
        self.children.retain(|c| match c {
            BarChild::SubStep(sub) => {
                removed.push(sub.element);
                false
            }
            BarChild::Decoration(_) => true,
        });
        self.children.extend(
            sub_steps
                .into_iter()
                .map(|s| BarChild::SubStep(SubStepNode::new(s, alloc.allocate()))),
        );
        removed
    }

    /// Add a decoration in front of the sub-steps.
    pub(crate) fn add_decoration(&mut self, element: ElementId) {
        let at = self.count_non_sub_step_children();
        self.children.insert(at, BarChild::Decoration(element));
    }

    pub(crate) fn remove_decoration(&mut self, element: ElementId) -> bool {
        let before = self.children.len();
        self.children
            .retain(|c| !matches!(c, BarChild::Decoration(id) if *id == element));
        self.children.len() != before
    }

    /// Every element owned by this step: the bar and all its children.
    pub fn elements(&self) -> Vec<ElementId> {
        std::iter::once(self.element)
            .chain(self.children.iter().map(BarChild::element))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with(sub_steps: usize, decorations: usize) -> StepNode {
        let mut alloc = ElementAllocator::default();
        let mut step = Step::new("s", "Step", 0.0, 100.0);
        for i in 0..sub_steps {
            let start = i as f64 * 10.0;
            step = step.with_sub_step(SubStep::new(format!("s.{i}"), "", start, start + 10.0));
        }
        let bar = alloc.allocate();
        let mut node = StepNode::new(step, bar, &mut alloc);
        for _ in 0..decorations {
            node.add_decoration(alloc.allocate());
        }
        node
    }

    #[test]
    fn sub_steps_skip_decorations() {
        let node = node_with(3, 2);
        let uids: Vec<_> = node.sub_steps().iter().map(|s| s.uid().to_string()).collect();
        assert_eq!(uids, vec!["s.0", "s.1", "s.2"]);
        assert_eq!(node.count_non_sub_step_children(), 2);
        assert_eq!(node.children().len(), 5);
    }

    #[test]
    fn child_index_round_trip() {
        let (k, n) = (2, 3);
        let node = node_with(n, k);
        for i in 0..n {
            let sub = node.sub_step_at_child_index(k + i).map(|s| s.uid().to_string());
            assert_eq!(sub, Some(format!("s.{i}")));
        }
        for index in 0..k {
            assert!(node.sub_step_at_child_index(index).is_none());
        }
        assert!(node.sub_step_at_child_index(k + n).is_none());
        assert!(node.sub_step_at_child_index(usize::MAX).is_none());
    }

    #[test]
    fn offset_follows_decoration_changes() {
        let mut node = node_with(2, 1);
        let first_sub = node.sub_steps()[0].element();
        assert_eq!(node.child_index_of(first_sub), Some(1));

        let extra = ElementId::from_raw(999);
        node.add_decoration(extra);
        assert_eq!(node.child_index_of(first_sub), Some(2));
        assert_eq!(node.step_uid_by_sub_step_element(first_sub).map(StepId::as_str), Some("s.0"));

        assert!(node.remove_decoration(extra));
        assert!(!node.remove_decoration(extra));
        assert_eq!(node.count_non_sub_step_children(), 1);
        assert_eq!(node.step_uid_by_sub_step_element(first_sub).map(StepId::as_str), Some("s.0"));
    }

    #[test]
    fn decorations_do_not_resolve_to_sub_steps() {
        let node = node_with(1, 1);
        let decoration = node.children()[0].element();
        assert!(node.sub_step_by_element(decoration).is_none());
        assert!(node.sub_step_by_element(node.element()).is_none());
    }

    #[test]
    fn marker_tracks_sub_step_list() {
        let mut node = node_with(0, 1);
        assert!(!node.refresh_sub_step_marker());
        assert!(!node.has_sub_steps_marker());

        let mut alloc = ElementAllocator::default();
        node.replace_sub_steps(vec![SubStep::new("x", "", 0.0, 1.0)], &mut alloc);
        assert!(node.refresh_sub_step_marker());
        assert!(node.has_sub_steps_marker());

        let removed = node.replace_sub_steps(Vec::new(), &mut alloc);
        assert_eq!(removed.len(), 1);
        assert!(node.refresh_sub_step_marker());
        assert!(!node.has_sub_steps_marker());
    }

    #[test]
    fn sub_step_widths_scale_with_parent() {
        let mut node = node_with(3, 0);
        node.set_width(200.0);
        let order = node.update_sub_step_widths();
        assert_eq!(order.len(), 3);

        let subs = node.sub_steps();
        assert!((subs[1].left() - 20.0).abs() < 1e-9);
        assert!((subs[1].width() - 20.0).abs() < 1e-9);
        assert!(subs.iter().all(|s| s.width_updates() == 1));
    }

    #[test]
    fn sub_step_outside_parent_range_is_clamped() {
        let mut sub = SubStepNode::new(SubStep::new("x", "", -5.0, 500.0), ElementId::from_raw(1));
        sub.update_width(0.0, 100.0, 50.0);
        assert!(sub.left().abs() < 1e-9);
        assert!((sub.width() - 50.0).abs() < 1e-9);
    }
}
