//! The UI shell around the sync engine: lays bars out in rows, reports
//! attach and resize notifications, gives arrow elements a box once they are
//! created, and turns accepted relink proposals into data-model changes.

use std::collections::HashSet;

use anyhow::Result;
use steplink_core::views::render_chart;
use steplink_core::{
    ArrowLink, ContentLayer, Endpoint, LayoutSurface, PointerEvent, RelationSyncController,
    RelinkOutcome, RelinkProposal, StepNode, SyncConfig, SyncEvent,
};
use steplink_protocol::{ChartDocument, Rect, RenderCommand, Step, StepId, Viewport};
use tracing::{debug, info, warn};

type Controller = RelationSyncController<LayoutSurface, ContentLayer>;

/// Row geometry in the units of the target surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub row_pitch: f64,
    pub bar_height: f64,
    /// Space left of the timeline for row labels.
    pub gutter: f64,
}

impl Metrics {
    pub const PIXELS: Self = Self {
        row_pitch: 30.0,
        bar_height: 20.0,
        gutter: 120.0,
    };
    pub const CELLS: Self = Self {
        row_pitch: 2.0,
        bar_height: 1.0,
        gutter: 10.0,
    };
}

pub struct Shell {
    sync: Controller,
    rows: Vec<StepId>,
    range: (f64, f64),
    selected: usize,
    status: String,
}

impl Shell {
    pub fn load(config: SyncConfig, steps: Vec<Step>) -> Result<Self> {
        let doc = ChartDocument { steps };
        let range = doc.time_range().unwrap_or((0.0, 1.0));
        let mut sync =
            RelationSyncController::with_config(config, LayoutSurface::new(), ContentLayer::new());
        let mut rows = Vec::with_capacity(doc.steps.len());
        for step in doc.steps {
            rows.push(step.uid.clone());
            sync.add_step(step)?;
        }
        Ok(Self {
            sync,
            rows,
            range,
            selected: 0,
            status: String::new(),
        })
    }

    pub fn controller(&self) -> &Controller {
        &self.sync
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn rows(&self) -> &[StepId] {
        &self.rows
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn arrow_count(&self) -> usize {
        self.sync
            .chart()
            .steps()
            .filter(|n| n.arrow().is_some_and(ArrowLink::is_linked))
            .count()
    }

    /// Place every bar for a surface `width` wide and report the result.
    pub fn lay_out(&mut self, width: f64, metrics: Metrics) {
        let (start, end) = self.range;
        let span = (end - start).max(f64::EPSILON);
        let scale = (width - metrics.gutter - 1.0).max(1.0) / span;

        for (index, uid) in self.rows.clone().iter().enumerate() {
            let Some(node) = self.sync.step(uid) else {
                continue;
            };
            let element = node.element();
            let rect = Rect::new(
                metrics.gutter + (node.start() - start) * scale,
                index as f64 * metrics.row_pitch,
                ((node.end() - node.start()) * scale).max(1.0),
                metrics.bar_height,
            );

            let attached = self.sync.layout().is_attached(element);
            self.sync.layout_mut().place(element, rect);
            if attached {
                self.sync.on_layout_changed(element);
            } else {
                self.sync.on_attach(element);
            }
            if let Err(err) = self.sync.update_width(uid, rect.w) {
                warn!(%uid, %err, "width update failed");
            }
            self.settle();
        }
    }

    /// Process the engine's journal until it is quiet. New arrows get their
    /// element attached; removed ones are dropped from the layout.
    fn settle(&mut self) {
        loop {
            let events = self.sync.take_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                match event {
                    SyncEvent::ArrowCreated { owner, element, .. } => {
                        debug!(%owner, %element, "attaching arrow element");
                        self.sync
                            .layout_mut()
                            .place(element, Rect::new(0.0, 0.0, 1.0, 1.0));
                        self.sync.on_attach(element);
                    }
                    SyncEvent::ArrowRemoved { element, .. } => {
                        self.sync.layout_mut().remove(element);
                    }
                    SyncEvent::Notice(notice) => self.status = notice.to_string(),
                    _ => {}
                }
            }
        }
    }

    pub fn commands(&self, width: f64, height: f64) -> Vec<RenderCommand> {
        render_chart(
            self.sync.chart(),
            self.sync.layout(),
            &Viewport::new(width, height),
        )
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.rows.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn toggle_read_only(&mut self) {
        let Some(uid) = self.rows.get(self.selected).cloned() else {
            return;
        };
        let read_only = self.sync.step(&uid).is_some_and(StepNode::is_read_only);
        if let Err(err) = self.sync.set_read_only(&uid, !read_only) {
            warn!(%uid, %err, "read-only toggle failed");
        }
        self.status = format!("{uid} read-only: {}", !read_only);
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        if let Some((owner, endpoint)) = self.sync.pointer_down(&PointerEvent::mouse(x, y)) {
            self.status = format!("dragging {endpoint:?} of {owner}");
        }
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> RelinkOutcome {
        self.relink(x, y, false)
    }

    pub fn pointer_up(&mut self, x: f64, y: f64) -> RelinkOutcome {
        self.relink(x, y, true)
    }

    pub fn cancel_drag(&mut self) {
        if self.sync.cancel_drag() {
            self.status = "drag cancelled".to_string();
        }
    }

    fn relink(&mut self, x: f64, y: f64, release: bool) -> RelinkOutcome {
        let steps: HashSet<StepId> = self.rows.iter().cloned().collect();
        let mut accepted = None;
        let mut handler = |p: &RelinkProposal| {
            let ok = is_valid(p, &steps);
            if ok {
                accepted = Some(p.clone());
            }
            ok
        };

        let event = PointerEvent::mouse(x, y);
        let outcome = if release {
            self.sync.pointer_end(&event, &mut handler)
        } else {
            self.sync.pointer_move(&event, &mut handler)
        };
        if let Some(proposal) = accepted {
            self.apply(&proposal);
        }
        self.settle();
        outcome
    }

    /// Write an accepted proposal back as predecessor changes. Dragging the
    /// tail moves the owner onto a new predecessor; dragging the head hands
    /// the predecessor over to the target step.
    fn apply(&mut self, proposal: &RelinkProposal) {
        let Some(target) = proposal.target_step.clone() else {
            return;
        };
        let result = match proposal.endpoint {
            Endpoint::Start => self.sync.set_predecessor(&proposal.owner, Some(target.clone())),
            Endpoint::End => self
                .sync
                .set_predecessor(&proposal.owner, None)
                .and_then(|()| {
                    self.sync
                        .set_predecessor(&target, Some(proposal.predecessor.clone()))
                }),
        };
        match result {
            Ok(()) => {
                info!(owner = %proposal.owner, %target, endpoint = ?proposal.endpoint, "relinked");
                self.status = format!("relinked {} via {target}", proposal.owner);
            }
            Err(err) => warn!(%err, "relink failed"),
        }
    }
}

/// A proposal must land on another whole step of this chart.
fn is_valid(proposal: &RelinkProposal, steps: &HashSet<StepId>) -> bool {
    let Some(target) = &proposal.target_step else {
        return false;
    };
    steps.contains(target) && target != &proposal.owner && target != &proposal.predecessor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> Shell {
        let steps = vec![
            Step::new("a", "A", 0.0, 2.0),
            Step::new("b", "B", 2.0, 4.0).with_predecessor("a"),
            Step::new("c", "C", 0.0, 2.0),
        ];
        let mut shell = Shell::load(SyncConfig::default(), steps).expect("valid chart");
        shell.lay_out(400.0, Metrics::PIXELS);
        shell
    }

    fn source_of(shell: &Shell, uid: &str) -> Option<StepId> {
        shell
            .controller()
            .arrow(&StepId::from(uid))
            .map(|a| a.source().clone())
    }

    #[test]
    fn layout_links_arrows() {
        let shell = shell();
        assert_eq!(shell.arrow_count(), 1);
        assert_eq!(source_of(&shell, "b"), Some(StepId::from("a")));
        assert!(shell.commands(400.0, 200.0).iter().any(|c| matches!(
            c,
            RenderCommand::DrawPolyline { head: true, .. }
        )));
    }

    #[test]
    fn dragging_the_tail_moves_the_predecessor() {
        let mut shell = shell();
        // Tail sits on a's right edge at x = 120 + 2 * 69.75.
        shell.pointer_down(259.5, 10.0);
        assert_eq!(shell.pointer_up(150.0, 70.0), RelinkOutcome::Accepted);
        assert_eq!(source_of(&shell, "b"), Some(StepId::from("c")));
        assert_eq!(shell.arrow_count(), 1);
    }

    #[test]
    fn dragging_the_head_hands_the_predecessor_over() {
        let mut shell = shell();
        shell.pointer_down(259.5, 40.0);
        assert_eq!(shell.pointer_up(150.0, 70.0), RelinkOutcome::Accepted);
        assert_eq!(source_of(&shell, "b"), None);
        assert_eq!(source_of(&shell, "c"), Some(StepId::from("a")));
    }

    #[test]
    fn dropping_on_own_predecessor_is_rejected() {
        let mut shell = shell();
        shell.pointer_down(259.5, 10.0);
        assert_eq!(shell.pointer_up(150.0, 10.0), RelinkOutcome::Rejected);
        assert_eq!(source_of(&shell, "b"), Some(StepId::from("a")));
    }

    #[test]
    fn read_only_toggle_applies_to_selection() {
        let mut shell = shell();
        shell.select_next();
        shell.toggle_read_only();
        assert!(
            shell
                .controller()
                .arrow(&StepId::from("b"))
                .is_some_and(ArrowLink::is_read_only)
        );
    }
}
