//! The relation synchronization controller.
//!
//! Every change enters here: data-model notifications (steps added or
//! removed, predecessor and read-only changes), lifecycle notifications from
//! the UI shell (attach, detach, re-layout, width updates) and pointer input
//! during an arrow drag. Work that needs a measurable element is turned into
//! a [`DeferredAction`] bound to that element and runs once it is ready:
//!
//! ```text
//!   set_predecessor ──▶ owner bar queue: RequestUpdatePredecessor
//!                         └─▶ create arrow ──▶ arrow queue: Configure, Wire,
//!                                                Register, Redraw
//!                                                  └─▶ predecessor bar queue:
//!                                                      Redraw (until ready)
//! ```

use steplink_protocol::{Step, StepId, SubStep};
use tracing::{debug, trace, warn};

use crate::arrow::{ArrowLink, Endpoint};
use crate::chart::{Chart, ElementOwner, PredecessorChain};
use crate::config::SyncConfig;
use crate::element::ElementId;
use crate::error::{SyncError, SyncNotice};
use crate::geometry::{ArrowGeometry, ArrowGeometryResolver};
use crate::hit::{HitResolver, PointerEvent, RelinkHandler, RelinkOutcome, RelinkProposal};
use crate::layout::Layout;
use crate::ready_queue::ReadyQueue;
use crate::render_tree::RenderTree;
use crate::step::StepNode;

/// A unit of work waiting for its element to become ready. Actions name the
/// step they act on and look everything else up when they run, so they never
/// act on state captured at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Apply the data-model predecessor only if it still equals `candidate`.
    RequestUpdatePredecessor {
        owner: StepId,
        candidate: Option<StepId>,
    },
    /// Apply whatever the data-model predecessor is now.
    UpdatePredecessor { owner: StepId },
    /// Refresh the sub-step marker, position sub-steps, redraw arrows.
    PropagateWidth { owner: StepId },
    RefreshSubStepMarker { owner: StepId },
    /// Copy the owner's read-only flag onto a freshly created arrow.
    ConfigureArrow { owner: StepId },
    WireArrowHandlers { owner: StepId },
    RegisterArrow { owner: StepId },
    RedrawArrow { owner: StepId },
}

/// Observable effects, journaled in order for the UI shell.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    ArrowCreated {
        owner: StepId,
        source: StepId,
        element: ElementId,
    },
    ArrowRetargeted {
        owner: StepId,
        source: StepId,
    },
    ArrowRegistered {
        owner: StepId,
    },
    ArrowUnregistered {
        owner: StepId,
    },
    ArrowRedrawn {
        owner: StepId,
        geometry: ArrowGeometry,
    },
    ArrowRemoved {
        owner: StepId,
        element: ElementId,
    },
    SubStepResized {
        owner: StepId,
        sub_step: StepId,
    },
    SubStepMarkerChanged {
        owner: StepId,
        present: bool,
    },
    Notice(SyncNotice),
}

/// Keeps predecessor relations, arrows and their geometry in step with the
/// data model and the layout.
///
/// `L` answers readiness and geometry questions; `R` is the render tree that
/// arrows are registered into. Both are passed in explicitly and owned for
/// the controller's lifetime; the shell reaches the layout through
/// [`layout_mut`](Self::layout_mut).
#[derive(Debug)]
pub struct RelationSyncController<L, R> {
    chart: Chart,
    queue: ReadyQueue<DeferredAction>,
    resolver: ArrowGeometryResolver,
    hits: HitResolver,
    config: SyncConfig,
    layout: L,
    tree: R,
    events: Vec<SyncEvent>,
    dragging: Option<StepId>,
}

impl<L: Layout, R: RenderTree> RelationSyncController<L, R> {
    pub fn new(layout: L, tree: R) -> Self {
        Self::with_config(SyncConfig::default(), layout, tree)
    }

    pub fn with_config(config: SyncConfig, layout: L, tree: R) -> Self {
        Self {
            chart: Chart::new(),
            queue: ReadyQueue::new(),
            resolver: ArrowGeometryResolver::new(config.arrow_padding),
            hits: HitResolver,
            config,
            layout,
            tree,
            events: Vec::new(),
            dragging: None,
        }
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// The shell moves and sizes elements through this, then reports the
    /// change with [`on_attach`](Self::on_attach),
    /// [`on_layout_changed`](Self::on_layout_changed) or
    /// [`update_width`](Self::update_width).
    pub fn layout_mut(&mut self) -> &mut L {
        &mut self.layout
    }

    pub fn tree(&self) -> &R {
        &self.tree
    }

    pub fn step(&self, uid: &StepId) -> Option<&StepNode> {
        self.chart.get(uid)
    }

    pub fn arrow(&self, owner: &StepId) -> Option<&ArrowLink> {
        self.chart.get(owner).and_then(StepNode::arrow)
    }

    pub fn has_arrow(&self, owner: &StepId) -> bool {
        self.arrow(owner).is_some()
    }

    pub fn pending_actions(&self, element: ElementId) -> impl Iterator<Item = &DeferredAction> {
        self.queue.iter_pending(element)
    }

    pub fn pending_count(&self, element: ElementId) -> usize {
        self.queue.pending(element)
    }

    /// Drain the event journal.
    pub fn take_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn predecessor_chain(&self, owner: &StepId) -> PredecessorChain {
        self.chart
            .predecessor_chain(owner, self.config.max_chain_depth)
    }

    /// The step whose arrow is being dragged.
    pub fn dragging(&self) -> Option<&StepId> {
        self.dragging.as_ref()
    }

    // --- Data model notifications ---

    /// Add a step. Its bar element is returned; nothing visual happens until
    /// the shell attaches it.
    pub fn add_step(&mut self, step: Step) -> Result<ElementId, SyncError> {
        let uid = step.uid.clone();
        let has_predecessor = step.predecessor.is_some();
        let bar = self.chart.insert(step)?;
        debug!(%uid, element = %bar, "step added");

        if has_predecessor {
            self.defer(bar, DeferredAction::UpdatePredecessor { owner: uid.clone() });
        }
        self.defer(bar, DeferredAction::RefreshSubStepMarker { owner: uid.clone() });

        // References that dangled until now resolve to the new step.
        for referrer in self.chart.referrers_of(&uid) {
            if referrer == uid {
                continue;
            }
            if let Some(element) = self.chart.get(&referrer).map(StepNode::element) {
                self.defer(element, DeferredAction::UpdatePredecessor { owner: referrer });
            }
        }
        Ok(bar)
    }

    /// Remove a step, its arrow, and every arrow drawn from it.
    pub fn remove_step(&mut self, uid: &StepId) -> Result<(), SyncError> {
        if !self.chart.contains(uid) {
            return Err(SyncError::UnknownStep(uid.clone()));
        }
        self.teardown_arrow(uid);

        let mut affected = self.chart.referrers_of(uid);
        for dependent in self.chart.dependents_of(uid) {
            if !affected.contains(&dependent) {
                affected.push(dependent);
            }
        }
        for dependent in affected.into_iter().filter(|d| d != uid) {
            self.teardown_arrow(&dependent);
            if let Some(node) = self.chart.get_mut(&dependent) {
                node.set_linked_predecessor(None);
            }
            self.notice(SyncNotice::DanglingReference {
                owner: dependent,
                predecessor: uid.clone(),
            });
        }

        if let Some(node) = self.chart.remove(uid) {
            for element in node.elements() {
                self.queue.cancel(element);
            }
        }
        debug!(%uid, "step removed");
        Ok(())
    }

    /// Store a new predecessor relation. The visuals follow once the owner
    /// is ready; a later call supersedes this one if it has not applied yet.
    pub fn set_predecessor(
        &mut self,
        owner: &StepId,
        predecessor: Option<StepId>,
    ) -> Result<(), SyncError> {
        let node = self
            .chart
            .get_mut(owner)
            .ok_or_else(|| SyncError::UnknownStep(owner.clone()))?;
        node.set_predecessor(predecessor.clone());
        debug!(%owner, predecessor = ?predecessor, "predecessor set");
        self.request_update_predecessor(owner, predecessor)
    }

    /// Update the arrow when ready, but only if `candidate` is still the
    /// owner's predecessor at that time.
    pub fn request_update_predecessor(
        &mut self,
        owner: &StepId,
        candidate: Option<StepId>,
    ) -> Result<(), SyncError> {
        let element = self.element_of(owner)?;
        self.defer(
            element,
            DeferredAction::RequestUpdatePredecessor {
                owner: owner.clone(),
                candidate,
            },
        );
        Ok(())
    }

    /// Update the arrow to the current predecessor when ready.
    pub fn update_predecessor(&mut self, owner: &StepId) -> Result<(), SyncError> {
        let element = self.element_of(owner)?;
        self.defer(
            element,
            DeferredAction::UpdatePredecessor {
                owner: owner.clone(),
            },
        );
        Ok(())
    }

    /// Toggle whether the owner (and its arrow's endpoints) can be edited.
    /// Applies immediately to an existing arrow.
    pub fn set_read_only(&mut self, owner: &StepId, read_only: bool) -> Result<(), SyncError> {
        let node = self
            .chart
            .get_mut(owner)
            .ok_or_else(|| SyncError::UnknownStep(owner.clone()))?;
        node.set_read_only(read_only);
        if let Some(arrow) = node.arrow.as_mut() {
            arrow.set_read_only(read_only);
        }
        if read_only && self.dragging.as_ref() == Some(owner) {
            self.dragging = None;
        }
        Ok(())
    }

    /// Replace the owner's sub-steps. The marker and sub-step positions are
    /// refreshed once the owner is ready.
    pub fn set_sub_steps(&mut self, owner: &StepId, sub_steps: Vec<SubStep>) -> Result<(), SyncError> {
        let removed = self.chart.replace_sub_steps(owner, sub_steps)?;
        for element in removed {
            self.queue.cancel(element);
        }
        let element = self.element_of(owner)?;
        self.defer(
            element,
            DeferredAction::PropagateWidth {
                owner: owner.clone(),
            },
        );
        Ok(())
    }

    /// Add a non-sub-step child element in front of the owner's sub-steps.
    pub fn add_decoration(&mut self, owner: &StepId) -> Result<ElementId, SyncError> {
        self.chart.add_decoration(owner)
    }

    pub fn remove_decoration(&mut self, owner: &StepId, element: ElementId) -> Result<(), SyncError> {
        self.chart.remove_decoration(owner, element)?;
        self.queue.cancel(element);
        Ok(())
    }

    /// The owner's bar is now `width` wide. Sub-steps follow in list order
    /// and arrows touching the owner are redrawn, once the owner is ready.
    pub fn update_width(&mut self, owner: &StepId, width: f64) -> Result<(), SyncError> {
        let node = self
            .chart
            .get_mut(owner)
            .ok_or_else(|| SyncError::UnknownStep(owner.clone()))?;
        node.set_width(width);
        let element = node.element();
        self.defer(
            element,
            DeferredAction::PropagateWidth {
                owner: owner.clone(),
            },
        );
        Ok(())
    }

    // --- Lifecycle notifications ---

    /// `element` was inserted into the visible tree. If it is measurable its
    /// pending actions run now, in order; otherwise they keep waiting and
    /// the shell reports again after layout.
    pub fn on_attach(&mut self, element: ElementId) {
        if !self.layout.is_ready(element) {
            trace!(%element, "attached but not measurable yet");
            return;
        }
        debug!(%element, pending = self.queue.pending(element), "element ready");
        self.drain(element);

        if let Some(ElementOwner::Step(uid)) = self.chart.owner_of(element).cloned() {
            self.after_step_ready(&uid, element);
        }
    }

    /// `element` was removed from the visible tree. Its pending actions are
    /// dropped without running.
    pub fn on_detach(&mut self, element: ElementId) {
        let dropped = self.queue.cancel(element);
        debug!(%element, dropped, "element detached");
        match self.chart.owner_of(element).cloned() {
            Some(ElementOwner::Step(uid)) => self.detach_step(&uid),
            Some(ElementOwner::Arrow { owner }) => self.detach_arrow(&owner),
            _ => {}
        }
    }

    /// `element` moved or resized without changing width semantics. Arrows
    /// touching it are redrawn.
    pub fn on_layout_changed(&mut self, element: ElementId) {
        if !self.layout.is_ready(element) {
            return;
        }
        self.drain(element);
        if let Some(ElementOwner::Step(uid)) = self.chart.owner_of(element).cloned() {
            self.schedule_redraw(&uid);
            self.redraw_dependents(&uid);
        }
    }

    // --- Interactive relink ---

    /// Start dragging the arrow endpoint under the pointer, if any.
    pub fn pointer_down(&mut self, event: &PointerEvent) -> Option<(StepId, Endpoint)> {
        let point = event.client_point()?;
        let radius = self.config.handle_radius;
        let (owner, endpoint) = self.chart.steps().find_map(|node| {
            let endpoint = node.arrow()?.handle_at(point, radius)?;
            Some((node.uid().clone(), endpoint))
        })?;

        self.cancel_drag();
        let arrow = self.chart.get_mut(&owner)?.arrow.as_mut()?;
        if !arrow.begin_drag(endpoint) {
            return None;
        }
        arrow.drag_to(point);
        debug!(%owner, ?endpoint, "arrow drag started");
        self.dragging = Some(owner.clone());
        Some((owner, endpoint))
    }

    /// Pointer moved during a drag. A hit is proposed to `handler`; an
    /// accepted proposal ends the drag.
    pub fn pointer_move(
        &mut self,
        event: &PointerEvent,
        handler: &mut impl RelinkHandler,
    ) -> RelinkOutcome {
        self.relink(event, handler, false)
    }

    /// Pointer released during a drag. A hit is proposed to `handler` and
    /// ends the drag either way; a miss leaves the drag in progress.
    pub fn pointer_end(
        &mut self,
        event: &PointerEvent,
        handler: &mut impl RelinkHandler,
    ) -> RelinkOutcome {
        self.relink(event, handler, true)
    }

    /// Abandon the current drag. The arrow keeps its geometry.
    pub fn cancel_drag(&mut self) -> bool {
        let Some(owner) = self.dragging.take() else {
            return false;
        };
        if let Some(arrow) = self.chart.get_mut(&owner).and_then(|n| n.arrow.as_mut()) {
            arrow.end_drag();
        }
        true
    }

    fn relink(
        &mut self,
        event: &PointerEvent,
        handler: &mut impl RelinkHandler,
        release: bool,
    ) -> RelinkOutcome {
        let Some(owner) = self.dragging.clone() else {
            return RelinkOutcome::Idle;
        };
        let Some(arrow) = self.chart.get_mut(&owner).and_then(|n| n.arrow.as_mut()) else {
            self.dragging = None;
            return RelinkOutcome::Idle;
        };
        let Some(endpoint) = arrow.drag().map(|d| d.endpoint) else {
            self.dragging = None;
            return RelinkOutcome::Idle;
        };
        let predecessor = arrow.source().clone();
        let point = event.client_point();
        if let Some(point) = point {
            arrow.drag_to(point);
        }

        let chart = &self.chart;
        let Some(target) = self
            .hits
            .resolve(&self.layout, event, |e| chart.is_arrow_element(e))
        else {
            self.notice(SyncNotice::HitResolutionMiss { point });
            return RelinkOutcome::Missed;
        };

        let proposal = RelinkProposal {
            owner: owner.clone(),
            predecessor,
            endpoint,
            target,
            target_step: self.chart.step_uid_by_element(target),
        };
        let accepted = handler.on_relation_selected(&proposal);
        debug!(%owner, %target, accepted, release, "relink proposed");

        if accepted || release {
            self.cancel_drag();
        }
        if accepted {
            RelinkOutcome::Accepted
        } else {
            RelinkOutcome::Rejected
        }
    }

    // --- Deferred execution ---

    fn defer(&mut self, element: ElementId, action: DeferredAction) {
        trace!(%element, ?action, "deferring");
        self.queue.enqueue(element, action);
        if self.layout.is_ready(element) {
            self.drain(element);
        }
    }

    fn defer_once(&mut self, element: ElementId, action: DeferredAction) {
        if self.queue.enqueue_once(element, action) && self.layout.is_ready(element) {
            self.drain(element);
        }
    }

    /// Run `element`'s actions in FIFO order. Actions registered on the same
    /// element while draining join the back of this loop. An action whose step
    /// was removed after it was queued is dropped and the rest still run.
    fn drain(&mut self, element: ElementId) {
        if !self.queue.start_drain(element) {
            return;
        }
        while self.layout.is_ready(element) {
            let Some(action) = self.queue.next(element) else {
                break;
            };
            if let Err(err) = self.execute(action) {
                debug!(%element, %err, "dropped action for a removed step");
            }
        }
        self.queue.finish_drain(element);
    }

    fn execute(&mut self, action: DeferredAction) -> Result<(), SyncError> {
        trace!(?action, "running");
        match action {
            DeferredAction::RequestUpdatePredecessor { owner, candidate } => {
                let current = self.node(&owner)?.predecessor().cloned();
                if current == candidate {
                    self.apply_predecessor(&owner)
                } else {
                    self.notice(SyncNotice::StaleProposal { owner, candidate });
                    Ok(())
                }
            }
            DeferredAction::UpdatePredecessor { owner } => self.apply_predecessor(&owner),
            DeferredAction::PropagateWidth { owner } => self.propagate_width(&owner),
            DeferredAction::RefreshSubStepMarker { owner } => self.refresh_marker(&owner),
            DeferredAction::ConfigureArrow { owner } => {
                let node = self.node_mut(&owner)?;
                let read_only = node.is_read_only();
                if let Some(arrow) = node.arrow.as_mut() {
                    arrow.set_read_only(read_only);
                }
                Ok(())
            }
            DeferredAction::WireArrowHandlers { owner } => {
                if let Some(arrow) = self.node_mut(&owner)?.arrow.as_mut() {
                    arrow.wire_handlers();
                }
                Ok(())
            }
            DeferredAction::RegisterArrow { owner } => {
                let node = self
                    .chart
                    .get_mut(&owner)
                    .ok_or_else(|| SyncError::UnknownStep(owner.clone()))?;
                let registered = match node.arrow.as_mut() {
                    Some(arrow) => arrow.attach(&mut self.tree),
                    None => false,
                };
                if registered {
                    debug!(%owner, "arrow registered");
                    self.emit(SyncEvent::ArrowRegistered { owner });
                }
                Ok(())
            }
            DeferredAction::RedrawArrow { owner } => self.redraw_arrow(&owner),
        }
    }

    /// Make the visuals match the owner's data-model predecessor.
    fn apply_predecessor(&mut self, owner: &StepId) -> Result<(), SyncError> {
        let predecessor = self.node(owner)?.predecessor().cloned();
        let resolved = match predecessor {
            Some(p) if self.chart.contains(&p) => Some(p),
            Some(p) => {
                self.notice(SyncNotice::DanglingReference {
                    owner: owner.clone(),
                    predecessor: p,
                });
                None
            }
            None => None,
        };
        let Some(source) = resolved else {
            self.node_mut(owner)?.set_linked_predecessor(None);
            self.teardown_arrow(owner);
            return Ok(());
        };

        // A detached owner gets its arrow back when its own bar returns.
        let bar = self.element_of(owner)?;
        if !self.layout.is_ready(bar) {
            trace!(%owner, %bar, "owner not ready, link postponed");
            self.defer_once(
                bar,
                DeferredAction::UpdatePredecessor {
                    owner: owner.clone(),
                },
            );
            return Ok(());
        }
        self.node_mut(owner)?.set_linked_predecessor(Some(source.clone()));

        let chain = self.predecessor_chain(owner);
        if chain.cyclic || chain.truncated {
            warn!(%owner, depth = chain.steps.len(), "predecessor chain does not terminate");
            self.notice(SyncNotice::PredecessorCycle {
                owner: owner.clone(),
            });
        }

        let arrow_element = self.ensure_arrow(owner, source)?;
        self.defer(
            arrow_element,
            DeferredAction::RegisterArrow {
                owner: owner.clone(),
            },
        );
        self.defer_once(
            arrow_element,
            DeferredAction::RedrawArrow {
                owner: owner.clone(),
            },
        );
        Ok(())
    }

    /// The owner's arrow element, creating the arrow on first need. A new
    /// arrow is configured and wired once its own element is ready.
    fn ensure_arrow(&mut self, owner: &StepId, source: StepId) -> Result<ElementId, SyncError> {
        if let Some(arrow) = self.node_mut(owner)?.arrow.as_mut() {
            let element = arrow.element();
            if arrow.source() != &source {
                arrow.retarget(source.clone());
                debug!(%owner, %source, "arrow retargeted");
                self.emit(SyncEvent::ArrowRetargeted {
                    owner: owner.clone(),
                    source,
                });
            }
            return Ok(element);
        }

        let element = self.chart.allocate();
        self.node_mut(owner)?.arrow = Some(ArrowLink::new(owner.clone(), source.clone(), element));
        self.chart.index_arrow(element, owner);
        debug!(%owner, %source, %element, "arrow created");
        self.emit(SyncEvent::ArrowCreated {
            owner: owner.clone(),
            source,
            element,
        });

        self.defer(
            element,
            DeferredAction::ConfigureArrow {
                owner: owner.clone(),
            },
        );
        self.defer(
            element,
            DeferredAction::WireArrowHandlers {
                owner: owner.clone(),
            },
        );
        Ok(element)
    }

    fn redraw_arrow(&mut self, owner: &StepId) -> Result<(), SyncError> {
        let node = self.node(owner)?;
        let (Some(arrow), Some(source)) = (node.arrow(), node.linked_predecessor()) else {
            return Ok(());
        };
        let arrow_element = arrow.element();
        let target = node.element();
        let source_element = self
            .chart
            .get(source)
            .map(StepNode::element)
            .ok_or_else(|| SyncError::UnknownStep(source.clone()))?;

        for waiting_on in [arrow_element, source_element, target] {
            if !self.layout.is_ready(waiting_on) {
                self.notice(SyncNotice::NotReadyYet {
                    owner: owner.clone(),
                    element: waiting_on,
                });
                self.defer_once(
                    waiting_on,
                    DeferredAction::RedrawArrow {
                        owner: owner.clone(),
                    },
                );
                return Ok(());
            }
        }

        let Some(arrow) = self.chart.get_mut(owner).and_then(|n| n.arrow.as_mut()) else {
            return Ok(());
        };
        match arrow.redraw(&self.resolver, &self.layout, source_element, target) {
            Some(geometry) => self.emit(SyncEvent::ArrowRedrawn {
                owner: owner.clone(),
                geometry,
            }),
            None => self.notice(SyncNotice::NotReadyYet {
                owner: owner.clone(),
                element: source_element,
            }),
        }
        Ok(())
    }

    fn propagate_width(&mut self, owner: &StepId) -> Result<(), SyncError> {
        let node = self.node_mut(owner)?;
        let marker_changed = node.refresh_sub_step_marker();
        let present = node.has_sub_steps_marker();
        let resized = node.update_sub_step_widths();
        let linked = node.linked_predecessor().is_some();

        if marker_changed {
            self.emit(SyncEvent::SubStepMarkerChanged {
                owner: owner.clone(),
                present,
            });
        }
        for sub_step in resized {
            self.emit(SyncEvent::SubStepResized {
                owner: owner.clone(),
                sub_step,
            });
        }
        if linked {
            self.schedule_redraw(owner);
        }
        self.redraw_dependents(owner);
        Ok(())
    }

    fn refresh_marker(&mut self, owner: &StepId) -> Result<(), SyncError> {
        let node = self.node_mut(owner)?;
        if node.refresh_sub_step_marker() {
            let present = node.has_sub_steps_marker();
            self.emit(SyncEvent::SubStepMarkerChanged {
                owner: owner.clone(),
                present,
            });
        }
        Ok(())
    }

    /// Re-evaluate a step that just became ready.
    fn after_step_ready(&mut self, uid: &StepId, element: ElementId) {
        let Some(node) = self.chart.get(uid) else {
            return;
        };
        let needs_link = node.predecessor().is_some() && node.arrow().is_none();
        let linked_arrow = node.arrow().is_some_and(ArrowLink::is_linked);

        if needs_link {
            self.defer(element, DeferredAction::UpdatePredecessor { owner: uid.clone() });
        } else if linked_arrow {
            self.schedule_redraw(uid);
        }
        self.defer(element, DeferredAction::RefreshSubStepMarker { owner: uid.clone() });
        self.redraw_dependents(uid);
    }

    fn detach_step(&mut self, uid: &StepId) {
        self.teardown_arrow(uid);
        let Some(node) = self.chart.get_mut(uid) else {
            return;
        };
        node.set_linked_predecessor(None);
        let bar = node.element();
        for child in node.children().iter().map(crate::step::BarChild::element).collect::<Vec<_>>() {
            self.queue.cancel(child);
        }

        // Arrows drawn from this step lose their anchor until it returns.
        for dependent in self.chart.dependents_of(uid) {
            let unregistered = match self.chart.get_mut(&dependent).and_then(|n| n.arrow.as_mut()) {
                Some(arrow) => arrow.detach(&mut self.tree),
                None => false,
            };
            if unregistered {
                self.emit(SyncEvent::ArrowUnregistered {
                    owner: dependent.clone(),
                });
            }
            self.queue
                .enqueue_once(bar, DeferredAction::UpdatePredecessor { owner: dependent });
        }
    }

    fn detach_arrow(&mut self, owner: &StepId) {
        let unregistered = match self.chart.get_mut(owner).and_then(|n| n.arrow.as_mut()) {
            Some(arrow) => arrow.detach(&mut self.tree),
            None => return,
        };
        if unregistered {
            self.emit(SyncEvent::ArrowUnregistered {
                owner: owner.clone(),
            });
        }
        if let Some(bar) = self.chart.get(owner).map(StepNode::element) {
            self.defer(
                bar,
                DeferredAction::UpdatePredecessor {
                    owner: owner.clone(),
                },
            );
        }
    }

    /// Unregister and drop the owner's arrow, if it has one.
    fn teardown_arrow(&mut self, owner: &StepId) {
        let Some(mut arrow) = self.chart.get_mut(owner).and_then(|n| n.arrow.take()) else {
            return;
        };
        if arrow.detach(&mut self.tree) {
            self.emit(SyncEvent::ArrowUnregistered {
                owner: owner.clone(),
            });
        }
        let element = arrow.element();
        let dropped = self.queue.cancel(element);
        self.chart.unindex(element);
        if self.dragging.as_ref() == Some(owner) {
            self.dragging = None;
        }
        debug!(%owner, %element, dropped, "arrow removed");
        self.emit(SyncEvent::ArrowRemoved {
            owner: owner.clone(),
            element,
        });
    }

    fn schedule_redraw(&mut self, owner: &StepId) {
        if let Some(element) = self.arrow(owner).map(ArrowLink::element) {
            self.defer_once(
                element,
                DeferredAction::RedrawArrow {
                    owner: owner.clone(),
                },
            );
        }
    }

    fn redraw_dependents(&mut self, uid: &StepId) {
        for dependent in self.chart.dependents_of(uid) {
            if &dependent != uid {
                self.schedule_redraw(&dependent);
            }
        }
    }

    fn element_of(&self, uid: &StepId) -> Result<ElementId, SyncError> {
        self.node(uid).map(StepNode::element)
    }

    fn node(&self, uid: &StepId) -> Result<&StepNode, SyncError> {
        self.chart
            .get(uid)
            .ok_or_else(|| SyncError::UnknownStep(uid.clone()))
    }

    fn node_mut(&mut self, uid: &StepId) -> Result<&mut StepNode, SyncError> {
        self.chart
            .get_mut(uid)
            .ok_or_else(|| SyncError::UnknownStep(uid.clone()))
    }

    fn notice(&mut self, notice: SyncNotice) {
        debug!(%notice, "recoverable");
        self.events.push(SyncEvent::Notice(notice));
    }

    fn emit(&mut self, event: SyncEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutSurface;
    use crate::render_tree::ContentLayer;
    use steplink_protocol::Rect;

    fn controller() -> RelationSyncController<LayoutSurface, ContentLayer> {
        RelationSyncController::new(LayoutSurface::new(), ContentLayer::new())
    }

    #[test]
    fn unknown_steps_are_errors() {
        let mut sync = controller();
        let ghost = StepId::from("ghost");
        assert!(matches!(
            sync.set_predecessor(&ghost, None),
            Err(SyncError::UnknownStep(_))
        ));
        assert!(matches!(sync.remove_step(&ghost), Err(SyncError::UnknownStep(_))));
        assert!(sync.update_width(&ghost, 10.0).is_err());
        assert!(sync.set_read_only(&ghost, true).is_err());
    }

    #[test]
    fn redraws_are_not_queued_twice() {
        let mut sync = controller();
        sync.add_step(Step::new("p", "P", 0.0, 1.0)).expect("new step");
        let o = sync
            .add_step(Step::new("o", "O", 1.0, 2.0).with_predecessor("p"))
            .expect("new step");
        sync.layout_mut().place(o, Rect::new(50.0, 30.0, 40.0, 20.0));
        sync.on_attach(o);

        let arrow = sync.arrow(&StepId::from("o")).map(ArrowLink::element).expect("arrow created");
        for _ in 0..3 {
            sync.on_layout_changed(o);
        }
        let redraws = sync
            .pending_actions(arrow)
            .filter(|a| matches!(a, DeferredAction::RedrawArrow { .. }))
            .count();
        assert_eq!(redraws, 1);
        assert_eq!(
            sync.pending_actions(arrow).next(),
            Some(&DeferredAction::ConfigureArrow {
                owner: StepId::from("o")
            })
        );
    }

    #[test]
    fn ready_element_runs_actions_immediately() {
        let mut sync = controller();
        let o = sync.add_step(Step::new("o", "O", 0.0, 2.0)).expect("new step");
        sync.layout_mut().place(o, Rect::new(0.0, 0.0, 40.0, 20.0));
        sync.on_attach(o);
        sync.take_events();

        sync.set_sub_steps(&StepId::from("o"), vec![SubStep::new("o.1", "", 0.0, 1.0)])
            .expect("known step");
        assert_eq!(sync.pending_count(o), 0);
        assert_eq!(
            sync.take_events().first(),
            Some(&SyncEvent::SubStepMarkerChanged {
                owner: StepId::from("o"),
                present: true,
            })
        );
    }

    #[test]
    fn cancel_drag_without_drag_is_a_no_op() {
        let mut sync = controller();
        assert!(!sync.cancel_drag());
        assert_eq!(sync.dragging(), None);
    }
}
