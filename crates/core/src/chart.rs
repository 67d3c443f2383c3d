use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use steplink_protocol::{Step, StepId, SubStep};

use crate::element::{ElementAllocator, ElementId};
use crate::error::SyncError;
use crate::step::StepNode;

/// What an element belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementOwner {
    Step(StepId),
    SubStep { parent: StepId },
    Decoration { parent: StepId },
    Arrow { owner: StepId },
}

/// Result of following predecessor relations from one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredecessorChain {
    /// Predecessors in order, nearest first. Each step appears once.
    pub steps: Vec<StepId>,
    /// The chain led back to a step already visited.
    pub cyclic: bool,
    /// The chain was cut at the depth limit.
    pub truncated: bool,
}

/// The single authoritative step collection, in chart order, plus the index
/// from element ids back to their owners.
#[derive(Debug, Default)]
pub struct Chart {
    steps: IndexMap<StepId, StepNode>,
    owners: HashMap<ElementId, ElementOwner>,
    elements: ElementAllocator,
}

impl Chart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, uid: &StepId) -> bool {
        self.steps.contains_key(uid)
    }

    pub fn get(&self, uid: &StepId) -> Option<&StepNode> {
        self.steps.get(uid)
    }

    pub(crate) fn get_mut(&mut self, uid: &StepId) -> Option<&mut StepNode> {
        self.steps.get_mut(uid)
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepNode> {
        self.steps.values()
    }

    pub fn owner_of(&self, element: ElementId) -> Option<&ElementOwner> {
        self.owners.get(&element)
    }

    pub fn is_arrow_element(&self, element: ElementId) -> bool {
        matches!(self.owners.get(&element), Some(ElementOwner::Arrow { .. }))
    }

    pub(crate) fn allocate(&mut self) -> ElementId {
        self.elements.allocate()
    }

    pub(crate) fn insert(&mut self, step: Step) -> Result<ElementId, SyncError> {
        if self.steps.contains_key(&step.uid) {
            return Err(SyncError::DuplicateStep(step.uid));
        }
        validate_range(&step.uid, step.start, step.end)?;
        for sub in &step.sub_steps {
            validate_range(&sub.uid, sub.start, sub.end)?;
        }

        let uid = step.uid.clone();
        let bar = self.elements.allocate();
        let node = StepNode::new(step, bar, &mut self.elements);
        self.owners.insert(bar, ElementOwner::Step(uid.clone()));
        self.index_children(&node);
        self.steps.insert(uid, node);
        Ok(bar)
    }

    /// Remove a step and forget every element it owned, its arrow included.
    pub(crate) fn remove(&mut self, uid: &StepId) -> Option<StepNode> {
        let node = self.steps.shift_remove(uid)?;
        for element in node.elements() {
            self.owners.remove(&element);
        }
        if let Some(arrow) = node.arrow() {
            self.owners.remove(&arrow.element());
        }
        Some(node)
    }

    pub(crate) fn replace_sub_steps(
        &mut self,
        uid: &StepId,
        sub_steps: Vec<SubStep>,
    ) -> Result<Vec<ElementId>, SyncError> {
        for sub in &sub_steps {
            validate_range(&sub.uid, sub.start, sub.end)?;
        }
        let node = self
            .steps
            .get_mut(uid)
            .ok_or_else(|| SyncError::UnknownStep(uid.clone()))?;
        let removed = node.replace_sub_steps(sub_steps, &mut self.elements);
        for element in &removed {
            self.owners.remove(element);
        }
        if let Some(node) = self.steps.get(uid) {
            let parent = node.uid().clone();
            for sub in node.sub_steps() {
                self.owners.insert(
                    sub.element(),
                    ElementOwner::SubStep {
                        parent: parent.clone(),
                    },
                );
            }
        }
        Ok(removed)
    }

    pub(crate) fn add_decoration(&mut self, uid: &StepId) -> Result<ElementId, SyncError> {
        let element = self.elements.allocate();
        let node = self
            .steps
            .get_mut(uid)
            .ok_or_else(|| SyncError::UnknownStep(uid.clone()))?;
        node.add_decoration(element);
        self.owners
            .insert(element, ElementOwner::Decoration { parent: uid.clone() });
        Ok(element)
    }

    pub(crate) fn remove_decoration(
        &mut self,
        uid: &StepId,
        element: ElementId,
    ) -> Result<(), SyncError> {
        let node = self
            .steps
            .get_mut(uid)
            .ok_or_else(|| SyncError::UnknownStep(uid.clone()))?;
        if !node.remove_decoration(element) {
            return Err(SyncError::ForeignElement(element, uid.clone()));
        }
        self.owners.remove(&element);
        Ok(())
    }

    pub(crate) fn index_arrow(&mut self, element: ElementId, owner: &StepId) {
        self.owners
            .insert(element, ElementOwner::Arrow { owner: owner.clone() });
    }

    pub(crate) fn unindex(&mut self, element: ElementId) {
        self.owners.remove(&element);
    }

    fn index_children(&mut self, node: &StepNode) {
        for child in node.children() {
            let owner = match child.as_sub_step() {
                Some(_) => ElementOwner::SubStep {
                    parent: node.uid().clone(),
                },
                None => ElementOwner::Decoration {
                    parent: node.uid().clone(),
                },
            };
            self.owners.insert(child.element(), owner);
        }
    }

    /// The step (or sub-step) a pointer over `element` designates. Decorations
    /// designate their step; arrows designate nothing.
    pub fn step_uid_by_element(&self, element: ElementId) -> Option<StepId> {
        match self.owners.get(&element)? {
            ElementOwner::Step(uid) | ElementOwner::Decoration { parent: uid } => Some(uid.clone()),
            ElementOwner::SubStep { parent } => self
                .steps
                .get(parent)?
                .step_uid_by_sub_step_element(element)
                .cloned(),
            ElementOwner::Arrow { .. } => None,
        }
    }

    /// Steps whose drawn arrow starts at `uid`.
    pub fn dependents_of(&self, uid: &StepId) -> Vec<StepId> {
        self.steps
            .values()
            .filter(|n| n.linked_predecessor() == Some(uid))
            .map(|n| n.uid().clone())
            .collect()
    }

    /// Steps whose data-model predecessor is `uid`, drawn or not.
    pub fn referrers_of(&self, uid: &StepId) -> Vec<StepId> {
        self.steps
            .values()
            .filter(|n| n.predecessor() == Some(uid))
            .map(|n| n.uid().clone())
            .collect()
    }

    /// Follow data-model predecessors from `uid`, at most `max_depth` hops.
    /// Dangling references end the chain.
    pub fn predecessor_chain(&self, uid: &StepId, max_depth: usize) -> PredecessorChain {
        let mut chain = PredecessorChain::default();
        let mut visited = HashSet::from([uid]);
        let mut current = self.steps.get(uid).and_then(StepNode::predecessor);

        while let Some(next) = current {
            if !self.steps.contains_key(next) {
                break;
            }
            if !visited.insert(next) {
                chain.cyclic = true;
                break;
            }
            if chain.steps.len() == max_depth {
                chain.truncated = true;
                break;
            }
            chain.steps.push(next.clone());
            current = self.steps.get(next).and_then(StepNode::predecessor);
        }
        chain
    }
}

fn validate_range(uid: &StepId, start: f64, end: f64) -> Result<(), SyncError> {
    if !start.is_finite() || !end.is_finite() || end < start {
        return Err(SyncError::InvalidRange {
            uid: uid.clone(),
            start,
            end,
        });
    }
    Ok(())
}
