use indexmap::IndexSet;

use crate::element::ElementId;

/// The drawn surface. Registration is idempotent in both directions.
pub trait RenderTree {
    fn register_content_element(&mut self, element: ElementId);
    fn unregister_content_element(&mut self, element: ElementId);
}

/// In-memory render tree keeping registration order.
#[derive(Debug, Default)]
pub struct ContentLayer {
    elements: IndexSet<ElementId>,
}

impl ContentLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, element: ElementId) -> bool {
        self.elements.contains(&element)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.elements.iter().copied()
    }
}

impl RenderTree for ContentLayer {
    fn register_content_element(&mut self, element: ElementId) {
        self.elements.insert(element);
    }

    fn unregister_content_element(&mut self, element: ElementId) {
        self.elements.shift_remove(&element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent() {
        let mut layer = ContentLayer::new();
        let e = ElementId::from_raw(7);
        layer.register_content_element(e);
        layer.register_content_element(e);
        assert_eq!(layer.len(), 1);
        assert!(layer.is_registered(e));

        layer.unregister_content_element(e);
        layer.unregister_content_element(e);
        assert!(layer.is_empty());
    }
}
