//! Headless document used by simulations and the terminal host.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sequencer::{ClassName, DomContract, ElementId, Surface};

/// Rendered state of one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryElement {
    /// `false` once the element is removed from the rendered surface.
    pub visible: bool,
    /// Current class list.
    pub classes: BTreeSet<String>,
}

impl Default for MemoryElement {
    fn default() -> Self {
        Self {
            visible: true,
            classes: BTreeSet::new(),
        }
    }
}

/// In-memory [`Surface`] keyed by element id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemorySurface {
    elements: BTreeMap<String, MemoryElement>,
}

impl MemorySurface {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a document containing every element of `contract`, all visible.
    pub fn with_contract(contract: &DomContract) -> Self {
        let mut surface = Self::new();
        for id in [
            &contract.loader,
            &contract.typing_text,
            &contract.pulsing_light,
            &contract.content,
        ] {
            surface.insert(id);
        }
        surface
    }

    /// Adds a visible element with no classes.
    pub fn insert(&mut self, id: &ElementId) {
        self.elements
            .insert(id.as_str().to_string(), MemoryElement::default());
    }

    /// Removes an element.
    pub fn remove(&mut self, id: &ElementId) {
        self.elements.remove(id.as_str());
    }

    /// Looks up an element.
    pub fn element(&self, id: &ElementId) -> Option<&MemoryElement> {
        self.elements.get(id.as_str())
    }

    /// Returns `true` if the element exists and carries `class`.
    pub fn has_class(&self, id: &ElementId, class: &ClassName) -> bool {
        self.element(id)
            .is_some_and(|e| e.classes.contains(class.as_str()))
    }
}

impl Surface for MemorySurface {
    fn contains(&self, id: &ElementId) -> bool {
        self.elements.contains_key(id.as_str())
    }

    fn add_class(&mut self, id: &ElementId, class: &ClassName) {
        if let Some(e) = self.elements.get_mut(id.as_str()) {
            e.classes.insert(class.as_str().to_string());
        }
    }

    fn remove_class(&mut self, id: &ElementId, class: &ClassName) {
        if let Some(e) = self.elements.get_mut(id.as_str()) {
            e.classes.remove(class.as_str());
        }
    }

    fn set_visible(&mut self, id: &ElementId, visible: bool) {
        if let Some(e) = self.elements.get_mut(id.as_str()) {
            e.visible = visible;
        }
    }

    fn is_visible(&self, id: &ElementId) -> bool {
        self.element(id).is_some_and(|e| e.visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_on_missing_elements_are_no_ops() {
        let mut surface = MemorySurface::new();
        let id = ElementId::new("ghost").unwrap();
        let class = ClassName::new("x").unwrap();

        surface.add_class(&id, &class);
        surface.set_visible(&id, true);

        assert!(!surface.contains(&id));
        assert!(!surface.is_visible(&id));
        assert!(!surface.has_class(&id, &class));
    }

    #[test]
    fn contract_elements_start_visible() {
        let contract = DomContract::default();
        let surface = MemorySurface::with_contract(&contract);

        assert!(surface.is_visible(&contract.loader));
        assert!(surface.is_visible(&contract.content));
        assert!(surface.contains(&contract.pulsing_light));
    }
}
