use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::Mutex;

/// Element lookup and mutation by ID. Every mutation on an ID that is not
/// present is a silent no-op.
pub trait Document: Send + Sync {
    fn contains(&self, id: &str) -> bool;
    fn attribute(&self, id: &str, name: &str) -> Option<String>;
    fn set_text(&self, id: &str, text: &str);
    fn set_attribute(&self, id: &str, name: &str, value: &str);
    fn add_class(&self, id: &str, class: &str);
    fn remove_class(&self, id: &str, class: &str);
}

/// Semantic page fields and the element IDs the server markup gives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    EventData,
    TimeUntilStart,
    TimeRemaining,
    TotalVotesCount,
    StatusBadge,
    ResultsContainer,
    TotalVotesDisplay,
    OptionCount(u64),
    OptionPercent(u64),
    OptionProgress(u64),
    OptionCard(u64),
}

impl Field {
    pub fn element_id(&self) -> String {
        match self {
            Field::EventData => "event-id-data".to_string(),
            Field::TimeUntilStart => "time-until-start".to_string(),
            Field::TimeRemaining => "time-remaining".to_string(),
            Field::TotalVotesCount => "total-votes-count".to_string(),
            Field::StatusBadge => "voting-status-badge".to_string(),
            Field::ResultsContainer => "voting-results-container".to_string(),
            Field::TotalVotesDisplay => "total-votes-display".to_string(),
            Field::OptionCount(id) => format!("option-{}-count", id),
            Field::OptionPercent(id) => format!("option-{}-percent", id),
            Field::OptionProgress(id) => format!("option-{}-progress", id),
            Field::OptionCard(id) => format!("option-{}-card", id),
        }
    }
}

/// Typed binding from [`Field`]s onto a [`Document`].
#[derive(Clone)]
pub struct View {
    document: Arc<dyn Document>,
}

impl View {
    pub fn new(document: Arc<dyn Document>) -> View {
        View { document }
    }

    pub fn has(&self, field: Field) -> bool {
        self.document.contains(&field.element_id())
    }

    pub fn attribute(&self, field: Field, name: &str) -> Option<String> {
        self.document.attribute(&field.element_id(), name)
    }

    pub fn set_text(&self, field: Field, text: &str) {
        self.document.set_text(&field.element_id(), text)
    }

    pub fn set_attribute(&self, field: Field, name: &str, value: &str) {
        self.document.set_attribute(&field.element_id(), name, value)
    }

    pub fn add_class(&self, field: Field, class: &str) {
        self.document.add_class(&field.element_id(), class)
    }

    pub fn remove_class(&self, field: Field, class: &str) {
        self.document.remove_class(&field.element_id(), class)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub text: String,
    pub attributes: BTreeMap<String, String>,
    pub classes: BTreeSet<String>,
}

/// In-memory page. Backs the terminal agent and the tests.
#[derive(Default)]
pub struct MemoryDocument {
    elements: Mutex<BTreeMap<String, Element>>,
}

impl MemoryDocument {
    pub fn new() -> MemoryDocument {
        MemoryDocument::default()
    }

    #[cfg(test)]
    pub fn with_elements<'a>(ids: impl IntoIterator<Item = &'a str>) -> MemoryDocument {
        let document = MemoryDocument::new();
        for id in ids {
            document.insert(id);
        }
        document
    }

    pub fn insert(&self, id: &str) {
        self.elements.lock().entry(id.to_string()).or_default();
    }

    pub fn insert_field(&self, field: Field) {
        self.insert(&field.element_id())
    }

    #[cfg(test)]
    pub fn element(&self, id: &str) -> Option<Element> {
        self.elements.lock().get(id).cloned()
    }

    #[cfg(test)]
    pub fn text(&self, id: &str) -> Option<String> {
        self.elements.lock().get(id).map(|e| e.text.clone())
    }

    #[cfg(test)]
    pub fn has_class(&self, id: &str, class: &str) -> bool {
        self.elements.lock()
            .get(id)
            .map(|e| e.classes.contains(class))
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> BTreeMap<String, Element> {
        self.elements.lock().clone()
    }

    /// One line per element, for the terminal.
    pub fn render_lines(&self) -> Vec<String> {
        self.elements.lock()
            .iter()
            .filter(|(_, e)| !e.text.is_empty() || !e.classes.is_empty())
            .map(|(id, e)| {
                let classes = e.classes.iter().join(" ");
                if classes.is_empty() {
                    format!("{:<28} {}", id, e.text)
                } else {
                    format!("{:<28} {} [{}]", id, e.text, classes)
                }
            })
            .collect()
    }

    fn with_element<F: FnOnce(&mut Element)>(&self, id: &str, f: F) {
        if let Some(element) = self.elements.lock().get_mut(id) {
            f(element)
        }
    }
}

impl Document for MemoryDocument {
    fn contains(&self, id: &str) -> bool {
        self.elements.lock().contains_key(id)
    }

    fn attribute(&self, id: &str, name: &str) -> Option<String> {
        self.elements.lock()
            .get(id)
            .and_then(|e| e.attributes.get(name).cloned())
    }

    fn set_text(&self, id: &str, text: &str) {
        self.with_element(id, |e| e.text = text.to_string())
    }

    fn set_attribute(&self, id: &str, name: &str, value: &str) {
        self.with_element(id, |e| {
            e.attributes.insert(name.to_string(), value.to_string());
        })
    }

    fn add_class(&self, id: &str, class: &str) {
        self.with_element(id, |e| {
            e.classes.insert(class.to_string());
        })
    }

    fn remove_class(&self, id: &str, class: &str) {
        self.with_element(id, |e| {
            e.classes.remove(class);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_ids_follow_markup_scheme() {
        assert_eq!("option-12-count", Field::OptionCount(12).element_id());
        assert_eq!("option-12-percent", Field::OptionPercent(12).element_id());
        assert_eq!("option-12-progress", Field::OptionProgress(12).element_id());
        assert_eq!("option-12-card", Field::OptionCard(12).element_id());
    }

    #[test]
    fn missing_element_is_noop() {
        let document = Arc::new(MemoryDocument::new());
        let view = View::new(document.clone());
        view.set_text(Field::TotalVotesCount, "3");
        view.add_class(Field::StatusBadge, "status-open");
        assert!(!view.has(Field::TotalVotesCount));
        assert!(document.snapshot().is_empty(), "No element should be created");
    }

    #[test]
    fn mutates_present_element() {
        let document = Arc::new(MemoryDocument::with_elements(vec!("voting-status-badge")));
        let view = View::new(document.clone());
        view.set_text(Field::StatusBadge, "Voting open");
        view.add_class(Field::StatusBadge, "status-open");
        view.set_attribute(Field::StatusBadge, "aria-label", "open");

        let badge = document.element("voting-status-badge").expect("Badge should exist");
        assert_eq!("Voting open", badge.text);
        assert!(badge.classes.contains("status-open"));
        assert_eq!(Some("open".to_string()), view.attribute(Field::StatusBadge, "aria-label"));

        view.remove_class(Field::StatusBadge, "status-open");
        assert!(!document.has_class("voting-status-badge", "status-open"));
    }
}
