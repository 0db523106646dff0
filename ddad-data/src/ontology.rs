//! Annotation ontologies: label id to name and display color.

use serde::Deserialize;
use std::collections::BTreeMap;

/// One class of an ontology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyItem {
    pub id: u32,
    pub name: String,
    /// RGB display color.
    pub color: [u8; 3],
    /// Whether instances of this class are countable objects.
    pub is_thing: bool,
}

/// Read-only lookup from label id to class description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ontology {
    items: BTreeMap<u32, OntologyItem>,
}

impl Ontology {
    /// Build an ontology from its items. Later duplicates of an id win.
    pub fn new(items: impl IntoIterator<Item = OntologyItem>) -> Self {
        Self {
            items: items.into_iter().map(|item| (item.id, item)).collect(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&OntologyItem> {
        self.items.get(&id)
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.items.get(&id).map(|item| item.name.as_str())
    }

    pub fn color(&self, id: u32) -> Option<[u8; 3]> {
        self.items.get(&id).map(|item| item.color)
    }

    /// Find the id of a class by name.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.items
            .values()
            .find(|item| item.name == name)
            .map(|item| item.id)
    }

    /// Items in ascending id order.
    pub fn items(&self) -> impl Iterator<Item = &OntologyItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct OntologyFile {
    items: Vec<OntologyItemFile>,
}

#[derive(Deserialize, Debug)]
struct OntologyItemFile {
    id: u32,
    name: String,
    #[serde(default)]
    color: ColorFile,
    #[serde(default)]
    isthing: bool,
}

#[derive(Deserialize, Debug, Default)]
struct ColorFile {
    #[serde(default)]
    r: u8,
    #[serde(default)]
    g: u8,
    #[serde(default)]
    b: u8,
}

impl From<OntologyFile> for Ontology {
    fn from(file: OntologyFile) -> Self {
        Ontology::new(file.items.into_iter().map(|item| OntologyItem {
            id: item.id,
            name: item.name,
            color: [item.color.r, item.color.g, item.color.b],
            is_thing: item.isthing,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ontology_from_json() {
        let json = r#"{"items": [
            {"id": 0, "name": "Road", "color": {"r": 128, "g": 64, "b": 128}},
            {"id": 7, "name": "Car", "color": {"r": 0, "g": 0, "b": 142}, "isthing": true}
        ]}"#;
        let file: OntologyFile = serde_json::from_str(json).unwrap();
        let ontology = Ontology::from(file);

        assert_eq!(ontology.len(), 2);
        assert_eq!(ontology.name(7), Some("Car"));
        assert_eq!(ontology.color(0), Some([128, 64, 128]));
        assert!(ontology.get(7).unwrap().is_thing);
        assert!(!ontology.get(0).unwrap().is_thing);
        assert_eq!(ontology.id_of("Road"), Some(0));
        assert!(ontology.get(3).is_none());
    }

    #[test]
    fn test_items_sorted_by_id() {
        let ontology = Ontology::new([
            OntologyItem {
                id: 5,
                name: "b".into(),
                color: [0, 0, 0],
                is_thing: false,
            },
            OntologyItem {
                id: 1,
                name: "a".into(),
                color: [0, 0, 0],
                is_thing: false,
            },
        ]);
        let ids: Vec<u32> = ontology.items().map(|item| item.id).collect();
        assert_eq!(ids, vec![1, 5]);
    }
}
