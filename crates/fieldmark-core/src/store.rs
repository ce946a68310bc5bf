//! In-memory field store
//!
//! An ordered, append-only collection of placed fields. Besides appending, the
//! only mutations are in-place value edits, explicit deletion, and relocation on
//! drag-and-drop. Records are never reordered.

use crate::field::{Field, FieldId, FieldKind};
use crate::placement::Placement;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldStore {
    next_id: FieldId,
    fields: Vec<Field>,
}

impl FieldStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            next_id: 1,
            fields: Vec::new(),
        }
    }

    /// Rebuild a store from a persisted field list.
    ///
    /// Records that could not have come from this store are dropped with a
    /// warning: repeated ids, page 0, non-finite coordinates, and the largest
    /// id (it leaves no successor to hand out). The id counter resumes after
    /// the largest id kept.
    pub fn from_fields(fields: Vec<Field>) -> Self {
        let mut seen = HashSet::with_capacity(fields.len());
        let mut kept = Vec::with_capacity(fields.len());
        for field in fields {
            let problem = if seen.contains(&field.id) {
                Some("duplicate id")
            } else if field.id.checked_add(1).is_none() {
                Some("id out of range")
            } else if field.page_number == 0 {
                Some("page 0")
            } else if !field.x.is_finite() || !field.y.is_finite() {
                Some("non-finite position")
            } else {
                None
            };
            if let Some(problem) = problem {
                tracing::warn!(field_id = field.id, problem, "Dropping persisted field");
                continue;
            }
            seen.insert(field.id);
            kept.push(field);
        }

        let next_id = kept
            .iter()
            .map(|f| f.id)
            .max()
            .and_then(|max| max.checked_add(1))
            .unwrap_or(1);
        Self {
            next_id,
            fields: kept,
        }
    }

    /// Append a new field and return a copy of it.
    ///
    /// Returns `None` without touching the store when `page_number` is outside
    /// `1..=total_pages`, or once the id space is exhausted.
    pub fn add_field(
        &mut self,
        kind: FieldKind,
        x: f64,
        y: f64,
        page_number: u32,
        total_pages: u32,
    ) -> Option<Field> {
        if page_number == 0 || page_number > total_pages {
            return None;
        }
        let following = self.next_id.checked_add(1)?;
        let field = Field::new(self.next_id, kind, x, y, page_number);
        self.next_id = following;
        self.fields.push(field.clone());
        Some(field)
    }

    /// Replace a text field's value.
    ///
    /// Unknown ids and non-text fields are ignored; only text carries a value.
    pub fn update_value(&mut self, id: FieldId, value: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(field) if field.kind == FieldKind::Text => {
                field.value = value.into();
                true
            }
            _ => false,
        }
    }

    /// Move a field to a new page position.
    pub fn relocate(&mut self, id: FieldId, placement: Placement) -> bool {
        match self.get_mut(id) {
            Some(field) => {
                field.page_number = placement.page_number;
                field.x = placement.x;
                field.y = placement.y;
                true
            }
            None => false,
        }
    }

    /// Delete a field by ID
    pub fn remove(&mut self, id: FieldId) -> bool {
        if let Some(pos) = self.fields.iter().position(|f| f.id == id) {
            self.fields.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }

    fn get_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == id)
    }

    /// All fields in insertion order
    pub fn list(&self) -> &[Field] {
        &self.fields
    }

    /// Get fields for a specific page
    pub fn fields_for_page(&self, page_number: u32) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| f.page_number == page_number)
            .collect()
    }

    /// Drop every field. Ids keep counting up.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialize as a flat list of field records
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let fields: Vec<Field> = serde_json::from_str(json)?;
        Ok(Self::from_fields(fields))
    }
}

impl Default for FieldStore {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: any valid page yields exactly one new record with a fresh id
        #[test]
        fn valid_add_appends_exactly_one(
            existing in 0usize..10,
            total_pages in 1u32..20,
            page_seed in 0u32..1000,
            x in -100.0f64..1000.0,
            y in -100.0f64..1000.0,
        ) {
            let mut store = FieldStore::new();
            for _ in 0..existing {
                store.add_field(FieldKind::Checkbox, 1.0, 1.0, 1, total_pages);
            }
            let page = page_seed % total_pages + 1;
            let before: Vec<FieldId> = store.list().iter().map(|f| f.id).collect();

            let added = store.add_field(FieldKind::Text, x, y, page, total_pages).unwrap();

            prop_assert_eq!(store.len(), existing + 1);
            prop_assert!(!before.contains(&added.id));
            let matching = store.list().iter().filter(|f| f.id == added.id).count();
            prop_assert_eq!(matching, 1);
            prop_assert_eq!(store.get(added.id).unwrap().page_number, page);
        }

        /// Property: out-of-range pages leave the store length unchanged
        #[test]
        fn invalid_add_is_noop(
            existing in 0usize..10,
            total_pages in 1u32..20,
            overshoot in 1u32..100,
        ) {
            let mut store = FieldStore::new();
            for _ in 0..existing {
                store.add_field(FieldKind::Radio, 1.0, 1.0, 1, total_pages);
            }
            prop_assert!(store.add_field(FieldKind::Text, 0.0, 0.0, total_pages + overshoot, total_pages).is_none());
            prop_assert!(store.add_field(FieldKind::Text, 0.0, 0.0, 0, total_pages).is_none());
            prop_assert_eq!(store.len(), existing);
        }
    }
}
