//! In-memory register: one arena-backed table per entity type
//!
//! Tables keep every row of their sheet in order. Rows the codec could not
//! interpret are held as opaque cells and written back untouched, and so is
//! every decoded row that has not been modified since it was read. Deletes
//! leave a vacant slot, so they cost O(1); encoding skips vacant slots, which
//! gives the document its shift-up behaviour.

use std::collections::HashMap;

use crate::codec::relationship;
use crate::codec::sheet::Cell;
use crate::core::entity::Entity;
use crate::entities::{Control, Edge, Relationship, Risk, UseCase};

/// One row position of a table
#[derive(Debug, Clone)]
pub enum Slot<T> {
    /// A parsed entity plus any cells past the managed columns
    ///
    /// `original` holds the row as read until the record is modified; a
    /// record without it is encoded afresh.
    Record {
        record: T,
        extra: Vec<Cell>,
        original: Option<Vec<Cell>>,
    },
    /// A row kept verbatim
    Opaque(Vec<Cell>),
    /// A deleted row
    Vacant,
}

/// Ordered rows of one sheet with an id index
#[derive(Debug, Clone)]
pub struct Table<T: Entity> {
    slots: Vec<Slot<T>>,
    index: HashMap<T::Id, usize>,
    dirty: bool,
}

impl<T: Entity> Default for Table<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            dirty: false,
        }
    }
}

impl<T: Entity> Table<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Rows kept verbatim: unparsed rows and repeats of a record
    pub fn opaque_rows(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Opaque(_)))
            .count()
    }

    /// Modified since it was decoded or last persisted
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        let idx = *self.index.get(id)?;
        match &self.slots[idx] {
            Slot::Record { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Live records in row order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Record { record, .. } => Some(record),
            _ => None,
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &T::Id> {
        self.iter().map(Entity::id)
    }

    pub fn slots(&self) -> &[Slot<T>] {
        &self.slots
    }

    /// Append a record; returns it back if the id is taken
    pub fn insert(&mut self, record: T) -> Result<(), T> {
        if self.index.contains_key(record.id()) {
            return Err(record);
        }
        self.index.insert(record.id().clone(), self.slots.len());
        self.slots.push(Slot::Record {
            record,
            extra: Vec::new(),
            original: None,
        });
        self.dirty = true;
        Ok(())
    }

    /// Mutate a record in place; its id must not change
    pub fn update<F>(&mut self, id: &T::Id, f: F) -> Option<&T>
    where
        F: FnOnce(&mut T),
    {
        let idx = *self.index.get(id)?;
        match &mut self.slots[idx] {
            Slot::Record {
                record, original, ..
            } => {
                f(record);
                debug_assert!(record.id() == id, "record id changed during update");
                *original = None;
                self.dirty = true;
                Some(&*record)
            }
            _ => None,
        }
    }

    /// Delete a record, leaving its slot vacant
    pub fn remove(&mut self, id: &T::Id) -> Option<T> {
        let idx = self.index.remove(id)?;
        match std::mem::replace(&mut self.slots[idx], Slot::Vacant) {
            Slot::Record { record, .. } => {
                self.dirty = true;
                Some(record)
            }
            other => {
                self.slots[idx] = other;
                None
            }
        }
    }

    /// Remove every record for which `keep` is false; returns how many went
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let doomed: Vec<T::Id> = self
            .iter()
            .filter(|r| !keep(*r))
            .map(|r| r.id().clone())
            .collect();
        for id in &doomed {
            self.remove(id);
        }
        doomed.len()
    }

    /// Clear the dirty flag and drop vacant slots
    pub fn mark_clean(&mut self) {
        if self.slots.iter().any(|s| matches!(s, Slot::Vacant)) {
            self.slots.retain(|s| !matches!(s, Slot::Vacant));
            self.index = self
                .slots
                .iter()
                .enumerate()
                .filter_map(|(idx, slot)| match slot {
                    Slot::Record { record, .. } => Some((record.id().clone(), idx)),
                    _ => None,
                })
                .collect();
        }
        self.dirty = false;
    }

    /// Append a decoded record and the row it came from, without marking the table dirty
    pub(crate) fn push_record(&mut self, record: T, extra: Vec<Cell>, row: Vec<Cell>) {
        self.index.insert(record.id().clone(), self.slots.len());
        self.slots.push(Slot::Record {
            record,
            extra,
            original: Some(row),
        });
    }

    /// Drop verbatim rows matching `doomed`; returns how many went
    pub fn remove_opaque<F>(&mut self, mut doomed: F) -> usize
    where
        F: FnMut(&[Cell]) -> bool,
    {
        let mut removed = 0;
        for slot in self.slots.iter_mut() {
            if matches!(slot, Slot::Opaque(cells) if doomed(cells)) {
                *slot = Slot::Vacant;
                removed += 1;
            }
        }
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Append a verbatim row without marking the table dirty
    pub(crate) fn push_opaque(&mut self, cells: Vec<Cell>) {
        self.slots.push(Slot::Opaque(cells));
    }
}

/// Column layout of the risk sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RiskLayout {
    /// 17 columns, id first
    #[default]
    Keyed,
    /// 16 columns, ids derived from names
    Legacy,
}

/// The whole register document in memory
#[derive(Debug, Clone, Default)]
pub struct Register {
    pub risk_layout: RiskLayout,
    pub risks: Table<Risk>,
    pub controls: Table<Control>,
    pub use_cases: Table<UseCase>,
    pub relationships: Table<Relationship>,
}

impl Register {
    /// A register whose every table will be written, headers included
    pub fn new_document(layout: RiskLayout) -> Self {
        let mut register = Self {
            risk_layout: layout,
            ..Default::default()
        };
        register.risks.mark_dirty();
        register.controls.mark_dirty();
        register.use_cases.mark_dirty();
        register.relationships.mark_dirty();
        register
    }

    pub fn is_dirty(&self) -> bool {
        self.risks.is_dirty()
            || self.controls.is_dirty()
            || self.use_cases.is_dirty()
            || self.relationships.is_dirty()
    }

    pub fn mark_clean(&mut self) {
        self.risks.mark_clean();
        self.controls.mark_clean();
        self.use_cases.mark_clean();
        self.relationships.mark_clean();
    }

    /// Drop every edge with `id` at either end, repeated rows included
    pub fn remove_edges_touching(&mut self, id: &str) -> usize {
        let repeats = self
            .relationships
            .remove_opaque(|cells| relationship::row_edge(cells).is_some_and(|e| e.touches(id)));
        self.relationships.retain(|rel| !rel.edge.touches(id)) + repeats
    }

    /// Drop one edge and any repeated rows of it; false when it was not linked
    pub fn remove_edge(&mut self, edge: &Edge) -> bool {
        let repeats = self
            .relationships
            .remove_opaque(|cells| relationship::row_edge(cells).as_ref() == Some(edge));
        self.relationships.remove(edge).is_some() || repeats > 0
    }
}
