//! Related slots - named holders for stitched foreign records

use super::{RecordIdentity, RecordRef, RowStatus};

/// What a relationship slot on a record currently holds
#[derive(Debug, Clone, Default)]
pub enum RelatedValue {
    /// Nothing loaded or attached
    #[default]
    Null,
    /// A single related record (to-one relationships)
    Record(RecordRef),
    /// An ordered collection of related records (to-many relationships)
    RecordSet(RecordSet),
}

impl RelatedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_record(&self) -> Option<&RecordRef> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_record_set(&self) -> Option<&RecordSet> {
        match self {
            Self::RecordSet(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_record_set_mut(&mut self) -> Option<&mut RecordSet> {
        match self {
            Self::RecordSet(set) => Some(set),
            _ => None,
        }
    }
}

impl From<RecordRef> for RelatedValue {
    fn from(record: RecordRef) -> Self {
        Self::Record(record)
    }
}

impl From<Option<RecordRef>> for RelatedValue {
    fn from(record: Option<RecordRef>) -> Self {
        record.map_or(Self::Null, Self::Record)
    }
}

impl From<RecordSet> for RelatedValue {
    fn from(set: RecordSet) -> Self {
        Self::RecordSet(set)
    }
}

/// Ordered collection of records from one mapper
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    mapper: String,
    records: Vec<RecordRef>,
}

impl RecordSet {
    pub fn new(mapper: impl Into<String>, records: Vec<RecordRef>) -> Self {
        Self {
            mapper: mapper.into(),
            records,
        }
    }

    pub fn mapper_class(&self) -> &str {
        &self.mapper
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RecordRef> {
        self.records.get(index)
    }

    pub fn push(&mut self, record: RecordRef) {
        self.records.push(record);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecordRef> {
        self.records.iter()
    }

    pub fn records(&self) -> &[RecordRef] {
        &self.records
    }

    /// Identities of the records whose rows were deleted
    pub fn deleted(&self) -> Vec<RecordIdentity> {
        self.records
            .iter()
            .filter(|record| record.read().row().status() == RowStatus::Deleted)
            .map(RecordRef::identity)
            .collect()
    }

    /// Remove the given records from the set; returns how many were removed
    pub fn detach(&mut self, identities: &[RecordIdentity]) -> usize {
        let before = self.records.len();
        self.records
            .retain(|record| !identities.contains(&record.identity()));
        before - self.records.len()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a RecordRef;
    type IntoIter = std::slice::Iter<'a, RecordRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Fixed set of named relationship slots on one record
#[derive(Debug, Clone, Default)]
pub struct Related {
    slots: Vec<(String, RelatedValue)>,
}

impl Related {
    /// Create empty (null) slots for the given relationship names
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: names
                .into_iter()
                .map(|name| (name.into(), RelatedValue::Null))
                .collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(name, _)| name.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.slots.iter().any(|(slot, _)| slot == name)
    }

    pub fn get(&self, name: &str) -> Option<&RelatedValue> {
        self.slots
            .iter()
            .find(|(slot, _)| slot == name)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RelatedValue> {
        self.slots
            .iter_mut()
            .find(|(slot, _)| slot == name)
            .map(|(_, value)| value)
    }

    /// Reset every slot to null
    pub fn clear(&mut self) {
        for (_, value) in &mut self.slots {
            *value = RelatedValue::Null;
        }
    }

    /// Replace a slot's value; returns false when the slot does not exist
    pub fn set(&mut self, name: &str, value: RelatedValue) -> bool {
        match self.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
