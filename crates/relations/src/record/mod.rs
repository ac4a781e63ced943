//! Record System - Rows plus related slots, shared by identity
//!
//! A [`Record`] pairs a [`Row`] of column values with the [`Related`] slots
//! its mapper declares. Records are handled through [`RecordRef`], a shared
//! handle whose identity is the allocation itself: two records with equal
//! field values are still two records.
//!
//! - `value`: scalar values and loose key comparison
//! - `row`: column storage, identity columns and row status
//! - `related`: relationship slots and record sets

pub mod related;
pub mod row;
pub mod value;

pub use related::{RecordSet, Related, RelatedValue};
pub use row::{Row, RowStatus};
pub use value::Value;

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{RelationResult, RelationshipError};

/// A mapped record: one row and its relationship slots
#[derive(Debug)]
pub struct Record {
    row: Row,
    related: Related,
}

impl Record {
    pub fn new(row: Row, related: Related) -> Self {
        Self { row, related }
    }

    /// The mapper class tag this record belongs to
    pub fn mapper_class(&self) -> &str {
        self.row.table()
    }

    pub fn row(&self) -> &Row {
        &self.row
    }

    pub fn row_mut(&mut self) -> &mut Row {
        &mut self.row
    }

    pub fn get(&self, col: &str) -> RelationResult<&Value> {
        self.row.get(col)
    }

    pub fn set(&mut self, col: &str, value: impl Into<Value>) -> RelationResult<()> {
        self.row.set(col, value)
    }

    pub fn has(&self, col: &str) -> bool {
        self.row.has(col)
    }

    pub fn unset(&mut self, col: &str) -> RelationResult<()> {
        self.row.unset(col)
    }

    pub fn related(&self, name: &str) -> RelationResult<&RelatedValue> {
        self.related
            .get(name)
            .ok_or_else(|| RelationshipError::missing_related(self.mapper_class(), name))
    }

    pub fn related_mut(&mut self, name: &str) -> RelationResult<&mut RelatedValue> {
        let mapper = self.row.table().to_string();
        self.related
            .get_mut(name)
            .ok_or_else(|| RelationshipError::missing_related(&mapper, name))
    }

    pub fn set_related(
        &mut self,
        name: &str,
        value: impl Into<RelatedValue>,
    ) -> RelationResult<()> {
        if self.related.set(name, value.into()) {
            Ok(())
        } else {
            Err(RelationshipError::missing_related(self.mapper_class(), name))
        }
    }

    pub fn related_slots(&self) -> &Related {
        &self.related
    }

    /// Null every related slot
    pub fn clear_related(&mut self) {
        self.related.clear();
    }

    pub fn into_ref(self) -> RecordRef {
        RecordRef::new(self)
    }
}

/// Instance identity of a record, stable while any handle to it is alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordIdentity(usize);

/// Shared handle to a [`Record`]
///
/// Locks are never held across relationship calls, so cyclic graphs
/// (a record reachable from itself) can be walked without deadlocking.
///
/// Handles are strong: a cycle through related slots, such as a post holding
/// its comments while each comment holds the post, keeps every record in it
/// alive after the host drops its handles. Call [`RecordRef::detach_related`]
/// on the records of a graph to release it; [`crate::MemoryStore::clear`]
/// does so for every stored row.
#[derive(Clone)]
pub struct RecordRef(Arc<RwLock<Record>>);

impl RecordRef {
    pub fn new(record: Record) -> Self {
        Self(Arc::new(RwLock::new(record)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.0.write()
    }

    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity(Arc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn ptr_eq(&self, other: &RecordRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn mapper_class(&self) -> String {
        self.read().mapper_class().to_string()
    }

    pub fn get(&self, col: &str) -> RelationResult<Value> {
        self.read().get(col).cloned()
    }

    pub fn set(&self, col: &str, value: impl Into<Value>) -> RelationResult<()> {
        self.write().set(col, value)
    }

    /// Clone of a slot's value; record handles inside are shared, not copied
    pub fn related(&self, name: &str) -> RelationResult<RelatedValue> {
        self.read().related(name).cloned()
    }

    pub fn set_related(&self, name: &str, value: impl Into<RelatedValue>) -> RelationResult<()> {
        self.write().set_related(name, value)
    }

    /// Null every related slot, dropping this record's handles to others
    pub fn detach_related(&self) {
        self.write().clear_related();
    }

    /// Non-owning handle to the record
    pub fn downgrade(&self) -> Weak<RwLock<Record>> {
        Arc::downgrade(&self.0)
    }
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // shallow: related slots may point back at this record
        let mut debug = f.debug_struct("RecordRef");
        debug.field("identity", &self.identity());
        if let Some(record) = self.0.try_read() {
            debug
                .field("mapper", &record.mapper_class())
                .field("key", &record.row().identity_values());
        }
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn comment() -> RecordRef {
        Record::new(
            Row::new(
                "Comments",
                vec!["id".to_string()],
                vec![("commentable_type".to_string(), json!("post"))],
            ),
            Related::new(["commentable"]),
        )
        .into_ref()
    }

    #[test]
    fn test_identity_is_by_instance() {
        let a = comment();
        let b = comment();
        assert_ne!(a.identity(), b.identity());
        assert_eq!(a.identity(), a.clone().identity());
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_related_slots_are_validated() {
        let record = comment();
        assert!(record.related("commentable").unwrap().is_null());
        assert_eq!(
            record.related("author").unwrap_err().kind(),
            ErrorKind::MissingRelated
        );
        assert_eq!(
            record.set_related("author", RelatedValue::Null).unwrap_err().kind(),
            ErrorKind::MissingRelated
        );
    }

    #[test]
    fn test_detach_related_releases_cycles() {
        let first = comment();
        let second = comment();
        first.set_related("commentable", second.clone()).unwrap();
        second.set_related("commentable", first.clone()).unwrap();
        let (first_weak, second_weak) = (first.downgrade(), second.downgrade());

        first.detach_related();
        assert!(first.related("commentable").unwrap().is_null());
        assert!(first.read().related_slots().has("commentable"));

        drop(first);
        drop(second);
        assert!(first_weak.upgrade().is_none());
        assert!(second_weak.upgrade().is_none());
    }

    #[test]
    fn test_debug_survives_self_reference() {
        let record = comment();
        record.set_related("commentable", record.clone()).unwrap();
        let rendered = format!("{:?}", record.read());
        assert!(rendered.contains("Comments"));
    }
}
