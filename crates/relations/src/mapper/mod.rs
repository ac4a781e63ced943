//! Mapper Contract - the table layer the relationships plug into
//!
//! - `query`: declarative foreign selects built while stitching
//! - `locator`: class tag to mapper lookup
//! - `memory`: in-memory table mapper

pub mod locator;
pub mod memory;
pub mod query;

pub use locator::MapperLocator;
pub use memory::{MemoryMapper, MemoryStore, WriteAction, WriteEvent};
pub use query::{ForeignQuery, WhereClause};

use tracing::trace;

use crate::error::{RelationResult, RelationshipError};
use crate::record::RecordRef;
use crate::relationships::MapperRelationships;
use crate::tracker::PersistenceTracker;

/// Loads and writes records of one class, and owns that class's relationships
pub trait Mapper: Send + Sync {
    /// Class tag of the records this mapper handles
    fn mapper_class(&self) -> &str;

    /// Relationships declared on this mapper
    fn relationships(&self) -> &MapperRelationships;

    /// Load the records matching a query, without stitching
    fn select(&self, query: &ForeignQuery) -> RelationResult<Vec<RecordRef>>;

    /// Insert, update or delete one record's row according to its status
    fn write(&self, record: &RecordRef) -> RelationResult<()>;

    /// Load records and eagerly stitch the relationships named by the query
    fn fetch_records(&self, query: &ForeignQuery) -> RelationResult<Vec<RecordRef>> {
        let records = self.select(query)?;
        self.relationships().stitch(&records, query.with_names())?;
        Ok(records)
    }

    /// Persist a record and cascade through its relationships.
    ///
    /// Records already in `tracker` are skipped, which keeps cyclic graphs
    /// finite. Many-to-one style relationships are persisted first so their
    /// keys can be copied onto the native row before it is written.
    fn persist(&self, record: &RecordRef, tracker: &mut PersistenceTracker) -> RelationResult<()> {
        let class = record.mapper_class();
        if class != self.mapper_class() {
            return Err(RelationshipError::Configuration(format!(
                "Mapper {} cannot persist a record of {}",
                self.mapper_class(),
                class
            )));
        }

        if !tracker.visit(record) {
            trace!(
                "{} record {:?} already persisted in this pass",
                self.mapper_class(),
                record.identity()
            );
            return Ok(());
        }

        let relationships = self.relationships();
        relationships.persist_before_native(record, tracker)?;
        relationships.fix_native_record_keys(record)?;
        self.write(record)?;
        relationships.persist_after_native(record, tracker)?;
        Ok(())
    }

    /// Persist a record graph with a fresh tracker; returns the tracker
    fn save(&self, record: &RecordRef) -> RelationResult<PersistenceTracker> {
        let mut tracker = PersistenceTracker::new();
        self.persist(record, &mut tracker)?;
        Ok(tracker)
    }
}
