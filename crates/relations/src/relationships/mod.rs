//! Relationships Module - stitching and persistence cascades between mappers
//!
//! Every relationship kind implements [`Relationship`]. The plain kinds
//! (many-to-one, one-to-one, one-to-many, many-to-many) share a
//! [`RelationshipCore`]; [`ReferenceRelationship`] dispatches each native
//! record to a many-to-one delegate chosen by the record's reference column.

pub mod core;
pub mod definition;
pub mod many_to_many;
pub mod many_to_one;
pub mod one_to_many;
pub mod one_to_one;
pub mod reference;
pub mod set;

pub use self::core::RelationshipCore;
pub use definition::{
    JoinOn, JoinPair, ReferenceDefinition, RelationshipDefinition, RelationshipKind,
};
pub use many_to_many::ManyToMany;
pub use many_to_one::ManyToOne;
pub use one_to_many::OneToMany;
pub use one_to_one::OneToOne;
pub use reference::ReferenceRelationship;
pub use set::{AnyRelationship, MapperRelationships};

use std::fmt::Debug;

use crate::error::RelationResult;
use crate::mapper::ForeignQuery;
use crate::record::{RecordRef, Value};
use crate::tracker::PersistenceTracker;

/// Optional caller hook that adjusts the foreign query before it runs
pub type CustomQuery<'a> = Option<&'a dyn Fn(&mut ForeignQuery)>;

/// Contract shared by every relationship kind
pub trait Relationship: Send + Sync + Debug {
    /// Name of the related slot on native records
    fn name(&self) -> &str;

    fn kind(&self) -> RelationshipKind;

    fn native_mapper_class(&self) -> &str;

    /// Every foreign mapper class this relationship may load or persist
    fn foreign_mapper_classes(&self) -> Vec<&str>;

    /// Replace the join conditions
    fn on(&mut self, on: JoinOn) -> RelationResult<()>;

    /// Add a where clause to every foreign query
    fn where_clause(&mut self, condition: &str, bindings: Vec<Value>) -> RelationResult<()>;

    /// Compare join values case-insensitively
    fn ignore_case(&mut self, ignore_case: bool) -> RelationResult<()>;

    /// Load the related records for a batch of native records and attach
    /// them to each record's slot. An empty batch is a no-op.
    fn stitch_into_records(
        &self,
        native_records: &[RecordRef],
        custom: CustomQuery<'_>,
    ) -> RelationResult<()>;

    /// Bring the native record's own key columns in line with what is attached
    fn fix_native_record_keys(&self, native_record: &RecordRef) -> RelationResult<()>;

    /// Persist whatever is attached to the native record, skipping records
    /// already in `tracker`
    fn persist_foreign(
        &self,
        native_record: &RecordRef,
        tracker: &mut PersistenceTracker,
    ) -> RelationResult<()>;

    /// Declarative form of this relationship
    fn definition(&self) -> RelationshipDefinition;

    fn persists_before_native(&self) -> bool {
        self.kind().persists_before_native()
    }
}
