//! # elif-relations: Relationship Resolution for elif.rs
//!
//! Eager loading ("stitching") of related records and cycle-safe persistence
//! cascades across mapper relationships, including polymorphic
//! many-to-one-by-reference relationships whose foreign mapper is chosen per
//! record by a reference column.
//!
//! Mappers plug in through the [`Mapper`] trait and are looked up by class
//! tag through a [`MapperLocator`]. [`MemoryMapper`] is an in-memory table
//! implementation for development and testing.

pub mod error;
pub mod manifest;
pub mod mapper;
pub mod record;
pub mod relationships;
pub mod tracker;

// Re-export core traits and types
pub use error::*;
pub use manifest::{MapperDefinition, RelationshipManifest};
pub use mapper::{
    ForeignQuery, Mapper, MapperLocator, MemoryMapper, MemoryStore, WhereClause, WriteAction,
    WriteEvent,
};
pub use record::{
    Record, RecordIdentity, RecordRef, RecordSet, Related, RelatedValue, Row, RowStatus, Value,
};
pub use relationships::{
    AnyRelationship, CustomQuery, JoinOn, JoinPair, ManyToMany, ManyToOne, MapperRelationships,
    OneToMany, OneToOne, ReferenceDefinition, ReferenceRelationship, Relationship,
    RelationshipDefinition, RelationshipKind,
};
pub use tracker::PersistenceTracker;
