//! ManyToMany Relationship - foreign records reached through an association
//!
//! The `through` relationship (usually a one-to-many onto an association
//! mapper) must be stitched first; its records carry the keys used to find
//! the foreign records. Join conditions map through-record columns to foreign
//! columns.

use super::core::RelationshipCore;
use super::definition::{JoinOn, RelationshipDefinition, RelationshipKind};
use super::{CustomQuery, Relationship};
use crate::error::{RelationResult, RelationshipError};
use crate::mapper::MapperLocator;
use crate::record::{RecordRef, RecordSet, RelatedValue, Value};
use crate::tracker::PersistenceTracker;

/// Native records related to foreign records via association records
#[derive(Debug, Clone)]
pub struct ManyToMany {
    core: RelationshipCore,
    through: String,
}

impl ManyToMany {
    pub fn new(
        name: impl Into<String>,
        locator: MapperLocator,
        native: impl Into<String>,
        foreign: impl Into<String>,
        through: impl Into<String>,
    ) -> Self {
        Self {
            core: RelationshipCore::new(name, locator, native, foreign),
            through: through.into(),
        }
    }

    pub fn with_on(mut self, on: impl Into<JoinOn>) -> Self {
        self.core.set_on(on.into());
        self
    }

    /// Name of the association relationship on the native mapper
    pub fn through(&self) -> &str {
        &self.through
    }

    fn through_records(&self, native: &RecordRef) -> RelationResult<RecordSet> {
        match native.related(&self.through)? {
            RelatedValue::RecordSet(set) => Ok(set),
            _ => Err(RelationshipError::ThroughNotFetched {
                mapper: self.core.native_mapper_class().to_string(),
                name: self.core.name().to_string(),
                through: self.through.clone(),
            }),
        }
    }
}

impl Relationship for ManyToMany {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> RelationshipKind {
        RelationshipKind::ManyToMany
    }

    fn native_mapper_class(&self) -> &str {
        self.core.native_mapper_class()
    }

    fn foreign_mapper_classes(&self) -> Vec<&str> {
        vec![self.core.foreign_mapper_class()]
    }

    fn on(&mut self, on: JoinOn) -> RelationResult<()> {
        self.core.set_on(on);
        Ok(())
    }

    fn where_clause(&mut self, condition: &str, bindings: Vec<Value>) -> RelationResult<()> {
        self.core.add_where(condition, bindings);
        Ok(())
    }

    fn ignore_case(&mut self, ignore_case: bool) -> RelationResult<()> {
        self.core.set_ignore_case(ignore_case);
        Ok(())
    }

    fn stitch_into_records(
        &self,
        native_records: &[RecordRef],
        custom: CustomQuery<'_>,
    ) -> RelationResult<()> {
        if native_records.is_empty() {
            return Ok(());
        }

        let on = self.core.require_on()?;
        let through_columns = on.native_columns();
        let foreign_columns = on.foreign_columns();

        let through_sets = native_records
            .iter()
            .map(|native| self.through_records(native))
            .collect::<RelationResult<Vec<_>>>()?;
        let all_through: Vec<RecordRef> = through_sets
            .iter()
            .flat_map(|set| set.iter().cloned())
            .collect();

        let foreign = self.core.fetch_foreign_records(
            &all_through,
            &through_columns,
            &foreign_columns,
            custom,
        )?;
        let foreign = RelationshipCore::keyed(foreign, &foreign_columns)?;

        for (native, through) in native_records.iter().zip(&through_sets) {
            let mut matched = Vec::new();
            for record in through {
                let tuple = RelationshipCore::key_tuple(record, &through_columns)?;
                let found = self.core.matches(&tuple, &foreign).next().cloned();
                if let Some(found) = found {
                    matched.push(found);
                }
            }
            let set = RecordSet::new(self.core.foreign_mapper_class(), matched);
            native.set_related(self.name(), set)?;
        }
        Ok(())
    }

    fn fix_native_record_keys(&self, _native_record: &RecordRef) -> RelationResult<()> {
        Ok(())
    }

    fn persist_foreign(
        &self,
        native_record: &RecordRef,
        tracker: &mut PersistenceTracker,
    ) -> RelationResult<()> {
        let set = match native_record.related(self.name())? {
            RelatedValue::RecordSet(set) => set,
            _ => return Ok(()),
        };
        if set.is_empty() {
            return Ok(());
        }

        let mapper = self.core.foreign_mapper()?;
        for foreign in &set {
            mapper.persist(foreign, tracker)?;
        }
        Ok(())
    }

    fn definition(&self) -> RelationshipDefinition {
        self.core
            .definition(self.kind())
            .with_through(self.through.clone())
    }
}
