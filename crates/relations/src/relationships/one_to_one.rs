//! OneToOne Relationship - the foreign row holds the key, at most one match

use super::core::RelationshipCore;
use super::definition::{JoinOn, RelationshipDefinition, RelationshipKind};
use super::{CustomQuery, Relationship};
use crate::error::RelationResult;
use crate::mapper::MapperLocator;
use crate::record::{RecordRef, RelatedValue, Value};
use crate::tracker::PersistenceTracker;

/// One native record has one foreign record
#[derive(Debug, Clone)]
pub struct OneToOne {
    core: RelationshipCore,
}

impl OneToOne {
    pub fn new(
        name: impl Into<String>,
        locator: MapperLocator,
        native: impl Into<String>,
        foreign: impl Into<String>,
    ) -> Self {
        Self {
            core: RelationshipCore::new(name, locator, native, foreign),
        }
    }

    pub fn with_on(mut self, on: impl Into<JoinOn>) -> Self {
        self.core.set_on(on.into());
        self
    }

    /// Copy the native join columns onto the foreign record
    fn fix_foreign_record_keys(
        &self,
        native: &RecordRef,
        foreign: &RecordRef,
    ) -> RelationResult<()> {
        let on = self.core.join_on();
        RelationshipCore::copy_columns(native, &on.native_columns(), foreign, &on.foreign_columns())
    }
}

impl Relationship for OneToOne {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> RelationshipKind {
        RelationshipKind::OneToOne
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
        let native_columns = on.native_columns();
        let foreign_columns = on.foreign_columns();

        let foreign = self.core.fetch_foreign_records(
            native_records,
            &native_columns,
            &foreign_columns,
            custom,
        )?;
        let foreign = RelationshipCore::keyed(foreign, &foreign_columns)?;

        for native in native_records {
            let tuple = RelationshipCore::key_tuple(native, &native_columns)?;
            let found = self.core.matches(&tuple, &foreign).next().cloned();
            native.set_related(self.name(), found)?;
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
        let foreign = match native_record.related(self.name())? {
            RelatedValue::Record(foreign) => foreign,
            _ => return Ok(()),
        };

        self.fix_foreign_record_keys(native_record, &foreign)?;
        self.core.foreign_mapper()?.persist(&foreign, tracker)
    }

    fn definition(&self) -> RelationshipDefinition {
        self.core.definition(self.kind())
    }
}
