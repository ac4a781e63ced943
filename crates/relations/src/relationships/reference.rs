//! Reference Relationship - polymorphic many-to-one chosen by a column value
//!
//! A native record names its foreign mapper indirectly: the value of the
//! reference column selects one of several registered many-to-one delegates,
//! each with its own foreign mapper and join conditions. The set of delegates
//! is closed once configured, so `on`, `where` and `ignore_case` are rejected.
//!
//! Before keys are fixed or foreign records persisted, the reference column is
//! repaired from whatever record is actually attached to the slot.

use std::collections::HashMap;

use tracing::debug;

use super::definition::{JoinOn, ReferenceDefinition, RelationshipDefinition, RelationshipKind};
use super::many_to_one::ManyToOne;
use super::{CustomQuery, Relationship};
use crate::error::{RelationResult, RelationshipError};
use crate::mapper::MapperLocator;
use crate::record::value::scalar_key;
use crate::record::{RecordRef, RelatedValue, Value};
use crate::tracker::PersistenceTracker;

/// Many-to-one relationship whose foreign mapper is picked per record
#[derive(Debug, Clone)]
pub struct ReferenceRelationship {
    name: String,
    locator: MapperLocator,
    native: String,
    reference_column: String,
    references: Vec<(String, ManyToOne)>,
}

impl ReferenceRelationship {
    pub fn new(
        name: impl Into<String>,
        locator: MapperLocator,
        native: impl Into<String>,
        reference_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            locator,
            native: native.into(),
            reference_column: reference_column.into(),
            references: Vec::new(),
        }
    }

    /// Register the delegate used when the reference column holds `value`.
    ///
    /// Registering a value twice replaces its delegate in place.
    pub fn to(
        &mut self,
        value: impl Into<String>,
        foreign: impl Into<String>,
        on: impl Into<JoinOn>,
    ) -> &mut Self {
        let value = value.into();
        let delegate = ManyToOne::new(
            self.name.clone(),
            self.locator.clone(),
            self.native.clone(),
            foreign,
        )
        .with_on(on);

        debug!(
            "Reference '{}' on {}: '{}' -> {}",
            self.name,
            self.native,
            value,
            delegate.foreign_mapper_class()
        );

        match self.references.iter_mut().find(|(existing, _)| *existing == value) {
            Some((_, slot)) => *slot = delegate,
            None => self.references.push((value, delegate)),
        }
        self
    }

    pub fn reference_column(&self) -> &str {
        &self.reference_column
    }

    /// Registered values and their delegates, in registration order
    pub fn references(&self) -> impl Iterator<Item = (&str, &ManyToOne)> {
        self.references
            .iter()
            .map(|(value, delegate)| (value.as_str(), delegate))
    }

    /// The delegate registered for a reference value
    pub fn get_reference(&self, value: Option<&str>) -> RelationResult<&ManyToOne> {
        value
            .and_then(|value| {
                self.references
                    .iter()
                    .find(|(registered, _)| registered == value)
                    .map(|(_, delegate)| delegate)
            })
            .ok_or_else(|| RelationshipError::no_such_reference(&self.native, value))
    }

    /// Current reference value of a native record; `None` when null
    pub fn reference_value(&self, native_record: &RecordRef) -> RelationResult<Option<String>> {
        let value = native_record.get(&self.reference_column)?;
        Ok(scalar_key(&value))
    }

    fn delegate_for(&self, native_record: &RecordRef) -> RelationResult<&ManyToOne> {
        let value = self.reference_value(native_record)?;
        self.get_reference(value.as_deref())
    }

    /// Point the reference column at the delegate whose foreign mapper matches
    /// the attached record. Nothing attached, or no matching delegate, leaves
    /// the column as it is.
    pub fn fix_native_reference_value(&self, native_record: &RecordRef) -> RelationResult<()> {
        let foreign = match native_record.related(&self.name)? {
            RelatedValue::Record(foreign) => foreign,
            _ => return Ok(()),
        };

        let class = foreign.mapper_class();
        let found = self
            .references
            .iter()
            .find(|(_, delegate)| delegate.foreign_mapper_class() == class);

        if let Some((value, _)) = found {
            debug!(
                "Reference '{}' on {}: attached {} sets {} = '{}'",
                self.name, self.native, class, self.reference_column, value
            );
            native_record.set(&self.reference_column, Value::String(value.clone()))?;
        }
        Ok(())
    }
}

impl Relationship for ReferenceRelationship {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RelationshipKind {
        RelationshipKind::ManyToOneByReference
    }

    fn native_mapper_class(&self) -> &str {
        &self.native
    }

    fn foreign_mapper_classes(&self) -> Vec<&str> {
        self.references
            .iter()
            .map(|(_, delegate)| delegate.foreign_mapper_class())
            .collect()
    }

    fn on(&mut self, _on: JoinOn) -> RelationResult<()> {
        Err(RelationshipError::invalid_reference_method("on"))
    }

    fn where_clause(&mut self, _condition: &str, _bindings: Vec<Value>) -> RelationResult<()> {
        Err(RelationshipError::invalid_reference_method("where"))
    }

    fn ignore_case(&mut self, _ignore_case: bool) -> RelationResult<()> {
        Err(RelationshipError::invalid_reference_method("ignore_case"))
    }

    fn stitch_into_records(
        &self,
        native_records: &[RecordRef],
        custom: CustomQuery<'_>,
    ) -> RelationResult<()> {
        if native_records.is_empty() {
            return Ok(());
        }

        let mut index: HashMap<Option<String>, usize> = HashMap::new();
        let mut groups: Vec<(Option<String>, Vec<RecordRef>)> = Vec::new();
        for native in native_records {
            let value = self.reference_value(native)?;
            match index.get(&value) {
                Some(&at) => groups[at].1.push(native.clone()),
                None => {
                    index.insert(value.clone(), groups.len());
                    groups.push((value, vec![native.clone()]));
                }
            }
        }

        // resolve every group first so an unknown value stitches nothing
        let resolved = groups
            .iter()
            .map(|(value, records)| {
                self.get_reference(value.as_deref())
                    .map(|delegate| (delegate, records))
            })
            .collect::<RelationResult<Vec<_>>>()?;

        for (delegate, records) in resolved {
            debug!(
                "Reference '{}' on {}: stitching {} record(s) from {}",
                self.name,
                self.native,
                records.len(),
                delegate.foreign_mapper_class()
            );
            delegate.stitch_into_records(records, custom)?;
        }
        Ok(())
    }

    fn fix_native_record_keys(&self, native_record: &RecordRef) -> RelationResult<()> {
        self.fix_native_reference_value(native_record)?;
        self.delegate_for(native_record)?
            .fix_native_record_keys(native_record)
    }

    fn persist_foreign(
        &self,
        native_record: &RecordRef,
        tracker: &mut PersistenceTracker,
    ) -> RelationResult<()> {
        self.fix_native_reference_value(native_record)?;
        self.delegate_for(native_record)?
            .persist_foreign(native_record, tracker)
    }

    fn definition(&self) -> RelationshipDefinition {
        let references = self
            .references
            .iter()
            .map(|(value, delegate)| ReferenceDefinition {
                value: value.clone(),
                foreign: delegate.foreign_mapper_class().to_string(),
                on: delegate.join_on().clone(),
            })
            .collect();
        RelationshipDefinition::reference(
            self.name.clone(),
            self.native.clone(),
            self.reference_column.clone(),
            references,
        )
    }
}
