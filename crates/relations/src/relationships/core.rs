//! Relationship Core - state and helpers shared by the plain relationship kinds

use std::sync::Arc;

use tracing::debug;

use super::definition::{JoinOn, RelationshipDefinition, RelationshipKind};
use super::CustomQuery;
use crate::error::{RelationResult, RelationshipError};
use crate::mapper::{ForeignQuery, Mapper, MapperLocator, WhereClause};
use crate::record::value::{match_key, values_match, Value};
use crate::record::RecordRef;

/// Name, mappers, join conditions and query customization of one relationship
#[derive(Debug, Clone)]
pub struct RelationshipCore {
    name: String,
    locator: MapperLocator,
    native: String,
    foreign: String,
    on: JoinOn,
    wheres: Vec<WhereClause>,
    ignore_case: bool,
}

impl RelationshipCore {
    pub fn new(
        name: impl Into<String>,
        locator: MapperLocator,
        native: impl Into<String>,
        foreign: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            locator,
            native: native.into(),
            foreign: foreign.into(),
            on: JoinOn::default(),
            wheres: Vec::new(),
            ignore_case: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn native_mapper_class(&self) -> &str {
        &self.native
    }

    pub fn foreign_mapper_class(&self) -> &str {
        &self.foreign
    }

    pub fn join_on(&self) -> &JoinOn {
        &self.on
    }

    pub fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    pub fn is_ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn set_on(&mut self, on: JoinOn) {
        self.on = on;
    }

    pub fn add_where(&mut self, condition: &str, bindings: Vec<Value>) {
        self.wheres.push(WhereClause::new(condition, bindings));
    }

    pub fn set_ignore_case(&mut self, ignore_case: bool) {
        self.ignore_case = ignore_case;
    }

    pub fn foreign_mapper(&self) -> RelationResult<Arc<dyn Mapper>> {
        self.locator.get(&self.foreign)
    }

    /// Join conditions, or a configuration error when none were declared
    pub fn require_on(&self) -> RelationResult<&JoinOn> {
        if self.on.is_empty() {
            return Err(RelationshipError::Configuration(format!(
                "Relationship '{}' on {} has no join conditions",
                self.name, self.native
            )));
        }
        Ok(&self.on)
    }

    /// Values of `columns` on a record, in column order
    pub fn key_tuple(record: &RecordRef, columns: &[String]) -> RelationResult<Vec<Value>> {
        let guard = record.read();
        let tuple = columns
            .iter()
            .map(|col| guard.get(col).cloned())
            .collect::<RelationResult<Vec<Value>>>();
        tuple
    }

    /// Fetch foreign records whose `foreign_columns` match the `source_columns`
    /// of any source record. Sources with a null key are skipped; when none
    /// remain the foreign mapper is not queried at all.
    pub fn fetch_foreign_records(
        &self,
        sources: &[RecordRef],
        source_columns: &[String],
        foreign_columns: &[String],
        custom: CustomQuery<'_>,
    ) -> RelationResult<Vec<RecordRef>> {
        let mut seen = std::collections::HashSet::new();
        let mut keys = Vec::new();
        for source in sources {
            let tuple = Self::key_tuple(source, source_columns)?;
            let normalized: Option<Vec<String>> = tuple
                .iter()
                .map(|value| match_key(value, self.ignore_case))
                .collect();
            if let Some(normalized) = normalized {
                if seen.insert(normalized) {
                    keys.push(tuple);
                }
            }
        }

        if keys.is_empty() {
            debug!("Relationship '{}' on {} has no keys to fetch", self.name, self.native);
            return Ok(Vec::new());
        }

        let mut query = ForeignQuery::new(self.foreign.clone());
        query
            .match_keys(foreign_columns.to_vec(), keys)
            .ignore_case(self.ignore_case);
        for clause in &self.wheres {
            query.where_clause(clause.condition.clone(), clause.bindings.clone());
        }
        if let Some(custom) = custom {
            custom(&mut query);
        }

        debug!(
            "Relationship '{}' on {} fetching {} key(s) from {}",
            self.name,
            self.native,
            query.keys().len(),
            self.foreign
        );
        self.foreign_mapper()?.fetch_records(&query)
    }

    /// Pair each foreign record with its values for `foreign_columns`
    pub fn keyed(
        foreign_records: Vec<RecordRef>,
        foreign_columns: &[String],
    ) -> RelationResult<Vec<(RecordRef, Vec<Value>)>> {
        foreign_records
            .into_iter()
            .map(|record| {
                let tuple = Self::key_tuple(&record, foreign_columns)?;
                Ok((record, tuple))
            })
            .collect()
    }

    pub fn tuples_match(&self, native: &[Value], foreign: &[Value]) -> bool {
        native.len() == foreign.len()
            && native
                .iter()
                .zip(foreign)
                .all(|(a, b)| values_match(a, b, self.ignore_case))
    }

    /// Foreign records whose key tuple matches the given native tuple, in order
    pub fn matches<'a>(
        &'a self,
        native: &'a [Value],
        foreign: &'a [(RecordRef, Vec<Value>)],
    ) -> impl Iterator<Item = &'a RecordRef> + 'a {
        foreign
            .iter()
            .filter(move |(_, tuple)| self.tuples_match(native, tuple))
            .map(|(record, _)| record)
    }

    /// Copy `from_columns` of one record into `to_columns` of another
    pub fn copy_columns(
        from: &RecordRef,
        from_columns: &[String],
        to: &RecordRef,
        to_columns: &[String],
    ) -> RelationResult<()> {
        let values = Self::key_tuple(from, from_columns)?;
        let mut guard = to.write();
        for (col, value) in to_columns.iter().zip(values) {
            guard.set(col, value)?;
        }
        Ok(())
    }

    pub fn definition(&self, kind: RelationshipKind) -> RelationshipDefinition {
        let mut definition = RelationshipDefinition::new(
            kind,
            self.name.clone(),
            self.native.clone(),
            self.foreign.clone(),
            self.on.clone(),
        );
        definition.wheres = self.wheres.clone();
        definition.ignore_case = self.ignore_case;
        definition
    }
}
