//! Mapper Relationships - the ordered set of relationships declared on one mapper

use tracing::debug;

use super::definition::{JoinOn, RelationshipDefinition, RelationshipKind};
use super::{
    CustomQuery, ManyToMany, ManyToOne, OneToMany, OneToOne, ReferenceRelationship, Relationship,
};
use crate::error::{RelationResult, RelationshipError};
use crate::mapper::MapperLocator;
use crate::record::{RecordRef, Related, Value};
use crate::tracker::PersistenceTracker;

/// Any concrete relationship kind
#[derive(Debug, Clone)]
pub enum AnyRelationship {
    ManyToOne(ManyToOne),
    OneToOne(OneToOne),
    OneToMany(OneToMany),
    ManyToMany(ManyToMany),
    Reference(ReferenceRelationship),
}

impl AnyRelationship {
    fn inner(&self) -> &dyn Relationship {
        match self {
            Self::ManyToOne(rel) => rel,
            Self::OneToOne(rel) => rel,
            Self::OneToMany(rel) => rel,
            Self::ManyToMany(rel) => rel,
            Self::Reference(rel) => rel,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Relationship {
        match self {
            Self::ManyToOne(rel) => rel,
            Self::OneToOne(rel) => rel,
            Self::OneToMany(rel) => rel,
            Self::ManyToMany(rel) => rel,
            Self::Reference(rel) => rel,
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceRelationship> {
        match self {
            Self::Reference(rel) => Some(rel),
            _ => None,
        }
    }

    pub fn as_reference_mut(&mut self) -> Option<&mut ReferenceRelationship> {
        match self {
            Self::Reference(rel) => Some(rel),
            _ => None,
        }
    }

    /// Name of the relationship a many-to-many goes through
    pub fn through(&self) -> Option<&str> {
        match self {
            Self::ManyToMany(rel) => Some(rel.through()),
            _ => None,
        }
    }
}

impl Relationship for AnyRelationship {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn kind(&self) -> RelationshipKind {
        self.inner().kind()
    }

    fn native_mapper_class(&self) -> &str {
        self.inner().native_mapper_class()
    }

    fn foreign_mapper_classes(&self) -> Vec<&str> {
        self.inner().foreign_mapper_classes()
    }

    fn on(&mut self, on: JoinOn) -> RelationResult<()> {
        self.inner_mut().on(on)
    }

    fn where_clause(&mut self, condition: &str, bindings: Vec<Value>) -> RelationResult<()> {
        self.inner_mut().where_clause(condition, bindings)
    }

    fn ignore_case(&mut self, ignore_case: bool) -> RelationResult<()> {
        self.inner_mut().ignore_case(ignore_case)
    }

    fn stitch_into_records(
        &self,
        native_records: &[RecordRef],
        custom: CustomQuery<'_>,
    ) -> RelationResult<()> {
        self.inner().stitch_into_records(native_records, custom)
    }

    fn fix_native_record_keys(&self, native_record: &RecordRef) -> RelationResult<()> {
        self.inner().fix_native_record_keys(native_record)
    }

    fn persist_foreign(
        &self,
        native_record: &RecordRef,
        tracker: &mut PersistenceTracker,
    ) -> RelationResult<()> {
        self.inner().persist_foreign(native_record, tracker)
    }

    fn definition(&self) -> RelationshipDefinition {
        self.inner().definition()
    }
}

impl From<ManyToOne> for AnyRelationship {
    fn from(rel: ManyToOne) -> Self {
        Self::ManyToOne(rel)
    }
}

impl From<OneToOne> for AnyRelationship {
    fn from(rel: OneToOne) -> Self {
        Self::OneToOne(rel)
    }
}

impl From<OneToMany> for AnyRelationship {
    fn from(rel: OneToMany) -> Self {
        Self::OneToMany(rel)
    }
}

impl From<ManyToMany> for AnyRelationship {
    fn from(rel: ManyToMany) -> Self {
        Self::ManyToMany(rel)
    }
}

impl From<ReferenceRelationship> for AnyRelationship {
    fn from(rel: ReferenceRelationship) -> Self {
        Self::Reference(rel)
    }
}

/// Relationships of one native mapper, in declaration order
#[derive(Debug, Clone)]
pub struct MapperRelationships {
    native: String,
    locator: MapperLocator,
    relationships: Vec<AnyRelationship>,
}

impl MapperRelationships {
    pub fn new(native: impl Into<String>, locator: MapperLocator) -> Self {
        Self {
            native: native.into(),
            locator,
            relationships: Vec::new(),
        }
    }

    pub fn native_mapper_class(&self) -> &str {
        &self.native
    }

    pub fn locator(&self) -> &MapperLocator {
        &self.locator
    }

    /// Add a relationship built elsewhere
    pub fn add(
        &mut self,
        relationship: impl Into<AnyRelationship>,
    ) -> RelationResult<&mut AnyRelationship> {
        let relationship = relationship.into();

        if relationship.native_mapper_class() != self.native {
            return Err(RelationshipError::Configuration(format!(
                "Relationship '{}' belongs to {}, not {}",
                relationship.name(),
                relationship.native_mapper_class(),
                self.native
            )));
        }
        if self.has(relationship.name()) {
            return Err(RelationshipError::RelationshipExists {
                mapper: self.native.clone(),
                name: relationship.name().to_string(),
            });
        }
        if let Some(through) = relationship.through() {
            if !self.has(through) {
                return Err(RelationshipError::missing_related(&self.native, through));
            }
        }

        debug!(
            "Declared {:?} relationship '{}' on {}",
            relationship.kind(),
            relationship.name(),
            self.native
        );
        let index = self.relationships.len();
        self.relationships.push(relationship);
        Ok(&mut self.relationships[index])
    }

    pub fn many_to_one(
        &mut self,
        name: &str,
        foreign: &str,
        on: impl Into<JoinOn>,
    ) -> RelationResult<&mut AnyRelationship> {
        let rel =
            ManyToOne::new(name, self.locator.clone(), self.native.clone(), foreign).with_on(on);
        self.add(rel)
    }

    pub fn one_to_one(
        &mut self,
        name: &str,
        foreign: &str,
        on: impl Into<JoinOn>,
    ) -> RelationResult<&mut AnyRelationship> {
        let rel =
            OneToOne::new(name, self.locator.clone(), self.native.clone(), foreign).with_on(on);
        self.add(rel)
    }

    pub fn one_to_many(
        &mut self,
        name: &str,
        foreign: &str,
        on: impl Into<JoinOn>,
    ) -> RelationResult<&mut AnyRelationship> {
        let rel =
            OneToMany::new(name, self.locator.clone(), self.native.clone(), foreign).with_on(on);
        self.add(rel)
    }

    /// `on` maps columns of the `through` records to foreign columns
    pub fn many_to_many(
        &mut self,
        name: &str,
        foreign: &str,
        through: &str,
        on: impl Into<JoinOn>,
    ) -> RelationResult<&mut AnyRelationship> {
        let rel = ManyToMany::new(name, self.locator.clone(), self.native.clone(), foreign, through)
            .with_on(on);
        self.add(rel)
    }

    /// Declare a reference relationship; register its values with
    /// [`ReferenceRelationship::to`] on the returned handle
    pub fn many_to_one_by_reference(
        &mut self,
        name: &str,
        reference_column: &str,
    ) -> RelationResult<&mut ReferenceRelationship> {
        let rel = ReferenceRelationship::new(
            name,
            self.locator.clone(),
            self.native.clone(),
            reference_column,
        );
        let native = self.native.clone();
        self.add(rel)?
            .as_reference_mut()
            .ok_or_else(|| RelationshipError::missing_related(&native, name))
    }

    /// Declare a relationship from its serializable definition
    pub fn define(&mut self, definition: &RelationshipDefinition) -> RelationResult<()> {
        definition.validate()?;
        if !definition.native.is_empty() && definition.native != self.native {
            return Err(RelationshipError::Configuration(format!(
                "Relationship '{}' is defined for {}, not {}",
                definition.name, definition.native, self.native
            )));
        }

        let name = definition.name.as_str();
        let foreign = definition.foreign.as_deref().unwrap_or_default();
        let on = definition.on.clone();

        let relationship = match definition.kind {
            RelationshipKind::ManyToOneByReference => {
                let column = definition.reference_column.as_deref().unwrap_or_default();
                let reference = self.many_to_one_by_reference(name, column)?;
                for entry in &definition.references {
                    reference.to(entry.value.clone(), entry.foreign.clone(), entry.on.clone());
                }
                return Ok(());
            }
            RelationshipKind::ManyToOne => self.many_to_one(name, foreign, on)?,
            RelationshipKind::OneToOne => self.one_to_one(name, foreign, on)?,
            RelationshipKind::OneToMany => self.one_to_many(name, foreign, on)?,
            RelationshipKind::ManyToMany => {
                let through = definition.through.as_deref().unwrap_or_default();
                self.many_to_many(name, foreign, through, on)?
            }
        };

        for clause in &definition.wheres {
            relationship.where_clause(&clause.condition, clause.bindings.clone())?;
        }
        relationship.ignore_case(definition.ignore_case)
    }

    pub fn get(&self, name: &str) -> RelationResult<&AnyRelationship> {
        self.relationships
            .iter()
            .find(|rel| rel.name() == name)
            .ok_or_else(|| RelationshipError::missing_related(&self.native, name))
    }

    pub fn get_mut(&mut self, name: &str) -> RelationResult<&mut AnyRelationship> {
        let native = &self.native;
        self.relationships
            .iter_mut()
            .find(|rel| rel.name() == name)
            .ok_or_else(|| RelationshipError::missing_related(native, name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.relationships.iter().any(|rel| rel.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.relationships.iter().map(|rel| rel.name()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnyRelationship> {
        self.relationships.iter()
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// Empty slots for a new record of the native mapper
    pub fn new_related(&self) -> Related {
        Related::new(self.names())
    }

    /// Eagerly stitch the named relationships, in the order given
    pub fn stitch(&self, native_records: &[RecordRef], names: &[String]) -> RelationResult<()> {
        for name in names {
            self.stitch_one(name, native_records, None)?;
        }
        Ok(())
    }

    pub fn stitch_one(
        &self,
        name: &str,
        native_records: &[RecordRef],
        custom: CustomQuery<'_>,
    ) -> RelationResult<()> {
        self.get(name)?.stitch_into_records(native_records, custom)
    }

    pub fn persist_before_native(
        &self,
        native_record: &RecordRef,
        tracker: &mut PersistenceTracker,
    ) -> RelationResult<()> {
        for rel in self.relationships.iter().filter(|rel| rel.persists_before_native()) {
            rel.persist_foreign(native_record, tracker)?;
        }
        Ok(())
    }

    pub fn fix_native_record_keys(&self, native_record: &RecordRef) -> RelationResult<()> {
        for rel in &self.relationships {
            rel.fix_native_record_keys(native_record)?;
        }
        Ok(())
    }

    pub fn persist_after_native(
        &self,
        native_record: &RecordRef,
        tracker: &mut PersistenceTracker,
    ) -> RelationResult<()> {
        for rel in self.relationships.iter().filter(|rel| !rel.persists_before_native()) {
            rel.persist_foreign(native_record, tracker)?;
        }
        Ok(())
    }

    /// Check that every foreign mapper class resolves through the locator
    pub fn validate(&self) -> RelationResult<()> {
        for rel in &self.relationships {
            for class in rel.foreign_mapper_classes() {
                self.locator.get(class)?;
            }
        }
        Ok(())
    }

    pub fn definitions(&self) -> Vec<RelationshipDefinition> {
        self.relationships.iter().map(Relationship::definition).collect()
    }
}

impl<'a> IntoIterator for &'a MapperRelationships {
    type Item = &'a AnyRelationship;
    type IntoIter = std::slice::Iter<'a, AnyRelationship>;

    fn into_iter(self) -> Self::IntoIter {
        self.relationships.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mapper::WhereClause;
    use serde_json::json;

    fn posts() -> MapperRelationships {
        MapperRelationships::new("Posts", MapperLocator::new())
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut rels = posts();
        rels.many_to_one("author", "Authors", [("author_id", "id")]).unwrap();
        let err = rels
            .one_to_many("author", "Authors", [("id", "post_id")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RelationshipExists);
        assert_eq!(rels.len(), 1);
    }

    #[test]
    fn test_foreign_native_is_rejected() {
        let mut rels = posts();
        let rel = ManyToOne::new("author", MapperLocator::new(), "Comments", "Authors");
        let err = rels.add(rel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_many_to_many_needs_declared_through() {
        let mut rels = posts();
        let err = rels
            .many_to_many("tags", "Tags", "taggings", [("tag_id", "id")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRelated);

        rels.one_to_many("taggings", "Taggings", [("id", "post_id")]).unwrap();
        rels.many_to_many("tags", "Tags", "taggings", [("tag_id", "id")]).unwrap();
        assert_eq!(rels.names(), vec!["taggings", "tags"]);
    }

    #[test]
    fn test_new_related_has_slot_per_relationship() {
        let mut rels = posts();
        rels.many_to_one("author", "Authors", [("author_id", "id")]).unwrap();
        rels.many_to_one_by_reference("subject", "subject_type")
            .unwrap()
            .to("page", "Pages", [("subject_id", "id")]);

        let related = rels.new_related();
        assert_eq!(related.names().collect::<Vec<_>>(), vec!["author", "subject"]);
        assert!(related.get("subject").unwrap().is_null());
    }

    #[test]
    fn test_reference_rejects_customization_through_set() {
        let mut rels = posts();
        rels.many_to_one_by_reference("subject", "subject_type").unwrap();
        let rel = rels.get_mut("subject").unwrap();
        assert_eq!(
            rel.where_clause("x = ?", vec![json!(1)]).unwrap_err().kind(),
            ErrorKind::InvalidReferenceMethod
        );
        assert_eq!(
            rel.on(JoinOn::from([("a", "b")])).unwrap_err().kind(),
            ErrorKind::InvalidReferenceMethod
        );
    }

    #[test]
    fn test_definitions_round_trip_through_define() {
        let mut rels = posts();
        rels.many_to_one("author", "Authors", [("author_id", "id")])
            .unwrap()
            .where_clause("active = ?", vec![json!(true)])
            .unwrap();
        rels.many_to_one_by_reference("subject", "subject_type")
            .unwrap()
            .to("page", "Pages", [("subject_id", "id")])
            .to("video", "Videos", [("subject_id", "id")]);

        let mut copy = posts();
        for definition in rels.definitions() {
            copy.define(&definition).unwrap();
        }
        assert_eq!(copy.definitions(), rels.definitions());
        assert_eq!(
            copy.get("author").unwrap().definition().wheres,
            vec![WhereClause::new("active = ?", vec![json!(true)])]
        );
    }

    #[test]
    fn test_validate_requires_registered_mappers() {
        let mut rels = posts();
        rels.many_to_one_by_reference("subject", "subject_type")
            .unwrap()
            .to("page", "Pages", [("subject_id", "id")]);
        assert_eq!(rels.validate().unwrap_err().kind(), ErrorKind::MapperNotFound);
    }

    #[test]
    fn test_unknown_relationship() {
        let rels = posts();
        assert_eq!(
            rels.stitch_one("missing", &[], None).unwrap_err().kind(),
            ErrorKind::MissingRelated
        );
    }
}
