//! Relationship Definitions - serializable declarations of relationships

use serde::{Deserialize, Serialize};

use crate::error::{RelationResult, RelationshipError};
use crate::mapper::WhereClause;

/// The kind of relationship between a native and a foreign mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Native row holds the foreign key (belongs to)
    ManyToOne,
    /// Foreign row holds the key; at most one foreign record
    OneToOne,
    /// Foreign rows hold the key; a set of foreign records
    OneToMany,
    /// Foreign records reached through an association relationship
    ManyToMany,
    /// Many-to-one whose foreign mapper is picked per row by a reference column
    ManyToOneByReference,
}

impl RelationshipKind {
    /// Foreign records must be written before the native row
    pub fn persists_before_native(self) -> bool {
        matches!(self, Self::ManyToOne | Self::ManyToOneByReference)
    }

    pub fn is_collection(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    pub fn is_reference(self) -> bool {
        matches!(self, Self::ManyToOneByReference)
    }
}

/// One native-column to foreign-column equality
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPair {
    pub native: String,
    pub foreign: String,
}

/// Ordered join conditions between native and foreign columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JoinOn(Vec<JoinPair>);

impl JoinOn {
    pub fn new<I, N, F>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, F)>,
        N: Into<String>,
        F: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(native, foreign)| JoinPair {
                    native: native.into(),
                    foreign: foreign.into(),
                })
                .collect(),
        )
    }

    pub fn pairs(&self) -> &[JoinPair] {
        &self.0
    }

    pub fn native_columns(&self) -> Vec<String> {
        self.0.iter().map(|pair| pair.native.clone()).collect()
    }

    pub fn foreign_columns(&self) -> Vec<String> {
        self.0.iter().map(|pair| pair.foreign.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<N, F, const K: usize> From<[(N, F); K]> for JoinOn
where
    N: Into<String>,
    F: Into<String>,
{
    fn from(pairs: [(N, F); K]) -> Self {
        Self::new(pairs)
    }
}

impl<N, F> From<Vec<(N, F)>> for JoinOn
where
    N: Into<String>,
    F: Into<String>,
{
    fn from(pairs: Vec<(N, F)>) -> Self {
        Self::new(pairs)
    }
}

/// One discriminator value of a reference relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDefinition {
    pub value: String,
    pub foreign: String,
    pub on: JoinOn,
}

/// Declarative form of any relationship, as found in a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDefinition {
    pub kind: RelationshipKind,
    pub name: String,

    /// Native mapper class; filled from the enclosing mapper when omitted
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub native: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign: Option<String>,

    #[serde(default, skip_serializing_if = "JoinOn::is_empty")]
    pub on: JoinOn,

    #[serde(default, rename = "where", skip_serializing_if = "Vec::is_empty")]
    pub wheres: Vec<WhereClause>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore_case: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_column: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<ReferenceDefinition>,
}

impl RelationshipDefinition {
    /// A definition for one of the plain (non-reference) kinds
    pub fn new(
        kind: RelationshipKind,
        name: impl Into<String>,
        native: impl Into<String>,
        foreign: impl Into<String>,
        on: impl Into<JoinOn>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            native: native.into(),
            foreign: Some(foreign.into()),
            on: on.into(),
            wheres: Vec::new(),
            ignore_case: false,
            through: None,
            reference_column: None,
            references: Vec::new(),
        }
    }

    /// A definition for a many-to-one-by-reference relationship
    pub fn reference(
        name: impl Into<String>,
        native: impl Into<String>,
        reference_column: impl Into<String>,
        references: Vec<ReferenceDefinition>,
    ) -> Self {
        Self {
            kind: RelationshipKind::ManyToOneByReference,
            name: name.into(),
            native: native.into(),
            foreign: None,
            on: JoinOn::default(),
            wheres: Vec::new(),
            ignore_case: false,
            through: None,
            reference_column: Some(reference_column.into()),
            references,
        }
    }

    pub fn with_through(mut self, through: impl Into<String>) -> Self {
        self.through = Some(through.into());
        self
    }

    pub fn with_where(mut self, clause: WhereClause) -> Self {
        self.wheres.push(clause);
        self
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    /// Validate the definition for consistency with its kind
    pub fn validate(&self) -> RelationResult<()> {
        if self.name.is_empty() {
            return Err(RelationshipError::Configuration(
                "Relationship name cannot be empty".to_string(),
            ));
        }

        if self.kind.is_reference() {
            return self.validate_reference();
        }

        match &self.foreign {
            Some(foreign) if !foreign.is_empty() => {}
            _ => {
                return Err(RelationshipError::Configuration(format!(
                    "Relationship '{}' must name a foreign mapper",
                    self.name
                )))
            }
        }

        if self.on.is_empty() {
            return Err(RelationshipError::Configuration(format!(
                "Relationship '{}' must have at least one join condition",
                self.name
            )));
        }

        if self.reference_column.is_some() || !self.references.is_empty() {
            return Err(RelationshipError::Configuration(format!(
                "Relationship '{}' of kind {:?} cannot declare references",
                self.name, self.kind
            )));
        }

        match (self.kind, &self.through) {
            (RelationshipKind::ManyToMany, None) => Err(RelationshipError::Configuration(format!(
                "Relationship '{}' of kind ManyToMany requires a through relationship",
                self.name
            ))),
            (RelationshipKind::ManyToMany, Some(_)) | (_, None) => Ok(()),
            (kind, Some(_)) => Err(RelationshipError::Configuration(format!(
                "Relationship '{}' of kind {:?} cannot declare a through relationship",
                self.name, kind
            ))),
        }
    }

    fn validate_reference(&self) -> RelationResult<()> {
        if !self.on.is_empty() {
            return Err(RelationshipError::invalid_reference_method("on"));
        }
        if !self.wheres.is_empty() {
            return Err(RelationshipError::invalid_reference_method("where"));
        }
        if self.ignore_case {
            return Err(RelationshipError::invalid_reference_method("ignore_case"));
        }
        if self.foreign.is_some() || self.through.is_some() {
            return Err(RelationshipError::Configuration(format!(
                "Reference relationship '{}' declares its foreign mappers per reference value",
                self.name
            )));
        }

        match &self.reference_column {
            Some(col) if !col.is_empty() => {}
            _ => {
                return Err(RelationshipError::Configuration(format!(
                    "Reference relationship '{}' requires a reference column",
                    self.name
                )))
            }
        }

        if self.references.is_empty() {
            return Err(RelationshipError::Configuration(format!(
                "Reference relationship '{}' has no references",
                self.name
            )));
        }

        for reference in &self.references {
            if reference.foreign.is_empty() || reference.on.is_empty() {
                return Err(RelationshipError::Configuration(format!(
                    "Reference '{}' of relationship '{}' needs a foreign mapper and a join",
                    reference.value, self.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_kind_ordering_rules() {
        assert!(RelationshipKind::ManyToOne.persists_before_native());
        assert!(RelationshipKind::ManyToOneByReference.persists_before_native());
        assert!(!RelationshipKind::OneToMany.persists_before_native());
        assert!(RelationshipKind::ManyToMany.is_collection());
        assert!(!RelationshipKind::OneToOne.is_collection());
    }

    #[test]
    fn test_join_on_keeps_order() {
        let on = JoinOn::from([("b_id", "id"), ("a_id", "other")]);
        assert_eq!(on.native_columns(), vec!["b_id", "a_id"]);
        assert_eq!(on.foreign_columns(), vec!["id", "other"]);
    }

    #[test]
    fn test_plain_definition_requires_join() {
        let def = RelationshipDefinition::new(
            RelationshipKind::ManyToOne,
            "author",
            "Posts",
            "Authors",
            JoinOn::default(),
        );
        assert_eq!(def.validate().unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_many_to_many_requires_through() {
        let def = RelationshipDefinition::new(
            RelationshipKind::ManyToMany,
            "tags",
            "Posts",
            "Tags",
            [("tag_id", "id")],
        );
        assert!(def.validate().is_err());
        assert!(def.with_through("taggings").validate().is_ok());
    }

    #[test]
    fn test_reference_definition_rejects_join_conditions() {
        let mut def = RelationshipDefinition::reference(
            "commentable",
            "Comments",
            "commentable_type",
            vec![ReferenceDefinition {
                value: "post".to_string(),
                foreign: "Posts".to_string(),
                on: JoinOn::from([("commentable_id", "id")]),
            }],
        );
        assert!(def.validate().is_ok());

        def.on = JoinOn::from([("commentable_id", "id")]);
        assert_eq!(
            def.validate().unwrap_err().kind(),
            ErrorKind::InvalidReferenceMethod
        );
    }
}
