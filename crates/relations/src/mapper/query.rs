//! Foreign Query - declarative select handed to a foreign mapper
//!
//! Relationships never build SQL. They describe which foreign rows they need
//! (key columns plus the key tuples gathered from native records, extra where
//! clauses, case sensitivity) and the mapper's table layer executes it.

use serde::{Deserialize, Serialize};

use crate::record::value::{values_match, Value};
use crate::record::Row;

/// A raw condition with positional bindings, e.g. `("published = ?", [true])`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub condition: String,
    #[serde(default)]
    pub bindings: Vec<Value>,
}

impl WhereClause {
    pub fn new(condition: impl Into<String>, bindings: Vec<Value>) -> Self {
        Self {
            condition: condition.into(),
            bindings,
        }
    }
}

/// Select against a foreign mapper, built by a relationship while stitching
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignQuery {
    mapper: String,
    columns: Vec<String>,
    keys: Vec<Vec<Value>>,
    wheres: Vec<WhereClause>,
    ignore_case: bool,
    limit: Option<usize>,
    with: Vec<String>,
}

impl ForeignQuery {
    /// An unrestricted select against the given mapper
    pub fn new(mapper: impl Into<String>) -> Self {
        Self {
            mapper: mapper.into(),
            columns: Vec::new(),
            keys: Vec::new(),
            wheres: Vec::new(),
            ignore_case: false,
            limit: None,
            with: Vec::new(),
        }
    }

    /// Restrict to rows whose `columns` equal one of the `keys` tuples
    pub fn match_keys(&mut self, columns: Vec<String>, keys: Vec<Vec<Value>>) -> &mut Self {
        self.columns = columns;
        self.keys = keys;
        self
    }

    pub fn where_clause(
        &mut self,
        condition: impl Into<String>,
        bindings: Vec<Value>,
    ) -> &mut Self {
        self.wheres.push(WhereClause::new(condition, bindings));
        self
    }

    pub fn ignore_case(&mut self, ignore_case: bool) -> &mut Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn limit(&mut self, limit: usize) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Eagerly stitch a relationship of the foreign mapper onto the results
    pub fn with(&mut self, relationship: impl Into<String>) -> &mut Self {
        self.with.push(relationship.into());
        self
    }

    pub fn mapper_class(&self) -> &str {
        &self.mapper
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn keys(&self) -> &[Vec<Value>] {
        &self.keys
    }

    pub fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    pub fn is_ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn with_names(&self) -> &[String] {
        &self.with
    }

    /// Whether a row satisfies the key restriction (ignores where clauses)
    pub fn matches_keys(&self, row: &Row) -> bool {
        if self.columns.is_empty() {
            return true;
        }
        self.keys.iter().any(|key| {
            self.columns.iter().zip(key).all(|(col, expected)| {
                row.get(col)
                    .map(|actual| values_match(expected, actual, self.ignore_case))
                    .unwrap_or(false)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn author(id: i64, name: &str) -> Row {
        Row::selected(
            "Authors",
            vec!["id".to_string()],
            vec![("id".to_string(), json!(id)), ("name".to_string(), json!(name))],
        )
    }

    #[test]
    fn test_unrestricted_query_matches_everything() {
        let query = ForeignQuery::new("Authors");
        assert!(query.matches_keys(&author(1, "Ann")));
    }

    #[test]
    fn test_key_tuples() {
        let mut query = ForeignQuery::new("Authors");
        query.match_keys(vec!["id".to_string()], vec![vec![json!(1)], vec![json!("3")]]);
        assert!(query.matches_keys(&author(1, "Ann")));
        assert!(!query.matches_keys(&author(2, "Bob")));
        assert!(query.matches_keys(&author(3, "Cid")));
    }

    #[test]
    fn test_ignore_case_keys() {
        let mut query = ForeignQuery::new("Authors");
        query.match_keys(vec!["name".to_string()], vec![vec![json!("ANN")]]);
        assert!(!query.matches_keys(&author(1, "Ann")));
        query.ignore_case(true);
        assert!(query.matches_keys(&author(1, "Ann")));
    }
}
