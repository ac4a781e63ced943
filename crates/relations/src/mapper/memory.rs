//! In-memory mapper implementation for development and testing
//!
//! [`MemoryMapper`] keeps its rows in a vector of shared records and answers
//! [`ForeignQuery`] selects by scanning them, so loading the same row twice
//! yields the same record instance. Every select and write is logged for
//! inspection. [`MemoryStore`] wires a set of memory mappers to one
//! [`MapperLocator`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{ForeignQuery, Mapper, MapperLocator, WhereClause};
use crate::error::{RelationResult, RelationshipError};
use crate::manifest::RelationshipManifest;
use crate::record::value::values_match;
use crate::record::{Record, RecordRef, Row, RowStatus, Value};
use crate::relationships::MapperRelationships;

/// What a write did to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Insert,
    Update,
    Delete,
}

/// One entry of a mapper's write log
#[derive(Debug, Clone)]
pub struct WriteEvent {
    pub action: WriteAction,
    pub record: RecordRef,
}

/// A where clause the memory mapper knows how to evaluate
#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Equals(String, Value),
    NotEquals(String, Value),
    IsNull(String),
    IsNotNull(String),
}

fn keyword(token: &str, expected: &str) -> bool {
    token.eq_ignore_ascii_case(expected)
}

impl Condition {
    fn parse(clause: &WhereClause) -> RelationResult<Self> {
        let tokens: Vec<&str> = clause.condition.split_whitespace().collect();

        let condition = match tokens.as_slice() {
            [col, op, "?"] if matches!(*op, "=" | "!=" | "<>") => {
                let binding = match clause.bindings.as_slice() {
                    [binding] => binding.clone(),
                    _ => {
                        return Err(RelationshipError::Query(format!(
                            "'{}' expects exactly one binding, got {}",
                            clause.condition,
                            clause.bindings.len()
                        )))
                    }
                };
                if *op == "=" {
                    Self::Equals(col.to_string(), binding)
                } else {
                    Self::NotEquals(col.to_string(), binding)
                }
            }
            [col, is, null] if keyword(is, "IS") && keyword(null, "NULL") => {
                Self::IsNull(col.to_string())
            }
            [col, is, not, null]
                if keyword(is, "IS") && keyword(not, "NOT") && keyword(null, "NULL") =>
            {
                Self::IsNotNull(col.to_string())
            }
            _ => {
                return Err(RelationshipError::Query(format!(
                    "Unsupported where clause '{}'",
                    clause.condition
                )))
            }
        };
        Ok(condition)
    }

    fn matches(&self, row: &Row) -> RelationResult<bool> {
        let matched = match self {
            Self::Equals(col, expected) => values_match(expected, row.get(col)?, false),
            Self::NotEquals(col, expected) => {
                let actual = row.get(col)?;
                !actual.is_null() && !values_match(expected, actual, false)
            }
            Self::IsNull(col) => row.get(col)?.is_null(),
            Self::IsNotNull(col) => !row.get(col)?.is_null(),
        };
        Ok(matched)
    }
}

/// Mapper over an in-memory table
#[derive(Debug)]
pub struct MemoryMapper {
    class: String,
    identity: Vec<String>,
    columns: Vec<String>,
    relationships: MapperRelationships,
    rows: RwLock<Vec<RecordRef>>,
    next_id: AtomicI64,
    query_log: RwLock<Vec<ForeignQuery>>,
    write_log: RwLock<Vec<WriteEvent>>,
}

impl MemoryMapper {
    /// Create a mapper; `identity` columns must be among `columns`
    pub fn new(
        class: impl Into<String>,
        identity: &[&str],
        columns: &[&str],
        relationships: MapperRelationships,
    ) -> RelationResult<Self> {
        let class = class.into();

        if identity.is_empty() {
            return Err(RelationshipError::Configuration(format!(
                "Mapper {} needs at least one identity column",
                class
            )));
        }
        if let Some(missing) = identity.iter().find(|col| !columns.contains(*col)) {
            return Err(RelationshipError::missing_column(&class, missing));
        }
        if relationships.native_mapper_class() != class {
            return Err(RelationshipError::Configuration(format!(
                "Relationships for {} cannot be used by mapper {}",
                relationships.native_mapper_class(),
                class
            )));
        }

        Ok(Self {
            class,
            identity: identity.iter().map(|col| col.to_string()).collect(),
            columns: columns.iter().map(|col| col.to_string()).collect(),
            relationships,
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            query_log: RwLock::new(Vec::new()),
            write_log: RwLock::new(Vec::new()),
        })
    }

    pub fn identity_columns(&self) -> &[String] {
        &self.identity
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// A new, unsaved record with the given column values; other columns are null
    pub fn new_record<'a, I>(&self, values: I) -> RelationResult<RecordRef>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut row = Row::new(
            self.class.clone(),
            self.identity.clone(),
            self.columns
                .iter()
                .map(|col| (col.clone(), Value::Null))
                .collect(),
        );
        for (col, value) in values {
            row.set(col, value)?;
        }
        Ok(Record::new(row, self.relationships.new_related()).into_ref())
    }

    /// Store a row as if it had been loaded from storage, without logging a write
    pub fn seed<'a, I>(&self, values: I) -> RelationResult<RecordRef>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let record = self.new_record(values)?;
        self.assign_identity(&record)?;
        record.write().row_mut().set_status(RowStatus::Clean);
        self.rows.write().push(record.clone());
        Ok(record)
    }

    /// Every stored record, in insertion order
    pub fn rows(&self) -> Vec<RecordRef> {
        self.rows.read().clone()
    }

    /// Every query this mapper has answered
    pub fn queries(&self) -> Vec<ForeignQuery> {
        self.query_log.read().clone()
    }

    /// Every write this mapper has performed
    pub fn writes(&self) -> Vec<WriteEvent> {
        self.write_log.read().clone()
    }

    pub fn clear_logs(&self) {
        self.query_log.write().clear();
        self.write_log.write().clear();
    }

    /// Drop every stored row and log entry, detaching the rows' related
    /// slots so cyclic record graphs are released
    pub fn clear(&self) {
        let rows = std::mem::take(&mut *self.rows.write());
        for record in &rows {
            record.detach_related();
        }
        self.clear_logs();
        debug!("{} cleared {} row(s)", self.class, rows.len());
    }

    /// Auto-increment a single null integer identity column
    fn assign_identity(&self, record: &RecordRef) -> RelationResult<()> {
        let [col] = self.identity.as_slice() else {
            return Ok(());
        };

        let current = record.get(col)?;
        match current {
            Value::Null => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                record.set(col, id)?;
            }
            Value::Number(n) => {
                if let Some(id) = n.as_i64() {
                    self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn log_write(&self, action: WriteAction, record: &RecordRef) {
        debug!("{} {:?} {:?}", self.class, action, record.read().row().identity_values());
        self.write_log.write().push(WriteEvent {
            action,
            record: record.clone(),
        });
    }
}

impl Mapper for MemoryMapper {
    fn mapper_class(&self) -> &str {
        &self.class
    }

    fn relationships(&self) -> &MapperRelationships {
        &self.relationships
    }

    fn select(&self, query: &ForeignQuery) -> RelationResult<Vec<RecordRef>> {
        let conditions = query
            .wheres()
            .iter()
            .map(Condition::parse)
            .collect::<RelationResult<Vec<_>>>()?;

        let rows = self.rows();
        let mut selected = Vec::new();
        for record in rows {
            let keep = {
                let guard = record.read();
                let row = guard.row();
                if row.status() == RowStatus::Deleted || !query.matches_keys(row) {
                    false
                } else {
                    let mut keep = true;
                    for condition in &conditions {
                        if !condition.matches(row)? {
                            keep = false;
                            break;
                        }
                    }
                    keep
                }
            };
            if keep {
                selected.push(record);
            }
            if query.limit_value().is_some_and(|limit| selected.len() >= limit) {
                break;
            }
        }

        trace!("{} selected {} record(s)", self.class, selected.len());
        self.query_log.write().push(query.clone());
        Ok(selected)
    }

    fn write(&self, record: &RecordRef) -> RelationResult<()> {
        let status = record.read().row().status();
        match status {
            RowStatus::New => {
                self.assign_identity(record)?;
                record.write().row_mut().set_status(RowStatus::Clean);
                self.rows.write().push(record.clone());
                self.log_write(WriteAction::Insert, record);
            }
            RowStatus::Dirty => {
                record.write().row_mut().set_status(RowStatus::Clean);
                self.log_write(WriteAction::Update, record);
            }
            RowStatus::Trash => {
                record.write().row_mut().set_status(RowStatus::Deleted);
                self.rows.write().retain(|stored| !stored.ptr_eq(record));
                self.log_write(WriteAction::Delete, record);
            }
            RowStatus::Clean | RowStatus::Deleted => {
                trace!("{} record {:?} needs no write", self.class, record.identity());
            }
        }
        Ok(())
    }
}

/// A set of memory mappers sharing one locator
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    locator: MapperLocator,
    mappers: Arc<DashMap<String, Arc<MemoryMapper>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every mapper a manifest declares and check that all relationships
    /// resolve
    pub fn from_manifest(manifest: &RelationshipManifest) -> RelationResult<Self> {
        manifest.validate()?;

        let store = Self::new();
        for definition in &manifest.mappers {
            let primary: Vec<&str> = definition.primary.iter().map(String::as_str).collect();
            let columns: Vec<&str> = definition.columns.iter().map(String::as_str).collect();
            store.add_mapper(&definition.class, &primary, &columns, |rels| {
                definition.apply(rels)
            })?;
        }
        store.locator.validate_all()?;
        Ok(store)
    }

    /// Create a memory mapper, let `configure` declare its relationships, and
    /// register it with the locator
    pub fn add_mapper<F>(
        &self,
        class: &str,
        identity: &[&str],
        columns: &[&str],
        configure: F,
    ) -> RelationResult<Arc<MemoryMapper>>
    where
        F: FnOnce(&mut MapperRelationships) -> RelationResult<()>,
    {
        let mut relationships = MapperRelationships::new(class, self.locator.clone());
        configure(&mut relationships)?;

        let mapper = Arc::new(MemoryMapper::new(class, identity, columns, relationships)?);
        self.locator.register(mapper.clone());
        self.mappers.insert(class.to_string(), Arc::clone(&mapper));
        Ok(mapper)
    }

    pub fn mapper(&self, class: &str) -> RelationResult<Arc<MemoryMapper>> {
        self.mappers
            .get(class)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RelationshipError::MapperNotFound {
                mapper: class.to_string(),
            })
    }

    pub fn locator(&self) -> &MapperLocator {
        &self.locator
    }

    /// Drop every mapper and its rows, breaking the locator/mapper cycle and
    /// any record cycles among stored rows
    pub fn clear(&self) {
        for entry in self.mappers.iter() {
            entry.value().clear();
        }
        self.mappers.clear();
        self.locator.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn authors() -> Arc<MemoryMapper> {
        let store = MemoryStore::new();
        store
            .add_mapper("Authors", &["id"], &["id", "name", "email"], |_| Ok(()))
            .unwrap()
    }

    #[test]
    fn test_new_record_validates_columns() {
        let mapper = authors();
        let record = mapper.new_record([("name", json!("Ann"))]).unwrap();
        assert_eq!(record.get("email").unwrap(), Value::Null);
        assert_eq!(record.read().row().status(), RowStatus::New);

        let err = mapper.new_record([("nickname", json!("A"))]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingColumn);
    }

    #[test]
    fn test_seed_assigns_identity() {
        let mapper = authors();
        let first = mapper.seed([("name", json!("Ann"))]).unwrap();
        mapper.seed([("id", json!(10)), ("name", json!("Bob"))]).unwrap();
        let third = mapper.seed([("name", json!("Cid"))]).unwrap();

        assert_eq!(first.get("id").unwrap(), json!(1));
        assert_eq!(third.get("id").unwrap(), json!(11));
        assert!(mapper.writes().is_empty());
    }

    #[test]
    fn test_seed_at_max_identity() {
        let mapper = authors();
        let last = mapper.seed([("id", json!(i64::MAX)), ("name", json!("Max"))]).unwrap();
        assert_eq!(last.get("id").unwrap(), json!(i64::MAX));
        assert_eq!(mapper.rows().len(), 1);
    }

    #[test]
    fn test_clear_releases_cyclic_records() {
        let store = MemoryStore::new();
        store
            .add_mapper("Posts", &["id"], &["id", "title"], |rels| {
                rels.one_to_many("comments", "Comments", [("id", "post_id")])?;
                Ok(())
            })
            .unwrap();
        store
            .add_mapper("Comments", &["id"], &["id", "post_id"], |rels| {
                rels.many_to_one("post", "Posts", [("post_id", "id")])?;
                Ok(())
            })
            .unwrap();

        let posts = store.mapper("Posts").unwrap();
        let comments = store.mapper("Comments").unwrap();
        let post = posts.seed([("title", json!("Hello"))]).unwrap();
        let comment = comments.seed([("post_id", json!(1))]).unwrap();

        let mut query = ForeignQuery::new("Posts");
        query.with("comments");
        posts.fetch_records(&query).unwrap();
        let mut query = ForeignQuery::new("Comments");
        query.with("post");
        comments.fetch_records(&query).unwrap();
        assert!(comment.related("post").unwrap().as_record().unwrap().ptr_eq(&post));

        let (post_weak, comment_weak) = (post.downgrade(), comment.downgrade());
        drop(post);
        drop(comment);
        assert!(post_weak.upgrade().is_some());

        store.clear();
        assert!(posts.rows().is_empty());
        assert!(post_weak.upgrade().is_none());
        assert!(comment_weak.upgrade().is_none());
    }

    #[test]
    fn test_select_with_where_clauses() {
        let mapper = authors();
        mapper.seed([("name", json!("Ann")), ("email", json!("ann@example.com"))]).unwrap();
        mapper.seed([("name", json!("Bob"))]).unwrap();

        let mut query = ForeignQuery::new("Authors");
        query.where_clause("email IS NOT NULL", vec![]);
        let found = mapper.select(&query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("name").unwrap(), json!("Ann"));

        let mut query = ForeignQuery::new("Authors");
        query.where_clause("name <> ?", vec![json!("Ann")]);
        let found = mapper.select(&query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("name").unwrap(), json!("Bob"));

        assert_eq!(mapper.queries().len(), 2);
    }

    #[test]
    fn test_select_returns_shared_instances() {
        let mapper = authors();
        let seeded = mapper.seed([("name", json!("Ann"))]).unwrap();
        let found = mapper.select(&ForeignQuery::new("Authors")).unwrap();
        assert!(found[0].ptr_eq(&seeded));
    }

    #[test]
    fn test_unsupported_where_clause() {
        let mapper = authors();
        let mut query = ForeignQuery::new("Authors");
        query.where_clause("name LIKE ?", vec![json!("A%")]);
        assert_eq!(mapper.select(&query).unwrap_err().kind(), ErrorKind::Query);
    }

    #[test]
    fn test_write_follows_row_status() {
        let mapper = authors();
        let record = mapper.new_record([("name", json!("Ann"))]).unwrap();

        mapper.write(&record).unwrap();
        assert_eq!(record.get("id").unwrap(), json!(1));
        mapper.write(&record).unwrap();

        record.set("email", "ann@example.com").unwrap();
        mapper.write(&record).unwrap();

        record.write().row_mut().mark_for_deletion();
        mapper.write(&record).unwrap();
        assert_eq!(record.read().row().status(), RowStatus::Deleted);
        assert!(mapper.rows().is_empty());

        let actions: Vec<WriteAction> = mapper.writes().iter().map(|event| event.action).collect();
        assert_eq!(
            actions,
            vec![WriteAction::Insert, WriteAction::Update, WriteAction::Delete]
        );
    }

    #[test]
    fn test_store_lookup() {
        let store = MemoryStore::new();
        store
            .add_mapper("Authors", &["id"], &["id"], |_| Ok(()))
            .unwrap();
        assert!(store.mapper("Authors").is_ok());
        assert!(store.locator().has("Authors"));
        assert_eq!(
            store.mapper("Posts").unwrap_err().kind(),
            ErrorKind::MapperNotFound
        );
        store.clear();
        assert!(store.locator().is_empty());
    }

    #[test]
    fn test_identity_must_be_a_column() {
        let rels = MapperRelationships::new("Authors", MapperLocator::new());
        let err = MemoryMapper::new("Authors", &["id"], &["name"], rels).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingColumn);
    }
}
