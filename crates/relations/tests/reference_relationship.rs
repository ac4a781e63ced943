use std::cell::RefCell;
use std::sync::Arc;

use elif_relations::{
    ErrorKind, ForeignQuery, JoinOn, Mapper, MemoryMapper, MemoryStore, RecordRef, Relationship,
    ReferenceRelationship, Value,
};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Posts and Videos, with Comments referencing either through `commentable`
fn blog() -> MemoryStore {
    init_tracing();
    let store = MemoryStore::new();
    store
        .add_mapper("Posts", &["id"], &["id", "title"], |rels| {
            rels.one_to_many("comments", "Comments", [("id", "commentable_id")])?
                .where_clause("commentable_type = ?", vec![json!("post")])
        })
        .unwrap();
    store
        .add_mapper("Videos", &["id"], &["id", "url"], |_| Ok(()))
        .unwrap();
    store
        .add_mapper(
            "Comments",
            &["id"],
            &["id", "commentable_type", "commentable_id", "body"],
            |rels| {
                rels.many_to_one_by_reference("commentable", "commentable_type")?
                    .to("post", "Posts", [("commentable_id", "id")])
                    .to("video", "Videos", [("commentable_id", "id")]);
                Ok(())
            },
        )
        .unwrap();
    store.locator().validate_all().unwrap();
    store
}

fn mapper(store: &MemoryStore, class: &str) -> Arc<MemoryMapper> {
    store.mapper(class).unwrap()
}

fn commentable(store: &MemoryStore) -> ReferenceRelationship {
    mapper(store, "Comments")
        .relationships()
        .get("commentable")
        .unwrap()
        .as_reference()
        .unwrap()
        .clone()
}

fn comment(store: &MemoryStore, kind: Value, id: Value) -> RecordRef {
    mapper(store, "Comments")
        .seed([("commentable_type", kind), ("commentable_id", id)])
        .unwrap()
}

fn attached(record: &RecordRef, name: &str) -> Option<RecordRef> {
    record.related(name).unwrap().as_record().cloned()
}

#[test]
fn test_stitch_groups_by_reference_value() {
    let store = blog();
    let post1 = mapper(&store, "Posts").seed([("title", json!("First"))]).unwrap();
    let post2 = mapper(&store, "Posts").seed([("title", json!("Second"))]).unwrap();
    let video1 = mapper(&store, "Videos").seed([("url", json!("a.mp4"))]).unwrap();
    let video2 = mapper(&store, "Videos").seed([("url", json!("b.mp4"))]).unwrap();

    let natives = vec![
        comment(&store, json!("post"), json!(2)),
        comment(&store, json!("video"), json!(1)),
        comment(&store, json!("post"), json!(1)),
        comment(&store, json!("video"), json!(2)),
        comment(&store, json!("post"), json!(2)),
    ];

    let calls = RefCell::new(Vec::new());
    let record_call: &dyn Fn(&mut ForeignQuery) = &|query| {
        calls
            .borrow_mut()
            .push((query.mapper_class().to_string(), query.keys().to_vec()));
    };
    commentable(&store)
        .stitch_into_records(&natives, Some(record_call))
        .unwrap();

    // one delegate call per value, first-encounter order, keys in input order
    assert_eq!(
        calls.into_inner(),
        vec![
            ("Posts".to_string(), vec![vec![json!(2)], vec![json!(1)]]),
            ("Videos".to_string(), vec![vec![json!(1)], vec![json!(2)]]),
        ]
    );
    assert_eq!(mapper(&store, "Posts").queries().len(), 1);
    assert_eq!(mapper(&store, "Videos").queries().len(), 1);

    assert!(attached(&natives[0], "commentable").unwrap().ptr_eq(&post2));
    assert!(attached(&natives[1], "commentable").unwrap().ptr_eq(&video1));
    assert!(attached(&natives[2], "commentable").unwrap().ptr_eq(&post1));
    assert!(attached(&natives[3], "commentable").unwrap().ptr_eq(&video2));
    assert!(attached(&natives[4], "commentable").unwrap().ptr_eq(&post2));
}

#[test]
fn test_stitch_empty_batch_calls_nothing() {
    let store = blog();
    let calls = RefCell::new(0);
    let count: &dyn Fn(&mut ForeignQuery) = &|_| *calls.borrow_mut() += 1;

    commentable(&store).stitch_into_records(&[], Some(count)).unwrap();

    assert_eq!(calls.into_inner(), 0);
    assert!(mapper(&store, "Posts").queries().is_empty());
    assert!(mapper(&store, "Videos").queries().is_empty());
}

#[test]
fn test_stitch_unknown_value_stitches_nothing() {
    let store = blog();
    mapper(&store, "Posts").seed([("title", json!("First"))]).unwrap();

    let natives = vec![
        comment(&store, json!("post"), json!(1)),
        comment(&store, json!("podcast"), json!(1)),
    ];

    let err = commentable(&store).stitch_into_records(&natives, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchReference);
    assert!(err.to_string().contains("podcast"));
    assert!(err.to_string().contains("Comments"));

    // resolution happens before any delegate runs
    assert!(mapper(&store, "Posts").queries().is_empty());
    assert!(natives[0].related("commentable").unwrap().is_null());
}

#[test]
fn test_stitch_null_reference_value() {
    let store = blog();
    let natives = vec![comment(&store, Value::Null, json!(1))];
    let err = commentable(&store).stitch_into_records(&natives, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchReference);
    assert!(err.to_string().contains("NULL"));
}

#[test]
fn test_stitch_round_trip_two_types() {
    init_tracing();
    let store = MemoryStore::new();
    store
        .add_mapper("TypeX", &["id"], &["id"], |_| Ok(()))
        .unwrap();
    store
        .add_mapper("TypeY", &["id"], &["id"], |_| Ok(()))
        .unwrap();
    store
        .add_mapper("Natives", &["id"], &["id", "kind", "target_id"], |rels| {
            rels.many_to_one_by_reference("target", "kind")?
                .to("a", "TypeX", [("target_id", "id")])
                .to("b", "TypeY", [("target_id", "id")]);
            Ok(())
        })
        .unwrap();
    mapper(&store, "TypeX").seed([]).unwrap();
    mapper(&store, "TypeY").seed([]).unwrap();

    let natives = mapper(&store, "Natives");
    let a = natives.seed([("kind", json!("a")), ("target_id", json!(1))]).unwrap();
    let b = natives.seed([("kind", json!("b")), ("target_id", json!(1))]).unwrap();

    let mut query = ForeignQuery::new("Natives");
    query.with("target");
    let loaded = natives.fetch_records(&query).unwrap();
    assert_eq!(loaded.len(), 2);

    assert_eq!(attached(&a, "target").unwrap().mapper_class(), "TypeX");
    assert_eq!(attached(&b, "target").unwrap().mapper_class(), "TypeY");
}

#[test]
fn test_fix_keys_without_attached_record_uses_current_value() {
    let store = blog();
    let native = comment(&store, json!("video"), json!(7));

    commentable(&store).fix_native_record_keys(&native).unwrap();

    assert_eq!(native.get("commentable_type").unwrap(), json!("video"));
    assert_eq!(native.get("commentable_id").unwrap(), json!(7));
}

#[test]
fn test_fix_keys_repairs_reference_from_attached_record() {
    let store = blog();
    let post = mapper(&store, "Posts").seed([("title", json!("First"))]).unwrap();
    let native = comment(&store, json!("video"), json!(7));
    native.set_related("commentable", post.clone()).unwrap();

    commentable(&store).fix_native_record_keys(&native).unwrap();

    assert_eq!(native.get("commentable_type").unwrap(), json!("post"));
    assert_eq!(native.get("commentable_id").unwrap(), post.get("id").unwrap());
}

#[test]
fn test_repair_leaves_value_when_no_delegate_matches() {
    let store = blog();
    store
        .add_mapper("Podcasts", &["id"], &["id"], |_| Ok(()))
        .unwrap();
    let podcast = mapper(&store, "Podcasts").seed([]).unwrap();
    let native = comment(&store, json!("video"), json!(7));
    native.set_related("commentable", podcast).unwrap();

    commentable(&store).fix_native_reference_value(&native).unwrap();
    assert_eq!(native.get("commentable_type").unwrap(), json!("video"));
}

#[test]
fn test_query_customization_always_fails() {
    let store = blog();
    let mut reference = commentable(&store);

    for on in [JoinOn::default(), JoinOn::from([("commentable_id", "id")])] {
        assert_eq!(reference.on(on).unwrap_err().kind(), ErrorKind::InvalidReferenceMethod);
    }
    assert_eq!(
        reference.where_clause("body IS NULL", vec![]).unwrap_err().kind(),
        ErrorKind::InvalidReferenceMethod
    );
    for flag in [true, false] {
        assert_eq!(
            reference.ignore_case(flag).unwrap_err().kind(),
            ErrorKind::InvalidReferenceMethod
        );
    }
}

#[test]
fn test_reverse_one_to_many_only_sees_its_reference_value() {
    let store = blog();
    let post = mapper(&store, "Posts").seed([("title", json!("First"))]).unwrap();
    mapper(&store, "Videos").seed([("url", json!("a.mp4"))]).unwrap();
    let on_post = comment(&store, json!("post"), json!(1));
    comment(&store, json!("video"), json!(1));

    let mut query = ForeignQuery::new("Posts");
    query.with("comments");
    mapper(&store, "Posts").fetch_records(&query).unwrap();

    let comments = post.related("comments").unwrap();
    let comments = comments.as_record_set().unwrap();
    assert_eq!(comments.len(), 1);
    assert!(comments.get(0).unwrap().ptr_eq(&on_post));
}
