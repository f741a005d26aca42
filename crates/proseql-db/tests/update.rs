mod common;
use common::*;

use serde_json::json;

use proseql_db::{
    CollectionConfig, Database, DatabaseConfig, DbError, DeleteOptions, FieldDef, FieldType,
    Schema, parse_patch, parse_where,
};

fn patch(value: serde_json::Value) -> proseql_db::Patch {
    parse_patch(&value).unwrap()
}

// ── Patch operators ─────────────────────────────────────────────

#[test]
fn direct_field_replacement_is_implicit_set() {
    let db = books_db(false);
    let updated = db.update(BOOKS, "1", &patch(json!({ "title": "Dune Messiah" }))).unwrap();
    assert_eq!(updated.get("title"), Some(&json!("Dune Messiah")));
    assert_eq!(updated.get("year"), Some(&json!(1965)));
}

#[test]
fn numeric_and_boolean_operators() {
    let db = books_db(false);
    db.update(BOOKS, "1", &patch(json!({ "year": { "$increment": 10 } }))).unwrap();
    db.update(BOOKS, "1", &patch(json!({ "year": { "$decrement": 5 } }))).unwrap();
    db.update(BOOKS, "1", &patch(json!({ "year": { "$multiply": 2 } }))).unwrap();
    let updated = db
        .update(BOOKS, "1", &patch(json!({ "inPrint": { "$set": true } })))
        .unwrap();
    assert_eq!(updated.get("year"), Some(&json!(3940)));
    assert_eq!(updated.get("inPrint"), Some(&json!(true)));

    let toggled = db.update(BOOKS, "1", &patch(json!({ "inPrint": { "$toggle": true } }))).unwrap();
    assert_eq!(toggled.get("inPrint"), Some(&json!(false)));
}

#[test]
fn append_and_remove_on_arrays() {
    let db = books_db(false);
    db.update(BOOKS, "1", &patch(json!({ "tags": { "$append": "classic" } }))).unwrap();
    db.update(BOOKS, "1", &patch(json!({ "tags": { "$append": "epic" } }))).unwrap();
    let updated = db
        .update(BOOKS, "1", &patch(json!({ "tags": { "$remove": "classic" } })))
        .unwrap();
    assert_eq!(updated.get("tags"), Some(&json!(["epic"])));
}

#[test]
fn operator_type_mismatch_is_an_operation_error() {
    let db = books_db(false);
    assert!(matches!(
        db.update(BOOKS, "1", &patch(json!({ "title": { "$increment": 1 } }))),
        Err(DbError::Operation { .. })
    ));
    // Nothing changed.
    assert_eq!(db.find_by_id(BOOKS, "1").unwrap().get("title"), Some(&json!("Dune")));
}

// ── Guard rails ─────────────────────────────────────────────────

#[test]
fn update_of_missing_entity_is_not_found() {
    let db = books_db(false);
    assert!(matches!(
        db.update(BOOKS, "99", &patch(json!({ "title": "x" }))),
        Err(DbError::NotFound { .. })
    ));
}

#[test]
fn append_only_blocks_update() {
    let config = CollectionConfig {
        append_only: true,
        ..CollectionConfig::default()
    };
    let db = Database::open(
        DatabaseConfig::default()
            .collection("events", config)
            .seed("events", vec![doc(json!({ "id": "e1", "kind": "opened" }))]),
    )
    .unwrap();
    assert!(matches!(
        db.update("events", "e1", &patch(json!({ "kind": "closed" }))),
        Err(DbError::Operation { .. })
    ));
}

#[test]
fn soft_deleted_entities_are_invisible_to_update() {
    let schema = Schema::new(vec![
        FieldDef::required("title", FieldType::String),
        FieldDef::optional("deletedAt", FieldType::Number),
    ]);
    let db = Database::open(
        DatabaseConfig::default()
            .collection(BOOKS, CollectionConfig::with_schema(schema))
            .seed(BOOKS, vec![doc(json!({ "id": "1", "title": "Dune" }))]),
    )
    .unwrap();
    db.delete(BOOKS, "1", DeleteOptions::soft()).unwrap();
    assert!(matches!(
        db.update(BOOKS, "1", &patch(json!({ "title": "x" }))),
        Err(DbError::NotFound { .. })
    ));
}

#[test]
fn merged_entity_is_revalidated() {
    let schema = Schema::new(vec![FieldDef::required("title", FieldType::String)]);
    let db = Database::open(
        DatabaseConfig::default()
            .collection(BOOKS, CollectionConfig::with_schema(schema))
            .seed(BOOKS, vec![doc(json!({ "id": "1", "title": "Dune" }))]),
    )
    .unwrap();
    assert!(matches!(
        db.update(BOOKS, "1", &patch(json!({ "title": { "$set": 7 } }))),
        Err(DbError::Validation { .. })
    ));
}

#[test]
fn unique_recheck_excludes_self() {
    let config = CollectionConfig {
        unique: vec![vec!["title".to_string()]],
        ..CollectionConfig::default()
    };
    let db = Database::open(
        DatabaseConfig::default().collection(BOOKS, config).seed(
            BOOKS,
            vec![
                doc(json!({ "id": "1", "title": "Dune" })),
                doc(json!({ "id": "2", "title": "Neuromancer" })),
            ],
        ),
    )
    .unwrap();

    // Rewriting our own unique value is fine.
    db.update(BOOKS, "1", &patch(json!({ "title": "Dune" }))).unwrap();
    // Colliding with another entity is not.
    assert!(matches!(
        db.update(BOOKS, "1", &patch(json!({ "title": "Neuromancer" }))),
        Err(DbError::UniqueConstraint { .. })
    ));
}

// ── update_many ─────────────────────────────────────────────────

#[test]
fn update_many_patches_every_match() {
    let db = books_db(false);
    let result = db
        .update_many(
            BOOKS,
            &parse_where(&json!({ "genre": "sci-fi" })).unwrap(),
            &patch(json!({ "shelf": "A" })),
        )
        .unwrap();
    assert_eq!(result.count, 2);
    assert!(result.entities.iter().all(|e| e.get("shelf") == Some(&json!("A"))));
    assert!(db.find_by_id(BOOKS, "3").unwrap().get("shelf").is_none());
}

#[test]
fn update_many_is_all_or_nothing() {
    let db = books_db(false);
    // $toggle works on neither book; the first failure aborts the batch.
    let err = db.update_many(
        BOOKS,
        &parse_where(&json!({ "genre": "sci-fi" })).unwrap(),
        &patch(json!({ "title": { "$toggle": true } })),
    );
    assert!(matches!(err, Err(DbError::Operation { .. })));
    assert_eq!(db.find_by_id(BOOKS, "1").unwrap().get("title"), Some(&json!("Dune")));
    assert_eq!(
        db.find_by_id(BOOKS, "2").unwrap().get("title"),
        Some(&json!("Neuromancer"))
    );
}

// ── upsert ──────────────────────────────────────────────────────

#[test]
fn upsert_creates_then_updates() {
    use proseql_db::{UpsertOp, UpsertSpec};

    let db = books_db(false);
    let spec = UpsertSpec {
        filter: parse_where(&json!({ "title": "Foundation" })).unwrap(),
        create: doc(json!({ "id": "4", "year": 1951, "genre": "sci-fi" })),
        update: patch(json!({ "year": { "$set": 1951 } })),
    };

    let first = db.upsert(BOOKS, spec.clone(), None).unwrap();
    assert_eq!(first.operation, UpsertOp::Created);
    // The identifying value merged into the created entity.
    assert_eq!(first.entity.get("title"), Some(&json!("Foundation")));

    let second = db.upsert(BOOKS, spec, None).unwrap();
    assert_eq!(second.operation, UpsertOp::Updated);
    assert_eq!(db.len(BOOKS).unwrap(), 4);
}

#[test]
fn upsert_with_multiple_matches_fails() {
    use proseql_db::UpsertSpec;

    let db = books_db(false);
    let spec = UpsertSpec {
        filter: parse_where(&json!({ "genre": "sci-fi" })).unwrap(),
        create: doc(json!({})),
        update: patch(json!({ "shelf": "A" })),
    };
    assert!(matches!(
        db.upsert(BOOKS, spec, None),
        Err(DbError::Operation { .. })
    ));
}
