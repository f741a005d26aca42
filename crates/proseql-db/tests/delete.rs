mod common;
use common::*;

use serde_json::json;

use proseql_db::{
    CollectionConfig, Database, DatabaseConfig, DbError, DeleteOptions, DeletePolicy, FieldDef,
    FieldType, IndexDef, Relationship, Schema, Sort, parse_where,
};

/// Authors + books, with books.authorId → authors under the given policy.
fn library(policy: DeletePolicy) -> Database {
    let books = CollectionConfig {
        relationships: vec![Relationship::new("authorId", "authors").on_delete(policy)],
        ..CollectionConfig::default()
    };
    Database::open(
        DatabaseConfig::default()
            .collection("authors", CollectionConfig::default())
            .collection(BOOKS, books)
            .seed(
                "authors",
                vec![
                    doc(json!({ "id": "a1", "name": "Herbert" })),
                    doc(json!({ "id": "a2", "name": "Gibson" })),
                ],
            )
            .seed(
                BOOKS,
                vec![
                    doc(json!({ "id": "1", "title": "Dune", "authorId": "a1" })),
                    doc(json!({ "id": "2", "title": "Neuromancer", "authorId": "a2" })),
                ],
            ),
    )
    .unwrap()
}

// ── Basics ──────────────────────────────────────────────────────

#[test]
fn delete_then_find_by_id_is_not_found() {
    let db = books_db(false);
    let deleted = db.delete(BOOKS, "1", DeleteOptions::default()).unwrap();
    assert_eq!(deleted.get("title"), Some(&json!("Dune")));
    assert!(matches!(
        db.find_by_id(BOOKS, "1"),
        Err(DbError::NotFound { .. })
    ));
    assert_eq!(db.len(BOOKS).unwrap(), 2);
}

#[test]
fn delete_of_missing_entity_is_not_found() {
    let db = books_db(false);
    assert!(matches!(
        db.delete(BOOKS, "99", DeleteOptions::default()),
        Err(DbError::NotFound { .. })
    ));
}

#[test]
fn append_only_blocks_delete() {
    let config = CollectionConfig {
        append_only: true,
        ..CollectionConfig::default()
    };
    let db = Database::open(
        DatabaseConfig::default()
            .collection("events", config)
            .seed("events", vec![doc(json!({ "id": "e1" }))]),
    )
    .unwrap();
    assert!(matches!(
        db.delete("events", "e1", DeleteOptions::default()),
        Err(DbError::Operation { .. })
    ));
}

// ── Foreign keys on write ───────────────────────────────────────

#[test]
fn create_with_dangling_ref_is_rejected() {
    let db = library(DeletePolicy::Restrict);
    let err = db
        .create(BOOKS, doc(json!({ "id": "3", "title": "Ghost", "authorId": "a9" })))
        .unwrap_err();
    match err {
        DbError::ForeignKey { field, value, target, .. } => {
            assert_eq!(field, "authorId");
            assert_eq!(value, json!("a9"));
            assert_eq!(target, "authors");
        }
        other => panic!("expected ForeignKey, got {other:?}"),
    }
}

#[test]
fn null_ref_fields_pass() {
    let db = library(DeletePolicy::Restrict);
    db.create(BOOKS, doc(json!({ "id": "3", "title": "Anon", "authorId": null }))).unwrap();
    db.create(BOOKS, doc(json!({ "id": "4", "title": "Unknown" }))).unwrap();
}

// ── Delete policies ─────────────────────────────────────────────

#[test]
fn restrict_refuses_while_referrers_exist() {
    let db = library(DeletePolicy::Restrict);
    assert!(matches!(
        db.delete("authors", "a1", DeleteOptions::default()),
        Err(DbError::ForeignKey { .. })
    ));
    // Remove the referrer, then the delete goes through.
    db.delete(BOOKS, "1", DeleteOptions::default()).unwrap();
    db.delete("authors", "a1", DeleteOptions::default()).unwrap();
}

#[test]
fn cascade_removes_referrers_transitively() {
    let db = library(DeletePolicy::Cascade);
    db.delete("authors", "a1", DeleteOptions::default()).unwrap();
    assert!(db.find_by_id(BOOKS, "1").is_err());
    assert!(db.find_by_id(BOOKS, "2").is_ok());
    assert!(db.find_by_id("authors", "a2").is_ok());
}

#[test]
fn set_null_clears_the_ref_field() {
    let db = library(DeletePolicy::SetNull);
    db.delete("authors", "a1", DeleteOptions::default()).unwrap();
    assert_eq!(
        db.find_by_id(BOOKS, "1").unwrap().get("authorId"),
        Some(&json!(null))
    );
}

#[test]
fn cyclic_cascades_terminate() {
    // books reference books: a cycle 1 → 2 → 1.
    let config = CollectionConfig {
        relationships: vec![
            Relationship::new("sequelOf", BOOKS).on_delete(DeletePolicy::Cascade),
        ],
        ..CollectionConfig::default()
    };
    let db = Database::open(DatabaseConfig::default().collection(BOOKS, config)).unwrap();
    db.create(BOOKS, doc(json!({ "id": "1", "title": "One" }))).unwrap();
    db.create(BOOKS, doc(json!({ "id": "2", "title": "Two", "sequelOf": "1" }))).unwrap();
    db.update(
        BOOKS,
        "1",
        &proseql_db::parse_patch(&json!({ "sequelOf": "2" })).unwrap(),
    )
    .unwrap();

    db.delete(BOOKS, "1", DeleteOptions::default()).unwrap();
    assert_eq!(db.len(BOOKS).unwrap(), 0);
}

// ── Soft delete ─────────────────────────────────────────────────

fn soft_db() -> Database {
    let schema = Schema::new(vec![
        FieldDef::required("title", FieldType::String),
        FieldDef::optional("genre", FieldType::String),
        FieldDef::optional("deletedAt", FieldType::Number),
    ]);
    let mut config = CollectionConfig::with_schema(schema);
    config.indexes = vec![IndexDef::field("genre")];
    Database::open(
        DatabaseConfig::default().collection(BOOKS, config).seed(
            BOOKS,
            vec![doc(json!({ "id": "1", "title": "Dune", "genre": "sci-fi" }))],
        ),
    )
    .unwrap()
}

#[test]
fn soft_delete_stamps_and_keeps_the_entity() {
    let db = soft_db();
    let stamped = db.delete(BOOKS, "1", DeleteOptions::soft()).unwrap();
    assert!(stamped.get("deletedAt").is_some_and(|v| v.is_number()));

    // Still present, still indexed.
    assert!(db.find_by_id(BOOKS, "1").is_ok());
    assert_eq!(db.find(BOOKS, query(json!({ "genre": "sci-fi" }))).unwrap().ids(), vec!["1"]);

    // A second soft delete finds nothing to mark.
    assert!(matches!(
        db.delete(BOOKS, "1", DeleteOptions::soft()),
        Err(DbError::NotFound { .. })
    ));

    // Hard delete still possible.
    db.delete(BOOKS, "1", DeleteOptions::default()).unwrap();
    assert!(db.find_by_id(BOOKS, "1").is_err());
}

#[test]
fn soft_delete_without_capability_is_an_operation_error() {
    let db = books_db(false);
    assert!(matches!(
        db.delete(BOOKS, "1", DeleteOptions::soft()),
        Err(DbError::Operation { .. })
    ));
}

// ── delete_many ─────────────────────────────────────────────────

#[test]
fn delete_many_removes_every_match() {
    let db = books_db(false);
    let result = db
        .delete_many(
            BOOKS,
            &parse_where(&json!({ "genre": "sci-fi" })).unwrap(),
            DeleteOptions::default(),
        )
        .unwrap();
    assert_eq!(result.count, 2);
    let mut q = proseql_db::Query::default();
    q.sort = vec![Sort::asc("id")];
    assert_eq!(db.find(BOOKS, q).unwrap().ids(), vec!["3"]);
}

#[test]
fn delete_many_restrict_failure_rolls_everything_back() {
    let db = library(DeletePolicy::Restrict);
    // Deleting all authors: the first hit has a referrer, so nothing goes.
    let err = db.delete_many(
        "authors",
        &parse_where(&json!({})).unwrap(),
        DeleteOptions::default(),
    );
    assert!(matches!(err, Err(DbError::ForeignKey { .. })));
    assert_eq!(db.len("authors").unwrap(), 2);
}
