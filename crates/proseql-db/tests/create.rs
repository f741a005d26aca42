mod common;
use common::*;

use serde_json::json;

use proseql_db::{
    CollectionConfig, CreateManyOptions, Database, DatabaseConfig, DbError, FieldDef, FieldType,
    Query, Schema,
};

fn book_schema() -> Schema {
    Schema::new(vec![
        FieldDef::required("title", FieldType::String),
        FieldDef::required("year", FieldType::Number),
        FieldDef::optional("genre", FieldType::String),
    ])
}

fn schema_db() -> Database {
    Database::open(
        DatabaseConfig::default()
            .collection(BOOKS, CollectionConfig::with_schema(book_schema())),
    )
    .unwrap()
}

// ── Basics ──────────────────────────────────────────────────────

#[test]
fn create_then_find_by_id_round_trips() {
    let db = schema_db();
    let input = doc(json!({ "id": "1", "title": "Dune", "year": 1965, "genre": "sci-fi" }));
    let created = db.create(BOOKS, input.clone()).unwrap();
    assert_eq!(created, input);
    assert_eq!(db.find_by_id(BOOKS, "1").unwrap(), input);
}

#[test]
fn missing_id_is_generated() {
    let db = schema_db();
    let created = db
        .create(BOOKS, doc(json!({ "title": "Dune", "year": 1965 })))
        .unwrap();
    let id = created.get("id").and_then(|v| v.as_str()).unwrap();
    assert!(!id.is_empty());
    assert!(db.find_by_id(BOOKS, id).is_ok());
}

#[test]
fn duplicate_id_is_rejected_and_state_unchanged() {
    let db = books_db(false);
    let err = db
        .create(BOOKS, doc(json!({ "id": "1", "title": "Imposter", "year": 2000 })))
        .unwrap_err();
    match err {
        DbError::DuplicateKey { field, value, existing_id, .. } => {
            assert_eq!(field, "id");
            assert_eq!(value, json!("1"));
            assert_eq!(existing_id, "1");
        }
        other => panic!("expected DuplicateKey, got {other:?}"),
    }
    assert_eq!(db.find_by_id(BOOKS, "1").unwrap().get("title"), Some(&json!("Dune")));
    assert_eq!(db.len(BOOKS).unwrap(), 3);
}

// ── Validation ──────────────────────────────────────────────────

#[test]
fn schema_invalid_inputs_are_rejected() {
    let db = schema_db();

    // Wrong type, missing required field, undeclared field, non-string id.
    let invalid = [
        json!({ "id": "x", "title": "Dune", "year": "1965" }),
        json!({ "id": "x", "title": "Dune" }),
        json!({ "id": "x", "title": "Dune", "year": 1965, "isbn": "123" }),
        json!({ "id": 7, "title": "Dune", "year": 1965 }),
    ];
    for input in invalid {
        assert!(
            matches!(db.create(BOOKS, doc(input.clone())), Err(DbError::Validation { .. })),
            "expected rejection of {input}"
        );
    }
    assert_eq!(db.len(BOOKS).unwrap(), 0);
}

#[test]
fn validation_issues_carry_field_diagnostics() {
    let db = schema_db();
    let err = db
        .create(BOOKS, doc(json!({ "id": "x", "title": 5, "year": 1965 })))
        .unwrap_err();
    match err {
        DbError::Validation { issues } => {
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].field, "title");
            assert_eq!(issues[0].expected.as_deref(), Some("string"));
            assert_eq!(issues[0].received.as_deref(), Some("number"));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

// ── Unique constraints ──────────────────────────────────────────

fn unique_title_db() -> Database {
    let config = CollectionConfig {
        unique: vec![vec!["title".to_string()]],
        ..CollectionConfig::default()
    };
    Database::open(DatabaseConfig::default().collection(BOOKS, config)).unwrap()
}

#[test]
fn unique_constraint_allows_exactly_one_winner() {
    let db = unique_title_db();
    let mut succeeded = 0;
    let mut failed = 0;
    for i in 0..5 {
        let input = doc(json!({ "id": format!("b{i}"), "title": "Dune" }));
        match db.create(BOOKS, input) {
            Ok(_) => succeeded += 1,
            Err(DbError::UniqueConstraint { existing_id, fields, .. }) => {
                assert_eq!(existing_id, "b0");
                assert_eq!(fields, vec!["title"]);
                failed += 1;
            }
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(succeeded, 1);
    assert_eq!(failed, 4);
}

#[test]
fn null_valued_fields_are_exempt_from_uniqueness() {
    let db = unique_title_db();
    db.create(BOOKS, doc(json!({ "id": "a", "title": null }))).unwrap();
    db.create(BOOKS, doc(json!({ "id": "b", "title": null }))).unwrap();
    db.create(BOOKS, doc(json!({ "id": "c" }))).unwrap();
}

// ── create_many ─────────────────────────────────────────────────

#[test]
fn create_many_without_skip_is_all_or_nothing() {
    let db = books_db(false);
    let err = db.create_many(
        BOOKS,
        vec![
            doc(json!({ "id": "10", "title": "New One" })),
            doc(json!({ "id": "1", "title": "Duplicate" })),
        ],
        CreateManyOptions::default(),
    );
    assert!(matches!(err, Err(DbError::DuplicateKey { .. })));
    // The first entity must not have survived the failed batch.
    assert!(db.find_by_id(BOOKS, "10").is_err());
    assert_eq!(db.len(BOOKS).unwrap(), 3);
}

#[test]
fn create_many_with_skip_reports_survivors_and_skipped() {
    let db = books_db(false);
    let result = db
        .create_many(
            BOOKS,
            vec![
                doc(json!({ "id": "10", "title": "New One" })),
                doc(json!({ "id": "1", "title": "Duplicate" })),
                doc(json!({ "id": "11", "title": "New Two" })),
            ],
            CreateManyOptions { skip_duplicates: true },
        )
        .unwrap();
    assert_eq!(result.created.len(), 2);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].id.as_deref(), Some("1"));
    assert!(matches!(result.skipped[0].reason, DbError::DuplicateKey { .. }));
    assert_eq!(db.len(BOOKS).unwrap(), 5);
}

// ── Append-only ─────────────────────────────────────────────────

#[test]
fn append_only_collections_still_accept_creates() {
    let config = CollectionConfig {
        append_only: true,
        ..CollectionConfig::default()
    };
    let db = Database::open(DatabaseConfig::default().collection("events", config)).unwrap();
    db.create("events", doc(json!({ "id": "e1", "kind": "opened" }))).unwrap();
    assert_eq!(db.len("events").unwrap(), 1);
}

// ── Seeding ─────────────────────────────────────────────────────

#[test]
fn seed_data_deduplicates_by_id_last_wins() {
    let db = Database::open(
        DatabaseConfig::default()
            .collection(BOOKS, CollectionConfig::default())
            .seed(
                BOOKS,
                vec![
                    doc(json!({ "id": "1", "title": "First" })),
                    doc(json!({ "id": "1", "title": "Second" })),
                ],
            ),
    )
    .unwrap();
    assert_eq!(db.len(BOOKS).unwrap(), 1);
    assert_eq!(db.find_by_id(BOOKS, "1").unwrap().get("title"), Some(&json!("Second")));
}

#[test]
fn unknown_collection_is_an_operation_error() {
    let db = books_db(false);
    assert!(matches!(
        db.create("movies", doc(json!({ "id": "m1" }))),
        Err(DbError::Operation { .. })
    ));
    assert!(matches!(
        db.find("movies", Query::default()),
        Err(DbError::Operation { .. })
    ));
}
