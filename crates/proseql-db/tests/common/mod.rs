#![allow(dead_code)]

use serde_json::json;

use proseql_db::{
    CollectionConfig, Database, DatabaseConfig, Document, IndexDef, Query, parse_where,
};

pub const BOOKS: &str = "books";

pub fn doc(value: serde_json::Value) -> Document {
    value.as_object().unwrap().clone()
}

/// The three seed books the query scenarios build on.
pub fn seed_books() -> Vec<Document> {
    vec![
        doc(json!({ "id": "1", "title": "Dune", "year": 1965, "genre": "sci-fi" })),
        doc(json!({ "id": "2", "title": "Neuromancer", "year": 1984, "genre": "sci-fi" })),
        doc(json!({ "id": "3", "title": "The Hobbit", "year": 1937, "genre": "fantasy" })),
    ]
}

/// Schema-less books collection, optionally indexed on `genre`, seeded.
pub fn books_db(indexed: bool) -> Database {
    let mut config = CollectionConfig::default();
    if indexed {
        config.indexes.push(IndexDef::field("genre"));
    }
    Database::open(
        DatabaseConfig::default()
            .collection(BOOKS, config)
            .seed(BOOKS, seed_books()),
    )
    .unwrap()
}

/// Query built from a JSON where clause.
pub fn query(filter: serde_json::Value) -> Query {
    Query::filtered(parse_where(&filter).unwrap())
}
