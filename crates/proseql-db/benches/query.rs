use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::json;

use proseql_db::{
    CollectionConfig, Database, DatabaseConfig, Document, IndexDef, Query, parse_where,
};

const GENRES: [&str; 8] = [
    "sci-fi", "fantasy", "horror", "noir", "romance", "satire", "history", "essay",
];

fn seed(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| {
            json!({
                "id": format!("b{i}"),
                "title": format!("Book {i}"),
                "year": 1900 + (i % 120) as i64,
                "genre": GENRES[i % GENRES.len()],
            })
            .as_object()
            .unwrap()
            .clone()
        })
        .collect()
}

fn open(indexed: bool, n: usize) -> Database {
    let mut config = CollectionConfig::default();
    if indexed {
        config.indexes.push(IndexDef::field("genre"));
    }
    Database::open(
        DatabaseConfig::default()
            .collection("books", config)
            .seed("books", seed(n)),
    )
    .unwrap()
}

fn bench_find(c: &mut Criterion) {
    let filter = parse_where(&json!({ "genre": "noir" })).unwrap();

    let scanned = open(false, 10_000);
    c.bench_function("find_genre_scan_10k", |b| {
        b.iter(|| {
            scanned
                .find("books", Query::filtered(filter.clone()))
                .unwrap()
                .collect_all()
        })
    });

    let indexed = open(true, 10_000);
    c.bench_function("find_genre_indexed_10k", |b| {
        b.iter(|| {
            indexed
                .find("books", Query::filtered(filter.clone()))
                .unwrap()
                .collect_all()
        })
    });
}

fn bench_create(c: &mut Criterion) {
    c.bench_function("create_indexed", |b| {
        let db = open(true, 0);
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            db.create(
                "books",
                json!({ "id": format!("x{i}"), "title": "New", "year": 2000, "genre": "noir" })
                    .as_object()
                    .unwrap()
                    .clone(),
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_find, bench_create);
criterion_main!(benches);
