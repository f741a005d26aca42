use std::sync::Arc;

use proseql_db::{CollectionConfig, Database, DatabaseConfig};
use proseql_fs::JsonlJournal;
use proseql_rest::{AppState, router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let addr = std::env::var("PROSEQL_ADDR").unwrap_or_else(|_| "127.0.0.1:9700".into());
    let collections = std::env::var("PROSEQL_COLLECTIONS").unwrap_or_else(|_| "items".into());
    let data_dir = std::env::var("PROSEQL_DATA_DIR").ok();

    let mut config = DatabaseConfig::default();
    for name in collections.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut collection = CollectionConfig::default();
        if let Some(dir) = &data_dir {
            let path = std::path::Path::new(dir).join(format!("{name}.jsonl"));
            collection.persistence = Some(Arc::new(JsonlJournal::new(path)));
        }
        config = config.collection(name, collection);
    }

    let db = Database::open(config).unwrap_or_else(|e| {
        eprintln!("failed to open database: {e}");
        std::process::exit(1);
    });

    let app = router().with_state(AppState::new(db));
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        eprintln!("failed to bind {addr}: {e}");
        std::process::exit(1);
    });

    tracing::info!("proseql-rest listening on {addr} (collections: {collections})");
    axum::serve(listener, app).await.unwrap();
}
