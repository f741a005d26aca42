pub mod error;
pub mod parse;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
