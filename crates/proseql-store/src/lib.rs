mod entity;
mod state;

pub use entity::{Document, Entity, EntityMap};
pub use state::VersionedCell;
