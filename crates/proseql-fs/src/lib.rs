mod file;
mod jsonl;

pub use file::JsonFile;
pub use jsonl::JsonlJournal;
