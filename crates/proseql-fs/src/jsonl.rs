use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use proseql_db::{Document, Persistence, PersistenceError};

/// Append-only journal: one JSON object per line, appended on each create.
///
/// `load` replays the whole file in order — the engine's last-wins
/// deduplication means a later line for the same id supersedes an earlier
/// one. `flush` compacts: the current entity list is rewritten through a
/// temp file and renamed into place.
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonlJournal {
    fn load(&self) -> Result<Vec<Document>, PersistenceError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut docs = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            docs.push(serde_json::from_str(&line)?);
        }
        Ok(docs)
    }

    fn append(&self, doc: &Document) -> Result<(), PersistenceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(doc)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&self, docs: &[Document]) -> Result<(), PersistenceError> {
        write_lines(&self.path, docs)
    }
}

/// Rewrite a JSONL file atomically: temp file in the same directory, then
/// rename over the target.
fn write_lines(path: &Path, docs: &[Document]) -> Result<(), PersistenceError> {
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for doc in docs {
            serde_json::to_writer(&mut writer, doc)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
