//! JSON Lines file source.
//!
//! Streams a newline-delimited JSON file as [`Record`] rows, `chunk_size`
//! lines at a time. Empty/whitespace-only lines are skipped. A parse failure
//! faults the stream with the line number and path; rows from earlier chunks
//! have already been delivered by then.

use crate::cancel::CancellationToken;
use crate::producer::{ChunkSink, CollectChunks, CollectError};
use crate::row::{ColumnMap, Record};
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Producer that reads typed records from a JSONL file.
pub struct JsonlSource<T> {
    path: PathBuf,
    columns: Arc<ColumnMap<T>>,
    chunk_size: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonlSource<T> {
    /// `chunk_size` is clamped to at least one line.
    pub fn new(path: impl AsRef<Path>, columns: Arc<ColumnMap<T>>, chunk_size: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            columns,
            chunk_size: chunk_size.max(1),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> CollectChunks<Record<T>> for JsonlSource<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn collect_chunks(
        &self,
        sink: &ChunkSink<Record<T>>,
        cancel: &CancellationToken,
    ) -> Result<(), CollectError> {
        let path = &self.path;
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let rdr = BufReader::new(f);

        let mut batch = Vec::with_capacity(self.chunk_size);
        let mut emitted = 0usize;
        for (i, line) in rdr.lines().enumerate() {
            let line = line.with_context(|| format!("read line {} in {}", i + 1, path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let item: T = serde_json::from_str(&line)
                .with_context(|| format!("parse JSONL line {} in {}", i + 1, path.display()))?;
            batch.push(Record::new(Arc::clone(&self.columns), item));
            if batch.len() == self.chunk_size {
                cancel.check()?;
                emitted += batch.len();
                sink.put_rows(std::mem::replace(
                    &mut batch,
                    Vec::with_capacity(self.chunk_size),
                ))?;
            }
        }
        if !batch.is_empty() {
            emitted += batch.len();
            sink.put_rows(batch)?;
        }
        debug!(path = %path.display(), rows = emitted, "jsonl source exhausted");
        Ok(())
    }
}
