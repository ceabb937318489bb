//! Append-only, concurrency-safe CSV result table.

use cs_types::{ResultRow, SinkError};
use parking_lot::Mutex;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Output table shared by every worker.
///
/// Each row is encoded in full before the lock is taken, then written with a
/// single `write_all` and flushed, so rows never interleave and a finished
/// row is visible immediately.
pub struct ResultSink<W: Write> {
    out: Mutex<W>,
}

/// Sink over a file or standard output.
pub type TableSink = ResultSink<Box<dyn Write + Send>>;

impl<W: Write> ResultSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Append one row of comma-separated values.
    pub fn append_row<T: AsRef<[u8]>>(&self, values: &[T]) -> Result<(), SinkError> {
        let mut encoder = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        encoder.write_record(values)?;
        let line = encoder
            .into_inner()
            .map_err(|err| SinkError::Write(err.into_error()))?;

        let mut out = self.out.lock();
        out.write_all(&line)?;
        out.flush()?;
        Ok(())
    }

    /// Append the combination values followed by the aggregate.
    pub fn append_result(&self, row: &ResultRow) -> Result<(), SinkError> {
        self.append_row(&row.fields())?;
        debug!(combination = %row.combination, aggregate = %row.aggregate, "row written");
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> fmt::Debug for ResultSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSink").finish_non_exhaustive()
    }
}

impl TableSink {
    /// Open `path` for writing; `-` means standard output.
    ///
    /// Existing files are truncated unless `append` is set.
    pub fn open(path: &Path, append: bool) -> Result<Self, SinkError> {
        if path == Path::new("-") {
            return Ok(Self::new(Box::new(std::io::stdout())));
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|source| SinkError::Open {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self::new(Box::new(file)))
    }
}
