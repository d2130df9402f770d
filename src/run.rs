//! Run files.
//!
//! A run is a text file holding a sorted part of the input, one serialized record per line.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::codec::LineCodec;

/// Run file name prefix.
pub const RUN_FILE_PREFIX: &str = "large-sort_";

/// Returns the run file name for a run flushed after `lines_read` input lines.
pub fn run_file_name(lines_read: u64) -> String {
    format!("{}{:010}.txt", RUN_FILE_PREFIX, lines_read)
}

/// Run file creation error.
#[derive(Debug)]
pub enum RunFileError<S: Error> {
    /// Common I/O error.
    IO(io::Error),
    /// Record serialization error.
    SerializationError(S),
}

impl<S: Error + 'static> Error for RunFileError<S> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(match &self {
            RunFileError::IO(err) => err,
            RunFileError::SerializationError(err) => err,
        })
    }
}

impl<S: Error> Display for RunFileError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            RunFileError::IO(err) => write!(f, "I/O operation failed: {}", err),
            RunFileError::SerializationError(err) => write!(f, "record serialization error: {}", err),
        }
    }
}

impl<S: Error> From<io::Error> for RunFileError<S> {
    fn from(err: io::Error) -> Self {
        RunFileError::IO(err)
    }
}

/// Sorted run stored on the file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFile {
    path: PathBuf,
    records: usize,
}

impl RunFile {
    /// Writes items to a new run file.
    /// Items are expected to be sorted already.
    ///
    /// # Arguments
    /// * `path` - Run file path
    /// * `items` - Items to be saved
    /// * `codec` - Codec used to serialize items
    /// * `buf_size` - File write buffer size
    pub fn create<'a, T, C>(
        path: PathBuf,
        items: impl IntoIterator<Item = &'a T>,
        codec: &C,
        buf_size: Option<usize>,
    ) -> Result<Self, RunFileError<C::SerializationError>>
    where
        T: 'a,
        C: LineCodec<T>,
    {
        let file = fs::File::create(&path)?;
        let mut writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        };

        let mut records = 0;
        for item in items.into_iter() {
            let line = codec.serialize(item).map_err(RunFileError::SerializationError)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            records += 1;
        }
        writer.flush()?;

        return Ok(RunFile { path, records });
    }

    /// Refers to an existing run file.
    pub fn from_path(path: PathBuf) -> Self {
        RunFile { path, records: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of records written, zero for runs opened by path.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Opens the run for reading.
    pub fn open(&self, buf_size: Option<usize>) -> io::Result<RunReader> {
        let file = fs::File::open(&self.path)?;
        let reader = match buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        return Ok(RunReader {
            path: self.path.clone(),
            lines: reader.lines(),
        });
    }
}

/// Single pass line source over a run file.
pub struct RunReader {
    path: PathBuf,
    lines: io::Lines<io::BufReader<fs::File>>,
}

impl RunReader {
    /// Reads the next line as is, blank lines included.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next().transpose()
    }

    /// Reads the next non-blank line.
    pub fn next_record_line(&mut self) -> io::Result<Option<String>> {
        while let Some(line) = self.next_line()? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }

        return Ok(None);
    }

    /// Closes the reader and removes the run file. Removal errors are ignored.
    pub fn close(self) {
        let RunReader { path, lines } = self;
        drop(lines);

        if let Err(err) = fs::remove_file(&path) {
            log::debug!("run file {} not removed: {}", path.display(), err);
        }
    }
}
