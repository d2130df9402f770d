//! Run splitter.

use std::cmp::Ordering;
use std::io;
use std::marker::PhantomData;
use std::mem;

use crate::codec::LineCodec;
use crate::policy::FlushPolicy;
use crate::run::{RunFile, RunFileError};
use crate::sort::SortError;
use crate::tmp::RunDirectory;

/// Splits an input line stream into sorted runs.
pub struct RunSplitter<'a, T, C, F>
where
    C: LineCodec<T>,
    F: Fn(&T, &T) -> Ordering,
{
    codec: &'a C,
    compare: F,
    policy: &'a FlushPolicy,
    dir: &'a RunDirectory,
    rw_buf_size: Option<usize>,

    item_type: PhantomData<T>,
}

impl<'a, T, C, F> RunSplitter<'a, T, C, F>
where
    C: LineCodec<T>,
    F: Fn(&T, &T) -> Ordering,
{
    /// Creates a new splitter.
    ///
    /// # Arguments
    /// * `codec` - Codec used to parse input lines and serialize run records
    /// * `compare` - Function to be used to compare items
    /// * `policy` - Policy deciding when a run is flushed
    /// * `dir` - Directory the runs are written to
    /// * `rw_buf_size` - Run file write buffer size
    pub fn new(
        codec: &'a C,
        compare: F,
        policy: &'a FlushPolicy,
        dir: &'a RunDirectory,
        rw_buf_size: Option<usize>,
    ) -> Self {
        RunSplitter {
            codec,
            compare,
            policy,
            dir,
            rw_buf_size,
            item_type: PhantomData,
        }
    }

    /// Reads the input and writes it out as runs sorted in ascending order.
    /// Blank lines are skipped but still counted as read.
    /// Returns runs in creation order.
    ///
    /// # Arguments
    /// * `lines` - Input lines without line terminators
    pub fn split<I>(&self, lines: I) -> Result<Vec<RunFile>, SortError<C::SerializationError, C::DeserializationError>>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let mut buffer = Vec::new();
        let mut runs = Vec::new();
        let mut lines_read: u64 = 0;

        for line in lines.into_iter() {
            let line = line.map_err(SortError::IO)?;
            lines_read += 1;

            if !line.trim().is_empty() {
                let item = self.codec.parse(&line).map_err(SortError::DeserializationError)?;
                buffer.push(item);
            }

            if self.policy.should_flush(lines_read) && !buffer.is_empty() {
                runs.push(self.flush(mem::take(&mut buffer), lines_read)?);
            }
        }

        if !buffer.is_empty() {
            runs.push(self.flush(buffer, lines_read)?);
        }

        log::debug!("input split done (lines: {}, runs: {})", lines_read, runs.len());

        return Ok(runs);
    }

    fn flush(
        &self,
        mut buffer: Vec<T>,
        lines_read: u64,
    ) -> Result<RunFile, SortError<C::SerializationError, C::DeserializationError>> {
        log::debug!("sorting run data (records: {}) ...", buffer.len());
        buffer.sort_by(&self.compare);

        let run = RunFile::create(self.dir.run_path(lines_read), &buffer, self.codec, self.rw_buf_size).map_err(
            |err| match err {
                RunFileError::IO(err) => SortError::IO(err),
                RunFileError::SerializationError(err) => SortError::SerializationError(err),
            },
        )?;
        log::debug!("run {} saved (records: {})", run.path().display(), run.records());

        return Ok(run);
    }
}
