//! External line sorter.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::Path;
use std::sync::Arc;

use crate::buffer::DEFAULT_OUTPUT_BUFFER_CHARS;
use crate::codec::LineCodec;
use crate::merger::RunMerger;
use crate::policy::{
    FlushPolicy, MemoryProbe, ProcessMemoryProbe, DEFAULT_FLUSH_THRESHOLD, DEFAULT_MEMORY_CHECK_INTERVAL,
    DEFAULT_MEMORY_LIMIT,
};
use crate::split::RunSplitter;
use crate::tmp::RunDirectory;

/// Sorting error.
#[derive(Debug)]
pub enum SortError<S: Error, D: Error> {
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Writer thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
    /// Common I/O error.
    IO(io::Error),
    /// Record serialization error.
    SerializationError(S),
    /// Record deserialization error.
    DeserializationError(D),
}

impl<S, D> Error for SortError<S, D>
where
    S: Error + 'static,
    D: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(match &self {
            SortError::TempDir(err) => err,
            SortError::ThreadPoolBuildError(err) => err,
            SortError::IO(err) => err,
            SortError::SerializationError(err) => err,
            SortError::DeserializationError(err) => err,
        })
    }
}

impl<S: Error, D: Error> Display for SortError<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::SerializationError(err) => write!(f, "data serialization error: {}", err),
            SortError::DeserializationError(err) => write!(f, "data deserialization error: {}", err),
        }
    }
}

/// Sorting error produced with codec `C` for records of type `T`.
pub type CodecSortError<T, C> = SortError<<C as LineCodec<T>>::SerializationError, <C as LineCodec<T>>::DeserializationError>;

/// Large sorter builder. Provides methods for [`LargeSorter`] initialization.
#[derive(Clone)]
pub struct LargeSorterBuilder {
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Number of input lines after which a run is flushed.
    flush_threshold: u64,
    /// Number of input lines between two resident memory samples.
    memory_check_interval: u64,
    /// Resident memory size that triggers an early run flush.
    memory_limit: u64,
    /// Resident memory probe.
    memory_probe: Arc<dyn MemoryProbe>,
    /// Number of lines the merge output is written by. Follows the flush threshold if not set.
    output_batch_size: Option<usize>,
    /// Merge output buffer size limit.
    output_buffer_chars: usize,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl LargeSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        LargeSorterBuilder::default()
    }

    /// Builds a [`LargeSorter`] instance using provided configuration.
    pub fn build(self) -> Result<LargeSorter, SortError<io::Error, io::Error>> {
        LargeSorter::new(
            self.tmp_dir.as_deref(),
            FlushPolicy::new(
                self.flush_threshold,
                self.memory_check_interval,
                self.memory_limit,
                self.memory_probe,
            ),
            self.output_batch_size.unwrap_or(self.flush_threshold as usize),
            self.output_buffer_chars,
            self.rw_buf_size,
        )
    }

    /// Sets directory the per-sort temporary directories are created in.
    pub fn with_tmp_dir(mut self, path: &Path) -> LargeSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets number of input lines after which a run is flushed.
    pub fn with_flush_threshold(mut self, flush_threshold: u64) -> LargeSorterBuilder {
        self.flush_threshold = flush_threshold;
        return self;
    }

    /// Sets number of input lines between two resident memory samples.
    pub fn with_memory_check_interval(mut self, interval: u64) -> LargeSorterBuilder {
        self.memory_check_interval = interval;
        return self;
    }

    /// Sets resident memory size in bytes that triggers an early run flush.
    pub fn with_memory_limit(mut self, memory_limit: u64) -> LargeSorterBuilder {
        self.memory_limit = memory_limit;
        return self;
    }

    /// Sets resident memory probe.
    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> LargeSorterBuilder {
        self.memory_probe = probe;
        return self;
    }

    /// Sets number of lines the merge output is written by.
    /// Unless set, the flush threshold is used.
    pub fn with_output_batch_size(mut self, batch_size: usize) -> LargeSorterBuilder {
        self.output_batch_size = Some(batch_size);
        return self;
    }

    /// Sets merge output buffer size limit.
    pub fn with_output_buffer_chars(mut self, chars: usize) -> LargeSorterBuilder {
        self.output_buffer_chars = chars;
        return self;
    }

    /// Sets run file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> LargeSorterBuilder {
        self.rw_buf_size = Some(buf_size);
        return self;
    }
}

impl Default for LargeSorterBuilder {
    fn default() -> Self {
        LargeSorterBuilder {
            tmp_dir: None,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            memory_check_interval: DEFAULT_MEMORY_CHECK_INTERVAL,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            memory_probe: Arc::new(ProcessMemoryProbe),
            output_batch_size: None,
            output_buffer_chars: DEFAULT_OUTPUT_BUFFER_CHARS,
            rw_buf_size: None,
        }
    }
}

/// Large sorter.
///
/// Sorts line-oriented data that doesn't fit in memory. The input is split into sorted runs stored
/// in a temporary directory, then the runs are merged into the output.
pub struct LargeSorter {
    /// Output writer thread pool.
    thread_pool: rayon::ThreadPool,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Run flush policy.
    policy: FlushPolicy,
    /// Number of lines the merge output is written by.
    output_batch_size: usize,
    /// Merge output buffer size limit.
    output_buffer_chars: usize,
    /// Run file read/write buffer size.
    rw_buf_size: Option<usize>,
}

impl LargeSorter {
    /// Creates a new large sorter instance.
    ///
    /// # Arguments
    /// * `tmp_path` - Directory the per-sort temporary directories are created in. If the parameter is
    ///   [`None`] default OS temporary directory will be used.
    /// * `policy` - Run flush policy.
    /// * `output_batch_size` - Number of lines the merge output is written by.
    /// * `output_buffer_chars` - Merge output buffer size limit.
    /// * `rw_buf_size` - Run files read/write buffer size.
    pub fn new(
        tmp_path: Option<&Path>,
        policy: FlushPolicy,
        output_batch_size: usize,
        output_buffer_chars: usize,
        rw_buf_size: Option<usize>,
    ) -> Result<Self, SortError<io::Error, io::Error>> {
        return Ok(LargeSorter {
            thread_pool: Self::init_thread_pool()?,
            tmp_dir: tmp_path.map(Into::into),
            policy,
            output_batch_size,
            output_buffer_chars,
            rw_buf_size,
        });
    }

    fn init_thread_pool() -> Result<rayon::ThreadPool, SortError<io::Error, io::Error>> {
        log::info!("initializing writer thread-pool");

        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .thread_name(|idx| format!("large-sort-writer-{}", idx))
            .build()
            .map_err(|err| SortError::ThreadPoolBuildError(err))?;

        return Ok(thread_pool);
    }

    /// Sorts lines of the input file into the output file in ascending order.
    ///
    /// # Arguments
    /// * `input` - Input file path
    /// * `output` - Output file path
    /// * `codec` - Codec used to parse and serialize lines
    pub fn sort<T, C>(&self, input: &Path, output: &Path, codec: &C) -> Result<(), CodecSortError<T, C>>
    where
        T: Ord,
        C: LineCodec<T>,
    {
        self.sort_by(input, output, codec, T::cmp)
    }

    /// Sorts lines of the input file into the output file in ascending order of keys.
    ///
    /// # Arguments
    /// * `input` - Input file path
    /// * `output` - Output file path
    /// * `codec` - Codec used to parse and serialize lines
    /// * `key` - Function extracting the sort key from a record
    pub fn sort_by_key<T, C, K, G>(
        &self,
        input: &Path,
        output: &Path,
        codec: &C,
        key: G,
    ) -> Result<(), CodecSortError<T, C>>
    where
        C: LineCodec<T>,
        K: Ord,
        G: Fn(&T) -> K + Copy,
    {
        self.sort_by(input, output, codec, move |a: &T, b: &T| key(a).cmp(&key(b)))
    }

    /// Sorts lines of the input file into the output file using a custom compare function.
    ///
    /// # Arguments
    /// * `input` - Input file path
    /// * `output` - Output file path
    /// * `codec` - Codec used to parse and serialize lines
    /// * `compare` - Function to be used to compare items
    pub fn sort_by<T, C, F>(
        &self,
        input: &Path,
        output: &Path,
        codec: &C,
        compare: F,
    ) -> Result<(), CodecSortError<T, C>>
    where
        C: LineCodec<T>,
        F: Fn(&T, &T) -> Ordering + Copy,
    {
        let input_file = fs::File::open(input).map_err(SortError::IO)?;
        let input_stream = match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, input_file),
            None => io::BufReader::new(input_file),
        };

        let output_file = fs::File::create(output).map_err(SortError::IO)?;
        let output_stream = match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, output_file),
            None => io::BufWriter::new(output_file),
        };

        log::info!("sorting {} into {}", input.display(), output.display());
        self.sort_stream_by(input_stream, output_stream, codec, compare)?;

        return Ok(());
    }

    /// Sorts lines of the input stream into the output stream using a custom compare function.
    /// Returns the output once the sorted data is written and flushed.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    /// * `output` - Output stream sorted data to be written to
    /// * `codec` - Codec used to parse and serialize lines
    /// * `compare` - Function to be used to compare items
    pub fn sort_stream_by<T, C, F, R, W>(
        &self,
        input: R,
        output: W,
        codec: &C,
        compare: F,
    ) -> Result<W, CodecSortError<T, C>>
    where
        C: LineCodec<T>,
        F: Fn(&T, &T) -> Ordering + Copy,
        R: BufRead,
        W: Write + Send + 'static,
    {
        let run_dir = RunDirectory::create(self.tmp_dir.as_deref()).map_err(SortError::TempDir)?;

        let result = self.split_and_merge(&run_dir, input, output, codec, compare);
        run_dir.release();

        return result;
    }

    fn split_and_merge<T, C, F, R, W>(
        &self,
        run_dir: &RunDirectory,
        input: R,
        output: W,
        codec: &C,
        compare: F,
    ) -> Result<W, CodecSortError<T, C>>
    where
        C: LineCodec<T>,
        F: Fn(&T, &T) -> Ordering + Copy,
        R: BufRead,
        W: Write + Send + 'static,
    {
        let splitter = RunSplitter::new(codec, compare, &self.policy, run_dir, self.rw_buf_size);
        let runs = splitter.split(input.lines())?;
        log::info!("input split into {} runs", runs.len());

        let merger = RunMerger::new(
            codec,
            compare,
            &self.thread_pool,
            self.output_batch_size,
            self.output_buffer_chars,
            self.rw_buf_size,
        );
        let output = merger.merge(&runs, output)?;
        log::info!("sorting done");

        return Ok(output);
    }
}
