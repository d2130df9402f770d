//! `large-sort` is an external sort implementation for line-oriented text files.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. Sorting is achieved in two passes. During the
//! first pass the input is split into chunks that fit in RAM, each chunk is sorted and saved as a run file.
//! During the second pass the runs are merged together. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! `large-sort` supports the following features:
//!
//! * **Record agnostic:**
//!   every line is parsed into a record by a codec and serialized back when written. Codecs for types
//!   implementing [`FromStr`](std::str::FromStr) and for `serde` CSV records are provided, custom ones can be
//!   built from a pair of functions.
//! * **Custom ordering:**
//!   records can be sorted by their natural order, by a key or using a custom compare function.
//!   The sort is stable.
//! * **Memory backpressure:**
//!   besides a fixed number of lines per run, a run is flushed early when the process resident memory
//!   exceeds the configured limit.
//! * **Pipelined output:**
//!   merged output is written in batches on a background thread while the next batch is prepared.
//!
//! Blank lines are skipped.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use large_sort::{FromStrCodec, LargeSorter, LargeSorterBuilder};
//!
//! fn main() {
//!     let sorter: LargeSorter = LargeSorterBuilder::new()
//!         .with_tmp_dir(Path::new("./"))
//!         .with_flush_threshold(1_000_000)
//!         .build()
//!         .unwrap();
//!
//!     sorter
//!         .sort(Path::new("input.txt"), Path::new("output.txt"), &FromStrCodec::<i64>::new())
//!         .unwrap();
//! }
//! ```

pub mod buffer;
pub mod codec;
pub mod merger;
pub mod ordered;
pub mod policy;
pub mod run;
pub mod sort;
pub mod split;
pub mod tmp;
pub mod writer;

pub use buffer::OutputBuffer;
pub use codec::{CsvCodec, CsvCodecError, FnCodec, FromStrCodec, LineCodec};
pub use merger::RunMerger;
pub use ordered::OrderedList;
pub use policy::{FlushPolicy, MemoryProbe, ProcessMemoryProbe};
pub use run::{RunFile, RunReader};
pub use sort::{CodecSortError, LargeSorter, LargeSorterBuilder, SortError};
pub use split::RunSplitter;
pub use tmp::RunDirectory;
pub use writer::PipelinedWriter;
