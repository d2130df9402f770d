//! K-way run merger.

use std::cmp::Ordering;
use std::io::prelude::*;
use std::marker::PhantomData;

use crate::buffer::OutputBuffer;
use crate::codec::LineCodec;
use crate::ordered::OrderedList;
use crate::run::{RunFile, RunReader};
use crate::sort::SortError;
use crate::writer::PipelinedWriter;

/// Merge position in a single run.
struct Cursor<T> {
    /// Run index, used to keep records with equal keys in run order.
    run: usize,
    item: T,
    reader: RunReader,
}

/// K-way merger.
/// Merges multiple sorted runs into a single sorted output.
///
/// Active cursors are kept in a list sorted in descending order, so the cursor holding the smallest
/// record is always the last one. After its record is written the cursor is advanced and put back
/// using binary search insertion. Time complexity is *m* \* log(*n*) comparisons where *m* is
/// the number of records and *n* is the number of runs.
pub struct RunMerger<'a, T, C, F>
where
    C: LineCodec<T>,
    F: Fn(&T, &T) -> Ordering + Copy,
{
    codec: &'a C,
    compare: F,
    pool: &'a rayon::ThreadPool,
    batch_size: usize,
    max_buffer_chars: usize,
    rw_buf_size: Option<usize>,

    item_type: PhantomData<T>,
}

impl<'a, T, C, F> RunMerger<'a, T, C, F>
where
    C: LineCodec<T>,
    F: Fn(&T, &T) -> Ordering + Copy,
{
    /// Creates a new merger.
    ///
    /// # Arguments
    /// * `codec` - Codec used to parse run records and serialize output lines
    /// * `compare` - Function to be used to compare items
    /// * `pool` - Thread pool output writes are performed on
    /// * `batch_size` - Output is written when more lines than that are buffered
    /// * `max_buffer_chars` - Output is written when buffered lines are longer than that in total
    /// * `rw_buf_size` - Run file read buffer size
    pub fn new(
        codec: &'a C,
        compare: F,
        pool: &'a rayon::ThreadPool,
        batch_size: usize,
        max_buffer_chars: usize,
        rw_buf_size: Option<usize>,
    ) -> Self {
        RunMerger {
            codec,
            compare,
            pool,
            batch_size,
            max_buffer_chars,
            rw_buf_size,
            item_type: PhantomData,
        }
    }

    /// Merges runs into the output. Each run should be sorted in ascending order otherwise
    /// the result is undefined. Run files are removed as soon as they are read through.
    /// Returns the output writer once all the data is written and flushed.
    ///
    /// # Arguments
    /// * `runs` - Runs to be merged
    /// * `output` - Output the merged lines are written to
    pub fn merge<W>(
        &self,
        runs: &[RunFile],
        output: W,
    ) -> Result<W, SortError<C::SerializationError, C::DeserializationError>>
    where
        W: Write + Send + 'static,
    {
        log::debug!("merging {} runs ...", runs.len());

        let compare = self.compare;
        let mut cursors = OrderedList::from_vec(self.prime(runs)?, move |a: &Cursor<T>, b: &Cursor<T>| {
            compare(&a.item, &b.item).then(a.run.cmp(&b.run))
        });

        let mut buffer = OutputBuffer::new(self.batch_size, self.max_buffer_chars);
        let mut writer = PipelinedWriter::new(output, self.pool);
        let mut written: u64 = 0;

        while let Some(mut cursor) = cursors.pop() {
            let line = self.codec.serialize(&cursor.item).map_err(SortError::SerializationError)?;
            buffer.push(line);
            written += 1;

            if buffer.is_full() {
                log::trace!("writing output batch (lines: {}, size: {})", buffer.len(), buffer.chars());
                writer.submit(buffer.take()).map_err(SortError::IO)?;
            }

            match cursor.reader.next_record_line().map_err(SortError::IO)? {
                Some(line) => {
                    cursor.item = self.codec.parse(&line).map_err(SortError::DeserializationError)?;
                    cursors.insert(cursor);
                }
                None => {
                    log::trace!("run {} exhausted", cursor.run);
                    cursor.reader.close();
                }
            }
        }

        if !buffer.is_empty() {
            writer.submit(buffer.take()).map_err(SortError::IO)?;
        }
        let output = writer.finish().map_err(SortError::IO)?;

        log::debug!("merge done (records: {})", written);

        return Ok(output);
    }

    /// Opens the runs and reads their first records.
    /// The first line is taken as is even if it is blank. Empty runs are closed right away.
    fn prime(
        &self,
        runs: &[RunFile],
    ) -> Result<Vec<Cursor<T>>, SortError<C::SerializationError, C::DeserializationError>> {
        let mut cursors = Vec::with_capacity(runs.len());

        for (idx, run) in runs.iter().enumerate() {
            let mut reader = run.open(self.rw_buf_size).map_err(SortError::IO)?;

            match reader.next_line().map_err(SortError::IO)? {
                Some(line) => {
                    let item = self.codec.parse(&line).map_err(SortError::DeserializationError)?;
                    cursors.push(Cursor { run: idx, item, reader });
                }
                None => {
                    log::debug!("run {} is empty", run.path().display());
                    reader.close();
                }
            }
        }

        return Ok(cursors);
    }
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;
    use std::convert::Infallible;
    use std::fs;
    use std::io::{self, Write};

    use rand::seq::SliceRandom;
    use rand::Rng;
    use rstest::*;

    use super::RunMerger;
    use crate::codec::{FnCodec, FromStrCodec, LineCodec};
    use crate::run::{run_file_name, RunFile};
    use crate::sort::SortError;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[fixture]
    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap()
    }

    fn write_runs(dir: &tempfile::TempDir, runs: &[&str]) -> Vec<RunFile> {
        Vec::from_iter(runs.iter().enumerate().map(|(idx, content)| {
            let path = dir.path().join(run_file_name(idx as u64));
            fs::write(&path, content).unwrap();
            RunFile::from_path(path)
        }))
    }

    fn merge<C>(codec: &C, runs: &[RunFile], pool: &rayon::ThreadPool, batch_size: usize) -> String
    where
        C: LineCodec<i64>,
    {
        let merger = RunMerger::new(codec, |a: &i64, b: &i64| a.cmp(b), pool, batch_size, usize::MAX, None);
        let output = merger.merge(runs, Vec::new()).unwrap();

        String::from_utf8(output).unwrap()
    }

    #[rstest]
    #[case(vec![], "")]
    #[case(vec!["", ""], "")]
    #[case(vec!["3\n5\n", "1\n9\n"], "1\n3\n5\n9\n")]
    #[case(vec!["4\n5\n7\n", "1\n6\n", "3\n", ""], "1\n3\n4\n5\n6\n7\n")]
    #[case(vec!["1\n\n2\n  \n3\n", "2\n\n"], "1\n2\n2\n3\n")]
    #[case(vec!["7\n"], "7\n")]
    fn test_merger(
        tmp_dir: tempfile::TempDir,
        pool: rayon::ThreadPool,
        #[case] runs: Vec<&str>,
        #[case] expected: &str,
    ) {
        let runs = write_runs(&tmp_dir, &runs);
        let actual = merge(&FromStrCodec::<i64>::new(), &runs, &pool, 2);

        assert_eq!(actual, expected);
        for run in runs {
            assert_eq!(run.path().exists(), false);
        }
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(1000)]
    fn test_merge_partitions(tmp_dir: tempfile::TempDir, pool: rayon::ThreadPool, #[case] batch_size: usize) {
        let mut rng = rand::thread_rng();
        let mut records = Vec::from_iter((0..500).map(|_| rng.gen_range(-100..100)));
        records.shuffle(&mut rng);

        let runs_number = rng.gen_range(1..20);
        let mut partitions = vec![Vec::new(); runs_number];
        for record in records.iter() {
            partitions[rng.gen_range(0..runs_number)].push(*record);
        }

        let contents = Vec::from_iter(partitions.iter_mut().map(|partition| {
            partition.sort();
            partition.iter().map(|record| format!("{}\n", record)).collect::<String>()
        }));
        let runs = write_runs(&tmp_dir, &Vec::from_iter(contents.iter().map(String::as_str)));

        let actual = merge(&FromStrCodec::<i64>::new(), &runs, &pool, batch_size);

        records.sort();
        let expected: String = records.iter().map(|record| format!("{}\n", record)).collect();
        assert_eq!(actual, expected);
    }

    #[rstest]
    fn test_merge_stability(tmp_dir: tempfile::TempDir, pool: rayon::ThreadPool) {
        // records are "key:run", only the key is compared
        let codec = FnCodec::new(
            |line: &str| Ok::<_, Infallible>(line.to_string()),
            |item: &String| Ok::<_, Infallible>(item.clone()),
        );
        let runs = write_runs(&tmp_dir, &["1:a\n2:a\n2:a\n", "1:b\n2:b\n", "2:c\n"]);

        let merger = RunMerger::new(
            &codec,
            |a: &String, b: &String| -> Ordering { a[..1].cmp(&b[..1]) },
            &pool,
            10,
            usize::MAX,
            None,
        );
        let output = merger.merge(&runs, Vec::new()).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "1:a\n1:b\n2:a\n2:a\n2:b\n2:c\n");
    }

    /// Keeps every chunk passed to a single `write` call.
    #[derive(Debug, Default)]
    struct RecordingWriter {
        writes: Vec<String>,
    }

    impl Write for RecordingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push(String::from_utf8_lossy(buf).into_owned());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[rstest]
    #[case::chars_limit(vec!["10\n30\n", "20\n40\n"], usize::MAX, 3, vec!["10\n20\n", "30\n40\n"])]
    #[case::lines_limit(vec!["1\n4\n", "2\n5\n", "3\n"], 2, usize::MAX, vec!["1\n2\n3\n", "4\n5\n"])]
    #[case::no_limit(vec!["1\n4\n", "2\n5\n", "3\n"], usize::MAX, usize::MAX, vec!["1\n2\n3\n4\n5\n"])]
    fn test_merge_output_batches(
        tmp_dir: tempfile::TempDir,
        pool: rayon::ThreadPool,
        #[case] runs: Vec<&str>,
        #[case] batch_size: usize,
        #[case] max_chars: usize,
        #[case] expected: Vec<&str>,
    ) {
        let runs = write_runs(&tmp_dir, &runs);

        let codec = FromStrCodec::<i64>::new();
        let merger = RunMerger::new(&codec, |a: &i64, b: &i64| a.cmp(b), &pool, batch_size, max_chars, None);
        let output = merger.merge(&runs, RecordingWriter::default()).unwrap();

        assert_eq!(output.writes, expected);
    }

    #[rstest]
    fn test_priming_takes_blank_line(tmp_dir: tempfile::TempDir, pool: rayon::ThreadPool) {
        let runs = write_runs(&tmp_dir, &["\n1\n"]);

        let codec = FromStrCodec::<i64>::new();
        let merger = RunMerger::new(&codec, |a: &i64, b: &i64| a.cmp(b), &pool, 10, usize::MAX, None);

        let result = merger.merge(&runs, Vec::new());
        assert!(matches!(result, Err(SortError::DeserializationError(_))));
    }

    #[rstest]
    fn test_merge_errors(tmp_dir: tempfile::TempDir, pool: rayon::ThreadPool) {
        let codec = FromStrCodec::<i64>::new();
        let merger = RunMerger::new(&codec, |a: &i64, b: &i64| a.cmp(b), &pool, 10, usize::MAX, None);

        let runs = write_runs(&tmp_dir, &["1\nx\n", "2\n"]);
        let result = merger.merge(&runs, Vec::new());
        assert!(matches!(result, Err(SortError::DeserializationError(_))));

        let missing = vec![RunFile::from_path(tmp_dir.path().join("missing.txt"))];
        let result = merger.merge(&missing, Vec::new());
        assert!(matches!(result, Err(SortError::IO(_))));
    }
}
