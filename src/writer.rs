//! Pipelined output writer.

use std::io;
use std::io::prelude::*;
use std::sync::mpsc;

/// Writer that performs writes in the background keeping at most one write in flight.
///
/// A submitted block is written by the thread pool while the caller prepares the next one.
/// Submitting the next block waits for the previous write to complete first.
pub struct PipelinedWriter<'p, W> {
    pool: &'p rayon::ThreadPool,
    writer: Option<W>,
    pending: Option<mpsc::Receiver<io::Result<W>>>,
}

impl<'p, W> PipelinedWriter<'p, W>
where
    W: Write + Send + 'static,
{
    /// Creates a new pipelined writer.
    ///
    /// # Arguments
    /// * `writer` - Underlying writer
    /// * `pool` - Thread pool the writes are performed on
    pub fn new(writer: W, pool: &'p rayon::ThreadPool) -> Self {
        PipelinedWriter {
            pool,
            writer: Some(writer),
            pending: None,
        }
    }

    /// Checks if a write is in flight.
    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Waits for the pending write to complete and then issues a write of `data`.
    pub fn submit(&mut self, data: String) -> io::Result<()> {
        let mut writer = self.wait()?;
        let (tx, rx) = mpsc::sync_channel(1);

        self.pool.spawn(move || {
            let result = writer.write_all(data.as_bytes()).map(|_| writer);
            // receiver is gone only if the merge has already failed
            let _ = tx.send(result);
        });
        self.pending = Some(rx);

        return Ok(());
    }

    /// Waits for the pending write to complete, flushes and returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        let mut writer = self.wait()?;
        writer.flush()?;

        return Ok(writer);
    }

    fn wait(&mut self) -> io::Result<W> {
        if let Some(pending) = self.pending.take() {
            log::trace!("waiting for the pending write");
            return pending
                .recv()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "writer task terminated unexpectedly"))?;
        }

        self.writer
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer is not available after a failed write"))
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, ErrorKind, Write};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    use rstest::*;

    use super::PipelinedWriter;

    #[fixture]
    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap()
    }

    #[derive(Debug)]
    struct FailingWriter {
        written: usize,
        capacity: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written + buf.len() > self.capacity {
                return Err(io::Error::new(ErrorKind::Other, "no space left"));
            }
            self.written += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[rstest]
    fn test_pipelined_writer(pool: rayon::ThreadPool) {
        let mut writer = PipelinedWriter::new(Vec::new(), &pool);
        assert_eq!(writer.is_pending(), false);

        writer.submit("1\n3\n".to_string()).unwrap();
        assert_eq!(writer.is_pending(), true);
        writer.submit("5\n".to_string()).unwrap();
        writer.submit("9\n".to_string()).unwrap();

        let output = writer.finish().unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "1\n3\n5\n9\n");
    }

    #[rstest]
    fn test_pipelined_writer_error(pool: rayon::ThreadPool) {
        let mut writer = PipelinedWriter::new(
            FailingWriter {
                written: 0,
                capacity: 4,
            },
            &pool,
        );

        writer.submit("abc".to_string()).unwrap();
        writer.submit("def".to_string()).unwrap();

        let err = writer.finish().unwrap_err();
        assert_eq!(err.to_string(), "no space left");
    }

    struct GatedWriter {
        gate: mpsc::Receiver<()>,
        completed: Arc<AtomicUsize>,
    }

    impl Write for GatedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.gate
                .recv()
                .map_err(|_| io::Error::new(ErrorKind::Other, "gate closed"))?;
            self.completed.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[rstest]
    fn test_submit_waits_for_pending_write(pool: rayon::ThreadPool) {
        let (gate_tx, gate_rx) = mpsc::channel();
        let completed = Arc::new(AtomicUsize::new(0));
        let mut writer = PipelinedWriter::new(
            GatedWriter {
                gate: gate_rx,
                completed: completed.clone(),
            },
            &pool,
        );

        writer.submit("a".to_string()).unwrap();
        assert_eq!(writer.is_pending(), true);
        assert_eq!(completed.load(AtomicOrdering::SeqCst), 0);

        let opener = {
            let gate_tx = gate_tx.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                gate_tx.send(()).unwrap();
            })
        };

        // returns only after the first write has been let through
        writer.submit("b".to_string()).unwrap();
        assert_eq!(completed.load(AtomicOrdering::SeqCst), 1);
        opener.join().unwrap();

        gate_tx.send(()).unwrap();
        writer.finish().unwrap();
        assert_eq!(completed.load(AtomicOrdering::SeqCst), 2);
    }
}
