//! Merge output buffer.

/// Default number of lines accumulated before the output buffer is written.
pub const DEFAULT_OUTPUT_BATCH_SIZE: usize = 100_000;
/// Maximum string length that is considered safe to build in one piece.
pub const SAFE_MAX_STRING_LEN: usize = 8_738_133;
/// Default output buffer size limit, 90% of [`SAFE_MAX_STRING_LEN`].
pub const DEFAULT_OUTPUT_BUFFER_CHARS: usize = SAFE_MAX_STRING_LEN / 10 * 9;

/// Buffer of serialized output lines limited by both the lines count and the total lines length.
pub struct OutputBuffer {
    max_lines: usize,
    max_chars: usize,
    chars: usize,
    lines: Vec<String>,
}

impl OutputBuffer {
    /// Creates a new buffer.
    ///
    /// # Arguments
    /// * `max_lines` - The buffer is full when it holds more lines than that
    /// * `max_chars` - The buffer is full when the total length of its lines (in bytes) is more than that
    pub fn new(max_lines: usize, max_chars: usize) -> Self {
        OutputBuffer {
            max_lines,
            max_chars,
            chars: 0,
            lines: Vec::new(),
        }
    }

    /// Adds a new line to the buffer.
    pub fn push(&mut self, line: String) {
        self.chars += line.len();
        self.lines.push(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the total length of buffered lines.
    pub fn chars(&self) -> usize {
        self.chars
    }

    /// Checks if the buffer exceeded one of its limits.
    pub fn is_full(&self) -> bool {
        self.lines.len() > self.max_lines || self.chars > self.max_chars
    }

    /// Takes the buffered lines out joined into a single string, each line followed by a line feed.
    /// The buffer is left empty.
    pub fn take(&mut self) -> String {
        let mut data = String::with_capacity(self.chars + self.lines.len());
        for line in self.lines.drain(..) {
            data.push_str(&line);
            data.push('\n');
        }
        self.chars = 0;

        return data;
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        OutputBuffer::new(DEFAULT_OUTPUT_BATCH_SIZE, DEFAULT_OUTPUT_BUFFER_CHARS)
    }
}
