//! Line codecs.
//!
//! A codec converts a single text line into a record and back. Serialized records must not contain
//! line breaks, since both the input and the run files are split into records by lines.

use std::convert::Infallible;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::marker::PhantomData;
use std::str::FromStr;

/// Line codec interface. Provides methods for parsing a record from a line and serializing it back.
pub trait LineCodec<T> {
    type SerializationError: Error;
    type DeserializationError: Error;

    /// Parses a record from a line. The line is passed without its terminator.
    fn parse(&self, line: &str) -> Result<T, Self::DeserializationError>;

    /// Serializes a record into a line without a terminator.
    fn serialize(&self, item: &T) -> Result<String, Self::SerializationError>;
}

/// Codec based on [`FromStr`] and [`Display`] implementations of the record type.
pub struct FromStrCodec<T> {
    item_type: PhantomData<T>,
}

impl<T> FromStrCodec<T> {
    pub fn new() -> Self {
        FromStrCodec { item_type: PhantomData }
    }
}

impl<T> Default for FromStrCodec<T> {
    fn default() -> Self {
        FromStrCodec::new()
    }
}

impl<T> LineCodec<T> for FromStrCodec<T>
where
    T: FromStr + Display,
    T::Err: Error,
{
    type SerializationError = Infallible;
    type DeserializationError = T::Err;

    fn parse(&self, line: &str) -> Result<T, Self::DeserializationError> {
        line.parse()
    }

    fn serialize(&self, item: &T) -> Result<String, Self::SerializationError> {
        Ok(item.to_string())
    }
}

/// Codec built from a pair of caller-supplied functions.
///
/// # Example
///
/// ```
/// use std::convert::Infallible;
///
/// use large_sort::codec::{FnCodec, LineCodec};
///
/// let codec = FnCodec::new(
///     |line: &str| line.trim().parse::<u32>(),
///     |item: &u32| Ok::<_, Infallible>(format!("{:08}", item)),
/// );
///
/// let value: u32 = codec.parse(" 42 ").unwrap();
/// assert_eq!(value, 42);
/// assert_eq!(codec.serialize(&42).unwrap(), "00000042");
/// ```
pub struct FnCodec<P, S> {
    parse: P,
    serialize: S,
}

impl<P, S> FnCodec<P, S> {
    pub fn new(parse: P, serialize: S) -> Self {
        FnCodec { parse, serialize }
    }
}

impl<T, P, S, D, E> LineCodec<T> for FnCodec<P, S>
where
    P: Fn(&str) -> Result<T, D>,
    S: Fn(&T) -> Result<String, E>,
    D: Error,
    E: Error,
{
    type SerializationError = E;
    type DeserializationError = D;

    fn parse(&self, line: &str) -> Result<T, D> {
        (self.parse)(line)
    }

    fn serialize(&self, item: &T) -> Result<String, E> {
        (self.serialize)(item)
    }
}

/// CSV codec error.
#[derive(Debug)]
pub enum CsvCodecError {
    /// CSV format error.
    Csv(csv::Error),
    /// Common I/O error.
    IO(io::Error),
    /// The line contains no record.
    EmptyRecord,
    /// The serialized record is not valid UTF-8 or spans multiple lines.
    InvalidLine(String),
}

impl Error for CsvCodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            CsvCodecError::Csv(err) => Some(err),
            CsvCodecError::IO(err) => Some(err),
            CsvCodecError::EmptyRecord | CsvCodecError::InvalidLine(_) => None,
        }
    }
}

impl Display for CsvCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            CsvCodecError::Csv(err) => write!(f, "csv format error: {}", err),
            CsvCodecError::IO(err) => write!(f, "I/O operation failed: {}", err),
            CsvCodecError::EmptyRecord => write!(f, "line contains no record"),
            CsvCodecError::InvalidLine(err) => write!(f, "invalid line: {}", err),
        }
    }
}

/// CSV codec. Each line holds one headerless CSV record that is mapped to the record type using `serde`.
pub struct CsvCodec<T> {
    delimiter: u8,

    item_type: PhantomData<T>,
}

impl<T> CsvCodec<T> {
    /// Creates a comma separated codec.
    pub fn new() -> Self {
        CsvCodec::with_delimiter(b',')
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        CsvCodec {
            delimiter,
            item_type: PhantomData,
        }
    }
}

impl<T> Default for CsvCodec<T> {
    fn default() -> Self {
        CsvCodec::new()
    }
}

impl<T> LineCodec<T> for CsvCodec<T>
where
    T: serde::ser::Serialize + serde::de::DeserializeOwned,
{
    type SerializationError = CsvCodecError;
    type DeserializationError = CsvCodecError;

    fn parse(&self, line: &str) -> Result<T, Self::DeserializationError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .from_reader(line.as_bytes());

        match reader.deserialize().next() {
            Some(result) => result.map_err(CsvCodecError::Csv),
            None => Err(CsvCodecError::EmptyRecord),
        }
    }

    fn serialize(&self, item: &T) -> Result<String, Self::SerializationError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.serialize(item).map_err(CsvCodecError::Csv)?;
        let buf = writer
            .into_inner()
            .map_err(|err| CsvCodecError::IO(err.into_error()))?;

        let mut line = String::from_utf8(buf).map_err(|err| CsvCodecError::InvalidLine(err.to_string()))?;
        if line.ends_with('\n') {
            line.pop();
        }
        if line.contains('\n') {
            return Err(CsvCodecError::InvalidLine("record spans multiple lines".to_string()));
        }

        return Ok(line);
    }
}
