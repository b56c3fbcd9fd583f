use crate::decoder::TextDecoder;
use crate::parser::{DecodeOptions, Parser};
use chhttp_core::{CodecError, CodecResult, Column, DataRow, DataValue, ScanType};
use std::io::{self, Read};
use tracing::{debug, trace};

pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReaderOptions {
    /// Fixed size of the row buffer. A single field must fit in it.
    pub buffer_size: usize,
    pub decode: DecodeOptions,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            decode: DecodeOptions::default(),
        }
    }
}

/// Pulls typed rows out of a `TabSeparatedWithNamesAndTypes` body.
///
/// The buffer is allocated once and never grows; a field that does not fit
/// fails with [`CodecError::BufferCapacity`]. Blocking behaviour is entirely
/// that of the underlying source.
#[derive(Debug)]
pub struct RowReader<R> {
    source: Option<R>,
    buf: Box<[u8]>,
    /// First unconsumed byte.
    start: usize,
    /// End of valid data.
    end: usize,
    columns: Vec<Column>,
    parsers: Vec<Parser>,
    done: bool,
}

impl<R: Read> RowReader<R> {
    /// Reads the column-name and column-type header lines and builds a
    /// parser per column. Unsupported types and unknown time zones are
    /// reported here, before any row is read.
    pub fn open(mut source: R, options: ReaderOptions) -> CodecResult<Self> {
        if options.buffer_size == 0 {
            return Err(CodecError::decode("row buffer size must be positive"));
        }
        let (names, terminated) = read_line(&mut source)?;
        if !terminated {
            return Err(CodecError::decode("unexpected end of stream in column names"));
        }
        let (types, _) = read_line(&mut source)?;
        let names = split_header(&names);
        let types = split_header(&types);
        if names.len() != types.len() {
            return Err(CodecError::decode(format!(
                "malformed header: {} column names but {} column types",
                names.len(),
                types.len()
            )));
        }
        let columns: Vec<Column> = names
            .into_iter()
            .zip(types)
            .map(|(name, type_name)| Column { name, type_name })
            .collect();
        let decoder = TextDecoder::new(options.decode);
        let parsers = columns
            .iter()
            .map(|column| decoder.parser(&column.type_name))
            .collect::<CodecResult<Vec<_>>>()?;
        debug!(
            columns = columns.len(),
            buffer_size = options.buffer_size,
            "row stream header parsed"
        );
        Ok(Self {
            source: Some(source),
            buf: vec![0u8; options.buffer_size].into_boxed_slice(),
            start: 0,
            end: 0,
            columns,
            parsers,
            done: false,
        })
    }

    /// Decodes the next row into `dest`, returning `false` once the stream is
    /// exhausted. On error `dest` may hold some decoded fields of the failed
    /// row; none of them should be used.
    pub fn next_row(&mut self, dest: &mut [DataValue]) -> CodecResult<bool> {
        if dest.len() != self.columns.len() {
            return Err(CodecError::decode(format!(
                "destination has {} slots for {} columns",
                dest.len(),
                self.columns.len()
            )));
        }
        let mut field = 0usize;
        let mut pos = self.start;
        loop {
            let decoded_before = field;
            while pos < self.end {
                match self.buf[pos] {
                    b'\t' => {
                        self.emit(field, pos, dest)?;
                        field += 1;
                    }
                    // A blank line precedes the totals row of WITH TOTALS queries.
                    b'\n' if field == 0 && pos == self.start => self.start = pos + 1,
                    b'\n' => {
                        self.emit(field, pos, dest)?;
                        return self.finish_row(field + 1);
                    }
                    _ => {}
                }
                pos += 1;
            }

            if field == decoded_before && self.end - self.start == self.buf.len() {
                return Err(CodecError::BufferCapacity {
                    capacity: self.buf.len(),
                });
            }

            let shift = self.compact();
            pos -= shift;
            if self.fill()? == 0 {
                if field == 0 && self.start == self.end {
                    return Ok(false);
                }
                // The stream ended without a final newline.
                let end = self.end;
                self.emit(field, end, dest)?;
                return self.finish_row(field + 1);
            }
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_type_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.type_name.as_str())
    }

    pub fn column_scan_type(&self, index: usize) -> Option<ScanType> {
        self.parsers.get(index).map(Parser::scan_type)
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buf.len()
    }

    /// Releases the source. Safe to call more than once; later reads report
    /// exhaustion.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!("row source closed");
        }
        self.start = 0;
        self.end = 0;
    }

    /// Decodes `buf[start..until]` as column `field` and moves past the
    /// delimiter at `until`, if any.
    fn emit(&mut self, field: usize, until: usize, dest: &mut [DataValue]) -> CodecResult<()> {
        let parser = self.parsers.get(field).ok_or_else(|| {
            CodecError::decode(format!(
                "row has more fields than the {} declared columns",
                self.columns.len()
            ))
        })?;
        dest[field] = parser.decode(&self.buf[self.start..until])?;
        self.start = (until + 1).min(self.end);
        Ok(())
    }

    fn finish_row(&self, fields: usize) -> CodecResult<bool> {
        if fields != self.columns.len() {
            return Err(CodecError::decode(format!(
                "row has {fields} fields, expected {}",
                self.columns.len()
            )));
        }
        Ok(true)
    }

    /// Moves the unconsumed tail to the front of the buffer and returns how
    /// far it moved.
    fn compact(&mut self) -> usize {
        let shift = self.start;
        if shift > 0 {
            trace!(pending = self.end - self.start, "compacting row buffer");
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= shift;
            self.start = 0;
        }
        shift
    }

    fn fill(&mut self) -> CodecResult<usize> {
        let Some(source) = self.source.as_mut() else {
            return Ok(0);
        };
        loop {
            match source.read(&mut self.buf[self.end..]) {
                Ok(n) => {
                    trace!(read = n, buffered = self.end + n, "filled row buffer");
                    self.end += n;
                    return Ok(n);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = CodecResult<DataRow>;

    /// Yields rows until exhaustion or the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut values = vec![DataValue::Null; self.columns.len()];
        match self.next_row(&mut values) {
            Ok(true) => Some(Ok(DataRow { values })),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Reads one header line a byte at a time so that nothing past it is
/// consumed from the source. Returns the line and whether a newline ended it.
fn read_line<R: Read>(source: &mut R) -> CodecResult<(Vec<u8>, bool)> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match source.read(&mut byte) {
            Ok(0) => return Ok((line, false)),
            Ok(_) if byte[0] == b'\n' => return Ok((line, true)),
            Ok(_) => line.push(byte[0]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
}

fn split_header(line: &[u8]) -> Vec<String> {
    line.split(|b| *b == b'\t')
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect()
}
