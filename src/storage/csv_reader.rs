// Delimited flat-file record reading

use std::io::BufRead;

use crate::error::{QueryError, Result};

/// Candidate delimiters in priority order.
const CANDIDATES: &[u8] = b",\t|";

/// Detect the most likely delimiter in a header line.
///
/// Counts occurrences of each candidate delimiter and returns the one with
/// the highest frequency. If no candidate appears, defaults to comma.
pub fn detect_delimiter(line: &str) -> u8 {
    let mut best = b',';
    let mut best_count = 0usize;

    for &delim in CANDIDATES {
        let count = line.bytes().filter(|&b| b == delim).count();
        if count > best_count {
            best_count = count;
            best = delim;
        }
    }

    best
}

/// Streaming reader of delimited records.
///
/// Supports double-quoted fields containing delimiters, doubled quotes and
/// line breaks. Blank lines between records are skipped. Holds one record in
/// memory at a time.
pub struct DelimitedReader<R> {
    inner: R,
    delimiter: Option<u8>,
    line_number: u64,
    record_line: u64,
    buf: String,
}

/// Parser state carried across physical lines of one record
#[derive(Default)]
struct RecordState {
    fields: Vec<String>,
    field: String,
    in_quotes: bool,
    at_field_start: bool,
}

impl<R: BufRead> DelimitedReader<R> {
    /// Create a reader. `None` detects the delimiter from the first line.
    pub fn new(inner: R, delimiter: Option<u8>) -> Self {
        Self {
            inner,
            delimiter,
            line_number: 0,
            record_line: 0,
            buf: String::new(),
        }
    }

    /// The delimiter in use, once known
    pub fn delimiter(&self) -> Option<u8> {
        self.delimiter
    }

    /// 1-based line number on which the most recently returned record started
    pub fn record_line(&self) -> u64 {
        self.record_line
    }

    /// Read the next record.
    ///
    /// # Returns
    /// `Ok(None)` at end of input
    ///
    /// # Errors
    /// IO errors from the underlying source, or a parse error for a quoted
    /// field left open at end of input
    pub fn read_record(&mut self) -> Result<Option<Vec<String>>> {
        // skip blank lines between records
        loop {
            if !self.next_line()? {
                return Ok(None);
            }
            if !self.buf.is_empty() {
                break;
            }
        }
        self.record_line = self.line_number;

        let delimiter = match self.delimiter {
            Some(d) => d,
            None => {
                let detected = detect_delimiter(&self.buf);
                self.delimiter = Some(detected);
                detected
            }
        };

        let mut state = RecordState {
            at_field_start: true,
            ..RecordState::default()
        };
        loop {
            parse_line(&self.buf, delimiter as char, &mut state);
            if !state.in_quotes {
                break;
            }
            state.field.push('\n');
            if !self.next_line()? {
                return Err(QueryError::Parse(format!(
                    "unterminated quoted field starting on line {}",
                    self.record_line
                )));
            }
        }

        let mut fields = state.fields;
        fields.push(state.field);
        Ok(Some(fields))
    }

    /// Load the next physical line into `buf` without its terminator.
    fn next_line(&mut self) -> Result<bool> {
        self.buf.clear();
        let read = self.inner.read_line(&mut self.buf)?;
        if read == 0 {
            return Ok(false);
        }
        self.line_number += 1;
        if self.buf.ends_with('\n') {
            self.buf.pop();
            if self.buf.ends_with('\r') {
                self.buf.pop();
            }
        }
        Ok(true)
    }
}

fn parse_line(line: &str, delimiter: char, state: &mut RecordState) {
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if state.in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    state.field.push('"');
                } else {
                    state.in_quotes = false;
                }
            } else {
                state.field.push(c);
            }
            continue;
        }

        if c == '"' && state.at_field_start {
            state.in_quotes = true;
        } else if c == delimiter {
            state.fields.push(std::mem::take(&mut state.field));
            state.at_field_start = true;
            continue;
        } else {
            state.field.push(c);
        }
        state.at_field_start = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(input: &str, delimiter: Option<u8>) -> Result<Vec<Vec<String>>> {
        let mut reader = DelimitedReader::new(Cursor::new(input.to_string()), delimiter);
        let mut records = Vec::new();
        while let Some(record) = reader.read_record()? {
            records.push(record);
        }
        Ok(records)
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c"), b',');
        assert_eq!(detect_delimiter("a\tb\tc"), b'\t');
        assert_eq!(detect_delimiter("a|b|c"), b'|');
        assert_eq!(detect_delimiter("single"), b',');
    }

    #[test]
    fn test_plain_records() {
        let records = read_all("id,name\n1,alice\r\n2,bob\n", Some(b',')).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], vec!["id", "name"]);
        assert_eq!(records[2], vec!["2", "bob"]);
    }

    #[test]
    fn test_quoted_fields() {
        let input = "a,b\n\"x, y\",\"say \"\"hi\"\"\"\n\"multi\nline\",z\n";
        let records = read_all(input, None).unwrap();
        assert_eq!(records[1], vec!["x, y", "say \"hi\""]);
        assert_eq!(records[2], vec!["multi\nline", "z"]);
    }

    #[test]
    fn test_blank_lines_and_empty_fields() {
        let records = read_all("a,b\n\n1,\n,2\n\n", Some(b',')).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], vec!["1", ""]);
        assert_eq!(records[2], vec!["", "2"]);
    }

    #[test]
    fn test_detected_delimiter_is_kept() {
        let mut reader = DelimitedReader::new(Cursor::new("a|b\n1|2,3\n"), None);
        reader.read_record().unwrap();
        assert_eq!(reader.delimiter(), Some(b'|'));
        assert_eq!(reader.read_record().unwrap().unwrap(), vec!["1", "2,3"]);
        assert_eq!(reader.record_line(), 2);
    }

    #[test]
    fn test_unterminated_quote() {
        let result = read_all("a,b\n\"open,1\n", Some(b','));
        assert!(matches!(result, Err(QueryError::Parse(_))));
    }
}
