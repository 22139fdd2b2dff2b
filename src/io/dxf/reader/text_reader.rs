//! DXF ASCII text reader

use super::stream_reader::{DxfCodePair, DxfStreamReader};
use crate::error::{ImportError, Location, Result};
use crate::io::source::ByteSource;

/// DXF ASCII reader over a line source, with one pair of pushback
pub struct DxfTextReader<'s> {
    source: &'s mut dyn ByteSource,
    line_number: usize,
    peeked_pair: Option<DxfCodePair>,
}

impl<'s> DxfTextReader<'s> {
    /// Create a new DXF text reader
    pub fn new(source: &'s mut dyn ByteSource) -> Self {
        Self {
            source,
            line_number: 0,
            peeked_pair: None,
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let line = self.source.read_line()?;
        if line.is_some() {
            self.line_number += 1;
        }
        Ok(line.map(|l| l.trim().to_string()))
    }

    /// Read a code/value pair from the stream
    fn read_pair_internal(&mut self) -> Result<Option<DxfCodePair>> {
        let code_line = loop {
            match self.read_line()? {
                // trailing blank lines after EOF are common
                Some(line) if line.is_empty() => continue,
                Some(line) => break line,
                None => return Ok(None),
            }
        };

        let code = code_line.parse::<i32>().map_err(|_| {
            ImportError::malformed(
                Location::Line(self.line_number),
                format!("invalid group code '{code_line}'"),
            )
        })?;

        let Some(value_line) = self.read_line()? else {
            return Err(ImportError::truncated(
                Location::Line(self.line_number),
                format!("no value after group code {code}"),
            ));
        };

        let value = process_string_value(&value_line);
        Ok(Some(DxfCodePair::new(code, value, self.line_number)))
    }
}

/// Expand the caret escapes DXF uses for control characters
fn process_string_value(value: &str) -> String {
    if !value.contains('^') {
        return value.to_string();
    }
    value
        .replace("^J", "\n")
        .replace("^M", "\r")
        .replace("^I", "\t")
        .replace("^ ", "^")
}

impl DxfStreamReader for DxfTextReader<'_> {
    fn read_pair(&mut self) -> Result<Option<DxfCodePair>> {
        if let Some(pair) = self.peeked_pair.take() {
            return Ok(Some(pair));
        }
        self.read_pair_internal()
    }

    fn push_back(&mut self, pair: DxfCodePair) {
        debug_assert!(self.peeked_pair.is_none(), "only one pair of pushback");
        self.peeked_pair = Some(pair);
    }

    fn location(&self) -> Location {
        Location::Line(self.line_number)
    }
}
