//! Line-indexed text.
//!
//! Provides byte offset <-> line/column conversion in O(log n), line and
//! interval slicing, and conversion to the UTF-16 positions LSP clients use.

use tower_lsp::lsp_types;

use crate::error::{Error, Result};

use super::location::{Interval, Position};

/// Pre-computed line index over an immutable text.
///
/// Recognizes `\n`, `\r\n` and a bare `\r` as one line break each. An empty
/// text has exactly one (empty) line; a text ending in a line break has an
/// additional empty final line.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset where each line starts. Strictly increasing, first entry 0.
    line_starts: Vec<usize>,
    source: String,
}

impl LineIndex {
    /// Build a line index from source text.
    pub fn new(source: String) -> Self {
        let bytes = source.as_bytes();
        let mut line_starts = vec![0];

        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                    line_starts.push(i + 2);
                    i += 2;
                }
                b'\r' | b'\n' => {
                    line_starts.push(i + 1);
                    i += 1;
                }
                _ => i += 1,
            }
        }

        Self {
            line_starts,
            source,
        }
    }

    /// Get the source text.
    pub fn text(&self) -> &str {
        &self.source
    }

    /// Length of the source text in bytes.
    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Whether the text ends in a line break, leaving an empty final line.
    pub fn has_trailing_line_break(&self) -> bool {
        self.source.ends_with('\n') || self.source.ends_with('\r')
    }

    /// Byte offset of the first character of `line`.
    pub fn line_start(&self, line: u32) -> Result<usize> {
        self.check_line("line", line)?;
        Ok(self.line_starts[line as usize])
    }

    /// Exclusive end of `line`: the next line's start, or the text length
    /// for the last line. Includes the line break.
    pub fn line_end(&self, line: u32) -> Result<usize> {
        self.check_line("line", line)?;
        Ok(self.raw_line_end(line as usize))
    }

    /// Length of `line` in bytes, including its line break.
    pub fn line_length(&self, line: u32) -> Result<usize> {
        Ok(self.line_end(line)? - self.line_start(line)?)
    }

    /// Text of `line`, including its line break.
    pub fn line(&self, line: u32) -> Result<&str> {
        self.lines(line, line)
    }

    /// Text of `line` without its line break.
    pub fn line_content(&self, line: u32) -> Result<&str> {
        let text = self.line(line)?;
        Ok(text.trim_end_matches(['\n', '\r']))
    }

    /// Text spanning `start_line` through `end_line`, both inclusive.
    pub fn lines(&self, start_line: u32, end_line: u32) -> Result<&str> {
        self.check_line("start_line", start_line)?;
        self.check_line("end_line", end_line)?;
        if start_line > end_line {
            return Err(Error::bounds(
                "start_line",
                start_line as usize,
                format!("0..={}", end_line),
            ));
        }
        let start = self.line_starts[start_line as usize];
        let end = self.raw_line_end(end_line as usize);
        Ok(&self.source[start..end])
    }

    /// Byte offset of `column` on `line`. The column may equal the line length.
    pub fn offset_of(&self, line: u32, column: u32) -> Result<usize> {
        let length = self.line_length(line)?;
        if column as usize > length {
            return Err(Error::bounds(
                "column",
                column as usize,
                format!("0..={}", length),
            ));
        }
        Ok(self.line_starts[line as usize] + column as usize)
    }

    /// Byte offset of a position.
    pub fn offset_of_position(&self, position: Position) -> Result<usize> {
        self.offset_of(position.line, position.column)
    }

    /// Line containing `offset`.
    ///
    /// Uses binary search over the line starts.
    pub fn line_of(&self, offset: usize) -> Result<u32> {
        if offset > self.source.len() {
            return Err(Error::bounds(
                "offset",
                offset,
                format!("0..={}", self.source.len()),
            ));
        }
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,                    // Exact match (start of line)
            Err(line) => line.saturating_sub(1), // In the middle of a line
        };
        Ok(line as u32)
    }

    /// Position (line, byte column) of `offset`.
    pub fn position_of(&self, offset: usize) -> Result<Position> {
        let line = self.line_of(offset)?;
        let column = offset - self.line_starts[line as usize];
        Ok(Position::new(line, column as u32))
    }

    /// Text covered by a closed interval: the character at `end` is included.
    pub fn interval_text(&self, interval: &Interval) -> Result<&str> {
        let start = self.offset_of_position(interval.start())?;
        let end = self.exclusive_end(interval)?;
        self.check_char_boundary("interval start", start)?;
        self.check_char_boundary("interval end", end)?;
        Ok(&self.source[start..end])
    }

    /// Fails when `offset` falls inside a multi-byte character, naming the
    /// boundaries on either side.
    fn check_char_boundary(&self, argument: &'static str, offset: usize) -> Result<()> {
        if self.source.is_char_boundary(offset) {
            return Ok(());
        }
        let before = (0..offset)
            .rev()
            .find(|&i| self.source.is_char_boundary(i))
            .unwrap_or(0);
        let after = (offset..=self.source.len())
            .find(|&i| self.source.is_char_boundary(i))
            .unwrap_or(self.source.len());
        Err(Error::bounds(argument, offset, format!("{} or {}", before, after)))
    }

    /// Convert a byte offset to an LSP position with a UTF-16 column.
    pub fn to_lsp_position(&self, offset: usize) -> Result<lsp_types::Position> {
        let line = self.line_of(offset)? as usize;
        let line_start = self.line_starts[line];
        let line_slice = &self.source[line_start..self.raw_line_end(line)];

        let mut col = 0u32;
        for (i, c) in line_slice.char_indices() {
            if line_start + i >= offset {
                break;
            }
            col += c.len_utf16() as u32;
        }

        Ok(lsp_types::Position::new(line as u32, col))
    }

    /// Convert an LSP position to a byte offset.
    ///
    /// Columns past the end of the line clamp to the line's content end.
    /// Returns None if the line is out of bounds.
    pub fn from_lsp_position(&self, position: lsp_types::Position) -> Option<usize> {
        let line = position.line;
        let content = self.line_content(line).ok()?;
        let line_start = self.line_starts[line as usize];

        // Walk UTF-16 code units to find byte offset
        let mut utf16_col = 0u32;
        for (i, c) in content.char_indices() {
            if utf16_col >= position.character {
                return Some(line_start + i);
            }
            utf16_col += c.len_utf16() as u32;
        }

        Some(line_start + content.len())
    }

    /// Convert a byte position to an LSP position.
    pub fn position_to_lsp(&self, position: Position) -> Result<lsp_types::Position> {
        self.to_lsp_position(self.offset_of_position(position)?)
    }

    /// Convert a closed interval to a half-open LSP range.
    pub fn interval_to_range(&self, interval: &Interval) -> Result<lsp_types::Range> {
        let start = self.position_to_lsp(interval.start())?;
        let end = self.to_lsp_position(self.exclusive_end(interval)?)?;
        Ok(lsp_types::Range::new(start, end))
    }

    fn exclusive_end(&self, interval: &Interval) -> Result<usize> {
        let end = self.offset_of_position(interval.end())?;
        let width = self
            .source
            .get(end..)
            .and_then(|rest| rest.chars().next())
            .map(char::len_utf8)
            .unwrap_or(0);
        Ok(end + width)
    }

    fn raw_line_end(&self, line: usize) -> usize {
        self.line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.source.len())
    }

    fn check_line(&self, argument: &'static str, line: u32) -> Result<()> {
        if (line as usize) < self.line_starts.len() {
            Ok(())
        } else {
            Err(Error::bounds(
                argument,
                line as usize,
                format!("0..={}", self.line_starts.len() - 1),
            ))
        }
    }
}
