//! Positions, intervals and locations used to address text.

use std::fmt;

use crate::error::{Error, Result};

/// A zero-based (line, column) pair. Columns count bytes within the line.
///
/// Ordered lexicographically by line, then column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A closed interval of positions. `start == end` is a valid single-point interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    start: Position,
    end: Position,
}

impl Interval {
    /// Create an interval, failing if `start > end`.
    pub fn new(start: Position, end: Position) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidInterval {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Interval covering a single position.
    pub const fn point(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    /// Interval from raw coordinates.
    pub fn from_coords(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Result<Self> {
        Self::new(
            Position::new(start_line, start_col),
            Position::new(end_line, end_col),
        )
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    /// Whether `position` lies within the interval (both ends included).
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }

    /// Whether this interval's bounds are no narrower than `other`'s.
    ///
    /// With `strict`, the containment must be proper: equal intervals do not
    /// strictly subsume each other.
    pub fn subsumes(&self, other: &Interval, strict: bool) -> bool {
        let covers = self.start <= other.start && other.end <= self.end;
        if strict {
            covers && self != other
        } else {
            covers
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// An interval within a named source (a document id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    source_id: String,
    interval: Interval,
}

impl Location {
    pub fn new(source_id: impl Into<String>, interval: Interval) -> Self {
        Self {
            source_id: source_id.into(),
            interval,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Whether `position` in `source_id` falls inside this location.
    pub fn contains(&self, source_id: &str, position: Position) -> bool {
        self.source_id == source_id && self.interval.contains(position)
    }

    /// Same source and interval subsumption.
    pub fn subsumes(&self, other: &Location, strict: bool) -> bool {
        self.source_id == other.source_id && self.interval.subsumes(&other.interval, strict)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.source_id, self.interval)
    }
}
