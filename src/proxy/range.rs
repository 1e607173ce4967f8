use crate::error::{Error, Result};

/// An inclusive byte span; `end == None` runs to the end of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: u64,
    pub end: Option<u64>,
}

/// A client `Range` header as written, before the resource size is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeHeader {
    Span(RangeRequest),
    /// `bytes=-N`: the last N bytes.
    Suffix(u64),
}

impl RangeRequest {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Clamps the end to a known size; a start past the end is unsatisfiable.
    pub fn fit_to(self, size: u64) -> Result<Self> {
        if self.start >= size {
            return Err(Error::RangeNotSatisfiable { size });
        }
        let last = size - 1;
        Ok(Self {
            start: self.start,
            end: Some(self.end.map_or(last, |end| end.min(last))),
        })
    }

    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end - self.start + 1)
    }

    /// Value for an upstream `Range` header.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

impl RangeHeader {
    /// Turns the header into a concrete span. Suffix ranges need the size;
    /// without one the header is dropped and the full resource is served.
    pub fn to_request(self, size: Option<u64>) -> Result<Option<RangeRequest>> {
        match self {
            Self::Span(range) => match size {
                Some(size) => range.fit_to(size).map(Some),
                None => Ok(Some(range)),
            },
            Self::Suffix(len) => match size {
                Some(0) => Err(Error::RangeNotSatisfiable { size: 0 }),
                Some(size) => Ok(Some(RangeRequest::new(
                    size.saturating_sub(len),
                    Some(size - 1),
                ))),
                None => Ok(None),
            },
        }
    }
}

/// Parses a single-range `Range` header. Malformed values and multi-range
/// requests yield `None`, which callers treat as "no range".
pub fn parse_range_header(value: &str) -> Option<RangeHeader> {
    let (unit, ranges) = value.trim().split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case("bytes") || ranges.contains(',') {
        return None;
    }
    let (start, end) = ranges.trim().split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        let len: u64 = end.parse().ok()?;
        return (len > 0).then_some(RangeHeader::Suffix(len));
    }

    let start: u64 = start.parse().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        let end: u64 = end.parse().ok()?;
        if end < start {
            return None;
        }
        Some(end)
    };
    Some(RangeHeader::Span(RangeRequest::new(start, end)))
}

/// A parsed upstream `Content-Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: Option<u64>,
}

impl ContentRange {
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix("bytes")?.trim_start();
        let (span, total) = rest.split_once('/')?;
        let (start, end) = span.split_once('-')?;
        let start: u64 = start.trim().parse().ok()?;
        let end: u64 = end.trim().parse().ok()?;
        if end < start {
            return None;
        }
        let total = match total.trim() {
            "*" => None,
            t => Some(t.parse().ok()?),
        };
        Some(Self { start, end, total })
    }
}
