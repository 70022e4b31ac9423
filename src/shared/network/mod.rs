use std::fmt;

pub mod content_disposition;
pub mod http;

/// Last byte a ranged request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    /// Inclusive end offset.
    Inclusive(u64),
    /// Read until the server closes the stream.
    Open,
}

/// Byte range sent as an HTTP `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: RangeEnd,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end: RangeEnd::Inclusive(end) }
    }

    pub fn open(start: u64) -> Self {
        Self { start, end: RangeEnd::Open }
    }

    /// Number of bytes covered, `None` for open ranges.
    pub fn len(&self) -> Option<u64> {
        match self.end {
            RangeEnd::Inclusive(end) if end >= self.start => Some(end - self.start + 1),
            RangeEnd::Inclusive(_) => Some(0),
            RangeEnd::Open => None,
        }
    }

    /// Value of the `Range` header: `bytes=<start>-<end>` or `bytes=<start>-`.
    pub fn header_value(&self) -> String {
        match self.end {
            RangeEnd::Inclusive(end) if end >= self.start => format!("bytes={}-{end}", self.start),
            _ => format!("bytes={}-", self.start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            RangeEnd::Inclusive(end) => write!(f, "[{}-{end}]", self.start),
            RangeEnd::Open => write!(f, "[{}-)", self.start),
        }
    }
}

/// Tells the retrying transport whether a failure happened below HTTP.
///
/// Transport failures (refused connections, DNS, TLS handshakes, timeouts)
/// are worth another attempt; anything that produced an HTTP response is not.
pub trait TransportFailure {
    fn is_transport(&self) -> bool;
}

impl TransportFailure for reqwest::Error {
    fn is_transport(&self) -> bool {
        self.is_connect() || self.is_timeout() || (self.is_request() && !self.is_builder())
    }
}

impl TransportFailure for reqwest_middleware::Error {
    fn is_transport(&self) -> bool {
        match self {
            reqwest_middleware::Error::Reqwest(err) => err.is_transport(),
            reqwest_middleware::Error::Middleware(_) => false,
        }
    }
}
