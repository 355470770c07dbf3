//! Streamed reply framing.
//!
//! The producer side writes structural JSON tokens (`[`, items separated by
//! `,`, `]`; or `{"key":value,...}`) straight into one gzip stream, flushing
//! after every token group so each HTTP chunk is independently inflatable.
//! The consumer side inflates whatever has arrived and splits top-level array
//! elements as soon as their closing byte is seen.

use std::io::{self, Write};
use std::mem;

use bytes::Bytes;
use flate2::{write::GzDecoder, write::GzEncoder, Compression};
use serde::de::Error as _;
use serde_json::Value;

use super::SerializationError;

enum Phase {
    Open,
    Items,
    Closed,
}

enum Tokens {
    Empty,
    Scalar(Option<Value>),
    Array {
        items: std::vec::IntoIter<Value>,
        phase: Phase,
        first: bool,
    },
    Object {
        entries: serde_json::map::IntoIter,
        phase: Phase,
        first: bool,
    },
}

/// Lazily turns a payload into gzip chunks, one token group per chunk.
///
/// A `null` payload produces an empty gzip member (no JSON bytes at all).
pub struct StreamEncoder {
    encoder: Option<GzEncoder<Vec<u8>>>,
    tokens: Tokens,
}

impl StreamEncoder {
    pub fn new(payload: Value) -> Self {
        let tokens = match payload {
            Value::Null => Tokens::Empty,
            Value::Array(items) => Tokens::Array {
                items: items.into_iter(),
                phase: Phase::Open,
                first: true,
            },
            Value::Object(map) => Tokens::Object {
                entries: map.into_iter(),
                phase: Phase::Open,
                first: true,
            },
            scalar => Tokens::Scalar(Some(scalar)),
        };
        Self {
            encoder: Some(GzEncoder::new(Vec::new(), Compression::default())),
            tokens,
        }
    }

    fn next_group(&mut self) -> Result<Option<Vec<u8>>, serde_json::Error> {
        match &mut self.tokens {
            Tokens::Empty => Ok(None),
            Tokens::Scalar(value) => match value.take() {
                Some(v) => serde_json::to_vec(&v).map(Some),
                None => Ok(None),
            },
            Tokens::Array { items, phase, first } => match phase {
                Phase::Open => {
                    *phase = Phase::Items;
                    Ok(Some(b"[".to_vec()))
                }
                Phase::Items => match items.next() {
                    Some(item) => {
                        let mut group = separator(first);
                        serde_json::to_writer(&mut group, &item)?;
                        Ok(Some(group))
                    }
                    None => {
                        *phase = Phase::Closed;
                        Ok(Some(b"]".to_vec()))
                    }
                },
                Phase::Closed => Ok(None),
            },
            Tokens::Object { entries, phase, first } => match phase {
                Phase::Open => {
                    *phase = Phase::Items;
                    Ok(Some(b"{".to_vec()))
                }
                Phase::Items => match entries.next() {
                    Some((key, value)) => {
                        let mut group = separator(first);
                        serde_json::to_writer(&mut group, &key)?;
                        group.push(b':');
                        serde_json::to_writer(&mut group, &value)?;
                        Ok(Some(group))
                    }
                    None => {
                        *phase = Phase::Closed;
                        Ok(Some(b"}".to_vec()))
                    }
                },
                Phase::Closed => Ok(None),
            },
        }
    }
}

fn separator(first: &mut bool) -> Vec<u8> {
    if mem::replace(first, false) {
        Vec::new()
    } else {
        b",".to_vec()
    }
}

impl Iterator for StreamEncoder {
    type Item = Result<Bytes, io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.encoder.as_ref()?;
        match self.next_group() {
            Ok(Some(group)) => {
                let encoder = self.encoder.as_mut()?;
                let written = encoder.write_all(&group).and_then(|_| encoder.flush());
                Some(written.map(|_| Bytes::from(mem::take(encoder.get_mut()))))
            }
            Ok(None) => {
                let encoder = self.encoder.take()?;
                Some(encoder.finish().map(Bytes::from))
            }
            Err(e) => {
                self.encoder = None;
                Some(Err(io::Error::from(e)))
            }
        }
    }
}

enum Mode {
    /// Nothing but whitespace seen so far.
    Start,
    /// Top level is an array; elements are emitted one by one.
    Array,
    /// Top level is a single value, emitted once complete.
    Single,
    Done,
}

/// Incremental gunzip + top-level JSON splitter.
pub struct StreamDecoder {
    inflater: GzDecoder<Vec<u8>>,
    mode: Mode,
    buf: Vec<u8>,
    depth: usize,
    in_string: bool,
    escaped: bool,
    saw_array: bool,
    /// A string or container element just closed; only `,` or `]` may follow.
    after_item: bool,
    /// A `,` was read; another element must follow.
    need_item: bool,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            inflater: GzDecoder::new(Vec::new()),
            mode: Mode::Start,
            buf: Vec::new(),
            depth: 0,
            in_string: false,
            escaped: false,
            saw_array: false,
            after_item: false,
            need_item: false,
        }
    }

    /// True once the top-level value turned out to be an array.
    pub fn is_array(&self) -> bool {
        self.saw_array
    }

    /// Feed a compressed chunk; returns every value completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Value>, SerializationError> {
        self.inflater.write_all(chunk)?;
        self.inflater.flush()?;
        let inflated = mem::take(self.inflater.get_mut());
        self.scan(&inflated)
    }

    /// Signal end of input; returns any trailing value.
    pub fn finish(mut self) -> Result<Vec<Value>, SerializationError> {
        self.inflater.try_finish()?;
        let inflated = mem::take(self.inflater.get_mut());
        let mut out = self.scan(&inflated)?;
        match self.mode {
            Mode::Start | Mode::Done => {}
            Mode::Single => {
                if self.buf.iter().any(|b| !b.is_ascii_whitespace()) {
                    out.push(serde_json::from_slice(&self.buf)?);
                }
            }
            Mode::Array => {
                return Err(serde_json::Error::custom("stream ended inside a JSON array").into());
            }
        }
        Ok(out)
    }

    fn scan(&mut self, bytes: &[u8]) -> Result<Vec<Value>, SerializationError> {
        let mut out = Vec::new();
        for &b in bytes {
            match self.mode {
                Mode::Start => {
                    if b.is_ascii_whitespace() {
                        continue;
                    }
                    if b == b'[' {
                        self.mode = Mode::Array;
                        self.saw_array = true;
                    } else {
                        self.mode = Mode::Single;
                        self.track(b);
                        self.buf.push(b);
                    }
                }
                Mode::Array => {
                    let inside = self.in_string || self.depth > 0;
                    if !inside && self.after_item {
                        match b {
                            b',' => {
                                self.after_item = false;
                                self.need_item = true;
                            }
                            b']' => self.mode = Mode::Done,
                            _ if b.is_ascii_whitespace() => {}
                            _ => {
                                return Err(serde_json::Error::custom("expected ',' or ']' after array element").into())
                            }
                        }
                        continue;
                    }
                    if !inside && (b == b',' || b == b']') {
                        match self.take_value()? {
                            Some(value) => out.push(value),
                            None if b == b']' && !self.need_item => {}
                            None => return Err(serde_json::Error::custom("missing array element").into()),
                        }
                        if b == b']' {
                            self.mode = Mode::Done;
                        } else {
                            self.need_item = true;
                        }
                        continue;
                    }
                    self.track(b);
                    self.buf.push(b);
                    // containers and strings are complete at their closing byte
                    if !self.in_string && self.depth == 0 && matches!(b, b'}' | b']' | b'"') {
                        if let Some(value) = self.take_value()? {
                            out.push(value);
                        }
                        self.after_item = true;
                        self.need_item = false;
                    }
                }
                Mode::Single => {
                    self.track(b);
                    self.buf.push(b);
                    let closes_container = !self.in_string && self.depth == 0 && (b == b'}' || b == b']');
                    if closes_container {
                        if let Some(value) = self.take_value()? {
                            out.push(value);
                        }
                        self.mode = Mode::Done;
                    }
                }
                Mode::Done => {
                    if !b.is_ascii_whitespace() {
                        return Err(serde_json::Error::custom("trailing bytes after JSON value").into());
                    }
                }
            }
        }
        Ok(out)
    }

    fn track(&mut self, b: u8) {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.in_string = false;
            }
            return;
        }
        match b {
            b'"' => self.in_string = true,
            b'[' | b'{' => self.depth += 1,
            b']' | b'}' => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
    }

    fn take_value(&mut self) -> Result<Option<Value>, SerializationError> {
        let raw = mem::take(&mut self.buf);
        if raw.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&raw)?))
    }
}

/// Collect a fully streamed reply into one value: arrays are rebuilt, a
/// single value is returned as-is, an empty stream yields `null`.
pub fn aggregate(values: Vec<Value>, was_array: bool) -> Value {
    if was_array {
        return Value::Array(values);
    }
    values.into_iter().next().unwrap_or(Value::Null)
}
