//! Bounded output capture for one process stream
//!
//! Keeps two independent views of the same byte stream:
//! - a line window (`lines`), at most `line_limit` entries, numbered with
//!   absolute 1-based line numbers so pagination survives eviction
//! - a raw `tail` of the last `char_limit` characters, ignoring line
//!   boundaries
//!
//! After every append/evict cycle `first_line + lines.len() - 1 == total_lines`.

use std::collections::VecDeque;

/// Per-append limits, read from the live config at append time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLimits {
    pub line_limit: usize,
    pub char_limit: usize,
}

impl BufferLimits {
    pub fn new(line_limit: usize, char_limit: usize) -> Self {
        Self {
            line_limit: line_limit.max(1),
            char_limit: char_limit.max(1),
        }
    }
}

/// Bounded, append-only record of one stream
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    lines: VecDeque<String>,
    first_line: usize,
    total_lines: usize,
    remainder: String,
    tail: String,
    tail_chars: usize,
    decoder: Utf8Carry,
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            first_line: 1,
            total_lines: 0,
            remainder: String::new(),
            tail: String::new(),
            tail_chars: 0,
            decoder: Utf8Carry::default(),
        }
    }

    /// Append raw bytes from the stream, carrying incomplete UTF-8
    /// sequences over to the next chunk
    pub fn append_bytes(&mut self, chunk: &[u8], limits: BufferLimits) {
        let text = self.decoder.decode(chunk);
        if !text.is_empty() {
            self.append(&text, limits);
        }
    }

    /// Append decoded text
    pub fn append(&mut self, text: &str, limits: BufferLimits) {
        let mut pending = std::mem::take(&mut self.remainder);
        pending.push_str(text);

        let mut fragments: Vec<&str> = pending.split('\n').collect();
        // split always yields at least one element; the last is partial
        let last = fragments.pop().unwrap_or_default();
        for fragment in fragments {
            self.push_line(fragment);
        }
        self.remainder = last.to_string();
        self.evict(limits.line_limit);

        self.push_tail(text, limits.char_limit);
    }

    /// Commit a pending partial line (and any undecodable leftover bytes)
    /// as a final line
    pub fn flush_remainder(&mut self, limits: BufferLimits) {
        let leftover = self.decoder.finish();
        if !leftover.is_empty() {
            self.remainder.push_str(&leftover);
            self.push_tail(&leftover, limits.char_limit);
        }
        if !self.remainder.is_empty() {
            let line = std::mem::take(&mut self.remainder);
            self.push_line(&line);
        }
        self.evict(limits.line_limit);
    }

    fn push_line(&mut self, fragment: &str) {
        let line = fragment.strip_suffix('\r').unwrap_or(fragment);
        self.lines.push_back(line.to_string());
        self.total_lines += 1;
    }

    fn evict(&mut self, line_limit: usize) {
        let limit = line_limit.max(1);
        if self.lines.len() > limit {
            let excess = self.lines.len() - limit;
            self.lines.drain(..excess);
            self.first_line += excess;
        }
    }

    fn push_tail(&mut self, text: &str, char_limit: usize) {
        self.tail.push_str(text);
        self.tail_chars += text.chars().count();

        let limit = char_limit.max(1);
        if self.tail_chars > limit {
            let excess = self.tail_chars - limit;
            let cut = self
                .tail
                .char_indices()
                .nth(excess)
                .map(|(idx, _)| idx)
                .unwrap_or(self.tail.len());
            self.tail.drain(..cut);
            self.tail_chars = limit;
        }
    }

    /// Retained lines, oldest first
    pub fn lines(&self) -> &VecDeque<String> {
        &self.lines
    }

    /// Absolute number of the oldest retained line (1-based)
    pub fn first_line(&self) -> usize {
        self.first_line
    }

    /// Absolute number of the newest retained line (`first_line - 1` when empty)
    pub fn last_line(&self) -> usize {
        self.first_line + self.lines.len() - 1
    }

    /// Every line ever completed, evicted or not
    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    /// Incomplete trailing line awaiting a terminator
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    /// Last `char_limit` raw characters
    pub fn tail(&self) -> &str {
        &self.tail
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether older lines were evicted
    pub fn has_evicted(&self) -> bool {
        self.first_line > 1
    }
}

/// Incremental UTF-8 decoder holding back a split multi-byte sequence
#[derive(Debug, Clone, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        while !rest.is_empty() {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }
}
