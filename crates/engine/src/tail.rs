// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded text buffer keeping the most recent output

/// Keeps at most `limit` bytes of the most recent text.
///
/// Trimming never splits a UTF-8 character, so the retained text may be a
/// few bytes shorter than the limit.
#[derive(Debug, Clone)]
pub struct OutputTail {
    buf: String,
    limit: usize,
}

impl OutputTail {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: String::new(),
            limit,
        }
    }

    pub fn push(&mut self, chunk: &str) {
        self.buf.push_str(chunk);
        if self.buf.len() > self.limit {
            let cut = ceil_char_boundary(&self.buf, self.buf.len() - self.limit);
            self.buf.drain(..cut);
        }
    }

    /// The last `n` bytes (or fewer, on a character boundary).
    pub fn last(&self, n: usize) -> &str {
        if self.buf.len() <= n {
            return &self.buf;
        }
        let start = ceil_char_boundary(&self.buf, self.buf.len() - n);
        &self.buf[start..]
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
#[path = "tail_tests.rs"]
mod tests;
