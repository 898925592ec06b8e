//! Torrent container analysis
//!
//! Indexers hand out two kinds of `.torrent` files: real ones, which must be processed by a
//! provider on the remote side, and disguised direct links, which only carry a hoster URL in
//! their `comment` and are recognizable by a fixed `created by` marker.
//!
//! [`analyze`] walks the bencoded dictionary without building a value tree. Values of keys it
//! does not care about are skipped by nesting depth, and the `info` dictionary is kept as the
//! raw byte span of the input so the info-hash is computed over exactly what was submitted.

use crate::error::{Error, Result};
use crate::types::JobId;

/// `created by` value identifying a disguised direct link
pub const DIRECT_LINK_MARKER: &str = "debrid-dl/direct-link";

/// Classification of a submitted container
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    /// Synthetic container wrapping a plain hoster URL
    DirectLink {
        /// URL from the `comment` field
        url: String,
    },
    /// Real torrent
    RealContainer {
        /// Lowercase hex SHA-1 of the raw `info` dictionary
        info_hash: String,
    },
}

/// Result of analyzing a container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerInfo {
    /// `info.name`
    pub name: String,
    /// `info.length` in bytes
    pub length: u64,
    /// Direct link or real torrent
    pub kind: ContainerKind,
}

impl ContainerInfo {
    /// Job id for this container
    ///
    /// Direct links are keyed by their URL so a link submitted both raw and disguised maps
    /// to the same job.
    pub fn id(&self) -> JobId {
        match &self.kind {
            ContainerKind::DirectLink { url } => JobId::for_url(url),
            ContainerKind::RealContainer { info_hash } => JobId::new(info_hash.clone()),
        }
    }

    /// Whether this is a disguised direct link
    pub fn is_direct_link(&self) -> bool {
        matches!(self.kind, ContainerKind::DirectLink { .. })
    }
}

/// Parse and classify a bencoded container
pub fn analyze(bytes: &[u8]) -> Result<ContainerInfo> {
    let mut scanner = Scanner::new(bytes);
    let top = scanner.dict_entries()?;
    if !scanner.at_end() {
        return Err(malformed(format!(
            "trailing data after top-level dictionary at offset {}",
            scanner.pos
        )));
    }

    let info_span = lookup(&top, b"info").ok_or_else(|| malformed("missing 'info' dictionary"))?;

    let mut info_scanner = Scanner::new(info_span);
    let info = info_scanner
        .dict_entries()
        .map_err(|_| malformed("'info' is not a dictionary"))?;

    let name = lookup(&info, b"name")
        .ok_or_else(|| malformed("missing 'info.name'"))
        .and_then(parse_string)?;
    let length = lookup(&info, b"length")
        .ok_or_else(|| malformed("missing 'info.length'"))
        .and_then(parse_int)?;
    let length =
        u64::try_from(length).map_err(|_| malformed("negative 'info.length'"))?;

    let created_by = lookup(&top, b"created by").map(parse_string).transpose()?;

    let kind = if created_by.as_deref() == Some(DIRECT_LINK_MARKER) {
        let url = lookup(&top, b"comment")
            .ok_or_else(|| malformed("direct link container without 'comment'"))
            .and_then(parse_string)?;
        ContainerKind::DirectLink { url }
    } else {
        ContainerKind::RealContainer {
            info_hash: JobId::from_digest(info_span).0,
        }
    };

    Ok(ContainerInfo { name, length, kind })
}

/// Build a disguised direct-link container, the format indexers hand out for hoster links
pub fn encode_direct_link(url: &str, name: &str, size: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(url.len() + name.len() + 96);
    out.push(b'd');
    // Keys in sorted order, as bencode requires
    push_bytes(&mut out, b"comment");
    push_bytes(&mut out, url.as_bytes());
    push_bytes(&mut out, b"created by");
    push_bytes(&mut out, DIRECT_LINK_MARKER.as_bytes());
    push_bytes(&mut out, b"info");
    out.push(b'd');
    push_bytes(&mut out, b"length");
    out.extend_from_slice(format!("i{size}e").as_bytes());
    push_bytes(&mut out, b"name");
    push_bytes(&mut out, name.as_bytes());
    out.push(b'e');
    out.push(b'e');
    out
}

fn push_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}

fn malformed(message: impl Into<String>) -> Error {
    Error::MalformedContainer(message.into())
}

fn lookup<'a>(entries: &[(&[u8], &'a [u8])], key: &[u8]) -> Option<&'a [u8]> {
    entries.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Decode a whole span as one byte string
fn parse_string(span: &[u8]) -> Result<String> {
    let mut scanner = Scanner::new(span);
    let bytes = scanner.byte_string()?;
    if !scanner.at_end() {
        return Err(malformed("expected a byte string"));
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Decode a whole span as one integer
fn parse_int(span: &[u8]) -> Result<i64> {
    let mut scanner = Scanner::new(span);
    let value = scanner.integer()?;
    if !scanner.at_end() {
        return Err(malformed("expected an integer"));
    }
    Ok(value)
}

struct Scanner<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn peek(&self) -> Result<u8> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or_else(|| malformed(format!("unexpected end of input at offset {}", self.pos)))
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        let found = self.peek()?;
        if found != byte {
            return Err(malformed(format!(
                "expected '{}' at offset {}, found '{}'",
                byte as char, self.pos, found as char
            )));
        }
        self.pos += 1;
        Ok(())
    }

    /// Digits up to `terminator`, without leading zeros (a lone "0" is fine)
    fn digits(&mut self, terminator: u8) -> Result<&'a str> {
        let start = self.pos;
        let end = self.buf[start..]
            .iter()
            .position(|b| *b == terminator)
            .map(|i| start + i)
            .ok_or_else(|| malformed(format!("unterminated number at offset {start}")))?;

        let text = std::str::from_utf8(&self.buf[start..end])
            .map_err(|_| malformed(format!("invalid number at offset {start}")))?;
        self.pos = end + 1;
        Ok(text)
    }

    fn integer(&mut self) -> Result<i64> {
        let start = self.pos;
        self.expect(b'i')?;
        let text = self.digits(b'e')?;

        let unsigned = text.strip_prefix('-').unwrap_or(text);
        let valid = !unsigned.is_empty()
            && unsigned.bytes().all(|b| b.is_ascii_digit())
            && !(unsigned.len() > 1 && unsigned.starts_with('0'))
            && text != "-0";
        if !valid {
            return Err(malformed(format!("invalid integer '{text}' at offset {start}")));
        }

        text.parse()
            .map_err(|_| malformed(format!("integer out of range at offset {start}")))
    }

    fn byte_string(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let text = self.digits(b':')?;

        let valid = !text.is_empty()
            && text.bytes().all(|b| b.is_ascii_digit())
            && !(text.len() > 1 && text.starts_with('0'));
        if !valid {
            return Err(malformed(format!(
                "invalid string length '{text}' at offset {start}"
            )));
        }

        let len: usize = text
            .parse()
            .map_err(|_| malformed(format!("string length out of range at offset {start}")))?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| malformed(format!("string at offset {start} runs past end of input")))?;

        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Skip one complete value of any type, tracking list/dict nesting
    fn skip_value(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.peek()? {
                b'i' => {
                    self.integer()?;
                }
                b'0'..=b'9' => {
                    self.byte_string()?;
                }
                b'l' | b'd' => {
                    self.pos += 1;
                    depth += 1;
                }
                b'e' if depth > 0 => {
                    self.pos += 1;
                    depth -= 1;
                }
                other => {
                    return Err(malformed(format!(
                        "unexpected '{}' at offset {}",
                        other as char, self.pos
                    )));
                }
            }

            if depth == 0 {
                return Ok(());
            }
        }
    }

    /// Walk a dictionary, returning each key with the raw span of its value
    fn dict_entries(&mut self) -> Result<Vec<(&'a [u8], &'a [u8])>> {
        self.expect(b'd')?;
        let mut entries = Vec::new();

        loop {
            if self.peek()? == b'e' {
                self.pos += 1;
                return Ok(entries);
            }

            let key = self.byte_string()?;
            let value_start = self.pos;
            self.skip_value()?;
            entries.push((key, &self.buf[value_start..self.pos]));
        }
    }
}
