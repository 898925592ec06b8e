//! Progress parsing for the transfer process's stderr
//!
//! Two formats are understood:
//! - a percentage bar, `######################                 31.4%`
//! - curl's default column meter:
//!
//! ```text
//!   % Total    % Received % Xferd  Average Speed   Time    Time     Time  Current
//!                                  Dload  Upload   Total   Spent    Left  Speed
//!  47 1000M   47  473M    0     0  10.2M      0  0:01:37  0:00:46  0:00:51 11.0M
//! ```
//!
//! Updates are separated by carriage returns as often as by newlines.

/// One parsed progress update
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ProgressLine {
    /// Percentage bar; only the percentage is known
    Percent(f32),
    /// Column meter; sizes are relative to the current request
    Meter {
        /// Percentage of the current request
        percent: f32,
        /// Size of the current request, 0 when unknown
        total: u64,
        /// Bytes received in the current request
        received: u64,
        /// Current speed in bytes per second
        speed: u64,
    },
}

/// Parse one stderr segment, `None` for anything that is not a progress update
pub(crate) fn parse_line(line: &str) -> Option<ProgressLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    parse_bar(line).or_else(|| parse_meter(line))
}

fn parse_bar(line: &str) -> Option<ProgressLine> {
    let body = line.strip_suffix('%')?;
    let start = body
        .rfind(|c: char| c == '#' || c.is_whitespace())
        .map(|i| i + 1)
        .unwrap_or(0);
    let (prefix, number) = body.split_at(start);
    if !prefix.chars().all(|c| c == '#' || c.is_whitespace()) {
        return None;
    }
    let percent: f32 = number.parse().ok()?;
    (0.0..=100.0).contains(&percent).then_some(ProgressLine::Percent(percent))
}

fn parse_meter(line: &str) -> Option<ProgressLine> {
    let columns: Vec<&str> = line.split_whitespace().collect();
    if columns.len() != 12 {
        return None;
    }
    let percent: f32 = columns[0].parse().ok()?;
    if !(0.0..=100.0).contains(&percent) {
        return None;
    }
    Some(ProgressLine::Meter {
        percent,
        total: parse_size(columns[1])?,
        received: parse_size(columns[3])?,
        speed: parse_size(columns[11])?,
    })
}

/// Parse a curl size column: plain bytes or a number with a `k`/`M`/`G`/`T`/`P` suffix
pub(crate) fn parse_size(text: &str) -> Option<u64> {
    let (number, multiplier) = match text.chars().last()? {
        'k' | 'K' => (&text[..text.len() - 1], 1u64 << 10),
        'M' => (&text[..text.len() - 1], 1 << 20),
        'G' => (&text[..text.len() - 1], 1 << 30),
        'T' => (&text[..text.len() - 1], 1 << 40),
        'P' => (&text[..text.len() - 1], 1 << 50),
        c if c.is_ascii_digit() => (text, 1),
        _ => return None,
    };
    if multiplier == 1 {
        return number.parse().ok();
    }
    let value: f64 = number.parse().ok()?;
    (value >= 0.0).then(|| (value * multiplier as f64) as u64)
}

/// Splits a byte stream into segments at CR and LF
#[derive(Debug, Default)]
pub(crate) struct SegmentSplitter {
    pending: Vec<u8>,
}

impl SegmentSplitter {
    /// Feed a chunk and return the segments it completed
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut segments = Vec::new();
        for &byte in chunk {
            if byte == b'\r' || byte == b'\n' {
                if !self.pending.is_empty() {
                    segments.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
            }
        }
        segments
    }

    /// Whatever is left once the stream ends
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }
}
