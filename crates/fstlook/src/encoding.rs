// Character encodings of the transducer file and the word streams.
//
// The engine itself is encoding-agnostic: symbols are interned IDs and the
// input tape is a sequence of IDs. This module owns the boundary work of
// turning raw byte streams into characters: splitting bytes into code
// units, stepping over one character's worth of units, and converting
// between unit sequences and strings.

use std::io::BufRead;

use crate::FstError;

/// Supported encodings of the AT&T text, the binary snapshot BOM and the
/// input/output word streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    Ascii,
    /// Any fixed one-byte codepage (ISO-8859 family). Decodes like Latin-1.
    Octet,
    #[default]
    Utf8,
    Ucs2,
    Utf16,
    Utf32,
}

const BOM_UTF8: [u8; 3] = [0xEF, 0xBB, 0xBF];
const BOM_WIDE: [u8; 2] = 0xFEFFu16.to_ne_bytes();
const BOM_QUAD: [u8; 4] = 0xFEFFu32.to_ne_bytes();

impl Encoding {
    /// Size of one code unit in bytes.
    pub fn unit_size(self) -> usize {
        match self {
            Encoding::Ascii | Encoding::Octet | Encoding::Utf8 => 1,
            Encoding::Ucs2 | Encoding::Utf16 => 2,
            Encoding::Utf32 => 4,
        }
    }

    /// The byte-order mark of this encoding, empty for one-byte encodings.
    /// Multi-byte marks use the native byte order of the host.
    pub fn bom(self) -> &'static [u8] {
        match self {
            Encoding::Ascii | Encoding::Octet => &[],
            Encoding::Utf8 => &BOM_UTF8,
            Encoding::Ucs2 | Encoding::Utf16 => &BOM_WIDE,
            Encoding::Utf32 => &BOM_QUAD,
        }
    }

    /// Strip a leading byte-order mark if present.
    pub fn strip_bom(self, data: &[u8]) -> &[u8] {
        prefix_match(data, self.bom()).unwrap_or(data)
    }

    /// Whether `sep` is usable as a field separator: it must occupy a
    /// single code unit of this encoding.
    pub fn valid_separator(self, sep: char) -> bool {
        let cp = sep as u32;
        match self {
            Encoding::Ascii | Encoding::Octet => cp <= 0xFF,
            Encoding::Utf8 => cp <= 0x7F,
            Encoding::Ucs2 | Encoding::Utf16 => cp <= 0xD7FF,
            Encoding::Utf32 => true,
        }
    }

    /// Split raw bytes into code units, widened to `u32`. Multi-byte units
    /// are read in native byte order. Fails if the byte count is not a
    /// multiple of the unit size.
    pub fn code_units(self, data: &[u8]) -> Result<Vec<u32>, FstError> {
        let size = self.unit_size();
        if data.len() % size != 0 {
            return Err(FstError::Encoding {
                at: data.len() - data.len() % size,
            });
        }
        let units = match size {
            1 => data.iter().map(|&b| b as u32).collect(),
            2 => data
                .chunks_exact(2)
                .map(|c| u16::from_ne_bytes([c[0], c[1]]) as u32)
                .collect(),
            _ => data
                .chunks_exact(4)
                .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        };
        Ok(units)
    }

    /// Number of code units occupied by the first character of `units`.
    ///
    /// Always advances at least one unit of a non-empty slice; never past
    /// its end. On malformed sequences the result is the longest plausible
    /// character at the cursor.
    pub fn step_next(self, units: &[u32]) -> usize {
        if units.is_empty() {
            return 0;
        }
        match self {
            Encoding::Utf8 => {
                let mut n = 1;
                while n < units.len() && units[n] & 0xC0 == 0x80 {
                    n += 1;
                }
                n
            }
            Encoding::Utf16 => {
                if units[0] & 0xFC00 == 0xD800 && units.len() >= 2 {
                    2
                } else {
                    1
                }
            }
            _ => 1,
        }
    }

    /// Decode exactly one character from its code units, as carved out by
    /// [`step_next`](Self::step_next). `None` on malformed sequences.
    pub fn decode_char(self, units: &[u32]) -> Option<char> {
        match self {
            Encoding::Ascii | Encoding::Octet => {
                let &[u] = units else { return None };
                if u <= 0xFF { char::from_u32(u) } else { None }
            }
            Encoding::Utf8 => {
                let bytes: Vec<u8> = units
                    .iter()
                    .map(|&u| if u <= 0xFF { Some(u as u8) } else { None })
                    .collect::<Option<_>>()?;
                let s = std::str::from_utf8(&bytes).ok()?;
                let mut chars = s.chars();
                let c = chars.next()?;
                if chars.next().is_some() { None } else { Some(c) }
            }
            Encoding::Ucs2 => {
                let &[u] = units else { return None };
                if (0xD800..0xE000).contains(&u) {
                    None
                } else {
                    char::from_u32(u)
                }
            }
            Encoding::Utf16 => match units {
                &[u] => {
                    if (0xD800..0xE000).contains(&u) {
                        None
                    } else {
                        char::from_u32(u)
                    }
                }
                &[hi, lo] => {
                    if (0xD800..0xDC00).contains(&hi) && (0xDC00..0xE000).contains(&lo) {
                        char::from_u32(0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00))
                    } else {
                        None
                    }
                }
                _ => None,
            },
            Encoding::Utf32 => {
                let &[u] = units else { return None };
                char::from_u32(u)
            }
        }
    }

    /// Decode a whole byte stream into a string. Strict: any malformed
    /// sequence fails with the byte offset of the offending unit.
    pub fn decode(self, data: &[u8]) -> Result<String, FstError> {
        let units = self.code_units(data)?;
        let mut out = String::with_capacity(data.len());
        let mut pos = 0;
        while pos < units.len() {
            let n = self.step_next(&units[pos..]);
            match self.decode_char(&units[pos..pos + n]) {
                Some(c) => out.push(c),
                None => {
                    return Err(FstError::Encoding {
                        at: pos * self.unit_size(),
                    });
                }
            }
            pos += n;
        }
        Ok(out)
    }

    /// Decode a byte stream, replacing malformed sequences with U+FFFD.
    /// Used for input words, which must never fail a lookup.
    pub fn decode_lossy(self, data: &[u8]) -> String {
        let Ok(units) = self.code_units(data) else {
            // Drop the trailing partial unit and retry.
            let whole = data.len() - data.len() % self.unit_size();
            let mut s = self.decode_lossy(&data[..whole]);
            s.push('\u{FFFD}');
            return s;
        };
        let mut out = String::with_capacity(data.len());
        let mut pos = 0;
        while pos < units.len() {
            let n = self.step_next(&units[pos..]);
            out.push(self.decode_char(&units[pos..pos + n]).unwrap_or('\u{FFFD}'));
            pos += n;
        }
        out
    }

    /// Encode a string into this encoding. Characters that do not fit are
    /// replaced with `?`.
    pub fn encode(self, s: &str) -> Vec<u8> {
        match self {
            Encoding::Ascii | Encoding::Octet => s
                .chars()
                .map(|c| if (c as u32) <= 0xFF { c as u32 as u8 } else { b'?' })
                .collect(),
            Encoding::Utf8 => s.as_bytes().to_vec(),
            Encoding::Ucs2 => {
                let mut out = Vec::with_capacity(s.len() * 2);
                for c in s.chars() {
                    let u = if (c as u32) <= 0xFFFF { c as u32 as u16 } else { b'?' as u16 };
                    out.extend_from_slice(&u.to_ne_bytes());
                }
                out
            }
            Encoding::Utf16 => {
                let mut out = Vec::with_capacity(s.len() * 2);
                for u in s.encode_utf16() {
                    out.extend_from_slice(&u.to_ne_bytes());
                }
                out
            }
            Encoding::Utf32 => {
                let mut out = Vec::with_capacity(s.len() * 4);
                for c in s.chars() {
                    out.extend_from_slice(&(c as u32).to_ne_bytes());
                }
                out
            }
        }
    }
}

/// If `sym` is a non-empty prefix of `tail`, return the remainder of
/// `tail`; `None` otherwise. Measured in whole units.
pub fn prefix_match<'a, T: PartialEq>(tail: &'a [T], sym: &[T]) -> Option<&'a [T]> {
    if sym.is_empty() {
        return None;
    }
    tail.strip_prefix(sym)
}

/// Encoding-aware line reader over a byte stream.
///
/// Lines are delimited by a `\n` code unit; a trailing `\r` is dropped.
/// Decoding is lossy, so a malformed input line still yields a word.
pub struct LineReader<R> {
    inner: R,
    encoding: Encoding,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R, encoding: Encoding) -> Self {
        Self { inner, encoding }
    }

    /// Consume a leading byte-order mark if one is present at the current
    /// stream position. Returns whether a mark was consumed.
    pub fn consume_bom(&mut self) -> Result<bool, FstError> {
        let bom = self.encoding.bom();
        if bom.is_empty() {
            return Ok(false);
        }
        let buf = self.inner.fill_buf()?;
        if buf.len() >= bom.len() && &buf[..bom.len()] == bom {
            self.inner.consume(bom.len());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Read the next line, `None` at end of input.
    pub fn read_line(&mut self) -> Result<Option<String>, FstError> {
        let size = self.encoding.unit_size();
        let mut bytes: Vec<u8> = Vec::new();
        let mut unit = [0u8; 4];
        let newline = self.encoding.encode("\n");
        let carriage = self.encoding.encode("\r");
        loop {
            match self.inner.read_exact(&mut unit[..size]) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    if bytes.is_empty() {
                        return Ok(None);
                    }
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            if unit[..size] == newline[..] {
                break;
            }
            bytes.extend_from_slice(&unit[..size]);
        }
        if bytes.ends_with(&carriage) {
            bytes.truncate(bytes.len() - size);
        }
        Ok(Some(self.encoding.decode_lossy(&bytes)))
    }
}
