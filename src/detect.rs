use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

const BOM_UTF8: [u8; 3] = [0xef, 0xbb, 0xbf];
const BOM_UTF16_LE: [u8; 2] = [0xff, 0xfe];
const BOM_UTF16_BE: [u8; 2] = [0xfe, 0xff];

/// Text encodings the crate can decode and encode.
///
/// `Latin1` is never detected, only selected explicitly through
/// [`Settings::encoding`][crate::Settings::encoding].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl TextEncoding {
    /// Decodes a whole buffer, stripping the encoding's BOM if present.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Bom => {
                let bytes = strip_prefix(bytes, &BOM_UTF8);
                String::from_utf8(bytes.to_vec())
                    .map_err(|_| Error::new(ErrorKind::Io, "data is not valid UTF-8"))
            }
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                let bom = if self == TextEncoding::Utf16Le {
                    &BOM_UTF16_LE
                } else {
                    &BOM_UTF16_BE
                };
                let bytes = strip_prefix(bytes, bom);
                if bytes.len() % 2 != 0 {
                    return Err(Error::new(ErrorKind::Io, "data is not valid UTF-16"));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| {
                        if self == TextEncoding::Utf16Le {
                            u16::from_le_bytes([pair[0], pair[1]])
                        } else {
                            u16::from_be_bytes([pair[0], pair[1]])
                        }
                    })
                    .collect();
                String::from_utf16(&units)
                    .map_err(|_| Error::new(ErrorKind::Io, "data is not valid UTF-16"))
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }

    /// Encodes text for writing, emitting a BOM for the BOM-carrying
    /// variants. Characters outside Latin-1 are written as `?` under
    /// [`TextEncoding::Latin1`].
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf8Bom => {
                let mut out = BOM_UTF8.to_vec();
                out.extend_from_slice(text.as_bytes());
                out
            }
            TextEncoding::Utf16Le => {
                let mut out = BOM_UTF16_LE.to_vec();
                out.extend(text.encode_utf16().flat_map(|u| u.to_le_bytes()));
                out
            }
            TextEncoding::Utf16Be => {
                let mut out = BOM_UTF16_BE.to_vec();
                out.extend(text.encode_utf16().flat_map(|u| u.to_be_bytes()));
                out
            }
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

fn strip_prefix<'a>(bytes: &'a [u8], prefix: &[u8]) -> &'a [u8] {
    if bytes.starts_with(prefix) {
        &bytes[prefix.len()..]
    } else {
        bytes
    }
}

/// Sniffs a buffer's text encoding: BOMs first, then UTF-8 validation.
///
/// `None` means undetectable (most likely a non-Latin ANSI code page); the
/// caller must then have an explicit encoding or give up.
pub fn detect_encoding(bytes: &[u8]) -> Option<TextEncoding> {
    if bytes.starts_with(&BOM_UTF8) {
        Some(TextEncoding::Utf8Bom)
    } else if bytes.starts_with(&BOM_UTF16_LE) {
        Some(TextEncoding::Utf16Le)
    } else if bytes.starts_with(&BOM_UTF16_BE) {
        Some(TextEncoding::Utf16Be)
    } else if std::str::from_utf8(bytes).is_ok() {
        Some(TextEncoding::Utf8)
    } else {
        None
    }
}

/// Returns the dominant line terminator of `text`, or `None` when the text
/// has no terminators at all.
pub fn detect_newline(text: &str) -> Option<&'static str> {
    let crlf = text.matches("\r\n").count();
    let lf = text.matches('\n').count() - crlf;
    let cr = text.matches('\r').count() - crlf;

    if crlf >= lf && crlf >= cr && crlf > 0 {
        Some("\r\n")
    } else if lf >= cr && lf > 0 {
        Some("\n")
    } else if cr > 0 {
        Some("\r")
    } else {
        None
    }
}
