use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Number formatting conventions used when coercing values.
///
/// The invariant default reads `1,000.5`; a comma-decimal culture such as
/// Italian would be `Culture { decimal_separator: ',', group_separator: '.',
/// ..Culture::default() }`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Culture {
    pub decimal_separator: char,
    pub group_separator: char,
    pub currency_symbol: char,
}

impl Default for Culture {
    fn default() -> Culture {
        Culture {
            decimal_separator: '.',
            group_separator: ',',
            currency_symbol: '$',
        }
    }
}

impl Culture {
    pub fn invariant() -> Culture {
        Culture::default()
    }
}

/// Flags controlling which number notations a coercion accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberStyles(u8);

impl NumberStyles {
    pub const NONE: NumberStyles = NumberStyles(0);
    /// Group separators, in canonical 3-digit groups.
    pub const ALLOW_THOUSANDS: NumberStyles = NumberStyles(1);
    /// Scientific notation (`1.7E+3`).
    pub const ALLOW_EXPONENT: NumberStyles = NumberStyles(2);
    /// A leading currency symbol.
    pub const ALLOW_CURRENCY_SYMBOL: NumberStyles = NumberStyles(4);

    /// The default style for integers.
    pub const NUMBER: NumberStyles = NumberStyles(1);
    /// The default style for floating point numbers.
    pub const FLOAT: NumberStyles = NumberStyles(2);

    pub fn contains(self, other: NumberStyles) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for NumberStyles {
    fn default() -> NumberStyles {
        NumberStyles::NUMBER
    }
}

impl BitOr for NumberStyles {
    type Output = NumberStyles;

    fn bitor(self, rhs: NumberStyles) -> NumberStyles {
        NumberStyles(self.0 | rhs.0)
    }
}

impl BitOrAssign for NumberStyles {
    fn bitor_assign(&mut self, rhs: NumberStyles) {
        self.0 |= rhs.0;
    }
}

/// A typed value at the accessor boundary.
///
/// [`Document::set`][crate::Document::set] accepts anything convertible into
/// one of these; the variant decides how the text stored in the document is
/// rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    StrArray(Vec<String>),
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Value {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Value {
        Value::Bytes(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Value {
        Value::StrArray(v)
    }
}

impl From<&[&str]> for Value {
    fn from(v: &[&str]) -> Value {
        Value::StrArray(v.iter().map(|s| s.to_string()).collect())
    }
}

/// Pluggable yes/no vocabulary.
///
/// Tried before the built-in table when reading booleans and used to render
/// them when writing.
pub trait BooleanConverter: fmt::Debug {
    /// `Some(..)` when `raw` belongs to this vocabulary.
    fn parse(&self, raw: &str) -> Option<bool>;
    fn render(&self, value: bool) -> String;
}

/// The stock [`BooleanConverter`]: one word for true, one for false,
/// compared case-insensitively.
#[derive(Debug, Clone)]
pub struct YesNoConverter {
    yes: String,
    no: String,
}

impl YesNoConverter {
    pub fn new(yes: impl Into<String>, no: impl Into<String>) -> YesNoConverter {
        YesNoConverter {
            yes: yes.into(),
            no: no.into(),
        }
    }
}

impl Default for YesNoConverter {
    fn default() -> YesNoConverter {
        YesNoConverter::new("yes", "no")
    }
}

impl BooleanConverter for YesNoConverter {
    fn parse(&self, raw: &str) -> Option<bool> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(&self.yes) {
            Some(true)
        } else if raw.eq_ignore_ascii_case(&self.no) {
            Some(false)
        } else {
            None
        }
    }

    fn render(&self, value: bool) -> String {
        if value {
            self.yes.clone()
        } else {
            self.no.clone()
        }
    }
}

/// The vocabularies recognized without any configured converter.
pub(crate) const YES_NO_PAIRS: [(&str, &str); 4] = [
    ("yes", "no"),
    ("1", "0"),
    ("on", "off"),
    ("enabled", "disabled"),
];

pub(crate) fn parse_bool_table(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    for (yes, no) in &YES_NO_PAIRS {
        if raw.eq_ignore_ascii_case(yes) {
            return Some(true);
        }
        if raw.eq_ignore_ascii_case(no) {
            return Some(false);
        }
    }
    None
}

/// Rewrites a culture-formatted number into the form `from_str` accepts.
///
/// Group separators must sit before exactly three digits; anything else is a
/// coercion failure, which is what distinguishes `1,000` from a stray
/// decimal comma like `9,3` under the invariant culture.
fn normalize_number(raw: &str, styles: NumberStyles, culture: &Culture) -> Option<String> {
    let mut raw = raw.trim();
    if styles.contains(NumberStyles::ALLOW_CURRENCY_SYMBOL) {
        raw = raw
            .trim_start_matches(culture.currency_symbol)
            .trim_start();
    }
    if raw.is_empty() {
        return None;
    }

    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == culture.decimal_separator {
            out.push('.');
        } else if c == culture.group_separator {
            if !styles.contains(NumberStyles::ALLOW_THOUSANDS) || i == 0 {
                return None;
            }
            let digits = chars[i + 1..]
                .iter()
                .take_while(|c| c.is_ascii_digit())
                .count();
            if digits != 3 {
                return None;
            }
            // the separator itself is dropped
        } else {
            out.push(c);
        }
        i += 1;
    }

    if !styles.contains(NumberStyles::ALLOW_EXPONENT) && out.contains(|c| c == 'e' || c == 'E') {
        return None;
    }
    Some(out)
}

pub(crate) fn parse_i64(raw: &str, styles: NumberStyles, culture: &Culture) -> Option<i64> {
    normalize_number(raw, styles, culture)?.parse().ok()
}

pub(crate) fn parse_f64(raw: &str, styles: NumberStyles, culture: &Culture) -> Option<f64> {
    let mut styles = styles;
    let raw = raw
        .trim()
        .trim_end_matches(|c| matches!(c, 'd' | 'D' | 'f' | 'F'));
    if raw.contains(|c| c == 'e' || c == 'E') {
        styles |= NumberStyles::ALLOW_EXPONENT;
    }
    normalize_number(raw, styles, culture)?.parse().ok()
}

pub(crate) fn render_f64(value: f64, culture: &Culture) -> String {
    let text = value.to_string();
    if culture.decimal_separator == '.' {
        text
    } else {
        text.replace('.', &culture.decimal_separator.to_string())
    }
}

/// Encodes bytes as contiguous lowercase hex, two digits per byte.
pub(crate) fn encode_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Exact inverse of [`encode_bytes`]; `None` on odd length or a non-hex digit.
pub(crate) fn decode_bytes(raw: &str) -> Option<Vec<u8>> {
    if !raw.is_ascii() || raw.len() % 2 != 0 {
        return None;
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&raw[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_need_three_digit_groups() {
        let culture = Culture::invariant();
        assert_eq!(parse_f64("1,000", NumberStyles::FLOAT | NumberStyles::ALLOW_THOUSANDS, &culture), Some(1000.0));
        assert_eq!(parse_f64("9,3", NumberStyles::FLOAT | NumberStyles::ALLOW_THOUSANDS, &culture), None);
        assert_eq!(parse_i64("1234", NumberStyles::NUMBER, &culture), Some(1234));
        assert_eq!(parse_i64("1,0000", NumberStyles::NUMBER, &culture), None);
    }

    #[test]
    fn comma_decimal_culture_reads_a_decimal_comma() {
        let culture = Culture {
            decimal_separator: ',',
            group_separator: '.',
            ..Culture::default()
        };
        let styles = NumberStyles::FLOAT | NumberStyles::ALLOW_THOUSANDS;
        assert_eq!(parse_f64("9,3", styles, &culture), Some(9.3));
        assert_eq!(parse_f64("1.000,5", styles, &culture), Some(1000.5));
    }

    #[test]
    fn unit_suffixes_and_exponents() {
        let culture = Culture::invariant();
        let styles = NumberStyles::FLOAT | NumberStyles::ALLOW_THOUSANDS;
        assert_eq!(parse_f64("0.6D", styles, &culture), Some(0.6));
        assert_eq!(parse_f64("4.5f", styles, &culture), Some(4.5));
        assert_eq!(parse_f64("1.7E+3", styles, &culture), Some(1700.0));
        assert_eq!(parse_f64("sdgfery56d", styles, &culture), None);
    }

    #[test]
    fn currency_symbol_needs_its_flag() {
        let culture = Culture::invariant();
        let base = NumberStyles::FLOAT | NumberStyles::ALLOW_THOUSANDS;
        assert_eq!(parse_f64("$2,999", base, &culture), None);
        assert_eq!(
            parse_f64("$2,999", base | NumberStyles::ALLOW_CURRENCY_SYMBOL, &culture),
            Some(2999.0)
        );
    }

    #[test]
    fn custom_group_separator() {
        let culture = Culture {
            group_separator: '_',
            ..Culture::default()
        };
        assert_eq!(parse_i64("1_234_567", NumberStyles::NUMBER, &culture), Some(1234567));
        assert_eq!(
            parse_f64("991_228_224_617.445", NumberStyles::FLOAT | NumberStyles::ALLOW_THOUSANDS, &culture),
            Some(991228224617.445)
        );
    }

    #[test]
    fn bool_table_is_case_insensitive() {
        assert_eq!(parse_bool_table("on"), Some(true));
        assert_eq!(parse_bool_table("Disabled"), Some(false));
        assert_eq!(parse_bool_table("1"), Some(true));
        assert_eq!(parse_bool_table(" Off "), Some(false));
        assert_eq!(parse_bool_table("maybe"), None);
    }

    #[test]
    fn converter_vocabulary() {
        let converter = YesNoConverter::new("vero", "falso");
        assert_eq!(converter.parse("VERO"), Some(true));
        assert_eq!(converter.parse("falso"), Some(false));
        assert_eq!(converter.parse("yes"), None);
        assert_eq!(converter.render(true), "vero");
    }

    #[test]
    fn hex_codec_round_trips() {
        let bytes = vec![0x00, 0x0f, 0xde, 0xad];
        let text = encode_bytes(&bytes);
        assert_eq!(text, "000fdead");
        assert_eq!(decode_bytes(&text), Some(bytes));
        assert_eq!(decode_bytes(""), Some(Vec::new()));
        assert_eq!(decode_bytes("abc"), None);
        assert_eq!(decode_bytes("zz"), None);
    }
}
