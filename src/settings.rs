use std::ops::{BitOr, BitOrAssign};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::detect::TextEncoding;
use crate::value::{BooleanConverter, Culture};

/// Multi-line value policy flags.
///
/// The default is [`MultiLineValues::NOT_ALLOWED`]: every key's value must
/// fit on the key's own line. Combine flags with `|`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiLineValues(u8);

impl MultiLineValues {
    /// Continuation lines are a parse error.
    pub const NOT_ALLOWED: MultiLineValues = MultiLineValues(1);
    /// Indented continuation lines extend the previous value.
    pub const SIMPLE: MultiLineValues = MultiLineValues(2);
    /// Values may be wrapped in double quotes, which are stripped on read.
    pub const QUOTE_DELIMITED: MultiLineValues = MultiLineValues(4);
    /// A line without a separator is a key with no value.
    pub const ALLOW_VALUELESS_KEYS: MultiLineValues = MultiLineValues(8);
    /// Keys may appear before the first section header.
    pub const ALLOW_EMPTY_TOP_SECTION: MultiLineValues = MultiLineValues(16);

    /// Whether every flag of `other` is set in `self`.
    pub fn contains(self, other: MultiLineValues) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether continuation lines are accepted at all.
    pub fn multi_line_allowed(self) -> bool {
        !self.contains(MultiLineValues::NOT_ALLOWED)
    }
}

impl Default for MultiLineValues {
    fn default() -> MultiLineValues {
        MultiLineValues::NOT_ALLOWED
    }
}

impl BitOr for MultiLineValues {
    type Output = MultiLineValues;

    fn bitor(self, rhs: MultiLineValues) -> MultiLineValues {
        MultiLineValues(self.0 | rhs.0)
    }
}

impl BitOrAssign for MultiLineValues {
    fn bitor_assign(&mut self, rhs: MultiLineValues) {
        self.0 |= rhs.0;
    }
}

/// Parser configuration.
///
/// A `Settings` value is handed to the [`Document`][crate::Document]
/// constructors and never mutated afterwards; the `encoding` and `newline`
/// fields are the only ones back-filled (once, from file sniffing) before
/// parsing starts. Construct with struct-update syntax:
///
/// ```no_run
/// use lineconf::{MultiLineValues, Settings};
///
/// let settings = Settings {
///     multi_line: MultiLineValues::SIMPLE | MultiLineValues::QUOTE_DELIMITED,
///     ..Settings::default()
/// };
/// ```
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Multi-line value policy.
    pub multi_line: MultiLineValues,
    /// Key/value separator text, whitespace padding around it is tolerated.
    pub separator: String,
    /// Strings whose occurrence as the first non-blank run marks a comment.
    pub comment_characters: Vec<String>,
    /// Culture used for reading and writing numbers and booleans.
    pub culture: Culture,
    /// Text encoding; `None` means sniff the file, falling back to UTF-8.
    pub encoding: Option<TextEncoding>,
    /// Line terminator; `None` means sniff the file, falling back to the
    /// platform default.
    pub newline: Option<String>,
    /// Custom boolean vocabulary, tried before the built-in table.
    #[serde(skip)]
    pub boolean_converter: Option<Box<dyn BooleanConverter>>,
    /// Turn recovered value-coercion failures into hard errors.
    pub strict_coercion: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            multi_line: MultiLineValues::default(),
            separator: "=".to_string(),
            comment_characters: vec!["#".to_string(), ";".to_string()],
            culture: Culture::default(),
            encoding: None,
            newline: None,
            boolean_converter: None,
            strict_coercion: false,
        }
    }
}

impl Settings {
    pub fn new() -> Settings {
        Settings::default()
    }

    /// The line terminator used for joining multi-line values and for
    /// serialization.
    pub fn resolved_newline(&self) -> &str {
        match self.newline.as_deref() {
            Some(nl) => nl,
            None if cfg!(windows) => "\r\n",
            None => "\n",
        }
    }
}

static SECTION_RE: Lazy<Regex> = Lazy::new(|| {
    let re = r"^(?P<indentation>\s*)\[(?P<name>.*?)\](?P<comment>.*)$";
    Regex::new(re).expect("could not compile the section header regexp")
});

static ARRAY_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+").expect("could not compile the array indentation regexp")
});

/// The settings-dependent line matchers, compiled eagerly and passed by
/// reference into the reader. The section header and array indentation
/// matchers take no settings and are static.
#[derive(Debug)]
pub(crate) struct Grammar {
    pub(crate) comment: Regex,
    pub(crate) key: Regex,
    pub(crate) value: Regex,
}

impl Grammar {
    pub(crate) fn new(settings: &Settings) -> Grammar {
        let delimiters = settings
            .comment_characters
            .iter()
            .map(|c| regex::escape(c))
            .collect::<Vec<_>>()
            .join("|");
        let comment = format!(
            r"^(?P<delimiter>\s*(?:{})+\s*)(?P<comment>.*)$",
            delimiters
        );
        let key = format!(
            r"^(?P<key>.*?)(?P<separator>\s*{}\s*)",
            regex::escape(&settings.separator)
        );
        let value = if settings.multi_line.contains(MultiLineValues::QUOTE_DELIMITED) {
            r#"^(?P<quote1>")?(?P<value>[^"]+)(?P<quote2>")?\s*$"#
        } else {
            r"^(?P<value>.*)$"
        };

        Grammar {
            comment: Regex::new(&comment).expect("could not compile the comment regexp"),
            key: Regex::new(&key).expect("could not compile the key regexp"),
            value: Regex::new(value).expect("could not compile the value regexp"),
        }
    }

    pub(crate) fn section() -> &'static Regex {
        &SECTION_RE
    }

    pub(crate) fn array_start() -> &'static Regex {
        &ARRAY_START_RE
    }
}
