use crate::settings::{MultiLineValues, Settings};

pub(crate) type SectionId = usize;

/// A named group of lines introduced by a `[name]` header.
///
/// Only header metadata lives here; the section's lines are held by the
/// document's flat line arena and point back at the section by index.
#[derive(Debug, Clone)]
pub struct Section {
    pub(crate) name: String,
    pub(crate) indentation: String,
    pub(crate) comment: String,
    pub(crate) number: Option<u32>,
}

impl Section {
    pub(crate) fn new(
        name: impl Into<String>,
        number: Option<u32>,
        indentation: impl Into<String>,
        comment: impl Into<String>,
    ) -> Section {
        Section {
            name: name.into(),
            indentation: indentation.into(),
            comment: comment.into(),
            number,
        }
    }

    pub(crate) fn synthesized(name: impl Into<String>) -> Section {
        Section::new(name, None, "", "")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The 1-based source line of the `[name]` header, if the section was
    /// parsed rather than created through an accessor.
    pub fn line_number(&self) -> Option<u32> {
        self.number
    }

    /// The header line as it serializes.
    pub fn header(&self) -> String {
        format!("{}[{}]{}", self.indentation, self.name, self.comment)
    }
}

/// A key/value line.
///
/// `key` is kept exactly as matched (it may carry leading indentation);
/// lookups always go through the trimmed [`name`][KeyValue::name]. A `None`
/// value is a valueless key. `quoted` records which of the two delimiting
/// quotes the source carried, so quote-delimited documents reproduce.
#[derive(Debug, Clone)]
pub struct KeyValue {
    pub(crate) key: String,
    pub(crate) separator: String,
    pub(crate) value: Option<String>,
    pub(crate) quoted: (bool, bool),
}

impl KeyValue {
    /// The trimmed key name used for lookups.
    pub fn name(&self) -> &str {
        self.key.trim()
    }

    /// The exact separator text, including any whitespace padding.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// The raw value; `None` for a valueless key.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

#[derive(Debug, Clone)]
pub enum LineKind {
    /// An empty or whitespace-only line, kept verbatim.
    Blank { raw: String },
    /// A comment; `delimiter` includes the surrounding whitespace so that
    /// `delimiter + text` reproduces the source line.
    Comment { delimiter: String, text: String },
    KeyValue(KeyValue),
}

/// One physical line of the document.
#[derive(Debug, Clone)]
pub struct Line {
    pub(crate) number: Option<u32>,
    pub(crate) section: Option<SectionId>,
    pub(crate) kind: LineKind,
}

impl Line {
    pub(crate) fn blank(raw: impl Into<String>, number: Option<u32>) -> Line {
        Line {
            number,
            section: None,
            kind: LineKind::Blank { raw: raw.into() },
        }
    }

    pub(crate) fn comment(
        delimiter: impl Into<String>,
        text: impl Into<String>,
        number: Option<u32>,
    ) -> Line {
        Line {
            number,
            section: None,
            kind: LineKind::Comment {
                delimiter: delimiter.into(),
                text: text.into(),
            },
        }
    }

    pub(crate) fn key_value(kv: KeyValue, number: Option<u32>) -> Line {
        Line {
            number,
            section: None,
            kind: LineKind::KeyValue(kv),
        }
    }

    /// The 1-based source line; `None` for lines created through accessors.
    pub fn number(&self) -> Option<u32> {
        self.number
    }

    pub fn kind(&self) -> &LineKind {
        &self.kind
    }

    pub fn as_key_value(&self) -> Option<&KeyValue> {
        match &self.kind {
            LineKind::KeyValue(kv) => Some(kv),
            _ => None,
        }
    }

    pub(crate) fn as_key_value_mut(&mut self) -> Option<&mut KeyValue> {
        match &mut self.kind {
            LineKind::KeyValue(kv) => Some(kv),
            _ => None,
        }
    }

    /// The line's textual form under the given settings.
    pub fn render(&self, settings: &Settings) -> String {
        match &self.kind {
            LineKind::Blank { raw } => raw.clone(),
            LineKind::Comment { delimiter, text } => format!("{}{}", delimiter, text),
            LineKind::KeyValue(kv) => {
                if kv.value.is_none()
                    && settings
                        .multi_line
                        .contains(MultiLineValues::ALLOW_VALUELESS_KEYS)
                {
                    return kv.key.clone();
                }
                let content = kv.value.as_deref().unwrap_or("");
                format!(
                    "{}{}{}{}{}",
                    kv.key,
                    kv.separator,
                    if kv.quoted.0 { "\"" } else { "" },
                    content,
                    if kv.quoted.1 { "\"" } else { "" },
                )
            }
        }
    }
}
