use log::debug;
use regex::Captures;

use crate::error::{Error, ErrorKind, Result};
use crate::line::{KeyValue, Line, Section, SectionId};
use crate::settings::{Grammar, MultiLineValues, Settings};

/// Splits text into physical lines on `\r\n`, `\n` or `\r`, swallowing a
/// trailing terminator the way a line reader does.
pub(crate) fn physical_lines(text: &str) -> PhysicalLines<'_> {
    PhysicalLines { rest: Some(text) }
}

pub(crate) struct PhysicalLines<'t> {
    rest: Option<&'t str>,
}

impl<'t> Iterator for PhysicalLines<'t> {
    type Item = &'t str;

    fn next(&mut self) -> Option<&'t str> {
        let rest = self.rest?;
        match rest.find(|c| c == '\r' || c == '\n') {
            Some(i) => {
                let skip = if rest[i..].starts_with("\r\n") { 2 } else { 1 };
                self.rest = Some(&rest[i + skip..]);
                Some(&rest[..i])
            }
            None => {
                self.rest = None;
                if rest.is_empty() {
                    None
                } else {
                    Some(rest)
                }
            }
        }
    }
}

/// Classifies raw text line by line and builds the line model.
///
/// State carried across lines: the currently open section, and the most
/// recently opened line (`pending`), which is committed as soon as the next
/// line proves it complete. Keeping the last line open is what lets a
/// continuation line extend it.
pub(crate) struct Reader<'a> {
    settings: &'a Settings,
    grammar: &'a Grammar,
    lines: Vec<Line>,
    sections: Vec<Section>,
    current_section: Option<SectionId>,
    pending: Option<Line>,
}

pub(crate) fn read(
    text: &str,
    settings: &Settings,
    grammar: &Grammar,
) -> Result<(Vec<Line>, Vec<Section>)> {
    Reader {
        settings,
        grammar,
        lines: Vec::new(),
        sections: Vec::new(),
        current_section: None,
        pending: None,
    }
    .run(text)
}

impl<'a> Reader<'a> {
    fn run(mut self, text: &str) -> Result<(Vec<Line>, Vec<Section>)> {
        let mut number: u32 = 0;
        for raw in physical_lines(text) {
            number += 1;
            if raw.trim().is_empty() {
                self.commit_pending()?;
                self.pending = Some(Line::blank(raw, Some(number)));
            } else if let Some(caps) = Grammar::section().captures(raw) {
                self.read_section(&caps, number)?;
            } else if let Some(caps) = self.grammar.comment.captures(raw) {
                self.commit_pending()?;
                self.pending = Some(Line::comment(
                    &caps["delimiter"],
                    &caps["comment"],
                    Some(number),
                ));
            } else if let Some(caps) = self.grammar.key.captures(raw) {
                if self.is_array_continuation(raw) {
                    debug!("line {}: array continuation", number);
                    self.append_value(raw, number)?;
                } else {
                    self.read_key_value(&caps, raw, number)?;
                }
            } else if self.grammar.value.is_match(raw) {
                if self.reads_as_valueless_key(raw) {
                    debug!("line {}: valueless key", number);
                    self.commit_pending()?;
                    self.pending = Some(Line::key_value(
                        KeyValue {
                            key: raw.to_string(),
                            separator: self.settings.separator.clone(),
                            value: None,
                            quoted: (false, false),
                        },
                        Some(number),
                    ));
                } else {
                    self.append_value(raw, number)?;
                }
            } else {
                return Err(Error::at(
                    ErrorKind::UnknownLineKind,
                    format!("unrecognized line {:?}", raw),
                    number,
                ));
            }
        }
        self.commit_pending()?;
        Ok((self.lines, self.sections))
    }

    fn read_section(&mut self, caps: &Captures, number: u32) -> Result<()> {
        self.commit_pending()?;

        let name = &caps["name"];
        if self.sections.iter().any(|s| s.name == name) {
            return Err(Error::at(
                ErrorKind::DuplicateSection,
                format!("section [{}] is declared more than once", name),
                number,
            ));
        }
        debug!("line {}: section [{}]", number, name);
        self.sections.push(Section::new(
            name,
            Some(number),
            &caps["indentation"],
            &caps["comment"],
        ));
        self.current_section = Some(self.sections.len() - 1);
        Ok(())
    }

    fn read_key_value(&mut self, caps: &Captures, raw: &str, number: u32) -> Result<()> {
        self.commit_pending()?;
        let key = &caps["key"];
        let separator = &caps["separator"];
        let (value, quoted) = self.capture_value(&raw[caps[0].len()..]);
        debug!("line {}: key {:?}", number, key.trim());
        self.pending = Some(Line::key_value(
            KeyValue {
                key: key.to_string(),
                separator: separator.to_string(),
                value: Some(value),
                quoted,
            },
            Some(number),
        ));
        Ok(())
    }

    /// Runs the value matcher over `text`, stripping and recording the
    /// delimiting quotes. A remainder the matcher refuses (e.g. an empty
    /// string under the quote-delimited policy) is kept verbatim.
    fn capture_value(&self, text: &str) -> (String, (bool, bool)) {
        match self.grammar.value.captures(text) {
            Some(caps) => {
                let value = caps.name("value").map(|m| m.as_str()).unwrap_or("");
                let quoted = (caps.name("quote1").is_some(), caps.name("quote2").is_some());
                (value.to_string(), quoted)
            }
            None => (text.to_string(), (false, false)),
        }
    }

    /// Appends a continuation line to the open key/value.
    fn append_value(&mut self, raw: &str, number: u32) -> Result<()> {
        if !self.settings.multi_line.multi_line_allowed() {
            return Err(Error::at(
                ErrorKind::MultiLineNotAllowed,
                "multi-line values are disallowed by the parser settings",
                number,
            ));
        }

        let newline = self.settings.resolved_newline().to_string();
        let (value, quoted) = self.capture_value(raw);
        let kv = match self.pending.as_mut().and_then(|l| l.as_key_value_mut()) {
            Some(kv) => kv,
            None => {
                return Err(Error::at(
                    ErrorKind::UnknownLineKind,
                    "continuation line without a preceding key",
                    number,
                ))
            }
        };
        let mut content = kv.value.take().unwrap_or_default();
        content.push_str(&newline);
        content.push_str(&value);
        kv.value = Some(content);
        kv.quoted.1 = quoted.1;
        Ok(())
    }

    /// Whether a line matching the key pattern is really the next element of
    /// an open multi-line array: the accumulated content is array-shaped and
    /// the line's indentation equals the first element's. This is what keeps
    /// `where ID = '5'` inside the array instead of becoming a key.
    fn is_array_continuation(&self, raw: &str) -> bool {
        if !self.settings.multi_line.contains(MultiLineValues::SIMPLE) {
            return false;
        }
        let indent = match Grammar::array_start().find(raw) {
            Some(m) => m.as_str(),
            None => return false,
        };
        match self.open_key_content() {
            Some(content) => self.array_indentation(content) == Some(indent),
            None => false,
        }
    }

    /// Whether a value-only line is a fresh valueless key rather than a
    /// continuation of the open key.
    fn reads_as_valueless_key(&self, raw: &str) -> bool {
        if !self
            .settings
            .multi_line
            .contains(MultiLineValues::ALLOW_VALUELESS_KEYS)
        {
            return false;
        }
        !self.is_simple_continuation(raw)
    }

    fn is_simple_continuation(&self, raw: &str) -> bool {
        if !self.settings.multi_line.contains(MultiLineValues::SIMPLE) {
            return false;
        }
        let indent = match Grammar::array_start().find(raw) {
            Some(m) => m.as_str(),
            None => return false,
        };
        let content = match self.open_key_content() {
            Some(content) => content,
            None => return false,
        };
        if content.is_empty() {
            // the array is about to start on this line
            return true;
        }
        match self.array_indentation(content) {
            Some(element_indent) => element_indent == indent,
            // plain multi-line value, not an array
            None => true,
        }
    }

    /// The accumulated content of the open key/value, if the pending line is
    /// one and is not valueless.
    fn open_key_content(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .and_then(|l| l.as_key_value())
            .and_then(|kv| kv.value())
    }

    /// For array-shaped content (blank first physical line), the indentation
    /// of the first element.
    fn array_indentation<'c>(&self, content: &'c str) -> Option<&'c str> {
        let mut parts = content.split(self.settings.resolved_newline());
        if !parts.next()?.trim().is_empty() {
            return None;
        }
        let first_element = parts.next()?;
        Grammar::array_start()
            .find(first_element)
            .map(|m| m.as_str())
    }

    /// Flushes the open line into its section, or into the document header
    /// when no section is open yet.
    fn commit_pending(&mut self) -> Result<()> {
        let mut line = match self.pending.take() {
            Some(line) => line,
            None => return Ok(()),
        };
        if self.current_section.is_none()
            && line.as_key_value().is_some()
            && !self
                .settings
                .multi_line
                .contains(MultiLineValues::ALLOW_EMPTY_TOP_SECTION)
        {
            return Err(Error {
                kind: ErrorKind::OrphanKeyValue,
                msg: "key/value pair without a preceding section header".to_string(),
                line: line.number,
                file_name: None,
            });
        }
        line.section = self.current_section;
        self.lines.push(line);
        Ok(())
    }
}
