use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::warn;

use crate::detect;
use crate::error::{Error, ErrorKind, Result};
use crate::line::{KeyValue, Line, SectionId};
use crate::reader;
use crate::settings::{Grammar, MultiLineValues, Settings};
use crate::value::{self, BooleanConverter, NumberStyles, Value};

/// A parsed configuration document.
///
/// Lines live in one flat, append-only arena in document order; sections
/// hold header metadata only, and every line points back at its owning
/// section by index. Untouched lines reproduce byte for byte when the
/// document is serialized.
///
/// The typed getters deliberately materialize what they look for: reading a
/// missing key creates the section and the key holding the supplied default,
/// so a first read against an empty file writes out a usable template.
#[derive(Debug)]
pub struct Document {
    settings: Settings,
    lines: Vec<Line>,
    sections: Vec<crate::line::Section>,
    path: Option<PathBuf>,
}

impl Document {
    /// Creates an empty document.
    pub fn new(settings: Settings) -> Document {
        Document {
            settings,
            lines: Vec::new(),
            sections: Vec::new(),
            path: None,
        }
    }

    /// Parses configuration text.
    pub fn from_str(text: &str, settings: Settings) -> Result<Document> {
        Document::from_text(text, settings)
    }

    /// Reads and parses a whole stream, decoding it like a file.
    pub fn from_reader<R: Read>(mut input: R, settings: Settings) -> Result<Document> {
        let mut bytes = Vec::new();
        input
            .read_to_end(&mut bytes)
            .map_err(|e| Error::new(ErrorKind::Io, format!("read error: {}", e)))?;
        Document::from_bytes(&bytes, settings, None)
    }

    /// Loads a configuration file.
    ///
    /// A path that does not exist yields an empty document bound to it, so a
    /// config file can be built up by reads and saved. Otherwise the raw
    /// bytes are sniffed for an encoding (unless one is set) and the decoded
    /// text for its dominant line terminator; both are fixed in the settings
    /// before parsing starts.
    pub fn from_file(path: impl AsRef<Path>, settings: Settings) -> Result<Document> {
        let path = path.as_ref();
        if !path.exists() {
            let mut doc = Document::new(settings);
            doc.path = Some(path.to_path_buf());
            return Ok(doc);
        }
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        let mut doc = Document::from_bytes(&bytes, settings, Some(path))?;
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    fn from_bytes(bytes: &[u8], mut settings: Settings, path: Option<&Path>) -> Result<Document> {
        let file_name = path.map(|p| p.display().to_string());
        let encoding = match settings.encoding {
            Some(encoding) => encoding,
            None => detect::detect_encoding(bytes).ok_or_else(|| Error {
                kind: ErrorKind::EncodingUndetectable,
                msg: "unable to detect the text encoding; most likely a non-Latin ANSI code page"
                    .to_string(),
                line: None,
                file_name: file_name.clone(),
            })?,
        };
        settings.encoding = Some(encoding);
        let text = encoding.decode(bytes).map_err(|mut e| {
            e.file_name = file_name.clone();
            e
        })?;
        Document::from_text(&text, settings).map_err(|mut e| {
            e.file_name = file_name;
            e
        })
    }

    fn from_text(text: &str, mut settings: Settings) -> Result<Document> {
        if settings.newline.is_none() {
            settings.newline = detect::detect_newline(text).map(String::from);
        }
        let grammar = Grammar::new(&settings);
        let (lines, sections) = reader::read(text, &settings, &grammar)?;
        Ok(Document {
            settings,
            lines,
            sections,
            path: None,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The file this document was loaded from or last saved to.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ------------------------------------------------------------------
    // Read-only views. These never materialize anything and match names
    // case-insensitively.
    // ------------------------------------------------------------------

    /// The sections in document order.
    pub fn sections(&self) -> impl Iterator<Item = SectionRef<'_>> {
        (0..self.sections.len()).map(move |id| SectionRef { doc: self, id })
    }

    pub fn section(&self, name: &str) -> Option<SectionRef<'_>> {
        self.sections
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
            .map(|id| SectionRef { doc: self, id })
    }

    /// The raw stored value of a key, or `None` when the section or key is
    /// missing or the key is valueless.
    pub fn raw(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?.raw(key)
    }

    /// Every line of the document, rendered, in serialization order.
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for line in self.lines.iter().filter(|l| l.section.is_none()) {
            out.push(line.render(&self.settings));
        }
        for (id, section) in self.sections.iter().enumerate() {
            out.push(section.header());
            for line in self.lines.iter().filter(|l| l.section == Some(id)) {
                out.push(line.render(&self.settings));
            }
        }
        out
    }

    /// Accessor for keys living before the first section header.
    pub fn null_section(&mut self) -> NullSection<'_> {
        NullSection { doc: self }
    }

    // ------------------------------------------------------------------
    // Typed accessors. Lookups are case-sensitive; a missing section or
    // key is created holding the rendered default.
    // ------------------------------------------------------------------

    pub fn get_str(&mut self, section: &str, key: &str, default: &str) -> Result<String> {
        let (raw, _) = self.raw_or_create(section, key, Some(default))?;
        Ok(raw.unwrap_or_else(|| default.to_string()))
    }

    pub fn get_bool(&mut self, section: &str, key: &str, default: bool) -> Result<bool> {
        self.get_bool_impl(section, key, default, None)
    }

    /// Like [`get_bool`][Document::get_bool] with a one-off vocabulary tried
    /// before the configured one.
    pub fn get_bool_with(
        &mut self,
        section: &str,
        key: &str,
        default: bool,
        converter: &dyn BooleanConverter,
    ) -> Result<bool> {
        self.get_bool_impl(section, key, default, Some(converter))
    }

    fn get_bool_impl(
        &mut self,
        section: &str,
        key: &str,
        default: bool,
        converter: Option<&dyn BooleanConverter>,
    ) -> Result<bool> {
        let rendered = self.render_bool(default, converter);
        let (raw, created) = self.raw_or_create(section, key, Some(&rendered))?;
        let raw = match raw {
            Some(r) if !r.trim().is_empty() => r,
            _ => {
                if !created {
                    self.set_raw(section, key, rendered);
                }
                return Ok(default);
            }
        };

        if let Some(converter) = converter.or_else(|| self.settings.boolean_converter.as_deref()) {
            if let Some(b) = converter.parse(&raw) {
                return Ok(b);
            }
        }
        if let Some(b) = value::parse_bool_table(&raw) {
            return Ok(b);
        }
        let literal = raw.trim();
        if literal.eq_ignore_ascii_case("true") {
            return Ok(true);
        }
        if literal.eq_ignore_ascii_case("false") {
            return Ok(false);
        }
        self.recover(section, key, &raw, "a boolean", default)
    }

    pub fn get_i64(&mut self, section: &str, key: &str, default: i64) -> Result<i64> {
        self.get_i64_styled(section, key, default, NumberStyles::NUMBER)
    }

    pub fn get_i64_styled(
        &mut self,
        section: &str,
        key: &str,
        default: i64,
        styles: NumberStyles,
    ) -> Result<i64> {
        let (raw, created) = self.raw_or_create(section, key, Some(&default.to_string()))?;
        let raw = match raw {
            Some(r) if !r.trim().is_empty() => r,
            _ => {
                if !created {
                    self.set_raw(section, key, default.to_string());
                }
                return Ok(default);
            }
        };
        match value::parse_i64(&raw, styles | NumberStyles::NUMBER, &self.settings.culture) {
            Some(v) => Ok(v),
            None => self.recover(section, key, &raw, "an integer", default),
        }
    }

    pub fn get_f64(&mut self, section: &str, key: &str, default: f64) -> Result<f64> {
        self.get_f64_styled(section, key, default, NumberStyles::NONE)
    }

    pub fn get_f64_styled(
        &mut self,
        section: &str,
        key: &str,
        default: f64,
        styles: NumberStyles,
    ) -> Result<f64> {
        let rendered = value::render_f64(default, &self.settings.culture);
        let (raw, created) = self.raw_or_create(section, key, Some(&rendered))?;
        let raw = match raw {
            Some(r) if !r.trim().is_empty() => r,
            _ => {
                if !created {
                    self.set_raw(section, key, rendered);
                }
                return Ok(default);
            }
        };
        let styles = styles | NumberStyles::FLOAT | NumberStyles::ALLOW_THOUSANDS;
        match value::parse_f64(&raw, styles, &self.settings.culture) {
            Some(v) => Ok(v),
            None => self.recover(section, key, &raw, "a number", default),
        }
    }

    pub fn get_bytes(&mut self, section: &str, key: &str, default: &[u8]) -> Result<Vec<u8>> {
        let rendered = value::encode_bytes(default);
        let (raw, created) = self.raw_or_create(section, key, Some(&rendered))?;
        let raw = match raw {
            Some(r) if !r.trim().is_empty() => r,
            _ => {
                if !created {
                    self.set_raw(section, key, rendered);
                }
                return Ok(default.to_vec());
            }
        };
        match value::decode_bytes(raw.trim()) {
            Some(bytes) => Ok(bytes),
            None => self.recover(section, key, &raw, "a hex byte string", default.to_vec()),
        }
    }

    /// Reads a multi-line value as a string array.
    ///
    /// `Ok(None)` for a missing or empty value. Array values must start on
    /// the line after the key; a non-blank first line is
    /// [`MalformedArray`][ErrorKind::MalformedArray]. Elements are trimmed
    /// of tabs and spaces.
    pub fn get_array(&mut self, section: &str, key: &str) -> Result<Option<Vec<String>>> {
        let (raw, _) = self.raw_or_create(section, key, Some(""))?;
        let raw = match raw {
            Some(r) if !r.trim().is_empty() => r,
            _ => return Ok(None),
        };
        let parts = split_any_newline(&raw);
        if !parts[0].trim().is_empty() {
            return Err(Error::new(
                ErrorKind::MalformedArray,
                format!(
                    "array values must start on a new line; the key [{}] {} is malformed",
                    section, key
                ),
            ));
        }
        Ok(Some(
            parts
                .into_iter()
                .skip_while(|p| p.trim().is_empty())
                .filter(|p| !p.trim().is_empty())
                .map(|p| p.trim_matches(|c| c == '\t' || c == ' ').to_string())
                .collect(),
        ))
    }

    /// Whether the stored value spans multiple lines starting with a blank
    /// one, i.e. would read back through
    /// [`get_array`][Document::get_array].
    pub fn value_is_array(&self, section: &str, key: &str) -> bool {
        let raw = match self.raw_value(section, key) {
            Some(r) if !r.trim().is_empty() => r,
            _ => return false,
        };
        let parts = split_any_newline(raw);
        parts.len() >= 2 && parts[0].trim().is_empty()
    }

    /// Joins a multi-line value's elements with `separator`; a single-line
    /// value is returned as stored.
    pub fn join_multiline_value(
        &mut self,
        section: &str,
        key: &str,
        separator: &str,
    ) -> Result<Option<String>> {
        let (raw, _) = self.raw_or_create(section, key, Some(""))?;
        let raw = match raw {
            Some(r) if !r.trim().is_empty() => r,
            _ => return Ok(None),
        };
        let parts = split_any_newline(&raw);
        if parts.len() >= 2 && parts[0].trim().is_empty() {
            let elements: Vec<&str> = parts
                .iter()
                .map(|p| p.trim_matches(|c| c == '\t' || c == ' '))
                .filter(|p| !p.is_empty())
                .collect();
            Ok(Some(elements.join(separator)))
        } else {
            Ok(Some(raw))
        }
    }

    /// Stores a value, rendered according to its type.
    ///
    /// The first key with a matching name is updated in place, keeping its
    /// position and separator; later duplicates are left alone. A missing
    /// key is appended to the (possibly newly created) section.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<Value>) -> Result<()> {
        self.check_names(section, key)?;
        let rendered = match value.into() {
            Value::Str(s) => s,
            Value::Bool(b) => self.bool_text(section, key, b, None),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => value::render_f64(f, &self.settings.culture),
            Value::Bytes(b) => value::encode_bytes(&b),
            Value::StrArray(items) => self.render_array(&items),
        };
        self.set_raw(section, key, rendered);
        Ok(())
    }

    /// Stores a boolean rendered with a one-off vocabulary.
    pub fn set_bool_with(
        &mut self,
        section: &str,
        key: &str,
        value: bool,
        converter: &dyn BooleanConverter,
    ) -> Result<()> {
        self.check_names(section, key)?;
        let rendered = self.bool_text(section, key, value, Some(converter));
        self.set_raw(section, key, rendered);
        Ok(())
    }

    /// Saves to the document's path.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.write_to(path),
            None => Err(Error::new(
                ErrorKind::InvalidArgument,
                "the document has no file path; use save_as",
            )),
        }
    }

    /// Saves to `path` and remembers it for later [`save`][Document::save]
    /// calls. Missing parent directories are created; a failed write is
    /// fatal, with no rollback.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        self.write_to(&path)?;
        self.path = Some(path);
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(path, e))?;
            }
        }
        let encoding = self.settings.encoding.unwrap_or(detect::TextEncoding::Utf8);
        fs::write(path, encoding.encode(&self.to_string())).map_err(|e| Error::io(path, e))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn check_names(&self, section: &str, key: &str) -> Result<()> {
        if section.trim().is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "section name must be a non-empty string",
            ));
        }
        if key.trim().is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "key name must be a non-empty string",
            ));
        }
        Ok(())
    }

    fn section_id(&self, name: &str) -> Option<SectionId> {
        self.sections.iter().position(|s| s.name == name)
    }

    fn find_key_idx(&self, id: SectionId, key: &str) -> Option<usize> {
        let name = key.trim();
        self.lines.iter().position(|l| {
            l.section == Some(id)
                && l.as_key_value().map_or(false, |kv| kv.name() == name)
        })
    }

    fn raw_value(&self, section: &str, key: &str) -> Option<&str> {
        let id = self.section_id(section)?;
        let idx = self.find_key_idx(id, key)?;
        self.lines[idx].as_key_value()?.value()
    }

    /// The stored raw value for the key, creating the section and the key
    /// (holding `default`) when either is missing. The flag reports whether
    /// the key was created by this call.
    fn raw_or_create(
        &mut self,
        section: &str,
        key: &str,
        default: Option<&str>,
    ) -> Result<(Option<String>, bool)> {
        self.check_names(section, key)?;
        let id = match self.section_id(section) {
            Some(id) => id,
            None => self.create_section(section, true),
        };
        if let Some(idx) = self.find_key_idx(id, key) {
            let value = self.lines[idx].as_key_value().and_then(|kv| kv.value());
            return Ok((value.map(String::from), false));
        }
        self.push_key(id, key, default.map(String::from));
        Ok((None, true))
    }

    /// Appends a new section, optionally separating it from the previous
    /// one with a blank line, the way materializing reads lay out a
    /// document built from scratch.
    fn create_section(&mut self, name: &str, spacer: bool) -> SectionId {
        if spacer && !self.sections.is_empty() {
            let mut blank = Line::blank("", None);
            blank.section = Some(self.sections.len() - 1);
            self.lines.push(blank);
        }
        self.sections.push(crate::line::Section::synthesized(name));
        self.sections.len() - 1
    }

    fn push_key(&mut self, id: SectionId, key: &str, value: Option<String>) {
        let quoted = if self
            .settings
            .multi_line
            .contains(MultiLineValues::QUOTE_DELIMITED)
        {
            (true, true)
        } else {
            (false, false)
        };
        let mut line = Line::key_value(
            KeyValue {
                key: key.to_string(),
                separator: self.settings.separator.clone(),
                value,
                quoted,
            },
            None,
        );
        line.section = Some(id);
        self.lines.push(line);
    }

    fn set_raw(&mut self, section: &str, key: &str, value: String) {
        let id = match self.section_id(section) {
            Some(id) => id,
            None => self.create_section(section, false),
        };
        match self.find_key_idx(id, key) {
            Some(idx) => {
                if let Some(kv) = self.lines[idx].as_key_value_mut() {
                    kv.value = Some(value);
                }
            }
            None => self.push_key(id, key, Some(value)),
        }
    }

    /// Renders a boolean for writing: the vocabulary already stored at the
    /// key wins, then the converter, then the plain literal.
    fn bool_text(
        &self,
        section: &str,
        key: &str,
        value: bool,
        converter: Option<&dyn BooleanConverter>,
    ) -> String {
        if let Some(current) = self.raw_value(section, key) {
            let current = current.trim();
            for (yes, no) in &value::YES_NO_PAIRS {
                if current == *yes || current == *no {
                    let word = if value { *yes } else { *no };
                    return word.to_string();
                }
            }
        }
        self.render_bool(value, converter)
    }

    fn render_bool(&self, value: bool, converter: Option<&dyn BooleanConverter>) -> String {
        match converter.or_else(|| self.settings.boolean_converter.as_deref()) {
            Some(converter) => converter.render(value),
            None => (if value { "true" } else { "false" }).to_string(),
        }
    }

    fn render_array(&self, items: &[String]) -> String {
        let newline = self.settings.resolved_newline();
        let mut out = String::new();
        for item in items {
            out.push_str(newline);
            out.push_str("    ");
            out.push_str(item);
        }
        out
    }

    fn recover<T>(&self, section: &str, key: &str, raw: &str, wanted: &str, default: T) -> Result<T> {
        if self.settings.strict_coercion {
            return Err(Error::new(
                ErrorKind::Coercion,
                format!("[{}] {}: cannot read {:?} as {}", section, key, raw, wanted),
            ));
        }
        warn!(
            "[{}] {}: cannot read {:?} as {}, falling back to the default",
            section, key, raw, wanted
        );
        Ok(default)
    }
}

impl Default for Document {
    fn default() -> Document {
        Document::new(Settings::default())
    }
}

impl std::str::FromStr for Document {
    type Err = Error;

    fn from_str(text: &str) -> Result<Document> {
        Document::from_str(text, Settings::default())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let newline = self.settings.resolved_newline();
        for (i, line) in self.lines().iter().enumerate() {
            if i > 0 {
                f.write_str(newline)?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

/// A borrowed view of one section; lookups here are read-only and
/// case-insensitive.
#[derive(Clone, Copy)]
pub struct SectionRef<'a> {
    doc: &'a Document,
    id: SectionId,
}

impl<'a> SectionRef<'a> {
    pub fn name(&self) -> &'a str {
        &self.doc.sections[self.id].name
    }

    /// The header line as it serializes.
    pub fn header(&self) -> String {
        self.doc.sections[self.id].header()
    }

    /// The 1-based source line of the header, `None` for sections created
    /// through accessors.
    pub fn line_number(&self) -> Option<u32> {
        self.doc.sections[self.id].number
    }

    /// The raw value of a key, or `None` when absent or valueless.
    pub fn raw(&self, key: &str) -> Option<&'a str> {
        let name = key.trim();
        self.key_values()
            .find(|kv| kv.name().eq_ignore_ascii_case(name))
            .and_then(|kv| kv.value())
    }

    /// The trimmed key names, in document order.
    pub fn keys(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.key_values().map(|kv| kv.name())
    }

    /// The section's lines, excluding its header.
    pub fn lines(&self) -> impl Iterator<Item = &'a Line> + 'a {
        let id = self.id;
        self.doc.lines.iter().filter(move |l| l.section == Some(id))
    }

    fn key_values(&self) -> impl Iterator<Item = &'a KeyValue> + 'a {
        self.lines().filter_map(|l| l.as_key_value())
    }
}

/// Read-or-create access to the keys before the first section header, for
/// section-less formats.
pub struct NullSection<'a> {
    doc: &'a mut Document,
}

impl<'a> NullSection<'a> {
    /// The stored value of a header key; a missing key is appended to the
    /// header holding `default`.
    pub fn value(&mut self, key: &str, default: Option<&str>) -> Result<Option<String>> {
        if key.trim().is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "key name must be a non-empty string",
            ));
        }
        let name = key.trim();
        let found = self
            .doc
            .lines
            .iter()
            .filter(|l| l.section.is_none())
            .filter_map(|l| l.as_key_value())
            .find(|kv| kv.name() == name);
        if let Some(kv) = found {
            return Ok(kv.value().map(String::from));
        }
        let line = Line::key_value(
            KeyValue {
                key: key.to_string(),
                separator: self.doc.settings.separator.clone(),
                value: default.map(String::from),
                quoted: (false, false),
            },
            None,
        );
        self.doc.lines.push(line);
        Ok(default.map(String::from))
    }
}

/// Splits stored content on any of the three line terminators, the way the
/// array accessors slice a multi-line value.
fn split_any_newline(text: &str) -> Vec<&str> {
    text.split("\r\n")
        .flat_map(|part| part.split('\r'))
        .flat_map(|part| part.split('\n'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Culture, YesNoConverter};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn unix(settings: Settings) -> Settings {
        Settings {
            newline: Some("\n".to_string()),
            ..settings
        }
    }

    fn simple() -> Settings {
        unix(Settings {
            multi_line: MultiLineValues::SIMPLE,
            ..Settings::default()
        })
    }

    #[test]
    fn existing_value_is_updated_in_place() {
        init();
        let mut doc = Document::from_str("[Settings]\nRecno = chocolate", simple()).unwrap();
        doc.set("Settings", "Recno", "123").unwrap();
        assert_eq!(doc.to_string(), "[Settings]\nRecno = 123");
    }

    #[test]
    fn untouched_documents_round_trip() {
        init();
        let text = "# header comment\n\n  [Sections Can Be Indented] ; neat\n    purpose = formatting for readability\n\t\t\n    ; Did I mention we can indent comments, too?\n[Second]\nempty=\nfoo = bar";
        let doc = Document::from_str(text, simple()).unwrap();
        assert_eq!(doc.to_string(), text);

        // and parsing the output again changes nothing
        let again = Document::from_str(&doc.to_string(), simple()).unwrap();
        assert_eq!(again.to_string(), text);
    }

    #[test]
    fn crlf_documents_round_trip_via_detection() {
        init();
        let text = "[Settings]\r\nRecno = chocolate\r\nother = 1";
        let doc = Document::from_str(text, Settings::default()).unwrap();
        assert_eq!(doc.settings().resolved_newline(), "\r\n");
        assert_eq!(doc.to_string(), text);
    }

    #[test]
    fn reads_materialize_their_defaults() {
        init();
        let mut doc = Document::from_str("", unix(Settings::default())).unwrap();
        assert_eq!(doc.get_str("S", "k", "v").unwrap(), "v");
        assert_eq!(doc.raw("S", "k"), Some("v"));
        assert_eq!(doc.to_string(), "[S]\nk=v");

        // a second section is separated by a blank spacer line
        assert_eq!(doc.get_i64("T", "n", 7).unwrap(), 7);
        assert_eq!(doc.to_string(), "[S]\nk=v\n\n[T]\nn=7");
    }

    #[test]
    fn blank_names_are_rejected() {
        init();
        let mut doc = Document::default();
        let err = doc.get_str("  ", "k", "v").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = doc.set("S", "", "v").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn boolean_fallback_chain() {
        init();
        let text = "[Simple]\nswitch = on\nmode = Disabled\nnumeric = 1\ntext = True\nempty =";
        let mut doc = Document::from_str(text, unix(Settings::default())).unwrap();
        assert_eq!(doc.get_bool("Simple", "switch", false).unwrap(), true);
        assert_eq!(doc.get_bool("Simple", "mode", true).unwrap(), false);
        assert_eq!(doc.get_bool("Simple", "numeric", false).unwrap(), true);
        assert_eq!(doc.get_bool("Simple", "text", false).unwrap(), true);
        // an empty value is replaced by the default
        assert_eq!(doc.get_bool("Simple", "empty", false).unwrap(), false);
        assert_eq!(doc.raw("Simple", "empty"), Some("false"));
    }

    #[test]
    fn configured_and_one_off_converters() {
        init();
        let settings = unix(Settings {
            boolean_converter: Some(Box::new(YesNoConverter::new("vero", "falso"))),
            ..Settings::default()
        });
        let text = "[ValoriItaliani]\npositivo = vero\nsampleOff = falso";
        let mut doc = Document::from_str(text, settings).unwrap();
        assert_eq!(doc.get_bool("ValoriItaliani", "positivo", false).unwrap(), true);
        assert_eq!(doc.get_bool("ValoriItaliani", "sampleOff", true).unwrap(), false);

        let mut doc =
            Document::from_str("[YesNo]\nsampleYes=Yes\nsampleNo=no", unix(Settings::default()))
                .unwrap();
        let converter = YesNoConverter::default();
        assert_eq!(doc.get_bool_with("YesNo", "sampleYes", false, &converter).unwrap(), true);
        assert_eq!(doc.get_bool_with("YesNo", "sampleNo", true, &converter).unwrap(), false);
    }

    #[test]
    fn set_preserves_the_stored_vocabulary() {
        init();
        let mut doc =
            Document::from_str("[YesNo]\nflag=yes", unix(Settings::default())).unwrap();
        doc.set("YesNo", "flag", false).unwrap();
        assert_eq!(doc.raw("YesNo", "flag"), Some("no"));
        doc.set("YesNo", "flag", true).unwrap();
        assert_eq!(doc.raw("YesNo", "flag"), Some("yes"));

        // no vocabulary stored: plain literals
        doc.set("YesNo", "fresh", true).unwrap();
        assert_eq!(doc.raw("YesNo", "fresh"), Some("true"));

        // one-off converter
        doc.set_bool_with("YesNo", "custom", false, &YesNoConverter::new("1", "0"))
            .unwrap();
        assert_eq!(doc.raw("YesNo", "custom"), Some("0"));
    }

    #[test]
    fn numbers_follow_the_culture() {
        init();
        let text = "[Works]\nempty =\ninteger=1\nusual=0.000001\nwithD=0.6D\nengineeringNotation = 1.7E+3\nfloat = 4.5f\nthousands=1,000\ndollars=$2,999\n[DoesntWork]\nrandom = sdgfery56d";
        let mut doc = Document::from_str(text, unix(Settings::default())).unwrap();
        assert_eq!(doc.get_f64("Works", "empty", 0.0).unwrap(), 0.0);
        assert_eq!(doc.get_f64("Works", "integer", 0.0).unwrap(), 1.0);
        assert_eq!(doc.get_f64("Works", "usual", 0.0).unwrap(), 1e-6);
        assert_eq!(doc.get_f64("Works", "withD", 0.0).unwrap(), 0.6);
        assert_eq!(doc.get_f64("Works", "engineeringNotation", 0.0).unwrap(), 1700.0);
        assert_eq!(doc.get_f64("Works", "float", 0.0).unwrap(), 4.5);
        assert_eq!(doc.get_f64("Works", "thousands", 0.0).unwrap(), 1000.0);
        assert_eq!(
            doc.get_f64_styled("Works", "dollars", 0.0, NumberStyles::ALLOW_CURRENCY_SYMBOL)
                .unwrap(),
            2999.0
        );
        // recovered with the default unless strict
        assert_eq!(doc.get_f64("DoesntWork", "random", 0.0).unwrap(), 0.0);
    }

    #[test]
    fn decimal_comma_needs_a_matching_culture() {
        init();
        let text = "[ItalianLocalized]\nwithComa = 9,3";
        let italian = Culture {
            decimal_separator: ',',
            group_separator: '.',
            ..Culture::default()
        };
        let mut doc = Document::from_str(
            text,
            unix(Settings {
                culture: italian,
                ..Settings::default()
            }),
        )
        .unwrap();
        assert_eq!(doc.get_f64("ItalianLocalized", "withComa", 0.0).unwrap(), 9.3);

        // under the invariant culture the same text recovers with the default
        let mut doc = Document::from_str(text, unix(Settings::default())).unwrap();
        assert_eq!(doc.get_f64("ItalianLocalized", "withComa", 0.0).unwrap(), 0.0);

        // and errors in strict mode
        let mut doc = Document::from_str(
            text,
            unix(Settings {
                strict_coercion: true,
                ..Settings::default()
            }),
        )
        .unwrap();
        let err = doc.get_f64("ItalianLocalized", "withComa", 0.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Coercion);
    }

    #[test]
    fn custom_group_separator_for_integers() {
        init();
        let settings = unix(Settings {
            culture: Culture {
                group_separator: '_',
                ..Culture::default()
            },
            ..Settings::default()
        });
        let text = "[FormatNumber]\ntest.int = 1_234_567\ntest.int2 = 1_000\ndouble = 991_228_224_617.445";
        let mut doc = Document::from_str(text, settings).unwrap();
        assert_eq!(doc.get_i64("FormatNumber", "test.int", 0).unwrap(), 1234567);
        assert_eq!(doc.get_i64("FormatNumber", "test.int2", 0).unwrap(), 1000);
        assert_eq!(
            doc.get_f64("FormatNumber", "double", 0.0).unwrap(),
            991228224617.445
        );
    }

    #[test]
    fn byte_arrays_are_contiguous_hex() {
        init();
        let mut doc = Document::from_str("", unix(Settings::default())).unwrap();
        doc.set("Blob", "data", vec![0xde, 0xad, 0x00, 0x0f]).unwrap();
        assert_eq!(doc.raw("Blob", "data"), Some("dead000f"));
        assert_eq!(
            doc.get_bytes("Blob", "data", &[]).unwrap(),
            vec![0xde, 0xad, 0x00, 0x0f]
        );

        // malformed hex recovers with the default
        let mut doc = Document::from_str("[Blob]\nbad = zz", unix(Settings::default())).unwrap();
        assert_eq!(doc.get_bytes("Blob", "bad", &[1, 2]).unwrap(), vec![1, 2]);
    }

    #[test]
    fn arrays_parse_trim_and_reject() {
        init();
        let settings = unix(Settings {
            multi_line: MultiLineValues::SIMPLE | MultiLineValues::QUOTE_DELIMITED,
            ..Settings::default()
        });
        let text = "[Advanced]\nSelect =\n     select * from\n     from table\n     where ID = '5'";
        let mut doc = Document::from_str(text, settings).unwrap();
        assert!(doc.value_is_array("Advanced", "Select"));
        assert_eq!(
            doc.get_array("Advanced", "Select").unwrap().unwrap(),
            vec!["select * from", "from table", "where ID = '5'"]
        );
        assert_eq!(
            doc.join_multiline_value("Advanced", "Select", " ").unwrap().unwrap(),
            "select * from from table where ID = '5'"
        );

        // a value on the key's own line is not an array
        let mut doc =
            Document::from_str("[A]\nplain = x\ny = a\n    b", simple()).unwrap();
        assert!(!doc.value_is_array("A", "plain"));
        assert_eq!(
            doc.join_multiline_value("A", "plain", ", ").unwrap().unwrap(),
            "x"
        );
        let err = doc.get_array("A", "y").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedArray);
    }

    #[test]
    fn array_set_and_get_are_inverses() {
        init();
        let mut doc = Document::from_str("", simple()).unwrap();
        doc.set("Paths", "exclude", vec!["^/var/".to_string(), "^/tmp/".to_string()])
            .unwrap();
        assert_eq!(doc.to_string(), "[Paths]\nexclude=\n    ^/var/\n    ^/tmp/");
        assert!(doc.value_is_array("Paths", "exclude"));
        assert_eq!(
            doc.get_array("Paths", "exclude").unwrap().unwrap(),
            vec!["^/var/", "^/tmp/"]
        );
    }

    #[test]
    fn multi_line_rejection_names_the_line() {
        init();
        let text = "[Advanced]\nSelect =\n     select * from";
        let err = Document::from_str(text, unix(Settings::default())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MultiLineNotAllowed);
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn duplicate_keys_resolve_to_the_first() {
        init();
        let mut doc =
            Document::from_str("[A]\nfoo=1\nfoo=2", unix(Settings::default())).unwrap();
        assert_eq!(doc.raw("A", "foo"), Some("1"));
        doc.set("A", "foo", 3).unwrap();
        assert_eq!(doc.to_string(), "[A]\nfoo=3\nfoo=2");
        assert_eq!(doc.get_i64("A", "foo", 0).unwrap(), 3);
    }

    #[test]
    fn document_built_from_scratch() {
        init();
        let mut doc = Document::new(unix(Settings::default()));
        doc.get_str("section1", "string", "value").unwrap();
        doc.get_bool("section2", "bool", true).unwrap();
        doc.set("section2", "bool", false).unwrap();
        doc.set("section2", "bool", true).unwrap();
        doc.get_f64("section3", "doble", 0.2).unwrap();
        assert_eq!(
            doc.to_string(),
            "[section1]\nstring=value\n\n[section2]\nbool=true\n\n[section3]\ndoble=0.2"
        );
    }

    #[test]
    fn quote_delimited_writes_are_quoted() {
        init();
        let settings = unix(Settings {
            multi_line: MultiLineValues::QUOTE_DELIMITED,
            separator: " = ".to_string(),
            ..Settings::default()
        });
        let mut doc = Document::new(settings);
        doc.set("Temp", "name", "Windows").unwrap();
        doc.set("Temp", "name.company", "Microsoft \u{a9}").unwrap();
        assert_eq!(
            doc.to_string(),
            "[Temp]\nname = \"Windows\"\nname.company = \"Microsoft ©\""
        );

        // and the output reads back to the same values
        let again = Document::from_str(
            &doc.to_string(),
            unix(Settings {
                multi_line: MultiLineValues::QUOTE_DELIMITED,
                separator: " = ".to_string(),
                ..Settings::default()
            }),
        )
        .unwrap();
        assert_eq!(again.raw("Temp", "name"), Some("Windows"));
    }

    #[test]
    fn indexer_is_read_only_and_case_insensitive() {
        init();
        let text = "[Sections Can Be Indented]\ncan_values_be_as_well = True";
        let doc = Document::from_str(text, unix(Settings::default())).unwrap();
        assert_eq!(
            doc.raw("sections can be indented", "CAN_VALUES_BE_AS_WELL"),
            Some("True")
        );
        assert_eq!(doc.raw("Nope", "can_values_be_as_well"), None);
        // nothing was materialized by the lookups
        assert_eq!(doc.to_string(), text);
    }

    #[test]
    fn null_section_serves_section_less_files() {
        init();
        let settings = unix(Settings {
            multi_line: MultiLineValues::ALLOW_VALUELESS_KEYS
                | MultiLineValues::ALLOW_EMPTY_TOP_SECTION,
            separator: " ".to_string(),
            ..Settings::default()
        });
        let text = "# Redis configuration\nclient-output-buffer-limit normal 0 0 0\nappendonly";
        let mut doc = Document::from_str(text, settings).unwrap();
        assert_eq!(
            doc.null_section()
                .value("client-output-buffer-limit", None)
                .unwrap()
                .as_deref(),
            Some("normal 0 0 0")
        );
        assert_eq!(doc.null_section().value("appendonly", None).unwrap(), None);
        assert_eq!(
            doc.null_section().value("maxmemory", Some("2mb")).unwrap().as_deref(),
            Some("2mb")
        );
        assert_eq!(doc.to_string(), format!("{}\nmaxmemory 2mb", text));
        assert!(doc.to_string().ends_with("maxmemory 2mb"));
    }

    #[test]
    fn valueless_keys_round_trip() {
        init();
        let settings = unix(Settings {
            multi_line: MultiLineValues::ALLOW_VALUELESS_KEYS,
            ..Settings::default()
        });
        let text = "[flags]\ndaemonize\nloglevel=debug";
        let doc = Document::from_str(text, settings).unwrap();
        assert_eq!(doc.to_string(), text);
        let section = doc.section("flags").unwrap();
        assert_eq!(section.raw("daemonize"), None);
        assert_eq!(section.raw("loglevel"), Some("debug"));
        assert_eq!(section.keys().collect::<Vec<_>>(), vec!["daemonize", "loglevel"]);
    }

    #[test]
    fn lines_view_covers_the_whole_document() {
        init();
        let text = "# top\n\n[A]\nfoo = 1";
        let doc = Document::from_str(text, unix(Settings::default())).unwrap();
        assert_eq!(doc.lines(), vec!["# top", "", "[A]", "foo = 1"]);
        let sections: Vec<&str> = doc.sections().map(|s| s.name()).collect();
        assert_eq!(sections, vec!["A"]);
    }

    #[test]
    fn save_and_reload() {
        init();
        let dir = std::env::temp_dir().join(format!("lineconf-test-{}", std::process::id()));
        let path = dir.join("nested").join("config.conf");

        let mut doc = Document::from_file(&path, unix(Settings::default())).unwrap();
        assert_eq!(doc.to_string(), "");
        doc.get_str("settings", "api_key", "").unwrap();
        doc.get_bool("settings", "debug", false).unwrap();
        doc.set("settings", "api_key", "00000000-0000-0000-0000-000000000000")
            .unwrap();
        doc.set("settings", "debug", true).unwrap();
        doc.save().unwrap();

        let reloaded = Document::from_file(&path, Settings::default()).unwrap();
        assert_eq!(
            reloaded.to_string(),
            "[settings]\napi_key=00000000-0000-0000-0000-000000000000\ndebug=true"
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn save_without_a_path_is_an_error() {
        init();
        let doc = Document::default();
        let err = doc.save().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn utf16_files_round_trip_through_detection() {
        init();
        let dir = std::env::temp_dir().join(format!("lineconf-utf16-{}", std::process::id()));
        let path = dir.join("localized.ini");

        let mut doc = Document::from_str(
            "[Тест]\nКлюч=Значение",
            unix(Settings {
                encoding: Some(detect::TextEncoding::Utf16Le),
                ..Settings::default()
            }),
        )
        .unwrap();
        doc.save_as(&path).unwrap();

        let reloaded = Document::from_file(&path, Settings::default()).unwrap();
        assert_eq!(reloaded.settings().encoding, Some(detect::TextEncoding::Utf16Le));
        assert_eq!(reloaded.raw("Тест", "Ключ"), Some("Значение"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn undetectable_encodings_are_refused() {
        init();
        // Windows-1251 bytes without a BOM
        let bytes: &[u8] = b"[\xd2\xe5\xf1\xf2]\n\xca\xeb\xfe\xf7=1";
        let err = Document::from_reader(bytes, Settings::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingUndetectable);

        // with an explicit encoding the same bytes parse
        let doc = Document::from_reader(
            bytes,
            Settings {
                encoding: Some(detect::TextEncoding::Latin1),
                ..Settings::default()
            },
        )
        .unwrap();
        assert_eq!(doc.sections().count(), 1);
    }

    #[test]
    fn settings_deserialize_from_json() {
        init();
        let settings: Settings = serde_json::from_str(
            r##"{
                "multi_line": 6,
                "separator": ":",
                "comment_characters": ["#"],
                "culture": { "decimal_separator": ",", "group_separator": "." }
            }"##,
        )
        .unwrap();
        assert!(settings.multi_line.contains(MultiLineValues::SIMPLE));
        assert!(settings.multi_line.contains(MultiLineValues::QUOTE_DELIMITED));
        assert_eq!(settings.separator, ":");
        assert_eq!(settings.culture.decimal_separator, ',');
        assert_eq!(settings.newline, None);
    }
}
