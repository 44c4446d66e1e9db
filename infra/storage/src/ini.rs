//! Minimal INI document model.
//!
//! Keeps sections and keys in file order so that a read-modify-write cycle
//! only touches what changed. Supported syntax: `[SECTION]` headers,
//! `key = value` or `key: value` pairs, indented continuation lines, and
//! `#`/`;` comment lines. Comments are not preserved on write.

use crate::error::StorageError;
use std::borrow::Cow;
use std::fmt::Write as _;

/// Name of the section merged beneath every other section.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// One `[name]` block with its entries in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: Vec::new() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Replaces an existing value in place or appends a new entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    defaults: Section,
    sections: Vec<Section>,
}

impl IniDocument {
    #[must_use]
    pub fn new() -> Self {
        Self { defaults: Section::new(DEFAULT_SECTION), sections: Vec::new() }
    }

    /// Parses `text`; `origin` names the file in error messages.
    ///
    /// Repeated section headers are merged into the first occurrence and later
    /// duplicate keys win.
    ///
    /// # Errors
    /// Returns [`StorageError::Parse`] for entries outside a section, empty keys
    /// and unterminated headers.
    pub fn parse(text: &str, origin: &str) -> Result<Self, StorageError> {
        let mut doc = Self::new();
        let mut current: Option<String> = None;
        let mut last_key: Option<String> = None;

        let parse_error = |line: usize, message: &'static str| StorageError::Parse {
            file: Cow::Owned(origin.to_owned()),
            line,
            message: message.into(),
            context: None,
        };

        for (index, raw) in text.lines().enumerate() {
            let number = index + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if raw.starts_with([' ', '\t']) {
                if let (Some(section), Some(key)) = (&current, &last_key) {
                    let section = doc.section_mut(section);
                    let joined = section.get(key).map_or_else(
                        || trimmed.to_owned(),
                        |prev| if prev.is_empty() { trimmed.to_owned() } else { format!("{prev}\n{trimmed}") },
                    );
                    section.set(key.clone(), joined);
                    continue;
                }
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| parse_error(number, "malformed section header"))?;
                doc.section_mut(name);
                current = Some(name.to_owned());
                last_key = None;
                continue;
            }

            let Some(section) = &current else {
                return Err(parse_error(number, "entry outside of a section"));
            };

            let (key, value) = trimmed
                .split_once(['=', ':'])
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or_else(|| parse_error(number, "expected `key = value`"))?;
            if key.is_empty() {
                return Err(parse_error(number, "empty key"));
            }

            doc.section_mut(section).set(key, value);
            last_key = Some(key.to_owned());
        }

        Ok(doc)
    }

    #[must_use]
    pub const fn defaults(&self) -> &Section {
        &self.defaults
    }

    pub const fn defaults_mut(&mut self) -> &mut Section {
        &mut self.defaults
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        if name == DEFAULT_SECTION {
            return Some(&self.defaults);
        }
        self.sections.iter().find(|s| s.name == name)
    }

    #[must_use]
    pub fn has_section(&self, name: &str) -> bool {
        name == DEFAULT_SECTION || self.sections.iter().any(|s| s.name == name)
    }

    /// Returns the named section, appending it when absent.
    pub fn section_mut(&mut self, name: &str) -> &mut Section {
        if name == DEFAULT_SECTION {
            return &mut self.defaults;
        }
        let pos = match self.sections.iter().position(|s| s.name == name) {
            Some(pos) => pos,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            },
        };
        &mut self.sections[pos]
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Renders the document: `DEFAULT` first (omitted when empty), then every
    /// named section in order, each followed by a blank line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let blocks = std::iter::once(&self.defaults)
            .filter(|d| !d.is_empty())
            .chain(self.sections.iter());
        for section in blocks {
            let _ = writeln!(out, "[{}]", section.name);
            for (key, value) in &section.entries {
                let value = value.replace('\n', "\n\t");
                let _ = writeln!(out, "{key} = {value}");
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_continuations() {
        let doc = IniDocument::parse(
            "# settings\n[DEFAULT]\ngroup.node1 = test\ngroup.node2: 40\n\n[TEST]\nmulti =\n\tfirst\n\tsecond\n",
            "settings.cfg",
        )
        .unwrap();

        assert_eq!(doc.defaults().get("group.node1"), Some("test"));
        assert_eq!(doc.defaults().get("group.node2"), Some("40"));
        assert_eq!(doc.section("TEST").and_then(|s| s.get("multi")), Some("first\nsecond"));
        assert!(!doc.has_section("OTHER"));
    }

    #[test]
    fn entry_before_header_is_rejected() {
        let err = IniDocument::parse("a.b = 1\n", "bad.cfg").unwrap_err();
        assert!(matches!(err, StorageError::Parse { line: 1, .. }));
    }

    #[test]
    fn render_puts_default_first_and_keeps_order() {
        let mut doc = IniDocument::parse("[TEST]\ngroup.node1 = value\n\n", "s.cfg").unwrap();
        doc.section_mut(DEFAULT_SECTION).set("group.node1", "value");

        assert_eq!(doc.render(), "[DEFAULT]\ngroup.node1 = value\n\n[TEST]\ngroup.node1 = value\n\n");
    }

    #[test]
    fn empty_default_is_omitted() {
        let mut doc = IniDocument::new();
        doc.section_mut("TEST").set("group.node3", "value");
        assert_eq!(doc.render(), "[TEST]\ngroup.node3 = value\n\n");
    }
}
