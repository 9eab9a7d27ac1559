//! Just enough INI to round-trip a `.coveragerc`.
//!
//! Sections and keys keep their order. Keys are lowercased. Indented lines
//! continue the previous value and are joined with `\n`; on output they are
//! written back indented with a tab.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct IniError {
    pub line: usize,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<Section>,
}

impl IniDocument {
    pub fn parse(text: &str) -> Result<Self, IniError> {
        let mut doc = Self::default();
        // (section index, entry index) of the value being continued.
        let mut last: Option<(usize, usize)> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if raw.starts_with(char::is_whitespace) {
                if let Some((s, e)) = last {
                    let value = &mut doc.sections[s].entries[e].1;
                    value.push('\n');
                    value.push_str(trimmed);
                    continue;
                }
            }

            if let Some(name) = trimmed.strip_prefix('[') {
                let name = name.strip_suffix(']').ok_or_else(|| IniError {
                    line,
                    message: format!("unterminated section header: {trimmed}"),
                })?;
                doc.section_mut(name.trim());
                last = None;
                continue;
            }

            let section = doc.sections.len().checked_sub(1).ok_or_else(|| IniError {
                line,
                message: "entry before the first section header".into(),
            })?;
            let split = trimmed.find(['=', ':']).ok_or_else(|| IniError {
                line,
                message: format!("expected 'key = value', got: {trimmed}"),
            })?;
            let key = trimmed[..split].trim();
            let value = trimmed[split + 1..].trim();
            let entries = &mut doc.sections[section].entries;
            entries.retain(|(k, _)| *k != key.to_lowercase());
            entries.push((key.to_lowercase(), value.to_string()));
            last = Some((section, entries.len() - 1));
        }
        Ok(doc)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// The named section, added at the end if missing.
    pub fn section_mut(&mut self, name: &str) -> &mut Section {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in &section.entries {
                writeln!(f, "{key} = {}", value.replace('\n', "\n\t"))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
