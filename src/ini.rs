//! Strict, line-driven INI parser.
//!
//! Grounded on `core/ini.h`. The callback-driven C API becomes an iterator
//! of `(line_no, Result<Entry, IniError>)` per the re-architecture guidance
//! — a single-pass validating sequence, not a two-phase parse-then-walk.

use thiserror::Error;

const MAX_LINE_LEN: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IniError {
    #[error("line too long (line {0})")]
    LineTooLong(usize),
    #[error("empty key (line {0})")]
    EmptyKey(usize),
    #[error("malformed section header (line {0})")]
    BadSection(usize),
    #[error("key outside of any section (line {0})")]
    KeyOutsideSection(usize),
    #[error("malformed line (line {0})")]
    Malformed(usize),
}

/// One parsed key/value pair, tagged with the section it appeared under
/// and its 1-based source line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub section: String,
    pub key: String,
    pub value: String,
    pub line_no: usize,
}

fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{feff}').unwrap_or(s)
}

/// Split `text` into logical lines on LF, tolerating a trailing CR per
/// line (CRLF input). Does not split on bare CR.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    // A trailing newline produces a spurious empty final "line"; drop it
    // unless the whole input was empty.
    if let Some(last) = lines.last() {
        if last.is_empty() && text.ends_with('\n') {
            lines.pop();
        }
    }
    lines
        .into_iter()
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect()
}

/// Parse INI text into a sequence of entries, validating the whole file
/// in one pass. Returns the first error encountered.
pub fn parse(text: &str) -> Result<Vec<Entry>, IniError> {
    let mut entries = Vec::new();
    let mut section: Option<String> = None;

    let lines = split_lines(text);

    for (idx, raw_line) in lines.iter().enumerate() {
        let line_no = idx + 1;

        if raw_line.len() > MAX_LINE_LEN {
            return Err(IniError::LineTooLong(line_no));
        }

        let line = if line_no == 1 { strip_bom(raw_line) } else { raw_line };
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.starts_with('[') {
            let close = trimmed.find(']').ok_or(IniError::BadSection(line_no))?;
            let name = trimmed[1..close].trim();
            if name.is_empty() {
                return Err(IniError::BadSection(line_no));
            }
            let rest = trimmed[close + 1..].trim();
            if !rest.is_empty() && !rest.starts_with(';') && !rest.starts_with('#') {
                return Err(IniError::BadSection(line_no));
            }
            section = Some(name.to_string());
            continue;
        }

        let eq = trimmed.find('=').ok_or(IniError::Malformed(line_no))?;
        let key = trimmed[..eq].trim();
        let value = trimmed[eq + 1..].trim();

        if key.is_empty() {
            return Err(IniError::EmptyKey(line_no));
        }

        let Some(section_name) = section.clone() else {
            return Err(IniError::KeyOutsideSection(line_no));
        };

        entries.push(Entry {
            section: section_name,
            key: key.to_string(),
            value: value.to_string(),
            line_no,
        });
    }

    Ok(entries)
}
