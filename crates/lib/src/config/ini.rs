//! INI document parsing and value lookup.
//!
//! Dialect: `[section]` headers, `key = value` or `key: value` options, full-line `#`/`;`
//! comments, indented continuation lines, a `DEFAULT` section that backs every other section,
//! and `%(name)s` interpolation on read. Option names are case-insensitive; section names are not.

use super::ConfigError;

/// Section whose options are visible from every other section.
pub const DEFAULT_SECTION: &str = "DEFAULT";

const MAX_INTERPOLATION_DEPTH: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Section {
    name: String,
    options: Vec<(String, String)>,
}

impl Section {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A parsed INI document. Holds raw (uninterpolated) values in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    defaults: Section,
    sections: Vec<Section>,
}

/// Option currently being read; continuation lines append to `lines`.
struct PendingOption {
    section: Option<usize>,
    key: String,
    indent: usize,
    lines: Vec<String>,
}

impl IniDocument {
    /// Parse INI text. Fails on options before any header, duplicate sections or options
    /// (within one section), and lines that are neither header, option, comment nor blank.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut doc = IniDocument {
            defaults: Section::new(DEFAULT_SECTION),
            sections: Vec::new(),
        };
        // None = no header seen yet; Some(None) = DEFAULT; Some(Some(i)) = sections[i].
        let mut current: Option<Option<usize>> = None;
        let mut pending: Option<PendingOption> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                if let Some(p) = pending.as_mut() {
                    p.lines.push(String::new());
                }
                continue;
            }
            // Comment lines add nothing to a value but do not end it either.
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indent = raw.len() - raw.trim_start().len();
            if let Some(p) = pending.as_mut() {
                if indent > p.indent {
                    p.lines.push(trimmed.to_string());
                    continue;
                }
            }
            if let Some(p) = pending.take() {
                doc.finish(p);
            }

            if let Some(name) = section_header(trimmed) {
                if name == DEFAULT_SECTION {
                    current = Some(None);
                } else if doc.section_index(name).is_some() {
                    return Err(parse_error(
                        line_no,
                        format!("section {:?} already exists", name),
                    ));
                } else {
                    doc.sections.push(Section::new(name));
                    current = Some(Some(doc.sections.len() - 1));
                }
                continue;
            }

            let Some(section) = current else {
                return Err(parse_error(
                    line_no,
                    format!("option outside of any section: {:?}", trimmed),
                ));
            };
            let Some((key, value)) = split_option(trimmed) else {
                return Err(parse_error(
                    line_no,
                    format!("expected `key = value`, got {:?}", trimmed),
                ));
            };
            if key.is_empty() {
                return Err(parse_error(line_no, "option name is empty"));
            }
            let key = key.to_lowercase();
            let target = match section {
                Some(i) => &doc.sections[i],
                None => &doc.defaults,
            };
            if target.get(&key).is_some() {
                return Err(parse_error(
                    line_no,
                    format!("option {:?} in section {:?} already exists", key, target.name),
                ));
            }
            pending = Some(PendingOption {
                section,
                key,
                indent,
                lines: vec![value.to_string()],
            });
        }
        if let Some(p) = pending.take() {
            doc.finish(p);
        }
        Ok(doc)
    }

    fn finish(&mut self, p: PendingOption) {
        let value = p.lines.join("\n").trim_end().to_string();
        let target = match p.section {
            Some(i) => &mut self.sections[i],
            None => &mut self.defaults,
        };
        target.options.push((p.key, value));
    }

    fn section_index(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name)
    }

    /// Section names in file order, excluding `DEFAULT`.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// Option names visible in `section` (its own, then inherited defaults).
    pub fn options(&self, section: &str) -> Result<Vec<&str>, ConfigError> {
        let own = self.lookup_section(section)?;
        let mut names: Vec<&str> = own
            .map(|s| s.options.iter().map(|(k, _)| k.as_str()).collect())
            .unwrap_or_default();
        for (k, _) in &self.defaults.options {
            if !names.contains(&k.as_str()) {
                names.push(k);
            }
        }
        Ok(names)
    }

    /// Uninterpolated value of `key` in `section`, falling back to `DEFAULT`.
    pub fn get_raw(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        let own = self.lookup_section(section)?;
        let key_lc = key.to_lowercase();
        own.and_then(|s| s.get(&key_lc))
            .or_else(|| self.defaults.get(&key_lc))
            .ok_or_else(|| ConfigError::KeyNotFound {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Value of `key` in `section` with `%(name)s` references expanded.
    pub fn get(&self, section: &str, key: &str) -> Result<String, ConfigError> {
        let raw = self.get_raw(section, key)?;
        self.interpolate(section, key, raw, 1)
    }

    /// `Ok(None)` means the `DEFAULT` pseudo-section.
    fn lookup_section(&self, section: &str) -> Result<Option<&Section>, ConfigError> {
        if let Some(i) = self.section_index(section) {
            return Ok(Some(&self.sections[i]));
        }
        if section == DEFAULT_SECTION {
            return Ok(None);
        }
        Err(ConfigError::SectionNotFound(section.to_string()))
    }

    fn interpolate(
        &self,
        section: &str,
        key: &str,
        raw: &str,
        depth: usize,
    ) -> Result<String, ConfigError> {
        if !raw.contains('%') {
            return Ok(raw.to_string());
        }
        if depth > MAX_INTERPOLATION_DEPTH {
            return Err(interpolation_error(
                section,
                key,
                format!("references nested deeper than {}", MAX_INTERPOLATION_DEPTH),
            ));
        }
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            rest = &rest[pos + 1..];
            if let Some(after) = rest.strip_prefix('%') {
                out.push('%');
                rest = after;
            } else if let Some(after) = rest.strip_prefix('(') {
                let Some((name, tail)) = after.split_once(")s") else {
                    return Err(interpolation_error(
                        section,
                        key,
                        format!("bad interpolation variable reference %{}", rest),
                    ));
                };
                let referenced = match self.get_raw(section, name) {
                    Ok(v) => v,
                    Err(ConfigError::KeyNotFound { .. }) => {
                        return Err(interpolation_error(
                            section,
                            key,
                            format!("no option {:?} to interpolate", name.to_lowercase()),
                        ));
                    }
                    Err(e) => return Err(e),
                };
                out.push_str(&self.interpolate(section, key, referenced, depth + 1)?);
                rest = tail;
            } else {
                return Err(interpolation_error(
                    section,
                    key,
                    format!("'%' must be followed by '%' or '(', found: %{}", rest),
                ));
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// `[name]` header (text after the last `]` is ignored). Empty names are not headers.
fn section_header(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('[')?;
    let end = inner.rfind(']')?;
    let name = &inner[..end];
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Split on the first `=` or `:`; both halves trimmed.
fn split_option(line: &str) -> Option<(&str, &str)> {
    let pos = line.find(['=', ':'])?;
    Some((line[..pos].trim(), line[pos + 1..].trim()))
}

fn parse_error(line: usize, message: impl Into<String>) -> ConfigError {
    ConfigError::Parse {
        line,
        message: message.into(),
    }
}

fn interpolation_error(section: &str, key: &str, message: String) -> ConfigError {
    ConfigError::Interpolation {
        section: section.to_string(),
        key: key.to_string(),
        message,
    }
}
