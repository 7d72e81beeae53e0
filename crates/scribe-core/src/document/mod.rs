//! Lifecycle document encoder/decoder.
//!
//! A lifecycle document is the markdown body posted to the backing thread:
//! a machine-parseable metadata prefix inside an HTML comment, followed by
//! one `<details>` block per stage so a human skimming the thread sees a
//! collapsible region per stage.
//!
//! ```text
//! <!-- scribe:meta
//! version: 2
//! thread: issue-42
//! event: content_appended
//! stage: research
//! -->
//! <details data-scribe-stage="research">
//! <summary>research</summary>
//!
//! free-form markdown content
//!
//! </details>
//! ```
//!
//! The boundary between metadata and content is anchored: the decoder only
//! recognizes a meta block that starts at byte 0 of the body and ends at
//! the first `-->` line after it, so the token can never be matched inside
//! free content. The encoder refuses metadata keys/values that embed a
//! newline or the terminator token, and stage names that embed `"`, `<`,
//! or a newline.
//!
//! Section markers get the mirror treatment: `<details` and `</details`
//! tokens inside free content are entity-escaped (`&lt;details`,
//! `&lt;/details`) on render and restored on parse, so content never
//! creates a false section boundary. A `&` sitting in front of what would
//! read as an escaped marker gains one `amp;` level, keeping the
//! transform reversible for any content.
//!
//! Format version 1 opened sections with a bare `<details>` tag and named
//! the stage only in the `<summary>` line. The decoder still accepts that
//! open marker; when both markers name the same stage, the current marker
//! wins.

use crate::error::FormatError;

/// First line of the metadata prefix.
pub const META_OPEN: &str = "<!-- scribe:meta";
/// Line terminating the metadata prefix.
pub const META_CLOSE: &str = "-->";

const SECTION_OPEN_PREFIX: &str = "<details data-scribe-stage=\"";
const SECTION_OPEN_SUFFIX: &str = "\">";
const LEGACY_SECTION_OPEN: &str = "<details>";
const SECTION_CLOSE: &str = "</details>";
const DETAILS_ANY: &str = "<details";
const SUMMARY_OPEN: &str = "<summary>";
const SUMMARY_CLOSE: &str = "</summary>";

/// Current format version, written into every metadata prefix.
pub const FORMAT_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// Metadata fields
// ---------------------------------------------------------------------------

/// Ordered `key: value` fields of the metadata prefix.
///
/// Insertion order is preserved so decode -> modify -> re-encode leaves
/// untouched fields byte-for-byte identical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaFields(Vec<(String, String)>);

impl MetaFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, replacing an existing value in place (keeping its
    /// position) or appending a new one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A field that must be present, or the document is malformed.
    pub fn require(&self, key: &'static str) -> Result<&str, FormatError> {
        self.get(key).ok_or(FormatError::MissingField(key))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetaFields {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// One named, delimited content region of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSection {
    pub stage: String,
    pub content: String,
    /// True when this section was read from a version-1 open marker.
    /// Re-rendering always emits the current marker.
    pub legacy: bool,
}

impl StageSection {
    pub fn new(stage: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            content: content.into(),
            legacy: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Whole documents
// ---------------------------------------------------------------------------

/// A parsed lifecycle document: metadata prefix plus ordered stage sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleDoc {
    pub meta: MetaFields,
    pub sections: Vec<StageSection>,
}

impl LifecycleDoc {
    pub fn new(meta: MetaFields) -> Self {
        Self {
            meta,
            sections: Vec::new(),
        }
    }

    /// Parse a post body.
    ///
    /// Returns `Ok(None)` when the body does not start with the metadata
    /// prefix -- an ordinary human comment, not a lifecycle document.
    /// Returns an error when the prefix is present but the document is
    /// malformed.
    pub fn parse(body: &str) -> Result<Option<Self>, FormatError> {
        let Some((meta, rest)) = parse_meta_block(body)? else {
            return Ok(None);
        };
        let sections = parse_sections(rest)?;
        Ok(Some(Self { meta, sections }))
    }

    /// Render the document to a post body.
    ///
    /// Fails if any metadata field embeds a newline or the terminator
    /// token, or a stage name embeds a reserved character; such values
    /// cannot be represented unambiguously.
    pub fn render(&self) -> Result<String, FormatError> {
        let mut out = build_metadata_prefix(&self.meta)?;
        for section in &self.sections {
            out.push('\n');
            out.push_str(&render_section(section)?);
        }
        Ok(out)
    }

    /// Content of the named stage, preferring a current-marker section over
    /// a legacy one when the body carries both.
    pub fn section(&self, stage: &str) -> Option<&StageSection> {
        self.sections
            .iter()
            .filter(|s| s.stage == stage)
            .min_by_key(|s| s.legacy)
    }
}

// ---------------------------------------------------------------------------
// Spec surface
// ---------------------------------------------------------------------------

/// Render a metadata prefix block from ordered fields.
pub fn build_metadata_prefix(fields: &MetaFields) -> Result<String, FormatError> {
    let mut out = String::new();
    out.push_str(META_OPEN);
    out.push('\n');
    for (key, value) in fields.iter() {
        if key.contains(':') || key.contains('\n') || key.contains(META_CLOSE) {
            return Err(FormatError::ReservedToken {
                key: key.to_owned(),
            });
        }
        if value.contains('\n') || value.contains(META_CLOSE) {
            return Err(FormatError::ReservedToken {
                key: key.to_owned(),
            });
        }
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push_str(META_CLOSE);
    out.push('\n');
    Ok(out)
}

/// Render a complete single-stage document body.
pub fn build_stage_body(
    stage: &str,
    content: &str,
    meta: &MetaFields,
) -> Result<String, FormatError> {
    let mut doc = LifecycleDoc::new(meta.clone());
    doc.sections.push(StageSection::new(stage, content));
    doc.render()
}

/// Extract the metadata prefix from a body.
///
/// `Ok(None)` means the body carries no prefix at all (distinct from a
/// malformed one, which is an error).
pub fn extract_metadata_prefix(body: &str) -> Result<Option<MetaFields>, FormatError> {
    Ok(parse_meta_block(body)?.map(|(meta, _)| meta))
}

/// Extract the first section's content from a body.
///
/// Recognizes both the current and the legacy open marker; when both name
/// the same stage the current marker wins. `Ok(None)` means the body has no
/// section (distinct from a truncated one, which is an error).
pub fn extract_content(body: &str) -> Result<Option<String>, FormatError> {
    let rest = match parse_meta_block(body)? {
        Some((_, rest)) => rest,
        None => body,
    };
    let sections = parse_sections(rest)?;
    let Some(first) = sections.first() else {
        return Ok(None);
    };
    // Prefer a current-marker section with the same stage name over a
    // legacy-marker first section.
    let chosen = sections
        .iter()
        .filter(|s| s.stage == first.stage)
        .min_by_key(|s| s.legacy)
        .unwrap_or(first);
    Ok(Some(chosen.content.clone()))
}

// ---------------------------------------------------------------------------
// Parsing internals
// ---------------------------------------------------------------------------

/// Parse the anchored metadata block. Returns the fields and the remainder
/// of the body after the terminator line.
fn parse_meta_block(body: &str) -> Result<Option<(MetaFields, &str)>, FormatError> {
    let Some(rest) = body.strip_prefix(META_OPEN) else {
        return Ok(None);
    };
    let Some(rest) = rest.strip_prefix('\n') else {
        return Ok(None);
    };

    let mut fields = MetaFields::new();
    let mut remaining = rest;
    loop {
        let (line, after) = match remaining.split_once('\n') {
            Some(pair) => pair,
            None => (remaining, ""),
        };
        if line == META_CLOSE {
            return Ok(Some((fields, after)));
        }
        if remaining.is_empty() {
            return Err(FormatError::UnterminatedMeta);
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(FormatError::MalformedMetaLine {
                line: line.to_owned(),
            });
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        fields.set(key, value);
        remaining = after;
    }
}

fn render_section(section: &StageSection) -> Result<String, FormatError> {
    // A stage name carrying `"` or `<` would terminate the attribute or
    // the summary line early; a newline would break the marker line.
    if section.stage.contains(['"', '<', '\n']) {
        return Err(FormatError::ReservedStage {
            stage: section.stage.clone(),
        });
    }
    Ok(format!(
        "{open}{stage}{close}\n{sum_open}{stage}{sum_close}\n\n{content}\n\n{section_close}\n",
        open = SECTION_OPEN_PREFIX,
        close = SECTION_OPEN_SUFFIX,
        stage = section.stage,
        sum_open = SUMMARY_OPEN,
        sum_close = SUMMARY_CLOSE,
        content = escape_content(&section.content),
        section_close = SECTION_CLOSE,
    ))
}

/// Entity-escape marker tokens in free content. `<details` / `</details`
/// become `&lt;details` / `&lt;/details`; a `&` directly in front of an
/// already-escaped marker gains one `amp;` level.
fn escape_content(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(at) = rest.find(['<', '&']) {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        if tail.starts_with(DETAILS_ANY) || tail.starts_with("</details") {
            out.push_str("&lt;");
        } else if tail.starts_with('&') && escapes_marker(&tail[1..]) {
            out.push_str("&amp;");
        } else {
            out.push_str(&tail[..1]);
        }
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

/// Reverse [`escape_content`]: drop exactly one escape level from every
/// escaped marker token, leaving all other text untouched.
fn unescape_content(wire: &str) -> String {
    let mut out = String::with_capacity(wire.len());
    let mut rest = wire;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        if let Some(r) = after
            .strip_prefix("lt;")
            .filter(|r| r.starts_with("details") || r.starts_with("/details"))
        {
            out.push('<');
            rest = r;
        } else if let Some(r) = after.strip_prefix("amp;").filter(|r| escapes_marker(r)) {
            out.push('&');
            rest = r;
        } else {
            out.push('&');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// True when `s` (the text after a `&`) reads as an escaped marker token,
/// through any number of `amp;` levels.
fn escapes_marker(mut s: &str) -> bool {
    while let Some(r) = s.strip_prefix("amp;") {
        s = r;
    }
    match s.strip_prefix("lt;") {
        Some(r) => r.starts_with("details") || r.starts_with("/details"),
        None => false,
    }
}

/// Parse every stage section in `text`, current and legacy markers alike.
fn parse_sections(text: &str) -> Result<Vec<StageSection>, FormatError> {
    let mut sections = Vec::new();
    let mut pos = 0;

    while let Some(found) = text[pos..].find(DETAILS_ANY) {
        let open_at = pos + found;
        let tail = &text[open_at..];

        let (stage, legacy, body_from) = if let Some(after) = tail.strip_prefix(SECTION_OPEN_PREFIX)
        {
            // Current marker: stage name lives in the attribute. The
            // terminator must sit on the marker's own line.
            let line_end = after.find('\n').unwrap_or(after.len());
            let Some(end) = after[..line_end].find(SECTION_OPEN_SUFFIX) else {
                let line = tail.lines().next().unwrap_or(tail).to_owned();
                return Err(FormatError::MalformedSectionOpen { line });
            };
            let stage = &after[..end];
            let header_len =
                SECTION_OPEN_PREFIX.len() + end + SECTION_OPEN_SUFFIX.len();
            let body_from = open_at + header_len + skip_summary_line(&tail[header_len..]);
            (stage.to_owned(), false, body_from)
        } else if tail.starts_with(LEGACY_SECTION_OPEN) {
            // Legacy marker: stage name lives only in the summary line.
            let after = &tail[LEGACY_SECTION_OPEN.len()..];
            let trimmed = after.trim_start_matches('\n');
            let Some(summary) = trimmed.strip_prefix(SUMMARY_OPEN) else {
                return Err(FormatError::MissingSummary);
            };
            let Some(end) = summary.find(SUMMARY_CLOSE) else {
                return Err(FormatError::MissingSummary);
            };
            let stage = summary[..end].to_owned();
            let consumed = (after.len() - trimmed.len())
                + SUMMARY_OPEN.len()
                + end
                + SUMMARY_CLOSE.len();
            let body_from = open_at + LEGACY_SECTION_OPEN.len() + consumed;
            (stage, true, body_from)
        } else {
            // Some other <details...> tag; not one of ours, skip past it.
            pos = open_at + DETAILS_ANY.len();
            continue;
        };

        // Find the matching close with a nesting-aware scan, so <details>
        // blocks embedded in free content stay inside this section.
        let close_at = find_matching_close(text, body_from).ok_or_else(|| {
            FormatError::UnterminatedSection {
                stage: stage.clone(),
            }
        })?;

        let content = unescape_content(strip_padding(&text[body_from..close_at]));
        sections.push(StageSection {
            stage,
            content,
            legacy,
        });
        pos = close_at + SECTION_CLOSE.len();
    }

    Ok(sections)
}

/// Skip a `\n<summary>...</summary>` line following a current open marker,
/// if present. Returns the number of bytes consumed.
fn skip_summary_line(text: &str) -> usize {
    let trimmed = text.trim_start_matches('\n');
    let leading = text.len() - trimmed.len();
    if let Some(after) = trimmed.strip_prefix(SUMMARY_OPEN) {
        if let Some(end) = after.find(SUMMARY_CLOSE) {
            return leading + SUMMARY_OPEN.len() + end + SUMMARY_CLOSE.len();
        }
    }
    0
}

/// Scan forward from `from`, balancing `<details` against `</details>`, and
/// return the byte offset of the close marker that ends the section opened
/// just before `from`. `None` when the close marker is missing.
fn find_matching_close(text: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut pos = from;
    loop {
        let open = text[pos..].find(DETAILS_ANY);
        let close = text[pos..].find(SECTION_CLOSE)?;
        match open {
            Some(o) if o < close => {
                depth += 1;
                pos += o + DETAILS_ANY.len();
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos + close);
                }
                pos += close + SECTION_CLOSE.len();
            }
        }
    }
}

/// Remove the blank-line padding the renderer puts around section content.
fn strip_padding(raw: &str) -> &str {
    let s = raw.strip_prefix("\n\n").unwrap_or_else(|| {
        raw.strip_prefix('\n').unwrap_or(raw)
    });
    s.strip_suffix("\n\n")
        .unwrap_or_else(|| s.strip_suffix('\n').unwrap_or(s))
}
