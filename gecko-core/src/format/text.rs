//! Hex text dialects.
//!
//! Every line of a code renders as two 8-digit hex words. The plain dialect
//! is just those lines, with codes separated by a blank line. The annotated
//! dialect is the Gecko section of a Dolphin game INI:
//!
//! ```text
//! [Gecko]
//! $Infinite Lives [someone]
//! *Lives never go down
//! 04123456 00000063
//! E0000000 80008000
//!
//! [Gecko_Enabled]
//! $Infinite Lives
//! ```
//!
//! Hex lines are turned back into bytes and handed to the binary decoder, so
//! nesting works the same way as for GCT input. Plain text that starts with
//! the GCT header line is a whole GCT blob and goes through the GCT framing.

use std::collections::HashSet;

use byteorder::{BigEndian, ByteOrder};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::binary::Decoder;
use super::registry::Registry;
use super::table::{Code, CodeTable, GCT_HEADER};
use super::LINE_SIZE;
use crate::config::TextOptions;
use crate::error::{GeckoError, Result};

const GECKO_SECTION: &str = "Gecko";
const ENABLED_SECTION: &str = "Gecko_Enabled";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum TextDialect {
    /// Bare hex lines, codes separated by blank lines.
    Plain,
    /// Dolphin INI layout with `$Name [Author]` headers, `*` comments and an
    /// enabled list.
    Annotated,
}

/// A code as it appears in text, before its lines are decoded.
#[derive(Debug, Default)]
struct TextCode {
    name: String,
    author: String,
    comment: Vec<String>,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct TextListing {
    codes: Vec<TextCode>,
    enabled: Option<HashSet<String>>,
    /// Set instead of `codes` for plain text headed by the GCT sentinel.
    gct: Option<Vec<u8>>,
}

/// Parses `ABCDEF01 23456789` into its 8 bytes.
fn parse_hex_line(line: &str) -> Option<[u8; LINE_SIZE]> {
    let (first, second) = line.split_whitespace().collect_tuple()?;
    let mut out = [0u8; LINE_SIZE];
    for (word, slot) in [first, second].into_iter().zip(out.chunks_mut(4)) {
        if word.len() != 8 || !word.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(word, 16).ok()?;
        BigEndian::write_u32(slot, value);
    }
    Some(out)
}

fn section_name(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}

fn escape_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Splits `Name [Author]`: the name runs to the first unescaped `[`, the
/// author to the next unescaped `]`, and the rest of the line is ignored.
fn parse_code_header(header: &str) -> (String, String) {
    let mut name = String::new();
    let mut author = String::new();
    let mut in_author = false;
    let mut chars = header.trim().chars().peekable();
    while let Some(c) = chars.next() {
        let target = if in_author { &mut author } else { &mut name };
        match c {
            '\\' => match chars.peek() {
                Some(&next @ ('[' | ']' | '\\')) => {
                    target.push(next);
                    chars.next();
                }
                _ => target.push(c),
            },
            '[' if !in_author => in_author = true,
            ']' if in_author => break,
            _ => target.push(c),
        }
    }
    (name.trim().to_string(), author.trim().to_string())
}

fn parse_annotated(input: &str) -> std::result::Result<TextListing, String> {
    #[derive(PartialEq)]
    enum Section {
        Codes,
        Enabled,
        Other,
    }

    let mut listing = TextListing::default();
    let mut section = Section::Codes;
    let mut saw_marker = false;

    for (index, raw) in input.lines().enumerate() {
        let number = index + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = section_name(line) {
            section = match name {
                GECKO_SECTION => Section::Codes,
                ENABLED_SECTION => {
                    listing.enabled.get_or_insert_with(HashSet::new);
                    Section::Enabled
                }
                _ => Section::Other,
            };
            saw_marker |= section != Section::Other;
            continue;
        }

        match section {
            Section::Other => {}
            Section::Enabled => match line.strip_prefix('$') {
                Some(name) => {
                    let (name, _) = parse_code_header(name);
                    listing.enabled.get_or_insert_with(HashSet::new).insert(name);
                }
                None => return Err(format!("line {number}: expected `$Name` in [{ENABLED_SECTION}]")),
            },
            Section::Codes => {
                if let Some(header) = line.strip_prefix('$') {
                    let (name, author) = parse_code_header(header);
                    listing.codes.push(TextCode {
                        name,
                        author,
                        ..TextCode::default()
                    });
                    saw_marker = true;
                    continue;
                }
                let Some(code) = listing.codes.last_mut() else {
                    return Err(format!("line {number}: content before the first `$` header"));
                };
                if let Some(comment) = raw.trim_start().strip_prefix('*') {
                    code.comment.push(comment.to_string());
                } else if let Some(bytes) = parse_hex_line(line) {
                    code.bytes.extend_from_slice(&bytes);
                } else {
                    return Err(format!("line {number}: not a comment or hex line: {line:?}"));
                }
            }
        }
    }

    if !saw_marker {
        return Err("no `$` code header or [Gecko] section".to_string());
    }
    Ok(listing)
}

fn parse_plain(input: &str) -> std::result::Result<TextListing, String> {
    let mut listing = TextListing::default();
    let mut current: Option<TextCode> = None;

    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            listing.codes.extend(current.take());
            continue;
        }
        let bytes = parse_hex_line(line)
            .ok_or_else(|| format!("line {}: not a hex line: {line:?}", index + 1))?;
        if let Some(gct) = listing.gct.as_mut() {
            gct.extend_from_slice(&bytes);
        } else if listing.codes.is_empty() && current.is_none() && bytes == GCT_HEADER {
            listing.gct = Some(bytes.to_vec());
        } else {
            current
                .get_or_insert_with(TextCode::default)
                .bytes
                .extend_from_slice(&bytes);
        }
    }
    listing.codes.extend(current);
    Ok(listing)
}

/// Probes the annotated grammar, then the plain one.
fn sniff_dialect(input: &str) -> Result<(TextDialect, TextListing)> {
    let annotated = match parse_annotated(input) {
        Ok(listing) => return Ok((TextDialect::Annotated, listing)),
        Err(reason) => reason,
    };
    log::trace!("annotated dialect rejected: {annotated}");
    let plain = match parse_plain(input) {
        Ok(listing) => return Ok((TextDialect::Plain, listing)),
        Err(reason) => reason,
    };
    log::trace!("plain dialect rejected: {plain}");
    Err(GeckoError::UnrecognizedDialect(format!(
        "annotated: {annotated}; plain: {plain}"
    )))
}

pub fn detect_dialect(input: &str) -> Result<TextDialect> {
    sniff_dialect(input).map(|(dialect, _)| dialect)
}

pub fn decode_text(input: &str) -> Result<CodeTable> {
    decode_text_with(Registry::standard(), input)
}

pub fn decode_text_with(registry: &Registry, input: &str) -> Result<CodeTable> {
    let (dialect, listing) = sniff_dialect(input)?;
    if let Some(gct) = listing.gct {
        log::debug!("{dialect} text holds a GCT blob");
        return CodeTable::from_gct_with(registry, &gct);
    }
    let enabled = listing.enabled;
    let mut table = CodeTable::new();
    for text_code in listing.codes {
        let commands = Decoder::new(registry, &text_code.bytes).decode_all()?;
        let is_enabled = enabled
            .as_ref()
            .map_or(true, |names| names.contains(&text_code.name));
        table.push(Code {
            name: text_code.name,
            author: text_code.author,
            comment: text_code.comment.join("\n"),
            enabled: is_enabled,
            commands,
        });
    }
    log::debug!("decoded {dialect} text with {} codes", table.len());
    Ok(table)
}

fn hex_lines(code: &Code, options: &TextOptions) -> Vec<String> {
    code.to_bytes()
        .chunks_exact(LINE_SIZE)
        .map(|line| {
            let first = BigEndian::read_u32(&line[..4]);
            let second = BigEndian::read_u32(&line[4..]);
            if options.uppercase {
                format!("{first:08X} {second:08X}")
            } else {
                format!("{first:08x} {second:08x}")
            }
        })
        .collect()
}

fn code_header(code: &Code) -> String {
    let name = escape_brackets(&code.name);
    if code.author.is_empty() {
        format!("${name}")
    } else {
        format!("${name} [{}]", escape_brackets(&code.author))
    }
}

/// Renders `table` in `dialect`. The plain dialect cannot carry empty codes
/// or code metadata; empty codes are skipped. The annotated enabled list
/// holds names only, each once.
pub fn encode_text(table: &CodeTable, dialect: TextDialect, options: &TextOptions) -> String {
    let mut lines: Vec<String> = Vec::new();
    match dialect {
        TextDialect::Plain => {
            for code in table.iter().filter(|code| !code.commands.is_empty()) {
                if !lines.is_empty() {
                    lines.push(String::new());
                }
                lines.extend(hex_lines(code, options));
            }
        }
        TextDialect::Annotated => {
            lines.push(format!("[{GECKO_SECTION}]"));
            for code in table {
                lines.push(code_header(code));
                if !code.comment.is_empty() {
                    lines.extend(code.comment.split('\n').map(|line| format!("*{line}")));
                }
                lines.extend(hex_lines(code, options));
                lines.push(String::new());
            }
            lines.push(format!("[{ENABLED_SECTION}]"));
            lines.extend(
                table
                    .iter()
                    .filter(|code| code.enabled)
                    .map(|code| format!("${}", escape_brackets(&code.name)))
                    .unique(),
            );
        }
    }

    let newline = options.line_ending.as_str();
    let mut out = lines.join(newline);
    if !out.is_empty() {
        out.push_str(newline);
    }
    out
}
