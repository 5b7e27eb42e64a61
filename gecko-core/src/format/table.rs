//! Codes and code tables, plus the GCT framing.
//!
//! A GCT blob is laid out as:
//! - `00D0C0DE 00D0C0DE` header line
//! - the lines of every enabled code, back to back
//! - `F0000000 00000000` footer line

use serde::{Deserialize, Serialize};

use super::binary::{self, Decoder};
use super::command::{Command, CommandBase, Terminator};
use super::registry::Registry;
use super::text::{self, TextDialect};
use super::LINE_SIZE;
use crate::config::TextOptions;
use crate::error::{GeckoError, Result};

pub const GCT_HEADER: [u8; LINE_SIZE] = [0x00, 0xD0, 0xC0, 0xDE, 0x00, 0xD0, 0xC0, 0xDE];
pub const GCT_FOOTER: [u8; LINE_SIZE] = [0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// One named code: a flat list of top-level commands, normally ending with a
/// terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    pub name: String,
    pub author: String,
    pub comment: String,
    pub enabled: bool,
    pub commands: Vec<Command>,
}

impl Default for Code {
    fn default() -> Self {
        Self {
            name: String::new(),
            author: String::new(),
            comment: String::new(),
            enabled: true,
            commands: Vec::new(),
        }
    }
}

impl Code {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_commands(commands: Vec<Command>) -> Self {
        Self {
            commands,
            ..Self::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_command(mut self, command: impl Into<Command>) -> Self {
        self.push(command);
        self
    }

    /// Appends the default terminator unless the code already ends with one.
    pub fn terminated(mut self) -> Self {
        if !self.commands.last().is_some_and(Command::is_terminator) {
            self.commands.push(Terminator::default().into());
        }
        self
    }

    pub fn push(&mut self, command: impl Into<Command>) {
        self.commands.push(command.into());
    }

    /// Inserts at `index`, clamped to the end of the list.
    pub fn insert(&mut self, index: usize, command: impl Into<Command>) {
        let index = index.min(self.commands.len());
        self.commands.insert(index, command.into());
    }

    pub fn remove(&mut self, index: usize) -> Option<Command> {
        (index < self.commands.len()).then(|| self.commands.remove(index))
    }

    pub fn line_count(&self) -> usize {
        self.commands.iter().map(Command::line_count).sum()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        binary::encode_commands(&self.commands)
    }

    pub fn render_map(&self) -> String {
        let mut out = String::new();
        for command in &self.commands {
            command.render_map(0, &mut out);
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTable {
    pub codes: Vec<Code>,
}

impl CodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, code: Code) {
        self.codes.push(code);
    }

    /// Inserts at `index`, clamped to the end of the table.
    pub fn insert(&mut self, index: usize, code: Code) {
        let index = index.min(self.codes.len());
        self.codes.insert(index, code);
    }

    pub fn remove(&mut self, index: usize) -> Option<Code> {
        (index < self.codes.len()).then(|| self.codes.remove(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Code> {
        self.codes.iter()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Code> {
        self.codes.iter().find(|code| code.name == name)
    }

    /// Lines of the enabled codes, framing excluded.
    pub fn line_count(&self) -> usize {
        self.codes
            .iter()
            .filter(|code| code.enabled)
            .map(Code::line_count)
            .sum()
    }

    /// Size of the GCT blob [`Self::to_gct`] produces.
    pub fn byte_len(&self) -> usize {
        (self.line_count() + 2) * LINE_SIZE
    }

    pub fn from_gct(bytes: &[u8]) -> Result<Self> {
        Self::from_gct_with(Registry::standard(), bytes)
    }

    pub fn from_gct_with(registry: &Registry, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 * LINE_SIZE {
            return Err(GeckoError::InvalidTableFraming(format!(
                "{} bytes cannot hold the header and footer lines",
                bytes.len()
            )));
        }
        if bytes[..LINE_SIZE] != GCT_HEADER {
            return Err(GeckoError::InvalidTableFraming(format!(
                "expected header 00D0C0DE 00D0C0DE, found {}",
                hex_line(&bytes[..LINE_SIZE])
            )));
        }
        let partial = bytes.len() % LINE_SIZE;
        if partial != 0 {
            return Err(GeckoError::TruncatedStream {
                offset: bytes.len() - partial,
                needed: LINE_SIZE,
                available: partial,
            });
        }
        let footer = &bytes[bytes.len() - LINE_SIZE..];
        if footer != GCT_FOOTER {
            return Err(GeckoError::InvalidTableFraming(format!(
                "expected footer F0000000 00000000, found {}",
                hex_line(footer)
            )));
        }

        let interior = &bytes[LINE_SIZE..bytes.len() - LINE_SIZE];
        let mut decoder = Decoder::new(registry, interior).with_base_offset(LINE_SIZE);
        let mut table = CodeTable::new();
        while let Some(commands) = decoder.next_code()? {
            table.push(Code::from_commands(commands));
        }
        log::debug!("decoded GCT table with {} codes", table.len());
        Ok(table)
    }

    /// Encodes the enabled codes as a GCT blob.
    pub fn to_gct(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        out.extend_from_slice(&GCT_HEADER);
        for code in self.codes.iter().filter(|code| code.enabled) {
            for command in &code.commands {
                binary::encode_command(command, &mut out);
            }
        }
        out.extend_from_slice(&GCT_FOOTER);
        out
    }

    /// Decodes either text dialect.
    pub fn from_text(input: &str) -> Result<Self> {
        text::decode_text(input)
    }

    pub fn from_text_with(registry: &Registry, input: &str) -> Result<Self> {
        text::decode_text_with(registry, input)
    }

    pub fn to_text(&self, dialect: TextDialect) -> String {
        text::encode_text(self, dialect, &TextOptions::default())
    }

    pub fn to_text_with(&self, dialect: TextDialect, options: &TextOptions) -> String {
        text::encode_text(self, dialect, options)
    }

    /// Description map of every code, headed by its name.
    pub fn render_map(&self) -> String {
        let mut out = String::new();
        for (index, code) in self.codes.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            let name = if code.name.is_empty() { "<unnamed>" } else { &code.name };
            out.push_str(&format!("[{name}]"));
            if !code.enabled {
                out.push_str(" (disabled)");
            }
            out.push('\n');
            out.push_str(&code.render_map());
        }
        out
    }
}

fn hex_line(line: &[u8]) -> String {
    let word = |bytes: &[u8]| bytes.iter().map(|b| format!("{b:02X}")).collect::<String>();
    format!("{} {}", word(&line[..4]), word(&line[4..]))
}

impl FromIterator<Code> for CodeTable {
    fn from_iter<T: IntoIterator<Item = Code>>(iter: T) -> Self {
        Self {
            codes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CodeTable {
    type Item = &'a Code;
    type IntoIter = std::slice::Iter<'a, Code>;

    fn into_iter(self) -> Self::IntoIter {
        self.codes.iter()
    }
}
