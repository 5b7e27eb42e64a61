use itertools::Itertools;
use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::{CommandBase, CommandKind};
use crate::format::address::{Address, AddressMode};
use crate::format::LINE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize)]
pub enum WriteWidth {
    Byte = 0,
    Half = 1,
    Word = 2,
}

impl WriteWidth {
    pub fn kind(self) -> CommandKind {
        match self {
            WriteWidth::Byte => CommandKind::Write8,
            WriteWidth::Half => CommandKind::Write16,
            WriteWidth::Word => CommandKind::Write32,
        }
    }

    pub(crate) fn from_kind(kind: CommandKind) -> Option<Self> {
        match kind {
            CommandKind::Write8 => Some(WriteWidth::Byte),
            CommandKind::Write16 => Some(WriteWidth::Half),
            CommandKind::Write32 => Some(WriteWidth::Word),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WriteWidth::Byte => "byte",
            WriteWidth::Half => "halfword",
            WriteWidth::Word => "word",
        }
    }

    pub(crate) fn format_value(self, value: u32) -> String {
        match self {
            WriteWidth::Byte => format!("0x{:02X}", value & 0xFF),
            WriteWidth::Half => format!("0x{:04X}", value & 0xFFFF),
            WriteWidth::Word => format!("0x{value:08X}"),
        }
    }
}

/// `00`/`02`/`04`: store a constant.
///
/// Byte and halfword writes keep a repeat count in the upper half of the
/// value word; `value` then holds the lower half as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Write {
    width: WriteWidth,
    address: Address,
    value: u32,
    repeat: u16,
}

impl Write {
    pub fn byte(address: Address, value: u8, repeat: u16) -> Self {
        Self {
            width: WriteWidth::Byte,
            address,
            value: value as u32,
            repeat,
        }
    }

    pub fn half(address: Address, value: u16, repeat: u16) -> Self {
        Self {
            width: WriteWidth::Half,
            address,
            value: value as u32,
            repeat,
        }
    }

    pub fn word(address: Address, value: u32) -> Self {
        Self {
            width: WriteWidth::Word,
            address,
            value,
            repeat: 0,
        }
    }

    pub(crate) fn from_words(width: WriteWidth, address: Address, value_word: u32) -> Self {
        match width {
            WriteWidth::Word => Self::word(address, value_word),
            _ => Self {
                width,
                address,
                value: value_word & 0xFFFF,
                repeat: (value_word >> 16) as u16,
            },
        }
    }

    pub(crate) fn value_word(&self) -> u32 {
        match self.width {
            WriteWidth::Word => self.value,
            _ => (self.repeat as u32) << 16 | (self.value & 0xFFFF),
        }
    }

    pub fn width(&self) -> WriteWidth {
        self.width
    }

    pub fn target(&self) -> Address {
        self.address
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn set_value(&mut self, value: u32) {
        self.value = match self.width {
            WriteWidth::Byte => value & 0xFF,
            WriteWidth::Half => value & 0xFFFF,
            WriteWidth::Word => value,
        };
    }

    /// Additional consecutive copies written after the first.
    pub fn repeat(&self) -> u16 {
        self.repeat
    }
}

impl CommandBase for Write {
    fn kind(&self) -> CommandKind {
        self.width.kind()
    }

    fn address(&self) -> u32 {
        self.address.raw()
    }

    fn mode(&self) -> AddressMode {
        self.address.mode()
    }

    fn describe(&self) -> String {
        let times = if self.repeat > 0 {
            format!(" {} times consecutively", self.repeat as u32 + 1)
        } else {
            String::new()
        };
        format!(
            "({:02X}) Write {} {} to {}{}",
            self.opcode(),
            self.width.name(),
            self.width.format_value(self.value),
            self.address,
            times
        )
    }
}

/// `06`: copy a byte string into memory.
///
/// The payload occupies whole lines; the bytes after `data` that fill the
/// last line are kept in `padding` so decoded input re-encodes unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteString {
    address: Address,
    data: Vec<u8>,
    padding: Vec<u8>,
}

impl WriteString {
    pub fn new(address: Address, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let padding = vec![0; pad_len(data.len())];
        Self {
            address,
            data,
            padding,
        }
    }

    pub(crate) fn from_parts(address: Address, data: Vec<u8>, padding: Vec<u8>) -> Self {
        Self {
            address,
            data,
            padding,
        }
    }

    pub fn target(&self) -> Address {
        self.address
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replaces the string; padding is reset to zero bytes.
    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
        self.data = data.into();
        self.padding = vec![0; pad_len(self.data.len())];
    }

    pub fn padding(&self) -> &[u8] {
        &self.padding
    }
}

pub(crate) fn pad_len(len: usize) -> usize {
    (LINE_SIZE - len % LINE_SIZE) % LINE_SIZE
}

impl CommandBase for WriteString {
    fn kind(&self) -> CommandKind {
        CommandKind::WriteString
    }

    fn address(&self) -> u32 {
        self.address.raw()
    }

    fn mode(&self) -> AddressMode {
        self.address.mode()
    }

    fn describe(&self) -> String {
        let shown = self.data.iter().take(16).map(|b| format!("{b:02X}")).join(" ");
        let more = if self.data.len() > 16 { " ..." } else { "" };
        format!(
            "({:02X}) Write {} bytes to {}: {}{}",
            self.opcode(),
            self.data.len(),
            self.address,
            shown,
            more
        )
    }

    fn line_count(&self) -> usize {
        1 + (self.data.len() + self.padding.len()) / LINE_SIZE
    }
}

/// `08`: write a value repeatedly, stepping both address and value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSerial {
    address: Address,
    value: u32,
    width: WriteWidth,
    count: u16,
    address_step: u16,
    value_step: u32,
}

impl WriteSerial {
    /// `count` is the number of additional writes and is limited to 12 bits.
    pub fn new(
        address: Address,
        value: u32,
        width: WriteWidth,
        count: u16,
        address_step: u16,
        value_step: u32,
    ) -> Self {
        Self {
            address,
            value,
            width,
            count: count & 0x0FFF,
            address_step,
            value_step,
        }
    }

    pub fn target(&self) -> Address {
        self.address
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn width(&self) -> WriteWidth {
        self.width
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    pub fn address_step(&self) -> u16 {
        self.address_step
    }

    pub fn value_step(&self) -> u32 {
        self.value_step
    }

    pub(crate) fn second_line(&self) -> (u32, u32) {
        let word = (self.width as u32) << 28 | (self.count as u32) << 16 | self.address_step as u32;
        (word, self.value_step)
    }
}

impl CommandBase for WriteSerial {
    fn kind(&self) -> CommandKind {
        CommandKind::WriteSerial
    }

    fn address(&self) -> u32 {
        self.address.raw()
    }

    fn mode(&self) -> AddressMode {
        self.address.mode()
    }

    fn describe(&self) -> String {
        format!(
            "({:02X}) Write {} {} to {}, then {} more times stepping the address by 0x{:04X} and the value by 0x{:08X}",
            self.opcode(),
            self.width.name(),
            self.width.format_value(self.value),
            self.address,
            self.count,
            self.address_step,
            self.value_step
        )
    }

    fn line_count(&self) -> usize {
        2
    }
}
