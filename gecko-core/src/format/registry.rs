//! Opcode dispatch table.
//!
//! The first byte of every command header selects its kind. Below 0xF0 the
//! byte also carries the pointer flag (0x10) and bit 24 of the address (0x01);
//! from 0xF0 upwards only bit 0 is outside the opcode.

use num_traits::FromPrimitive;
use once_cell::sync::Lazy;

use super::address::AddressMode;
use super::command::CommandKind;
use crate::error::{GeckoError, Result};

/// Where a command keeps the size of its trailing payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    None,
    /// Byte count in the value word, padded up to a whole line.
    BytesInValue,
    /// Line count in the value word.
    LinesInValue,
    /// Line count in the low byte of the value word.
    LinesInValueLowByte,
    /// Line count in the low byte of the metadata word.
    LinesInHeaderLowByte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub kind: CommandKind,
    /// Lines taken by the header itself, payload excluded.
    pub header_lines: usize,
    pub payload: PayloadShape,
    pub is_block_open: bool,
    pub is_block_close: bool,
    /// Whether the low 25 bits of the metadata word are an address.
    pub has_address: bool,
}

impl CommandDescriptor {
    const fn line(kind: CommandKind) -> Self {
        Self {
            kind,
            header_lines: 1,
            payload: PayloadShape::None,
            is_block_open: false,
            is_block_close: false,
            has_address: true,
        }
    }

    const fn opener(kind: CommandKind) -> Self {
        Self {
            is_block_open: true,
            ..Self::line(kind)
        }
    }

    const fn closer(kind: CommandKind) -> Self {
        Self {
            is_block_close: true,
            has_address: false,
            ..Self::line(kind)
        }
    }

    const fn payload(kind: CommandKind, payload: PayloadShape) -> Self {
        Self {
            payload,
            ..Self::line(kind)
        }
    }
}

use CommandKind as K;
use PayloadShape as P;

/// The Gecko code handler's command set.
pub const OPCODE_TABLE: &[CommandDescriptor] = &[
    CommandDescriptor::line(K::Write8),
    CommandDescriptor::line(K::Write16),
    CommandDescriptor::line(K::Write32),
    CommandDescriptor::payload(K::WriteString, P::BytesInValue),
    CommandDescriptor {
        header_lines: 2,
        ..CommandDescriptor::line(K::WriteSerial)
    },
    CommandDescriptor::opener(K::IfEqual32),
    CommandDescriptor::opener(K::IfNotEqual32),
    CommandDescriptor::opener(K::IfGreater32),
    CommandDescriptor::opener(K::IfLess32),
    CommandDescriptor::opener(K::IfEqual16),
    CommandDescriptor::opener(K::IfNotEqual16),
    CommandDescriptor::opener(K::IfGreater16),
    CommandDescriptor::opener(K::IfLess16),
    CommandDescriptor::line(K::BaseAddressLoad),
    CommandDescriptor::line(K::BaseAddressSet),
    CommandDescriptor::line(K::BaseAddressStore),
    CommandDescriptor::line(K::BaseAddressGetNext),
    CommandDescriptor::line(K::PointerAddressLoad),
    CommandDescriptor::line(K::PointerAddressSet),
    CommandDescriptor::line(K::PointerAddressStore),
    CommandDescriptor::line(K::PointerAddressGetNext),
    CommandDescriptor::line(K::RepeatSet),
    CommandDescriptor::line(K::RepeatExecute),
    CommandDescriptor::line(K::Return),
    CommandDescriptor::line(K::Goto),
    CommandDescriptor::line(K::Gosub),
    CommandDescriptor::line(K::RegisterSet),
    CommandDescriptor::line(K::RegisterLoad),
    CommandDescriptor::line(K::RegisterStore),
    CommandDescriptor::line(K::RegisterOperateImmediate),
    CommandDescriptor::line(K::RegisterOperate),
    CommandDescriptor::line(K::MemoryCopyTo),
    CommandDescriptor::line(K::MemoryCopyFrom),
    CommandDescriptor::opener(K::RegisterIfEqual16),
    CommandDescriptor::opener(K::RegisterIfNotEqual16),
    CommandDescriptor::opener(K::RegisterIfGreater16),
    CommandDescriptor::opener(K::RegisterIfLess16),
    CommandDescriptor::opener(K::CounterIfEqual16),
    CommandDescriptor::opener(K::CounterIfNotEqual16),
    CommandDescriptor::opener(K::CounterIfGreater16),
    CommandDescriptor::opener(K::CounterIfLess16),
    CommandDescriptor::payload(K::AsmExecute, P::LinesInValue),
    CommandDescriptor::payload(K::AsmInsert, P::LinesInValue),
    CommandDescriptor::payload(K::AsmInsertLink, P::LinesInValue),
    CommandDescriptor::line(K::WriteBranch),
    CommandDescriptor::line(K::Switch),
    CommandDescriptor::opener(K::AddressRangeCheck),
    CommandDescriptor::closer(K::Terminator),
    CommandDescriptor::closer(K::Endif),
    CommandDescriptor::closer(K::Exit),
    CommandDescriptor::payload(K::AsmInsertXor, P::LinesInValueLowByte),
    CommandDescriptor {
        payload: P::LinesInHeaderLowByte,
        has_address: false,
        ..CommandDescriptor::opener(K::Search)
    },
];

/// A resolved opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub descriptor: CommandDescriptor,
    pub mode: AddressMode,
}

static STANDARD: Lazy<Registry> = Lazy::new(|| Registry::new(OPCODE_TABLE));

/// Opcode byte to descriptor mapping, built once from a descriptor table.
#[derive(Debug, Clone)]
pub struct Registry {
    slots: Vec<Option<OpcodeInfo>>,
}

impl Registry {
    pub fn new(table: &[CommandDescriptor]) -> Self {
        let slots = (0..=u8::MAX)
            .map(|byte| {
                let (kind, mode) = Self::normalize(byte)?;
                let descriptor = table.iter().find(|d| d.kind == kind)?;
                Some(OpcodeInfo {
                    descriptor: *descriptor,
                    mode,
                })
            })
            .collect();
        Self { slots }
    }

    /// The registry for the standard code handler.
    pub fn standard() -> &'static Registry {
        &STANDARD
    }

    fn normalize(byte: u8) -> Option<(CommandKind, AddressMode)> {
        if byte >= 0xF0 {
            match byte & 0xFE {
                0xF4 => Some((CommandKind::AsmInsertXor, AddressMode::Pointer)),
                base => CommandKind::from_u8(base).map(|kind| (kind, AddressMode::Absolute)),
            }
        } else {
            let mode = if byte & 0x10 != 0 {
                AddressMode::Pointer
            } else {
                AddressMode::Absolute
            };
            CommandKind::from_u8(byte & 0xEE).map(|kind| (kind, mode))
        }
    }

    #[inline]
    pub fn get(&self, opcode: u8) -> Option<&OpcodeInfo> {
        self.slots[opcode as usize].as_ref()
    }

    /// Like [`Self::get`], reporting an unknown byte as found at `offset`.
    pub fn lookup(&self, opcode: u8, offset: usize) -> Result<&OpcodeInfo> {
        self.get(opcode)
            .ok_or(GeckoError::UnknownOpcode { opcode, offset })
    }

    pub fn descriptor(&self, kind: CommandKind) -> Option<&CommandDescriptor> {
        self.get(kind.base_opcode()).map(|info| &info.descriptor)
    }

    /// Opcode byte for `kind`, bit 24 of the address excluded.
    ///
    /// Kinds at or above 0xE0 have no pointer form apart from
    /// [`CommandKind::AsmInsertXor`]; their `mode` is ignored.
    pub fn opcode_for(&self, kind: CommandKind, mode: AddressMode) -> u8 {
        opcode_for(kind, mode)
    }
}

pub(crate) fn opcode_for(kind: CommandKind, mode: AddressMode) -> u8 {
    match (kind, mode) {
        (CommandKind::AsmInsertXor, AddressMode::Pointer) => 0xF4,
        (kind, AddressMode::Pointer) if kind.base_opcode() < 0xE0 => kind.base_opcode() | 0x10,
        (kind, _) => kind.base_opcode(),
    }
}
