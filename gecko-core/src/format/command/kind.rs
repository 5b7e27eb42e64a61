use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Command type tag. The discriminant is the base opcode byte: pointer bit
/// and address bit 24 cleared.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    FromPrimitive,
    strum::Display,
    strum::IntoStaticStr,
    strum::EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum CommandKind {
    Write8 = 0x00,
    Write16 = 0x02,
    Write32 = 0x04,
    WriteString = 0x06,
    WriteSerial = 0x08,

    IfEqual32 = 0x20,
    IfNotEqual32 = 0x22,
    IfGreater32 = 0x24,
    IfLess32 = 0x26,
    IfEqual16 = 0x28,
    IfNotEqual16 = 0x2A,
    IfGreater16 = 0x2C,
    IfLess16 = 0x2E,

    BaseAddressLoad = 0x40,
    BaseAddressSet = 0x42,
    BaseAddressStore = 0x44,
    BaseAddressGetNext = 0x46,
    PointerAddressLoad = 0x48,
    PointerAddressSet = 0x4A,
    PointerAddressStore = 0x4C,
    PointerAddressGetNext = 0x4E,

    RepeatSet = 0x60,
    RepeatExecute = 0x62,
    Return = 0x64,
    Goto = 0x66,
    Gosub = 0x68,

    RegisterSet = 0x80,
    RegisterLoad = 0x82,
    RegisterStore = 0x84,
    RegisterOperateImmediate = 0x86,
    RegisterOperate = 0x88,
    MemoryCopyTo = 0x8A,
    MemoryCopyFrom = 0x8C,

    RegisterIfEqual16 = 0xA0,
    RegisterIfNotEqual16 = 0xA2,
    RegisterIfGreater16 = 0xA4,
    RegisterIfLess16 = 0xA6,
    CounterIfEqual16 = 0xA8,
    CounterIfNotEqual16 = 0xAA,
    CounterIfGreater16 = 0xAC,
    CounterIfLess16 = 0xAE,

    AsmExecute = 0xC0,
    AsmInsert = 0xC2,
    AsmInsertLink = 0xC4,
    WriteBranch = 0xC6,
    Switch = 0xCC,
    AddressRangeCheck = 0xCE,

    Terminator = 0xE0,
    Endif = 0xE2,
    Exit = 0xF0,
    AsmInsertXor = 0xF2,
    Search = 0xF6,
}

impl CommandKind {
    #[inline]
    pub fn base_opcode(self) -> u8 {
        self as u8
    }

    pub fn is_conditional(self) -> bool {
        matches!(self as u8, 0x20..=0x2E | 0xA0..=0xAE | 0xCE)
    }

    /// Ends a code and closes every open block.
    pub fn is_terminator(self) -> bool {
        matches!(self, CommandKind::Terminator | CommandKind::Exit)
    }

    pub fn is_asm(self) -> bool {
        matches!(
            self,
            CommandKind::AsmExecute | CommandKind::AsmInsert | CommandKind::AsmInsertLink
        )
    }

    pub fn mnemonic(self) -> &'static str {
        self.into()
    }
}
