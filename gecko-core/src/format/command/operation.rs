use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::{CommandBase, CommandKind};
use crate::error::{GeckoError, Result};
use crate::format::address::{Address, AddressMode};

/// Gecko register arithmetic, selected by the `T` nibble of `86`/`88`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Arithmetic {
    Add = 0,
    Multiply = 1,
    Or = 2,
    And = 3,
    Xor = 4,
    ShiftLeft = 5,
    ShiftRight = 6,
    RotateLeft = 7,
    ArithmeticShiftRight = 8,
    FloatAdd = 9,
    FloatMultiply = 10,
}

impl Arithmetic {
    fn verb(self) -> &'static str {
        match self {
            Arithmetic::Add => "Add",
            Arithmetic::Multiply => "Multiply",
            Arithmetic::Or => "OR",
            Arithmetic::And => "AND",
            Arithmetic::Xor => "XOR",
            Arithmetic::ShiftLeft => "Shift left",
            Arithmetic::ShiftRight => "Shift right",
            Arithmetic::RotateLeft => "Rotate left",
            Arithmetic::ArithmeticShiftRight => "Arithmetic shift right",
            Arithmetic::FloatAdd => "Float add",
            Arithmetic::FloatMultiply => "Float multiply",
        }
    }
}

/// Single-line commands with no payload and no scope: address register
/// loads and stores, flow control, gecko register operations, branch
/// writes and the execution status switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    kind: CommandKind,
    address: Address,
    value: u32,
}

fn is_operation(kind: CommandKind) -> bool {
    matches!(
        kind.base_opcode(),
        0x40..=0x4E | 0x60..=0x68 | 0x80..=0x8C | 0xC6 | 0xCC
    )
}

impl Operation {
    pub fn new(kind: CommandKind, address: Address, value: u32) -> Result<Self> {
        if !is_operation(kind) {
            return Err(GeckoError::MalformedHeader(format!(
                "{kind} is not a single-line operation"
            )));
        }
        Ok(Self::from_parts(kind, address, value))
    }

    pub(crate) fn from_parts(kind: CommandKind, address: Address, value: u32) -> Self {
        Self {
            kind,
            address,
            value,
        }
    }

    pub fn base_address_set(value: u32) -> Self {
        Self::from_parts(CommandKind::BaseAddressSet, Address::default(), value)
    }

    pub fn pointer_address_set(value: u32) -> Self {
        Self::from_parts(CommandKind::PointerAddressSet, Address::default(), value)
    }

    /// Stores the next code address and `count` in block register `block`.
    pub fn repeat_set(count: u16, block: u8) -> Self {
        Self::from_parts(
            CommandKind::RepeatSet,
            Address::new(count as u32, AddressMode::Absolute),
            (block & 0xF) as u32,
        )
    }

    pub fn repeat_execute(block: u8) -> Self {
        Self::from_parts(CommandKind::RepeatExecute, Address::default(), (block & 0xF) as u32)
    }

    pub fn register_set(register: u8, value: u32) -> Self {
        Self::from_parts(
            CommandKind::RegisterSet,
            Address::new((register & 0xF) as u32, AddressMode::Absolute),
            value,
        )
    }

    pub fn write_branch(address: Address, destination: u32) -> Self {
        Self::from_parts(CommandKind::WriteBranch, address, destination)
    }

    pub fn switch() -> Self {
        Self::from_parts(CommandKind::Switch, Address::default(), 0)
    }

    pub fn target(&self) -> Address {
        self.address
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Gecko register selected by the low nibble of the metadata word.
    pub fn register(&self) -> u8 {
        (self.address.raw() & 0xF) as u8
    }

    /// Block register selected by the low nibble of the value word.
    pub fn block_register(&self) -> u8 {
        (self.value & 0xF) as u8
    }

    /// `TYZ` flag nibbles of the address register commands.
    pub fn flags(&self) -> u16 {
        ((self.address.raw() >> 12) & 0xFFF) as u16
    }

    fn condition(&self) -> &'static str {
        match (self.address.raw() >> 20) & 0xF {
            0 => "If the code execution status is true, ",
            1 => "If the code execution status is false, ",
            _ => "",
        }
    }

    fn jump_offset(&self) -> i16 {
        self.address.raw() as u16 as i16
    }

    fn arithmetic(&self) -> Option<Arithmetic> {
        Arithmetic::from_u32((self.address.raw() >> 20) & 0xF)
    }

    fn describe_register_op(&self, operand: String) -> String {
        match self.arithmetic() {
            Some(op) => format!("{} gecko register {} with {operand}", op.verb(), self.register()),
            None => format!(
                "Apply unknown operation {:X} to gecko register {}",
                (self.address.raw() >> 20) & 0xF,
                self.register()
            ),
        }
    }
}

impl CommandBase for Operation {
    fn kind(&self) -> CommandKind {
        self.kind
    }

    fn address(&self) -> u32 {
        self.address.raw()
    }

    fn mode(&self) -> AddressMode {
        self.address.mode()
    }

    fn describe(&self) -> String {
        let value = self.value;
        let text = match self.kind {
            CommandKind::BaseAddressLoad => {
                format!("Load ba from [0x{value:08X}] (flags 0x{:03X})", self.flags())
            }
            CommandKind::BaseAddressSet => {
                format!("Set ba to 0x{value:08X} (flags 0x{:03X})", self.flags())
            }
            CommandKind::BaseAddressStore => {
                format!("Store ba at [0x{value:08X}] (flags 0x{:03X})", self.flags())
            }
            CommandKind::BaseAddressGetNext => format!(
                "Set ba to the next code's address + 0x{:04X}",
                self.address.raw() & 0xFFFF
            ),
            CommandKind::PointerAddressLoad => {
                format!("Load po from [0x{value:08X}] (flags 0x{:03X})", self.flags())
            }
            CommandKind::PointerAddressSet => {
                format!("Set po to 0x{value:08X} (flags 0x{:03X})", self.flags())
            }
            CommandKind::PointerAddressStore => {
                format!("Store po at [0x{value:08X}] (flags 0x{:03X})", self.flags())
            }
            CommandKind::PointerAddressGetNext => format!(
                "Set po to the next code's address + 0x{:04X}",
                self.address.raw() & 0xFFFF
            ),
            CommandKind::RepeatSet => format!(
                "Store the next code address and repeat count {} in b{}",
                self.address.raw() & 0xFFFF,
                self.block_register()
            ),
            CommandKind::RepeatExecute => format!(
                "If the count in b{} is non-zero, decrement it and jump to its address",
                self.block_register()
            ),
            CommandKind::Return => format!(
                "{}Jump to the address stored in b{}",
                self.condition(),
                self.block_register()
            ),
            CommandKind::Goto => format!(
                "{}Jump {} lines from the next line",
                self.condition(),
                self.jump_offset()
            ),
            CommandKind::Gosub => format!(
                "{}Store the next code address in b{} and jump {} lines",
                self.condition(),
                self.block_register(),
                self.jump_offset()
            ),
            CommandKind::RegisterSet => {
                format!("Set gecko register {} to 0x{value:08X}", self.register())
            }
            CommandKind::RegisterLoad => {
                format!("Load gecko register {} from [0x{value:08X}]", self.register())
            }
            CommandKind::RegisterStore => {
                format!("Store gecko register {} at [0x{value:08X}]", self.register())
            }
            CommandKind::RegisterOperateImmediate => {
                self.describe_register_op(format!("0x{value:08X}"))
            }
            CommandKind::RegisterOperate => {
                self.describe_register_op(format!("gecko register {}", value & 0xF))
            }
            CommandKind::MemoryCopyTo | CommandKind::MemoryCopyFrom => format!(
                "Copy 0x{:04X} bytes between [gr{}] and [gr{}] + 0x{value:08X}",
                (self.address.raw() >> 8) & 0xFFFF,
                (self.address.raw() >> 4) & 0xF,
                self.register()
            ),
            CommandKind::WriteBranch => {
                format!("Write a branch at {} to 0x{value:08X}", self.address)
            }
            CommandKind::Switch => "Toggle the code execution status".to_string(),
            kind => format!("{kind} 0x{:07X} 0x{value:08X}", self.address.raw()),
        };
        format!("({:02X}) {text}", self.opcode())
    }
}
