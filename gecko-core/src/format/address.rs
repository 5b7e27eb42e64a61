//! Address field of a command header.
//!
//! A header stores 25 address bits: the low 24 bits of the metadata word plus
//! bit 0 of the opcode byte. Bit 4 of the opcode byte selects whether the
//! address is taken from the base address register (which the code handler
//! initialises to the start of RAM) or from the pointer register.

use serde::{Deserialize, Serialize};

use crate::error::{GeckoError, Result};

/// Bits of the metadata word that belong to the address.
pub const ADDRESS_MASK: u32 = 0x01FF_FFFF;

/// Start of main memory; absolute addresses are offsets from here.
pub const RAM_BASE: u32 = 0x8000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressMode {
    #[default]
    Absolute,
    Pointer,
}

impl AddressMode {
    pub fn from_flag(flag: u8) -> Result<Self> {
        match flag {
            0 => Ok(AddressMode::Absolute),
            1 => Ok(AddressMode::Pointer),
            _ => Err(GeckoError::MalformedHeader(format!(
                "address flag nibble 0x{flag:X} is neither absolute (0) nor pointer (1)"
            ))),
        }
    }

    pub fn flag(self) -> u8 {
        match self {
            AddressMode::Absolute => 0,
            AddressMode::Pointer => 1,
        }
    }
}

/// Translate a stored address plus its flag nibble into an effective address.
///
/// For [`AddressMode::Pointer`] the result is the offset the code handler adds
/// to the pointer register.
pub fn decode_address(raw: u32, flag_nibble: u8) -> Result<(u32, AddressMode)> {
    let mode = AddressMode::from_flag(flag_nibble)?;
    let effective = match mode {
        AddressMode::Absolute => RAM_BASE | (raw & ADDRESS_MASK),
        AddressMode::Pointer => raw & ADDRESS_MASK,
    };
    Ok((effective, mode))
}

pub fn encode_address(effective: u32, mode: AddressMode) -> (u32, u8) {
    (effective & ADDRESS_MASK, mode.flag())
}

/// The address carried by a command header, kept exactly as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Address {
    raw: u32,
    mode: AddressMode,
}

impl Address {
    pub fn new(raw: u32, mode: AddressMode) -> Self {
        Self {
            raw: raw & ADDRESS_MASK,
            mode,
        }
    }

    pub fn absolute(effective: u32) -> Self {
        let (raw, _) = encode_address(effective, AddressMode::Absolute);
        Self::new(raw, AddressMode::Absolute)
    }

    pub fn pointer(offset: u32) -> Self {
        let (raw, _) = encode_address(offset, AddressMode::Pointer);
        Self::new(raw, AddressMode::Pointer)
    }

    #[inline]
    pub fn raw(&self) -> u32 {
        self.raw
    }

    #[inline]
    pub fn mode(&self) -> AddressMode {
        self.mode
    }

    pub fn effective(&self) -> u32 {
        match self.mode {
            AddressMode::Absolute => RAM_BASE | self.raw,
            AddressMode::Pointer => self.raw,
        }
    }

    pub(crate) fn with_low_bit(self, set: bool) -> Self {
        let raw = if set { self.raw | 1 } else { self.raw & !1 };
        Self { raw, ..self }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            AddressMode::Absolute => write!(f, "0x{:08X}", self.effective()),
            AddressMode::Pointer => write!(f, "[po + 0x{:07X}]", self.raw),
        }
    }
}
