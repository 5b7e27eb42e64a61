use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::{Block, CommandBase, CommandKind};
use crate::error::{GeckoError, Result};
use crate::format::address::{Address, AddressMode};
use crate::format::LINE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize)]
pub enum Comparison {
    Equal = 0,
    NotEqual = 1,
    Greater = 2,
    Less = 3,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
            Comparison::Greater => ">",
            Comparison::Less => "<",
        }
    }
}

/// What a conditional compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionSource {
    Memory32,
    Memory16,
    Register16,
    Counter16,
    AddressRange,
}

impl ConditionSource {
    fn of(kind: CommandKind) -> Option<Self> {
        match kind.base_opcode() {
            0x20..=0x26 => Some(ConditionSource::Memory32),
            0x28..=0x2E => Some(ConditionSource::Memory16),
            0xA0..=0xA6 => Some(ConditionSource::Register16),
            0xA8..=0xAE => Some(ConditionSource::Counter16),
            0xCE => Some(ConditionSource::AddressRange),
            _ => None,
        }
    }

    fn base(self) -> u8 {
        match self {
            ConditionSource::Memory32 => 0x20,
            ConditionSource::Memory16 => 0x28,
            ConditionSource::Register16 => 0xA0,
            ConditionSource::Counter16 => 0xA8,
            ConditionSource::AddressRange => 0xCE,
        }
    }
}

/// A block-opening comparison: `20`–`2E`, `A0`–`AE` and `CE`.
///
/// Bit 0 of the address is the "apply endif" flag: the code handler closes
/// the innermost open block before evaluating this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditional {
    kind: CommandKind,
    address: Address,
    value: u32,
    body: Block,
}

impl Conditional {
    pub fn new(kind: CommandKind, address: Address, value: u32) -> Result<Self> {
        if !kind.is_conditional() {
            return Err(GeckoError::MalformedHeader(format!(
                "{kind} does not open a conditional block"
            )));
        }
        Ok(Self::from_parts(kind, address, value))
    }

    pub(crate) fn from_parts(kind: CommandKind, address: Address, value: u32) -> Self {
        Self {
            kind,
            address,
            value,
            body: Block::new(),
        }
    }

    fn compare_kind(source: ConditionSource, comparison: Comparison) -> CommandKind {
        let opcode = source.base() + ((comparison as u8) << 1);
        // base + 0..6 stays inside one family of the table
        CommandKind::from_u8(opcode).unwrap_or(CommandKind::IfEqual32)
    }

    /// Compare the word at `address` against `value`.
    pub fn if32(comparison: Comparison, address: Address, value: u32) -> Self {
        Self::from_parts(
            Self::compare_kind(ConditionSource::Memory32, comparison),
            address.with_low_bit(false),
            value,
        )
    }

    /// Compare the halfword at `address`, with the bits of `mask` cleared,
    /// against `value`.
    pub fn if16(comparison: Comparison, address: Address, value: u16, mask: u16) -> Self {
        Self::from_parts(
            Self::compare_kind(ConditionSource::Memory16, comparison),
            address.with_low_bit(false),
            (mask as u32) << 16 | value as u32,
        )
    }

    /// Compare the halfwords addressed by two gecko registers.
    pub fn register_if16(
        comparison: Comparison,
        address: Address,
        register: u8,
        other: u8,
        mask: u16,
    ) -> Self {
        let value = ((register & 0xF) as u32) << 28 | ((other & 0xF) as u32) << 24 | mask as u32;
        Self::from_parts(
            Self::compare_kind(ConditionSource::Register16, comparison),
            address.with_low_bit(false),
            value,
        )
    }

    /// Check that ba (or po, for a pointer address) lies in
    /// `[start << 16, end << 16)`.
    pub fn address_range(mode: AddressMode, start: u16, end: u16) -> Self {
        Self::from_parts(
            CommandKind::AddressRangeCheck,
            Address::new(0, mode),
            (start as u32) << 16 | end as u32,
        )
    }

    pub fn with_endif(mut self, apply: bool) -> Self {
        self.set_applies_endif(apply);
        self
    }

    pub fn source(&self) -> ConditionSource {
        ConditionSource::of(self.kind).unwrap_or(ConditionSource::Memory32)
    }

    pub fn comparison(&self) -> Option<Comparison> {
        match self.source() {
            ConditionSource::AddressRange => None,
            _ => Comparison::from_u8((self.kind.base_opcode() >> 1) & 3),
        }
    }

    pub fn target(&self) -> Address {
        self.address
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Bits cleared before a 16-bit comparison.
    pub fn mask(&self) -> u16 {
        match self.source() {
            ConditionSource::Memory32 | ConditionSource::AddressRange => 0,
            _ => (self.value >> 16) as u16,
        }
    }

    pub fn applies_endif(&self) -> bool {
        self.address.raw() & 1 != 0
    }

    pub fn set_applies_endif(&mut self, apply: bool) {
        self.address = self.address.with_low_bit(apply);
    }

    pub fn body(&self) -> &Block {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Block {
        &mut self.body
    }

    pub fn with_children<C, I>(mut self, children: I) -> Self
    where
        C: Into<super::Command>,
        I: IntoIterator<Item = C>,
    {
        for child in children {
            self.body.push(child);
        }
        self
    }

    fn register_name(mode: AddressMode) -> &'static str {
        match mode {
            AddressMode::Absolute => "ba",
            AddressMode::Pointer => "po",
        }
    }
}

impl CommandBase for Conditional {
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
        let endif = if self.applies_endif() { "(Apply Endif) " } else { "" };
        let symbol = self.comparison().map(Comparison::symbol).unwrap_or("");
        let target = self.address.with_low_bit(false);
        let condition = match self.source() {
            ConditionSource::Memory32 => {
                format!("the word at {target} {symbol} 0x{:08X}", self.value)
            }
            ConditionSource::Memory16 => format!(
                "the halfword at {target} & !0x{:04X} {symbol} 0x{:04X}",
                self.mask(),
                self.value & 0xFFFF
            ),
            ConditionSource::Register16 => format!(
                "the halfword at [gr{}] & !0x{:04X} {symbol} the halfword at [gr{}]",
                self.value >> 28,
                self.mask(),
                (self.value >> 24) & 0xF
            ),
            ConditionSource::Counter16 => format!(
                "the counter at {target} & !0x{:04X} {symbol} 0x{:04X}",
                self.mask(),
                self.value & 0xFFFF
            ),
            ConditionSource::AddressRange => format!(
                "0x{:04X}0000 <= {} < 0x{:04X}0000",
                self.value >> 16,
                Self::register_name(self.mode()),
                self.value & 0xFFFF
            ),
        };
        format!("({:02X}) {endif}If {condition}:", self.opcode())
    }

    fn line_count(&self) -> usize {
        1 + self.body.line_count()
    }
}

/// `F6`: search memory for a pattern and run the body with po set to the
/// match.
///
/// `F60000NN XXXXYYYY` followed by `NN` pattern lines; the search covers
/// `[XXXX << 16, YYYY << 16)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Search {
    flags: u16,
    range: u32,
    pattern: Vec<u8>,
    body: Block,
}

impl Search {
    /// The pattern is zero-padded to whole lines and may not exceed 255 lines.
    pub fn new(start: u16, end: u16, pattern: impl Into<Vec<u8>>) -> Result<Self> {
        let mut pattern = pattern.into();
        pattern.resize(pattern.len().div_ceil(LINE_SIZE) * LINE_SIZE, 0);
        if pattern.len() / LINE_SIZE > u8::MAX as usize {
            return Err(GeckoError::MalformedHeader(format!(
                "search pattern of {} lines does not fit a one-byte line count",
                pattern.len() / LINE_SIZE
            )));
        }
        Ok(Self::from_parts(0, (start as u32) << 16 | end as u32, pattern))
    }

    pub(crate) fn from_parts(flags: u16, range: u32, pattern: Vec<u8>) -> Self {
        Self {
            flags,
            range,
            pattern,
            body: Block::new(),
        }
    }

    pub(crate) fn words(&self) -> (u32, u32) {
        let lines = (self.pattern.len() / LINE_SIZE) as u32;
        let metadata = (CommandKind::Search.base_opcode() as u32) << 24
            | (self.flags as u32) << 8
            | (lines & 0xFF);
        (metadata, self.range)
    }

    pub fn range(&self) -> (u16, u16) {
        ((self.range >> 16) as u16, self.range as u16)
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    pub fn body(&self) -> &Block {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Block {
        &mut self.body
    }
}

impl CommandBase for Search {
    fn kind(&self) -> CommandKind {
        CommandKind::Search
    }

    fn describe(&self) -> String {
        let (start, end) = self.range();
        format!(
            "({:02X}) If a {}-line pattern is found between 0x{start:04X}0000 and 0x{end:04X}0000, set po to the match and run:",
            self.opcode(),
            self.pattern.len() / LINE_SIZE
        )
    }

    fn line_count(&self) -> usize {
        1 + self.pattern.len() / LINE_SIZE + self.body.line_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn comparison_selects_opcode() {
        let cond = Conditional::if32(Comparison::Less, Address::absolute(0x8000_1000), 5);
        assert_eq!(cond.kind(), CommandKind::IfLess32);
        let cond = Conditional::if16(Comparison::NotEqual, Address::pointer(0x10), 1, 0xFF00);
        assert_eq!(cond.kind(), CommandKind::IfNotEqual16);
        assert_eq!(cond.opcode(), 0x3A);
        assert_eq!(cond.mask(), 0xFF00);
        assert_eq!(cond.comparison(), Some(Comparison::NotEqual));
    }

    #[test]
    fn endif_flag_lives_in_address() {
        let cond = Conditional::if32(Comparison::Equal, Address::absolute(0x8000_1000), 0)
            .with_endif(true);
        assert!(cond.applies_endif());
        assert_eq!(cond.address(), 0x1001);
        assert_eq!(
            cond.describe(),
            "(20) (Apply Endif) If the word at 0x80001000 == 0x00000000:"
        );
    }

    #[test]
    fn new_rejects_non_conditionals() {
        assert!(Conditional::new(CommandKind::Write32, Address::default(), 0).is_err());
        assert!(Conditional::new(CommandKind::CounterIfLess16, Address::default(), 0).is_ok());
    }

    #[test]
    fn search_pads_pattern() {
        let search = Search::new(0x8000, 0x8180, vec![0x38, 0x60, 0x00, 0x01]).unwrap();
        assert_eq!(search.pattern().len(), 8);
        assert_eq!(search.words(), (0xF600_0001, 0x8000_8180));
        assert_eq!(search.line_count(), 3);

        let too_long = Search::new(0, 0, vec![0; 256 * 8]);
        assert!(matches!(too_long, Err(GeckoError::MalformedHeader(_))));
    }
}
