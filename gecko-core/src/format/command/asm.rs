use serde::{Deserialize, Serialize};

use super::{CommandBase, CommandKind};
use crate::error::{GeckoError, Result};
use crate::format::address::{Address, AddressMode};
use crate::format::LINE_SIZE;

const NOP: [u8; 4] = [0x60, 0x00, 0x00, 0x00];

/// Pads machine code to whole lines. A lone trailing instruction slot gets a
/// `nop`; anything else is zero-filled.
fn pad_instructions(mut code: Vec<u8>) -> Vec<u8> {
    if code.len() % LINE_SIZE == 4 {
        code.extend_from_slice(&NOP);
    }
    code.resize(code.len().div_ceil(LINE_SIZE) * LINE_SIZE, 0);
    code
}

/// `C0`/`C2`/`C4`: run or hook a block of PowerPC instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsmBlock {
    kind: CommandKind,
    address: Address,
    code: Vec<u8>,
}

impl AsmBlock {
    /// Executed by the code handler on every pass.
    pub fn execute(code: impl Into<Vec<u8>>) -> Self {
        Self::from_parts(CommandKind::AsmExecute, Address::default(), pad_instructions(code.into()))
    }

    /// Hooked at `address` with a plain branch.
    pub fn insert(address: Address, code: impl Into<Vec<u8>>) -> Self {
        Self::from_parts(CommandKind::AsmInsert, address, pad_instructions(code.into()))
    }

    /// Hooked at `address` with a linking branch.
    pub fn insert_link(address: Address, code: impl Into<Vec<u8>>) -> Self {
        Self::from_parts(CommandKind::AsmInsertLink, address, pad_instructions(code.into()))
    }

    pub(crate) fn from_parts(kind: CommandKind, address: Address, code: Vec<u8>) -> Self {
        Self {
            kind,
            address,
            code,
        }
    }

    pub fn target(&self) -> Address {
        self.address
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn set_code(&mut self, code: impl Into<Vec<u8>>) {
        self.code = pad_instructions(code.into());
    }

    pub fn lines(&self) -> usize {
        self.code.len() / LINE_SIZE
    }
}

impl CommandBase for AsmBlock {
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
        let lines = self.lines();
        match self.kind {
            CommandKind::AsmExecute => format!(
                "({:02X}) Execute {lines} lines of ASM once every pass",
                self.opcode()
            ),
            CommandKind::AsmInsertLink => format!(
                "({:02X}) Inject (bl / blr) {lines} lines of ASM at {}",
                self.opcode(),
                self.address
            ),
            _ => format!(
                "({:02X}) Inject (b / b) {lines} lines of ASM at {}",
                self.opcode(),
                self.address
            ),
        }
    }

    fn line_count(&self) -> usize {
        1 + self.lines()
    }
}

/// `F2`/`F4`: hook a block of instructions only if a checksum over the
/// halfwords around the hook matches.
///
/// `F2XXXXXX YYZZZZNN`: `YY` extra halfwords are XORed together with the one
/// at the hook and compared to `ZZZZ`; `NN` lines of code follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsmInsertXor {
    address: Address,
    checksum: u16,
    xor_count: u8,
    code: Vec<u8>,
}

impl AsmInsertXor {
    pub fn new(address: Address, checksum: u16, xor_count: u8, code: impl Into<Vec<u8>>) -> Result<Self> {
        let code = pad_instructions(code.into());
        if code.len() / LINE_SIZE > u8::MAX as usize {
            return Err(GeckoError::MalformedHeader(format!(
                "xor-checked insert of {} lines does not fit a one-byte line count",
                code.len() / LINE_SIZE
            )));
        }
        Ok(Self::from_parts(address, checksum, xor_count, code))
    }

    pub(crate) fn from_parts(address: Address, checksum: u16, xor_count: u8, code: Vec<u8>) -> Self {
        Self {
            address,
            checksum,
            xor_count,
            code,
        }
    }

    pub(crate) fn value_word(&self) -> u32 {
        (self.xor_count as u32) << 24 | (self.checksum as u32) << 8 | (self.lines() as u32 & 0xFF)
    }

    pub fn target(&self) -> Address {
        self.address
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn xor_count(&self) -> u8 {
        self.xor_count
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn lines(&self) -> usize {
        self.code.len() / LINE_SIZE
    }
}

impl CommandBase for AsmInsertXor {
    fn kind(&self) -> CommandKind {
        CommandKind::AsmInsertXor
    }

    fn address(&self) -> u32 {
        self.address.raw()
    }

    fn mode(&self) -> AddressMode {
        self.address.mode()
    }

    fn describe(&self) -> String {
        format!(
            "({:02X}) Inject (b / b) {} lines of ASM at {} if the halfword there XOR {} more equals 0x{:04X}",
            self.opcode(),
            self.lines(),
            self.address,
            self.xor_count,
            self.checksum
        )
    }

    fn line_count(&self) -> usize {
        1 + self.lines()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn odd_instruction_count_gets_nop() {
        let asm = AsmBlock::insert(Address::absolute(0x8000_3000), vec![0x38, 0x60, 0x00, 0x01]);
        assert_eq!(asm.code(), &[0x38, 0x60, 0x00, 0x01, 0x60, 0x00, 0x00, 0x00]);
        assert_eq!(asm.line_count(), 2);
        assert_eq!(
            asm.describe(),
            "(C2) Inject (b / b) 1 lines of ASM at 0x80003000"
        );
    }

    #[test]
    fn whole_lines_are_untouched() {
        let code = vec![0x4E, 0x80, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(AsmBlock::execute(code.clone()).code(), code.as_slice());
    }

    #[test]
    fn xor_value_word() {
        let asm = AsmInsertXor::new(Address::pointer(0x40), 0xBEEF, 2, vec![0; 16]).unwrap();
        assert_eq!(asm.value_word(), 0x02BE_EF02);
        assert_eq!(asm.opcode(), 0xF4);
    }
}
