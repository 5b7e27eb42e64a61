use serde::{Deserialize, Serialize};

use super::block::describe_reload;
use super::{CommandBase, CommandKind};

/// `E0` full terminator or `F0` end of list.
///
/// Either one closes every open block. `E0000000 XXXXYYYY` also reloads the
/// high halves of ba and po when `XXXX`/`YYYY` are non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminator {
    kind: CommandKind,
    bits: u32,
    value: u32,
}

impl Default for Terminator {
    /// `E0000000 80008000`, the usual last line of a code.
    fn default() -> Self {
        Self::with_registers(0x8000, 0x8000)
    }
}

impl Terminator {
    pub fn new() -> Self {
        Self::with_registers(0, 0)
    }

    pub fn with_registers(ba_high: u16, po_high: u16) -> Self {
        Self {
            kind: CommandKind::Terminator,
            bits: 0,
            value: (ba_high as u32) << 16 | po_high as u32,
        }
    }

    pub fn exit() -> Self {
        Self {
            kind: CommandKind::Exit,
            bits: 0,
            value: 0,
        }
    }

    pub(crate) fn from_words(kind: CommandKind, metadata: u32, value: u32) -> Self {
        Self {
            kind,
            bits: metadata & 0x00FF_FFFF,
            value,
        }
    }

    pub(crate) fn words(&self) -> (u32, u32) {
        ((self.kind.base_opcode() as u32) << 24 | self.bits, self.value)
    }

    pub fn is_exit(&self) -> bool {
        self.kind == CommandKind::Exit
    }

    pub fn ba_high(&self) -> u16 {
        (self.value >> 16) as u16
    }

    pub fn po_high(&self) -> u16 {
        self.value as u16
    }
}

impl CommandBase for Terminator {
    fn kind(&self) -> CommandKind {
        self.kind
    }

    fn describe(&self) -> String {
        if self.is_exit() {
            return format!("({:02X}) End of the code list, the code handler exits", self.opcode());
        }
        format!(
            "({:02X}) Clear the code execution status{}",
            self.opcode(),
            describe_reload(self.ba_high(), self.po_high())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_resets_both_registers() {
        let term = Terminator::default();
        assert_eq!(term.words(), (0xE000_0000, 0x8000_8000));
        assert_eq!(
            term.describe(),
            "(E0) Clear the code execution status, set ba to 0x80000000, set po to 0x80000000"
        );
    }

    #[test]
    fn exit_line() {
        assert_eq!(Terminator::exit().words(), (0xF000_0000, 0));
    }
}
