//! The command tree.
//!
//! [`Command`] is a closed enum over the command shapes. Only the
//! block-opening variants ([`Conditional`] and [`Search`]) own children,
//! through their [`Block`].

mod asm;
mod block;
mod conditional;
mod kind;
mod operation;
mod terminator;
mod write;

use std::fmt;

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use super::address::AddressMode;
use super::registry;

pub use asm::{AsmBlock, AsmInsertXor};
pub use block::{BareEndif, Block, BlockEnd, Endif};

pub(crate) use block::{decode_endif, EndifLine};
pub use conditional::{Comparison, ConditionSource, Conditional, Search};
pub use kind::CommandKind;
pub use operation::{Arithmetic, Operation};
pub use terminator::Terminator;
pub use write::{Write, WriteSerial, WriteString, WriteWidth};

pub(crate) use write::pad_len;

#[enum_dispatch]
pub trait CommandBase {
    fn kind(&self) -> CommandKind;

    /// Raw 25-bit address field, before flag decoding.
    fn address(&self) -> u32 {
        0
    }

    fn mode(&self) -> AddressMode {
        AddressMode::Absolute
    }

    /// Opcode byte as encoded, address bit 24 excluded.
    fn opcode(&self) -> u8 {
        registry::opcode_for(self.kind(), self.mode())
    }

    fn mnemonic(&self) -> &'static str {
        self.kind().mnemonic()
    }

    /// One-line human readable description.
    fn describe(&self) -> String;

    /// Encoded size in lines, children and block closer included.
    fn line_count(&self) -> usize {
        1
    }
}

#[enum_dispatch(CommandBase)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Write(Write),
    WriteString(WriteString),
    WriteSerial(WriteSerial),
    Conditional(Conditional),
    Search(Search),
    Operation(Operation),
    AsmBlock(AsmBlock),
    AsmInsertXor(AsmInsertXor),
    BareEndif(BareEndif),
    Terminator(Terminator),
}

impl Command {
    pub fn block(&self) -> Option<&Block> {
        match self {
            Command::Conditional(c) => Some(c.body()),
            Command::Search(s) => Some(s.body()),
            _ => None,
        }
    }

    pub fn block_mut(&mut self) -> Option<&mut Block> {
        match self {
            Command::Conditional(c) => Some(c.body_mut()),
            Command::Search(s) => Some(s.body_mut()),
            _ => None,
        }
    }

    pub fn is_block(&self) -> bool {
        self.block().is_some()
    }

    pub fn is_terminator(&self) -> bool {
        self.kind().is_terminator()
    }

    /// Appends the description of this command and its subtree to `out`,
    /// one line per command, two spaces of indent per level.
    pub fn render_map(&self, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.describe());
        out.push('\n');
        if let Some(block) = self.block() {
            for child in block.children() {
                child.render_map(depth + 1, out);
            }
            if let BlockEnd::Endif(endif) = block.end() {
                out.push_str(&"  ".repeat(depth + 1));
                out.push_str(&endif.describe());
                out.push('\n');
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::address::Address;
    use pretty_assertions::assert_eq;

    #[test]
    fn only_blocks_have_children() {
        let mut write: Command = Write::word(Address::absolute(0x8000_0000), 0).into();
        assert!(write.block_mut().is_none());

        let mut cond: Command =
            Conditional::if32(Comparison::Equal, Address::absolute(0x8000_0000), 0).into();
        cond.block_mut()
            .unwrap()
            .push(Write::byte(Address::absolute(0x8000_0010), 1, 0));
        assert_eq!(cond.block().unwrap().len(), 1);
        assert_eq!(cond.line_count(), 3);
    }

    #[test]
    fn map_indents_children() {
        let cond = Conditional::if32(Comparison::Equal, Address::absolute(0x8000_1000), 1)
            .with_children([Write::word(Address::absolute(0x8000_2000), 2)]);
        let mut map = String::new();
        Command::from(cond).render_map(0, &mut map);
        assert_eq!(
            map,
            "(20) If the word at 0x80001000 == 0x00000001:\n\
             \x20 (04) Write word 0x00000002 to 0x80002000\n\
             \x20 (E2) Apply 1 endif\n"
        );
    }

    #[test]
    fn kind_and_mnemonic() {
        let term: Command = Terminator::default().into();
        assert_eq!(term.kind(), CommandKind::Terminator);
        assert_eq!(term.mnemonic(), "terminator");
        assert!(term.is_terminator());
    }
}
