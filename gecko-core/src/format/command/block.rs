use serde::{Deserialize, Serialize};

use super::{Command, CommandBase, CommandKind};
use crate::error::{GeckoError, Result};

const ELSE_FLAG: u32 = 0x0010_0000;

/// Validates the `T` nibble of `E2T000VV` and returns the low 24 bits.
fn endif_bits(metadata: u32, value: u32) -> Result<u32> {
    let bits = metadata & 0x00FF_FFFF;
    if bits >> 20 > 1 {
        return Err(GeckoError::MalformedHeader(format!(
            "endif {metadata:08X} {value:08X} has else flag {:X}",
            bits >> 20
        )));
    }
    Ok(bits)
}

fn endif_words(bits: u32, value: u32) -> (u32, u32) {
    ((CommandKind::Endif.base_opcode() as u32) << 24 | bits, value)
}

fn register_word(ba_high: u16, po_high: u16) -> u32 {
    (ba_high as u32) << 16 | po_high as u32
}

/// `E2`: endif closing the block it ends, optionally flipping the execution
/// status (else).
///
/// `E2T000VV XXXXYYYY` applies `VV` endifs; `T = 1` makes it an else.
/// Non-zero `XXXX`/`YYYY` reload the high halves of ba/po.
///
/// Only found as a [`BlockEnd`]. The count is at least 1; a count of N
/// also closes the N - 1 enclosing blocks, which then end
/// [`BlockEnd::Implicit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endif {
    bits: u32,
    value: u32,
}

impl Default for Endif {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Endif {
    /// `count` is raised to 1 when zero.
    pub fn new(count: u8) -> Self {
        Self {
            bits: count.max(1) as u32,
            value: 0,
        }
    }

    pub fn else_branch(count: u8) -> Self {
        Self {
            bits: ELSE_FLAG | count.max(1) as u32,
            value: 0,
        }
    }

    pub fn with_registers(self, ba_high: u16, po_high: u16) -> Self {
        Self {
            value: register_word(ba_high, po_high),
            ..self
        }
    }

    pub(crate) fn words(&self) -> (u32, u32) {
        endif_words(self.bits, self.value)
    }

    /// Number of enclosing blocks this line closes.
    pub fn count(&self) -> u8 {
        self.bits as u8
    }

    pub fn is_else(&self) -> bool {
        self.bits & ELSE_FLAG != 0
    }

    pub fn ba_high(&self) -> u16 {
        (self.value >> 16) as u16
    }

    pub fn po_high(&self) -> u16 {
        self.value as u16
    }
}

impl CommandBase for Endif {
    fn kind(&self) -> CommandKind {
        CommandKind::Endif
    }

    fn describe(&self) -> String {
        let count = match self.count() {
            1 => "1 endif".to_string(),
            n => format!("{n} endifs"),
        };
        let mut text = if self.is_else() {
            format!("({:02X}) Else, apply {count}", self.opcode())
        } else {
            format!("({:02X}) Apply {count}", self.opcode())
        };
        text.push_str(&describe_reload(self.ba_high(), self.po_high()));
        text
    }
}

/// `E2T00000 XXXXYYYY`: an endif line that closes no block.
///
/// It still flips the execution status when `T = 1` and reloads ba/po, so it
/// sits in the command list like any other command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BareEndif {
    bits: u32,
    value: u32,
}

impl BareEndif {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the execution status.
    pub fn else_branch() -> Self {
        Self {
            bits: ELSE_FLAG,
            value: 0,
        }
    }

    pub fn with_registers(self, ba_high: u16, po_high: u16) -> Self {
        Self {
            value: register_word(ba_high, po_high),
            ..self
        }
    }

    pub(crate) fn words(&self) -> (u32, u32) {
        endif_words(self.bits, self.value)
    }

    pub fn is_else(&self) -> bool {
        self.bits & ELSE_FLAG != 0
    }

    pub fn ba_high(&self) -> u16 {
        (self.value >> 16) as u16
    }

    pub fn po_high(&self) -> u16 {
        self.value as u16
    }
}

impl CommandBase for BareEndif {
    fn kind(&self) -> CommandKind {
        CommandKind::Endif
    }

    fn describe(&self) -> String {
        let head = if self.is_else() { "Else, apply no endif" } else { "Apply no endif" };
        format!(
            "({:02X}) {head}{}",
            self.opcode(),
            describe_reload(self.ba_high(), self.po_high())
        )
    }
}

/// A decoded `E2` line: either the closer of open blocks or a plain command.
#[derive(Debug)]
pub(crate) enum EndifLine {
    Closing(Endif),
    Bare(BareEndif),
}

pub(crate) fn decode_endif(metadata: u32, value: u32) -> Result<EndifLine> {
    let bits = endif_bits(metadata, value)?;
    Ok(if bits & 0xFF == 0 {
        EndifLine::Bare(BareEndif { bits, value })
    } else {
        EndifLine::Closing(Endif { bits, value })
    })
}

pub(crate) fn describe_reload(ba_high: u16, po_high: u16) -> String {
    let mut text = String::new();
    if ba_high != 0 {
        text.push_str(&format!(", set ba to 0x{ba_high:04X}0000"));
    }
    if po_high != 0 {
        text.push_str(&format!(", set po to 0x{po_high:04X}0000"));
    }
    text
}

/// How a block's scope was closed in the encoded stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockEnd {
    /// The endif line right after the last child belongs to this block.
    Endif(Endif),
    /// Closed from elsewhere: an inner block's multi-level endif, the endif
    /// bit of the next conditional, or the terminator of the code.
    Implicit,
}

impl Default for BlockEnd {
    fn default() -> Self {
        BlockEnd::Endif(Endif::default())
    }
}

impl BlockEnd {
    pub fn line_count(&self) -> usize {
        match self {
            BlockEnd::Endif(_) => 1,
            BlockEnd::Implicit => 0,
        }
    }
}

/// Children of a block-opening command, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    children: Vec<Command>,
    end: BlockEnd,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self) -> &[Command] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Command> {
        &mut self.children
    }

    pub fn push(&mut self, command: impl Into<Command>) {
        self.children.push(command.into());
    }

    /// Inserts at `index`, clamped to the end of the list.
    pub fn insert(&mut self, index: usize, command: impl Into<Command>) {
        let index = index.min(self.children.len());
        self.children.insert(index, command.into());
    }

    pub fn remove(&mut self, index: usize) -> Option<Command> {
        (index < self.children.len()).then(|| self.children.remove(index))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn end(&self) -> &BlockEnd {
        &self.end
    }

    pub fn set_end(&mut self, end: BlockEnd) {
        self.end = end;
    }

    pub fn line_count(&self) -> usize {
        self.children.iter().map(Command::line_count).sum::<usize>() + self.end.line_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::address::Address;
    use crate::format::command::Write;
    use pretty_assertions::assert_eq;

    #[test]
    fn endif_fields() {
        let endif = Endif::else_branch(2).with_registers(0x8000, 0);
        assert!(endif.is_else());
        assert_eq!(endif.count(), 2);
        assert_eq!(endif.words(), (0xE210_0002, 0x8000_0000));
        assert_eq!(
            endif.describe(),
            "(E2) Else, apply 2 endifs, set ba to 0x80000000"
        );
    }

    #[test]
    fn endif_rejects_unknown_flag() {
        assert!(matches!(
            decode_endif(0xE220_0001, 0),
            Err(GeckoError::MalformedHeader(_))
        ));
    }

    #[test]
    fn counted_endifs_always_close() {
        assert_eq!(Endif::new(0).count(), 1);
        assert_eq!(Endif::else_branch(0).words(), (0xE210_0001, 0));
        assert!(matches!(
            decode_endif(0xE200_0002, 0),
            Ok(EndifLine::Closing(endif)) if endif.count() == 2
        ));
    }

    #[test]
    fn bare_endif_lines() {
        let bare = BareEndif::else_branch().with_registers(0, 0x8000);
        assert_eq!(bare.words(), (0xE210_0000, 0x0000_8000));
        assert_eq!(bare.describe(), "(E2) Else, apply no endif, set po to 0x80000000");
        assert!(matches!(
            decode_endif(0xE210_0000, 0x0000_8000),
            Ok(EndifLine::Bare(line)) if line == bare
        ));
    }

    #[test]
    fn child_edits() {
        let mut block = Block::new();
        block.push(Write::word(Address::absolute(0x8000_0000), 1));
        block.push(Write::word(Address::absolute(0x8000_0004), 2));
        block.insert(99, Write::word(Address::absolute(0x8000_0008), 3));
        assert_eq!(block.len(), 3);
        assert_eq!(block.line_count(), 4);

        let removed = block.remove(0).unwrap();
        assert_eq!(removed.address(), 0);
        assert!(block.remove(5).is_none());
        assert_eq!(block.children()[0].address(), 4);
    }
}
