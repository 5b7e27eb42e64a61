//! Binary command stream codec.
//!
//! A stream is a sequence of 8-byte lines made of two big-endian words: the
//! metadata word (opcode byte and address) and the value word. Payloads
//! follow their header line and are padded to a line boundary.
//!
//! Nesting is not stored in the stream; the decoder rebuilds it with a stack
//! of open blocks:
//! - a conditional or search opens a block; a conditional with its endif bit
//!   set first closes the innermost open block
//! - an endif with count N closes N blocks, the innermost one keeping the
//!   endif line as its closer
//! - a terminator closes all of them

use byteorder::{BigEndian, ByteOrder};
use num_traits::FromPrimitive;

use super::address::{Address, ADDRESS_MASK};
use super::command::{
    decode_endif, pad_len, AsmBlock, AsmInsertXor, Block, BlockEnd, Command, CommandBase,
    CommandKind, Conditional, Endif, EndifLine, Operation, Search, Terminator, Write, WriteSerial,
    WriteString, WriteWidth,
};
use super::registry::{PayloadShape, Registry};
use super::LINE_SIZE;
use crate::error::{GeckoError, Result};

/// What one header line decodes to. A closing endif only updates the open
/// block stack and never becomes a command of its own.
enum Entry {
    Command(Command),
    Endif(Endif),
}

pub struct Decoder<'a> {
    registry: &'a Registry,
    bytes: &'a [u8],
    pos: usize,
    base_offset: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(registry: &'a Registry, bytes: &'a [u8]) -> Self {
        Self {
            registry,
            bytes,
            pos: 0,
            base_offset: 0,
        }
    }

    /// Offset added to error positions, for streams cut out of a larger
    /// buffer.
    pub fn with_base_offset(mut self, base_offset: usize) -> Self {
        self.base_offset = base_offset;
        self
    }

    #[inline]
    fn offset(&self) -> usize {
        self.base_offset + self.pos
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(GeckoError::TruncatedStream {
                offset: self.offset(),
                needed: len,
                available: self.remaining(),
            });
        }
        let all: &'a [u8] = self.bytes;
        let bytes = &all[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_line(&mut self) -> Result<(u32, u32)> {
        let line = self.take(LINE_SIZE)?;
        Ok((BigEndian::read_u32(&line[..4]), BigEndian::read_u32(&line[4..])))
    }

    fn read_payload(&mut self, len: usize) -> Result<Vec<u8>> {
        self.take(len).map(<[u8]>::to_vec)
    }

    /// Reads one line group: header line(s) and payload, no children.
    fn read_entry(&mut self) -> Result<Entry> {
        let offset = self.offset();
        let (metadata, value) = self.read_line()?;
        let opcode = (metadata >> 24) as u8;
        let info = *self.registry.lookup(opcode, offset)?;
        let descriptor = info.descriptor;
        let kind = descriptor.kind;

        if !descriptor.has_address && opcode & 1 != 0 {
            return Err(GeckoError::MalformedHeader(format!(
                "opcode 0x{opcode:02X} at offset 0x{offset:X} sets address bit 24 on {kind}, which has no address"
            )));
        }

        let mut extra = Vec::with_capacity(descriptor.header_lines - 1);
        for _ in 1..descriptor.header_lines {
            extra.push(self.read_line()?);
        }

        let payload_len = match descriptor.payload {
            PayloadShape::None => 0,
            PayloadShape::BytesInValue => {
                let len = value as usize;
                len.saturating_add(pad_len(len))
            }
            PayloadShape::LinesInValue => (value as usize).saturating_mul(LINE_SIZE),
            PayloadShape::LinesInValueLowByte => (value & 0xFF) as usize * LINE_SIZE,
            PayloadShape::LinesInHeaderLowByte => (metadata & 0xFF) as usize * LINE_SIZE,
        };
        let mut payload = self.read_payload(payload_len)?;

        let address = Address::new(metadata & ADDRESS_MASK, info.mode);
        let command: Command = match kind {
            CommandKind::Write8 | CommandKind::Write16 | CommandKind::Write32 => {
                let width = WriteWidth::from_kind(kind).unwrap_or(WriteWidth::Word);
                Write::from_words(width, address, value).into()
            }
            CommandKind::WriteString => {
                let padding = payload.split_off(value as usize);
                WriteString::from_parts(address, payload, padding).into()
            }
            CommandKind::WriteSerial => {
                let (layout, value_step) = extra.first().copied().unwrap_or_default();
                let width = WriteWidth::from_u32(layout >> 28).ok_or_else(|| {
                    GeckoError::MalformedHeader(format!(
                        "serial write at offset 0x{offset:X} has value size {:X}",
                        layout >> 28
                    ))
                })?;
                WriteSerial::new(
                    address,
                    value,
                    width,
                    ((layout >> 16) & 0x0FFF) as u16,
                    layout as u16,
                    value_step,
                )
                .into()
            }
            CommandKind::AsmExecute | CommandKind::AsmInsert | CommandKind::AsmInsertLink => {
                AsmBlock::from_parts(kind, address, payload).into()
            }
            CommandKind::AsmInsertXor => AsmInsertXor::from_parts(
                address,
                (value >> 8) as u16,
                (value >> 24) as u8,
                payload,
            )
            .into(),
            CommandKind::Search => {
                Search::from_parts((metadata >> 8) as u16, value, payload).into()
            }
            CommandKind::Endif => {
                let line = decode_endif(metadata, value).map_err(|e| match e {
                    GeckoError::MalformedHeader(reason) => {
                        GeckoError::MalformedHeader(format!("{reason} at offset 0x{offset:X}"))
                    }
                    other => other,
                })?;
                match line {
                    EndifLine::Closing(endif) => {
                        log::trace!("0x{offset:X}: {}", endif.describe());
                        return Ok(Entry::Endif(endif));
                    }
                    EndifLine::Bare(line) => line.into(),
                }
            }
            CommandKind::Terminator | CommandKind::Exit => {
                Terminator::from_words(kind, metadata, value).into()
            }
            kind if kind.is_conditional() => Conditional::from_parts(kind, address, value).into(),
            kind => Operation::from_parts(kind, address, value).into(),
        };
        log::trace!("0x{offset:X}: {command}");
        Ok(Entry::Command(command))
    }

    /// Decodes the rest of the stream as a single command list.
    pub fn decode_all(&mut self) -> Result<Vec<Command>> {
        self.decode_until(false)
    }

    /// Decodes up to and including the next terminator that closes at depth
    /// zero, or to the end of the stream.
    pub fn next_code(&mut self) -> Result<Option<Vec<Command>>> {
        if self.is_empty() {
            return Ok(None);
        }
        self.decode_until(true).map(Some)
    }

    fn decode_until(&mut self, stop_at_terminator: bool) -> Result<Vec<Command>> {
        let mut top = Vec::new();
        let mut open: Vec<Command> = Vec::new();

        while !self.is_empty() {
            let offset = self.offset();
            match self.read_entry()? {
                Entry::Endif(endif) => {
                    let count = endif.count() as usize;
                    if open.len() < count {
                        return Err(GeckoError::UnbalancedBlock {
                            offset,
                            reason: format!(
                                "endif closes {count} blocks but {} are open",
                                open.len()
                            ),
                        });
                    }
                    close_block(&mut open, &mut top, BlockEnd::Endif(endif));
                    for _ in 1..count {
                        close_block(&mut open, &mut top, BlockEnd::Implicit);
                    }
                }
                Entry::Command(command) if command.is_terminator() => {
                    while !open.is_empty() {
                        close_block(&mut open, &mut top, BlockEnd::Implicit);
                    }
                    top.push(command);
                    if stop_at_terminator {
                        return Ok(top);
                    }
                }
                Entry::Command(command) if command.is_block() => {
                    let chains = matches!(&command, Command::Conditional(c) if c.applies_endif());
                    if chains {
                        close_block(&mut open, &mut top, BlockEnd::Implicit);
                    }
                    open.push(command);
                }
                Entry::Command(command) => attach(&mut open, &mut top, command),
            }
        }

        if !open.is_empty() {
            return Err(GeckoError::UnbalancedBlock {
                offset: self.offset(),
                reason: format!("{} blocks still open at end of input", open.len()),
            });
        }
        Ok(top)
    }
}

fn attach(open: &mut [Command], top: &mut Vec<Command>, command: Command) {
    match open.last_mut().and_then(Command::block_mut) {
        Some(block) => block.push(command),
        None => top.push(command),
    }
}

fn close_block(open: &mut Vec<Command>, top: &mut Vec<Command>, end: BlockEnd) {
    if let Some(mut command) = open.pop() {
        if let Some(block) = command.block_mut() {
            block.set_end(end);
        }
        attach(open, top, command);
    }
}

/// Decodes `bytes` as one command list.
pub fn decode_commands(bytes: &[u8]) -> Result<Vec<Command>> {
    Decoder::new(Registry::standard(), bytes).decode_all()
}

/// Decodes `bytes` into codes, each ending at a terminator that closes at
/// depth zero. Commands after the last terminator form a final code.
pub fn decode_codes(bytes: &[u8]) -> Result<Vec<Vec<Command>>> {
    let mut decoder = Decoder::new(Registry::standard(), bytes);
    let mut codes = Vec::new();
    while let Some(code) = decoder.next_code()? {
        codes.push(code);
    }
    Ok(codes)
}

fn put_line(out: &mut Vec<u8>, metadata: u32, value: u32) {
    let mut line = [0u8; LINE_SIZE];
    BigEndian::write_u32(&mut line[..4], metadata);
    BigEndian::write_u32(&mut line[4..], value);
    out.extend_from_slice(&line);
}

fn header_word(command: &impl CommandBase) -> u32 {
    (command.opcode() as u32) << 24 | command.address()
}

pub fn encode_command(command: &Command, out: &mut Vec<u8>) {
    match command {
        Command::Write(write) => put_line(out, header_word(write), write.value_word()),
        Command::WriteString(write) => {
            put_line(out, header_word(write), write.data().len() as u32);
            out.extend_from_slice(write.data());
            out.extend_from_slice(write.padding());
        }
        Command::WriteSerial(write) => {
            put_line(out, header_word(write), write.value());
            let (layout, value_step) = write.second_line();
            put_line(out, layout, value_step);
        }
        Command::Conditional(cond) => {
            put_line(out, header_word(cond), cond.value());
            encode_block_body(cond.body(), out);
        }
        Command::Search(search) => {
            let (metadata, value) = search.words();
            put_line(out, metadata, value);
            out.extend_from_slice(search.pattern());
            encode_block_body(search.body(), out);
        }
        Command::Operation(op) => put_line(out, header_word(op), op.value()),
        Command::AsmBlock(asm) => {
            put_line(out, header_word(asm), asm.lines() as u32);
            out.extend_from_slice(asm.code());
        }
        Command::AsmInsertXor(asm) => {
            put_line(out, header_word(asm), asm.value_word());
            out.extend_from_slice(asm.code());
        }
        Command::BareEndif(line) => {
            let (metadata, value) = line.words();
            put_line(out, metadata, value);
        }
        Command::Terminator(term) => {
            let (metadata, value) = term.words();
            put_line(out, metadata, value);
        }
    }
}

fn encode_block_body(block: &Block, out: &mut Vec<u8>) {
    for child in block.children() {
        encode_command(child, out);
    }
    if let BlockEnd::Endif(endif) = block.end() {
        let (metadata, value) = endif.words();
        put_line(out, metadata, value);
    }
}

pub fn encode_commands(commands: &[Command]) -> Vec<u8> {
    let lines = commands.iter().map(Command::line_count).sum::<usize>();
    let mut out = Vec::with_capacity(lines * LINE_SIZE);
    for command in commands {
        encode_command(command, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::command::Comparison;
    use pretty_assertions::assert_eq;

    fn bytes(text: &str) -> Vec<u8> {
        let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(digits).unwrap()
    }

    #[test]
    fn endif_bit_chains_conditionals() {
        let input = bytes(
            "20001000 00000001
             04002000 00000002
             20001001 00000002
             04002004 00000003
             E2000001 00000000
             E0000000 80008000",
        );
        let commands = decode_commands(&input).unwrap();
        assert_eq!(commands.len(), 3);

        let first = commands[0].block().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first.end(), &BlockEnd::Implicit);

        let second = commands[1].block().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.end(), &BlockEnd::Endif(Endif::new(1)));
        assert!(commands[2].is_terminator());

        assert_eq!(encode_commands(&commands), input);
    }

    #[test]
    fn multi_level_endif() {
        let input = bytes(
            "20001000 00000001
             28001002 00000005
             04002000 00000002
             E2000002 00000000",
        );
        let commands = decode_commands(&input).unwrap();
        assert_eq!(commands.len(), 1);
        let outer = commands[0].block().unwrap();
        assert_eq!(outer.end(), &BlockEnd::Implicit);
        let inner = outer.children()[0].block().unwrap();
        assert_eq!(inner.end(), &BlockEnd::Endif(Endif::new(2)));
        assert_eq!(encode_commands(&commands), input);
    }

    #[test]
    fn terminator_closes_open_blocks() {
        let input = bytes(
            "20001000 00000001
             04002000 00000002
             E0000000 80008000
             04002004 00000003",
        );
        let codes = decode_codes(&input).unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].len(), 2);
        assert_eq!(codes[0][0].block().unwrap().end(), &BlockEnd::Implicit);
        assert_eq!(codes[1].len(), 1);
    }

    #[test]
    fn zero_count_endif_stays_in_block() {
        let input = bytes(
            "20001000 00000001
             04002000 00000002
             E2100000 00000000
             04002004 00000003
             E2000001 00000000",
        );
        let commands = decode_commands(&input).unwrap();
        let block = commands[0].block().unwrap();
        assert_eq!(block.len(), 3);
        assert!(matches!(&block.children()[1], Command::BareEndif(line) if line.is_else()));
        assert_eq!(encode_commands(&commands), input);
    }

    #[test]
    fn payloads_are_kept_exactly() {
        let input = bytes(
            "06001000 00000005
             48656C6C 6F00AB00
             C2003000 00000001
             38600001 60000000
             F6000001 80008180
             3C608000 60630000
             04000010 00000001
             E2000001 00000000
             08001000 00000001
             20030004 00000001",
        );
        let commands = decode_commands(&input).unwrap();
        assert_eq!(commands.len(), 4);
        let Command::WriteString(string) = &commands[0] else {
            panic!("expected a string write, got {:?}", commands[0]);
        };
        assert_eq!(string.data(), b"Hello");
        assert_eq!(string.padding(), &[0x00, 0xAB, 0x00]);
        assert_eq!(commands[2].block().unwrap().len(), 1);
        assert_eq!(encode_commands(&commands), input);
    }

    #[test]
    fn errors() {
        let truncated = bytes("C0000000 00000002 4E800020 00000000");
        assert!(matches!(
            decode_commands(&truncated),
            Err(GeckoError::TruncatedStream { offset: 8, needed: 16, available: 8 })
        ));

        let unknown = bytes("04000000 00000000 FA000000 00000000");
        assert_eq!(
            decode_commands(&unknown),
            Err(GeckoError::UnknownOpcode { opcode: 0xFA, offset: 8 })
        );

        let open = bytes("20001000 00000001 04002000 00000002");
        assert!(matches!(
            decode_commands(&open),
            Err(GeckoError::UnbalancedBlock { offset: 16, .. })
        ));

        let stray = bytes("E2000001 00000000");
        assert!(matches!(
            decode_commands(&stray),
            Err(GeckoError::UnbalancedBlock { offset: 0, .. })
        ));

        let bad_bits = bytes("E1000000 00000000");
        assert!(matches!(
            decode_commands(&bad_bits),
            Err(GeckoError::MalformedHeader(_))
        ));

        let bad_serial = bytes("08001000 00000001 30030004 00000001");
        assert!(matches!(
            decode_commands(&bad_serial),
            Err(GeckoError::MalformedHeader(_))
        ));
    }

    #[test]
    fn constructed_tree_encodes_endif_lines() {
        let cond = Conditional::if32(Comparison::Equal, Address::absolute(0x8000_1000), 1)
            .with_children([Write::word(Address::absolute(0x8000_2000), 2)]);
        let commands = vec![Command::from(cond), Terminator::default().into()];
        let encoded = encode_commands(&commands);
        assert_eq!(
            encoded,
            bytes(
                "20001000 00000001
                 04002000 00000002
                 E2000001 00000000
                 E0000000 80008000"
            )
        );
        assert_eq!(decode_commands(&encoded).unwrap(), commands);
    }
}
