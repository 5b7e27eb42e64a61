use gecko_core::format::binary::{decode_commands, encode_commands};
use gecko_core::format::command::{
    AsmBlock, AsmInsertXor, BareEndif, Comparison, Conditional, Endif, Operation, Search, Terminator, Write,
    WriteSerial, WriteString, WriteWidth,
};
use gecko_core::format::{Address, AddressMode, BlockEnd, Code, CodeTable, Command, CommandBase, CommandKind};
use gecko_core::GeckoError;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn bytes(text: &str) -> Vec<u8> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(digits).unwrap()
}

#[test]
fn single_write_table() {
    let gct = bytes("00D0C0DE 00D0C0DE 04000000 80231480 F0000000 00000000");
    let table = CodeTable::from_gct(&gct).unwrap();
    assert_eq!(table.len(), 1);

    let commands = &table.codes[0].commands;
    assert_eq!(commands.len(), 1);
    let Command::Write(write) = &commands[0] else {
        panic!("expected a write, got {:?}", commands[0]);
    };
    assert_eq!(write.kind(), CommandKind::Write32);
    assert_eq!(write.width(), WriteWidth::Word);
    assert_eq!(write.value(), 0x8023_1480);
    assert_eq!(write.target().effective(), 0x8000_0000);
    assert_eq!(write.target().mode(), AddressMode::Absolute);

    assert_eq!(table.to_gct(), gct);
}

#[test]
fn removing_a_child_only_shrinks_its_block() {
    let stream = bytes(
        "04000010 00000001 \
         20001000 00000001 \
         04002000 00000002 \
         04002004 00000003 \
         E2000001 00000000 \
         E0000000 80008000",
    );
    let mut commands = decode_commands(&stream).unwrap();
    assert_eq!(commands.len(), 3);
    {
        let block = commands[1].block().unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block.children()[0], Write::word(Address::absolute(0x8000_2000), 2).into());
        assert_eq!(block.children()[1], Write::word(Address::absolute(0x8000_2004), 3).into());
        assert_eq!(block.end(), &BlockEnd::Endif(Endif::new(1)));
    }

    let removed = commands[1].block_mut().unwrap().remove(0);
    assert!(removed.is_some());
    let encoded = encode_commands(&commands);

    let expected = [&stream[..16], &stream[24..]].concat();
    assert_eq!(hex::encode_upper(&encoded), hex::encode_upper(&expected));
}

#[test]
fn chained_and_multi_level_endifs_survive() {
    let stream = bytes(
        "20001000 00000001 \
         04002000 00000002 \
         20001005 00000003 \
         28001008 00FF0004 \
         04002004 00000005 \
         E2000002 80000000 \
         E0000000 80008000",
    );
    let commands = decode_commands(&stream).unwrap();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[0].block().unwrap().end(), &BlockEnd::Implicit);

    let Command::Conditional(outer) = &commands[1] else {
        panic!("expected a conditional");
    };
    assert!(outer.applies_endif());
    assert_eq!(outer.body().end(), &BlockEnd::Implicit);
    let inner = &outer.body().children()[0];
    assert_eq!(inner.block().unwrap().end(), &BlockEnd::Endif(Endif::new(2).with_registers(0x8000, 0)));

    assert_eq!(encode_commands(&commands), stream);
}

#[test]
fn constructed_tree_round_trips() {
    let search = Search::new(0x8000, 0x8100, [0xDE, 0xAD, 0xBE]).unwrap();
    let mut search: Command = search.into();
    search
        .block_mut()
        .unwrap()
        .push(Write::byte(Address::pointer(0x10), 0x7F, 3));

    let code = Code::new("Everything")
        .with_command(Operation::base_address_set(0x8030_0000))
        .with_command(WriteString::new(Address::pointer(0x40), b"hello".to_vec()))
        .with_command(WriteSerial::new(
            Address::absolute(0x8040_0000),
            0x1000,
            WriteWidth::Half,
            8,
            2,
            1,
        ))
        .with_command(
            Conditional::if16(Comparison::NotEqual, Address::absolute(0x8040_0010), 0x0001, 0xFF00)
                .with_endif(false)
                .with_children([
                    Command::from(AsmBlock::insert(
                        Address::absolute(0x8020_0000),
                        vec![0x38, 0x60, 0x00, 0x01],
                    )),
                    search,
                ]),
        )
        .with_command(AsmBlock::execute(vec![0x4E, 0x80, 0x00, 0x20]))
        .with_command(
            AsmInsertXor::new(Address::pointer(0x80), 0x1234, 2, vec![0x60, 0x00, 0x00, 0x00]).unwrap(),
        )
        .terminated();

    let encoded = code.to_bytes();
    assert_eq!(encoded.len(), code.line_count() * 8);
    assert_eq!(decode_commands(&encoded).unwrap(), code.commands);

    let table: CodeTable = [code.clone()].into_iter().collect();
    let decoded = CodeTable::from_gct(&table.to_gct()).unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded.codes[0].commands, code.commands);
}

fn random_leaf(rng: &mut StdRng) -> Command {
    let address = if rng.gen_bool(0.3) {
        Address::pointer(rng.gen_range(0..0x0100_0000) & !3)
    } else {
        Address::absolute(0x8000_0000 | (rng.gen_range(0..0x0180_0000) & !3))
    };
    match rng.gen_range(0..7) {
        0 => Write::byte(address, rng.gen(), rng.gen_range(0..16)).into(),
        1 => Write::half(address, rng.gen(), rng.gen_range(0..16)).into(),
        2 => Write::word(address, rng.gen()).into(),
        3 => {
            let len = rng.gen_range(1..24);
            let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            WriteString::new(address, data).into()
        }
        4 => Operation::register_set(rng.gen_range(0..16), rng.gen()).into(),
        5 => BareEndif::else_branch().into(),
        _ => BareEndif::new()
            .with_registers(rng.gen_range(0..2) * 0x8000, rng.gen())
            .into(),
    }
}

fn random_block(rng: &mut StdRng, depth: usize) -> Command {
    let address = Address::absolute(0x8000_0000 | (rng.gen_range(0..0x0100_0000) & !3));
    let mut command: Command =
        Conditional::if32(Comparison::Equal, address, rng.gen()).into();
    let block = command.block_mut().unwrap();
    for _ in 0..rng.gen_range(0..4) {
        if depth < 3 && rng.gen_bool(0.3) {
            block.push(random_block(rng, depth + 1));
        } else {
            block.push(random_leaf(rng));
        }
    }
    command
}

#[test]
fn random_trees_round_trip() {
    let mut rng = StdRng::seed_from_u64(0x00D0_C0DE);
    for _ in 0..64 {
        let mut code = Code::new("random");
        for _ in 0..rng.gen_range(1..6) {
            if rng.gen_bool(0.4) {
                code.push(random_block(&mut rng, 0));
            } else {
                code.push(random_leaf(&mut rng));
            }
        }
        let code = code.terminated();
        let encoded = code.to_bytes();
        assert_eq!(encoded.len(), code.line_count() * 8);
        assert_eq!(decode_commands(&encoded).unwrap(), code.commands);
    }
}

#[test]
fn bare_endifs_stay_in_their_list() {
    let code = Code::new("else")
        .with_command(
            Conditional::if32(Comparison::Equal, Address::absolute(0x8000_1000), 1).with_children([
                Command::from(Write::word(Address::absolute(0x8000_2000), 2)),
                BareEndif::else_branch().into(),
                Write::word(Address::absolute(0x8000_2000), 3).into(),
            ]),
        )
        .with_command(BareEndif::new().with_registers(0x8000, 0))
        .terminated();
    let encoded = code.to_bytes();
    assert_eq!(
        encoded,
        bytes(
            "20001000 00000001 \
             04002000 00000002 \
             E2100000 00000000 \
             04002000 00000003 \
             E2000001 00000000 \
             E2000000 80000000 \
             E0000000 80008000"
        )
    );
    assert_eq!(decode_commands(&encoded).unwrap(), code.commands);
}

#[test]
fn unbalanced_blocks_are_rejected() {
    let open = bytes("20001000 00000001 04002000 00000002");
    assert!(matches!(
        decode_commands(&open),
        Err(GeckoError::UnbalancedBlock { offset: 16, .. })
    ));

    let stray = bytes("04002000 00000002 E2000001 00000000");
    assert!(matches!(
        decode_commands(&stray),
        Err(GeckoError::UnbalancedBlock { offset: 8, .. })
    ));
}

#[test]
fn unknown_opcode_names_the_byte() {
    let gct = bytes("00D0C0DE 00D0C0DE 04000000 00000001 FE000000 00000000 F0000000 00000000");
    assert_eq!(
        CodeTable::from_gct(&gct),
        Err(GeckoError::UnknownOpcode { opcode: 0xFE, offset: 16 })
    );
}

#[test]
fn terminators_split_codes() {
    let gct = bytes(
        "00D0C0DE 00D0C0DE \
         20001000 00000001 04002000 00000002 E0000000 80008000 \
         04003000 00000003 E0000000 80008000 \
         F0000000 00000000",
    );
    let table = CodeTable::from_gct(&gct).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.codes[0].commands[0].block().unwrap().end(), &BlockEnd::Implicit);
    assert!(table.codes[1].commands.last().unwrap().is_terminator());
    assert_eq!(table.codes[1].commands[1], Terminator::default().into());
    assert_eq!(table.to_gct(), gct);
}
