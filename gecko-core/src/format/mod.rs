//! Gecko code formats.
//!
//! Binary streams and GCT tables are handled by [`binary`] and [`table`],
//! the text dialects by [`text`]. Both codecs share the opcode [`registry`]
//! and the [`command`] tree.

pub mod address;
pub mod binary;
pub mod command;
pub mod registry;
pub mod table;
pub mod text;

/// Size of one encoded line: metadata word plus value word.
pub const LINE_SIZE: usize = 8;

pub use address::{decode_address, encode_address, Address, AddressMode};
pub use command::{Block, BlockEnd, Command, CommandBase, CommandKind};
pub use registry::{CommandDescriptor, PayloadShape, Registry};
pub use table::{Code, CodeTable, GCT_FOOTER, GCT_HEADER};
pub use text::TextDialect;
