//! Class-file decoding: the byte-stream parser, the constant-pool
//! representation it fills in, and the structural format checker that runs
//! before a parsed class is published to the method area.

pub mod check;
pub mod constant_pool;
pub mod parser;

pub use check::{check_class, FormatError};
pub use constant_pool::{
    BootstrapMethod, CPool, CpError, CpKind, DynamicRef, MemberRef, MethodHandleRef, NameAndType,
};
pub use parser::{
    parse_class, CodeAttribute, ExceptionTableEntry, ParseError, ParsedClass, ParsedField,
    ParsedMethod, RawAttribute,
};
