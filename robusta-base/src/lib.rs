#![warn(clippy::pedantic)]
// Most of the structures here are threaded through long call chains, which makes
// clippy's argument-count lint more annoying than helpful.
#![allow(clippy::too_many_arguments)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
// Class-file quantities are u16/u32 by definition; the casts around them are
// bounds-checked by the format, not by the type system.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod access_flags;
pub mod class;
pub mod classfile;
pub mod descriptor;
pub mod method_area;
pub mod opcode;
pub mod string_pool;

pub use access_flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
pub use string_pool::{NameIndex, StringPool};
