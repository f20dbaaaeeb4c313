//! Decoding of a single class file byte stream into an unresolved class
//! record: header, constant pool, interfaces, fields, methods, attributes.
//!
//! Nothing here touches the method area or the name pool; the output is a
//! self-contained [`ParsedClass`] that the format checker validates and the
//! loader then converts into a published class record.

use std::fmt;

use crate::access_flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
use crate::classfile::constant_pool::{
    BootstrapMethod, CPool, CpKind, CpSlot, DynamicRef, MemberRef, MethodHandleRef, NameAndType,
};

const MAGIC: u32 = 0xCAFE_BABE;
/// Oldest class file version accepted (JDK 1.1).
const MIN_MAJOR_VERSION: u16 = 45;
/// Newest class file version accepted (Java 21).
const MAX_MAJOR_VERSION: u16 = 65;
/// From this major version on, the minor version must be 0 or 65535
/// (preview-feature marker).
const STRICT_MINOR_FROM: u16 = 56;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than the ten header bytes were present.
    MalformedHeader,
    /// The magic number was not `0xCAFEBABE`.
    BadMagic(u32),
    /// The version is outside the supported range.
    UnsupportedVersion { major: u16, minor: u16 },
    /// The stream ended inside a structure.
    Truncated { at: usize },
    /// A constant-pool tag byte this parser does not know.
    UnknownConstantTag { tag: u8, index: u16 },
    /// A Utf8 entry did not hold valid UTF-8.
    BadUtf8 { index: u16 },
    /// A parse-time cross-reference (e.g. a String entry's content index)
    /// did not land on an entry of the right kind.
    BadCrossReference { index: u16 },
    /// Anything else structurally inconsistent.
    Structural(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MalformedHeader => f.write_str("malformed class file header"),
            ParseError::BadMagic(magic) => {
                write!(f, "invalid magic number 0x{magic:08X}")
            }
            ParseError::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported class file version {major}.{minor}")
            }
            ParseError::Truncated { at } => {
                write!(f, "class file truncated at byte offset {at}")
            }
            ParseError::UnknownConstantTag { tag, index } => {
                write!(f, "unknown constant pool tag {tag} at index {index}")
            }
            ParseError::BadUtf8 { index } => {
                write!(f, "constant pool entry {index} is not valid UTF-8")
            }
            ParseError::BadCrossReference { index } => {
                write!(f, "constant pool entry {index} references an incompatible entry")
            }
            ParseError::Structural(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ParseError {}

/// An attribute this parser does not interpret, kept as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Pool index of the caught class, or 0 for a catch-all handler.
    pub catch_type: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    /// Nested attributes (`StackMapTable`, `LineNumberTable`, ...) kept raw.
    pub attributes: Vec<RawAttribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedField {
    pub access_flags: FieldAccessFlags,
    pub name: String,
    pub descriptor: String,
    /// Pool index of the `ConstantValue` attribute's entry, if present.
    pub constant_value: Option<u16>,
    pub attributes: Vec<RawAttribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMethod {
    pub access_flags: MethodAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub code: Option<CodeAttribute>,
    pub attributes: Vec<RawAttribute>,
}

/// The unresolved output of parsing one class file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedClass {
    pub minor_version: u16,
    pub major_version: u16,
    pub cp: CPool,
    pub access_flags: ClassAccessFlags,
    /// Pool index of this class's `ClassRef`.
    pub this_class: u16,
    /// Pool index of the superclass `ClassRef`, 0 for `java/lang/Object`.
    pub super_class: u16,
    /// Pool indices of the direct superinterfaces.
    pub interfaces: Vec<u16>,
    pub fields: Vec<ParsedField>,
    pub methods: Vec<ParsedMethod>,
    pub attributes: Vec<RawAttribute>,
    pub source_file: Option<String>,
}

impl ParsedClass {
    pub fn this_class_name(&self) -> Result<&str, ParseError> {
        self.cp
            .class_name(self.this_class)
            .map_err(|_| ParseError::BadCrossReference {
                index: self.this_class,
            })
    }

    pub fn super_class_name(&self) -> Result<Option<&str>, ParseError> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.cp
            .class_name(self.super_class)
            .map(Some)
            .map_err(|_| ParseError::BadCrossReference {
                index: self.super_class,
            })
    }
}

/// Parse a complete class file.
pub fn parse_class(bytes: &[u8]) -> Result<ParsedClass, ParseError> {
    let mut r = Reader::new(bytes);

    if bytes.len() < 10 {
        return Err(ParseError::MalformedHeader);
    }
    let magic = r.u4()?;
    if magic != MAGIC {
        return Err(ParseError::BadMagic(magic));
    }
    let minor_version = r.u2()?;
    let major_version = r.u2()?;
    if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major_version)
        || (major_version >= STRICT_MINOR_FROM && minor_version != 0 && minor_version != 0xFFFF)
    {
        return Err(ParseError::UnsupportedVersion {
            major: major_version,
            minor: minor_version,
        });
    }

    let mut cp = parse_constant_pool(&mut r)?;

    let access_flags = ClassAccessFlags::from_bits_truncate(r.u2()?);
    let this_class = r.u2()?;
    let super_class = r.u2()?;

    let interface_count = r.u2()?;
    let mut interfaces = Vec::with_capacity(usize::from(interface_count));
    for _ in 0..interface_count {
        interfaces.push(r.u2()?);
    }

    let field_count = r.u2()?;
    let mut fields = Vec::with_capacity(usize::from(field_count));
    for _ in 0..field_count {
        fields.push(parse_field(&mut r, &cp)?);
    }

    let method_count = r.u2()?;
    let mut methods = Vec::with_capacity(usize::from(method_count));
    for _ in 0..method_count {
        methods.push(parse_method(&mut r, &cp)?);
    }

    let mut attributes = Vec::new();
    let mut source_file = None;
    let attr_count = r.u2()?;
    for _ in 0..attr_count {
        let (name, data) = parse_raw_attribute(&mut r, &cp)?;
        match name.as_str() {
            "SourceFile" => {
                let index = read_u2_of(&data, 0)?;
                source_file = Some(
                    cp.utf8(index)
                        .map_err(|_| ParseError::BadCrossReference { index })?
                        .to_owned(),
                );
            }
            "BootstrapMethods" => {
                cp.bootstraps = parse_bootstrap_methods(&data)?;
            }
            _ => attributes.push(RawAttribute { name, data }),
        }
    }

    if !r.is_at_end() {
        return Err(ParseError::Structural(format!(
            "{} trailing bytes after class file end",
            r.remaining()
        )));
    }

    Ok(ParsedClass {
        minor_version,
        major_version,
        cp,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
        source_file,
    })
}

fn parse_constant_pool(r: &mut Reader<'_>) -> Result<CPool, ParseError> {
    let count = r.u2()?;
    if count == 0 {
        return Err(ParseError::Structural(
            "constant pool count must be at least 1".to_owned(),
        ));
    }

    let mut cp = CPool::default();
    cp.entries.push(CpSlot::INVALID);

    let mut index: u16 = 1;
    while index < count {
        let tag = r.u1()?;
        let slot = match tag {
            1 => {
                let len = r.u2()?;
                let bytes = r.bytes(usize::from(len))?;
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|_| ParseError::BadUtf8 { index })?;
                cp.utf8s.push(text);
                slot_for(CpKind::Utf8, cp.utf8s.len())
            }
            3 => {
                cp.int_consts.push(r.u4()? as i32);
                slot_for(CpKind::IntegerConst, cp.int_consts.len())
            }
            4 => {
                cp.float_consts.push(f32::from_bits(r.u4()?));
                slot_for(CpKind::FloatConst, cp.float_consts.len())
            }
            5 => {
                cp.long_consts.push(r.u8()? as i64);
                slot_for(CpKind::LongConst, cp.long_consts.len())
            }
            6 => {
                cp.double_consts.push(f64::from_bits(r.u8()?));
                slot_for(CpKind::DoubleConst, cp.double_consts.len())
            }
            7 => {
                cp.class_refs.push(r.u2()?);
                slot_for(CpKind::ClassRef, cp.class_refs.len())
            }
            8 => {
                cp.string_refs.push(r.u2()?);
                slot_for(CpKind::StringConst, cp.string_refs.len())
            }
            9 => {
                cp.field_refs.push(read_member_ref(r)?);
                slot_for(CpKind::FieldRef, cp.field_refs.len())
            }
            10 => {
                cp.method_refs.push(read_member_ref(r)?);
                slot_for(CpKind::MethodRef, cp.method_refs.len())
            }
            11 => {
                cp.iface_method_refs.push(read_member_ref(r)?);
                slot_for(CpKind::InterfaceMethodRef, cp.iface_method_refs.len())
            }
            12 => {
                cp.name_and_types.push(NameAndType {
                    name_index: r.u2()?,
                    descriptor_index: r.u2()?,
                });
                slot_for(CpKind::NameAndType, cp.name_and_types.len())
            }
            15 => {
                cp.method_handles.push(MethodHandleRef {
                    ref_kind: r.u1()?,
                    ref_index: r.u2()?,
                });
                slot_for(CpKind::MethodHandle, cp.method_handles.len())
            }
            16 => {
                cp.method_types.push(r.u2()?);
                slot_for(CpKind::MethodType, cp.method_types.len())
            }
            17 => {
                cp.dynamics.push(DynamicRef {
                    bootstrap_index: r.u2()?,
                    name_and_type_index: r.u2()?,
                });
                slot_for(CpKind::Dynamic, cp.dynamics.len())
            }
            18 => {
                cp.invoke_dynamics.push(DynamicRef {
                    bootstrap_index: r.u2()?,
                    name_and_type_index: r.u2()?,
                });
                slot_for(CpKind::InvokeDynamic, cp.invoke_dynamics.len())
            }
            tag => return Err(ParseError::UnknownConstantTag { tag, index }),
        };

        cp.entries.push(slot);
        index += 1;

        // 8-byte constants take two index slots; the second is unusable.
        if matches!(tag, 5 | 6) {
            if index >= count {
                return Err(ParseError::Structural(format!(
                    "8-byte constant at index {} overruns the pool",
                    index - 1
                )));
            }
            cp.entries.push(CpSlot::INVALID);
            index += 1;
        }
    }

    // String entries must point at Utf8 entries; validate the rewrite now so
    // later reads are plain indexed lookups.
    for (slot, utf8_index) in cp.string_refs.iter().enumerate() {
        if cp.kind(*utf8_index) != CpKind::Utf8 {
            let index = cp
                .entries
                .iter()
                .position(|e| {
                    e.kind == CpKind::StringConst && usize::from(e.slot) == slot
                })
                .unwrap_or(0);
            return Err(ParseError::BadCrossReference { index: index as u16 });
        }
    }

    Ok(cp)
}

fn slot_for(kind: CpKind, table_len: usize) -> CpSlot {
    // Side tables are bounded by the pool count, which is a u16.
    CpSlot {
        kind,
        slot: (table_len - 1) as u16,
    }
}

fn read_member_ref(r: &mut Reader<'_>) -> Result<MemberRef, ParseError> {
    Ok(MemberRef {
        class_index: r.u2()?,
        name_and_type_index: r.u2()?,
    })
}

fn parse_field(r: &mut Reader<'_>, cp: &CPool) -> Result<ParsedField, ParseError> {
    let access_flags = FieldAccessFlags::from_bits_truncate(r.u2()?);
    let name = utf8_at(cp, r.u2()?)?;
    let descriptor = utf8_at(cp, r.u2()?)?;

    let mut constant_value = None;
    let mut attributes = Vec::new();
    let attr_count = r.u2()?;
    for _ in 0..attr_count {
        let (attr_name, data) = parse_raw_attribute(r, cp)?;
        if attr_name == "ConstantValue" {
            constant_value = Some(read_u2_of(&data, 0)?);
        } else {
            attributes.push(RawAttribute {
                name: attr_name,
                data,
            });
        }
    }

    Ok(ParsedField {
        access_flags,
        name,
        descriptor,
        constant_value,
        attributes,
    })
}

fn parse_method(r: &mut Reader<'_>, cp: &CPool) -> Result<ParsedMethod, ParseError> {
    let access_flags = MethodAccessFlags::from_bits_truncate(r.u2()?);
    let name = utf8_at(cp, r.u2()?)?;
    let descriptor = utf8_at(cp, r.u2()?)?;

    let mut code = None;
    let mut attributes = Vec::new();
    let attr_count = r.u2()?;
    for _ in 0..attr_count {
        let (attr_name, data) = parse_raw_attribute(r, cp)?;
        if attr_name == "Code" {
            code = Some(parse_code_attribute(&data, cp)?);
        } else {
            attributes.push(RawAttribute {
                name: attr_name,
                data,
            });
        }
    }

    Ok(ParsedMethod {
        access_flags,
        name,
        descriptor,
        code,
        attributes,
    })
}

fn parse_code_attribute(data: &[u8], cp: &CPool) -> Result<CodeAttribute, ParseError> {
    let mut r = Reader::new(data);
    let max_stack = r.u2()?;
    let max_locals = r.u2()?;
    let code_len = r.u4()?;
    let code = r.bytes(code_len as usize)?.to_vec();

    let exc_count = r.u2()?;
    let mut exception_table = Vec::with_capacity(usize::from(exc_count));
    for _ in 0..exc_count {
        exception_table.push(ExceptionTableEntry {
            start_pc: r.u2()?,
            end_pc: r.u2()?,
            handler_pc: r.u2()?,
            catch_type: r.u2()?,
        });
    }

    let mut attributes = Vec::new();
    let attr_count = r.u2()?;
    for _ in 0..attr_count {
        let (name, data) = parse_raw_attribute(&mut r, cp)?;
        attributes.push(RawAttribute { name, data });
    }

    if !r.is_at_end() {
        return Err(ParseError::Structural(
            "trailing bytes inside Code attribute".to_owned(),
        ));
    }

    Ok(CodeAttribute {
        max_stack,
        max_locals,
        code,
        exception_table,
        attributes,
    })
}

fn parse_bootstrap_methods(data: &[u8]) -> Result<Vec<BootstrapMethod>, ParseError> {
    let mut r = Reader::new(data);
    let count = r.u2()?;
    let mut bootstraps = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let method_ref = r.u2()?;
        let arg_count = r.u2()?;
        let mut args = Vec::with_capacity(usize::from(arg_count));
        for _ in 0..arg_count {
            args.push(r.u2()?);
        }
        bootstraps.push(BootstrapMethod { method_ref, args });
    }
    Ok(bootstraps)
}

fn parse_raw_attribute(
    r: &mut Reader<'_>,
    cp: &CPool,
) -> Result<(String, Vec<u8>), ParseError> {
    let name = utf8_at(cp, r.u2()?)?;
    let len = r.u4()?;
    let data = r.bytes(len as usize)?.to_vec();
    Ok((name, data))
}

fn utf8_at(cp: &CPool, index: u16) -> Result<String, ParseError> {
    cp.utf8(index)
        .map(str::to_owned)
        .map_err(|_| ParseError::BadCrossReference { index })
}

fn read_u2_of(data: &[u8], offset: usize) -> Result<u16, ParseError> {
    let bytes: [u8; 2] = data
        .get(offset..offset + 2)
        .and_then(|s| s.try_into().ok())
        .ok_or(ParseError::Truncated { at: offset })?;
    Ok(u16::from_be_bytes(bytes))
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Reader<'a> {
        Reader { data, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(ParseError::Truncated { at: self.pos })?;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or(ParseError::Truncated { at: self.pos })?;
        self.pos = end;
        Ok(slice)
    }

    fn u1(&mut self) -> Result<u8, ParseError> {
        Ok(self.bytes(1)?[0])
    }

    fn u2(&mut self) -> Result<u16, ParseError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> Result<u32, ParseError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u8(&mut self) -> Result<u64, ParseError> {
        let b = self.bytes(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    //! A tiny class-file writer used by parser and checker tests to build
    //! well-formed (and deliberately malformed) fixtures byte by byte.

    pub struct ClassWriter {
        pub bytes: Vec<u8>,
    }

    impl ClassWriter {
        pub fn new() -> ClassWriter {
            ClassWriter { bytes: Vec::new() }
        }

        pub fn u1(&mut self, v: u8) -> &mut Self {
            self.bytes.push(v);
            self
        }

        pub fn u2(&mut self, v: u16) -> &mut Self {
            self.bytes.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn u4(&mut self, v: u32) -> &mut Self {
            self.bytes.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn raw(&mut self, v: &[u8]) -> &mut Self {
            self.bytes.extend_from_slice(v);
            self
        }

        pub fn utf8(&mut self, text: &str) -> &mut Self {
            self.u1(1);
            self.u2(text.len() as u16);
            self.raw(text.as_bytes())
        }
    }

    /// A minimal `Hello2`-shaped class: constant pool with this/super class
    /// entries, a `println`-style string constant, a no-op `<init>`, and a
    /// `main([Ljava/lang/String;)V` whose body is a bare RETURN.
    pub fn hello_class_bytes() -> Vec<u8> {
        let mut w = ClassWriter::new();
        w.u4(0xCAFE_BABE);
        w.u2(0); // minor
        w.u2(61); // major (Java 17)

        w.u2(14); // cp count: 13 entries
        w.utf8("Hello2"); // 1
        w.u1(7).u2(1); // 2: Class -> 1
        w.utf8("java/lang/Object"); // 3
        w.u1(7).u2(3); // 4: Class -> 3
        w.utf8("<init>"); // 5
        w.utf8("()V"); // 6
        w.utf8("main"); // 7
        w.utf8("([Ljava/lang/String;)V"); // 8
        w.utf8("Code"); // 9
        w.utf8("Hello from Hello2.main!"); // 10
        w.u1(8).u2(10); // 11: String -> 10
        w.utf8("SourceFile"); // 12
        w.utf8("Hello2.java"); // 13

        w.u2(0x0021); // access: public super
        w.u2(2); // this: Hello2
        w.u2(4); // super: java/lang/Object
        w.u2(0); // no interfaces
        w.u2(0); // no fields

        w.u2(2); // two methods

        // <init>()V
        w.u2(0x0001); // public
        w.u2(5).u2(6);
        w.u2(1); // one attribute
        w.u2(9); // "Code"
        w.u4(2 + 2 + 4 + 1 + 2 + 2); // attribute length
        w.u2(1); // max_stack
        w.u2(1); // max_locals
        w.u4(1); // code length
        w.u1(0xb1); // RETURN
        w.u2(0); // exception table
        w.u2(0); // code attributes

        // main([Ljava/lang/String;)V
        w.u2(0x0009); // public static
        w.u2(7).u2(8);
        w.u2(1);
        w.u2(9); // "Code"
        w.u4(2 + 2 + 4 + 1 + 2 + 2);
        w.u2(2);
        w.u2(1);
        w.u4(1);
        w.u1(0xb1); // RETURN
        w.u2(0);
        w.u2(0);

        // class attributes: SourceFile
        w.u2(1);
        w.u2(12);
        w.u4(2);
        w.u2(13);

        w.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::fixture::hello_class_bytes;
    use super::*;

    #[test]
    fn parses_the_hello_fixture() {
        let bytes = hello_class_bytes();
        let parsed = parse_class(&bytes).unwrap();

        assert_eq!(parsed.this_class_name().unwrap(), "Hello2");
        assert_eq!(
            parsed.super_class_name().unwrap(),
            Some("java/lang/Object")
        );
        assert!(!parsed.methods.is_empty());

        let main = parsed
            .methods
            .iter()
            .find(|m| m.name == "main")
            .expect("expected a main method");
        assert_eq!(main.descriptor, "([Ljava/lang/String;)V");
        assert!(main.access_flags.contains(MethodAccessFlags::STATIC));
        assert!(main.code.is_some());

        assert_eq!(parsed.source_file.as_deref(), Some("Hello2.java"));
    }

    #[test]
    fn utf8_entries_survive_the_round_trip() {
        let bytes = hello_class_bytes();
        let parsed = parse_class(&bytes).unwrap();

        for expected in [
            "Hello2",
            "java/lang/Object",
            "<init>",
            "()V",
            "main",
            "([Ljava/lang/String;)V",
            "Hello from Hello2.main!",
        ] {
            assert!(
                parsed.cp.utf8s.iter().any(|s| s == expected),
                "missing utf8 entry {expected:?}"
            );
        }
    }

    #[test]
    fn string_entries_read_through_to_utf8() {
        let bytes = hello_class_bytes();
        let parsed = parse_class(&bytes).unwrap();
        assert_eq!(
            parsed.cp.string_const(11).unwrap(),
            "Hello from Hello2.main!"
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = hello_class_bytes();
        bytes[0] = 0xCB;
        let err = parse_class(&bytes).unwrap_err();
        assert_eq!(err, ParseError::BadMagic(0xCBFE_BABE));
        assert!(err.to_string().contains("invalid magic number"));
    }

    #[test]
    fn rejects_future_versions() {
        let mut bytes = hello_class_bytes();
        // major version bytes are at offset 6..8
        bytes[6] = 0;
        bytes[7] = 70;
        assert!(matches!(
            parse_class(&bytes),
            Err(ParseError::UnsupportedVersion { major: 70, .. })
        ));
    }

    #[test]
    fn rejects_truncated_streams() {
        let bytes = hello_class_bytes();
        let cut = &bytes[..bytes.len() / 2];
        assert!(matches!(
            parse_class(cut),
            Err(ParseError::Truncated { .. })
        ));
    }

    #[test]
    fn rejects_header_fragments() {
        assert_eq!(
            parse_class(&[0xCA, 0xFE]),
            Err(ParseError::MalformedHeader)
        );
    }

    #[test]
    fn rejects_unknown_constant_tags() {
        let mut w = fixture::ClassWriter::new();
        w.u4(0xCAFE_BABE).u2(0).u2(61);
        w.u2(2); // one constant
        w.u1(99); // bogus tag
        assert!(matches!(
            parse_class(&w.bytes),
            Err(ParseError::UnknownConstantTag { tag: 99, index: 1 })
        ));
    }
}
