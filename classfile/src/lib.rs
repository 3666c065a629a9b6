use crate::attribute::RawAttribute;
use crate::constant::pool::ConstantPool;
use crate::field::FieldInfo;
use crate::flags::{ClassFlags, FieldFlags, MethodFlags};
use crate::method::MethodInfo;
use cldc_common::cursor::{Cursor, CursorError};

pub mod attribute;
pub mod constant;
pub mod field;
pub mod flags;
pub mod method;
pub mod mutf8;

pub const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    BadMagic(u32),
    Truncated(CursorError),
    UnknownConstantTag { tag: u8, index: u16 },
    BadAttribute(&'static str),
}

impl std::fmt::Display for ClassFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassFileError::BadMagic(magic) => write!(f, "bad magic 0x{magic:08x}"),
            ClassFileError::Truncated(e) => write!(f, "truncated class file: {e}"),
            ClassFileError::UnknownConstantTag { tag, index } => {
                write!(f, "unknown constant pool tag {tag} at index {index}")
            }
            ClassFileError::BadAttribute(what) => write!(f, "malformed {what} attribute"),
        }
    }
}

impl From<CursorError> for ClassFileError {
    fn from(value: CursorError) -> Self {
        ClassFileError::Truncated(value)
    }
}

/// A decoded class-file image. Purely structural: constant-pool entries are
/// kept as read, attribute bodies are raw bytes, and no runtime state is
/// allocated here.
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub cp: ConstantPool,
    pub access_flags: ClassFlags,
    pub this_class: u16,
    /// Zero when the class has no superclass (the root class).
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<RawAttribute>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, ClassFileError> {
        let mut cursor = Cursor::new(bytes);

        let magic = cursor.read_u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let minor_version = cursor.read_u16()?;
        let major_version = cursor.read_u16()?;

        let cp = ConstantPool::parse(&mut cursor)?;

        let access_flags = ClassFlags::new(cursor.read_u16()?);
        let this_class = cursor.read_u16()?;
        let super_class = cursor.read_u16()?;

        let interface_count = cursor.read_u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(cursor.read_u16()?);
        }

        let field_count = cursor.read_u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(FieldInfo {
                access_flags: FieldFlags::new(cursor.read_u16()?),
                name_index: cursor.read_u16()?,
                descriptor_index: cursor.read_u16()?,
                attributes: RawAttribute::parse_table(&mut cursor)?,
            });
        }

        let method_count = cursor.read_u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(MethodInfo {
                access_flags: MethodFlags::new(cursor.read_u16()?),
                name_index: cursor.read_u16()?,
                descriptor_index: cursor.read_u16()?,
                attributes: RawAttribute::parse_table(&mut cursor)?,
            });
        }

        let attributes = RawAttribute::parse_table(&mut cursor)?;

        Ok(ClassFile {
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
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::ConstantInfo;

    // Minimal image builder used only by decoder tests.
    struct Image {
        bytes: Vec<u8>,
    }

    impl Image {
        fn new() -> Self {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&MAGIC.to_be_bytes());
            bytes.extend_from_slice(&0u16.to_be_bytes()); // minor
            bytes.extend_from_slice(&47u16.to_be_bytes()); // major (CLDC 1.1 era)
            Self { bytes }
        }

        fn u16(&mut self, v: u16) -> &mut Self {
            self.bytes.extend_from_slice(&v.to_be_bytes());
            self
        }

        fn raw(&mut self, v: &[u8]) -> &mut Self {
            self.bytes.extend_from_slice(v);
            self
        }
    }

    fn minimal_class() -> Vec<u8> {
        let mut image = Image::new();
        image.u16(5); // cp count: Class, Utf8, Long (+ its unused trailer)
        image.raw(&[7]).u16(2); // 1: Class -> #2
        image.raw(&[1]).u16(4).raw(b"Main"); // 2: Utf8 "Main"
        image.raw(&[5]).raw(&1i64.to_be_bytes()); // 3: Long (occupies 3 and 4)
        image.u16(0x0021); // flags
        image.u16(1); // this
        image.u16(0); // super (root)
        image.u16(0); // interfaces
        image.u16(0); // fields
        image.u16(0); // methods
        image.u16(0); // class attributes
        image.bytes
    }

    #[test]
    fn parses_minimal_class() {
        let cf = ClassFile::parse(&minimal_class()).unwrap();
        assert_eq!(cf.major_version, 47);
        assert_eq!(cf.this_class, 1);
        assert_eq!(cf.super_class, 0);
        assert!(cf.access_flags.is_public());
        assert_eq!(cf.cp.get(1), Some(&ConstantInfo::Class(2)));
        assert_eq!(cf.cp.utf8_bytes(2).unwrap(), b"Main".as_slice());
        assert_eq!(cf.cp.get(3), Some(&ConstantInfo::Long(1)));
        // second slot of a long is an unusable sentinel
        assert_eq!(cf.cp.get(4), Some(&ConstantInfo::Unused));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = minimal_class();
        bytes[0] = 0xDE;
        assert!(matches!(ClassFile::parse(&bytes), Err(ClassFileError::BadMagic(_))));
    }

    #[test]
    fn rejects_truncation() {
        let bytes = minimal_class();
        assert!(matches!(
            ClassFile::parse(&bytes[..bytes.len() - 3]),
            Err(ClassFileError::Truncated(_))
        ));
    }

    #[test]
    fn rejects_unknown_tag() {
        let mut image = Image::new();
        image.u16(2);
        image.raw(&[42]); // no such tag
        assert!(matches!(
            ClassFile::parse(&image.bytes),
            Err(ClassFileError::UnknownConstantTag { tag: 42, index: 1 })
        ));
    }
}
