pub mod pool {
    pub use super::ConstantPool;
}

use crate::ClassFileError;
use cldc_common::cursor::Cursor;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELD_REF: u8 = 9;
const TAG_METHOD_REF: u8 = 10;
const TAG_INTERFACE_METHOD_REF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefInfo {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameAndTypeInfo {
    pub name_index: u16,
    pub descriptor_index: u16,
}

/// One constant-pool entry. `Utf8` keeps the raw modified-UTF-8 bytes;
/// conversion happens where strings are materialised. `Unused` fills index 0
/// and the trailing slot of every long/double.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantInfo {
    Unused,
    Utf8(Vec<u8>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(RefInfo),
    MethodRef(RefInfo),
    InterfaceMethodRef(RefInfo),
    NameAndType(NameAndTypeInfo),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    pub inner: Vec<ConstantInfo>,
}

impl ConstantPool {
    pub fn empty() -> Self {
        Self { inner: vec![ConstantInfo::Unused] }
    }

    pub(crate) fn parse(cursor: &mut Cursor<'_>) -> Result<Self, ClassFileError> {
        let count = cursor.read_u16()?;
        let mut inner = Vec::with_capacity(count as usize);
        inner.push(ConstantInfo::Unused);
        let mut index = 1u16;
        while index < count {
            let tag = cursor.read_u8()?;
            let entry = match tag {
                TAG_UTF8 => {
                    let len = cursor.read_u16()? as usize;
                    ConstantInfo::Utf8(cursor.read_bytes(len)?.to_vec())
                }
                TAG_INTEGER => ConstantInfo::Integer(cursor.read_u32()? as i32),
                TAG_FLOAT => ConstantInfo::Float(f32::from_bits(cursor.read_u32()?)),
                TAG_LONG => {
                    let high = cursor.read_u32()? as u64;
                    let low = cursor.read_u32()? as u64;
                    ConstantInfo::Long(((high << 32) | low) as i64)
                }
                TAG_DOUBLE => {
                    let high = cursor.read_u32()? as u64;
                    let low = cursor.read_u32()? as u64;
                    ConstantInfo::Double(f64::from_bits((high << 32) | low))
                }
                TAG_CLASS => ConstantInfo::Class(cursor.read_u16()?),
                TAG_STRING => ConstantInfo::String(cursor.read_u16()?),
                TAG_FIELD_REF => ConstantInfo::FieldRef(RefInfo {
                    class_index: cursor.read_u16()?,
                    name_and_type_index: cursor.read_u16()?,
                }),
                TAG_METHOD_REF => ConstantInfo::MethodRef(RefInfo {
                    class_index: cursor.read_u16()?,
                    name_and_type_index: cursor.read_u16()?,
                }),
                TAG_INTERFACE_METHOD_REF => ConstantInfo::InterfaceMethodRef(RefInfo {
                    class_index: cursor.read_u16()?,
                    name_and_type_index: cursor.read_u16()?,
                }),
                TAG_NAME_AND_TYPE => ConstantInfo::NameAndType(NameAndTypeInfo {
                    name_index: cursor.read_u16()?,
                    descriptor_index: cursor.read_u16()?,
                }),
                tag => return Err(ClassFileError::UnknownConstantTag { tag, index }),
            };
            let two_slots = matches!(entry, ConstantInfo::Long(_) | ConstantInfo::Double(_));
            inner.push(entry);
            index += 1;
            if two_slots {
                inner.push(ConstantInfo::Unused);
                index += 1;
            }
        }
        Ok(Self { inner })
    }

    /// 1-indexed lookup; index 0 and long/double trailers answer `Unused`.
    pub fn get(&self, index: u16) -> Option<&ConstantInfo> {
        self.inner.get(index as usize)
    }

    pub fn utf8_bytes(&self, index: u16) -> Option<&[u8]> {
        match self.get(index)? {
            ConstantInfo::Utf8(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() <= 1
    }
}
