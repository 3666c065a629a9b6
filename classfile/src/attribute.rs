use crate::ClassFileError;
use crate::constant::pool::ConstantPool;
use cldc_common::cursor::Cursor;

/// An attribute as it appears in the image: name index plus raw body bytes.
/// The runtime demand-parses `Code` on first execution; everything it does
/// not recognise stays raw and is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl RawAttribute {
    pub(crate) fn parse_table(cursor: &mut Cursor<'_>) -> Result<Vec<RawAttribute>, ClassFileError> {
        let count = cursor.read_u16()?;
        let mut attributes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name_index = cursor.read_u16()?;
            let len = cursor.read_u32()? as usize;
            attributes.push(RawAttribute {
                name_index,
                info: cursor.read_bytes(len)?.to_vec(),
            });
        }
        Ok(attributes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Constant-pool index of the catch class, or zero for "any".
    pub catch_type: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub line_numbers: Vec<LineNumberEntry>,
}

impl CodeAttribute {
    /// Parse a raw `Code` attribute body. `cp` is needed to recognise the
    /// nested attribute names; unrecognised nested attributes are skipped.
    pub fn parse(info: &[u8], cp: &ConstantPool) -> Result<CodeAttribute, ClassFileError> {
        Self::parse_with(info, |idx| cp.utf8_bytes(idx) == Some(b"LineNumberTable".as_slice()))
    }

    /// Like [`CodeAttribute::parse`], with the name lookup abstracted so a
    /// runtime pool can drive it. The predicate answers whether the given
    /// constant-pool index names the `LineNumberTable` attribute.
    pub fn parse_with(
        info: &[u8],
        is_line_number_table: impl Fn(u16) -> bool,
    ) -> Result<CodeAttribute, ClassFileError> {
        let mut cursor = Cursor::new(info);
        let max_stack = cursor.read_u16()?;
        let max_locals = cursor.read_u16()?;
        let code_len = cursor.read_u32()? as usize;
        let code = cursor.read_bytes(code_len)?.to_vec();

        let exception_count = cursor.read_u16()?;
        let mut exception_table = Vec::with_capacity(exception_count as usize);
        for _ in 0..exception_count {
            exception_table.push(ExceptionTableEntry {
                start_pc: cursor.read_u16()?,
                end_pc: cursor.read_u16()?,
                handler_pc: cursor.read_u16()?,
                catch_type: cursor.read_u16()?,
            });
        }

        let mut line_numbers = Vec::new();
        let attribute_count = cursor.read_u16()?;
        for _ in 0..attribute_count {
            let name_index = cursor.read_u16()?;
            let len = cursor.read_u32()? as usize;
            let body = cursor.read_bytes(len)?;
            if is_line_number_table(name_index) {
                let mut nested = Cursor::new(body);
                let entry_count = nested.read_u16()?;
                for _ in 0..entry_count {
                    line_numbers.push(LineNumberEntry {
                        start_pc: nested.read_u16()?,
                        line_number: nested.read_u16()?,
                    });
                }
            }
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            line_numbers,
        })
    }
}

pub mod method {
    pub use super::{CodeAttribute, ExceptionTableEntry, LineNumberEntry};
}
