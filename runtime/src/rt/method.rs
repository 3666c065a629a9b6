use crate::error::VmError;
use crate::keys::{ClassId, Symbol};
use crate::rt::constant_pool::RuntimeConstantPool;
use cldc_classfile::attribute::method::{CodeAttribute, ExceptionTableEntry, LineNumberEntry};
use cldc_classfile::constant::pool::ConstantPool;
use cldc_classfile::flags::{ACC_NATIVE, ACC_PUBLIC, ACC_STATIC, MethodFlags};
use cldc_classfile::method::MethodInfo;
use cldc_classfile::mutf8;
use cldc_common::descriptor::MethodDescriptor;
use once_cell::sync::OnceCell;

pub struct CodeBody {
    pub code: Box<[u8]>,
    pub max_stack: u16,
    pub max_locals: u16,
    pub exception_table: Vec<ExceptionTableEntry>,
    line_numbers: Vec<LineNumberEntry>,
}

impl From<CodeAttribute> for CodeBody {
    fn from(attr: CodeAttribute) -> Self {
        CodeBody {
            code: attr.code.into_boxed_slice(),
            max_stack: attr.max_stack,
            max_locals: attr.max_locals,
            exception_table: attr.exception_table,
            line_numbers: attr.line_numbers,
        }
    }
}

impl CodeBody {
    pub fn line_number_at(&self, pc: usize) -> Option<u16> {
        let mut result = None;
        for entry in &self.line_numbers {
            if entry.start_pc as usize <= pc {
                result = Some(entry.line_number);
            } else {
                break;
            }
        }
        result
    }
}

pub enum MethodBody {
    /// Raw `Code` attribute bytes, parsed on first execution.
    Interpreted { raw: Vec<u8>, parsed: OnceCell<CodeBody> },
    Native,
    Abstract,
}

pub struct Method {
    class_id: ClassId,
    pub name: Symbol,
    pub desc: Symbol,
    flags: MethodFlags,
    /// Argument values on the operand stack, receiver excluded.
    pub param_count: usize,
    /// Local-variable slots the arguments occupy, receiver excluded.
    pub param_slots: usize,
    pub returns_value: bool,
    body: MethodBody,
}

impl Method {
    pub fn from_info(
        info: MethodInfo,
        class_id: ClassId,
        name: Symbol,
        desc: Symbol,
        desc_str: &str,
        cp: &ConstantPool,
    ) -> Result<Self, VmError> {
        let flags = info.access_flags;
        let body = if flags.is_abstract() {
            MethodBody::Abstract
        } else if flags.is_native() {
            MethodBody::Native
        } else {
            let raw = info
                .attributes
                .into_iter()
                .find(|attr| {
                    cp.utf8_bytes(attr.name_index)
                        .map(mutf8::to_string)
                        .is_some_and(|n| n == "Code")
                })
                .map(|attr| attr.info)
                .ok_or_else(|| VmError::MethodHasNoCode(desc_str.to_string()))?;
            MethodBody::Interpreted { raw, parsed: OnceCell::new() }
        };
        let descriptor = MethodDescriptor::try_from(desc_str)?;
        Ok(Method {
            class_id,
            name,
            desc,
            flags,
            param_count: descriptor.param_count(),
            param_slots: descriptor.param_slots(),
            returns_value: descriptor.ret.is_some(),
            body,
        })
    }

    /// A native-marked stub on a synthesised bootstrap class.
    pub fn native_stub(
        class_id: ClassId,
        name: Symbol,
        desc: Symbol,
        desc_str: &str,
        is_static: bool,
    ) -> Result<Self, VmError> {
        let raw_flags = if is_static {
            ACC_PUBLIC | ACC_NATIVE | ACC_STATIC
        } else {
            ACC_PUBLIC | ACC_NATIVE
        };
        let descriptor = MethodDescriptor::try_from(desc_str)?;
        Ok(Method {
            class_id,
            name,
            desc,
            flags: MethodFlags::new(raw_flags),
            param_count: descriptor.param_count(),
            param_slots: descriptor.param_slots(),
            returns_value: descriptor.ret.is_some(),
            body: MethodBody::Native,
        })
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn is_static(&self) -> bool {
        self.flags.is_static()
    }

    pub fn is_native(&self) -> bool {
        self.flags.is_native()
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.is_abstract()
    }

    /// Demand-parse and cache the code body. `cp` must be the declaring
    /// class's pool.
    pub fn code(&self, cp: &RuntimeConstantPool, pretty_name: &str) -> Result<&CodeBody, VmError> {
        match &self.body {
            MethodBody::Interpreted { raw, parsed } => parsed.get_or_try_init(|| {
                let attr = CodeAttribute::parse_with(raw, |idx| {
                    cp.raw_utf8(idx) == Some(b"LineNumberTable".as_slice())
                })?;
                Ok(CodeBody::from(attr))
            }),
            MethodBody::Native => Err(VmError::MethodHasNoCode(pretty_name.to_string())),
            MethodBody::Abstract => Err(VmError::MethodIsAbstract(pretty_name.to_string())),
        }
    }
}
