use crate::error::VmError;
use crate::keys::{FieldKey, MethodKey, Symbol};
use cldc_classfile::constant::{ConstantInfo, pool::ConstantPool};
use cldc_classfile::mutf8;
use lasso::ThreadedRodeo;
use once_cell::sync::OnceCell;

pub struct Utf8Entry {
    pub bytes: Vec<u8>,
    sym: OnceCell<Symbol>,
}

pub struct ClassEntry {
    name_idx: u16,
    name_sym: OnceCell<Symbol>,
}

pub struct StringEntry {
    string_idx: u16,
    string_sym: OnceCell<Symbol>,
}

pub struct RefEntry {
    class_idx: u16,
    nat_idx: u16,
    class_sym: OnceCell<Symbol>,
}

pub struct NameAndTypeEntry {
    name_idx: u16,
    descriptor_idx: u16,
    name_sym: OnceCell<Symbol>,
    descriptor_sym: OnceCell<Symbol>,
}

#[derive(Debug, Clone, Copy)]
pub struct NameAndTypeView {
    pub name: Symbol,
    pub desc: Symbol,
}

impl From<NameAndTypeView> for FieldKey {
    fn from(view: NameAndTypeView) -> Self {
        FieldKey { name: view.name, desc: view.desc }
    }
}

impl From<NameAndTypeView> for MethodKey {
    fn from(view: NameAndTypeView) -> Self {
        MethodKey { name: view.name, desc: view.desc }
    }
}

/// Resolved view of a field-ref, method-ref or interface-method-ref entry.
#[derive(Debug, Clone, Copy)]
pub struct MemberRefView {
    pub class_sym: Symbol,
    pub name_and_type: NameAndTypeView,
}

pub enum RuntimeConstant {
    Unused,
    Utf8(Utf8Entry),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(ClassEntry),
    String(StringEntry),
    Field(RefEntry),
    Method(RefEntry),
    InterfaceMethod(RefEntry),
    NameAndType(NameAndTypeEntry),
}

/// Constant pool bound to runtime lookups: symbols are interned lazily the
/// first time an entry is viewed.
pub struct RuntimeConstantPool {
    entries: Vec<RuntimeConstant>,
}

impl RuntimeConstantPool {
    pub fn new(pool: ConstantPool) -> Self {
        let entries = pool
            .inner
            .into_iter()
            .map(|entry| match entry {
                ConstantInfo::Unused => RuntimeConstant::Unused,
                ConstantInfo::Utf8(bytes) => {
                    RuntimeConstant::Utf8(Utf8Entry { bytes, sym: OnceCell::new() })
                }
                ConstantInfo::Integer(v) => RuntimeConstant::Integer(v),
                ConstantInfo::Float(v) => RuntimeConstant::Float(v),
                ConstantInfo::Long(v) => RuntimeConstant::Long(v),
                ConstantInfo::Double(v) => RuntimeConstant::Double(v),
                ConstantInfo::Class(name_idx) => {
                    RuntimeConstant::Class(ClassEntry { name_idx, name_sym: OnceCell::new() })
                }
                ConstantInfo::String(string_idx) => {
                    RuntimeConstant::String(StringEntry { string_idx, string_sym: OnceCell::new() })
                }
                ConstantInfo::FieldRef(r) => RuntimeConstant::Field(RefEntry {
                    class_idx: r.class_index,
                    nat_idx: r.name_and_type_index,
                    class_sym: OnceCell::new(),
                }),
                ConstantInfo::MethodRef(r) => RuntimeConstant::Method(RefEntry {
                    class_idx: r.class_index,
                    nat_idx: r.name_and_type_index,
                    class_sym: OnceCell::new(),
                }),
                ConstantInfo::InterfaceMethodRef(r) => RuntimeConstant::InterfaceMethod(RefEntry {
                    class_idx: r.class_index,
                    nat_idx: r.name_and_type_index,
                    class_sym: OnceCell::new(),
                }),
                ConstantInfo::NameAndType(nat) => RuntimeConstant::NameAndType(NameAndTypeEntry {
                    name_idx: nat.name_index,
                    descriptor_idx: nat.descriptor_index,
                    name_sym: OnceCell::new(),
                    descriptor_sym: OnceCell::new(),
                }),
            })
            .collect();
        Self { entries }
    }

    /// Pool of a synthesised class: index 0 only.
    pub fn empty() -> Self {
        Self { entries: vec![RuntimeConstant::Unused] }
    }

    fn entry(&self, idx: u16) -> Result<&RuntimeConstant, VmError> {
        self.entries
            .get(idx as usize)
            .ok_or(VmError::ConstantPool { index: idx, expected: "valid index" })
    }

    /// Raw modified-UTF-8 bytes of a Utf8 entry, for demand-parsing code
    /// attribute names.
    pub fn raw_utf8(&self, idx: u16) -> Option<&[u8]> {
        match self.entries.get(idx as usize)? {
            RuntimeConstant::Utf8(entry) => Some(&entry.bytes),
            _ => None,
        }
    }

    pub fn get_utf8_sym(&self, idx: u16, interner: &ThreadedRodeo) -> Result<Symbol, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::Utf8(entry) => Ok(*entry
                .sym
                .get_or_init(|| interner.get_or_intern(mutf8::to_string(&entry.bytes)))),
            _ => Err(VmError::ConstantPool { index: idx, expected: "Utf8" }),
        }
    }

    pub fn get_class_sym(&self, idx: u16, interner: &ThreadedRodeo) -> Result<Symbol, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::Class(entry) => entry
                .name_sym
                .get_or_try_init(|| self.get_utf8_sym(entry.name_idx, interner))
                .copied(),
            _ => Err(VmError::ConstantPool { index: idx, expected: "Class" }),
        }
    }

    pub fn get_string_sym(&self, idx: u16, interner: &ThreadedRodeo) -> Result<Symbol, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::String(entry) => entry
                .string_sym
                .get_or_try_init(|| self.get_utf8_sym(entry.string_idx, interner))
                .copied(),
            _ => Err(VmError::ConstantPool { index: idx, expected: "String" }),
        }
    }

    pub fn get_nat_view(&self, idx: u16, interner: &ThreadedRodeo) -> Result<NameAndTypeView, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::NameAndType(entry) => {
                let name = *entry
                    .name_sym
                    .get_or_try_init(|| self.get_utf8_sym(entry.name_idx, interner))?;
                let desc = *entry
                    .descriptor_sym
                    .get_or_try_init(|| self.get_utf8_sym(entry.descriptor_idx, interner))?;
                Ok(NameAndTypeView { name, desc })
            }
            _ => Err(VmError::ConstantPool { index: idx, expected: "NameAndType" }),
        }
    }

    fn member_view(&self, entry: &RefEntry, interner: &ThreadedRodeo) -> Result<MemberRefView, VmError> {
        let class_sym = *entry
            .class_sym
            .get_or_try_init(|| self.get_class_sym(entry.class_idx, interner))?;
        let name_and_type = self.get_nat_view(entry.nat_idx, interner)?;
        Ok(MemberRefView { class_sym, name_and_type })
    }

    pub fn get_field_view(&self, idx: u16, interner: &ThreadedRodeo) -> Result<MemberRefView, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::Field(entry) => self.member_view(entry, interner),
            _ => Err(VmError::ConstantPool { index: idx, expected: "Fieldref" }),
        }
    }

    pub fn get_method_view(&self, idx: u16, interner: &ThreadedRodeo) -> Result<MemberRefView, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::Method(entry) => self.member_view(entry, interner),
            _ => Err(VmError::ConstantPool { index: idx, expected: "Methodref" }),
        }
    }

    pub fn get_interface_method_view(
        &self,
        idx: u16,
        interner: &ThreadedRodeo,
    ) -> Result<MemberRefView, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::InterfaceMethod(entry) => self.member_view(entry, interner),
            _ => Err(VmError::ConstantPool { index: idx, expected: "InterfaceMethodref" }),
        }
    }

    /// invokestatic accepts either member-ref form.
    pub fn get_method_or_interface_method_view(
        &self,
        idx: u16,
        interner: &ThreadedRodeo,
    ) -> Result<MemberRefView, VmError> {
        match self.entry(idx)? {
            RuntimeConstant::Method(entry) | RuntimeConstant::InterfaceMethod(entry) => {
                self.member_view(entry, interner)
            }
            _ => Err(VmError::ConstantPool { index: idx, expected: "Methodref" }),
        }
    }

    /// Entry for `ldc`-family materialisation, with referenced symbols
    /// pre-resolved.
    pub fn get_constant(&self, idx: u16, interner: &ThreadedRodeo) -> Result<&RuntimeConstant, VmError> {
        let entry = self.entry(idx)?;
        match entry {
            RuntimeConstant::Class(_) => {
                self.get_class_sym(idx, interner)?;
            }
            RuntimeConstant::String(_) => {
                self.get_string_sym(idx, interner)?;
            }
            _ => {}
        }
        Ok(entry)
    }
}
