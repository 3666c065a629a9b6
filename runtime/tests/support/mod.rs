//! In-test class-image assembly: enough of the class-file format to build
//! real images for the resolve → link → interpret path, in the spirit of
//! hand-built parser fixtures.
#![allow(dead_code)]

use cldc_runtime::class_loader::{Archive, ClassPath};
use cldc_runtime::vm::{Clock, VirtualMachine};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_SUPER: u16 = 0x0020;

enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Long(i64),
    Class(u16),
    Str(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    NameAndType(u16, u16),
    /// Trailing slot of a long/double.
    Unused,
}

struct MethodDef {
    flags: u16,
    name_index: u16,
    desc_index: u16,
    code: Option<CodeDef>,
}

struct CodeDef {
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    /// (start_pc, end_pc, handler_pc, catch_type_pool_index)
    handlers: Vec<(u16, u16, u16, u16)>,
}

pub struct ClassBuilder {
    pool: Vec<PoolEntry>,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
    flags: u16,
    this_index: u16,
    super_index: u16,
    fields: Vec<(u16, u16, u16)>,
    methods: Vec<MethodDef>,
}

impl ClassBuilder {
    pub fn new(name: &str, super_name: &str) -> Self {
        let mut builder = Self {
            pool: Vec::new(),
            utf8_cache: HashMap::new(),
            class_cache: HashMap::new(),
            flags: ACC_PUBLIC | ACC_SUPER,
            this_index: 0,
            super_index: 0,
            fields: Vec::new(),
            methods: Vec::new(),
        };
        builder.this_index = builder.class(name);
        builder.super_index = builder.class(super_name);
        builder
    }

    fn push(&mut self, entry: PoolEntry) -> u16 {
        self.pool.push(entry);
        self.pool.len() as u16 // pool is 1-indexed
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        if let Some(index) = self.utf8_cache.get(text) {
            return *index;
        }
        let index = self.push(PoolEntry::Utf8(text.to_string()));
        self.utf8_cache.insert(text.to_string(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.class_cache.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        let index = self.push(PoolEntry::Class(name_index));
        self.class_cache.insert(name.to_string(), index);
        index
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let utf8 = self.utf8(text);
        self.push(PoolEntry::Str(utf8))
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        self.push(PoolEntry::Integer(value))
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let index = self.push(PoolEntry::Long(value));
        self.push(PoolEntry::Unused);
        index
    }

    fn name_and_type(&mut self, name: &str, desc: &str) -> u16 {
        let name_index = self.utf8(name);
        let desc_index = self.utf8(desc);
        self.push(PoolEntry::NameAndType(name_index, desc_index))
    }

    pub fn field_ref(&mut self, class: &str, name: &str, desc: &str) -> u16 {
        let class_index = self.class(class);
        let nat = self.name_and_type(name, desc);
        self.push(PoolEntry::FieldRef(class_index, nat))
    }

    pub fn method_ref(&mut self, class: &str, name: &str, desc: &str) -> u16 {
        let class_index = self.class(class);
        let nat = self.name_and_type(name, desc);
        self.push(PoolEntry::MethodRef(class_index, nat))
    }

    pub fn add_field(&mut self, flags: u16, name: &str, desc: &str) -> &mut Self {
        let name_index = self.utf8(name);
        let desc_index = self.utf8(desc);
        self.fields.push((flags, name_index, desc_index));
        self
    }

    pub fn add_method(
        &mut self,
        flags: u16,
        name: &str,
        desc: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
    ) -> &mut Self {
        self.add_method_with_handlers(flags, name, desc, max_stack, max_locals, code, vec![])
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_method_with_handlers(
        &mut self,
        flags: u16,
        name: &str,
        desc: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
        handlers: Vec<(u16, u16, u16, u16)>,
    ) -> &mut Self {
        let name_index = self.utf8(name);
        let desc_index = self.utf8(desc);
        self.methods.push(MethodDef {
            flags,
            name_index,
            desc_index,
            code: Some(CodeDef { max_stack, max_locals, code, handlers }),
        });
        self
    }

    pub fn add_native_method(&mut self, flags: u16, name: &str, desc: &str) -> &mut Self {
        let name_index = self.utf8(name);
        let desc_index = self.utf8(desc);
        self.methods.push(MethodDef {
            flags: flags | ACC_NATIVE,
            name_index,
            desc_index,
            code: None,
        });
        self
    }

    pub fn build(&mut self) -> Vec<u8> {
        // "Code" must sit in the pool before emission
        let code_name = self.utf8("Code");

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // minor
        out.extend_from_slice(&47u16.to_be_bytes()); // major

        out.extend_from_slice(&((self.pool.len() + 1) as u16).to_be_bytes());
        for entry in &self.pool {
            match entry {
                PoolEntry::Utf8(text) => {
                    out.push(1);
                    out.extend_from_slice(&(text.len() as u16).to_be_bytes());
                    out.extend_from_slice(text.as_bytes());
                }
                PoolEntry::Integer(v) => {
                    out.push(3);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                PoolEntry::Long(v) => {
                    out.push(5);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                PoolEntry::Class(name) => {
                    out.push(7);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                PoolEntry::Str(utf8) => {
                    out.push(8);
                    out.extend_from_slice(&utf8.to_be_bytes());
                }
                PoolEntry::FieldRef(class, nat) => {
                    out.push(9);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&nat.to_be_bytes());
                }
                PoolEntry::MethodRef(class, nat) => {
                    out.push(10);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&nat.to_be_bytes());
                }
                PoolEntry::NameAndType(name, desc) => {
                    out.push(12);
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&desc.to_be_bytes());
                }
                PoolEntry::Unused => {}
            }
        }

        out.extend_from_slice(&self.flags.to_be_bytes());
        out.extend_from_slice(&self.this_index.to_be_bytes());
        out.extend_from_slice(&self.super_index.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces

        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for (flags, name, desc) in &self.fields {
            out.extend_from_slice(&flags.to_be_bytes());
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&desc.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes()); // attributes
        }

        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            out.extend_from_slice(&method.flags.to_be_bytes());
            out.extend_from_slice(&method.name_index.to_be_bytes());
            out.extend_from_slice(&method.desc_index.to_be_bytes());
            match &method.code {
                None => out.extend_from_slice(&0u16.to_be_bytes()),
                Some(code) => {
                    out.extend_from_slice(&1u16.to_be_bytes());
                    out.extend_from_slice(&code_name.to_be_bytes());
                    let body_len = 2 + 2 + 4 + code.code.len() + 2 + code.handlers.len() * 8 + 2;
                    out.extend_from_slice(&(body_len as u32).to_be_bytes());
                    out.extend_from_slice(&code.max_stack.to_be_bytes());
                    out.extend_from_slice(&code.max_locals.to_be_bytes());
                    out.extend_from_slice(&(code.code.len() as u32).to_be_bytes());
                    out.extend_from_slice(&code.code);
                    out.extend_from_slice(&(code.handlers.len() as u16).to_be_bytes());
                    for (start, end, handler, catch_type) in &code.handlers {
                        out.extend_from_slice(&start.to_be_bytes());
                        out.extend_from_slice(&end.to_be_bytes());
                        out.extend_from_slice(&handler.to_be_bytes());
                        out.extend_from_slice(&catch_type.to_be_bytes());
                    }
                    out.extend_from_slice(&0u16.to_be_bytes()); // nested attributes
                }
            }
        }

        out.extend_from_slice(&0u16.to_be_bytes()); // class attributes
        out
    }
}

/// Deterministic test clock shared between the test body and the VM.
pub struct FakeClock {
    millis: AtomicU64,
}

impl FakeClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { millis: AtomicU64::new(0) })
    }

    pub fn advance(&self, delta: u64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

pub fn vm_with_classes(classes: Vec<(&str, Vec<u8>)>, clock: Arc<FakeClock>) -> VirtualMachine {
    let entries: HashMap<String, Vec<u8>> = classes
        .into_iter()
        .map(|(name, bytes)| (format!("{name}.class"), bytes))
        .collect();
    let class_path = ClassPath::new(Archive::from_entries(entries), None);
    VirtualMachine::new_with(class_path, clock, 10_000).expect("vm construction")
}

/// Drive the pump to completion, advancing the fake clock whenever every
/// live thread is waiting.
pub fn run_to_completion(vm: &VirtualMachine, clock: &FakeClock) {
    use cldc_runtime::vm::PumpStatus;
    for _ in 0..1_000_000 {
        match vm.pump_once().expect("pump") {
            PumpStatus::Executed => {}
            PumpStatus::Idle => clock.advance(5),
            PumpStatus::Finished => return,
        }
    }
    panic!("vm did not finish");
}

/// Read an int static back from a linked class.
pub fn static_int(vm: &VirtualMachine, class: &str, field: &str) -> Option<i32> {
    let interner = vm.interner();
    let class_sym = interner.get_or_intern(class);
    let key = cldc_runtime::keys::FieldKey {
        name: interner.get_or_intern(field),
        desc: interner.get_or_intern("I"),
    };
    let ma = vm.method_area_read();
    let class_id = ma.lookup(class_sym)?;
    let slot = ma.get_class(&class_id).static_slot(&key)?;
    Some(slot as u32 as i32)
}
