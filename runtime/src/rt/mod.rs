use crate::heap::HeapRef;
use crate::keys::{ClassId, FieldKey, MethodKey, Symbol, ThreadId};
use crate::rt::constant_pool::RuntimeConstantPool;
use cldc_classfile::flags::ClassFlags;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::RwLock;

pub mod constant_pool;
pub mod method;

use crate::keys::MethodId;

/// Initialisation lifecycle of a linked class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing(ThreadId),
    Initialized,
    Erroneous,
}

/// A class bound to runtime data: resolved superclass/interfaces, the field
/// offset table (superclass slots included before own), static storage, and
/// the initialisation state. Lives for the VM lifetime.
pub struct LinkedClass {
    pub name: Symbol,
    pub flags: ClassFlags,
    super_id: Option<ClassId>,
    interfaces: Vec<ClassId>,
    pub cp: RuntimeConstantPool,
    methods: HashMap<MethodKey, MethodId>,
    clinit: Option<MethodId>,
    field_offsets: HashMap<FieldKey, usize>,
    instance_slots: usize,
    /// Raw 64-bit slots of the statics declared on this class; lookups never
    /// inherit storage.
    statics: RwLock<HashMap<FieldKey, u64>>,
    state: RwLock<InitState>,
    mirror: OnceCell<HeapRef>,
    pub source_file: Option<Symbol>,
}

impl LinkedClass {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: Symbol,
        flags: ClassFlags,
        super_id: Option<ClassId>,
        interfaces: Vec<ClassId>,
        cp: RuntimeConstantPool,
        methods: HashMap<MethodKey, MethodId>,
        clinit: Option<MethodId>,
        field_offsets: HashMap<FieldKey, usize>,
        instance_slots: usize,
        statics: HashMap<FieldKey, u64>,
        source_file: Option<Symbol>,
    ) -> Self {
        Self {
            name,
            flags,
            super_id,
            interfaces,
            cp,
            methods,
            clinit,
            field_offsets,
            instance_slots,
            statics: RwLock::new(statics),
            state: RwLock::new(InitState::Uninitialized),
            mirror: OnceCell::new(),
            source_file,
        }
    }

    pub fn super_id(&self) -> Option<ClassId> {
        self.super_id
    }

    pub fn interfaces(&self) -> &[ClassId] {
        &self.interfaces
    }

    pub fn field_offset(&self, key: &FieldKey) -> Option<usize> {
        self.field_offsets.get(key).copied()
    }

    pub fn field_offsets(&self) -> &HashMap<FieldKey, usize> {
        &self.field_offsets
    }

    pub fn instance_slots(&self) -> usize {
        self.instance_slots
    }

    pub fn method_id(&self, key: &MethodKey) -> Option<MethodId> {
        self.methods.get(key).copied()
    }

    pub fn methods(&self) -> &HashMap<MethodKey, MethodId> {
        &self.methods
    }

    pub fn clinit_method_id(&self) -> Option<MethodId> {
        self.clinit
    }

    pub fn has_static(&self, key: &FieldKey) -> bool {
        self.statics.read().unwrap().contains_key(key)
    }

    pub fn static_slot(&self, key: &FieldKey) -> Option<u64> {
        self.statics.read().unwrap().get(key).copied()
    }

    /// Returns false when the field is not declared here.
    pub fn set_static_slot(&self, key: &FieldKey, slot: u64) -> bool {
        match self.statics.write().unwrap().get_mut(key) {
            Some(value) => {
                *value = slot;
                true
            }
            None => false,
        }
    }

    pub fn init_state(&self) -> InitState {
        *self.state.read().unwrap()
    }

    pub fn set_init_state(&self, state: InitState) {
        *self.state.write().unwrap() = state;
    }

    pub fn mirror(&self) -> Option<HeapRef> {
        self.mirror.get().copied()
    }

    pub fn set_mirror(&self, heap_ref: HeapRef) {
        // racing setters are impossible under the single executor; a second
        // set is simply ignored
        let _ = self.mirror.set(heap_ref);
    }
}
