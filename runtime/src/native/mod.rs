use crate::error::VmError;
use crate::keys::FullyQualifiedMethodKey;
use crate::thread::VmThread;
use crate::vm::VirtualMachine;
use dashmap::DashMap;
use lasso::ThreadedRodeo;
use std::sync::Arc;

pub mod preregistered;

/// A host-supplied method body. By convention it pops exactly the receiver
/// (for instance methods) and the declared arguments from the current
/// frame's operand stack, performs its effect, and pushes one value when
/// the descriptor is non-void. It may allocate, raise Java exceptions, or
/// suspend the calling thread.
pub type NativeFn = fn(&VirtualMachine, &mut VmThread) -> Result<(), VmError>;

/// Bindings keyed by `class|name|descriptor`. Registration goes through a
/// shared reference so hosts can install natives after VM construction.
pub struct NativeRegistry {
    bindings: DashMap<FullyQualifiedMethodKey, NativeFn>,
    pub string_interner: Arc<ThreadedRodeo>,
}

impl NativeRegistry {
    pub fn new(string_interner: Arc<ThreadedRodeo>) -> Self {
        Self {
            bindings: DashMap::new(),
            string_interner,
        }
    }

    pub fn register(&self, key: FullyQualifiedMethodKey, native: NativeFn) {
        self.bindings.insert(key, native);
    }

    pub fn register_str(&self, class: &str, name: &str, desc: &str, native: NativeFn) {
        self.register(
            FullyQualifiedMethodKey::new_with_str(class, name, desc, &self.string_interner),
            native,
        );
    }

    pub fn get(&self, key: &FullyQualifiedMethodKey) -> Option<NativeFn> {
        self.bindings.get(key).map(|entry| *entry)
    }
}
