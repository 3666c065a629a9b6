use crate::error::{PendingException, VmError};
use crate::heap::HeapRef;
use crate::vm::{Value, VirtualMachine};

impl VirtualMachine {
    /// Materialise a pending exception as an instance of its bootstrap
    /// class, with `detailMessage` seeded when the class declares it. The
    /// result feeds the interpreter's unwind loop.
    pub fn raise(&self, pending: PendingException) -> Result<HeapRef, VmError> {
        let class_id = self.resolve_class(pending.kind.class_name())?;
        let instance = self.alloc_instance_of(class_id);
        if let Some(message) = pending.message {
            let text = message.into_resolved(self.interner());
            let string = self.materialize_string(&text)?;
            let offset = self
                .method_area_read()
                .get_class(&class_id)
                .field_offset(&self.br.detail_message_fk);
            if let Some(offset) = offset {
                self.heap_write().write_field(instance, offset, &Value::Ref(string))?;
            }
        }
        Ok(instance)
    }
}
