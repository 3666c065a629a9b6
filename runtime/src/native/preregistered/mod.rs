use crate::error::VmError;
use crate::heap::HeapRef;
use crate::keys::FieldKey;
use crate::native::NativeRegistry;
use crate::vm::{Value, VirtualMachine};

mod java_io;
mod java_lang;

/// Install the bootstrap natives the core itself depends on: string
/// construction, buffer internment, clock, identity hash, array copy,
/// thread sleep/start/join, system exit, class access, and stream I/O.
pub fn register_all(registry: &NativeRegistry) {
    java_lang::register(registry);
    java_io::register(registry);
}

/// Offset of `key` in the receiver's class layout.
pub(super) fn field_offset_of(
    vm: &VirtualMachine,
    handle: HeapRef,
    key: &FieldKey,
) -> Result<Option<usize>, VmError> {
    let Some(class_id) = vm.heap_read().class_of(handle)? else {
        return Ok(None);
    };
    Ok(vm.method_area_read().get_class(&class_id).field_offset(key))
}

pub(super) fn read_ref_field(
    vm: &VirtualMachine,
    handle: HeapRef,
    key: &FieldKey,
) -> Result<Option<HeapRef>, VmError> {
    let Some(offset) = field_offset_of(vm, handle, key)? else {
        return Ok(None);
    };
    match vm
        .heap_read()
        .read_field(handle, offset, crate::heap::slot::SlotKind::Reference)?
    {
        Value::Ref(r) => Ok(Some(r)),
        _ => Ok(None),
    }
}

pub(super) fn write_field_if_present(
    vm: &VirtualMachine,
    handle: HeapRef,
    key: &FieldKey,
    value: Value,
) -> Result<(), VmError> {
    if let Some(offset) = field_offset_of(vm, handle, key)? {
        vm.heap_write().write_field(handle, offset, &value)?;
    }
    Ok(())
}

pub(super) fn read_int_field(
    vm: &VirtualMachine,
    handle: HeapRef,
    key: &FieldKey,
) -> Result<Option<i32>, VmError> {
    let Some(offset) = field_offset_of(vm, handle, key)? else {
        return Ok(None);
    };
    vm.heap_read()
        .read_field(handle, offset, crate::heap::slot::SlotKind::Int)?
        .as_int()
        .map(Some)
}
