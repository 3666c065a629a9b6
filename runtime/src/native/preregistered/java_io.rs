use crate::error::VmError;
use crate::heap::HeapRef;
use crate::heap::slot;
use crate::native::NativeRegistry;
use crate::native::preregistered::read_int_field;
use crate::thread::VmThread;
use crate::vm::{Value, VirtualMachine};

pub(super) fn register(registry: &NativeRegistry) {
    registry.register_str("java/io/InputStream", "read", "()I", stream_read);
    registry.register_str("java/io/InputStream", "read", "([B)I", stream_read_array);
    registry.register_str("java/io/InputStream", "read", "([BII)I", stream_read_range);
    registry.register_str("java/io/InputStream", "available", "()I", stream_available);
    registry.register_str("java/io/InputStream", "skip", "(J)J", stream_skip);
    registry.register_str("java/io/InputStream", "close", "()V", stream_close);
    registry.register_str("java/io/InputStream", "mark", "(I)V", stream_mark);
    registry.register_str("java/io/InputStream", "reset", "()V", stream_reset);
    registry.register_str("java/io/InputStream", "markSupported", "()Z", stream_mark_supported);
}

fn stream_id_of(vm: &VirtualMachine, receiver: HeapRef) -> Result<Option<i32>, VmError> {
    read_int_field(vm, receiver, &vm.br.stream_handle_fk)
}

fn stream_read(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let byte = match stream_id_of(vm, receiver)? {
        Some(id) => {
            let mut heap = vm.heap_write();
            heap.get_stream(id).and_then(|s| s.read_u8())
        }
        None => None,
    };
    let value = byte.map(|b| b as i32).unwrap_or(-1);
    thread.stack.push_operand(Value::Integer(value))
}

/// Shared tail of `read([B)` and `read([BII)`: fill `buf[offset..offset+len]`
/// from the stream, returning -1 at end of stream.
fn read_into_array(
    vm: &VirtualMachine,
    receiver: HeapRef,
    array: HeapRef,
    offset: i32,
    len: i32,
) -> Result<i32, VmError> {
    let array_len = vm.heap_read().array_length(array)?;
    if offset < 0 || len < 0 || offset.checked_add(len).is_none_or(|end| end > array_len) {
        crate::throw_exception!(ArrayIndexOutOfBoundsException, "read range out of bounds")?
    }
    let Some(id) = stream_id_of(vm, receiver)? else {
        return Ok(-1);
    };
    let mut buf = vec![0u8; len as usize];
    let count = {
        let mut heap = vm.heap_write();
        match heap.get_stream(id) {
            Some(stream) => stream.read_into(&mut buf),
            None => return Ok(-1),
        }
    };
    if count == 0 && len > 0 {
        return Ok(-1);
    }
    let mut heap = vm.heap_write();
    for (i, byte) in buf[..count].iter().enumerate() {
        heap.set_array_slot(
            array,
            offset + i as i32,
            slot::encode(&Value::Integer(*byte as i8 as i32)),
        )?;
    }
    Ok(count as i32)
}

fn stream_read_array(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let array = thread.stack.pop_obj_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    let length = vm.heap_read().array_length(array)?;
    let count = read_into_array(vm, receiver, array, 0, length)?;
    thread.stack.push_operand(Value::Integer(count))
}

fn stream_read_range(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let len = thread.stack.pop_int_val()?;
    let offset = thread.stack.pop_int_val()?;
    let array = thread.stack.pop_obj_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    let count = read_into_array(vm, receiver, array, offset, len)?;
    thread.stack.push_operand(Value::Integer(count))
}

fn stream_available(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let available = match stream_id_of(vm, receiver)? {
        Some(id) => {
            let mut heap = vm.heap_write();
            heap.get_stream(id).map(|s| s.available() as i32).unwrap_or(0)
        }
        None => 0,
    };
    thread.stack.push_operand(Value::Integer(available))
}

fn stream_skip(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let n = thread.stack.pop_long_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    let skipped = match stream_id_of(vm, receiver)? {
        Some(id) => {
            let mut heap = vm.heap_write();
            heap.get_stream(id)
                .map(|s| s.skip(n.max(0) as u64) as i64)
                .unwrap_or(0)
        }
        None => 0,
    };
    thread.stack.push_operand(Value::Long(skipped))
}

fn stream_close(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    if let Some(id) = stream_id_of(vm, receiver)? {
        vm.heap_write().remove_stream(id);
    }
    Ok(())
}

fn stream_mark(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.pop_int_val()?; // read limit is irrelevant for byte streams
    let receiver = thread.stack.pop_obj_val()?;
    if let Some(id) = stream_id_of(vm, receiver)? {
        let mut heap = vm.heap_write();
        if let Some(stream) = heap.get_stream(id) {
            stream.mark();
        }
    }
    Ok(())
}

fn stream_reset(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    if let Some(id) = stream_id_of(vm, receiver)? {
        let mut heap = vm.heap_write();
        if let Some(stream) = heap.get_stream(id) {
            stream.reset();
        }
    }
    Ok(())
}

fn stream_mark_supported(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.pop_operand()?;
    thread.stack.push_operand(Value::Integer(1))
}
