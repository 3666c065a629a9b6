use crate::error::VmError;
use crate::heap::HeapRef;
use crate::interpreter::Interpreter;
use crate::native::NativeRegistry;
use crate::native::preregistered::{read_int_field, read_ref_field, write_field_if_present};
use crate::thread::{ThreadState, VmThread};
use crate::throw_exception;
use crate::vm::{Value, VirtualMachine};
use tracing_log::log::{error, warn};

pub(super) fn register(registry: &NativeRegistry) {
    // java/lang/Object
    registry.register_str("java/lang/Object", "hashCode", "()I", object_hash_code);
    registry.register_str("java/lang/Object", "equals", "(Ljava/lang/Object;)Z", object_equals);
    registry.register_str("java/lang/Object", "getClass", "()Ljava/lang/Class;", object_get_class);
    registry.register_str("java/lang/Object", "toString", "()Ljava/lang/String;", object_to_string);
    registry.register_str("java/lang/Object", "wait", "()V", object_wait);
    registry.register_str("java/lang/Object", "wait", "(J)V", object_wait_millis);
    registry.register_str("java/lang/Object", "notify", "()V", object_notify);
    registry.register_str("java/lang/Object", "notifyAll", "()V", object_notify_all);
    registry.register_str("java/lang/Object", "<init>", "()V", drop_receiver);

    // java/lang/Thread
    registry.register_str("java/lang/Thread", "<init>", "()V", drop_receiver);
    registry.register_str("java/lang/Thread", "<init>", "(Ljava/lang/Runnable;)V", thread_init_runnable);
    registry.register_str("java/lang/Thread", "start", "()V", thread_start);
    registry.register_str("java/lang/Thread", "join", "()V", thread_join);
    registry.register_str("java/lang/Thread", "isAlive", "()Z", thread_is_alive);
    registry.register_str("java/lang/Thread", "setPriority", "(I)V", thread_set_priority);
    registry.register_str("java/lang/Thread", "sleep", "(J)V", thread_sleep);
    registry.register_str("java/lang/Thread", "yield", "()V", nop);
    registry.register_str("java/lang/Thread", "currentThread", "()Ljava/lang/Thread;", thread_current_thread);

    // java/lang/System
    registry.register_str("java/lang/System", "currentTimeMillis", "()J", system_current_time_millis);
    registry.register_str(
        "java/lang/System",
        "arraycopy",
        "(Ljava/lang/Object;ILjava/lang/Object;II)V",
        system_arraycopy,
    );
    registry.register_str("java/lang/System", "exit", "(I)V", system_exit);
    registry.register_str(
        "java/lang/System",
        "identityHashCode",
        "(Ljava/lang/Object;)I",
        system_identity_hash_code,
    );
    registry.register_str("java/lang/System", "gc", "()V", nop);

    // java/lang/Float and java/lang/Double bit casts
    registry.register_str("java/lang/Float", "floatToIntBits", "(F)I", float_to_int_bits);
    registry.register_str("java/lang/Float", "intBitsToFloat", "(I)F", int_bits_to_float);
    registry.register_str("java/lang/Double", "doubleToLongBits", "(D)J", double_to_long_bits);
    registry.register_str("java/lang/Double", "longBitsToDouble", "(J)D", long_bits_to_double);

    // java/lang/Math
    registry.register_str("java/lang/Math", "sqrt", "(D)D", math_sqrt);
    registry.register_str("java/lang/Math", "sin", "(D)D", math_sin);
    registry.register_str("java/lang/Math", "cos", "(D)D", math_cos);
    registry.register_str("java/lang/Math", "tan", "(D)D", math_tan);
    registry.register_str("java/lang/Math", "floor", "(D)D", math_floor);
    registry.register_str("java/lang/Math", "ceil", "(D)D", math_ceil);

    // java/lang/Throwable
    registry.register_str("java/lang/Throwable", "<init>", "()V", drop_receiver);
    registry.register_str("java/lang/Throwable", "<init>", "(Ljava/lang/String;)V", throwable_init_message);
    registry.register_str("java/lang/Throwable", "getMessage", "()Ljava/lang/String;", throwable_get_message);
    registry.register_str("java/lang/Throwable", "toString", "()Ljava/lang/String;", throwable_to_string);
    registry.register_str("java/lang/Throwable", "printStackTrace", "()V", throwable_print_stack_trace);

    // java/lang/String
    registry.register_str("java/lang/String", "<init>", "()V", string_init_void);
    registry.register_str("java/lang/String", "<init>", "([C)V", string_init_chars);
    registry.register_str("java/lang/String", "<init>", "([B)V", string_init_bytes);
    registry.register_str("java/lang/String", "length", "()I", string_length);
    registry.register_str("java/lang/String", "charAt", "(I)C", string_char_at);
    registry.register_str("java/lang/String", "getBytes", "()[B", string_get_bytes);
    registry.register_str("java/lang/String", "toString", "()Ljava/lang/String;", identity_receiver);
    registry.register_str("java/lang/String", "equals", "(Ljava/lang/Object;)Z", string_equals);
    registry.register_str("java/lang/String", "hashCode", "()I", string_hash_code);

    // java/lang/StringBuffer and java/lang/StringBuilder share bodies
    for class in ["java/lang/StringBuffer", "java/lang/StringBuilder"] {
        let self_desc = if class.ends_with("Buffer") {
            "Ljava/lang/StringBuffer;"
        } else {
            "Ljava/lang/StringBuilder;"
        };
        registry.register_str(class, "<init>", "()V", buffer_init);
        registry.register_str(class, "<init>", "(I)V", buffer_init_capacity);
        registry.register_str(class, "<init>", "(Ljava/lang/String;)V", buffer_init_string);
        registry.register_str(class, "append", &format!("(Ljava/lang/String;){self_desc}"), buffer_append_string);
        registry.register_str(class, "append", &format!("(Ljava/lang/Object;){self_desc}"), buffer_append_object);
        registry.register_str(class, "append", &format!("(I){self_desc}"), buffer_append_int);
        registry.register_str(class, "append", &format!("(J){self_desc}"), buffer_append_long);
        registry.register_str(class, "append", &format!("(C){self_desc}"), buffer_append_char);
        registry.register_str(class, "append", &format!("(Z){self_desc}"), buffer_append_bool);
        registry.register_str(class, "toString", "()Ljava/lang/String;", buffer_to_string);
        registry.register_str(class, "length", "()I", buffer_length);
    }

    // java/lang/Class
    registry.register_str("java/lang/Class", "getName", "()Ljava/lang/String;", class_get_name);
    registry.register_str(
        "java/lang/Class",
        "getResourceAsStream",
        "(Ljava/lang/String;)Ljava/io/InputStream;",
        class_get_resource_as_stream,
    );

    // javax/microedition stubs
    registry.register_str("javax/microedition/midlet/MIDlet", "<init>", "()V", drop_receiver);
    registry.register_str("javax/microedition/midlet/MIDlet", "notifyDestroyed", "()V", midlet_notify_destroyed);
    registry.register_str("javax/microedition/midlet/MIDlet", "notifyPaused", "()V", drop_receiver);
    for method in ["start", "stop", "close", "prefetch", "realize", "deallocate"] {
        registry.register_str("javax/microedition/media/Player", method, "()V", drop_receiver);
    }
    registry.register_str("javax/microedition/media/Player", "setLoopCount", "(I)V", drop_int_and_receiver);
    registry.register_str("javax/microedition/media/Player", "getState", "()I", player_get_state);
}

fn nop(_vm: &VirtualMachine, _thread: &mut VmThread) -> Result<(), VmError> {
    Ok(())
}

fn drop_receiver(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.pop_operand()?;
    Ok(())
}

fn drop_int_and_receiver(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.pop_int_val()?;
    thread.stack.pop_operand()?;
    Ok(())
}

fn identity_receiver(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    // receiver stays as the result
    Ok(())
}

// Object

fn object_hash_code(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    thread.stack.push_operand(Value::Integer(receiver as i32))
}

fn object_equals(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let other = thread.stack.pop_nullable_ref_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    thread
        .stack
        .push_operand(Value::Integer((other == Some(receiver)) as i32))
}

fn object_get_class(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let class_id = match vm.heap_read().class_of(receiver)? {
        Some(class_id) => class_id,
        None => vm.br.get_object_class_id()?,
    };
    let mirror = vm.class_mirror(class_id)?;
    thread.stack.push_operand(Value::Ref(mirror))
}

fn object_to_string(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let class_name = match vm.heap_read().class_of(receiver)? {
        Some(class_id) => {
            let ma = vm.method_area_read();
            vm.interner().resolve(&ma.get_class(&class_id).name).replace('/', ".")
        }
        None => "array".to_string(),
    };
    let text = format!("{class_name}@{receiver:x}");
    let string = vm.materialize_string(&text)?;
    thread.stack.push_operand(Value::Ref(string))
}

fn object_wait(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    thread.wait_on(receiver, None);
    Ok(())
}

fn object_wait_millis(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let millis = thread.stack.pop_long_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    if millis < 0 {
        throw_exception!(ArithmeticException, "timeout value is negative")?
    }
    let wake_at = (millis > 0).then(|| vm.now() + millis as u64);
    thread.wait_on(receiver, wake_at);
    Ok(())
}

fn object_notify(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    vm.scheduler_write().notify(receiver);
    Ok(())
}

fn object_notify_all(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    vm.scheduler_write().notify_all(receiver);
    Ok(())
}

// Thread

fn thread_init_runnable(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let target = thread.stack.pop_operand()?;
    let receiver = thread.stack.pop_obj_val()?;
    write_field_if_present(vm, receiver, &vm.br.thread_target_fk, target)
}

/// Resolve the thread body: an overridden `run()V` on the receiver, or the
/// `target` Runnable's `run()V`.
fn resolve_run_target(
    vm: &VirtualMachine,
    receiver: HeapRef,
) -> Result<Option<(crate::heap::method_area::CallTarget, HeapRef)>, VmError> {
    let run_mk = vm.br.run_mk;
    if let Some(class_id) = vm.heap_read().class_of(receiver)?
        && let Some(target) = vm.method_area_read().find_in_chain(class_id, &run_mk)
        && !vm.method_area_read().get_method(&target.method_id).is_native()
    {
        return Ok(Some((target, receiver)));
    }
    if let Some(runnable) = read_ref_field(vm, receiver, &vm.br.thread_target_fk)?
        && let Some(class_id) = vm.heap_read().class_of(runnable)?
        && let Some(target) = vm.method_area_read().find_in_chain(class_id, &run_mk)
        && !vm.method_area_read().get_method(&target.method_id).is_native()
    {
        return Ok(Some((target, runnable)));
    }
    Ok(None)
}

fn thread_start(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let Some((target, this)) = resolve_run_target(vm, receiver)? else {
        warn!("Thread.start with no run() body; thread terminates immediately");
        return Ok(());
    };
    let frame = Interpreter::build_frame(vm, target.method_id, &[Value::Ref(this)])?;
    let mut spawned = VmThread::new(crate::keys::ThreadId::from_usize(0));
    spawned.java_object = Some(receiver);
    spawned.stack.push_frame(frame)?;
    vm.spawn_thread(spawned);
    Ok(())
}

fn thread_join(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    // joining the current thread would never wake up
    if thread.java_object == Some(receiver) {
        return Ok(());
    }
    if vm.scheduler_read().is_alive(receiver) {
        thread.wait_on(receiver, None);
    }
    Ok(())
}

fn thread_is_alive(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let alive = vm.scheduler_read().is_alive(receiver);
    thread.stack.push_operand(Value::Integer(alive as i32))
}

fn thread_set_priority(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.pop_int_val()?;
    thread.stack.pop_operand()?;
    Ok(())
}

fn thread_sleep(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let millis = thread.stack.pop_long_val()?;
    if millis < 0 {
        throw_exception!(ArithmeticException, "timeout value is negative")?
    }
    thread.sleep_until(vm.now() + millis as u64);
    Ok(())
}

fn thread_current_thread(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let handle = match thread.java_object {
        Some(handle) => handle,
        None => {
            let class_id = vm.resolve_class("java/lang/Thread")?;
            let handle = vm.alloc_instance_of(class_id);
            thread.java_object = Some(handle);
            handle
        }
    };
    thread.stack.push_operand(Value::Ref(handle))
}

// System

fn system_current_time_millis(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.push_operand(Value::Long(vm.now() as i64))
}

fn system_arraycopy(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let length = thread.stack.pop_int_val()?;
    let dest_pos = thread.stack.pop_int_val()?;
    let dest = thread.stack.pop_obj_val()?;
    let src_pos = thread.stack.pop_int_val()?;
    let src = thread.stack.pop_obj_val()?;
    vm.heap_write().copy_slots(src, src_pos, dest, dest_pos, length)
}

fn system_exit(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let status = thread.stack.pop_int_val()?;
    vm.set_exit_status(status);
    vm.request_shutdown();
    while !thread.stack.is_empty() {
        thread.stack.pop_frame()?;
    }
    thread.state = ThreadState::Terminated;
    Ok(())
}

fn system_identity_hash_code(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let value = thread.stack.pop_nullable_ref_val()?;
    thread
        .stack
        .push_operand(Value::Integer(value.map(|h| h as i32).unwrap_or(0)))
}

// Float/Double bit casts

fn float_to_int_bits(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_float_val()?;
    thread.stack.push_operand(Value::Integer(v.to_bits() as i32))
}

fn int_bits_to_float(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_int_val()?;
    thread.stack.push_operand(Value::Float(f32::from_bits(v as u32)))
}

fn double_to_long_bits(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_double_val()?;
    thread.stack.push_operand(Value::Long(v.to_bits() as i64))
}

fn long_bits_to_double(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_long_val()?;
    thread.stack.push_operand(Value::Double(f64::from_bits(v as u64)))
}

// Math

macro_rules! math_unop {
    ($name:ident, $method:ident) => {
        fn $name(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
            let v = thread.stack.pop_double_val()?;
            thread.stack.push_operand(Value::Double(v.$method()))
        }
    };
}

math_unop!(math_sqrt, sqrt);
math_unop!(math_sin, sin);
math_unop!(math_cos, cos);
math_unop!(math_tan, tan);
math_unop!(math_floor, floor);
math_unop!(math_ceil, ceil);

// Throwable

fn throwable_init_message(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let message = thread.stack.pop_operand()?;
    let receiver = thread.stack.pop_obj_val()?;
    write_field_if_present(vm, receiver, &vm.br.detail_message_fk, message)
}

fn throwable_get_message(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let message = read_ref_field(vm, receiver, &vm.br.detail_message_fk)?;
    thread
        .stack
        .push_operand(message.map(Value::Ref).unwrap_or(Value::Null))
}

fn throwable_to_string(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let string = vm.materialize_string(&vm.describe_throwable(receiver))?;
    thread.stack.push_operand(Value::Ref(string))
}

fn throwable_print_stack_trace(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    error!("{}", vm.describe_throwable(receiver));
    Ok(())
}

// String; layout is value/offset/count as seeded by the registry.

fn write_string_fields(
    vm: &VirtualMachine,
    receiver: HeapRef,
    units: &[u16],
) -> Result<(), VmError> {
    let array = vm.heap_write().alloc_char_array(units);
    write_field_if_present(vm, receiver, &vm.br.string_value_fk, Value::Ref(array))?;
    write_field_if_present(vm, receiver, &vm.br.string_offset_fk, Value::Integer(0))?;
    write_field_if_present(
        vm,
        receiver,
        &vm.br.string_count_fk,
        Value::Integer(units.len() as i32),
    )
}

fn string_init_void(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    write_string_fields(vm, receiver, &[])
}

fn string_init_chars(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let chars = thread.stack.pop_obj_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    let units = vm.heap_read().char_array_units(chars)?;
    write_string_fields(vm, receiver, &units)
}

fn string_init_bytes(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let bytes_ref = thread.stack.pop_obj_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    let bytes = vm.heap_read().byte_array_bytes(bytes_ref)?;
    let units: Vec<u16> = String::from_utf8_lossy(&bytes).encode_utf16().collect();
    write_string_fields(vm, receiver, &units)
}

fn string_length(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let length = match read_int_field(vm, receiver, &vm.br.string_count_fk)? {
        Some(count) => count,
        None => vm.read_java_string(receiver)?.encode_utf16().count() as i32,
    };
    thread.stack.push_operand(Value::Integer(length))
}

fn string_char_at(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let index = thread.stack.pop_int_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    let units: Vec<u16> = vm.read_java_string(receiver)?.encode_utf16().collect();
    if index < 0 || index as usize >= units.len() {
        throw_exception!(
            ArrayIndexOutOfBoundsException,
            "String index out of range: {}",
            index
        )?
    }
    thread
        .stack
        .push_operand(Value::Integer(units[index as usize] as i32))
}

fn string_get_bytes(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let text = vm.read_java_string(receiver)?;
    let array = vm.heap_write().alloc_byte_array(text.as_bytes());
    thread.stack.push_operand(Value::Ref(array))
}

fn string_equals(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let other = thread.stack.pop_nullable_ref_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    let equal = match other {
        Some(other) => match (vm.read_java_string(receiver), vm.read_java_string(other)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        },
        None => false,
    };
    thread.stack.push_operand(Value::Integer(equal as i32))
}

fn string_hash_code(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let text = vm.read_java_string(receiver)?;
    let mut hash = 0i32;
    for unit in text.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    thread.stack.push_operand(Value::Integer(hash))
}

// StringBuffer / StringBuilder

fn buffer_text(vm: &VirtualMachine, handle: HeapRef) -> Result<String, VmError> {
    let Some(array) = read_ref_field(vm, handle, &vm.br.buffer_value_fk)? else {
        return Ok(String::new());
    };
    let units = vm.heap_read().char_array_units(array)?;
    let count = read_int_field(vm, handle, &vm.br.buffer_count_fk)?
        .map(|c| c as usize)
        .unwrap_or(units.len())
        .min(units.len());
    Ok(String::from_utf16_lossy(&units[..count]))
}

fn buffer_set_text(vm: &VirtualMachine, handle: HeapRef, text: &str) -> Result<(), VmError> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let array = vm.heap_write().alloc_char_array(&units);
    write_field_if_present(vm, handle, &vm.br.buffer_value_fk, Value::Ref(array))?;
    write_field_if_present(
        vm,
        handle,
        &vm.br.buffer_count_fk,
        Value::Integer(units.len() as i32),
    )
}

fn buffer_init(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    buffer_set_text(vm, receiver, "")
}

fn buffer_init_capacity(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.pop_int_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    buffer_set_text(vm, receiver, "")
}

fn buffer_init_string(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let string = thread.stack.pop_obj_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    let text = vm.read_java_string(string)?;
    buffer_set_text(vm, receiver, &text)
}

fn buffer_append_text(
    vm: &VirtualMachine,
    thread: &mut VmThread,
    receiver: HeapRef,
    appended: &str,
) -> Result<(), VmError> {
    let mut text = buffer_text(vm, receiver)?;
    text.push_str(appended);
    buffer_set_text(vm, receiver, &text)?;
    thread.stack.push_operand(Value::Ref(receiver))
}

fn buffer_append_string(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let arg = thread.stack.pop_nullable_ref_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    let text = match arg {
        Some(string) => vm.read_java_string(string)?,
        None => "null".to_string(),
    };
    buffer_append_text(vm, thread, receiver, &text)
}

/// Strings append as themselves; anything else appends as its class name.
/// Calling back into bytecode `toString` would re-enter the interpreter
/// mid-native, which the concurrency model forbids.
fn buffer_append_object(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let arg = thread.stack.pop_nullable_ref_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    let text = match arg {
        None => "null".to_string(),
        Some(handle) => match vm.read_java_string(handle) {
            Ok(text) => text,
            Err(_) => match vm.heap_read().class_of(handle)? {
                Some(class_id) => {
                    let ma = vm.method_area_read();
                    vm.interner().resolve(&ma.get_class(&class_id).name).replace('/', ".")
                }
                None => "array".to_string(),
            },
        },
    };
    buffer_append_text(vm, thread, receiver, &text)
}

fn buffer_append_int(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_int_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    buffer_append_text(vm, thread, receiver, &v.to_string())
}

fn buffer_append_long(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_long_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    buffer_append_text(vm, thread, receiver, &v.to_string())
}

fn buffer_append_char(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_int_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    let text: String = String::from_utf16_lossy(&[v as u16]);
    buffer_append_text(vm, thread, receiver, &text)
}

fn buffer_append_bool(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_int_val()?;
    let receiver = thread.stack.pop_obj_val()?;
    buffer_append_text(vm, thread, receiver, if v != 0 { "true" } else { "false" })
}

fn buffer_to_string(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let text = buffer_text(vm, receiver)?;
    let string = vm.materialize_string(&text)?;
    thread.stack.push_operand(Value::Ref(string))
}

fn buffer_length(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let count = read_int_field(vm, receiver, &vm.br.buffer_count_fk)?.unwrap_or(0);
    thread.stack.push_operand(Value::Integer(count))
}

// Class

fn class_get_name(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let name = read_ref_field(vm, receiver, &vm.br.class_name_fk)?;
    thread
        .stack
        .push_operand(name.map(Value::Ref).unwrap_or(Value::Null))
}

fn class_get_resource_as_stream(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    let name = thread.stack.pop_nullable_ref_val()?;
    thread.stack.pop_obj_val()?; // receiver mirror
    let Some(name) = name else {
        return thread.stack.push_operand(Value::Null);
    };
    let path = vm.read_java_string(name)?;
    let Some(bytes) = vm.read_resource(&path) else {
        return thread.stack.push_operand(Value::Null);
    };
    let stream_id = vm.heap_write().alloc_stream(bytes);
    let class_id = vm.resolve_class("java/io/InputStream")?;
    let instance = vm.alloc_instance_of(class_id);
    write_field_if_present(vm, instance, &vm.br.stream_handle_fk, Value::Integer(stream_id))?;
    thread.stack.push_operand(Value::Ref(instance))
}

// MIDlet / media stubs

fn midlet_notify_destroyed(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.pop_operand()?;
    vm.request_shutdown();
    Ok(())
}

fn player_get_state(_vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.pop_operand()?;
    thread.stack.push_operand(Value::Integer(0))
}
