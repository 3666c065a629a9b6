use crate::error::VmError;
use crate::heap::slot::{self, SlotKind};
use crate::interpreter::Interpreter;
use crate::keys::{FieldKey, MethodKey};
use crate::rt::constant_pool::RuntimeConstant;
use crate::thread::VmThread;
use crate::throw_exception;
use crate::vm::{Value, VirtualMachine};
use cldc_common::descriptor::MethodDescriptor;
use cldc_common::instruction::{LookupSwitchData, TableSwitchData};
use std::cmp::Ordering;

fn branch(pc: usize, offset: i32) -> usize {
    ((pc as isize) + (offset as isize)) as usize
}

#[inline]
pub(super) fn handle_athrow(thread: &mut VmThread) -> Result<(), VmError> {
    match thread.stack.pop_nullable_ref_val()? {
        Some(exception) => Err(VmError::JavaThrow(exception)),
        None => throw_exception!(NullPointerException),
    }
}

// Constants

#[inline]
pub(super) fn handle_bipush(thread: &mut VmThread, value: i8) -> Result<(), VmError> {
    thread.stack.push_operand(Value::Integer(value as i32))
}

#[inline]
pub(super) fn handle_sipush(thread: &mut VmThread, value: i16) -> Result<(), VmError> {
    thread.stack.push_operand(Value::Integer(value as i32))
}

enum LdcOperand {
    Immediate(Value),
    StringLiteral(crate::keys::Symbol),
    ClassRef(crate::keys::Symbol),
}

#[inline]
pub(super) fn handle_ldc_ldcw_ldc2w(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
) -> Result<(), VmError> {
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let operand = {
        let ma = vm.method_area_read();
        let cp = ma.get_cp_by_method_id(&cur_method_id);
        match cp.get_constant(idx, vm.interner())? {
            RuntimeConstant::Integer(v) => LdcOperand::Immediate(Value::Integer(*v)),
            RuntimeConstant::Float(v) => LdcOperand::Immediate(Value::Float(*v)),
            RuntimeConstant::Long(v) => LdcOperand::Immediate(Value::Long(*v)),
            RuntimeConstant::Double(v) => LdcOperand::Immediate(Value::Double(*v)),
            RuntimeConstant::String(_) => {
                LdcOperand::StringLiteral(cp.get_string_sym(idx, vm.interner())?)
            }
            RuntimeConstant::Class(_) => {
                LdcOperand::ClassRef(cp.get_class_sym(idx, vm.interner())?)
            }
            _ => return Err(VmError::ConstantPool { index: idx, expected: "loadable constant" }),
        }
    };
    let value = match operand {
        LdcOperand::Immediate(value) => value,
        LdcOperand::StringLiteral(sym) => Value::Ref(vm.intern_literal(sym)?),
        LdcOperand::ClassRef(sym) => {
            let class_id = vm.method_area_write().get_class_id_or_load(sym)?;
            Value::Ref(vm.class_mirror(class_id)?)
        }
    };
    thread.stack.push_operand(value)
}

// Loads and stores

#[inline]
pub(super) fn handle_load(thread: &mut VmThread, pos: u16) -> Result<(), VmError> {
    let value = *thread.stack.get_local(pos)?;
    thread.stack.push_operand(value)
}

#[inline]
pub(super) fn handle_istore(thread: &mut VmThread, pos: u16) -> Result<(), VmError> {
    let value = thread.stack.pop_int_val()?;
    thread.stack.set_local(pos as usize, Value::Integer(value))
}

#[inline]
pub(super) fn handle_lstore(thread: &mut VmThread, pos: u16) -> Result<(), VmError> {
    let value = thread.stack.pop_long_val()?;
    thread.stack.set_local(pos as usize, Value::Long(value))
}

#[inline]
pub(super) fn handle_fstore(thread: &mut VmThread, pos: u16) -> Result<(), VmError> {
    let value = thread.stack.pop_float_val()?;
    thread.stack.set_local(pos as usize, Value::Float(value))
}

#[inline]
pub(super) fn handle_dstore(thread: &mut VmThread, pos: u16) -> Result<(), VmError> {
    let value = thread.stack.pop_double_val()?;
    thread.stack.set_local(pos as usize, Value::Double(value))
}

#[inline]
pub(super) fn handle_astore(thread: &mut VmThread, pos: u16) -> Result<(), VmError> {
    // astore also stores jsr return addresses
    let value = thread.stack.pop_operand()?;
    match value {
        Value::Ref(_) | Value::Null | Value::ReturnAddress(_) => {
            thread.stack.set_local(pos as usize, value)
        }
        _ => Err(VmError::UnexpectedType("reference")),
    }
}

#[inline]
pub(super) fn handle_iinc(thread: &mut VmThread, idx: u16, delta: i32) -> Result<(), VmError> {
    let value = thread.stack.get_local(idx)?.as_int()?;
    thread
        .stack
        .set_local(idx as usize, Value::Integer(value.wrapping_add(delta)))
}

// Array loads: every slot is 64 bits wide; the opcode re-extends per the
// element type on read.

fn pop_array_access(thread: &mut VmThread) -> Result<(crate::heap::HeapRef, i32), VmError> {
    let index = thread.stack.pop_int_val()?;
    let array = thread.stack.pop_obj_val()?;
    Ok((array, index))
}

#[inline]
pub(super) fn handle_iaload(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let (array, index) = pop_array_access(thread)?;
    let raw = vm.heap_read().array_slot(array, index)?;
    thread.stack.push_operand(Value::Integer(raw as u32 as i32))
}

#[inline]
pub(super) fn handle_laload(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let (array, index) = pop_array_access(thread)?;
    let raw = vm.heap_read().array_slot(array, index)?;
    thread.stack.push_operand(Value::Long(raw as i64))
}

#[inline]
pub(super) fn handle_faload(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let (array, index) = pop_array_access(thread)?;
    let raw = vm.heap_read().array_slot(array, index)?;
    thread.stack.push_operand(Value::Float(f32::from_bits(raw as u32)))
}

#[inline]
pub(super) fn handle_daload(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let (array, index) = pop_array_access(thread)?;
    let raw = vm.heap_read().array_slot(array, index)?;
    thread.stack.push_operand(Value::Double(f64::from_bits(raw)))
}

#[inline]
pub(super) fn handle_aaload(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let (array, index) = pop_array_access(thread)?;
    let raw = vm.heap_read().array_slot(array, index)?;
    thread.stack.push_operand(slot::decode(raw, SlotKind::Reference))
}

#[inline]
pub(super) fn handle_baload(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let (array, index) = pop_array_access(thread)?;
    let raw = vm.heap_read().array_slot(array, index)?;
    thread.stack.push_operand(Value::Integer((raw as u8 as i8) as i32))
}

#[inline]
pub(super) fn handle_caload(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let (array, index) = pop_array_access(thread)?;
    let raw = vm.heap_read().array_slot(array, index)?;
    thread.stack.push_operand(Value::Integer((raw as u16) as i32))
}

#[inline]
pub(super) fn handle_saload(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let (array, index) = pop_array_access(thread)?;
    let raw = vm.heap_read().array_slot(array, index)?;
    thread.stack.push_operand(Value::Integer((raw as u16 as i16) as i32))
}

#[inline]
pub(super) fn handle_iastore(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let value = thread.stack.pop_int_val()?;
    let (array, index) = pop_array_access(thread)?;
    vm.heap_write().set_array_slot(array, index, slot::encode(&Value::Integer(value)))
}

#[inline]
pub(super) fn handle_lastore(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let value = thread.stack.pop_long_val()?;
    let (array, index) = pop_array_access(thread)?;
    vm.heap_write().set_array_slot(array, index, slot::encode(&Value::Long(value)))
}

#[inline]
pub(super) fn handle_fastore(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let value = thread.stack.pop_float_val()?;
    let (array, index) = pop_array_access(thread)?;
    vm.heap_write().set_array_slot(array, index, slot::encode(&Value::Float(value)))
}

#[inline]
pub(super) fn handle_dastore(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let value = thread.stack.pop_double_val()?;
    let (array, index) = pop_array_access(thread)?;
    vm.heap_write().set_array_slot(array, index, slot::encode(&Value::Double(value)))
}

#[inline]
pub(super) fn handle_aastore(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let value = thread.stack.pop_operand()?;
    value.as_nullable_obj_ref()?;
    let (array, index) = pop_array_access(thread)?;
    vm.heap_write().set_array_slot(array, index, slot::encode(&value))
}

#[inline]
pub(super) fn handle_bastore(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let value = thread.stack.pop_int_val()?;
    let (array, index) = pop_array_access(thread)?;
    vm.heap_write().set_array_slot(array, index, slot::encode(&Value::Integer(value)))
}

#[inline]
pub(super) fn handle_castore(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let value = thread.stack.pop_int_val()?;
    let (array, index) = pop_array_access(thread)?;
    // chars are zero-extended on read, so only the low 16 bits matter
    vm.heap_write().set_array_slot(array, index, (value as u16) as u64)
}

#[inline]
pub(super) fn handle_sastore(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let value = thread.stack.pop_int_val()?;
    let (array, index) = pop_array_access(thread)?;
    vm.heap_write().set_array_slot(array, index, slot::encode(&Value::Integer(value)))
}

// Stack ops; category-2 values occupy two computational slots.

#[inline]
pub(super) fn handle_pop(thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.pop_operand()?;
    Ok(())
}

#[inline]
pub(super) fn handle_pop2(thread: &mut VmThread) -> Result<(), VmError> {
    let top = thread.stack.pop_operand()?;
    if !top.is_wide() {
        thread.stack.pop_operand()?;
    }
    Ok(())
}

#[inline]
pub(super) fn handle_dup(thread: &mut VmThread) -> Result<(), VmError> {
    let value = *thread.stack.peek_operand()?;
    thread.stack.push_operand(value)
}

#[inline]
pub(super) fn handle_dup_x1(thread: &mut VmThread) -> Result<(), VmError> {
    let value1 = thread.stack.pop_operand()?;
    let value2 = thread.stack.pop_operand()?;
    thread.stack.push_operand(value1)?;
    thread.stack.push_operand(value2)?;
    thread.stack.push_operand(value1)
}

#[inline]
pub(super) fn handle_dup_x2(thread: &mut VmThread) -> Result<(), VmError> {
    let value1 = thread.stack.pop_operand()?;
    let value2 = thread.stack.pop_operand()?;
    if value2.is_wide() {
        thread.stack.push_operand(value1)?;
        thread.stack.push_operand(value2)?;
        thread.stack.push_operand(value1)
    } else {
        let value3 = thread.stack.pop_operand()?;
        thread.stack.push_operand(value1)?;
        thread.stack.push_operand(value3)?;
        thread.stack.push_operand(value2)?;
        thread.stack.push_operand(value1)
    }
}

#[inline]
pub(super) fn handle_dup2(thread: &mut VmThread) -> Result<(), VmError> {
    let value1 = *thread.stack.peek_operand()?;
    if value1.is_wide() {
        thread.stack.push_operand(value1)
    } else {
        let value2 = *thread.stack.peek_operand_at(1)?;
        thread.stack.push_operand(value2)?;
        thread.stack.push_operand(value1)
    }
}

#[inline]
pub(super) fn handle_dup2_x1(thread: &mut VmThread) -> Result<(), VmError> {
    let value1 = thread.stack.pop_operand()?;
    if value1.is_wide() {
        let value2 = thread.stack.pop_operand()?;
        thread.stack.push_operand(value1)?;
        thread.stack.push_operand(value2)?;
        thread.stack.push_operand(value1)
    } else {
        let value2 = thread.stack.pop_operand()?;
        let value3 = thread.stack.pop_operand()?;
        thread.stack.push_operand(value2)?;
        thread.stack.push_operand(value1)?;
        thread.stack.push_operand(value3)?;
        thread.stack.push_operand(value2)?;
        thread.stack.push_operand(value1)
    }
}

#[inline]
pub(super) fn handle_dup2_x2(thread: &mut VmThread) -> Result<(), VmError> {
    let value1 = thread.stack.pop_operand()?;
    if value1.is_wide() {
        let value2 = thread.stack.pop_operand()?;
        if value2.is_wide() {
            thread.stack.push_operand(value1)?;
            thread.stack.push_operand(value2)?;
            thread.stack.push_operand(value1)
        } else {
            let value3 = thread.stack.pop_operand()?;
            thread.stack.push_operand(value1)?;
            thread.stack.push_operand(value3)?;
            thread.stack.push_operand(value2)?;
            thread.stack.push_operand(value1)
        }
    } else {
        let value2 = thread.stack.pop_operand()?;
        let value3 = thread.stack.pop_operand()?;
        if value3.is_wide() {
            thread.stack.push_operand(value2)?;
            thread.stack.push_operand(value1)?;
            thread.stack.push_operand(value3)?;
            thread.stack.push_operand(value2)?;
            thread.stack.push_operand(value1)
        } else {
            let value4 = thread.stack.pop_operand()?;
            thread.stack.push_operand(value2)?;
            thread.stack.push_operand(value1)?;
            thread.stack.push_operand(value4)?;
            thread.stack.push_operand(value3)?;
            thread.stack.push_operand(value2)?;
            thread.stack.push_operand(value1)
        }
    }
}

#[inline]
pub(super) fn handle_swap(thread: &mut VmThread) -> Result<(), VmError> {
    let value1 = thread.stack.pop_operand()?;
    let value2 = thread.stack.pop_operand()?;
    thread.stack.push_operand(value1)?;
    thread.stack.push_operand(value2)
}

// Arithmetic

macro_rules! int_binop {
    ($name:ident, $op:expr) => {
        #[inline]
        pub(super) fn $name(thread: &mut VmThread) -> Result<(), VmError> {
            let v2 = thread.stack.pop_int_val()?;
            let v1 = thread.stack.pop_int_val()?;
            let f: fn(i32, i32) -> i32 = $op;
            thread.stack.push_operand(Value::Integer(f(v1, v2)))
        }
    };
}

macro_rules! long_binop {
    ($name:ident, $op:expr) => {
        #[inline]
        pub(super) fn $name(thread: &mut VmThread) -> Result<(), VmError> {
            let v2 = thread.stack.pop_long_val()?;
            let v1 = thread.stack.pop_long_val()?;
            let f: fn(i64, i64) -> i64 = $op;
            thread.stack.push_operand(Value::Long(f(v1, v2)))
        }
    };
}

macro_rules! float_binop {
    ($name:ident, $op:expr) => {
        #[inline]
        pub(super) fn $name(thread: &mut VmThread) -> Result<(), VmError> {
            let v2 = thread.stack.pop_float_val()?;
            let v1 = thread.stack.pop_float_val()?;
            let f: fn(f32, f32) -> f32 = $op;
            thread.stack.push_operand(Value::Float(f(v1, v2)))
        }
    };
}

macro_rules! double_binop {
    ($name:ident, $op:expr) => {
        #[inline]
        pub(super) fn $name(thread: &mut VmThread) -> Result<(), VmError> {
            let v2 = thread.stack.pop_double_val()?;
            let v1 = thread.stack.pop_double_val()?;
            let f: fn(f64, f64) -> f64 = $op;
            thread.stack.push_operand(Value::Double(f(v1, v2)))
        }
    };
}

int_binop!(handle_iadd, |a, b| a.wrapping_add(b));
int_binop!(handle_isub, |a, b| a.wrapping_sub(b));
int_binop!(handle_imul, |a, b| a.wrapping_mul(b));
int_binop!(handle_iand, |a, b| a & b);
int_binop!(handle_ior, |a, b| a | b);
int_binop!(handle_ixor, |a, b| a ^ b);
long_binop!(handle_ladd, |a, b| a.wrapping_add(b));
long_binop!(handle_lsub, |a, b| a.wrapping_sub(b));
long_binop!(handle_lmul, |a, b| a.wrapping_mul(b));
long_binop!(handle_land, |a, b| a & b);
long_binop!(handle_lor, |a, b| a | b);
long_binop!(handle_lxor, |a, b| a ^ b);
float_binop!(handle_fadd, |a, b| a + b);
float_binop!(handle_fsub, |a, b| a - b);
float_binop!(handle_fmul, |a, b| a * b);
float_binop!(handle_fdiv, |a, b| a / b);
float_binop!(handle_frem, |a, b| a % b);
double_binop!(handle_dadd, |a, b| a + b);
double_binop!(handle_dsub, |a, b| a - b);
double_binop!(handle_dmul, |a, b| a * b);
double_binop!(handle_ddiv, |a, b| a / b);
double_binop!(handle_drem, |a, b| a % b);

#[inline]
pub(super) fn handle_idiv(thread: &mut VmThread) -> Result<(), VmError> {
    let v2 = thread.stack.pop_int_val()?;
    let v1 = thread.stack.pop_int_val()?;
    if v2 == 0 {
        throw_exception!(ArithmeticException, "/ by zero")?
    }
    thread.stack.push_operand(Value::Integer(v1.wrapping_div(v2)))
}

#[inline]
pub(super) fn handle_irem(thread: &mut VmThread) -> Result<(), VmError> {
    let v2 = thread.stack.pop_int_val()?;
    let v1 = thread.stack.pop_int_val()?;
    if v2 == 0 {
        throw_exception!(ArithmeticException, "/ by zero")?
    }
    thread.stack.push_operand(Value::Integer(v1.wrapping_rem(v2)))
}

#[inline]
pub(super) fn handle_ldiv(thread: &mut VmThread) -> Result<(), VmError> {
    let v2 = thread.stack.pop_long_val()?;
    let v1 = thread.stack.pop_long_val()?;
    if v2 == 0 {
        throw_exception!(ArithmeticException, "/ by zero")?
    }
    thread.stack.push_operand(Value::Long(v1.wrapping_div(v2)))
}

#[inline]
pub(super) fn handle_lrem(thread: &mut VmThread) -> Result<(), VmError> {
    let v2 = thread.stack.pop_long_val()?;
    let v1 = thread.stack.pop_long_val()?;
    if v2 == 0 {
        throw_exception!(ArithmeticException, "/ by zero")?
    }
    thread.stack.push_operand(Value::Long(v1.wrapping_rem(v2)))
}

#[inline]
pub(super) fn handle_ineg(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_int_val()?;
    thread.stack.push_operand(Value::Integer(v.wrapping_neg()))
}

#[inline]
pub(super) fn handle_lneg(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_long_val()?;
    thread.stack.push_operand(Value::Long(v.wrapping_neg()))
}

#[inline]
pub(super) fn handle_fneg(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_float_val()?;
    thread.stack.push_operand(Value::Float(-v))
}

#[inline]
pub(super) fn handle_dneg(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_double_val()?;
    thread.stack.push_operand(Value::Double(-v))
}

// Shift counts mask to 5 bits for ints, 6 for longs.

#[inline]
pub(super) fn handle_ishl(thread: &mut VmThread) -> Result<(), VmError> {
    let v2 = thread.stack.pop_int_val()?;
    let v1 = thread.stack.pop_int_val()?;
    thread.stack.push_operand(Value::Integer(v1.wrapping_shl((v2 & 0x1F) as u32)))
}

#[inline]
pub(super) fn handle_ishr(thread: &mut VmThread) -> Result<(), VmError> {
    let v2 = thread.stack.pop_int_val()?;
    let v1 = thread.stack.pop_int_val()?;
    thread.stack.push_operand(Value::Integer(v1.wrapping_shr((v2 & 0x1F) as u32)))
}

#[inline]
pub(super) fn handle_iushr(thread: &mut VmThread) -> Result<(), VmError> {
    let v2 = thread.stack.pop_int_val()?;
    let v1 = thread.stack.pop_int_val()?;
    let shift = (v2 & 0x1F) as u32;
    thread.stack.push_operand(Value::Integer(((v1 as u32) >> shift) as i32))
}

#[inline]
pub(super) fn handle_lshl(thread: &mut VmThread) -> Result<(), VmError> {
    let v2 = thread.stack.pop_int_val()?;
    let v1 = thread.stack.pop_long_val()?;
    thread.stack.push_operand(Value::Long(v1.wrapping_shl((v2 & 0x3F) as u32)))
}

#[inline]
pub(super) fn handle_lshr(thread: &mut VmThread) -> Result<(), VmError> {
    let v2 = thread.stack.pop_int_val()?;
    let v1 = thread.stack.pop_long_val()?;
    thread.stack.push_operand(Value::Long(v1.wrapping_shr((v2 & 0x3F) as u32)))
}

#[inline]
pub(super) fn handle_lushr(thread: &mut VmThread) -> Result<(), VmError> {
    let v2 = thread.stack.pop_int_val()?;
    let v1 = thread.stack.pop_long_val()?;
    let shift = (v2 & 0x3F) as u32;
    thread.stack.push_operand(Value::Long(((v1 as u64) >> shift) as i64))
}

// Conversions: widening preserves values, narrowing truncates, float to
// integer rounds toward zero (Rust `as` matches the JVM here, including
// NaN to 0 and saturation at the extremes).

#[inline]
pub(super) fn handle_i2l(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_int_val()?;
    thread.stack.push_operand(Value::Long(v as i64))
}

#[inline]
pub(super) fn handle_i2f(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_int_val()?;
    thread.stack.push_operand(Value::Float(v as f32))
}

#[inline]
pub(super) fn handle_i2d(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_int_val()?;
    thread.stack.push_operand(Value::Double(v as f64))
}

#[inline]
pub(super) fn handle_l2i(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_long_val()?;
    thread.stack.push_operand(Value::Integer(v as i32))
}

#[inline]
pub(super) fn handle_l2f(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_long_val()?;
    thread.stack.push_operand(Value::Float(v as f32))
}

#[inline]
pub(super) fn handle_l2d(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_long_val()?;
    thread.stack.push_operand(Value::Double(v as f64))
}

#[inline]
pub(super) fn handle_f2i(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_float_val()?;
    thread.stack.push_operand(Value::Integer(v as i32))
}

#[inline]
pub(super) fn handle_f2l(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_float_val()?;
    thread.stack.push_operand(Value::Long(v as i64))
}

#[inline]
pub(super) fn handle_f2d(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_float_val()?;
    thread.stack.push_operand(Value::Double(v as f64))
}

#[inline]
pub(super) fn handle_d2i(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_double_val()?;
    thread.stack.push_operand(Value::Integer(v as i32))
}

#[inline]
pub(super) fn handle_d2l(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_double_val()?;
    thread.stack.push_operand(Value::Long(v as i64))
}

#[inline]
pub(super) fn handle_d2f(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_double_val()?;
    thread.stack.push_operand(Value::Float(v as f32))
}

#[inline]
pub(super) fn handle_i2b(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_int_val()?;
    thread.stack.push_operand(Value::Integer((v as i8) as i32))
}

#[inline]
pub(super) fn handle_i2c(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_int_val()?;
    thread.stack.push_operand(Value::Integer((v as u16) as i32))
}

#[inline]
pub(super) fn handle_i2s(thread: &mut VmThread) -> Result<(), VmError> {
    let v = thread.stack.pop_int_val()?;
    thread.stack.push_operand(Value::Integer((v as i16) as i32))
}

// Comparisons; fcmpl/fcmpg and dcmpl/dcmpg differ only on NaN.

#[inline]
pub(super) fn handle_lcmp(thread: &mut VmThread) -> Result<(), VmError> {
    let v2 = thread.stack.pop_long_val()?;
    let v1 = thread.stack.pop_long_val()?;
    let res = match v1.cmp(&v2) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    thread.stack.push_operand(Value::Integer(res))
}

#[inline]
pub(super) fn handle_fcmp(thread: &mut VmThread, nan_result: i32) -> Result<(), VmError> {
    let v2 = thread.stack.pop_float_val()?;
    let v1 = thread.stack.pop_float_val()?;
    let res = match v1.partial_cmp(&v2) {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Greater) => 1,
        None => nan_result,
    };
    thread.stack.push_operand(Value::Integer(res))
}

#[inline]
pub(super) fn handle_dcmp(thread: &mut VmThread, nan_result: i32) -> Result<(), VmError> {
    let v2 = thread.stack.pop_double_val()?;
    let v1 = thread.stack.pop_double_val()?;
    let res = match v1.partial_cmp(&v2) {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Greater) => 1,
        None => nan_result,
    };
    thread.stack.push_operand(Value::Integer(res))
}

// Branches; offsets are relative to the branch opcode's pc.

#[inline]
pub(super) fn handle_if(
    thread: &mut VmThread,
    offset: i16,
    size: usize,
    pred: impl Fn(i32) -> bool,
) -> Result<(), VmError> {
    let pc = thread.stack.pc()?;
    let value = thread.stack.pop_int_val()?;
    let new_pc = if pred(value) { branch(pc, offset as i32) } else { pc + size };
    thread.stack.set_pc(new_pc)
}

#[inline]
pub(super) fn handle_if_icmp(
    thread: &mut VmThread,
    offset: i16,
    size: usize,
    pred: impl Fn(i32, i32) -> bool,
) -> Result<(), VmError> {
    let pc = thread.stack.pc()?;
    let v2 = thread.stack.pop_int_val()?;
    let v1 = thread.stack.pop_int_val()?;
    let new_pc = if pred(v1, v2) { branch(pc, offset as i32) } else { pc + size };
    thread.stack.set_pc(new_pc)
}

#[inline]
pub(super) fn handle_if_acmp(
    thread: &mut VmThread,
    offset: i16,
    size: usize,
    want_equal: bool,
) -> Result<(), VmError> {
    let pc = thread.stack.pc()?;
    let v2 = thread.stack.pop_nullable_ref_val()?;
    let v1 = thread.stack.pop_nullable_ref_val()?;
    let taken = (v1 == v2) == want_equal;
    let new_pc = if taken { branch(pc, offset as i32) } else { pc + size };
    thread.stack.set_pc(new_pc)
}

#[inline]
pub(super) fn handle_ifnull(
    thread: &mut VmThread,
    offset: i16,
    size: usize,
    branch_on_null: bool,
) -> Result<(), VmError> {
    let pc = thread.stack.pc()?;
    let value = thread.stack.pop_nullable_ref_val()?;
    let taken = value.is_none() == branch_on_null;
    let new_pc = if taken { branch(pc, offset as i32) } else { pc + size };
    thread.stack.set_pc(new_pc)
}

#[inline]
pub(super) fn handle_goto(thread: &mut VmThread, offset: i32) -> Result<(), VmError> {
    let pc = thread.stack.pc()?;
    thread.stack.set_pc(branch(pc, offset))
}

#[inline]
pub(super) fn handle_jsr(thread: &mut VmThread, offset: i32, size: usize) -> Result<(), VmError> {
    let pc = thread.stack.pc()?;
    thread.stack.push_operand(Value::ReturnAddress(pc + size))?;
    thread.stack.set_pc(branch(pc, offset))
}

#[inline]
pub(super) fn handle_ret(thread: &mut VmThread, idx: u16) -> Result<(), VmError> {
    let target = match thread.stack.get_local(idx)? {
        Value::ReturnAddress(pc) => *pc,
        _ => return Err(VmError::UnexpectedType("returnAddress")),
    };
    thread.stack.set_pc(target)
}

#[inline]
pub(super) fn handle_tableswitch(thread: &mut VmThread, data: TableSwitchData) -> Result<(), VmError> {
    let index = thread.stack.pop_int_val()?;
    let pc = thread.stack.pc()?;
    let offset = if index < data.low || index > data.high {
        data.default_offset
    } else {
        data.offsets[(index - data.low) as usize]
    };
    thread.stack.set_pc(branch(pc, offset))
}

#[inline]
pub(super) fn handle_lookupswitch(
    thread: &mut VmThread,
    data: LookupSwitchData,
) -> Result<(), VmError> {
    let key = thread.stack.pop_int_val()?;
    let pc = thread.stack.pc()?;
    let offset = match data.pairs.binary_search_by_key(&key, |p| p.0) {
        Ok(i) => data.pairs[i].1,
        Err(_) => data.default_offset,
    };
    thread.stack.set_pc(branch(pc, offset))
}

// Object creation and field access

#[inline]
pub(super) fn handle_new(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
    size: usize,
) -> Result<(), VmError> {
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let class_sym = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id).get_class_sym(idx, vm.interner())?
    };
    let class_id = vm.method_area_write().get_class_id_or_load(class_sym)?;
    if Interpreter::ensure_initialized(vm, thread, class_id)? {
        // detour pushed; rerun this instruction after <clinit> returns
        return Ok(());
    }
    let instance = vm.alloc_instance_of(class_id);
    thread.stack.push_operand(Value::Ref(instance))?;
    thread.stack.cur_frame_mut()?.pc += size;
    Ok(())
}

#[inline]
pub(super) fn handle_getfield(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
) -> Result<(), VmError> {
    let receiver = thread.stack.pop_obj_val()?;
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let view = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id).get_field_view(idx, vm.interner())?
    };
    let class_id = vm.method_area_write().get_class_id_or_load(view.class_sym)?;
    let key: FieldKey = view.name_and_type.into();
    let offset = vm
        .method_area_read()
        .resolve_field_offset(class_id, &key)
        .ok_or_else(|| {
            crate::build_exception!(NoSuchFieldError, "{}", vm.interner().resolve(&key.name))
        })?;
    let kind = SlotKind::of_descriptor(vm.interner().resolve(&key.desc));
    let value = vm.heap_read().read_field(receiver, offset, kind)?;
    thread.stack.push_operand(value)
}

#[inline]
pub(super) fn handle_putfield(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
) -> Result<(), VmError> {
    let value = thread.stack.pop_operand()?;
    let receiver = thread.stack.pop_obj_val()?;
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let view = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id).get_field_view(idx, vm.interner())?
    };
    let class_id = vm.method_area_write().get_class_id_or_load(view.class_sym)?;
    let key: FieldKey = view.name_and_type.into();
    let offset = vm
        .method_area_read()
        .resolve_field_offset(class_id, &key)
        .ok_or_else(|| {
            crate::build_exception!(NoSuchFieldError, "{}", vm.interner().resolve(&key.name))
        })?;
    vm.heap_write().write_field(receiver, offset, &value)
}

#[inline]
pub(super) fn handle_getstatic(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
    size: usize,
) -> Result<(), VmError> {
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let view = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id).get_field_view(idx, vm.interner())?
    };
    let class_id = vm.method_area_write().get_class_id_or_load(view.class_sym)?;
    if Interpreter::ensure_initialized(vm, thread, class_id)? {
        return Ok(());
    }
    let key: FieldKey = view.name_and_type.into();
    let kind = SlotKind::of_descriptor(vm.interner().resolve(&key.desc));
    let value = {
        let ma = vm.method_area_read();
        match ma.resolve_static_field_class(class_id, &key) {
            Some(declaring) => {
                slot::decode(ma.get_class(&declaring).static_slot(&key).unwrap_or(0), kind)
            }
            // unresolved static: a zero of the descriptor's kind
            None => slot::decode(0, kind),
        }
    };
    thread.stack.push_operand(value)?;
    thread.stack.cur_frame_mut()?.pc += size;
    Ok(())
}

#[inline]
pub(super) fn handle_putstatic(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
    size: usize,
) -> Result<(), VmError> {
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let view = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id).get_field_view(idx, vm.interner())?
    };
    let class_id = vm.method_area_write().get_class_id_or_load(view.class_sym)?;
    if Interpreter::ensure_initialized(vm, thread, class_id)? {
        return Ok(());
    }
    let value = thread.stack.pop_operand()?;
    let key: FieldKey = view.name_and_type.into();
    {
        let ma = vm.method_area_read();
        if let Some(declaring) = ma.resolve_static_field_class(class_id, &key) {
            ma.get_class(&declaring).set_static_slot(&key, slot::encode(&value));
        }
        // an unresolvable static swallows the store, mirroring the read side
    }
    thread.stack.cur_frame_mut()?.pc += size;
    Ok(())
}

// Arrays

#[inline]
pub(super) fn handle_newarray(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let size = thread.stack.pop_int_val()?;
    if size < 0 {
        throw_exception!(NegativeArraySizeException, "{}", size)?
    }
    let array = vm.heap_write().alloc_array(size as usize);
    thread.stack.push_operand(Value::Ref(array))
}

#[inline]
pub(super) fn handle_anewarray(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
) -> Result<(), VmError> {
    let size = thread.stack.pop_int_val()?;
    if size < 0 {
        throw_exception!(NegativeArraySizeException, "{}", size)?
    }
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let element_sym = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id).get_class_sym(idx, vm.interner())?
    };
    // the element class must resolve even though array storage is untyped
    vm.method_area_write().get_class_id_or_load(element_sym)?;
    let array = vm.heap_write().alloc_array(size as usize);
    thread.stack.push_operand(Value::Ref(array))
}

fn alloc_multi(vm: &VirtualMachine, counts: &[i32]) -> Result<crate::heap::HeapRef, VmError> {
    let array = vm.heap_write().alloc_array(counts[0] as usize);
    if counts.len() > 1 && counts[1] >= 0 {
        for i in 0..counts[0] {
            let nested = alloc_multi(vm, &counts[1..])?;
            vm.heap_write()
                .set_array_slot(array, i, slot::encode(&Value::Ref(nested)))?;
        }
    }
    Ok(array)
}

#[inline]
pub(super) fn handle_multianewarray(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
    dims: u8,
) -> Result<(), VmError> {
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let array_sym = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id).get_class_sym(idx, vm.interner())?
    };
    vm.method_area_write().get_class_id_or_load(array_sym)?;

    let mut counts = vec![0i32; dims as usize];
    for count in counts.iter_mut().rev() {
        *count = thread.stack.pop_int_val()?;
    }
    for count in &counts {
        if *count < 0 {
            throw_exception!(NegativeArraySizeException, "{}", count)?
        }
    }
    let array = alloc_multi(vm, &counts)?;
    thread.stack.push_operand(Value::Ref(array))
}

#[inline]
pub(super) fn handle_arraylength(thread: &mut VmThread, vm: &VirtualMachine) -> Result<(), VmError> {
    let array = thread.stack.pop_obj_val()?;
    let length = vm.heap_read().array_length(array)?;
    thread.stack.push_operand(Value::Integer(length))
}

// Type tests. Arrays carry no runtime component type: they satisfy tests
// against the root class and any array-shaped target.

#[inline]
pub(super) fn handle_checkcast(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
) -> Result<(), VmError> {
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let target_sym = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id).get_class_sym(idx, vm.interner())?
    };
    let value = *thread.stack.peek_operand()?;
    let Some(handle) = value.as_nullable_obj_ref()? else {
        return Ok(()); // null always passes
    };
    let assignable = match vm.heap_read().class_of(handle)? {
        Some(class_id) => vm.method_area_read().instance_of(class_id, target_sym),
        None => {
            target_sym == vm.br.object_sym
                || vm.interner().resolve(&target_sym).starts_with('[')
        }
    };
    if !assignable {
        throw_exception!(ClassCastException, "{}", vm.interner().resolve(&target_sym))?
    }
    Ok(())
}

#[inline]
pub(super) fn handle_instanceof(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
) -> Result<(), VmError> {
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let target_sym = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id).get_class_sym(idx, vm.interner())?
    };
    let result = match thread.stack.pop_nullable_ref_val()? {
        None => false,
        Some(handle) => match vm.heap_read().class_of(handle)? {
            Some(class_id) => vm.method_area_read().instance_of(class_id, target_sym),
            None => {
                target_sym == vm.br.object_sym
                    || vm.interner().resolve(&target_sym).starts_with('[')
            }
        },
    };
    thread.stack.push_operand(Value::Integer(result as i32))
}

// Monitors are no-ops under the single-threaded interpretive model; the
// null check still applies.

#[inline]
pub(super) fn handle_monitorenter(thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.pop_obj_val()?;
    Ok(())
}

#[inline]
pub(super) fn handle_monitorexit(thread: &mut VmThread) -> Result<(), VmError> {
    thread.stack.pop_obj_val()?;
    Ok(())
}

// Invocation

#[inline]
pub(super) fn handle_invokestatic(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
    size: usize,
) -> Result<(), VmError> {
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let view = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id)
            .get_method_or_interface_method_view(idx, vm.interner())?
    };
    let class_id = vm.method_area_write().get_class_id_or_load(view.class_sym)?;
    if Interpreter::ensure_initialized(vm, thread, class_id)? {
        return Ok(());
    }
    let target = vm
        .method_area_read()
        .find_declared(class_id, view.name_and_type.into())?;
    Interpreter::invoke(vm, thread, target, size)
}

#[inline]
pub(super) fn handle_invokespecial(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
    size: usize,
) -> Result<(), VmError> {
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let view = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id).get_method_view(idx, vm.interner())?
    };

    // the root class's constructor merely drops its receiver and arguments
    if view.class_sym == vm.br.object_sym && view.name_and_type.name == vm.br.init_sym {
        let desc_str = vm.interner().resolve(&view.name_and_type.desc);
        let arg_values = MethodDescriptor::try_from(desc_str)?.param_count();
        for _ in 0..=arg_values {
            thread.stack.pop_operand()?;
        }
        thread.stack.cur_frame_mut()?.pc += size;
        return Ok(());
    }

    let class_id = vm.method_area_write().get_class_id_or_load(view.class_sym)?;
    let target = vm
        .method_area_read()
        .find_declared(class_id, view.name_and_type.into())?;
    Interpreter::invoke(vm, thread, target, size)
}

fn invoke_on_receiver(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    declared_class: crate::keys::Symbol,
    key: MethodKey,
    size: usize,
) -> Result<(), VmError> {
    let desc_str = vm.interner().resolve(&key.desc);
    let arg_values = MethodDescriptor::try_from(desc_str)?.param_count();
    let receiver = thread.stack.peek_operand_at(arg_values)?.as_obj_ref()?;
    let receiver_class = match vm.heap_read().class_of(receiver)? {
        Some(class_id) => class_id,
        // arrays dispatch through the root class
        None => vm.br.get_object_class_id()?,
    };
    let target = vm
        .method_area_read()
        .find_virtual(declared_class, receiver_class, key)?;
    Interpreter::invoke(vm, thread, target, size)
}

#[inline]
pub(super) fn handle_invokevirtual(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
    size: usize,
) -> Result<(), VmError> {
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let view = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id).get_method_view(idx, vm.interner())?
    };
    invoke_on_receiver(thread, vm, view.class_sym, view.name_and_type.into(), size)
}

/// Interfaces do not change dispatch here; the receiver-class search of the
/// virtual path suffices.
#[inline]
pub(super) fn handle_invokeinterface(
    thread: &mut VmThread,
    vm: &VirtualMachine,
    idx: u16,
    size: usize,
) -> Result<(), VmError> {
    let cur_method_id = thread.stack.cur_frame()?.method_id();
    let view = {
        let ma = vm.method_area_read();
        ma.get_cp_by_method_id(&cur_method_id)
            .get_interface_method_view(idx, vm.interner())?
    };
    invoke_on_receiver(thread, vm, view.class_sym, view.name_and_type.into(), size)
}
