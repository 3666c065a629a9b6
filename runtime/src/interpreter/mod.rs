use crate::error::VmError;
use crate::heap::HeapRef;
use crate::heap::method_area::CallTarget;
use crate::interpreter::handlers::*;
use crate::keys::{ClassId, FullyQualifiedMethodKey, MethodId};
use crate::rt::InitState;
use crate::thread::{ThreadState, VmThread};
use crate::vm::stack::Frame;
use crate::vm::{Value, VirtualMachine};
use cldc_common::instruction::Instruction;
use smallvec::{SmallVec, smallvec};

mod handlers;

/// Outcome of one quantum on one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// Quantum exhausted; the thread is still runnable.
    Normal,
    /// The thread suspended itself (sleep, wait, join).
    Suspended,
    Terminated,
}

pub struct Interpreter;

impl Interpreter {
    /// Run up to `quantum` instructions on the thread's top frame. Handlers
    /// that push frames or suspend the thread count as one instruction.
    pub fn execute(
        vm: &VirtualMachine,
        thread: &mut VmThread,
        quantum: usize,
    ) -> Result<ExecStatus, VmError> {
        for _ in 0..quantum {
            if thread.stack.is_empty() {
                thread.state = ThreadState::Terminated;
            }
            if thread.state != ThreadState::Runnable {
                break;
            }
            if let Err(e) = Self::step(vm, thread) {
                Self::dispatch_exception(vm, thread, e)?;
            }
        }
        if thread.stack.is_empty() {
            thread.state = ThreadState::Terminated;
        }
        Ok(match thread.state {
            ThreadState::Runnable => ExecStatus::Normal,
            ThreadState::Terminated => ExecStatus::Terminated,
            _ => ExecStatus::Suspended,
        })
    }

    /// Decode and dispatch one instruction against the top frame. The pc
    /// stays at the instruction start until the handler is done, so
    /// exception-table matching and the initialisation detour see the
    /// throwing/triggering pc. Branch and frame-managing handlers set the
    /// pc themselves; everything else falls through to the increment below.
    fn step(vm: &VirtualMachine, thread: &mut VmThread) -> Result<(), VmError> {
        let (method_id, pc) = {
            let frame = thread.stack.cur_frame()?;
            (frame.method_id(), frame.pc)
        };
        let instruction = {
            let ma = vm.method_area_read();
            let code = ma.get_code(&method_id)?;
            Instruction::new_at(&code.code, pc)?
        };
        let size = instruction.byte_size();
        let is_branch = instruction.is_branch();

        match instruction {
            // Frame- and pc-managing families return early.
            Instruction::New(idx) => return handle_new(thread, vm, idx, size),
            Instruction::Getstatic(idx) => return handle_getstatic(thread, vm, idx, size),
            Instruction::Putstatic(idx) => return handle_putstatic(thread, vm, idx, size),
            Instruction::InvokeVirtual(idx) => return handle_invokevirtual(thread, vm, idx, size),
            Instruction::InvokeSpecial(idx) => return handle_invokespecial(thread, vm, idx, size),
            Instruction::InvokeStatic(idx) => return handle_invokestatic(thread, vm, idx, size),
            Instruction::InvokeInterface(idx, _count) => {
                return handle_invokeinterface(thread, vm, idx, size);
            }
            Instruction::Return => return Self::finish_return(vm, thread, None),
            Instruction::Ireturn => {
                let value = Value::Integer(thread.stack.pop_int_val()?);
                return Self::finish_return(vm, thread, Some(value));
            }
            Instruction::Lreturn => {
                let value = Value::Long(thread.stack.pop_long_val()?);
                return Self::finish_return(vm, thread, Some(value));
            }
            Instruction::Freturn => {
                let value = Value::Float(thread.stack.pop_float_val()?);
                return Self::finish_return(vm, thread, Some(value));
            }
            Instruction::Dreturn => {
                let value = Value::Double(thread.stack.pop_double_val()?);
                return Self::finish_return(vm, thread, Some(value));
            }
            Instruction::Areturn => {
                let value = thread.stack.pop_operand()?;
                value.as_nullable_obj_ref()?;
                return Self::finish_return(vm, thread, Some(value));
            }

            Instruction::Athrow => handle_athrow(thread)?,

            // Constants
            Instruction::Nop => {}
            Instruction::AconstNull => thread.stack.push_operand(Value::Null)?,
            Instruction::IconstM1 => thread.stack.push_operand(Value::Integer(-1))?,
            Instruction::Iconst0 => thread.stack.push_operand(Value::Integer(0))?,
            Instruction::Iconst1 => thread.stack.push_operand(Value::Integer(1))?,
            Instruction::Iconst2 => thread.stack.push_operand(Value::Integer(2))?,
            Instruction::Iconst3 => thread.stack.push_operand(Value::Integer(3))?,
            Instruction::Iconst4 => thread.stack.push_operand(Value::Integer(4))?,
            Instruction::Iconst5 => thread.stack.push_operand(Value::Integer(5))?,
            Instruction::Lconst0 => thread.stack.push_operand(Value::Long(0))?,
            Instruction::Lconst1 => thread.stack.push_operand(Value::Long(1))?,
            Instruction::Fconst0 => thread.stack.push_operand(Value::Float(0.0))?,
            Instruction::Fconst1 => thread.stack.push_operand(Value::Float(1.0))?,
            Instruction::Fconst2 => thread.stack.push_operand(Value::Float(2.0))?,
            Instruction::Dconst0 => thread.stack.push_operand(Value::Double(0.0))?,
            Instruction::Dconst1 => thread.stack.push_operand(Value::Double(1.0))?,
            Instruction::Bipush(value) => handle_bipush(thread, value)?,
            Instruction::Sipush(value) => handle_sipush(thread, value)?,
            Instruction::Ldc(idx) | Instruction::LdcW(idx) | Instruction::Ldc2W(idx) => {
                handle_ldc_ldcw_ldc2w(thread, vm, idx)?
            }

            // Loads
            Instruction::Iload(pos) => handle_load(thread, pos as u16)?,
            Instruction::Lload(pos) => handle_load(thread, pos as u16)?,
            Instruction::Fload(pos) => handle_load(thread, pos as u16)?,
            Instruction::Dload(pos) => handle_load(thread, pos as u16)?,
            Instruction::Aload(pos) => handle_load(thread, pos as u16)?,
            Instruction::Iload0 | Instruction::Lload0 | Instruction::Fload0
            | Instruction::Dload0 | Instruction::Aload0 => handle_load(thread, 0)?,
            Instruction::Iload1 | Instruction::Lload1 | Instruction::Fload1
            | Instruction::Dload1 | Instruction::Aload1 => handle_load(thread, 1)?,
            Instruction::Iload2 | Instruction::Lload2 | Instruction::Fload2
            | Instruction::Dload2 | Instruction::Aload2 => handle_load(thread, 2)?,
            Instruction::Iload3 | Instruction::Lload3 | Instruction::Fload3
            | Instruction::Dload3 | Instruction::Aload3 => handle_load(thread, 3)?,
            Instruction::IloadWide(pos)
            | Instruction::LloadWide(pos)
            | Instruction::FloadWide(pos)
            | Instruction::DloadWide(pos)
            | Instruction::AloadWide(pos) => handle_load(thread, pos)?,

            // Stores
            Instruction::Istore(pos) => handle_istore(thread, pos as u16)?,
            Instruction::Lstore(pos) => handle_lstore(thread, pos as u16)?,
            Instruction::Fstore(pos) => handle_fstore(thread, pos as u16)?,
            Instruction::Dstore(pos) => handle_dstore(thread, pos as u16)?,
            Instruction::Astore(pos) => handle_astore(thread, pos as u16)?,
            Instruction::Istore0 => handle_istore(thread, 0)?,
            Instruction::Istore1 => handle_istore(thread, 1)?,
            Instruction::Istore2 => handle_istore(thread, 2)?,
            Instruction::Istore3 => handle_istore(thread, 3)?,
            Instruction::Lstore0 => handle_lstore(thread, 0)?,
            Instruction::Lstore1 => handle_lstore(thread, 1)?,
            Instruction::Lstore2 => handle_lstore(thread, 2)?,
            Instruction::Lstore3 => handle_lstore(thread, 3)?,
            Instruction::Fstore0 => handle_fstore(thread, 0)?,
            Instruction::Fstore1 => handle_fstore(thread, 1)?,
            Instruction::Fstore2 => handle_fstore(thread, 2)?,
            Instruction::Fstore3 => handle_fstore(thread, 3)?,
            Instruction::Dstore0 => handle_dstore(thread, 0)?,
            Instruction::Dstore1 => handle_dstore(thread, 1)?,
            Instruction::Dstore2 => handle_dstore(thread, 2)?,
            Instruction::Dstore3 => handle_dstore(thread, 3)?,
            Instruction::Astore0 => handle_astore(thread, 0)?,
            Instruction::Astore1 => handle_astore(thread, 1)?,
            Instruction::Astore2 => handle_astore(thread, 2)?,
            Instruction::Astore3 => handle_astore(thread, 3)?,
            Instruction::IstoreWide(pos) => handle_istore(thread, pos)?,
            Instruction::LstoreWide(pos) => handle_lstore(thread, pos)?,
            Instruction::FstoreWide(pos) => handle_fstore(thread, pos)?,
            Instruction::DstoreWide(pos) => handle_dstore(thread, pos)?,
            Instruction::AstoreWide(pos) => handle_astore(thread, pos)?,

            // Array loads/stores
            Instruction::Iaload => handle_iaload(thread, vm)?,
            Instruction::Laload => handle_laload(thread, vm)?,
            Instruction::Faload => handle_faload(thread, vm)?,
            Instruction::Daload => handle_daload(thread, vm)?,
            Instruction::Aaload => handle_aaload(thread, vm)?,
            Instruction::Baload => handle_baload(thread, vm)?,
            Instruction::Caload => handle_caload(thread, vm)?,
            Instruction::Saload => handle_saload(thread, vm)?,
            Instruction::Iastore => handle_iastore(thread, vm)?,
            Instruction::Lastore => handle_lastore(thread, vm)?,
            Instruction::Fastore => handle_fastore(thread, vm)?,
            Instruction::Dastore => handle_dastore(thread, vm)?,
            Instruction::Aastore => handle_aastore(thread, vm)?,
            Instruction::Bastore => handle_bastore(thread, vm)?,
            Instruction::Castore => handle_castore(thread, vm)?,
            Instruction::Sastore => handle_sastore(thread, vm)?,

            // Stack ops
            Instruction::Pop => handle_pop(thread)?,
            Instruction::Pop2 => handle_pop2(thread)?,
            Instruction::Dup => handle_dup(thread)?,
            Instruction::DupX1 => handle_dup_x1(thread)?,
            Instruction::DupX2 => handle_dup_x2(thread)?,
            Instruction::Dup2 => handle_dup2(thread)?,
            Instruction::Dup2X1 => handle_dup2_x1(thread)?,
            Instruction::Dup2X2 => handle_dup2_x2(thread)?,
            Instruction::Swap => handle_swap(thread)?,

            // Arithmetic
            Instruction::Iadd => handle_iadd(thread)?,
            Instruction::Ladd => handle_ladd(thread)?,
            Instruction::Fadd => handle_fadd(thread)?,
            Instruction::Dadd => handle_dadd(thread)?,
            Instruction::Isub => handle_isub(thread)?,
            Instruction::Lsub => handle_lsub(thread)?,
            Instruction::Fsub => handle_fsub(thread)?,
            Instruction::Dsub => handle_dsub(thread)?,
            Instruction::Imul => handle_imul(thread)?,
            Instruction::Lmul => handle_lmul(thread)?,
            Instruction::Fmul => handle_fmul(thread)?,
            Instruction::Dmul => handle_dmul(thread)?,
            Instruction::Idiv => handle_idiv(thread)?,
            Instruction::Ldiv => handle_ldiv(thread)?,
            Instruction::Fdiv => handle_fdiv(thread)?,
            Instruction::Ddiv => handle_ddiv(thread)?,
            Instruction::Irem => handle_irem(thread)?,
            Instruction::Lrem => handle_lrem(thread)?,
            Instruction::Frem => handle_frem(thread)?,
            Instruction::Drem => handle_drem(thread)?,
            Instruction::Ineg => handle_ineg(thread)?,
            Instruction::Lneg => handle_lneg(thread)?,
            Instruction::Fneg => handle_fneg(thread)?,
            Instruction::Dneg => handle_dneg(thread)?,
            Instruction::Ishl => handle_ishl(thread)?,
            Instruction::Lshl => handle_lshl(thread)?,
            Instruction::Ishr => handle_ishr(thread)?,
            Instruction::Lshr => handle_lshr(thread)?,
            Instruction::Iushr => handle_iushr(thread)?,
            Instruction::Lushr => handle_lushr(thread)?,
            Instruction::Iand => handle_iand(thread)?,
            Instruction::Land => handle_land(thread)?,
            Instruction::Ior => handle_ior(thread)?,
            Instruction::Lor => handle_lor(thread)?,
            Instruction::Ixor => handle_ixor(thread)?,
            Instruction::Lxor => handle_lxor(thread)?,
            Instruction::Iinc(idx, delta) => handle_iinc(thread, idx as u16, delta)?,
            Instruction::IincWide(idx, delta) => handle_iinc(thread, idx, delta)?,

            // Conversions
            Instruction::I2l => handle_i2l(thread)?,
            Instruction::I2f => handle_i2f(thread)?,
            Instruction::I2d => handle_i2d(thread)?,
            Instruction::L2i => handle_l2i(thread)?,
            Instruction::L2f => handle_l2f(thread)?,
            Instruction::L2d => handle_l2d(thread)?,
            Instruction::F2i => handle_f2i(thread)?,
            Instruction::F2l => handle_f2l(thread)?,
            Instruction::F2d => handle_f2d(thread)?,
            Instruction::D2i => handle_d2i(thread)?,
            Instruction::D2l => handle_d2l(thread)?,
            Instruction::D2f => handle_d2f(thread)?,
            Instruction::I2b => handle_i2b(thread)?,
            Instruction::I2c => handle_i2c(thread)?,
            Instruction::I2s => handle_i2s(thread)?,

            // Comparisons
            Instruction::Lcmp => handle_lcmp(thread)?,
            Instruction::Fcmpl => handle_fcmp(thread, -1)?,
            Instruction::Fcmpg => handle_fcmp(thread, 1)?,
            Instruction::Dcmpl => handle_dcmp(thread, -1)?,
            Instruction::Dcmpg => handle_dcmp(thread, 1)?,

            // Branches
            Instruction::IfEq(offset) => handle_if(thread, offset, size, |v| v == 0)?,
            Instruction::IfNe(offset) => handle_if(thread, offset, size, |v| v != 0)?,
            Instruction::IfLt(offset) => handle_if(thread, offset, size, |v| v < 0)?,
            Instruction::IfGe(offset) => handle_if(thread, offset, size, |v| v >= 0)?,
            Instruction::IfGt(offset) => handle_if(thread, offset, size, |v| v > 0)?,
            Instruction::IfLe(offset) => handle_if(thread, offset, size, |v| v <= 0)?,
            Instruction::IfIcmpeq(offset) => handle_if_icmp(thread, offset, size, |a, b| a == b)?,
            Instruction::IfIcmpne(offset) => handle_if_icmp(thread, offset, size, |a, b| a != b)?,
            Instruction::IfIcmplt(offset) => handle_if_icmp(thread, offset, size, |a, b| a < b)?,
            Instruction::IfIcmpge(offset) => handle_if_icmp(thread, offset, size, |a, b| a >= b)?,
            Instruction::IfIcmpgt(offset) => handle_if_icmp(thread, offset, size, |a, b| a > b)?,
            Instruction::IfIcmple(offset) => handle_if_icmp(thread, offset, size, |a, b| a <= b)?,
            Instruction::IfAcmpEq(offset) => handle_if_acmp(thread, offset, size, true)?,
            Instruction::IfAcmpNe(offset) => handle_if_acmp(thread, offset, size, false)?,
            Instruction::Ifnull(offset) => handle_ifnull(thread, offset, size, true)?,
            Instruction::Ifnonnull(offset) => handle_ifnull(thread, offset, size, false)?,
            Instruction::Goto(offset) => handle_goto(thread, offset as i32)?,
            Instruction::GotoW(offset) => handle_goto(thread, offset)?,
            Instruction::Jsr(offset) => handle_jsr(thread, offset as i32, size)?,
            Instruction::JsrW(offset) => handle_jsr(thread, offset, size)?,
            Instruction::Ret(idx) => handle_ret(thread, idx as u16)?,
            Instruction::RetWide(idx) => handle_ret(thread, idx)?,
            Instruction::TableSwitch(data) => handle_tableswitch(thread, data)?,
            Instruction::LookupSwitch(data) => handle_lookupswitch(thread, data)?,

            // Objects, fields, arrays
            Instruction::Getfield(idx) => handle_getfield(thread, vm, idx)?,
            Instruction::Putfield(idx) => handle_putfield(thread, vm, idx)?,
            Instruction::Newarray(_array_type) => handle_newarray(thread, vm)?,
            Instruction::Anewarray(idx) => handle_anewarray(thread, vm, idx)?,
            Instruction::Multianewarray(idx, dims) => {
                handle_multianewarray(thread, vm, idx, dims)?
            }
            Instruction::ArrayLength => handle_arraylength(thread, vm)?,
            Instruction::Checkcast(idx) => handle_checkcast(thread, vm, idx)?,
            Instruction::Instanceof(idx) => handle_instanceof(thread, vm, idx)?,
            Instruction::Monitorenter => handle_monitorenter(thread)?,
            Instruction::Monitorexit => handle_monitorexit(thread)?,
        }

        if !is_branch {
            thread.stack.cur_frame_mut()?.pc += size;
        }
        Ok(())
    }

    /// Map a raised error to an exception object and unwind, or propagate
    /// host errors unchanged.
    fn dispatch_exception(
        vm: &VirtualMachine,
        thread: &mut VmThread,
        error: VmError,
    ) -> Result<(), VmError> {
        let exception = match error {
            VmError::JavaThrow(handle) => handle,
            VmError::JavaException(pending) => vm.raise(pending)?,
            host => return Err(host),
        };
        Self::unwind(vm, thread, exception)
    }

    /// Walk the current frame's exception table for an entry covering the
    /// throwing pc with a matching catch type; pop frames until one matches
    /// or the stack runs out, which terminates the thread.
    fn unwind(vm: &VirtualMachine, thread: &mut VmThread, exception: HeapRef) -> Result<(), VmError> {
        let exception_class = vm.heap_read().class_of(exception)?;
        loop {
            if thread.stack.is_empty() {
                thread.last_exception = Some(exception);
                thread.state = ThreadState::Terminated;
                return Ok(());
            }
            let (method_id, pc) = {
                let frame = thread.stack.cur_frame()?;
                (frame.method_id(), frame.pc)
            };
            let handler_pc = {
                let ma = vm.method_area_read();
                let code = ma.get_code(&method_id)?;
                let cp = ma.get_cp_by_method_id(&method_id);
                let mut found = None;
                for entry in &code.exception_table {
                    if pc < entry.start_pc as usize || pc >= entry.end_pc as usize {
                        continue;
                    }
                    let matches = if entry.catch_type == 0 {
                        true
                    } else {
                        let catch_sym = cp.get_class_sym(entry.catch_type, vm.interner())?;
                        match exception_class {
                            Some(class_id) => ma.instance_of(class_id, catch_sym),
                            None => false,
                        }
                    };
                    if matches {
                        found = Some(entry.handler_pc as usize);
                        break;
                    }
                }
                found
            };
            match handler_pc {
                Some(handler_pc) => {
                    let frame = thread.stack.cur_frame_mut()?;
                    frame.clear_operands();
                    frame.push_operand(Value::Ref(exception))?;
                    frame.pc = handler_pc;
                    return Ok(());
                }
                None => {
                    let frame = thread.stack.pop_frame()?;
                    if let Some(class_id) = frame.clinit_of {
                        vm.method_area_read()
                            .get_class(&class_id)
                            .set_init_state(InitState::Erroneous);
                    }
                }
            }
        }
    }

    /// Pop the returning frame, complete a `<clinit>` detour if this was
    /// one, and hand the return value to the caller frame.
    fn finish_return(
        vm: &VirtualMachine,
        thread: &mut VmThread,
        value: Option<Value>,
    ) -> Result<(), VmError> {
        let frame = thread.stack.pop_frame()?;
        if let Some(class_id) = frame.clinit_of {
            vm.method_area_read()
                .get_class(&class_id)
                .set_init_state(InitState::Initialized);
        }
        if thread.stack.is_empty() {
            thread.state = ThreadState::Terminated;
            return Ok(());
        }
        if let Some(value) = value {
            thread.stack.push_operand(value)?;
        }
        Ok(())
    }

    /// Initialisation as a transparent detour. When the class (or one of
    /// its superclasses) needs its `<clinit>` run, detour frames are pushed
    /// and `true` comes back: the caller leaves the pc alone so the
    /// triggering instruction reruns after the initialisers return.
    /// Re-entry by the initialising thread is idempotent.
    pub fn ensure_initialized(
        vm: &VirtualMachine,
        thread: &mut VmThread,
        class_id: ClassId,
    ) -> Result<bool, VmError> {
        let state = vm.method_area_read().get_class(&class_id).init_state();
        match state {
            InitState::Initialized | InitState::Initializing(_) => return Ok(false),
            InitState::Erroneous => {
                let name = {
                    let ma = vm.method_area_read();
                    vm.interner().resolve(&ma.get_class(&class_id).name).to_string()
                };
                return Err(VmError::ClassInitializationFailed(name));
            }
            InitState::Uninitialized => {}
        }

        let (super_id, clinit) = {
            let ma = vm.method_area_read();
            let class = ma.get_class(&class_id);
            class.set_init_state(InitState::Initializing(thread.id));
            (class.super_id(), class.clinit_method_id())
        };

        let mut pushed = false;
        match clinit {
            Some(clinit) => {
                let mut frame = Self::build_frame(vm, clinit, &[])?;
                frame.clinit_of = Some(class_id);
                thread.stack.push_frame(frame)?;
                pushed = true;
            }
            None => {
                // nothing to run; completion is immediate
                vm.method_area_read()
                    .get_class(&class_id)
                    .set_init_state(InitState::Initialized);
            }
        }
        // the superclass's frames go on top so it initialises first
        if let Some(super_id) = super_id {
            pushed |= Self::ensure_initialized(vm, thread, super_id)?;
        }
        Ok(pushed)
    }

    /// A fresh frame for an interpreted method, arguments bound into locals
    /// from slot 0 (receiver first for instance methods, category-2 values
    /// taking two slots).
    pub fn build_frame(
        vm: &VirtualMachine,
        method_id: MethodId,
        args: &[Value],
    ) -> Result<Frame, VmError> {
        let ma = vm.method_area_read();
        let method = ma.get_method(&method_id);
        let code = ma.get_code(&method_id)?;
        let mut frame = Frame::new(method_id, method.class_id(), code.max_stack, code.max_locals);
        let mut index = 0usize;
        for value in args {
            frame.set_local(index, *value)?;
            index += if value.is_wide() { 2 } else { 1 };
        }
        Ok(frame)
    }

    /// Common invocation tail: native bindings run against the caller's
    /// operand stack (they pop their own receiver and arguments);
    /// interpreted targets get their arguments popped in reverse and a
    /// fresh frame pushed, with the caller's pc already advanced past the
    /// call.
    pub(super) fn invoke(
        vm: &VirtualMachine,
        thread: &mut VmThread,
        target: CallTarget,
        instr_size: usize,
    ) -> Result<(), VmError> {
        let (is_native, is_static, param_count, name, desc) = {
            let ma = vm.method_area_read();
            let method = ma.get_method(&target.method_id);
            (
                method.is_native(),
                method.is_static(),
                method.param_count,
                method.name,
                method.desc,
            )
        };

        if is_native {
            let key = {
                let ma = vm.method_area_read();
                FullyQualifiedMethodKey::new(ma.get_class(&target.defining_class).name, name, desc)
            };
            let Some(native) = vm.native_registry.get(&key) else {
                return Err(crate::build_exception!(
                    UnsatisfiedLinkError,
                    "{}",
                    vm.method_area_read().pretty_method(&target.method_id)
                ));
            };
            native(vm, thread)?;
            // a native may have torn down the thread (System.exit)
            if !thread.stack.is_empty() {
                thread.stack.cur_frame_mut()?.pc += instr_size;
            }
            return Ok(());
        }

        let arg_values = param_count + usize::from(!is_static);
        let mut args: SmallVec<[Value; 8]> = smallvec![Value::Null; arg_values];
        for slot in args.iter_mut().rev() {
            *slot = thread.stack.pop_operand()?;
        }
        thread.stack.cur_frame_mut()?.pc += instr_size;
        let frame = Self::build_frame(vm, target.method_id, &args)?;
        thread.stack.push_frame(frame)?;
        Ok(())
    }
}
