use crate::error::VmError;
use crate::heap::HeapRef;
use crate::keys::{ClassId, MethodId};
use crate::vm::Value;

/// One method activation: locals, operand stack, pc. Owned by exactly one
/// thread; all bytecode execution mutates the top frame only.
pub struct Frame {
    method_id: MethodId,
    /// Declaring class; constant-pool indices in the code resolve here.
    pub class_id: ClassId,
    pub pc: usize,
    locals: Vec<Option<Value>>,
    operands: Vec<Value>,
    /// Operand depth in computational slots (category-2 values count two).
    stack_slots: usize,
    max_stack: usize,
    /// Set on `<clinit>` detour frames: the class to mark initialised when
    /// this frame returns, or erroneous when it unwinds.
    pub clinit_of: Option<ClassId>,
}

impl Frame {
    pub fn new(method_id: MethodId, class_id: ClassId, max_stack: u16, max_locals: u16) -> Self {
        Self {
            method_id,
            class_id,
            pc: 0,
            locals: vec![None; max_locals as usize],
            operands: Vec::with_capacity(max_stack as usize),
            stack_slots: 0,
            max_stack: max_stack as usize,
            clinit_of: None,
        }
    }

    pub fn method_id(&self) -> MethodId {
        self.method_id
    }

    pub fn get_local(&self, index: u16) -> Result<&Value, VmError> {
        self.locals
            .get(index as usize)
            .ok_or(VmError::LocalVariableNotFound(index))?
            .as_ref()
            .ok_or(VmError::LocalVariableNotInitialized(index))
    }

    pub fn set_local(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        let wide = value.is_wide();
        match self.locals.get_mut(index) {
            Some(slot) => {
                *slot = Some(value);
            }
            None => return Err(VmError::LocalVariableNotFound(index as u16)),
        }
        // a category-2 store invalidates the following slot
        if wide {
            if let Some(slot) = self.locals.get_mut(index + 1) {
                *slot = None;
            }
        }
        Ok(())
    }

    pub fn push_operand(&mut self, value: Value) -> Result<(), VmError> {
        let width = if value.is_wide() { 2 } else { 1 };
        if self.stack_slots + width > self.max_stack {
            return Err(VmError::StackOverflow);
        }
        self.stack_slots += width;
        self.operands.push(value);
        Ok(())
    }

    pub fn pop_operand(&mut self) -> Result<Value, VmError> {
        let value = self.operands.pop().ok_or(VmError::OperandStackIsEmpty)?;
        self.stack_slots -= if value.is_wide() { 2 } else { 1 };
        Ok(value)
    }

    pub fn peek_operand(&self) -> Result<&Value, VmError> {
        self.operands.last().ok_or(VmError::OperandStackIsEmpty)
    }

    /// Peek `depth` values below the top (0 = top).
    pub fn peek_operand_at(&self, depth: usize) -> Result<&Value, VmError> {
        if depth >= self.operands.len() {
            return Err(VmError::OperandStackIsEmpty);
        }
        Ok(&self.operands[self.operands.len() - 1 - depth])
    }

    pub fn clear_operands(&mut self) {
        self.operands.clear();
        self.stack_slots = 0;
    }

    pub fn operand_depth(&self) -> usize {
        self.operands.len()
    }
}

const MAX_FRAME_DEPTH: usize = 1024;

/// The per-thread frame stack, with the typed operand helpers the handlers
/// use against whatever frame is currently on top.
#[derive(Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push_frame(&mut self, frame: Frame) -> Result<(), VmError> {
        if self.frames.len() >= MAX_FRAME_DEPTH {
            return Err(VmError::StackOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) -> Result<Frame, VmError> {
        self.frames.pop().ok_or(VmError::FrameStackIsEmpty)
    }

    pub fn cur_frame(&self) -> Result<&Frame, VmError> {
        self.frames.last().ok_or(VmError::FrameStackIsEmpty)
    }

    pub fn cur_frame_mut(&mut self) -> Result<&mut Frame, VmError> {
        self.frames.last_mut().ok_or(VmError::FrameStackIsEmpty)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn pc(&self) -> Result<usize, VmError> {
        Ok(self.cur_frame()?.pc)
    }

    pub fn set_pc(&mut self, pc: usize) -> Result<(), VmError> {
        self.cur_frame_mut()?.pc = pc;
        Ok(())
    }

    pub fn push_operand(&mut self, value: Value) -> Result<(), VmError> {
        self.cur_frame_mut()?.push_operand(value)
    }

    pub fn pop_operand(&mut self) -> Result<Value, VmError> {
        self.cur_frame_mut()?.pop_operand()
    }

    pub fn peek_operand(&self) -> Result<&Value, VmError> {
        self.cur_frame()?.peek_operand()
    }

    pub fn peek_operand_at(&self, depth: usize) -> Result<&Value, VmError> {
        self.cur_frame()?.peek_operand_at(depth)
    }

    pub fn set_local(&mut self, index: usize, value: Value) -> Result<(), VmError> {
        self.cur_frame_mut()?.set_local(index, value)
    }

    pub fn get_local(&self, index: u16) -> Result<&Value, VmError> {
        self.cur_frame()?.get_local(index)
    }

    pub fn pop_int_val(&mut self) -> Result<i32, VmError> {
        self.pop_operand()?.as_int()
    }

    pub fn pop_long_val(&mut self) -> Result<i64, VmError> {
        self.pop_operand()?.as_long()
    }

    pub fn pop_float_val(&mut self) -> Result<f32, VmError> {
        self.pop_operand()?.as_float()
    }

    pub fn pop_double_val(&mut self) -> Result<f64, VmError> {
        self.pop_operand()?.as_double()
    }

    /// Pop a reference, raising NullPointerException on null.
    pub fn pop_obj_val(&mut self) -> Result<HeapRef, VmError> {
        self.pop_operand()?.as_obj_ref()
    }

    pub fn pop_nullable_ref_val(&mut self) -> Result<Option<HeapRef>, VmError> {
        self.pop_operand()?.as_nullable_obj_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(max_stack: u16, max_locals: u16) -> Frame {
        Frame::new(MethodId::from_usize(0), ClassId::from_usize(0), max_stack, max_locals)
    }

    #[test]
    fn category_2_values_fill_two_stack_slots() {
        let mut frame = frame(2, 0);
        frame.push_operand(Value::Long(1)).unwrap();
        // a long already occupies both declared slots
        assert!(matches!(
            frame.push_operand(Value::Integer(0)),
            Err(VmError::StackOverflow)
        ));
        frame.pop_operand().unwrap();
        frame.push_operand(Value::Integer(1)).unwrap();
        frame.push_operand(Value::Integer(2)).unwrap();
        assert!(matches!(
            frame.push_operand(Value::Integer(3)),
            Err(VmError::StackOverflow)
        ));
    }

    #[test]
    fn wide_local_store_invalidates_the_next_slot() {
        let mut frame = frame(4, 3);
        frame.set_local(1, Value::Integer(9)).unwrap();
        frame.set_local(0, Value::Double(1.5)).unwrap();
        assert!(matches!(
            frame.get_local(1),
            Err(VmError::LocalVariableNotInitialized(1))
        ));
        assert_eq!(frame.get_local(0).unwrap(), &Value::Double(1.5));
    }

    #[test]
    fn uninitialised_and_out_of_range_locals_are_typed_errors() {
        let frame = frame(1, 1);
        assert!(matches!(frame.get_local(0), Err(VmError::LocalVariableNotInitialized(0))));
        assert!(matches!(frame.get_local(5), Err(VmError::LocalVariableNotFound(5))));
    }

    #[test]
    fn frame_stack_depth_is_bounded() {
        let mut stack = FrameStack::new();
        for _ in 0..MAX_FRAME_DEPTH {
            stack.push_frame(frame(1, 1)).unwrap();
        }
        assert!(matches!(stack.push_frame(frame(1, 1)), Err(VmError::StackOverflow)));
    }
}
