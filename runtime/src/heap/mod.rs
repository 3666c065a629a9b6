use crate::error::VmError;
use crate::heap::slot::SlotKind;
use crate::keys::ClassId;
use crate::throw_exception;
use crate::vm::Value;
use std::collections::HashMap;

pub mod method_area;
pub mod slot;

/// Index into the heap's object table. Stored in 64-bit slots as handle+1
/// so that zeroed storage reads back as null.
pub type HeapRef = usize;

/// An object: its linked class plus dense 64-bit slots. Arrays carry no
/// class; their length is the slot count.
struct HeapObject {
    class_id: Option<ClassId>,
    slots: Box<[u64]>,
}

/// An opaque byte stream vended to native I/O methods. The core never
/// interprets stream contents.
pub struct ByteStream {
    data: Vec<u8>,
    pos: usize,
    mark: usize,
}

impl ByteStream {
    fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0, mark: 0 }
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        let available = self.data.len() - self.pos;
        let count = buf.len().min(available);
        buf[..count].copy_from_slice(&self.data[self.pos..self.pos + count]);
        self.pos += count;
        count
    }

    pub fn available(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn skip(&mut self, n: u64) -> u64 {
        let count = (n as usize).min(self.available());
        self.pos += count;
        count as u64
    }

    pub fn mark(&mut self) {
        self.mark = self.pos;
    }

    pub fn reset(&mut self) {
        self.pos = self.mark;
    }
}

/// Object table plus the native-stream table. No reclamation: objects are
/// retained for the VM lifetime; the host may `clear` at shutdown.
pub struct Heap {
    objects: Vec<HeapObject>,
    streams: HashMap<i32, ByteStream>,
    next_stream_id: i32,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            objects: Vec::with_capacity(1024),
            streams: HashMap::new(),
            next_stream_id: 1,
        }
    }

    pub fn alloc_instance(&mut self, class_id: ClassId, slot_count: usize) -> HeapRef {
        let handle = self.objects.len();
        self.objects.push(HeapObject {
            class_id: Some(class_id),
            slots: vec![0u64; slot_count].into_boxed_slice(),
        });
        handle
    }

    /// Array allocation; the caller has already rejected negative lengths.
    pub fn alloc_array(&mut self, length: usize) -> HeapRef {
        let handle = self.objects.len();
        self.objects.push(HeapObject {
            class_id: None,
            slots: vec![0u64; length].into_boxed_slice(),
        });
        handle
    }

    fn object(&self, handle: HeapRef) -> Result<&HeapObject, VmError> {
        self.objects.get(handle).ok_or(VmError::WrongHeapAddress(handle))
    }

    fn object_mut(&mut self, handle: HeapRef) -> Result<&mut HeapObject, VmError> {
        self.objects.get_mut(handle).ok_or(VmError::WrongHeapAddress(handle))
    }

    pub fn class_of(&self, handle: HeapRef) -> Result<Option<ClassId>, VmError> {
        Ok(self.object(handle)?.class_id)
    }

    pub fn is_array(&self, handle: HeapRef) -> Result<bool, VmError> {
        Ok(self.object(handle)?.class_id.is_none())
    }

    pub fn slot_count(&self, handle: HeapRef) -> Result<usize, VmError> {
        Ok(self.object(handle)?.slots.len())
    }

    pub fn array_length(&self, handle: HeapRef) -> Result<i32, VmError> {
        Ok(self.object(handle)?.slots.len() as i32)
    }

    // Field access; offsets come from the class's offset table.

    pub fn field_slot(&self, handle: HeapRef, offset: usize) -> Result<u64, VmError> {
        self.object(handle)?
            .slots
            .get(offset)
            .copied()
            .ok_or(VmError::WrongHeapAddress(handle))
    }

    pub fn set_field_slot(&mut self, handle: HeapRef, offset: usize, slot: u64) -> Result<(), VmError> {
        let object = self.object_mut(handle)?;
        match object.slots.get_mut(offset) {
            Some(value) => {
                *value = slot;
                Ok(())
            }
            None => Err(VmError::WrongHeapAddress(handle)),
        }
    }

    pub fn read_field(&self, handle: HeapRef, offset: usize, kind: SlotKind) -> Result<Value, VmError> {
        Ok(slot::decode(self.field_slot(handle, offset)?, kind))
    }

    pub fn write_field(&mut self, handle: HeapRef, offset: usize, value: &Value) -> Result<(), VmError> {
        self.set_field_slot(handle, offset, slot::encode(value))
    }

    // Array element access; bounds violations surface as Java exceptions.

    pub fn array_slot(&self, handle: HeapRef, index: i32) -> Result<u64, VmError> {
        let object = self.object(handle)?;
        if index < 0 || index as usize >= object.slots.len() {
            throw_exception!(
                ArrayIndexOutOfBoundsException,
                "Index {} out of bounds for length {}",
                index,
                object.slots.len()
            )?
        }
        Ok(object.slots[index as usize])
    }

    pub fn set_array_slot(&mut self, handle: HeapRef, index: i32, slot: u64) -> Result<(), VmError> {
        let object = self.object_mut(handle)?;
        if index < 0 || index as usize >= object.slots.len() {
            throw_exception!(
                ArrayIndexOutOfBoundsException,
                "Index {} out of bounds for length {}",
                index,
                object.slots.len()
            )?
        }
        object.slots[index as usize] = slot;
        Ok(())
    }

    pub fn copy_slots(
        &mut self,
        src: HeapRef,
        src_pos: i32,
        dest: HeapRef,
        dest_pos: i32,
        length: i32,
    ) -> Result<(), VmError> {
        let src_len = self.slot_count(src)? as i32;
        let dest_len = self.slot_count(dest)? as i32;
        if src_pos < 0
            || dest_pos < 0
            || length < 0
            || src_pos.checked_add(length).is_none_or(|end| end > src_len)
            || dest_pos.checked_add(length).is_none_or(|end| end > dest_len)
        {
            throw_exception!(ArrayIndexOutOfBoundsException, "arraycopy range out of bounds")?
        }
        let range = src_pos as usize..(src_pos + length) as usize;
        let copied: Vec<u64> = self.object(src)?.slots[range].to_vec();
        let dest_obj = self.object_mut(dest)?;
        dest_obj.slots[dest_pos as usize..(dest_pos + length) as usize].copy_from_slice(&copied);
        Ok(())
    }

    // Typed array helpers for the bootstrap natives.

    pub fn alloc_char_array(&mut self, units: &[u16]) -> HeapRef {
        let handle = self.alloc_array(units.len());
        let slots = &mut self.objects[handle].slots;
        for (slot, unit) in slots.iter_mut().zip(units) {
            *slot = *unit as u64;
        }
        handle
    }

    pub fn alloc_byte_array(&mut self, bytes: &[u8]) -> HeapRef {
        let handle = self.alloc_array(bytes.len());
        let slots = &mut self.objects[handle].slots;
        for (slot, byte) in slots.iter_mut().zip(bytes) {
            *slot = *byte as i8 as i64 as u64;
        }
        handle
    }

    pub fn char_array_units(&self, handle: HeapRef) -> Result<Vec<u16>, VmError> {
        Ok(self.object(handle)?.slots.iter().map(|&slot| slot as u16).collect())
    }

    pub fn byte_array_bytes(&self, handle: HeapRef) -> Result<Vec<u8>, VmError> {
        Ok(self.object(handle)?.slots.iter().map(|&slot| slot as u8).collect())
    }

    // Native stream handles: monotonic positive ids, never reused.

    pub fn alloc_stream(&mut self, bytes: Vec<u8>) -> i32 {
        let id = self.next_stream_id;
        self.next_stream_id += 1;
        self.streams.insert(id, ByteStream::new(bytes));
        id
    }

    pub fn get_stream(&mut self, id: i32) -> Option<&mut ByteStream> {
        self.streams.get_mut(&id)
    }

    pub fn remove_stream(&mut self, id: i32) {
        self.streams.remove(&id);
    }

    /// Host shutdown: drop every retained object and stream.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.streams.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_array_reads_back_zero() {
        let mut heap = Heap::new();
        let array = heap.alloc_array(4);
        assert_eq!(heap.array_length(array).unwrap(), 4);
        for i in 0..4 {
            assert_eq!(heap.array_slot(array, i).unwrap(), 0);
        }
        heap.set_array_slot(array, 2, slot::encode(&Value::Integer(-7))).unwrap();
        assert_eq!(
            slot::decode(heap.array_slot(array, 2).unwrap(), SlotKind::Int),
            Value::Integer(-7)
        );
    }

    #[test]
    fn bounds_checks_raise_java_exceptions() {
        let mut heap = Heap::new();
        let array = heap.alloc_array(1);
        assert!(matches!(heap.array_slot(array, -1), Err(VmError::JavaException(_))));
        assert!(matches!(heap.array_slot(array, 1), Err(VmError::JavaException(_))));
        assert!(matches!(
            heap.set_array_slot(array, 5, 0),
            Err(VmError::JavaException(_))
        ));
    }

    #[test]
    fn stream_ids_are_monotonic_and_not_reused() {
        let mut heap = Heap::new();
        let a = heap.alloc_stream(vec![1, 2, 3]);
        let b = heap.alloc_stream(vec![4]);
        assert!(a > 0 && b > a);
        heap.remove_stream(a);
        let c = heap.alloc_stream(vec![5]);
        assert!(c > b);
        assert!(heap.get_stream(a).is_none());
    }

    #[test]
    fn stream_read_mark_reset() {
        let mut heap = Heap::new();
        let id = heap.alloc_stream(vec![10, 20, 30]);
        let stream = heap.get_stream(id).unwrap();
        assert_eq!(stream.read_u8(), Some(10));
        stream.mark();
        assert_eq!(stream.read_u8(), Some(20));
        stream.reset();
        assert_eq!(stream.read_u8(), Some(20));
        assert_eq!(stream.available(), 1);
        assert_eq!(stream.skip(10), 1);
        assert_eq!(stream.read_u8(), None);
    }

    #[test]
    fn arraycopy_respects_bounds() {
        let mut heap = Heap::new();
        let src = heap.alloc_char_array(&[1, 2, 3, 4]);
        let dest = heap.alloc_array(4);
        heap.copy_slots(src, 1, dest, 0, 3).unwrap();
        assert_eq!(heap.char_array_units(dest).unwrap(), vec![2, 3, 4, 0]);
        assert!(heap.copy_slots(src, 2, dest, 0, 3).is_err());
    }
}
