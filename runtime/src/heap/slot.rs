use crate::heap::HeapRef;
use crate::vm::Value;

/// Decoding discipline of a 64-bit storage slot, derived from the field
/// descriptor. Boolean, byte, char, short and int all decode as `Int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl SlotKind {
    pub fn of_descriptor(desc: &str) -> SlotKind {
        match desc.as_bytes().first() {
            Some(b'J') => SlotKind::Long,
            Some(b'F') => SlotKind::Float,
            Some(b'D') => SlotKind::Double,
            Some(b'L') | Some(b'[') => SlotKind::Reference,
            _ => SlotKind::Int,
        }
    }
}

/// Widen a value into a 64-bit slot. Ints sign-extend; floats keep their
/// bit pattern in the low 32 bits; references store handle+1 so a zeroed
/// slot reads back as null.
pub fn encode(value: &Value) -> u64 {
    match value {
        Value::Integer(i) => *i as i64 as u64,
        Value::Long(l) => *l as u64,
        Value::Float(f) => f.to_bits() as u64,
        Value::Double(d) => d.to_bits(),
        Value::Ref(h) => *h as u64 + 1,
        Value::Null => 0,
        // return addresses never reach field or array storage in verified
        // bytecode
        Value::ReturnAddress(pc) => *pc as u64,
    }
}

pub fn decode(slot: u64, kind: SlotKind) -> Value {
    match kind {
        SlotKind::Int => Value::Integer(slot as u32 as i32),
        SlotKind::Long => Value::Long(slot as i64),
        SlotKind::Float => Value::Float(f32::from_bits(slot as u32)),
        SlotKind::Double => Value::Double(f64::from_bits(slot)),
        SlotKind::Reference => {
            if slot == 0 {
                Value::Null
            } else {
                Value::Ref((slot - 1) as HeapRef)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Value::Integer(0), SlotKind::Int)]
    #[case(Value::Integer(-1), SlotKind::Int)]
    #[case(Value::Integer(i32::MIN), SlotKind::Int)]
    #[case(Value::Long(i64::MAX), SlotKind::Long)]
    #[case(Value::Long(-42), SlotKind::Long)]
    #[case(Value::Float(-0.5), SlotKind::Float)]
    #[case(Value::Double(f64::MIN_POSITIVE), SlotKind::Double)]
    #[case(Value::Ref(0), SlotKind::Reference)]
    #[case(Value::Ref(177), SlotKind::Reference)]
    #[case(Value::Null, SlotKind::Reference)]
    fn round_trips(#[case] value: Value, #[case] kind: SlotKind) {
        assert_eq!(decode(encode(&value), kind), value);
    }

    #[test]
    fn nan_bits_survive() {
        let nan = f32::from_bits(0x7fc0_1234);
        let Value::Float(back) = decode(encode(&Value::Float(nan)), SlotKind::Float) else {
            panic!("expected float");
        };
        assert_eq!(back.to_bits(), 0x7fc0_1234);
    }

    #[test]
    fn zero_slot_is_typed_zero() {
        assert_eq!(decode(0, SlotKind::Int), Value::Integer(0));
        assert_eq!(decode(0, SlotKind::Long), Value::Long(0));
        assert_eq!(decode(0, SlotKind::Float), Value::Float(0.0));
        assert_eq!(decode(0, SlotKind::Double), Value::Double(0.0));
        assert_eq!(decode(0, SlotKind::Reference), Value::Null);
    }

    #[test]
    fn descriptor_kinds() {
        assert_eq!(SlotKind::of_descriptor("I"), SlotKind::Int);
        assert_eq!(SlotKind::of_descriptor("Z"), SlotKind::Int);
        assert_eq!(SlotKind::of_descriptor("J"), SlotKind::Long);
        assert_eq!(SlotKind::of_descriptor("Ljava/lang/String;"), SlotKind::Reference);
        assert_eq!(SlotKind::of_descriptor("[I"), SlotKind::Reference);
    }
}
