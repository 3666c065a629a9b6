//! Registry and linker behaviour: offset-table layout, static storage,
//! resolution order and its failure modes.

mod support;

use cldc_runtime::error::VmError;
use cldc_runtime::keys::FieldKey;
use support::{ACC_STATIC, ClassBuilder, FakeClock, vm_with_classes};

#[test]
fn field_offsets_extend_the_superclass_layout() {
    let mut parent = ClassBuilder::new("P", "java/lang/Object");
    parent.add_field(0, "a", "I");
    parent.add_field(0, "b", "J");
    parent.add_field(ACC_STATIC, "s", "I");

    let mut child = ClassBuilder::new("C", "P");
    child.add_field(0, "c", "Ljava/lang/String;");

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("P", parent.build()), ("C", child.build())], clock);
    let child_id = vm.resolve_class("C").unwrap();
    let parent_id = vm.resolve_class("P").unwrap();

    let interner = vm.interner();
    let key = |name: &str, desc: &str| FieldKey {
        name: interner.get_or_intern(name),
        desc: interner.get_or_intern(desc),
    };

    let ma = vm.method_area_read();
    let parent_class = ma.get_class(&parent_id);
    let child_class = ma.get_class(&child_id);

    // the child's table is a superset of the parent's, with no slot reused
    for (field_key, offset) in parent_class.field_offsets() {
        assert_eq!(child_class.field_offset(field_key), Some(*offset));
    }
    let mut offsets: Vec<usize> = child_class.field_offsets().values().copied().collect();
    offsets.sort_unstable();
    offsets.dedup();
    assert_eq!(offsets.len(), child_class.field_offsets().len());

    assert_eq!(parent_class.instance_slots(), 2);
    assert_eq!(child_class.instance_slots(), 3);
    assert_eq!(child_class.field_offset(&key("c", "Ljava/lang/String;")), Some(2));

    // statics live on the declaring class only
    assert!(parent_class.has_static(&key("s", "I")));
    assert!(!child_class.has_static(&key("s", "I")));
    assert_eq!(
        ma.resolve_static_field_class(child_id, &key("s", "I")),
        Some(parent_id)
    );
}

#[test]
fn resolution_is_idempotent_and_caches() {
    let mut class = ClassBuilder::new("Once", "java/lang/Object");
    class.add_field(0, "f", "I");

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("Once", class.build())], clock);
    let first = vm.resolve_class("Once").unwrap();
    let second = vm.resolve_class("Once").unwrap();
    assert_eq!(first, second);
}

#[test]
fn unknown_class_fails_with_class_not_found() {
    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![], clock);
    match vm.resolve_class("no/such/Type") {
        Err(VmError::ClassNotFound(name)) => assert_eq!(name, "no/such/Type"),
        other => panic!("expected ClassNotFound, got {other:?}"),
    }
}

#[test]
fn descriptor_shaped_names_are_rejected() {
    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![], clock);
    assert!(matches!(
        vm.resolve_class("(I)V"),
        Err(VmError::BadClassName(_))
    ));
    assert!(matches!(
        vm.resolve_class("Ljava/lang/String;"),
        Err(VmError::BadClassName(_))
    ));
}

#[test]
fn array_and_bootstrap_classes_synthesise() {
    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![], clock);

    let array_id = vm.resolve_class("[I").unwrap();
    let object_array_id = vm.resolve_class("[Ljava/lang/String;").unwrap();
    assert_ne!(array_id, object_array_id);

    let string_id = vm.resolve_class("java/lang/String").unwrap();
    let ma = vm.method_area_read();
    let string_class = ma.get_class(&string_id);
    // native layout: value, offset, count
    assert_eq!(string_class.field_offset(&vm.br.string_value_fk), Some(0));
    assert_eq!(string_class.field_offset(&vm.br.string_offset_fk), Some(1));
    assert_eq!(string_class.field_offset(&vm.br.string_count_fk), Some(2));
    assert_eq!(string_class.instance_slots(), 3);
}

#[test]
fn superclass_cycles_are_rejected() {
    // A extends B, B extends A
    let mut a = ClassBuilder::new("A", "B");
    let mut b = ClassBuilder::new("B", "A");

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("A", a.build()), ("B", b.build())], clock);
    match vm.resolve_class("A") {
        Err(VmError::ClassHierarchyCycle(name)) => assert_eq!(name, "A"),
        other => panic!("expected ClassHierarchyCycle, got {other:?}"),
    }
}

#[test]
fn exception_mocks_form_a_catchable_hierarchy() {
    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![], clock);
    let ae = vm.resolve_class("java/lang/ArithmeticException").unwrap();

    let interner = vm.interner();
    let ma = vm.method_area_read();
    for ancestor in [
        "java/lang/ArithmeticException",
        "java/lang/RuntimeException",
        "java/lang/Exception",
        "java/lang/Throwable",
        "java/lang/Object",
    ] {
        assert!(
            ma.instance_of(ae, interner.get_or_intern(ancestor)),
            "ArithmeticException should be assignable to {ancestor}"
        );
    }
    assert!(!ma.instance_of(ae, interner.get_or_intern("java/lang/Error")));
}
