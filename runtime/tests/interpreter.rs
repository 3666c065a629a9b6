//! End-to-end scenarios over assembled class images: resolve, link,
//! interpret, and observe results through static fields and the heap.

mod support;

use support::{
    ACC_PUBLIC, ACC_STATIC, ClassBuilder, FakeClock, run_to_completion, static_int,
    vm_with_classes,
};

fn hi(index: u16) -> u8 {
    (index >> 8) as u8
}

fn lo(index: u16) -> u8 {
    (index & 0xFF) as u8
}

#[test]
fn arithmetic_loop_sums_to_45() {
    let mut main = ClassBuilder::new("Main", "java/lang/Object");
    main.add_field(ACC_STATIC, "result", "I");
    let result = main.field_ref("Main", "result", "I");
    main.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        2,
        3,
        vec![
            0x03, // iconst_0
            0x3c, // istore_1 (s)
            0x03, // iconst_0
            0x3d, // istore_2 (i)
            0x1c, // iload_2          <- pc 4, loop head
            0x10, 0x0a, // bipush 10
            0xa2, 0x00, 0x0d, // if_icmpge +13 -> pc 20
            0x1b, // iload_1
            0x1c, // iload_2
            0x60, // iadd
            0x3c, // istore_1
            0x84, 0x02, 0x01, // iinc 2, 1
            0xa7, 0xff, 0xf3, // goto -13 -> pc 4
            0x1b, // iload_1          <- pc 20
            0xb3, hi(result), lo(result), // putstatic result
            0xb1, // return
        ],
    );

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("Main", main.build())], clock.clone());
    vm.launch_main("Main", &[]).unwrap();
    run_to_completion(&vm, &clock);

    assert_eq!(static_int(&vm, "Main", "result"), Some(45));
    assert_eq!(vm.exit_status(), 0);
}

#[test]
fn invokevirtual_dispatches_on_runtime_class() {
    let mut base = ClassBuilder::new("B", "java/lang/Object");
    base.add_method(ACC_PUBLIC, "f", "()I", 1, 1, vec![0x04, 0xac]); // iconst_1; ireturn

    let mut derived = ClassBuilder::new("D", "B");
    derived.add_method(ACC_PUBLIC, "f", "()I", 1, 1, vec![0x05, 0xac]); // iconst_2; ireturn

    let mut main = ClassBuilder::new("Main", "java/lang/Object");
    main.add_field(ACC_STATIC, "result", "I");
    let result = main.field_ref("Main", "result", "I");
    let d_class = main.class("D");
    // the call site's declared class is B; the receiver's runtime class is D
    let f_ref = main.method_ref("B", "f", "()I");
    main.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        2,
        1,
        vec![
            0xbb, hi(d_class), lo(d_class), // new D
            0xb6, hi(f_ref), lo(f_ref), // invokevirtual B.f()I
            0xb3, hi(result), lo(result), // putstatic result
            0xb1, // return
        ],
    );

    let clock = FakeClock::new();
    let vm = vm_with_classes(
        vec![("B", base.build()), ("D", derived.build()), ("Main", main.build())],
        clock.clone(),
    );
    vm.launch_main("Main", &[]).unwrap();
    run_to_completion(&vm, &clock);

    assert_eq!(static_int(&vm, "Main", "result"), Some(2));
}

#[test]
fn idiv_by_zero_is_caught_by_matching_handler() {
    let mut main = ClassBuilder::new("Main", "java/lang/Object");
    main.add_field(ACC_STATIC, "result", "I");
    let result = main.field_ref("Main", "result", "I");
    let arithmetic = main.class("java/lang/ArithmeticException");
    main.add_method_with_handlers(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        2,
        1,
        vec![
            0x04, // iconst_1
            0x03, // iconst_0
            0x6c, // idiv           <- throws
            0x57, // pop
            0x03, // iconst_0
            0xb3, hi(result), lo(result), // putstatic result = 0
            0xb1, // return
            0x57, // pop            <- pc 9, handler (exception on stack)
            0x04, // iconst_1
            0xb3, hi(result), lo(result), // putstatic result = 1
            0xb1, // return
        ],
        vec![(0, 4, 9, arithmetic)],
    );

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("Main", main.build())], clock.clone());
    vm.launch_main("Main", &[]).unwrap();
    run_to_completion(&vm, &clock);

    assert_eq!(static_int(&vm, "Main", "result"), Some(1));
    assert_eq!(vm.exit_status(), 0);
}

#[test]
fn uncaught_exception_terminates_main_with_nonzero_status() {
    let mut main = ClassBuilder::new("Main", "java/lang/Object");
    main.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        2,
        1,
        vec![
            0x04, // iconst_1
            0x03, // iconst_0
            0x6c, // idiv
            0x57, // pop
            0xb1, // return
        ],
    );

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("Main", main.build())], clock.clone());
    vm.launch_main("Main", &[]).unwrap();
    run_to_completion(&vm, &clock);

    assert_eq!(vm.exit_status(), 1);
}

#[test]
fn class_initialisation_runs_superclass_first_and_once() {
    // class A { static int x; static { x = 7; } }
    let mut a = ClassBuilder::new("A", "java/lang/Object");
    a.add_field(ACC_STATIC, "x", "I");
    let ax_in_a = a.field_ref("A", "x", "I");
    a.add_method(
        ACC_STATIC,
        "<clinit>",
        "()V",
        1,
        0,
        vec![
            0x10, 0x07, // bipush 7
            0xb3, hi(ax_in_a), lo(ax_in_a), // putstatic A.x
            0xb1, // return
        ],
    );

    // class B extends A { static int y; static { y = A.x + 1; } }
    let mut b = ClassBuilder::new("B", "A");
    b.add_field(ACC_STATIC, "y", "I");
    let ax_in_b = b.field_ref("A", "x", "I");
    let by_in_b = b.field_ref("B", "y", "I");
    b.add_method(
        ACC_STATIC,
        "<clinit>",
        "()V",
        2,
        0,
        vec![
            0xb2, hi(ax_in_b), lo(ax_in_b), // getstatic A.x
            0x04, // iconst_1
            0x60, // iadd
            0xb3, hi(by_in_b), lo(by_in_b), // putstatic B.y
            0xb1, // return
        ],
    );

    let mut main = ClassBuilder::new("Main", "java/lang/Object");
    main.add_field(ACC_STATIC, "result", "I");
    let result = main.field_ref("Main", "result", "I");
    let by = main.field_ref("B", "y", "I");
    main.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        2,
        1,
        vec![
            0xb2, hi(by), lo(by), // getstatic B.y (triggers B then A init)
            0xb2, hi(by), lo(by), // second access must not rerun <clinit>
            0x60, // iadd
            0xb3, hi(result), lo(result), // putstatic result = 16
            0xb1, // return
        ],
    );

    let clock = FakeClock::new();
    let vm = vm_with_classes(
        vec![("A", a.build()), ("B", b.build()), ("Main", main.build())],
        clock.clone(),
    );
    vm.launch_main("Main", &[]).unwrap();
    run_to_completion(&vm, &clock);

    assert_eq!(static_int(&vm, "A", "x"), Some(7));
    assert_eq!(static_int(&vm, "B", "y"), Some(8));
    assert_eq!(static_int(&vm, "Main", "result"), Some(16));

    // both classes settled in the initialised state
    use cldc_runtime::rt::InitState;
    let interner = vm.interner();
    let ma = vm.method_area_read();
    for name in ["A", "B"] {
        let id = ma.lookup(interner.get_or_intern(name)).unwrap();
        assert_eq!(ma.get_class(&id).init_state(), InitState::Initialized);
    }
}

#[test]
fn two_sleeping_threads_finish_after_the_deadline() {
    // class T extends Thread { static int done; void run() { sleep(50); done++; } }
    let mut t = ClassBuilder::new("T", "java/lang/Thread");
    t.add_field(ACC_STATIC, "done", "I");
    let millis = t.long(50);
    let sleep = t.method_ref("java/lang/Thread", "sleep", "(J)V");
    let done = t.field_ref("T", "done", "I");
    t.add_method(
        ACC_PUBLIC,
        "run",
        "()V",
        3,
        1,
        vec![
            0x14, hi(millis), lo(millis), // ldc2_w 50L
            0xb8, hi(sleep), lo(sleep), // invokestatic Thread.sleep(J)V
            0xb2, hi(done), lo(done), // getstatic done
            0x04, // iconst_1
            0x60, // iadd
            0xb3, hi(done), lo(done), // putstatic done
            0xb1, // return
        ],
    );

    let mut main = ClassBuilder::new("Main", "java/lang/Object");
    let t_class = main.class("T");
    let start = main.method_ref("java/lang/Thread", "start", "()V");
    main.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        1,
        1,
        vec![
            0xbb, hi(t_class), lo(t_class), // new T
            0xb6, hi(start), lo(start), // invokevirtual start
            0xbb, hi(t_class), lo(t_class), // new T
            0xb6, hi(start), lo(start), // invokevirtual start
            0xb1, // return
        ],
    );

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("T", t.build()), ("Main", main.build())], clock.clone());
    vm.launch_main("Main", &[]).unwrap();
    run_to_completion(&vm, &clock);

    use cldc_runtime::vm::Clock;
    assert_eq!(static_int(&vm, "T", "done"), Some(2));
    // neither thread can have finished before its 50ms deadline elapsed
    assert!(clock.now_millis() >= 50);
}

#[test]
fn ldc_string_materialises_char_array_and_count() {
    let mut main = ClassBuilder::new("Main", "java/lang/Object");
    main.add_field(ACC_STATIC, "s", "Ljava/lang/String;");
    let s_field = main.field_ref("Main", "s", "Ljava/lang/String;");
    let literal = main.string("abc");
    assert!(literal < 256, "ldc operand must fit one byte");
    main.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        1,
        1,
        vec![
            0x12, lo(literal), // ldc "abc"
            0xb3, hi(s_field), lo(s_field), // putstatic s
            0xb1, // return
        ],
    );

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("Main", main.build())], clock.clone());
    vm.launch_main("Main", &[]).unwrap();
    run_to_completion(&vm, &clock);

    let interner = vm.interner();
    let key = cldc_runtime::keys::FieldKey {
        name: interner.get_or_intern("s"),
        desc: interner.get_or_intern("Ljava/lang/String;"),
    };
    let (string_ref, string_class) = {
        let ma = vm.method_area_read();
        let main_id = ma.lookup(interner.get_or_intern("Main")).unwrap();
        let slot = ma.get_class(&main_id).static_slot(&key).unwrap();
        assert_ne!(slot, 0, "string literal was not materialised");
        ((slot - 1) as usize, vm.br.get_string_class_id().unwrap())
    };

    let heap = vm.heap_read();
    assert_eq!(heap.class_of(string_ref).unwrap(), Some(string_class));
    let value_offset = {
        let ma = vm.method_area_read();
        ma.get_class(&string_class).field_offset(&vm.br.string_value_fk).unwrap()
    };
    let array = match heap
        .read_field(string_ref, value_offset, cldc_runtime::heap::slot::SlotKind::Reference)
        .unwrap()
    {
        cldc_runtime::vm::Value::Ref(array) => array,
        other => panic!("value field holds {other:?}"),
    };
    assert_eq!(heap.char_array_units(array).unwrap(), vec![0x61, 0x62, 0x63]);

    let count_offset = {
        let ma = vm.method_area_read();
        ma.get_class(&string_class).field_offset(&vm.br.string_count_fk).unwrap()
    };
    assert_eq!(
        heap.read_field(string_ref, count_offset, cldc_runtime::heap::slot::SlotKind::Int)
            .unwrap(),
        cldc_runtime::vm::Value::Integer(3)
    );
}

#[test]
fn athrow_reaches_object_handler_with_same_reference() {
    let mut main = ClassBuilder::new("Main", "java/lang/Object");
    main.add_field(ACC_STATIC, "saved", "Ljava/lang/Object;");
    main.add_field(ACC_STATIC, "caught", "Ljava/lang/Object;");
    let saved = main.field_ref("Main", "saved", "Ljava/lang/Object;");
    let caught = main.field_ref("Main", "caught", "Ljava/lang/Object;");
    let ae_class = main.class("java/lang/ArithmeticException");
    let ae_init = main.method_ref("java/lang/ArithmeticException", "<init>", "()V");
    let object_class = main.class("java/lang/Object");
    main.add_method_with_handlers(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        3,
        1,
        vec![
            0xbb, hi(ae_class), lo(ae_class), // new ArithmeticException
            0x59, // dup
            0xb7, hi(ae_init), lo(ae_init), // invokespecial <init>()V
            0x59, // dup
            0xb3, hi(saved), lo(saved), // putstatic saved
            0xbf, // athrow
            0xb3, hi(caught), lo(caught), // pc 12: handler, exception on stack
            0xb1, // return
        ],
        vec![(0, 12, 12, object_class)],
    );

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("Main", main.build())], clock.clone());
    vm.launch_main("Main", &[]).unwrap();
    run_to_completion(&vm, &clock);

    let interner = vm.interner();
    let ma = vm.method_area_read();
    let main_id = ma.lookup(interner.get_or_intern("Main")).unwrap();
    let object_desc = interner.get_or_intern("Ljava/lang/Object;");
    let saved_key = cldc_runtime::keys::FieldKey {
        name: interner.get_or_intern("saved"),
        desc: object_desc,
    };
    let caught_key = cldc_runtime::keys::FieldKey {
        name: interner.get_or_intern("caught"),
        desc: object_desc,
    };
    let saved_slot = ma.get_class(&main_id).static_slot(&saved_key).unwrap();
    let caught_slot = ma.get_class(&main_id).static_slot(&caught_key).unwrap();
    assert_ne!(saved_slot, 0);
    assert_eq!(saved_slot, caught_slot);
}

#[test]
fn missing_native_binding_raises_catchable_unsatisfied_link_error() {
    let mut main = ClassBuilder::new("Main", "java/lang/Object");
    main.add_field(ACC_STATIC, "result", "I");
    main.add_native_method(ACC_PUBLIC | ACC_STATIC, "miss", "()V");
    let result = main.field_ref("Main", "result", "I");
    let miss = main.method_ref("Main", "miss", "()V");
    main.add_method_with_handlers(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        2,
        1,
        vec![
            0xb8, hi(miss), lo(miss), // invokestatic Main.miss()V
            0xb1, // return
            0x57, // pc 4: handler; pop exception
            0x04, // iconst_1
            0xb3, hi(result), lo(result), // putstatic result
            0xb1, // return
        ],
        vec![(0, 4, 4, 0)], // catch-any
    );

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("Main", main.build())], clock.clone());
    vm.launch_main("Main", &[]).unwrap();
    run_to_completion(&vm, &clock);

    assert_eq!(static_int(&vm, "Main", "result"), Some(1));
}

#[test]
fn unresolved_getstatic_pushes_descriptor_typed_zero() {
    let mut main = ClassBuilder::new("Main", "java/lang/Object");
    main.add_field(ACC_STATIC, "result", "I");
    let result = main.field_ref("Main", "result", "I");
    // no class declares ghost:J; the read must still produce a long zero
    let ghost = main.field_ref("Main", "ghost", "J");
    main.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        4,
        1,
        vec![
            0xb2, hi(ghost), lo(ghost), // getstatic Main.ghost (unresolved long)
            0x09, // lconst_0
            0x94, // lcmp
            0x9a, 0x00, 0x07, // ifne +7 -> pc 12
            0x04, // iconst_1
            0xb3, hi(result), lo(result), // putstatic result
            0xb1, // pc 12: return
        ],
    );

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("Main", main.build())], clock.clone());
    vm.launch_main("Main", &[]).unwrap();
    run_to_completion(&vm, &clock);

    assert_eq!(static_int(&vm, "Main", "result"), Some(1));
    assert_eq!(vm.exit_status(), 0);
}

#[test]
fn string_buffer_appends_through_natives() {
    // result = new StringBuffer().append("a").append(1).toString().length()
    let mut main = ClassBuilder::new("Main", "java/lang/Object");
    main.add_field(ACC_STATIC, "result", "I");
    let result = main.field_ref("Main", "result", "I");
    let sb = main.class("java/lang/StringBuffer");
    let sb_init = main.method_ref("java/lang/StringBuffer", "<init>", "()V");
    let append_s =
        main.method_ref("java/lang/StringBuffer", "append", "(Ljava/lang/String;)Ljava/lang/StringBuffer;");
    let append_i = main.method_ref("java/lang/StringBuffer", "append", "(I)Ljava/lang/StringBuffer;");
    let to_string = main.method_ref("java/lang/StringBuffer", "toString", "()Ljava/lang/String;");
    let length = main.method_ref("java/lang/String", "length", "()I");
    let literal = main.string("ab");
    assert!(literal < 256);
    main.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        3,
        1,
        vec![
            0xbb, hi(sb), lo(sb), // new StringBuffer
            0x59, // dup
            0xb7, hi(sb_init), lo(sb_init), // invokespecial <init>
            0x12, lo(literal), // ldc "ab"
            0xb6, hi(append_s), lo(append_s), // append(String)
            0x10, 0x2a, // bipush 42
            0xb6, hi(append_i), lo(append_i), // append(I)
            0xb6, hi(to_string), lo(to_string), // toString()
            0xb6, hi(length), lo(length), // length()
            0xb3, hi(result), lo(result), // putstatic result
            0xb1, // return
        ],
    );

    let clock = FakeClock::new();
    let vm = vm_with_classes(vec![("Main", main.build())], clock.clone());
    vm.launch_main("Main", &[]).unwrap();
    run_to_completion(&vm, &clock);

    // "ab" + "42" has four code units
    assert_eq!(static_int(&vm, "Main", "result"), Some(4));
}
