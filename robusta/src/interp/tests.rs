//! Frame-level interpreter tests: literal bytecode arrays executed either
//! one instruction at a time (inspecting the operand stack between steps)
//! or to completion through the full engine.

use std::sync::Arc;

use robusta_base::access_flags::{FieldAccessFlags, MethodAccessFlags};
use robusta_base::class::{ClData, ClInitCell, FieldRec, MethodRec};
use robusta_base::classfile::parser::{CodeAttribute, ExceptionTableEntry};
use robusta_base::classfile::constant_pool::{
    CPool, CpKind, CpSlot, MemberRef, NameAndType,
};
use robusta_base::opcode as b;
use robusta_base::ClassAccessFlags;

use crate::frame::{Frame, Locals};
use crate::jthread::JavaThread;
use crate::object::Object;
use crate::value::JvmValue;
use crate::{start_execution, Globals};

use super::{run_to_completion, step, OpOutcome};

/// Incremental constant-pool builder for synthetic test classes.
struct CpBuilder {
    cp: CPool,
}

impl CpBuilder {
    fn new() -> CpBuilder {
        let mut cp = CPool::default();
        cp.entries.push(CpSlot {
            kind: CpKind::Invalid,
            slot: 0,
        });
        CpBuilder { cp }
    }

    fn push(&mut self, kind: CpKind, slot: usize) -> u16 {
        self.cp.entries.push(CpSlot {
            kind,
            slot: slot as u16,
        });
        (self.cp.entries.len() - 1) as u16
    }

    fn utf8(&mut self, text: &str) -> u16 {
        self.cp.utf8s.push(text.to_owned());
        self.push(CpKind::Utf8, self.cp.utf8s.len() - 1)
    }

    fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.cp.class_refs.push(name_index);
        self.push(CpKind::ClassRef, self.cp.class_refs.len() - 1)
    }

    fn string(&mut self, text: &str) -> u16 {
        let utf8_index = self.utf8(text);
        self.cp.string_refs.push(utf8_index);
        self.push(CpKind::StringConst, self.cp.string_refs.len() - 1)
    }

    fn int(&mut self, value: i32) -> u16 {
        self.cp.int_consts.push(value);
        self.push(CpKind::IntegerConst, self.cp.int_consts.len() - 1)
    }

    fn nat(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.cp.name_and_types.push(NameAndType {
            name_index,
            descriptor_index,
        });
        self.push(CpKind::NameAndType, self.cp.name_and_types.len() - 1)
    }

    fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.nat(name, descriptor);
        self.cp.field_refs.push(MemberRef {
            class_index,
            name_and_type_index,
        });
        self.push(CpKind::FieldRef, self.cp.field_refs.len() - 1)
    }

    fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.nat(name, descriptor);
        self.cp.method_refs.push(MemberRef {
            class_index,
            name_and_type_index,
        });
        self.push(CpKind::MethodRef, self.cp.method_refs.len() - 1)
    }
}

fn method(name: &str, descriptor: &str, code: Vec<u8>) -> MethodRec {
    method_with_table(name, descriptor, code, Vec::new())
}

fn method_with_table(
    name: &str,
    descriptor: &str,
    code: Vec<u8>,
    exception_table: Vec<ExceptionTableEntry>,
) -> MethodRec {
    MethodRec {
        name: name.to_owned(),
        descriptor: descriptor.to_owned(),
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        code: Some(CodeAttribute {
            max_stack: 32,
            max_locals: 16,
            code,
            exception_table,
            attributes: Vec::new(),
        }),
        attributes: Vec::new(),
    }
}

/// Publish a synthetic class and return its record.
fn publish(
    globals: &Globals,
    name: &str,
    cp: CPool,
    fields: Vec<FieldRec>,
    methods: Vec<MethodRec>,
) -> Arc<ClData> {
    let record = ClData {
        name: globals.string_pool.intern(name),
        superclass: robusta_base::string_pool::OBJECT_NAME,
        interfaces: Vec::new(),
        fields,
        methods,
        attributes: Vec::new(),
        source_file: Some(format!("{name}.java")),
        cp,
        access_flags: ClassAccessFlags::PUBLIC,
        major_version: 61,
        clinit: ClInitCell::already_run(),
        trusted: true,
    };
    globals.method_area.insert(record)
}

fn frame_over(globals: &Globals, record: &Arc<ClData>, method_index: usize) -> Frame {
    let rec = &record.methods[method_index];
    Frame::new(
        record.name,
        globals.string_pool.intern(&rec.name),
        rec.descriptor.clone(),
        Arc::clone(record),
        method_index,
        Locals::new(rec.code.as_ref().map_or(0, |c| c.max_locals)),
        1,
    )
}

/// A thread whose only frame runs the given raw bytecode.
fn thread_with_code(code: Vec<u8>) -> JavaThread {
    let mut thread = JavaThread::new(1);
    thread.frames.push(Frame::with_code(code)).unwrap();
    thread
}

fn top_frame(thread: &mut JavaThread) -> &mut Frame {
    thread.frames.current_mut().expect("frame present")
}

// ---- stepwise opcode behavior ----

#[test]
fn pop_then_swap_matches_stack_discipline() {
    let globals = Globals::test_instance();
    let mut thread = thread_with_code(vec![b::POP, b::SWAP]);

    {
        let f = top_frame(&mut thread);
        f.stack.push(JvmValue::Int(34)).unwrap();
        f.stack.push(JvmValue::Int(21)).unwrap();
        f.stack.push(JvmValue::Int(0)).unwrap();
    }

    assert!(matches!(
        step(&globals, &mut thread).unwrap(),
        OpOutcome::Continue
    ));
    {
        let f = top_frame(&mut thread);
        assert_eq!(f.stack.tos(), 1);
        assert_eq!(f.stack.peek().unwrap(), JvmValue::Int(21));
    }

    step(&globals, &mut thread).unwrap();
    let f = top_frame(&mut thread);
    assert_eq!(f.stack.pop().unwrap(), JvmValue::Int(34));
    assert_eq!(f.stack.pop().unwrap(), JvmValue::Int(21));
}

#[test]
fn long_shift_and_bit_ops() {
    let cases: &[(u8, i64, i64, i64)] = &[
        (b::LSHL, 22, 3, 176),
        (b::LSHR, 200, 3, 25),
        (b::LUSHR, 200, 3, 25),
        (b::LXOR, 21, 22, 3),
        (b::LOR, 21, 22, 23),
    ];

    for (op, a, bb, expected) in cases {
        let globals = Globals::test_instance();
        let mut thread = thread_with_code(vec![*op]);
        {
            let f = top_frame(&mut thread);
            f.stack.push(JvmValue::Long(*a)).unwrap();
            if matches!(*op, b::LSHL | b::LSHR | b::LUSHR) {
                f.stack.push(JvmValue::Int(*bb)).unwrap();
            } else {
                f.stack.push(JvmValue::Long(*bb)).unwrap();
            }
        }
        step(&globals, &mut thread).unwrap();
        let f = top_frame(&mut thread);
        assert_eq!(
            f.stack.pop().unwrap(),
            JvmValue::Long(*expected),
            "opcode 0x{op:02x}"
        );
    }
}

#[test]
fn lload_pushes_and_advances_pc() {
    let globals = Globals::test_instance();
    let mut thread = thread_with_code(vec![b::LLOAD, 0x04]);
    {
        let f = top_frame(&mut thread);
        f.locals.store(4, JvmValue::Long(0x0123_4562));
    }

    step(&globals, &mut thread).unwrap();
    let f = top_frame(&mut thread);
    assert_eq!(f.stack.pop().unwrap(), JvmValue::Long(0x0123_4562));
    assert_eq!(f.stack.tos(), -1);
    assert_eq!(f.pc, 2);
}

#[test]
fn int_arithmetic_wraps_mod_2_pow_32() {
    let globals = Globals::test_instance();
    let mut thread = thread_with_code(vec![b::IADD, b::ISUB]);
    {
        let f = top_frame(&mut thread);
        f.stack.push(JvmValue::Int(i64::from(i32::MAX))).unwrap();
        f.stack.push(JvmValue::Int(1)).unwrap();
    }

    step(&globals, &mut thread).unwrap();
    {
        let f = top_frame(&mut thread);
        assert_eq!(f.stack.peek().unwrap(), JvmValue::Int(i64::from(i32::MIN)));
        f.stack.push(JvmValue::Int(1)).unwrap();
    }

    // IADD then ISUB with the same operand is the identity mod 2^32.
    step(&globals, &mut thread).unwrap();
    let f = top_frame(&mut thread);
    assert_eq!(f.stack.pop().unwrap(), JvmValue::Int(i64::from(i32::MAX)));
}

#[test]
fn bipush_and_sipush_sign_extend() {
    let globals = Globals::test_instance();
    let mut thread = thread_with_code(vec![b::BIPUSH, 0xf6, b::SIPUSH, 0xff, 0x00]);

    step(&globals, &mut thread).unwrap();
    step(&globals, &mut thread).unwrap();
    let f = top_frame(&mut thread);
    assert_eq!(f.stack.pop().unwrap(), JvmValue::Int(-256));
    assert_eq!(f.stack.pop().unwrap(), JvmValue::Int(-10));
}

#[test]
fn float_to_int_truncates_and_saturates() {
    for (input, expected) in [
        (2.9_f64, 2_i64),
        (-2.9, -2),
        (f64::NAN, 0),
        (1e12, i64::from(i32::MAX)),
        (-1e12, i64::from(i32::MIN)),
    ] {
        let globals = Globals::test_instance();
        let mut thread = thread_with_code(vec![b::F2I]);
        top_frame(&mut thread)
            .stack
            .push(JvmValue::Float(input))
            .unwrap();
        step(&globals, &mut thread).unwrap();
        assert_eq!(
            top_frame(&mut thread).stack.pop().unwrap(),
            JvmValue::Int(expected),
            "F2I({input})"
        );
    }
}

#[test]
fn floating_compare_handles_nan_by_variant() {
    let globals = Globals::test_instance();
    let mut thread = thread_with_code(vec![b::FCMPL, b::FCMPG]);
    {
        let f = top_frame(&mut thread);
        f.stack.push(JvmValue::Float(f64::NAN)).unwrap();
        f.stack.push(JvmValue::Float(1.0)).unwrap();
    }
    step(&globals, &mut thread).unwrap();
    {
        let f = top_frame(&mut thread);
        assert_eq!(f.stack.pop().unwrap(), JvmValue::Int(-1));
        f.stack.push(JvmValue::Float(f64::NAN)).unwrap();
        f.stack.push(JvmValue::Float(1.0)).unwrap();
    }
    step(&globals, &mut thread).unwrap();
    assert_eq!(
        top_frame(&mut thread).stack.pop().unwrap(),
        JvmValue::Int(1)
    );
}

#[test]
fn wide_prefix_doubles_index_width() {
    let globals = Globals::test_instance();
    let mut thread = thread_with_code(vec![b::WIDE, b::ILOAD, 0x00, 0x05]);
    {
        let f = top_frame(&mut thread);
        f.locals.store(5, JvmValue::Int(99));
    }
    step(&globals, &mut thread).unwrap();
    let f = top_frame(&mut thread);
    assert_eq!(f.stack.pop().unwrap(), JvmValue::Int(99));
    assert_eq!(f.pc, 4);
}

#[test]
fn jsr_pushes_return_address_for_ret() {
    let globals = Globals::test_instance();
    // 0: JSR +4 (-> 4)   3: NOP   4: ASTORE_1   5: RET 1
    let mut thread = thread_with_code(vec![b::JSR, 0x00, 0x04, b::NOP, b::ASTORE_1, b::RET, 0x01]);

    step(&globals, &mut thread).unwrap();
    assert_eq!(top_frame(&mut thread).pc, 4);
    step(&globals, &mut thread).unwrap();
    step(&globals, &mut thread).unwrap();
    // RET jumps back to the instruction after the JSR.
    assert_eq!(top_frame(&mut thread).pc, 3);
}

#[test]
fn tableswitch_selects_by_index() {
    // pc0: TABLESWITCH, pad to 4, default=+26, low=1, high=2,
    // offsets: +24 (case 1), +25 (case 2); targets are NOPs before a RETURN.
    let mut code = vec![b::TABLESWITCH, 0, 0, 0];
    code.extend_from_slice(&26i32.to_be_bytes());
    code.extend_from_slice(&1i32.to_be_bytes());
    code.extend_from_slice(&2i32.to_be_bytes());
    code.extend_from_slice(&24i32.to_be_bytes());
    code.extend_from_slice(&25i32.to_be_bytes());
    code.extend_from_slice(&[b::NOP, b::NOP, b::RETURN]);

    for (input, target) in [(1i64, 24usize), (2, 25), (7, 26)] {
        let globals = Globals::test_instance();
        let mut thread = thread_with_code(code.clone());
        top_frame(&mut thread)
            .stack
            .push(JvmValue::Int(input))
            .unwrap();
        step(&globals, &mut thread).unwrap();
        assert_eq!(top_frame(&mut thread).pc, target, "switch on {input}");
    }
}

#[test]
fn monitor_ops_pop_and_continue() {
    let globals = Globals::test_instance();
    let obj = globals.heap.write().alloc(Object::new_empty());
    let mut thread = thread_with_code(vec![b::MONITORENTER, b::MONITOREXIT]);
    {
        let f = top_frame(&mut thread);
        f.stack.push(JvmValue::Ref(obj)).unwrap();
        f.stack.push(JvmValue::Ref(obj)).unwrap();
    }
    step(&globals, &mut thread).unwrap();
    step(&globals, &mut thread).unwrap();
    assert_eq!(top_frame(&mut thread).stack.tos(), -1);
}

#[test]
fn unknown_opcode_is_fatal() {
    let globals = Globals::test_instance();
    let mut thread = thread_with_code(vec![0xfd]);
    let err = run_to_completion(&globals, &mut thread, 0).unwrap_err();
    assert!(matches!(
        err,
        crate::GeneralError::Fatal(crate::FatalError::UnknownOpcode { opcode: 0xfd, .. })
    ));
    assert!(globals.captured_err().contains("unknown opcode"));
}

// ---- whole-method runs through the engine ----

#[test]
fn ldc_preserves_extreme_int_constants() {
    for value in [i32::MAX, i32::MIN, -1, 0] {
        let globals = Globals::test_instance();
        let mut cp = CpBuilder::new();
        let index = cp.int(value);
        assert!(index < 256);

        let record = publish(
            &globals,
            "LdcProbe",
            cp.cp,
            Vec::new(),
            vec![method("main", "()V", vec![b::LDC, index as u8])],
        );
        let mut thread = JavaThread::new(1);
        thread.frames.push(frame_over(&globals, &record, 0)).unwrap();

        step(&globals, &mut thread).unwrap();
        assert_eq!(
            top_frame(&mut thread).stack.pop().unwrap(),
            JvmValue::Int(i64::from(value))
        );
    }
}

#[test]
fn division_by_zero_reports_to_error_stream() {
    // n = 6; x = 0; y = n / x;
    let globals = Globals::test_instance();
    let code = vec![
        b::BIPUSH, 6,      // n
        b::ISTORE_1,
        b::ICONST_0,       // x
        b::ISTORE_2,
        b::ILOAD_1,
        b::ILOAD_2,
        b::IDIV,
        b::ISTORE_3,
        b::RETURN,
    ];
    let record = publish(
        &globals,
        "ThrowIdivProbe",
        CpBuilder::new().cp,
        Vec::new(),
        vec![method("main", "()V", code)],
    );
    let mut thread = JavaThread::new(1);
    thread.frames.push(frame_over(&globals, &record, 0)).unwrap();

    let result = run_to_completion(&globals, &mut thread, 0);
    assert!(matches!(result, Err(crate::GeneralError::UncaughtException)));

    let report = globals.captured_err();
    assert!(
        report.contains("IDIV or LDIV: division by zero"),
        "unexpected report: {report}"
    );
    assert!(report.contains("java.lang.ArithmeticException"));
}

#[test]
fn arithmetic_exception_can_be_caught_in_frame() {
    // try { 5 / 0 } catch (ArithmeticException e) { pop; } -- handler at 4.
    let globals = Globals::test_instance();
    let mut cp = CpBuilder::new();
    let caught = cp.class("java/lang/ArithmeticException");

    let code = vec![
        b::ICONST_5,
        b::ICONST_0,
        b::IDIV,
        b::RETURN,
        b::POP, // handler: discard the throwable
        b::RETURN,
    ];
    let record = publish(
        &globals,
        "CatchProbe",
        cp.cp,
        Vec::new(),
        vec![method_with_table(
            "main",
            "()V",
            code,
            vec![ExceptionTableEntry {
                start_pc: 0,
                end_pc: 4,
                handler_pc: 4,
                catch_type: caught,
            }],
        )],
    );
    let mut thread = JavaThread::new(1);
    thread.frames.push(frame_over(&globals, &record, 0)).unwrap();

    run_to_completion(&globals, &mut thread, 0).unwrap();
    assert_eq!(globals.captured_err(), "");
}

#[test]
fn hello_loop_prints_ten_lines() {
    // i = 0; while (i < 10) { System.out.println("Hello from Hello.main!"); i++; }
    let globals = Globals::test_instance();
    let mut cp = CpBuilder::new();
    let out_ref = cp.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let hello = cp.string("Hello from Hello.main!");
    let println = cp.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    assert!(hello < 256);

    let code = vec![
        b::ICONST_0,                                        // 0
        b::ISTORE_1,                                        // 1
        b::ILOAD_1,                                         // 2
        b::BIPUSH, 10,                                      // 3
        b::IF_ICMPGE, 0x00, 17,                             // 5 -> 22
        b::GETSTATIC, (out_ref >> 8) as u8, out_ref as u8,  // 8
        b::LDC, hello as u8,                                // 11
        b::INVOKEVIRTUAL, (println >> 8) as u8, println as u8, // 13
        b::IINC, 1, 1,                                      // 16
        b::GOTO, 0xff, (-17i8) as u8,                       // 19 -> 2
        b::RETURN,                                          // 22
    ];
    let record = publish(
        &globals,
        "Hello",
        cp.cp,
        Vec::new(),
        vec![method("main", "()V", code)],
    );
    let mut thread = JavaThread::new(1);
    thread.frames.push(frame_over(&globals, &record, 0)).unwrap();

    run_to_completion(&globals, &mut thread, 0).unwrap();

    let out = globals.captured_out();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 10);
    assert!(lines.iter().all(|l| *l == "Hello from Hello.main!"));
    assert_eq!(globals.captured_err(), "");
}

#[test]
fn invokestatic_runs_callee_and_returns_value() {
    // main: push 3, 4; call add(II)I; store result in a static; return.
    let globals = Globals::test_instance();
    let mut cp = CpBuilder::new();
    let add = cp.method_ref("InvokeProbe", "add", "(II)I");
    let result = cp.field_ref("InvokeProbe", "result", "I");

    let main_code = vec![
        b::ICONST_3,
        b::ICONST_4,
        b::INVOKESTATIC, (add >> 8) as u8, add as u8,
        b::PUTSTATIC, (result >> 8) as u8, result as u8,
        b::RETURN,
    ];
    let add_code = vec![b::ILOAD_0, b::ILOAD_1, b::IADD, b::IRETURN];

    let record = publish(
        &globals,
        "InvokeProbe",
        cp.cp,
        vec![FieldRec {
            name: "result".to_owned(),
            descriptor: "I".to_owned(),
            access_flags: FieldAccessFlags::STATIC,
            constant_value: None,
        }],
        vec![
            method("main", "()V", main_code),
            method("add", "(II)I", add_code),
        ],
    );
    let mut thread = JavaThread::new(1);
    thread.frames.push(frame_over(&globals, &record, 0)).unwrap();

    run_to_completion(&globals, &mut thread, 0).unwrap();
    assert_eq!(
        globals.statics.get("InvokeProbe", "result"),
        Some(JvmValue::Int(7))
    );
}

#[test]
fn checkcast_accepts_arrays_as_object_and_rejects_mismatches() {
    let globals = Globals::test_instance();
    let mut cp = CpBuilder::new();
    let object = cp.class("java/lang/Object");
    let string = cp.class("java/lang/String");

    let array_ref = {
        let mut heap = globals.heap.write();
        heap.alloc(Object::new_ref_array(
            &globals.string_pool,
            "java/lang/Integer",
            1,
        ))
    };

    // CHECKCAST against Object succeeds.
    let record = publish(
        &globals,
        "CastProbe",
        cp.cp,
        Vec::new(),
        vec![method(
            "main",
            "()V",
            vec![
                b::CHECKCAST, (object >> 8) as u8, object as u8,
                b::CHECKCAST, (string >> 8) as u8, string as u8,
            ],
        )],
    );
    let mut thread = JavaThread::new(1);
    thread.frames.push(frame_over(&globals, &record, 0)).unwrap();
    top_frame(&mut thread)
        .stack
        .push(JvmValue::Ref(array_ref))
        .unwrap();

    assert!(matches!(
        step(&globals, &mut thread).unwrap(),
        OpOutcome::Continue
    ));
    // Against an unrelated class it raises ClassCastException.
    match step(&globals, &mut thread).unwrap() {
        OpOutcome::Throw { class, .. } => {
            assert_eq!(class, "java/lang/ClassCastException");
        }
        _ => panic!("expected a class-cast failure"),
    }
}

#[test]
fn instanceof_null_is_zero() {
    let globals = Globals::test_instance();
    let mut cp = CpBuilder::new();
    let string = cp.class("java/lang/String");

    let record = publish(
        &globals,
        "InstanceProbe",
        cp.cp,
        Vec::new(),
        vec![method(
            "main",
            "()V",
            vec![b::ACONST_NULL, b::INSTANCEOF, (string >> 8) as u8, string as u8],
        )],
    );
    let mut thread = JavaThread::new(1);
    thread.frames.push(frame_over(&globals, &record, 0)).unwrap();

    step(&globals, &mut thread).unwrap();
    step(&globals, &mut thread).unwrap();
    assert_eq!(
        top_frame(&mut thread).stack.pop().unwrap(),
        JvmValue::Int(0)
    );
}

#[test]
fn array_cycle_allocate_store_load() {
    let globals = Globals::test_instance();
    let code = vec![
        b::BIPUSH, 5,
        b::NEWARRAY, 10, // int[]
        b::ASTORE_1,
        b::ALOAD_1,
        b::ICONST_2,      // index
        b::BIPUSH, 42,    // value
        b::IASTORE,
        b::ALOAD_1,
        b::ICONST_2,
        b::IALOAD,
        b::ALOAD_1,
        b::ARRAYLENGTH,
        b::RETURN,
    ];
    let mut thread = thread_with_code(code);

    for _ in 0..12 {
        step(&globals, &mut thread).unwrap();
    }
    let f = top_frame(&mut thread);
    assert_eq!(f.stack.pop().unwrap(), JvmValue::Int(5));
    assert_eq!(f.stack.pop().unwrap(), JvmValue::Int(42));
}

#[test]
fn array_bounds_violation_raises() {
    let globals = Globals::test_instance();
    let mut thread = thread_with_code(vec![b::BIPUSH, 2, b::NEWARRAY, 10, b::ICONST_5, b::IALOAD]);

    for _ in 0..3 {
        step(&globals, &mut thread).unwrap();
    }
    match step(&globals, &mut thread).unwrap() {
        OpOutcome::Throw { class, message } => {
            assert_eq!(class, "java/lang/ArrayIndexOutOfBoundsException");
            assert!(message.contains("Index 5 out of bounds for length 2"));
        }
        _ => panic!("expected bounds failure"),
    }
}

#[test]
fn putfield_on_static_field_is_a_linkage_error() {
    let globals = Globals::test_instance();
    let mut cp = CpBuilder::new();
    let field = cp.field_ref("MismatchProbe", "counter", "I");

    let record = publish(
        &globals,
        "MismatchProbe",
        cp.cp,
        vec![FieldRec {
            name: "counter".to_owned(),
            descriptor: "I".to_owned(),
            access_flags: FieldAccessFlags::STATIC,
            constant_value: None,
        }],
        vec![method(
            "main",
            "()V",
            vec![
                b::ACONST_NULL,
                b::ICONST_1,
                b::PUTFIELD, (field >> 8) as u8, field as u8,
            ],
        )],
    );
    let mut thread = JavaThread::new(1);
    thread.frames.push(frame_over(&globals, &record, 0)).unwrap();

    step(&globals, &mut thread).unwrap();
    step(&globals, &mut thread).unwrap();
    match step(&globals, &mut thread) {
        Err(crate::GeneralError::Vm(crate::VmError::IncompatibleClassChange(msg))) => {
            assert!(msg.contains("PUTFIELD on static field"), "message: {msg}");
        }
        other => panic!("expected a linkage error, got {other:?}"),
    }
}

#[test]
fn start_execution_runs_a_published_main() {
    let globals = Globals::test_instance();
    let record = publish(
        &globals,
        "EntryProbe",
        CpBuilder::new().cp,
        Vec::new(),
        vec![method("main", "([Ljava/lang/String;)V", vec![b::RETURN])],
    );
    let _ = record;

    let mut thread = JavaThread::new(globals.threads.register());
    let exit = start_execution("EntryProbe", &mut thread, &globals).unwrap();
    assert_eq!(exit, 0);
}

#[test]
fn start_execution_without_main_is_an_error() {
    let globals = Globals::test_instance();
    publish(
        &globals,
        "NoMainProbe",
        CpBuilder::new().cp,
        Vec::new(),
        vec![method("notMain", "()V", vec![b::RETURN])],
    );

    let mut thread = JavaThread::new(globals.threads.register());
    assert!(matches!(
        start_execution("NoMainProbe", &mut thread, &globals),
        Err(crate::GeneralError::Vm(crate::VmError::NoSuchMethod { .. }))
    ));
}
