//! The bytecode interpreter: one fetch-decode-execute loop per Java thread,
//! dispatching on the opcode byte.
//!
//! Most instruction families are handled inline in [`execute`]; the ones
//! that touch the resolver, the heap, or the frame stack live in the
//! `arrays`, `objects`, and `invoke` submodules. Each handler advances the
//! PC itself; invokes leave the PC on the invoke instruction (so exception
//! tables match mid-call) and record the width to advance by on return.

use std::io::Write;

use robusta_base::opcode;

use crate::exceptions::{self, UnwindOutcome};
use crate::frame::Frame;
use crate::heap::ObjRef;
use crate::jthread::JavaThread;
use crate::trace::TraceLevel;
use crate::value::JvmValue;
use crate::{FatalError, GeneralError, Globals};

mod arrays;
mod invoke;
mod objects;

/// What one instruction did to control flow.
#[derive(Debug)]
pub(crate) enum OpOutcome {
    /// PC already advanced; keep going.
    Continue,
    /// Push this frame and continue in the callee.
    Call(Frame),
    /// Pop the current frame, handing the value (if any) to the caller.
    Return(Option<JvmValue>),
    /// Raise a named Java exception with a message.
    Throw { class: String, message: String },
    /// Re-raise an existing throwable (ATHROW).
    ThrowRef(ObjRef),
}

/// Execute frames on `thread` until its stack shrinks back to
/// `base_depth`. Entered once per thread, and re-entered for `<clinit>`.
pub fn run_to_completion(
    globals: &Globals,
    thread: &mut JavaThread,
    base_depth: usize,
) -> Result<(), GeneralError> {
    while thread.frames.depth() > base_depth {
        match step(globals, thread) {
            Ok(OpOutcome::Continue) => {}
            Ok(OpOutcome::Call(frame)) => {
                if let Err(fatal) = thread.frames.push(frame) {
                    return fail_fatal(globals, thread, fatal);
                }
            }
            Ok(OpOutcome::Return(value)) => {
                thread.frames.pop();
                if thread.frames.depth() > base_depth {
                    let caller = thread
                        .frames
                        .current_mut()
                        .expect("depth was checked above");
                    caller.pc += caller.return_pc_advance;
                    caller.return_pc_advance = 0;
                    if let Some(value) = value {
                        if let Err(fatal) = caller.stack.push(value) {
                            return fail_fatal(globals, thread, fatal);
                        }
                    }
                }
            }
            Ok(OpOutcome::Throw { class, message }) => {
                let throwable = exceptions::build_throwable(globals, &class, &message);
                unwind(globals, thread, throwable, base_depth)?;
            }
            Ok(OpOutcome::ThrowRef(throwable)) => {
                unwind(globals, thread, throwable, base_depth)?;
            }
            // Linking errors become Java throwables while frames are active.
            Err(GeneralError::Vm(vm)) => {
                let class = vm.java_class().to_owned();
                let message = vm.to_string();
                let throwable = exceptions::build_throwable(globals, &class, &message);
                unwind(globals, thread, throwable, base_depth)?;
            }
            Err(GeneralError::Fatal(fatal)) => return fail_fatal(globals, thread, fatal),
            Err(other) => return Err(other),
        }
    }
    Ok(())
}

fn unwind(
    globals: &Globals,
    thread: &mut JavaThread,
    throwable: ObjRef,
    base_depth: usize,
) -> Result<(), GeneralError> {
    match exceptions::dispatch(globals, thread, throwable, base_depth)? {
        UnwindOutcome::Handled => Ok(()),
        UnwindOutcome::Unhandled => Err(GeneralError::UncaughtException),
    }
}

/// Fatal faults are not throwable: write the diagnostic and kill the thread.
fn fail_fatal(
    globals: &Globals,
    thread: &JavaThread,
    fatal: FatalError,
) -> Result<(), GeneralError> {
    let location = thread.frames.current().map_or_else(
        || "<no frame>".to_owned(),
        |frame| {
            format!(
                "{}.{} pc={}",
                globals.string_pool.tpath(frame.class),
                globals.string_pool.tpath(frame.method),
                frame.pc
            )
        },
    );
    let mut err = globals.err.lock();
    let _ = writeln!(
        err,
        "fatal interpreter error in thread {}: {fatal} at {location}",
        thread.id
    );
    let _ = err.flush();
    Err(GeneralError::Fatal(fatal))
}

/// Decode and execute the instruction at the current frame's PC.
fn step(globals: &Globals, thread: &mut JavaThread) -> Result<OpOutcome, GeneralError> {
    let op = {
        let frame = thread
            .frames
            .current()
            .ok_or(FatalError::FrameStackEmpty)?;
        let pc = frame.pc;
        let op = *frame
            .bytecode()
            .get(pc)
            .ok_or(FatalError::TruncatedInstruction { pc })?;

        if thread.trace_insts {
            globals.trace_sink.trace(
                TraceLevel::Inst,
                &format!(
                    "{}.{} ({pc}) {}",
                    globals.string_pool.tpath(frame.class),
                    globals.string_pool.tpath(frame.method),
                    opcode::name(op)
                ),
            );
        }
        op
    };

    execute(globals, thread, op)
}

pub(crate) fn cur(thread: &mut JavaThread) -> Result<&mut Frame, FatalError> {
    thread
        .frames
        .current_mut()
        .ok_or(FatalError::FrameStackEmpty)
}

pub(crate) fn fetch_u8(frame: &Frame, offset: usize) -> Result<u8, FatalError> {
    frame
        .bytecode()
        .get(frame.pc + offset)
        .copied()
        .ok_or(FatalError::TruncatedInstruction { pc: frame.pc })
}

pub(crate) fn fetch_i8(frame: &Frame, offset: usize) -> Result<i8, FatalError> {
    Ok(fetch_u8(frame, offset)? as i8)
}

pub(crate) fn fetch_u16(frame: &Frame, offset: usize) -> Result<u16, FatalError> {
    let hi = fetch_u8(frame, offset)?;
    let lo = fetch_u8(frame, offset + 1)?;
    Ok(u16::from_be_bytes([hi, lo]))
}

pub(crate) fn fetch_i16(frame: &Frame, offset: usize) -> Result<i16, FatalError> {
    Ok(fetch_u16(frame, offset)? as i16)
}

pub(crate) fn fetch_i32(frame: &Frame, offset: usize) -> Result<i32, FatalError> {
    let bytes = [
        fetch_u8(frame, offset)?,
        fetch_u8(frame, offset + 1)?,
        fetch_u8(frame, offset + 2)?,
        fetch_u8(frame, offset + 3)?,
    ];
    Ok(i32::from_be_bytes(bytes))
}

/// Transfer control to `pc + offset`, checking the target stays inside the
/// method.
fn branch(frame: &mut Frame, offset: i64) -> Result<(), FatalError> {
    let target = frame.pc as i64 + offset;
    if target < 0 || target >= frame.bytecode().len() as i64 {
        return Err(FatalError::BadBranchTarget { pc: frame.pc });
    }
    frame.pc = target as usize;
    Ok(())
}

/// 32-bit wrapping integer view of an operand-stack int.
fn as_i32(v: i64) -> i32 {
    v as i32
}

/// 32-bit float view of an operand-stack float.
fn as_f32(v: f64) -> f32 {
    v as f32
}

fn push_i32(frame: &mut Frame, v: i32) -> Result<(), FatalError> {
    frame.stack.push(JvmValue::Int(i64::from(v)))
}

fn int_binop(
    frame: &mut Frame,
    op: impl FnOnce(i32, i32) -> i32,
) -> Result<OpOutcome, FatalError> {
    let b = as_i32(frame.stack.pop_int()?);
    let a = as_i32(frame.stack.pop_int()?);
    push_i32(frame, op(a, b))?;
    frame.pc += 1;
    Ok(OpOutcome::Continue)
}

fn long_binop(
    frame: &mut Frame,
    op: impl FnOnce(i64, i64) -> i64,
) -> Result<OpOutcome, FatalError> {
    let b = frame.stack.pop_long()?;
    let a = frame.stack.pop_long()?;
    frame.stack.push(JvmValue::Long(op(a, b)))?;
    frame.pc += 1;
    Ok(OpOutcome::Continue)
}

/// Float arithmetic rounds through f32, as the hosted program expects.
fn float_binop(
    frame: &mut Frame,
    op: impl FnOnce(f32, f32) -> f32,
) -> Result<OpOutcome, FatalError> {
    let b = as_f32(frame.stack.pop_float()?);
    let a = as_f32(frame.stack.pop_float()?);
    frame.stack.push(JvmValue::Float(f64::from(op(a, b))))?;
    frame.pc += 1;
    Ok(OpOutcome::Continue)
}

fn double_binop(
    frame: &mut Frame,
    op: impl FnOnce(f64, f64) -> f64,
) -> Result<OpOutcome, FatalError> {
    let b = frame.stack.pop_double()?;
    let a = frame.stack.pop_double()?;
    frame.stack.push(JvmValue::Double(op(a, b)))?;
    frame.pc += 1;
    Ok(OpOutcome::Continue)
}

fn if_int_branch(
    frame: &mut Frame,
    take: impl FnOnce(i32) -> bool,
) -> Result<OpOutcome, FatalError> {
    let offset = fetch_i16(frame, 1)?;
    let v = as_i32(frame.stack.pop_int()?);
    if take(v) {
        branch(frame, i64::from(offset))?;
    } else {
        frame.pc += 3;
    }
    Ok(OpOutcome::Continue)
}

fn if_icmp_branch(
    frame: &mut Frame,
    take: impl FnOnce(i32, i32) -> bool,
) -> Result<OpOutcome, FatalError> {
    let offset = fetch_i16(frame, 1)?;
    let b = as_i32(frame.stack.pop_int()?);
    let a = as_i32(frame.stack.pop_int()?);
    if take(a, b) {
        branch(frame, i64::from(offset))?;
    } else {
        frame.pc += 3;
    }
    Ok(OpOutcome::Continue)
}

fn load_local(frame: &mut Frame, index: u16, width: usize) -> Result<OpOutcome, FatalError> {
    let value = frame.locals.load(index)?;
    frame.stack.push(value)?;
    frame.pc += width;
    Ok(OpOutcome::Continue)
}

fn store_local(frame: &mut Frame, index: u16, width: usize) -> Result<OpOutcome, FatalError> {
    let value = frame.stack.pop()?;
    frame.locals.store(index, value);
    frame.pc += width;
    Ok(OpOutcome::Continue)
}

fn arithmetic_exception(message: &str) -> OpOutcome {
    OpOutcome::Throw {
        class: "java/lang/ArithmeticException".to_owned(),
        message: message.to_owned(),
    }
}

fn execute(
    globals: &Globals,
    thread: &mut JavaThread,
    op: u8,
) -> Result<OpOutcome, GeneralError> {
    use opcode as b;

    let outcome = match op {
        b::NOP | b::BREAKPOINT => {
            let f = cur(thread)?;
            f.pc += 1;
            OpOutcome::Continue
        }

        // ---- constants ----
        b::ACONST_NULL => {
            let f = cur(thread)?;
            f.stack.push(JvmValue::Null)?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::ICONST_M1..=b::ICONST_5 => {
            let f = cur(thread)?;
            let v = i64::from(op) - i64::from(b::ICONST_0);
            f.stack.push(JvmValue::Int(v))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::LCONST_0 | b::LCONST_1 => {
            let f = cur(thread)?;
            f.stack
                .push(JvmValue::Long(i64::from(op - b::LCONST_0)))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::FCONST_0 | b::FCONST_1 | b::FCONST_2 => {
            let f = cur(thread)?;
            f.stack
                .push(JvmValue::Float(f64::from(op - b::FCONST_0)))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::DCONST_0 | b::DCONST_1 => {
            let f = cur(thread)?;
            f.stack
                .push(JvmValue::Double(f64::from(op - b::DCONST_0)))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::BIPUSH => {
            let f = cur(thread)?;
            let v = fetch_i8(f, 1)?;
            f.stack.push(JvmValue::Int(i64::from(v)))?;
            f.pc += 2;
            OpOutcome::Continue
        }
        b::SIPUSH => {
            let f = cur(thread)?;
            let v = fetch_i16(f, 1)?;
            f.stack.push(JvmValue::Int(i64::from(v)))?;
            f.pc += 3;
            OpOutcome::Continue
        }
        b::LDC => objects::ldc(globals, thread, false)?,
        b::LDC_W => objects::ldc(globals, thread, true)?,
        b::LDC2_W => objects::ldc2_w(thread)?,

        // ---- loads ----
        b::ILOAD | b::LLOAD | b::FLOAD | b::DLOAD | b::ALOAD => {
            let f = cur(thread)?;
            let index = u16::from(fetch_u8(f, 1)?);
            load_local(f, index, 2)?
        }
        b::ILOAD_0..=b::ILOAD_3 => load_local(cur(thread)?, u16::from(op - b::ILOAD_0), 1)?,
        b::LLOAD_0..=b::LLOAD_3 => load_local(cur(thread)?, u16::from(op - b::LLOAD_0), 1)?,
        b::FLOAD_0..=b::FLOAD_3 => load_local(cur(thread)?, u16::from(op - b::FLOAD_0), 1)?,
        b::DLOAD_0..=b::DLOAD_3 => load_local(cur(thread)?, u16::from(op - b::DLOAD_0), 1)?,
        b::ALOAD_0..=b::ALOAD_3 => load_local(cur(thread)?, u16::from(op - b::ALOAD_0), 1)?,

        b::IALOAD | b::LALOAD | b::FALOAD | b::DALOAD | b::AALOAD | b::BALOAD | b::CALOAD
        | b::SALOAD => arrays::array_load(globals, thread, op)?,

        // ---- stores ----
        b::ISTORE | b::LSTORE | b::FSTORE | b::DSTORE | b::ASTORE => {
            let f = cur(thread)?;
            let index = u16::from(fetch_u8(f, 1)?);
            store_local(f, index, 2)?
        }
        b::ISTORE_0..=b::ISTORE_3 => store_local(cur(thread)?, u16::from(op - b::ISTORE_0), 1)?,
        b::LSTORE_0..=b::LSTORE_3 => store_local(cur(thread)?, u16::from(op - b::LSTORE_0), 1)?,
        b::FSTORE_0..=b::FSTORE_3 => store_local(cur(thread)?, u16::from(op - b::FSTORE_0), 1)?,
        b::DSTORE_0..=b::DSTORE_3 => store_local(cur(thread)?, u16::from(op - b::DSTORE_0), 1)?,
        b::ASTORE_0..=b::ASTORE_3 => store_local(cur(thread)?, u16::from(op - b::ASTORE_0), 1)?,

        b::IASTORE | b::LASTORE | b::FASTORE | b::DASTORE | b::AASTORE | b::BASTORE
        | b::CASTORE | b::SASTORE => arrays::array_store(globals, thread, op)?,

        // ---- operand-stack manipulation ----
        b::POP => {
            let f = cur(thread)?;
            f.stack.pop()?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::POP2 => {
            let f = cur(thread)?;
            let top = f.stack.pop()?;
            if !top.is_category_2() {
                f.stack.pop()?;
            }
            f.pc += 1;
            OpOutcome::Continue
        }
        b::DUP => {
            let f = cur(thread)?;
            let v = f.stack.peek()?;
            f.stack.push(v)?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::DUP_X1 => {
            let f = cur(thread)?;
            let v1 = f.stack.pop()?;
            let v2 = f.stack.pop()?;
            f.stack.push(v1)?;
            f.stack.push(v2)?;
            f.stack.push(v1)?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::DUP_X2 => {
            let f = cur(thread)?;
            let v1 = f.stack.pop()?;
            let v2 = f.stack.pop()?;
            if v2.is_category_2() {
                f.stack.push(v1)?;
                f.stack.push(v2)?;
                f.stack.push(v1)?;
            } else {
                let v3 = f.stack.pop()?;
                f.stack.push(v1)?;
                f.stack.push(v3)?;
                f.stack.push(v2)?;
                f.stack.push(v1)?;
            }
            f.pc += 1;
            OpOutcome::Continue
        }
        b::DUP2 => {
            let f = cur(thread)?;
            let v1 = f.stack.pop()?;
            if v1.is_category_2() {
                f.stack.push(v1)?;
                f.stack.push(v1)?;
            } else {
                let v2 = f.stack.pop()?;
                f.stack.push(v2)?;
                f.stack.push(v1)?;
                f.stack.push(v2)?;
                f.stack.push(v1)?;
            }
            f.pc += 1;
            OpOutcome::Continue
        }
        b::DUP2_X1 => {
            let f = cur(thread)?;
            let v1 = f.stack.pop()?;
            if v1.is_category_2() {
                let v2 = f.stack.pop()?;
                f.stack.push(v1)?;
                f.stack.push(v2)?;
                f.stack.push(v1)?;
            } else {
                let v2 = f.stack.pop()?;
                let v3 = f.stack.pop()?;
                f.stack.push(v2)?;
                f.stack.push(v1)?;
                f.stack.push(v3)?;
                f.stack.push(v2)?;
                f.stack.push(v1)?;
            }
            f.pc += 1;
            OpOutcome::Continue
        }
        b::DUP2_X2 => {
            let f = cur(thread)?;
            let v1 = f.stack.pop()?;
            if v1.is_category_2() {
                let v2 = f.stack.pop()?;
                if v2.is_category_2() {
                    f.stack.push(v1)?;
                    f.stack.push(v2)?;
                    f.stack.push(v1)?;
                } else {
                    let v3 = f.stack.pop()?;
                    f.stack.push(v1)?;
                    f.stack.push(v3)?;
                    f.stack.push(v2)?;
                    f.stack.push(v1)?;
                }
            } else {
                let v2 = f.stack.pop()?;
                let v3 = f.stack.pop()?;
                if v3.is_category_2() {
                    f.stack.push(v2)?;
                    f.stack.push(v1)?;
                    f.stack.push(v3)?;
                    f.stack.push(v2)?;
                    f.stack.push(v1)?;
                } else {
                    let v4 = f.stack.pop()?;
                    f.stack.push(v2)?;
                    f.stack.push(v1)?;
                    f.stack.push(v4)?;
                    f.stack.push(v3)?;
                    f.stack.push(v2)?;
                    f.stack.push(v1)?;
                }
            }
            f.pc += 1;
            OpOutcome::Continue
        }
        b::SWAP => {
            let f = cur(thread)?;
            let v1 = f.stack.pop()?;
            let v2 = f.stack.pop()?;
            f.stack.push(v1)?;
            f.stack.push(v2)?;
            f.pc += 1;
            OpOutcome::Continue
        }

        // ---- integer arithmetic ----
        b::IADD => int_binop(cur(thread)?, i32::wrapping_add)?,
        b::ISUB => int_binop(cur(thread)?, i32::wrapping_sub)?,
        b::IMUL => int_binop(cur(thread)?, i32::wrapping_mul)?,
        b::IDIV => {
            let f = cur(thread)?;
            let b_ = as_i32(f.stack.pop_int()?);
            let a = as_i32(f.stack.pop_int()?);
            if b_ == 0 {
                return Ok(arithmetic_exception("IDIV or LDIV: division by zero"));
            }
            push_i32(f, a.wrapping_div(b_))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::IREM => {
            let f = cur(thread)?;
            let b_ = as_i32(f.stack.pop_int()?);
            let a = as_i32(f.stack.pop_int()?);
            if b_ == 0 {
                return Ok(arithmetic_exception("IREM or LREM: division by zero"));
            }
            push_i32(f, a.wrapping_rem(b_))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::INEG => {
            let f = cur(thread)?;
            let v = as_i32(f.stack.pop_int()?);
            push_i32(f, v.wrapping_neg())?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::ISHL => int_binop(cur(thread)?, |a, s| a.wrapping_shl(s as u32 & 0x1f))?,
        b::ISHR => int_binop(cur(thread)?, |a, s| a.wrapping_shr(s as u32 & 0x1f))?,
        b::IUSHR => int_binop(cur(thread)?, |a, s| {
            ((a as u32) >> (s as u32 & 0x1f)) as i32
        })?,
        b::IAND => int_binop(cur(thread)?, |a, b_| a & b_)?,
        b::IOR => int_binop(cur(thread)?, |a, b_| a | b_)?,
        b::IXOR => int_binop(cur(thread)?, |a, b_| a ^ b_)?,

        // ---- long arithmetic ----
        b::LADD => long_binop(cur(thread)?, i64::wrapping_add)?,
        b::LSUB => long_binop(cur(thread)?, i64::wrapping_sub)?,
        b::LMUL => long_binop(cur(thread)?, i64::wrapping_mul)?,
        b::LDIV => {
            let f = cur(thread)?;
            let b_ = f.stack.pop_long()?;
            let a = f.stack.pop_long()?;
            if b_ == 0 {
                return Ok(arithmetic_exception("IDIV or LDIV: division by zero"));
            }
            f.stack.push(JvmValue::Long(a.wrapping_div(b_)))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::LREM => {
            let f = cur(thread)?;
            let b_ = f.stack.pop_long()?;
            let a = f.stack.pop_long()?;
            if b_ == 0 {
                return Ok(arithmetic_exception("IREM or LREM: division by zero"));
            }
            f.stack.push(JvmValue::Long(a.wrapping_rem(b_)))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::LNEG => {
            let f = cur(thread)?;
            let v = f.stack.pop_long()?;
            f.stack.push(JvmValue::Long(v.wrapping_neg()))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        // Long shifts take an int shift count.
        b::LSHL => {
            let f = cur(thread)?;
            let s = as_i32(f.stack.pop_int()?);
            let a = f.stack.pop_long()?;
            f.stack
                .push(JvmValue::Long(a.wrapping_shl(s as u32 & 0x3f)))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::LSHR => {
            let f = cur(thread)?;
            let s = as_i32(f.stack.pop_int()?);
            let a = f.stack.pop_long()?;
            f.stack
                .push(JvmValue::Long(a.wrapping_shr(s as u32 & 0x3f)))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::LUSHR => {
            let f = cur(thread)?;
            let s = as_i32(f.stack.pop_int()?);
            let a = f.stack.pop_long()?;
            f.stack
                .push(JvmValue::Long(((a as u64) >> (s as u32 & 0x3f)) as i64))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::LAND => long_binop(cur(thread)?, |a, b_| a & b_)?,
        b::LOR => long_binop(cur(thread)?, |a, b_| a | b_)?,
        b::LXOR => long_binop(cur(thread)?, |a, b_| a ^ b_)?,

        // ---- float/double arithmetic ----
        b::FADD => float_binop(cur(thread)?, |a, b_| a + b_)?,
        b::FSUB => float_binop(cur(thread)?, |a, b_| a - b_)?,
        b::FMUL => float_binop(cur(thread)?, |a, b_| a * b_)?,
        b::FDIV => float_binop(cur(thread)?, |a, b_| a / b_)?,
        // Java's floating % keeps the dividend's sign, like Rust's.
        b::FREM => float_binop(cur(thread)?, |a, b_| a % b_)?,
        b::FNEG => {
            let f = cur(thread)?;
            let v = f.stack.pop_float()?;
            f.stack.push(JvmValue::Float(-v))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::DADD => double_binop(cur(thread)?, |a, b_| a + b_)?,
        b::DSUB => double_binop(cur(thread)?, |a, b_| a - b_)?,
        b::DMUL => double_binop(cur(thread)?, |a, b_| a * b_)?,
        b::DDIV => double_binop(cur(thread)?, |a, b_| a / b_)?,
        b::DREM => double_binop(cur(thread)?, |a, b_| a % b_)?,
        b::DNEG => {
            let f = cur(thread)?;
            let v = f.stack.pop_double()?;
            f.stack.push(JvmValue::Double(-v))?;
            f.pc += 1;
            OpOutcome::Continue
        }

        // ---- iinc ----
        b::IINC => {
            let f = cur(thread)?;
            let index = u16::from(fetch_u8(f, 1)?);
            let delta = i32::from(fetch_i8(f, 2)?);
            let v = as_i32(
                f.locals
                    .load(index)?
                    .into_int()
                    .ok_or(FatalError::ExpectedLocalValue(index))?,
            );
            f.locals
                .store(index, JvmValue::Int(i64::from(v.wrapping_add(delta))));
            f.pc += 3;
            OpOutcome::Continue
        }

        // ---- conversions ----
        b::I2L => {
            let f = cur(thread)?;
            let v = as_i32(f.stack.pop_int()?);
            f.stack.push(JvmValue::Long(i64::from(v)))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::I2F => {
            let f = cur(thread)?;
            let v = as_i32(f.stack.pop_int()?);
            f.stack.push(JvmValue::Float(f64::from(v as f32)))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::I2D => {
            let f = cur(thread)?;
            let v = as_i32(f.stack.pop_int()?);
            f.stack.push(JvmValue::Double(f64::from(v)))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::L2I => {
            let f = cur(thread)?;
            let v = f.stack.pop_long()?;
            push_i32(f, as_i32(v))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::L2F => {
            let f = cur(thread)?;
            let v = f.stack.pop_long()?;
            f.stack.push(JvmValue::Float(f64::from(v as f32)))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::L2D => {
            let f = cur(thread)?;
            let v = f.stack.pop_long()?;
            f.stack.push(JvmValue::Double(v as f64))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        // Float-to-int truncates toward zero, NaN becomes 0, out-of-range
        // saturates; Rust's float casts share those semantics.
        b::F2I | b::D2I => {
            let f = cur(thread)?;
            let v = if op == b::F2I {
                f.stack.pop_float()?
            } else {
                f.stack.pop_double()?
            };
            push_i32(f, v as i32)?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::F2L | b::D2L => {
            let f = cur(thread)?;
            let v = if op == b::F2L {
                f.stack.pop_float()?
            } else {
                f.stack.pop_double()?
            };
            f.stack.push(JvmValue::Long(v as i64))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::F2D => {
            let f = cur(thread)?;
            let v = f.stack.pop_float()?;
            f.stack.push(JvmValue::Double(v))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::D2F => {
            let f = cur(thread)?;
            let v = f.stack.pop_double()?;
            f.stack.push(JvmValue::Float(f64::from(as_f32(v))))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::I2B => {
            let f = cur(thread)?;
            let v = as_i32(f.stack.pop_int()?);
            push_i32(f, i32::from(v as i8))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::I2C => {
            let f = cur(thread)?;
            let v = as_i32(f.stack.pop_int()?);
            push_i32(f, i32::from(v as u16))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::I2S => {
            let f = cur(thread)?;
            let v = as_i32(f.stack.pop_int()?);
            push_i32(f, i32::from(v as i16))?;
            f.pc += 1;
            OpOutcome::Continue
        }

        // ---- comparisons ----
        b::LCMP => {
            let f = cur(thread)?;
            let b_ = f.stack.pop_long()?;
            let a = f.stack.pop_long()?;
            push_i32(f, cmp_ordered(a, b_))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::FCMPL | b::FCMPG => {
            let f = cur(thread)?;
            let b_ = f.stack.pop_float()?;
            let a = f.stack.pop_float()?;
            push_i32(f, cmp_floating(a, b_, op == b::FCMPG))?;
            f.pc += 1;
            OpOutcome::Continue
        }
        b::DCMPL | b::DCMPG => {
            let f = cur(thread)?;
            let b_ = f.stack.pop_double()?;
            let a = f.stack.pop_double()?;
            push_i32(f, cmp_floating(a, b_, op == b::DCMPG))?;
            f.pc += 1;
            OpOutcome::Continue
        }

        // ---- branches ----
        b::IFEQ => if_int_branch(cur(thread)?, |v| v == 0)?,
        b::IFNE => if_int_branch(cur(thread)?, |v| v != 0)?,
        b::IFLT => if_int_branch(cur(thread)?, |v| v < 0)?,
        b::IFGE => if_int_branch(cur(thread)?, |v| v >= 0)?,
        b::IFGT => if_int_branch(cur(thread)?, |v| v > 0)?,
        b::IFLE => if_int_branch(cur(thread)?, |v| v <= 0)?,
        b::IF_ICMPEQ => if_icmp_branch(cur(thread)?, |a, b_| a == b_)?,
        b::IF_ICMPNE => if_icmp_branch(cur(thread)?, |a, b_| a != b_)?,
        b::IF_ICMPLT => if_icmp_branch(cur(thread)?, |a, b_| a < b_)?,
        b::IF_ICMPGE => if_icmp_branch(cur(thread)?, |a, b_| a >= b_)?,
        b::IF_ICMPGT => if_icmp_branch(cur(thread)?, |a, b_| a > b_)?,
        b::IF_ICMPLE => if_icmp_branch(cur(thread)?, |a, b_| a <= b_)?,
        b::IF_ACMPEQ | b::IF_ACMPNE => {
            let f = cur(thread)?;
            let offset = fetch_i16(f, 1)?;
            let b_ = f.stack.pop_ref()?;
            let a = f.stack.pop_ref()?;
            let equal = a == b_;
            if equal == (op == b::IF_ACMPEQ) {
                branch(f, i64::from(offset))?;
            } else {
                f.pc += 3;
            }
            OpOutcome::Continue
        }
        b::IFNULL | b::IFNONNULL => {
            let f = cur(thread)?;
            let offset = fetch_i16(f, 1)?;
            let is_null = f.stack.pop_ref()?.is_none();
            if is_null == (op == b::IFNULL) {
                branch(f, i64::from(offset))?;
            } else {
                f.pc += 3;
            }
            OpOutcome::Continue
        }
        b::GOTO => {
            let f = cur(thread)?;
            let offset = fetch_i16(f, 1)?;
            branch(f, i64::from(offset))?;
            OpOutcome::Continue
        }
        b::GOTO_W => {
            let f = cur(thread)?;
            let offset = fetch_i32(f, 1)?;
            branch(f, i64::from(offset))?;
            OpOutcome::Continue
        }
        b::JSR => {
            let f = cur(thread)?;
            let offset = fetch_i16(f, 1)?;
            f.stack.push(JvmValue::Int(f.pc as i64 + 3))?;
            branch(f, i64::from(offset))?;
            OpOutcome::Continue
        }
        b::JSR_W => {
            let f = cur(thread)?;
            let offset = fetch_i32(f, 1)?;
            f.stack.push(JvmValue::Int(f.pc as i64 + 5))?;
            branch(f, i64::from(offset))?;
            OpOutcome::Continue
        }
        b::RET => {
            let f = cur(thread)?;
            let index = u16::from(fetch_u8(f, 1)?);
            ret_to(f, index)?
        }

        b::TABLESWITCH => table_switch(cur(thread)?)?,
        b::LOOKUPSWITCH => lookup_switch(cur(thread)?)?,

        // ---- wide-prefixed forms ----
        b::WIDE => wide(cur(thread)?)?,

        // ---- arrays ----
        b::NEWARRAY => arrays::newarray(globals, thread)?,
        b::ANEWARRAY => arrays::anewarray(globals, thread)?,
        b::MULTIANEWARRAY => arrays::multianewarray(globals, thread)?,
        b::ARRAYLENGTH => arrays::arraylength(globals, thread)?,

        // ---- objects ----
        b::NEW => objects::new_object(globals, thread)?,
        b::GETSTATIC => objects::getstatic(globals, thread)?,
        b::PUTSTATIC => objects::putstatic(globals, thread)?,
        b::GETFIELD => objects::getfield(globals, thread)?,
        b::PUTFIELD => objects::putfield(globals, thread)?,
        b::CHECKCAST => objects::checkcast(globals, thread)?,
        b::INSTANCEOF => objects::instanceof(globals, thread)?,

        // ---- invocation ----
        b::INVOKEVIRTUAL => invoke::invokevirtual(globals, thread)?,
        b::INVOKESPECIAL => invoke::invokespecial(globals, thread)?,
        b::INVOKESTATIC => invoke::invokestatic(globals, thread)?,
        b::INVOKEINTERFACE => invoke::invokeinterface(globals, thread)?,
        b::INVOKEDYNAMIC => invoke::invokedynamic(globals, thread)?,

        // ---- monitors: pop the reference, locking is degraded ----
        b::MONITORENTER | b::MONITOREXIT => {
            let f = cur(thread)?;
            f.stack.pop_ref()?;
            f.pc += 1;
            OpOutcome::Continue
        }

        // ---- returns ----
        b::IRETURN => {
            let f = cur(thread)?;
            let v = f.stack.pop_int()?;
            OpOutcome::Return(Some(JvmValue::Int(i64::from(as_i32(v)))))
        }
        b::LRETURN => {
            let f = cur(thread)?;
            let v = f.stack.pop_long()?;
            OpOutcome::Return(Some(JvmValue::Long(v)))
        }
        b::FRETURN => {
            let f = cur(thread)?;
            let v = f.stack.pop_float()?;
            OpOutcome::Return(Some(JvmValue::Float(v)))
        }
        b::DRETURN => {
            let f = cur(thread)?;
            let v = f.stack.pop_double()?;
            OpOutcome::Return(Some(JvmValue::Double(v)))
        }
        b::ARETURN => {
            let f = cur(thread)?;
            let v = f.stack.pop()?;
            if !v.is_reference() {
                return Err(FatalError::ExpectedStackReference.into());
            }
            OpOutcome::Return(Some(v))
        }
        b::RETURN => OpOutcome::Return(None),

        b::ATHROW => {
            let f = cur(thread)?;
            match f.stack.pop_ref()? {
                Some(throwable) => OpOutcome::ThrowRef(throwable),
                None => OpOutcome::Throw {
                    class: "java/lang/NullPointerException".to_owned(),
                    message: "athrow on null".to_owned(),
                },
            }
        }

        unknown => {
            let pc = thread.frames.current().map_or(0, |f| f.pc);
            return Err(FatalError::UnknownOpcode {
                opcode: unknown,
                pc,
            }
            .into());
        }
    };

    Ok(outcome)
}

fn ret_to(frame: &mut Frame, index: u16) -> Result<OpOutcome, FatalError> {
    let target = frame
        .locals
        .load(index)?
        .into_int()
        .ok_or(FatalError::ExpectedLocalValue(index))?;
    if target < 0 || target >= frame.bytecode().len() as i64 {
        return Err(FatalError::BadBranchTarget { pc: frame.pc });
    }
    frame.pc = target as usize;
    Ok(OpOutcome::Continue)
}

fn table_switch(frame: &mut Frame) -> Result<OpOutcome, FatalError> {
    // Operands start at the next 4-byte boundary relative to the method.
    let pc = frame.pc;
    let pad = (4 - ((pc + 1) % 4)) % 4;
    let base = pc + 1 + pad;
    let rel = move |off: usize| off + base - pc;

    let default = fetch_i32(frame, rel(0))?;
    let low = fetch_i32(frame, rel(4))?;
    let high = fetch_i32(frame, rel(8))?;

    let index = as_i32(frame.stack.pop_int()?);
    let offset = if index < low || index > high {
        default
    } else {
        let slot = (index - low) as usize;
        fetch_i32(frame, rel(12 + slot * 4))?
    };
    branch(frame, i64::from(offset))?;
    Ok(OpOutcome::Continue)
}

fn lookup_switch(frame: &mut Frame) -> Result<OpOutcome, FatalError> {
    let pc = frame.pc;
    let pad = (4 - ((pc + 1) % 4)) % 4;
    let base = pc + 1 + pad;
    let rel = move |off: usize| off + base - pc;

    let default = fetch_i32(frame, rel(0))?;
    let npairs = fetch_i32(frame, rel(4))?;

    let key = as_i32(frame.stack.pop_int()?);
    let mut offset = default;
    for pair in 0..npairs.max(0) {
        let at = rel(8 + (pair as usize) * 8);
        let match_value = fetch_i32(frame, at)?;
        if match_value == key {
            offset = fetch_i32(frame, at + 4)?;
            break;
        }
    }
    branch(frame, i64::from(offset))?;
    Ok(OpOutcome::Continue)
}

/// The WIDE prefix doubles the index width of the following load, store,
/// IINC, or RET.
fn wide(frame: &mut Frame) -> Result<OpOutcome, FatalError> {
    use opcode as b;

    let widened = fetch_u8(frame, 1)?;
    match widened {
        b::ILOAD | b::LLOAD | b::FLOAD | b::DLOAD | b::ALOAD => {
            let index = fetch_u16(frame, 2)?;
            load_local(frame, index, 4)
        }
        b::ISTORE | b::LSTORE | b::FSTORE | b::DSTORE | b::ASTORE => {
            let index = fetch_u16(frame, 2)?;
            store_local(frame, index, 4)
        }
        b::IINC => {
            let index = fetch_u16(frame, 2)?;
            let delta = i32::from(fetch_i16(frame, 4)?);
            let v = as_i32(
                frame
                    .locals
                    .load(index)?
                    .into_int()
                    .ok_or(FatalError::ExpectedLocalValue(index))?,
            );
            frame
                .locals
                .store(index, JvmValue::Int(i64::from(v.wrapping_add(delta))));
            frame.pc += 6;
            Ok(OpOutcome::Continue)
        }
        b::RET => {
            let index = fetch_u16(frame, 2)?;
            ret_to(frame, index)
        }
        other => Err(FatalError::UnknownOpcode {
            opcode: other,
            pc: frame.pc,
        }),
    }
}

fn cmp_ordered(a: i64, b: i64) -> i32 {
    match a.cmp(&b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

/// FCMP/DCMP: NaN pushes -1 for the L form and 1 for the G form.
fn cmp_floating(a: f64, b: f64, greater_on_nan: bool) -> i32 {
    if a.is_nan() || b.is_nan() {
        if greater_on_nan {
            1
        } else {
            -1
        }
    } else if a < b {
        -1
    } else if a > b {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests;
