//! The five invocation bytecodes.
//!
//! Invocation pops the receiver and arguments, consults the resolver, and
//! either dispatches to an intrinsic in place or pushes a new frame. The
//! caller's PC stays on the invoke instruction until the callee returns.

use std::sync::Arc;

use either::Either;

use robusta_base::descriptor::MethodDescriptor;

use crate::frame::{Frame, Locals};
use crate::interp::{cur, fetch_u16, OpOutcome};
use crate::intrinsics::IntrinsicResult;
use crate::jthread::JavaThread;
use crate::resolver::{self, ResolvedMethod};
use crate::value::JvmValue;
use crate::{FatalError, GeneralError, Globals, VmError};

fn npe(message: String) -> OpOutcome {
    OpOutcome::Throw {
        class: "java/lang/NullPointerException".to_owned(),
        message,
    }
}

/// The member reference an invoke names, read from the current frame.
fn invoke_target(
    thread: &mut JavaThread,
) -> Result<(String, String, String, MethodDescriptor), GeneralError> {
    let (cldata, index) = {
        let f = cur(thread)?;
        (Arc::clone(&f.cldata), fetch_u16(f, 1)?)
    };
    let (class_name, method_name, descriptor) = cldata
        .cp
        .member_ref(index)
        .map_err(FatalError::BadConstantPool)?;
    let (class_name, method_name, descriptor) = (
        class_name.to_owned(),
        method_name.to_owned(),
        descriptor.to_owned(),
    );

    let parsed = MethodDescriptor::parse(&descriptor).map_err(|error| VmError::BadDescriptor {
        descriptor: descriptor.clone(),
        error,
    })?;
    Ok((class_name, method_name, descriptor, parsed))
}

/// The runtime class of the receiver sitting `arg_slots` below the top of
/// the stack, or a null-receiver outcome.
fn receiver_class(
    globals: &Globals,
    thread: &mut JavaThread,
    arg_slots: usize,
    method_name: &str,
) -> Result<Result<String, OpOutcome>, GeneralError> {
    let receiver = {
        let f = cur(thread)?;
        f.stack.peek_at(arg_slots as i32)?
    };
    match receiver {
        JvmValue::Null => Ok(Err(npe(format!("{method_name} invoked on null")))),
        JvmValue::Ref(reference) => {
            let klass = {
                let heap = globals.heap.read();
                heap.get(reference)
                    .ok_or(FatalError::StaleObjectRef)?
                    .klass
            };
            Ok(Ok(globals.string_pool.tpath(klass)))
        }
        _ => Err(FatalError::ExpectedStackReference.into()),
    }
}

/// Pop arguments, then run the resolved target: intrinsics complete in
/// place, bytecode methods become a new frame.
fn dispatch(
    globals: &Globals,
    thread: &mut JavaThread,
    resolved: ResolvedMethod,
    has_receiver: bool,
    param_slots: usize,
    inst_len: usize,
) -> Result<OpOutcome, GeneralError> {
    let total_slots = param_slots + usize::from(has_receiver);

    let mut args = {
        let f = cur(thread)?;
        let mut args = Vec::with_capacity(total_slots);
        for _ in 0..total_slots {
            args.push(f.stack.pop()?);
        }
        args
    };
    args.reverse();

    if has_receiver && matches!(args.first(), Some(JvmValue::Null)) {
        return Ok(npe(format!("{} invoked on null", resolved.name)));
    }

    match resolved.target {
        Either::Left(intrinsic) => {
            match intrinsic.invoke(globals, &resolved.signature, args) {
                IntrinsicResult::Void => {}
                // Category-2 results still occupy a single slot.
                IntrinsicResult::Value(value) => {
                    let f = cur(thread)?;
                    f.stack.push(value)?;
                }
                IntrinsicResult::Raise(raised) => {
                    return Ok(OpOutcome::Throw {
                        class: raised.class,
                        message: raised.message,
                    })
                }
            }
            let f = cur(thread)?;
            f.pc += inst_len;
            Ok(OpOutcome::Continue)
        }
        Either::Right((record, method_index)) => {
            let method = &record.methods[method_index];
            let Some(code) = method.code.as_ref() else {
                return Err(VmError::IncompatibleClassChange(format!(
                    "invoked {}.{}{} which has no body",
                    resolved.class_name, resolved.name, resolved.descriptor
                ))
                .into());
            };
            let locals = Locals::from_args(args, code.max_locals);

            let frame = Frame::new(
                record.name,
                globals.string_pool.intern(&resolved.name),
                resolved.descriptor.clone(),
                Arc::clone(&record),
                method_index,
                locals,
                thread.id,
            );

            let caller = cur(thread)?;
            caller.return_pc_advance = inst_len;
            Ok(OpOutcome::Call(frame))
        }
    }
}

pub(super) fn invokevirtual(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (_, method_name, descriptor, parsed) = invoke_target(thread)?;
    let param_slots = parsed.parameter_slots();

    let runtime_class = match receiver_class(globals, thread, param_slots, &method_name)? {
        Ok(class) => class,
        Err(outcome) => return Ok(outcome),
    };
    let resolved = resolver::resolve_method(globals, &runtime_class, &method_name, &descriptor)?;
    dispatch(globals, thread, resolved, true, param_slots, 3)
}

/// INVOKESPECIAL targets the class named in the reference: `<init>`,
/// private methods, and super calls do not use runtime dispatch.
pub(super) fn invokespecial(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (class_name, method_name, descriptor, parsed) = invoke_target(thread)?;
    let resolved = resolver::resolve_method(globals, &class_name, &method_name, &descriptor)?;
    dispatch(globals, thread, resolved, true, parsed.parameter_slots(), 3)
}

pub(super) fn invokestatic(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (class_name, method_name, descriptor, parsed) = invoke_target(thread)?;
    let resolved = resolver::resolve_method(globals, &class_name, &method_name, &descriptor)?;

    // INVOKESTATIC is an active use: the resolved class initializes first.
    if let Either::Right((record, _)) = &resolved.target {
        let record = Arc::clone(record);
        resolver::initialize_class(globals, thread, &record)?;
    }

    dispatch(globals, thread, resolved, false, parsed.parameter_slots(), 3)
}

pub(super) fn invokeinterface(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (interface_name, method_name, descriptor, parsed) = invoke_target(thread)?;
    let param_slots = parsed.parameter_slots();

    let runtime_class = match receiver_class(globals, thread, param_slots, &method_name)? {
        Ok(class) => class,
        Err(outcome) => return Ok(outcome),
    };

    if !resolver::is_assignable(globals, &runtime_class, &interface_name)? {
        return Err(VmError::IncompatibleClassChange(format!(
            "receiver class {runtime_class} does not implement {interface_name}"
        ))
        .into());
    }

    let resolved = resolver::resolve_method(globals, &runtime_class, &method_name, &descriptor)?;
    // Operands: index, count, 0 -- five bytes on the wire.
    dispatch(globals, thread, resolved, true, param_slots, 5)
}

pub(super) fn invokedynamic(
    globals: &Globals,
    thread: &mut JavaThread,
) -> Result<OpOutcome, GeneralError> {
    let (cldata, index) = {
        let f = cur(thread)?;
        (Arc::clone(&f.cldata), fetch_u16(f, 1)?)
    };

    // Resolution runs the mandated skeleton; producing and invoking the
    // CallSite is still pending, which surfaces as a linkage error.
    let _call_site = resolver::resolve_call_site(globals, &cldata.cp, index)?;
    Err(VmError::ResolutionPending("invokedynamic dispatch").into())
}
