//! Building Java throwables and unwinding the frame stack against
//! exception tables.

use std::io::Write;

use robusta_base::string_pool::INVALID_NAME;

use crate::heap::ObjRef;
use crate::jthread::JavaThread;
use crate::object::{rust_string_from_object, string_object_from_str, Field, Object};
use crate::resolver;
use crate::trace::TraceLevel;
use crate::value::JvmValue;
use crate::{GeneralError, Globals};

/// Result of searching the frame stack for a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwindOutcome {
    /// A handler was found; the stack has been truncated, the operand stack
    /// cleared, the throwable pushed, and the PC set to the handler.
    Handled,
    /// No handler; the stack trace has been written to the error sink.
    Unhandled,
}

/// Construct a throwable of the named class carrying a detail message.
///
/// The class is resolved so handler matching can walk its hierarchy, but
/// the object itself is synthesized directly (message field only) rather
/// than run through `<init>`; bootstrap throwables must be constructible
/// even when no initializer can run.
pub fn build_throwable(globals: &Globals, class_name: &str, message: &str) -> ObjRef {
    if let Err(err) = resolver::ensure_loaded(globals, class_name) {
        globals.trace(
            TraceLevel::Error,
            &format!("could not resolve throwable class {class_name}: {err}"),
        );
    }

    let klass = globals.string_pool.intern(class_name);
    let mut heap = globals.heap.write();
    let message_ref = string_object_from_str(&mut heap, message);

    let mut throwable = Object::new_of_class(klass);
    throwable.set_field(
        "detailMessage",
        Field::scalar("Ljava/lang/String;", JvmValue::Ref(message_ref)),
    );
    heap.alloc(throwable)
}

/// The detail message of a throwable, empty if absent.
#[must_use]
pub fn message_of(globals: &Globals, throwable: ObjRef) -> String {
    let heap = globals.heap.read();
    let Some(object) = heap.get(throwable) else {
        return String::new();
    };
    match object.get_field("detailMessage") {
        Some(Field {
            value: crate::object::FieldValue::Value(JvmValue::Ref(message)),
            ..
        }) => rust_string_from_object(&heap, *message).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Walk the frame stack from the throwing frame toward `base_depth`,
/// scanning each method's exception table for a handler whose protected
/// range contains the frame's PC and whose caught type is assignable from
/// the thrown class.
pub fn dispatch(
    globals: &Globals,
    thread: &mut JavaThread,
    throwable: ObjRef,
    base_depth: usize,
) -> Result<UnwindOutcome, GeneralError> {
    let thrown_class = {
        let heap = globals.heap.read();
        heap.get(throwable).map_or(INVALID_NAME, |obj| obj.klass)
    };
    let thrown_name = globals.string_pool.tpath(thrown_class);

    let depth = thread.frames.depth();
    for frame_index in (base_depth..depth).rev() {
        let Some(handler_pc) = find_handler(globals, thread, frame_index, &thrown_name)? else {
            continue;
        };

        thread.frames.truncate(frame_index + 1);
        let frame = thread
            .frames
            .current_mut()
            .expect("truncate left the handler frame");
        frame.stack.clear();
        frame.stack.push(JvmValue::Ref(throwable))?;
        frame.pc = handler_pc;
        // Any invoke that was outstanding in this frame is abandoned.
        frame.return_pc_advance = 0;
        return Ok(UnwindOutcome::Handled);
    }

    report_uncaught(globals, thread, throwable, &thrown_name, base_depth);
    thread.frames.truncate(base_depth);
    Ok(UnwindOutcome::Unhandled)
}

fn find_handler(
    globals: &Globals,
    thread: &JavaThread,
    frame_index: usize,
    thrown_name: &str,
) -> Result<Option<usize>, GeneralError> {
    let Some(frame) = thread.frames.get(frame_index) else {
        return Ok(None);
    };
    let pc = frame.pc;

    for row in frame.exception_table() {
        let start = usize::from(row.start_pc);
        let end = usize::from(row.end_pc);
        if pc < start || pc >= end {
            continue;
        }

        // catch_type 0 is the catch-all used by finally blocks.
        if row.catch_type == 0 {
            return Ok(Some(usize::from(row.handler_pc)));
        }

        let caught_name = frame
            .cp()
            .class_name(row.catch_type)
            .map_err(crate::FatalError::BadConstantPool)?
            .to_owned();
        if resolver::is_assignable(globals, thrown_name, &caught_name)? {
            return Ok(Some(usize::from(row.handler_pc)));
        }
    }
    Ok(None)
}

/// Print the uncaught-exception report the way the launcher does: the
/// dotted class name, the message, then one `at` line per frame.
fn report_uncaught(
    globals: &Globals,
    thread: &JavaThread,
    throwable: ObjRef,
    thrown_name: &str,
    base_depth: usize,
) {
    let message = message_of(globals, throwable);
    let dotted = thrown_name.replace('/', ".");

    let mut err = globals.err.lock();
    if message.is_empty() {
        let _ = writeln!(err, "Exception in thread \"main\" {dotted}");
    } else {
        let _ = writeln!(err, "Exception in thread \"main\" {dotted}: {message}");
    }

    let depth = thread.frames.depth();
    for frame_index in (base_depth..depth).rev() {
        let Some(frame) = thread.frames.get(frame_index) else {
            continue;
        };
        let class_name = globals.string_pool.tpath(frame.class).replace('/', ".");
        let method_name = globals.string_pool.tpath(frame.method);
        let source = frame
            .cldata
            .source_file
            .clone()
            .unwrap_or_else(|| "Unknown Source".to_owned());
        let _ = writeln!(err, "\tat {class_name}.{method_name}({source})");
    }
    let _ = err.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throwables_carry_their_message() {
        let globals = Globals::test_instance();
        let exc = build_throwable(
            &globals,
            "java/lang/ArithmeticException",
            "IDIV or LDIV: division by zero",
        );
        assert_eq!(message_of(&globals, exc), "IDIV or LDIV: division by zero");

        let heap = globals.heap.read();
        let name = globals.string_pool.tpath(heap.get(exc).unwrap().klass);
        assert_eq!(name, "java/lang/ArithmeticException");
    }

    #[test]
    fn unhandled_exceptions_report_to_the_error_sink() {
        let globals = Globals::test_instance();
        let mut thread = JavaThread::new(globals.threads.register());

        let exc = build_throwable(&globals, "java/lang/NullPointerException", "boom");
        let outcome = dispatch(&globals, &mut thread, exc, 0).unwrap();
        assert_eq!(outcome, UnwindOutcome::Unhandled);

        let report = globals.captured_err();
        assert!(report.contains("java.lang.NullPointerException"));
        assert!(report.contains("boom"));
    }
}
