//! Intrinsics for `java/io/PrintStream`.
//!
//! The stream objects for `System.out` and `System.err` carry an `fd` field
//! set at bootstrap; handlers route through the globals' injected sinks so
//! embedders and tests can capture output.

use std::io::Write;

use crate::intrinsics::{
    DuplicateIntrinsic, Intrinsic, IntrinsicResult, IntrinsicTable, RaisedException,
};
use crate::object::rust_string_from_object;
use crate::value::JvmValue;
use crate::Globals;

pub fn load(table: &IntrinsicTable) -> Result<(), DuplicateIntrinsic> {
    table.register(
        "java/io/PrintStream.println()V",
        Intrinsic::func(1, println_empty),
    )?;
    table.register(
        "java/io/PrintStream.println(Ljava/lang/String;)V",
        Intrinsic::func(2, println_string),
    )?;
    table.register(
        "java/io/PrintStream.println(I)V",
        Intrinsic::func(2, println_int),
    )?;
    table.register(
        "java/io/PrintStream.println(J)V",
        Intrinsic::func(2, println_long),
    )?;
    table.register(
        "java/io/PrintStream.println(F)V",
        Intrinsic::func(2, println_float),
    )?;
    table.register(
        "java/io/PrintStream.println(D)V",
        Intrinsic::func(2, println_double),
    )?;
    table.register(
        "java/io/PrintStream.println(C)V",
        Intrinsic::func(2, println_char),
    )?;
    table.register(
        "java/io/PrintStream.println(Z)V",
        Intrinsic::func(2, println_bool),
    )?;

    table.register(
        "java/io/PrintStream.print(Ljava/lang/String;)V",
        Intrinsic::func(2, print_string),
    )?;
    table.register(
        "java/io/PrintStream.print(I)V",
        Intrinsic::func(2, print_int),
    )?;
    table.register(
        "java/io/PrintStream.print(J)V",
        Intrinsic::func(2, print_long),
    )?;
    table.register(
        "java/io/PrintStream.print(C)V",
        Intrinsic::func(2, print_char),
    )?;
    table.register(
        "java/io/PrintStream.print(Z)V",
        Intrinsic::func(2, print_bool),
    )?;
    Ok(())
}

/// The fd field distinguishing `System.out` (1) from `System.err` (2).
pub const FD_FIELD: &str = "fd";
pub const FD_OUT: i64 = 1;
pub const FD_ERR: i64 = 2;

fn npe() -> IntrinsicResult {
    IntrinsicResult::Raise(RaisedException::new(
        "java/lang/NullPointerException",
        "print stream receiver was null",
    ))
}

fn receiver_fd(globals: &Globals, params: &[JvmValue]) -> Option<i64> {
    let Some(JvmValue::Ref(receiver)) = params.first() else {
        return None;
    };
    let heap = globals.heap.read();
    let object = heap.get(*receiver)?;
    match object.get_field(FD_FIELD) {
        Some(field) => match field.value {
            crate::object::FieldValue::Value(JvmValue::Int(fd)) => Some(fd),
            _ => Some(FD_OUT),
        },
        None => Some(FD_OUT),
    }
}

fn write_text(globals: &Globals, params: &[JvmValue], text: &str) -> IntrinsicResult {
    let Some(fd) = receiver_fd(globals, params) else {
        return npe();
    };
    if fd == FD_ERR {
        let mut err = globals.err.lock();
        let _ = err.write_all(text.as_bytes());
        let _ = err.flush();
    } else {
        let mut out = globals.out.lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
    IntrinsicResult::Void
}

fn string_param(globals: &Globals, params: &[JvmValue]) -> Option<String> {
    match params.get(1)? {
        JvmValue::Ref(r) => rust_string_from_object(&globals.heap.read(), *r),
        JvmValue::Null => Some("null".to_owned()),
        _ => None,
    }
}

fn println_empty(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    write_text(globals, params, "\n")
}

fn println_string(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    match string_param(globals, params) {
        Some(text) => write_text(globals, params, &format!("{text}\n")),
        None => npe(),
    }
}

fn print_string(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    match string_param(globals, params) {
        Some(text) => write_text(globals, params, &text),
        None => npe(),
    }
}

fn int_param(params: &[JvmValue]) -> i64 {
    params.get(1).copied().and_then(JvmValue::into_int).unwrap_or(0)
}

fn println_int(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    write_text(globals, params, &format!("{}\n", int_param(params)))
}

fn print_int(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    write_text(globals, params, &int_param(params).to_string())
}

fn long_param(params: &[JvmValue]) -> i64 {
    params.get(1).copied().and_then(JvmValue::into_long).unwrap_or(0)
}

fn println_long(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    write_text(globals, params, &format!("{}\n", long_param(params)))
}

fn print_long(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    write_text(globals, params, &long_param(params).to_string())
}

/// Java renders whole floats with a trailing `.0`; match that.
fn render_double(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn println_float(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let value = params
        .get(1)
        .copied()
        .and_then(JvmValue::into_float)
        .unwrap_or(0.0);
    write_text(globals, params, &format!("{}\n", render_double(value)))
}

fn println_double(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let value = params
        .get(1)
        .copied()
        .and_then(JvmValue::into_double)
        .unwrap_or(0.0);
    write_text(globals, params, &format!("{}\n", render_double(value)))
}

fn char_text(params: &[JvmValue]) -> String {
    let code = int_param(params);
    char::from_u32(code as u32).unwrap_or('\u{fffd}').to_string()
}

fn println_char(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    write_text(globals, params, &format!("{}\n", char_text(params)))
}

fn print_char(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    write_text(globals, params, &char_text(params))
}

fn bool_text(params: &[JvmValue]) -> &'static str {
    if int_param(params) != 0 {
        "true"
    } else {
        "false"
    }
}

fn println_bool(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    write_text(globals, params, &format!("{}\n", bool_text(params)))
}

fn print_bool(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    write_text(globals, params, bool_text(params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::string_object_from_str;

    #[test]
    fn println_string_lands_on_the_out_sink() {
        let globals = Globals::test_instance();
        let out_ref = globals.system_out();
        let s = string_object_from_str(&mut globals.heap.write(), "hello world");

        let result = println_string(
            &globals,
            &mut vec![JvmValue::Ref(out_ref), JvmValue::Ref(s)],
        );
        assert_eq!(result, IntrinsicResult::Void);
        assert_eq!(globals.captured_out(), "hello world\n");
    }

    #[test]
    fn println_routes_err_by_fd() {
        let globals = Globals::test_instance();
        let err_ref = globals.system_err();
        let s = string_object_from_str(&mut globals.heap.write(), "oops");

        println_string(
            &globals,
            &mut vec![JvmValue::Ref(err_ref), JvmValue::Ref(s)],
        );
        assert_eq!(globals.captured_out(), "");
        assert_eq!(globals.captured_err(), "oops\n");
    }

    #[test]
    fn doubles_render_like_java() {
        assert_eq!(render_double(1.0), "1.0");
        assert_eq!(render_double(2.5), "2.5");
        assert_eq!(render_double(-3.0), "-3.0");
    }

    #[test]
    fn println_int_renders_decimal() {
        let globals = Globals::test_instance();
        let out_ref = globals.system_out();
        println_int(
            &globals,
            &mut vec![JvmValue::Ref(out_ref), JvmValue::Int(-42)],
        );
        assert_eq!(globals.captured_out(), "-42\n");
    }
}
