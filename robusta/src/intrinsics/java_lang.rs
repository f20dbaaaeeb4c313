//! Intrinsics for `java/lang/Object`, `java/lang/System`, and
//! `java/lang/Runtime`.

use crate::intrinsics::{
    DuplicateIntrinsic, Intrinsic, IntrinsicResult, IntrinsicTable, RaisedException,
};
use crate::object::{FieldValue, Object, VALUE_FIELD};
use crate::value::JvmValue;
use crate::Globals;

pub fn load(table: &IntrinsicTable) -> Result<(), DuplicateIntrinsic> {
    table.register("java/lang/Object.<init>()V", Intrinsic::just_return(1))?;
    table.register(
        "java/lang/Object.hashCode()I",
        Intrinsic::func(1, object_hash_code),
    )?;
    table.register(
        "java/lang/Object.getClass()Ljava/lang/Class;",
        Intrinsic::func(1, object_get_class),
    )?;

    table.register("java/lang/System.exit(I)V", Intrinsic::func(1, system_exit))?;
    table.register(
        "java/lang/System.currentTimeMillis()J",
        Intrinsic::func(0, system_current_time_millis),
    )?;
    table.register(
        "java/lang/System.nanoTime()J",
        Intrinsic::func(0, system_nano_time),
    )?;
    table.register(
        "java/lang/System.arraycopy(Ljava/lang/Object;ILjava/lang/Object;II)V",
        Intrinsic::func(5, system_arraycopy),
    )?;

    table.register(
        "java/lang/Runtime.getRuntime()Ljava/lang/Runtime;",
        Intrinsic::func(0, runtime_get_runtime),
    )?;
    table.register("java/lang/Runtime.gc()V", Intrinsic::just_return(1))?;
    table.register(
        "java/lang/Runtime.maxMemory()J",
        Intrinsic::func(1, runtime_max_memory),
    )?;
    table.register(
        "java/lang/Runtime.totalMemory()J",
        Intrinsic::func(1, runtime_total_memory),
    )?;
    table.register(
        "java/lang/Runtime.availableProcessors()I",
        Intrinsic::func(1, runtime_available_processors),
    )?;

    // Security managers are long gone; configuration-probing calls get the
    // unsupported-method trap so the failure names the caller.
    table.register(
        "java/lang/System.getSecurityManager()Ljava/lang/SecurityManager;",
        Intrinsic::trap(0),
    )?;

    Ok(())
}

fn npe(context: &str) -> IntrinsicResult {
    IntrinsicResult::Raise(RaisedException::new(
        "java/lang/NullPointerException",
        context,
    ))
}

fn object_hash_code(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let Some(JvmValue::Ref(receiver)) = params.first().copied() else {
        return npe("hashCode on null receiver");
    };

    let mut heap = globals.heap.write();
    let Some(object) = heap.get_mut(receiver) else {
        return npe("hashCode on dead reference");
    };
    if object.mark.hash == 0 {
        // Identity hash is derived from the handle; pin it nonzero so the
        // lazy-init sentinel stays usable.
        object.mark.hash = receiver.identity() | 1;
    }
    IntrinsicResult::Value(JvmValue::Int(i64::from(object.mark.hash)))
}

fn object_get_class(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let Some(JvmValue::Ref(receiver)) = params.first().copied() else {
        return npe("getClass on null receiver");
    };

    let klass = {
        let heap = globals.heap.read();
        match heap.get(receiver) {
            Some(object) => object.klass,
            None => return npe("getClass on dead reference"),
        }
    };

    let class_ref = globals.class_objects.get_or_create(&globals.heap, klass);
    IntrinsicResult::Value(JvmValue::Ref(class_ref))
}

fn system_exit(_globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let code = params
        .first()
        .copied()
        .and_then(JvmValue::into_int)
        .unwrap_or(0);
    std::process::exit(code as i32);
}

fn system_current_time_millis(_globals: &Globals, _params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    IntrinsicResult::Value(JvmValue::Long(millis as i64))
}

fn system_nano_time(_globals: &Globals, _params: &mut Vec<JvmValue>) -> IntrinsicResult {
    // Monotonic, arbitrary origin.
    use std::sync::OnceLock;
    use std::time::Instant;
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    let origin = ORIGIN.get_or_init(Instant::now);
    IntrinsicResult::Value(JvmValue::Long(origin.elapsed().as_nanos() as i64))
}

fn system_arraycopy(globals: &Globals, params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let out_of_bounds = |msg: &str| {
        IntrinsicResult::Raise(RaisedException::new(
            "java/lang/ArrayIndexOutOfBoundsException",
            format!("arraycopy: {msg}"),
        ))
    };

    if params.len() != 5 {
        return out_of_bounds("wrong argument count");
    }
    let (Some(src), Some(src_pos), Some(dest), Some(dest_pos), Some(length)) = (
        params[0].into_reference(),
        params[1].into_int(),
        params[2].into_reference(),
        params[3].into_int(),
        params[4].into_int(),
    ) else {
        return out_of_bounds("malformed arguments");
    };

    let (Some(src), Some(dest)) = (src, dest) else {
        return npe("arraycopy on null array");
    };
    if src_pos < 0 || dest_pos < 0 || length < 0 {
        return out_of_bounds("negative index or length");
    }
    let (src_pos, dest_pos, length) = (src_pos as usize, dest_pos as usize, length as usize);

    let mut heap = globals.heap.write();

    // Pull the source range out first; src and dest may be the same object.
    let src_slice = {
        let Some(src_obj) = heap.get(src) else {
            return npe("arraycopy on dead source");
        };
        let Some(field) = src_obj.get_field(VALUE_FIELD) else {
            return IntrinsicResult::Raise(RaisedException::new(
                "java/lang/ArrayStoreException",
                "arraycopy source is not an array",
            ));
        };
        let Some(src_len) = field.value.array_len() else {
            return IntrinsicResult::Raise(RaisedException::new(
                "java/lang/ArrayStoreException",
                "arraycopy source is not an array",
            ));
        };
        if src_pos + length > src_len {
            return out_of_bounds("source range exceeds length");
        }
        match &field.value {
            FieldValue::ByteArray(v) => FieldValue::ByteArray(v[src_pos..src_pos + length].to_vec()),
            FieldValue::IntArray(v) => FieldValue::IntArray(v[src_pos..src_pos + length].to_vec()),
            FieldValue::FloatArray(v) => {
                FieldValue::FloatArray(v[src_pos..src_pos + length].to_vec())
            }
            FieldValue::RefArray(v) => FieldValue::RefArray(v[src_pos..src_pos + length].to_vec()),
            FieldValue::Value(_) => unreachable!("array_len ruled out scalars"),
        }
    };

    let Some(dest_obj) = heap.get_mut(dest) else {
        return npe("arraycopy on dead destination");
    };
    let Some(field) = dest_obj.fields.get_mut(VALUE_FIELD) else {
        return IntrinsicResult::Raise(RaisedException::new(
            "java/lang/ArrayStoreException",
            "arraycopy destination is not an array",
        ));
    };
    let Some(dest_len) = field.value.array_len() else {
        return IntrinsicResult::Raise(RaisedException::new(
            "java/lang/ArrayStoreException",
            "arraycopy destination is not an array",
        ));
    };
    if dest_pos + length > dest_len {
        return out_of_bounds("destination range exceeds length");
    }

    match (&mut field.value, src_slice) {
        (FieldValue::ByteArray(dst), FieldValue::ByteArray(src)) => {
            dst[dest_pos..dest_pos + length].copy_from_slice(&src);
        }
        (FieldValue::IntArray(dst), FieldValue::IntArray(src)) => {
            dst[dest_pos..dest_pos + length].copy_from_slice(&src);
        }
        (FieldValue::FloatArray(dst), FieldValue::FloatArray(src)) => {
            dst[dest_pos..dest_pos + length].copy_from_slice(&src);
        }
        (FieldValue::RefArray(dst), FieldValue::RefArray(src)) => {
            dst[dest_pos..dest_pos + length].clone_from_slice(&src);
        }
        _ => {
            return IntrinsicResult::Raise(RaisedException::new(
                "java/lang/ArrayStoreException",
                "arraycopy between incompatible array types",
            ))
        }
    }

    IntrinsicResult::Void
}

fn runtime_get_runtime(globals: &Globals, _params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let klass = globals.string_pool.intern("java/lang/Runtime");
    let runtime = globals.heap.write().alloc(Object::new_of_class(klass));
    IntrinsicResult::Value(JvmValue::Ref(runtime))
}

fn runtime_max_memory(_globals: &Globals, _params: &mut Vec<JvmValue>) -> IntrinsicResult {
    IntrinsicResult::Value(JvmValue::Long(i64::MAX))
}

fn runtime_total_memory(_globals: &Globals, _params: &mut Vec<JvmValue>) -> IntrinsicResult {
    IntrinsicResult::Value(JvmValue::Long(host_rss_bytes()))
}

fn runtime_available_processors(_globals: &Globals, _params: &mut Vec<JvmValue>) -> IntrinsicResult {
    let count = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    IntrinsicResult::Value(JvmValue::Int(count as i64))
}

/// Resident set size of this process, in bytes. 0 when the host refuses to
/// say.
fn host_rss_bytes() -> i64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut system = sysinfo::System::new();
    if !system.refresh_process(pid) {
        return 0;
    }
    system
        .process(pid)
        .map_or(0, |process| i64::try_from(process.memory()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use robusta_base::descriptor::PrimitiveType;

    #[test]
    fn hash_code_is_stable_and_nonzero() {
        let globals = Globals::test_instance();
        let r = globals.heap.write().alloc(Object::new_empty());

        let first = object_hash_code(&globals, &mut vec![JvmValue::Ref(r)]);
        let second = object_hash_code(&globals, &mut vec![JvmValue::Ref(r)]);
        assert_eq!(first, second);
        match first {
            IntrinsicResult::Value(JvmValue::Int(h)) => assert_ne!(h, 0),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn arraycopy_moves_int_elements() {
        let globals = Globals::test_instance();
        let (src, dest) = {
            let mut heap = globals.heap.write();
            let mut src_obj = Object::new_primitive_array(PrimitiveType::Int, 4);
            if let FieldValue::IntArray(v) =
                &mut src_obj.fields.get_mut(VALUE_FIELD).unwrap().value
            {
                v.copy_from_slice(&[1, 2, 3, 4]);
            }
            let src = heap.alloc(src_obj);
            let dest = heap.alloc(Object::new_primitive_array(PrimitiveType::Int, 4));
            (src, dest)
        };

        let result = system_arraycopy(
            &globals,
            &mut vec![
                JvmValue::Ref(src),
                JvmValue::Int(1),
                JvmValue::Ref(dest),
                JvmValue::Int(0),
                JvmValue::Int(2),
            ],
        );
        assert_eq!(result, IntrinsicResult::Void);

        let heap = globals.heap.read();
        match &heap.get(dest).unwrap().get_field(VALUE_FIELD).unwrap().value {
            FieldValue::IntArray(v) => assert_eq!(v, &vec![2, 3, 0, 0]),
            other => panic!("unexpected backing {other:?}"),
        }
    }

    #[test]
    fn arraycopy_rejects_bad_ranges() {
        let globals = Globals::test_instance();
        let (src, dest) = {
            let mut heap = globals.heap.write();
            let src = heap.alloc(Object::new_primitive_array(PrimitiveType::Int, 2));
            let dest = heap.alloc(Object::new_primitive_array(PrimitiveType::Int, 2));
            (src, dest)
        };

        let result = system_arraycopy(
            &globals,
            &mut vec![
                JvmValue::Ref(src),
                JvmValue::Int(1),
                JvmValue::Ref(dest),
                JvmValue::Int(0),
                JvmValue::Int(5),
            ],
        );
        assert!(matches!(
            result,
            IntrinsicResult::Raise(RaisedException { class, .. })
                if class == "java/lang/ArrayIndexOutOfBoundsException"
        ));
    }

    #[test]
    fn runtime_memory_returns() {
        let globals = Globals::test_instance();
        assert_eq!(
            runtime_max_memory(&globals, &mut Vec::new()),
            IntrinsicResult::Value(JvmValue::Long(i64::MAX))
        );
    }
}
