//! Intrinsics for `java/lang/invoke`: the MethodType factory that method-type
//! resolution calls through.

use robusta_base::descriptor::{DescriptorType, DescriptorTypeBasic, MethodDescriptor};

use crate::heap::ObjRef;
use crate::intrinsics::{
    DuplicateIntrinsic, Intrinsic, IntrinsicResult, IntrinsicTable, RaisedException,
};
use crate::object::{rust_string_from_object, Field, FieldValue, Object};
use crate::resolver;
use crate::value::JvmValue;
use crate::Globals;

const METHOD_TYPE_CLASS: &str = "java/lang/invoke/MethodType";

pub fn load(table: &IntrinsicTable) -> Result<(), DuplicateIntrinsic> {
    table.register(
        "java/lang/invoke/MethodType.fromMethodDescriptorString(Ljava/lang/String;Ljava/lang/ClassLoader;)Ljava/lang/invoke/MethodType;",
        Intrinsic::func(2, from_method_descriptor_string),
    )?;
    Ok(())
}

fn illegal_argument(message: impl Into<String>) -> IntrinsicResult {
    IntrinsicResult::Raise(RaisedException::new(
        "java/lang/IllegalArgumentException",
        message,
    ))
}

/// `MethodType.fromMethodDescriptorString(String, ClassLoader)`.
///
/// Parses the descriptor and resolves every mentioned type to a Class
/// object, then assembles a MethodType with `rtype`/`ptypes` fields. The
/// class loader argument is ignored: user class loaders are out of scope.
fn from_method_descriptor_string(
    globals: &Globals,
    params: &mut Vec<JvmValue>,
) -> IntrinsicResult {
    let Some(JvmValue::Ref(descriptor_ref)) = params.first().copied() else {
        return illegal_argument("descriptor string was null");
    };
    let Some(descriptor) = rust_string_from_object(&globals.heap.read(), descriptor_ref) else {
        return illegal_argument("descriptor argument was not a string");
    };

    let parsed = match MethodDescriptor::parse(&descriptor) {
        Ok(parsed) => parsed,
        Err(error) => {
            return illegal_argument(format!("invalid method descriptor {descriptor:?}: {error}"))
        }
    };

    let mut ptypes = Vec::with_capacity(parsed.parameters().len());
    for parameter in parsed.parameters() {
        match class_object_for(globals, Some(parameter)) {
            Ok(class_ref) => ptypes.push(JvmValue::Ref(class_ref)),
            Err(raise) => return raise,
        }
    }
    let rtype = match class_object_for(globals, parsed.return_type()) {
        Ok(class_ref) => class_ref,
        Err(raise) => return raise,
    };

    let mut ptype_array = Object::new_ref_array(
        &globals.string_pool,
        "java/lang/Class",
        ptypes.len(),
    );
    if let Some(field) = ptype_array.fields.get_mut(crate::object::VALUE_FIELD) {
        field.value = FieldValue::RefArray(ptypes);
    }

    let mut heap = globals.heap.write();
    let ptype_ref = heap.alloc(ptype_array);

    let mut mt = Object::new_of_class(globals.string_pool.intern(METHOD_TYPE_CLASS));
    mt.set_field(
        "rtype",
        Field::scalar("Ljava/lang/Class;", JvmValue::Ref(rtype)),
    );
    mt.set_field(
        "ptypes",
        Field::scalar("[Ljava/lang/Class;", JvmValue::Ref(ptype_ref)),
    );
    IntrinsicResult::Value(JvmValue::Ref(heap.alloc(mt)))
}

/// The Class object for one descriptor type; `None` is the void return.
fn class_object_for(
    globals: &Globals,
    ty: Option<&DescriptorType>,
) -> Result<ObjRef, IntrinsicResult> {
    let Some(ty) = ty else {
        return wrapper_type_class(globals, "java/lang/Void");
    };

    match ty {
        DescriptorType::Basic(DescriptorTypeBasic::Primitive(p)) => {
            wrapper_type_class(globals, p.wrapper_class())
        }
        DescriptorType::Basic(DescriptorTypeBasic::Class(name)) => {
            load_class_object(globals, name)
        }
        DescriptorType::Array { .. } => {
            let name = ty
                .class_name()
                .expect("arrays always have a class name");
            let klass = globals.string_pool.intern(&name);
            Ok(globals.class_objects.get_or_create(&globals.heap, klass))
        }
    }
}

fn load_class_object(globals: &Globals, name: &str) -> Result<ObjRef, IntrinsicResult> {
    if let Err(error) = resolver::ensure_loaded(globals, name) {
        return Err(illegal_argument(format!(
            "could not load class for descriptor {name}: {error}"
        )));
    }
    let klass = globals.string_pool.intern(name);
    Ok(globals.class_objects.get_or_create(&globals.heap, klass))
}

/// The `TYPE` field of a primitive wrapper. Wrapper classes are expected to
/// be preloaded; when the static is absent we attempt a load and re-query,
/// and otherwise surface the failure rather than trigger `<clinit>` from
/// inside descriptor resolution.
fn wrapper_type_class(globals: &Globals, wrapper: &str) -> Result<ObjRef, IntrinsicResult> {
    if let Some(JvmValue::Ref(class_ref)) = globals.statics.get(wrapper, "TYPE") {
        return Ok(class_ref);
    }

    if let Err(error) = resolver::ensure_loaded(globals, wrapper) {
        return Err(illegal_argument(format!(
            "could not load wrapper class {wrapper}: {error}"
        )));
    }

    match globals.statics.get(wrapper, "TYPE") {
        Some(JvmValue::Ref(class_ref)) => Ok(class_ref),
        _ => Err(illegal_argument(format!(
            "primitive TYPE field not found for {wrapper}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::string_object_from_str;

    fn from_desc(globals: &Globals, desc: &str) -> IntrinsicResult {
        let desc_ref = string_object_from_str(&mut globals.heap.write(), desc);
        from_method_descriptor_string(
            globals,
            &mut vec![JvmValue::Ref(desc_ref), JvmValue::Null],
        )
    }

    #[test]
    fn builds_method_type_for_primitive_descriptor() {
        let globals = Globals::test_instance();
        let result = from_desc(&globals, "(II)V");
        let mt_ref = match result {
            IntrinsicResult::Value(JvmValue::Ref(r)) => r,
            other => panic!("unexpected result {other:?}"),
        };

        let heap = globals.heap.read();
        let mt = heap.get(mt_ref).unwrap();
        assert!(mt.get_field("rtype").is_some());

        let ptypes_ref = match mt.get_field("ptypes").unwrap().value {
            FieldValue::Value(JvmValue::Ref(r)) => r,
            ref other => panic!("unexpected ptypes {other:?}"),
        };
        let ptypes = heap.get(ptypes_ref).unwrap();
        assert_eq!(ptypes.array_length(), Some(2));
    }

    #[test]
    fn rejects_malformed_descriptors() {
        let globals = Globals::test_instance();
        for bad in ["", "()", "(I", "I)V", "(Ljava/lang/String)V"] {
            assert!(
                matches!(
                    from_desc(&globals, bad),
                    IntrinsicResult::Raise(RaisedException { ref class, .. })
                        if class == "java/lang/IllegalArgumentException"
                ),
                "descriptor {bad:?} should have been rejected"
            );
        }
    }

    #[test]
    fn resolves_reference_parameter_types() {
        let globals = Globals::test_instance();
        let result = from_desc(&globals, "(Ljava/lang/String;)Ljava/lang/Object;");
        assert!(matches!(result, IntrinsicResult::Value(JvmValue::Ref(_))));
    }

    #[test]
    fn wrapper_type_statics_are_preseeded() {
        let globals = Globals::test_instance();
        assert!(wrapper_type_class(&globals, "java/lang/Integer").is_ok());
        assert!(wrapper_type_class(&globals, "java/lang/Void").is_ok());
    }
}
