//! Lazy resolution of constant-pool references: classes, fields, methods,
//! method handles, method types, and call sites.
//!
//! Resolution may trigger class loading from the archives, publication to
//! the method area, and `<clinit>` execution, which re-enters the
//! interpreter on the current thread's frame stack.

use std::sync::Arc;

use either::Either;

use robusta_base::class::{ClData, ClInitAction, FieldRec};
use robusta_base::classfile::{check_class, parse_class, CPool, CpKind, ParseError};
use robusta_base::string_pool;

use crate::frame::{Frame, Locals};
use crate::heap::ObjRef;
use crate::interp;
use crate::intrinsics::{signature_of, Intrinsic, IntrinsicResult};
use crate::jthread::JavaThread;
use crate::object::string_object_from_str;
use crate::statics::StaticValue;
use crate::trace::TraceLevel;
use crate::value::JvmValue;
use crate::{FatalError, GeneralError, Globals, VmError};

/// Ensure the named class is loaded and published, without triggering its
/// `<clinit>`. Array classes are synthesized on demand.
pub fn ensure_loaded(globals: &Globals, name: &str) -> Result<Arc<ClData>, VmError> {
    let interned = globals.string_pool.intern(name);
    if let Some(record) = globals.method_area.fetch(interned) {
        return Ok(record);
    }

    if name.starts_with('[') {
        let record = globals.method_area.insert(ClData::synthesized(
            interned,
            string_pool::OBJECT_NAME,
            Vec::new(),
        ));
        globals.trace(TraceLevel::Class, &format!("synthesized array class {name}"));
        return Ok(record);
    }

    let loaded = {
        let mut loader = globals.loader.lock();
        loader
            .load_class_bytes(name)
            .map_err(|error| VmError::Load {
                class: name.to_owned(),
                error,
            })?
    };
    let Some(class_bytes) = loaded else {
        return Err(VmError::NoClassDefFound(name.to_owned()));
    };

    let parsed = parse_class(&class_bytes.bytes).map_err(|error| match error {
        ParseError::UnsupportedVersion { major, minor } => VmError::UnsupportedClassVersion {
            class: name.to_owned(),
            major,
            minor,
        },
        other => VmError::ClassFormat {
            class: name.to_owned(),
            error: other,
        },
    })?;

    // Classes from the trusted JDK bundle skip the format checker.
    if !class_bytes.trusted {
        check_class(&parsed).map_err(|error| VmError::Verify {
            class: name.to_owned(),
            error,
        })?;
    }

    let record = ClData::from_parsed(parsed, &globals.string_pool, class_bytes.trusted).map_err(
        |error| VmError::ClassFormat {
            class: name.to_owned(),
            error,
        },
    )?;
    let record = globals.method_area.insert(record);

    seed_class_statics(globals, &record, name);
    globals.trace(
        TraceLevel::Class,
        &format!("loaded {name} ({} methods)", record.methods.len()),
    );
    Ok(record)
}

/// Publish the class's static fields to the statics registry: the
/// `ConstantValue` where one exists, the type default otherwise. `<clinit>`
/// then overwrites whichever it assigns.
fn seed_class_statics(globals: &Globals, record: &Arc<ClData>, class_name: &str) {
    globals.class_objects.get_or_create(&globals.heap, record.name);

    for field in record.fields.iter().filter(|f| f.is_static()) {
        let value = field
            .constant_value
            .and_then(|index| constant_field_value(globals, &record.cp, index))
            .unwrap_or_else(|| JvmValue::default_for_descriptor(&field.descriptor));

        globals.statics.add(
            &format!("{class_name}.{}", field.name),
            StaticValue::new(field.descriptor.clone(), value),
        );
        globals.class_objects.add_static_name(record.name, &field.name);
    }
}

fn constant_field_value(globals: &Globals, cp: &CPool, index: u16) -> Option<JvmValue> {
    Some(match cp.kind(index) {
        CpKind::IntegerConst => JvmValue::Int(i64::from(cp.int_const(index).ok()?)),
        CpKind::LongConst => JvmValue::Long(cp.long_const(index).ok()?),
        CpKind::FloatConst => JvmValue::Float(f64::from(cp.float_const(index).ok()?)),
        CpKind::DoubleConst => JvmValue::Double(cp.double_const(index).ok()?),
        CpKind::StringConst => {
            let text = cp.string_const(index).ok()?.to_owned();
            JvmValue::Ref(string_object_from_str(&mut globals.heap.write(), &text))
        }
        _ => return None,
    })
}

/// Run the class's `<clinit>` if this thread wins the `NotRun -> Running`
/// transition. Superclasses initialize first; recursive attempts by the
/// initializing thread return immediately.
pub fn initialize_class(
    globals: &Globals,
    thread: &mut JavaThread,
    record: &Arc<ClData>,
) -> Result<(), GeneralError> {
    match record.clinit.begin(thread.id) {
        ClInitAction::Skip => return Ok(()),
        ClInitAction::Failed => {
            return Err(VmError::ClinitFailed(globals.string_pool.tpath(record.name)).into())
        }
        ClInitAction::Run => {}
    }

    let class_name = globals.string_pool.tpath(record.name);

    // Superclass first, per initialization order.
    if record.superclass != string_pool::INVALID_NAME {
        let super_name = globals.string_pool.tpath(record.superclass);
        match ensure_loaded(globals, &super_name)
            .map_err(GeneralError::from)
            .and_then(|super_record| initialize_class(globals, thread, &super_record))
        {
            Ok(()) => {}
            Err(err) => {
                record.clinit.fail();
                return Err(err);
            }
        }
    }

    let Some((method_index, method)) = record.find_method("<clinit>", "()V") else {
        record.clinit.complete();
        return Ok(());
    };
    let max_locals = method.code.as_ref().map_or(0, |code| code.max_locals);

    globals.trace(TraceLevel::Init, &format!("running <clinit> of {class_name}"));

    let frame = Frame::new(
        record.name,
        globals.string_pool.intern("<clinit>"),
        "()V".to_owned(),
        Arc::clone(record),
        method_index,
        Locals::new(max_locals),
        thread.id,
    );

    let base_depth = thread.frames.depth();
    if let Err(err) = thread.frames.push(frame) {
        record.clinit.fail();
        return Err(err.into());
    }

    match interp::run_to_completion(globals, thread, base_depth) {
        Ok(()) => {
            record.clinit.complete();
            globals.trace(TraceLevel::Init, &format!("initialized {class_name}"));
            Ok(())
        }
        Err(GeneralError::UncaughtException) => {
            record.clinit.fail();
            Err(VmError::ClinitFailed(class_name).into())
        }
        Err(other) => {
            record.clinit.fail();
            Err(other)
        }
    }
}

/// A field reference resolved against the class hierarchy.
#[derive(Debug, Clone)]
pub struct ResolvedField {
    pub declaring: Arc<ClData>,
    /// Internal name of the class actually declaring the field.
    pub declaring_name: String,
    pub field: FieldRec,
}

/// Resolve a `FieldRef` CP entry: locate the field in the referenced class,
/// its superclasses, or its superinterfaces, in that order.
pub fn resolve_field(
    globals: &Globals,
    cp: &CPool,
    index: u16,
) -> Result<ResolvedField, GeneralError> {
    let (class_name, field_name, _descriptor) =
        cp.member_ref(index).map_err(FatalError::BadConstantPool)?;
    let (class_name, field_name) = (class_name.to_owned(), field_name.to_owned());

    let mut current = class_name.clone();
    loop {
        let record = ensure_loaded(globals, &current)?;
        if let Some(field) = record.find_field(&field_name) {
            return Ok(ResolvedField {
                declaring_name: current,
                field: field.clone(),
                declaring: record,
            });
        }

        for &interface in &record.interfaces {
            let interface_name = globals.string_pool.tpath(interface);
            let interface_record = ensure_loaded(globals, &interface_name)?;
            if let Some(field) = interface_record.find_field(&field_name) {
                return Ok(ResolvedField {
                    declaring_name: interface_name,
                    field: field.clone(),
                    declaring: interface_record,
                });
            }
        }

        if record.superclass == string_pool::INVALID_NAME {
            return Err(VmError::NoSuchField {
                class: class_name,
                field: field_name,
            }
            .into());
        }
        current = globals.string_pool.tpath(record.superclass);
    }
}

/// A method reference resolved to either an intrinsic or bytecode.
pub struct ResolvedMethod {
    /// Internal name of the class the resolution landed on.
    pub class_name: String,
    pub name: String,
    pub descriptor: String,
    /// Full signature of the resolved target, usable as an intrinsic key.
    pub signature: String,
    pub target: Either<Intrinsic, (Arc<ClData>, usize)>,
}

/// Resolve a method by walking the superclass chain from `start_class`. At
/// each class, an intrinsic registered for that signature wins over a
/// bytecode body, so library classes keep their host implementations even
/// when real class files are on the class path.
pub fn resolve_method(
    globals: &Globals,
    start_class: &str,
    name: &str,
    descriptor: &str,
) -> Result<ResolvedMethod, VmError> {
    let mut current = start_class.to_owned();
    loop {
        let signature = signature_of(&current, name, descriptor);
        if let Some(intrinsic) = globals.intrinsics.lookup(&signature) {
            return Ok(ResolvedMethod {
                class_name: current,
                name: name.to_owned(),
                descriptor: descriptor.to_owned(),
                signature,
                target: Either::Left(intrinsic),
            });
        }

        let record = ensure_loaded(globals, &current)?;
        if let Some((method_index, _)) = record.find_method(name, descriptor) {
            return Ok(ResolvedMethod {
                class_name: current,
                name: name.to_owned(),
                descriptor: descriptor.to_owned(),
                signature,
                target: Either::Right((record, method_index)),
            });
        }

        if record.superclass == string_pool::INVALID_NAME {
            return Err(VmError::NoSuchMethod {
                class: start_class.to_owned(),
                method: name.to_owned(),
                descriptor: descriptor.to_owned(),
            });
        }
        current = globals.string_pool.tpath(record.superclass);
    }
}

/// Resolve a `MethodHandle` CP entry. Reference kinds 1-4 are field
/// accessors, 5-9 method invocations. The referenced member and its class
/// resolve fully; constructing the `MethodHandle` object itself is pending.
pub fn resolve_method_handle(
    globals: &Globals,
    cp: &CPool,
    index: u16,
) -> Result<ObjRef, GeneralError> {
    let handle = cp.method_handle(index).map_err(FatalError::BadConstantPool)?;

    match handle.ref_kind {
        1..=4 => {
            let resolved = resolve_field(globals, cp, handle.ref_index)?;
            globals.trace(
                TraceLevel::Class,
                &format!(
                    "method handle kind {} over field {}.{}",
                    handle.ref_kind, resolved.declaring_name, resolved.field.name
                ),
            );
            Err(VmError::ResolutionPending("field method handle construction").into())
        }
        5..=9 => {
            let (class_name, method_name, descriptor) = cp
                .member_ref(handle.ref_index)
                .map_err(FatalError::BadConstantPool)?;
            let (class_name, method_name, descriptor) = (
                class_name.to_owned(),
                method_name.to_owned(),
                descriptor.to_owned(),
            );
            ensure_loaded(globals, &class_name)?;
            globals.trace(
                TraceLevel::Class,
                &format!(
                    "method handle kind {} over {class_name}.{method_name}{descriptor}",
                    handle.ref_kind
                ),
            );
            Err(VmError::ResolutionPending("method handle construction").into())
        }
        kind => Err(VmError::IncompatibleClassChange(format!(
            "invalid method handle reference kind {kind}"
        ))
        .into()),
    }
}

/// Resolve a `MethodType` CP entry into a `java/lang/invoke/MethodType`
/// object by invoking the descriptor-string factory intrinsic.
pub fn resolve_method_type(
    globals: &Globals,
    cp: &CPool,
    index: u16,
) -> Result<ObjRef, GeneralError> {
    let descriptor = cp
        .method_type_descriptor(index)
        .map_err(FatalError::BadConstantPool)?
        .to_owned();
    method_type_from_descriptor(globals, &descriptor)
}

fn method_type_from_descriptor(
    globals: &Globals,
    descriptor: &str,
) -> Result<ObjRef, GeneralError> {
    const FACTORY: &str = "java/lang/invoke/MethodType.fromMethodDescriptorString(Ljava/lang/String;Ljava/lang/ClassLoader;)Ljava/lang/invoke/MethodType;";

    let Some(factory) = globals.intrinsics.lookup(FACTORY) else {
        return Err(GeneralError::Bootstrap(
            "MethodType factory intrinsic missing".to_owned(),
        ));
    };

    let descriptor_ref = string_object_from_str(&mut globals.heap.write(), descriptor);
    match factory.invoke(
        globals,
        FACTORY,
        vec![JvmValue::Ref(descriptor_ref), JvmValue::Null],
    ) {
        IntrinsicResult::Value(JvmValue::Ref(method_type)) => Ok(method_type),
        IntrinsicResult::Raise(raised) => Err(VmError::JavaException {
            class: raised.class,
            message: raised.message,
        }
        .into()),
        _ => Err(VmError::ResolutionPending("method type construction").into()),
    }
}

/// Resolve an `InvokeDynamic` CP entry: fetch the bootstrap specifier,
/// resolve the bootstrap method handle, the call-site name-and-type, and
/// the static arguments. Producing the CallSite object is an open item; the
/// skeleton currently surfaces the pending step as a linkage error.
pub fn resolve_call_site(
    globals: &Globals,
    cp: &CPool,
    index: u16,
) -> Result<ObjRef, GeneralError> {
    let dynamic = cp.invoke_dynamic(index).map_err(FatalError::BadConstantPool)?;
    let Some(bootstrap) = cp.bootstraps.get(usize::from(dynamic.bootstrap_index)) else {
        return Err(FatalError::BadConstantPool(
            robusta_base::classfile::CpError::BadIndex(dynamic.bootstrap_index),
        )
        .into());
    };

    globals.trace(
        TraceLevel::Class,
        &format!(
            "call site: bootstrap #{} with {} static args",
            dynamic.bootstrap_index,
            bootstrap.args.len()
        ),
    );

    // Resolving the bootstrap handle currently ends in the pending error;
    // the remaining steps are the mandated skeleton for when it lands.
    let _bootstrap_handle = resolve_method_handle(globals, cp, bootstrap.method_ref)?;

    let (_name, site_descriptor) = cp
        .name_and_type(dynamic.name_and_type_index)
        .map_err(FatalError::BadConstantPool)?;
    let site_descriptor = site_descriptor.to_owned();
    let _method_type = method_type_from_descriptor(globals, &site_descriptor)?;

    let mut static_args = Vec::with_capacity(bootstrap.args.len());
    for arg in &bootstrap.args {
        static_args.push(resolve_cp_constant(globals, cp, *arg)?);
    }

    Err(VmError::ResolutionPending("call site construction").into())
}

/// Resolve a loadable CP constant to a runtime value (LDC and bootstrap
/// static arguments share this).
pub fn resolve_cp_constant(
    globals: &Globals,
    cp: &CPool,
    index: u16,
) -> Result<JvmValue, GeneralError> {
    match cp.kind(index) {
        CpKind::IntegerConst => Ok(JvmValue::Int(i64::from(
            cp.int_const(index).map_err(FatalError::BadConstantPool)?,
        ))),
        CpKind::FloatConst => Ok(JvmValue::Float(f64::from(
            cp.float_const(index).map_err(FatalError::BadConstantPool)?,
        ))),
        CpKind::LongConst => Ok(JvmValue::Long(
            cp.long_const(index).map_err(FatalError::BadConstantPool)?,
        )),
        CpKind::DoubleConst => Ok(JvmValue::Double(
            cp.double_const(index).map_err(FatalError::BadConstantPool)?,
        )),
        CpKind::StringConst => {
            let text = cp
                .string_const(index)
                .map_err(FatalError::BadConstantPool)?
                .to_owned();
            Ok(JvmValue::Ref(string_object_from_str(
                &mut globals.heap.write(),
                &text,
            )))
        }
        CpKind::ClassRef => {
            let name = cp
                .class_name(index)
                .map_err(FatalError::BadConstantPool)?
                .to_owned();
            ensure_loaded(globals, &name)?;
            let klass = globals.string_pool.intern(&name);
            Ok(JvmValue::Ref(
                globals.class_objects.get_or_create(&globals.heap, klass),
            ))
        }
        CpKind::MethodType => Ok(JvmValue::Ref(resolve_method_type(globals, cp, index)?)),
        CpKind::MethodHandle => Ok(JvmValue::Ref(resolve_method_handle(globals, cp, index)?)),
        _ => Err(FatalError::BadConstantPool(
            robusta_base::classfile::CpError::BadIndex(index),
        )
        .into()),
    }
}

/// The class-subclass test used by CHECKCAST, INSTANCEOF, and exception
/// handler matching. Reflexive; walks the superclass chain and crosses
/// interfaces; arrays are covariant in their reference element type while
/// primitive arrays are invariant; everything is assignable to Object.
pub fn is_assignable(globals: &Globals, sub: &str, super_name: &str) -> Result<bool, VmError> {
    if sub == super_name || super_name == "java/lang/Object" {
        return Ok(true);
    }

    if let Some(sub_element) = array_element_name(sub) {
        // Arrays implement Cloneable and Serializable and nothing else.
        if super_name == "java/lang/Cloneable" || super_name == "java/io/Serializable" {
            return Ok(true);
        }
        let Some(super_element) = array_element_name(super_name) else {
            return Ok(false);
        };
        return match (class_element_of(sub_element), class_element_of(super_element)) {
            (Some(sub_class), Some(super_class)) => {
                is_assignable(globals, sub_class, super_class)
            }
            // Primitive (or mismatched-depth) element types only match
            // exactly, which the equality test above already covered.
            _ => Ok(sub_element == super_element),
        };
    }
    if array_element_name(super_name).is_some() {
        return Ok(false);
    }

    let mut current = sub.to_owned();
    loop {
        let record = ensure_loaded(globals, &current)?;
        for &interface in &record.interfaces {
            let interface_name = globals.string_pool.tpath(interface);
            if interface_name == super_name
                || is_assignable(globals, &interface_name, super_name)?
            {
                return Ok(true);
            }
        }

        if record.superclass == string_pool::INVALID_NAME {
            return Ok(false);
        }
        current = globals.string_pool.tpath(record.superclass);
        if current == super_name {
            return Ok(true);
        }
    }
}

/// Strip one array level: `[X` -> `X`. `None` for non-arrays.
fn array_element_name(name: &str) -> Option<&str> {
    name.strip_prefix('[')
}

/// The class name inside an element form: `Lx;` -> `x`, nested arrays stay
/// arrays. Primitive element forms return `None`.
fn class_element_of(element: &str) -> Option<&str> {
    if element.starts_with('[') {
        Some(element)
    } else {
        element.strip_prefix('L')?.strip_suffix(';')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignability_is_reflexive_and_object_topped() {
        let globals = Globals::test_instance();
        assert!(is_assignable(&globals, "java/lang/String", "java/lang/String").unwrap());
        assert!(is_assignable(&globals, "java/lang/String", "java/lang/Object").unwrap());
        assert!(is_assignable(&globals, "[I", "java/lang/Object").unwrap());
        assert!(!is_assignable(&globals, "java/lang/Object", "java/lang/String").unwrap());
    }

    #[test]
    fn exception_hierarchy_is_walkable() {
        let globals = Globals::test_instance();
        assert!(is_assignable(
            &globals,
            "java/lang/ArithmeticException",
            "java/lang/RuntimeException"
        )
        .unwrap());
        assert!(is_assignable(
            &globals,
            "java/lang/ArrayIndexOutOfBoundsException",
            "java/lang/Exception"
        )
        .unwrap());
        assert!(!is_assignable(
            &globals,
            "java/lang/ArithmeticException",
            "java/lang/NullPointerException"
        )
        .unwrap());
    }

    #[test]
    fn arrays_are_covariant_in_reference_elements_only() {
        let globals = Globals::test_instance();
        assert!(is_assignable(
            &globals,
            "[Ljava/lang/String;",
            "[Ljava/lang/Object;"
        )
        .unwrap());
        assert!(is_assignable(&globals, "[I", "[I").unwrap());
        assert!(!is_assignable(&globals, "[I", "[J").unwrap());
        assert!(!is_assignable(&globals, "[I", "[Ljava/lang/Object;").unwrap());
        assert!(!is_assignable(&globals, "java/lang/String", "[Ljava/lang/String;").unwrap());
    }

    #[test]
    fn missing_classes_resolve_to_errors() {
        let globals = Globals::test_instance();
        assert!(matches!(
            ensure_loaded(&globals, "com/example/Nope"),
            Err(VmError::NoClassDefFound(_))
        ));
    }

    #[test]
    fn method_resolution_prefers_intrinsics() {
        let globals = Globals::test_instance();
        let resolved = resolve_method(
            &globals,
            "java/io/PrintStream",
            "println",
            "(Ljava/lang/String;)V",
        )
        .unwrap();
        assert!(resolved.target.is_left());
        assert_eq!(
            resolved.signature,
            "java/io/PrintStream.println(Ljava/lang/String;)V"
        );
    }

    #[test]
    fn method_resolution_walks_to_object() {
        let globals = Globals::test_instance();
        let resolved =
            resolve_method(&globals, "java/lang/StringBuilder", "hashCode", "()I").unwrap();
        assert_eq!(resolved.class_name, "java/lang/Object");
        assert!(resolved.target.is_left());
    }
}
