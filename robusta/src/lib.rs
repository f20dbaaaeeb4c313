#![warn(clippy::pedantic)]
// State is threaded through long call chains; grouping arguments would hide
// which subsystem each function actually touches.
#![allow(clippy::too_many_arguments)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::similar_names)]
// The numeric model leans on Java's defined narrowing and wrapping casts;
// flagging each one individually would drown the real findings.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use robusta_base::class::{ClData, FieldRec};
use robusta_base::classfile::parser::ParseError;
use robusta_base::classfile::{CpError, FormatError};
use robusta_base::descriptor::DescriptorError;
use robusta_base::method_area::MethodArea;
use robusta_base::string_pool::StringPool;
use robusta_base::FieldAccessFlags;
use robusta_class_loaders::{ClassFileLoader, LoadClassFileError};

use crate::class_objects::ClassObjects;
use crate::frame::{Frame, Locals};
use crate::heap::{Heap, ObjRef};
use crate::intrinsics::IntrinsicTable;
use crate::jthread::{JavaThread, ThreadTable};
use crate::object::{Field as ObjField, Object};
use crate::statics::{StaticValue, StaticsRegistry};
use crate::trace::{TraceLevel, TraceSink, TracingSink};
use crate::value::JvmValue;

pub mod class_objects;
pub mod exceptions;
pub mod frame;
pub mod heap;
pub mod interp;
pub mod intrinsics;
pub mod jthread;
pub mod object;
pub mod resolver;
pub mod statics;
pub mod trace;
pub mod value;

pub const ENV_TRACING_LEVEL: &str = "ROBUSTA_LOG_LEVEL";
pub const ENV_TRACE_FLAGS: &str = "ROBUSTA_TRACE";
pub const DEFAULT_TRACING_LEVEL: tracing::Level = tracing::Level::WARN;

/// Faults that terminate the executing thread. These represent broken VM
/// invariants (stack under/overflow, unknown opcodes, bad pool indices) and
/// are never surfaced to Java code as throwables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    OperandStackUnderflow,
    OperandStackOverflow,
    FrameStackOverflow,
    FrameStackEmpty,
    UnknownOpcode { opcode: u8, pc: usize },
    TruncatedInstruction { pc: usize },
    BadBranchTarget { pc: usize },
    ExpectedStackInt,
    ExpectedStackLong,
    ExpectedStackFloat,
    ExpectedStackDouble,
    ExpectedStackReference,
    ExpectedArray,
    ExpectedLocalValue(u16),
    StaleObjectRef,
    BadConstantPool(CpError),
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::OperandStackUnderflow => f.write_str("operand stack underflow"),
            FatalError::OperandStackOverflow => f.write_str("operand stack overflow"),
            FatalError::FrameStackOverflow => f.write_str("frame stack exceeded its depth bound"),
            FatalError::FrameStackEmpty => f.write_str("no frame to execute"),
            FatalError::UnknownOpcode { opcode, pc } => {
                write!(f, "unknown opcode 0x{opcode:02x} at pc {pc}")
            }
            FatalError::TruncatedInstruction { pc } => {
                write!(f, "bytecode ends inside the instruction at pc {pc}")
            }
            FatalError::BadBranchTarget { pc } => {
                write!(f, "branch at pc {pc} leaves the method")
            }
            FatalError::ExpectedStackInt => f.write_str("expected an int on the operand stack"),
            FatalError::ExpectedStackLong => f.write_str("expected a long on the operand stack"),
            FatalError::ExpectedStackFloat => f.write_str("expected a float on the operand stack"),
            FatalError::ExpectedStackDouble => {
                f.write_str("expected a double on the operand stack")
            }
            FatalError::ExpectedStackReference => {
                f.write_str("expected a reference on the operand stack")
            }
            FatalError::ExpectedArray => f.write_str("expected an array object"),
            FatalError::ExpectedLocalValue(index) => {
                write!(f, "local slot {index} holds no usable value")
            }
            FatalError::StaleObjectRef => f.write_str("dangling object handle"),
            FatalError::BadConstantPool(err) => write!(f, "{err}"),
        }
    }
}

impl From<CpError> for FatalError {
    fn from(err: CpError) -> FatalError {
        FatalError::BadConstantPool(err)
    }
}

/// Errors of the linking machinery. When a Java frame is active these are
/// converted into the corresponding `java/lang/...Error` throwable; during
/// startup they abort the process.
#[derive(Debug)]
pub enum VmError {
    NoClassDefFound(String),
    ClassFormat { class: String, error: ParseError },
    UnsupportedClassVersion { class: String, major: u16, minor: u16 },
    Verify { class: String, error: FormatError },
    Load { class: String, error: LoadClassFileError },
    NoSuchField { class: String, field: String },
    NoSuchMethod { class: String, method: String, descriptor: String },
    /// Static/instance mismatches and other linkage-class violations.
    IncompatibleClassChange(String),
    ClinitFailed(String),
    BadDescriptor { descriptor: String, error: DescriptorError },
    /// A resolution path whose final step is not yet designed (method-handle
    /// object construction, call-site construction).
    ResolutionPending(&'static str),
    /// A resolution step that must surface as a specific Java exception.
    JavaException { class: String, message: String },
}

impl VmError {
    /// The Java throwable this error is surfaced as.
    #[must_use]
    pub fn java_class(&self) -> &str {
        match self {
            VmError::NoClassDefFound(_) | VmError::Load { .. } => {
                "java/lang/NoClassDefFoundError"
            }
            VmError::ClassFormat { .. } | VmError::BadDescriptor { .. } => {
                "java/lang/ClassFormatError"
            }
            VmError::UnsupportedClassVersion { .. } => "java/lang/UnsupportedClassVersionError",
            VmError::Verify { .. } => "java/lang/VerifyError",
            VmError::NoSuchField { .. } => "java/lang/NoSuchFieldError",
            VmError::NoSuchMethod { .. } => "java/lang/NoSuchMethodError",
            VmError::IncompatibleClassChange(_) => "java/lang/IncompatibleClassChangeError",
            VmError::ClinitFailed(_) => "java/lang/ExceptionInInitializerError",
            VmError::ResolutionPending(_) => "java/lang/LinkageError",
            VmError::JavaException { class, .. } => class,
        }
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::NoClassDefFound(class) => write!(f, "class not found: {class}"),
            VmError::ClassFormat { class, error } => write!(f, "{class}: {error}"),
            VmError::UnsupportedClassVersion {
                class,
                major,
                minor,
            } => write!(f, "{class}: unsupported class file version {major}.{minor}"),
            VmError::Verify { class, error } => write!(f, "{class}: {error}"),
            VmError::Load { class, error } => write!(f, "{class}: {error}"),
            VmError::NoSuchField { class, field } => write!(f, "no such field: {class}.{field}"),
            VmError::NoSuchMethod {
                class,
                method,
                descriptor,
            } => write!(f, "no such method: {class}.{method}{descriptor}"),
            VmError::IncompatibleClassChange(msg) => f.write_str(msg),
            VmError::ClinitFailed(class) => {
                write!(f, "static initializer of {class} failed")
            }
            VmError::BadDescriptor { descriptor, error } => {
                write!(f, "bad descriptor {descriptor:?}: {error}")
            }
            VmError::ResolutionPending(what) => {
                write!(f, "resolution incomplete: {what} pending")
            }
            VmError::JavaException { message, .. } => f.write_str(message),
        }
    }
}

/// Top-level composition of everything that can go wrong while executing.
#[derive(Debug)]
pub enum GeneralError {
    Vm(VmError),
    Fatal(FatalError),
    /// The thread died with an uncaught Java exception (already reported to
    /// the error sink).
    UncaughtException,
    /// Startup could not assemble the VM (duplicate intrinsics and the like).
    Bootstrap(String),
}

impl fmt::Display for GeneralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneralError::Vm(err) => write!(f, "{err}"),
            GeneralError::Fatal(err) => write!(f, "fatal: {err}"),
            GeneralError::UncaughtException => f.write_str("uncaught exception"),
            GeneralError::Bootstrap(msg) => write!(f, "bootstrap failed: {msg}"),
        }
    }
}

impl From<VmError> for GeneralError {
    fn from(err: VmError) -> GeneralError {
        GeneralError::Vm(err)
    }
}

impl From<FatalError> for GeneralError {
    fn from(err: FatalError) -> GeneralError {
        GeneralError::Fatal(err)
    }
}

/// Which trace channels are enabled process-wide. Instruction tracing is
/// additionally gated by the per-thread flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceFlags {
    pub class: bool,
    pub init: bool,
    pub inst: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct StateConfig {
    pub trace: TraceFlags,
    pub max_frames: usize,
}

impl StateConfig {
    #[must_use]
    pub fn new() -> StateConfig {
        StateConfig {
            trace: Self::trace_flags_from_env(),
            max_frames: jthread::DEFAULT_MAX_FRAMES,
        }
    }

    /// Parse `ROBUSTA_TRACE` as a comma-separated channel list; `*` enables
    /// everything.
    #[must_use]
    pub fn trace_flags_from_env() -> TraceFlags {
        let mut flags = TraceFlags::default();
        let Ok(spec) = std::env::var(ENV_TRACE_FLAGS) else {
            return flags;
        };
        for part in spec.split(',') {
            match part.trim().to_ascii_lowercase().as_str() {
                "class" => flags.class = true,
                "init" => flags.init = true,
                "inst" => flags.inst = true,
                "verbose" => flags.verbose = true,
                "*" => {
                    flags = TraceFlags {
                        class: true,
                        init: true,
                        inst: true,
                        verbose: true,
                    };
                }
                _ => {}
            }
        }
        flags
    }

    /// The `tracing` level the frontend installs, from `ROBUSTA_LOG_LEVEL`.
    #[must_use]
    pub fn compute_tracing_level() -> tracing::Level {
        let Ok(env_log) = std::env::var(ENV_TRACING_LEVEL) else {
            return DEFAULT_TRACING_LEVEL;
        };
        if env_log.eq_ignore_ascii_case("trace") || env_log == "*" {
            tracing::Level::TRACE
        } else if env_log.eq_ignore_ascii_case("info") {
            tracing::Level::INFO
        } else if env_log.eq_ignore_ascii_case("warn") {
            tracing::Level::WARN
        } else if env_log.eq_ignore_ascii_case("error") {
            tracing::Level::ERROR
        } else {
            DEFAULT_TRACING_LEVEL
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// An output buffer shareable between the VM and a capturing test/embedder.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    #[must_use]
    pub fn new() -> SharedBuffer {
        SharedBuffer::default()
    }

    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// The process-wide shared state: every table the interpreter, resolver, and
/// intrinsics consult. Each table carries its own reader/writer lock; the
/// common path after startup is read-only.
pub struct Globals {
    pub conf: StateConfig,
    pub string_pool: StringPool,
    pub method_area: MethodArea,
    pub statics: StaticsRegistry,
    pub intrinsics: IntrinsicTable,
    pub class_objects: ClassObjects,
    pub heap: RwLock<Heap>,
    pub threads: ThreadTable,
    pub loader: Mutex<Box<dyn ClassFileLoader>>,
    pub trace_sink: Box<dyn TraceSink>,
    /// Destination of `System.out`; injected so embedders can capture it.
    pub out: Mutex<Box<dyn Write + Send>>,
    /// Destination of `System.err` and uncaught-exception reports.
    pub err: Mutex<Box<dyn Write + Send>>,
    system_out: ObjRef,
    system_err: ObjRef,
    #[cfg(test)]
    test_out: Option<SharedBuffer>,
    #[cfg(test)]
    test_err: Option<SharedBuffer>,
}

impl Globals {
    pub fn new(
        conf: StateConfig,
        loader: Box<dyn ClassFileLoader>,
    ) -> Result<Globals, GeneralError> {
        Globals::with_sinks(
            conf,
            loader,
            Box::new(std::io::stdout()),
            Box::new(std::io::stderr()),
            Box::new(TracingSink),
        )
    }

    pub fn with_sinks(
        conf: StateConfig,
        loader: Box<dyn ClassFileLoader>,
        out: Box<dyn Write + Send>,
        err: Box<dyn Write + Send>,
        trace_sink: Box<dyn TraceSink>,
    ) -> Result<Globals, GeneralError> {
        let string_pool = StringPool::new();
        let heap = RwLock::new(Heap::new());

        // The stream objects behind System.out / System.err.
        let print_stream = string_pool.intern("java/io/PrintStream");
        let (system_out, system_err) = {
            let mut heap = heap.write();
            let mut out_obj = Object::new_of_class(print_stream);
            out_obj.set_field(
                intrinsics::java_io::FD_FIELD,
                ObjField::scalar("I", JvmValue::Int(intrinsics::java_io::FD_OUT)),
            );
            let mut err_obj = Object::new_of_class(print_stream);
            err_obj.set_field(
                intrinsics::java_io::FD_FIELD,
                ObjField::scalar("I", JvmValue::Int(intrinsics::java_io::FD_ERR)),
            );
            (heap.alloc(out_obj), heap.alloc(err_obj))
        };

        let globals = Globals {
            conf,
            string_pool,
            method_area: MethodArea::new(),
            statics: StaticsRegistry::new(),
            intrinsics: IntrinsicTable::new(),
            class_objects: ClassObjects::new(),
            heap,
            threads: ThreadTable::new(),
            loader: Mutex::new(loader),
            trace_sink,
            out: Mutex::new(out),
            err: Mutex::new(err),
            system_out,
            system_err,
            #[cfg(test)]
            test_out: None,
            #[cfg(test)]
            test_err: None,
        };

        globals.bootstrap()?;
        Ok(globals)
    }

    /// Emit a trace line, honoring the configured channel flags. Errors are
    /// never filtered.
    pub fn trace(&self, level: TraceLevel, msg: &str) {
        let enabled = match level {
            TraceLevel::Class => self.conf.trace.class,
            TraceLevel::Init => self.conf.trace.init,
            TraceLevel::Inst => self.conf.trace.inst,
            TraceLevel::Verbose => self.conf.trace.verbose,
            TraceLevel::Error => true,
        };
        if enabled {
            self.trace_sink.trace(level, msg);
        }
    }

    /// The `System.out` stream object.
    #[must_use]
    pub fn system_out(&self) -> ObjRef {
        self.system_out
    }

    /// The `System.err` stream object.
    #[must_use]
    pub fn system_err(&self) -> ObjRef {
        self.system_err
    }

    /// Register and build a Java thread honoring the configured frame-depth
    /// bound and trace flags.
    #[must_use]
    pub fn spawn_thread(&self) -> JavaThread {
        let mut thread = JavaThread::new(self.threads.register());
        thread.frames = jthread::FrameStack::new(self.conf.max_frames);
        thread.trace_insts = self.conf.trace.inst;
        thread
    }

    fn bootstrap(&self) -> Result<(), GeneralError> {
        intrinsics::load_all(&self.intrinsics)
            .map_err(|err| GeneralError::Bootstrap(err.to_string()))?;

        self.seed_bootstrap_classes();
        self.statics.preload();
        self.seed_system_statics();
        self.seed_wrapper_types();
        Ok(())
    }

    /// Publish synthesized records for the classes the VM cannot run
    /// without. Their behavior lives in intrinsics; the records exist so
    /// that resolution, subtype checks, and exception handling have a
    /// hierarchy to walk before any JDK bundle is consulted.
    fn seed_bootstrap_classes(&self) {
        // (class, superclass); insertion order keeps supers first.
        const BOOTSTRAP_CLASSES: &[(&str, &str)] = &[
            ("java/lang/Object", ""),
            ("java/lang/Class", "java/lang/Object"),
            ("java/lang/String", "java/lang/Object"),
            ("java/io/PrintStream", "java/lang/Object"),
            ("java/lang/Runtime", "java/lang/Object"),
            ("java/lang/Thread", "java/lang/Object"),
            ("java/lang/StringBuilder", "java/lang/Object"),
            ("java/lang/invoke/MethodHandle", "java/lang/Object"),
            ("java/lang/invoke/MethodType", "java/lang/Object"),
            ("java/lang/Byte", "java/lang/Object"),
            ("java/lang/Character", "java/lang/Object"),
            ("java/lang/Double", "java/lang/Object"),
            ("java/lang/Float", "java/lang/Object"),
            ("java/lang/Integer", "java/lang/Object"),
            ("java/lang/Long", "java/lang/Object"),
            ("java/lang/Short", "java/lang/Object"),
            ("java/lang/Boolean", "java/lang/Object"),
            ("java/lang/Void", "java/lang/Object"),
            ("java/lang/Throwable", "java/lang/Object"),
            ("java/lang/Error", "java/lang/Throwable"),
            ("java/lang/LinkageError", "java/lang/Error"),
            ("java/lang/NoClassDefFoundError", "java/lang/LinkageError"),
            ("java/lang/ClassFormatError", "java/lang/LinkageError"),
            (
                "java/lang/UnsupportedClassVersionError",
                "java/lang/ClassFormatError",
            ),
            ("java/lang/VerifyError", "java/lang/LinkageError"),
            (
                "java/lang/IncompatibleClassChangeError",
                "java/lang/LinkageError",
            ),
            (
                "java/lang/NoSuchFieldError",
                "java/lang/IncompatibleClassChangeError",
            ),
            (
                "java/lang/NoSuchMethodError",
                "java/lang/IncompatibleClassChangeError",
            ),
            (
                "java/lang/ExceptionInInitializerError",
                "java/lang/LinkageError",
            ),
            ("java/lang/VirtualMachineError", "java/lang/Error"),
            ("java/lang/Exception", "java/lang/Throwable"),
            ("java/lang/RuntimeException", "java/lang/Exception"),
            ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
            (
                "java/lang/NullPointerException",
                "java/lang/RuntimeException",
            ),
            (
                "java/lang/IndexOutOfBoundsException",
                "java/lang/RuntimeException",
            ),
            (
                "java/lang/ArrayIndexOutOfBoundsException",
                "java/lang/IndexOutOfBoundsException",
            ),
            (
                "java/lang/StringIndexOutOfBoundsException",
                "java/lang/IndexOutOfBoundsException",
            ),
            ("java/lang/ClassCastException", "java/lang/RuntimeException"),
            (
                "java/lang/NegativeArraySizeException",
                "java/lang/RuntimeException",
            ),
            ("java/lang/ArrayStoreException", "java/lang/RuntimeException"),
            (
                "java/lang/IllegalArgumentException",
                "java/lang/RuntimeException",
            ),
            (
                "java/lang/UnsupportedOperationException",
                "java/lang/RuntimeException",
            ),
        ];

        for (class, superclass) in BOOTSTRAP_CLASSES {
            let name = self.string_pool.intern(class);
            let superclass = if superclass.is_empty() {
                robusta_base::string_pool::INVALID_NAME
            } else {
                self.string_pool.intern(superclass)
            };

            let fields = if *class == "java/lang/Throwable" {
                vec![FieldRec {
                    name: "detailMessage".to_owned(),
                    descriptor: "Ljava/lang/String;".to_owned(),
                    access_flags: FieldAccessFlags::PRIVATE,
                    constant_value: None,
                }]
            } else {
                Vec::new()
            };

            self.method_area
                .insert(ClData::synthesized(name, superclass, fields));
        }

        // java/lang/System carries the two stream statics.
        let system = self.string_pool.intern("java/lang/System");
        let object = self.string_pool.intern("java/lang/Object");
        let stream_field = |name: &str| FieldRec {
            name: name.to_owned(),
            descriptor: "Ljava/io/PrintStream;".to_owned(),
            access_flags: FieldAccessFlags::PUBLIC
                | FieldAccessFlags::STATIC
                | FieldAccessFlags::FINAL,
            constant_value: None,
        };
        self.method_area.insert(ClData::synthesized(
            system,
            object,
            vec![stream_field("out"), stream_field("err")],
        ));
    }

    fn seed_system_statics(&self) {
        self.statics.add(
            "java/lang/System.out",
            StaticValue::new("Ljava/io/PrintStream;", JvmValue::Ref(self.system_out)),
        );
        self.statics.add(
            "java/lang/System.err",
            StaticValue::new("Ljava/io/PrintStream;", JvmValue::Ref(self.system_err)),
        );
    }

    /// The primitive wrapper `TYPE` statics; method-type resolution reads
    /// them, and they are expected to exist before any descriptor names a
    /// primitive.
    fn seed_wrapper_types(&self) {
        const WRAPPERS: &[&str] = &[
            "java/lang/Byte",
            "java/lang/Character",
            "java/lang/Double",
            "java/lang/Float",
            "java/lang/Integer",
            "java/lang/Long",
            "java/lang/Short",
            "java/lang/Boolean",
            "java/lang/Void",
        ];
        for wrapper in WRAPPERS {
            let klass = self.string_pool.intern(wrapper);
            let class_ref = self.class_objects.get_or_create(&self.heap, klass);
            self.statics.add(
                &format!("{wrapper}.TYPE"),
                StaticValue::new("Ljava/lang/Class;", JvmValue::Ref(class_ref)),
            );
        }
    }

    /// A VM over buffered sinks and an empty loader, for unit tests.
    #[cfg(test)]
    pub(crate) fn test_instance() -> Globals {
        Globals::test_instance_with_loader(Box::new(robusta_class_loaders::EmptyLoader))
    }

    #[cfg(test)]
    pub(crate) fn test_instance_with_loader(loader: Box<dyn ClassFileLoader>) -> Globals {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let mut globals = Globals::with_sinks(
            StateConfig {
                trace: TraceFlags::default(),
                max_frames: jthread::DEFAULT_MAX_FRAMES,
            },
            loader,
            Box::new(out.clone()),
            Box::new(err.clone()),
            Box::new(trace::BufferSink::new()),
        )
        .expect("test globals must assemble");
        globals.test_out = Some(out);
        globals.test_err = Some(err);
        globals
    }

    #[cfg(test)]
    pub(crate) fn captured_out(&self) -> String {
        self.test_out.as_ref().expect("test sinks installed").contents()
    }

    #[cfg(test)]
    pub(crate) fn captured_err(&self) -> String {
        self.test_err.as_ref().expect("test sinks installed").contents()
    }
}

/// Locate `main([Ljava/lang/String;)V` on the named class, build its frame
/// on the given thread, and drive the interpreter to termination. Returns
/// the process exit code.
pub fn start_execution(
    main_class_internal_name: &str,
    main_thread: &mut JavaThread,
    globals: &Globals,
) -> Result<i32, GeneralError> {
    let record = resolver::ensure_loaded(globals, main_class_internal_name)?;
    resolver::initialize_class(globals, main_thread, &record)?;

    let Some((method_index, method)) = record.find_method("main", "([Ljava/lang/String;)V")
    else {
        return Err(VmError::NoSuchMethod {
            class: main_class_internal_name.to_owned(),
            method: "main".to_owned(),
            descriptor: "([Ljava/lang/String;)V".to_owned(),
        }
        .into());
    };
    let max_locals = method.code.as_ref().map_or(1, |code| code.max_locals);

    // The String[] args array. Command-line arguments beyond the class name
    // are the frontend's concern; an empty array is the core's default.
    let args_ref = {
        let mut heap = globals.heap.write();
        heap.alloc(Object::new_ref_array(
            &globals.string_pool,
            "java/lang/String",
            0,
        ))
    };

    let frame = Frame::new(
        record.name,
        globals.string_pool.intern("main"),
        "([Ljava/lang/String;)V".to_owned(),
        Arc::clone(&record),
        method_index,
        Locals::from_args(vec![JvmValue::Ref(args_ref)], max_locals),
        main_thread.id,
    );

    main_thread
        .frames
        .push(frame)
        .map_err(GeneralError::Fatal)?;

    match interp::run_to_completion(globals, main_thread, 0) {
        Ok(()) => Ok(0),
        Err(GeneralError::UncaughtException) => Ok(1),
        Err(other) => Err(other),
    }
}
