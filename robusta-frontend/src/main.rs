use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;

use robusta::{start_execution, Globals, StateConfig};
use robusta_class_loaders::{
    ClassDirectories, ClassFileLoader, CombineLoader, JarClassFileLoader, JmodClassFileLoader,
};

mod formatter;

#[derive(Debug, Parser)]
#[command(name = "robusta")]
#[command(version, about = "A class-file interpreter", propagate_version = true)]
struct CliArgs {
    #[command(subcommand)]
    command: CliCommands,
}

#[derive(Debug, Subcommand)]
enum CliCommands {
    /// Run a class by internal name, located on the class path.
    Run {
        /// Internal name of the entry class, e.g. `com/example/Main`.
        #[arg(value_name = "CLASS_NAME")]
        class_name: String,

        /// Directories searched for class files, in order.
        #[arg(long = "class-path", value_name = "DIR")]
        class_path: Vec<PathBuf>,

        /// JMOD archives providing the trusted JDK bundle.
        #[arg(long = "jmod", value_name = "JMOD")]
        jmods: Vec<PathBuf>,

        /// Emit one trace line per executed instruction.
        #[arg(long)]
        trace_insts: bool,
    },
    /// Run the entry class out of a JAR archive.
    RunJar {
        #[arg(value_name = "JAR_FILE")]
        jar: PathBuf,

        /// Internal name of the entry class inside the JAR.
        #[arg(long = "main-class", value_name = "CLASS_NAME")]
        main_class: String,

        #[arg(long = "jmod", value_name = "JMOD")]
        jmods: Vec<PathBuf>,

        #[arg(long)]
        trace_insts: bool,
    },
}

struct EmptyWriter;

impl std::io::Write for EmptyWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn make_log_file() -> Option<std::sync::Arc<std::fs::File>> {
    std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("./robusta.log")
        .ok()
        .map(std::sync::Arc::new)
}

fn init_logging() {
    let should_log_console = std::env::var("ROBUSTA_LOG_CONSOLE")
        .map(|x| x != "0")
        .unwrap_or(true);
    let should_log_file = std::env::var("ROBUSTA_LOG_FILE")
        .map(|x| x != "0")
        .unwrap_or(false);

    let console_layer = should_log_console.then(|| {
        tracing_subscriber::fmt::Layer::default()
            .with_writer(std::io::stderr)
            .without_time()
            .event_format(formatter::Formatter)
    });
    let file_layer = should_log_file
        .then(make_log_file)
        .flatten()
        .map(|log_file| {
            tracing_subscriber::fmt::Layer::default()
                .with_writer(log_file)
                .without_time()
                .event_format(formatter::Formatter)
        });

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(StateConfig::compute_tracing_level())
        .without_time()
        .event_format(formatter::Formatter)
        .with_writer(|| EmptyWriter)
        .finish()
        .with(console_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to set global default tracing subscriber");
}

fn chain_jmods(
    base: Box<dyn ClassFileLoader>,
    jmods: &[PathBuf],
) -> Box<dyn ClassFileLoader> {
    let mut loader = base;
    for jmod in jmods {
        match JmodClassFileLoader::new(jmod.clone()) {
            Ok(jmod_loader) => {
                loader = Box::new(CombineLoader::new(loader, jmod_loader));
            }
            Err(err) => {
                tracing::error!("failed to open jmod {}: {err}", jmod.display());
                std::process::exit(2);
            }
        }
    }
    loader
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging();

    let conf = StateConfig::new();

    let (loader, class_name, trace_insts): (Box<dyn ClassFileLoader>, String, bool) =
        match &args.command {
            CliCommands::Run {
                class_name,
                class_path,
                jmods,
                trace_insts,
            } => {
                let mut directories = ClassDirectories::new();
                if class_path.is_empty() {
                    let _ = directories.add(std::path::Path::new("."));
                }
                for dir in class_path {
                    if let Err(err) = directories.add(dir) {
                        tracing::error!("bad class path entry {}: {err}", dir.display());
                        return ExitCode::from(2);
                    }
                }
                (
                    chain_jmods(Box::new(directories), jmods),
                    class_name.clone(),
                    *trace_insts,
                )
            }
            CliCommands::RunJar {
                jar,
                main_class,
                jmods,
                trace_insts,
            } => {
                let jar_loader = match JarClassFileLoader::new(jar.clone()) {
                    Ok(loader) => loader,
                    Err(err) => {
                        tracing::error!("failed to open jar {}: {err}", jar.display());
                        return ExitCode::from(2);
                    }
                };
                (
                    chain_jmods(Box::new(jar_loader), jmods),
                    main_class.clone(),
                    *trace_insts,
                )
            }
        };

    tracing::info!("robusta initializing");

    let globals = match Globals::new(conf, loader) {
        Ok(globals) => globals,
        Err(err) => {
            tracing::error!("failed to assemble the VM: {err}");
            return ExitCode::from(2);
        }
    };

    let mut main_thread = globals.spawn_thread();
    main_thread.trace_insts |= trace_insts;

    match start_execution(&class_name, &mut main_thread, &globals) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::from(1)
        }
    }
}
