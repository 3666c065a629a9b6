use clap::Parser;
use cldc_runtime::VmConfig;
use std::path::PathBuf;
use tracing_log::log::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "CLDC/MIDP virtual machine")]
pub struct Args {
    #[arg(help = "Application JAR, or a single .class file")]
    pub app: PathBuf,

    #[arg(
        short = 'b',
        long = "bootclasspath",
        help = "Bootstrap library JAR searched after the application archive"
    )]
    pub bootclasspath: Option<PathBuf>,

    #[arg(
        short = 'm',
        long = "main-class",
        help = "Entry class (dotted or slashed); defaults to the manifest's Main-Class or MIDlet-1"
    )]
    pub main_class: Option<String>,

    #[arg(long, help = "Run the MIDlet lifecycle (<init> + startApp) instead of main")]
    pub midlet: bool,

    #[arg(
        short = 'q',
        long = "quantum",
        default_value_t = 5000,
        help = "Bytecode instructions per scheduler tick"
    )]
    pub quantum: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    debug!("provided command line arguments: {args:?}");

    let is_class_file = args.app.extension().is_some_and(|ext| ext == "class");
    let config = VmConfig {
        app_jar: (!is_class_file).then(|| args.app.clone()),
        class_file: is_class_file.then(|| args.app.clone()),
        library_jar: args.bootclasspath,
        main_class: args.main_class,
        midlet: args.midlet,
        quantum: args.quantum,
    };

    match cldc_runtime::start(config) {
        Ok(status) => std::process::exit(status),
        Err(e) => {
            eprintln!("vm error: {e}");
            std::process::exit(1);
        }
    }
}
