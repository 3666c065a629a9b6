use crate::class_loader::{Archive, ClassPath, manifest_entry_point};
use crate::error::VmError;
use crate::vm::{SystemClock, VirtualMachine};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub mod class_loader;
pub mod error;
pub mod heap;
pub mod interpreter;
pub mod keys;
pub mod native;
pub mod rt;
pub mod scheduler;
pub mod thread;
pub mod vm;

pub use keys::{ClassId, MethodId, Symbol, ThreadId};
pub use vm::VirtualMachine as Vm;

// Re-exported for macro expansion.
pub use tracing_log;

#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        $crate::tracing_log::log::debug!($($arg)*)
    };
}

pub struct VmConfig {
    /// Application archive; entries are looked up as `<name>.class`.
    pub app_jar: Option<PathBuf>,
    /// Bootstrap library archive, searched after the application archive.
    pub library_jar: Option<PathBuf>,
    /// A single bare class file, mounted as a one-entry application archive.
    pub class_file: Option<PathBuf>,
    /// Dotted or slashed main class name; defaults to the manifest entry.
    pub main_class: Option<String>,
    /// Run the MIDlet lifecycle (`<init>` + `startApp`) instead of `main`.
    pub midlet: bool,
    /// Bytecode instructions per scheduler tick.
    pub quantum: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            app_jar: None,
            library_jar: None,
            class_file: None,
            main_class: None,
            midlet: false,
            quantum: VirtualMachine::DEFAULT_QUANTUM,
        }
    }
}

/// Build a VM from the configuration, launch the entry point, run the pump
/// to completion, and return the exit status.
pub fn start(config: VmConfig) -> Result<i32, VmError> {
    let app = match (&config.app_jar, &config.class_file) {
        (Some(jar), _) => Archive::open_jar(jar)?,
        (None, Some(class_file)) => {
            let bytes = std::fs::read(class_file)
                .map_err(|e| VmError::HostFatal(format!("cannot read {}: {e}", class_file.display())))?;
            let cf = cldc_classfile::ClassFile::parse(&bytes)?;
            let name_idx = match cf.cp.get(cf.this_class) {
                Some(cldc_classfile::constant::ConstantInfo::Class(idx)) => *idx,
                _ => return Err(VmError::MalformedClass(cldc_classfile::ClassFileError::BadAttribute("this_class"))),
            };
            let name = cf
                .cp
                .utf8_bytes(name_idx)
                .map(cldc_classfile::mutf8::to_string)
                .ok_or(VmError::MalformedClass(cldc_classfile::ClassFileError::BadAttribute("this_class")))?;
            let mut entries = HashMap::new();
            entries.insert(format!("{name}.class"), bytes);
            Archive::from_entries(entries)
        }
        (None, None) => {
            return Err(VmError::HostFatal("no application archive or class file given".to_string()));
        }
    };
    let library = config.library_jar.as_deref().map(Archive::open_jar).transpose()?;
    let class_path = ClassPath::new(app, library);

    let vm = VirtualMachine::new_with(class_path, Arc::new(SystemClock), config.quantum)?;

    let mut midlet = config.midlet;
    let main_class = match config.main_class {
        Some(name) => name.replace('.', "/"),
        None => {
            let manifest = vm
                .read_resource("META-INF/MANIFEST.MF")
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();
            let (name, is_midlet) = manifest_entry_point(&manifest)
                .ok_or_else(|| VmError::HostFatal("no main class in manifest".to_string()))?;
            midlet |= is_midlet;
            name.replace('.', "/")
        }
    };

    if midlet {
        vm.launch_midlet(&main_class)?;
    } else {
        vm.launch_main(&main_class, &[])?;
    }

    let status = vm.run()?;
    // no reclamation during execution; retained objects go at shutdown
    vm.heap_write().clear();
    Ok(status)
}
