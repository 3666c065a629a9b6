use crate::debug_log;
use crate::error::VmError;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// One mounted archive: a ZIP read fully into memory, or a plain entry map
/// (bare class files, tests).
pub enum Archive {
    Jar(ZipArchive<std::io::Cursor<Vec<u8>>>),
    Memory(HashMap<String, Vec<u8>>),
}

impl Archive {
    pub fn open_jar(path: &Path) -> Result<Archive, VmError> {
        let bytes = std::fs::read(path)
            .map_err(|e| VmError::HostFatal(format!("cannot read archive {}: {e}", path.display())))?;
        let zip = ZipArchive::new(std::io::Cursor::new(bytes))
            .map_err(|e| VmError::HostFatal(format!("cannot open archive {}: {e}", path.display())))?;
        Ok(Archive::Jar(zip))
    }

    pub fn from_entries(entries: HashMap<String, Vec<u8>>) -> Archive {
        Archive::Memory(entries)
    }

    pub fn read(&mut self, path: &str) -> Option<Vec<u8>> {
        match self {
            Archive::Jar(zip) => {
                let mut file = zip.by_name(path).ok()?;
                let mut buf = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut buf).ok()?;
                Some(buf)
            }
            Archive::Memory(entries) => entries.get(path).cloned(),
        }
    }
}

/// Application archive first, then the bootstrap library.
pub struct ClassPath {
    app: Archive,
    library: Option<Archive>,
}

impl ClassPath {
    pub fn new(app: Archive, library: Option<Archive>) -> Self {
        Self { app, library }
    }

    pub fn find_class(&mut self, internal_name: &str) -> Option<Vec<u8>> {
        let path = format!("{internal_name}.class");
        if let Some(bytes) = self.app.read(&path) {
            debug_log!("bytecode of \"{internal_name}\" found in application archive");
            return Some(bytes);
        }
        let bytes = self.library.as_mut()?.read(&path)?;
        debug_log!("bytecode of \"{internal_name}\" found in library archive");
        Some(bytes)
    }

    pub fn read_resource(&mut self, path: &str) -> Option<Vec<u8>> {
        let path = path.trim_start_matches('/');
        self.app
            .read(path)
            .or_else(|| self.library.as_mut()?.read(path))
    }
}

/// Extract the entry point from a MANIFEST.MF body: `Main-Class`, or the
/// class name field of `MIDlet-1` (`Name, Icon, Class`). Returns the class
/// name and whether it is a MIDlet.
pub fn manifest_entry_point(manifest: &str) -> Option<(String, bool)> {
    let mut main_class = None;
    let mut midlet_class = None;
    for line in manifest.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(value) = line.strip_prefix("Main-Class:") {
            main_class = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("MIDlet-1:") {
            midlet_class = value.rsplit(',').next().map(|s| s.trim().to_string());
        }
    }
    match midlet_class {
        Some(class) if !class.is_empty() => Some((class, true)),
        _ => main_class.map(|class| (class, false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_prefers_midlet_entry() {
        let manifest = "Manifest-Version: 1.0\r\nMain-Class: com.example.Main\r\nMIDlet-1: Demo, /icon.png, com.example.DemoMIDlet\r\n";
        assert_eq!(
            manifest_entry_point(manifest),
            Some(("com.example.DemoMIDlet".to_string(), true))
        );
    }

    #[test]
    fn manifest_falls_back_to_main_class() {
        let manifest = "Main-Class: com.example.Main\n";
        assert_eq!(
            manifest_entry_point(manifest),
            Some(("com.example.Main".to_string(), false))
        );
        assert_eq!(manifest_entry_point("Manifest-Version: 1.0\n"), None);
    }

    #[test]
    fn memory_archive_lookup() {
        let mut entries = HashMap::new();
        entries.insert("com/example/Main.class".to_string(), vec![1, 2, 3]);
        let mut cp = ClassPath::new(Archive::from_entries(entries), None);
        assert_eq!(cp.find_class("com/example/Main"), Some(vec![1, 2, 3]));
        assert_eq!(cp.find_class("com/example/Other"), None);
    }
}
