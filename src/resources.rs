//! Where class files and embedded data come from.
//!
//! The translator never touches the file system directly; everything goes
//! through a [`Resources`] implementation supplied by the caller.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

/// Supplies raw bytes for a resource name such as `a/b/C.class`.
pub trait Resources {
    /// `Ok(None)` when the resource does not exist.
    fn get(&self, name: &str) -> io::Result<Option<Vec<u8>>>;
}

impl<R: Resources + ?Sized> Resources for &R {
    fn get(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        (**self).get(name)
    }
}

impl<R: Resources + ?Sized> Resources for Box<R> {
    fn get(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        (**self).get(name)
    }
}

/// Resource name of a class given its internal name.
pub fn class_resource_name(class: &str) -> String {
    format!("{class}.class")
}

fn normalise(name: &str) -> &str {
    name.trim_start_matches('/')
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct MemoryResources {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.entries.insert(name.into(), data);
    }

    /// Adds a class file under its resource name.
    pub fn insert_class(&mut self, class: &str, data: Vec<u8>) {
        self.insert(class_resource_name(class), data);
    }

    pub fn with(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(name, data);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Resources for MemoryResources {
    fn get(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.entries.get(normalise(name)).cloned())
    }
}

// ---------------------------------------------------------------------------
// Directory tree
// ---------------------------------------------------------------------------

/// Resolves names relative to a root directory.
#[derive(Clone, Debug)]
pub struct DirResources {
    root: PathBuf,
}

impl DirResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirResources { root: root.into() }
    }
}

impl Resources for DirResources {
    fn get(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        let name = normalise(name);
        if name.split('/').any(|part| part == "..") {
            return Ok(None);
        }
        match std::fs::read(self.root.join(name)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Jar archive
// ---------------------------------------------------------------------------

/// A jar (zip) archive read fully into memory.
#[derive(Clone, Debug, Default)]
pub struct JarResources {
    entries: BTreeMap<String, Vec<u8>>,
}

impl JarResources {
    pub fn read<R: Read + Seek>(reader: R) -> io::Result<Self> {
        let mut archive = zip::ZipArchive::new(reader).map_err(zip_error)?;
        let mut entries = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(zip_error)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.insert(name, data);
        }
        tracing::debug!("loaded jar with {} entries", entries.len());
        Ok(JarResources { entries })
    }

    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        Self::read(Cursor::new(bytes))
    }

    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read(io::BufReader::new(file))
    }

    /// Internal names of every class in the archive, sorted.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .filter_map(|n| n.strip_suffix(".class"))
            .filter(|n| !n.ends_with("package-info") && !n.ends_with("module-info"))
    }
}

fn zip_error(e: zip::result::ZipError) -> io::Error {
    match e {
        zip::result::ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

impl Resources for JarResources {
    fn get(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.entries.get(normalise(name)).cloned())
    }
}

// ---------------------------------------------------------------------------
// Class path
// ---------------------------------------------------------------------------

/// Ordered list of providers; the first one that has a resource wins.
#[derive(Default)]
pub struct ClassPath {
    entries: Vec<Box<dyn Resources>>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: impl Resources + 'static) {
        self.entries.push(Box::new(entry));
    }

    pub fn with(mut self, entry: impl Resources + 'static) -> Self {
        self.push(entry);
        self
    }
}

impl Resources for ClassPath {
    fn get(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        for entry in &self.entries {
            if let Some(data) = entry.get(name)? {
                return Ok(Some(data));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_path_prefers_earlier_entries() {
        let first = MemoryResources::new().with("a/B.class", vec![1]);
        let second = MemoryResources::new()
            .with("a/B.class", vec![2])
            .with("a/C.class", vec![3]);
        let cp = ClassPath::new().with(first).with(second);
        assert_eq!(cp.get("a/B.class").unwrap(), Some(vec![1]));
        assert_eq!(cp.get("/a/C.class").unwrap(), Some(vec![3]));
        assert_eq!(cp.get("a/D.class").unwrap(), None);
    }
}
