//! In-memory virtual filesystem.
//!
//! Cells never touch the real filesystem. The host seeds a directory
//! layout at startup and hands capability closures over this tree to
//! the cells it trusts. Paths are absolute, `/`-separated, and
//! normalized before lookup; `.` and empty segments collapse, `..` is
//! rejected outright.

use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum VfsError {
    #[error("no such entry: {0}")]
    NotFound(String),
    #[error("entry already exists: {0}")]
    AlreadyExists(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("directory not empty: {0}")]
    NotEmpty(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Dir,
    File(Vec<u8>),
}

/// Thread-safe tree of named entries. Directories carry no content of
/// their own; children are found by prefix over the sorted key space.
pub struct VirtualFs {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl Default for VirtualFs {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualFs {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("/".to_string(), Entry::Dir);
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Normalizes to an absolute path with no trailing slash (except
    /// the root itself).
    fn normalize(path: &str) -> Result<String, VfsError> {
        if !path.starts_with('/') {
            return Err(VfsError::InvalidPath(path.to_string()));
        }
        let mut parts = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Err(VfsError::InvalidPath(path.to_string())),
                s => parts.push(s),
            }
        }
        if parts.is_empty() {
            return Ok("/".to_string());
        }
        Ok(format!("/{}", parts.join("/")))
    }

    fn parent_of(path: &str) -> String {
        match path.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(i) => path[..i].to_string(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Creates a directory. The parent must already exist.
    pub fn mkdir(&self, path: &str) -> Result<(), VfsError> {
        let path = Self::normalize(path)?;
        let mut entries = self.lock();
        if entries.contains_key(&path) {
            return Err(VfsError::AlreadyExists(path));
        }
        let parent = Self::parent_of(&path);
        match entries.get(&parent) {
            Some(Entry::Dir) => {}
            Some(Entry::File(_)) => return Err(VfsError::NotADirectory(parent)),
            None => return Err(VfsError::NotFound(parent)),
        }
        entries.insert(path, Entry::Dir);
        Ok(())
    }

    /// Creates a directory and any missing ancestors.
    pub fn mkdir_p(&self, path: &str) -> Result<(), VfsError> {
        let path = Self::normalize(path)?;
        let mut entries = self.lock();
        let mut prefix = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(segment);
            match entries.get(&prefix) {
                Some(Entry::Dir) => {}
                Some(Entry::File(_)) => return Err(VfsError::NotADirectory(prefix)),
                None => {
                    entries.insert(prefix.clone(), Entry::Dir);
                }
            }
        }
        Ok(())
    }

    /// Writes a file, creating or truncating it. The parent directory
    /// must exist.
    pub fn write(&self, path: &str, data: &[u8]) -> Result<(), VfsError> {
        let path = Self::normalize(path)?;
        if path == "/" {
            return Err(VfsError::IsADirectory(path));
        }
        let mut entries = self.lock();
        if let Some(Entry::Dir) = entries.get(&path) {
            return Err(VfsError::IsADirectory(path));
        }
        let parent = Self::parent_of(&path);
        match entries.get(&parent) {
            Some(Entry::Dir) => {}
            Some(Entry::File(_)) => return Err(VfsError::NotADirectory(parent)),
            None => return Err(VfsError::NotFound(parent)),
        }
        entries.insert(path, Entry::File(data.to_vec()));
        Ok(())
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        let path = Self::normalize(path)?;
        match self.lock().get(&path) {
            Some(Entry::File(data)) => Ok(data.clone()),
            Some(Entry::Dir) => Err(VfsError::IsADirectory(path)),
            None => Err(VfsError::NotFound(path)),
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        Self::normalize(path)
            .map(|p| self.lock().contains_key(&p))
            .unwrap_or(false)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        Self::normalize(path)
            .map(|p| matches!(self.lock().get(&p), Some(Entry::Dir)))
            .unwrap_or(false)
    }

    /// Direct children of a directory, sorted by name.
    pub fn read_dir(&self, path: &str) -> Result<Vec<String>, VfsError> {
        let path = Self::normalize(path)?;
        let entries = self.lock();
        match entries.get(&path) {
            Some(Entry::Dir) => {}
            Some(Entry::File(_)) => return Err(VfsError::NotADirectory(path)),
            None => return Err(VfsError::NotFound(path)),
        }
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        Ok(entries
            .keys()
            .filter(|k| {
                k.starts_with(&prefix)
                    && k.len() > prefix.len()
                    && !k[prefix.len()..].contains('/')
            })
            .map(|k| k[prefix.len()..].to_string())
            .collect())
    }

    /// Removes a file or an empty directory. The root is permanent.
    pub fn remove(&self, path: &str) -> Result<(), VfsError> {
        let path = Self::normalize(path)?;
        if path == "/" {
            return Err(VfsError::InvalidPath(path));
        }
        let mut entries = self.lock();
        match entries.get(&path) {
            Some(Entry::Dir) => {
                let prefix = format!("{path}/");
                if entries.keys().any(|k| k.starts_with(&prefix)) {
                    return Err(VfsError::NotEmpty(path));
                }
            }
            Some(Entry::File(_)) => {}
            None => return Err(VfsError::NotFound(path)),
        }
        entries.remove(&path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mkdir_requires_parent() {
        let fs = VirtualFs::new();
        assert_eq!(
            fs.mkdir("/a/b"),
            Err(VfsError::NotFound("/a".to_string()))
        );
        fs.mkdir("/a").unwrap();
        fs.mkdir("/a/b").unwrap();
        assert!(fs.is_dir("/a/b"));
    }

    #[test]
    fn test_mkdir_existing_fails() {
        let fs = VirtualFs::new();
        fs.mkdir("/a").unwrap();
        assert_eq!(
            fs.mkdir("/a"),
            Err(VfsError::AlreadyExists("/a".to_string()))
        );
    }

    #[test]
    fn test_mkdir_p_is_idempotent() {
        let fs = VirtualFs::new();
        fs.mkdir_p("/a/b/c").unwrap();
        fs.mkdir_p("/a/b/c").unwrap();
        assert!(fs.is_dir("/a"));
        assert!(fs.is_dir("/a/b/c"));
    }

    #[test]
    fn test_write_read_roundtrip() {
        let fs = VirtualFs::new();
        fs.mkdir("/docs").unwrap();
        fs.write("/docs/note.txt", b"hello").unwrap();
        assert_eq!(fs.read("/docs/note.txt").unwrap(), b"hello");
        fs.write("/docs/note.txt", b"changed").unwrap();
        assert_eq!(fs.read("/docs/note.txt").unwrap(), b"changed");
    }

    #[test]
    fn test_write_over_directory_fails() {
        let fs = VirtualFs::new();
        fs.mkdir("/a").unwrap();
        assert_eq!(
            fs.write("/a", b"x"),
            Err(VfsError::IsADirectory("/a".to_string()))
        );
    }

    #[test]
    fn test_normalization() {
        let fs = VirtualFs::new();
        fs.mkdir("/a").unwrap();
        assert!(fs.is_dir("/a/"));
        assert!(fs.is_dir("//a"));
        assert!(fs.is_dir("/./a/."));
        assert!(!fs.exists("relative"));
        assert_eq!(
            fs.read("/../etc"),
            Err(VfsError::InvalidPath("/../etc".to_string()))
        );
    }

    #[test]
    fn test_read_dir_lists_direct_children_only() {
        let fs = VirtualFs::new();
        fs.mkdir_p("/a/b").unwrap();
        fs.write("/a/one.txt", b"1").unwrap();
        fs.write("/a/b/deep.txt", b"2").unwrap();
        assert_eq!(fs.read_dir("/a").unwrap(), vec!["b", "one.txt"]);
        assert_eq!(fs.read_dir("/").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_remove() {
        let fs = VirtualFs::new();
        fs.mkdir("/a").unwrap();
        fs.write("/a/f", b"x").unwrap();
        assert_eq!(fs.remove("/a"), Err(VfsError::NotEmpty("/a".to_string())));
        fs.remove("/a/f").unwrap();
        fs.remove("/a").unwrap();
        assert!(!fs.exists("/a"));
    }
}
