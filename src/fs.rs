//! Filesystem capability
//!
//! Abstracts the filesystem for testability. Provides:
//! - FileSystem trait: presence checks, listings, modification times, writes
//! - OsFileSystem: the real filesystem
//! - MemoryFileSystem: in-memory tree with a controllable logical clock

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Filesystem operations used by the gate, trust and project generation
pub trait FileSystem {
    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Modification time of a file or directory
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Entry names of a directory, sorted
    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Create or replace a file; the parent directory must exist
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

#[derive(Debug, Clone)]
enum Node {
    File { contents: String, modified: SystemTime },
    Dir { modified: SystemTime },
}

impl Node {
    fn modified(&self) -> SystemTime {
        match self {
            Node::File { modified, .. } | Node::Dir { modified } => *modified,
        }
    }
}

#[derive(Debug)]
struct MemoryState {
    nodes: BTreeMap<PathBuf, Node>,
    now: SystemTime,
}

/// In-memory filesystem for tests
///
/// Every mutation stamps the current logical time. The clock only moves
/// through [`MemoryFileSystem::advance`] or explicit `*_at` calls, so tests
/// decide exactly which path is newer.
#[derive(Debug)]
pub struct MemoryFileSystem {
    state: Mutex<MemoryState>,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileSystem {
    /// Empty tree with the clock at an arbitrary fixed epoch
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                nodes: BTreeMap::new(),
                now: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current logical time
    pub fn now(&self) -> SystemTime {
        self.lock().now
    }

    /// Move the logical clock forward
    pub fn advance(&self, by: Duration) {
        self.lock().now += by;
    }

    /// Add a file (and any missing parents) stamped with the current time
    pub fn add_file(&self, path: impl AsRef<Path>, contents: &str) {
        let now = self.now();
        self.add_file_at(path, contents, now);
    }

    pub fn add_file_at(&self, path: impl AsRef<Path>, contents: &str, modified: SystemTime) {
        let path = path.as_ref();
        let mut state = self.lock();
        Self::insert_parents(&mut state, path, modified);
        state.nodes.insert(
            path.to_path_buf(),
            Node::File {
                contents: contents.to_string(),
                modified,
            },
        );
    }

    /// Add a directory (and any missing parents) stamped with the current time
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let now = self.now();
        self.add_dir_at(path, now);
    }

    pub fn add_dir_at(&self, path: impl AsRef<Path>, modified: SystemTime) {
        let path = path.as_ref();
        let mut state = self.lock();
        Self::insert_parents(&mut state, path, modified);
        state
            .nodes
            .insert(path.to_path_buf(), Node::Dir { modified });
    }

    /// Set the modification time of an existing path to the current time
    pub fn touch(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        let now = state.now;
        if let Some(node) = state.nodes.get_mut(path.as_ref()) {
            match node {
                Node::File { modified, .. } | Node::Dir { modified } => *modified = now,
            }
        }
    }

    /// Remove a path and everything below it
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.lock().nodes.retain(|p, _| !p.starts_with(path));
    }

    fn insert_parents(state: &mut MemoryState, path: &Path, modified: SystemTime) {
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir.as_os_str().is_empty() {
                break;
            }
            state
                .nodes
                .entry(dir.to_path_buf())
                .or_insert(Node::Dir { modified });
            parent = dir.parent();
        }
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )
    }
}

impl FileSystem for MemoryFileSystem {
    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().nodes.get(path), Some(Node::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().nodes.get(path), Some(Node::Dir { .. }))
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.lock()
            .nodes
            .get(path)
            .map(Node::modified)
            .ok_or_else(|| Self::not_found(path))
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let state = self.lock();
        match state.nodes.get(path) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} is not a directory", path.display()),
                ))
            }
            None => return Err(Self::not_found(path)),
        }

        Ok(state
            .nodes
            .keys()
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.lock().nodes.get(path) {
            Some(Node::File { contents, .. }) => Ok(contents.clone()),
            _ => Err(Self::not_found(path)),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut state = self.lock();
        let parent_exists = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                matches!(state.nodes.get(parent), Some(Node::Dir { .. }))
            }
            _ => true,
        };
        if !parent_exists {
            return Err(Self::not_found(path.parent().unwrap_or(path)));
        }

        let modified = state.now;
        state.nodes.insert(
            path.to_path_buf(),
            Node::File {
                contents: contents.to_string(),
                modified,
            },
        );
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        if self.is_file(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a file", path.display()),
            ));
        }
        if !self.is_dir(path) {
            self.add_dir(path);
        }
        Ok(())
    }
}
