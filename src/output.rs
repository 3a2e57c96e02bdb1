//! Where generated files go.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rust_embed::RustEmbed;

/// Static project files shipped with every generated book.
#[derive(RustEmbed)]
#[folder = "scaffold/"]
struct Scaffold;

pub trait OutputSink {
    /// Write `contents` to `relative_path` (`/`-separated), replacing any
    /// previous contents.
    fn write_file(&mut self, relative_path: &str, contents: &[u8]) -> io::Result<()>;
}

/// Writes below a directory on disk.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Refuses a non-empty directory unless `overwrite` is set.
    pub fn create(root: &Path, overwrite: bool) -> io::Result<Self> {
        if root.exists() && !overwrite && fs::read_dir(root)?.next().is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is not empty (use --overwrite)", root.display()),
            ));
        }
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl OutputSink for DirectorySink {
    fn write_file(&mut self, relative_path: &str, contents: &[u8]) -> io::Result<()> {
        let path = relative_path
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub files: BTreeMap<String, Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self, relative_path: &str) -> Option<&str> {
        self.files
            .get(relative_path)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

impl OutputSink for MemorySink {
    fn write_file(&mut self, relative_path: &str, contents: &[u8]) -> io::Result<()> {
        self.files.insert(relative_path.to_string(), contents.to_vec());
        Ok(())
    }
}

/// Copy the embedded project scaffold into `sink`.
pub fn copy_scaffold(sink: &mut dyn OutputSink) -> io::Result<usize> {
    let mut copied = 0;
    for name in Scaffold::iter() {
        if let Some(file) = Scaffold::get(&name) {
            sink.write_file(&name, &file.data)?;
            copied += 1;
        }
    }
    Ok(copied)
}
