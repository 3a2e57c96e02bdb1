//! Read access to a course backup.
//!
//! A backup is the extracted directory, a gzipped tarball (what Moodle
//! writes by default) or a zip-format `.mbz`.
//! Member names always use `/` separators and are relative to the backup
//! root, e.g. `activities/quiz_12/quiz.xml`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("backup member not found: {0}")]
    MissingMember(String),

    #[error("backup member {0} is not valid UTF-8")]
    NotUtf8(String),

    #[error("failed to read backup at {path:?}: {source}")]
    Io {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    #[error("invalid member pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("failed to read zip backup: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub trait ArchiveReader {
    fn member_names(&self) -> Vec<String>;

    fn read_member(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError>;

    fn read_text(&mut self, name: &str) -> Result<String, ArchiveError> {
        let bytes = self.read_member(name)?;
        String::from_utf8(bytes).map_err(|_| ArchiveError::NotUtf8(name.to_string()))
    }

    /// Member names matching `pattern`, sorted.
    fn members_matching(&self, pattern: &Regex) -> Vec<String> {
        let mut names: Vec<String> = self
            .member_names()
            .into_iter()
            .filter(|name| pattern.is_match(name))
            .collect();
        names.sort();
        names
    }
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a backup directory, or a backup file by its leading bytes.
pub fn open_backup(path: &Path) -> Result<Box<dyn ArchiveReader>, ArchiveError> {
    if path.is_dir() {
        return Ok(Box::new(DirectoryArchive::open(path)?));
    }
    let io_error = |source| ArchiveError::Io {
        source,
        path: path.to_path_buf(),
    };
    let mut magic = [0u8; 2];
    let read = File::open(path)
        .and_then(|mut file| file.read(&mut magic))
        .map_err(io_error)?;
    if read == magic.len() && magic == GZIP_MAGIC {
        log::debug!("reading {} as a gzipped tarball", path.display());
        let file = File::open(path).map_err(io_error)?;
        Ok(Box::new(MemoryArchive::from_tar_gz(file).map_err(io_error)?))
    } else {
        Ok(Box::new(ZipBackup::open(path)?))
    }
}

/// An extracted backup on disk.
#[derive(Debug)]
pub struct DirectoryArchive {
    root: PathBuf,
    members: Vec<String>,
}

impl DirectoryArchive {
    pub fn open(root: &Path) -> Result<Self, ArchiveError> {
        let pattern = format!("{}/**/*", glob::Pattern::escape(&root.to_string_lossy()));
        let mut members = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry.map_err(|err| ArchiveError::Io {
                path: err.path().to_path_buf(),
                source: err.into_error(),
            })?;
            if !path.is_file() {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(root) {
                let name: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                members.push(name.join("/"));
            }
        }
        log::debug!("found {} files under {}", members.len(), root.display());
        Ok(Self {
            root: root.to_path_buf(),
            members,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArchiveReader for DirectoryArchive {
    fn member_names(&self) -> Vec<String> {
        self.members.clone()
    }

    fn read_member(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let path = self.root.join(name);
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ArchiveError::MissingMember(name.to_string()),
            _ => ArchiveError::Io { source, path },
        })
    }
}

/// A zip-format `.mbz` backup.
pub struct ZipBackup {
    archive: zip::ZipArchive<File>,
}

impl ZipBackup {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|source| ArchiveError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        Ok(Self {
            archive: zip::ZipArchive::new(file)?,
        })
    }
}

impl ArchiveReader for ZipBackup {
    fn member_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    fn read_member(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        let mut member = match self.archive.by_name(name) {
            Ok(member) => member,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ArchiveError::MissingMember(name.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        let mut bytes = Vec::new();
        member
            .read_to_end(&mut bytes)
            .map_err(|source| ArchiveError::Io {
                source,
                path: PathBuf::from(name),
            })?;
        Ok(bytes)
    }
}

/// In-memory backup, handy for tests and generated fixtures.
#[derive(Debug, Default, Clone)]
pub struct MemoryArchive {
    members: BTreeMap<String, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, contents: impl Into<Vec<u8>>) {
        self.members.insert(name.to_string(), contents.into());
    }

    pub fn with_member(mut self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(name, contents);
        self
    }

    /// Load every regular file of a gzipped tarball. Leading `./` is dropped
    /// from member names.
    pub fn from_tar_gz(reader: impl Read) -> io::Result<Self> {
        let mut archive = tar::Archive::new(GzDecoder::new(reader));
        let mut members = Self::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name: Vec<String> = entry
                .path()?
                .components()
                .filter_map(|component| match component {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            members.insert(&name.join("/"), bytes);
        }
        log::debug!("loaded {} members from tarball", members.members.len());
        Ok(members)
    }
}

impl ArchiveReader for MemoryArchive {
    fn member_names(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    fn read_member(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        self.members
            .get(name)
            .cloned()
            .ok_or_else(|| ArchiveError::MissingMember(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn directory_members_use_forward_slashes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("activities/quiz_3")).unwrap();
        fs::write(dir.path().join("activities/quiz_3/quiz.xml"), "<activity/>").unwrap();
        fs::write(dir.path().join("questions.xml"), "<q/>").unwrap();

        let mut archive = DirectoryArchive::open(dir.path()).unwrap();
        let quiz = Regex::new(r"activities/quiz_[0-9]+/quiz\.xml").unwrap();
        assert_eq!(archive.members_matching(&quiz), vec!["activities/quiz_3/quiz.xml"]);
        assert_eq!(archive.read_text("questions.xml").unwrap(), "<q/>");
        assert!(matches!(
            archive.read_member("files.xml"),
            Err(ArchiveError::MissingMember(_))
        ));
    }

    #[test]
    fn zip_backups_are_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("course.mbz");
        {
            let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
            let options = zip::write::FileOptions::default();
            writer.start_file("sections/section_1/section.xml", options).unwrap();
            writer.write_all(b"<section/>").unwrap();
            writer.finish().unwrap();
        }

        let mut archive = open_backup(&path).unwrap();
        assert_eq!(archive.member_names(), vec!["sections/section_1/section.xml"]);
        assert_eq!(
            archive.read_text("sections/section_1/section.xml").unwrap(),
            "<section/>"
        );
        assert!(matches!(
            archive.read_member("nope"),
            Err(ArchiveError::MissingMember(_))
        ));
    }

    #[test]
    fn gzipped_tarballs_are_detected_and_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("course.mbz");
        {
            let gz = flate2::write::GzEncoder::new(
                File::create(&path).unwrap(),
                flate2::Compression::default(),
            );
            let mut builder = tar::Builder::new(gz);
            let body = b"<section/>";
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "./sections/section_1/section.xml", &body[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let mut archive = open_backup(&path).unwrap();
        assert_eq!(archive.member_names(), vec!["sections/section_1/section.xml"]);
        assert_eq!(
            archive.read_text("sections/section_1/section.xml").unwrap(),
            "<section/>"
        );
    }

    #[test]
    fn unreadable_backup_files_are_zip_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("course.mbz");
        fs::write(&path, b"not a backup").unwrap();
        assert!(matches!(open_backup(&path), Err(ArchiveError::Zip(_))));
    }

    #[test]
    fn memory_archive_reports_non_utf8_members() {
        let mut archive = MemoryArchive::new().with_member("blob", vec![0xff, 0xfe]);
        assert!(matches!(archive.read_text("blob"), Err(ArchiveError::NotUtf8(_))));
    }
}
