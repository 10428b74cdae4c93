use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// A file stored in a dataset version.
pub trait DatasetFile {
    fn filename(&self) -> &str;
    fn read(&self) -> Result<Vec<u8>>;
}

/// A versioned collection of files.
pub trait Dataset {
    type File: DatasetFile;

    fn name(&self) -> &str;
    fn latest_version(&self) -> Result<DatasetVersion<Self::File>>;
}

#[derive(Debug, Clone)]
pub struct DatasetVersion<F> {
    pub name: String,
    pub files: Vec<F>,
}

/// Dataset laid out on disk as one subdirectory per version.
///
/// The latest version is the subdirectory whose name sorts last, with digit
/// runs compared as numbers (`v10` after `v9`, `2024-03-01` after
/// `2024-02-15`). A directory without subdirectories is treated as a
/// single version.
#[derive(Debug, Clone)]
pub struct LocalDataset {
    root: PathBuf,
    name: String,
}

impl LocalDataset {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(PipelineError::NotFound(format!(
                "Dataset directory {} does not exist",
                root.display()
            )));
        }

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        Ok(Self {
            root: root.to_path_buf(),
            name,
        })
    }

    fn latest_version_dir(&self) -> Result<PathBuf> {
        let mut versions: Vec<(Vec<VersionPart>, PathBuf)> = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            versions.push((version_key(&name), path));
        }

        versions.sort();
        Ok(versions
            .pop()
            .map(|(_, path)| path)
            .unwrap_or_else(|| self.root.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum VersionPart {
    Number(u64),
    Text(String),
}

/// Split a version name into text and numeric runs for natural ordering.
fn version_key(name: &str) -> Vec<VersionPart> {
    let mut parts = Vec::new();
    let mut chars = name.chars().peekable();

    while let Some(&c) = chars.peek() {
        let digits = c.is_ascii_digit();
        let mut run = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() != digits {
                break;
            }
            run.push(c);
            chars.next();
        }
        match run.parse::<u64>() {
            Ok(number) if digits => parts.push(VersionPart::Number(number)),
            _ => parts.push(VersionPart::Text(run)),
        }
    }

    parts
}

impl Dataset for LocalDataset {
    type File = LocalFile;

    fn name(&self) -> &str {
        &self.name
    }

    fn latest_version(&self) -> Result<DatasetVersion<LocalFile>> {
        let dir = self.latest_version_dir()?;

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                files.push(LocalFile {
                    filename: entry.file_name().to_string_lossy().into_owned(),
                    path,
                });
            }
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(DatasetVersion { name, files })
    }
}

#[derive(Debug, Clone)]
pub struct LocalFile {
    filename: String,
    path: PathBuf,
}

impl DatasetFile for LocalFile {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }
}

/// Dataset held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    name: String,
    files: Vec<MemoryFile>,
}

impl MemoryDataset {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            files: Vec::new(),
        }
    }

    pub fn with_file(mut self, filename: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.push(MemoryFile {
            filename: filename.to_string(),
            data: data.into(),
        });
        self
    }
}

impl Dataset for MemoryDataset {
    type File = MemoryFile;

    fn name(&self) -> &str {
        &self.name
    }

    fn latest_version(&self) -> Result<DatasetVersion<MemoryFile>> {
        Ok(DatasetVersion {
            name: "latest".to_string(),
            files: self.files.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MemoryFile {
    filename: String,
    data: Vec<u8>,
}

impl DatasetFile for MemoryFile {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn read(&self) -> Result<Vec<u8>> {
        Ok(self.data.clone())
    }
}
