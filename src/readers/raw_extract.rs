use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::models::VariableRegistry;
use crate::utils::constants::RAW_EXTENSION;
use crate::utils::filename::extension_of;

/// Directory tree of raw extracts, one subdirectory per variable key.
pub struct RawExtractTree {
    root: PathBuf,
}

impl RawExtractTree {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn variable_dir(&self, variable: &str) -> PathBuf {
        self.root.join(variable)
    }

    /// Registry keys that have a subdirectory under the root, sorted by name.
    pub fn variables(&self, registry: &VariableRegistry) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(PipelineError::NotFound(format!(
                "Input directory {} does not exist",
                self.root.display()
            )));
        }

        let mut variables = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if registry.contains_key(&name) {
                variables.push(name);
            }
        }
        variables.sort();

        if variables.is_empty() {
            return Err(PipelineError::NotFound(format!(
                "No variables found in input directory {}",
                self.root.display()
            )));
        }

        Ok(variables)
    }

    /// Raw files of one variable, sorted by name.
    pub fn raw_files(&self, variable: &str) -> Result<Vec<PathBuf>> {
        let dir = self.variable_dir(variable);
        let mut files = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_raw = path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(extension_of)
                    .map_or(false, |ext| ext == RAW_EXTENSION);
            if is_raw {
                files.push(path);
            }
        }
        files.sort();

        Ok(files)
    }

    /// Any one raw file of a variable, used to read grid metadata.
    pub fn first_raw_file(&self, variable: &str) -> Result<PathBuf> {
        self.raw_files(variable)?.into_iter().next().ok_or_else(|| {
            PipelineError::NotFound(format!(
                "No GRIB files found in {}",
                self.variable_dir(variable).display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree_with(dirs: &[&str]) -> TempDir {
        let root = TempDir::new().unwrap();
        for dir in dirs {
            fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        root
    }

    #[test]
    fn test_variables_filtered_by_registry() {
        let root = tree_with(&["total_precipitation", "2m_temperature", "scratch"]);
        fs::write(root.path().join("runoff"), b"not a directory").unwrap();

        let tree = RawExtractTree::new(root.path());
        let variables = tree.variables(&VariableRegistry::era5_land()).unwrap();
        assert_eq!(variables, vec!["2m_temperature", "total_precipitation"]);
    }

    #[test]
    fn test_no_variables() {
        let root = tree_with(&["scratch"]);
        let tree = RawExtractTree::new(root.path());
        let err = tree.variables(&VariableRegistry::era5_land()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_first_raw_file() {
        let root = tree_with(&["2m_temperature"]);
        let dir = root.path().join("2m_temperature");
        fs::write(dir.join("2024-02.grib"), b"GRIB").unwrap();
        fs::write(dir.join("2024-01.grib"), b"GRIB").unwrap();
        fs::write(dir.join("2024-01.grib.idx"), b"").unwrap();

        let tree = RawExtractTree::new(root.path());
        assert_eq!(tree.raw_files("2m_temperature").unwrap().len(), 2);
        assert_eq!(
            tree.first_raw_file("2m_temperature").unwrap(),
            dir.join("2024-01.grib")
        );
    }

    #[test]
    fn test_empty_variable_dir() {
        let root = tree_with(&["total_precipitation"]);
        let tree = RawExtractTree::new(root.path());
        let err = tree.first_raw_file("total_precipitation").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("No GRIB files found"));
    }
}
