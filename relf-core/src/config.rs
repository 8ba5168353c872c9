use crate::engine::{AllocType, BinaryClass};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use std::path::{Path, PathBuf};

/// Construction parameters of a [`crate::Binary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinaryConfig {
    /// File opened by an argument-less `open()`.
    pub path: Option<PathBuf>,
    pub alloc_type: AllocType,
    /// Class hint for the next open.
    pub arch: BinaryClass,
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            path: None,
            alloc_type: AllocType::Mmap,
            arch: BinaryClass::Elf,
        }
    }
}

impl BinaryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_alloc_type(mut self, alloc_type: AllocType) -> Self {
        self.alloc_type = alloc_type;
        self
    }

    pub fn with_arch(mut self, arch: BinaryClass) -> Self {
        self.arch = arch;
        self
    }

    /// Paths are handed to the engine as strings, so they must be UTF-8.
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.path {
            utf8_path(path)?;
        }
        Ok(())
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value).map_err(json_error)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(json_error)?;
        config.validate()?;
        Ok(config)
    }
}

pub(crate) fn utf8_path(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        Error::TypeMismatch(format!("path {} is not valid UTF-8", path.display()))
    })
}

fn json_error(err: serde_json::Error) -> Error {
    match err.classify() {
        Category::Data => Error::TypeMismatch(err.to_string()),
        Category::Syntax | Category::Eof | Category::Io => {
            Error::InvalidArgument(format!("malformed configuration: {err}"))
        }
    }
}
