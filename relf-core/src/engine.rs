pub mod native;

use crate::error::Error;
use crate::header::HeaderQueries;
use crate::result_code::{EngineResult, ResultCode};
use crate::sections::{Phdr, Shdr};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use native::NativeBinary;

/// How the engine backs the bytes of an opened binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocType {
    /// Nothing chosen yet; resolved to `Mmap` when a file is opened.
    None,
    #[default]
    Mmap,
    Malloc,
}

impl AllocType {
    pub const fn tag(self) -> u32 {
        match self {
            AllocType::None => 0,
            AllocType::Mmap => 1,
            AllocType::Malloc => 2,
        }
    }

    /// Strategy actually used for a new open.
    pub fn resolve(self) -> AllocType {
        match self {
            AllocType::None => AllocType::Mmap,
            other => other,
        }
    }
}

impl TryFrom<u32> for AllocType {
    type Error = Error;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(AllocType::None),
            1 => Ok(AllocType::Mmap),
            2 => Ok(AllocType::Malloc),
            _ => Err(Error::InvalidArgument(format!(
                "unknown allocation type tag {tag}"
            ))),
        }
    }
}

impl FromStr for AllocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "alloc_none" => Ok(AllocType::None),
            "mmap" | "alloc_mmap" => Ok(AllocType::Mmap),
            "malloc" | "alloc_malloc" => Ok(AllocType::Malloc),
            _ => Err(format!("Unknown allocation type: {}", s)),
        }
    }
}

impl fmt::Display for AllocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AllocType::None => "ALLOC_NONE",
            AllocType::Mmap => "ALLOC_MMAP",
            AllocType::Malloc => "ALLOC_MALLOC",
        };
        write!(f, "{}", name)
    }
}

/// Binary class: either a hint given before opening, or what the engine
/// detected afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryClass {
    /// ELF of either width.
    #[default]
    Elf,
    Elf32,
    Elf64,
    /// Raw bytes, no header parsing.
    Flat,
    Flat32,
    Flat64,
}

impl BinaryClass {
    pub const fn tag(self) -> u32 {
        match self {
            BinaryClass::Elf => 0,
            BinaryClass::Elf32 => 1,
            BinaryClass::Elf64 => 2,
            BinaryClass::Flat => 3,
            BinaryClass::Flat32 => 4,
            BinaryClass::Flat64 => 5,
        }
    }

    pub fn is_flat(self) -> bool {
        matches!(
            self,
            BinaryClass::Flat | BinaryClass::Flat32 | BinaryClass::Flat64
        )
    }

    /// Whether a file detected as `detected` satisfies this hint.
    pub fn accepts(self, detected: BinaryClass) -> bool {
        match self {
            BinaryClass::Elf => matches!(detected, BinaryClass::Elf32 | BinaryClass::Elf64),
            hint => hint == detected,
        }
    }
}

impl TryFrom<u32> for BinaryClass {
    type Error = Error;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(BinaryClass::Elf),
            1 => Ok(BinaryClass::Elf32),
            2 => Ok(BinaryClass::Elf64),
            3 => Ok(BinaryClass::Flat),
            4 => Ok(BinaryClass::Flat32),
            5 => Ok(BinaryClass::Flat64),
            _ => Err(Error::InvalidArgument(format!(
                "unknown binary class tag {tag}"
            ))),
        }
    }
}

impl FromStr for BinaryClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "elf" => Ok(BinaryClass::Elf),
            "elf32" => Ok(BinaryClass::Elf32),
            "elf64" => Ok(BinaryClass::Elf64),
            "flat" => Ok(BinaryClass::Flat),
            "flat32" => Ok(BinaryClass::Flat32),
            "flat64" => Ok(BinaryClass::Flat64),
            _ => Err(format!("Unknown binary class: {}", s)),
        }
    }
}

impl fmt::Display for BinaryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryClass::Elf => "ELF",
            BinaryClass::Elf32 => "ELF32",
            BinaryClass::Elf64 => "ELF64",
            BinaryClass::Flat => "FLAT",
            BinaryClass::Flat32 => "FLAT32",
            BinaryClass::Flat64 => "FLAT64",
        };
        write!(f, "{}", name)
    }
}

/// Contract of the binary analysis engine behind a [`crate::Binary`].
///
/// Lifecycle calls report failure through [`ResultCode`]; `close` is
/// infallible and idempotent. Accessors describe the handle as it is right
/// now, and `mem` is `Some` exactly while the handle is open.
pub trait Engine: fmt::Debug {
    type Header: HeaderQueries;

    /// Resets the handle to a closed state with default hints.
    fn init(&mut self);

    fn open(&mut self, path: &str) -> ResultCode;

    fn close(&mut self);

    fn set_alloc_type(&mut self, alloc_type: AllocType);

    fn set_class(&mut self, class: BinaryClass);

    fn is_open(&self) -> bool {
        self.mem().is_some()
    }

    fn fname(&self) -> Option<&str>;

    /// Descriptor of the opened file, `-1` when closed.
    fn fd(&self) -> i32;

    fn mem(&self) -> Option<&[u8]>;

    fn size(&self) -> usize {
        self.mem().map_or(0, <[u8]>::len)
    }

    fn alloc_type(&self) -> AllocType;

    fn class(&self) -> BinaryClass;

    /// Parsed ELF header, present only for an open ELF binary.
    fn ehdr(&self) -> Option<&Self::Header>;

    fn program_headers(&self) -> EngineResult<Vec<Phdr>>;

    fn section_headers(&self) -> EngineResult<Vec<Shdr>>;
}
