pub mod elf;

use crate::error::{translate, Result};
use crate::result_code::EngineResult;
use goblin::elf::header::{EI_CLASS, EI_DATA, ELFCLASS64, ELFDATA2LSB, ET_EXEC};
use serde::Serialize;
use std::fmt;

pub use elf::{ParsedHeader, EI_NIDENT};

/// Field queries the engine answers about a parsed ELF header.
///
/// Each call is independent and may fail with its own result code.
pub trait HeaderQueries: fmt::Debug {
    /// The 16 identification bytes, starting with the ELF magic.
    fn ident(&self) -> EngineResult<[u8; EI_NIDENT]>;

    /// Object file type (`e_type`).
    fn get_type(&self) -> EngineResult<FieldDescriptor>;

    /// Target architecture (`e_machine`).
    fn get_machine(&self) -> EngineResult<FieldDescriptor>;

    /// Object file version (`e_version`).
    fn get_version(&self) -> EngineResult<FieldDescriptor>;

    fn get_entry(&self) -> EngineResult<u64>;
    fn get_phoff(&self) -> EngineResult<u64>;
    fn get_shoff(&self) -> EngineResult<u64>;
    fn get_flags(&self) -> EngineResult<u32>;
    fn get_ehsize(&self) -> EngineResult<u16>;
    fn get_phentsize(&self) -> EngineResult<u16>;
    fn get_phnum(&self) -> EngineResult<u16>;
    fn get_shentsize(&self) -> EngineResult<u16>;
    fn get_shnum(&self) -> EngineResult<u16>;
    fn get_shstrndx(&self) -> EngineResult<u16>;
}

/// Name, raw value and meaning of one enumerated header field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldDescriptor {
    name: String,
    value: u32,
    meaning: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, value: u32, meaning: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
            meaning,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn meaning(&self) -> Option<&str> {
        self.meaning.as_deref()
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.meaning {
            Some(meaning) => write!(f, "{} ({:#x}): {}", self.name, self.value, meaning),
            None => write!(f, "{} ({:#x})", self.name, self.value),
        }
    }
}

/// Snapshot of an ELF header, decoupled from the engine that produced it.
///
/// The snapshot holds owned copies only, so it stays valid after the
/// binary it came from is closed or re-opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ehdr {
    /// Magic number and other info.
    pub ident: [u8; EI_NIDENT],
    pub object_type: FieldDescriptor,
    pub machine: FieldDescriptor,
    pub version: FieldDescriptor,
    /// Entry point virtual address.
    pub entry: u64,
    /// Program header table file offset.
    pub phoff: u64,
    /// Section header table file offset.
    pub shoff: u64,
    pub flags: u32,
    pub ehsize: u16,
    pub phentsize: u16,
    pub phnum: u16,
    pub shentsize: u16,
    pub shnum: u16,
    /// Index of the section header string table.
    pub shstrndx: u16,
}

impl Ehdr {
    /// Runs every header query once and assembles the snapshot.
    ///
    /// The first failing query aborts the build; its code is translated and
    /// nothing built so far is returned.
    pub fn build<H: HeaderQueries + ?Sized>(source: &H) -> Result<Ehdr> {
        let ident = source.ident().map_err(translate)?;
        let object_type = source.get_type().map_err(translate)?;
        let machine = source.get_machine().map_err(translate)?;
        let version = source.get_version().map_err(translate)?;
        let entry = source.get_entry().map_err(translate)?;
        let phoff = source.get_phoff().map_err(translate)?;
        let phnum = source.get_phnum().map_err(translate)?;
        let phentsize = source.get_phentsize().map_err(translate)?;
        let flags = source.get_flags().map_err(translate)?;
        let ehsize = source.get_ehsize().map_err(translate)?;
        let shoff = source.get_shoff().map_err(translate)?;
        let shnum = source.get_shnum().map_err(translate)?;
        let shentsize = source.get_shentsize().map_err(translate)?;
        let shstrndx = source.get_shstrndx().map_err(translate)?;

        log::trace!("built header snapshot, entry {:#x}", entry);

        Ok(Ehdr {
            ident,
            object_type,
            machine,
            version,
            entry,
            phoff,
            shoff,
            flags,
            ehsize,
            phentsize,
            phnum,
            shentsize,
            shnum,
            shstrndx,
        })
    }

    pub fn entry_point(&self) -> u64 {
        self.entry
    }

    pub fn is_64(&self) -> bool {
        self.ident[EI_CLASS] == ELFCLASS64
    }

    pub fn is_little_endian(&self) -> bool {
        self.ident[EI_DATA] == ELFDATA2LSB
    }

    pub fn format_name(&self) -> &'static str {
        "ELF"
    }

    pub fn is_executable(&self) -> bool {
        self.object_type.value() == u32::from(ET_EXEC)
    }
}
