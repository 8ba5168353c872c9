//! Process-wide table of exported constants and result codes.
//!
//! Everything here is `static` and read-only.

use crate::engine::{AllocType, BinaryClass};
use crate::header::EI_NIDENT;
use crate::result_code::ResultCode;
use goblin::elf::header::SELFMAG;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Constant {
    pub name: &'static str,
    pub value: u64,
}

const fn constant(name: &'static str, value: u64) -> Constant {
    Constant { name, value }
}

pub const FMT_ELF: u64 = 0;
pub const FMT_FLAT: u64 = 1;
/// Conventional load address of 32-bit x86 executables.
pub const ORIGIN: u64 = 0x0804_8000;
pub const PAGE_SIZE: u64 = 4096;

static CONSTANTS: [Constant; 15] = [
    constant("FMT_ELF", FMT_ELF),
    constant("FMT_FLAT", FMT_FLAT),
    constant("ELF", BinaryClass::Elf.tag() as u64),
    constant("ELF32", BinaryClass::Elf32.tag() as u64),
    constant("ELF64", BinaryClass::Elf64.tag() as u64),
    constant("FLAT", BinaryClass::Flat.tag() as u64),
    constant("FLAT32", BinaryClass::Flat32.tag() as u64),
    constant("FLAT64", BinaryClass::Flat64.tag() as u64),
    constant("ALLOC_NONE", AllocType::None.tag() as u64),
    constant("ALLOC_MMAP", AllocType::Mmap.tag() as u64),
    constant("ALLOC_MALLOC", AllocType::Malloc.tag() as u64),
    constant("ORIGIN", ORIGIN),
    constant("MAGIC_BYTES", SELFMAG as u64),
    constant("PAGE_SIZE", PAGE_SIZE),
    constant("EI_NIDENT", EI_NIDENT as u64),
];

pub fn constants() -> &'static [Constant] {
    &CONSTANTS
}

pub fn lookup(name: &str) -> Option<u64> {
    CONSTANTS
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeEntry {
    pub name: &'static str,
    pub code: u32,
    pub message: &'static str,
}

/// Every result code the engine can report, in ascending code order.
pub fn result_codes() -> impl Iterator<Item = CodeEntry> {
    ResultCode::ALL.into_iter().map(|rc| CodeEntry {
        name: rc.name(),
        code: rc.code(),
        message: rc.strerror(),
    })
}
