use crate::header::{FieldDescriptor, HeaderQueries};
use crate::result_code::{EngineResult, ResultCode};
use byteorder::{ReadBytesExt, BE, LE};
use goblin::elf::header::{
    et_to_str, machine_to_str, EI_CLASS, EI_DATA, ELFCLASS32, ELFCLASS64, ELFDATA2LSB,
    ELFDATA2MSB, ELFMAG, EM_386, EM_AARCH64, EM_ARM, EM_MIPS, EM_NONE, EM_PPC, EM_PPC64,
    EM_RISCV, EM_S390, EM_SPARCV9, EM_X86_64, ET_CORE, ET_DYN, ET_EXEC, ET_HIOS, ET_HIPROC,
    ET_LOOS, ET_LOPROC, ET_NONE, ET_REL, SELFMAG, SIZEOF_IDENT,
};
use goblin::container::{Container, Ctx, Endian as ByteOrder};
use std::io::{self, Cursor};

/// Size of the `e_ident` identification block.
pub const EI_NIDENT: usize = SIZEOF_IDENT;

/// `e_version` values.
const EV_NONE: u32 = 0;
const EV_CURRENT: u32 = 1;

/// ELF class, from `e_ident[EI_CLASS]`. Decides the size of addresses and
/// offsets in the header and in both header tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// `ELFCLASS32`: 4-byte words, 52-byte header.
    Elf32,
    /// `ELFCLASS64`: 8-byte words, 64-byte header.
    Elf64,
}

/// Byte order, from `e_ident[EI_DATA]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// `ELFDATA2LSB`
    Little,
    /// `ELFDATA2MSB`
    Big,
}

/// Byte offsets of the header fields that follow `e_version`, per ELF
/// class. The first 24 bytes (`e_ident`, `e_type`, `e_machine`,
/// `e_version`) are laid out identically in both classes.
#[derive(Debug, Clone, Copy)]
struct Layout {
    /// `e_entry`: virtual address control is first transferred to.
    entry: u64,
    /// `e_phoff`: file offset of the program header table.
    phoff: u64,
    /// `e_shoff`: file offset of the section header table.
    shoff: u64,
    /// `e_flags`: processor-specific flags.
    flags: u64,
    /// `e_ehsize`: size of this header.
    ehsize: u64,
    /// `e_phentsize`: size of one program header table entry.
    phentsize: u64,
    /// `e_phnum`: number of program header table entries.
    phnum: u64,
    /// `e_shentsize`: size of one section header table entry.
    shentsize: u64,
    /// `e_shnum`: number of section header table entries.
    shnum: u64,
    /// `e_shstrndx`: section index of the section name string table.
    shstrndx: u64,
    /// Total header size for the class.
    size: usize,
}

const LAYOUT_32: Layout = Layout {
    entry: 24,
    phoff: 28,
    shoff: 32,
    flags: 36,
    ehsize: 40,
    phentsize: 42,
    phnum: 44,
    shentsize: 46,
    shnum: 48,
    shstrndx: 50,
    size: 52,
};

const LAYOUT_64: Layout = Layout {
    entry: 24,
    phoff: 32,
    shoff: 40,
    flags: 48,
    ehsize: 52,
    phentsize: 54,
    phnum: 56,
    shentsize: 58,
    shnum: 60,
    shstrndx: 62,
    size: 64,
};

impl Width {
    fn layout(self) -> &'static Layout {
        match self {
            Width::Elf32 => &LAYOUT_32,
            Width::Elf64 => &LAYOUT_64,
        }
    }

    /// Bytes a complete header of this class occupies.
    pub fn header_size(self) -> usize {
        self.layout().size
    }
}

/// Reads class- and byte-order-dependent integers out of the header
/// bytes. Every read starts from a fresh cursor, so reads never depend on
/// each other.
#[derive(Debug, Clone, Copy)]
struct FieldReader<'a> {
    data: &'a [u8],
    width: Width,
    endian: Endian,
}

impl<'a> FieldReader<'a> {
    /// Cursor positioned at `offset`; reads past the end fail with
    /// `UnexpectedEof`.
    fn cursor_at(&self, offset: u64) -> Cursor<&'a [u8]> {
        let mut cur = Cursor::new(self.data);
        cur.set_position(offset);
        cur
    }

    fn u16(&self, cur: &mut Cursor<&'a [u8]>) -> io::Result<u16> {
        match self.endian {
            Endian::Little => cur.read_u16::<LE>(),
            Endian::Big => cur.read_u16::<BE>(),
        }
    }

    fn u32(&self, cur: &mut Cursor<&'a [u8]>) -> io::Result<u32> {
        match self.endian {
            Endian::Little => cur.read_u32::<LE>(),
            Endian::Big => cur.read_u32::<BE>(),
        }
    }

    fn u64(&self, cur: &mut Cursor<&'a [u8]>) -> io::Result<u64> {
        match self.endian {
            Endian::Little => cur.read_u64::<LE>(),
            Endian::Big => cur.read_u64::<BE>(),
        }
    }

    /// Address-sized word: 4 bytes for ELF32, 8 for ELF64.
    fn word(&self, cur: &mut Cursor<&'a [u8]>) -> io::Result<u64> {
        match self.width {
            Width::Elf32 => self.u32(cur).map(u64::from),
            Width::Elf64 => self.u64(cur),
        }
    }
}

/// The engine's parsed form of an ELF header.
///
/// Holds a private copy of the header bytes; fields are decoded on demand
/// by the [`HeaderQueries`] calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    raw: Vec<u8>,
    width: Width,
    endian: Endian,
}

impl ParsedHeader {
    /// Validates the identification block and copies the header out of
    /// `data`, which normally is the start of the file.
    pub fn parse(data: &[u8]) -> EngineResult<Self> {
        if data.len() < SELFMAG || &data[..SELFMAG] != ELFMAG {
            return Err(ResultCode::NotElf);
        }
        if data.len() < EI_NIDENT {
            return Err(ResultCode::TruncatedHeader);
        }

        let width = match data[EI_CLASS] {
            ELFCLASS32 => Width::Elf32,
            ELFCLASS64 => Width::Elf64,
            _ => return Err(ResultCode::InvalidClass),
        };
        let endian = match data[EI_DATA] {
            ELFDATA2LSB => Endian::Little,
            ELFDATA2MSB => Endian::Big,
            _ => return Err(ResultCode::InvalidEncoding),
        };

        let size = width.header_size();
        if data.len() < size {
            return Err(ResultCode::TruncatedHeader);
        }

        Ok(Self {
            raw: data[..size].to_vec(),
            width,
            endian,
        })
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn is_64(&self) -> bool {
        self.width == Width::Elf64
    }

    /// goblin parsing context matching this header's class and byte order,
    /// used to decode the program and section header tables.
    pub(crate) fn ctx(&self) -> Ctx {
        let container = match self.width {
            Width::Elf32 => Container::Little,
            Width::Elf64 => Container::Big,
        };
        let order = match self.endian {
            Endian::Little => ByteOrder::Little,
            Endian::Big => ByteOrder::Big,
        };
        Ctx::new(container, order)
    }

    fn fields(&self) -> FieldReader<'_> {
        FieldReader {
            data: &self.raw,
            width: self.width,
            endian: self.endian,
        }
    }

    fn layout(&self) -> &'static Layout {
        self.width.layout()
    }

    fn read_u16(&self, offset: u64) -> EngineResult<u16> {
        let fields = self.fields();
        fields
            .u16(&mut fields.cursor_at(offset))
            .map_err(|_| ResultCode::TruncatedHeader)
    }

    fn read_u32(&self, offset: u64) -> EngineResult<u32> {
        let fields = self.fields();
        fields
            .u32(&mut fields.cursor_at(offset))
            .map_err(|_| ResultCode::TruncatedHeader)
    }

    fn read_word(&self, offset: u64) -> EngineResult<u64> {
        let fields = self.fields();
        fields
            .word(&mut fields.cursor_at(offset))
            .map_err(|_| ResultCode::TruncatedHeader)
    }
}

fn type_meaning(et: u16) -> Option<&'static str> {
    match et {
        ET_NONE => Some("No file type"),
        ET_REL => Some("Relocatable file"),
        ET_EXEC => Some("Executable file"),
        ET_DYN => Some("Shared object file"),
        ET_CORE => Some("Core file"),
        ET_LOOS..=ET_HIOS => Some("Operating system-specific"),
        ET_LOPROC..=ET_HIPROC => Some("Processor-specific"),
        _ => None,
    }
}

fn machine_meaning(machine: u16) -> Option<&'static str> {
    match machine {
        EM_NONE => Some("No machine"),
        EM_386 => Some("Intel 80386"),
        EM_X86_64 => Some("AMD x86-64 architecture"),
        EM_ARM => Some("ARM"),
        EM_AARCH64 => Some("ARM AARCH64"),
        EM_RISCV => Some("RISC-V"),
        EM_MIPS => Some("MIPS I Architecture"),
        EM_PPC => Some("PowerPC"),
        EM_PPC64 => Some("64-bit PowerPC"),
        EM_SPARCV9 => Some("SPARC Version 9"),
        EM_S390 => Some("IBM S390"),
        _ => None,
    }
}

fn prefixed(prefix: &str, name: &str) -> String {
    if name.starts_with(prefix) {
        name.to_string()
    } else {
        format!("{prefix}{name}")
    }
}

impl HeaderQueries for ParsedHeader {
    fn ident(&self) -> EngineResult<[u8; EI_NIDENT]> {
        let mut ident = [0u8; EI_NIDENT];
        let bytes = self
            .raw
            .get(..EI_NIDENT)
            .ok_or(ResultCode::TruncatedHeader)?;
        ident.copy_from_slice(bytes);
        Ok(ident)
    }

    fn get_type(&self) -> EngineResult<FieldDescriptor> {
        let et = self.read_u16(16)?;
        let meaning = type_meaning(et).ok_or(ResultCode::InvalidType)?;
        let name = match et {
            ET_LOOS..=ET_HIOS => "ET_LOOS".to_string(),
            ET_LOPROC..=ET_HIPROC => "ET_LOPROC".to_string(),
            _ => prefixed("ET_", et_to_str(et)),
        };
        Ok(FieldDescriptor::new(name, u32::from(et), Some(meaning.to_string())))
    }

    fn get_machine(&self) -> EngineResult<FieldDescriptor> {
        let machine = self.read_u16(18)?;
        Ok(FieldDescriptor::new(
            prefixed("EM_", machine_to_str(machine)),
            u32::from(machine),
            machine_meaning(machine).map(str::to_string),
        ))
    }

    fn get_version(&self) -> EngineResult<FieldDescriptor> {
        let version = self.read_u32(20)?;
        let (name, meaning) = match version {
            EV_NONE => ("EV_NONE", "Invalid version"),
            EV_CURRENT => ("EV_CURRENT", "Current version"),
            _ => return Err(ResultCode::InvalidVersion),
        };
        Ok(FieldDescriptor::new(name, version, Some(meaning.to_string())))
    }

    fn get_entry(&self) -> EngineResult<u64> {
        self.read_word(self.layout().entry)
    }

    fn get_phoff(&self) -> EngineResult<u64> {
        self.read_word(self.layout().phoff)
    }

    fn get_shoff(&self) -> EngineResult<u64> {
        self.read_word(self.layout().shoff)
    }

    fn get_flags(&self) -> EngineResult<u32> {
        self.read_u32(self.layout().flags)
    }

    fn get_ehsize(&self) -> EngineResult<u16> {
        self.read_u16(self.layout().ehsize)
    }

    fn get_phentsize(&self) -> EngineResult<u16> {
        self.read_u16(self.layout().phentsize)
    }

    fn get_phnum(&self) -> EngineResult<u16> {
        self.read_u16(self.layout().phnum)
    }

    fn get_shentsize(&self) -> EngineResult<u16> {
        self.read_u16(self.layout().shentsize)
    }

    fn get_shnum(&self) -> EngineResult<u16> {
        self.read_u16(self.layout().shnum)
    }

    fn get_shstrndx(&self) -> EngineResult<u16> {
        self.read_u16(self.layout().shstrndx)
    }
}
