use crate::header::{HeaderQueries, ParsedHeader};
use crate::result_code::{EngineResult, ResultCode};
use goblin::container::Ctx;
use goblin::elf::program_header::{pt_to_str, PF_R, PF_W, PF_X};
use goblin::elf::section_header::{sht_to_str, SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHN_UNDEF};
use goblin::elf::{ProgramHeader, SectionHeader};
use goblin::strtab::Strtab;
use serde::Serialize;

/// One entry of the program header table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Phdr {
    pub p_type: u32,
    pub type_name: String,
    pub flags: u32,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
}

impl Phdr {
    fn from_goblin_ph(ph: &ProgramHeader) -> Self {
        Phdr {
            p_type: ph.p_type,
            type_name: pt_to_str(ph.p_type).to_string(),
            flags: ph.p_flags,
            offset: ph.p_offset,
            vaddr: ph.p_vaddr,
            paddr: ph.p_paddr,
            filesz: ph.p_filesz,
            memsz: ph.p_memsz,
            align: ph.p_align,
        }
    }

    /// `R`, `W`, `X` permission string, `-` for a missing bit.
    pub fn permissions(&self) -> String {
        [(PF_R, 'R'), (PF_W, 'W'), (PF_X, 'X')]
            .iter()
            .map(|&(bit, c)| if self.flags & bit != 0 { c } else { '-' })
            .collect()
    }
}

/// One entry of the section header table, with its name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shdr {
    pub index: usize,
    pub name: String,
    pub sh_name: u32,
    pub sh_type: u32,
    pub type_name: String,
    pub flags: u64,
    pub addr: u64,
    pub offset: u64,
    pub size: u64,
    pub link: u32,
    pub info: u32,
    pub addralign: u64,
    pub entsize: u64,
}

impl Shdr {
    fn from_goblin_sh(index: usize, sh: &SectionHeader, strtab: Option<&Strtab<'_>>) -> Self {
        let name = match strtab {
            Some(strtab) => strtab.get_at(sh.sh_name).unwrap_or("<invalid_name>"),
            None => "",
        };

        Shdr {
            index,
            name: name.to_string(),
            sh_name: sh.sh_name as u32,
            sh_type: sh.sh_type,
            type_name: sht_to_str(sh.sh_type).to_string(),
            flags: sh.sh_flags,
            addr: sh.sh_addr,
            offset: sh.sh_offset,
            size: sh.sh_size,
            link: sh.sh_link,
            info: sh.sh_info,
            addralign: sh.sh_addralign,
            entsize: sh.sh_entsize,
        }
    }

    /// `W`, `A`, `X` flag string in `readelf` order.
    pub fn flag_string(&self) -> String {
        [
            (u64::from(SHF_WRITE), 'W'),
            (u64::from(SHF_ALLOC), 'A'),
            (u64::from(SHF_EXECINSTR), 'X'),
        ]
        .iter()
        .filter(|&&(bit, _)| self.flags & bit != 0)
        .map(|&(_, c)| c)
        .collect()
    }
}

/// Checks that `count` entries of `entsize` bytes starting at `offset` fit
/// in `len` bytes and that entries are at least `min_entsize` long.
fn table_bounds(
    offset: u64,
    count: u16,
    entsize: u16,
    min_entsize: usize,
    len: usize,
) -> EngineResult<()> {
    if (entsize as usize) < min_entsize {
        return Err(ResultCode::CorruptedTable);
    }
    let end = u64::from(count)
        .checked_mul(u64::from(entsize))
        .and_then(|bytes| bytes.checked_add(offset))
        .ok_or(ResultCode::CorruptedTable)?;
    if end > len as u64 {
        return Err(ResultCode::CorruptedTable);
    }
    Ok(())
}

/// Offsets of the `count` entries of a table already checked by
/// [`table_bounds`].
fn entry_offsets(offset: u64, count: u16, entsize: u16) -> impl Iterator<Item = usize> {
    (0..usize::from(count)).map(move |i| offset as usize + i * usize::from(entsize))
}

fn corrupted(table: &str) -> impl Fn(goblin::error::Error) -> ResultCode + '_ {
    move |err| {
        log::debug!("{} entry rejected: {}", table, err);
        ResultCode::CorruptedTable
    }
}

/// Decodes the program header table described by `hdr` out of the file
/// bytes in `data`.
pub fn read_program_headers(data: &[u8], hdr: &ParsedHeader) -> EngineResult<Vec<Phdr>> {
    let phoff = hdr.get_phoff()?;
    let phnum = hdr.get_phnum()?;
    let phentsize = hdr.get_phentsize()?;
    if phnum == 0 || phoff == 0 {
        return Ok(Vec::new());
    }

    let ctx: Ctx = hdr.ctx();
    table_bounds(phoff, phnum, phentsize, ProgramHeader::size(ctx), data.len())?;

    let mut phdrs = Vec::with_capacity(usize::from(phnum));
    for offset in entry_offsets(phoff, phnum, phentsize) {
        let parsed = ProgramHeader::parse(data, offset, 1, ctx).map_err(corrupted("program header"))?;
        phdrs.extend(parsed.iter().map(Phdr::from_goblin_ph));
    }
    Ok(phdrs)
}

/// Decodes the section header table and resolves names through the
/// section header string table when it is present and in bounds.
pub fn read_section_headers(data: &[u8], hdr: &ParsedHeader) -> EngineResult<Vec<Shdr>> {
    let shoff = hdr.get_shoff()?;
    let shnum = hdr.get_shnum()?;
    let shentsize = hdr.get_shentsize()?;
    let shstrndx = hdr.get_shstrndx()?;
    if shnum == 0 || shoff == 0 {
        return Ok(Vec::new());
    }

    let ctx: Ctx = hdr.ctx();
    table_bounds(shoff, shnum, shentsize, SectionHeader::size(ctx), data.len())?;

    let mut headers = Vec::with_capacity(usize::from(shnum));
    for offset in entry_offsets(shoff, shnum, shentsize) {
        let parsed = SectionHeader::parse(data, offset, 1, ctx).map_err(corrupted("section header"))?;
        headers.extend(parsed);
    }

    let strtab = if u32::from(shstrndx) == SHN_UNDEF {
        None
    } else {
        headers
            .get(usize::from(shstrndx))
            .and_then(|sh| Strtab::parse(data, sh.sh_offset as usize, sh.sh_size as usize, 0).ok())
    };
    if strtab.is_none() {
        log::warn!("section header string table missing or unreadable");
    }

    Ok(headers
        .iter()
        .enumerate()
        .map(|(index, sh)| Shdr::from_goblin_sh(index, sh, strtab.as_ref()))
        .collect())
}
