#![allow(dead_code)]

use byteorder::{WriteBytesExt, BE, LE};
use std::path::{Path, PathBuf};

pub const TEXT: [u8; 16] = [
    0x31, 0xed, 0x48, 0x89, 0xe7, 0xe8, 0x00, 0x00, 0x00, 0x00, 0x90, 0x90, 0x90, 0x90, 0xf4,
    0xc3,
];
pub const SHSTRTAB: &[u8] = b"\0.text\0.shstrtab\0";

/// Writes a minimal executable: one `PT_LOAD` segment and the sections
/// `""`, `.text` and `.shstrtab`.
#[derive(Debug, Clone, Copy)]
pub struct ElfImage {
    pub wide: bool,
    pub big_endian: bool,
    pub entry: u64,
    pub machine: u16,
}

impl ElfImage {
    pub fn elf64_le(entry: u64) -> Self {
        Self {
            wide: true,
            big_endian: false,
            entry,
            machine: 62,
        }
    }

    pub fn elf32_be(entry: u32) -> Self {
        Self {
            wide: false,
            big_endian: true,
            entry: u64::from(entry),
            machine: 20,
        }
    }

    pub fn ehsize(&self) -> u16 {
        if self.wide { 64 } else { 52 }
    }

    pub fn phentsize(&self) -> u16 {
        if self.wide { 56 } else { 32 }
    }

    pub fn shentsize(&self) -> u16 {
        if self.wide { 64 } else { 40 }
    }

    pub fn text_offset(&self) -> u64 {
        u64::from(self.ehsize() + self.phentsize())
    }

    pub fn strtab_offset(&self) -> u64 {
        self.text_offset() + TEXT.len() as u64
    }

    pub fn shoff(&self) -> u64 {
        (self.strtab_offset() + SHSTRTAB.len() as u64 + 7) & !7
    }

    pub fn len(&self) -> usize {
        self.shoff() as usize + 3 * usize::from(self.shentsize())
    }

    pub fn build(&self) -> Vec<u8> {
        let mut w = Writer {
            buf: Vec::with_capacity(self.len()),
            wide: self.wide,
            big_endian: self.big_endian,
        };

        // e_ident
        w.buf.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
        w.buf.push(if self.wide { 2 } else { 1 });
        w.buf.push(if self.big_endian { 2 } else { 1 });
        w.buf.push(1);
        w.buf.resize(16, 0);

        w.u16(2); // ET_EXEC
        w.u16(self.machine);
        w.u32(1);
        w.word(self.entry);
        w.word(u64::from(self.ehsize()));
        w.word(self.shoff());
        w.u32(0);
        w.u16(self.ehsize());
        w.u16(self.phentsize());
        w.u16(1);
        w.u16(self.shentsize());
        w.u16(3);
        w.u16(2);
        assert_eq!(w.buf.len(), usize::from(self.ehsize()));

        // PT_LOAD covering the whole file, R+X
        let total = self.len() as u64;
        w.u32(1);
        if self.wide {
            w.u32(5);
        }
        w.word(0);
        w.word(0x40_0000);
        w.word(0x40_0000);
        w.word(total);
        w.word(total);
        if !self.wide {
            w.u32(5);
        }
        w.word(0x1000);

        w.buf.extend_from_slice(&TEXT);
        w.buf.extend_from_slice(SHSTRTAB);
        w.buf.resize(self.shoff() as usize, 0);

        w.section(0, 0, 0, 0, 0, 0, 0);
        w.section(1, 1, 0x6, 0x40_0000 + self.text_offset(), self.text_offset(), TEXT.len() as u64, 16);
        w.section(7, 3, 0, 0, self.strtab_offset(), SHSTRTAB.len() as u64, 1);

        assert_eq!(w.buf.len(), self.len());
        w.buf
    }
}

struct Writer {
    buf: Vec<u8>,
    wide: bool,
    big_endian: bool,
}

impl Writer {
    fn u16(&mut self, v: u16) {
        if self.big_endian {
            self.buf.write_u16::<BE>(v).unwrap();
        } else {
            self.buf.write_u16::<LE>(v).unwrap();
        }
    }

    fn u32(&mut self, v: u32) {
        if self.big_endian {
            self.buf.write_u32::<BE>(v).unwrap();
        } else {
            self.buf.write_u32::<LE>(v).unwrap();
        }
    }

    fn u64(&mut self, v: u64) {
        if self.big_endian {
            self.buf.write_u64::<BE>(v).unwrap();
        } else {
            self.buf.write_u64::<LE>(v).unwrap();
        }
    }

    fn word(&mut self, v: u64) {
        if self.wide {
            self.u64(v);
        } else {
            self.u32(v as u32);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn section(
        &mut self,
        name: u32,
        sh_type: u32,
        flags: u64,
        addr: u64,
        offset: u64,
        size: u64,
        align: u64,
    ) {
        self.u32(name);
        self.u32(sh_type);
        self.word(flags);
        self.word(addr);
        self.word(offset);
        self.word(size);
        self.u32(0);
        self.u32(0);
        self.word(align);
        self.word(0);
    }
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn sample_elf(dir: &Path) -> PathBuf {
    write_file(dir, "sample.elf", &ElfImage::elf64_le(0x401000).build())
}
