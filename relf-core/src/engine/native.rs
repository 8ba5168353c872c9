use crate::engine::{AllocType, BinaryClass, Engine};
use crate::header::ParsedHeader;
use crate::result_code::{EngineResult, ResultCode};
use crate::sections::{read_program_headers, read_section_headers, Phdr, Shdr};
use memmap::{Mmap, MmapOptions};
use std::fs::File;
use std::io::Read;

/// Memory holding the bytes of an open binary.
enum Backing {
    Mapped(Mmap),
    Heap(Vec<u8>),
}

impl Backing {
    fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Mapped(map) => &map[..],
            Backing::Heap(buf) => &buf[..],
        }
    }
}

impl std::fmt::Debug for Backing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backing::Mapped(map) => write!(f, "Mapped({} bytes)", map.len()),
            Backing::Heap(buf) => write!(f, "Heap({} bytes)", buf.len()),
        }
    }
}

/// Everything that only exists while a file is open. Dropping it unmaps
/// or frees the buffer and closes the descriptor.
#[derive(Debug)]
struct OpenBinary {
    fname: String,
    file: File,
    mem: Backing,
    alloc_type: AllocType,
    class: BinaryClass,
    ehdr: Option<ParsedHeader>,
}

/// File-backed binary handle.
///
/// Closed handles keep only the allocation and class hints for the next
/// open; an open handle owns its file, buffer and parsed header.
#[derive(Debug)]
pub struct NativeBinary {
    alloc_type: AllocType,
    class: BinaryClass,
    open: Option<OpenBinary>,
}

impl NativeBinary {
    /// A closed handle with no allocation strategy chosen yet.
    pub fn new() -> Self {
        Self {
            alloc_type: AllocType::None,
            class: BinaryClass::Elf,
            open: None,
        }
    }

    fn load(&self, path: &str) -> EngineResult<OpenBinary> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(ResultCode::IsDirectory);
        }
        if metadata.len() == 0 {
            return Err(ResultCode::EmptyFile);
        }
        let len = usize::try_from(metadata.len()).map_err(|_| ResultCode::OutOfMemory)?;

        let alloc_type = self.alloc_type.resolve();
        let mem = match alloc_type {
            AllocType::Malloc => {
                let mut buf = Vec::new();
                buf.try_reserve_exact(len)
                    .map_err(|_| ResultCode::OutOfMemory)?;
                (&file).read_to_end(&mut buf)?;
                Backing::Heap(buf)
            }
            AllocType::None | AllocType::Mmap => {
                // SAFETY: the map is read-only and lives no longer than the
                // file handle it was created from.
                let map = unsafe { MmapOptions::new().map(&file) }.map_err(|e| {
                    log::debug!("mmap of {} failed: {}", path, e);
                    ResultCode::Mmap
                })?;
                Backing::Mapped(map)
            }
        };

        let (class, ehdr) = if self.class.is_flat() {
            (self.class, None)
        } else {
            let ehdr = ParsedHeader::parse(mem.as_slice())?;
            let detected = if ehdr.is_64() {
                BinaryClass::Elf64
            } else {
                BinaryClass::Elf32
            };
            if !self.class.accepts(detected) {
                return Err(ResultCode::ClassMismatch);
            }
            (detected, Some(ehdr))
        };

        Ok(OpenBinary {
            fname: path.to_string(),
            file,
            mem,
            alloc_type,
            class,
            ehdr,
        })
    }
}

impl Default for NativeBinary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn raw_fd(file: &File) -> i32 {
    use std::os::unix::io::AsRawFd;
    file.as_raw_fd()
}

#[cfg(not(unix))]
fn raw_fd(_file: &File) -> i32 {
    -1
}

impl Engine for NativeBinary {
    type Header = ParsedHeader;

    fn init(&mut self) {
        self.open = None;
        self.alloc_type = AllocType::None;
        self.class = BinaryClass::Elf;
    }

    fn open(&mut self, path: &str) -> ResultCode {
        self.close();
        match self.load(path) {
            Ok(open) => {
                log::debug!(
                    "opened {} ({} bytes, {}, {})",
                    path,
                    open.mem.as_slice().len(),
                    open.alloc_type,
                    open.class
                );
                self.open = Some(open);
                ResultCode::Success
            }
            Err(code) => {
                log::debug!("failed to open {}: {}", path, code);
                code
            }
        }
    }

    fn close(&mut self) {
        if let Some(open) = self.open.take() {
            log::debug!("closing {}", open.fname);
        }
    }

    fn set_alloc_type(&mut self, alloc_type: AllocType) {
        self.alloc_type = alloc_type;
    }

    fn set_class(&mut self, class: BinaryClass) {
        self.class = class;
    }

    fn fname(&self) -> Option<&str> {
        self.open.as_ref().map(|open| open.fname.as_str())
    }

    fn fd(&self) -> i32 {
        self.open.as_ref().map_or(-1, |open| raw_fd(&open.file))
    }

    fn mem(&self) -> Option<&[u8]> {
        self.open.as_ref().map(|open| open.mem.as_slice())
    }

    fn alloc_type(&self) -> AllocType {
        self.open
            .as_ref()
            .map_or(self.alloc_type, |open| open.alloc_type)
    }

    fn class(&self) -> BinaryClass {
        self.open.as_ref().map_or(self.class, |open| open.class)
    }

    fn ehdr(&self) -> Option<&ParsedHeader> {
        self.open.as_ref().and_then(|open| open.ehdr.as_ref())
    }

    fn program_headers(&self) -> EngineResult<Vec<Phdr>> {
        match &self.open {
            Some(OpenBinary {
                mem,
                ehdr: Some(ehdr),
                ..
            }) => read_program_headers(mem.as_slice(), ehdr),
            Some(_) => Ok(Vec::new()),
            None => Err(ResultCode::Closed),
        }
    }

    fn section_headers(&self) -> EngineResult<Vec<Shdr>> {
        match &self.open {
            Some(OpenBinary {
                mem,
                ehdr: Some(ehdr),
                ..
            }) => read_section_headers(mem.as_slice(), ehdr),
            Some(_) => Ok(Vec::new()),
            None => Err(ResultCode::Closed),
        }
    }
}
