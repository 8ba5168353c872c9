use crate::config::{utf8_path, BinaryConfig};
use crate::engine::{AllocType, BinaryClass, Engine, NativeBinary};
use crate::error::{translate, translate_open, Error, Result};
use crate::header::Ehdr;
use crate::sections::{Phdr, Shdr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Host-visible copy of the engine state, taken by a refresh.
#[derive(Debug, Clone)]
struct Mirror {
    fname: Option<Arc<str>>,
    fd: i32,
    mem: Option<Arc<[u8]>>,
    size: usize,
    alloc_type: AllocType,
    arch: BinaryClass,
    ehdr: Option<Arc<Ehdr>>,
    phdr: Option<Arc<[Phdr]>>,
    shdr: Option<Arc<[Shdr]>>,
}

impl Mirror {
    /// State shown before the first refresh.
    fn unopened(config: &BinaryConfig) -> Self {
        Self {
            fname: None,
            fd: -1,
            mem: None,
            size: 0,
            alloc_type: config.alloc_type,
            arch: config.arch,
            ehdr: None,
            phdr: None,
            shdr: None,
        }
    }

    /// Refresh of a closed engine. A closed engine has no file, buffer or
    /// header, so only its hints are read and nothing can fail.
    fn closed<E: Engine>(engine: &E) -> Self {
        Self {
            fname: None,
            fd: -1,
            mem: Some(Arc::from(Vec::new())),
            size: 0,
            alloc_type: engine.alloc_type(),
            arch: engine.class(),
            ehdr: None,
            phdr: None,
            shdr: None,
        }
    }

    /// Copies every field out of `engine`. Either the whole mirror is
    /// built or an error is returned.
    fn capture<E: Engine>(engine: &E) -> Result<Self> {
        let mem = match engine.mem() {
            Some(bytes) => copy_buffer(bytes)?,
            None => Arc::from(Vec::new()),
        };

        let (ehdr, phdr, shdr) = match engine.ehdr() {
            Some(parsed) => {
                let ehdr = Ehdr::build(parsed)?;
                let phdr = engine.program_headers().map_err(translate)?;
                let shdr = engine.section_headers().map_err(translate)?;
                (
                    Some(Arc::new(ehdr)),
                    Some(Arc::from(phdr)),
                    Some(Arc::from(shdr)),
                )
            }
            None => (None, None, None),
        };

        Ok(Self {
            fname: engine.fname().map(Arc::from),
            fd: engine.fd(),
            size: engine.size(),
            mem: Some(mem),
            alloc_type: engine.alloc_type(),
            arch: engine.class(),
            ehdr,
            phdr,
            shdr,
        })
    }
}

fn copy_buffer(bytes: &[u8]) -> Result<Arc<[u8]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes.len())
        .map_err(|_| Error::OutOfMemory)?;
    buf.extend_from_slice(bytes);
    Ok(Arc::from(buf))
}

/// An ELF (or flat) binary opened through an [`Engine`].
///
/// The wrapper owns its engine handle outright. Everything it exposes
/// (`fname`, `mem`, `ehdr`, ...) is a copy taken by the last successful
/// refresh, so reading it never touches the engine, and values handed out
/// stay valid after the binary is closed or re-opened.
///
/// A refresh is all-or-nothing: when any part of it fails, the previous
/// mirror is kept and, if it was triggered by an open, the engine is closed
/// again.
#[derive(Debug)]
pub struct Binary<E: Engine = NativeBinary> {
    engine: E,
    config: BinaryConfig,
    mirror: Mirror,
}

impl Binary<NativeBinary> {
    pub fn new() -> Self {
        let config = BinaryConfig::default();
        let mut engine = NativeBinary::new();
        engine.set_alloc_type(config.alloc_type);
        engine.set_class(config.arch);
        Self {
            engine,
            mirror: Mirror::unopened(&config),
            config,
        }
    }

    pub fn with_config(config: BinaryConfig) -> Result<Self> {
        Self::with_engine(NativeBinary::new(), config)
    }

    /// Shorthand for a binary bound to `path` and opened straight away.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut bin = Self::new();
        bin.open_path(path)?;
        Ok(bin)
    }
}

impl Default for Binary<NativeBinary> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine> Binary<E> {
    pub fn with_engine(mut engine: E, config: BinaryConfig) -> Result<Self> {
        config.validate()?;
        engine.init();
        engine.set_alloc_type(config.alloc_type);
        engine.set_class(config.arch);
        Ok(Self {
            engine,
            mirror: Mirror::unopened(&config),
            config,
        })
    }

    /// Opens the stored path.
    pub fn open(&mut self) -> Result<()> {
        self.open_with(None)
    }

    /// Opens `path`, which also replaces the stored path.
    ///
    /// The argument is stored even when it is empty. An empty argument is
    /// only refused up front when the stored path was empty or missing too;
    /// otherwise it reaches the engine, which reports it as not found.
    pub fn open_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.open_with(Some(path.as_ref()))
    }

    fn open_with(&mut self, path: Option<&Path>) -> Result<()> {
        let path = self.resolve_path(path)?;

        if self.engine.is_open() {
            log::debug!("closing current opened binary before opening {}", path);
            self.engine.close();
            self.engine.init();
            self.apply_hints();
        }

        self.engine
            .open(&path)
            .into_result()
            .map_err(|code| translate_open(code, &path))?;

        match Mirror::capture(&self.engine) {
            Ok(mirror) => {
                self.mirror = mirror;
                log::debug!("refreshed {} ({} bytes)", path, self.mirror.size);
                Ok(())
            }
            Err(err) => {
                log::warn!("refresh of {} failed, closing it again: {}", path, err);
                self.engine.close();
                Err(err)
            }
        }
    }

    fn resolve_path(&mut self, arg: Option<&Path>) -> Result<String> {
        let stored_empty = self
            .config
            .path
            .as_deref()
            .map_or(true, |p| p.as_os_str().is_empty());

        let resolved = match arg {
            Some(path) => {
                let resolved = utf8_path(path)?.to_string();
                self.config.path = Some(PathBuf::from(&resolved));
                resolved
            }
            None => match self.config.path.as_deref() {
                Some(path) => utf8_path(path)?.to_string(),
                None => {
                    return Err(Error::InvalidArgument(
                        "no file passed to be opened, nor the object has a path already set"
                            .to_string(),
                    ))
                }
            },
        };

        if resolved.is_empty() && stored_empty {
            return Err(Error::InvalidArgument(
                "cannot open an empty path".to_string(),
            ));
        }
        Ok(resolved)
    }

    fn apply_hints(&mut self) {
        self.engine.set_alloc_type(self.config.alloc_type);
        self.engine.set_class(self.config.arch);
    }

    /// Releases the engine's file and buffer. Closing a closed binary is a
    /// no-op apart from the refresh.
    pub fn close(&mut self) {
        self.engine.close();
        self.mirror = Mirror::closed(&self.engine);
        log::debug!("closed binary");
    }

    fn ensure_closed(&self, field: &str) -> Result<()> {
        if self.engine.is_open() {
            return Err(Error::InvalidArgument(format!(
                "cannot change {field} while a binary is open"
            )));
        }
        Ok(())
    }

    pub fn set_path<P: Into<PathBuf>>(&mut self, path: P) -> Result<()> {
        self.ensure_closed("path")?;
        let path = path.into();
        utf8_path(&path)?;
        self.config.path = Some(path);
        Ok(())
    }

    pub fn clear_path(&mut self) -> Result<()> {
        self.ensure_closed("path")?;
        self.config.path = None;
        Ok(())
    }

    pub fn set_alloc_type(&mut self, alloc_type: AllocType) -> Result<()> {
        self.ensure_closed("alloc_type")?;
        self.config.alloc_type = alloc_type;
        self.engine.set_alloc_type(alloc_type);
        self.mirror.alloc_type = alloc_type;
        Ok(())
    }

    pub fn set_arch(&mut self, arch: BinaryClass) -> Result<()> {
        self.ensure_closed("arch")?;
        self.config.arch = arch;
        self.engine.set_class(arch);
        self.mirror.arch = arch;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.engine.is_open()
    }

    pub fn config(&self) -> &BinaryConfig {
        &self.config
    }

    /// Path used by the next argument-less [`Binary::open`].
    pub fn path(&self) -> Option<&Path> {
        self.config.path.as_deref()
    }

    /// Name of the file the engine had open at the last refresh.
    ///
    /// This is `None` for a binary that was only configured with a path and
    /// never opened, and again after `close`. The configured path is
    /// available from [`Binary::path`] in both cases.
    pub fn fname(&self) -> Option<&str> {
        self.mirror.fname.as_deref()
    }

    pub fn fd(&self) -> i32 {
        self.mirror.fd
    }

    /// File contents; `None` before the first refresh, empty once closed.
    pub fn mem(&self) -> Option<&[u8]> {
        self.mirror.mem.as_deref()
    }

    /// Shared handle on the same bytes as [`Binary::mem`].
    pub fn mem_shared(&self) -> Option<Arc<[u8]>> {
        self.mirror.mem.clone()
    }

    pub fn size(&self) -> usize {
        self.mirror.size
    }

    pub fn alloc_type(&self) -> AllocType {
        self.mirror.alloc_type
    }

    pub fn arch(&self) -> BinaryClass {
        self.mirror.arch
    }

    pub fn ehdr(&self) -> Option<&Ehdr> {
        self.mirror.ehdr.as_deref()
    }

    pub fn ehdr_shared(&self) -> Option<Arc<Ehdr>> {
        self.mirror.ehdr.clone()
    }

    pub fn phdr(&self) -> Option<&[Phdr]> {
        self.mirror.phdr.as_deref()
    }

    pub fn shdr(&self) -> Option<&[Shdr]> {
        self.mirror.shdr.as_deref()
    }

    pub fn entry_point(&self) -> Option<u64> {
        self.ehdr().map(Ehdr::entry_point)
    }
}

impl<E: Engine> Drop for Binary<E> {
    fn drop(&mut self) {
        self.engine.close();
    }
}
