use std::fmt;
use std::io;

/// Outcome of a call into the binary analysis engine.
///
/// Operating-system failures reuse the matching `errno` values so callers can
/// compare them against the platform constants; engine-specific failures start
/// at 40. `Success` is the only non-error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    NotFound,
    Io,
    OutOfMemory,
    PermissionDenied,
    IsDirectory,
    InvalidArgument,
    Error,
    Mmap,
    EmptyFile,
    NotElf,
    InvalidClass,
    ClassMismatch,
    InvalidEncoding,
    TruncatedHeader,
    InvalidType,
    InvalidVersion,
    CorruptedTable,
    Closed,
}

/// Engine calls that produce a value report failures as a bare `ResultCode`.
pub type EngineResult<T> = std::result::Result<T, ResultCode>;

impl ResultCode {
    pub const ALL: [ResultCode; 19] = [
        ResultCode::Success,
        ResultCode::NotFound,
        ResultCode::Io,
        ResultCode::OutOfMemory,
        ResultCode::PermissionDenied,
        ResultCode::IsDirectory,
        ResultCode::InvalidArgument,
        ResultCode::Error,
        ResultCode::Mmap,
        ResultCode::EmptyFile,
        ResultCode::NotElf,
        ResultCode::InvalidClass,
        ResultCode::ClassMismatch,
        ResultCode::InvalidEncoding,
        ResultCode::TruncatedHeader,
        ResultCode::InvalidType,
        ResultCode::InvalidVersion,
        ResultCode::CorruptedTable,
        ResultCode::Closed,
    ];

    pub fn code(self) -> u32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::NotFound => 2,
            ResultCode::Io => 5,
            ResultCode::OutOfMemory => 12,
            ResultCode::PermissionDenied => 13,
            ResultCode::IsDirectory => 21,
            ResultCode::InvalidArgument => 22,
            ResultCode::Error => 40,
            ResultCode::Mmap => 41,
            ResultCode::EmptyFile => 42,
            ResultCode::NotElf => 43,
            ResultCode::InvalidClass => 44,
            ResultCode::ClassMismatch => 45,
            ResultCode::InvalidEncoding => 46,
            ResultCode::TruncatedHeader => 47,
            ResultCode::InvalidType => 48,
            ResultCode::InvalidVersion => 49,
            ResultCode::CorruptedTable => 50,
            ResultCode::Closed => 51,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|rc| rc.code() == code)
    }

    /// Symbolic name, as listed by the constant registry.
    pub fn name(self) -> &'static str {
        match self {
            ResultCode::Success => "SUCCESS",
            ResultCode::NotFound => "ENOENT",
            ResultCode::Io => "EIO",
            ResultCode::OutOfMemory => "ENOMEM",
            ResultCode::PermissionDenied => "EACCES",
            ResultCode::IsDirectory => "EISDIR",
            ResultCode::InvalidArgument => "EINVAL",
            ResultCode::Error => "ERROR",
            ResultCode::Mmap => "EMMAP",
            ResultCode::EmptyFile => "EEMPTY",
            ResultCode::NotElf => "ENOT_ELF",
            ResultCode::InvalidClass => "EINVALID_CLASS",
            ResultCode::ClassMismatch => "ECLASS_MISMATCH",
            ResultCode::InvalidEncoding => "EINVALID_ENCODING",
            ResultCode::TruncatedHeader => "ETRUNCATED_HEADER",
            ResultCode::InvalidType => "EINVALID_TYPE",
            ResultCode::InvalidVersion => "EINVALID_VERSION",
            ResultCode::CorruptedTable => "ECORRUPTED_TABLE",
            ResultCode::Closed => "ECLOSED",
        }
    }

    /// Message table entry for this code. The returned string is static;
    /// callers that keep it around should take an owned copy.
    pub fn strerror(self) -> &'static str {
        match self {
            ResultCode::Success => "Success",
            ResultCode::NotFound => "No such file or directory",
            ResultCode::Io => "Input/output error",
            ResultCode::OutOfMemory => "Cannot allocate memory",
            ResultCode::PermissionDenied => "Permission denied",
            ResultCode::IsDirectory => "Is a directory",
            ResultCode::InvalidArgument => "Invalid argument",
            ResultCode::Error => "Unknown error",
            ResultCode::Mmap => "Failed to map the file into memory",
            ResultCode::EmptyFile => "The file is empty",
            ResultCode::NotElf => "The file is not an ELF binary",
            ResultCode::InvalidClass => "Invalid ELF class in e_ident",
            ResultCode::ClassMismatch => "ELF class does not match the requested architecture",
            ResultCode::InvalidEncoding => "Invalid data encoding in e_ident",
            ResultCode::TruncatedHeader => "The file is too small to hold an ELF header",
            ResultCode::InvalidType => "Invalid object file type",
            ResultCode::InvalidVersion => "Invalid object file version",
            ResultCode::CorruptedTable => "Header table lies outside of the file",
            ResultCode::Closed => "The binary is not open",
        }
    }

    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }

    pub fn into_result(self) -> EngineResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn from_io_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ResultCode::NotFound,
            io::ErrorKind::PermissionDenied => ResultCode::PermissionDenied,
            io::ErrorKind::OutOfMemory => ResultCode::OutOfMemory,
            io::ErrorKind::InvalidInput => ResultCode::InvalidArgument,
            _ => match err.raw_os_error() {
                Some(21) => ResultCode::IsDirectory,
                _ => ResultCode::Io,
            },
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.strerror(), self.code())
    }
}

impl From<io::Error> for ResultCode {
    fn from(err: io::Error) -> Self {
        ResultCode::from_io_error(&err)
    }
}
