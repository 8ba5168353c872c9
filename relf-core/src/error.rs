use crate::result_code::ResultCode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Out of memory")]
    OutOfMemory,

    #[error("{}", native_message(.code, .message, .path))]
    NativeFailure {
        code: ResultCode,
        message: String,
        path: Option<String>,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
}

fn native_message(code: &ResultCode, message: &str, path: &Option<String>) -> String {
    match path {
        Some(path) => format!(
            "Failed to open file '{path}'. ErrorCode: {}, Message: {message}",
            code.code()
        ),
        None => format!("ErrorCode: {}, Message: {message}", code.code()),
    }
}

impl Error {
    /// Numeric engine code attached to the error, if it came from the engine.
    pub fn code(&self) -> Option<u32> {
        self.result_code().map(ResultCode::code)
    }

    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            Error::NativeFailure { code, .. } => Some(*code),
            Error::OutOfMemory => Some(ResultCode::OutOfMemory),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Error::NativeFailure { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Turns a failed engine code into an [`Error`].
///
/// This is the one place engine codes cross into the library's error type.
/// `Success` is a caller bug; it still becomes an error rather than being
/// dropped.
pub fn translate(code: ResultCode) -> Error {
    if code.is_success() {
        log::warn!("translate() called with a success code");
    }
    match code {
        ResultCode::OutOfMemory => Error::OutOfMemory,
        code => Error::NativeFailure {
            code,
            message: code.strerror().to_owned(),
            path: None,
        },
    }
}

/// Like [`translate`], remembering which file the failed open was about.
pub fn translate_open(code: ResultCode, path: &str) -> Error {
    match translate(code) {
        Error::NativeFailure { code, message, .. } => Error::NativeFailure {
            code,
            message,
            path: Some(path.to_owned()),
        },
        other => other,
    }
}
