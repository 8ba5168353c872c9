pub mod binary;
pub mod config;
pub mod engine;
pub mod error;
pub mod header;
pub mod registry;
pub mod result_code;
pub mod sections;

pub use binary::*;
pub use config::BinaryConfig;
pub use engine::{AllocType, BinaryClass, Engine, NativeBinary};
pub use error::{translate, Error, Result};
pub use header::{Ehdr, FieldDescriptor, HeaderQueries, ParsedHeader};
pub use result_code::{EngineResult, ResultCode};
pub use sections::*;
