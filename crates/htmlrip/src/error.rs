//! Error type shared by parsing, ripping and configuration loading.
//!
//! Malformed markup is never an error here: the builder and rippers always
//! degrade to a defined shape. What remains is I/O from the underlying
//! reader, bad configuration tables, and the strict stack flavor reporting a
//! pop that matched nothing.

#[derive(Debug, thiserror::Error)]
pub enum RipError {
    #[error("failed reading markup input: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid table configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("no open tag named `{name}` to pop")]
    StackMiss { name: String },
}

pub type RipResult<T> = Result<T, RipError>;
