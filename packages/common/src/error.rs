use stylescope_parser::ParseError;
use thiserror::Error;

/// Failure to load a stylesheet from a [`FileSystem`](crate::FileSystem)
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
