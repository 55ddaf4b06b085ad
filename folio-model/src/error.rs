use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug)]
pub enum ModelError {
    InvalidNumbering(String),
    InvalidRange { start: f64, end: f64 },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidNumbering(raw) => {
                write!(f, "invalid numbering: {raw:?}")
            }
            ModelError::InvalidRange { start, end } => {
                write!(f, "invalid range: {start} > {end}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
