use std::fmt::{self, Display};

use crate::ids::TitleId;

/// Errors produced by model constructors and validation routines.
#[derive(Debug)]
pub enum ModelError {
    UnsupportedCategory(TitleId),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnsupportedCategory(id) => {
                write!(f, "unsupported title category: {id}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
