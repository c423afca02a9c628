//! Crate-level error type

use crate::config::ConfigError;
use crate::diagnostic::FixRangeError;
use crate::parser::ParseError;
use crate::selector::SelectorError;
use crate::tree::TreeError;
use crate::visitor_keys::RegistryError;
use thiserror::Error;

/// Fatal errors returned by the engine entry points
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    FixRange(#[from] FixRangeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
