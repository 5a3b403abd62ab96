use thiserror::Error;

use crate::core::types::GeneratorId;

#[derive(Error, Debug)]
pub enum TickwireError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unknown generator: {0}")]
    UnknownGenerator(String),

    #[error("Generator {0} is already registered")]
    DuplicateGenerator(GeneratorId),

    #[error("Generator {generator} compute fault: {reason}")]
    GeneratorComputeFault {
        generator: GeneratorId,
        reason: String,
    },

    #[error("Invalid wire message: {0}")]
    InvalidMessage(String),

    #[error("Frame of {size} bytes exceeds maximum of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TickwireError>;
