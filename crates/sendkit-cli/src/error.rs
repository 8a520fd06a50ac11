use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] sendkit_core::ValidationError),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::InvalidBody(_) => 2,
            Self::Serialization(_) => 4,
            Self::Io(_) | Self::Logging(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_categories() {
        assert_eq!(CliError::from(sendkit_core::ValidationError::ZeroConcurrency).exit_code(), 2);
        assert_eq!(CliError::InvalidBody(String::from("eof")).exit_code(), 2);
        assert_eq!(
            CliError::from(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed")).exit_code(),
            10
        );
    }
}
