//! The error type shared by every crate in the workspace.

/// Which of the three outcomes a failure maps to, and in turn which process
/// exit code `mkimg-cli` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The user's input is unusable as given (bad size, unknown verb, bad
    /// partition type). Exit code 1.
    Config,
    /// The host denied a resource the operation needs (required file is
    /// absent, allocation too large). Exit code 2.
    Resource,
    /// A read or write failed after work had already begun. Exit code 3.
    Io,
}

/// The error type returned by every fallible operation in this workspace.
#[derive(Debug, thiserror::Error)]
pub enum MkimgError {
    #[error("{0}")]
    Config(String),
    #[error("{0}")]
    Resource(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid size argument: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
}

impl MkimgError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// The kind this error belongs to, used to pick a process exit code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::ParseInt(_) => ErrorKind::Config,
            Self::Resource(_) => ErrorKind::Resource,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// The process exit code this error should produce.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Config => 1,
            ErrorKind::Resource => 2,
            ErrorKind::Io => 3,
        }
    }
}

pub type Result<T> = core::result::Result<T, MkimgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_exit_code() {
        assert_eq!(MkimgError::config("bad size").exit_code(), 1);
    }

    #[test]
    fn resource_exit_code() {
        assert_eq!(MkimgError::resource("missing file").exit_code(), 2);
    }

    #[test]
    fn io_exit_code() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: MkimgError = io.into();
        assert_eq!(err.exit_code(), 3);
    }
}
