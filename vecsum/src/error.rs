use std::io;

/// Everything that can abort a run. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("misaligned size: {0}")]
    Alignment(String),
    #[error("{op}({target}) failed: {source}")]
    Connect {
        op: &'static str,
        target: String,
        source: io::Error,
    },
    #[error("{op}({path}) failed: {source}")]
    Io {
        op: &'static str,
        path: String,
        source: io::Error,
    },
    #[error("failed to allocate {what}: {source}")]
    Resource { what: String, source: io::Error },
}

impl Error {
    pub(crate) fn connect(op: &'static str, target: impl Into<String>, source: io::Error) -> Self {
        Error::Connect {
            op,
            target: target.into(),
            source,
        }
    }

    pub(crate) fn io(op: &'static str, path: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn resource(what: impl Into<String>, source: io::Error) -> Self {
        Error::Resource {
            what: what.into(),
            source,
        }
    }

    /// A read returned fewer bytes than a whole chunk.
    pub(crate) fn partial_read(op: &'static str, path: impl Into<String>, got: usize) -> Self {
        Error::io(
            op,
            path,
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("got a partial read of length {got}"),
            ),
        )
    }
}
