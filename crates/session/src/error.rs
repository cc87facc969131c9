use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Wire(#[from] qws_wire::Error),

    #[error(transparent)]
    Sync(#[from] qws_sync::Error),

    #[error("connection closed")]
    Closed,

    #[error("command already registered: {0}")]
    AlreadyRegistered(i16),
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl qws_sync::error::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

qws_sync::impl_context!();
