// src/error.rs

use thiserror::Error;

/// Everything that can go wrong during a run.
#[derive(Error, Debug)]
pub enum Error {
    /// Connecting, logging in, selecting or fetching from the mailbox failed.
    #[error("mailbox error: {0}")]
    Mailbox(String),

    /// The raw message could not be parsed as MIME.
    #[error("failed to parse message: {0}")]
    Mime(#[from] mailparse::MailParseError),

    /// The PDF could not be opened or its text could not be extracted.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// The consumption store rejected a row.
    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<imap::Error> for Error {
    fn from(e: imap::Error) -> Self {
        Error::Mailbox(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
