//! CLI Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("could not open the library database")]
    Database,
    #[display("extension error")]
    Extension,
    #[display("no extension `{_0}` in the repository")]
    UnknownExtension(#[error(not(source))] String),
    #[display("sync failed")]
    Sync,
    #[display("could not read updates")]
    Updates,
}
