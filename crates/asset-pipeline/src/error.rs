use std::{fmt, io};

/// Hand-rolled error type, matching this workspace's existing
/// `dess-assets`/`dess-asset-pipeline` style: no `anyhow`, no `thiserror`.
/// Never crosses the asset manager's public surface - `ensure_imported`,
/// `import_asset`, `get_texture_data` and `get_mesh_data` resolve every
/// `Error` into a logged message plus the documented null/fallback return.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Json(serde_json::Error),
    SourceMissing(String),
    UnsupportedExtension(String),
    ImportFailed(String),
    NoImporter(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Json(err) => write!(f, "json error: {err}"),
            Error::SourceMissing(path) => write!(f, "source file missing: {path}"),
            Error::UnsupportedExtension(path) => {
                write!(f, "unsupported source extension: {path}")
            }
            Error::ImportFailed(msg) => write!(f, "import failed: {msg}"),
            Error::NoImporter(ty) => write!(f, "no importer registered for type {ty}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
