use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Storage write error: {0}")]
    StorageWrite(String),

    #[error("Corrupt store: {0}")]
    CorruptStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl Error {
    /// Stable name of the variant, carried across the HTTP boundary
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::LocationUnavailable(_) => "location_unavailable",
            Error::StorageWrite(_) => "storage_write",
            Error::CorruptStore(_) => "corrupt_store",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Classifier(_) => "classifier",
            Error::Notification(_) => "notification",
            Error::NotFound(_) => "not_found",
            Error::Http(_) => "http",
        }
    }

    /// Rebuild an error from its `kind` name
    pub fn from_kind(kind: &str, message: String) -> Option<Self> {
        Some(match kind {
            "validation" => Error::Validation(message),
            "location_unavailable" => Error::LocationUnavailable(message),
            "storage_write" => Error::StorageWrite(message),
            "corrupt_store" => Error::CorruptStore(message),
            "config" => Error::Config(message),
            "io" => Error::Io(message),
            "serialization" => Error::Serialization(message),
            "classifier" => Error::Classifier(message),
            "notification" => Error::Notification(message),
            "not_found" => Error::NotFound(message),
            "http" => Error::Http(message),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_rebuild_the_same_variant() {
        let errors = [
            Error::Validation("v".into()),
            Error::LocationUnavailable("l".into()),
            Error::StorageWrite("s".into()),
            Error::CorruptStore("c".into()),
            Error::NotFound("n".into()),
            Error::Http("h".into()),
        ];
        for err in errors {
            let message = match &err {
                Error::Validation(m)
                | Error::LocationUnavailable(m)
                | Error::StorageWrite(m)
                | Error::CorruptStore(m)
                | Error::NotFound(m)
                | Error::Http(m) => m.clone(),
                _ => unreachable!(),
            };
            assert_eq!(Error::from_kind(err.kind(), message), Some(err));
        }
        assert_eq!(Error::from_kind("mystery", "x".into()), None);
    }
}
