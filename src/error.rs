use thiserror::Error;

pub type Result<T> = std::result::Result<T, CogitateError>;

#[derive(Error, Debug)]
pub enum CogitateError {
    #[error("Repository access error: {0}")]
    RepositoryAccess(String),
    #[error("Division error: cannot divide {numerator} by zero")]
    Division { numerator: u64 },
    #[error("Field '{field}' not found for contributor '{identity}'")]
    FieldNotFound { identity: String, field: String },
    #[error("Malformed document '{document}': {reason}")]
    MalformedDocument { document: String, reason: String },
    #[error("Unknown contributor: {0}")]
    UnknownContributor(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CogitateError {
    pub fn malformed(document: &str, reason: impl Into<String>) -> Self {
        CogitateError::MalformedDocument {
            document: document.to_string(),
            reason: reason.into(),
        }
    }
}

// Every gix failure met while opening or walking a repository is an access error.
macro_rules! repository_access_from {
    ($($err:ty),* $(,)?) => {
        $(
            impl From<$err> for CogitateError {
                fn from(err: $err) -> Self {
                    CogitateError::RepositoryAccess(err.to_string())
                }
            }
        )*
    };
}

repository_access_from!(
    gix::open::Error,
    gix::discover::Error,
    gix::object::find::existing::Error,
    gix::object::commit::Error,
    gix::reference::find::existing::Error,
    gix::head::peel::to_commit::Error,
    gix::object::find::existing::with_conversion::Error,
    gix::objs::decode::Error,
    gix::repository::diff_tree_to_tree::Error,
);

impl From<toml::de::Error> for CogitateError {
    fn from(err: toml::de::Error) -> Self {
        CogitateError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_not_found_names_both_sides() {
        let err = CogitateError::FieldNotFound {
            identity: "alice".into(),
            field: "EMAIL".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("EMAIL"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CogitateError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }
}
