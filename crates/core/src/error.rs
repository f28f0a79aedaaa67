/// Domain error shared by every crate in the workspace.
///
/// The transport layer maps `Validation` to INVALID_ARGUMENT, `NotFound` to
/// NOT_FOUND and `Conflict` to ALREADY_EXISTS. `Internal` never carries
/// storage-engine detail; implementations log that and pass a generic message.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a `NotFound` keyed by anything displayable.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{field}: {msg}"),
                    None => format!("{field}: failed '{}' check", e.code),
                })
            })
            .collect();
        // HashMap iteration order is unstable; keep messages reproducible.
        messages.sort();
        CoreError::Validation(messages.join("; "))
    }
}
