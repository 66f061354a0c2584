use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("unknown participant '{0}'")]
    UnknownParticipant(String),

    #[error("message has neither text nor image")]
    EmptyMessage,

    #[error("event claims to be from '{claimed}' but this connection is '{bound}'")]
    IdentityMismatch { claimed: String, bound: String },

    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("storage failure: {0}")]
    Persistence(String),
}

impl RelayError {
    /// Text sent back to the client in `relay_error`. Storage details stay in the server log.
    pub fn client_reason(&self) -> String {
        match self {
            Self::Persistence(_) => "could not be saved, try again".to_string(),
            other => other.to_string(),
        }
    }
}
