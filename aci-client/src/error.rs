use thiserror::Error;

pub type AciResult<T> = Result<T, AciError>;

#[derive(Debug, Error)]
pub enum AciError {
    /// The transport could not complete the exchange at all: DNS failure,
    /// refused connection, timeout.
    #[error("error communicating with {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: reqwest::Error
    },

    /// A response was received but indicates failure. Carries the name of
    /// the operation that initiated the call so every high-level extraction
    /// produces a self-identifying error.
    #[error(
        "HTTP error while performing the {operation} operation on {endpoint}: \
         status {status}, reason: {reason}"
    )]
    Http {
        operation: &'static str,
        endpoint: String,
        status: u16,
        reason: String
    },

    /// A success response whose body could not be decoded for the requested
    /// object class.
    #[error("failed to decode {operation} response: {detail}")]
    Decode {
        operation: &'static str,
        detail: String
    }
}

impl AciError {
    /// Whether the error came from the transport rather than the APIC itself.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }

    /// The failing operation name, when the APIC answered with an error.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Http { operation, .. } | Self::Decode { operation, .. } => Some(operation),
            Self::Connect { .. } => None
        }
    }
}
