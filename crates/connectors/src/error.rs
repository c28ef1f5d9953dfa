//! Connector-level error types.

use thiserror::Error;

/// Errors returned by a connector's `execute` method.
///
/// The `Display` text is what the engine stores in an execution record's
/// `error` field, so messages are written for end users.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// The operation ran and failed.
    #[error("{message}")]
    Execution { message: String },

    /// The connector does not know this operation.
    #[error("unsupported operation '{0}'")]
    UnsupportedOperation(String),

    /// The remote API answered with an error.
    #[error("remote API error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Remote { status: Option<u16>, message: String },

    /// The remote API could not be reached and simulation is disabled.
    #[error("remote API unavailable: {0}")]
    Unavailable(String),

    /// The call observed its cancellation token.
    #[error("cancelled by user")]
    Cancelled,
}

impl ConnectorError {
    /// Shorthand for [`ConnectorError::Execution`].
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}

/// Errors produced by the [`ConnectorRegistry`](crate::ConnectorRegistry).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No connector is registered for the application tag.
    #[error("no connector registered for application '{0}'")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_includes_status_when_known() {
        let err = ConnectorError::Remote {
            status: Some(503),
            message: "maintenance".into(),
        };
        assert_eq!(err.to_string(), "remote API error (503): maintenance");

        let err = ConnectorError::Remote {
            status: None,
            message: "bad body".into(),
        };
        assert_eq!(err.to_string(), "remote API error: bad body");
    }

    #[test]
    fn execution_error_is_the_bare_message() {
        assert_eq!(ConnectorError::execution("boom").to_string(), "boom");
        assert_eq!(ConnectorError::Cancelled.to_string(), "cancelled by user");
    }
}
