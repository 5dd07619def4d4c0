//! Error types for key minting, publishing and handler failures.

/// Boxed error returned by fallible handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from minting a [`Key`](crate::Key).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The name was empty or contained only whitespace.
    #[error("event key name cannot be empty or whitespace")]
    Blank,
    /// The name is already taken by a key of any payload type.
    #[error("event key '{name}' is already registered")]
    Conflict {
        /// The rejected name.
        name: String,
    },
}

/// Errors returned synchronously to the caller of a publish operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// A descriptor packet was published without a payload.
    #[error("packet '{key}' has no bound payload; publish it with an explicit payload")]
    MissingPayload {
        /// Name of the packet's key.
        key: String,
    },
}

/// Failure raised by a single handler during dispatch.
///
/// Never returned from a publish call; delivered to error observers only.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("handler failed: {0}")]
    Failed(#[source] BoxError),
    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Build a [`HandlerError::Panicked`] from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self::Panicked(message)
    }

    /// Whether the handler panicked rather than returning an error.
    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn messages_name_the_key() {
        let err = KeyError::Conflict {
            name: "order.placed".into(),
        };
        assert_eq!(err.to_string(), "event key 'order.placed' is already registered");
        assert_eq!(
            KeyError::Blank.to_string(),
            "event key name cannot be empty or whitespace"
        );
    }

    #[test]
    fn panic_payload_is_extracted() {
        let static_payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let owned_payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        let opaque_payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);

        assert_eq!(
            HandlerError::from_panic(static_payload.as_ref()).to_string(),
            "handler panicked: boom"
        );
        assert_eq!(
            HandlerError::from_panic(owned_payload.as_ref()).to_string(),
            "handler panicked: bang"
        );
        assert!(HandlerError::from_panic(opaque_payload.as_ref()).is_panic());
    }

    #[test]
    fn failed_keeps_source() {
        let err = HandlerError::Failed("disk full".into());
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_panic());
    }
}
