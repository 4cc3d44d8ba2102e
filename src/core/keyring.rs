use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyringOperation {
    Read,
    Store,
    Remove,
}

impl KeyringOperation {
    fn verb(self) -> &'static str {
        match self {
            KeyringOperation::Read => "read",
            KeyringOperation::Store => "store",
            KeyringOperation::Remove => "remove",
        }
    }
}

/// A failed keyring call, tagged with what was being attempted.
///
/// A locked or unreachable credential backend is reported as unavailable;
/// retrying after unlocking it may succeed. Anything else is a hard failure.
#[derive(Debug)]
pub struct KeyringAccessError {
    operation: KeyringOperation,
    unavailable: bool,
    source: keyring::Error,
}

impl KeyringAccessError {
    pub fn new(operation: KeyringOperation, source: keyring::Error) -> Self {
        let unavailable = matches!(
            source,
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_)
        );
        Self {
            operation,
            unavailable,
            source,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unavailable {
            write!(
                f,
                "System keyring is unavailable (could not {} the API key): {}",
                self.operation.verb(),
                self.source
            )
        } else {
            write!(
                f,
                "Could not {} the API key in the system keyring: {}",
                self.operation.verb(),
                self.source
            )
        }
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_backend_is_unavailable() {
        let err = KeyringAccessError::new(
            KeyringOperation::Read,
            keyring::Error::NoStorageAccess(Box::new(std::io::Error::other("locked"))),
        );
        assert!(err.is_unavailable());
        assert!(err.to_string().starts_with("System keyring is unavailable (could not read"));
    }

    #[test]
    fn bad_input_is_a_hard_failure() {
        let err = KeyringAccessError::new(
            KeyringOperation::Store,
            keyring::Error::TooLong("user".to_string(), 10),
        );
        assert!(!err.is_unavailable());
        assert!(err.to_string().starts_with("Could not store the API key"));
        assert!(err.source().is_some());
    }
}
