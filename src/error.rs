//! Error types for the guard and its storage collaborators
use crate::config::ConfigError;
use crate::list::{Cidr, ListKind};

/// Rejected input. Always raised before any lookup or counter mutation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// Login was empty.
    #[error("void login")]
    EmptyLogin,
    /// Password was empty.
    #[error("void password")]
    EmptyPassword,
    /// Address was empty.
    #[error("void address")]
    EmptyAddress,
    /// Address is not a dotted-decimal IPv4 address.
    #[error("malformed IPv4 address: {0:?}")]
    MalformedAddress(String),
    /// Mask of zero, which would cover the whole address space.
    #[error("void mask")]
    MissingMask,
    /// Mask outside `1..=31`.
    #[error("incorrect mask {provided} (expected 1..=31)")]
    MaskOutOfRange {
        /// Value provided by caller.
        provided: u8,
    },
}

/// Failures reported by a [`ListStore`](crate::list::store::ListStore) or
/// [`CounterStore`](crate::counter::store::CounterStore) implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// The exact subnet is already present in `list`.
    #[error("{subnet} is already in the {list} list")]
    Conflict {
        /// List that already holds the subnet.
        list: ListKind,
        /// The offending subnet.
        subnet: Cidr,
    },
    /// The exact subnet is absent from `list`.
    #[error("{subnet} is not in the {list} list")]
    NotFound {
        /// List that was searched.
        list: ListKind,
        /// The missing subnet.
        subnet: Cidr,
    },
    /// Backend could not be reached or failed the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// Backend returned data that does not decode.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    /// Optimistic update lost too many races in a row.
    #[error("gave up on {key} after {attempts} conflicting updates")]
    Contention {
        /// Counter key being updated.
        key: String,
        /// Number of attempts made.
        attempts: usize,
    },
}

/// Unified error returned by [`DecisionEngine`](crate::engine::DecisionEngine).
///
/// A `GuardError` always means the operation could not complete. A denied
/// login attempt is a successful evaluation and is reported through
/// [`Decision`](crate::engine::Decision) instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GuardError {
    /// Input failed validation.
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),
    /// The exact subnet already exists in `list`; nothing was changed.
    #[error("{subnet} is already in the {list} list")]
    Conflict {
        /// List that already holds the subnet.
        list: ListKind,
        /// The offending subnet.
        subnet: Cidr,
    },
    /// The exact subnet is absent from `list`.
    #[error("{subnet} is not in the {list} list")]
    NotFound {
        /// List that was searched.
        list: ListKind,
        /// The missing subnet.
        subnet: Cidr,
    },
    /// A storage collaborator failed.
    #[error("storage: {0}")]
    Storage(StoreError),
    /// Invalid configuration.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

impl From<StoreError> for GuardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { list, subnet } => GuardError::Conflict { list, subnet },
            StoreError::NotFound { list, subnet } => GuardError::NotFound { list, subnet },
            other => GuardError::Storage(other),
        }
    }
}

impl GuardError {
    /// Check if the input was rejected.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
    /// Check if this is an exact-pair conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
    /// Check if the subnet was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
    /// Check if a storage backend failed.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
    /// Borrow the validation failure if present.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn subnet() -> Cidr {
        Cidr::from_parts(Ipv4Addr::new(10, 0, 0, 0), 8).unwrap()
    }

    #[test]
    fn store_conflict_maps_to_guard_conflict() {
        let err: GuardError = StoreError::Conflict { list: ListKind::Deny, subnet: subnet() }.into();
        assert!(err.is_conflict());
        assert!(!err.is_storage());
        assert_eq!(err.to_string(), "10.0.0.0/8 is already in the deny list");
    }

    #[test]
    fn store_not_found_maps_to_guard_not_found() {
        let err: GuardError = StoreError::NotFound { list: ListKind::Allow, subnet: subnet() }.into();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "10.0.0.0/8 is not in the allow list");
    }

    #[test]
    fn backend_failures_stay_storage_errors() {
        let err: GuardError = StoreError::Unavailable("connection refused".into()).into();
        assert!(err.is_storage());
        assert!(err.to_string().contains("connection refused"));

        let err: GuardError =
            StoreError::Contention { key: "login:bob".into(), attempts: 16 }.into();
        assert!(err.is_storage());
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn validation_accessor() {
        let err = GuardError::from(ValidationError::MaskOutOfRange { provided: 40 });
        assert!(err.is_validation());
        assert_eq!(err.as_validation(), Some(&ValidationError::MaskOutOfRange { provided: 40 }));
        assert!(err.to_string().contains("40"));
        assert!(GuardError::from(StoreError::Corrupt("x".into())).as_validation().is_none());
    }
}
