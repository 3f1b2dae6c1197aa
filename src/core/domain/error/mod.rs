use thiserror::Error;

/// The main error type for control plane operations.
///
/// Every reconciliation and lifecycle operation fails with one of these
/// kinds. They are never swallowed internally: the reconciliation fan-out
/// collects them per node and per instance, everything else propagates to
/// the immediate caller.
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    /// The hypervisor API is unreachable, rejected our credentials or
    /// answered with an unexpected HTTP status.
    ///
    /// # Fields
    /// * `0` - A description of the failed exchange
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// A vendor status or configuration string matched no known pattern.
    ///
    /// # Fields
    /// * `subject` - What was being interpreted (e.g. `status`, `boot disk`)
    /// * `raw` - The raw vendor value
    #[error("Unrecognized remote {subject}: {raw:?}")]
    UnrecognizedRemoteState { subject: String, raw: String },

    /// No cluster or node is available for placement in the zone.
    #[error("No capacity available in zone {zone_id}")]
    NoCapacity { zone_id: String },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Reconciliation was handed inconsistent input, such as an instance
    /// with neither a local nor a remote view.
    #[error("Invalid reconciliation input: {0}")]
    InvalidReconciliationInput(String),

    /// The remote identifier was taken between allocation and creation.
    #[error("Remote id {remote_id} is already in use")]
    RemoteIdConflict { remote_id: String },

    /// The persistence layer failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Represents validation failures with detailed context
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl ControlPlaneError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ControlPlaneError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn unrecognized(subject: impl Into<String>, raw: impl Into<String>) -> Self {
        ControlPlaneError::UnrecognizedRemoteState {
            subject: subject.into(),
            raw: raw.into(),
        }
    }

    /// Returns `true` for failures that a later attempt may not hit again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ControlPlaneError::RemoteUnavailable(_) | ControlPlaneError::RemoteIdConflict { .. }
        )
    }
}

/// Specialized error type for validation failures.
///
/// This enum provides detailed context about why a validation
/// failed, including field-specific errors and format violations.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Represents a validation failure for a specific field
    ///
    /// # Fields
    /// * `field` - The name of the field that failed validation
    /// * `message` - A detailed message about why validation failed
    #[error("Field '{field}' validation failed: {message}")]
    Field { field: String, message: String },

    /// Represents format/syntax validation failures
    ///
    /// # Fields
    /// * `0` - Description of the format violation
    #[error("Format error: {0}")]
    Format(String),

    /// Represents violations of domain constraints
    ///
    /// # Fields
    /// * `0` - Description of the constraint violation
    #[error("Domain constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Type alias for Results that may fail with a ControlPlaneError
pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;
