use thiserror::Error;

/// Main error type for LDAP toolkit operations
///
/// Codec errors are terminal for the element being processed. A BER stream
/// that produced one of them cannot be resynchronized, so the usual policy is
/// to close the connection. The one exception is [`LdapError::Incomplete`],
/// which only reports that more bytes must be buffered before the same
/// operation is retried.
#[derive(Error, Debug)]
pub enum LdapError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Timeout")]
    Timeout,

    #[error("Incomplete element: more bytes are required")]
    Incomplete,

    #[error("Invalid length encoding: {count} length-of-length bytes (expected 1-4)")]
    InvalidLengthEncoding { count: u8 },

    #[error("Element with tag 0x{tag:02X} declares {length} bytes, exceeding the maximum of {max}")]
    ElementTooLarge { tag: u8, length: usize, max: usize },

    #[error("Invalid boolean length: {length} (expected 1)")]
    InvalidBooleanLength { length: usize },

    #[error("Invalid null length: {length} (expected 0)")]
    InvalidNullLength { length: usize },

    #[error("Invalid integer length: {length} (expected 1-{max})")]
    InvalidIntegerLength { length: usize, max: usize },

    #[error("Sequence length exceeded: {requested} bytes requested, {remaining} remaining")]
    SequenceLengthExceeded { requested: usize, remaining: usize },

    #[error("Unbalanced sequence: no open sequence to end, or sequences still open")]
    UnbalancedSequence,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl LdapError {
    /// Whether this error only signals that more input is needed
    pub fn is_incomplete(&self) -> bool {
        matches!(self, LdapError::Incomplete)
    }
}

/// Result type alias for LDAP toolkit operations
pub type LdapResult<T> = Result<T, LdapError>;
