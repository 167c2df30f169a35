use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SdkError {
    // Value coercion errors
    FormatError(String),

    // Keystore errors
    AuthenticationError(String),
    VersionError { expected: u32, found: u32 },

    // Cryptographic errors
    CryptoError(String),

    // Confirmation errors
    TransactionFailed { hash: String, outcome_status: u64 },
    Timeout(String),

    // Network errors
    RpcError {
        method: String,
        code: i64,
        message: String,
    },
    NetworkError(String),
    InvalidResponse(String),
    ConnectionClosed,

    // Storage errors
    StorageError(String),
    FileNotFound(String),
    PermissionDenied(String),
    AlreadyExists(String),
}

impl SdkError {
    /// Build a `FormatError` naming the value that failed coercion.
    pub fn format<V: fmt::Debug + ?Sized>(value: &V, reason: impl fmt::Display) -> Self {
        SdkError::FormatError(format!("{}: {:?}", reason, value))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SdkError::Timeout(_))
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SdkError::FormatError(msg) => write!(f, "Format error: {}", msg),

            SdkError::AuthenticationError(msg) => write!(f, "Authentication failed: {}", msg),
            SdkError::VersionError { expected, found } => write!(
                f,
                "Unsupported keystore version: expected {}, found {}",
                expected, found
            ),

            SdkError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),

            SdkError::TransactionFailed {
                hash,
                outcome_status,
            } => write!(
                f,
                "Transaction {} failed with outcome status {}",
                hash, outcome_status
            ),
            SdkError::Timeout(msg) => write!(f, "Timeout: {}", msg),

            SdkError::RpcError {
                method,
                code,
                message,
            } => write!(f, "RPC error {} from {}: {}", code, method, message),
            SdkError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            SdkError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            SdkError::ConnectionClosed => write!(f, "Connection closed"),

            SdkError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            SdkError::FileNotFound(msg) => write!(f, "File not found: {}", msg),
            SdkError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            SdkError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
        }
    }
}

impl std::error::Error for SdkError {}

pub type SdkResult<T> = Result<T, SdkError>;

// Conversion helpers
impl From<std::io::Error> for SdkError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => SdkError::FileNotFound(error.to_string()),
            std::io::ErrorKind::PermissionDenied => SdkError::PermissionDenied(error.to_string()),
            _ => SdkError::StorageError(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(error: serde_json::Error) -> Self {
        SdkError::FormatError(format!("JSON error: {}", error))
    }
}
