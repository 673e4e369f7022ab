//! # Error Types
//!
//! Error handling for contract graph construction, reachability queries and
//! the RPC confirmation service.
//!
//! Construction errors split into two classes: malformed input (a record that
//! cannot be decoded) and invariant violations (upstream data corruption).
//! Invariant violations are fatal for the current load and are never retried.
//! Lookup misses are not errors anywhere in this crate; they are `None`.

use thiserror::Error;

/// Main error type for contract graph construction and queries
#[derive(Debug, Error)]
pub enum GraphError {
    /// A raw transaction record could not be consensus-decoded
    #[error("Transaction decode failed: {source}")]
    TxDecode {
        #[from]
        source: bitcoin::consensus::encode::Error,
    },

    /// A PSBT record could not be parsed
    #[error("PSBT parse failed: {source}")]
    PsbtParse {
        #[from]
        source: bitcoin::psbt::PsbtParseError,
    },

    /// A record carried hex that is not hex
    #[error("Invalid hex encoding: {source}")]
    Hex {
        #[from]
        source: hex::FromHexError,
    },

    /// All records of one program path must spend the same first outpoint
    #[error("Grouping invariant violated in path {path:?}: records spend different first outpoints")]
    GroupMismatch { path: String },

    /// A grouped record set came out empty
    #[error("Grouping invariant violated: empty record group for {txid}")]
    EmptyGroup { txid: String },

    /// A record had no inputs to validate the grouping invariant against
    #[error("Malformed record in path {path:?}: transaction has no inputs")]
    NoInputs { path: String },

    /// A spender registered in the spend index has no input matching the
    /// outpoint it is registered under
    #[error("Missing spender: {txid}:{vout} is not spent by any input of the indexed spender")]
    MissingSpender { txid: String, vout: u32 },
}

/// Result type alias for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    /// Create a grouping mismatch error for a program path
    pub fn group_mismatch(path: impl Into<String>) -> Self {
        Self::GroupMismatch { path: path.into() }
    }

    /// Check if this error indicates upstream data corruption rather than a
    /// malformed record. Corruption errors must never be retried.
    pub fn is_data_corruption(&self) -> bool {
        matches!(
            self,
            GraphError::GroupMismatch { .. }
                | GraphError::EmptyGroup { .. }
                | GraphError::MissingSpender { .. }
        )
    }
}

/// Errors from the RPC confirmation service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bitcoin RPC communication failures
    #[error("RPC communication failed: {source}")]
    Rpc {
        #[from]
        source: bitcoincore_rpc::Error,
    },

    /// A candidate txid could not be parsed out of an RPC response
    #[error("Invalid RPC response: {message}")]
    InvalidResponse { message: String },
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Create an invalid-response error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Check if this error is retryable (network/temporary issues)
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Rpc { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_classification() {
        let mismatch = GraphError::group_mismatch("path-0");
        assert!(mismatch.is_data_corruption());

        let missing = GraphError::MissingSpender {
            txid: "00".repeat(32),
            vout: 1,
        };
        assert!(missing.is_data_corruption());

        let bad_hex = GraphError::from(hex::FromHexError::OddLength);
        assert!(!bad_hex.is_data_corruption());
    }

    #[test]
    fn test_service_retry_classification() {
        let invalid = ServiceError::invalid_response("no txid field");
        assert!(!invalid.is_retryable());
    }
}
