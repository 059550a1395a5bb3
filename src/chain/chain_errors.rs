use solana_client::client_error::{ClientError, ClientErrorKind};
use thiserror::Error;

/// Chain collaborator error types
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    #[error("Timeout (endpoint: {endpoint})")]
    Timeout { endpoint: String },

    /// RPC response errors (from the RPC server)
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded { endpoint: String },

    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound { endpoint: String },

    #[error("Transaction expired (endpoint: {endpoint})")]
    TransactionExpired { endpoint: String },

    #[error("Account not found: {account}")]
    AccountNotFound { account: String },

    #[error("Insufficient funds (endpoint: {endpoint})")]
    InsufficientFunds { endpoint: String },

    /// Account data could not be decoded (wrong owner, truncated)
    #[error("Invalid account data for {account}: {reason}")]
    InvalidAccountData { account: String, reason: String },
}

impl ChainError {
    /// Check if this error is retryable.
    ///
    /// Only read calls consult this; transfers are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChainError::Transport { .. } => true,
            ChainError::Timeout { .. } => true,
            ChainError::RateLimitExceeded { .. } => true,
            ChainError::BlockhashNotFound { .. } => true,

            ChainError::TransactionExpired { .. } => false,
            ChainError::AccountNotFound { .. } => false,
            ChainError::InsufficientFunds { .. } => false,
            ChainError::InvalidAccountData { .. } => false,

            // Retry on server errors (5xx)
            ChainError::RpcResponse { code, .. } => {
                matches!(code, Some(c) if (500..600).contains(c))
            }
        }
    }

    /// Create from ClientError with context
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        if let ClientErrorKind::Reqwest(e) = err.kind() {
            if e.status().map(|s| s.as_u16()) == Some(429) {
                return ChainError::RateLimitExceeded {
                    endpoint: endpoint.to_string(),
                };
            }
        }
        Self::from_message(&err.to_string(), endpoint)
    }

    /// Classify an error by its rendered message
    pub fn from_message(message: &str, endpoint: &str) -> Self {
        let err_str = message.to_lowercase();
        let endpoint = endpoint.to_string();

        if err_str.contains("blockhash not found") {
            ChainError::BlockhashNotFound { endpoint }
        } else if err_str.contains("transaction expired")
            || err_str.contains("block height exceeded")
        {
            ChainError::TransactionExpired { endpoint }
        } else if err_str.contains("account not found") {
            ChainError::AccountNotFound {
                account: "unknown".to_string(),
            }
        } else if err_str.contains("insufficient funds")
            || err_str.contains("insufficient lamports")
        {
            ChainError::InsufficientFunds { endpoint }
        } else if err_str.contains("rate limit") || err_str.contains("too many requests") {
            ChainError::RateLimitExceeded { endpoint }
        } else if err_str.contains("timeout") || err_str.contains("timed out") {
            ChainError::Timeout { endpoint }
        } else if err_str.contains("connection") || err_str.contains("error sending request") {
            ChainError::Transport {
                endpoint,
                message: message.to_string(),
            }
        } else {
            // Extract error code if available
            let code = err_str
                .split("code:")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.trim_matches(|c: char| !c.is_ascii_digit() && c != '-').parse::<i64>().ok());

            ChainError::RpcResponse {
                endpoint,
                message: message.to_string(),
                code,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(ChainError::Transport {
            endpoint: "test".to_string(),
            message: "connection failed".to_string(),
        }
        .is_retryable());

        assert!(ChainError::Timeout {
            endpoint: "test".to_string(),
        }
        .is_retryable());

        assert!(!ChainError::TransactionExpired {
            endpoint: "test".to_string(),
        }
        .is_retryable());

        assert!(!ChainError::InsufficientFunds {
            endpoint: "test".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn test_rpc_response_retry_on_5xx_only() {
        let server = ChainError::RpcResponse {
            endpoint: "test".to_string(),
            message: "bad gateway".to_string(),
            code: Some(502),
        };
        let client = ChainError::RpcResponse {
            endpoint: "test".to_string(),
            message: "invalid params".to_string(),
            code: Some(-32602),
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn test_rate_limit_needs_more_than_the_digits() {
        let limited = ChainError::from_message("HTTP status client error (429 Too Many Requests)", "test");
        assert!(matches!(limited, ChainError::RateLimitExceeded { .. }));

        let slot = ChainError::from_message(
            "Invalid param: could not find account 4Nd1m429VvXK7y at slot 314294290",
            "test",
        );
        assert!(!matches!(slot, ChainError::RateLimitExceeded { .. }));

        let client_err = ClientError::from(ClientErrorKind::Custom(
            "blockhash expired at slot 284299429".to_string(),
        ));
        assert!(!matches!(
            ChainError::from_client_error(client_err, "test"),
            ChainError::RateLimitExceeded { .. }
        ));
    }
}
