use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{}", .0.user_message())]
    Chain(ChainErrorKind),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Wallet not available: {0}")]
    WalletUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Classified provider/contract failure, so retry and messaging policy can be
/// decided from the tag instead of substring checks at every call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainErrorKind {
    UserRejected,
    RangeTooLarge,
    ContractRevert(String),
    NetworkError,
    Other(String),
}

impl ChainErrorKind {
    /// Human-readable message matching what the game UI shows for each class.
    pub fn user_message(&self) -> String {
        match self {
            Self::UserRejected => "Transaction was rejected".to_string(),
            Self::RangeTooLarge => "Block range too large for provider".to_string(),
            Self::ContractRevert(reason) => revert_message(reason),
            Self::NetworkError => "Network error. Please try again.".to_string(),
            Self::Other(msg) => msg.clone(),
        }
    }

    /// Only RangeTooLarge is worth another attempt, at a smaller window.
    pub fn should_subdivide(&self) -> bool {
        matches!(self, Self::RangeTooLarge)
    }
}

/// Map a raw provider/contract error string onto a [`ChainErrorKind`].
pub fn classify_provider_error(message: &str) -> ChainErrorKind {
    let lower = message.to_ascii_lowercase();

    if lower.contains("user rejected") || lower.contains("user denied") {
        return ChainErrorKind::UserRejected;
    }
    if lower.contains("range too large")
        || lower.contains("block range is too wide")
        || lower.contains("query returned more than")
        || lower.contains("exceed maximum block range")
    {
        return ChainErrorKind::RangeTooLarge;
    }
    if lower.contains("execution reverted") || lower.contains("revert") {
        return ChainErrorKind::ContractRevert(message.to_string());
    }
    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection")
        || lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("gateway")
        || lower.contains("error sending request")
    {
        return ChainErrorKind::NetworkError;
    }
    ChainErrorKind::Other(message.to_string())
}

// Revert reasons the game contract is known to produce, phrased the way the
// frontend phrased them.
fn revert_message(reason: &str) -> String {
    let lower = reason.to_ascii_lowercase();
    if lower.contains("cooldown") {
        "You are still in cooldown period!".to_string()
    } else if lower.contains("insufficient") {
        "Insufficient tokens staked for this action".to_string()
    } else if lower.contains("protection") {
        "This player is still under new-player protection".to_string()
    } else {
        format!("Transaction failed: {}", reason)
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Database(ref e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                e.to_string(),
            ),
            AppError::Chain(ref kind) => {
                let status = match kind {
                    ChainErrorKind::ContractRevert(_) | ChainErrorKind::UserRejected => {
                        StatusCode::BAD_REQUEST
                    }
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, "CHAIN_ERROR", kind.user_message())
            }
            AppError::Unauthorized(ref msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::WalletUnavailable(ref msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "WALLET_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Internal(ref msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_detects_range_too_large() {
        let kind = classify_provider_error("query returned more than 10000 results");
        assert_eq!(kind, ChainErrorKind::RangeTooLarge);
        assert!(kind.should_subdivide());

        let kind = classify_provider_error("block range is too wide (> 5000)");
        assert_eq!(kind, ChainErrorKind::RangeTooLarge);
    }

    #[test]
    fn classify_detects_user_rejected() {
        let kind = classify_provider_error("Error: user rejected transaction");
        assert_eq!(kind, ChainErrorKind::UserRejected);
        assert!(!kind.should_subdivide());
    }

    #[test]
    fn classify_detects_revert_with_reason() {
        let kind = classify_provider_error("execution reverted: Attack cooldown active");
        match &kind {
            ChainErrorKind::ContractRevert(reason) => assert!(reason.contains("cooldown")),
            other => panic!("unexpected kind: {:?}", other),
        }
        assert_eq!(kind.user_message(), "You are still in cooldown period!");
    }

    #[test]
    fn classify_detects_network_errors() {
        assert_eq!(
            classify_provider_error("request timed out"),
            ChainErrorKind::NetworkError
        );
        assert_eq!(
            classify_provider_error("429 Too Many Requests"),
            ChainErrorKind::NetworkError
        );
    }

    #[test]
    fn revert_message_maps_insufficient_stake() {
        let kind = classify_provider_error("execution reverted: Insufficient stake for battle");
        assert_eq!(
            kind.user_message(),
            "Insufficient tokens staked for this action"
        );
    }

    #[test]
    fn unknown_errors_keep_original_text() {
        let kind = classify_provider_error("something odd happened");
        assert_eq!(kind, ChainErrorKind::Other("something odd happened".to_string()));
        assert_eq!(kind.user_message(), "something odd happened");
    }
}
