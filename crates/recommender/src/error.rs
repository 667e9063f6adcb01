use actix_web::{HttpResponse, ResponseError};

use crate::types::Platform;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures reported by a catalog provider
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Missing or rejected credentials; carries remediation guidance
    #[error("Catalog provider unavailable: {0}")]
    Unavailable(String),

    #[error("Catalog provider rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Catalog provider request failed: {0}")]
    Request(String),
}

impl ProviderError {
    /// Errors worth retrying later without operator action
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::Unavailable(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Request(err.to_string())
    }
}

/// Failures reported by the persistent store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Catalog unavailable for [{key}]: {source}")]
    CatalogUnavailable {
        key: String,
        #[source]
        source: ProviderError,
    },

    #[error("No items found for platforms [{key}]. Try a different platform selection.")]
    EmptyCatalog { key: String },

    #[error("Persisted blob {key} is unreadable: {reason}")]
    CacheCorrupt { key: String, reason: String },

    #[error("Unknown platform: {0}. Supported platforms: {supported}", supported = Platform::supported_names())]
    UnsupportedPlatform(String),

    #[error("At least one platform must be selected")]
    EmptyPlatformSet,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    /// Underlying provider failure, if this error came from the provider
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            EngineError::CatalogUnavailable { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self.provider_error(), Some(ProviderError::RateLimited(_)))
    }
}

impl ResponseError for EngineError {
    fn error_response(&self) -> HttpResponse {
        match self {
            EngineError::CatalogUnavailable { source, .. } => match source {
                ProviderError::RateLimited(_) => {
                    HttpResponse::TooManyRequests().json(serde_json::json!({
                        "error": "rate_limited",
                        "message": self.to_string()
                    }))
                }
                ProviderError::Unavailable(_) => {
                    HttpResponse::ServiceUnavailable().json(serde_json::json!({
                        "error": "provider_unavailable",
                        "message": self.to_string()
                    }))
                }
                ProviderError::Request(_) => HttpResponse::BadGateway().json(serde_json::json!({
                    "error": "provider_error",
                    "message": self.to_string()
                })),
            },
            EngineError::EmptyCatalog { .. } => HttpResponse::NotFound().json(serde_json::json!({
                "error": "empty_catalog",
                "message": self.to_string()
            })),
            EngineError::UnsupportedPlatform(_) | EngineError::EmptyPlatformSet => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "invalid_platforms",
                    "message": self.to_string()
                }))
            }
            _ => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": self.to_string()
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_provider_error_surfaced_through_catalog_unavailable() {
        let err = EngineError::CatalogUnavailable {
            key: "PlayStation 2".to_string(),
            source: ProviderError::RateLimited("slow down".to_string()),
        };
        assert!(err.is_rate_limited());
        assert_eq!(err.error_response().status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_status_codes() {
        let missing_key = EngineError::CatalogUnavailable {
            key: "PlayStation 2".to_string(),
            source: ProviderError::Unavailable("set the key".to_string()),
        };
        assert_eq!(
            missing_key.error_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert!(!missing_key.is_rate_limited());

        let empty = EngineError::EmptyCatalog {
            key: "PlayStation 2".to_string(),
        };
        assert_eq!(empty.error_response().status(), StatusCode::NOT_FOUND);

        let bad = EngineError::UnsupportedPlatform("Saturn".to_string());
        assert_eq!(bad.error_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unsupported_platform_lists_supported_names() {
        let message = EngineError::UnsupportedPlatform("Saturn".to_string()).to_string();
        assert!(message.contains("Saturn"));
        assert!(message.ends_with(&Platform::supported_names()));
        assert!(message.contains("PlayStation Vita"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Request("timeout".to_string()).is_transient());
        assert!(ProviderError::RateLimited("429".to_string()).is_transient());
        assert!(!ProviderError::Unavailable("no key".to_string()).is_transient());
    }
}
