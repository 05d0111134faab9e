//! Data provider abstraction.
//!
//! Defines the `DataProvider` trait that bar sources implement, and the
//! error taxonomy at the provider boundary.

use async_trait::async_trait;
use thiserror::Error;

use super::Bar;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded
    #[error("Rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// The provider does not know this symbol
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The response could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Provider is temporarily unavailable
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs
        .map(|secs| format!(", retry after {} seconds", secs))
        .unwrap_or_default()
}

impl ProviderError {
    /// Whether the failure happened below the data level (the provider
    /// could not be reached or refused to serve), as opposed to the
    /// provider answering that it has no usable data.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }
}

// ============================================================================
// Data Provider Trait
// ============================================================================

/// Trait for market data providers.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Get the provider name (e.g., "yahoo")
    fn name(&self) -> &'static str;

    /// Exchange suffix this provider expects on symbols (e.g., ".NS").
    ///
    /// Used for diagnostics only; `fetch_bars` takes the bare symbol.
    fn market_suffix(&self) -> &str {
        ""
    }

    /// Where a user can look the symbol up by hand, for diagnostics.
    fn lookup_hint(&self, _symbol: &str) -> Option<String> {
        None
    }

    /// Fetch the recent daily bar series for a symbol, ordered by time ascending.
    ///
    /// # Arguments
    /// * `symbol` - Exchange symbol without market suffix (e.g., "HDFCAMC")
    async fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_transport() {
        assert!(ProviderError::Network("timeout".into()).is_transport());
        assert!(ProviderError::RateLimited { retry_after_secs: Some(60) }.is_transport());
        assert!(ProviderError::Unavailable("maintenance".into()).is_transport());
        assert!(!ProviderError::SymbolNotFound("XYZ".into()).is_transport());
        assert!(!ProviderError::MalformedResponse("bad json".into()).is_transport());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");

        let err = ProviderError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "Rate limited");

        let err = ProviderError::Network("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }
}
