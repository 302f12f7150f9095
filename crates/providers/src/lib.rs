//! Completion-service client for Paperstack.
//!
//! The gateway and the command-line client talk to the model through the
//! `paperstack_core::Provider` trait; this crate supplies the Anthropic
//! Messages API implementation and a small factory that builds one from
//! application config.

use std::sync::Arc;

use paperstack_core::error::ProviderError;
use paperstack_core::provider::Provider;
use paperstack_config::AppConfig;

pub mod anthropic;

pub use anthropic::AnthropicProvider;

/// Build the provider described by `config`.
///
/// Fails with [`ProviderError::NotConfigured`] when no API key is present,
/// so callers surface a setup hint instead of a late 401.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key configured; set PAPERSTACK_API_KEY or ANTHROPIC_API_KEY, or add api_key to config.toml".to_string(),
        )
    })?;
    Ok(Arc::new(AnthropicProvider::new(api_key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_without_key_is_not_configured() {
        let config = AppConfig::default();
        let err = from_config(&config).err();
        assert!(matches!(err, Some(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn from_config_with_key_builds_anthropic() {
        let config = AppConfig {
            api_key: Some("sk-test".to_string()),
            ..AppConfig::default()
        };
        let provider = from_config(&config).ok();
        assert_eq!(provider.map(|p| p.name().to_string()).as_deref(), Some("anthropic"));
    }
}
