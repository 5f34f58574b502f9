//! Environment-driven configuration, read the way `device.rs` reads
//! `AVENA_NETWORK_TOKEN`: plain `std::env::var`, no config framework.

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Settings {
    /// One operator URL per bootstrap target.
    pub bootstrap_urls: Vec<String>,
    /// When set, also accepted as `x_token` on access-rule checks.
    pub api_token: Option<String>,
    pub initial_operator_url: Option<String>,
    pub initial_account_name: Option<String>,
    pub initial_account_public_key: Option<String>,
    pub initial_account_signing_seed: Option<String>,
    pub disable_cli_contexts: bool,
    /// Directory backing the KV-based entity store connection.
    pub kv_bucket: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let bootstrap_urls = std::env::var("NATSCTL_BOOTSTRAP_URLS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let initial_operator_url = non_empty_env("NATSCTL_INITIAL_OPERATOR_URL");
        let initial_account_name = non_empty_env("NATSCTL_INITIAL_ACCOUNT_NAME");
        let initial_account_public_key = non_empty_env("NATSCTL_INITIAL_ACCOUNT_PUBLIC_KEY");
        let initial_account_signing_seed = non_empty_env("NATSCTL_INITIAL_ACCOUNT_SIGNING_SEED");

        let any_initial_set = initial_account_name.is_some()
            || initial_account_public_key.is_some()
            || initial_account_signing_seed.is_some();
        let all_initial_set = initial_account_name.is_some()
            && initial_account_public_key.is_some()
            && initial_account_signing_seed.is_some();
        if any_initial_set && !all_initial_set {
            return Err(Error::Validation(
                "NATSCTL_INITIAL_ACCOUNT_NAME, _PUBLIC_KEY and _SIGNING_SEED must all be set together".into(),
            ));
        }

        Ok(Self {
            bootstrap_urls,
            api_token: non_empty_env("NATSCTL_API_TOKEN"),
            initial_operator_url,
            initial_account_name,
            initial_account_public_key,
            initial_account_signing_seed,
            disable_cli_contexts: std::env::var("NATSCTL_DISABLE_CLI_CONTEXTS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            kv_bucket: std::env::var("NATSCTL_KV_BUCKET").unwrap_or_else(|_| "natsctl_entities".to_string()),
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_urls_split_and_trim() {
        std::env::set_var("NATSCTL_BOOTSTRAP_URLS", "nats://a:4222, nats://b:4222");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.bootstrap_urls, vec!["nats://a:4222", "nats://b:4222"]);
        std::env::remove_var("NATSCTL_BOOTSTRAP_URLS");
    }

    #[test]
    fn partial_initial_account_is_rejected() {
        std::env::set_var("NATSCTL_INITIAL_ACCOUNT_NAME", "demo");
        std::env::remove_var("NATSCTL_INITIAL_ACCOUNT_PUBLIC_KEY");
        std::env::remove_var("NATSCTL_INITIAL_ACCOUNT_SIGNING_SEED");
        let result = Settings::from_env();
        std::env::remove_var("NATSCTL_INITIAL_ACCOUNT_NAME");
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
