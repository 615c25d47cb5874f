use log::debug;

use crate::http::SessionPolicy;
use crate::runtime::Runtime;

/// Base URL of the BLS public data API, version 2.
pub const DEFAULT_API_URL: &str = "https://api.bls.gov/publicAPI/v2/";

/// Environment variable holding the registration key.
pub const API_KEY_ENV: &str = "BLS_API_KEY";

pub struct Config<R: Runtime> {
    pub runtime: R,
    pub registration_key: Option<String>,
    pub api_url: String,
    pub policy: SessionPolicy,
}

impl<R: Runtime> Config<R> {
    /// An explicit key wins over `BLS_API_KEY`. Blank keys count as absent.
    pub fn new(
        runtime: R,
        registration_key: Option<String>,
        api_url: Option<String>,
        policy: SessionPolicy,
    ) -> Self {
        let registration_key = registration_key
            .or_else(|| runtime.env_var(API_KEY_ENV).ok())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        match &registration_key {
            Some(key) => debug!("Using registration key {}", mask_key(key)),
            None => debug!("No registration key configured"),
        }

        Self {
            runtime,
            registration_key,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            policy,
        }
    }
}

/// Keeps the first and last four characters when the key is long enough to spare them.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn runtime_with_env(value: Option<&'static str>) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_env_var()
            .with(eq(API_KEY_ENV))
            .returning(move |_| {
                value
                    .map(str::to_string)
                    .ok_or(std::env::VarError::NotPresent)
            });
        runtime
    }

    #[test]
    fn test_key_from_env() {
        let config = Config::new(
            runtime_with_env(Some("from-env-key")),
            None,
            None,
            SessionPolicy::default(),
        );
        assert_eq!(config.registration_key.as_deref(), Some("from-env-key"));
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_explicit_key_wins() {
        let mut runtime = MockRuntime::new();
        runtime.expect_env_var().never();

        let config = Config::new(
            runtime,
            Some("explicit".to_string()),
            Some("http://localhost:1234".to_string()),
            SessionPolicy::default(),
        );
        assert_eq!(config.registration_key.as_deref(), Some("explicit"));
        assert_eq!(config.api_url, "http://localhost:1234");
    }

    #[test]
    fn test_blank_key_is_absent() {
        let config = Config::new(
            runtime_with_env(Some("   ")),
            None,
            None,
            SessionPolicy::default(),
        );
        assert!(config.registration_key.is_none());

        let config = Config::new(runtime_with_env(None), None, None, SessionPolicy::default());
        assert!(config.registration_key.is_none());
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(
            mask_key("0123456789abcdef0123456789abcdef"),
            "0123*********cdef"
        );
    }
}
