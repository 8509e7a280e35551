//! Credential pools and the per-purpose rotation policy.
//!
//! A pool is an ordered, deduplicated list of interchangeable API keys for a
//! single backend. Generation calls start from the first key; validation calls
//! start from the second key when one exists, so the two purposes draw on
//! separate quotas by default.

use std::fmt;
use std::str::FromStr;

use super::types::Purpose;

/// A single API credential.
///
/// `Debug` output is masked so keys never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    secret: String,
}

impl Credential {
    /// Wraps a raw secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// The raw secret, for building request headers.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Masked form for diagnostics: first and last four characters only.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.secret.chars().collect();
        if chars.len() <= 8 {
            "*".repeat(chars.len())
        } else {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

/// How many keys a single call may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// Use the purpose's key only.
    #[default]
    Single,
    /// On HTTP 429, retry once with the next key.
    FailoverOn429,
}

impl KeyStrategy {
    /// Upper bound on credentials tried per call.
    pub fn max_credentials_per_call(self) -> usize {
        match self {
            KeyStrategy::Single => 1,
            KeyStrategy::FailoverOn429 => 2,
        }
    }
}

impl FromStr for KeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "single" => Ok(KeyStrategy::Single),
            "failover_on_429" | "failover" => Ok(KeyStrategy::FailoverOn429),
            other => Err(format!(
                "unknown key strategy '{}' (expected 'single' or 'failover_on_429')",
                other
            )),
        }
    }
}

/// Ordered, deduplicated credentials for one backend.
#[derive(Debug, Clone, Default)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    strategy: KeyStrategy,
}

impl CredentialPool {
    /// Creates an empty pool.
    pub fn new(strategy: KeyStrategy) -> Self {
        Self {
            credentials: Vec::new(),
            strategy,
        }
    }

    /// Builds a pool from raw secrets, skipping blanks and duplicates.
    pub fn from_secrets<I, S>(secrets: I, strategy: KeyStrategy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pool = Self::new(strategy);
        for secret in secrets {
            pool.push(secret.as_ref());
        }
        pool
    }

    /// Appends a secret unless it is blank or already present.
    ///
    /// Returns true when the secret was added.
    pub fn push(&mut self, secret: &str) -> bool {
        let secret = secret.trim();
        if secret.is_empty() || self.credentials.iter().any(|c| c.secret == secret) {
            return false;
        }
        self.credentials.push(Credential::new(secret));
        true
    }

    /// Number of distinct credentials.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Returns true when the pool holds no credentials.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// The configured key strategy.
    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    /// Index of the first credential used for `purpose`.
    pub fn primary_index(&self, purpose: Purpose) -> Option<usize> {
        if self.credentials.is_empty() {
            return None;
        }
        match purpose {
            Purpose::Generation => Some(0),
            Purpose::Validation if self.credentials.len() >= 2 => Some(1),
            Purpose::Validation => Some(0),
        }
    }

    /// Credentials a call for `purpose` may consume, in the order to try them.
    pub fn for_purpose(&self, purpose: Purpose) -> Vec<&Credential> {
        let Some(primary) = self.primary_index(purpose) else {
            return Vec::new();
        };

        let mut ordered = Vec::with_capacity(self.credentials.len());
        ordered.push(&self.credentials[primary]);
        ordered.extend(
            self.credentials
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != primary)
                .map(|(_, c)| c),
        );
        ordered.truncate(self.strategy.max_credentials_per_call());
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets(pool: &CredentialPool, purpose: Purpose) -> Vec<String> {
        pool.for_purpose(purpose)
            .into_iter()
            .map(|c| c.secret().to_string())
            .collect()
    }

    #[test]
    fn test_pool_deduplicates_and_skips_blanks() {
        let pool = CredentialPool::from_secrets(["k1", " k1 ", "", "k2"], KeyStrategy::Single);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_rotation_with_two_keys_single_strategy() {
        let pool = CredentialPool::from_secrets(["k1", "k2"], KeyStrategy::Single);
        assert_eq!(secrets(&pool, Purpose::Generation), vec!["k1"]);
        assert_eq!(secrets(&pool, Purpose::Validation), vec!["k2"]);
    }

    #[test]
    fn test_rotation_with_two_keys_failover_strategy() {
        let pool = CredentialPool::from_secrets(["k1", "k2", "k3"], KeyStrategy::FailoverOn429);
        assert_eq!(secrets(&pool, Purpose::Generation), vec!["k1", "k2"]);
        assert_eq!(secrets(&pool, Purpose::Validation), vec!["k2", "k1"]);
    }

    #[test]
    fn test_rotation_with_one_key_falls_back_to_index_zero() {
        let pool = CredentialPool::from_secrets(["only"], KeyStrategy::FailoverOn429);
        assert_eq!(pool.primary_index(Purpose::Validation), Some(0));
        assert_eq!(secrets(&pool, Purpose::Validation), vec!["only"]);
    }

    #[test]
    fn test_empty_pool_yields_nothing() {
        let pool = CredentialPool::new(KeyStrategy::FailoverOn429);
        assert!(pool.is_empty());
        assert_eq!(pool.primary_index(Purpose::Generation), None);
        assert!(pool.for_purpose(Purpose::Generation).is_empty());
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("single".parse::<KeyStrategy>(), Ok(KeyStrategy::Single));
        assert_eq!(
            "FAILOVER_ON_429".parse::<KeyStrategy>(),
            Ok(KeyStrategy::FailoverOn429)
        );
        assert!("round_robin".parse::<KeyStrategy>().is_err());
    }

    #[test]
    fn test_credential_debug_is_masked() {
        let credential = Credential::new("gsk_abcdefghijklmnop");
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("abcdefghijkl"));
        assert!(rendered.contains("gsk_...mnop"));
        assert_eq!(Credential::new("short").masked(), "*****");
    }
}
