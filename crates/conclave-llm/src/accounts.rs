//! Account/credential selection (`resolve(model_name, task) -> account`).
//!
//! Gemini OAuth accounts are pooled per-user; each has its own quota. The
//! pool picks the least-recently-used account whose quota has not been
//! marked exhausted, breaking ties round-robin. OpenAI-compatible (API key)
//! providers have an effectively unbounded quota and are selected by
//! enabled/configured order instead.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use conclave_core::ConclaveError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountKind {
    GeminiOAuth,
    ApiKey,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub kind: AccountKind,
    pub last_used_at: i64,
    /// Unix timestamp after which this account's quota is assumed to have
    /// recovered. `None` means not currently exhausted.
    pub quota_exhausted_until: Option<i64>,
}

impl Account {
    pub fn new(id: impl Into<String>, kind: AccountKind) -> Self {
        Self { id: id.into(), kind, last_used_at: 0, quota_exhausted_until: None }
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

pub struct AccountPool {
    accounts: Mutex<Vec<Account>>,
    /// Rotates among accounts tied on least-recently-used, so a run of
    /// identical `last_used_at` values doesn't always pick the same one.
    round_robin_cursor: Mutex<usize>,
}

impl AccountPool {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts: Mutex::new(accounts), round_robin_cursor: Mutex::new(0) }
    }

    /// Select an account for `model_name`/`task`. `task` is not used to
    /// partition quota today; it is threaded through for future per-task
    /// accounting and shows up in tracing spans around the call site.
    pub fn resolve(&self, model_name: &str, _task: &str) -> Result<String, ConclaveError> {
        let kind = if model_name.starts_with("gemini") { AccountKind::GeminiOAuth } else { AccountKind::ApiKey };

        let mut accounts = self.accounts.lock().unwrap();
        let now = now_unix();

        let eligible_idx: Vec<usize> = accounts
            .iter()
            .enumerate()
            .filter(|(_, a)| a.kind == kind && a.quota_exhausted_until.map(|t| t <= now).unwrap_or(true))
            .map(|(i, _)| i)
            .collect();

        if eligible_idx.is_empty() {
            return Err(ConclaveError::RateLimited { retry_after_ms: 60_000 });
        }

        match kind {
            AccountKind::ApiKey => {
                // Configured order: first eligible account wins every time.
                let idx = eligible_idx[0];
                accounts[idx].last_used_at = now;
                Ok(accounts[idx].id.clone())
            }
            AccountKind::GeminiOAuth => {
                let min_last_used = eligible_idx.iter().map(|&i| accounts[i].last_used_at).min().unwrap();
                let tied: Vec<usize> = eligible_idx.into_iter().filter(|&i| accounts[i].last_used_at == min_last_used).collect();

                let mut cursor = self.round_robin_cursor.lock().unwrap();
                let chosen = tied[*cursor % tied.len()];
                *cursor = cursor.wrapping_add(1);

                accounts[chosen].last_used_at = now;
                Ok(accounts[chosen].id.clone())
            }
        }
    }

    pub fn mark_quota_exhausted(&self, account_id: &str, retry_after_ms: u64) {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(a) = accounts.iter_mut().find(|a| a.id == account_id) {
            a.quota_exhausted_until = Some(now_unix() + (retry_after_ms / 1000) as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_least_recently_used_gemini_account() {
        let mut a = Account::new("acct-a", AccountKind::GeminiOAuth);
        a.last_used_at = 100;
        let mut b = Account::new("acct-b", AccountKind::GeminiOAuth);
        b.last_used_at = 50;
        let pool = AccountPool::new(vec![a, b]);
        assert_eq!(pool.resolve("gemini-2.5-pro", "chat").unwrap(), "acct-b");
    }

    #[test]
    fn round_robins_on_tie() {
        let pool = AccountPool::new(vec![
            Account::new("acct-a", AccountKind::GeminiOAuth),
            Account::new("acct-b", AccountKind::GeminiOAuth),
        ]);
        let first = pool.resolve("gemini-2.5-pro", "chat").unwrap();
        let second = pool.resolve("gemini-2.5-pro", "chat").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn exhausted_quota_is_skipped() {
        let pool = AccountPool::new(vec![
            Account::new("acct-a", AccountKind::GeminiOAuth),
            Account::new("acct-b", AccountKind::GeminiOAuth),
        ]);
        pool.mark_quota_exhausted("acct-a", 60_000);
        // acct-a excluded regardless of recency since its quota is exhausted.
        for _ in 0..4 {
            assert_eq!(pool.resolve("gemini-2.5-pro", "chat").unwrap(), "acct-b");
        }
    }

    #[test]
    fn api_key_providers_use_configured_order() {
        let pool = AccountPool::new(vec![
            Account::new("openai-primary", AccountKind::ApiKey),
            Account::new("openai-fallback", AccountKind::ApiKey),
        ]);
        assert_eq!(pool.resolve("gpt-4o", "chat").unwrap(), "openai-primary");
        assert_eq!(pool.resolve("gpt-4o", "chat").unwrap(), "openai-primary");
    }

    #[test]
    fn all_accounts_exhausted_is_rate_limited() {
        let pool = AccountPool::new(vec![Account::new("acct-a", AccountKind::GeminiOAuth)]);
        pool.mark_quota_exhausted("acct-a", 60_000);
        let err = pool.resolve("gemini-2.5-pro", "chat").unwrap_err();
        assert_eq!(err.code(), "rate-limited");
    }
}
