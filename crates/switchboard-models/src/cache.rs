//! Short-lived response cache in front of a chat model

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use switchboard_core::{ChatModel, ChatPrompt, ConfigError};

pub const DEFAULT_CACHE_TTL_SECS: i64 = 120;

struct CachedReply {
    text: String,
    expires_at: DateTime<Utc>,
}

/// Caches successful, non-empty replies keyed on the whole prompt.
pub struct CachedChatModel {
    inner: Arc<dyn ChatModel>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedReply>>,
}

impl CachedChatModel {
    pub fn new(inner: Arc<dyn ChatModel>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// TTL from `LLM_CACHE_TTL_SECONDS`, default two minutes. Zero disables caching.
    pub fn from_env(inner: Arc<dyn ChatModel>) -> Result<Self, ConfigError> {
        let ttl = match std::env::var("LLM_CACHE_TTL_SECONDS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|s| *s >= 0)
                .and_then(Duration::try_seconds)
                .ok_or(ConfigError::InvalidEnv {
                    name: "LLM_CACHE_TTL_SECONDS",
                    value: raw,
                    expected: "non-negative number of seconds",
                })?,
            Err(_) => Duration::seconds(DEFAULT_CACHE_TTL_SECS),
        };
        Ok(Self::new(inner, ttl))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `complete` with an explicit clock
    pub fn complete_at(&self, prompt: &ChatPrompt, now: DateTime<Utc>) -> anyhow::Result<String> {
        if self.ttl <= Duration::zero() {
            return self.inner.complete(prompt);
        }
        let key = prompt.cache_key();
        if let Ok(entries) = self.entries.lock() {
            if let Some(hit) = entries.get(&key).filter(|e| e.expires_at > now) {
                tracing::debug!("chat cache hit");
                return Ok(hit.text.clone());
            }
        }

        let text = self.inner.complete(prompt)?;
        if !text.trim().is_empty() {
            if let Ok(mut entries) = self.entries.lock() {
                entries.retain(|_, e| e.expires_at > now);
                entries.insert(
                    key,
                    CachedReply {
                        text: text.clone(),
                        expires_at: now
                            .checked_add_signed(self.ttl)
                            .unwrap_or(DateTime::<Utc>::MAX_UTC),
                    },
                );
            }
        }
        Ok(text)
    }
}

impl ChatModel for CachedChatModel {
    fn complete(&self, prompt: &ChatPrompt) -> anyhow::Result<String> {
        self.complete_at(prompt, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with the call count; an empty reply on the first call when asked.
    struct Counting {
        calls: AtomicUsize,
        empty_first: bool,
    }

    impl Counting {
        fn new(empty_first: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                empty_first,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChatModel for Counting {
        fn complete(&self, prompt: &ChatPrompt) -> anyhow::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if prompt.user == "fail" {
                anyhow::bail!("upstream error");
            }
            if self.empty_first && n == 1 {
                return Ok(String::new());
            }
            Ok(format!("reply {n}"))
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_hit_within_ttl_then_expire() {
        let inner = Counting::new(false);
        let cache = CachedChatModel::new(inner.clone(), Duration::seconds(120));
        let prompt = ChatPrompt::json("sys", "hello");

        assert_eq!(cache.complete_at(&prompt, t(0)).unwrap(), "reply 1");
        assert_eq!(cache.complete_at(&prompt, t(119)).unwrap(), "reply 1");
        assert_eq!(inner.calls(), 1);

        assert_eq!(cache.complete_at(&prompt, t(120)).unwrap(), "reply 2");
        assert_eq!(inner.calls(), 2);
    }

    #[test]
    fn test_key_covers_whole_prompt() {
        let inner = Counting::new(false);
        let cache = CachedChatModel::new(inner.clone(), Duration::seconds(120));
        let a = ChatPrompt::json("sys", "hello");
        let mut b = a.clone();
        b.temperature = 0.7;

        cache.complete_at(&a, t(0)).unwrap();
        cache.complete_at(&b, t(0)).unwrap();
        assert_eq!(inner.calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_errors_not_cached() {
        let inner = Counting::new(false);
        let cache = CachedChatModel::new(inner.clone(), Duration::seconds(120));
        let failing = ChatPrompt::json("sys", "fail");
        assert!(cache.complete_at(&failing, t(0)).is_err());
        assert!(cache.complete_at(&failing, t(1)).is_err());
        assert_eq!(inner.calls(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_empty_reply_not_cached() {
        let inner = Counting::new(true);
        let cache = CachedChatModel::new(inner.clone(), Duration::seconds(120));
        let prompt = ChatPrompt::json("sys", "hello");
        assert_eq!(cache.complete_at(&prompt, t(0)).unwrap(), "");
        assert_eq!(cache.complete_at(&prompt, t(1)).unwrap(), "reply 2");
        assert_eq!(cache.complete_at(&prompt, t(2)).unwrap(), "reply 2");
        assert_eq!(inner.calls(), 2);
    }

    #[test]
    fn test_ttl_past_the_calendar_never_expires() {
        let inner = Counting::new(false);
        let huge = Duration::try_days(100_000_000).unwrap();
        let cache = CachedChatModel::new(inner.clone(), huge);
        let prompt = ChatPrompt::json("sys", "hello");

        assert_eq!(cache.complete_at(&prompt, t(0)).unwrap(), "reply 1");
        assert_eq!(cache.complete_at(&prompt, t(86_400 * 365)).unwrap(), "reply 1");
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let inner = Counting::new(false);
        let cache = CachedChatModel::new(inner.clone(), Duration::zero());
        let prompt = ChatPrompt::json("sys", "hello");
        cache.complete_at(&prompt, t(0)).unwrap();
        cache.complete_at(&prompt, t(0)).unwrap();
        assert_eq!(inner.calls(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    #[serial]
    fn test_ttl_from_env() {
        std::env::remove_var("LLM_CACHE_TTL_SECONDS");
        let cache = CachedChatModel::from_env(Counting::new(false)).unwrap();
        assert_eq!(cache.ttl(), Duration::seconds(DEFAULT_CACHE_TTL_SECS));

        std::env::set_var("LLM_CACHE_TTL_SECONDS", "15");
        let cache = CachedChatModel::from_env(Counting::new(false)).unwrap();
        assert_eq!(cache.ttl(), Duration::seconds(15));

        std::env::set_var("LLM_CACHE_TTL_SECONDS", i64::MAX.to_string());
        assert!(matches!(
            CachedChatModel::from_env(Counting::new(false)),
            Err(ConfigError::InvalidEnv { name: "LLM_CACHE_TTL_SECONDS", .. })
        ));

        std::env::set_var("LLM_CACHE_TTL_SECONDS", "soon");
        assert!(matches!(
            CachedChatModel::from_env(Counting::new(false)),
            Err(ConfigError::InvalidEnv { name: "LLM_CACHE_TTL_SECONDS", .. })
        ));
        std::env::remove_var("LLM_CACHE_TTL_SECONDS");
    }
}
