//! Deterministic capability doubles for tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use switchboard_core::{ChatModel, ChatPrompt, Embedder};

/// Bag-of-concepts embedder: one dimension per keyword group.
pub struct KeywordEmbedder {
    groups: Vec<Vec<String>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl KeywordEmbedder {
    pub fn new(groups: &[&[&str]]) -> Self {
        Self {
            groups: groups
                .iter()
                .map(|g| g.iter().map(|w| w.to_string()).collect())
                .collect(),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Card, appointment and FAQ concept groups
    pub fn banking() -> Self {
        Self::new(&[
            &[
                "card", "cards", "stolen", "lost", "fraud", "block", "freeze", "lock",
                "replacement", "reissue", "order",
            ],
            &[
                "appointment", "book", "schedule", "meeting", "visit", "slot", "branch",
                "tomorrow",
            ],
            &[
                "limit", "limits", "fee", "fees", "cutoff", "withdraw", "atm", "transfer",
                "rates", "information", "much",
            ],
        ])
    }

    /// Make every later `embed` call fail, e.g. after providers are built
    pub fn fail_from_now(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Number of `embed` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        self.groups
            .iter()
            .map(|group| tokens.iter().filter(|t| group.iter().any(|w| w == *t)).count() as f32)
            .collect()
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("embedding service unavailable");
        }
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

/// Embedder that always fails
pub struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding service unavailable")
    }
}

/// Chat model replaying canned responses in order; errors once exhausted.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<anyhow::Result<String>>>,
    prompts: Mutex<Vec<ChatPrompt>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a failing call
    pub fn then_fail(self, message: &str) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(anyhow::anyhow!(message.to_string())));
        }
        self
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<ChatPrompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl ChatModel for ScriptedModel {
    fn complete(&self, prompt: &ChatPrompt) -> anyhow::Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted model poisoned"))?
            .pop_front();
        next.unwrap_or_else(|| Err(anyhow::anyhow!("scripted model exhausted")))
    }
}
