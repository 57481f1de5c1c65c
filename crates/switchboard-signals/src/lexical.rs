//! Lexical pattern matching

use regex::{Regex, RegexBuilder};
use serde_json::json;
use std::collections::BTreeMap;
use switchboard_core::{
    Catalog, ConfigError, HandlerId, Signal, SignalContext, SignalProvider, SignalSource,
};

struct HandlerPatterns {
    handler: HandlerId,
    patterns: Vec<Regex>,
}

/// Counts pattern hits per handler.
///
/// Confidence is the best handler's hits divided by the largest pattern count
/// among handlers that scored at least one hit, so a full match scores 1.0.
pub struct LexicalProvider {
    handlers: Vec<HandlerPatterns>,
}

impl LexicalProvider {
    pub fn new(catalog: &Catalog) -> Result<Self, ConfigError> {
        let mut handlers = Vec::with_capacity(catalog.handlers.len());
        for profile in &catalog.handlers {
            let mut patterns = Vec::with_capacity(profile.patterns.len());
            for pattern in &profile.patterns {
                let compiled = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConfigError::InvalidPattern {
                        handler: profile.id.clone(),
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?;
                patterns.push(compiled);
            }
            handlers.push(HandlerPatterns {
                handler: profile.id.clone(),
                patterns,
            });
        }
        Ok(Self { handlers })
    }

    /// Hit count per handler, catalog order, handlers without hits omitted
    pub fn hits(&self, text: &str) -> Vec<(&str, usize, usize)> {
        self.handlers
            .iter()
            .filter_map(|h| {
                let hit = h.patterns.iter().filter(|p| p.is_match(text)).count();
                (hit > 0).then_some((h.handler.as_str(), hit, h.patterns.len()))
            })
            .collect()
    }
}

impl SignalProvider for LexicalProvider {
    fn source(&self) -> SignalSource {
        SignalSource::Lexical
    }

    fn try_evaluate(&self, text: &str, _ctx: &SignalContext<'_>) -> anyhow::Result<Signal> {
        let scored = self.hits(text);
        let scores: BTreeMap<&str, usize> = scored.iter().map(|(h, hit, _)| (*h, *hit)).collect();

        let mut best: Option<(&str, usize)> = None;
        for (handler, hit, _) in &scored {
            let better = match best {
                None => true,
                Some((_, best_hit)) => *hit > best_hit,
            };
            if better {
                best = Some((handler, *hit));
            }
        }

        let Some((handler, hit)) = best else {
            return Ok(Signal::null(SignalSource::Lexical).with_detail("scores", json!(scores)));
        };

        let capacity = scored.iter().map(|(_, _, total)| *total).max().unwrap_or(hit);
        let confidence = hit as f64 / capacity.max(1) as f64;

        Ok(Signal::proposing(SignalSource::Lexical, handler, confidence)
            .with_detail("scores", json!(scores))
            .with_detail("capacity", capacity))
    }
}
