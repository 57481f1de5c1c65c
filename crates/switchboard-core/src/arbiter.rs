//! Multi-signal arbiter

use crate::config::ArbiterConfig;
use crate::provider::{RoutingContext, SignalContext, SignalProvider};
use crate::types::{
    ClarifyPayload, Facts, HandlerId, Route, RouterDecision, Signal, SignalSource, Turn,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// Absorbs float noise in `a >= b + margin` comparisons (0.8 vs 0.65 + 0.15).
const MARGIN_EPSILON: f64 = 1e-9;

/// The four signal providers, one per source
pub struct Providers {
    pub lexical: Box<dyn SignalProvider>,
    pub vector: Box<dyn SignalProvider>,
    pub model: Box<dyn SignalProvider>,
    pub drift: Box<dyn SignalProvider>,
}

impl Providers {
    fn get(&self, source: SignalSource) -> &dyn SignalProvider {
        match source {
            SignalSource::Lexical => self.lexical.as_ref(),
            SignalSource::Vector => self.vector.as_ref(),
            SignalSource::Model => self.model.as_ref(),
            SignalSource::Drift => self.drift.as_ref(),
        }
    }
}

/// Best qualifying proposal for one handler
#[derive(Debug, Clone, Copy, PartialEq)]
struct Proposal {
    confidence: f64,
    source: SignalSource,
}

impl Proposal {
    fn rank_cmp(&self, other: &Proposal) -> Ordering {
        self.confidence
            .total_cmp(&other.confidence)
            .then(self.source.tie_rank().cmp(&other.source.tie_rank()))
    }
}

pub struct Arbiter {
    config: ArbiterConfig,
    providers: Providers,
}

impl Arbiter {
    pub fn new(config: ArbiterConfig, providers: Providers) -> Self {
        Self { config, providers }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    /// Run every provider on the turn and arbitrate their signals
    pub fn decide(&self, turn: &Turn, ctx: &RoutingContext) -> RouterDecision {
        // Session facts win over caller-supplied ones
        let mut facts: Facts = turn.metadata.facts.clone();
        facts.extend(ctx.facts.iter().map(|(k, v)| (k.clone(), v.clone())));

        let signal_ctx = SignalContext {
            history: &turn.metadata.recent_messages,
            facts: &facts,
            last_topic: ctx.last_topic.as_deref(),
            pending_question: ctx.pending_question.as_deref(),
        };

        let text = turn.trimmed_text();
        let signals: Vec<Signal> = SignalSource::ALL
            .iter()
            .map(|&source| self.providers.get(source).evaluate(text, &signal_ctx))
            .collect();

        for signal in &signals {
            tracing::debug!(
                turn_id = %turn.turn_id,
                source = %signal.source,
                candidate = signal.candidate.as_deref().unwrap_or("-"),
                confidence = signal.confidence,
                "signal"
            );
        }

        let decision = self.arbitrate(signals);
        match &decision.route {
            Route::Handler(handler) => tracing::info!(
                turn_id = %turn.turn_id,
                session_id = %turn.session_id,
                handler = %handler,
                confidence = decision.confidence,
                signals = %decision.signal_summary(),
                "route picked"
            ),
            Route::Clarify(_) => tracing::info!(
                turn_id = %turn.turn_id,
                session_id = %turn.session_id,
                signals = %decision.signal_summary(),
                "route needs clarification"
            ),
        }
        decision
    }

    /// Combine signals into one decision. Pure: equal inputs give equal outputs.
    pub fn arbitrate(&self, mut signals: Vec<Signal>) -> RouterDecision {
        // Report in fixed source order regardless of how signals were produced
        signals.sort_by_key(|s| source_index(s.source));

        // Phase 1: best qualifying confidence per handler
        let mut best: BTreeMap<HandlerId, Proposal> = BTreeMap::new();
        for signal in &signals {
            let Some(candidate) = &signal.candidate else {
                continue;
            };
            if signal.confidence < self.threshold(signal.source) {
                continue;
            }
            let proposal = Proposal {
                confidence: signal.confidence,
                source: signal.source,
            };
            best.entry(candidate.clone())
                .and_modify(|current| {
                    if proposal.rank_cmp(current) == Ordering::Greater {
                        *current = proposal;
                    }
                })
                .or_insert(proposal);
        }

        // Phase 2: provisional pick, provider priority breaks ties
        let provisional = best
            .iter()
            .max_by(|a, b| a.1.rank_cmp(b.1))
            .map(|(handler, proposal)| (handler.clone(), *proposal));

        let Some((mut picked, provisional_proposal)) = provisional else {
            return self.clarify(signals);
        };
        let mut picked_conf = provisional_proposal.confidence;

        // Phase 3: one override step, model first, never re-chained
        if let Some((handler, conf)) = self.overriding(&signals, SignalSource::Model, &picked, picked_conf)
        {
            tracing::debug!(from = %picked, to = %handler, "model override");
            picked = handler;
            picked_conf = conf;
        } else if let Some((handler, conf)) =
            self.overriding(&signals, SignalSource::Vector, &picked, picked_conf)
        {
            tracing::debug!(from = %picked, to = %handler, "vector override");
            picked = handler;
            picked_conf = conf;
        }

        // Phase 4: final admission
        if picked_conf < self.config.final_min {
            return self.clarify(signals);
        }

        RouterDecision {
            route: Route::Handler(picked),
            confidence: picked_conf,
            signals,
        }
    }

    fn threshold(&self, source: SignalSource) -> f64 {
        let t = &self.config.thresholds;
        match source {
            SignalSource::Lexical => t.lexical_min,
            SignalSource::Vector => t.vector_min,
            SignalSource::Model => t.model_min,
            SignalSource::Drift => t.drift_min,
        }
    }

    fn margin(&self, source: SignalSource) -> f64 {
        match source {
            SignalSource::Model => self.config.model_override_margin,
            _ => self.config.vector_override_margin,
        }
    }

    fn overriding(
        &self,
        signals: &[Signal],
        source: SignalSource,
        picked: &str,
        picked_conf: f64,
    ) -> Option<(HandlerId, f64)> {
        let signal = signals.iter().find(|s| s.source == source)?;
        let candidate = signal.candidate.as_ref()?;
        if candidate == picked {
            return None;
        }
        if signal.confidence + MARGIN_EPSILON >= picked_conf + self.margin(source) {
            Some((candidate.clone(), signal.confidence))
        } else {
            None
        }
    }

    fn clarify(&self, signals: Vec<Signal>) -> RouterDecision {
        RouterDecision {
            route: Route::Clarify(ClarifyPayload::new(self.config.clarify_question.clone())),
            confidence: 0.0,
            signals,
        }
    }
}

fn source_index(source: SignalSource) -> usize {
    SignalSource::ALL
        .iter()
        .position(|&s| s == source)
        .unwrap_or(SignalSource::ALL.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GENERIC_CLARIFY_QUESTION;

    struct Fixed(Signal);

    impl SignalProvider for Fixed {
        fn source(&self) -> SignalSource {
            self.0.source
        }

        fn try_evaluate(&self, _text: &str, _ctx: &SignalContext<'_>) -> anyhow::Result<Signal> {
            Ok(self.0.clone())
        }
    }

    fn null_providers() -> Providers {
        Providers {
            lexical: Box::new(Fixed(Signal::null(SignalSource::Lexical))),
            vector: Box::new(Fixed(Signal::null(SignalSource::Vector))),
            model: Box::new(Fixed(Signal::null(SignalSource::Model))),
            drift: Box::new(Fixed(Signal::null(SignalSource::Drift))),
        }
    }

    fn arbiter() -> Arbiter {
        Arbiter::new(ArbiterConfig::new(), null_providers())
    }

    fn sig(source: SignalSource, handler: &str, conf: f64) -> Signal {
        Signal::proposing(source, handler, conf)
    }

    #[test]
    fn test_nothing_qualifies_asks_clarify() {
        let decision = arbiter().arbitrate(vec![
            sig(SignalSource::Lexical, "agent-card-control", 0.2),
            sig(SignalSource::Vector, "agent-faq", 0.4),
            sig(SignalSource::Model, "agent-faq", 0.5),
            Signal::null(SignalSource::Drift),
        ]);
        assert!(decision.handler().is_none());
        assert_eq!(
            decision.clarify().unwrap().question,
            GENERIC_CLARIFY_QUESTION
        );
        assert_eq!(decision.signals.len(), 4);
    }

    #[test]
    fn test_highest_qualifying_confidence_wins() {
        let decision = arbiter().arbitrate(vec![
            sig(SignalSource::Lexical, "agent-card-control", 1.0),
            sig(SignalSource::Vector, "agent-faq", 0.8),
        ]);
        assert_eq!(decision.handler(), Some("agent-card-control"));
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn test_tie_prefers_model_then_vector_then_lexical() {
        let decision = arbiter().arbitrate(vec![
            sig(SignalSource::Lexical, "agent-card-control", 0.8),
            sig(SignalSource::Vector, "agent-appointment", 0.8),
            sig(SignalSource::Model, "agent-faq", 0.8),
        ]);
        assert_eq!(decision.handler(), Some("agent-faq"));

        let decision = arbiter().arbitrate(vec![
            sig(SignalSource::Lexical, "agent-card-control", 0.8),
            sig(SignalSource::Vector, "agent-appointment", 0.8),
        ]);
        assert_eq!(decision.handler(), Some("agent-appointment"));
    }

    #[test]
    fn test_tie_break_independent_of_input_order() {
        let forward = vec![
            sig(SignalSource::Lexical, "agent-card-control", 0.8),
            sig(SignalSource::Vector, "agent-appointment", 0.8),
            sig(SignalSource::Model, "agent-faq", 0.8),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = arbiter().arbitrate(forward);
        let b = arbiter().arbitrate(reversed);
        assert_eq!(a, b);
        assert_eq!(
            a.signals.iter().map(|s| s.source).collect::<Vec<_>>(),
            vec![SignalSource::Lexical, SignalSource::Vector, SignalSource::Model]
        );
    }

    #[test]
    fn test_model_override_below_its_threshold() {
        // Lexical qualifies at 0.4; the model (not qualifying at 0.68) leads by 0.28
        let mut config = ArbiterConfig::new();
        config.final_min = 0.4;
        let arbiter = Arbiter::new(config, null_providers());
        let decision = arbiter.arbitrate(vec![
            sig(SignalSource::Lexical, "agent-card-control", 0.4),
            sig(SignalSource::Model, "agent-faq", 0.68),
        ]);
        assert_eq!(decision.handler(), Some("agent-faq"));
        assert_eq!(decision.confidence, 0.68);
    }

    #[test]
    fn test_override_margin_not_met_keeps_pick() {
        let mut config = ArbiterConfig::new();
        config.final_min = 0.4;
        let arbiter = Arbiter::new(config, null_providers());
        let decision = arbiter.arbitrate(vec![
            sig(SignalSource::Lexical, "agent-card-control", 0.5),
            sig(SignalSource::Model, "agent-faq", 0.6),
        ]);
        assert_eq!(decision.handler(), Some("agent-card-control"));
    }

    #[test]
    fn test_model_override_checked_before_vector() {
        let mut config = ArbiterConfig::new();
        config.final_min = 0.3;
        config.thresholds.model_min = 0.95;
        config.thresholds.vector_min = 0.95;
        let arbiter = Arbiter::new(config, null_providers());
        let decision = arbiter.arbitrate(vec![
            sig(SignalSource::Lexical, "agent-card-control", 0.4),
            sig(SignalSource::Vector, "agent-appointment", 0.9),
            sig(SignalSource::Model, "agent-faq", 0.6),
        ]);
        assert_eq!(decision.handler(), Some("agent-faq"));
    }

    #[test]
    fn test_vector_override_when_model_silent() {
        let mut config = ArbiterConfig::new();
        config.final_min = 0.3;
        config.thresholds.vector_min = 0.95;
        let arbiter = Arbiter::new(config, null_providers());
        let decision = arbiter.arbitrate(vec![
            sig(SignalSource::Lexical, "agent-card-control", 0.4),
            sig(SignalSource::Vector, "agent-appointment", 0.5),
            Signal::null(SignalSource::Model),
        ]);
        assert_eq!(decision.handler(), Some("agent-appointment"));
    }

    #[test]
    fn test_override_margin_exact_boundary() {
        let mut config = ArbiterConfig::new();
        config.final_min = 0.5;
        config.thresholds.model_min = 0.9;
        let arbiter = Arbiter::new(config, null_providers());
        let decision = arbiter.arbitrate(vec![
            sig(SignalSource::Lexical, "agent-card-control", 0.65),
            sig(SignalSource::Model, "agent-faq", 0.8),
        ]);
        assert_eq!(decision.handler(), Some("agent-faq"));
    }

    #[test]
    fn test_final_min_rejects_weak_pick() {
        let decision = arbiter().arbitrate(vec![sig(
            SignalSource::Lexical,
            "agent-card-control",
            0.5,
        )]);
        assert!(decision.clarify().is_some());
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn test_drift_participates_with_lowest_priority() {
        let decision = arbiter().arbitrate(vec![
            sig(SignalSource::Lexical, "agent-card-control", 0.7),
            sig(SignalSource::Drift, "agent-faq", 0.7),
        ]);
        assert_eq!(decision.handler(), Some("agent-card-control"));

        let decision = arbiter().arbitrate(vec![sig(SignalSource::Drift, "agent-faq", 0.9)]);
        assert_eq!(decision.handler(), Some("agent-faq"));
    }

    #[test]
    fn test_decide_runs_every_provider() {
        let providers = Providers {
            lexical: Box::new(Fixed(sig(SignalSource::Lexical, "agent-card-control", 1.0))),
            vector: Box::new(Fixed(Signal::null(SignalSource::Vector))),
            model: Box::new(Fixed(Signal::null(SignalSource::Model))),
            drift: Box::new(Fixed(Signal::null(SignalSource::Drift))),
        };
        let arbiter = Arbiter::new(ArbiterConfig::new(), providers);
        let turn = Turn::text("t1", "s1", "block my card");
        let decision = arbiter.decide(&turn, &RoutingContext::default());
        assert_eq!(decision.handler(), Some("agent-card-control"));
        assert_eq!(decision.signals.len(), 4);
    }

    #[test]
    fn test_decide_empty_text_clarifies() {
        let providers = Providers {
            lexical: Box::new(Fixed(sig(SignalSource::Lexical, "agent-card-control", 1.0))),
            vector: Box::new(Fixed(Signal::null(SignalSource::Vector))),
            model: Box::new(Fixed(Signal::null(SignalSource::Model))),
            drift: Box::new(Fixed(Signal::null(SignalSource::Drift))),
        };
        let arbiter = Arbiter::new(ArbiterConfig::new(), providers);
        let turn = Turn::text("t1", "s1", "  ");
        let decision = arbiter.decide(&turn, &RoutingContext::default());
        assert!(decision.clarify().is_some());
        assert!(decision.signals.iter().all(|s| s.candidate.is_none()));
    }
}
