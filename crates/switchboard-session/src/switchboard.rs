//! Turn handling across the session state machine

use crate::ack::is_acknowledgement;
use crate::memory::ToolRecord;
use crate::registry::{HandlerRegistry, RecordingCaller, ToolRegistry};
use crate::session::{Session, SessionState};
use chrono::{DateTime, Duration, Utc};
use switchboard_core::{
    Arbiter, HandlerId, HandlerOutcome, Route, RouterDecision, RoutingContext, RoutingFault,
    SessionConfig, Turn,
};
use switchboard_escalation::{Escalator, PriorSuggestion};

/// What the caller should say back for one turn
#[derive(Debug, Clone, PartialEq)]
pub enum TurnReply {
    /// A handler ran
    Handled {
        handler: HandlerId,
        confidence: f64,
        outcome: HandlerOutcome,
        tool_results: Vec<ToolRecord>,
    },
    /// Nothing was confident enough; ask the user
    Clarify { question: String, confidence: f64 },
    /// Acknowledgement right after a terminal outcome
    Closing { reply: String, topic: Option<String> },
    /// Routing produced something that cannot be served
    Unroutable { fault: RoutingFault },
}

impl TurnReply {
    /// Text to show the user. `Unroutable` yields `None`; callers supply their own message.
    pub fn text(&self) -> Option<&str> {
        match self {
            TurnReply::Handled { outcome, .. } => Some(&outcome.reply),
            TurnReply::Clarify { question, .. } => Some(question),
            TurnReply::Closing { reply, .. } => Some(reply),
            TurnReply::Unroutable { .. } => None,
        }
    }

    pub fn handler(&self) -> Option<&str> {
        match self {
            TurnReply::Handled { handler, .. } => Some(handler),
            _ => None,
        }
    }
}

/// Routes turns to handlers and keeps each session's state machine moving.
///
/// Shared immutably across sessions; each call takes the session it mutates.
pub struct Switchboard {
    arbiter: Arbiter,
    escalator: Option<Escalator>,
    handlers: HandlerRegistry,
    tools: ToolRegistry,
    config: SessionConfig,
}

impl Switchboard {
    pub fn new(arbiter: Arbiter, handlers: HandlerRegistry, tools: ToolRegistry) -> Self {
        Self {
            arbiter,
            escalator: None,
            handlers,
            tools,
            config: SessionConfig::new(),
        }
    }

    pub fn with_escalator(mut self, escalator: Escalator) -> Self {
        self.escalator = Some(escalator);
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Text to send back, with the configured fallback for unroutable turns
    pub fn reply_text<'a>(&'a self, reply: &'a TurnReply) -> &'a str {
        reply.text().unwrap_or(&self.config.unroutable_reply)
    }

    /// Arbiter decision for a turn against the session's context, without
    /// touching the session.
    pub fn route(&self, turn: &Turn, session: &Session) -> RouterDecision {
        self.arbiter.decide(turn, &session.routing_context())
    }

    pub fn handle(&self, turn: &Turn, session: &mut Session) -> TurnReply {
        self.handle_at(turn, session, Utc::now())
    }

    /// Handle one turn with an explicit clock
    pub fn handle_at(&self, turn: &Turn, session: &mut Session, now: DateTime<Utc>) -> TurnReply {
        let ctx = session.routing_context();
        // A pending clarification is offered to this turn only
        session.take_pending_question();

        match session.state().clone() {
            SessionState::Engaged { handler, .. } => {
                tracing::debug!(session_id = %session.id, handler = %handler, "continuing engaged handler");
                return self.invoke(&handler, 1.0, turn, session, now);
            }
            SessionState::TerminalCooldown { completed_at, .. } => {
                let elapsed = now - completed_at;
                let in_window = elapsed >= Duration::zero()
                    && Duration::try_seconds(self.config.ack_window_secs)
                        .map_or(true, |window| elapsed <= window);
                if !in_window {
                    session.reset();
                } else if is_acknowledgement(turn.trimmed_text()) {
                    session.reset();
                    let topic = session.last_topic().map(|t| t.topic.clone());
                    tracing::info!(
                        session_id = %session.id,
                        elapsed_secs = elapsed.num_seconds(),
                        topic = topic.as_deref().unwrap_or("-"),
                        "acknowledgement closes task"
                    );
                    return TurnReply::Closing {
                        reply: self.config.closing_reply.clone(),
                        topic,
                    };
                }
                // Cooldown holds until a handler re-engages or the window closes
            }
            SessionState::Idle => {}
        }

        if turn.trimmed_text().is_empty() {
            let question = self.arbiter.config().clarify_question.clone();
            session.set_pending_question(question.clone());
            return TurnReply::Clarify {
                question,
                confidence: 0.0,
            };
        }

        let decision = self.arbiter.decide(turn, &ctx);
        let (route, confidence) = self.escalate_if_weak(turn, &ctx, decision);

        match route {
            Route::Clarify(payload) => {
                session.set_pending_question(payload.question.clone());
                TurnReply::Clarify {
                    question: payload.question,
                    confidence,
                }
            }
            Route::Handler(handler) => self.invoke(&handler, confidence, turn, session, now),
        }
    }

    /// Hand low-confidence decisions to the escalation tier when one is configured.
    /// A tier that gives up leaves the arbiter's decision in place.
    fn escalate_if_weak(
        &self,
        turn: &Turn,
        ctx: &RoutingContext,
        decision: RouterDecision,
    ) -> (Route, f64) {
        let Some(escalator) = &self.escalator else {
            return (decision.route, decision.confidence);
        };
        if decision.handler().is_some() && !escalator.should_escalate(decision.confidence) {
            return (decision.route, decision.confidence);
        }

        let prior = decision.handler().map(|h| PriorSuggestion {
            handler: h.to_string(),
            confidence: decision.confidence,
        });
        let escalation = escalator.escalate(turn, None, ctx.last_topic.as_deref(), prior.as_ref());
        if escalation.fault.is_some() {
            return (decision.route, decision.confidence);
        }
        let confidence = decision.confidence.max(escalation.confidence);
        (escalation.route, confidence)
    }

    fn invoke(
        &self,
        handler_id: &str,
        confidence: f64,
        turn: &Turn,
        session: &mut Session,
        now: DateTime<Utc>,
    ) -> TurnReply {
        let Some(handler) = self.handlers.get(handler_id) else {
            let fault = RoutingFault::UnknownHandler(handler_id.to_string());
            tracing::error!(
                session_id = %session.id,
                turn_id = %turn.turn_id,
                handler = handler_id,
                error = %fault,
                "invariant violation: routed to unregistered handler"
            );
            session.reset();
            return TurnReply::Unroutable { fault };
        };

        // Handlers see session facts over whatever the caller attached
        let mut handler_turn = turn.clone();
        handler_turn
            .metadata
            .facts
            .extend(session.facts().iter().map(|(k, v)| (k.clone(), v.clone())));

        let recorder = RecordingCaller::new(&self.tools);
        let memory = session.engage_memory(handler_id);
        let outcome = handler.run(&handler_turn, memory, &recorder);
        let tool_results = recorder.into_records();
        memory.record_tools(&tool_results);
        let promoted = memory.session_facts();

        session.merge_facts(promoted);
        if let Some(delta) = outcome.facts.clone() {
            session.merge_facts(delta);
        }

        if outcome.terminal {
            session.complete(handler_id.to_string(), outcome.resolved_topic.clone(), now);
        } else if let Some(topic) = &outcome.resolved_topic {
            session.set_active_topic(topic.clone());
        }

        tracing::info!(
            session_id = %session.id,
            turn_id = %turn.turn_id,
            handler = handler_id,
            confidence,
            terminal = outcome.terminal,
            topic = outcome.resolved_topic.as_deref().unwrap_or("-"),
            tools = tool_results.len(),
            "handler outcome"
        );

        TurnReply::Handled {
            handler: handler_id.to_string(),
            confidence,
            outcome,
            tool_results,
        }
    }
}
