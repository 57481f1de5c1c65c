#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use switchboard_core::{
    Arbiter, ArbiterConfig, Catalog, EscalationConfig, HandlerOutcome, Turn,
};
use switchboard_escalation::Escalator;
use switchboard_session::{
    FnTool, Handler, HandlerMemory, HandlerRegistry, Switchboard, Tool, ToolCaller, ToolRegistry,
};
use switchboard_signals::testing::{KeywordEmbedder, ScriptedModel};
use switchboard_signals::{build_providers, DEFAULT_DRIFT_THRESHOLD, DEFAULT_VECTOR_FLOOR};

pub const CARD: &str = "agent-card-control";
pub const APPOINTMENT: &str = "agent-appointment";
pub const FAQ: &str = "agent-faq";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

pub fn turn(id: &str, text: &str) -> Turn {
    Turn::text(id, "s1", text)
}

/// Two-step card blocker: asks for confirmation, then calls `card.block`.
struct CardHandler {
    calls: Arc<AtomicUsize>,
}

impl Handler for CardHandler {
    fn id(&self) -> &str {
        CARD
    }

    fn run(&self, turn: &Turn, memory: &mut HandlerMemory, tools: &dyn ToolCaller) -> HandlerOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        memory.set_private("last_text", turn.text.clone());

        if memory.remove("awaiting_confirmation").is_none() {
            memory.set_private("awaiting_confirmation", true);
            return HandlerOutcome::reply("Block the card ending 1234? Say yes to confirm.")
                .with_topic("card_block");
        }

        let result = tools.call("card.block", json!({"card_id": "c-1234"}));
        if result.is_ok() {
            memory.set_session("card_blocked", true);
            HandlerOutcome::terminal("Your card is now blocked.", "card_block")
        } else {
            HandlerOutcome::terminal("I couldn't block the card right now.", "card_block")
        }
    }
}

/// Answers in one step; mentions a blocked card when the session knows about it.
struct FaqHandler {
    calls: Arc<AtomicUsize>,
}

impl Handler for FaqHandler {
    fn id(&self) -> &str {
        FAQ
    }

    fn run(&self, turn: &Turn, _memory: &mut HandlerMemory, _tools: &dyn ToolCaller) -> HandlerOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut reply = "ATM withdrawals are free up to 5 per month.".to_string();
        if turn.metadata.facts.get("card_blocked") == Some(&Value::Bool(true)) {
            reply.push_str(" Your card is currently blocked.");
        }
        HandlerOutcome::terminal(reply, "faq")
    }
}

/// Stays engaged and reports a fact delta
struct AppointmentHandler {
    calls: Arc<AtomicUsize>,
}

impl Handler for AppointmentHandler {
    fn id(&self) -> &str {
        APPOINTMENT
    }

    fn run(&self, _turn: &Turn, _memory: &mut HandlerMemory, _tools: &dyn ToolCaller) -> HandlerOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        HandlerOutcome::reply("Which branch and time suit you?")
            .with_topic("appointment_booking")
            .with_fact("appointment_requested", true)
    }
}

pub struct Fixture {
    pub board: Switchboard,
    pub embedder: Arc<KeywordEmbedder>,
    pub model: Arc<ScriptedModel>,
    calls: BTreeMap<&'static str, Arc<AtomicUsize>>,
}

impl Fixture {
    /// Banking catalog, all three handlers, a model that always fails, no escalation
    pub fn new() -> Self {
        Self::build(ScriptedModel::new(Vec::<String>::new()), false, &[])
    }

    pub fn build(model: ScriptedModel, escalate: bool, unregistered: &[&str]) -> Self {
        let catalog = Catalog::banking();
        let embedder = Arc::new(KeywordEmbedder::banking());
        let model = Arc::new(model);

        let providers = build_providers(
            &catalog,
            embedder.clone(),
            model.clone(),
            DEFAULT_VECTOR_FLOOR,
            DEFAULT_DRIFT_THRESHOLD,
        )
        .unwrap();
        let arbiter = Arbiter::new(ArbiterConfig::new(), providers);

        let mut calls = BTreeMap::new();
        let mut handlers: Vec<Box<dyn Handler>> = Vec::new();
        for id in [CARD, APPOINTMENT, FAQ] {
            let counter = Arc::new(AtomicUsize::new(0));
            calls.insert(id, counter.clone());
            if unregistered.contains(&id) {
                continue;
            }
            let handler: Box<dyn Handler> = match id {
                CARD => Box::new(CardHandler { calls: counter }),
                APPOINTMENT => Box::new(AppointmentHandler { calls: counter }),
                _ => Box::new(FaqHandler { calls: counter }),
            };
            handlers.push(handler);
        }

        let tools: Vec<Box<dyn Tool>> = vec![Box::new(FnTool::new(
            "card.block",
            |args: &Value| Ok(json!({"card_id": args["card_id"], "status": "blocked"})),
        ))];

        let mut board = Switchboard::new(
            arbiter,
            HandlerRegistry::new(handlers).unwrap(),
            ToolRegistry::new(tools).unwrap(),
        );
        if escalate {
            board = board.with_escalator(Escalator::new(
                model.clone(),
                &catalog,
                EscalationConfig::new(),
            ));
        }

        Self {
            board,
            embedder,
            model,
            calls,
        }
    }

    /// Invocations of one handler so far
    pub fn calls(&self, handler: &str) -> usize {
        self.calls
            .get(handler)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.values().map(|c| c.load(Ordering::SeqCst)).sum()
    }
}
