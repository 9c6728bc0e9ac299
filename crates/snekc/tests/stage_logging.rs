// Copyright 2025 Diivanand Ramalingam
// Licensed under the Apache License, Version 2.0

use std::fmt;
use std::sync::{Arc, Mutex};

use snekc::{RunConfig, compile_and_run};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

/// Collects the message of every debug event emitted by the compiler crates.
#[derive(Clone, Default)]
struct DebugMessages(Arc<Mutex<Vec<String>>>);

struct MessageField<'a>(&'a mut String);

impl Visit for MessageField<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for DebugMessages {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() != Level::DEBUG || !meta.target().starts_with("snek") {
            return;
        }
        let mut message = String::new();
        event.record(&mut MessageField(&mut message));
        if let Ok(mut messages) = self.0.lock() {
            messages.push(message);
        }
    }
}

#[test]
fn each_stage_boundary_logs_once() {
    let messages = DebugMessages::default();
    let subscriber = Registry::default().with(messages.clone());
    tracing::subscriber::with_default(subscriber, || {
        compile_and_run("x: int = 1\nprint(x)", &RunConfig::default()).unwrap();
    });

    let seen = messages.0.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            "parsed program",
            "type checked program",
            "generated module",
            "module finished",
        ]
    );
}
