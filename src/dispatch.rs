//! Dispatcher: resolves a transcribed instruction against the Action
//! Registry and invokes the configured Handler, emitting feedback-sound
//! events along the way (spec §4.5).
//!
//! Handler resolution is a static name→constructor table, not dynamic class
//! loading (spec §9 design notes) — grounded on
//! `original_source/src/action.py`'s `NOPHandler`/`LoadedHandlerType`
//! pattern, expressed here without `__init_subclass__`-style plugin magic.

use std::sync::Arc;

use crate::actions::registry::{Action, ActionRegistry};
use crate::error::HandlerError;
use crate::sound::{FeedbackEvent, SoundSink};

/// Implemented by pluggable action handlers. `matched_text` is the substring
/// that satisfied the action's regex (spec §3's "opaque match object",
/// narrowed here to the matched span since that's all the core needs).
pub trait Handler: Send + Sync {
    fn handle(&self, action: &Action, matched_text: &str) -> Result<(), HandlerError>;
}

/// Always succeeds. The zero-config default handler, registered as `"noop"`.
pub struct NoopHandler;

impl Handler for NoopHandler {
    fn handle(&self, _action: &Action, _matched_text: &str) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Resolves a handler by name from the built-in table. Returns `None` for
/// an unrecognized name so the caller can fail startup with a clear error.
pub fn resolve_handler(name: &str) -> Option<Box<dyn Handler>> {
    match name {
        "noop" => Some(Box::new(NoopHandler)),
        _ => None,
    }
}

pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
    handler: Box<dyn Handler>,
    sounds: Arc<SoundSink>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ActionRegistry>, handler: Box<dyn Handler>, sounds: Arc<SoundSink>) -> Self {
        Self {
            registry,
            handler,
            sounds,
        }
    }

    /// `act()`: find → `understood`/`no` → handle → `ok`/`no`. No failure
    /// propagates out; handler errors are logged and downgraded to `no`
    /// (spec §4.5).
    pub fn act(&self, instruction_text: &str) {
        let Some((action, matched_text)) = self.registry.find(instruction_text) else {
            tracing::debug!(instruction = instruction_text, "no action matched");
            self.sounds.play(FeedbackEvent::No);
            return;
        };

        self.sounds.play(FeedbackEvent::Understood);

        match self.handler.handle(&action, &matched_text) {
            Ok(()) => {
                tracing::info!(keys = ?action.keys, "dispatch succeeded");
                self.sounds.play(FeedbackEvent::Ok);
            }
            Err(e) => {
                tracing::warn!(keys = ?action.keys, error = %e, "handler failed");
                self.sounds.play(FeedbackEvent::No);
            }
        }
    }
}
