//! Hook Bus - ordered middleware chain over named events

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::payload::HookPayload;

/// Failures raised by hook subscribers
#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook {hook} failed: {message}")]
    Failed { hook: String, message: String },

    #[error("failed to render feedback for {reason}: {message}")]
    Template { reason: String, message: String },

    #[error("failed to write event log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HookError {
    pub fn failed(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

/// A subscriber on the hook bus
///
/// Returning `Ok(Some(payload))` replaces the payload for the rest of the
/// chain; `Ok(None)` leaves it untouched.
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    fn on_event(&self, event: &str, payload: &HookPayload) -> Result<Option<HookPayload>, HookError>;
}

/// Adapter turning a closure into a [`Hook`]
pub struct FnHook<F> {
    name: String,
    f: F,
}

impl<F> FnHook<F>
where
    F: Fn(&str, &HookPayload) -> Result<Option<HookPayload>, HookError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Hook for FnHook<F>
where
    F: Fn(&str, &HookPayload) -> Result<Option<HookPayload>, HookError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &str, payload: &HookPayload) -> Result<Option<HookPayload>, HookError> {
        (self.f)(event, payload)
    }
}

#[derive(Clone)]
struct Subscription {
    /// `None` subscribes to every event
    event: Option<String>,
    hook: Arc<dyn Hook>,
}

impl Subscription {
    fn wants(&self, event: &str) -> bool {
        self.event.as_deref().is_none_or(|e| e == event)
    }
}

/// Registry of hook subscribers, invoked in registration order
#[derive(Clone, Default)]
pub struct HookBus {
    subscribers: Vec<Subscription>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a hook to one event
    pub fn register(&mut self, event: &str, hook: Arc<dyn Hook>) {
        debug!(%event, hook = hook.name(), "HookBus::register: called");
        self.subscribers.push(Subscription {
            event: Some(event.to_string()),
            hook,
        });
    }

    /// Subscribe a hook to every event
    pub fn register_all(&mut self, hook: Arc<dyn Hook>) {
        debug!(hook = hook.name(), "HookBus::register_all: called");
        self.subscribers.push(Subscription { event: None, hook });
    }

    /// Subscribe a closure to one event
    pub fn register_fn<F>(&mut self, event: &str, name: impl Into<String>, f: F)
    where
        F: Fn(&str, &HookPayload) -> Result<Option<HookPayload>, HookError> + Send + Sync + 'static,
    {
        self.register(event, Arc::new(FnHook::new(name, f)));
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Number of subscribers that receive `event`
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscribers.iter().filter(|s| s.wants(event)).count()
    }

    /// Run the pipeline for `event` and return the final payload
    pub fn emit(&self, event: &str, payload: HookPayload) -> HookPayload {
        debug!(%event, subscribers = self.subscriber_count(event), "HookBus::emit: called");
        let mut current = payload;
        for sub in self.subscribers.iter().filter(|s| s.wants(event)) {
            let hook = sub.hook.as_ref();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook.on_event(event, &current)));
            match outcome {
                Ok(Ok(Some(next))) => {
                    debug!(%event, hook = hook.name(), "HookBus::emit: payload replaced");
                    current = next;
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!(%event, hook = hook.name(), error = %e, "HookBus::emit: subscriber failed");
                }
                Err(panic) => {
                    warn!(
                        %event,
                        hook = hook.name(),
                        message = %panic_message(panic.as_ref()),
                        "HookBus::emit: subscriber panicked"
                    );
                }
            }
        }
        current
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
