//! Dispatcher lifecycle
//!
//! [`DispatcherCell`] holds at most one dispatcher for the frame thread. It
//! creates the dispatcher lazily on first access and retires it permanently
//! on shutdown: once shutdown has begun, no access path creates a new one,
//! even if some system torn down later still asks for it.

use crate::config::RuntimeConfig;
use crate::dispatcher::Dispatcher;
use tracing::{debug, error, warn};

/// Where the cell is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No dispatcher created yet (or the last one was unloaded with its context)
    Uninitialized,
    /// A dispatcher is available
    Active,
    /// Shutdown has begun; no dispatcher will ever be handed out again
    ShuttingDown,
}

/// How long the held dispatcher lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Survives context transitions; only shutdown ends it
    Persistent,
    /// Torn down with the context it was adopted into
    ContextBound,
}

/// Lazily-created, never-resurrected home of the dispatcher
pub struct DispatcherCell {
    state: LifecycleState,
    instance: Option<Dispatcher>,
    lifetime: Lifetime,
    config: RuntimeConfig,
}

impl DispatcherCell {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            instance: None,
            lifetime: Lifetime::Persistent,
            config,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_retired(&self) -> bool {
        self.state == LifecycleState::ShuttingDown
    }

    /// Lifetime of the held dispatcher, if there is one
    pub fn lifetime(&self) -> Option<Lifetime> {
        self.instance.as_ref().map(|_| self.lifetime)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Replace the config used for the next lazily-created dispatcher.
    /// Returns false if a dispatcher already exists or the cell is retired.
    pub fn configure(&mut self, config: RuntimeConfig) -> bool {
        if self.instance.is_some() || self.is_retired() {
            return false;
        }
        self.config = config;
        true
    }

    /// The dispatcher, created on first use. `None` once shutdown has begun.
    pub fn get_instance(&mut self) -> Option<&mut Dispatcher> {
        if self.is_retired() {
            if cfg!(debug_assertions) {
                warn!("dispatcher already retired at shutdown; not creating another");
            }
            return None;
        }

        if self.instance.is_none() {
            let dispatcher = Dispatcher::from_config(&self.config);
            debug!(
                "{} created on first use ({:?} iteration), persistent across contexts",
                dispatcher.id(),
                self.config.iteration
            );
            self.instance = Some(dispatcher);
            self.lifetime = Lifetime::Persistent;
            self.state = LifecycleState::Active;
        }

        self.instance.as_mut()
    }

    /// The dispatcher if one exists, without creating it
    pub fn peek(&self) -> Option<&Dispatcher> {
        self.instance.as_ref()
    }

    /// Take ownership of a dispatcher constructed outside the cell.
    ///
    /// It becomes the instance, bound to the current context, only if the
    /// cell holds none. Otherwise the duplicate is reported and dropped and
    /// the original is returned.
    pub fn adopt(&mut self, dispatcher: Dispatcher) -> Option<&mut Dispatcher> {
        if self.is_retired() {
            warn!("{} offered after shutdown; dropping it", dispatcher.id());
            return None;
        }

        match &self.instance {
            Some(original) => {
                error!(
                    "there should never be more than one dispatcher: dropping {}, keeping {}",
                    dispatcher.id(),
                    original.id()
                );
                drop(dispatcher);
            }
            None => {
                debug!("{} adopted, bound to the current context", dispatcher.id());
                self.instance = Some(dispatcher);
                self.lifetime = Lifetime::ContextBound;
                self.state = LifecycleState::Active;
            }
        }

        self.instance.as_mut()
    }

    /// The host is leaving its current context (scene, level, session).
    ///
    /// A context-bound dispatcher is dropped along with its participants and
    /// will be recreated lazily; a persistent one is untouched.
    pub fn unload_context(&mut self) {
        if self.lifetime == Lifetime::ContextBound {
            if let Some(dispatcher) = self.instance.take() {
                debug!(
                    "{} unloaded with its context ({} participants dropped)",
                    dispatcher.id(),
                    dispatcher.len()
                );
                self.lifetime = Lifetime::Persistent;
                if !self.is_retired() {
                    self.state = LifecycleState::Uninitialized;
                }
            }
        }
    }

    /// Retire the dispatcher for good. Idempotent.
    pub fn shutdown(&mut self) {
        if self.is_retired() {
            return;
        }
        self.state = LifecycleState::ShuttingDown;
        if let Some(dispatcher) = self.instance.take() {
            debug!(
                "{} retired at shutdown with {} participants",
                dispatcher.id(),
                dispatcher.len()
            );
        }
    }
}

impl Default for DispatcherCell {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
