use std::collections::HashMap;
use std::sync::Arc;

/// Events fired when a pipeline finishes with an effect worth reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    ClientsReconciled {
        group: String,
        added: usize,
        removed: usize,
        shadow_added: usize,
        shadow_removed: usize,
    },
    SecretsProvisioned {
        /// Store keys created, in creation order.
        created: Vec<String>,
        from_store: usize,
    },
    WorkloadCloned {
        source: String,
        name: String,
        group: String,
        retries: u32,
    },
}

impl HookEvent {
    pub fn kind(&self) -> HookKind {
        match self {
            HookEvent::ClientsReconciled { .. } => HookKind::ClientsReconciled,
            HookEvent::SecretsProvisioned { .. } => HookKind::SecretsProvisioned,
            HookEvent::WorkloadCloned { .. } => HookKind::WorkloadCloned,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    ClientsReconciled,
    SecretsProvisioned,
    WorkloadCloned,
}

pub type HookHandler = Arc<dyn Fn(&HookEvent) + Send + Sync>;

/// Registry of pipeline event handlers.
#[derive(Default)]
pub struct HookRegistry {
    handlers: HashMap<HookKind, Vec<HookHandler>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for an event kind.
    pub fn on(&mut self, kind: HookKind, handler: HookHandler) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Register a handler for every event kind.
    pub fn on_all(&mut self, handler: HookHandler) {
        for kind in [
            HookKind::ClientsReconciled,
            HookKind::SecretsProvisioned,
            HookKind::WorkloadCloned,
        ] {
            self.on(kind, handler.clone());
        }
    }

    /// Deliver an event to its handlers, in registration order, on the
    /// calling thread.
    pub fn emit(&self, event: HookEvent) {
        if let Some(handlers) = self.handlers.get(&event.kind()) {
            for handler in handlers {
                handler(&event);
            }
        }
    }
}
