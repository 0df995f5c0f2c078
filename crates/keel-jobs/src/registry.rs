use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

/// Executes jobs of one task type
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Run a single attempt; an error schedules a retry while any remain
    async fn handle(&self, payload: &serde_json::Value) -> anyhow::Result<()>;
}

/// Task type to handler lookup used by workers
#[derive(Default, Clone)]
pub struct TaskRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `task_type`, replacing any previous one
    #[must_use]
    pub fn register(mut self, task_type: impl Into<String>, handler: impl TaskHandler + 'static) -> Self {
        self.handlers.insert(task_type.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn task_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
