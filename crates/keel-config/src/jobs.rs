use indexmap::IndexMap;
use serde::Deserialize;

/// Background job queues
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    /// Queue name to worker count, in priority order
    #[serde(default = "default_queues")]
    pub queues: IndexMap<String, u32>,
    /// Pending jobs held per queue before enqueue fails
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            queues: default_queues(),
            capacity: default_capacity(),
        }
    }
}

fn default_queues() -> IndexMap<String, u32> {
    IndexMap::from([
        ("critical".to_string(), 6),
        ("default".to_string(), 3),
        ("low".to_string(), 1),
    ])
}

const fn default_capacity() -> usize {
    1024
}
