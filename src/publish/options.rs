//! Effective delivery options

use crate::config::MessagingConfig;
use crate::models::TaskOptions;
use std::collections::HashMap;

/// Merges caller options with the configured routing
#[derive(Debug, Clone)]
pub struct OptionResolver {
    results_queue: String,
    default_queue: String,
    routes: HashMap<String, String>,
}

impl OptionResolver {
    pub fn from_config(config: &MessagingConfig) -> Self {
        Self {
            results_queue: config.results_queue.clone(),
            default_queue: config.default_queue.clone(),
            routes: config.routes.clone(),
        }
    }

    pub fn results_queue(&self) -> &str {
        &self.results_queue
    }

    /// Target queue for a task type with no explicit queue
    pub fn queue_for(&self, task_type: &str) -> &str {
        self.routes
            .get(task_type)
            .unwrap_or(&self.default_queue)
    }

    /// Results always go to the results queue; an unset target queue comes
    /// from the routing table, then the default queue.
    pub fn resolve(&self, task_type: &str, options: TaskOptions) -> TaskOptions {
        let defaults = TaskOptions {
            queue: Some(self.queue_for(task_type).to_string()),
            ..Default::default()
        };

        let mut resolved = options.merged_with(&defaults);
        resolved.reply_to = Some(self.results_queue.clone());
        resolved
    }
}
