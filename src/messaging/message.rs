//! # Message Structures
//!
//! Wire formats for the task queues and the results queue.
//!
//! A task message is `{headers, body}`. Identity and chain linkage are typed
//! header fields; scheduling metadata (eta, expires, retries, timelimit, ...)
//! travels as loose header properties that the task consumer normalizes.
//!
//! A chained publish carries the rest of the chain in the head message's
//! `chain` header, last task first.

use super::properties::normalize_properties;
use crate::constants::TaskStatus;
use crate::error::{TrackingError, TrackingResult};
use crate::models::{TaskInput, TaskOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One pending element of a chain, as carried in the head message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainElement {
    pub id: String,
    pub task: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
    #[serde(default)]
    pub options: TaskOptions,
}

impl ChainElement {
    pub fn input(&self) -> TaskInput {
        TaskInput::new(self.args.clone(), self.kwargs.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHeaders {
    pub id: String,
    /// Fully-qualified job name
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
    /// Remaining chain, reversed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<ChainElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_object: Option<String>,
    /// Scheduling properties; values may be transport "unset" placeholders
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl TaskHeaders {
    pub fn new(id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            parent_id: None,
            root_id: None,
            chain: Vec::new(),
            creator: None,
            related_object: None,
            properties: Map::new(),
        }
    }

    /// Write the scheduling fields of `options` as header properties.
    /// Linkage stays in the typed fields.
    pub fn with_scheduling(mut self, options: &TaskOptions) -> TrackingResult<Self> {
        let mut scheduling = options.clone();
        scheduling.parent_id = None;
        scheduling.root_id = None;
        match serde_json::to_value(scheduling)? {
            Value::Object(map) => self.properties.extend(map),
            other => {
                return Err(TrackingError::malformed(
                    "task",
                    format!("scheduling options serialized to {other}"),
                ))
            }
        }
        Ok(self)
    }

    /// Linkage headers without a chain: the task was scheduled by a running
    /// worker, whose chain is not expanded into rows
    pub fn is_worker_scheduled(&self) -> bool {
        self.chain.is_empty() && (self.parent_id.is_some() || self.root_id.is_some())
    }

    /// Scheduling options carried by these headers, placeholders dropped
    pub fn scheduling_options(&self) -> TaskOptions {
        normalize_properties(&self.properties)
    }
}

/// Envelope published to a task queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub headers: TaskHeaders,
    pub body: TaskInput,
}

impl TaskMessage {
    pub fn new(headers: TaskHeaders, body: TaskInput) -> Self {
        Self { headers, body }
    }

    pub fn from_value(payload: Value) -> TrackingResult<Self> {
        serde_json::from_value(payload)
            .map_err(|e| TrackingError::malformed("task", e.to_string()))
    }

    pub fn to_value(&self) -> TrackingResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn id(&self) -> &str {
        &self.headers.id
    }

    pub fn task_type(&self) -> &str {
        &self.headers.task
    }
}

/// Completion or progress report published to the results queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub task_id: String,
    pub status: TaskStatus,
    /// Return value for ready states; `{"log": ..., ...}` for progress
    #[serde(default)]
    pub result: Value,
}

impl ResultMessage {
    pub fn new(task_id: impl Into<String>, status: TaskStatus, result: Value) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            result,
        }
    }

    pub fn from_value(payload: Value) -> TrackingResult<Self> {
        serde_json::from_value(payload)
            .map_err(|e| TrackingError::malformed("result", e.to_string()))
    }

    pub fn to_value(&self) -> TrackingResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
