//! # Task Tracking Record
//!
//! One row per broker task id, created when the task is published (or, as a
//! fallback, when a worker first consumes it) and updated by the result
//! consumer until the task reaches a ready state.
//!
//! ## Database Schema
//!
//! Maps to `task_records`:
//! - `id`: broker-assigned task id (TEXT, primary key, never generated here)
//! - `type`: fully-qualified job name
//! - `status`: broker state string, default `PENDING`
//! - `input`: JSONB `{args, kwargs}`
//! - `options`: JSONB scheduling snapshot taken at publish time
//! - `output`: JSONB, null until the task is ready
//! - `log`: JSONB array, only ever appended to
//! - `parent_id` / `root_id`: chain linkage; a chain head is its own root

use crate::constants::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

/// Positional and keyword arguments, always stored together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl TaskInput {
    pub fn new(args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self { args, kwargs }
    }
}

/// Soft and hard execution time limits in seconds, `[soft, hard]` on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeLimit(pub Option<f64>, pub Option<f64>);

impl TimeLimit {
    pub fn soft(&self) -> Option<f64> {
        self.0
    }

    pub fn hard(&self) -> Option<f64> {
        self.1
    }

    /// `[null, null]` is the transport's placeholder for "no limit"
    pub fn is_unset(&self) -> bool {
        self.0.is_none() && self.1.is_none()
    }
}

/// Scheduling snapshot taken when the task was published. Written once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timelimit: Option<TimeLimit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Queue results are reported to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
}

impl TaskOptions {
    /// Fill every unset field from `defaults`; fields already set win
    pub fn merged_with(mut self, defaults: &TaskOptions) -> TaskOptions {
        macro_rules! fill {
            ($($field:ident),*) => {
                $( if self.$field.is_none() { self.$field = defaults.$field.clone(); } )*
            };
        }
        fill!(
            queue,
            eta,
            expires,
            countdown,
            retries,
            timelimit,
            correlation_id,
            reply_to,
            parent_id,
            root_id
        );
        self
    }
}

/// A persisted tracking row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TaskRecord {
    pub id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub task_type: String,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    #[sqlx(json)]
    pub input: TaskInput,
    #[sqlx(json)]
    pub options: TaskOptions,
    pub output: Option<Value>,
    #[sqlx(json)]
    pub log: Vec<Value>,
    pub creator: Option<String>,
    pub related_object: Option<String>,
    pub parent_id: Option<String>,
    pub root_id: Option<String>,
    /// Zero-based position in its chain; `None` outside a chain
    pub chain_position: Option<i32>,
    /// Whether positional args are independent of the predecessor's output
    pub immutable: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    pub fn is_chain_head(&self) -> bool {
        self.parent_id.is_none() && self.root_id.as_deref() == Some(self.id.as_str())
    }
}

/// New task record for creation (without timestamps)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTaskRecord {
    pub id: String,
    pub task_type: String,
    pub status: TaskStatus,
    pub input: TaskInput,
    pub options: TaskOptions,
    pub creator: Option<String>,
    pub related_object: Option<String>,
    pub parent_id: Option<String>,
    pub root_id: Option<String>,
    pub chain_position: Option<i32>,
    pub immutable: Option<bool>,
}

impl NewTaskRecord {
    /// A pending, unchained record
    pub fn new(id: impl Into<String>, task_type: impl Into<String>, input: TaskInput) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            status: TaskStatus::Pending,
            input,
            options: TaskOptions::default(),
            creator: None,
            related_object: None,
            parent_id: None,
            root_id: None,
            chain_position: None,
            immutable: None,
        }
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_creator(mut self, creator: Option<String>) -> Self {
        self.creator = creator;
        self
    }

    pub fn with_related_object(mut self, related_object: Option<String>) -> Self {
        self.related_object = related_object;
        self
    }

    /// Attach chain linkage; the linkage is mirrored into the options snapshot
    pub fn with_chain_link(
        mut self,
        parent_id: Option<String>,
        root_id: String,
        position: i32,
        immutable: Option<bool>,
    ) -> Self {
        self.options.parent_id = parent_id.clone();
        self.options.root_id = Some(root_id.clone());
        self.parent_id = parent_id;
        self.root_id = Some(root_id);
        self.chain_position = Some(position);
        self.immutable = immutable;
        self
    }

    /// The row this record becomes when inserted at `now`
    pub fn into_record(self, now: DateTime<Utc>) -> TaskRecord {
        TaskRecord {
            id: self.id,
            task_type: self.task_type,
            status: self.status,
            input: self.input,
            options: self.options,
            output: None,
            log: Vec::new(),
            creator: self.creator,
            related_object: self.related_object,
            parent_id: self.parent_id,
            root_id: self.root_id,
            chain_position: self.chain_position,
            immutable: self.immutable,
            created_at: now,
            updated_at: now,
        }
    }
}
