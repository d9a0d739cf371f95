//! Producer-side task descriptions

use crate::models::{TaskInput, TaskOptions};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One task invocation: job name, arguments and caller-chosen options.
///
/// The id is assigned at construction so it is known before publishing.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub id: String,
    pub task_type: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub options: TaskOptions,
    /// Inside a chain: whether args ignore the predecessor's output
    pub immutable: Option<bool>,
    pub creator: Option<String>,
    pub related_object: Option<String>,
}

impl Signature {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_type: task_type.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            options: TaskOptions::default(),
            immutable: None,
            creator: None,
            related_object: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.options.queue = Some(queue.into());
        self
    }

    pub fn immutable(mut self, immutable: bool) -> Self {
        self.immutable = Some(immutable);
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_related_object(mut self, related_object: impl Into<String>) -> Self {
        self.related_object = Some(related_object.into());
        self
    }

    pub fn input(&self) -> TaskInput {
        TaskInput::new(self.args.clone(), self.kwargs.clone())
    }

    /// Chain `next` after this task
    pub fn then(self, next: Signature) -> Chain {
        Chain::from(self).then(next)
    }
}

/// Tasks run one after another. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    head: Signature,
    rest: Vec<Signature>,
}

impl Chain {
    pub fn then(mut self, next: Signature) -> Self {
        self.rest.push(next);
        self
    }

    pub fn head(&self) -> &Signature {
        &self.head
    }

    /// Tasks after the head, in run order
    pub fn rest(&self) -> &[Signature] {
        &self.rest
    }

    pub fn last(&self) -> &Signature {
        self.rest.last().unwrap_or(&self.head)
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    /// A single task is not a chain on the wire
    pub fn is_chained(&self) -> bool {
        !self.rest.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        std::iter::once(&self.head)
            .chain(&self.rest)
            .map(|s| s.id.clone())
            .collect()
    }
}

impl From<Signature> for Chain {
    fn from(head: Signature) -> Self {
        Self {
            head,
            rest: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signatures_get_distinct_ids() {
        assert_ne!(Signature::new("jobs.a").id, Signature::new("jobs.a").id);
    }

    #[test]
    fn test_then_keeps_run_order() {
        let chain = Signature::new("jobs.a")
            .with_id("a")
            .then(Signature::new("jobs.b").with_id("b"))
            .then(Signature::new("jobs.c").with_id("c").immutable(true));

        assert_eq!(chain.len(), 3);
        assert!(chain.is_chained());
        assert_eq!(chain.ids(), vec!["a", "b", "c"]);
        assert_eq!(chain.last().immutable, Some(true));
    }

    #[test]
    fn test_single_signature_is_not_chained() {
        let chain = Chain::from(
            Signature::new("jobs.a")
                .with_args(vec![json!(1)])
                .with_kwarg("format", json!("csv")),
        );
        assert!(!chain.is_chained());
        assert_eq!(chain.last(), chain.head());
        assert_eq!(chain.head().input().kwargs.get("format"), Some(&json!("csv")));
    }
}
