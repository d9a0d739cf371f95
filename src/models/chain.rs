//! # Chain Aggregation
//!
//! Reduces the statuses of a chain's rows to one status for the whole chain.
//! Rules, first match wins:
//!
//! 1. any `FAILURE` → `FAILURE`
//! 2. any `REVOKED` → `REVOKED`
//! 3. every element `SUCCESS` → `SUCCESS`
//! 4. every element `PENDING` → `PENDING`
//! 5. otherwise `STARTED`: some work has happened, not all of it
//!
//! An empty chain is `PENDING`.

use super::task::TaskRecord;
use crate::constants::TaskStatus;
use serde_json::Value;

pub fn aggregate_chain_status(statuses: &[TaskStatus]) -> TaskStatus {
    if statuses.iter().any(|s| *s == TaskStatus::Failure) {
        return TaskStatus::Failure;
    }
    if statuses.iter().any(|s| *s == TaskStatus::Revoked) {
        return TaskStatus::Revoked;
    }
    if !statuses.is_empty() && statuses.iter().all(|s| *s == TaskStatus::Success) {
        return TaskStatus::Success;
    }
    if statuses.iter().all(|s| *s == TaskStatus::Pending) {
        return TaskStatus::Pending;
    }
    TaskStatus::Started
}

/// The chain's result: the last element's output, once the whole chain succeeded
pub fn aggregate_chain_output(chain: &[TaskRecord]) -> Option<Value> {
    let statuses: Vec<TaskStatus> = chain.iter().map(|r| r.status.clone()).collect();
    if aggregate_chain_status(&statuses) != TaskStatus::Success {
        return None;
    }
    chain.last().and_then(|r| r.output.clone())
}
