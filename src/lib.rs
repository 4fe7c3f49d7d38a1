//! Fleet Dispatch: Task Fan-Out and Completion Reconciliation
//!
//! Issues one command to many remote agents through a command-and-control plane
//! and follows every dispatch to completion. Connected agents answer in the
//! dispatch reply; store-and-forward agents are polled on a bounded schedule and
//! their completions are reconciled against the tasks that were issued.

pub mod agent;
pub mod config;
pub mod control_plane;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod logging;
pub mod notify;
pub mod pending;
pub mod poller;
pub mod reconcile;
pub mod report;
pub mod tooling;
pub mod types;
