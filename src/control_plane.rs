//! Control Plane
//!
//! The engine talks to the command-and-control server only through the
//! [`ControlPlane`] trait. The wire format belongs to the implementation: an
//! HTTP/JSON gateway client for real runs and a scripted in-memory plane for tests.

mod contract;
mod http;
mod memory;

pub use contract::{ControlPlane, DispatchReply, TaskState, WorkItem};
pub use http::HttpControlPlane;
pub use memory::InMemoryControlPlane;
