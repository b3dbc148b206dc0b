//! # stacktail-core
//!
//! Core types and the follower loop for tailing CloudFormation stack events.
//!
//! This crate owns everything that does not touch AWS directly:
//!
//! - **Status classification**: an explicit enumeration of stack and resource
//!   status literals with total terminal/failure predicates
//! - **Event model**: immutable status-change records and ARN-aware stack
//!   references
//! - **Follower**: the polling loop that discovers nested stacks, deduplicates
//!   events across cycles, and decides when to stop
//! - **Sinks**: the append-only log file plus live terminal output
//!
//! The control plane is abstracted behind [`ControlPlane`] so the loop can be
//! driven by a scripted fake in tests; the AWS binding lives in
//! `stacktail-cli`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod event;
pub mod follower;
pub mod observability;
pub mod sink;
pub mod status;

pub use error::{Error, Result};
pub use event::{StackEvent, StackRef};
pub use follower::{ControlPlane, Follower, FollowerConfig};
pub use observability::init_logging;
pub use sink::{EventSink, TeeSink, format_event_line};
pub use status::StackStatus;
