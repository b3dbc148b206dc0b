//! The stack-event follower loop.
//!
//! A single cooperative task polls one root stack and every stack nested
//! beneath it. Each cycle has two phases:
//!
//! 1. **Discovery** (at most once per discovery interval): ask every known
//!    stack for child resources of the nested-stack type and start tracking
//!    any reference not seen before.
//! 2. **Event emission** (every cycle): fetch each known stack's event page,
//!    reverse it into chronological order, and emit every event whose
//!    identifier has not been emitted before. Events that name a nested
//!    stack start tracking it immediately, without waiting for the next
//!    discovery pass.
//!
//! After each cycle the root's status decides termination: the first
//! terminal observation triggers exactly one more full cycle (the final
//! sweep, closing the race between the last event fetch and the status
//! query); the second stops the loop. Every control-plane failure short of
//! that is a warning, never an abort.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::event::{StackEvent, StackRef};
use crate::sink::EventSink;
use crate::status::StackStatus;

/// The control-plane query surface the follower consumes.
///
/// The AWS binding lives in the CLI crate; tests drive the loop with a
/// scripted fake.
#[async_trait]
pub trait ControlPlane {
    /// Current status of the given stack.
    async fn stack_status(&self, stack: &StackRef) -> Result<StackStatus>;

    /// References to the stack's nested-stack children.
    async fn nested_children(&self, stack: &StackRef) -> Result<Vec<StackRef>>;

    /// The stack's event page, newest-first as the control plane orders it.
    async fn stack_events(&self, stack: &StackRef) -> Result<Vec<StackEvent>>;
}

/// Follower configuration.
#[derive(Debug, Clone)]
pub struct FollowerConfig {
    /// The root stack to follow.
    pub root: StackRef,
    /// Sleep between cycles.
    pub poll_interval: Duration,
    /// Minimum time between periodic discovery passes. Independent of, and
    /// typically slower than, the poll interval.
    pub discovery_interval: Duration,
}

impl FollowerConfig {
    /// Default sleep between cycles.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
    /// Default minimum time between discovery passes.
    pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(15);

    /// Creates a configuration with the default intervals.
    #[must_use]
    pub fn new(root: StackRef) -> Self {
        Self {
            root,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            discovery_interval: Self::DEFAULT_DISCOVERY_INTERVAL,
        }
    }
}

/// Polls a root stack and its transitive nested stacks, emitting every new
/// status-change event exactly once, in chronological order per page.
///
/// All loop state (tracked stacks, seen event ids, termination flag) is
/// owned here and mutated only by the loop body.
pub struct Follower<C, S> {
    client: C,
    sink: S,
    config: FollowerConfig,
    known: Vec<StackRef>,
    seen: HashSet<String>,
    last_discovery: Option<Instant>,
    terminal_seen: bool,
}

impl<C: ControlPlane, S: EventSink> Follower<C, S> {
    /// Creates a follower tracking the configured root stack.
    pub fn new(client: C, sink: S, config: FollowerConfig) -> Self {
        let root = config.root.clone();
        Self {
            client,
            sink,
            config,
            known: vec![root],
            seen: HashSet::new(),
            last_discovery: None,
            terminal_seen: false,
        }
    }

    /// Runs until the root stack has been observed terminal on two
    /// consecutive cycles.
    ///
    /// The cycle in between is the final sweep: it catches events that
    /// landed after the previous event fetch but before the stack settled.
    ///
    /// # Errors
    ///
    /// Returns an error only if the sink fails; control-plane failures are
    /// logged and retried on the next cycle.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.run_cycle().await?;

            let root = self.config.root.clone();
            let status = match self.client.stack_status(&root).await {
                Ok(status) => status,
                Err(err) => {
                    warn!(stack = %root.short_name(), error = %err, "root status query failed");
                    StackStatus::unknown()
                }
            };

            if status.is_terminal() {
                if self.terminal_seen {
                    self.sink.notice(&format!(
                        "stack {} is terminal ({status}); exiting",
                        root.short_name()
                    ))?;
                    self.sink.flush()?;
                    return Ok(());
                }
                self.terminal_seen = true;
                self.sink.notice(&format!(
                    "stack {} reached terminal status {status}; running final sweep",
                    root.short_name()
                ))?;
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Runs one full cycle: a discovery pass when one is due, then an event
    /// sweep over every tracked stack.
    ///
    /// # Errors
    ///
    /// Returns an error only if the sink fails.
    pub async fn run_cycle(&mut self) -> Result<()> {
        if self.discovery_due() {
            self.last_discovery = Some(Instant::now());
            self.discover().await?;
        }
        self.sweep_events().await
    }

    /// The stacks currently tracked, in discovery order.
    #[must_use]
    pub fn known_stacks(&self) -> &[StackRef] {
        &self.known
    }

    /// Number of distinct events emitted so far.
    #[must_use]
    pub fn emitted_events(&self) -> usize {
        self.seen.len()
    }

    fn discovery_due(&self) -> bool {
        match self.last_discovery {
            None => true,
            Some(last) => last.elapsed() >= self.config.discovery_interval,
        }
    }

    /// Asks every tracked stack for nested-stack children. A failing stack
    /// contributes no children this cycle and stays tracked.
    async fn discover(&mut self) -> Result<()> {
        let mut index = 0;
        while index < self.known.len() {
            let stack = self.known[index].clone();
            match self.client.nested_children(&stack).await {
                Ok(children) => {
                    for child in children {
                        self.track(child)?;
                    }
                }
                Err(err) => {
                    warn!(
                        stack = %stack.short_name(),
                        error = %err,
                        "nested-stack discovery failed; treating as no children this cycle"
                    );
                }
            }
            index += 1;
        }
        Ok(())
    }

    /// Fetches each tracked stack's event page and emits unseen events in
    /// chronological order. Iterates by index so stacks discovered from an
    /// event are swept within the same cycle.
    async fn sweep_events(&mut self) -> Result<()> {
        let mut index = 0;
        while index < self.known.len() {
            let stack = self.known[index].clone();
            match self.client.stack_events(&stack).await {
                Ok(page) => {
                    // The control plane orders newest-first; a human reading
                    // the log expects causal top-to-bottom order.
                    for event in page.iter().rev() {
                        if self.seen.contains(&event.event_id) {
                            continue;
                        }
                        self.seen.insert(event.event_id.clone());
                        self.sink.event(stack.short_name(), event)?;
                        if let Some(nested) = event.nested_stack_ref() {
                            self.track(nested)?;
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        stack = %stack.short_name(),
                        error = %err,
                        "event query failed; treating as no events this cycle"
                    );
                }
            }
            index += 1;
        }
        Ok(())
    }

    /// Starts tracking a stack if it is not tracked already. Tracking is
    /// monotonic: references are never removed.
    fn track(&mut self, candidate: StackRef) -> Result<()> {
        if self.known.contains(&candidate) {
            return Ok(());
        }
        self.sink
            .notice(&format!("discovered nested stack {}", candidate.short_name()))?;
        self.known.push(candidate);
        Ok(())
    }
}
