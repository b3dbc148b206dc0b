//! Scenario tests driving the follower cycle-by-cycle against a scripted
//! control plane and a recording sink.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use stacktail_core::event::NESTED_STACK_TYPE;
use stacktail_core::{
    ControlPlane, Error, EventSink, Follower, FollowerConfig, Result, StackEvent, StackRef,
    StackStatus, format_event_line,
};

/// Scripted responses carry errors as strings so queues stay cloneable;
/// they are turned into real errors at query time.
type Scripted<T> = std::result::Result<T, String>;

/// A control plane that replays scripted responses.
///
/// Each query pops the front of its queue; the last scripted response
/// repeats forever, which mirrors a control plane whose event history only
/// grows. Unscripted stacks report no children and no events.
#[derive(Clone, Default)]
struct FakeControlPlane {
    statuses: Arc<Mutex<VecDeque<Scripted<StackStatus>>>>,
    children: Arc<Mutex<HashMap<StackRef, VecDeque<Scripted<Vec<StackRef>>>>>>,
    events: Arc<Mutex<HashMap<StackRef, VecDeque<Scripted<Vec<StackEvent>>>>>>,
    event_queries: Arc<Mutex<Vec<String>>>,
}

fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl FakeControlPlane {
    fn script_status(&self, response: Scripted<StackStatus>) {
        self.statuses.lock().unwrap().push_back(response);
    }

    fn script_children(&self, stack: &StackRef, response: Scripted<Vec<StackRef>>) {
        self.children
            .lock()
            .unwrap()
            .entry(stack.clone())
            .or_default()
            .push_back(response);
    }

    fn script_events(&self, stack: &StackRef, response: Scripted<Vec<StackEvent>>) {
        self.events
            .lock()
            .unwrap()
            .entry(stack.clone())
            .or_default()
            .push_back(response);
    }

    fn event_query_count(&self) -> usize {
        self.event_queries.lock().unwrap().len()
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn stack_status(&self, stack: &StackRef) -> Result<StackStatus> {
        let response = next(&mut self.statuses.lock().unwrap())
            .unwrap_or_else(|| Ok(StackStatus::unknown()));
        response.map_err(|message| Error::query(stack.short_name(), message))
    }

    async fn nested_children(&self, stack: &StackRef) -> Result<Vec<StackRef>> {
        let response = self
            .children
            .lock()
            .unwrap()
            .get_mut(stack)
            .and_then(next)
            .unwrap_or_else(|| Ok(Vec::new()));
        response.map_err(|message| Error::query(stack.short_name(), message))
    }

    async fn stack_events(&self, stack: &StackRef) -> Result<Vec<StackEvent>> {
        self.event_queries
            .lock()
            .unwrap()
            .push(stack.short_name().to_string());
        let response = self
            .events
            .lock()
            .unwrap()
            .get_mut(stack)
            .and_then(next)
            .unwrap_or_else(|| Ok(Vec::new()));
        response.map_err(|message| Error::query(stack.short_name(), message))
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    lines: Arc<Mutex<Vec<String>>>,
    notices: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn event(&mut self, stack_name: &str, event: &StackEvent) -> Result<()> {
        self.lines
            .lock()
            .unwrap()
            .push(format_event_line(stack_name, event));
        Ok(())
    }

    fn notice(&mut self, message: &str) -> Result<()> {
        self.notices.lock().unwrap().push(message.to_string());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

fn event(id: &str, offset_secs: i64, logical_id: &str) -> StackEvent {
    StackEvent {
        event_id: id.to_string(),
        timestamp: Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap(),
        status: StackStatus::CreateInProgress,
        reason: None,
        logical_id: logical_id.to_string(),
        resource_type: "AWS::S3::Bucket".to_string(),
        physical_id: None,
    }
}

fn nested_event(id: &str, offset_secs: i64, physical_id: &str) -> StackEvent {
    StackEvent {
        event_id: id.to_string(),
        timestamp: Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap(),
        status: StackStatus::CreateInProgress,
        reason: None,
        logical_id: "Nested".to_string(),
        resource_type: NESTED_STACK_TYPE.to_string(),
        physical_id: Some(physical_id.to_string()),
    }
}

fn test_config(root: &StackRef) -> FollowerConfig {
    FollowerConfig {
        root: root.clone(),
        poll_interval: Duration::from_millis(2),
        discovery_interval: Duration::from_secs(15),
    }
}

#[tokio::test]
async fn same_page_on_consecutive_polls_emits_once() {
    let root = StackRef::new("stack-a");
    let plane = FakeControlPlane::default();
    // One scripted page; the repeat-last rule feeds the identical response
    // to every subsequent poll.
    plane.script_events(
        &root,
        Ok(vec![event("e2", 10, "Second"), event("e1", 0, "First")]),
    );

    let sink = RecordingSink::default();
    let mut follower = Follower::new(plane, sink.clone(), test_config(&root));
    follower.run_cycle().await.unwrap();
    follower.run_cycle().await.unwrap();

    assert_eq!(sink.lines().len(), 2);
    assert_eq!(follower.emitted_events(), 2);
}

#[tokio::test]
async fn newest_first_page_is_emitted_oldest_first() {
    let root = StackRef::new("stack-a");
    let plane = FakeControlPlane::default();
    plane.script_events(
        &root,
        Ok(vec![
            event("e3", 20, "Third"),
            event("e2", 10, "Second"),
            event("e1", 0, "First"),
        ]),
    );

    let sink = RecordingSink::default();
    let mut follower = Follower::new(plane, sink.clone(), test_config(&root));
    follower.run_cycle().await.unwrap();

    let lines = sink.lines();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("First"));
    assert!(lines[1].contains("Second"));
    assert!(lines[2].contains("Third"));
}

#[tokio::test]
async fn failing_stack_neither_blocks_others_nor_gets_dropped() {
    let root = StackRef::new("stack-a");
    let nested = StackRef::new("stack-b");
    let plane = FakeControlPlane::default();
    plane.script_children(&root, Ok(vec![nested.clone()]));
    plane.script_events(&root, Err("access denied".to_string()));
    plane.script_events(&root, Ok(vec![event("a1", 0, "RootResource")]));
    plane.script_events(&nested, Ok(vec![event("b1", 5, "NestedResource")]));

    let sink = RecordingSink::default();
    let mut follower = Follower::new(plane, sink.clone(), test_config(&root));

    // Cycle 1: the root's event query fails but the nested stack still emits.
    follower.run_cycle().await.unwrap();
    assert_eq!(sink.lines().len(), 1);
    assert!(sink.lines()[0].contains("NestedResource"));
    assert_eq!(follower.known_stacks().len(), 2);

    // Cycle 2: the root recovers; nothing was forgotten in between.
    follower.run_cycle().await.unwrap();
    assert_eq!(sink.lines().len(), 2);
    assert_eq!(follower.known_stacks().len(), 2);
}

#[tokio::test]
async fn discovery_failure_keeps_reference_tracked() {
    let root = StackRef::new("stack-a");
    let nested = StackRef::new("stack-b");
    let plane = FakeControlPlane::default();
    plane.script_children(&root, Ok(vec![nested.clone()]));
    plane.script_children(&nested, Err("stack was deleted".to_string()));

    let sink = RecordingSink::default();
    let config = FollowerConfig {
        discovery_interval: Duration::ZERO,
        ..test_config(&root)
    };
    let mut follower = Follower::new(plane, sink.clone(), config);

    follower.run_cycle().await.unwrap();
    follower.run_cycle().await.unwrap();
    follower.run_cycle().await.unwrap();

    // Known set grows monotonically and never shrinks under failures.
    assert_eq!(follower.known_stacks(), &[root, nested]);
}

#[tokio::test]
async fn nested_stack_from_event_is_swept_same_cycle() {
    let root = StackRef::new("stack-a");
    let nested = StackRef::new(
        "arn:aws:cloudformation:us-east-1:123456789012:stack/stack-c/abcd-1234",
    );
    let plane = FakeControlPlane::default();
    plane.script_events(
        &root,
        Ok(vec![nested_event("a1", 0, nested.as_str())]),
    );
    plane.script_events(&nested, Ok(vec![event("c1", 5, "ChildResource")]));

    let sink = RecordingSink::default();
    let mut follower = Follower::new(plane, sink.clone(), test_config(&root));
    follower.run_cycle().await.unwrap();

    // The event-driven path tracks and sweeps the nested stack without
    // waiting for a periodic discovery pass.
    assert_eq!(follower.known_stacks().len(), 2);
    assert_eq!(
        sink.notices(),
        vec!["discovered nested stack stack-c".to_string()]
    );
    assert_eq!(sink.lines().len(), 2);
    assert!(sink.lines()[1].contains("ChildResource"));
    assert!(sink.lines()[1].contains("stack-c"));
}

#[tokio::test]
async fn final_sweep_runs_exactly_one_more_cycle() {
    let root = StackRef::new("stack-a");
    let plane = FakeControlPlane::default();
    plane.script_status(Ok(StackStatus::CreateComplete));
    plane.script_events(&root, Ok(vec![event("e1", 0, "OnlyResource")]));

    let sink = RecordingSink::default();
    let mut follower = Follower::new(plane.clone(), sink.clone(), test_config(&root));
    follower.run().await.unwrap();

    // Terminal on the first check, so: initial cycle + one final sweep.
    assert_eq!(plane.event_query_count(), 2);
    assert_eq!(sink.lines().len(), 1);
    let notices = sink.notices();
    assert_eq!(notices.len(), 2);
    assert!(notices[0].contains("final sweep"));
    assert!(notices[1].contains("exiting"));
}

#[tokio::test]
async fn status_query_failure_is_not_terminal() {
    let root = StackRef::new("stack-a");
    let plane = FakeControlPlane::default();
    plane.script_status(Err("throttled".to_string()));
    plane.script_status(Ok(StackStatus::CreateComplete));

    let sink = RecordingSink::default();
    let mut follower = Follower::new(plane.clone(), sink.clone(), test_config(&root));
    follower.run().await.unwrap();

    // Failed check, first terminal check, final sweep: three event passes.
    assert_eq!(plane.event_query_count(), 3);
}

#[tokio::test]
async fn end_to_end_create_scenario() {
    let root = StackRef::new("stack-a");
    let nested = StackRef::new(
        "arn:aws:cloudformation:us-east-1:123456789012:stack/stack-b/1a2b-3c4d",
    );
    let plane = FakeControlPlane::default();

    plane.script_children(&root, Ok(vec![nested.clone()]));

    // Cycle 1: two events for the root; the nested stack has none yet.
    plane.script_events(
        &root,
        Ok(vec![event("a2", 10, "RootSecond"), event("a1", 0, "RootFirst")]),
    );
    plane.script_events(&nested, Ok(Vec::new()));
    // Cycle 2 onward: one new root event, three nested events.
    plane.script_events(
        &root,
        Ok(vec![
            event("a3", 20, "RootThird"),
            event("a2", 10, "RootSecond"),
            event("a1", 0, "RootFirst"),
        ]),
    );
    plane.script_events(
        &nested,
        Ok(vec![
            event("b3", 18, "NestedThird"),
            event("b2", 16, "NestedSecond"),
            event("b1", 14, "NestedFirst"),
        ]),
    );

    plane.script_status(Ok(StackStatus::CreateInProgress));
    plane.script_status(Ok(StackStatus::CreateInProgress));
    plane.script_status(Ok(StackStatus::CreateComplete));

    let sink = RecordingSink::default();
    let mut follower = Follower::new(plane.clone(), sink.clone(), test_config(&root));
    follower.run().await.unwrap();

    // Six distinct events total, each exactly once, chronological per page.
    let lines = sink.lines();
    assert_eq!(lines.len(), 6);
    assert_eq!(follower.emitted_events(), 6);
    assert!(lines[0].contains("RootFirst"));
    assert!(lines[1].contains("RootSecond"));
    assert!(lines[2].contains("RootThird"));
    assert!(lines[3].contains("NestedFirst"));
    assert!(lines[4].contains("NestedSecond"));
    assert!(lines[5].contains("NestedThird"));

    let notices = sink.notices();
    assert_eq!(notices.len(), 3);
    assert_eq!(notices[0], "discovered nested stack stack-b");
    assert!(notices[1].contains("final sweep"));
    assert!(notices[2].contains("exiting"));

    assert_eq!(follower.known_stacks(), &[root, nested]);
}
