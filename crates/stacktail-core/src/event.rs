//! Stack references and status-change events.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::status::StackStatus;

/// The resource type CloudFormation assigns to a nested stack resource.
pub const NESTED_STACK_TYPE: &str = "AWS::CloudFormation::Stack";

/// An opaque reference to one deployed stack.
///
/// Holds either a short stack name or a fully-qualified ARN
/// (`arn:aws:cloudformation:<region>:<account>:stack/<name>/<uuid>`).
/// Equality and hashing are over the raw identifier, so nested stacks
/// discovered by physical-id ARN deduplicate on immutable identity even if
/// a stack is later renamed in the console.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackRef(String);

impl StackRef {
    /// Creates a reference from a short name or ARN.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw identifier as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this reference is a fully-qualified ARN.
    #[must_use]
    pub fn is_arn(&self) -> bool {
        self.0.starts_with("arn:")
    }

    /// The human-readable short name.
    ///
    /// For an ARN this is the `<name>` segment of `stack/<name>/<uuid>`;
    /// otherwise the raw identifier.
    #[must_use]
    pub fn short_name(&self) -> &str {
        if self.is_arn() {
            self.0.split('/').nth(1).unwrap_or(&self.0)
        } else {
            &self.0
        }
    }

    /// The region embedded in an ARN, if any.
    #[must_use]
    pub fn embedded_region(&self) -> Option<&str> {
        if !self.is_arn() {
            return None;
        }
        self.0.split(':').nth(3).filter(|region| !region.is_empty())
    }
}

impl fmt::Display for StackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StackRef {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for StackRef {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

/// One immutable status-change record for one resource within one stack.
///
/// Event identifiers are globally unique for the lifetime of a stack and
/// never reused; once an event has been observed it never needs
/// reprocessing, which is what makes the follower's seen-set sufficient
/// for exactly-once emission.
#[derive(Debug, Clone)]
pub struct StackEvent {
    /// Unique event identifier, the deduplication key.
    pub event_id: String,
    /// When the control plane recorded the transition.
    pub timestamp: DateTime<Utc>,
    /// The resource status after the transition.
    pub status: StackStatus,
    /// Human-readable status reason, when the control plane supplies one.
    pub reason: Option<String>,
    /// Logical name of the resource within its template.
    pub logical_id: String,
    /// Resource type, e.g. `AWS::S3::Bucket`.
    pub resource_type: String,
    /// Physical identifier of the provisioned resource, once known.
    pub physical_id: Option<String>,
}

impl StackEvent {
    /// Returns the nested-stack reference this event resolves to, if it
    /// represents a nested-stack resource with a usable physical id.
    #[must_use]
    pub fn nested_stack_ref(&self) -> Option<StackRef> {
        if self.resource_type != NESTED_STACK_TYPE {
            return None;
        }
        self.physical_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(StackRef::from)
    }
}
