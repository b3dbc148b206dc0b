//! AWS CloudFormation binding of the control-plane trait.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::types;
use chrono::Utc;

use stacktail_core::event::NESTED_STACK_TYPE;
use stacktail_core::{ControlPlane, Error, Result, StackEvent, StackRef, StackStatus};

use crate::Config;

/// CloudFormation-backed control plane.
///
/// One client serves every tracked stack; nested stacks always live in the
/// root's region, so a single region resolution at startup is enough.
pub struct CfnControlPlane {
    client: Client,
}

impl CfnControlPlane {
    /// Builds the client from the shared AWS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when no region is resolvable from the flag, the
    /// ARN, or the SDK's default provider chain. This is the fatal startup
    /// check: the follower never enters its loop without a usable client.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = config.explicit_region() {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;
        if sdk_config.region().is_none() {
            anyhow::bail!(
                "no AWS region resolvable; pass --region, use an ARN, or set AWS_REGION"
            );
        }
        Ok(Self {
            client: Client::new(&sdk_config),
        })
    }
}

#[async_trait]
impl ControlPlane for CfnControlPlane {
    async fn stack_status(&self, stack: &StackRef) -> Result<StackStatus> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(stack.as_str())
            .send()
            .await
            .map_err(|err| query_error(stack, err))?;
        output
            .stacks()
            .first()
            .and_then(types::Stack::stack_status)
            .map(|status| StackStatus::from(status.as_str()))
            .ok_or_else(|| Error::query(stack.short_name(), "stack absent from DescribeStacks response"))
    }

    async fn nested_children(&self, stack: &StackRef) -> Result<Vec<StackRef>> {
        let output = self
            .client
            .describe_stack_resources()
            .stack_name(stack.as_str())
            .send()
            .await
            .map_err(|err| query_error(stack, err))?;

        Ok(output
            .stack_resources()
            .iter()
            .filter(|resource| resource.resource_type() == Some(NESTED_STACK_TYPE))
            .filter_map(|resource| resource.physical_resource_id())
            .filter(|id| !id.is_empty())
            .map(StackRef::from)
            .collect())
    }

    async fn stack_events(&self, stack: &StackRef) -> Result<Vec<StackEvent>> {
        // First page only: a follower needs the recent tail each cycle,
        // and anything older was seen on an earlier cycle.
        let output = self
            .client
            .describe_stack_events()
            .stack_name(stack.as_str())
            .send()
            .await
            .map_err(|err| query_error(stack, err))?;

        Ok(output.stack_events().iter().map(convert_event).collect())
    }
}

fn query_error(stack: &StackRef, err: impl std::error::Error + Send + Sync + 'static) -> Error {
    // anyhow's alternate format renders the full cause chain; the bare
    // SdkError Display is just "service error".
    Error::query(
        stack.short_name(),
        format!("{:#}", anyhow::Error::new(err)),
    )
}

fn convert_event(event: &types::StackEvent) -> StackEvent {
    StackEvent {
        event_id: event.event_id().unwrap_or_default().to_string(),
        timestamp: event
            .timestamp()
            .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
            .unwrap_or_else(Utc::now),
        status: event
            .resource_status()
            .map_or_else(StackStatus::unknown, |status| {
                StackStatus::from(status.as_str())
            }),
        reason: event.resource_status_reason().map(ToString::to_string),
        logical_id: event.logical_resource_id().unwrap_or_default().to_string(),
        resource_type: event.resource_type().unwrap_or_default().to_string(),
        physical_id: event.physical_resource_id().map(ToString::to_string),
    }
}
