//! # stacktail-cli
//!
//! Command-line interface for the stack-event follower.
//!
//! ```text
//! stacktail my-stack --profile prod --poll 10
//! ```
//!
//! The positional argument is a stack name or a fully-qualified ARN; an
//! ARN's embedded region is used unless `--region` overrides it. Output
//! goes to the terminal and to an append-only log file under `logs/` by
//! default, and a companion `tail -f` view is spawned in a sibling tmux
//! session when one is usable.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod client;
pub mod tailview;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use stacktail_core::StackRef;

/// Follow CloudFormation stack events across nested stacks.
#[derive(Debug, Parser)]
#[command(name = "stacktail")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Stack to follow: a short name or a fully-qualified stack ARN.
    pub stack: String,

    /// AWS credential profile passed through to every query.
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// AWS region; overrides the region embedded in an ARN reference.
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Seconds between polling cycles.
    #[arg(long, default_value = "5")]
    pub poll: u64,

    /// Log file path. Defaults to `logs/<stack>-<timestamp>.log`.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Lines the companion tail view shows initially.
    #[arg(long, default_value = "200")]
    pub tail_lines: u32,

    /// Run directly in this terminal without the tmux tail view.
    #[arg(long)]
    pub no_tmux: bool,
}

impl Cli {
    /// Resolves the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        let root = StackRef::new(self.stack.clone());
        let log_file = self
            .log_file
            .clone()
            .unwrap_or_else(|| default_log_path(&root));
        Config {
            root,
            profile: self.profile.clone(),
            region: self.region.clone(),
            poll_interval: Duration::from_secs(self.poll),
            log_file,
            tail_lines: self.tail_lines,
            split_view: !self.no_tmux,
        }
    }
}

/// Effective configuration after defaulting.
#[derive(Debug, Clone)]
pub struct Config {
    /// The root stack to follow.
    pub root: StackRef,
    /// AWS credential profile, if any.
    pub profile: Option<String>,
    /// Explicit region override, if any.
    pub region: Option<String>,
    /// Sleep between polling cycles.
    pub poll_interval: Duration,
    /// Destination of the durable log.
    pub log_file: PathBuf,
    /// Lines the tail view shows initially.
    pub tail_lines: u32,
    /// Whether the tmux tail view may be spawned.
    pub split_view: bool,
}

impl Config {
    /// The region to configure the client with, before falling back to the
    /// SDK's default provider chain: an explicit region (`--region` flag or
    /// `AWS_REGION`) wins over the region embedded in an ARN reference.
    #[must_use]
    pub fn explicit_region(&self) -> Option<String> {
        self.region
            .clone()
            .or_else(|| self.root.embedded_region().map(ToString::to_string))
    }
}

fn default_log_path(root: &StackRef) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from("logs").join(format!("{}-{stamp}.log", root.short_name()))
}
