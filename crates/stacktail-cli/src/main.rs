//! stacktail - follow CloudFormation stack events across nested stacks.
//!
//! The main entry point for the `stacktail` binary.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;

use stacktail_cli::client::CfnControlPlane;
use stacktail_cli::{Cli, Config, tailview};
use stacktail_core::{Follower, FollowerConfig, TeeSink, init_logging};

fn main() -> ExitCode {
    init_logging();

    // Help and version exit 0; every argument problem exits 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    match run(&cli.config()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        // Startup is fatal up to here: no client, no loop, no log file.
        let client = CfnControlPlane::connect(config).await?;
        let sink = TeeSink::create(&config.log_file)?;

        if config.split_view && tailview::tmux_usable() {
            let session = tailview::session_name(config.root.short_name());
            tailview::spawn(&session, &config.log_file, config.tail_lines);
        }

        tracing::info!(
            stack = %config.root.short_name(),
            log_file = %config.log_file.display(),
            "following stack events"
        );

        let mut follower_config = FollowerConfig::new(config.root.clone());
        follower_config.poll_interval = config.poll_interval;

        let mut follower = Follower::new(client, sink, follower_config);
        follower.run().await?;
        Ok(())
    })
}
