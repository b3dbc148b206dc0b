//! Output sinks: the append-only log file and the live terminal view.
//!
//! Every emitted line goes to both destinations. The log file holds the
//! plain text only; colour is applied on the terminal side so the file
//! stays safe to `tail` and to grep.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use owo_colors::OwoColorize;

use crate::error::Result;
use crate::event::StackEvent;

/// Where emitted lines and lifecycle notices go.
///
/// Implementations must tolerate being called once per event at polling
/// frequency; the follower flushes through [`EventSink::flush`] before it
/// exits so no emitted line is lost on the normal termination path.
pub trait EventSink {
    /// Emits one formatted event line.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink can no longer accept output.
    fn event(&mut self, stack_name: &str, event: &StackEvent) -> Result<()>;

    /// Emits a lifecycle notice (discovery, final sweep, exit).
    ///
    /// # Errors
    ///
    /// Returns an error if the sink can no longer accept output.
    fn notice(&mut self, message: &str) -> Result<()>;

    /// Forces buffered output to its destination.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn flush(&mut self) -> Result<()>;
}

/// Renders the canonical plain-text line for one event.
///
/// Shape: `timestamp  stack  STATUS  logical-id (resource type)  reason`,
/// with `-` standing in when the control plane supplied no reason.
#[must_use]
pub fn format_event_line(stack_name: &str, event: &StackEvent) -> String {
    format!(
        "{}  {}  {}  {} ({})  {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        stack_name,
        event.status,
        event.logical_id,
        event.resource_type,
        event.reason.as_deref().unwrap_or("-"),
    )
}

/// Production sink: append-only log file plus coloured stdout.
///
/// The file handle is opened once and held for the sink's lifetime. Every
/// line is flushed as it is written, and [`Drop`] flushes again, so the
/// durable log trails the live view by at most one in-flight line on any
/// exit path.
pub struct TeeSink {
    log: BufWriter<File>,
}

impl TeeSink {
    /// Opens (creating parent directories as needed) the log file in
    /// append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            log: BufWriter::new(file),
        })
    }

    fn write_line(&mut self, plain: &str, display: &str) -> Result<()> {
        writeln!(self.log, "{plain}")?;
        self.log.flush()?;
        println!("{display}");
        Ok(())
    }
}

impl EventSink for TeeSink {
    fn event(&mut self, stack_name: &str, event: &StackEvent) -> Result<()> {
        let plain = format_event_line(stack_name, event);
        if event.status.is_failure() {
            let highlighted = format!(
                "{}  {}  {}  {} ({})  {}",
                event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                stack_name,
                event.status.red(),
                event.logical_id,
                event.resource_type,
                event.reason.as_deref().unwrap_or("-"),
            );
            self.write_line(&plain, &highlighted)
        } else {
            self.write_line(&plain, &plain)
        }
    }

    fn notice(&mut self, message: &str) -> Result<()> {
        let line = format!(">> {message}");
        let display = format!(">> {message}").bold().to_string();
        self.write_line(&line, &display)
    }

    fn flush(&mut self) -> Result<()> {
        self.log.flush()?;
        Ok(())
    }
}

impl Drop for TeeSink {
    fn drop(&mut self) {
        let _ = self.log.flush();
    }
}
