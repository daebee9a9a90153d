//! A runtime that records issued commands instead of executing them.
//!
//! Backs `--dry-run` and the experiment driver tests.

use crate::runtime::{Runtime, Task};
use anyhow::Result;
use netlab_topo::TopologySpec;
use std::fmt;

#[derive(Default)]
pub struct RecordingRuntime {
    pub topology: Option<TopologySpec>,
    pub commands: Vec<IssuedCommand>,
    /// Index into `commands` at the time `start` was called.
    pub started_at: Option<usize>,
    pub interactive_sessions: u32,
    pub stopped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCommand {
    pub node: String,
    pub command: String,
    pub background: bool,
}

impl fmt::Display for IssuedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.background { " &" } else { "" };
        write!(f, "{} $ {}{suffix}", self.node, self.command)
    }
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands_on<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a IssuedCommand> {
        self.commands.iter().filter(move |c| c.node == node)
    }
}

impl Runtime for RecordingRuntime {
    type Task = NoopTask;

    async fn create_topology(&mut self, topo: &TopologySpec) -> Result<()> {
        self.topology = Some(topo.clone());
        Ok(())
    }

    async fn start(&mut self) -> Result<()> {
        self.started_at = Some(self.commands.len());
        Ok(())
    }

    async fn exec_on(&mut self, node: &str, command: &str) -> Result<String> {
        self.commands.push(IssuedCommand {
            node: node.to_string(),
            command: command.to_string(),
            background: false,
        });
        Ok(String::new())
    }

    async fn spawn_on(&mut self, node: &str, command: &str) -> Result<NoopTask> {
        self.commands.push(IssuedCommand {
            node: node.to_string(),
            command: command.to_string(),
            background: true,
        });
        Ok(NoopTask)
    }

    async fn interactive(&mut self) -> Result<()> {
        self.interactive_sessions += 1;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.stopped = true;
        Ok(())
    }
}

pub struct NoopTask;

impl Task for NoopTask {
    fn detach(self) {}

    async fn wait(self) -> Result<()> {
        Ok(())
    }
}
