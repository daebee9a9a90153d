//! The emulation runtime the experiment drivers talk to.

pub mod command;
pub mod netns;
pub mod recording;

use anyhow::Result;
use netlab_topo::TopologySpec;

/// A network-emulation runtime: it accepts a topology description and
/// exposes per-node command execution.
///
/// The drivers only ever talk to this trait, which keeps the topology and
/// route computation independent of how (or whether) commands actually run.
#[allow(async_fn_in_trait)]
pub trait Runtime {
    type Task: Task;

    /// Instantiates the given topology.
    async fn create_topology(&mut self, topo: &TopologySpec) -> Result<()>;

    /// Starts the emulation. Must be called after [`Runtime::create_topology`].
    async fn start(&mut self) -> Result<()>;

    /// Runs a command on a node, waits for it and returns its stdout.
    async fn exec_on(&mut self, node: &str, command: &str) -> Result<String>;

    /// Launches a command on a node in the background. The returned handle
    /// must be awaited or explicitly detached.
    async fn spawn_on(&mut self, node: &str, command: &str) -> Result<Self::Task>;

    /// Opens the interactive session, blocking until the operator exits it.
    async fn interactive(&mut self) -> Result<()>;

    /// Tears the emulation down. Best effort: still-running background
    /// commands are not tracked past this point.
    async fn stop(&mut self) -> Result<()>;
}

/// Handle to a background command issued through [`Runtime::spawn_on`].
#[allow(async_fn_in_trait)]
pub trait Task {
    /// Gives up on observing the command's completion, leaving it running.
    fn detach(self);

    /// Waits for the command to finish, failing on a non-zero exit status.
    async fn wait(self) -> Result<()>;
}
