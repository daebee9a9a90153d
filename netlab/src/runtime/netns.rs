//! Linux network-namespace runtime.
//!
//! Each host and router gets a dedicated network namespace, each switch a
//! bridge in the root namespace, and each link a veth pair. Requires root
//! and the `ip`, `tc` and `sysctl` binaries.

use crate::runtime::{Runtime, Task, command};
use anyhow::{Context, Result, bail};
use netlab_topo::{NodeKind, TopologySpec};
use std::collections::HashMap;
use std::io::Write;
use std::process::Stdio;
use tokio::io::AsyncBufReadExt;
use tokio::process::Child;

pub struct NetnsRuntime {
    prefix: String,
    /// Maps node names to their namespace names.
    namespaces: HashMap<String, String>,
    bridges: Vec<String>,
}

impl NetnsRuntime {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            namespaces: HashMap::new(),
            bridges: Vec::new(),
        }
    }

    fn ns_name(&self, node: &str) -> String {
        format!("{}-{node}", self.prefix)
    }

    // Bridge names share the interface namespace, so they must stay within
    // IFNAMSIZ just like the veth names derived from node names
    fn bridge_name(&self, switch: &str) -> String {
        format!("{}-{switch}", self.prefix)
    }

    fn namespace_of(&self, node: &str) -> Result<&str> {
        match self.namespaces.get(node) {
            Some(ns) => Ok(ns),
            None => bail!("unknown node: {node}"),
        }
    }

    async fn run_in(&self, node: &str, command: &str) -> Result<command::Output> {
        let ns = self.namespace_of(node)?;
        command::run("ip", &["netns", "exec", ns, "sh", "-c", command])
            .await
            .with_context(|| format!("command on {node} failed"))
    }
}

impl Runtime for NetnsRuntime {
    type Task = NetnsTask;

    async fn create_topology(&mut self, topo: &TopologySpec) -> Result<()> {
        for node in &topo.nodes {
            match node.kind {
                NodeKind::Switch => {
                    let bridge = self.bridge_name(&node.name);
                    command::run("ip", &["link", "add", &bridge, "type", "bridge"]).await?;
                    command::run("ip", &["link", "set", &bridge, "up"]).await?;
                    self.bridges.push(bridge);
                }
                NodeKind::Host | NodeKind::Router => {
                    let ns = self.ns_name(&node.name);
                    command::run("ip", &["netns", "add", &ns]).await?;
                    command::run("ip", &["netns", "exec", &ns, "ip", "link", "set", "lo", "up"])
                        .await?;
                    if node.kind == NodeKind::Router {
                        command::run(
                            "ip",
                            &["netns", "exec", &ns, "sysctl", "-w", "net.ipv4.ip_forward=1"],
                        )
                        .await?;
                    }
                    self.namespaces.insert(node.name.clone(), ns);
                }
            }
        }

        for link in topo.resolved_links()? {
            command::run(
                "ip",
                &["link", "add", &link.a.ifname, "type", "veth", "peer", "name", &link.b.ifname],
            )
            .await?;

            for endpoint in [&link.a, &link.b] {
                if endpoint.kind == NodeKind::Switch {
                    let bridge = self.bridge_name(&endpoint.node);
                    command::run("ip", &["link", "set", &endpoint.ifname, "master", &bridge])
                        .await?;
                    command::run("ip", &["link", "set", &endpoint.ifname, "up"]).await?;

                    if let Some(loss) = link.loss_pct.filter(|&l| l > 0) {
                        command::run(
                            "tc",
                            &[
                                "qdisc", "add", "dev", &endpoint.ifname, "root", "netem", "loss",
                                &format!("{loss}%"),
                            ],
                        )
                        .await?;
                    }
                } else {
                    let ns = self.namespace_of(&endpoint.node)?.to_string();
                    command::run("ip", &["link", "set", &endpoint.ifname, "netns", &ns]).await?;
                    if let Some(addr) = endpoint.addr {
                        command::run(
                            "ip",
                            &[
                                "netns", "exec", &ns, "ip", "addr", "add", &addr.to_string(),
                                "dev", &endpoint.ifname,
                            ],
                        )
                        .await?;
                    }
                    command::run(
                        "ip",
                        &["netns", "exec", &ns, "ip", "link", "set", &endpoint.ifname, "up"],
                    )
                    .await?;

                    if let Some(loss) = link.loss_pct.filter(|&l| l > 0) {
                        command::run(
                            "ip",
                            &[
                                "netns", "exec", &ns, "tc", "qdisc", "add", "dev",
                                &endpoint.ifname, "root", "netem", "loss", &format!("{loss}%"),
                            ],
                        )
                        .await?;
                    }
                }
            }
        }

        for node in &topo.nodes {
            if let Some(gateway) = node.default_route {
                let ns = self.namespace_of(&node.name)?;
                command::run(
                    "ip",
                    &["netns", "exec", ns, "ip", "route", "add", "default", "via",
                      &gateway.to_string()],
                )
                .await?;
            }
        }

        tracing::info!(
            namespaces = self.namespaces.len(),
            bridges = self.bridges.len(),
            "topology instantiated"
        );
        Ok(())
    }

    async fn start(&mut self) -> Result<()> {
        // Namespaces, bridges and links come up during creation; this only
        // marks the point after which traffic commands may be issued
        tracing::info!("emulation started");
        Ok(())
    }

    async fn exec_on(&mut self, node: &str, command: &str) -> Result<String> {
        let output = self.run_in(node, command).await?;
        Ok(output.stdout)
    }

    async fn spawn_on(&mut self, node: &str, command: &str) -> Result<NetnsTask> {
        let ns = self.namespace_of(node)?;
        tracing::debug!(node, command, "spawning background command");

        let child = tokio::process::Command::new("ip")
            .args(["netns", "exec", ns, "sh", "-c", command])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn command on {node}"))?;

        Ok(NetnsTask {
            child,
            description: format!("{node}: {command}"),
        })
    }

    async fn interactive(&mut self) -> Result<()> {
        println!("*** Interactive session: '<node> <command>' runs a command, 'exit' quits");
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("netlab> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                break;
            }
            let Some((node, command)) = line.split_once(' ') else {
                println!("usage: <node> <command>");
                continue;
            };

            match self.run_in(node, command).await {
                Ok(output) => {
                    print!("{}", output.stdout);
                    eprint!("{}", output.stderr);
                }
                Err(e) => println!("error: {e:#}"),
            }
        }

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        // Best effort: a partially torn down emulation should not mask the
        // error that interrupted the run
        for (node, ns) in self.namespaces.drain() {
            if let Err(e) = command::run("ip", &["netns", "del", &ns]).await {
                tracing::warn!(node, %e, "failed to delete namespace");
            }
        }
        for bridge in self.bridges.drain(..) {
            if let Err(e) = command::run("ip", &["link", "del", &bridge]).await {
                tracing::warn!(bridge, %e, "failed to delete bridge");
            }
        }

        tracing::info!("emulation stopped");
        Ok(())
    }
}

/// A background command running inside a namespace. Dropping or detaching
/// the handle leaves the process running.
pub struct NetnsTask {
    child: Child,
    description: String,
}

impl Task for NetnsTask {
    fn detach(self) {}

    async fn wait(mut self) -> Result<()> {
        let status = self
            .child
            .wait()
            .await
            .with_context(|| format!("failed to wait on {}", self.description))?;
        if !status.success() {
            bail!("{} exited with {status}", self.description);
        }
        Ok(())
    }
}
