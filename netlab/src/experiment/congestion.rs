//! The congestion experiment: iperf flows across a lossy dumbbell, with
//! tcpdump captures on the endpoints.

use crate::config::cli::CongestionOpt;
use crate::experiment::dump_graph;
use crate::runtime::{Runtime, Task};
use anyhow::{Result, bail};
use clap::ValueEnum;
use netlab_topo::builder;
use std::net::Ipv4Addr;

const SERVER: &str = "h4";
const SERVER_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 4);
const BASE_PORT: u16 = 1234;

/// Capture duration baked into the tcpdump invocation, in seconds.
const CAPTURE_TIMEOUT_SECS: u32 = 15_000;

/// The closed set of traffic patterns the experiment supports.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficPattern {
    /// A single h1 -> h4 flow, with captures on both endpoints
    #[value(alias = "b")]
    SingleFlow,
    /// Three concurrent flows from h1, h2 and h3 to h4 on distinct ports
    #[value(alias = "c")]
    ParallelFlows,
}

/// One client-server iperf flow.
pub struct Flow {
    pub client: &'static str,
    pub port: u16,
}

/// One tcpdump capture on a node's interface.
pub struct Capture {
    pub node: &'static str,
    pub ifname: &'static str,
    pub file: &'static str,
}

impl TrafficPattern {
    pub fn flows(self) -> Vec<Flow> {
        let clients: &[&'static str] = match self {
            TrafficPattern::SingleFlow => &["h1"],
            TrafficPattern::ParallelFlows => &["h1", "h2", "h3"],
        };
        clients
            .iter()
            .enumerate()
            .map(|(i, client)| Flow {
                client,
                port: BASE_PORT + i as u16,
            })
            .collect()
    }

    pub fn captures(self) -> Vec<Capture> {
        let capture = |node, ifname, file| Capture { node, ifname, file };
        match self {
            TrafficPattern::SingleFlow => vec![
                capture("h4", "h4-eth2", "server_h4.pcap"),
                capture("h1", "h1-eth1", "client_h1.pcap"),
            ],
            TrafficPattern::ParallelFlows => vec![
                capture("h4", "h4-eth2", "server_h4.pcap"),
                capture("h3", "h3-eth2", "client_h3.pcap"),
                capture("h2", "h2-eth1", "client_h2.pcap"),
                capture("h1", "h1-eth1", "client_h1.pcap"),
            ],
        }
    }
}

pub async fn run<R: Runtime>(runtime: &mut R, opts: &CongestionOpt, open_cli: bool) -> Result<()> {
    let scheme = validated_scheme(&opts.scheme)?;
    let topo = builder::dumbbell(opts.loss)?;
    topo.validate()?;

    if let Some(path) = &opts.graph_out {
        dump_graph(&topo, path)?;
    }

    runtime.create_topology(&topo).await?;
    runtime.start().await?;

    let pattern = opts.pattern;

    // Servers first, one per port; they serve for the whole run
    for flow in pattern.flows() {
        runtime
            .spawn_on(SERVER, &format!("iperf -s -p {}", flow.port))
            .await?
            .detach();
    }

    // Captures next, so they see the flows from the first packet. They run
    // for a fixed duration and outlive the flows on purpose
    for capture in pattern.captures() {
        runtime
            .spawn_on(
                capture.node,
                &format!(
                    "timeout {CAPTURE_TIMEOUT_SECS} tcpdump -i {} -w {}",
                    capture.ifname, capture.file
                ),
            )
            .await?
            .detach();
    }

    // Client flows, all under the same congestion-control scheme
    let mut clients = Vec::new();
    for flow in pattern.flows() {
        let task = runtime
            .spawn_on(
                flow.client,
                &format!("iperf -c {SERVER_IP} -p {} -Z {scheme}", flow.port),
            )
            .await?;
        clients.push(task);
    }

    if open_cli {
        // The operator takes over; the flows keep running underneath
        for client in clients {
            client.detach();
        }
        runtime.interactive().await?;
    } else {
        for client in clients {
            client.wait().await?;
        }
    }

    runtime.stop().await
}

/// The scheme is spliced into a shell command, so restrict it to plain
/// identifier characters (cubic, bbr, reno, ...).
fn validated_scheme(scheme: &str) -> Result<&str> {
    let well_formed = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !well_formed {
        bail!("invalid congestion-control scheme: {scheme:?}");
    }
    Ok(scheme)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::runtime::recording::{IssuedCommand, RecordingRuntime};
    use std::collections::HashSet;

    fn options(pattern: TrafficPattern) -> CongestionOpt {
        CongestionOpt {
            pattern,
            scheme: "cubic".to_string(),
            loss: 10,
            graph_out: None,
        }
    }

    fn traffic(runtime: &RecordingRuntime) -> (Vec<&IssuedCommand>, Vec<&IssuedCommand>, Vec<&IssuedCommand>) {
        let servers = runtime
            .commands
            .iter()
            .filter(|c| c.command.starts_with("iperf -s"))
            .collect();
        let captures = runtime
            .commands
            .iter()
            .filter(|c| c.command.contains("tcpdump"))
            .collect();
        let clients = runtime
            .commands
            .iter()
            .filter(|c| c.command.starts_with("iperf -c"))
            .collect();
        (servers, captures, clients)
    }

    #[tokio::test]
    async fn single_flow_issues_one_iperf_pair_and_two_captures() {
        let mut runtime = RecordingRuntime::new();
        run(&mut runtime, &options(TrafficPattern::SingleFlow), false)
            .await
            .unwrap();

        let (servers, captures, clients) = traffic(&runtime);
        assert_eq!(servers.len(), 1);
        assert_eq!(captures.len(), 2);
        assert_eq!(clients.len(), 1);

        assert_eq!(servers[0].node, "h4");
        assert_eq!(servers[0].command, "iperf -s -p 1234");
        assert_eq!(clients[0].node, "h1");
        assert_eq!(clients[0].command, "iperf -c 10.0.0.4 -p 1234 -Z cubic");
        assert!(runtime.stopped);
    }

    #[tokio::test]
    async fn parallel_flows_use_three_distinct_ports_and_four_captures() {
        let mut runtime = RecordingRuntime::new();
        run(&mut runtime, &options(TrafficPattern::ParallelFlows), false)
            .await
            .unwrap();

        let (servers, captures, clients) = traffic(&runtime);
        assert_eq!(servers.len(), 3);
        assert_eq!(captures.len(), 4);
        assert_eq!(clients.len(), 3);

        let ports: HashSet<_> = clients
            .iter()
            .map(|c| c.command.rsplit("-p ").next().unwrap()[..4].to_string())
            .collect();
        assert_eq!(
            ports,
            HashSet::from(["1234".to_string(), "1235".to_string(), "1236".to_string()])
        );

        let capture_nodes: Vec<_> = captures.iter().map(|c| c.node.as_str()).collect();
        assert_eq!(capture_nodes, ["h4", "h3", "h2", "h1"]);
    }

    #[tokio::test]
    async fn captures_use_the_fixed_duration_template() {
        let mut runtime = RecordingRuntime::new();
        run(&mut runtime, &options(TrafficPattern::SingleFlow), false)
            .await
            .unwrap();

        let (_, captures, _) = traffic(&runtime);
        assert_eq!(
            captures[0].command,
            "timeout 15000 tcpdump -i h4-eth2 -w server_h4.pcap"
        );
        assert_eq!(
            captures[1].command,
            "timeout 15000 tcpdump -i h1-eth1 -w client_h1.pcap"
        );
        assert!(captures.iter().all(|c| c.background));
    }

    #[tokio::test]
    async fn unknown_pattern_is_rejected_before_any_command() {
        assert!(TrafficPattern::from_str("b", true).is_ok());
        assert!(TrafficPattern::from_str("c", true).is_ok());
        assert!(TrafficPattern::from_str("single-flow", true).is_ok());
        assert!(TrafficPattern::from_str("parallel-flows", true).is_ok());
        assert!(TrafficPattern::from_str("x", true).is_err());
    }

    #[tokio::test]
    async fn malformed_scheme_aborts_before_topology_creation() {
        let mut runtime = RecordingRuntime::new();
        let mut opts = options(TrafficPattern::SingleFlow);
        opts.scheme = "cubic; rm -rf /".to_string();

        assert!(run(&mut runtime, &opts, false).await.is_err());
        assert!(runtime.topology.is_none());
        assert!(runtime.commands.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_loss_aborts_before_topology_creation() {
        let mut runtime = RecordingRuntime::new();
        let mut opts = options(TrafficPattern::SingleFlow);
        opts.loss = 101;

        assert!(run(&mut runtime, &opts, false).await.is_err());
        assert!(runtime.topology.is_none());
    }
}
