use crate::experiment::congestion::TrafficPattern;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct CliOpt {
    /// Print the commands the experiment would issue instead of executing
    /// them
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the interactive session at the end of the experiment
    #[arg(long)]
    pub no_cli: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Bring up the three-router mesh and install its static routes
    Routing(RoutingOpt),
    /// Run iperf flows across the lossy dumbbell under a congestion-control
    /// scheme
    Congestion(CongestionOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct RoutingOpt {
    /// Path to a JSON file containing a custom network graph (defaults to
    /// the built-in router triangle)
    #[arg(long)]
    pub graph: Option<PathBuf>,

    /// Write the topology that was built to a JSON file
    #[arg(long)]
    pub graph_out: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct CongestionOpt {
    /// The traffic pattern to run
    #[arg(long, value_enum)]
    pub pattern: TrafficPattern,

    /// The congestion-control scheme handed to the traffic generator
    #[arg(long)]
    pub scheme: String,

    /// Packet loss percentage on the inter-switch link
    #[arg(long, default_value_t = 0)]
    pub loss: u8,

    /// Write the topology that was built to a JSON file
    #[arg(long)]
    pub graph_out: Option<PathBuf>,
}
