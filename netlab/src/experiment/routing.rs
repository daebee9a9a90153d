//! The static-routing experiment: a three-router mesh in three subnets.

use crate::config::cli::RoutingOpt;
use crate::experiment::dump_graph;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use netlab_topo::{RouteEntry, builder, static_mesh_routes};

pub async fn run<R: Runtime>(runtime: &mut R, opts: &RoutingOpt, open_cli: bool) -> Result<()> {
    let topo = match &opts.graph {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read graph from {}", path.display()))?;
            serde_json::from_str(&json).context("failed to parse network graph")?
        }
        None => builder::router_triangle(),
    };
    topo.validate()?;

    // Compute the routes before touching the runtime, so a bad graph fails
    // without leaving half a topology behind
    let routes = static_mesh_routes(&topo)?;

    if let Some(path) = &opts.graph_out {
        dump_graph(&topo, path)?;
    }

    runtime.create_topology(&topo).await?;
    for route in &routes {
        runtime.exec_on(&route.router, &route_add_command(route)).await?;
    }
    runtime.start().await?;

    println!("--- Routing tables ---");
    let routers: Vec<String> = topo.routers().map(|r| r.name.clone()).collect();
    for router in routers {
        let table = runtime.exec_on(&router, "ip route").await?;
        println!("* {router}:");
        print!("{table}");
    }

    if open_cli {
        runtime.interactive().await?;
    }
    runtime.stop().await
}

fn route_add_command(route: &RouteEntry) -> String {
    format!(
        "ip route add {} via {} dev {}",
        route.destination, route.via, route.dev
    )
}
