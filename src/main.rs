use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use rail_dispatch::domain::clock::clock::WallClock;
use rail_dispatch::domain::graph::path_finder::PathOptions;
use rail_dispatch::domain::utils::id::{NodeId, WorldId};
use rail_dispatch::{load_dispatcher, logger};

#[derive(Parser)]
#[command(name = "rail-dispatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect a rail topology: routes and connected components")]
struct Cli {
    /// Topology JSON file with nodes, edges and overrides.
    #[arg(long)]
    topology: PathBuf,

    /// Optional dispatch configuration JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// World the topology is loaded into. Defaults to the nil UUID.
    #[arg(long)]
    world: Option<WorldId>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Shortest route between two nodes.
    Route {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Traverse blocked edges as well.
        #[arg(long)]
        ignore_blocks: bool,
    },
    /// Connected components of the network, keyed by their smallest node id.
    Components,
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| anyhow!("path {:?} is not valid UTF-8", path))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logger::init();

    let world = cli.world.unwrap_or_else(WorldId::nil);
    let config = cli.config.as_deref().map(path_arg).transpose()?;
    let topology = path_arg(&cli.topology)?;

    let dispatcher = load_dispatcher(config, topology, world, WallClock::shared()).with_context(|| format!("loading topology '{}'", topology))?;

    match cli.command {
        Command::Route { from, to, ignore_blocks } => {
            let options = if ignore_blocks { PathOptions::ignore_blocks() } else { PathOptions::default() };
            let (from, to) = (NodeId::new(from), NodeId::new(to));

            match dispatcher.route(world, &from, &to, options) {
                Some(path) => {
                    let hops: Vec<&str> = path.nodes.iter().map(NodeId::as_str).collect();
                    println!("{} ({} blocks, {} edges)", hops.join(" -> "), path.total_length_blocks, path.edges.len());
                }
                None => {
                    log::warn!("NoPath: No route from {} to {}.", from, to);
                    println!("no route from {} to {}", from, to);
                }
            }
        }
        Command::Components => {
            let graph = dispatcher.graph(world).ok_or_else(|| anyhow!("no graph published for world {}", world))?;

            let mut components: Vec<_> = graph.components().into_iter().collect();
            components.sort_by(|a, b| a.0.cmp(&b.0));

            for (key, members) in components {
                let names: Vec<&str> = members.iter().map(NodeId::as_str).collect();
                println!("{}: {}", key, names.join(", "));
            }
        }
    }

    Ok(())
}
