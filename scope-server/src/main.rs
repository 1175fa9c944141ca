//! scope: proxy server, live poller, and terminal view for the radar scope.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scope_core::config::{self, Config};
use scope_core::facility::{self, FACILITIES};
use scope_core::types::Result;
use scope_core::{Session, Target, TrackStore};

mod poller;
mod upstream;
mod web;

use poller::{now_ms, PollSettings, Poller};
use upstream::HttpUpstream;

#[derive(Parser)]
#[command(name = "scope", version, about = "Terminal radar scope for JFK/LGA/EWR")]
struct Cli {
    /// Config file (default ~/.scope/config.yaml)
    #[arg(long, global = true, env = "SCOPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy + scope API server with live polling
    Serve {
        #[arg(long, env = "SCOPE_HOST")]
        host: Option<String>,

        #[arg(long, env = "SCOPE_PORT")]
        port: Option<u16>,

        /// Facility to start on (JFK, LGA, EWR)
        #[arg(long, env = "SCOPE_FACILITY")]
        facility: Option<String>,
    },

    /// Poll live traffic and print a target table each cycle
    Watch {
        #[arg(long, env = "SCOPE_FACILITY")]
        facility: Option<String>,

        /// Number of poll cycles before exiting
        #[arg(long, default_value = "10")]
        cycles: u32,
    },

    /// List facility presets
    Facilities,

    /// Write the effective config to disk
    InitConfig,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scope=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref()).unwrap_or_else(|e| {
        error!("failed to load config: {e}");
        std::process::exit(1);
    });

    let result = match cli.command {
        Commands::Serve {
            host,
            port,
            facility,
        } => {
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            if let Some(f) = facility {
                config.scope.facility = f;
            }
            web::serve(&config).await
        }
        Commands::Watch { facility, cycles } => {
            if let Some(f) = facility {
                config.scope.facility = f;
            }
            cmd_watch(&config, cycles).await
        }
        Commands::Facilities => {
            cmd_facilities();
            Ok(())
        }
        Commands::InitConfig => config::save_config(&config, cli.config.as_deref()).map(|path| {
            println!("Config written: {}", path.display());
        }),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn cmd_watch(config: &Config, cycles: u32) -> Result<()> {
    let start = facility::lookup(&config.scope.facility)?;
    let store = TrackStore::new(config.scope.ttl_ms, config.scope.min_altitude_ft);
    let session = Arc::new(RwLock::new(Session::new(start, store)));
    let upstream = Arc::new(HttpUpstream::new(&config.upstream)?);
    let poller = Poller::new(session, upstream, PollSettings::from_config(config));

    if let Err(e) = poller.poll_weather().await {
        warn!(error = %e, "weather poll failed");
    }

    let mut tick = tokio::time::interval(Duration::from_millis(config.scope.poll_ms.max(1)));
    for _ in 0..cycles {
        tick.tick().await;
        if let Err(e) = poller.poll_traffic().await {
            warn!(error = %e, "traffic poll failed");
        }

        let (header, targets) = {
            let s = poller.session().read().unwrap();
            let metar = s.metar().map(|m| m.text.clone()).unwrap_or_default();
            (
                format!("{} {}  {metar}", s.facility().id, s.facility().name),
                s.targets(now_ms()),
            )
        };
        println!();
        println!("{header}");
        println!("{}", target_table(&targets));
    }
    Ok(())
}

fn target_table(targets: &[Target]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Callsign", "Alt", "Spd", "Type", "Squawk", "Trk", "Range", "Lat", "Lon", "Trail",
    ]);

    for t in targets {
        let block = t.block.as_ref();
        table.add_row(vec![
            Cell::new(&t.id),
            Cell::new(block.map(|b| b.callsign.as_str()).unwrap_or("-")),
            Cell::new(block.map(|b| b.altitude.as_str()).unwrap_or("-")),
            Cell::new(block.map(|b| b.speed.as_str()).unwrap_or("-")),
            Cell::new(block.map(|b| b.aircraft_type.as_str()).unwrap_or("-")),
            Cell::new(t.squawk.as_deref().unwrap_or("-")),
            Cell::new(
                t.track_deg
                    .map(|h| format!("{h:.0}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(format!("{:.1}", t.range_nm)),
            Cell::new(format!("{:.4}", t.position.lat)),
            Cell::new(format!("{:.4}", t.position.lon)),
            Cell::new(t.history.len()),
        ]);
    }
    table
}

fn cmd_facilities() {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Center", "Zoom", "METAR", "Boundary", "LiveATC"]);
    for f in FACILITIES {
        table.add_row(vec![
            Cell::new(f.id),
            Cell::new(f.name),
            Cell::new(format!("{:.4}, {:.4}", f.center.lat, f.center.lon)),
            Cell::new(f.zoom),
            Cell::new(f.station),
            Cell::new(f.boundary_file),
            Cell::new(f.liveatc_url()),
        ]);
    }
    println!("{table}");
}
