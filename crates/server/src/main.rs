mod config;
mod events;
mod probe;
mod protocol;
mod server;

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};

use tickwire::{Channel, LinkConditionerConfig, SessionConfig};

use config::RelayConfig;
use probe::ProbeConfig;
use server::RelayServer;

#[derive(Parser)]
#[command(name = "tickwire-relay")]
#[command(about = "Tick-batched echo relay and probe")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    link: LinkArgs,

    #[arg(long, global = true, default_value_t = 60)]
    tick_rate: u32,
}

#[derive(Subcommand)]
enum Command {
    /// Echo every received message back to its sender
    Serve {
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,

        #[arg(short, long, default_value_t = protocol::DEFAULT_PORT)]
        port: u16,

        #[arg(short, long, default_value_t = 32)]
        max_peers: usize,

        #[arg(long, default_value_t = 10, help = "Peer inactivity timeout in seconds")]
        timeout: u64,

        #[arg(long, help = "Stop after this many seconds")]
        run_for: Option<u64>,
    },
    /// Send probe messages to a relay and verify the echoes
    Probe {
        #[arg(short, long, default_value_t = format!("127.0.0.1:{}", protocol::DEFAULT_PORT))]
        server: String,

        #[arg(short, long, default_value_t = 100)]
        count: u32,

        #[arg(long, default_value_t = 64, help = "Filler bytes per probe")]
        size: usize,

        #[arg(long, help = "Send probes on the unreliable channel")]
        unreliable: bool,

        #[arg(long, default_value_t = 10, help = "Give up after this many seconds")]
        timeout: u64,
    },
}

#[derive(Args)]
struct LinkArgs {
    #[arg(long, global = true, help = "Enable link degradation on outgoing frames")]
    simulate_link: bool,

    #[arg(long, global = true, default_value_t = 0, help = "Added latency in ms")]
    latency: u32,

    #[arg(long, global = true, default_value_t = 0.0, help = "Frame loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, global = true, default_value_t = 0.0, help = "Unreliable reorder percentage (0-100)")]
    reorder_percent: f32,

    #[arg(long, global = true, help = "Seed for the degradation RNG")]
    seed: Option<u64>,
}

impl LinkArgs {
    fn conditioner(&self) -> Option<LinkConditionerConfig> {
        self.simulate_link.then(|| LinkConditionerConfig {
            enabled: true,
            latency_ms: self.latency,
            loss_percent: self.loss_percent.clamp(0.0, 100.0),
            reorder_percent: self.reorder_percent.clamp(0.0, 100.0),
            seed: self.seed,
        })
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let session = SessionConfig {
        tick_rate: cli.tick_rate,
        link_conditioner: cli.link.conditioner(),
        ..Default::default()
    };

    match cli.command {
        Command::Serve {
            bind,
            port,
            max_peers,
            timeout,
            run_for,
        } => {
            let config = RelayConfig {
                tick_rate: cli.tick_rate,
                max_peers,
                peer_timeout: Duration::from_secs(timeout),
                session,
            };
            serve(&format!("{}:{}", bind, port), config, run_for)
        }
        Command::Probe {
            server,
            count,
            size,
            unreliable,
            timeout,
        } => {
            let config = ProbeConfig {
                server,
                count,
                size,
                channel: if unreliable {
                    Channel::Unreliable
                } else {
                    Channel::Reliable
                },
                timeout: Duration::from_secs(timeout),
                tick_rate: cli.tick_rate,
                session,
            };
            run_probe(&config)
        }
    }
}

fn serve(bind_addr: &str, config: RelayConfig, run_for: Option<u64>) -> Result<()> {
    let mut server = RelayServer::bind(bind_addr, config)?;
    log::info!("Relay started on {}", server.local_addr());

    if let Some(secs) = run_for {
        let running = server.running();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            running.store(false, Ordering::SeqCst);
        });
    }

    server.run();

    let stats = server.stats();
    log::info!(
        "Relay shutting down at tick {}: {} messages echoed, {} frames sent, {} dropped writes",
        stats.tick,
        stats.echoed,
        stats.dispatch.frames_sent,
        stats.dispatch.writes_dropped
    );
    Ok(())
}

fn run_probe(config: &ProbeConfig) -> Result<()> {
    let report = probe::run(config)?;
    log::info!(
        "{} sent, {} echoed intact, {} mismatched, {} unexpected",
        report.sent,
        report.received,
        report.mismatched,
        report.unexpected
    );

    if !report.is_clean() {
        bail!(
            "probe incomplete: {}/{} echoes verified",
            report.received,
            report.sent
        );
    }
    Ok(())
}
