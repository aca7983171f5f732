use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use psc_core::boot::BootRequest;
use psc_core::ActionKind;
use psc_registry::{
    ActionDispatcher, BootOrchestrator, LogTailReader, RegistryClient, TcpChannel,
    DEFAULT_LOG_DEPTH,
};
use rand::Rng;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "psc-ctl")]
#[command(about = "Operator console for the process manager", long_about = None)]
struct Cli {
    /// Address of the process manager RPC endpoint
    #[arg(long, default_value = "127.0.0.1:10054")]
    addr: String,
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every process the manager knows about
    Ps,
    /// Restart processes, one call per process
    Restart { uuids: Vec<Uuid> },
    /// Kill processes in one batched call
    Kill { uuids: Vec<Uuid> },
    /// Flush processes in one batched call
    Flush { uuids: Vec<Uuid> },
    /// Print the most recent log lines of one process
    Logs {
        uuid: Uuid,
        #[arg(long, default_value_t = DEFAULT_LOG_DEPTH)]
        depth: u32,
    },
    /// Boot a dummy session and wait for it to come up
    Boot {
        /// Session name; a random one is generated when omitted
        #[arg(long)]
        session_name: Option<String>,
        #[arg(long, default_value_t = 1)]
        n_processes: u32,
        #[arg(long, default_value_t = 5)]
        sleep: u32,
        #[arg(long, default_value_t = 4)]
        n_sleeps: u32,
        #[arg(long, default_value = "root")]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    let channel = Arc::new(TcpChannel::new(cli.addr.clone()));

    match cli.command {
        Commands::Ps => {
            let registry = RegistryClient::new(channel);
            let handles = registry.list_all().await.context("list processes")?;
            println!(
                "{:<36}  {:<20}  {:<10}  {:<12}  {:<8}  EXIT",
                "UUID", "NAME", "USER", "SESSION", "STATUS"
            );
            for handle in handles {
                let exit = handle
                    .exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<36}  {:<20}  {:<10}  {:<12}  {:<8}  {}",
                    handle.uuid, handle.name, handle.user, handle.session, handle.status, exit
                );
            }
        }
        Commands::Restart { uuids } => run_action(channel, &uuids, ActionKind::Restart).await?,
        Commands::Kill { uuids } => run_action(channel, &uuids, ActionKind::Kill).await?,
        Commands::Flush { uuids } => run_action(channel, &uuids, ActionKind::Flush).await?,
        Commands::Logs { uuid, depth } => {
            let reader = LogTailReader::new(channel);
            let lines = reader.tail(uuid, depth).await.context("fetch logs")?;
            for line in lines {
                println!("{}", line.line);
            }
        }
        Commands::Boot {
            session_name,
            n_processes,
            sleep,
            n_sleeps,
            user,
        } => {
            let request = BootRequest {
                session_name: session_name.unwrap_or_else(random_session_name),
                n_processes,
                sleep,
                n_sleeps,
            };
            BootOrchestrator::new(channel)
                .boot(&user, &request)
                .await
                .context("boot session")?;
            println!("booted session {}", request.session_name);
        }
    }

    Ok(())
}

async fn run_action(channel: Arc<TcpChannel>, uuids: &[Uuid], action: ActionKind) -> Result<()> {
    let report = ActionDispatcher::new(channel).dispatch(uuids, action).await?;
    println!(
        "{} dispatched to {} process(es)",
        report.action,
        report.dispatched.len()
    );
    Ok(())
}

fn random_session_name() -> String {
    let mut rng = rand::thread_rng();
    (0..10).map(|_| rng.gen_range('a'..='z')).collect()
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
