use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use stacks_arcade::{
    config::Config,
    network::Network,
    storage,
};
use std::path::{
    Path,
    PathBuf,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

const LOG_FILE_PREFIX: &str = "stacks-arcade.log";

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: stacks-arcade [--mainnet | --testnet] --wallet <name>\n\
         [--wallet-dir <path>] [--session-file <path>] [--log-dir <path>]\n\
         \n\
         Flags:\n\
           --mainnet             Derive a mainnet (SP...) address on connect\n\
           --testnet             Derive a testnet (ST...) address on connect (default)\n\
           --wallet <name>       Keystore to unlock, <wallet-dir>/<name>.wallet\n\
           --wallet-dir <path>   Override the keystore directory (defaults to ~/.stacks/wallets)\n\
           --session-file <path> Where the connected account is remembered\n\
                                 (defaults to ~/.stacks/arcade-session.json)\n\
           --log-dir <path>      Directory for log files (defaults to ~/.stacks/logs)\n\
         \n\
         Environment:\n\
           STACKS_ACTIVITY_CONTRACT_ADDRESS, STACKS_ACTIVITY_CONTRACT_NAME,\n\
           STACKS_REFLEX_CONTRACT_ADDRESS, STACKS_REFLEX_CONTRACT_NAME,\n\
           STACKS_MAINNET_API_URL, STACKS_TESTNET_API_URL, STACKS_TX_FEE,\n\
           STACKS_WALLET_CONNECT_PROJECT_ID, RUST_LOG"
    );
    std::process::exit(0);
}

struct CliArgs {
    app: client::AppConfig,
    log_dir: PathBuf,
}

fn parse_cli_args(settings: Config) -> Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut network: Option<Network> = None;
    let mut wallet_name: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut session_file: Option<String> = None;
    let mut log_dir: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mainnet" | "--testnet" => {
                if network.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --mainnet/--testnet"
                    ));
                }
                network = Some(arg.trim_start_matches("--").parse()?);
            }
            "--wallet" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet requires a wallet name"))?;
                if wallet_name.is_some() {
                    return Err(eyre!("--wallet may only be specified once"));
                }
                wallet_name = Some(name);
            }
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--session-file" => {
                let path = args
                    .next()
                    .ok_or_else(|| eyre!("--session-file requires a path argument"))?;
                if session_file.is_some() {
                    return Err(eyre!("--session-file may only be specified once"));
                }
                session_file = Some(path);
            }
            "--log-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--log-dir requires a path argument"))?;
                if log_dir.is_some() {
                    return Err(eyre!("--log-dir may only be specified once"));
                }
                log_dir = Some(dir);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let wallet_name = wallet_name
        .ok_or_else(|| eyre!("Specify --wallet <name> to select a keystore"))?;
    let wallet_dir =
        storage::resolve_path(wallet_dir.as_deref(), storage::default_wallet_dir)?;
    let session_file =
        storage::resolve_path(session_file.as_deref(), storage::default_session_path)?;
    let log_dir = storage::resolve_path(log_dir.as_deref(), storage::default_log_dir)?;

    Ok(CliArgs {
        app: client::AppConfig {
            network: network.unwrap_or(Network::Testnet),
            wallet_name,
            wallet_dir,
            session_file,
            settings,
        },
        log_dir,
    })
}

/// The terminal belongs to the UI, so logs go to a daily file.
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let settings = Config::from_env()?;
    let cli = parse_cli_args(settings)?;
    let _guard = init_tracing(&cli.log_dir)?;
    tracing::info!(
        network = %cli.app.network,
        wallet = %cli.app.wallet_name,
        "starting stacks-arcade client"
    );
    client::run_app(cli.app).await
}
