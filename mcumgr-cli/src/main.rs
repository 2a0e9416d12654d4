//! mcumgr: manage SMP devices over BLE
//!
//! Every device command connects, runs one operation and disconnects.

mod output;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use data_encoding::HEXLOWER_PERMISSIVE;
use mcumgr_ble::{BtleConnector, BtleLink, Session, SessionConfig};
use mcumgr_proto::catalog::{Echo, ImageList, ImageSetState, Reset};

#[derive(Parser)]
#[command(name = "mcumgr")]
#[command(about = "Manage SMP (mcumgr) devices over Bluetooth Low Energy")]
struct Cli {
    /// BLE address of the device (platform id on macOS)
    #[arg(long, env = "MCUMGR_BLE_ADDRESS", global = true)]
    ble_address: Option<String>,

    /// Seconds allowed for finding and connecting to the device
    #[arg(long, default_value = "10", global = true)]
    connect_timeout: u64,

    /// Seconds to wait for each response
    #[arg(long, default_value = "10", global = true)]
    timeout: u64,

    /// ATT MTU of the link, used to size upload chunks
    #[arg(long, global = true)]
    mtu: Option<usize>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bluetooth utilities
    #[command(subcommand)]
    Ble(BleCommand),
    /// OS management group
    #[command(subcommand)]
    Os(OsCommand),
    /// Image management group
    #[command(subcommand)]
    Image(ImageCommand),
}

#[derive(Subcommand)]
enum BleCommand {
    /// Scan for BLE devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[derive(Subcommand)]
enum OsCommand {
    /// Reset the device
    Reset,
    /// Ask the device to echo a string
    Echo { msg: String },
}

#[derive(Subcommand)]
enum ImageCommand {
    /// List image slots
    List,
    /// Upload a firmware image
    Upload {
        file: PathBuf,
        /// Bytes of image per request (default: derived from --mtu, else 165)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Boot the image with this hash once, on next reset
    Test { hash: String },
    /// Make the image with this hash permanent
    Confirm { hash: String },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Smp(#[from] mcumgr_ble::Error),
    #[error("--ble-address is required for this command")]
    MissingAddress,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid hash: {0}")]
    Hash(#[from] data_encoding::DecodeError),
    #[error("image hash must be 32 bytes, got {0}")]
    HashLength(usize),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Smp(e) => e.exit_code(),
            _ => 1,
        }
    }
}

/// A device operation with its inputs already read and validated.
enum Action {
    Reset,
    Echo(String),
    List,
    Upload {
        image: Vec<u8>,
        chunk_size: Option<usize>,
    },
    SetState(ImageSetState),
}

impl Action {
    fn prepare(command: OsOrImage) -> Result<Self, CliError> {
        Ok(match command {
            OsOrImage::Os(OsCommand::Reset) => Action::Reset,
            OsOrImage::Os(OsCommand::Echo { msg }) => Action::Echo(msg),
            OsOrImage::Image(ImageCommand::List) => Action::List,
            OsOrImage::Image(ImageCommand::Upload { file, chunk_size }) => {
                let image = std::fs::read(&file).map_err(|source| CliError::Read {
                    path: file.clone(),
                    source,
                })?;
                log::debug!("read {} byte image from {}", image.len(), file.display());
                Action::Upload { image, chunk_size }
            }
            OsOrImage::Image(ImageCommand::Test { hash }) => {
                Action::SetState(ImageSetState::test(parse_hash(&hash)?))
            }
            OsOrImage::Image(ImageCommand::Confirm { hash }) => {
                Action::SetState(ImageSetState::confirm(parse_hash(&hash)?))
            }
        })
    }
}

enum OsOrImage {
    Os(OsCommand),
    Image(ImageCommand),
}

/// Image hashes are SHA-256 digests
const HASH_LEN: usize = 32;

fn parse_hash(hash: &str) -> Result<Vec<u8>, CliError> {
    let hash = HEXLOWER_PERMISSIVE.decode(hash.trim().as_bytes())?;
    if hash.len() != HASH_LEN {
        return Err(CliError::HashLength(hash.len()));
    }
    Ok(hash)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let command = match cli.command {
        Commands::Ble(BleCommand::Scan { duration }) => return scan_devices(duration).await,
        Commands::Os(c) => OsOrImage::Os(c),
        Commands::Image(c) => OsOrImage::Image(c),
    };

    let action = Action::prepare(command)?;
    let address = cli.ble_address.ok_or(CliError::MissingAddress)?;

    let config = SessionConfig {
        response_timeout: Duration::from_secs(cli.timeout),
        mtu: cli.mtu,
    };
    let mut session = Session::connect(
        &BtleConnector,
        &address,
        Duration::from_secs(cli.connect_timeout),
        config,
    )
    .await?;

    let result = perform(&mut session, action).await;
    let disconnected = session.disconnect().await;

    result?;
    disconnected?;
    Ok(())
}

async fn perform(session: &mut Session<BtleLink>, action: Action) -> Result<(), CliError> {
    match action {
        Action::Reset => {
            let response = session.call(&Reset).await?;
            println!("{}", output::map(&response));
        }
        Action::Echo(d) => {
            let response = session.call(&Echo { d }).await?;
            println!("{}", response.d);
        }
        Action::List => {
            let state = session.call(&ImageList).await?;
            print!("{}", output::image_state(&state));
        }
        Action::Upload { image, chunk_size } => {
            let chunk_size =
                chunk_size.unwrap_or_else(|| mcumgr_ble::chunk_size_for_mtu(session.mtu()));
            mcumgr_ble::upload(session, &image, chunk_size, |p| {
                println!("{}/{}", p.sent, p.total);
            })
            .await?;
        }
        Action::SetState(request) => {
            let state = session.call(&request).await?;
            print!("{}", output::image_state(&state));
        }
    }
    Ok(())
}

async fn scan_devices(duration: u64) -> Result<(), CliError> {
    println!("Scanning for BLE devices ({} seconds)...", duration);

    let devices = mcumgr_ble::scan(Duration::from_secs(duration)).await?;

    println!("\nFound {} devices:", devices.len());
    for device in devices {
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "N/A".to_string());
        let marker = if device.is_smp { " [SMP]" } else { "" };
        println!("  {} ({}) RSSI: {}{}", device.name, device.address, rssi, marker);
    }

    Ok(())
}
