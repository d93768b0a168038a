use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ptp_core::camera::{Camera, EosCamera, GenericCamera};
use ptp_core::config::CameraConfig;
use ptp_core::session::PtpSession;
use ptp_core::transport::{NusbChannel, PtpTransport};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "USB PTP camera control (Canon EOS aware)", long_about = None)]
struct Args {
    /// Path to a TOML config file (VID/PID filter, timeouts)
    #[arg(long)]
    config: Option<String>,

    /// Match a specific USB vendor id (hex, e.g. 04a9)
    #[arg(long)]
    vid: Option<String>,

    /// Match a specific USB product id (hex)
    #[arg(long)]
    pid: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print device info, battery level and friendly name
    Info,
    /// Trigger a capture and save the resulting image
    Capture {
        /// Output file
        #[arg(short, long, default_value = "capture.jpg")]
        output: String,

        /// Use the standard InitiateCapture opcode instead of the
        /// EOS vendor sequence
        #[arg(long)]
        generic: bool,
    },
    /// Fetch one live view frame and save it
    Liveview {
        /// Output file
        #[arg(short, long, default_value = "frame.jpg")]
        output: String,
    },
    /// Read or write device properties
    Prop {
        #[command(subcommand)]
        action: PropAction,
    },
}

#[derive(Subcommand, Debug)]
enum PropAction {
    /// Print a property descriptor (hex property code, e.g. 0x5007)
    Desc { property: String },
    /// Print a property's current value
    Get { property: String },
    /// Set a property (standard PTP SetDevicePropValue)
    Set { property: String, value: u32 },
}

fn parse_hex_u16(s: &str) -> Result<u16> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(trimmed, 16).with_context(|| format!("not a hex code: {s}"))
}

fn load_config(args: &Args) -> Result<CameraConfig> {
    let mut config = match &args.config {
        Some(path) => CameraConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {path}"))?,
        None => CameraConfig::default(),
    };
    if let Some(vid) = &args.vid {
        config.vendor_id = Some(parse_hex_u16(vid)?);
    }
    if let Some(pid) = &args.pid {
        config.product_id = Some(parse_hex_u16(pid)?);
    }
    Ok(config)
}

fn open_session(config: &CameraConfig) -> Result<PtpSession<NusbChannel>> {
    let channel = NusbChannel::open(config).context("no PTP camera found")?;
    let transport = PtpTransport::new(channel, config.max_bulk_read);
    let mut session = PtpSession::new(transport, config.event_timeout());
    session.open_session().context("OpenSession failed")?;
    Ok(session)
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    match args.command {
        Command::Info => {
            let mut session = open_session(&config)?;
            let device_info = session.get_device_info()?;
            println!("Model version:   {}", device_info.standard_version);
            println!("Extension:       {}", device_info.vendor_extension_desc);
            println!(
                "Operations:      {} supported",
                device_info.operations_supported.len()
            );
            if let Ok(name) = session.get_device_friendly_name() {
                println!("Friendly name:   {name}");
            }
            if let Ok(level) = session.get_battery_level() {
                println!("Battery:         {level}%");
            }
            session.close_session()?;
        }
        Command::Capture { output, generic } => {
            let session = open_session(&config)?;
            let image = if generic {
                let mut camera = GenericCamera::new(session);
                camera.capture()?
            } else {
                let mut camera = EosCamera::new(session);
                camera.connect()?;
                camera.capture()?
            };
            std::fs::write(&output, &image)
                .with_context(|| format!("failed to write {output}"))?;
            info!(len = image.len(), %output, "Image saved");
        }
        Command::Liveview { output } => {
            let session = open_session(&config)?;
            let mut camera = EosCamera::new(session);
            camera.connect()?;
            let frame = camera.live_view()?;
            std::fs::write(&output, &frame)
                .with_context(|| format!("failed to write {output}"))?;
            info!(len = frame.len(), %output, "Frame saved");
        }
        Command::Prop { action } => {
            let mut session = open_session(&config)?;
            match action {
                PropAction::Desc { property } => {
                    let code = parse_hex_u16(&property)?;
                    let info = session.get_device_prop_info(code)?;
                    println!("{info:#?}");
                }
                PropAction::Get { property } => {
                    let code = parse_hex_u16(&property)?;
                    let info = session.get_device_prop_info(code)?;
                    println!("{}", info.current);
                }
                PropAction::Set { property, value } => {
                    let code = parse_hex_u16(&property)?;
                    session.set_device_prop_value(code, value)?;
                    info!(%property, value, "Property set");
                }
            }
            session.close_session()?;
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
