//! `bsc-terminal`: send one Open BSC command over USB/serial and print the answer.

mod logging;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use openbsc::ports::DEFAULT_VENDOR_ID;
use openbsc::transport::config::DEFAULT_BAUD_RATE;
use openbsc::{ErrorCode, MAX_FRAME_SIZE, SerialConfig, Session};

use crate::logging::{LogFormat, LogLevel, init_logging};

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 64;
const EXIT_TIMEOUT: u8 = 124;

#[derive(Parser, Debug)]
#[command(
    name = "bsc-terminal",
    version,
    about = "USB and serial terminal for the Open BSC protocol"
)]
struct Cli {
    /// Serial port to use (e.g. COM5 or /dev/ttyUSB0).
    #[arg(short = 'c', long = "com", value_name = "COM_PORT", env = "OPENBSC_PORT")]
    com: Option<String>,

    /// USB product ID to search for instead of naming a port.
    #[arg(short = 'p', long, value_name = "PID", value_parser = parse_id, conflicts_with = "com")]
    pid: Option<u16>,

    /// USB vendor ID used with --pid.
    #[arg(short = 'v', long, value_name = "VID", value_parser = parse_id, default_value_t = DEFAULT_VENDOR_ID)]
    vid: u16,

    /// Command to send (e.g. V).
    #[arg(short = 'x', long, value_name = "COMMAND", required_unless_present = "list")]
    command: Option<String>,

    /// Treat COMMAND as hex bytes.
    #[arg(long)]
    hex: bool,

    /// Print the answer as hex instead of text.
    #[arg(long)]
    hex_output: bool,

    /// Baud rate.
    #[arg(short = 'b', long = "baudrate", value_name = "BAUD", default_value_t = DEFAULT_BAUD_RATE, env = "OPENBSC_BAUDRATE")]
    baudrate: u32,

    /// Enable RTS.
    #[arg(long)]
    rts: bool,

    /// Enable DTR.
    #[arg(long)]
    dtr: bool,

    /// Response timeout in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    timeout: u64,

    /// List matching ports and exit.
    #[arg(long)]
    list: bool,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: LogLevel,
}

/// Parses a USB ID in decimal or `0x` hex.
fn parse_id(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid USB ID '{s}': {e}"))
}

fn payload(cli: &Cli) -> Result<Vec<u8>, String> {
    let command = cli.command.as_deref().unwrap_or_default();
    if cli.hex {
        let compact: String = command.split_whitespace().collect();
        hex::decode(&compact).map_err(|e| format!("invalid hex command: {e}"))
    } else {
        Ok(command.as_bytes().to_vec())
    }
}

fn list_ports(cli: &Cli) -> ExitCode {
    match openbsc::find_ports(cli.vid, cli.pid.unwrap_or(0)) {
        Ok(ports) => {
            for port in ports {
                println!("{port}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn resolve_port(cli: &Cli) -> Result<String, (u8, String)> {
    match (&cli.com, cli.pid) {
        (Some(com), None) => Ok(com.clone()),
        (None, Some(pid)) => match openbsc::find_port(cli.vid, pid) {
            Ok(Some(port)) => Ok(port.path),
            Ok(None) => Err((
                EXIT_FAILURE,
                format!("no port found for PID {pid:#06x} (VID {:#06x})", cli.vid),
            )),
            Err(e) => Err((EXIT_FAILURE, format!("port discovery failed: {e}"))),
        },
        _ => Err((
            EXIT_USAGE,
            "use either -c <COM_PORT> or -p <PID>, but not both".to_string(),
        )),
    }
}

fn run(cli: &Cli) -> Result<(), (u8, String)> {
    let payload = payload(cli).map_err(|e| (EXIT_USAGE, e))?;
    let port = resolve_port(cli)?;

    let config = SerialConfig::new(port)
        .baud_rate(cli.baudrate)
        .rts(cli.rts)
        .dtr(cli.dtr);

    let mut session = Session::serial();
    session
        .connect(config)
        .map_err(|e| (EXIT_FAILURE, format!("failed to open port: {e} ({:?})", e.code())))?;

    let result = session.request(
        &payload,
        MAX_FRAME_SIZE,
        Duration::from_millis(cli.timeout),
    );
    session.disconnect();

    match result {
        Ok(answer) if cli.hex_output => {
            println!("{}", hex::encode(&answer));
            Ok(())
        }
        Ok(answer) => {
            println!("{}", String::from_utf8_lossy(&answer));
            Ok(())
        }
        Err(e) => {
            let code = if e.code() == ErrorCode::Timeout {
                EXIT_TIMEOUT
            } else {
                EXIT_FAILURE
            };
            Err((code, format!("command failed: {e} ({:?})", e.code())))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    if cli.list {
        return list_ports(&cli);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err((code, message)) => {
            eprintln!("error: {message}");
            ExitCode::from(code)
        }
    }
}
