use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use vser::device::{VS_GET_BAUD, VS_GET_FFMT, VS_SET_BAUD, VS_SET_FFMT};
use vser::{
    Config, ConfigLoader, DeviceError, LineFormat, OpenFlags, Parity, PeriodicTrigger, Session,
    Signal, VirtualSerial,
};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Virtual serial device driven by a simulated interrupt source.",
    long_about = "Runs a single virtual serial device whose receive fifo is fed random letters by a periodic trigger, and reads it back in blocking, non-blocking, readiness-polled or signal-driven mode."
)]
struct Args {
    /// Configuration file (defaults to the standard resolution order).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print device statistics as JSON on exit.
    #[arg(long)]
    stats: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read bytes with plain read calls.
    Cat {
        /// Stop after this many bytes.
        #[arg(short = 'n', long, default_value_t = 64)]
        count: usize,
        /// Open non-blocking and retry on would-block.
        #[arg(long)]
        nonblock: bool,
    },
    /// Read whenever the device reports readiness.
    Watch {
        #[arg(short = 'n', long, default_value_t = 64)]
        count: usize,
    },
    /// Read in response to input-ready signals.
    Signal {
        #[arg(short = 'n', long, default_value_t = 64)]
        count: usize,
    },
    /// Show or change line settings through the control channel.
    Stty {
        #[arg(long)]
        baud: Option<u32>,
        #[arg(long)]
        data_bits: Option<u8>,
        /// none, odd or even
        #[arg(long, value_parser = parse_parity)]
        parity: Option<Parity>,
        #[arg(long)]
        stop_bits: Option<u8>,
    },
    /// Print the effective configuration as TOML.
    Config,
}

fn parse_parity(s: &str) -> Result<Parity, String> {
    match s.to_lowercase().as_str() {
        "none" | "n" => Ok(Parity::None),
        "odd" | "o" => Ok(Parity::Odd),
        "even" | "e" => Ok(Parity::Even),
        other => Err(format!("unknown parity '{other}'")),
    }
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let config = loader.into_config();
    vser::logging::init(&config.logging);

    if let Command::Config = args.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let device = Arc::new(VirtualSerial::from_config(&config)?);
    let trigger = if config.producer.periodic {
        Some(PeriodicTrigger::start(
            device.trigger_line(),
            config.producer.trigger_interval(),
        )?)
    } else {
        None
    };

    match args.command {
        Command::Cat { count, nonblock } => run_cat(&device, &config, count, nonblock).await?,
        Command::Watch { count } => run_watch(&device, count).await?,
        Command::Signal { count } => run_signal(&device, count).await?,
        Command::Stty {
            baud,
            data_bits,
            parity,
            stop_bits,
        } => run_stty(&device, baud, data_bits, parity, stop_bits)?,
        Command::Config => unreachable!("handled above"),
    }

    if let Some(trigger) = trigger {
        let fired = trigger.stop();
        info!("trigger fired {} time(s)", fired);
    }
    if args.stats {
        println!("{}", serde_json::to_string_pretty(&device.stats())?);
    }
    Ok(())
}

/// Blocking or non-blocking read loop on a worker thread; Ctrl+C interrupts
/// a blocked read.
async fn run_cat(
    device: &Arc<VirtualSerial>,
    config: &Config,
    count: usize,
    nonblock: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let flags = if nonblock {
        OpenFlags::nonblocking()
    } else {
        OpenFlags::blocking()
    };
    let session = device.open(flags)?;
    let interrupter = session.interrupter();
    let retry = config.producer.trigger_interval() / 2;
    let stop = Arc::new(AtomicBool::new(false));
    let stop_reader = Arc::clone(&stop);

    let reader = tokio::task::spawn_blocking(move || -> Result<usize, DeviceError> {
        let mut total = 0;
        let mut buf = [0u8; 32];
        let mut out = std::io::stdout();
        while total < count {
            let want = buf.len().min(count - total);
            match session.read(&mut buf[..want]) {
                Ok(n) => {
                    total += n;
                    let _ = out.write_all(&buf[..n]);
                    let _ = out.flush();
                }
                Err(DeviceError::WouldBlock) if stop_reader.load(Ordering::Acquire) => {
                    return Err(DeviceError::Interrupted)
                }
                Err(DeviceError::WouldBlock) => {
                    std::thread::sleep(retry.max(Duration::from_millis(1)))
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    });
    tokio::pin!(reader);

    let result = tokio::select! {
        r = &mut reader => r?,
        _ = shutdown_signal() => {
            stop.store(true, Ordering::Release);
            interrupter.interrupt();
            reader.await?
        }
    };
    println!();

    match result {
        Ok(total) => info!("read {} byte(s)", total),
        Err(DeviceError::Interrupted) => warn!("read interrupted"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Readiness-driven reads: wait for `readable`, then drain without blocking.
async fn run_watch(
    device: &Arc<VirtualSerial>,
    count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = device.open(OpenFlags::nonblocking())?;
    let mut total = 0;
    while total < count {
        tokio::select! {
            _ = session.readable() => {}
            _ = shutdown_signal() => break,
        }
        total += drain(&session, count - total)?;
    }
    println!();
    info!("read {} byte(s)", total);
    Ok(())
}

/// Signal-driven reads: every input-ready signal triggers a drain.
async fn run_signal(
    device: &Arc<VirtualSerial>,
    count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = device.open(OpenFlags::nonblocking())?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Signal>();
    session.set_signal_owner(Arc::new(tx));
    session.register_async(true)?;

    let mut total = drain(&session, count)?;
    let mut signals = 0u64;
    while total < count {
        tokio::select! {
            sig = rx.recv() => match sig {
                Some(_) => signals += 1,
                None => break,
            },
            _ = shutdown_signal() => break,
        }
        total += drain(&session, count - total)?;
    }
    println!();
    info!("read {} byte(s) after {} signal(s)", total, signals);
    session.close();
    Ok(())
}

/// Read whatever is buffered, up to `limit` bytes, and echo it.
fn drain(session: &Session, limit: usize) -> Result<usize, DeviceError> {
    let mut buf = vec![0u8; limit];
    match session.read_with(&mut buf, false) {
        Ok(n) => {
            let mut out = std::io::stdout();
            let _ = out.write_all(&buf[..n]);
            let _ = out.flush();
            Ok(n)
        }
        Err(DeviceError::WouldBlock) => Ok(0),
        Err(e) => Err(e),
    }
}

fn run_stty(
    device: &Arc<VirtualSerial>,
    baud: Option<u32>,
    data_bits: Option<u8>,
    parity: Option<Parity>,
    stop_bits: Option<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = device.open(OpenFlags::nonblocking())?;

    if let Some(baud) = baud {
        session.ioctl(VS_SET_BAUD, &mut baud.to_ne_bytes())?;
    }
    if data_bits.is_some() || parity.is_some() || stop_bits.is_some() {
        let mut raw = [0u8; LineFormat::WIRE_SIZE];
        session.ioctl(VS_GET_FFMT, &mut raw)?;
        let current = LineFormat::from_bytes(&raw)?;
        let updated = LineFormat {
            data_bits: data_bits.unwrap_or(current.data_bits),
            parity: parity.unwrap_or(current.parity),
            stop_bits: stop_bits.unwrap_or(current.stop_bits),
        };
        session.ioctl(VS_SET_FFMT, &mut updated.to_bytes())?;
    }

    let mut raw_baud = [0u8; 4];
    session.ioctl(VS_GET_BAUD, &mut raw_baud)?;
    let mut raw_fmt = [0u8; LineFormat::WIRE_SIZE];
    session.ioctl(VS_GET_FFMT, &mut raw_fmt)?;
    let fmt = LineFormat::from_bytes(&raw_fmt)?;
    println!(
        "baud {} data_bits {} parity {:?} stop_bits {}",
        u32::from_ne_bytes(raw_baud),
        fmt.data_bits,
        fmt.parity,
        fmt.stop_bits
    );
    Ok(())
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("signal received, shutting down");
}
