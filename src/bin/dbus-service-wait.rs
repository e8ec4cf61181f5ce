//! dbus-service-wait - wait for a D-Bus bus name to be acquired
//!
//! Usage: dbus-service-wait [-t timeout] [-d fd] BusName [prog...]
//!
//! Without `prog` the wait runs in the foreground. With `prog` this process
//! becomes `prog` right away and the wait continues in a detached
//! grandchild, which reports success through the `-d` fd.

use clap::error::ErrorKind;
use clap::Parser;

use dbus_service_wait::detach::detach;
use dbus_service_wait::timeout::DEFAULT_TIMEOUT_SECS;
use dbus_service_wait::{watch, BusKind, NotifyChannel, Result, WaitError, WatchRequest};

#[derive(Parser)]
#[command(name = "dbus-service-wait")]
#[command(about = "Waits until the specified D-Bus bus name is acquired")]
#[command(
    long_about = "Waits until the specified D-Bus bus name is acquired. \
    If prog is provided, the waiting will be done in a grandchild of prog."
)]
#[command(after_help = "Exit codes:\n  0 - name is acquired\n  1 - timeout was reached or other failure")]
struct Args {
    /// Timeout in seconds
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "SECONDS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    timeout: u32,

    /// Write a newline to this fd once the name is found (must be greater than 2)
    #[arg(
        short = 'd',
        long = "notify-fd",
        value_name = "FD",
        value_parser = clap::value_parser!(i32).range(3..)
    )]
    notify_fd: Option<i32>,

    /// Bus name to wait for (exact match)
    #[arg(value_name = "BusName")]
    bus_name: String,

    /// Program to exec, with its arguments
    #[arg(value_name = "PROG", trailing_var_arg = true, allow_hyphen_values = true)]
    prog: Vec<String>,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help goes to stdout with 0; every usage error exits 1
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run(args) {
        eprintln!("dbus-service-wait: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(args: Args) -> Result<()> {
    let notify = args
        .notify_fd
        .map(NotifyChannel::from_raw_fd)
        .transpose()?;

    let request = WatchRequest::new(args.bus_name)?
        .timeout(args.timeout)?
        .notify(notify)
        .successor(args.prog);

    // Forks before any runtime thread exists
    let notify = detach(&request.successor, request.notify)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(WaitError::Runtime)?;

    let kind = BusKind::from_env();
    log::debug!(
        "Waiting up to {}s for {} on the {} bus",
        request.timeout_secs,
        request.target_name,
        kind
    );

    runtime.block_on(watch(&request.target_name, request.timeout_secs, kind, notify))
}
