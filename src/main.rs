#![cfg_attr(not(all(windows, target_arch = "x86_64")), allow(dead_code))]

mod logging;

use std::{
    io::BufRead,
    sync::{
        Arc,
        mpsc::{self, Receiver},
    },
    thread,
    time::Duration,
};

use anyhow::{Result, anyhow};
use clap::{ArgGroup, Args, Parser, Subcommand};
use handlecut::{
    AliasRule, Error, Kernel, Monitor, MonitorConfig, RecordSchema, SnapshotConfig, StatusEvent,
    TargetSpec, collect_handle_names, enable_debug_privilege, find_pids_by_name, list_processes,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch a process and close the matching handle in every instance of it
    Watch(WatchArgs),

    /// List running processes
    Processes {
        /// Only show processes whose name contains this text
        #[arg(long)]
        filter: Option<String>,
    },

    /// List the named handles a process holds, without closing anything
    Handles(HandlesArgs),
}

#[derive(Args)]
struct WatchArgs {
    /// Executable name, with or without `.exe`
    #[arg(long, env = "HANDLECUT_PROCESS")]
    process: String,

    /// Text the handle's object name must contain
    #[arg(long, env = "HANDLECUT_HANDLE")]
    handle: String,

    #[arg(long, default_value = "singleton")]
    alias_token: String,

    #[arg(long, default_value = "roblox")]
    qualifier_token: String,

    /// Only match by substring or exact name
    #[arg(long)]
    no_alias_rule: bool,

    /// Read the full-width handle table instead of the legacy one
    #[arg(long)]
    extended_records: bool,

    #[arg(long, default_value_t = 300)]
    poll_ms: u64,

    #[arg(long, default_value_t = 500)]
    probe_ms: u64,
}

impl WatchArgs {
    fn config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(self.poll_ms),
            probe_interval: Duration::from_millis(self.probe_ms),
            snapshot: snapshot_config(self.extended_records),
            alias_rule: (!self.no_alias_rule)
                .then(|| AliasRule::new(&self.alias_token, &self.qualifier_token)),
        }
    }
}

#[derive(Args)]
#[command(group(ArgGroup::new("owner").required(true).args(["pid", "process"])))]
struct HandlesArgs {
    #[arg(long)]
    pid: Option<u32>,

    /// Executable name; the first running instance is used
    #[arg(long)]
    process: Option<String>,

    #[arg(long)]
    extended_records: bool,
}

fn snapshot_config(extended: bool) -> SnapshotConfig {
    SnapshotConfig {
        schema: if extended {
            RecordSchema::EXTENDED
        } else {
            RecordSchema::LEGACY
        },
        ..SnapshotConfig::default()
    }
}

fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    run(cli)
}

#[cfg(all(windows, target_arch = "x86_64"))]
fn run(cli: Cli) -> Result<()> {
    let kernel = Arc::new(handlecut::NtKernel::new()?);

    match cli.command {
        Command::Watch(args) => watch(kernel, &args),
        Command::Processes { filter } => processes(&*kernel, filter.as_deref()),
        Command::Handles(args) => handles(&*kernel, &args),
    }
}

#[cfg(not(all(windows, target_arch = "x86_64")))]
fn run(_cli: Cli) -> Result<()> {
    anyhow::bail!("handlecut only runs on 64-bit Windows")
}

fn watch<K: Kernel + 'static>(kernel: Arc<K>, args: &WatchArgs) -> Result<()> {
    let target = TargetSpec::new(&args.process, &args.handle)?;

    let (sender, receiver) = mpsc::channel::<StatusEvent>();
    let printer = thread::Builder::new()
        .name("status".into())
        .spawn(move || print_status(receiver))?;

    let mut monitor = Monitor::new(kernel, args.config(), sender);
    monitor.start(target)?;

    eprintln!("press Enter to stop");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    // the printer exits once the last sender is gone
    monitor.stop();
    drop(monitor);
    printer
        .join()
        .map_err(|_| anyhow!("status printer panicked"))
}

fn status_line(event: &StatusEvent) -> String {
    format!("[{:?}] {event}", event.category())
}

fn print_status(receiver: Receiver<StatusEvent>) {
    for event in receiver {
        println!("{}", status_line(&event));
    }
}

fn processes<K: Kernel>(kernel: &K, filter: Option<&str>) -> Result<()> {
    let filter = filter.map(str::to_lowercase);

    for process in list_processes(kernel)? {
        if filter
            .as_deref()
            .is_some_and(|filter| !process.name.to_lowercase().contains(filter))
        {
            continue;
        }
        println!("{process}");
    }

    Ok(())
}

fn handles<K: Kernel>(kernel: &K, args: &HandlesArgs) -> Result<()> {
    if !enable_debug_privilege(kernel) {
        tracing::warn!("SeDebugPrivilege unavailable, some processes may refuse access");
    }

    let pid = match (args.pid, args.process.as_deref()) {
        (Some(pid), _) => pid,
        (None, Some(process)) => {
            let name = process.split('(').next().unwrap_or(process).trim();
            find_pids_by_name(kernel, name)?
                .first()
                .copied()
                .ok_or_else(|| Error::ProcessNotFound(name.to_owned()))?
        }
        (None, None) => anyhow::bail!("either --pid or --process is required"),
    };

    for name in collect_handle_names(kernel, &snapshot_config(args.extended_records), pid) {
        println!("{name}");
    }

    Ok(())
}
