use anyhow::Result;
use std::path::Path;
use tracksync_app::App;
use tracksync_config::{normalize_config, TracksyncConfig};
use tracksync_domain::CoreError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_cli_flags(std::env::args().skip(1))?;
    if cli.help {
        print_cli_help();
        return Ok(());
    }

    let mut config = tracksync_config::load_from_env()?;
    apply_cli_overrides(&mut config, &cli)?;
    init_logging(config.log_file.as_deref())?;

    let app = App::from_config(config).await?;
    if cli.watch {
        app.watch(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %error, "failed to listen for ctrl-c; stopping");
            }
        })
        .await?;
        return Ok(());
    }

    let summaries = app.run_once().await;
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    let failed = summaries
        .iter()
        .filter(|summary| summary.failed())
        .map(|summary| summary.tenant.to_string())
        .collect::<Vec<_>>();
    if !failed.is_empty() {
        return Err(anyhow::anyhow!(
            "reconcile failed for tenant(s): {}",
            failed.join(", ")
        ));
    }

    Ok(())
}

fn init_logging(log_file: Option<&str>) -> Result<(), CoreError> {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let Some(log_file) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    };

    let log_path = Path::new(log_file);
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|error| {
                CoreError::Configuration(format!(
                    "failed to create tracksync log directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|error| {
            CoreError::Configuration(format!(
                "failed to open tracksync log file '{}': {error}",
                log_path.display()
            ))
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();

    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CliFlags {
    tenants: Vec<String>,
    snapshot_dir: Option<String>,
    tracker_a_provider: Option<String>,
    tracker_b_provider: Option<String>,
    apply: Option<bool>,
    watch: bool,
    help: bool,
}

fn parse_cli_flags<I>(args: I) -> Result<CliFlags, CoreError>
where
    I: IntoIterator<Item = String>,
{
    let mut flags = CliFlags::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--tenant" => flags.tenants.push(read_cli_value(&arg, args.next())?),
            "--snapshot-dir" => flags.snapshot_dir = Some(read_cli_value(&arg, args.next())?),
            "--tracker-a-provider" => {
                flags.tracker_a_provider = Some(read_cli_value(&arg, args.next())?)
            }
            "--tracker-b-provider" => {
                flags.tracker_b_provider = Some(read_cli_value(&arg, args.next())?)
            }
            "--apply" => flags.apply = Some(true),
            "--dry-run" => flags.apply = Some(false),
            "--once" => flags.watch = false,
            "--watch" => flags.watch = true,
            "--help" | "-h" => flags.help = true,
            value if value.starts_with("--") => {
                return Err(CoreError::Configuration(format!(
                    "Unknown flag '{value}'. Run with --help for valid flags."
                )));
            }
            unknown => {
                return Err(CoreError::Configuration(format!(
                    "Unexpected argument '{unknown}'. Run with --help for valid flags."
                )));
            }
        }
    }

    Ok(flags)
}

fn read_cli_value(flag: &str, value: Option<String>) -> Result<String, CoreError> {
    let value = value.ok_or_else(|| {
        CoreError::Configuration(format!(
            "Missing value after {flag}. Run with --help for valid flags."
        ))
    })?;
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::Configuration(format!(
            "Flag '{flag}' requires a non-empty value."
        )));
    }
    Ok(value.to_owned())
}

fn apply_cli_overrides(config: &mut TracksyncConfig, cli: &CliFlags) -> Result<(), CoreError> {
    if !cli.tenants.is_empty() {
        config.tenants = cli.tenants.clone();
    }
    if let Some(snapshot_dir) = &cli.snapshot_dir {
        config.snapshot_dir = snapshot_dir.clone();
    }
    if let Some(provider) = &cli.tracker_a_provider {
        config.tracker_a_provider = provider.clone();
    }
    if let Some(provider) = &cli.tracker_b_provider {
        config.tracker_b_provider = provider.clone();
    }
    if let Some(apply) = cli.apply {
        config.scheduler.apply_changes = apply;
    }
    normalize_config(config)
        .map(|_| ())
        .map_err(|error| CoreError::Configuration(error.to_string()))
}

fn print_cli_help() {
    println!("Usage: tracksync [--once | --watch] [--apply | --dry-run] [--tenant <id>]... [--snapshot-dir <path>]");
    println!();
    println!("  --once                          Reconcile every tenant once and print the result as JSON (default)");
    println!("  --watch                         Reconcile every tenant on the configured interval until ctrl-c");
    println!("  --apply                         Create and update issues as planned");
    println!("  --dry-run                       Only report planned actions");
    println!("  --tenant <id>                   Tenant to reconcile; repeatable, overrides config");
    println!("  --snapshot-dir <path>           Root directory of snapshot providers");
    println!("  --tracker-a-provider <key>      Board provider (tracker_a.snapshot or tracker_a.memory)");
    println!("  --tracker-b-provider <key>      Issue provider (tracker_b.snapshot or tracker_b.memory)");
    println!("  --help                          Show this help message");
}
