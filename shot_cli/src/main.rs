mod cli;
mod console;
mod error_fmt;
mod run;

use clap::Parser;
use eyre::WrapErr;
use std::path::Path;

use cli::{Cli, Commands, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use run::{CheckReport, RunOpts, RunSummary};
use shot_core::Shutdown;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let code = match real_main(cli) {
        Ok(()) => 0,
        Err(e) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            tracing::debug!(error = ?e, "exiting with error");
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let mut cfg = shot_config::load_file(&cli.config).wrap_err("invalid configuration")?;
    if let Some(ms) = cli.tick_ms {
        cfg.control.tick_ms = ms;
        cfg.validate().wrap_err("invalid configuration after --tick-ms")?;
    }

    // Held until exit so the file writer flushes.
    let _guard = init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    if !cli.json {
        let _ = color_eyre::install();
    }
    tracing::debug!(config = %cli.config.display(), tick_ms = cfg.control.tick_ms, "config loaded");

    match cli.cmd {
        Commands::Run {
            ticks,
            save_dir,
            no_stdin,
            ansi,
        } => {
            let shutdown = Shutdown::new();
            {
                let shutdown = shutdown.clone();
                ctrlc::set_handler(move || {
                    tracing::info!("Ctrl-C received, shutting down");
                    shutdown.trigger();
                })
                .wrap_err("install Ctrl-C handler")?;
            }
            let opts = RunOpts {
                ticks,
                save_dir,
                stdin: !no_stdin,
                ansi,
                simulate: cli.simulate,
                json: cli.json,
            };
            let summary = run::run(&cfg, &opts, &shutdown)?;
            print_summary(&summary, cli.json);
        }
        Commands::SelfCheck => {
            let report = run::self_check(&cfg)?;
            print_check(&report, cli.json);
        }
    }
    Ok(())
}

fn print_summary(s: &RunSummary, json: bool) {
    if json {
        let presets: Vec<_> = s
            .presets
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "target_g": p.target_g,
                    "overshoot_g": p.overshoot_g,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "ticks": s.ticks,
                "current": s.current,
                "presets": presets,
            })
        );
    } else {
        match s.ticks {
            Some(n) => println!("Stopped after {n} ticks."),
            None => println!("Stopped."),
        }
        for p in &s.presets {
            let mark = if p.name == s.current { '*' } else { ' ' };
            println!(
                "{mark} {}: target {:.1} g, overshoot {:.1} g",
                p.name, p.target_g, p.overshoot_g
            );
        }
    }
}

fn print_check(r: &CheckReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "address": r.address,
                "weight_g": r.weight_g,
                "battery_pct": r.battery_pct,
            })
        );
    } else {
        let weight = r
            .weight_g
            .map_or_else(|| "--".to_string(), |w| format!("{w:.1} g"));
        let battery = r
            .battery_pct
            .map_or_else(|| "--".to_string(), |b| format!("{b}%"));
        println!(
            "OK: scale {} weight {weight} battery {battery}",
            r.address.as_deref().unwrap_or("?")
        );
    }
}

/// Console layer to stderr (pretty or JSON), plus an optional JSON-lines file
/// layer from `[logging]`. The returned guard must outlive all logging.
fn init_tracing(
    json: bool,
    level: &str,
    logging: &shot_config::Logging,
) -> eyre::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid --log-level {level:?}"))?;
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let mut guard = None;
    let file_layer = match &logging.file {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {file:?} has no file name"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, g) = tracing_appender::non_blocking(appender);
            guard = Some(g);
            let file_level = logging.level.as_deref().unwrap_or("info");
            let file_filter = EnvFilter::try_new(file_level)
                .wrap_err_with(|| format!("invalid logging.level {file_level:?}"))?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(guard)
}
