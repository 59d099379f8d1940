//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - runs single-cell fits and batch runs
//! - prints reports
//! - writes synthetic kymographs

use std::path::PathBuf;

use clap::Parser;

use crate::cli::{BatchArgs, Cli, Command, FitArgs, FitOpts, SynthArgs};
use crate::data::{SynthParams, generate_kymograph};
use crate::domain::FitConfig;
use crate::error::AppError;
use crate::io::{SUMMARY_FILE_NAME, load_kymograph, write_kymograph_csv, write_summary_csv};

pub mod pipeline;

/// Entry point for the `frap` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Batch(args) => handle_batch(args),
        Command::Synth(args) => handle_synth(args),
    }
}

/// `RUST_LOG` wins; otherwise `-v`/`-q` pick the level (default: info).
fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    // A logger may already be installed when embedded; keep it.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.opts);

    let measured = load_kymograph(&args.input)?;
    let run = pipeline::run_cell(&measured, &config)?;
    println!(
        "{}",
        crate::report::format_cell_report(&args.input, &measured, &run, &config)
    );

    let summary = pipeline::write_cell_outputs(&args.input, &measured, &run, &config)?;
    println!("Wrote {}", summary.simulation.display());
    println!("Wrote {}", summary.residuals.display());
    if let Some(path) = &summary.high_res {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.opts);

    let paths = pipeline::discover_cells(&args.root)?;
    if paths.is_empty() {
        return Err(AppError::new(
            3,
            format!("No *-values.csv files under '{}'", args.root.display()),
        ));
    }
    log::info!("found {} cells under {}", paths.len(), args.root.display());

    let outcomes = pipeline::run_batch(&paths, &config, args.jobs)?;
    println!("{}", crate::report::format_batch_outcomes(&outcomes));

    let done: Vec<_> = outcomes
        .iter()
        .filter_map(|o| o.summary().cloned())
        .collect();

    let summary_path: PathBuf = args
        .summary
        .clone()
        .unwrap_or_else(|| args.root.join(SUMMARY_FILE_NAME));
    write_summary_csv(&summary_path, &done)?;
    println!("Wrote {}", summary_path.display());

    if done.is_empty() {
        return Err(AppError::new(
            4,
            format!("All {} cells failed", outcomes.len()),
        ));
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let params = synth_params_from_args(&args);
    let kymograph = generate_kymograph(&params)?;
    write_kymograph_csv(
        &args.output,
        kymograph.dx,
        &kymograph.timestamps,
        &kymograph.profiles,
    )?;
    log::info!(
        "synthetic kymograph: {} frames x {} positions, D={:e}",
        kymograph.n_times(),
        kymograph.n_positions(),
        params.coefficient
    );
    println!("Wrote {}", args.output.display());
    Ok(())
}

pub fn fit_config_from_args(opts: &FitOpts) -> FitConfig {
    FitConfig {
        initial_coefficient: opts.initial_d,
        max_iterations: opts.max_iterations,
        xtol: opts.xtol,
        ftol: opts.ftol,
        discard_leading: opts.discard_leading,
        high_res: !opts.no_high_res,
        export_fit_json: opts.export_fit_json,
    }
}

fn synth_params_from_args(args: &SynthArgs) -> SynthParams {
    SynthParams {
        n_positions: args.positions,
        dx: args.dx,
        n_frames: args.frames,
        frame_interval: args.interval,
        interval_jitter: args.jitter,
        coefficient: args.coefficient,
        bleach_depth: args.depth,
        bleach_width: args.width,
        noise_sigma: args.noise,
        seed: args.seed,
    }
}
