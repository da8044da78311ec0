//! `iblconv`: batch conversion of HDR panoramas into `.iblenv` environments, plus the BRDF
//! lookup table that goes with them.

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use iblenv::job::{brdf_lut_file, convert_file, convolve_file, resize_file, update_file};
use iblenv::{
    create_brdf_integrator, create_converter, create_diffuse_convolver, create_resizer,
    create_specular_convolver, BackendOptions, BatchSummary, Execution, OutputNaming, SizeSpec,
};

use cli::{BackendArgs, Cli, Command, DeviceArgs, OutputArgs};

fn init_logging(quiet: bool) {
    let default_filter = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Expands the input globs. Bad patterns are reported and skipped.
fn gather_inputs(patterns: &[String], suppress: bool) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for pattern in patterns {
        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(err) => {
                if !suppress {
                    eprintln!("Error: invalid pattern {pattern:?}: {err}");
                }
                continue;
            }
        };
        for entry in paths {
            match entry {
                Ok(path) => inputs.push(path),
                Err(err) if !suppress => eprintln!("Error: {err}"),
                Err(_) => {}
            }
        }
    }
    if inputs.is_empty() {
        log::warn!("no input files matched {patterns:?}");
    }
    inputs
}

fn output_naming(args: &OutputArgs, default_suffix: &str) -> Result<OutputNaming> {
    let dir = match &args.out {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("cannot determine the working directory")?,
    };
    let metadata = std::fs::metadata(&dir)
        .with_context(|| format!("cannot stat output directory {}", dir.display()))?;
    anyhow::ensure!(metadata.is_dir(), "{} is not a directory", dir.display());

    let suffix = args.suffix.as_deref().unwrap_or(default_suffix);
    Ok(OutputNaming::new(dir, suffix, args.ext.clone()))
}

fn backend_options(args: &DeviceArgs) -> BackendOptions {
    BackendOptions {
        implementation: args.implementation,
        execution: if args.serial {
            Execution::Serial
        } else {
            Execution::Parallel
        },
        ..BackendOptions::default()
    }
}

fn size_or(args: &BackendArgs, default: SizeSpec) -> SizeSpec {
    args.size.unwrap_or(default)
}

fn run(cli: &Cli) -> Result<BatchSummary> {
    let summary = match &cli.command {
        Command::Convert {
            output,
            backend,
            no_flip,
            gamma,
            scale,
        } => {
            let naming = output_naming(output, "")?;
            let encode = output.encode_options()?;
            let load = cli::load_options(*no_flip, *gamma, *scale);
            let size = size_or(backend, SizeSpec::Percent(25.0));
            let inputs = gather_inputs(&output.files, cli.suppress);

            let mut converter = create_converter(&backend_options(&backend.device))
                .context("cannot create converter")?;
            let summary = BatchSummary::run(&inputs, |input| {
                convert_file(input, converter.as_ref(), size, &load, &naming, &encode)
            });
            converter.release();
            summary
        }
        Command::Diffuse {
            output,
            backend,
            samples,
        } => {
            let naming = output_naming(output, "_diffuse")?;
            let encode = output.encode_options()?;
            let size = size_or(backend, SizeSpec::Pixels(32));
            let inputs = gather_inputs(&output.files, cli.suppress);

            let mut convolver =
                create_diffuse_convolver(&backend_options(&backend.device), *samples)
                    .context("cannot create diffuse convolver")?;
            let summary = BatchSummary::run(&inputs, |input| {
                convolve_file(input, convolver.as_ref(), size, &naming, &encode)
            });
            convolver.release();
            summary
        }
        Command::Specular {
            output,
            backend,
            samples,
            levels,
            sequence,
            seed,
        } => {
            let naming = output_naming(output, "_specular")?;
            let encode = output.encode_options()?;
            let size = size_or(backend, SizeSpec::Pixels(128));
            let inputs = gather_inputs(&output.files, cli.suppress);

            let mut convolver = create_specular_convolver(
                &backend_options(&backend.device),
                *samples,
                *levels,
                sequence.with_seed(*seed),
            )
            .context("cannot create specular convolver")?;
            let summary = BatchSummary::run(&inputs, |input| {
                convolve_file(input, convolver.as_ref(), size, &naming, &encode)
            });
            convolver.release();
            summary
        }
        Command::Resize {
            output,
            backend,
            samples,
        } => {
            let naming = output_naming(output, "_resized")?;
            let encode = output.encode_options()?;
            let size = size_or(backend, SizeSpec::Percent(100.0));
            let inputs = gather_inputs(&output.files, cli.suppress);

            let mut resizer = create_resizer(&backend_options(&backend.device), *samples)
                .context("cannot create resizer")?;
            let summary = BatchSummary::run(&inputs, |input| {
                resize_file(input, resizer.as_ref(), size, &naming, &encode)
            });
            resizer.release();
            summary
        }
        Command::Update { output } => {
            let naming = output_naming(output, "_updated")?;
            let encode = output.encode_options()?;
            let inputs = gather_inputs(&output.files, cli.suppress);
            BatchSummary::run(&inputs, |input| update_file(input, &naming, &encode))
        }
        Command::BrdfLut {
            output,
            size,
            samples,
            grayscale,
            preview,
            device,
        } => {
            let options = cli::lut_output(*grayscale, *preview);
            let mut integrator = create_brdf_integrator(&backend_options(device), *samples)
                .context("cannot create brdf integrator")?;
            let summary = BatchSummary::run(std::slice::from_ref(output), |output| {
                brdf_lut_file(output, integrator.as_ref(), *size, options)
            });
            integrator.release();
            summary
        }
    };
    Ok(summary)
}

fn report(summary: &BatchSummary, cli: &Cli) {
    if !cli.suppress {
        for failure in &summary.failures {
            eprintln!("Error: {failure}");
        }
    }
    if !cli.quiet {
        println!("{summary}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    match run(&cli) {
        Ok(summary) => {
            report(&summary, &cli);
            if summary.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
