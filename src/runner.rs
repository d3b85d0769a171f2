//! Batch-run entry point
//!
//! Parses the command line, wires parameters, reports, logging, and the
//! random seed into a fresh [`Context`], hands it to the caller's setup
//! function, and executes the simulation to completion.

use std::path::{Path, PathBuf};

use clap::{Args, Command, FromArgMatches as _};

use crate::context::Context;
use crate::error::SimError;
use crate::log::{set_log_level, LevelFilter};
use crate::parameters::{ContextParametersExt, Params};
use crate::random::ContextRandomExt;
use crate::report::ContextReportExt;

/// Default cli arguments for the wardsim runner
#[derive(Args, Debug)]
pub struct BaseArgs {
    /// Random seed; overrides the `seed` parameter
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Optional path for a parameters JSON file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Optional path for report output
    #[arg(short, long, default_value = "")]
    pub output_dir: String,

    /// Log level: off, error, warn, info, debug or trace
    #[arg(short, long, default_value = "off")]
    pub log_level: String,
}

fn create_cli() -> Command {
    let cli = Command::new("wardsim");
    BaseArgs::augment_args(cli)
}

/// Runs a simulation with the default cli arguments
///
/// This function parses command line arguments and allows you to define a
/// setup function that assembles the model on the context.
///
/// # Errors
///
/// Returns an error if argument parsing or the setup function fails
pub fn run_with_args<F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, &BaseArgs) -> Result<(), SimError>,
{
    let cli = create_cli();
    let matches = cli.get_matches();

    let args = BaseArgs::from_arg_matches(&matches)?;
    run_with_args_internal(args, setup_fn)
}

fn run_with_args_internal<F>(
    args: BaseArgs,
    setup_fn: F,
) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, &BaseArgs) -> Result<(), SimError>,
{
    let level: LevelFilter = args.log_level.parse()?;
    set_log_level(level);

    // Instantiate a context
    let mut context = Context::new();

    // Load parameters from a file, or fall back to the defaults
    if args.config.is_empty() {
        context.set_parameters(Params::default())?;
    } else {
        println!("Loading parameters from: {}", args.config);
        context.init_parameters(Path::new(&args.config))?;
    }

    // Optionally set the output dir for reports
    if !args.output_dir.is_empty() {
        context.set_report_directory(PathBuf::from(&args.output_dir));
    }

    let seed = args.random_seed.unwrap_or_else(|| context.get_params().seed);
    context.init_random(seed);

    // Run the provided Fn
    setup_fn(&mut context, &args)?;

    // Execute the context
    context.execute();
    Ok(context)
}
