//! The command line interface for gmselect.
use crate::job::{JobData, count_failures, run_job};
use crate::log;
use crate::output::metadata::write_metadata;
use crate::output::{create_output_directory, get_output_dir};
use crate::parameters::JobParameters;
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result, ensure};
use chrono::Local;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for gmselect.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options for the run command
#[derive(Args)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Select ground-motion records for every case of a job.
    Run {
        /// Path to the job file.
        job_file: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Validate a job file and the data files it refers to.
    Validate {
        /// Path to the job file.
        job_file: PathBuf,
    },
    /// Manage the program settings file.
    Settings {
        /// The available subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { job_file, opts } => handle_run_command(&job_file, &opts, None),
            Self::Validate { job_file } => handle_validate_command(&job_file, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start gmselect
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        // Output program help
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Handle the `run` command.
pub fn handle_run_command(
    job_file: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let started = Local::now();

    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(job_file)?;
        &pathbuf
    };

    let overwrite = create_output_directory(output_path, opts.overwrite || settings.overwrite)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger
    log::init(Some(settings.log_level.as_str()), Some(output_path))
        .context("Failed to initialise logging.")?;

    // Load the job and its data
    let params = JobParameters::from_path(job_file).context("Failed to load job file.")?;
    info!("Loaded job from {}", job_file.display());
    if let Some(description) = &params.description {
        info!("Job description: {description}");
    }
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let data = JobData::load(&params).context("Failed to load job data.")?;

    // Run the selection for each case
    let outcomes = run_job(&params, &data, output_path);
    let n_failed = count_failures(&outcomes);
    write_metadata(output_path, job_file, started, outcomes.len(), n_failed)
        .context("Failed to write metadata.")?;
    ensure!(
        n_failed == 0,
        "{n_failed} of {} cases failed",
        outcomes.len()
    );
    info!("Selection complete!");

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(job_file: &Path, settings: Option<Settings>) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(settings.log_level.as_str()), None).context("Failed to initialise logging.")?;

    // Load/validate the job and its data
    let params = JobParameters::from_path(job_file).context("Failed to validate job file.")?;
    JobData::load(&params).context("Failed to validate job data.")?;
    info!("Job validation successful!");

    Ok(())
}
