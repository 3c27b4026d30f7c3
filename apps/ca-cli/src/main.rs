use ca_app::{Analysis, AppError, AppResult, DEFAULT_REPORT_ORDERS, InputData};
use ca_case::{CaseConfig, SignalFile, load_case, load_signals, save_yaml};
use ca_results::{JsonTableStore, OverwritePolicy};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ca-cli")]
#[command(about = "Control analysis - system identification and control quality", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a case file, and a signal file if given
    Validate {
        /// Path to the case YAML/JSON file
        case_path: PathBuf,
        /// Path to the signal file
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Fit how the response follows the command
    Sysid {
        #[command(flatten)]
        run: RunArgs,
        /// Model order to fit (defaults to the case's)
        #[arg(long)]
        order: Option<i64>,
    },
    /// Evaluate how well the measurement tracks the target
    Quality {
        #[command(flatten)]
        run: RunArgs,
        /// Also fit the response to the target with this model order
        #[arg(long)]
        fit_order: Option<i64>,
        /// Fit even when the target never changes
        #[arg(long)]
        force: bool,
    },
    /// Set up the case and summarize the problems found
    Complain {
        /// Path to the case YAML/JSON file
        case_path: PathBuf,
        /// Signal file served as the data source
        #[arg(long)]
        data: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the case YAML/JSON file
    case_path: PathBuf,
    /// Signal file served as the data source
    #[arg(long)]
    data: PathBuf,
    /// Orders to report and load
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_REPORT_ORDERS)]
    orders: Vec<i64>,
    /// Directory of JSON result tables to load results into
    #[arg(long)]
    store: Option<PathBuf>,
    /// What to do when stored columns already hold values
    #[arg(long, value_enum, default_value_t = Policy::Abort)]
    policy: Policy,
    /// Write the effective settings back out as a case file
    #[arg(long)]
    write_settings: Option<PathBuf>,
    /// Print the problem summary even when there is nothing to report
    #[arg(long)]
    verbose_problems: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Abort,
    Overwrite,
    PreferExisting,
}

impl From<Policy> for OverwritePolicy {
    fn from(p: Policy) -> Self {
        match p {
            Policy::Abort => OverwritePolicy::Abort,
            Policy::Overwrite => OverwritePolicy::Overwrite,
            Policy::PreferExisting => OverwritePolicy::PreferExisting,
        }
    }
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { case_path, data } => cmd_validate(&case_path, data.as_deref()),
        Commands::Sysid { run, order } => cmd_sysid(&run, order),
        Commands::Quality {
            run,
            fit_order,
            force,
        } => cmd_quality(&run, fit_order, force),
        Commands::Complain { case_path, data } => cmd_complain(&case_path, &data),
    }
}

fn cmd_validate(case_path: &Path, data: Option<&Path>) -> AppResult<()> {
    println!("Validating case: {}", case_path.display());
    let case = load_case(case_path)?;
    println!(
        "  kind: {:?}, shots: {:?}, signals: {}",
        case.kind,
        case.shot.to_vec(),
        case.signals.len()
    );
    if let Some(path) = data {
        let file = load_signals(path)?;
        println!("  {} pointname(s) in {}", file.signals.len(), path.display());
    }
    println!("✓ Case is valid");
    Ok(())
}

fn load_inputs(run: &RunArgs) -> AppResult<(CaseConfig, SignalFile)> {
    let case = load_case(&run.case_path)?;
    let signals = load_signals(&run.data)?;
    info!(case = %run.case_path.display(), pointnames = signals.signals.len(), "inputs loaded");
    Ok((case, signals))
}

fn cmd_sysid(run: &RunArgs, order: Option<i64>) -> AppResult<()> {
    let (case, mut signals) = load_inputs(run)?;
    let mut analysis = Analysis::new(case, InputData::none(), Some(&mut signals))?;
    if analysis.is_valid() {
        analysis.fit(order, Vec::new(), false)?;
    }
    finish(run, &mut analysis)
}

fn cmd_quality(run: &RunArgs, fit_order: Option<i64>, force: bool) -> AppResult<()> {
    let (case, mut signals) = load_inputs(run)?;
    let mut analysis = Analysis::new(case, InputData::none(), Some(&mut signals))?;
    if let Some(order) = fit_order {
        let Analysis::ControlQuality(cq) = &mut analysis else {
            return Err(AppError::InvalidInput(
                "the quality command needs a control quality case".to_string(),
            ));
        };
        if let Err(e) = cq.fit(order, Vec::new(), force, false) {
            // refusals are already in the ledger
            info!(error = %e, "no fit");
        }
    }
    finish(run, &mut analysis)
}

fn cmd_complain(case_path: &Path, data: &Path) -> AppResult<()> {
    let case = load_case(case_path)?;
    let mut signals = load_signals(data)?;
    let analysis = Analysis::new(case, InputData::none(), Some(&mut signals))?;
    let complaint = analysis.complain(true, false);
    println!("{}", complaint.report);
    println!("Status: {}", analysis.core().status_line());
    Ok(())
}

/// Report, optionally load results and settings, then summarize problems.
fn finish(run: &RunArgs, analysis: &mut Analysis) -> AppResult<()> {
    println!("{}", analysis.report(&run.orders));

    if let Some(dir) = &run.store {
        let mut store = JsonTableStore::new(dir.clone())?;
        let outcomes = analysis.load_results(&mut store, &run.orders, None, run.policy.into(), None)?;
        for (shot, outcome) in &outcomes {
            if outcome.row_found {
                println!("✓ Shot {shot}: wrote {} column(s)", outcome.written.len());
                if !outcome.kept.is_empty() {
                    println!("  kept existing: {}", outcome.kept.join(", "));
                }
            } else {
                println!("✗ Shot {shot}: no row to update");
            }
        }
    }

    if let Some(path) = &run.write_settings {
        save_yaml(path, &analysis.settings())?;
        println!("Settings written to {}", path.display());
    }

    let complaint = analysis.complain(true, !run.verbose_problems);
    if complaint.severity > 0 || run.verbose_problems {
        println!("{}", complaint.report);
    }
    println!("Status: {}", analysis.core().status_line());
    Ok(())
}
