use clap::Parser;
use leosim_rs::error::{Result, TopoError};
use leosim_rs::sim::{ScenarioSpec, SimTime, Simulator};
use leosim_rs::topo::{OrchestratorOptions, RunReport, TopologyOrchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "constellation-sim",
    about = "Run a scenario.json through the dynamic satellite topology engine"
)]
struct Args {
    /// Path to scenario.json
    #[arg(long)]
    scenario: PathBuf,

    /// Directory for change_log.csv, contact_log.csv, report.json (and lookahead.txt)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Stop the run at this time (ms); defaults to the scenario duration
    #[arg(long)]
    until_ms: Option<u64>,

    /// Run as this worker in distributed mode (overrides scenario)
    #[arg(long)]
    worker: Option<usize>,

    /// Contact log used for the ground-station merge (overrides scenario)
    #[arg(long)]
    contact_log: Option<PathBuf>,

    /// Coalition file for explicit partitioning (overrides scenario)
    #[arg(long)]
    coalition: Option<PathBuf>,

    /// Disable logging
    #[arg(long)]
    quiet: bool,
}

fn run(args: &Args) -> Result<RunReport> {
    let spec = ScenarioSpec::load(&args.scenario)?;
    let opts = OrchestratorOptions {
        out_dir: args.out_dir.clone(),
        worker: args.worker,
        contact_log: args.contact_log.clone(),
        coalition: args.coalition.clone(),
    };
    let mut orch = TopologyOrchestrator::from_scenario(&spec, &opts)?;

    let mut sim = Simulator::default();
    orch.start(&mut sim);
    match args.until_ms {
        Some(ms) => sim.run_until(SimTime::from_millis(ms), &mut orch),
        None => sim.run(&mut orch),
    }

    let report = orch.finish(&sim)?;
    if let Some(err) = orch.take_failure() {
        return Err(err);
    }
    Ok(report)
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if args.quiet {
            tracing_subscriber::EnvFilter::new("off")
        } else {
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        })
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(report) => {
            let attached = report.gsl.iter().filter(|g| g.attached.is_some()).count();
            let up = report.isl.iter().filter(|l| l.up).count();
            info!(ticks = report.ticks, "✅ 运行完成");
            println!(
                "ticks={} final_time_ms={} isl_links={} isl_up={} gsl_interfaces={} gsl_attached={} random_outages={}",
                report.ticks,
                report.final_time_ms,
                report.isl.len(),
                up,
                report.gsl.len(),
                attached,
                report.random_outages_injected
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "运行失败");
            eprintln!("error: {e}");
            match e {
                TopoError::Config(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
