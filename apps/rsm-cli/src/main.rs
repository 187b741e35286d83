use clap::{Parser, Subcommand};
use rsm_app::{AppResult, BackendKind, RunOptions, RunOutcome, RunRequest, scenario_service};
use rsm_ocp::OcpSummary;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rsm-cli")]
#[command(about = "Current MPC for synchronous machines - formulate and run closed-loop scenarios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a scenario file
    Validate {
        /// Path to the scenario YAML/JSON file
        scenario_path: PathBuf,
    },
    /// Assemble the optimal control problem and print its layout
    Formulate {
        /// Path to the scenario YAML/JSON file
        scenario_path: PathBuf,
        /// Print the full problem summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the closed loop
    Run {
        /// Path to the scenario YAML/JSON file
        scenario_path: PathBuf,
        /// Override the number of closed-loop steps
        #[arg(long)]
        n_sim: Option<usize>,
        /// Solver backend (embedded or acados)
        #[arg(long, default_value = "embedded")]
        backend: String,
        /// Do not write the run to the store
        #[arg(long)]
        no_store: bool,
        /// Skip cache and force re-run
        #[arg(long)]
        no_cache: bool,
    },
    /// List stored runs for a scenario
    Runs {
        /// Path to the scenario YAML/JSON file
        scenario_path: PathBuf,
    },
    /// Export a stored trajectory as CSV
    Export {
        /// Path to the scenario YAML/JSON file
        scenario_path: PathBuf,
        /// Run ID (or unique prefix)
        run_id: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Formulate {
            scenario_path,
            json,
        } => cmd_formulate(&scenario_path, json),
        Commands::Run {
            scenario_path,
            n_sim,
            backend,
            no_store,
            no_cache,
        } => cmd_run(
            &scenario_path,
            backend.parse()?,
            RunOptions {
                use_cache: !no_cache,
                store: !no_store,
                n_sim,
            },
        ),
        Commands::Runs { scenario_path } => cmd_runs(&scenario_path),
        Commands::Export {
            scenario_path,
            run_id,
            output,
        } => rsm_app::export_run(&scenario_path, &run_id, output.as_deref()),
    }
}

fn cmd_validate(scenario_path: &Path) -> AppResult<()> {
    println!("Validating scenario: {}", scenario_path.display());
    let scenario = rsm_app::load_scenario(scenario_path)?;
    scenario_service::formulate(&scenario)?;
    println!("✓ Scenario '{}' is valid", scenario.name);
    Ok(())
}

fn cmd_formulate(scenario_path: &Path, json: bool) -> AppResult<()> {
    let scenario = rsm_app::load_scenario(scenario_path)?;
    let problem = scenario_service::formulate(&scenario)?;
    let summary = problem.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(s: &OcpSummary) {
    let d = &s.dims;
    println!("Formulation: {}", s.formulation);
    println!("  N = {}, Ts = {} s, Tf = {} s", d.n, s.ts, s.tf);
    println!(
        "  nx = {}, nu = {}, nz = {}, np = {}, ny = {}, ny_e = {}",
        d.nx, d.nu, d.nz, d.np, d.ny, d.ny_e
    );
    println!(
        "  nbu = {}, ng = {}, nh = {}, npd = {}",
        d.nbu(),
        d.ng(),
        d.nh(),
        d.npd()
    );
    println!("  u_max = {:.3} V", s.u_max);
    println!("  yref   = {:?}", s.yref);
    println!("  yref_e = {:?}", s.yref_e);
}

fn cmd_run(scenario_path: &Path, backend: BackendKind, options: RunOptions) -> AppResult<()> {
    let backend = rsm_app::make_backend(backend)?;
    println!(
        "Running closed loop: {} (backend {})",
        scenario_path.display(),
        backend.name()
    );

    let request = RunRequest {
        scenario_path,
        options,
    };
    let response = rsm_app::ensure_run(&request, backend.as_ref())?;

    if response.loaded_from_cache {
        println!("✓ Loaded from cache: {}", response.run_id);
    } else {
        println!("✓ Closed loop completed: {}", response.run_id);
    }
    println!("  Steps: {}", response.log.len());
    if let Some(last) = response.log.last() {
        println!("  Final flux: psi_d = {:.5} Wb, psi_q = {:.5} Wb", last.x[0], last.x[1]);
        println!("  Final voltage: u_d = {:.2} V, u_q = {:.2} V", last.u[0], last.u[1]);
    }
    let t = &response.manifest.timing;
    println!(
        "  Solve time: mean {:.1} us, max {:.1} us, overruns {}",
        t.mean_solve_s * 1e6,
        t.max_solve_s * 1e6,
        t.overruns
    );
    Ok(())
}

fn short_id(run_id: &str) -> &str {
    run_id
        .char_indices()
        .nth(12)
        .map_or(run_id, |(end, _)| &run_id[..end])
}

fn cmd_runs(scenario_path: &Path) -> AppResult<()> {
    let runs = rsm_app::list_runs(scenario_path)?;
    if runs.is_empty() {
        println!("No stored runs");
        return Ok(());
    }
    println!("Stored runs:");
    for m in runs {
        let outcome = match &m.outcome {
            RunOutcome::Completed => "completed".to_string(),
            RunOutcome::SolveFailed { step, status_code } => {
                format!("failed at step {step} (status {status_code})")
            }
            RunOutcome::Aborted { message } => format!("aborted: {message}"),
        };
        println!(
            "  {}  {}  {} steps={}/{} backend={} {}",
            short_id(&m.run_id),
            m.timestamp,
            m.formulation,
            m.steps,
            m.n_sim,
            m.backend,
            outcome
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::short_id;

    #[test]
    fn short_id_truncates_on_char_boundaries() {
        assert_eq!(short_id("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("ééééééééééééé"), "éééééééééééé");
    }
}
