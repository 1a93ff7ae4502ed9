mod cli;

use std::time::Instant;

use clap::Parser;
use env_logger::{Builder, Env};
use log::{debug, info, LevelFilter};
use sysinfo::{ProcessExt, System, SystemExt};

use cli::{Cli, Command};
use heart_risk::pipeline::{reference_patient, run_training, score_csv};
use heart_risk::{Estimator, ForestConfig, PipelineConfig, Result};

/// Resident memory of this process in bytes, 0 when it cannot be read.
fn monitor_memory() -> u64 {
    let mut system = System::new();
    match sysinfo::get_current_pid() {
        Ok(pid) => {
            system.refresh_process(pid);
            system.process(pid).map(|p| p.memory()).unwrap_or(0)
        }
        Err(_) => 0,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let env = Env::new().filter("HEART_LOG");
    Builder::new()
        .filter(Some("heart_risk"), log_level)
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", cli);

    let start_time = Instant::now();
    let start_memory = monitor_memory();

    match cli.command {
        Command::Train(args) => {
            let config = PipelineConfig {
                cardio_path: args.cardio,
                heart_path: args.heart,
                model_path: args.model,
                export_path: args.export,
            };
            let forest = ForestConfig {
                n_trees: args.trees,
                max_depth: args.max_depth,
                seed: args.seed,
                ..Default::default()
            };
            let report = run_training(&config, &forest)?;

            println!("{}", report.evaluation);
            println!("Model saved as {}", config.model_path.display());

            let risk = report.estimator.predict(&reference_patient())?;
            println!("Heart Disease Probability: {}%", risk);
        }
        Command::Predict(args) => {
            let estimator = Estimator::load(&args.model)?;
            let risk = estimator.predict(&args.patient())?;
            println!("{}", cli::verdict(risk));
        }
        Command::Score(args) => {
            let estimator = Estimator::load(&args.model)?;
            let scored = score_csv(&estimator, &args.input, &args.output)?;
            println!("Scored {} patients into {}", scored, args.output.display());
        }
    }

    let end_memory = monitor_memory();
    info!("Time elapsed: {:?}", start_time.elapsed());
    debug!(
        "Memory used: {} bytes",
        end_memory.saturating_sub(start_memory)
    );

    Ok(())
}
