use collsim::{ScenarioConfig, Scenario, OutputWriter};
use collsim::{bench_walks, bench_walk_curve};

use clap::Parser;
use anyhow::{Context, Result};

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    /// Scenario file, relative to scenarios/
    #[arg(short, default_value = "default.yaml")]
    file_name: String,

    /// Time the walk strategies instead of running a scenario
    #[arg(long)]
    bench: bool,

    /// With --bench, print a CSV curve of timings
    #[arg(long)]
    curve: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name);
    let file = File::open(&config_path).with_context(|| format!("failed to open {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;

    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.bench {
        if args.curve {
            bench_walk_curve()?;
        } else {
            bench_walks()?;
        }
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let output_cfg = scenario_cfg.output.clone();

    let mut sim = Scenario::build(&scenario_cfg)?.into_simulation()?;

    if output_cfg.write {
        let mut writer = OutputWriter::create(&output_cfg)?;
        sim.run(|s| writer.write(s))?;
        writer.finish(&sim)?;
    } else {
        sim.run(|_| Ok(()))?;
    }

    Ok(())
}
