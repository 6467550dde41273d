use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;

use rs_paging_core::config::{DEFAULT_PAGES, DEFAULT_STEPS, ModelConfig, ZeroRowPolicy};
use rs_paging_core::error::ChainResult;
use rs_paging_core::model::paging_model::PagingModel;
use rs_paging_core::model::prediction_input::PredictionInput;
use rs_paging_core::model::predictor::Prediction;

#[derive(Debug, Parser)]
#[command(name = "rs-paging", about = "Predict upcoming page accesses with a Markov chain", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the distribution of the page accessed K steps ahead.
    Predict(PredictArgs),

    /// Print a random page trace that follows the learned transitions.
    Simulate(SimulateArgs),
}

/// Options shared by every command that builds a model.
#[derive(Debug, Args)]
pub struct ModelArgs {
    /// Transition log: whitespace-separated page indices in access order.
    pub log: PathBuf,

    /// Size of the page universe.
    #[arg(long, default_value_t = DEFAULT_PAGES)]
    pub pages: usize,

    /// How pages without observed transitions are modeled.
    #[arg(long, value_enum, default_value_t = ZeroRow::SelfLoop)]
    pub zero_row: ZeroRow,

    /// Fail when the log contains no transition.
    #[arg(long)]
    pub require_transitions: bool,

    /// Reuse (or write) the count cache next to the log.
    #[arg(long)]
    pub cache: bool,

    /// Count transitions on all cores.
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Number of steps ahead.
    #[arg(long, default_value_t = DEFAULT_STEPS, allow_negative_numbers = true)]
    pub steps: i64,

    /// Page the prediction starts from.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub start: i64,

    /// Print the prediction as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Page the trace starts from (not printed).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub start: i64,

    /// Number of accesses to simulate.
    #[arg(long, default_value_t = 20)]
    pub length: usize,

    /// Seed for a reproducible trace.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ZeroRow {
    SelfLoop,
    Uniform,
}

impl From<ZeroRow> for ZeroRowPolicy {
    fn from(value: ZeroRow) -> Self {
        match value {
            ZeroRow::SelfLoop => ZeroRowPolicy::SelfLoop,
            ZeroRow::Uniform => ZeroRowPolicy::Uniform,
        }
    }
}

impl ModelArgs {
    fn config(&self) -> ModelConfig {
        ModelConfig {
            pages: self.pages,
            zero_row_policy: self.zero_row.into(),
            require_transitions: self.require_transitions,
            use_cache: self.cache,
            parallel: self.parallel,
        }
    }

    fn load(&self) -> ChainResult<PagingModel> {
        let config = self.config();
        debug!("building model from {} with {config:?}", self.log.display());
        PagingModel::from_log(&self.log, &config)
    }
}

pub fn run<W: Write>(cli: Cli, out: &mut W) -> ChainResult<()> {
    match cli.command {
        Commands::Predict(args) => run_predict(args, out),
        Commands::Simulate(args) => run_simulate(args, out),
    }
}

fn run_predict<W: Write>(args: PredictArgs, out: &mut W) -> ChainResult<()> {
    // Reject a bad horizon before reading the log.
    let input = PredictionInput::new(args.start, args.steps)?;
    let model = args.model.load()?;
    let prediction = model.predict(&input)?;

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &prediction).map_err(io::Error::from)?;
        writeln!(out)?;
    } else {
        write_prediction(out, &prediction)?;
    }
    Ok(())
}

fn run_simulate<W: Write>(args: SimulateArgs, out: &mut W) -> ChainResult<()> {
    let model = args.model.load()?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let trace = model.simulate(args.start, args.length, &mut rng)?;

    writeln!(out, "Simulated {} accesses from page {}:", trace.len(), args.start)?;
    let pages: Vec<String> = trace.iter().map(usize::to_string).collect();
    writeln!(out, "{}", pages.join(" "))?;
    Ok(())
}

fn write_prediction<W: Write>(out: &mut W, prediction: &Prediction) -> io::Result<()> {
    writeln!(
        out,
        "Predicted probabilities after {} steps from page {}:",
        prediction.steps, prediction.start_page
    )?;
    for (page, probability) in prediction.distribution.iter().enumerate() {
        writeln!(out, "Page {page}: {probability:.4}")?;
    }

    match prediction.most_likely {
        Some(best) => writeln!(out, "Most likely next page: {} (Probability: {:.4})", best.page, best.probability),
        None => writeln!(out, "Most likely next page: none (no page has positive probability)"),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rs_paging_core::error::ChainError;
    use tempfile::TempDir;

    use super::*;

    fn log_file(contents: &str) -> (TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.log");
        fs::write(&path, contents).unwrap();
        (dir, path.to_string_lossy().into_owned())
    }

    fn run_args(args: &[&str]) -> ChainResult<String> {
        let cli = Cli::try_parse_from(std::iter::once("rs-paging").chain(args.iter().copied())).unwrap();
        let mut out = Vec::new();
        run(cli, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn predict_prints_distribution_and_best_page() {
        let (_dir, log) = log_file("0 1 0 1 0 1");
        let output = run_args(&["predict", log.as_str(), "--pages", "2"]).unwrap();
        assert_eq!(
            output,
            "Predicted probabilities after 2 steps from page 0:\n\
             Page 0: 1.0000\n\
             Page 1: 0.0000\n\
             Most likely next page: 0 (Probability: 1.0000)\n"
        );
    }

    #[test]
    fn predict_uses_default_page_count() {
        let (_dir, log) = log_file("5");
        let output = run_args(&["predict", log.as_str(), "--start", "5", "--steps", "3"]).unwrap();
        assert!(output.starts_with("Predicted probabilities after 3 steps from page 5:\n"));
        assert_eq!(output.lines().filter(|l| l.starts_with("Page ")).count(), 10);
        assert!(output.ends_with("Most likely next page: 5 (Probability: 1.0000)\n"));
    }

    #[test]
    fn predict_json_serializes_the_prediction() {
        let (_dir, log) = log_file("0 1 1 1");
        let output = run_args(&["predict", log.as_str(), "--pages", "2", "--steps", "1", "--json"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["start_page"], 0);
        assert_eq!(value["steps"], 1);
        assert_eq!(value["most_likely"]["page"], 1);
        assert_eq!(value["distribution"][1], 1.0);
    }

    #[test]
    fn non_positive_steps_fail_with_usage_status() {
        let (_dir, log) = log_file("0 1");
        for steps in ["0", "-1"] {
            let err = run_args(&["predict", log.as_str(), "--steps", steps]).unwrap_err();
            assert!(matches!(err, ChainError::InvalidArgument { .. }));
            assert_eq!(err.exit_code(), 64);
        }
    }

    #[test]
    fn out_of_range_log_fails_with_data_status() {
        let (_dir, log) = log_file("0 1 2");
        let err = run_args(&["predict", log.as_str(), "--pages", "2"]).unwrap_err();
        assert!(matches!(err, ChainError::OutOfRangeIndex { index: 2, .. }));
        assert_eq!(err.exit_code(), 65);
    }

    #[test]
    fn missing_log_fails_with_io_status() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.log").to_string_lossy().into_owned();
        let err = run_args(&["predict", missing.as_str()]).unwrap_err();
        assert_eq!(err.exit_code(), 74);
    }

    #[test]
    fn uniform_zero_rows_are_selectable() {
        let (_dir, log) = log_file("0");
        let output = run_args(&["predict", log.as_str(), "--pages", "4", "--steps", "1", "--zero-row", "uniform"]).unwrap();
        assert!(output.contains("Page 3: 0.2500\n"));
        assert!(output.ends_with("Most likely next page: 0 (Probability: 0.2500)\n"));
    }

    #[test]
    fn simulate_is_reproducible_with_a_seed() {
        let (_dir, log) = log_file("0 1 2 0 2 1 0 1 2 2 0");
        let args: [&str; 8] = ["simulate", log.as_str(), "--pages", "3", "--length", "12", "--seed", "42"];
        let first = run_args(&args).unwrap();
        let second = run_args(&args).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("Simulated 12 accesses from page 0:\n"));
    }

    #[test]
    fn none_is_printed_for_an_all_zero_row() {
        let prediction = Prediction { start_page: 1, steps: 2, distribution: vec![0.0, 0.0], most_likely: None };
        let mut out = Vec::new();
        write_prediction(&mut out, &prediction).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("Most likely next page: none (no page has positive probability)\n"));
    }
}
