use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use pullexec::config::execution::{DEFAULT_BATCH_SIZE, ExecutionConfig};
use pullexec::execution::builder::DefaultNodeFactory;
use pullexec::execution::executor::QueryExecutor;
use pullexec::execution::sink::CollectingSink;
use pullexec::explain::explainable::ExplainConfig;
use pullexec::plan::QueryPlan;
use pullexec_error::{Result, ResultExt};
use tracing::info;

#[derive(Parser)]
#[clap(name = "pullexec")]
struct Arguments {
    /// Path to a JSON encoded plan.
    plan: PathBuf,

    /// Print the execution tree before running.
    #[clap(long)]
    explain: bool,

    /// Print the runtime profile after running.
    #[clap(long)]
    profile: bool,

    /// Print the runtime profile as JSON instead of text.
    #[clap(long, requires = "profile")]
    profile_json: bool,

    /// Number of rows per batch.
    #[clap(long, default_value_t = DEFAULT_BATCH_SIZE, env = "PULLEXEC_BATCH_SIZE")]
    batch_size: usize,

    /// Always use interpreted conjunct evaluation.
    #[clap(long)]
    no_codegen: bool,

    /// Log at debug level, and include more detail in explain output.
    #[clap(long, short)]
    verbose: bool,

    /// Write logs as JSON.
    #[clap(long)]
    json_logs: bool,
}

/// Runs a serialized plan to completion and prints the results.
fn main() {
    let args = Arguments::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let format = if args.json_logs {
        logutil::LogFormat::Json
    } else {
        logutil::LogFormat::HumanReadable
    };
    logutil::configure_global_logger(level, format);

    if let Err(e) = inner(args) {
        println!("ERROR: {e}");
        std::process::exit(1);
    }
}

fn inner(args: Arguments) -> Result<()> {
    let contents = std::fs::read_to_string(&args.plan)
        .context_fn(|| format!("Failed to read plan file '{}'", args.plan.display()))?;
    let plan = QueryPlan::from_json(&contents)?;

    let config = ExecutionConfig {
        batch_size: args.batch_size,
        enable_codegen: !args.no_codegen,
    };
    let mut executor = QueryExecutor::try_new(&plan, &DefaultNodeFactory, config)?;
    info!(query_id = %executor.state().query_id(), "loaded plan");

    let mut stdout = BufWriter::new(std::io::stdout());

    if args.explain {
        let conf = ExplainConfig {
            verbose: args.verbose,
        };
        write!(stdout, "{}", executor.tree().explain(conf).render())?;
        writeln!(stdout)?;
    }

    let mut sink = CollectingSink::new();
    let result = executor.execute(&mut sink);

    for row in sink.rows() {
        let line = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(stdout, "{line}")?;
    }
    writeln!(stdout, "({} rows)", sink.rows().len())?;

    if args.profile {
        let snapshot = executor.profile_snapshot();
        writeln!(stdout)?;
        if args.profile_json {
            let json = serde_json::to_string_pretty(&snapshot)
                .context("Failed to serialize profile")?;
            writeln!(stdout, "{json}")?;
        } else {
            write!(stdout, "{snapshot}")?;
        }
    }

    stdout.flush()?;

    result
}
