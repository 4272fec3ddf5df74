use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use pbmt_cli::commands::decode_ops::{decode_cmd, DecodeOptions};
use pbmt_cli::commands::explain_ops::{explain_cmd, ExplainOptions};
use pbmt_cli::commands::SearchOverrides;

#[derive(Parser)]
#[command(name = "pbmtool", about = "Phrase-based decoder diagnostics")]
struct Cli {
    /// Write JSON trace spans to this directory (needs the `trace` feature)
    #[arg(long, global = true)]
    trace_dir: Option<PathBuf>,
    /// Log search events to stderr (needs the `trace` feature)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct SearchArgs {
    /// Settings TOML (defaults to the embedded settings)
    #[arg(long)]
    settings: Option<String>,
    /// Beam strategy: "sorted" or "cube_pruning"
    #[arg(long)]
    strategy: Option<String>,
    /// Hypotheses kept per beam
    #[arg(long)]
    beam_size: Option<usize>,
    /// Maximum source jump, or "unlimited"
    #[arg(long)]
    distortion: Option<String>,
}

impl SearchArgs {
    fn overrides(&self) -> SearchOverrides {
        SearchOverrides {
            strategy: self.strategy.clone(),
            beam_size: self.beam_size,
            distortion: self.distortion.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Decode every line of a file (or stdin with "-")
    Decode {
        /// JSON model fixture
        fixture_file: String,
        /// Input file, one tokenized sentence per line
        input_file: String,
        #[command(flatten)]
        search: SearchArgs,
        /// Number of translations per sentence
        #[arg(short, long, default_value = "1")]
        n: usize,
        /// Decode worker threads (overrides engine.threads)
        #[arg(long)]
        threads: Option<usize>,
        /// Output JSONL instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the rule grid, search counters and top derivations for a sentence
    Explain {
        /// JSON model fixture
        fixture_file: String,
        /// Tokenized source sentence
        sentence: String,
        #[command(flatten)]
        search: SearchArgs,
        /// Number of derivations to show
        #[arg(short, long, default_value = "10")]
        n: usize,
        /// Forced-decoding reference (repeatable)
        #[arg(long)]
        force: Vec<String>,
        /// Target prefix the output must start with
        #[arg(long)]
        prefix: Option<String>,
        /// Filter to derivations containing this target string
        #[arg(long)]
        target: Option<String>,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Some(dir) = &cli.trace_dir {
        pbmt_engine::trace_init::init_tracing(dir);
    } else if cli.verbose {
        pbmt_engine::trace_init::init_stderr_tracing();
    }

    match cli.command {
        Command::Decode {
            fixture_file,
            input_file,
            search,
            n,
            threads,
            json,
        } => decode_cmd(DecodeOptions {
            fixture_file: &fixture_file,
            input_file: &input_file,
            settings: search.settings.as_deref(),
            overrides: search.overrides(),
            n,
            threads,
            json,
        }),

        Command::Explain {
            fixture_file,
            sentence,
            search,
            n,
            force,
            prefix,
            target,
            json,
        } => explain_cmd(ExplainOptions {
            fixture_file: &fixture_file,
            sentence: &sentence,
            settings: search.settings.as_deref(),
            overrides: search.overrides(),
            n,
            force: &force,
            prefix: prefix.as_deref(),
            target: target.as_deref(),
            json,
        }),
    }
}
