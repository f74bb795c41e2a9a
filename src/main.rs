use clap::{Parser, Subcommand};
use colored::Colorize;
use royalbit_enrich::cli::{self, RunOptions};
use royalbit_enrich::error::EnrichResult;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "enrich")]
#[command(about = "Resolve formula variables against a record tree, ready for evaluation")]
#[command(long_about = "Enrich - formula variable enrichment

Takes the formula parser's output (formula groups with plain variables and
aggregation clauses) and a hierarchical record tree, and resolves every
variable to concrete values per formula and per entity instance.

COMMANDS:
  run       - Enrich formula groups against a record tree
  validate  - Check formula group files without enriching
  filter    - Show how a filter expression's variables resolve

EXAMPLES:
  enrich run extract_formulas.json data_tree.json -o bundle.json
  enrich run formulas.yaml tree.json --parallel
  enrich filter \"qty > e00001v\" --bind e00001v=5

LOGGING:
  RUST_LOG controls log output (stderr), e.g. RUST_LOG=royalbit_enrich=debug")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Enrich formula groups against a record tree.

Each formula group is enriched once per entity instance. Plain variables
take the first value found inside the instance subtree; aggregations are
scoped to the instance subtree unless marked global. Filter expressions
have their right-hand variables resolved per instance before matching.

Without --output the enriched results are printed to stdout as JSON and
the summary goes to stderr. With --output the full evaluator bundle
(enriched, extracted_formulas, tree) is written to the file.")]
    /// Enrich formula groups against a record tree
    Run {
        /// Formula groups file (JSON, or YAML by extension)
        formulas: PathBuf,

        /// Record tree file (JSON, or YAML by extension)
        tree: PathBuf,

        /// Write the evaluator bundle to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Enrich entity instances in parallel
        #[arg(short, long, env = "ENRICH_PARALLEL")]
        parallel: bool,

        /// Regex matching variable identifiers
        #[arg(long, env = "ENRICH_VARIABLE_PATTERN")]
        variable_pattern: Option<String>,

        /// Show debug logs and extra counts
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate formula group files without enriching
    Validate {
        /// Formula group file(s) to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    #[command(long_about = "Show how a filter expression resolves.

Lists the variables found on the right-hand side of comparisons or
already written as placeholders, the placeholder form of the expression, and with --bind the final expression
with literals substituted. Bound values are read as JSON when possible,
as text otherwise.

EXAMPLE:
  enrich filter \"status == e00002v and qty > e00001v\" \\
      --bind e00001v=5 --bind e00002v=active")]
    /// Show how a filter expression's variables resolve
    Filter {
        /// Filter expression
        expression: String,

        /// Variable binding as name=value (repeatable)
        #[arg(short, long = "bind")]
        binds: Vec<String>,

        /// YAML config file (variable pattern, placeholder delimiters)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Regex matching variable identifiers
        #[arg(long, env = "ENRICH_VARIABLE_PATTERN")]
        variable_pattern: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "enrich=debug,royalbit_enrich=debug"
    } else {
        "enrich=info,royalbit_enrich=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

fn execute(cli: Cli) -> EnrichResult<()> {
    match cli.command {
        Commands::Run {
            formulas,
            tree,
            output,
            config,
            parallel,
            variable_pattern,
            verbose,
        } => {
            init_tracing(verbose);
            cli::run(
                formulas,
                tree,
                RunOptions {
                    output,
                    config,
                    parallel,
                    variable_pattern,
                    verbose,
                },
            )
        }

        Commands::Validate { files } => {
            init_tracing(false);
            cli::validate(files)
        }

        Commands::Filter {
            expression,
            binds,
            config,
            variable_pattern,
        } => {
            init_tracing(false);
            cli::filter(expression, binds, config, variable_pattern)
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = execute(cli) {
        eprintln!("{} {}", "❌ Error:".bold().red(), e);
        std::process::exit(1);
    }
}
