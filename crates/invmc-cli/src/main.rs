//! Command-line interface for the invariant model checker.

mod input;

use clap::{Parser, Subcommand, ValueEnum};
use input::{GraphFile, LoadedGraph};
use invmc_mc::{
    Backend, CheckConfig, CheckOutcome, Counterexample, InvariantSet, TransitiveClosure,
};
use invmc_model::{EventGraph, EventType, Invariant, InvariantError, Relation};
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI error with source context for pretty printing.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("failed to read file: {message}")]
    IoError { message: String },

    #[error("invalid graph description: {message}")]
    #[diagnostic(code(invmc::graph_error))]
    GraphError { message: String },

    #[error("{message}")]
    #[diagnostic(code(invmc::invariant_syntax))]
    InvariantSyntax {
        message: String,
        #[source_code]
        src: NamedSource<Arc<String>>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("invalid invariant: {message}")]
    #[diagnostic(code(invmc::invariant_error))]
    InvariantError { message: String },

    #[error("check error in '{invariant}': {message}")]
    #[diagnostic(code(invmc::check_error))]
    CheckError { invariant: String, message: String },

    #[error("{message}")]
    Other { message: String },
}

impl CliError {
    fn from_invariant_error(e: InvariantError, text: &str, origin: &str) -> Self {
        match e.span() {
            Some((offset, len)) => CliError::InvariantSyntax {
                message: e.to_string(),
                src: NamedSource::new(origin, Arc::new(text.to_string())),
                span: (offset, len).into(),
            },
            None => CliError::InvariantError {
                message: e.to_string(),
            },
        }
    }
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "invmc", version)]
#[command(about = "Temporal invariant checker for event graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    /// Fixpoint exploration with tracing automata
    Automaton,
    /// Transitive closure reachability (untimed invariants only)
    Closure,
    /// Run both on untimed invariants and fail if they disagree
    CrossCheck,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Automaton => Backend::Automaton,
            BackendArg::Closure => Backend::Closure,
            BackendArg::CrossCheck => Backend::CrossCheck,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check invariants against an event graph
    Check {
        /// Graph description (JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Extra invariant, e.g. "a AFby<=5 b" (repeatable)
        #[arg(short, long, value_name = "INVARIANT")]
        invariant: Vec<String>,

        /// Checking backend
        #[arg(long, value_enum, default_value = "automaton")]
        backend: BackendArg,

        /// Maximum worklist iterations per invariant (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_iterations: usize,

        /// Maximum seconds per invariant (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_time: u64,

        /// Disable parallel checking of the invariant set
        #[arg(long)]
        no_parallel: bool,

        /// Number of threads (0 = use all available)
        #[arg(long, default_value = "0")]
        threads: usize,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the transitive closure of one relation
    Closure {
        /// Graph description (JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Relation to follow
        #[arg(short, long, default_value = "t")]
        relation: String,

        /// Leave out nodes of this event type
        #[arg(long, value_name = "EVENT")]
        excluding: Option<String>,
    },
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let filter = if matches!(&cli.command, Commands::Check { verbose: true, .. }) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        Commands::Check {
            file,
            invariant,
            backend,
            max_iterations,
            max_time,
            no_parallel,
            threads,
            verbose: _,
        } => cmd_check(
            &file,
            &invariant,
            CheckConfig {
                backend: backend.into(),
                max_iterations,
                max_time_secs: max_time,
                parallel: !no_parallel,
                num_threads: threads,
            },
        ),
        Commands::Closure {
            file,
            relation,
            excluding,
        } => cmd_closure(&file, &relation, excluding.as_deref()),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(1);
        }
    }
}

fn load(file: &PathBuf) -> CliResult<LoadedGraph> {
    let text = fs::read_to_string(file).map_err(|e| CliError::IoError {
        message: format!("{}: {}", file.display(), e),
    })?;
    let description = GraphFile::from_json(&text).map_err(|e| CliError::GraphError {
        message: e.to_string(),
    })?;
    description.into_graph().map_err(|e| CliError::GraphError {
        message: e.to_string(),
    })
}

/// Parses invariants from the graph file followed by those given on the
/// command line.
fn parse_invariants(from_file: &[String], extra: &[String]) -> CliResult<InvariantSet> {
    let mut set = InvariantSet::new();
    let sources = from_file
        .iter()
        .map(|t| (t, "graph file"))
        .chain(extra.iter().map(|t| (t, "--invariant")));
    for (text, origin) in sources {
        let invariant = text
            .parse::<Invariant>()
            .map_err(|e| CliError::from_invariant_error(e, text, origin))?;
        if !set.add(invariant) {
            info!(invariant = %text, "duplicate invariant ignored");
        }
    }
    if set.is_empty() {
        return Err(CliError::Other {
            message: "no invariants to check; add them to the graph file or pass --invariant"
                .to_string(),
        });
    }
    Ok(set)
}

/// Counterexample with each node written as `key:event`.
fn format_counterexample(cx: &Counterexample, loaded: &LoadedGraph) -> String {
    cx.render_with(|node| {
        format!(
            "{}:{}",
            loaded.names[node.index()],
            loaded.graph.event_type(node)
        )
    })
}

/// Returns the process exit code: 0 when every invariant holds, 1 on a
/// violation or check error, 2 when only limits prevented a verdict.
fn cmd_check(file: &PathBuf, extra: &[String], config: CheckConfig) -> CliResult<i32> {
    let loaded = load(file)?;
    let set = parse_invariants(&loaded.invariants, extra)?;

    info!(
        nodes = loaded.graph.node_count(),
        invariants = set.len(),
        "checking..."
    );
    let start = Instant::now();
    let reports = set.check_all(&loaded.graph, &config);
    let elapsed = start.elapsed();

    let (mut violated, mut inconclusive, mut failed) = (0, 0, 0);
    println!();
    for report in reports {
        match report.result {
            Ok(CheckOutcome::Holds { iterations }) => {
                println!("{}: OK ({} iterations)", report.invariant, iterations);
            }
            Ok(CheckOutcome::Violated {
                counterexample,
                iterations,
            }) => {
                violated += 1;
                println!("{}: VIOLATED ({} iterations)", report.invariant, iterations);
                if let Some(cx) = counterexample {
                    println!("  Counterexample ({} nodes):", cx.len());
                    println!("    {}", format_counterexample(&cx, &loaded));
                }
            }
            Ok(CheckOutcome::Inconclusive { reason, iterations }) => {
                inconclusive += 1;
                println!(
                    "{}: INCONCLUSIVE, {} ({} iterations)",
                    report.invariant, reason, iterations
                );
            }
            Err(e) => {
                failed += 1;
                println!("{}: ERROR", report.invariant);
                let err = CliError::CheckError {
                    invariant: report.invariant.to_string(),
                    message: e.to_string(),
                };
                eprintln!("{:?}", miette::Report::new(err));
            }
        }
    }
    println!();
    println!(
        "{} invariants, {} violated, {} inconclusive, {} errors in {:.2}s",
        set.len(),
        violated,
        inconclusive,
        failed,
        elapsed.as_secs_f64()
    );

    Ok(if violated > 0 || failed > 0 {
        1
    } else if inconclusive > 0 {
        2
    } else {
        0
    })
}

fn cmd_closure(file: &PathBuf, relation: &str, excluding: Option<&str>) -> CliResult<i32> {
    let loaded = load(file)?;
    let relation = Relation::new(relation);
    let closure = match excluding {
        Some(event) => TransitiveClosure::excluding(&loaded.graph, &relation, &EventType::new(event)),
        None => TransitiveClosure::new(&loaded.graph, &relation),
    };

    for node in loaded.graph.nodes() {
        let targets: Vec<&str> = closure
            .reachable_from(node)
            .map(|t| loaded.names[t.index()].as_str())
            .collect();
        if targets.is_empty() {
            continue;
        }
        println!("{} -> {}", loaded.names[node.index()], targets.join(", "));
    }
    info!(
        relation = %relation,
        pairs = closure.pair_count(),
        "closure computed"
    );
    Ok(0)
}
