use anyhow::Result;
use clap::Parser;
use execdiff::cli::{Cli, OutputFormat};
use execdiff::config::DiffConfig;
use execdiff::diff::{compare_traces, DiffReport};
use execdiff::graph::NodeId;
use execdiff::step_trace::StepTrace;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
///
/// `--debug` turns on everything; otherwise `RUST_LOG` alone selects what is
/// logged, and nothing is logged when it is unset.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file (or defaults) with command-line overrides applied
fn load_config(args: &Cli) -> Result<DiffConfig> {
    let mut config = match &args.config {
        Some(path) => DiffConfig::from_file(path)?,
        None => DiffConfig::default(),
    };

    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(skip_cost) = args.skip_cost {
        config.skip_cost = skip_cost;
    }

    config.validate()?;
    Ok(config)
}

fn print_unmatched(label: &str, trace: &StepTrace, nodes: &[NodeId]) {
    if nodes.is_empty() {
        return;
    }
    println!();
    println!("Only in {} ({} steps):", label, nodes.len());
    for &node in nodes {
        let depth = trace.graph.depth(node);
        println!("  {:indent$}[{}] {}", "", node, trace.name(node), indent = depth * 2);
    }
}

fn print_text_report(report: &DiffReport, a: &StepTrace, b: &StepTrace, show_pairs: bool) {
    println!("=== Trace Diff ({}) ===", report.strategy);
    println!("Total cost:  {}", report.total_cost);
    println!("Similarity:  {:.2}%", report.similarity() * 100.0);
    println!(
        "Matched:     {} of {} / {} steps",
        report.matched_count(),
        report.nodes_a,
        report.nodes_b
    );

    let unmatched_a = report.unmatched_a();
    let unmatched_b = report.unmatched_b();
    println!("Unmatched:   {} in A, {} in B", unmatched_a.len(), unmatched_b.len());

    if report.truncated {
        println!("Warning: a resource limit was reached; the diff is best-effort");
    }

    print_unmatched("A", a, &unmatched_a);
    print_unmatched("B", b, &unmatched_b);

    if show_pairs && !report.pairs.is_empty() {
        println!();
        println!("Matched pairs:");
        for pair in &report.pairs {
            println!(
                "  [{}] {} <-> [{}] {}",
                pair.a,
                a.name(pair.a),
                pair.b,
                b.name(pair.b)
            );
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = load_config(&args)?;
    let a = StepTrace::from_file(&args.trace_a)?;
    let b = StepTrace::from_file(&args.trace_b)?;

    let report = compare_traces(&a, &b, &config)?;

    match args.format {
        OutputFormat::Text => print_text_report(&report, &a, &b, args.show_pairs),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}
