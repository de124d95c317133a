use anyhow::Result;
use clap::{Parser, Subcommand};
use etlcore::{EngineError, Node, NodeStatus, RunEvent, RunReport, Workflow};
use etlruntime::{ConnectorRegistry, PipelineRuntime, RuntimeConfig, Validator};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "etl")]
#[command(about = "Data integration workflow CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file without executing it
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available connectors
    Connectors,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run {
            file,
            json,
            verbose,
        } => {
            init_logging(verbose);
            run_workflow(file, json).await
        }
        Commands::Validate { file } => validate_workflow(&file),
        Commands::Connectors => {
            list_connectors();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { output } => create_example_workflow(&output).map(|_| ExitCode::SUCCESS),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn built_in_registry() -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    etlconnectors::register_all(&mut registry);
    registry
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    let raw = std::fs::read_to_string(file)?;
    Ok(serde_json::from_str(&raw)?)
}

async fn run_workflow(file: PathBuf, json: bool) -> Result<ExitCode> {
    println!("🚀 Loading workflow from: {}", file.display());
    let workflow = load_workflow(&file)?;
    println!(
        "📋 Workflow: {} ({} nodes, {} edges)",
        workflow.name,
        workflow.nodes.len(),
        workflow.edges.len()
    );
    println!();

    let runtime =
        PipelineRuntime::with_registry(Arc::new(built_in_registry()), RuntimeConfig::default());

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(&event);
        }
    });

    // Ctrl-C stops scheduling; in-flight connectors finish or observe the
    // token cooperatively.
    let cancellation = CancellationToken::new();
    {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("⚠️  cancelling run, waiting for in-flight nodes...");
                cancellation.cancel();
            }
        });
    }

    let result = runtime.execute(&workflow, cancellation).await;

    // Let the event listener drain before printing the summary
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    match result {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Err(EngineError::Invalid(validation)) => {
            eprintln!("❌ Workflow is invalid:");
            for issue in &validation.issues {
                eprintln!("   • {}", issue);
            }
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::RunStarted { .. } => println!("▶️  Run started"),
        RunEvent::NodeStarted {
            node_id, connector, ..
        } => {
            println!("  ⚡ Starting node: {} ({})", node_id, connector);
        }
        RunEvent::NodeSucceeded {
            node_id,
            rows_loaded,
            duration_ms,
            ..
        } => match rows_loaded {
            Some(rows) => println!(
                "  ✅ Node {} loaded {} row(s) in {}ms",
                node_id, rows, duration_ms
            ),
            None => println!("  ✅ Node {} completed in {}ms", node_id, duration_ms),
        },
        RunEvent::NodeFailed { node_id, error, .. } => {
            println!("  ❌ Node {} failed: {}", node_id, error);
        }
        RunEvent::NodeSkipped { node_id, .. } => {
            println!("  ⏭️  Node {} skipped", node_id);
        }
        RunEvent::NodeMessage {
            node_id, message, ..
        } => match message {
            etlcore::NodeMessage::Info { message } => {
                println!("     ℹ️  [{}] {}", node_id, message);
            }
            etlcore::NodeMessage::Warning { message } => {
                println!("     ⚠️  [{}] {}", node_id, message);
            }
            etlcore::NodeMessage::Progress { percent, message } => match message {
                Some(msg) => println!("     📊 [{}] {:.0}% - {}", node_id, percent, msg),
                None => println!("     📊 [{}] {:.0}%", node_id, percent),
            },
        },
        RunEvent::RunCompleted {
            status, duration_ms, ..
        } => {
            if *status == etlcore::WorkflowStatus::Success {
                println!("✨ Run completed successfully in {}ms", duration_ms);
            } else {
                println!("💥 Run failed after {}ms", duration_ms);
            }
        }
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!("📊 Run Summary:");
    println!("   Run ID: {}", report.run_id);
    println!("   Status: {:?}", report.status);

    let mut results: Vec<_> = report.nodes.values().collect();
    results.sort_by(|a, b| a.node_id.cmp(&b.node_id));
    for result in results {
        let icon = match result.status {
            NodeStatus::Success => "✅",
            NodeStatus::Failed => "❌",
            NodeStatus::Skipped => "⏭️ ",
            NodeStatus::Pending | NodeStatus::Running => "❓",
        };
        let mut line = format!(
            "   {} {:<20} {:?} ({}ms)",
            icon, result.node_id, result.status, result.duration_ms
        );
        if let Some(rows) = result.rows_loaded {
            line.push_str(&format!(", {} row(s) loaded", rows));
        }
        if let Some(error) = &result.error {
            line.push_str(&format!(" - {}", error));
        }
        println!("{}", line);
    }
}

fn validate_workflow(file: &Path) -> Result<ExitCode> {
    println!("🔍 Validating workflow: {}", file.display());
    let workflow = load_workflow(file)?;

    let registry = built_in_registry();
    let report = Validator::new(&registry).validate(&workflow);

    if report.is_valid() {
        println!(
            "✅ Workflow is valid: {} ({} nodes, {} edges)",
            workflow.name,
            workflow.nodes.len(),
            workflow.edges.len()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("❌ Found {} issue(s):", report.issues.len());
        for issue in &report.issues {
            eprintln!("   • {}", issue);
        }
        Ok(ExitCode::from(2))
    }
}

fn list_connectors() {
    println!("📦 Available connectors:");
    println!();
    let registry = built_in_registry();
    for (kind, key) in registry.connector_keys() {
        println!("  • {:<16} {}", kind.to_string(), key);
    }
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut workflow = Workflow::new("Example Pipeline");

    let source = workflow.add_node(
        Node::source("extract", "inline")
            .with_config("columns", serde_json::json!(["name", "count"]))
            .with_config(
                "rows",
                serde_json::json!([["widgets", 3], ["gadgets", 5]]),
            )
            .with_position(100.0, 100.0),
    );
    let transform = workflow.add_node(
        Node::transformation("passthrough", "identity").with_position(300.0, 100.0),
    );
    let sink =
        workflow.add_node(Node::destination("print", "console").with_position(500.0, 100.0));

    workflow.connect(source, transform.clone());
    workflow.connect(transform, sink);

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  etl run --file {}", output.display());

    Ok(())
}
