//! Ingestion CLI.
//!
//! Ingests one or more files into an in-memory evidence store, resolves
//! the dependency graph, and prints the results as JSON.
//!
//! ## Usage
//!
//! ```bash
//! servicemap_ingest [--type <adapter>] [--config <file>] <file>...
//! ```
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development
//! - `SNAPSHOT_DIR`: where GraphML exports land (optional)
//! - `INGESTION_ADAPTERS`: comma list of adapters to initialize
//!
//! ## Exit codes
//!
//! 0 success, 2 parse error, 3 persistence error, 4 cancelled.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use servicemap_kernel::{
    AnalysisKind, IngestError, IngestOptions, InMemoryEvidenceStore, KernelConfig,
    ServiceGraphKernel,
};

const EXIT_PARSE: u8 = 2;
const EXIT_PERSISTENCE: u8 = 3;
const EXIT_CANCELLED: u8 = 4;

/// Initialize the tracing subscriber with JSON or pretty format.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "servicemap_ingest=info,servicemap_kernel=info".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}

struct Args {
    source_type: Option<String>,
    config: Option<PathBuf>,
    files: Vec<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        source_type: None,
        config: None,
        files: Vec::new(),
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--type" | "-t" => {
                args.source_type = Some(iter.next().ok_or("--type needs a value")?);
            }
            "--config" | "-c" => {
                args.config = Some(PathBuf::from(iter.next().ok_or("--config needs a value")?));
            }
            "--help" | "-h" => {
                return Err("usage: servicemap_ingest [--type <adapter>] [--config <file>] <file>...".to_string());
            }
            other => args.files.push(PathBuf::from(other)),
        }
    }
    if args.files.is_empty() {
        return Err("no input files given (try --help)".to_string());
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(EXIT_PARSE);
        }
    };

    let config = match &args.config {
        Some(path) => match KernelConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "cannot load configuration");
                return ExitCode::from(EXIT_PARSE);
            }
        },
        None => KernelConfig::from_env(),
    };

    let kernel = ServiceGraphKernel::new(Arc::new(InMemoryEvidenceStore::new()), config);

    // Cancel in-flight ingestion on Ctrl+C.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancellation requested");
                cancel.cancel();
            }
        });
    }

    let mut results = Vec::new();
    let mut persistence_failures = 0usize;

    for file in &args.files {
        let mut options = IngestOptions::new();
        if let Some(source_type) = &args.source_type {
            options = options.with_source_type(source_type.clone());
        }

        match kernel.ingest_file(file, options, &cancel).await {
            Ok(result) => {
                if result.claims_saved < result.claims_after_normalization {
                    persistence_failures +=
                        result.claims_after_normalization - result.claims_saved;
                }
                results.push(result);
            }
            Err(IngestError::Cancelled { source_id }) => {
                error!(source_id = %source_id, "ingestion cancelled");
                return ExitCode::from(EXIT_CANCELLED);
            }
            Err(e @ IngestError::Adapter { .. }) => {
                error!(error = %e, "ingestion failed");
                return ExitCode::from(EXIT_PARSE);
            }
        }
    }

    let graph = match kernel.resolve().await {
        Ok(graph) => graph,
        Err(e) => {
            error!(error = %e, "resolution failed");
            return ExitCode::from(EXIT_PERSISTENCE);
        }
    };

    let topology = kernel.analyze(AnalysisKind::Topology).await.ok();
    let report = serde_json::json!({
        "ingestions": results,
        "graph_fingerprint": graph.fingerprint(),
        "vertices": graph.vertex_count(),
        "edges": graph.edge_count(),
        "topology": topology,
    });
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!(error = %e, "cannot render report");
            return ExitCode::from(EXIT_PERSISTENCE);
        }
    }

    if let Ok(Some(path)) = kernel.export(&graph).map_err(|e| {
        error!(error = %e, "export failed");
        e
    }) {
        info!(path = %path.display(), "snapshot written");
    }

    if persistence_failures > 0 {
        warn!(dropped = persistence_failures, "some claims were not persisted");
        return ExitCode::from(EXIT_PERSISTENCE);
    }
    ExitCode::SUCCESS
}
