//! Inspection agent host.
//!
//! # Architecture Overview
//!
//! ```text
//!   client ──POST /v1/agent──▶ net::Acceptor ──▶ http::AgentService
//!                                                   │
//!                                                   ▼
//!                                        protocol::ProtocolDispatcher
//!                                          │                   │
//!                              affinity Any│                   │affinity Main
//!                                          ▼                   ▼
//!                                        agent::Agent ◀── affinity::MainThread
//!                                          │
//!              ┌───────────────────────────┼────────────────────────┐
//!              ▼                           ▼                        ▼
//!   representation::Pipeline   interactive proxies        push::PushChannel
//!   (cache::TypeMap)           (cache::IdentityCache)     (long-poll pump)
//! ```
//!
//! The binary hosts a small demo object graph so the protocol can be
//! exercised with `agent-cli`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use inspection_agent::agent::{NamedValueEvaluator, StaticViewHierarchy};
use inspection_agent::config::{load_config, AgentConfig, ConfigWatcher};
use inspection_agent::lifecycle::{shutdown_on_signal, Shutdown};
use inspection_agent::model::{
    well_known, EnumInfo, EnumInstance, ErrorValue, Integral, IntegralKind, ListObject, ObjectRef,
    RecordObject, RecordTypeExt, RuntimeType, TypeKind, Value,
};
use inspection_agent::observability::logging::{self, LogLevelControl};
use inspection_agent::observability::metrics;
use inspection_agent::representation::{Candidate, TypeMapProvider};
use inspection_agent::{Agent, AgentServer};

#[derive(Parser)]
#[command(name = "inspection-agent")]
#[command(about = "Hosts an inspection agent over a demo object graph", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds to wait for open connections on shutdown.
    #[arg(long, default_value_t = 5)]
    drain_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AgentConfig::default(),
    };

    let log_handle = Arc::new(logging::init(&config.observability.log_level)?);

    tracing::info!("inspection-agent v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        port_min = config.listener.port_min,
        port_max = config.listener.port_max,
        max_connections = config.listener.max_connections,
        slice_size = config.representation.slice_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the life of the process.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let control = Arc::clone(&log_handle);
            tokio::spawn(async move {
                while let Some(update) = updates.recv().await {
                    let level = update.observability.log_level;
                    match control.set_level(&level) {
                        Ok(()) => tracing::info!(level = %level, "Log level reloaded"),
                        Err(e) => tracing::warn!(error = %e, "Could not apply reloaded log level"),
                    }
                }
            });
            Some(watcher)
        }
        None => None,
    };

    let (globals, view) = demo_graph();
    let agent = Agent::builder(
        config.identity.agent_type.clone(),
        config.identity.application_name.clone(),
    )
    .config(&config)
    .evaluator(Arc::new(globals))
    .view_hierarchy(Arc::new(view))
    .log_control(log_handle)
    .build()?;
    let registering = Arc::clone(&agent);
    tokio::task::spawn_blocking(move || registering.add_provider(Arc::new(demo_provider())))
        .await??;

    let mut server = AgentServer::start(Arc::clone(&agent), &config).await?;
    println!("{}", server.endpoint_uri());

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));
    shutdown.subscribe().recv().await;

    tracing::info!("Shutting down");
    server.stop(Duration::from_secs(cli.drain_secs)).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Globals for the evaluator and a root for the `demo` view hierarchy.
fn demo_graph() -> (NamedValueEvaluator, StaticViewHierarchy) {
    let types = well_known::types();

    let color = RuntimeType::builder("Demo.Color", TypeKind::Enum)
        .enumeration(EnumInfo {
            underlying: IntegralKind::I32,
            is_flags: false,
            variants: vec![
                ("Red".to_string(), Integral::Signed(0)),
                ("Green".to_string(), Integral::Signed(1)),
                ("Blue".to_string(), Integral::Signed(2)),
            ],
        })
        .build();

    let point = RuntimeType::class("Demo.Point")
        .base(&types.object)
        .record_field("X", &types.int32)
        .record_field("Y", &types.int32)
        .build();

    let shape = RuntimeType::class("Demo.Shape")
        .base(&types.object)
        .record_field("Name", &types.string)
        .record_field("Origin", &point)
        .record_field("Fill", &color)
        .build();

    let origin: ObjectRef = Arc::new(
        RecordObject::new(&point)
            .with("X", 3)
            .with("Y", 4)
            .with_display("(3, 4)"),
    );
    let square: ObjectRef = Arc::new(
        RecordObject::new(&shape)
            .with("Name", "square")
            .with("Origin", origin.clone())
            .with(
                "Fill",
                Value::Enum(EnumInstance {
                    ty: Arc::clone(&color),
                    value: Integral::Signed(2),
                }),
            ),
    );
    let numbers: ObjectRef = Arc::new(ListObject::new((1..=25).map(Value::I32).collect()));
    let shapes: ObjectRef = Arc::new(ListObject::new(vec![square.clone().into()]));

    let globals = NamedValueEvaluator::new()
        .with("answer", 42)
        .with("pi", std::f64::consts::PI)
        .with("origin", origin)
        .with("square", square)
        .with("numbers", numbers)
        .with(
            "failure",
            ErrorValue::new("InvalidOperation", "demo failure")
                .caused_by(ErrorValue::new("Timeout", "inner cause")),
        );

    let view = StaticViewHierarchy::new().with_root("demo", shapes);
    (globals, view)
}

/// Adds a compact "x, y" representation to points.
fn demo_provider() -> TypeMapProvider {
    let provider = TypeMapProvider::new("demo");
    provider.add_representer("Demo.Point", false, |value: &Value| {
        let Some(record) = value
            .as_object()
            .and_then(|o| o.as_any().downcast_ref::<RecordObject>())
        else {
            return Ok(None);
        };
        let text = format!(
            "{}, {}",
            record.get("X").display_string(),
            record.get("Y").display_string()
        );
        Ok(Some(Candidate::new(text)))
    });
    provider
}
