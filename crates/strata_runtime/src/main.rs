//! Strata Runtime
//!
//! Boots a compositor thread, runs one memory-manager pass over a demo
//! client and prints the resulting usage stats

mod demo;

use anyhow::{Context, Result};
use demo::DemoClient;
use std::sync::Arc;
use strata_compositor::{DebugRectHistory, DebugRectSettings};
use strata_env::MIB;
use strata_gpu::{CommandBufferStub, GpuMemoryConfig, GpuMemoryManager, GpuMemoryManagerClient};
use strata_sched::{TaskRunner, ThreadTaskRunner};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize logging; RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Strata v{}", strata_gpu::VERSION);

    let config = match std::env::args().nth(1) {
        Some(path) => GpuMemoryConfig::from_path(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => GpuMemoryConfig::default(),
    };
    let limits = config.limits();
    tracing::info!(
        platform = %limits.platform,
        default_budget_mib = limits.default_total_bytes / MIB,
        "platform limits"
    );

    let runner = ThreadTaskRunner::spawn("strata-compositor")?;
    let client = Arc::new(DemoClient::new());

    // The manager belongs to the compositor thread, so build it there.
    let manager = {
        let target: Arc<dyn TaskRunner> = runner.clone();
        let manager_client: Arc<dyn GpuMemoryManagerClient> = client.clone();
        runner.call_blocking(move || GpuMemoryManager::new(manager_client, target, config))??
    };

    // Tracking groups live and report on the compositor thread too.
    let groups = {
        let manager = Arc::clone(&manager);
        let client = Arc::clone(&client);
        runner.call_blocking(move || {
            client
                .tabs()
                .into_iter()
                .enumerate()
                .map(|(pid, tab)| {
                    let group = manager.create_tracking_group(pid as u32 + 1);
                    group.track_memory_allocated_change(0, tab.requested_memory_bytes());
                    group
                })
                .collect::<Vec<_>>()
        })?
    };

    manager.schedule_manage(true);
    // Rendezvous: the pass posted above has run once this returns.
    let stats = {
        let manager = Arc::clone(&manager);
        runner.call_blocking(move || manager.get_video_memory_usage_stats())?
    };

    for tab in client.tabs() {
        let allocation = tab.allocation();
        tracing::info!(
            tab = tab.name(),
            bytes = allocation.gpu_resource_size_in_bytes,
            backbuffer = allocation.suggest_have_backbuffer,
            frontbuffer = allocation.suggest_have_frontbuffer,
            "allocation"
        );
    }
    tracing::info!(allocation = ?client.canvas.allocation(), "canvas allocation");

    let mut history = DebugRectHistory::new();
    history.save_debug_rects_for_current_frame(
        client.foreground.frame(),
        &[],
        &DebugRectSettings::all(),
    );
    tracing::debug!(
        rects = %serde_json::to_string(history.debug_rects())?,
        "foreground debug rects"
    );

    println!("{}", stats.to_json_pretty()?);

    let summary = manager.metrics_summary();
    tracing::info!(passes = summary.passes, avg_ms = summary.average_ms, "manager metrics");

    {
        let manager = Arc::clone(&manager);
        runner.call_blocking(move || {
            drop(groups);
            manager.shutdown();
        })?;
    }
    runner.stop();

    tracing::info!("Runtime shut down");
    Ok(())
}
