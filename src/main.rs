use anyhow::Context;
use lockstep::clock::LocalSessionClock;
use lockstep::config::SyncConfig;
use lockstep::core::{AssetRef, ParticipantId};
use lockstep::hardware::{SimulatedDeviceFactory, SimulatedDeviceSettings};
use lockstep::replication::{FollowerHandle, Session};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// A simulated audience member
struct Participant {
    name: &'static str,
    /// Session clock estimation error (ms)
    clock_offset_ms: i64,
    settings: SimulatedDeviceSettings,
    autoplay: bool,
}

fn participants() -> Vec<Participant> {
    vec![
        Participant {
            name: "audience-fast",
            clock_offset_ms: 12,
            settings: SimulatedDeviceSettings {
                drift: 0.02,
                ..Default::default()
            },
            autoplay: true,
        },
        Participant {
            name: "audience-slow",
            clock_offset_ms: -20,
            settings: SimulatedDeviceSettings {
                drift: -0.01,
                startup_latency_ms: 300,
                load_delay_ms: 400,
                ..Default::default()
            },
            autoplay: true,
        },
        Participant {
            name: "audience-muted",
            clock_offset_ms: 5,
            settings: SimulatedDeviceSettings::default(),
            autoplay: false,
        },
    ]
}

async fn pause_for(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

async fn run_demo(config: SyncConfig) -> anyhow::Result<()> {
    let clock = LocalSessionClock::new();
    let session = Session::start(ParticipantId::new("conductor"), config, Arc::new(clock.clone()));
    let conductor = session.conductor();

    let mut handles: Vec<(FollowerHandle, SimulatedDeviceFactory)> = Vec::new();
    for participant in participants() {
        let local = clock.participant(participant.clock_offset_ms);
        let factory = SimulatedDeviceFactory::new(Arc::new(local.clone()), participant.settings);
        factory.set_autoplay_allowed(participant.autoplay);
        let handle = session.join(
            ParticipantId::new(participant.name),
            Arc::new(local),
            Arc::new(factory.clone()),
        );
        handles.push((handle, factory));
    }

    conductor.set_assets(AssetRef::new("intro", "sim://intro")).await?;
    pause_for(500).await;
    conductor.play().await?;
    pause_for(4_000).await;

    // user gesture on the muted participant
    for (handle, factory) in &handles {
        if handle.id().as_str() == "audience-muted" {
            info!("Simulating user gesture on {}", handle.id());
            factory.set_autoplay_allowed(true);
            handle.retry_play().await?;
        }
    }
    pause_for(4_000).await;

    conductor.seek(30.0).await?;
    pause_for(4_000).await;
    conductor.reanchor(-40).await?;
    pause_for(3_000).await;

    conductor.pause().await?;
    pause_for(1_000).await;
    conductor.play().await?;
    pause_for(3_000).await;

    for stats in session.stats().await {
        info!(
            follower = %stats.follower_id,
            reports = stats.reports,
            jumps = stats.jumps,
            last_smoothed_ms = ?stats.last_smoothed_ms,
            max_abs_smoothed_ms = stats.max_abs_smoothed_ms,
            boost = stats.last_boost,
            latency_ms = ?stats.last_latency_ms,
            last_report = %stats.last_received.format("%H:%M:%S%.3f"),
            "Follower summary"
        );
    }

    for (handle, _) in handles {
        handle.leave().await?;
    }
    session.shutdown().await;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SyncConfig::load_from(&PathBuf::from(path))?,
        None => SyncConfig::load(),
    };
    info!("Lockstep demo starting");

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    rt.block_on(run_demo(config))
}
