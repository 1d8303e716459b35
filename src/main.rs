//! record-relay - Record synchronizer and report relay
//!
//! This is the composition root that wires together all the components.

use record_relay::adapters::outbound::{
    ChatConfig, ChatDeliveryTransport, DirectoryArtifactSource, NotionConfig, NotionRecordStore,
    SqliteCacheTier,
};
use record_relay::infrastructure::{shutdown_signal, RunLock, ShutdownController, SystemClock};
use record_relay::{
    load_config, CachePolicy, Config, CycleReport, DeliveryPipeline, OutboxSettings, RelayService,
    RetryPolicy, SentRecordCache, SyncEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting record-relay source={} target={} outbox={}",
        cfg.source_db_id,
        cfg.target_db_id,
        cfg.outbox_dir.as_deref().unwrap_or("<disabled>")
    );
    tracing::debug!("{:?}", cfg);

    // Configuration faults are fatal before any progress
    cfg.validate_sync()?;
    if cfg.outbox_dir.is_some() {
        cfg.validate_delivery()?;
    }

    let lock = RunLock::acquire(&cfg.lock_path)?;
    tracing::debug!("run lock held at {}", lock.path().display());

    let service = build_service(&cfg)?;

    match cfg.run_interval_secs {
        None => {
            let report = service.run_cycle().await;
            log_cycle(&report);
            if !report.aborted.is_empty() {
                anyhow::bail!("sync aborted for {:?}", report.aborted);
            }
        }
        Some(secs) => {
            let shutdown = ShutdownController::new();
            tokio::spawn(shutdown_signal(shutdown.clone()));

            tracing::info!("daemon mode: running every {}s", secs);
            loop {
                let report = service.run_cycle().await;
                log_cycle(&report);
                if !shutdown.wait_next_cycle(Duration::from_secs(secs)).await {
                    break;
                }
            }
            tracing::info!("record-relay stopped");
        }
    }

    Ok(())
}

// ===== COMPOSITION ROOT =====
fn build_service(cfg: &Config) -> anyhow::Result<RelayService> {
    // 1. Record stores share one HTTP client
    let client = reqwest::Client::new();
    let source = Arc::new(NotionRecordStore::with_client(
        "source",
        NotionConfig {
            base_url: cfg.notion_base_url.clone(),
            token: cfg.notion_token.clone(),
            database_id: cfg.source_db_id.clone(),
            schema: cfg.source_schema.clone(),
        },
        client.clone(),
    ));
    let target = Arc::new(NotionRecordStore::with_client(
        "target",
        NotionConfig {
            base_url: cfg.notion_base_url.clone(),
            token: cfg.notion_token.clone(),
            database_id: cfg.target_db_id.clone(),
            schema: cfg.target_schema.clone(),
        },
        client,
    ));

    let service = RelayService::new(Some(SyncEngine::new(source, target)));

    let Some(outbox_dir) = &cfg.outbox_dir else {
        return Ok(service);
    };

    // 2. Sent-record cache: expiring and durable tiers in one SQLite file
    let cache = SentRecordCache::new(
        Arc::new(SqliteCacheTier::open_volatile(&cfg.cache_db_path)?),
        Arc::new(SqliteCacheTier::open(&cfg.cache_db_path)?),
        Arc::new(SystemClock),
        CachePolicy {
            ttl: cfg.cache_ttl(),
            volatile_expiry: cfg.cache_volatile_expiry(),
            size_threshold: cfg.cache_size_threshold,
            ..CachePolicy::default()
        },
    );

    // 3. Delivery pipeline over the chat endpoint
    let transport = ChatDeliveryTransport::new(ChatConfig {
        base_url: cfg.chat_base_url.clone(),
        api_key: cfg.chat_api_key.clone(),
        channel_id: cfg.chat_channel_id.clone(),
        message: cfg.chat_message.clone(),
        ..ChatConfig::default()
    })?;
    let pipeline = DeliveryPipeline::new(
        Arc::new(transport),
        Arc::new(cache),
        RetryPolicy::new(cfg.retry_max_attempts, cfg.retry_backoff()),
        cfg.idempotency_prefix.clone(),
    );

    Ok(service.with_outbox(
        pipeline,
        Arc::new(DirectoryArtifactSource::new(outbox_dir)),
        OutboxSettings {
            send_interval: cfg.send_interval(),
            delete_after_send: cfg.delete_after_send,
        },
    ))
}

fn log_cycle(report: &CycleReport) {
    for pass in &report.passes {
        tracing::info!(
            "{}: flagged={} succeeded={} failed={} skipped={}",
            pass.direction,
            pass.flagged,
            pass.succeeded,
            pass.failed,
            pass.skipped
        );
    }
    for direction in &report.aborted {
        tracing::error!("{}: aborted", direction);
    }
    if let Some(delivery) = &report.delivery {
        tracing::info!(
            "delivery: sent={} deduplicated={} failed={} discarded={}",
            delivery.sent,
            delivery.deduplicated,
            delivery.failed,
            delivery.discarded
        );
    }
}
