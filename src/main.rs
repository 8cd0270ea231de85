// src/main.rs

use std::sync::Arc;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

mod api;
mod broker;
mod config;
mod error;
mod ingest;
mod logging;
mod openrtb;

use api::routes::build_router;
use broker::{BrokerProducer, KafkaSink};
use config::{CliArgs, FilterPolicy};
use logging::dead_letter::DeadLetterLog;

/// 每个请求处理路径共享的状态，启动时构造一次
pub struct AppState {
    pub producer: BrokerProducer,
    pub policy: Arc<FilterPolicy>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 全局 tracing：JSON 写入按小时滚动的文件，同时输出到 stdout
    let log_file = rolling::hourly(&args.log_dir, "gateway.json");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);
    let subscriber = Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(non_blocking))
        .with(fmt::layer().with_target(false));
    tracing::subscriber::set_global_default(subscriber)
        .context("Unable to set global tracing subscriber")?;

    let (dead_letters, dead_letter_writer) = DeadLetterLog::start(&args.log_dir, 10_000, 100, 1000);

    // Kafka 客户端创建失败直接终止启动
    let producer_config = args.producer_config();
    let sink = KafkaSink::new(&producer_config).context("Producer creation error")?;
    let (producer, producer_task) =
        BrokerProducer::start(&producer_config, sink, Some(dead_letters));

    let policy = args.filter_policy();
    info!(excluded_ip_prefixes = ?policy.excluded_ip_prefixes, "Filter policy loaded");

    let state = Arc::new(AppState {
        producer,
        policy: Arc::new(policy),
    });
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Unable to bind {}", addr))?;
    info!("Bid receiver running at http://{}", addr);

    serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Shutting down gracefully, flushing producer buffer...");
    producer_task.shutdown().await;
    if let Err(e) = dead_letter_writer.await {
        error!(error = %e, "Dead letter writer failed");
    }
    info!("Bid receiver shut down.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
