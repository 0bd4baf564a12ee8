//! Shopify API Notifier - CLI Entry Point
//!
//! Performs one request through the notifying connection.

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Method;
use shopify_api_notifier::alert::SlackNotifier;
use shopify_api_notifier::deprecation::{DeprecationDetector, StderrConsole};
use shopify_api_notifier::events::{Event, Instrumenter};
use shopify_api_notifier::metrics::ConnectionMetrics;
use shopify_api_notifier::transport::HttpTransport;
use shopify_api_notifier::{Connection, NotifierConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "shopify-api-notifier",
    about = "Shopify API request runner with deprecation alerts",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "shopify-api-notifier.yaml")]
    config: PathBuf,

    /// Override the API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Slack incoming webhook URL for deprecation alerts
    #[arg(long, env = "SLACK_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// HTTP method
    #[arg(short, long, default_value = "GET")]
    method: Method,

    /// Request path relative to the base URL
    #[arg(short, long, default_value = "/shop.json")]
    path: String,

    /// JSON request argument (repeatable; the first is the body)
    #[arg(short, long, value_parser = parse_json)]
    data: Vec<serde_json::Value>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Print metrics after the request
    #[arg(long)]
    metrics: bool,
}

fn parse_json(s: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        println!("{}", serde_yaml::to_string(&NotifierConfig::default())?);
        return Ok(());
    }

    // Load configuration
    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        NotifierConfig::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration");
        NotifierConfig::default()
    };

    if let Some(base_url) = args.base_url {
        config.connection.base_url = base_url;
    }
    if args.webhook_url.is_some() {
        config.alert.webhook_url = args.webhook_url;
    }
    config.validate()?;

    if args.validate {
        println!("Configuration is valid");
        return Ok(());
    }

    let metrics = Arc::new(ConnectionMetrics::new(&config.metrics.prefix));
    let instrumenter = Instrumenter::new();
    if config.settings.log_events {
        instrumenter.subscribe(
            config.settings.event_name.clone(),
            Arc::new(|event: &Event| {
                let status = event.payload.response.as_ref().map(|r| r.status);
                info!(
                    method = %event.payload.method,
                    path = %event.payload.path,
                    status = ?status,
                    arguments = event.payload.data.len(),
                    "API request"
                );
            }),
        );
    }

    let alerts = Arc::new(SlackNotifier::new(config.alert.clone()));
    let mut detector = DeprecationDetector::new(Arc::new(StderrConsole), alerts)
        .with_marker(config.settings.marker_header.clone());
    if config.metrics.enabled {
        detector = detector.with_metrics(metrics.clone());
    }

    let transport = HttpTransport::new(&config.connection).context("Failed to build transport")?;
    let mut connection = Connection::new(transport, detector, instrumenter)
        .with_event_name(config.settings.event_name.clone());
    if config.metrics.enabled {
        connection = connection.with_metrics(metrics.clone());
    }

    let result = connection.request(args.method, &args.path, args.data).await;

    if args.metrics {
        print!("{}", metrics.encode());
    }

    let response = result?;
    println!("{}", response.status);
    println!("{}", response.body);

    Ok(())
}
