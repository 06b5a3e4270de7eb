use std::path::PathBuf;
use std::sync::Arc;

use catchup::config::DigestConfig;
use catchup::digest::DigestOrchestrator;
use catchup::fetch::{ArticleFetcher, SerperClient};
use catchup::mailer::{SmtpConfig, SmtpMailer};
use catchup::store::LibsqlStorage;
use catchup::triggers::{TriggerState, spawn_cron_ticker, trigger_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let serper_key = std::env::var("SERPER_API_KEY").unwrap_or_else(|_| {
        eprintln!("Error: SERPER_API_KEY not set");
        eprintln!("  export SERPER_API_KEY=...");
        std::process::exit(1);
    });

    let smtp = match SmtpConfig::from_env() {
        Ok(smtp) => smtp,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  export SMTP_HOST=smtp.example.com");
            std::process::exit(1);
        }
    };

    let db_path =
        PathBuf::from(std::env::var("CATCHUP_DB").unwrap_or_else(|_| "catchup.db".to_string()));
    let port: u16 = std::env::var("CATCHUP_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);
    // Default: every hour on the hour, so each subscriber's send window
    // gets at least one tick.
    let cron = std::env::var("CATCHUP_CRON").unwrap_or_else(|_| "0 0 * * * *".to_string());

    let store = Arc::new(LibsqlStorage::new_local(&db_path).await?);
    let fetcher = ArticleFetcher::new(Arc::new(SerperClient::new(serper_key.into())));
    let mailer = Arc::new(SmtpMailer::new(smtp));
    let orchestrator = Arc::new(DigestOrchestrator::new(
        DigestConfig::default(),
        store,
        fetcher,
        mailer,
    ));
    let state = TriggerState::new(orchestrator);

    let mode = std::env::args().nth(1).unwrap_or_else(|| "serve".to_string());
    match mode.as_str() {
        // One digest cycle, print the summary, exit. For external timers.
        "run" => {
            let summary = state.orchestrator.run_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "serve" => {
            eprintln!("📬 catchup v{}", env!("CARGO_PKG_VERSION"));
            eprintln!("   Database: {}", db_path.display());
            eprintln!("   Trigger:  http://0.0.0.0:{port}/cron/digest");
            eprintln!("   Schedule: {cron}\n");

            let ticker = spawn_cron_ticker(state.clone(), cron);

            let app = trigger_routes(state);
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
            axum::serve(listener, app).await?;
            ticker.abort();
        }
        other => {
            eprintln!("Unknown mode: {other}");
            eprintln!("Usage: catchup [run|serve]");
            std::process::exit(2);
        }
    }

    Ok(())
}
