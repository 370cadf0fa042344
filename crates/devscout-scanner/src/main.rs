//! devscout binary entry point.
//!
//! Wires the collaborators together — configuration, the SQLite
//! session store, the two discovery sources, the scan orchestrator —
//! starts one scan, and reports its notifications until it finishes.
//!
//! ```text
//! main()
//!  └─ load_config()            -- TOML, defaults on first run
//!  └─ SqliteSessionStore::open -- history database
//!  └─ discovery sources
//!       ├─ ShortRangeSource   (platform radio backend)
//!       └─ LocalNetworkSource (UDP announce prober)
//!  └─ ScanOrchestrator::spawn  -- actor task
//!  └─ event pump               -- until Finished or Ctrl-C
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use devscout_scanner::application::browse_history::ScanHistory;
use devscout_scanner::application::run_scan::{ScanEvent, ScanOrchestrator};
use devscout_scanner::application::session_store::SessionStore;
use devscout_scanner::infrastructure::discovery::local_network::LocalNetworkSource;
use devscout_scanner::infrastructure::discovery::probe::UdpAnnounceProber;
use devscout_scanner::infrastructure::discovery::radio::platform_radio;
use devscout_scanner::infrastructure::discovery::short_range::ShortRangeSource;
use devscout_scanner::infrastructure::storage::config::{config_dir, load_config};
use devscout_scanner::infrastructure::storage::sessions::SqliteSessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("loading configuration")?;

    // Initialise structured logging. Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.scanner.log_level.clone())),
        )
        .init();

    info!("devscout starting");

    let database_path = match &config.storage.database_path {
        Some(path) => path.clone(),
        None => config_dir()
            .context("resolving data directory")?
            .join("history.db"),
    };
    let store: Arc<dyn SessionStore> = Arc::new(
        SqliteSessionStore::open(&database_path)
            .with_context(|| format!("opening session store at {}", database_path.display()))?,
    );

    let mut history = ScanHistory::new(Arc::clone(&store));
    if let Err(e) = history.refresh() {
        warn!("could not load scan history: {e}");
    } else {
        info!("{} past session(s) on record", history.sessions().len());
    }

    let scan_config = config.scanner.scan_config();
    let short_range = Arc::new(ShortRangeSource::new(
        platform_radio(),
        scan_config.short_range_window,
    ));
    let local_network = Arc::new(LocalNetworkSource::new(
        Arc::new(UdpAnnounceProber::new(
            config.probe.port,
            config.probe.rounds,
            config.probe.round_interval(),
        )),
        scan_config.local_network_window,
    ));

    let (orchestrator, mut events) =
        ScanOrchestrator::spawn(short_range, local_network, store, scan_config);

    orchestrator.start();

    // ── Event pump ────────────────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ScanEvent::Started { session_id }) => {
                    info!("session {session_id} started");
                }
                Some(ScanEvent::DeviceSeen { device }) => {
                    info!("found {} ({})", device.name, device.kind());
                }
                Some(ScanEvent::SourceFailed { kind, reason }) => {
                    warn!("{kind} source failed: {reason}");
                    if !orchestrator.is_scanning() {
                        error!("no discovery source could start; nothing to scan");
                        break;
                    }
                }
                Some(ScanEvent::PersistenceFailed { reason }) => {
                    error!("history write failed: {reason}");
                }
                Some(ScanEvent::Finished { session_id, device_count }) => {
                    info!("session {session_id} finished: {device_count} device(s) found");
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                orchestrator.stop();
            }
        }
    }

    info!("devscout stopped");
    Ok(())
}
