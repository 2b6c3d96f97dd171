//! `sitelink` -- runs a sample site node with one `testService` handler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sitelink_core::canned;
use sitelink_server::{logging, SiteConfig, SiteNode};
use tracing::{error, info};

/// Delay before retrying after the control endpoint fails to start.
const RESTART_DELAY: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(name = "sitelink")]
#[command(about = "Pub/sub site node serving the JSON control protocol")]
struct Args {
    /// Directory receiving the daily-rotated log files
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = logging::init(&args.log_dir)?;

    let config = SiteConfig {
        site_id: "sitelink".to_string(),
        summary: "sample site".to_string(),
        ..SiteConfig::default()
    };
    let node = SiteNode::builder(config)
        .service_fn("testService", |_, req| {
            info!(remote_ip = %req.remote_ip, request = ?req.request, "testService called");
            Ok(canned::OK.to_string())
        })
        .build()?;

    tokio::select! {
        () = serve_forever(&node) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("interrupt received, shutting down");
        }
    }
    Ok(())
}

/// Restarts the control endpoint whenever it fails, e.g. while the port is
/// still held by a previous process.
async fn serve_forever(node: &Arc<SiteNode>) {
    loop {
        if let Err(e) = node.start().await {
            error!(error = %e, "control endpoint failed, restarting in {:?}", RESTART_DELAY);
        }
        tokio::time::sleep(RESTART_DELAY).await;
    }
}
