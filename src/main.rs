use std::time::Instant;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use toplist::report::{self, OutputPaths};
use toplist::resolve::Nominatim;
use toplist::scrape::Category;
use toplist::{Result, DATA_DIR};

#[tokio::main]
async fn main() {
    init_tracing();

    let start = Instant::now();
    // A failed run leaves a missing report file behind, nothing more; the
    // process itself always exits normally.
    if let Err(e) = run().await {
        error!(error = %e, "run failed");
    }
    info!(elapsed = ?start.elapsed(), "run finished");
}

async fn run() -> Result<()> {
    let paths = OutputPaths::new(DATA_DIR);
    report::write_report(Category::Restaurants, &paths, Nominatim::new()?).await
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,toplist=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
