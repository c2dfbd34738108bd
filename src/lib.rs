pub mod attribution;
pub mod cli;
pub mod context;
pub mod db;
pub mod dto;
pub mod error;
pub mod metrics;
pub mod models;
pub mod settings;
pub mod sources;
pub mod timeline;
pub mod utils;

use clap::Parser;

pub use attribution::{AttributeRequest, AttributionConfig, AttributionEngine, AttributionPolicy};
pub use context::CallContext;
pub use db::Database;
pub use error::{AttributeError, InputError, UpstreamError};
pub use metrics::{AttributionMetrics, MetricsCollector};
pub use models::{Attribution, Chapter, ChapterId, Snapshot, VideoId, VideoMetadata, VideoRef};
pub use sources::{MetadataSupplier, SnapshotStore};

pub fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = cli::Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let stdout = std::io::stdout();
    runtime.block_on(cli::execute(cli, &mut stdout.lock()))
}
