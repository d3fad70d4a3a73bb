//! Load an i3dm tile from disk or over HTTP and print what it contains.
//!
//! Runs the tile through the full content lifecycle with a builder that
//! accepts every model immediately.

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use i3dm::{
    BuildFuture, ContentOptions, Error, FetchFuture, FetchRequest, Fetcher, HttpFetcher,
    InstancedTileContent, ModelBuilder, ModelRequest, ModelSource,
};

#[derive(Debug, Parser)]
#[command(about = "Inspect an Instanced 3D Model tile")]
struct Args {
    /// Tile path, or an http(s) URL.
    tile: String,

    /// Base URL for resolving an external model URI.
    #[arg(long, default_value = "")]
    base_url: String,

    /// Number of instances to print.
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

/// Reads tiles from the local filesystem.
struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchFuture {
        let path = PathBuf::from(&request.url);
        let url = request.url.clone();
        Box::pin(async move {
            std::fs::read(&path).map_err(|e| Error::FetchFailed {
                url,
                message: e.to_string(),
            })
        })
    }
}

/// Reports every model as built.
struct AcceptingBuilder;

impl ModelBuilder for AcceptingBuilder {
    fn build(&self, request: ModelRequest) -> BuildFuture {
        match &request.source {
            ModelSource::Url(url) => tracing::info!(url, "model would be loaded from"),
            ModelSource::Embedded { data, base_path } => {
                tracing::info!(bytes = data.len(), base_path, "embedded model");
            }
        }
        Box::pin(async { Ok(()) })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let args = Args::parse();
    let fetcher: Arc<dyn Fetcher> =
        if args.tile.starts_with("http://") || args.tile.starts_with("https://") {
            Arc::new(HttpFetcher::new())
        } else {
            Arc::new(FileFetcher)
        };

    let content = InstancedTileContent::new(
        args.tile.clone(),
        fetcher,
        Arc::new(AcceptingBuilder),
        ContentOptions::new().with_base_url(args.base_url),
    );

    let Some(task) = content.request() else {
        return Err("content was not in the unloaded state".into());
    };
    task.await;
    // Tiles without instances never become ready.
    if let Some(outcome) = content.ready_promise().peek() {
        outcome?;
    }

    if let Some(header) = content.header() {
        println!("Header:");
        println!("  version:           {}", header.version);
        println!("  byte length:       {}", header.byte_length);
        println!("  batch table bytes: {}", header.batch_table_byte_length);
        println!("  payload bytes:     {}", header.payload_byte_length);
        println!("  payload format:    {:?}", header.payload_format);
        println!("  instances:         {}", header.instance_count);
        println!("  translate:         {}", header.quantization.translate);
        println!("  scale:             {}", header.quantization.scale);
    }

    if let Some(batch_table) = content.batch_table() {
        let names = batch_table.property_names();
        if names.is_empty() {
            println!("\nNo batch table properties");
        } else {
            println!("\nBatch table properties: {}", names.join(", "));
        }
    }

    let instances = content.instances();
    println!(
        "\nFirst {} of {} instances:",
        args.limit.min(instances.len()),
        instances.len()
    );
    for (i, instance) in instances.iter().take(args.limit).enumerate() {
        let rotation = instance.rotation();
        println!(
            "  [{i}] batch {} at {} up {} right {}",
            instance.batch_id,
            instance.position(),
            rotation.y_axis,
            rotation.x_axis
        );
    }

    content.destroy();
    Ok(())
}
