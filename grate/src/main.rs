//! # Grate CLI Entry Point
//!
//! The main executable for the Grate tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and installs
//!    the log subscriber (`RUST_LOG`, `warn` by default).
//! 2. **Loading**: Reads the descriptor set and builds the route catalog via `grate_core`.
//! 3. **Execution**: Lists the routes, builds a request offline, or transcodes a call
//!    against a live server.
//! 4. **Presentation**: Formats and prints the resulting data or error to standard output/error.

mod cli;
mod formatter;

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use cli::{Cli, Commands, HttpRequestArgs};
use formatter::{Exchange, FormattedString, RouteTable};
use grate_core::{
    catalog::Catalog, gateway::Gateway, grpc::client::GrpcClient, handler::Transcoder,
    options::TranscodingOptions, prost_reflect::DescriptorPool,
};
use http::{Request, header::CONTENT_TYPE};
use std::{path::Path, process};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    if let Err(err) = run(args).await {
        eprintln!("{}", FormattedString::from(err));
        process::exit(1);
    }
}

async fn run(args: Cli) -> anyhow::Result<()> {
    let pool = load_pool(&args.file_descriptor_set)?;
    let options = load_options(args.options.as_deref())?;
    let catalog = Catalog::from_pool(&pool).context("Failed to build the route catalog")?;
    tracing::debug!(routes = catalog.len(), "Loaded route catalog");

    match args.command {
        Commands::Routes => {
            let entries = catalog.entries().cloned().collect();
            println!("{}", FormattedString::from(RouteTable(entries)));
        }
        Commands::Bind { request } => {
            // Requests are only built here, nothing is ever invoked.
            let gateway = Gateway::new(catalog, Transcoder::new(()).with_options(options));
            let message = gateway.build_request(http_request(request)?)?;
            println!("{}", FormattedString::from(message));
        }
        Commands::Call { url, request } => {
            let client = GrpcClient::connect(&url).await?;
            let gateway = Gateway::new(catalog, Transcoder::new(client).with_options(options));

            let response = gateway.handle(http_request(request)?).await;
            let status = response.status();
            let documents = response
                .into_body()
                .collect_json()
                .await
                .context("The response body is not valid JSON")?;

            println!("{}", FormattedString::from(Exchange(status, documents)));
            if !status.is_success() {
                anyhow::bail!("The call failed with HTTP status {status}");
            }
        }
    }

    Ok(())
}

fn load_pool(path: &Path) -> anyhow::Result<DescriptorPool> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file '{}'", path.display()))?;

    DescriptorPool::decode(bytes.as_slice())
        .with_context(|| format!("Failed to parse file descriptor set '{}'", path.display()))
}

fn load_options(path: Option<&Path>) -> anyhow::Result<TranscodingOptions> {
    let Some(path) = path else {
        return Ok(TranscodingOptions::default());
    };

    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file '{}'", path.display()))?;

    serde_json::from_slice(&bytes)
        .with_context(|| format!("Invalid transcoding options in '{}'", path.display()))
}

fn http_request(args: HttpRequestArgs) -> anyhow::Result<Request<Bytes>> {
    let mut builder = Request::builder()
        .method(args.method)
        .uri(args.target.as_str());

    let body = match args.body {
        Some(json) => Bytes::from(serde_json::to_vec(&json)?),
        None => Bytes::new(),
    };

    // Routes with a body require a JSON content type even when it is empty.
    let has_content_type = args
        .headers
        .iter()
        .any(|(key, _)| key.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
    if !has_content_type {
        builder = builder.header(CONTENT_TYPE, "application/json");
    }

    for (key, value) in args.headers {
        builder = builder.header(key, value);
    }

    builder.body(body).context("Invalid HTTP request")
}
