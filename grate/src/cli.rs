//! # CLI
//!
//! This module defines the command-line interface of `grate` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring headers are `key:value`);
use clap::{Parser, Subcommand};
use http::Method;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grate", version, about = "HTTP/JSON to gRPC transcoding toolkit")]
pub struct Cli {
    /// Path to the descriptor set (.bin) holding the annotated services
    #[arg(short = 'f', long)]
    pub file_descriptor_set: PathBuf,

    /// Path to a JSON file with transcoding options
    #[arg(long)]
    pub options: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every HTTP route exposed by the descriptor set
    Routes,

    /// Show the request message an HTTP request is transcoded into, without calling anything
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// grate -f library.bin bind POST '/v1/shelves/1/books?requestId=7' --body '{"name": "Dune"}'
    /// ```
    Bind {
        #[command(flatten)]
        request: HttpRequestArgs,
    },

    /// Transcode an HTTP request and perform the call against a gRPC server
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// grate -f library.bin call http://localhost:50051 GET /v1/books/dune -H 'authorization: Bearer t'
    /// ```
    Call {
        /// The server URL to connect to (e.g. http://localhost:50051)
        url: String,

        #[command(flatten)]
        request: HttpRequestArgs,
    },
}

#[derive(clap::Args)]
pub struct HttpRequestArgs {
    /// HTTP method (GET, POST, ...)
    #[arg(value_parser = parse_method)]
    pub method: Method,

    /// Request path with an optional query string (e.g. /v1/books/dune?revision=2)
    #[arg(value_parser = parse_target)]
    pub target: String,

    /// JSON request body
    #[arg(long, value_parser = parse_body)]
    pub body: Option<serde_json::Value>,

    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

fn parse_method(value: &str) -> Result<Method, String> {
    Method::from_bytes(value.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("Invalid HTTP method: '{value}'"))
}

fn parse_target(value: &str) -> Result<String, String> {
    if !value.starts_with('/') {
        return Err(format!("Invalid target: '{value}'. Expected a path like '/v1/books'"));
    }
    Ok(value.to_string())
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}
