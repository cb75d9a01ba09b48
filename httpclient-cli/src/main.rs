#![forbid(unsafe_code)]

use clap::Parser;
use httpclient::{Method, RequestOptions, Session};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "httpclient command-line driver")]
struct Cli {
    /// URL to request
    url: String,

    /// HTTP method
    #[arg(short, long, default_value = "GET")]
    method: String,

    /// Request timeout in seconds
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,

    /// Disable TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Print response headers
    #[arg(long)]
    headers: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let method = match cli.method.to_ascii_uppercase().as_str() {
        "GET" => Method::Get,
        "POST" => Method::Post,
        "PUT" => Method::Put,
        "DELETE" => Method::Delete,
        "PATCH" => Method::Patch,
        "HEAD" => Method::Head,
        "OPTIONS" => Method::Options,
        other => {
            error!(method = other, "unsupported method");
            std::process::exit(2);
        }
    };

    let session = Session::new();
    let opts = RequestOptions::new()
        .timeout(Duration::from_secs(cli.timeout))
        .verify(!cli.insecure);

    match session.request(method, &cli.url, opts).await {
        Ok(response) => {
            info!(status = response.status_code(), url = response.url(), "request complete");
            if cli.headers {
                for (name, value) in response.headers().iter() {
                    println!("{name}: {value}");
                }
                println!();
            }
            println!("{}", response.text());
            session.close().await;
            if !response.ok() {
                std::process::exit(1);
            }
        }
        Err(err) => {
            error!(%err, "request failed");
            session.close().await;
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
