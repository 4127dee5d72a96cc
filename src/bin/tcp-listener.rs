//! Prints each request received on a TCP port.
//!
//! Connections are handled one at a time: read a single request, print it,
//! close the connection. Nothing is written back to the client.

use clap::Parser;

use httpwire::config::DEFAULT_PORT;
use httpwire::http::{Request, RequestReader, DEFAULT_BUFFER_SIZE};
use httpwire::net::Listener;
use httpwire::observability::logging;

#[derive(Parser)]
#[command(name = "tcp-listener")]
#[command(about = "Print HTTP requests received over TCP", long_about = None)]
struct Cli {
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = "0.0.0.0")]
    bind_address: String,

    /// Accumulation buffer capacity in bytes.
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,
}

fn print_request(request: &Request) {
    println!("Request line:");
    println!("- Method: {}", request.method());
    println!("- Target: {}", request.target());
    println!("- Version: {}", request.request_line.http_version);
    println!("Headers:");
    for (name, value) in request.headers.iter() {
        println!("- {}: {}", name, value);
    }
    println!("Body:");
    println!("{}", String::from_utf8_lossy(&request.body));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init("info");

    let listener = Listener::bind(&cli.bind_address, cli.port).await?;
    let reader = RequestReader::new(cli.buffer_size);

    loop {
        let (mut stream, peer_addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => break,
        };

        match reader.read_request(&mut stream).await {
            Ok(request) => print_request(&request),
            Err(e) => tracing::warn!(peer_addr = %peer_addr, error = %e, "Failed to read request"),
        }
    }

    tracing::info!("Listener closed");
    Ok(())
}
