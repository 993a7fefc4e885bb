use clap::Parser;
use log::{error, info};
use server::network::Server;
use server::ServerConfig;
use shared::{DEFAULT_PORT, MAX_CLIENTS, MAX_FRAME_LEN, REQUESTED_NUMBER};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum number of connected clients
    #[arg(short, long, default_value_t = MAX_CLIENTS)]
    max_clients: usize,

    /// Number sent to clients that request one
    #[arg(long, default_value_t = REQUESTED_NUMBER)]
    requested_number: u16,
}

/// Main-method of the application.
/// Parses command-line arguments, then runs the accept loop until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_clients: args.max_clients,
        requested_number: args.requested_number,
        max_frame_len: MAX_FRAME_LEN,
    };
    info!("Accepting up to {} clients", config.max_clients);

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
