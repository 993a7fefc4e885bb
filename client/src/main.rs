use clap::Parser;
use client::{describe, parse_command, Command, RelayClient};
use log::{error, info};
use shared::ServerMessage;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    let (mut client, mut events) = RelayClient::connect(&args.server).await?;
    info!("Commands: /num, /test <n> <text>, /quit; anything else is chat");

    let receiver = tokio::spawn(async move {
        loop {
            match events.next_message().await {
                Ok(Some(message)) => {
                    println!("{}", describe(&message));
                    if matches!(message, ServerMessage::Kick { .. }) {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Connection error: {}", e);
                    break;
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let input = async {
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Some(Command::Quit) => break,
                Some(Command::Send(message)) => {
                    if let Err(e) = client.send(&message).await {
                        error!("Failed to send: {}", e);
                        break;
                    }
                }
                None => {}
            }
        }
    };

    // Whichever side finishes first ends the session
    tokio::select! {
        _ = input => {}
        _ = receiver => {}
    }

    client.close().await.ok();

    Ok(())
}
