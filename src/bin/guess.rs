use clap::{Parser, Subcommand};
use log::{error, info};
use std::io::{self, BufRead, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use vpacket::client::guess_once;
use vpacket::config::{GameConfig, ServerConfig, SessionMode};
use vpacket::game::GuessOutcome;
use vpacket::server::GuessServer;

/// Number-guessing game over the five-byte guess protocol.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the game server
    Server {
        /// Port to listen on
        #[clap(short, long, default_value = "8888")]
        port: u16,
        /// Keep answering guesses on a connection until the client leaves
        #[clap(long)]
        persistent: bool,
        /// Limit on concurrently served connections (unbounded if omitted)
        #[clap(long)]
        max_connections: Option<usize>,
        /// Smallest possible target
        #[clap(long, default_value = "0")]
        min: i32,
        /// One past the largest possible target
        #[clap(long, default_value = "1000")]
        max: i32,
    },
    /// Read guesses from stdin and send each to the server
    Client {
        /// Server address, e.g. 127.0.0.1:8888
        server: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let result = match args.command {
        Command::Server {
            port,
            persistent,
            max_connections,
            min,
            max,
        } => {
            let config = ServerConfig {
                bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)),
                max_connections,
                session_mode: if persistent {
                    SessionMode::Persistent
                } else {
                    SessionMode::SingleGuess
                },
                game: GameConfig {
                    target_min: min,
                    target_max: max,
                },
            };
            run_server(config).await
        }
        Command::Client { server } => run_client(&server).await,
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let server = GuessServer::bind(config).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await;
    Ok(())
}

async fn run_client(server: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("Enter a guess: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();
        if input == "q" {
            println!("Exiting.");
            break;
        }

        let guess: i32 = match input.parse() {
            Ok(guess) => guess,
            Err(_) => {
                println!("Not a number: {}", input);
                continue;
            }
        };
        info!("Sending guess: {}", guess);

        match guess_once(server, guess).await? {
            GuessOutcome::Lower => println!("Wrong! {} is too high", guess),
            GuessOutcome::Higher => println!("Wrong! {} is too low", guess),
            GuessOutcome::Match => println!("Yay, you won!!"),
        }
    }

    Ok(())
}
