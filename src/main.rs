use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use gravid::api::GravidClient;
use gravid::config::ChatConfig;
use gravid::constants;
use gravid::render::{render_sources, AI_LABEL};
use gravid::web_server::{self, WebAssets};
use gravid::{chat, session};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of the GravidAI API.
    #[arg(
        long,
        global = true,
        env = "GRAVID_API_URL",
        default_value = constants::DEFAULT_API_URL
    )]
    api_url: String,
    /// Seconds the loading countdown starts from.
    #[arg(
        long,
        global = true,
        env = "GRAVID_COUNTDOWN",
        default_value_t = constants::DEFAULT_COUNTDOWN_START
    )]
    countdown: u32,
    /// Request timeout in seconds.
    #[arg(
        long,
        global = true,
        env = "GRAVID_TIMEOUT",
        default_value_t = constants::DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    timeout: u64,
    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Chat with GravidAI in the terminal.
    Chat,
    /// Ask a single question and print the answer.
    Ask {
        #[arg(help = "The question to send.")]
        question: String,
    },
    /// Show the service description published by the API.
    About,
    /// Serve the chat as a local web page.
    Serve {
        #[arg(long, default_value_t = 9900, help = "Port for the web server.")]
        port: u16,
        #[arg(long, default_value = "templates", help = "Directory holding index.html.")]
        templates: PathBuf,
        #[arg(long, default_value = "static", help = "Directory served under /static.")]
        static_dir: PathBuf,
    },
}

// The main entry point of the application, using tokio's async runtime
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (GRAVID_API_URL and friends)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g. RUST_LOG=gravid=debug). Logs go to
    // stderr so stdout carries only the conversation.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("GravidAI starting with command: {:?}", cli.command);

    let config = ChatConfig::new(&cli.api_url, cli.countdown, cli.timeout)
        .context("Invalid configuration")?;

    match cli.command {
        Commands::Chat => {
            chat::run_chat(config).await.context("Chat session failed")?;
            info!("Chat session finished.");
        }
        Commands::Ask { question } => {
            let client = GravidClient::new(config.clone())?;
            let (handle, session_task) = session::spawn(&config, Arc::new(client));
            let result = handle.ask_and_wait(question).await;
            session_task.abort();

            let exchange = result.context("Question was not submitted")?;
            if exchange.failed {
                anyhow::bail!(constants::REQUEST_ERROR_MESSAGE);
            }
            println!("{}: {}", AI_LABEL, exchange.ai);
            if !exchange.sources.is_empty() {
                println!("{}", render_sources(&exchange.sources));
            }
        }
        Commands::About => {
            let client = GravidClient::new(config)?;
            let message = client.about().await.context("Failed to fetch the service description")?;
            println!("{}", message);
        }
        Commands::Serve {
            port,
            templates,
            static_dir,
        } => {
            let client = GravidClient::new(config.clone())?;
            let (handle, session_task) = session::spawn(&config, Arc::new(client));
            let assets = WebAssets {
                templates_dir: templates,
                static_dir,
            };

            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(port, handle, assets).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            session_task.abort();
            info!("Shutdown complete.");
        }
    }

    Ok(())
}
