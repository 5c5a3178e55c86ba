use chat_link_preview::{
    FetcherConfig, Message, MessageId, NetworkContext, PreviewKind, PreviewService,
    PreviewServiceConfig,
};
use clap::Parser;
use colored::Colorize;
use std::error::Error;
use std::time::Duration;

/// Treats the arguments as one chat message and prints its link previews.
#[derive(Parser)]
#[command(name = "preview_cli")]
struct Args {
    /// Message text, e.g. "look at https://www.rust-lang.org"
    #[arg(required = true)]
    text: Vec<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Simultaneous outbound fetches
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    #[cfg(feature = "logging")]
    chat_link_preview::setup_logging(chat_link_preview::LogConfig::default())?;

    let config = PreviewServiceConfig::new()
        .with_max_concurrent_requests(args.concurrency)
        .with_fetcher_config(FetcherConfig {
            timeout: Duration::from_millis(args.timeout_ms),
            ..Default::default()
        });
    let (service, mut events) = PreviewService::with_channel(config)?;

    let message = Message::new(MessageId(1), args.text.join(" "));
    let network = NetworkContext::new("cli");

    println!("{}", "Chat Link Preview".bold().green());
    println!("{}", "=================".green());
    println!("{}: {}\n", "Message".bold(), message.text());

    let tasks = service.process(&message, &network);
    let started = tasks.len();
    let delivered = tasks.settled().await;

    while let Ok(event) = events.try_recv() {
        let preview = event.preview;
        let label = match preview.kind {
            PreviewKind::Link => "link".blue(),
            PreviewKind::Image => "image".magenta(),
        };
        println!("[{}] {}", label, preview.link.bold());
        if !preview.head.is_empty() {
            println!("  {}: {}", "Head".bold(), preview.head);
        }
        if !preview.body.is_empty() {
            println!("  {}: {}", "Body".bold(), preview.body);
        }
        if !preview.thumb.is_empty() {
            println!("  {}: {}", "Thumb".bold(), preview.thumb);
        }
        println!();
    }

    let summary = format!("{delivered}/{started} links previewed");
    if delivered == started {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.yellow());
    }

    Ok(())
}
