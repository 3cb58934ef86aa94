use clap::Parser;
use color_eyre::Result;
use rfid_gateway::client::TagStreamClient;
use tracing::{error, info, Level};

/// Prints the tags a running gateway streams.
#[derive(Parser, Debug)]
struct Args {
    /// Gateway address.
    #[arg(short, long, default_value = "localhost")]
    address: String,

    /// Gateway port.
    #[arg(short, long, default_value_t = rfid_gateway::server::DEFAULT_PORT)]
    port: u16,
}

async fn run(args: Args) -> Result<()> {
    let mut client = TagStreamClient::connect(&args.address, args.port).await?;

    while let Some(message) = client.next_tags().await {
        info!(%message, "Tags");

        for tag in message.tags {
            let last_seen = i64::try_from(tag.last_seen)
                .ok()
                .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_micros)
                .map(|time| time.to_rfc3339())
                .unwrap_or_else(|| tag.last_seen.to_string());

            println!(
                "{epc}\tchannel {channel}\tseen {count}x\tlast seen {last_seen}",
                epc = tag.epc,
                channel = tag.channel,
                count = tag.seen_count,
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    rfid_gateway::logging::init(Level::INFO, None).await;

    let args = Args::parse();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C, quitting")
        }
        result = run(args) => {
            match result {
                Ok(()) => info!("Gateway closed the stream"),
                Err(e) => error!(%e, "Stream ended"),
            }
        }
    }

    Ok(())
}
