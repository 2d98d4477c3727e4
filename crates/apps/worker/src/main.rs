use app_state::load_app_settings;
use clap::Parser;
use color_eyre::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::worker::create_worker;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Exit once the queue is empty instead of polling forever.
    #[clap(long, default_value_t = false, short, action)]
    stop_on_sleep: bool,

    /// Number of concurrent claim loops, overrides `worker.concurrency`.
    #[clap(long, short)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let mut settings = load_app_settings()?;
    if let Some(concurrency) = args.concurrency {
        settings.worker.concurrency = concurrency.max(1);
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    create_worker(settings, args.stop_on_sleep).await
}
