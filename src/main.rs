use rand::SeedableRng;
use rand::rngs::StdRng;

use tg_roster::config::{InviteMessages, RosterConfig};
use tg_roster::directory::{ContactSnapshot, Directory, TelegramDirectory};
use tg_roster::pipeline::{BatchDriver, Classifier, reconciler};
use tg_roster::report::Reporter;
use tg_roster::roster;
use tg_roster::throttle::{FloodPolicy, TokioSleeper};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Config, roster, and auth failures abort before any identity is touched.
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = RosterConfig::from_env()?;
    let messages = InviteMessages::load(&config.messages_path)?;
    let identities = roster::load_identities(&config.input_path)?;

    eprintln!("tg-roster v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Group: {}", config.group);
    eprintln!(
        "   Roster: {} identities from {}",
        identities.len(),
        config.input_path.display()
    );
    eprintln!("   Invite templates: {}", messages.len());
    eprintln!("   Report: {}\n", config.report_path.display());

    let directory = TelegramDirectory::new(
        config.api_base.clone(),
        config.api_id,
        config.api_hash.clone(),
        config.phone.clone(),
    );
    directory.authorize().await?;
    tracing::info!("Logged in successfully");

    // Captured once; read-only for the whole batch.
    let contacts = directory.list_contacts().await?;
    let snapshot = ContactSnapshot::from_contacts(&contacts);
    tracing::info!(saved_contacts = snapshot.len(), "Captured contact snapshot");

    let sleeper = TokioSleeper;
    let policy = FloodPolicy {
        max_retries: config.max_retries,
    };
    let classifier = Classifier {
        directory: &directory,
        sleeper: &sleeper,
        policy,
        group: &config.group,
        invite_link: &config.invite_link,
        messages: &messages,
        snapshot: &snapshot,
    };
    let driver = BatchDriver {
        classifier,
        sleeper: &sleeper,
        delay: config.delay,
        rng: StdRng::from_entropy(),
    };

    let mut reporter = Reporter::new();
    let matches = driver.run(&identities, &mut reporter).await;

    let applied = reconciler::apply_matches(&directory, &sleeper, policy, &matches).await;
    if !matches.is_empty() {
        tracing::info!(applied, total = matches.len(), "Contact reconciliation finished");
    }

    reporter.write_csv(&config.report_path)?;
    tracing::info!("Processing complete");
    Ok(())
}
