use clap::{Args, Parser, Subcommand};
use deskbot::{
    access::{IgnoreList, ModeratorSet},
    backend::openai::OpenAiBackend,
    channel::{Messenger, console::ConsoleChannel},
    command::CommandHandler,
    delivery::DeliveryStore,
    gateway::InboundGateway,
    logger::init_tracing,
    processor::MessageProcessor,
    run::{RunPolicy, executor::RunExecutor, registry::RunRegistry},
    sequencer::UserSequencer,
    session::{config_watch::ConfigWatch, lifecycle::SessionLifecycleManager, store::SessionStore},
    settings::Settings,
    tools::{ToolDispatcher, escalation::HumanEscalationHandler, orders::OrderStatusHandler},
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "deskbot",
    about = "Session-orchestrating customer support bot",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot against stdin/stdout
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Optional log level override (e.g. error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run(RunArgs {
        log_level: "info".to_string(),
    })) {
        Commands::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    init_tracing(&args.log_level);
    let settings = Settings::from_env()?;
    if let Some(dir) = settings.paths.sessions.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let backend: Arc<OpenAiBackend> = Arc::new(OpenAiBackend::new(
        &settings.backend.base_url,
        &settings.backend.api_key,
        &settings.backend.assistant_id,
    ));
    let channel: Arc<dyn Messenger> = Arc::new(ConsoleChannel);

    let sessions = Arc::new(SessionStore::open(settings.paths.sessions.clone()));
    let ignore = Arc::new(IgnoreList::open(settings.paths.ignore_list.clone()));
    let moderators = Arc::new(ModeratorSet::open(settings.paths.moderators.clone()));
    let delivery = Arc::new(DeliveryStore::open(settings.paths.delivery.clone()));

    let dispatcher = ToolDispatcher::new()
        .register(Arc::new(HumanEscalationHandler::new(
            channel.clone(),
            ignore.clone(),
            settings.admins.numbers.clone(),
        )))
        .register(Arc::new(OrderStatusHandler::new(delivery)));

    let watch = ConfigWatch::new(backend.clone(), settings.backend.config_check_interval);
    let lifecycle = SessionLifecycleManager::new(backend.clone(), sessions.clone(), watch);
    let registry = RunRegistry::new();
    let executor = RunExecutor::new(
        backend.clone(),
        registry.clone(),
        RunPolicy {
            poll_interval: settings.runs.poll_interval,
            max_run_time: settings.runs.max_run_time,
            max_retries: settings.runs.max_retries,
        },
    );

    let processor = Arc::new(MessageProcessor::new(
        lifecycle,
        executor,
        dispatcher,
        channel.clone(),
    ));
    let sequencer = UserSequencer::new(processor, settings.sequencer.pacing);

    let paused = Arc::new(AtomicBool::new(false));
    let commands = CommandHandler::new(
        moderators,
        ignore.clone(),
        sessions,
        registry,
        channel.clone(),
        paused.clone(),
        settings.admins.numbers.clone(),
    );
    let gateway = InboundGateway::new(commands, ignore, sequencer, channel, paused);

    info!("deskbot ready; reading `<user> <text>` lines from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let Some((sender, text)) = line.split_once(' ') else {
                            warn!(%line, "expected `<user> <text>`");
                            continue;
                        };
                        gateway.handle_inbound(sender, text).await;
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }
    Ok(())
}
