//! Tandem server daemon
//!
//! Pairs anonymous TCP clients into one-on-one conversations.

use anyhow::{Context, Result};
use clap::Parser;
use tandem_core::Engine;
use tandem_server::{
    Args, EngineActor, LogFormat, SystemEnv, actor::COMMAND_CAPACITY, listener::Listener,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

fn setup_logging(log_level: &str, log_format: LogFormat) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    match log_format {
        LogFormat::Json => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("failed to set subscriber")?;
        },
        LogFormat::Plain => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("failed to set subscriber")?;
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, args.log_format)?;

    let config = args.engine_config();
    config.validate().context("invalid engine configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_addr = %args.listen_addr,
        idle_timeout = ?config.reaper.idle_timeout,
        message_limit = config.message_rate.max_requests,
        "starting tandem server"
    );

    let env = SystemEnv;
    let (commands, inbox) = mpsc::channel(COMMAND_CAPACITY);

    let listener = Listener::bind(args.listen_addr, env, args.connect_rate(), commands)
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr))?;

    let (stop, stopped) = oneshot::channel::<()>();
    let actor = EngineActor::new(Engine::new(env, config), inbox);
    let engine = tokio::spawn(actor.run(async {
        // A dropped sender also stops the actor
        let _ = stopped.await;
    }));

    tokio::select! {
        () = listener.run() => {},
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("shutdown requested");
        },
    }

    let _ = stop.send(());
    let stats = engine.await.context("engine task failed")?;

    info!(
        conversations = stats.store.total_conversations,
        active = stats.store.active_conversations,
        waiting = stats.waiting,
        "tandem server stopped"
    );

    Ok(())
}
