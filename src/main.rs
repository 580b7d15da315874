use std::sync::Arc;

use clap::Parser;
use hearken::actions::registry::ActionRegistry;
use hearken::cli::{ActionsCommand, Cli, Commands};
use hearken::config::{self, Config};
use hearken::dispatch::{resolve_handler, Dispatcher};
use hearken::listener::Listener;
use hearken::sound::SoundSink;
use hearken::transcribe::{Transcriber, WhisperTranscriber};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hearken=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Listen) {
        Commands::Listen => run_listen(config),
        Commands::Actions { action_command } => match action_command {
            ActionsCommand::Reload => run_actions_reload(&config),
        },
        Commands::CheckConfig => run_check_config(&config),
    }
}

fn run_listen(config: Config) -> anyhow::Result<()> {
    tracing::info!("starting hearken listener");

    let transcriber: Arc<dyn Transcriber> = Arc::new(
        WhisperTranscriber::new(&config.transcription.model)
            .map_err(|e| anyhow::anyhow!("failed to initialize transcription model: {e}"))?,
    );

    let handler = resolve_handler(&config.handler.handler_module).ok_or_else(|| {
        anyhow::anyhow!(
            "unrecognized handler_module {:?}",
            config.handler.handler_module
        )
    })?;

    let resources_dir = config
        .actions
        .directory
        .parent()
        .map(|p| p.join("sounds"))
        .unwrap_or_else(|| std::path::PathBuf::from("sounds"));
    let sounds = Arc::new(SoundSink::load(
        &resources_dir,
        config.capture.output_device.clone(),
    ));

    let registry = Arc::new(ActionRegistry::new(config.actions.directory.clone()));
    registry.load_once();
    let _reload_handle = registry.start_periodic_reload(std::time::Duration::from_secs(
        config.actions.action_refresh_interval_seconds,
    ));

    let dispatcher = Dispatcher::new(registry, handler, sounds.clone());

    let mut listener = Listener::new(config.clone(), transcriber, sounds)?;

    let stop_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let stop_flag_handler = stop_flag.clone();
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        stop_flag_handler.store(true, std::sync::atomic::Ordering::Relaxed);
    })?;

    // Poll the shutdown flag on a side thread since `start_listening` blocks
    // the calling thread for the life of the listener (spec §4.4).
    let stop_flag_watcher = stop_flag.clone();
    let listener_handle = listener.handle();
    let watcher_handle = std::thread::Builder::new()
        .name("shutdown-watcher".into())
        .spawn(move || {
            while !stop_flag_watcher.load(std::sync::atomic::Ordering::Relaxed) {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            listener_handle.stop();
        })?;

    listener.start_listening(|instruction_text| {
        dispatcher.act(instruction_text);
    })?;

    let _ = watcher_handle.join();
    tracing::info!("shutdown complete");
    Ok(())
}

fn run_actions_reload(config: &Config) -> anyhow::Result<()> {
    let registry = ActionRegistry::new(config.actions.directory.clone());
    registry.load_once();
    println!(
        "reloaded action registry from {}",
        config.actions.directory.display()
    );
    Ok(())
}

fn run_check_config(config: &Config) -> anyhow::Result<()> {
    println!("{}", config::redacted_display(config));
    Ok(())
}
