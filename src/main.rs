use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tokio::sync::watch;

use mbot::application::commands::Services;
use mbot::application::errors::BotError;
use mbot::application::messaging::{EventDispatcher, SessionConfig};
use mbot::application::services::{ChannelPolicies, CommandRouter, OwnerVerification, PermissionResolver, RateLimiter};
use mbot::domain::traits::SettingsStore;
use mbot::infrastructure::adapters::IrcConnection;
use mbot::infrastructure::config::Config;
use mbot::infrastructure::plugins::{sweep_temp_dirs, DylibLoader, HttpFetcher, ModuleInstaller, ModuleLoader, ModuleRegistry};
use mbot::infrastructure::storage::YamlStore;

/// Time the QUIT line gets to reach the server after `die`
const QUIT_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "mbot")]
#[command(about = "An IRC bot that grows through hot-swappable modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            if let Err(e) = run_bot(&cli.config) {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("mbot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config();
        }
    }
}

fn load_config(path: &str) -> Result<Config, BotError> {
    if Path::new(path).exists() {
        return Ok(Config::load(path)?);
    }
    tracing::warn!("Config file {} not found, using defaults and environment", path);
    let config = Config::load_env();
    config.validate()?;
    Ok(config)
}

fn run_bot(config_path: &str) -> Result<(), BotError> {
    let config = load_config(config_path)?;
    tracing::info!("Starting mbot as {} on {}", config.server.nick, config.server.address);

    let store: Arc<dyn SettingsStore> = Arc::new(YamlStore::new(
        &config.storage.settings_path,
        &config.storage.channel_settings_path,
    ));
    let permissions = Arc::new(PermissionResolver::new(store.clone())?);
    let channels = Arc::new(ChannelPolicies::new(store)?);
    let rate_limiter = Arc::new(RateLimiter::new(config.security.rate_limit.to_settings()));

    let module_dir = config.plugins.directory.clone();
    if let Err(e) = std::fs::create_dir_all(&module_dir) {
        tracing::warn!("Failed to create module directory {}: {}", module_dir.display(), e);
    }

    let loader: Arc<dyn ModuleLoader> = Arc::new(DylibLoader::new());
    let modules = Arc::new(ModuleRegistry::new(loader.clone()));
    let installer = match HttpFetcher::new(Duration::from_secs(config.plugins.fetch_timeout_secs)) {
        Ok(fetcher) => Some(Arc::new(ModuleInstaller::new(
            modules.clone(),
            loader,
            Arc::new(fetcher),
            &module_dir,
        ))),
        Err(e) => {
            tracing::warn!("Remote module loading disabled: {}", e);
            None
        }
    };

    if config.plugins.auto_load {
        match modules.scan_directory(&module_dir) {
            Ok(count) => tracing::info!("Loaded {} modules from {}", count, module_dir.display()),
            Err(e) => tracing::warn!("Module scan failed: {}", e),
        }
    }

    let verification = Arc::new(OwnerVerification::new(permissions.clone()));
    if !permissions.owner_verified() {
        let (nick, passphrase) = prompt_owner()?;
        verification.begin(&nick, &passphrase)?;
    }

    let (shutdown, stop) = watch::channel(false);
    let services = Arc::new(Services {
        permissions,
        rate_limiter: rate_limiter.clone(),
        channels,
        modules: modules.clone(),
        installer: installer.clone(),
        module_dir,
        shutdown,
    });
    let router = CommandRouter::new(config.bot.prefix.clone(), services);
    let dispatcher = EventDispatcher::new(
        router,
        verification,
        SessionConfig {
            channels: config.server.channels.clone(),
            password: config.server.password.clone(),
            verification_delay: Duration::from_secs(config.security.verification_delay_secs),
        },
    );

    let rt = tokio::runtime::Runtime::new().map_err(|e| BotError::Internal(e.to_string()))?;
    rt.block_on(async {
        spawn_sweeper(&config, rate_limiter, installer);
        connection_loop(&config, &dispatcher, stop).await;
    });

    for info in modules.list() {
        if let Err(e) = modules.unload(&info.name) {
            tracing::warn!("Failed to unload {}: {}", info.name, e);
        }
    }
    tracing::info!("mbot stopped");
    Ok(())
}

/// Ask the operator who the owner is before connecting
fn prompt_owner() -> Result<(String, String), BotError> {
    println!("No verified owner on record.");
    let nick = read_line("Owner nick: ")?;
    let passphrase = read_line("Verification passphrase: ")?;
    if nick.is_empty() || passphrase.is_empty() {
        return Err(BotError::Internal("owner nick and passphrase are required".to_string()));
    }
    Ok((nick, passphrase))
}

fn read_line(prompt: &str) -> Result<String, BotError> {
    print!("{}", prompt);
    std::io::stdout()
        .flush()
        .map_err(|e| BotError::Internal(e.to_string()))?;
    let mut input = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut input)
        .map_err(|e| BotError::Internal(e.to_string()))?;
    Ok(input.trim().to_string())
}

/// Periodically drop stale download directories and idle rate records
fn spawn_sweeper(config: &Config, rate_limiter: Arc<RateLimiter>, installer: Option<Arc<ModuleInstaller>>) {
    let every = Duration::from_secs(config.plugins.sweep_interval_secs.max(1));
    let max_age = Duration::from_secs(config.plugins.temp_max_age_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let purged = rate_limiter.purge_idle_at(Instant::now());
            if purged > 0 {
                tracing::debug!("Purged {} idle rate limit records", purged);
            }
            if let Some(installer) = &installer {
                let removed = sweep_temp_dirs(installer.temp_root(), max_age);
                if removed > 0 {
                    tracing::info!("Removed {} stale module downloads", removed);
                }
            }
        }
    });
}

/// Keep a connection up until Ctrl-C or the owner's `die`
async fn connection_loop(config: &Config, dispatcher: &EventDispatcher, mut stop: watch::Receiver<bool>) {
    let delay = Duration::from_secs(config.server.reconnect_delay_secs);

    loop {
        let connection = IrcConnection::new(config.server.clone());
        tokio::select! {
            result = connection.run(dispatcher) => match result {
                Ok(()) => tracing::info!("Connection closed"),
                Err(e) => tracing::warn!("Connection lost: {}", e),
            },
            _ = stop.wait_for(|stopping| *stopping) => {
                tracing::info!("Shutdown requested by the owner");
                tokio::time::sleep(QUIT_GRACE).await;
                return;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                return;
            }
        }

        if *stop.borrow() {
            tracing::info!("Shutdown requested by the owner");
            return;
        }

        tracing::info!("Reconnecting in {}s", delay.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                return;
            }
        }
    }
}

fn init_config() {
    match serde_yaml::to_string(&Config::default()) {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
        Err(e) => tracing::error!("Failed to render default config: {}", e),
    }
}
