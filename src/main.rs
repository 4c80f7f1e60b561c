use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use world_backup::config::{self, ArchiverBackend, Config, DriveConfig};
use world_backup::managers::discovery::discover_targets;
use world_backup::utils::archiver::resolve_program;
use world_backup::utils::drive::GoogleDrive;
use world_backup::utils::google_auth::GoogleAuth;
use world_backup::utils::locker::RunLock;
use world_backup::utils::{
    Compressor, ExternalArchiver, Mailer, RealExecutor, SmtpMailer, ZipArchiver,
};
use world_backup::{
    init_console_logging, init_logging, BackupManager, BackupSettings, LoggingConfig,
    NotificationManager, RunContext, RunResult,
};

#[derive(Parser)]
#[command(name = "world-backup")]
#[command(about = "Back up game world saves to Google Drive", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/world-backup/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up every world save, then mail the run log
    Run,

    /// Validate configuration file
    Validate,

    /// List the world saves a run would back up
    Targets,

    /// Grant Google Drive access in a browser and write the token file
    Authorize,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    let config = match config::load_config(config::expand_tilde(&cli.config)) {
        Ok(config) => config,
        Err(e) => {
            init_console_logging();
            error!("Invalid configuration {:?}: {}", cli.config, e);
            return Err(e.into());
        }
    };

    match command {
        Commands::Run => run(&config),

        Commands::Validate => {
            println!("Configuration is valid!");
            println!("Saves directory: {:?}", config.global.saves_directory);
            println!("Staging directory: {:?}", config.global.staging_directory);
            println!("Drive folder: {}", config.drive.folder_name);
            println!(
                "Drive token: {}",
                if config.drive.token_file.exists() {
                    "present"
                } else {
                    "missing (run `world-backup authorize`)"
                }
            );
            println!(
                "Email: {}",
                if config.email.enabled { "enabled" } else { "disabled" }
            );
            Ok(ExitCode::SUCCESS)
        }

        Commands::Targets => {
            init_console_logging();
            let targets =
                discover_targets(&config.global.saves_directory, &config.global.exclude);
            println!("World saves in {:?}:", config.global.saves_directory);
            for target in &targets {
                println!("  {}", target.name);
            }
            println!("Total: {}", targets.len());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Authorize => {
            init_console_logging();
            authorize(&config.drive)
        }
    }
}

fn authorize(drive: &DriveConfig) -> Result<ExitCode> {
    let auth = GoogleAuth::from_config(drive)?;
    let pending = auth
        .begin_consent()
        .with_context(|| format!("Failed to start consent with {:?}", drive.credentials_file))?;

    println!("Open this URL in a browser to grant access to Google Drive:\n");
    println!("{}\n", pending.auth_url());
    println!("Waiting for the redirect to {} ...", pending.redirect_uri());

    auth.finish_consent(pending).context("Google Drive authorization failed")?;
    println!("Token written to {:?}", auth.token_file());
    Ok(ExitCode::SUCCESS)
}

fn run(config: &Config) -> Result<ExitCode> {
    let ctx = RunContext::new(Local::now(), &config.global.log_directory);
    let log_guard = init_logging(&ctx, &LoggingConfig::from_config(&config.global))?;
    info!("Logging to {:?}", log_guard.log_file());

    let mut lock = RunLock::open(&config.global.staging_directory)?;
    let _held = lock.try_acquire()?;

    let ext = config.global.archive_extension.as_str();
    let outcome = match config.archiver.backend {
        ArchiverBackend::External => {
            let program = resolve_program(&config.archiver.program);
            info!("Using archiver {:?}", program);
            backup(config, &ctx, ExternalArchiver::new(program, ext, RealExecutor::new()))
        }
        ArchiverBackend::Builtin => backup(config, &ctx, ZipArchiver::new(ext)),
    };

    let succeeded = match outcome {
        Ok(result) => result.all_succeeded(),
        Err(e) => {
            error!("Backup run aborted: {:#}", e);
            false
        }
    };

    // Runs after aborted runs too so their log is still delivered
    let notifier = NotificationManager::new(
        build_mailer(config),
        config.global.log_retention,
        config.global.log_prune_mode,
    );
    notifier.notify(ctx.log_directory());

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn backup<C: Compressor>(config: &Config, ctx: &RunContext, compressor: C) -> Result<RunResult> {
    let storage = GoogleDrive::new(&config.drive).context("Failed to create Google Drive client")?;
    let mut manager = BackupManager::new(BackupSettings::from_config(config), compressor, storage);
    Ok(manager.run(ctx)?)
}

fn build_mailer(config: &Config) -> Option<Box<dyn Mailer>> {
    let email = &config.email;
    if !email.enabled {
        return None;
    }

    match config::resolve_smtp_password(email) {
        Ok(password) => Some(Box::new(SmtpMailer::new(
            &email.smtp_host,
            email.smtp_port,
            &email.sender,
            &email.recipient,
            password,
        ))),
        Err(e) => {
            error!("Email disabled for this run: {}", e);
            None
        }
    }
}
