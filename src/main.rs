//! deploy-credentials - main entry point
//!
//! Thin wrapper over the library: load configuration, resolve, hand the
//! secrets to a collaborator or a container, and let the lifecycle guard erase
//! everything on the way out.

use anyhow::{Context, Result};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, ExitCode};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use deploy_credentials::backends::ProcessEnv;
use deploy_credentials::backends::file::PASSPHRASE_ENV;
use deploy_credentials::backends::generator::{generate_passphrase, generate_password};
use deploy_credentials::cli::{Cli, Commands, ResolveArgs};
use deploy_credentials::prompt::{SecretPrompt, TerminalPrompt};
use deploy_credentials::{
    CommandDeathPact, CredentialError, CredentialStore, EncryptedContainer, LifecycleGuard,
    ResolutionReport, Resolver, ResolverConfig, SecretKind, Toggle, export, lifecycle, strength,
};

/// Initialize the logger with appropriate settings
fn init_logger() {
    use tracing_subscriber::{EnvFilter, fmt};

    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Main application entry point
fn main() -> ExitCode {
    init_logger();
    lifecycle::install_panic_hook();

    // Erase secrets on SIGINT/SIGTERM/SIGHUP as well as on normal exit
    if let Err(e) = lifecycle::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    debug!("Signal handlers initialized");

    let cli = Cli::parse_args();
    let guard = LifecycleGuard::new();

    match run(cli, &guard) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn run(cli: Cli, guard: &LifecycleGuard) -> Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Resolve {
            resolve,
            save,
            json,
        } => {
            let config = load_config(config_path, Some(&resolve))?;
            let store = CredentialStore::new();
            guard.track_store(&store);
            let report = resolve_into(&config, &resolve, &store)?;

            if let Some(path) = save {
                seal_store(&store, &path, config.kdf_iterations)?;
            }
            print_report(&report, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { resolve, command } => {
            let config = load_config(config_path, Some(&resolve))?;
            let store = CredentialStore::new();
            guard.track_store(&store);
            resolve_into(&config, &resolve, &store)?;
            run_collaborator(&config, &store, &command)
        }
        Commands::Seal {
            resolve,
            output,
            iterations,
        } => {
            let mut config = load_config(config_path, Some(&resolve))?;
            if let Some(n) = iterations {
                config.kdf_iterations = n;
                config.validate()?;
            }
            let store = CredentialStore::new();
            guard.track_store(&store);
            resolve_into(&config, &resolve, &store)?;
            seal_store(&store, &output, config.kdf_iterations)?;
            println!("✓ Credential container written to {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect { path } => {
            let container = EncryptedContainer::read_from(&path)
                .with_context(|| format!("Failed to read container {:?}", path))?;
            println!("Container:  {}", path.display());
            println!("Version:    {}", container.format_version);
            println!("Cipher:     {}", container.cipher);
            println!("Iterations: {}", container.kdf_iterations);
            match container.created_at {
                Some(created) => println!("Created:    {}", created.to_rfc3339()),
                None => println!("Created:    unknown"),
            }
            println!("Ciphertext: {} bytes", container.ciphertext().len());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Generate {
            kind,
            length,
            words,
            no_special,
            no_ambiguous,
        } => {
            let mut config = load_config(config_path, None)?;
            let options = &mut config.generator;
            options.include_special &= !no_special;
            options.exclude_ambiguous |= no_ambiguous;
            match (kind, length) {
                (SecretKind::User, Some(length)) => options.user_length = length,
                (SecretKind::Root, Some(length)) => options.root_length = length,
                _ => {}
            }
            if let Some(words) = words {
                options.passphrase_words = words;
            }
            config.validate().context("Invalid generator options")?;

            let options = &config.generator;
            let value = match kind {
                SecretKind::User => generate_password(kind, options.user_length, options)?,
                SecretKind::Root => generate_password(kind, options.root_length, options)?,
                SecretKind::DiskEncryption => {
                    generate_passphrase(options.passphrase_words, options)?
                }
            };
            info!(%kind, score = strength::score(&value), "Generated secret printed to stdout");
            println!("{}", value.as_str());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { kind } => {
            let mut prompt = TerminalPrompt::new();
            if !prompt.is_available() {
                anyhow::bail!("check needs an interactive terminal");
            }
            let value = prompt
                .read_secret(&format!("Enter {} to check", kind.description()))
                .context("Prompt cancelled")?;
            let score = strength::score(&value);
            println!("Score: {}/{}", score, strength::MAX_SCORE);
            match strength::validate_for(&value, kind) {
                Ok(()) if score < strength::WEAK_SCORE_THRESHOLD => {
                    println!("Accepted for {}, but weak", kind);
                    Ok(ExitCode::SUCCESS)
                }
                Ok(()) => {
                    println!("✓ Accepted for {}", kind);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    println!("✗ {}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// Config file, then environment, then CLI flags
fn load_config(path: Option<&Path>, args: Option<&ResolveArgs>) -> Result<ResolverConfig> {
    let mut config = match path {
        Some(path) => {
            info!("Loading resolver configuration from {:?}", path);
            ResolverConfig::load_from_file(path)?
        }
        None => ResolverConfig::default(),
    };
    config.apply_env_overrides(&ProcessEnv)?;

    if let Some(args) = args {
        if args.encryption {
            config.encryption = Toggle::Yes;
        }
        if let Some(container) = &args.container {
            config.container = Some(container.clone());
        }
    }

    config.validate().context("Invalid resolver configuration")?;
    Ok(config)
}

fn resolve_into(
    config: &ResolverConfig,
    args: &ResolveArgs,
    store: &CredentialStore,
) -> Result<ResolutionReport> {
    let mut resolver = Resolver::from_config(config);
    let report = resolver.resolve(args.mode, store)?;
    Ok(report)
}

fn print_report(report: &ResolutionReport, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{}", text);
        return Ok(());
    }

    println!("Mode: {}", report.mode);
    for attempt in &report.attempts {
        let supplied = attempt
            .supplied
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match &attempt.reason {
            Some(reason) => println!("  {:<12} {:<8} {}", attempt.backend, attempt.outcome, reason),
            None => println!("  {:<12} {:<8} {}", attempt.backend, attempt.outcome, supplied),
        }
    }
    println!("Secrets:");
    for secret in &report.secrets {
        println!(
            "  {:<16} source={:<12} score={}/{} length={}",
            secret.kind,
            secret.source,
            secret.score,
            strength::MAX_SCORE,
            secret.length
        );
    }
    Ok(())
}

/// Passphrase for a new container: environment, else prompted twice
fn new_container_passphrase() -> Result<Zeroizing<String>> {
    if let Some(value) = std::env::var(PASSPHRASE_ENV).ok().filter(|v| !v.is_empty()) {
        return Ok(Zeroizing::new(value));
    }

    let mut prompt = TerminalPrompt::new();
    if !prompt.is_available() {
        anyhow::bail!("{} is unset and no terminal is attached", PASSPHRASE_ENV);
    }
    loop {
        let first = prompt
            .read_secret("New container passphrase")
            .context("Prompt cancelled")?;
        if first.is_empty() {
            prompt.notice("Passphrase cannot be empty.");
            continue;
        }
        let second = prompt
            .read_secret("Confirm container passphrase")
            .context("Prompt cancelled")?;
        if *first == *second {
            return Ok(first);
        }
        prompt.notice("Entries do not match, try again.");
    }
}

fn seal_store(store: &CredentialStore, path: &Path, iterations: u32) -> Result<()> {
    let passphrase = new_container_passphrase()?;
    if strength::score(&passphrase) < strength::WEAK_SCORE_THRESHOLD {
        warn!("Container passphrase is weak");
    }
    let container = store.with_set(|set| {
        deploy_credentials::container::seal_credentials(set, &passphrase, iterations)
    })?;
    container
        .write_to(path)
        .with_context(|| format!("Failed to write container {:?}", path))?;
    Ok(())
}

/// Run `argv` with the secrets in its environment and return its exit status
fn run_collaborator(
    config: &ResolverConfig,
    store: &CredentialStore,
    argv: &[String],
) -> Result<ExitCode> {
    let Some((program, args)) = argv.split_first() else {
        anyhow::bail!("No command given");
    };

    let keyfile = export::write_keyfile(store, &config.scratch_dir())?;

    let mut command = Command::new(program);
    command.args(args);
    store.with_set(|set| export::apply_to_command(set, &mut command));
    if let Some(keyfile) = &keyfile {
        command.env(export::KEYFILE_ENV, keyfile.path());
    }
    command.die_with_parent();

    info!(program = %program, "Starting collaborator");
    let status = command
        .status()
        .with_context(|| format!("Failed to run {:?}", program))?;
    drop(command);
    drop(keyfile);

    let code = match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    };
    info!(program = %program, code, "Collaborator finished");
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

/// Map errors to distinct exit codes for calling scripts
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CredentialError>() {
        Some(CredentialError::IncompleteCredentialSet { .. }) => 3,
        Some(CredentialError::DecryptionFailure) => 4,
        Some(CredentialError::InvalidContainer(_)) => 5,
        Some(CredentialError::GenerationExhausted { .. }) => 6,
        Some(CredentialError::Aborted { .. }) => 130,
        _ => 1,
    }
}
