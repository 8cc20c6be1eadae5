use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::types::{ResolutionMode, SecretKind};

/// deploy-credentials - resolve deployment secrets and dispose of them safely
#[derive(Parser, Debug)]
#[command(name = "deploy-credentials")]
#[command(about = "Resolves, validates and generates deployment secrets, then erases them on exit")]
#[command(version)]
pub struct Cli {
    /// Resolver configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Options shared by every command that resolves a credential set
#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Backend(s) to consult: auto, environment, file, generate, interactive
    #[arg(short, long, default_value_t = ResolutionMode::Auto)]
    pub mode: ResolutionMode,

    /// Encrypted credential container for the file backend
    #[arg(long)]
    pub container: Option<PathBuf>,

    /// Require a disk encryption passphrase
    #[arg(long)]
    pub encryption: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve the credential set and print a report (kinds, sources, scores)
    Resolve {
        #[command(flatten)]
        resolve: ResolveArgs,

        /// Seal the resolved set into a new container at this path
        #[arg(long)]
        save: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve, then run a command with the secrets in its environment
    Run {
        #[command(flatten)]
        resolve: ResolveArgs,

        /// Command and arguments, after `--`
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Resolve, then seal the set into an encrypted container
    Seal {
        #[command(flatten)]
        resolve: ResolveArgs,

        /// Container path to write
        #[arg(short, long)]
        output: PathBuf,

        /// PBKDF2 iterations (defaults to the configured value)
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Show container metadata without decrypting it
    Inspect {
        /// Container path
        path: PathBuf,
    },
    /// Print one freshly generated secret
    Generate {
        /// Kind of secret: user, root, disk-encryption
        #[arg(short, long, default_value_t = SecretKind::User)]
        kind: SecretKind,

        /// Password length (user and root)
        #[arg(short, long)]
        length: Option<usize>,

        /// Word count (disk-encryption)
        #[arg(short, long)]
        words: Option<usize>,

        /// Letters and digits only
        #[arg(long)]
        no_special: bool,

        /// Leave out 0, O, 1, l and I
        #[arg(long)]
        no_ambiguous: bool,
    },
    /// Score a secret typed at a masked prompt
    Check {
        /// Kind whose rules apply
        #[arg(short, long, default_value_t = SecretKind::User)]
        kind: SecretKind,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_takes_trailing_command() {
        let cli = Cli::try_parse_from([
            "deploy-credentials",
            "run",
            "--mode",
            "env",
            "--",
            "cryptsetup",
            "--key-file",
            "-",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { resolve, command } => {
                assert_eq!(resolve.mode, ResolutionMode::Environment);
                assert_eq!(command, vec!["cryptsetup", "--key-file", "-"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_generate_parses_kind_alias() {
        let cli = Cli::try_parse_from(["deploy-credentials", "generate", "--kind", "luks", "-w", "8"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Generate {
                kind: SecretKind::DiskEncryption,
                words: Some(8),
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["deploy-credentials", "resolve", "--mode", "vault"]).is_err());
    }
}
