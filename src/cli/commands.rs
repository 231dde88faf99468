//! CLI command definitions using clap.
//!
//! Four subcommands cover the deployment shapes:
//! - desktop: watch and notify on the same machine
//! - watcher: watch here, post encrypted passes to a remote notifier
//! - notifier: receive encrypted passes and raise them on this desktop
//! - genkey: mint a shared key file for a watcher/notifier pair

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Port the notifier listens on and the watcher posts to unless told otherwise.
pub const DEFAULT_PORT: u16 = 8888;

/// Stakeout - watch web pages and get told the moment a condition passes
#[derive(Parser, Debug)]
#[command(name = "stakeout")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log detail (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run watches and raise passes as desktop notifications on this machine
    Desktop {
        #[command(flatten)]
        watches: WatchArgs,

        #[command(flatten)]
        retries: RetryArgs,
    },

    /// Run watches and post encrypted passes to a remote notifier
    Watcher {
        #[command(flatten)]
        watches: WatchArgs,

        #[command(flatten)]
        retries: RetryArgs,

        #[command(flatten)]
        secret: SecretArgs,

        /// Hostname to post notifications to
        #[arg(long)]
        host: String,

        /// Port the notifier listens on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Post over HTTPS
        #[arg(long)]
        https: bool,

        /// Extra root certificate (PEM) to trust for the notifier
        #[arg(long, value_name = "FILE")]
        tls_ca: Option<PathBuf>,

        /// Client certificate plus key (PEM) to present to the notifier
        #[arg(long, value_name = "FILE")]
        tls_identity: Option<PathBuf>,
    },

    /// Receive encrypted passes from remote watchers and raise them here
    Notifier {
        #[command(flatten)]
        retries: RetryArgs,

        #[command(flatten)]
        secret: SecretArgs,

        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Server certificate (PEM) to terminate TLS with
        #[arg(long, value_name = "FILE", requires = "tls_key")]
        tls_cert: Option<PathBuf>,

        /// Private key (PEM) matching --tls-cert
        #[arg(long, value_name = "FILE", requires = "tls_cert")]
        tls_key: Option<PathBuf>,

        /// CA bundle (PEM) that signs acceptable client certificates
        #[arg(long, value_name = "FILE", requires = "tls_cert")]
        tls_client_ca: Option<PathBuf>,

        /// Reject clients that do not present a verifiable certificate
        #[arg(long, requires = "tls_client_ca")]
        require_client_auth: bool,
    },

    /// Generate a fresh 256-bit key file for a watcher/notifier pair
    Genkey {
        /// Where to write the key
        #[arg(short, long, value_name = "FILE")]
        key: PathBuf,
    },
}

/// Where watch definitions come from and how often they poll by default.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// JSON file of watch definitions
    #[arg(short = 'f', long, default_value = "watches.json", value_name = "FILE")]
    pub watches: PathBuf,

    /// Poll interval for watches that do not set their own, in seconds
    #[arg(long, default_value_t = 60, value_name = "SECONDS")]
    pub default_interval: u64,

    /// Skip the notification announcing that watching has started
    #[arg(long)]
    pub no_startup_notice: bool,
}

/// Redelivery knobs for notifications that fail to land.
#[derive(Args, Debug)]
pub struct RetryArgs {
    /// Seconds between redelivery attempts for a failed notification
    #[arg(long, default_value_t = 0, value_name = "SECONDS")]
    pub retry_interval: u64,

    /// How many redeliveries to attempt before giving up
    #[arg(long, default_value_t = 0, value_name = "COUNT")]
    pub retry_count: u32,
}

impl RetryArgs {
    /// Redelivery is on only when both knobs are nonzero.
    pub fn policy(&self) -> Option<(Duration, u32)> {
        if self.retry_interval > 0 && self.retry_count > 0 {
            Some((Duration::from_secs(self.retry_interval), self.retry_count))
        } else {
            None
        }
    }
}

/// The shared secret both ends encrypt with: a raw key file or a password to
/// derive one from. Exactly one must be given.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SecretArgs {
    /// File holding the raw 256-bit key
    #[arg(short, long, value_name = "FILE")]
    pub key: Option<PathBuf>,

    /// Password to derive the encryption key from
    #[arg(long, value_name = "PASSWORD")]
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_desktop_defaults() {
        let cli = Cli::try_parse_from(["stakeout", "desktop"]).unwrap();
        match cli.command {
            Commands::Desktop { watches, retries } => {
                assert_eq!(watches.watches, PathBuf::from("watches.json"));
                assert_eq!(watches.default_interval, 60);
                assert!(!watches.no_startup_notice);
                assert!(retries.policy().is_none());
            }
            _ => panic!("expected desktop command"),
        }
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_desktop_custom_watches_file() {
        let cli = Cli::try_parse_from(["stakeout", "desktop", "-f", "mine.json"]).unwrap();
        match cli.command {
            Commands::Desktop { watches, .. } => {
                assert_eq!(watches.watches, PathBuf::from("mine.json"));
            }
            _ => panic!("expected desktop command"),
        }
    }

    #[test]
    fn test_watcher_parses() {
        let cli = Cli::try_parse_from([
            "stakeout",
            "watcher",
            "--host",
            "notify.example",
            "--key",
            "shared.key",
        ])
        .unwrap();
        match cli.command {
            Commands::Watcher {
                host, port, https, secret, ..
            } => {
                assert_eq!(host, "notify.example");
                assert_eq!(port, DEFAULT_PORT);
                assert!(!https);
                assert_eq!(secret.key, Some(PathBuf::from("shared.key")));
                assert!(secret.password.is_none());
            }
            _ => panic!("expected watcher command"),
        }
    }

    #[test]
    fn test_watcher_requires_host() {
        let result = Cli::try_parse_from(["stakeout", "watcher", "--key", "shared.key"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_watcher_requires_a_secret() {
        let result = Cli::try_parse_from(["stakeout", "watcher", "--host", "notify.example"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_key_and_password_are_exclusive() {
        let result = Cli::try_parse_from([
            "stakeout",
            "watcher",
            "--host",
            "notify.example",
            "--key",
            "shared.key",
            "--password",
            "hunter2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_password_alone_is_enough() {
        let cli = Cli::try_parse_from(["stakeout", "notifier", "--password", "hunter2"]).unwrap();
        match cli.command {
            Commands::Notifier { secret, port, .. } => {
                assert_eq!(secret.password.as_deref(), Some("hunter2"));
                assert_eq!(port, DEFAULT_PORT);
            }
            _ => panic!("expected notifier command"),
        }
    }

    #[test]
    fn test_retry_policy_needs_both_knobs() {
        let cli = Cli::try_parse_from(["stakeout", "desktop", "--retry-interval", "30"]).unwrap();
        match cli.command {
            Commands::Desktop { retries, .. } => assert!(retries.policy().is_none()),
            _ => panic!("expected desktop command"),
        }

        let cli = Cli::try_parse_from([
            "stakeout",
            "desktop",
            "--retry-interval",
            "30",
            "--retry-count",
            "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Desktop { retries, .. } => {
                assert_eq!(retries.policy(), Some((Duration::from_secs(30), 3)));
            }
            _ => panic!("expected desktop command"),
        }
    }

    #[test]
    fn test_notifier_cert_requires_key() {
        let result = Cli::try_parse_from([
            "stakeout",
            "notifier",
            "--password",
            "hunter2",
            "--tls-cert",
            "cert.pem",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_notifier_full_tls() {
        let cli = Cli::try_parse_from([
            "stakeout",
            "notifier",
            "--password",
            "hunter2",
            "--tls-cert",
            "cert.pem",
            "--tls-key",
            "key.pem",
            "--tls-client-ca",
            "clients.pem",
            "--require-client-auth",
        ])
        .unwrap();
        match cli.command {
            Commands::Notifier {
                tls_cert,
                tls_key,
                tls_client_ca,
                require_client_auth,
                ..
            } => {
                assert_eq!(tls_cert, Some(PathBuf::from("cert.pem")));
                assert_eq!(tls_key, Some(PathBuf::from("key.pem")));
                assert_eq!(tls_client_ca, Some(PathBuf::from("clients.pem")));
                assert!(require_client_auth);
            }
            _ => panic!("expected notifier command"),
        }
    }

    #[test]
    fn test_client_auth_requires_client_ca() {
        let result = Cli::try_parse_from([
            "stakeout",
            "notifier",
            "--password",
            "hunter2",
            "--tls-cert",
            "cert.pem",
            "--tls-key",
            "key.pem",
            "--require-client-auth",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_genkey() {
        let cli = Cli::try_parse_from(["stakeout", "genkey", "--key", "fresh.key"]).unwrap();
        match cli.command {
            Commands::Genkey { key } => assert_eq!(key, PathBuf::from("fresh.key")),
            _ => panic!("expected genkey command"),
        }
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from(["stakeout", "desktop", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
