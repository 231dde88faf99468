use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use futures::future::join_all;
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

mod cli;

use cli::Cli;
use cli::commands::{Commands, RetryArgs, SecretArgs, WatchArgs};
use stakeout::StakeoutError;
use stakeout::config::{WatchDefaults, load_watch_definitions};
use stakeout::crypto::{Aes256Cbc, Cryptor, key_fingerprint, read_key_file, write_key_file};
use stakeout::notify::{
    DesktopNotifier, HttpPostNotifier, NotificationMessage, Notifier, RetryingNotifier,
};
use stakeout::receiver::{MessageReceiver, TlsSettings};
use stakeout::watch::{Watch, WatchHandle};

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_millis()
        .init();
}

/// Build the cipher from whichever secret source the command line gave us.
fn cipher_from(secret: &SecretArgs) -> Result<Aes256Cbc> {
    if let Some(path) = &secret.key {
        let key = read_key_file(path)
            .context(format!("reading key file {}", path.display()))?;
        info!("using key {} from {}", key_fingerprint(&key), path.display());
        Ok(Aes256Cbc::new(key))
    } else if let Some(password) = &secret.password {
        Ok(Aes256Cbc::from_password(password))
    } else {
        Err(eyre!("either --key or --password is required"))
    }
}

fn build_retrying(inner: Arc<dyn Notifier>, retries: &RetryArgs) -> Arc<RetryingNotifier> {
    match retries.policy() {
        Some((interval, count)) => Arc::new(RetryingNotifier::with_retries(inner, interval, count)),
        None => Arc::new(RetryingNotifier::new(inner)),
    }
}

fn startup_notice() -> NotificationMessage {
    NotificationMessage::new("Stakeout Watching", "Stakeout watcher has started up")
}

/// Start every configured watch, raise passes through `notifier`, and run
/// until all watches halt or ctrl-c arrives.
async fn run_watches(args: WatchArgs, notifier: Arc<RetryingNotifier>) -> Result<()> {
    let definitions = load_watch_definitions(&args.watches)
        .context(format!("loading {}", args.watches.display()))?;
    let defaults = WatchDefaults {
        interval: Duration::from_secs(args.default_interval),
    };

    let mut stoppers = Vec::new();
    let mut consumers = Vec::new();
    for definition in &definitions {
        let watch = Watch::from_definition(definition, &defaults)
            .context(format!("watch '{}'", definition.name))?;
        let handle = watch.start();
        stoppers.push(handle.stopper());
        consumers.push(tokio::spawn(consume_passes(handle, Arc::clone(&notifier))));
    }
    println!(
        "{} {} watch(es) from {}",
        "Watching:".green(),
        definitions.len(),
        args.watches.display()
    );

    if !args.no_startup_notice {
        if let Err(error) = notifier.notify_with_retry(&startup_notice()).await {
            warn!("startup notice went undelivered: {error}");
        }
    }

    let mut consumers_done = join_all(consumers);
    tokio::select! {
        _ = &mut consumers_done => {
            info!("all watches finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            for stopper in &stoppers {
                stopper.stop();
            }
            (&mut consumers_done).await;
        }
    }
    Ok(())
}

/// Await passes from one watch until it stops, delivering each as it lands.
async fn consume_passes(handle: WatchHandle, notifier: Arc<RetryingNotifier>) {
    loop {
        match handle.next_pass().await {
            Ok(notice) => {
                println!(
                    "{} {} at {}",
                    "Passed:".green(),
                    notice.name,
                    notice.passed_at.format("%Y-%m-%d %H:%M:%S")
                );
                if let Err(error) = notifier.notify_with_retry(&notice.to_message()).await {
                    warn!("could not deliver '{}': {error}", notice.name);
                }
            }
            Err(StakeoutError::WatchStopped) => {
                info!("{} finished", handle.name());
                break;
            }
            Err(error) => {
                error!("{}: {error}", handle.name());
            }
        }
    }
}

/// Serve the receiving endpoint, raising every decrypted message locally.
async fn run_notifier(
    retries: &RetryArgs,
    secret: &SecretArgs,
    port: u16,
    tls: Option<TlsSettings>,
) -> Result<()> {
    let cryptor = Cryptor::new(Box::new(cipher_from(secret)?));
    let desktop = build_retrying(Arc::new(DesktopNotifier::new()), retries);
    let receiver = MessageReceiver::new(cryptor, move |message| {
        let notifier = Arc::clone(&desktop);
        tokio::spawn(async move {
            if let Err(error) = notifier.notify_with_retry(&message).await {
                warn!("could not raise '{}': {error}", message.title);
            }
        });
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .context(format!("binding port {port}"))?;
    println!("{} port {}", "Listening:".green(), port);

    tokio::select! {
        outcome = async {
            match &tls {
                Some(settings) => receiver.listen_tls(listener, settings).await,
                None => receiver.listen(listener).await,
            }
        } => outcome?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }
    Ok(())
}

fn generate_key_file(path: &Path) -> Result<()> {
    let key = Aes256Cbc::generate_key();
    write_key_file(path, &key).context(format!("writing {}", path.display()))?;
    println!(
        "{} {} ({})",
        "Wrote key:".green(),
        path.display(),
        key_fingerprint(&key)
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    // Two TLS stacks are linked in (the posting client and the receiver);
    // pin the process-wide provider before either builds a config.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    match cli.command {
        Commands::Desktop { watches, retries } => {
            let notifier = build_retrying(Arc::new(DesktopNotifier::new()), &retries);
            run_watches(watches, notifier).await
        }
        Commands::Watcher {
            watches,
            retries,
            secret,
            host,
            port,
            https,
            tls_ca,
            tls_identity,
        } => {
            let cryptor = Cryptor::new(Box::new(cipher_from(&secret)?));
            let secure = https || tls_ca.is_some() || tls_identity.is_some();
            let scheme = if secure { "https" } else { "http" };
            let url = format!("{scheme}://{host}:{port}");
            info!("posting passes to {url}");
            let poster = HttpPostNotifier::with_tls(
                url,
                cryptor,
                tls_ca.as_deref(),
                tls_identity.as_deref(),
            )
            .context("building the posting client")?;
            let notifier = build_retrying(Arc::new(poster), &retries);
            run_watches(watches, notifier).await
        }
        Commands::Notifier {
            retries,
            secret,
            port,
            tls_cert,
            tls_key,
            tls_client_ca,
            require_client_auth,
        } => {
            let tls = match (tls_cert, tls_key) {
                (Some(cert), Some(key)) => Some(TlsSettings {
                    cert,
                    key,
                    client_ca: tls_client_ca,
                    require_client_auth,
                }),
                _ => None,
            };
            run_notifier(&retries, &secret, port, tls).await
        }
        Commands::Genkey { key } => generate_key_file(&key),
    }
}
