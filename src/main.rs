//! Reddit Media Downloader - CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use reddit_media_downloader::{
    api::{ContentApi, RedditApi},
    cli::Args,
    config::{seed_store, validation::validate_credentials, validation::validate_groups, Config},
    download::{CancelSignal, Dispatcher, DownloaderRegistry, HelperBinary},
    error::{exit_codes, Error, Result},
    group::SourceGroup,
    output::{
        create_spinner, print_banner, print_config_summary, print_dispatch_stats, print_error,
        print_group_header, print_info, print_scan_summary, print_success, print_summary, print_warning,
        ProgressBarSink,
    },
    sources::SourceRegistry,
    store::{GroupId, MemoryStore, Store},
};

/// Longest address shown next to a progress bar.
const LABEL_CHARS: usize = 40;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            match e {
                Error::Config(_)
                | Error::ConfigValidation { .. }
                | Error::MissingConfig(_)
                | Error::InvalidSourceConfig { .. }
                | Error::UnknownSourceType(_)
                | Error::InvalidFilter { .. }
                | Error::TomlParse(_) => ExitCode::from(exit_codes::CONFIG_ERROR as u8),
                Error::UpstreamAuth(_) | Error::Api(_) | Error::RateLimited(_) => {
                    ExitCode::from(exit_codes::API_ERROR as u8)
                }
                Error::Download(_) | Error::MissingTool(_) => {
                    ExitCode::from(exit_codes::DOWNLOAD_ERROR as u8)
                }
                Error::GracefulStop(_) => ExitCode::from(exit_codes::ABORT as u8),
                _ => ExitCode::from(exit_codes::UNEXPECTED_ERROR as u8),
            }
        }
    }
}

async fn run() -> Result<i32> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    print_banner();

    // Load configuration
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        print_warning(&format!(
            "Configuration file not found: {}",
            args.config.display()
        ));
        print_info("Using default configuration with CLI arguments");
        Config::default()
    };

    args.merge_into_config(&mut config);

    // Validate configuration
    validate_groups(&config.groups, &SourceRegistry::builtin())?;
    if !args.download_only {
        validate_credentials(&config)?;
    }

    let helper = HelperBinary::locate(config.options.ytdl_path.as_deref()).ok();
    let selected: Vec<String> = config
        .groups
        .iter()
        .map(|g| g.name.clone())
        .filter(|name| args.selects_group(name))
        .collect();
    print_config_summary(
        &selected,
        helper.as_ref().map(|h| h.path().to_str().unwrap_or("?")),
        &config.download_directory().display().to_string(),
    );

    let store_path = config.store_path();
    let store = Arc::new(MemoryStore::load_snapshot(&store_path).await?);
    let group_ids = seed_store(&config, store.as_ref()).await?;

    // Stop between downloads on Ctrl-C; running downloads end early too.
    let cancel = CancelSignal::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                print_warning("Stop requested, finishing up...");
                cancel.stop();
            }
        });
    }

    let mut groups_failed = 0;
    let mut posts_new = 0;
    let mut urls_new = 0;

    if !args.download_only {
        print_info("Connecting to Reddit...");
        let api = RedditApi::authenticate(config.credentials()).await?;
        print_info(&format!("Logged in as: {}", api.username().await?));
        let api: Arc<dyn ContentApi> = Arc::new(api);

        for id in group_ids {
            if cancel.should_stop() {
                break;
            }
            match scan_group(api.clone(), store.as_ref(), id, &args).await {
                Ok(Some((new_posts, new_urls))) => {
                    posts_new += new_posts;
                    urls_new += new_urls;
                }
                Ok(None) => {}
                Err(e) if e.is_fatal_to_scan() => {
                    if let Err(save) = store.save_snapshot(&store_path).await {
                        tracing::warn!("Could not save store: {}", save);
                    }
                    return Err(e);
                }
                Err(e) => {
                    print_error(&format!("Group scan failed: {}", e));
                    groups_failed += 1;
                }
            }
        }
        store.save_snapshot(&store_path).await?;
    }

    let client = reqwest::Client::builder()
        .user_agent(&config.account.user_agent)
        .build()
        .map_err(|e| Error::Download(format!("Failed to create HTTP client: {}", e)))?;
    let registry = DownloaderRegistry::builtin(client, config.options.ytdl_path.as_deref());
    let dispatcher = Dispatcher::new(store.clone(), registry, config.download_directory())
        .with_hashing(config.options.hash_files);

    if args.retry_failed {
        let reset = dispatcher.retry_all_failed().await?;
        print_info(&format!("Reset {} failed urls", reset));
    }

    let mut completed = 0;
    let mut failed = 0;
    if !args.scan_only {
        let show_progress = config.options.show_progress;
        let stats = dispatcher
            .run_pending(
                |url| {
                    if show_progress {
                        ProgressBarSink::new(&progress_label(&url.address))
                    } else {
                        ProgressBarSink::hidden()
                    }
                },
                &cancel,
            )
            .await?;
        print_dispatch_stats(&stats);
        completed = stats.completed;
        failed = stats.failed;
    }
    store.save_snapshot(&store_path).await?;

    print_summary(posts_new as u64, urls_new as u64, completed, failed);

    if groups_failed > 0 {
        print_warning(&format!("{} group(s) failed", groups_failed));
        return Ok(exit_codes::SOME_GROUPS_FAILED);
    }
    if cancel.should_stop() {
        return Ok(exit_codes::ABORT);
    }

    print_success("Done");
    Ok(exit_codes::SUCCESS)
}

/// Scan one group if it was selected. Returns new post and url counts.
async fn scan_group(
    api: Arc<dyn ContentApi>,
    store: &dyn Store,
    id: GroupId,
    args: &Args,
) -> Result<Option<(usize, usize)>> {
    let group = SourceGroup::load(store, id).await?;
    if !args.selects_group(group.name()) {
        return Ok(None);
    }

    print_group_header(group.name(), group.sources().len(), group.filter_count());
    for failure in group.load_errors() {
        print_warning(&format!(
            "Skipping source {} ({}): {}",
            failure.source_name, failure.source_type, failure.error
        ));
    }

    let spinner = create_spinner(&format!("Scanning {}...", group.name()));
    let result = group.scan(api, store).await;
    spinner.finish_and_clear();

    let summary = result?;
    print_scan_summary(group.name(), &summary);
    Ok(Some((summary.posts_new, summary.urls_new)))
}

fn progress_label(address: &str) -> String {
    let trimmed = address
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    if trimmed.chars().count() <= LABEL_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(LABEL_CHARS - 3).collect();
        format!("{}...", head)
    }
}
