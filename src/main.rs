use std::{path::PathBuf, process, sync::Arc, time::Duration};

use clap::Parser;
use tracing::{error, info, warn};
use vhs_client::{
    AnalysisOptions, BusyFlag, ClientConfig, ImageFile, LogLevel, Profile, VhsClient,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the radiograph(s), JPEG or PNG
    #[clap(required_unless_present = "health")]
    images: Vec<PathBuf>,
    /// Output directory for the JSON results and overlay images
    #[clap(short = 'd', long, default_value = ".")]
    output_dir: PathBuf,
    /// Override the API URL from the environment variable
    #[clap(short, long)]
    api_url: Option<String>,
    /// Override the API version path segment
    #[clap(short = 'v', long)]
    api_version: Option<String>,
    /// Deployment profile providing the retry and logging defaults
    #[arg(value_enum)]
    #[clap(short, long, default_value = "production")]
    profile: Profile,
    /// Do not request the annotated overlay image
    #[clap(long)]
    no_overlay: bool,
    /// Override the request timeout, in milliseconds
    #[clap(short, long)]
    timeout_ms: Option<u64>,
    /// Only check the backend health
    #[clap(long)]
    health: bool,
    /// Only validate the files, do not submit them
    #[clap(long)]
    validate_only: bool,
    /// Build a preview data URL of each file before submitting it
    #[clap(long)]
    preview: bool,
    /// Set the log level
    #[arg(value_enum)]
    #[clap(short = 'L', long, default_value = "info")]
    log_level: LogLevel,
    /// Display timestamps with log messages
    #[clap(short = 'T', long)]
    timestamp: bool,
}

#[tokio::main]
pub async fn main() {
    let args = Args::parse();

    if let Err(e) = vhs_client::init_tracing(&[], args.log_level, args.timestamp) {
        eprintln!("Error while setting subscriber for tracing: {}", e);
    }

    let mut config = match ClientConfig::from_env_with_url(args.api_url.as_deref(), args.profile) {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {}", e);
            process::exit(1);
        }
    };
    if let Some(version) = &args.api_version {
        config.api_version = version.trim_matches('/').to_string();
    }

    let busy = Arc::new(BusyFlag::new());
    let client = match VhsClient::new(config, busy.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Error: {}", e);
            process::exit(1);
        }
    };

    if args.health {
        match client.check_health().await {
            Ok(health) => println!("Backend {} ({})", health.status, health.timestamp),
            Err(e) => {
                error!("Health check failed: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let files = match files_from_args(&client, &args).await {
        Some(files) => files,
        None => {
            error!("No valid radiograph found at the specified path(s), exiting.");
            process::exit(1);
        }
    };

    if args.validate_only {
        return;
    }

    let indicator = tokio::spawn(progress_indicator(busy.clone()));

    let options = AnalysisOptions {
        include_overlay: !args.no_overlay,
        timeout: args.timeout_ms.map(Duration::from_millis),
    };

    let names: Vec<PathBuf> = files.iter().map(|f| PathBuf::from(&f.name)).collect();
    let stems = vhs_client::result_stems(&names, None);

    let mut handles = Vec::new();
    for (file, stem) in files.into_iter().zip(stems) {
        let client = Arc::clone(&client);
        let options = options.clone();
        handles.push(tokio::spawn(async move {
            let result = client.analyze(Some(&file), &options).await;
            (file, stem, result)
        }));
    }

    let mut failures = 0;
    for handle in handles {
        let (file, stem, result) = match handle.await {
            Ok(done) => done,
            Err(e) => {
                error!("Analysis task failed: {}", e);
                failures += 1;
                continue;
            }
        };
        match result {
            Ok(result) => {
                println!("== {}\n{}", file.name, vhs_client::summary(&result));
                match vhs_client::save_results(&result, &args.output_dir, &stem).await {
                    Ok(paths) => {
                        for path in paths {
                            info!("Saved {}", path.display());
                        }
                    }
                    Err(e) => error!("Error while saving results of {}: {}", file.name, e),
                }
            }
            Err(e) => {
                println!("== {}\nError: {}", file.name, e);
                failures += 1;
            }
        }
    }

    indicator.abort();

    if failures > 0 {
        process::exit(1);
    }
}

/// Loads and validates every file given on the command line, skipping the ones
/// that cannot be read or are rejected.
async fn files_from_args(client: &VhsClient, args: &Args) -> Option<Vec<ImageFile>> {
    let mut files = Vec::new();
    for path in &args.images {
        let file = match ImageFile::open(path).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Skipping file {}: {}", path.display(), e);
                continue;
            }
        };

        let validation = client.validate(&file);
        if !validation.valid {
            for e in &validation.errors {
                warn!("Skipping file {}: {}", path.display(), e);
            }
            continue;
        }

        if args.preview {
            match client.create_preview(&file).await {
                Ok(url) => info!(
                    "Preview of {} ready ({})",
                    path.display(),
                    vhs_client::format_file_size(url.len() as u64)
                ),
                Err(e) => warn!("{}: {}", path.display(), e),
            }
        }

        info!(
            "File {} ({}) added to the radiographs to be analyzed.",
            path.display(),
            vhs_client::format_file_size(file.len())
        );
        files.push(file);
    }
    if files.is_empty() {
        return None;
    }
    Some(files)
}

/// Reports when the client starts and stops having requests in flight.
async fn progress_indicator(busy: Arc<BusyFlag>) {
    let mut rx = busy.subscribe();
    while rx.changed().await.is_ok() {
        let active = *rx.borrow_and_update();
        if active {
            info!("Analysis in progress ({} request(s))...", busy.in_flight());
        } else {
            info!("Idle");
        }
    }
}
