use std::{
    fs,
    path::{Path, PathBuf},
    process,
    sync::Arc,
};

use clap::Parser;
use futures_util::{stream, StreamExt};
use tokio::sync::mpsc::{self, Sender};
use tracing::{error, info, warn};
use vhs_client::{
    AnalysisOptions, BusyFlag, ClientConfig, ImageFile, LogLevel, Profile, VhsClient,
};
use walkdir::WalkDir;

#[derive(Debug)]
struct Event {
    path: PathBuf,
    kind: EventKind,
}

#[derive(Debug)]
enum EventKind {
    Rejected(Vec<String>),
    Analyzed { vhs_score: f64, classification: String },
    Saved(Vec<PathBuf>),
    Failed(String),
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// Input directory
    #[clap(required = true)]
    input_dir: PathBuf,
    /// Output directory
    #[clap(short = 'o', long, default_value = ".")]
    output_dir: PathBuf,
    /// Recursive search in the input directory
    #[clap(short = 'r', long, default_value = "false")]
    recursive: bool,
    /// API URL of the VHS analyzer, overrides the environment variable
    #[clap(short, long)]
    api_url: Option<String>,
    /// Deployment profile providing the retry and logging defaults
    #[arg(value_enum)]
    #[clap(short, long, default_value = "production")]
    profile: Profile,
    /// Number of radiographs analyzed at the same time
    #[clap(short = 'j', long, default_value = "4")]
    jobs: usize,
    /// Do not request the annotated overlay images
    #[clap(long)]
    no_overlay: bool,
    /// Set the log level
    #[arg(value_enum)]
    #[clap(short = 'L', long, default_value = "info")]
    log_level: LogLevel,
    /// Display timestamps with log messages
    #[clap(short = 'T', long)]
    timestamp: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = vhs_client::init_tracing(&["vhs_batch"], args.log_level, args.timestamp) {
        eprintln!("Error while setting subscriber for tracing: {}", e);
    }

    let images = input_dir_validator(&args);
    if images.is_empty() {
        warn!("No radiograph to process.");
        return;
    }

    if !args.output_dir.exists() {
        info!("Creating output directory: {}", args.output_dir.display());
        if let Err(e) = fs::create_dir_all(&args.output_dir) {
            error!("Error while creating output directory: {}", e);
            process::exit(1);
        }
    }

    let config = match ClientConfig::from_env_with_url(args.api_url.as_deref(), args.profile) {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {}", e);
            process::exit(1);
        }
    };
    let client = match VhsClient::new(config, Arc::new(BusyFlag::new())) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Error: {}", e);
            process::exit(1);
        }
    };

    // the manager receives the progress of every radiograph and keeps the score
    let (tx, mut rx) = mpsc::channel::<Event>(1024);
    let manager = tokio::spawn(async move {
        let (mut analyzed, mut failed) = (0usize, 0usize);
        while let Some(event) = rx.recv().await {
            let path = event.path.display();
            match event.kind {
                EventKind::Rejected(errors) => {
                    failed += 1;
                    println!("Rejected: {} ({})", path, errors.join("; "));
                }
                EventKind::Analyzed {
                    vhs_score,
                    classification,
                } => {
                    analyzed += 1;
                    println!("Analyzed: {} VHS {:.2} {}", path, vhs_score, classification);
                }
                EventKind::Saved(paths) => info!("Saved: {} -> {:?}", path, paths),
                EventKind::Failed(message) => {
                    failed += 1;
                    println!("Failed: {} ({})", path, message);
                }
            }
        }
        (analyzed, failed)
    });

    let options = AnalysisOptions {
        include_overlay: !args.no_overlay,
        timeout: None,
    };

    // a/rx.png and b/rx.png are saved as a_rx and b_rx
    let stems = vhs_client::result_stems(&images, Some(&args.input_dir));

    stream::iter(images.into_iter().zip(stems))
        .map(|(path, stem)| {
            process_image(path, stem, client.clone(), &options, &args.output_dir, tx.clone())
        })
        .buffer_unordered(args.jobs.max(1))
        .collect::<Vec<()>>()
        .await;

    // the end
    drop(tx);
    match manager.await {
        Ok((analyzed, failed)) => {
            println!("{} analyzed, {} failed", analyzed, failed);
            if failed > 0 {
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Manager task failed: {}", e);
            process::exit(1);
        }
    }
}

async fn process_image(
    path: PathBuf,
    stem: String,
    client: Arc<VhsClient>,
    options: &AnalysisOptions,
    output_dir: &Path,
    tx: Sender<Event>,
) {
    let kind = match ImageFile::open(&path).await {
        Ok(file) => {
            let validation = client.validate(&file);
            if !validation.valid {
                EventKind::Rejected(validation.errors)
            } else {
                match client.analyze(Some(&file), options).await {
                    Ok(result) => {
                        send(
                            &tx,
                            &path,
                            EventKind::Analyzed {
                                vhs_score: result.measurements.vhs_score,
                                classification: result.classification.classification.to_string(),
                            },
                        )
                        .await;
                        match vhs_client::save_results(&result, output_dir, &stem).await {
                            Ok(paths) => EventKind::Saved(paths),
                            Err(e) => EventKind::Failed(e.to_string()),
                        }
                    }
                    Err(e) => EventKind::Failed(e.to_string()),
                }
            }
        }
        Err(e) => EventKind::Failed(e.to_string()),
    };
    send(&tx, &path, kind).await;
}

async fn send(tx: &Sender<Event>, path: &Path, kind: EventKind) {
    let event = Event {
        path: path.to_path_buf(),
        kind,
    };
    if let Err(e) = tx.send(event).await {
        warn!("Progress event lost: {}", e);
    }
}

/// Lists the JPEG and PNG files of the input directory.
fn input_dir_validator(args: &Args) -> Vec<PathBuf> {
    if !args.input_dir.exists() {
        error!(
            "Input directory does not exist: {}",
            args.input_dir.display()
        );
        process::exit(1);
    }

    if !args.input_dir.is_dir() {
        error!(
            "Input directory is not a directory: {}",
            args.input_dir.display()
        );
        process::exit(1);
    }

    list_images(&args.input_dir, args.recursive)
}

/// JPEG and PNG files under `dir`, sorted. Subdirectories are only searched
/// when `recursive` is set.
fn list_images(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = match recursive {
        true => WalkDir::new(dir).into_iter(),
        false => WalkDir::new(dir).max_depth(1).into_iter(),
    };

    let mut images: Vec<PathBuf> = walker
        .filter_map(|entry| {
            let entry = entry.ok()?;
            if entry.file_type().is_file()
                && vhs_client::content_type_for(entry.path()).starts_with("image/")
            {
                Some(entry.into_path())
            } else {
                None
            }
        })
        .collect();
    images.sort();
    images
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"pixels").unwrap();
    }

    #[test]
    fn test_list_images() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["b.PNG", "a.jpg", "c.jpeg", "notes.txt", "scan.dcm", "sub/rx.png"] {
            touch(&root.join(name));
        }
        fs::create_dir_all(root.join("empty.png")).unwrap();

        assert_eq!(
            list_images(root, false),
            vec![root.join("a.jpg"), root.join("b.PNG"), root.join("c.jpeg")]
        );
        assert_eq!(
            list_images(root, true),
            vec![
                root.join("a.jpg"),
                root.join("b.PNG"),
                root.join("c.jpeg"),
                root.join("sub/rx.png")
            ]
        );
    }

    #[test]
    fn test_same_name_in_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a/rx.png"));
        touch(&root.join("b/rx.png"));

        let images = list_images(root, true);
        assert_eq!(
            vhs_client::result_stems(&images, Some(root)),
            vec!["a_rx", "b_rx"]
        );
    }
}
