use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use attachment_cache::application::{
    BatchEntry, LoadAttachmentUseCase, LoadedAttachment, UploadAttachmentUseCase,
};
use attachment_cache::domain::entities::{AttachmentRef, DecodeTarget, LoadedThumbnail};
use attachment_cache::domain::ports::UrlResolver;
use attachment_cache::infrastructure::attachment::{
    AttachmentFetcher, PathResolver, VideoThumbnailGenerator,
};
use attachment_cache::infrastructure::config::{AttachmentArgs, GlobalArgs};
use attachment_cache::infrastructure::http::build_client;
use attachment_cache::infrastructure::{
    AppConfig, CliArgs, Command, ConfigFile, DirectoryRoots, FfmpegFrameExtractor, HttpUploader,
    JsonMessageStore, ReqwestTransport, ServerUrlResolver,
};

const BATCH_PREVIEW_BOUNDS: DecodeTarget = DecodeTarget::new(200, 200);

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: GlobalArgs) -> Result<AppConfig> {
    let file = ConfigFile::locate(args.config.as_deref())?;
    Ok(file.load_with_args(args)?)
}

/// Everything a command needs, built on a blocking thread because the
/// blocking HTTP client owns its own runtime.
struct Services {
    fetcher: AttachmentFetcher,
    loader: LoadAttachmentUseCase,
    uploader: UploadAttachmentUseCase,
    store: Arc<JsonMessageStore>,
}

impl Services {
    fn build(config: &AppConfig) -> Result<Self> {
        let roots = DirectoryRoots::platform(
            config.storage.root.clone(),
            config.storage.fallback_root.clone(),
            config.storage.fallback_layout,
        );
        let client = build_client(
            config.network.timeout(),
            config.network.connect_timeout(),
            &config.network.user_agent,
        )?;
        let store = JsonMessageStore::open(config.storage.effective_message_store());
        let store = Arc::new(store);
        info!(path = %store.path().display(), "Message store opened");

        let extractor = FfmpegFrameExtractor::new(
            config.video.ffmpeg_path.clone(),
            config.video.seek_seconds,
        );
        let videos = VideoThumbnailGenerator::new(Arc::new(extractor))
            .with_jpeg_quality(config.video.jpeg_quality);

        let fetcher = AttachmentFetcher::new(
            PathResolver::new(Arc::new(roots)),
            Arc::new(ReqwestTransport::new(client.clone())),
            store.clone(),
            videos,
        )
        .with_jpeg_quality(config.storage.thumbnail_quality);

        let urls = Arc::new(ServerUrlResolver::new(config.server.base_url.clone()));
        let uploader = HttpUploader::new(
            client,
            urls.upload_url(),
            config.server.upload_field.clone(),
        );

        Ok(Self {
            loader: LoadAttachmentUseCase::new(fetcher.clone(), urls),
            uploader: UploadAttachmentUseCase::new(Arc::new(uploader), fetcher.clone()),
            fetcher,
            store,
        })
    }

    fn load(&self, entry: &BatchEntry) -> Result<LoadedAttachment> {
        let loaded = if entry.full {
            self.loader
                .download(&entry.attachment)
                .map(LoadedAttachment::File)
        } else {
            self.loader.preview(&entry.attachment, BATCH_PREVIEW_BOUNDS)
        };
        Ok(loaded?)
    }
}

fn attachment_ref(args: AttachmentArgs) -> AttachmentRef {
    AttachmentRef::new(
        args.message_key,
        args.url,
        args.content_type,
        args.name,
        args.created_at,
    )
}

fn describe(thumbnail: &LoadedThumbnail) -> String {
    format!(
        "{}\t{}x{}\t{:?}",
        thumbnail.path.display(),
        thumbnail.image.width(),
        thumbnail.image.height(),
        thumbnail.source
    )
}

async fn blocking<T, F>(services: &Arc<Services>, f: F) -> Result<T>
where
    F: FnOnce(&Services) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let services = Arc::clone(services);
    tokio::task::spawn_blocking(move || f(&services)).await?
}

async fn run(services: &Arc<Services>, command: Command) -> Result<String> {
    match command {
        Command::Resolve {
            content_type,
            file_name,
            thumbnail,
        } => {
            blocking(services, move |s| {
                let path = s
                    .fetcher
                    .resolve_local_path(&file_name, &content_type, thumbnail);
                Ok(path.display().to_string())
            })
            .await
        }
        Command::Thumbnail {
            attachment,
            width,
            height,
        } => {
            blocking(services, move |s| {
                let reference = attachment_ref(attachment).thumbnail();
                let loaded = s.fetcher.fetch_thumbnail(&reference, width, height)?;
                Ok(describe(&loaded))
            })
            .await
        }
        Command::VideoThumbnail { video, url } => {
            blocking(services, move |s| {
                let loaded = s
                    .fetcher
                    .fetch_or_generate_video_thumbnail(&video, url.as_deref())?;
                Ok(describe(&loaded))
            })
            .await
        }
        Command::Contact { attachment } => {
            blocking(services, move |s| {
                let path = s.fetcher.fetch_contact_card(&attachment_ref(attachment))?;
                Ok(path.display().to_string())
            })
            .await
        }
        Command::Fetch { attachment } => {
            blocking(services, move |s| {
                let path = s.fetcher.fetch_attachment(&attachment_ref(attachment))?;
                Ok(path.display().to_string())
            })
            .await
        }
        Command::Generic { url, content_type } => {
            blocking(services, move |s| {
                let path = s.fetcher.fetch_generic(&url, &content_type)?;
                Ok(path.display().to_string())
            })
            .await
        }
        Command::Profile { url } => {
            blocking(services, move |s| {
                let image = s.fetcher.fetch_profile_image(&url)?;
                Ok(format!("{}x{}", image.width(), image.height()))
            })
            .await
        }
        Command::Paths { message_key } => {
            let paths = services.store.local_paths(&message_key);
            if paths.is_empty() {
                return Err(eyre!("no local files recorded for '{message_key}'"));
            }
            let lines: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            Ok(lines.join("\n"))
        }
        Command::Import { path, content_type } => {
            blocking(services, move |s| {
                let cached = s.fetcher.import_local_file(&path, &content_type)?;
                Ok(cached.display().to_string())
            })
            .await
        }
        Command::Upload { path, content_type } => {
            blocking(services, move |s| {
                let meta = s.uploader.execute(&path, &content_type)?;
                Ok(serde_json::to_string_pretty(&meta)?)
            })
            .await
        }
        Command::Batch {
            manifest,
            concurrency,
        } => run_batch(services, manifest, concurrency).await,
    }
}

async fn run_batch(
    services: &Arc<Services>,
    manifest: PathBuf,
    concurrency: usize,
) -> Result<String> {
    let content = std::fs::read_to_string(&manifest)
        .wrap_err_with(|| format!("failed to read manifest {}", manifest.display()))?;
    let entries: Vec<BatchEntry> =
        serde_json::from_str(&content).wrap_err("manifest is not a list of attachments")?;
    let total = entries.len();
    info!(total, concurrency, "Starting batch");

    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let permit = Arc::clone(&permits).acquire_owned().await?;
        let services = Arc::clone(services);
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = services.load(&entry);
            (index, entry.attachment.message_key, result)
        });
    }

    let mut lines = Vec::with_capacity(total);
    let mut failures = 0usize;
    while let Some(joined) = tasks.join_next().await {
        let (index, message_key, result) = joined?;
        let line = match result {
            Ok(loaded) => format!("{message_key}\t{}", loaded.path().display()),
            Err(e) => {
                failures += 1;
                warn!(%message_key, error = %e, "Attachment failed");
                format!("{message_key}\terror: {e}")
            }
        };
        lines.push((index, line));
    }
    lines.sort_by_key(|(index, _)| *index);

    let output = lines
        .into_iter()
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n");
    if failures > 0 {
        println!("{output}");
        return Err(eyre!("{failures} of {total} attachments failed"));
    }
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(args.global)?;
    init_logging(&config)?;

    info!(version = attachment_cache::VERSION, "Starting {}", attachment_cache::NAME);

    let services = tokio::task::spawn_blocking(move || Services::build(&config)).await??;
    let services = Arc::new(services);
    let result = run(&services, args.command).await;

    // The blocking client must not be dropped on a runtime thread.
    tokio::task::spawn_blocking(move || drop(services)).await?;

    println!("{}", result?);
    Ok(())
}
