use super::app_config::LogLevel;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "attachment-cache",
    version,
    about = "Fetch, cache, and decode chat attachments",
    long_about = None
)]
pub struct CliArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand. Each overrides the config file.
#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Primary cache root.
    #[arg(long, value_name = "DIR", env = "ATTACHMENT_CACHE_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// Fallback cache root.
    #[arg(long, value_name = "DIR", global = true)]
    pub fallback_root: Option<PathBuf>,

    /// Keep per-category directories under the fallback root.
    #[arg(long, global = true)]
    pub categorized_fallback: Option<bool>,

    /// Message store file.
    #[arg(long, value_name = "PATH", global = true)]
    pub message_store: Option<PathBuf>,

    /// Whole-request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// `ffmpeg` binary used for video thumbnails.
    #[arg(long, value_name = "PATH", global = true)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Attachment server base URL.
    #[arg(long, env = "ATTACHMENT_SERVER_URL", global = true)]
    pub base_url: Option<String>,
}

/// Remote attachment as described on the command line.
#[derive(Debug, Clone, Args)]
pub struct AttachmentArgs {
    /// Remote URL of the attachment.
    pub url: String,

    /// Declared MIME type.
    #[arg(long, default_value = "image/jpeg")]
    pub content_type: String,

    /// Declared file name.
    #[arg(long, default_value = "attachment")]
    pub name: String,

    /// Creation time of the owning message, in epoch milliseconds.
    #[arg(long, default_value_t = 0)]
    pub created_at: i64,

    /// Key of the owning message.
    #[arg(long, default_value = "")]
    pub message_key: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the cache path of a file name.
    Resolve {
        /// Declared MIME type.
        content_type: String,
        /// File name.
        file_name: String,
        /// Resolve into the thumbnail directory.
        #[arg(long)]
        thumbnail: bool,
    },

    /// Download an image thumbnail subsampled to the given bounds.
    Thumbnail {
        #[command(flatten)]
        attachment: AttachmentArgs,
        /// Requested width, 0 for unconstrained.
        #[arg(long, default_value_t = 200)]
        width: u32,
        /// Requested height, 0 for unconstrained.
        #[arg(long, default_value_t = 200)]
        height: u32,
    },

    /// Download or generate the thumbnail of a local video.
    VideoThumbnail {
        /// Local video file.
        video: PathBuf,
        /// Server thumbnail URL, if any.
        #[arg(long)]
        url: Option<String>,
    },

    /// Download a contact card.
    Contact {
        #[command(flatten)]
        attachment: AttachmentArgs,
    },

    /// Download a full attachment into its category directory.
    Fetch {
        #[command(flatten)]
        attachment: AttachmentArgs,
    },

    /// Download an opaque file named after its URL.
    Generic {
        /// Remote URL.
        url: String,
        /// MIME type choosing the directory and extension.
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },

    /// Decode a profile image and print its dimensions.
    Profile {
        /// Remote URL.
        url: String,
    },

    /// Print the local files recorded for a message.
    Paths {
        /// Key of the owning message.
        message_key: String,
    },

    /// Copy a local file into the cache.
    Import {
        /// Local file.
        path: PathBuf,
        /// Declared MIME type.
        #[arg(long)]
        content_type: String,
    },

    /// Upload a local file and print its descriptor.
    Upload {
        /// Local file.
        path: PathBuf,
        /// Declared MIME type.
        #[arg(long)]
        content_type: String,
    },

    /// Load every attachment of a JSON manifest of message attachments.
    Batch {
        /// Manifest file.
        manifest: PathBuf,
        /// Maximum concurrent fetches.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_thumbnail_command() {
        let args = CliArgs::try_parse_from([
            "attachment-cache",
            "--root",
            "/tmp/cache",
            "thumbnail",
            "https://x/pic",
            "--name",
            "pic.jpg",
            "--created-at",
            "1000",
            "--width",
            "200",
            "--height",
            "100",
        ])
        .unwrap();

        assert_eq!(args.global.root, Some(PathBuf::from("/tmp/cache")));
        match args.command {
            Command::Thumbnail {
                attachment,
                width,
                height,
            } => {
                assert_eq!(attachment.url, "https://x/pic");
                assert_eq!(attachment.content_type, "image/jpeg");
                assert_eq!(attachment.created_at, 1000);
                assert_eq!((width, height), (200, 100));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "attachment-cache",
            "resolve",
            "video/mp4",
            "clip.mp4",
            "--thumbnail",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.global.log_level, Some(LogLevel::Debug));
        assert!(matches!(
            args.command,
            Command::Resolve {
                thumbnail: true,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_paths_command() {
        let args = CliArgs::try_parse_from(["attachment-cache", "paths", "m-7"]).unwrap();

        match args.command {
            Command::Paths { message_key } => assert_eq!(message_key, "m-7"),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
