use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use console_core::{TaskStatus, TaskType};

#[derive(Parser, Debug)]
#[command(name = "task-console", version, about = "Operator console for the generation backend")]
pub struct Cli {
    /// RON configuration file. Defaults to ./console.ron when present.
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, overriding config and environment.
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Log at debug level regardless of the configured level.
    #[arg(long, short = 'v', default_value_t = false, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Admin task list.
    #[command(subcommand)]
    Tasks(TasksCommand),
    /// Video generation tasks.
    #[command(subcommand)]
    Videos(VideosCommand),
    /// Submit a generation request and follow it to completion.
    #[command(subcommand)]
    Submit(SubmitCommand),
    /// Stored credentials.
    #[command(subcommand)]
    Token(TokenCommand),
    /// Media cache administration.
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Image,
    Video,
}

impl From<KindArg> for TaskType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Image => TaskType::Image,
            KindArg::Video => TaskType::Video,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    /// Rows per page. Defaults to the configured page size.
    #[arg(long)]
    pub size: Option<u32>,
    /// Only tasks with this status (pending, processing, completed, failed, ...).
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long = "type", value_enum)]
    pub task_type: Option<KindArg>,
}

impl ListArgs {
    pub fn status(&self) -> Option<TaskStatus> {
        parse_status(self.status.as_deref())
    }
}

#[derive(Debug, Subcommand)]
pub enum TasksCommand {
    /// Print one page of tasks.
    List(ListArgs),
    /// Keep the list on screen, refreshing while tasks are active.
    Watch(ListArgs),
    /// Print one task and its extracted media.
    Show {
        id: String,
        /// Save inline (data URL) media to this file.
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
    /// Delete tasks by id.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete every task matching the filters.
    Clear {
        #[arg(long = "type", value_enum)]
        task_type: Option<KindArg>,
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum VideosCommand {
    /// Print one page of video tasks.
    List(VideoListArgs),
    /// Keep the video task list on screen while tasks are active.
    Watch(VideoListArgs),
    /// Cancel a pending or processing video task.
    Cancel { id: String },
    /// Delete video tasks by id.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete video tasks with a status, or all of them.
    Clear {
        #[arg(long)]
        status: Option<String>,
    },
    /// Follow a video task's progress stream until it ends.
    Stream { id: String },
}

#[derive(Debug, Clone, Args)]
pub struct VideoListArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long)]
    pub page_size: Option<u32>,
    #[arg(long)]
    pub status: Option<String>,
}

impl VideoListArgs {
    pub fn status(&self) -> Option<TaskStatus> {
        parse_status(self.status.as_deref())
    }
}

#[derive(Debug, Subcommand)]
pub enum SubmitCommand {
    Video(VideoArgs),
    Image(ImageArgs),
}

#[derive(Debug, Clone, Args)]
pub struct VideoArgs {
    pub prompt: String,
    /// Aspect ratio, e.g. 3:2, 16:9, 1:1.
    #[arg(long, default_value = "3:2")]
    pub ratio: String,
    #[arg(long, default_value = "720p")]
    pub resolution: String,
    /// Clip length in seconds.
    #[arg(long, default_value_t = 6)]
    pub duration: u32,
    #[arg(long, default_value = "normal")]
    pub preset: String,
    #[arg(long)]
    pub model: Option<String>,
    /// Reference image for image-to-video.
    #[arg(long, value_name = "FILE")]
    pub image: Option<PathBuf>,
    /// Follow the SSE progress stream instead of polling.
    #[arg(long, default_value_t = false)]
    pub stream: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ImageArgs {
    pub prompt: String,
    #[arg(long, default_value = "1:1")]
    pub ratio: String,
    #[arg(long)]
    pub model: Option<String>,
    /// Save the first image to this file once done.
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Store the admin key.
    SetAdmin { key: String },
    /// Check a task token against the backend and store it if accepted.
    Verify { token: String },
    /// Show which credentials are configured.
    Status,
    /// Forget a stored credential.
    Forget {
        #[arg(value_enum)]
        which: CredentialArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CredentialArg {
    Admin,
    Token,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Local cache counts and size.
    Stats,
    /// List cached files of one kind.
    List {
        #[arg(value_enum)]
        kind: KindArg,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Delete one cached file.
    Delete {
        #[arg(value_enum)]
        kind: KindArg,
        name: String,
    },
    /// Delete every cached file of one kind.
    Clear {
        #[arg(value_enum)]
        kind: KindArg,
    },
    /// Online asset counts.
    OnlineStats,
    /// Import online assets into the local cache.
    OnlineLoad,
    /// Delete online assets.
    OnlineClear,
}

/// Empty or `all` means no filter.
pub fn parse_status(raw: Option<&str>) -> Option<TaskStatus> {
    let raw = raw?.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
        return None;
    }
    Some(TaskStatus::parse(raw))
}
