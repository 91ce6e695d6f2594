use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use console_core::{
    decode_inline_media, extract_media, mime_for_path, GenerationRequest, ReferenceImage,
    TaskId, TaskStatus, TaskType,
};
use console_engine::{
    submit_and_watch, ChannelEventSink, ConsoleApi, CredentialScope, CredentialStore,
    EngineEvent, EventSink, ListSession, ListSource, ReqwestTransport, RetryClient, StreamUpdate,
    TaskStream, ViewConfig,
};
use console_logging::{console_debug, console_info};
use tokio::sync::mpsc;

use crate::cli::{
    CacheCommand, Command, CredentialArg, ImageArgs, ListArgs, SubmitCommand, TasksCommand,
    TokenCommand, VideoArgs, VideoListArgs, VideosCommand,
};
use crate::config::{ConsoleConfig, CredentialOverrides};
use crate::credentials::FileCredentialStore;
use crate::output::{
    render_cache_page, render_cache_stats, render_list, render_online_stats, render_task,
    ConsolePrinter,
};
use crate::persist::write_atomic;

/// Everything a command needs: settings, the credential store and an API
/// client wired to both.
pub struct Console {
    config: ConsoleConfig,
    store: Arc<FileCredentialStore>,
    api: ConsoleApi,
}

impl Console {
    pub fn connect(config: ConsoleConfig, overrides: CredentialOverrides) -> anyhow::Result<Self> {
        let store = FileCredentialStore::open(&config.credentials_path)
            .with_context(|| format!("opening {}", config.credentials_path.display()))?
            .with_overrides(overrides);
        let store = Arc::new(store);
        let transport = ReqwestTransport::new(config.transport_settings())
            .with_context(|| format!("backend URL {}", config.base_url))?;
        let printer: Arc<dyn EventSink> = Arc::new(ConsolePrinter::new(false));
        let client = RetryClient::new(Arc::new(transport), store.clone(), printer);
        let api = ConsoleApi::new(client, config.retry_policy());
        Ok(Self { config, store, api })
    }

    pub async fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Tasks(command) => self.tasks(command).await,
            Command::Videos(command) => self.videos(command).await,
            Command::Submit(command) => self.submit(command).await,
            Command::Token(command) => self.token(command).await,
            Command::Cache(command) => self.cache(command).await,
        }
    }

    async fn tasks(&self, command: TasksCommand) -> anyhow::Result<()> {
        match command {
            TasksCommand::List(args) => self.show_list(self.admin_view(&args), false).await,
            TasksCommand::Watch(args) => self.show_list(self.admin_view(&args), true).await,
            TasksCommand::Show { id, save } => {
                let task = self.api.task_detail(&id).await?;
                print!("{}", render_task(&task));
                if let Some(target) = save {
                    let media = extract_media(task.kind, task.result.as_ref());
                    let Some(url) = media.media_url else {
                        bail!("task {id} has no media to save");
                    };
                    save_inline_media(&url, &target)?;
                }
                Ok(())
            }
            TasksCommand::Delete { ids } => {
                let ack = self.api.batch_delete(&ids).await?;
                println!("{}", ack.text_or(&format!("Deleted {} task(s)", ids.len())));
                Ok(())
            }
            TasksCommand::Clear { task_type, status } => {
                let status = crate::cli::parse_status(status.as_deref());
                let ack = self
                    .api
                    .clear_tasks(task_type.map(TaskType::from), status.as_ref())
                    .await?;
                println!("{}", ack.text_or("Tasks cleared"));
                Ok(())
            }
        }
    }

    async fn videos(&self, command: VideosCommand) -> anyhow::Result<()> {
        match command {
            VideosCommand::List(args) => self.show_list(self.video_view(&args), false).await,
            VideosCommand::Watch(args) => self.show_list(self.video_view(&args), true).await,
            VideosCommand::Cancel { id } => {
                let ack = self.api.cancel_video_task(&id).await?;
                println!("{}", ack.text_or(&format!("Cancelled {id}")));
                Ok(())
            }
            VideosCommand::Delete { ids } => {
                let ack = self.api.delete_video_tasks(&ids).await?;
                println!("{}", ack.text_or(&format!("Deleted {} task(s)", ids.len())));
                Ok(())
            }
            VideosCommand::Clear { status } => {
                let ack = match crate::cli::parse_status(status.as_deref()) {
                    Some(status) => self.api.delete_video_tasks_by_status(&status).await?,
                    None => self.api.clear_video_tasks().await?,
                };
                println!("{}", ack.text_or("Video tasks cleared"));
                Ok(())
            }
            VideosCommand::Stream { id } => self.follow_stream(&id).await,
        }
    }

    async fn submit(&self, command: SubmitCommand) -> anyhow::Result<()> {
        match command {
            SubmitCommand::Video(args) => self.submit_video(args).await,
            SubmitCommand::Image(args) => self.submit_image(args).await,
        }
    }

    async fn submit_video(&self, args: VideoArgs) -> anyhow::Result<()> {
        let mut request = GenerationRequest::video(args.prompt.clone());
        request.aspect_ratio = args.ratio;
        request.resolution = args.resolution;
        request.duration_secs = args.duration;
        request.preset = args.preset;
        if let Some(model) = args.model {
            request.model = model;
        }
        if let Some(path) = &args.image {
            let bytes =
                fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let image = ReferenceImage::from_bytes(&bytes, mime_for_path(&path.to_string_lossy()))?;
            request = request.with_reference_image(image, &args.prompt);
        }

        if args.stream {
            let task_id = self.api.submit_generation(&request).await?;
            println!("Submitted video task {task_id}");
            return self.follow_stream(&task_id).await;
        }
        self.submit_and_wait(&request).await.map(|_| ())
    }

    async fn submit_image(&self, args: ImageArgs) -> anyhow::Result<()> {
        let mut request = GenerationRequest::image(args.prompt);
        request.aspect_ratio = args.ratio;
        if let Some(model) = args.model {
            request.model = model;
        }
        let task_id = self.submit_and_wait(&request).await?;
        if let Some(target) = args.save {
            let task = self.api.generation_task(TaskType::Image, &task_id).await?;
            if !task.status.is_success() {
                bail!("task {task_id} ended as {}", task.status);
            }
            let media = extract_media(TaskType::Image, task.result.as_ref());
            let Some(url) = media.media_url else {
                bail!("task {task_id} returned no image");
            };
            save_inline_media(&url, &target)?;
        }
        Ok(())
    }

    /// Submits and polls until the task is terminal or the operator hits
    /// Ctrl-C. Watch events come back over a channel and are printed here.
    async fn submit_and_wait(&self, request: &GenerationRequest) -> anyhow::Result<TaskId> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(tx));
        let (task_id, mut poller) = submit_and_watch(
            &self.api,
            request,
            self.config.task_poll_interval(),
            sink,
        )
        .await?;
        println!("Submitted {} task {task_id}", request.task_type);

        let printer = ConsolePrinter::new(false);
        let watch = async {
            while let Some(event) = rx.recv().await {
                let finished = matches!(event, EngineEvent::TaskFinished(_));
                printer.emit(event);
                if finished {
                    break;
                }
            }
        };
        if !until_interrupted(watch).await {
            poller.stop();
            println!("Stopped watching {task_id}; the task keeps running on the backend.");
        }
        Ok(task_id)
    }

    async fn follow_stream(&self, task_id: &str) -> anyhow::Result<()> {
        let mut stream = TaskStream::open(&self.api, task_id).await?;
        let follow = async {
            while let Some(update) = stream.next_update().await {
                let value = update?;
                let Some(update) = StreamUpdate::from_value(&value) else {
                    console_debug!("Ignoring stream payload {}", value);
                    continue;
                };
                println!("{}", describe_update(&update));
                if update.is_final() {
                    break;
                }
            }
            Ok::<(), anyhow::Error>(())
        };
        tokio::select! {
            result = follow => result,
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped following {task_id}.");
                Ok(())
            }
        }
    }

    async fn token(&self, command: TokenCommand) -> anyhow::Result<()> {
        match command {
            TokenCommand::SetAdmin { key } => {
                let key = key.trim();
                if key.is_empty() {
                    bail!("admin key is empty");
                }
                self.store.store(CredentialScope::Admin, key)?;
                println!("Admin key saved to {}", self.store.path().display());
            }
            TokenCommand::Verify { token } => {
                let token = token.trim();
                if token.is_empty() {
                    bail!("token is empty");
                }
                self.api
                    .verify_token(token)
                    .await
                    .context("token was not accepted")?;
                self.store.store(CredentialScope::TaskToken, token)?;
                println!("Token verified and saved");
            }
            TokenCommand::Status => {
                for scope in [CredentialScope::Admin, CredentialScope::TaskToken] {
                    let state = match self.store.get(scope) {
                        Some(secret) => mask(&secret),
                        None => "not set".to_string(),
                    };
                    println!("{scope:<10} {state}");
                }
            }
            TokenCommand::Forget { which } => {
                let scope = match which {
                    CredentialArg::Admin => CredentialScope::Admin,
                    CredentialArg::Token => CredentialScope::TaskToken,
                };
                self.store.forget(scope)?;
                println!("Forgot the {scope}");
            }
        }
        Ok(())
    }

    async fn cache(&self, command: CacheCommand) -> anyhow::Result<()> {
        match command {
            CacheCommand::Stats => print!("{}", render_cache_stats(&self.api.cache_stats().await?)),
            CacheCommand::List {
                kind,
                page,
                page_size,
            } => {
                let listing = self.api.cache_list(kind.into(), page, page_size).await?;
                print!("{}", render_cache_page(&listing));
            }
            CacheCommand::Delete { kind, name } => {
                let ack = self.api.delete_cache_item(kind.into(), &name).await?;
                println!("{}", ack.text_or(&format!("Deleted {name}")));
            }
            CacheCommand::Clear { kind } => {
                let kind = TaskType::from(kind);
                let ack = self.api.clear_cache(kind).await?;
                println!("{}", ack.text_or(&format!("Cleared the {kind} cache")));
            }
            CacheCommand::OnlineStats => {
                print!("{}", render_online_stats(&self.api.online_cache_stats().await?))
            }
            CacheCommand::OnlineLoad => {
                let ack = self.api.load_online_cache().await?;
                println!("{}", ack.text_or("Online assets loaded"));
            }
            CacheCommand::OnlineClear => {
                let ack = self.api.clear_online_cache().await?;
                println!("{}", ack.text_or("Online assets cleared"));
            }
        }
        Ok(())
    }

    fn admin_view(&self, args: &ListArgs) -> ViewConfig {
        ViewConfig {
            source: ListSource::AdminTasks,
            page_size: args.size.unwrap_or(self.config.page_size),
            poll_interval: self.config.list_poll_interval(),
            start_page: args.page,
            status: args.status(),
            task_type: args.task_type.map(TaskType::from),
        }
    }

    fn video_view(&self, args: &VideoListArgs) -> ViewConfig {
        ViewConfig {
            source: ListSource::VideoTasks,
            page_size: args.page_size.unwrap_or(self.config.page_size),
            poll_interval: self.config.video_list_poll_interval(),
            start_page: args.page,
            status: args.status(),
            task_type: None,
        }
    }

    /// One fetch and print, or with `watch` keep redrawing until nothing is
    /// active any more.
    async fn show_list(&self, view: ViewConfig, watch: bool) -> anyhow::Result<()> {
        let printer: Arc<dyn EventSink> = Arc::new(ConsolePrinter::new(watch));
        let session = ListSession::create(self.api.clone(), view, printer);
        session.refresh().await;

        if watch {
            if !until_interrupted(session.polling_finished()).await {
                console_info!("Interrupted, leaving the list");
            }
        } else {
            print!("{}", render_list(&session.view()));
        }
        let auth_invalid = session.view().auth_invalid;
        session.dispose();
        if auth_invalid {
            bail!("the backend rejected the stored credential");
        }
        Ok(())
    }
}

/// True when `work` finished, false when Ctrl-C came first.
async fn until_interrupted(work: impl Future<Output = ()>) -> bool {
    tokio::select! {
        _ = work => true,
        _ = tokio::signal::ctrl_c() => false,
    }
}

fn save_inline_media(url: &str, target: &Path) -> anyhow::Result<()> {
    let Some(bytes) = decode_inline_media(url) else {
        bail!("media is hosted at {url}; only inline media can be saved");
    };
    write_atomic(target, &bytes)?;
    println!("Saved {} bytes to {}", bytes.len(), target.display());
    Ok(())
}

fn describe_update(update: &StreamUpdate) -> String {
    let mut line = update.event_type.clone();
    if let Some(status) = &update.status {
        line.push_str(&format!(" {status}"));
    }
    if let Some(progress) = update.progress {
        line.push_str(&format!(" {progress:.0}%"));
    }
    if let Some(message) = &update.message {
        line.push_str(&format!(" {message}"));
    }
    if let Some(url) = &update.video_url {
        line.push_str(&format!(" {url}"));
    }
    if let Some(error) = &update.error {
        line.push_str(&format!(" error: {error}"));
    }
    if update.status == Some(TaskStatus::Failed) && update.error.is_none() {
        line.push_str(" (no reason given)");
    }
    line
}

fn mask(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "set".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("set (...{tail})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_all_but_the_tail() {
        assert_eq!(mask("abcd"), "set");
        assert_eq!(mask("sk-123456789"), "set (...6789)");
    }

    #[test]
    fn stream_update_line_carries_progress() {
        let update = StreamUpdate::from_value(&serde_json::json!({
            "type": "progress",
            "status": "processing",
            "progress": 42.4,
        }))
        .unwrap();
        assert_eq!(describe_update(&update), "progress running 42%");
    }

    #[test]
    fn saves_inline_media() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.png");
        save_inline_media("data:image/png;base64,aGVsbG8=", &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"hello");
    }

    #[test]
    fn remote_media_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.png");
        assert!(save_inline_media("https://cdn.example.com/a.png", &target).is_err());
        assert!(!target.exists());
    }
}
