// Upload session: the files of the latest drop and one upload task per file
//
// Each dropped file becomes its own POST with its own progress and state,
// so concurrent uploads never overwrite each other's progress.

use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use uuid::Uuid;

use crate::progress::{percent_completed, ProgressFn};
use crate::transport::{ItemInfo, Transport, UploadForm};

/// Placeholder name sent with every upload unless overridden.
pub const DEFAULT_NAME: &str = "dora1";
/// Placeholder description sent with every upload unless overridden.
pub const DEFAULT_DESCRIPTION: &str = "dora1 description";

/// Text shown while no file is selected.
pub const DROP_PROMPT: &str =
    "Try dropping some files here, or click to select files to upload.";

/// Metadata attached to every upload of a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub name: String,
    pub description: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
        }
    }
}

/// A local file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    /// Pixel dimensions when the file is a readable image.
    pub dimensions: Option<(u32, u32)>,
}

impl SelectedFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)
            .map_err(|e| anyhow!("Failed to read '{}': {}", path.display(), e))?;
        if !metadata.is_file() {
            return Err(anyhow!("'{}' is not a file", path.display()));
        }

        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size: metadata.len(),
            dimensions: image::image_dimensions(path).ok(),
        })
    }

    /// One-line textual preview of the file.
    pub fn preview(&self) -> String {
        match self.dimensions {
            Some((w, h)) => format!("{} ({}, {}x{})", self.file_name, human_size(self.size), w, h),
            None => format!("{} ({})", self.file_name, human_size(self.size)),
        }
    }
}

/// Lifecycle of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InProgress,
    Succeeded(Uuid),
    Failed(String),
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Succeeded(_) | TaskState::Failed(_))
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::InProgress => write!(f, "uploading"),
            TaskState::Succeeded(id) => write!(f, "uploaded as item {}", id),
            TaskState::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Progress record of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub state: TaskState,
    pub percent_completed: u8,
}

/// One file of a drop and its upload.
#[derive(Debug)]
pub struct UploadTask {
    pub id: Uuid,
    pub file: SelectedFile,
    pub form: UploadForm,
    status: Arc<Mutex<TaskStatus>>,
}

impl UploadTask {
    fn new(file: SelectedFile, config: &UploadConfig) -> Self {
        let form = UploadForm {
            name: config.name.clone(),
            description: config.description.clone(),
            picture: file.path.clone(),
            file_name: file.file_name.clone(),
        };
        Self {
            id: Uuid::new_v4(),
            file,
            form,
            status: Arc::new(Mutex::new(TaskStatus {
                state: TaskState::Pending,
                percent_completed: 0,
            })),
        }
    }

    pub fn status(&self) -> TaskStatus {
        lock(&self.status).clone()
    }
}

/// Outcome counts of a finished drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Selected files, their upload tasks and the progress display.
pub struct UploadSession {
    config: UploadConfig,
    files: Vec<SelectedFile>,
    tasks: Vec<UploadTask>,
    bars: MultiProgress,
}

impl UploadSession {
    pub fn new(config: UploadConfig) -> Self {
        Self::with_draw_target(config, ProgressDrawTarget::stderr())
    }

    /// Session whose progress bars draw to `target`.
    pub fn with_draw_target(config: UploadConfig, target: ProgressDrawTarget) -> Self {
        Self {
            config,
            files: Vec::new(),
            tasks: Vec::new(),
            bars: MultiProgress::with_draw_target(target),
        }
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    /// Replaces the selection with `files`, one pending upload per file.
    pub fn on_drop(&mut self, files: Vec<SelectedFile>) {
        self.tasks = files
            .iter()
            .cloned()
            .map(|file| UploadTask::new(file, &self.config))
            .collect();
        self.files = files;
        tracing::debug!(files = self.files.len(), "Files dropped");
    }

    /// Reads file paths, one per line, until an empty line or end of input,
    /// then drops them. Returns the number of files selected.
    pub fn on_open_click<R: BufRead>(&mut self, input: R) -> Result<usize> {
        let mut files = Vec::new();
        for line in input.lines() {
            let line = line?;
            let path = line.trim();
            if path.is_empty() {
                break;
            }
            files.push(SelectedFile::open(path)?);
        }
        let count = files.len();
        self.on_drop(files);
        Ok(count)
    }

    /// Uploads every unfinished task concurrently, one request per file.
    pub fn submit_all<T: Transport>(&self, transport: &T) -> UploadSummary {
        let bar_style = ProgressStyle::with_template("{prefix:>20} [{bar:30}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");

        std::thread::scope(|scope| {
            for task in self.tasks.iter().filter(|t| !t.status().state.is_finished()) {
                let bar = self.bars.add(ProgressBar::new(100));
                bar.set_style(bar_style.clone());
                bar.set_prefix(task.file.file_name.clone());

                scope.spawn(move || run_task(task, transport, bar));
            }
        });

        self.summary()
    }

    pub fn summary(&self) -> UploadSummary {
        self.tasks
            .iter()
            .fold(UploadSummary::default(), |mut summary, task| {
                match task.status().state {
                    TaskState::Succeeded(_) => summary.succeeded += 1,
                    TaskState::Failed(_) => summary.failed += 1,
                    _ => {}
                }
                summary
            })
    }

    /// Text view: preview of the first file (or the prompt) followed by
    /// one line per selected file.
    pub fn render(&self) -> String {
        let mut out = String::new();

        match self.files.first() {
            Some(first) => out.push_str(&format!("Preview: {}\n", first.preview())),
            None => {
                out.push_str(DROP_PROMPT);
                out.push('\n');
            }
        }

        if !self.files.is_empty() {
            out.push_str(&format!("\nUploading {} files...\n", self.files.len()));
            for (idx, task) in self.tasks.iter().enumerate() {
                let status = task.status();
                let state = match &status.state {
                    TaskState::Succeeded(_) => status.state.to_string().green().to_string(),
                    TaskState::Failed(_) => status.state.to_string().red().to_string(),
                    _ => status.state.to_string(),
                };
                out.push_str(&format!(
                    "  [{}] {}  {:>3}%  {}\n",
                    idx + 1,
                    task.file.preview(),
                    status.percent_completed,
                    state
                ));
            }
        }

        out
    }
}

fn run_task<T: Transport>(task: &UploadTask, transport: &T, bar: ProgressBar) {
    lock(&task.status).state = TaskState::InProgress;

    let status = task.status.clone();
    let progress_bar = bar.clone();
    let on_progress: ProgressFn = Arc::new(move |loaded, total| {
        let percent = percent_completed(loaded, total);
        lock(&status).percent_completed = percent;
        progress_bar.set_position(percent as u64);
    });

    let outcome = transport
        .upload(&task.form, on_progress)
        .and_then(|item| check_fingerprint(&task.file, item));

    let mut status = lock(&task.status);
    match outcome {
        Ok(item) => {
            tracing::info!(
                task_id = %task.id,
                file = %task.file.file_name,
                item_id = %item.id,
                "Upload succeeded"
            );
            status.percent_completed = 100;
            status.state = TaskState::Succeeded(item.id);
            bar.set_position(100);
            bar.finish_with_message("done");
        }
        Err(e) => {
            tracing::warn!(
                task_id = %task.id,
                file = %task.file.file_name,
                "Upload failed: {:#}",
                e
            );
            status.state = TaskState::Failed(format!("{:#}", e));
            bar.abandon_with_message("failed");
        }
    }
}

/// Confirms the server stored exactly the bytes on disk.
fn check_fingerprint(file: &SelectedFile, item: ItemInfo) -> Result<ItemInfo> {
    let Some(remote) = item.picture.as_ref().map(|p| p.fingerprint.clone()) else {
        return Ok(item);
    };
    let bytes = std::fs::read(&file.path)?;
    let local = mediadrop_crypto::fingerprint(&bytes);
    if local != remote {
        return Err(anyhow!(
            "Server fingerprint {} does not match local file {}",
            remote.value,
            local.value
        ));
    }
    Ok(item)
}

fn lock(status: &Mutex<TaskStatus>) -> MutexGuard<'_, TaskStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
