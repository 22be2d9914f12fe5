//! Scheduled jobs: periodic news posts and idle-chat nudges.
//!
//! Jobs are declared in a YAML file (`SCHEDULES_FILE`):
//!
//! ```yaml
//! jobs:
//!   - name: hn-digest
//!     cron: "0 */6 * * *"
//!     chat_id: -1001234567890
//!     task: news
//!     source: hackernews
//!     limit: 3
//!   - name: nudge
//!     cron: "*/5 * * * *"
//!     chat_id: -1001234567890
//!     task: inactivity
//! ```
//!
//! The file is polled for changes and jobs are reloaded in place.

mod cron;

use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    fs,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use chrono::{Local, Timelike};
use serde::Deserialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::ChatId,
    formatting::escape_html,
    messaging::port::MessagingPort,
    news::{format_news_message, FeedSource, NewsFetcher},
    personality::Personality,
    Error, Result,
};

pub use cron::CronExpr;

const MAX_JOBS_PER_HOUR: usize = 60;
const DEFAULT_NEWS_LIMIT: usize = 3;
const WATCH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTask {
    /// Post the latest items of a feed.
    News,
    /// Nudge the chat when nobody has talked for a while.
    Inactivity,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub cron: String,
    pub chat_id: ChatId,
    pub task: JobTask,
    #[serde(default)]
    pub source: Option<FeedSource>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
struct ScheduleFile {
    #[serde(default)]
    jobs: Vec<JobSpec>,
}

/// Parse and validate the schedule file contents.
pub fn parse_schedule(yaml: &str) -> Result<Vec<JobSpec>> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: ScheduleFile = serde_yaml::from_str(yaml)?;

    let mut names = HashSet::new();
    for job in &file.jobs {
        if job.name.trim().is_empty() {
            return Err(Error::Config("scheduled job missing name".to_string()));
        }
        if !names.insert(job.name.as_str()) {
            return Err(Error::Config(format!(
                "duplicate scheduled job name: {}",
                job.name
            )));
        }
    }

    Ok(file.jobs)
}

#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    path: PathBuf,
    news: NewsFetcher,
    personality: Arc<Personality>,
    messenger: Arc<dyn MessagingPort>,
    max_news_per_message: usize,
    state: tokio::sync::Mutex<SchedulerState>,
}

#[derive(Default)]
struct SchedulerState {
    jobs: BTreeMap<String, JobEntry>,
    watcher: Option<CancellationToken>,
    last_modified: Option<SystemTime>,
    executions: VecDeque<Instant>,
}

struct JobEntry {
    expr: CronExpr,
    cancel: CancellationToken,
}

impl JobScheduler {
    pub fn new(
        path: PathBuf,
        news: NewsFetcher,
        personality: Arc<Personality>,
        messenger: Arc<dyn MessagingPort>,
        max_news_per_message: usize,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                path,
                news,
                personality,
                messenger,
                max_news_per_message,
                state: tokio::sync::Mutex::new(SchedulerState::default()),
            }),
        }
    }

    /// (Re)load the schedule file and spawn one task per enabled job.
    pub async fn start(&self) -> Result<usize> {
        self.stop_jobs().await;

        let path = &self.inner.path;
        if !path.exists() {
            tracing::info!(path = %path.display(), "no schedule file, no jobs configured");
            return Ok(0);
        }

        let jobs = parse_schedule(&fs::read_to_string(path)?)?;
        let mut st = self.inner.state.lock().await;
        st.last_modified = fs::metadata(path).and_then(|md| md.modified()).ok();

        for job in jobs {
            if !job.enabled {
                tracing::info!(job = %job.name, "skipping disabled job");
                continue;
            }

            let expr = match job.cron.parse::<CronExpr>() {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(job = %job.name, "invalid cron expression: {e}");
                    continue;
                }
            };

            if expr.next_after(Local::now()).is_none() {
                tracing::warn!(
                    job = %job.name,
                    cron = %job.cron,
                    "cron expression never fires, skipping"
                );
                continue;
            }

            let cancel = CancellationToken::new();
            let scheduler = self.clone();
            let task_cancel = cancel.clone();
            let task_expr = expr.clone();
            let name = job.name.clone();
            tokio::spawn(async move {
                scheduler.job_loop(job, task_expr, task_cancel).await;
            });

            st.jobs.insert(name, JobEntry { expr, cancel });
        }

        tracing::info!(count = st.jobs.len(), "scheduled jobs started");
        Ok(st.jobs.len())
    }

    pub async fn reload(&self) -> Result<usize> {
        tracing::info!("reloading schedule");
        self.start().await
    }

    /// Poll the schedule file mtime and reload on change. Idempotent.
    pub async fn ensure_watcher(&self) {
        let mut st = self.inner.state.lock().await;
        if st.watcher.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        st.watcher = Some(cancel.clone());
        drop(st);

        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(WATCH_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => scheduler.reload_if_changed().await,
                }
            }
        });
        tracing::info!(path = %self.inner.path.display(), "schedule watcher started");
    }

    async fn reload_if_changed(&self) {
        let Ok(modified) = fs::metadata(&self.inner.path).and_then(|md| md.modified()) else {
            return;
        };

        let changed = {
            let mut st = self.inner.state.lock().await;
            match st.last_modified {
                Some(prev) if modified <= prev => false,
                _ => {
                    st.last_modified = Some(modified);
                    true
                }
            }
        };

        if changed {
            tracing::info!("schedule file changed");
            if let Err(e) = self.reload().await {
                tracing::error!("failed to reload schedule: {e}");
            }
        }
    }

    pub async fn stop(&self) {
        let mut st = self.inner.state.lock().await;
        if let Some(cancel) = st.watcher.take() {
            cancel.cancel();
        }
        for (_, job) in std::mem::take(&mut st.jobs) {
            job.cancel.cancel();
        }
    }

    async fn stop_jobs(&self) {
        let mut st = self.inner.state.lock().await;
        for (_, job) in std::mem::take(&mut st.jobs) {
            job.cancel.cancel();
        }
    }

    pub async fn status_html(&self) -> String {
        let st = self.inner.state.lock().await;
        if st.jobs.is_empty() {
            return "No hay tareas programadas.".to_string();
        }

        let now = Local::now();
        let mut lines = vec![format!("📅 <b>Tareas programadas ({})</b>", st.jobs.len())];
        for (name, job) in &st.jobs {
            let next = job
                .expr
                .next_after(now)
                .map(|dt| format!("{:02}:{:02}", dt.hour(), dt.minute()))
                .unwrap_or_else(|| "nunca".to_string());
            lines.push(format!("• {}: próxima a las {next}", escape_html(name)));
        }
        lines.join("\n")
    }

    async fn job_loop(&self, job: JobSpec, expr: CronExpr, cancel: CancellationToken) {
        loop {
            let now = Local::now();
            let Some(next) = expr.next_after(now) else {
                tracing::warn!(job = %job.name, "job has no next run, stopping");
                self.forget_job(&job.name, &cancel).await;
                break;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(wait) => {
                    if let Err(e) = self.run_job(&job).await {
                        tracing::error!(job = %job.name, "scheduled job failed: {e}");
                    }
                }
            }
        }
    }

    /// Drop a finished job from the table unless it was already replaced.
    async fn forget_job(&self, name: &str, cancel: &CancellationToken) {
        let mut st = self.inner.state.lock().await;
        // Reloads cancel every token under this lock before inserting new ones.
        if !cancel.is_cancelled() {
            st.jobs.remove(name);
        }
    }

    /// Execute one job immediately, subject to the hourly execution cap.
    pub async fn run_job(&self, job: &JobSpec) -> Result<()> {
        if !self.reserve_execution().await {
            tracing::warn!(job = %job.name, "hourly job limit reached, skipping");
            return Ok(());
        }

        tracing::info!(job = %job.name, task = ?job.task, "running scheduled job");
        match job.task {
            JobTask::News => self.post_news(job).await,
            JobTask::Inactivity => self.nudge_if_idle(job.chat_id).await,
        }
    }

    async fn reserve_execution(&self) -> bool {
        let mut st = self.inner.state.lock().await;
        let now = Instant::now();
        let hour = Duration::from_secs(3600);
        while st
            .executions
            .front()
            .is_some_and(|t| now.duration_since(*t) > hour)
        {
            st.executions.pop_front();
        }
        if st.executions.len() >= MAX_JOBS_PER_HOUR {
            return false;
        }
        st.executions.push_back(now);
        true
    }

    async fn post_news(&self, job: &JobSpec) -> Result<()> {
        let source = job.source.unwrap_or(FeedSource::HackerNews);
        let mut items = self.inner.news.fetch(source).await;
        items.truncate(job.limit.unwrap_or(DEFAULT_NEWS_LIMIT));

        if items.is_empty() {
            tracing::info!(job = %job.name, source = %source, "no news to post");
            return Ok(());
        }

        let html = format_news_message(&items, source.label(), self.inner.max_news_per_message);
        self.inner.messenger.send_html(job.chat_id, &html).await?;
        Ok(())
    }

    async fn nudge_if_idle(&self, chat_id: ChatId) -> Result<()> {
        let personality = &self.inner.personality;
        if !personality.activity().is_inactive(chat_id).await {
            return Ok(());
        }

        let text = personality.inactivity_message();
        self.inner
            .messenger
            .send_html(chat_id, &escape_html(&text))
            .await?;
        // Restart the idle clock so the next nudge waits a full timeout.
        personality.activity().touch(chat_id).await;
        Ok(())
    }
}
