//! Dataset sync coordination.
//!
//! Every successful PUT fires [`SyncCoordinator::trigger`]. The coordinator
//! decides when to actually materialize a dataset snapshot and push it to
//! the version-control remote: triggers are coalesced by a
//! [`TriggerPolicy`], and at most one sync execution is ever in flight
//! (single-flight; an expiry during a running sync is skipped, not queued).
//!
//! The sync body itself only talks to two collaborator seams: a
//! [`Repository`] that pulls and pushes the version-controlled dataset
//! repo, and a [`ManifestBuilder`] that regenerates the aggregated dataset
//! descriptor from the stored raw objects. Failures are logged and
//! swallowed; the next trigger attempts again.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

/// Result contract of a commit-and-push cycle.
#[derive(Debug)]
pub struct PushOutcome {
    /// False when the remote reported nothing changed.
    pub pushed: bool,
    /// Raw collaborator output, for logging.
    pub output: String,
}

/// Version-control collaborator. Push scope is a single named artifact --
/// pushing more would risk deleting unrelated remote content.
pub trait Repository: Send + Sync {
    /// Pull the latest remote state.
    fn pull(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Commit and push only `artifact` (the dataset pointer file).
    fn commit_and_push(
        &self,
        artifact: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PushOutcome>> + Send + '_>>;
}

/// Regenerates the aggregated dataset descriptor from the raw objects
/// currently stored under `source_dir`. Returns the written manifest path.
pub trait ManifestBuilder: Send + Sync {
    fn build(
        &self,
        source_dir: &Path,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PathBuf>> + Send + '_>>;
}

/// When a stream of triggers turns into a sync execution.
///
/// Two historical policies exist; they are interchangeable strategies, never
/// merged:
/// - `Debounce`: wait for a quiet interval with no new triggers (canonical).
/// - `Countdown`: fire on every N-th trigger.
#[derive(Debug, Clone, Copy)]
pub enum TriggerPolicy {
    Debounce { quiet_interval: Duration },
    Countdown { every: u32 },
}

struct TriggerState {
    /// Bumped on every debounce trigger; a timer whose generation is stale
    /// was replaced and does nothing on expiry.
    generation: u64,
    /// Triggers left before a countdown fire.
    remaining: u32,
    /// Source directory hint from the most recent trigger.
    pending_dir: Option<PathBuf>,
}

/// Process-wide singleton owning the debounce timer and the single-flight
/// guard. Exposes only [`trigger`](Self::trigger); the timer transition is
/// internal.
pub struct SyncCoordinator {
    policy: TriggerPolicy,
    /// Artifact name handed to the repository (e.g. `dataset.json.dvc`).
    artifact: String,
    repository: Arc<dyn Repository>,
    manifest: Arc<dyn ManifestBuilder>,
    running: AtomicBool,
    state: Mutex<TriggerState>,
}

impl SyncCoordinator {
    pub fn new(
        policy: TriggerPolicy,
        artifact: String,
        repository: Arc<dyn Repository>,
        manifest: Arc<dyn ManifestBuilder>,
    ) -> Self {
        let remaining = match policy {
            TriggerPolicy::Countdown { every } => every,
            TriggerPolicy::Debounce { .. } => 0,
        };
        Self {
            policy,
            artifact,
            repository,
            manifest,
            running: AtomicBool::new(false),
            state: Mutex::new(TriggerState {
                generation: 0,
                remaining,
                pending_dir: None,
            }),
        }
    }

    /// Record a trigger after a successful PUT. Never blocks: all work
    /// happens on spawned tasks, so the request path returns immediately.
    pub fn trigger(self: &Arc<Self>, source_dir: PathBuf) {
        match self.policy {
            TriggerPolicy::Debounce { quiet_interval } => {
                let generation = {
                    let mut state = self.state.lock().expect("sync state poisoned");
                    state.generation += 1;
                    state.pending_dir = Some(source_dir);
                    state.generation
                };
                let coordinator = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::time::sleep(quiet_interval).await;
                    coordinator.on_timer_fire(generation).await;
                });
            }
            TriggerPolicy::Countdown { every } => {
                let fire = {
                    let mut state = self.state.lock().expect("sync state poisoned");
                    state.pending_dir = Some(source_dir);
                    state.remaining = state.remaining.saturating_sub(1);
                    if state.remaining == 0 {
                        state.remaining = every;
                        true
                    } else {
                        false
                    }
                };
                if fire {
                    let coordinator = Arc::clone(self);
                    tokio::spawn(async move {
                        coordinator.fire().await;
                    });
                }
            }
        }
    }

    /// Debounce timer expiry. A stale generation means a newer trigger
    /// replaced this timer.
    async fn on_timer_fire(self: Arc<Self>, generation: u64) {
        {
            let state = self.state.lock().expect("sync state poisoned");
            if state.generation != generation {
                return;
            }
        }
        self.fire().await;
    }

    /// Attempt a sync execution under the single-flight guard.
    async fn fire(&self) {
        let source_dir = {
            let mut state = self.state.lock().expect("sync state poisoned");
            state.pending_dir.take()
        };
        let Some(source_dir) = source_dir else {
            return;
        };

        // At-most-one-concurrent: a fire during a running sync is skipped,
        // not queued.
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("sync already running, skipping this cycle");
            return;
        }

        if let Err(e) = self.run_sync(&source_dir).await {
            error!("sync failed: {e:#}");
        }

        self.running.store(false, Ordering::SeqCst);
    }

    /// One full sync cycle: pull, rebuild the manifest, push the pointer
    /// artifact. Errors propagate to [`fire`] where they are logged.
    async fn run_sync(&self, source_dir: &Path) -> anyhow::Result<()> {
        info!("sync started for {}", source_dir.display());

        self.repository.pull().await?;

        let manifest_path = self.manifest.build(source_dir).await?;
        info!("dataset manifest rebuilt at {}", manifest_path.display());

        let outcome = self.repository.commit_and_push(&self.artifact).await?;
        if outcome.pushed {
            info!("sync done, changes committed and pushed");
        } else {
            info!("no changes, skipped commit and push");
        }

        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Repository double recording call counts; `pull` can be slowed down
    /// to hold the coordinator in the Running state.
    struct FakeRepository {
        pull_calls: AtomicUsize,
        push_calls: AtomicUsize,
        pull_delay: Duration,
        fail_pull: bool,
        pushed: bool,
    }

    impl FakeRepository {
        fn new() -> Self {
            Self {
                pull_calls: AtomicUsize::new(0),
                push_calls: AtomicUsize::new(0),
                pull_delay: Duration::ZERO,
                fail_pull: false,
                pushed: true,
            }
        }
    }

    impl Repository for FakeRepository {
        fn pull(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            Box::pin(async move {
                self.pull_calls.fetch_add(1, Ordering::SeqCst);
                if !self.pull_delay.is_zero() {
                    tokio::time::sleep(self.pull_delay).await;
                }
                if self.fail_pull {
                    anyhow::bail!("remote unreachable");
                }
                Ok(())
            })
        }

        fn commit_and_push(
            &self,
            _artifact: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<PushOutcome>> + Send + '_>> {
            Box::pin(async move {
                self.push_calls.fetch_add(1, Ordering::SeqCst);
                Ok(PushOutcome {
                    pushed: self.pushed,
                    output: String::new(),
                })
            })
        }
    }

    struct FakeManifest {
        build_calls: AtomicUsize,
    }

    impl FakeManifest {
        fn new() -> Self {
            Self {
                build_calls: AtomicUsize::new(0),
            }
        }
    }

    impl ManifestBuilder for FakeManifest {
        fn build(
            &self,
            source_dir: &Path,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<PathBuf>> + Send + '_>> {
            let dir = source_dir.to_path_buf();
            Box::pin(async move {
                self.build_calls.fetch_add(1, Ordering::SeqCst);
                Ok(dir.join("dataset.json"))
            })
        }
    }

    fn coordinator(
        policy: TriggerPolicy,
        repo: Arc<FakeRepository>,
        manifest: Arc<FakeManifest>,
    ) -> Arc<SyncCoordinator> {
        Arc::new(SyncCoordinator::new(
            policy,
            "dataset.json.dvc".to_string(),
            repo,
            manifest,
        ))
    }

    /// Let spawned timer/sync tasks make progress under paused time.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_coalesces_burst_into_one_run() {
        let repo = Arc::new(FakeRepository::new());
        let manifest = Arc::new(FakeManifest::new());
        let coord = coordinator(
            TriggerPolicy::Debounce {
                quiet_interval: Duration::from_secs(5),
            },
            Arc::clone(&repo),
            Arc::clone(&manifest),
        );

        for _ in 0..10 {
            coord.trigger(PathBuf::from("/data/mybucket/data"));
            settle().await;
        }

        tokio::time::advance(Duration::from_secs(6)).await;
        settle().await;

        assert_eq!(repo.pull_calls.load(Ordering::SeqCst), 1);
        assert_eq!(manifest.build_calls.load(Ordering::SeqCst), 1);
        assert_eq!(repo.push_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_timer_resets_on_new_trigger() {
        let repo = Arc::new(FakeRepository::new());
        let manifest = Arc::new(FakeManifest::new());
        let coord = coordinator(
            TriggerPolicy::Debounce {
                quiet_interval: Duration::from_secs(10),
            },
            Arc::clone(&repo),
            Arc::clone(&manifest),
        );

        coord.trigger(PathBuf::from("/data/b"));
        settle().await;
        tokio::time::advance(Duration::from_secs(6)).await;
        settle().await;

        // Second trigger replaces the pending timer.
        coord.trigger(PathBuf::from("/data/b"));
        settle().await;
        tokio::time::advance(Duration::from_secs(6)).await;
        settle().await;
        // The first timer has expired by now but was superseded.
        assert_eq!(repo.pull_calls.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(repo.pull_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_during_running_sync_is_skipped_not_queued() {
        let mut repo = FakeRepository::new();
        repo.pull_delay = Duration::from_secs(60);
        let repo = Arc::new(repo);
        let manifest = Arc::new(FakeManifest::new());
        let coord = coordinator(
            TriggerPolicy::Debounce {
                quiet_interval: Duration::from_secs(1),
            },
            Arc::clone(&repo),
            Arc::clone(&manifest),
        );

        coord.trigger(PathBuf::from("/data/b"));
        settle().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        // First sync is now held inside the slow pull.
        assert_eq!(repo.pull_calls.load(Ordering::SeqCst), 1);

        coord.trigger(PathBuf::from("/data/b"));
        settle().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        // The second expiry saw Running and skipped.
        assert_eq!(repo.pull_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        // Skipped means skipped: nothing was queued behind the first run.
        assert_eq!(repo.pull_calls.load(Ordering::SeqCst), 1);
        assert_eq!(repo.push_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_fires_every_nth_trigger() {
        let repo = Arc::new(FakeRepository::new());
        let manifest = Arc::new(FakeManifest::new());
        let coord = coordinator(
            TriggerPolicy::Countdown { every: 3 },
            Arc::clone(&repo),
            Arc::clone(&manifest),
        );

        for _ in 0..6 {
            coord.trigger(PathBuf::from("/data/b"));
            settle().await;
        }

        assert_eq!(repo.pull_calls.load(Ordering::SeqCst), 2);

        coord.trigger(PathBuf::from("/data/b"));
        settle().await;
        assert_eq!(repo.pull_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sync_clears_running_and_next_trigger_retries() {
        let mut repo = FakeRepository::new();
        repo.fail_pull = true;
        let repo = Arc::new(repo);
        let manifest = Arc::new(FakeManifest::new());
        let coord = coordinator(
            TriggerPolicy::Debounce {
                quiet_interval: Duration::from_secs(1),
            },
            Arc::clone(&repo),
            Arc::clone(&manifest),
        );

        coord.trigger(PathBuf::from("/data/b"));
        settle().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(repo.pull_calls.load(Ordering::SeqCst), 1);
        // The failure stopped the cycle before the manifest step.
        assert_eq!(manifest.build_calls.load(Ordering::SeqCst), 0);

        // A later trigger attempts again: the guard was released.
        coord.trigger(PathBuf::from("/data/b"));
        settle().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(repo.pull_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_changed_still_completes_cycle() {
        let mut repo = FakeRepository::new();
        repo.pushed = false;
        let repo = Arc::new(repo);
        let manifest = Arc::new(FakeManifest::new());
        let coord = coordinator(
            TriggerPolicy::Debounce {
                quiet_interval: Duration::from_secs(1),
            },
            Arc::clone(&repo),
            Arc::clone(&manifest),
        );

        coord.trigger(PathBuf::from("/data/b"));
        settle().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;

        assert_eq!(repo.push_calls.load(Ordering::SeqCst), 1);

        // Coordinator is Idle again and accepts the next cycle.
        coord.trigger(PathBuf::from("/data/b"));
        settle().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(repo.push_calls.load(Ordering::SeqCst), 2);
    }
}
