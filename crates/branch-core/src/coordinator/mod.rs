//! Event and trigger coordination
//!
//! The coordinator turns triggers (explicit requests, periodic ticks and
//! provider events) into indexing passes, and passes into builds. It keeps
//! at most one queued and one running pass per item: triggers arriving
//! before a pass starts join it, triggers arriving while it runs queue a
//! single follow-up.
//!
//! Every accepted trigger gets a [`Watermark`]. Awaiting a watermark waits
//! for every pass attributed to it, every pass those cascaded into, and
//! every build they queued.

mod activity;
mod event;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::{Semaphore, broadcast, watch};
use tokio::task::JoinHandle;

use crate::build::{BuildEngine, BuildHandle, BuildRequest, BuildResult, BuildStatus};
use crate::cause::{Cause, CauseSet};
use crate::model::{BranchProject, ItemPath, MultiBranchProject, lock};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::tree::{IndexTarget, ItemTree};
use crate::{Error, Result};

use activity::{ActivityTracker, Marks};

pub use activity::Watermark;
pub use event::{EventKind, EventScope, ScmEvent};

const REPORT_CHANNEL_CAPACITY: usize = 64;

/// Schedules indexing passes and builds for an item tree.
///
/// Cloning is cheap; clones share the same queue and watermarks. Methods
/// that start work spawn tokio tasks and must be called inside a runtime.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    tree: Arc<ItemTree>,
    reconciler: Reconciler,
    engine: Arc<dyn BuildEngine>,
    activity: ActivityTracker,
    queue: Mutex<HashMap<ItemPath, PassState>>,
    indexing: Semaphore,
    executors: Semaphore,
    reports: broadcast::Sender<ReconcileReport>,
}

enum PassState {
    /// Waiting for a worker; new triggers join these marks
    Queued { marks: Marks },
    /// Running; new triggers collect into one follow-up pass
    Running { next: Option<Marks> },
}

impl Coordinator {
    pub fn new(tree: Arc<ItemTree>, engine: Arc<dyn BuildEngine>) -> Self {
        let config = Arc::clone(tree.config());
        let reconciler = Reconciler::new(Arc::clone(&config), Arc::clone(tree.store()));
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                reconciler,
                engine,
                activity: ActivityTracker::new(),
                queue: Mutex::new(HashMap::new()),
                indexing: Semaphore::new(config.indexing.workers),
                executors: Semaphore::new(config.builds.executors),
                reports,
                tree,
            }),
        }
    }

    pub fn tree(&self) -> &Arc<ItemTree> {
        &self.inner.tree
    }

    /// Trigger a pass for the organization or project at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing indexable exists at `path`.
    pub fn schedule(&self, path: &ItemPath) -> Result<Watermark> {
        let target = self
            .inner
            .tree
            .find(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        Ok(self.trigger(vec![target], "explicit request"))
    }

    /// Trigger a pass for an item already in hand.
    pub fn index(&self, target: IndexTarget) -> Watermark {
        self.trigger(vec![target], "explicit request")
    }

    /// Route a provider event to the items it concerns.
    pub fn fire(&self, event: ScmEvent) -> Watermark {
        let targets = event::route(&self.inner.tree, &event);
        tracing::debug!(
            event = %event.id,
            kind = ?event.kind,
            origin = event.origin.as_deref().unwrap_or("unknown"),
            targets = targets.len(),
            "Routing provider event"
        );
        self.trigger(targets, "provider event")
    }

    /// Trigger a pass for every organization and every project.
    pub fn tick(&self) -> Watermark {
        self.trigger(self.inner.tree.all_targets(), "periodic tick")
    }

    /// Run [`Coordinator::tick`] at the configured
    /// `indexing.tick_interval_secs` until the coordinator is dropped or the
    /// returned task is aborted.
    pub fn spawn_periodic(&self) -> JoinHandle<()> {
        self.spawn_periodic_every(self.inner.tree.config().tick_interval())
    }

    /// Like [`Coordinator::spawn_periodic`] with an explicit interval.
    pub fn spawn_periodic_every(&self, interval: Duration) -> JoinHandle<()> {
        tracing::debug!(interval_secs = interval.as_secs(), "Starting periodic ticks");
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            timer.tick().await;
            loop {
                timer.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Coordinator { inner }.tick();
            }
        })
    }

    /// Last watermark handed out.
    pub fn watermark(&self) -> Watermark {
        self.inner.activity.current()
    }

    /// Wait until all work attributed to watermarks up to `mark` finished.
    pub async fn await_watermark(&self, mark: Watermark) {
        self.inner.activity.wait(mark).await;
    }

    /// Wait until everything triggered so far has finished.
    pub async fn await_quiescence(&self) {
        let mark = self.inner.activity.current();
        self.inner.activity.wait(mark).await;
    }

    /// Reports of finished passes.
    pub fn subscribe_reports(&self) -> broadcast::Receiver<ReconcileReport> {
        self.inner.reports.subscribe()
    }

    /// Queue a build of a branch's current revision outside indexing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown branch, [`Error::Deleted`]
    /// for a deleted one and [`Error::NoRevision`] if it was never indexed.
    pub async fn request_build(
        &self,
        path: &ItemPath,
        causes: impl IntoIterator<Item = Cause>,
    ) -> Result<BuildHandle> {
        let causes: CauseSet = causes.into_iter().collect();
        let branch = self
            .inner
            .tree
            .find_branch(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        if branch.is_deleted() {
            return Err(Error::Deleted {
                item: path.to_string(),
            });
        }

        let (revision, decorations) = match branch.head() {
            Some((head, Some(source))) => {
                let decorations =
                    crate::reconcile::revision_decorations(source.as_ref(), &head).await;
                (head.revision, decorations)
            }
            Some((head, None)) => (head.revision, Default::default()),
            None => {
                let revision = branch.revision().ok_or_else(|| Error::NoRevision {
                    item: path.to_string(),
                })?;
                (revision, Default::default())
            }
        };

        let request = branch
            .queue_build(causes, revision, decorations)
            .ok_or_else(|| Error::Deleted {
                item: path.to_string(),
            })?;

        let mark = self.inner.activity.accept();
        let marks: Marks = [mark].into_iter().collect();
        let handle = self.inner.dispatch_build(branch, request, &marks);
        self.inner.activity.finish(&marks);
        Ok(handle)
    }

    fn trigger(&self, targets: Vec<IndexTarget>, reason: &str) -> Watermark {
        let mark = self.inner.activity.accept();
        let marks: Marks = [mark].into_iter().collect();
        tracing::debug!(watermark = %mark, targets = targets.len(), reason, "Accepted trigger");

        for target in targets {
            self.inner.schedule_pass(target, &marks);
        }
        self.inner.activity.finish(&marks);
        mark
    }
}

impl Inner {
    /// Queue a pass for `target`, joining a queued or running one.
    fn schedule_pass(self: &Arc<Self>, target: IndexTarget, marks: &Marks) {
        if target.is_deleted() {
            return;
        }
        let path = target.path().clone();
        let mut queue = lock(&self.queue);

        match queue.get_mut(&path) {
            Some(PassState::Queued { marks: queued }) => {
                let added: Marks = marks.difference(queued).copied().collect();
                self.activity.begin(&added);
                queued.extend(added);
                tracing::debug!(item = %path, "Coalesced trigger into queued pass");
            }
            Some(PassState::Running { next }) => {
                let next = next.get_or_insert_with(Marks::new);
                let added: Marks = marks.difference(next).copied().collect();
                self.activity.begin(&added);
                next.extend(added);
                tracing::debug!(item = %path, "Queued follow-up pass");
            }
            None => {
                self.activity.begin(marks);
                queue.insert(
                    path,
                    PassState::Queued {
                        marks: marks.clone(),
                    },
                );
                let inner = Arc::clone(self);
                tokio::spawn(async move { inner.run_passes(target).await });
            }
        }
    }

    /// Run queued passes for one item until no follow-up is pending.
    async fn run_passes(self: Arc<Self>, target: IndexTarget) {
        let path = target.path().clone();
        loop {
            let permit = self.indexing.acquire().await;
            let marks = {
                let mut queue = lock(&self.queue);
                let Some(state) = queue.get_mut(&path) else {
                    return;
                };
                match std::mem::replace(state, PassState::Running { next: None }) {
                    PassState::Queued { marks } => marks,
                    running @ PassState::Running { .. } => {
                        *state = running;
                        return;
                    }
                }
            };

            if permit.is_ok() {
                self.run_pass(&target, &marks).await;
            }
            drop(permit);

            let follow_up = {
                let mut queue = lock(&self.queue);
                match queue.remove(&path) {
                    Some(PassState::Running { next: Some(next) }) => {
                        queue.insert(path.clone(), PassState::Queued { marks: next });
                        true
                    }
                    _ => false,
                }
            };
            self.activity.finish(&marks);
            if !follow_up {
                return;
            }
        }
    }

    async fn run_pass(self: &Arc<Self>, target: &IndexTarget, marks: &Marks) {
        match target {
            IndexTarget::Organization(organization) => {
                match self.reconciler.index_organization(organization).await {
                    Ok(pass) => {
                        let _ = self.reports.send(pass.report);
                        for project in pass.child_passes {
                            self.schedule_pass(IndexTarget::Project(project), marks);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(organization = %organization.path(), error = %e, "Organization pass failed");
                    }
                }
            }
            IndexTarget::Project(project) => match self.reconciler.index_project(project).await {
                Ok(pass) => {
                    let _ = self.reports.send(pass.report);
                    for request in pass.builds {
                        if let Some(branch) = branch_for(project, &request) {
                            self.dispatch_build(branch, request, marks);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(project = %project.path(), error = %e, "Project pass failed");
                }
            },
        }
    }

    /// Execute a queued build on the executor pool.
    fn dispatch_build(
        self: &Arc<Self>,
        branch: Arc<BranchProject>,
        request: BuildRequest,
        marks: &Marks,
    ) -> BuildHandle {
        self.activity.begin(marks);
        let (status, receiver) = watch::channel(BuildStatus::Queued);
        let handle = BuildHandle::new(request.path.clone(), request.number, receiver);

        let inner = Arc::clone(self);
        let marks = marks.clone();
        tokio::spawn(async move {
            let number = request.number;
            let result = match inner.executors.acquire().await {
                Ok(_permit) if !branch.is_deleted() => {
                    branch.set_build_status(number, BuildStatus::Running);
                    status.send_replace(BuildStatus::Running);
                    tracing::debug!(branch = %request.path, number, "Build started");

                    match inner.engine.execute(request).await {
                        Ok(result) => result,
                        Err(e) => {
                            tracing::warn!(branch = %branch.path(), number, error = %e, "Build engine failed");
                            BuildResult::Failure
                        }
                    }
                }
                _ => BuildResult::Aborted,
            };

            branch.set_build_status(number, BuildStatus::Completed(result));
            status.send_replace(BuildStatus::Completed(result));
            tracing::info!(branch = %branch.path(), number, result = %result, "Build finished");
            inner.activity.finish(&marks);
        });

        handle
    }
}

fn branch_for(project: &MultiBranchProject, request: &BuildRequest) -> Option<Arc<BranchProject>> {
    project.branch_by_name(request.path.name())
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("tree", &self.inner.tree)
            .field("watermark", &self.watermark())
            .finish_non_exhaustive()
    }
}
