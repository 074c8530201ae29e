//! Viewer: "latest request wins" loading of models and environments
//!
//! Each resource kind owns a [`Sequencer`] and a [`ResourceSlot`]. A load
//! request swaps a fresh [`LoadToken`] into the slot (canceling the previous
//! request) and queues a step on the kind's sequencer. The step checks for
//! cancellation before and after the engine import and only installs the
//! result if the request is still the current one.
//!
//! Superseded requests resolve to `Ok(LoadOutcome::Superseded)`; they are
//! never reported as errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tracing::{debug, info, warn};

use crate::cancel::{CancelSignal, LoadToken};
use crate::engine::{Disposable, SceneEngine};
use crate::environment::EnvironmentRequest;
use crate::error::ViewerError;
use crate::framing::CameraFraming;
use crate::options::ViewerOptions;
use crate::sequencer::{Sequenced, Sequencer};
use crate::slot::ResourceSlot;

/// Independently sequenced load category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Model,
    Environment,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Model => "model",
            ResourceKind::Environment => "environment",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful result of a load request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    /// The resource was installed into the scene
    Applied,
    /// A newer request, an external signal or disposal made this one obsolete
    Superseded,
}

/// Lifecycle of the most recent request for a kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    Loading { url: Option<String> },
    Applied { url: Option<String> },
    Canceled,
    Failed { error: String },
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoadState::Applied { .. } | LoadState::Canceled | LoadState::Failed { .. }
        )
    }
}

/// State shared between the viewer and its queued steps
struct Shared<E> {
    engine: Arc<E>,
    disposed: AtomicBool,
    framing: Mutex<CameraFraming>,
}

impl<E: SceneEngine> Shared<E> {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn framing(&self) -> CameraFraming {
        *lock(&self.framing)
    }

    fn reframe(&self) {
        let framing = CameraFraming::from_bounds(self.engine.world_bounds());
        self.engine.apply_camera(&framing);
        *lock(&self.framing) = framing;
    }
}

struct KindState<R> {
    kind: ResourceKind,
    sequencer: Sequencer,
    slot: ResourceSlot<R>,
    /// Generation of the request the state belongs to
    state: Mutex<(u64, LoadState)>,
}

impl<R: Disposable> KindState<R> {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            sequencer: Sequencer::new(kind.as_str()),
            slot: ResourceSlot::new(),
            state: Mutex::new((0, LoadState::Idle)),
        }
    }

    /// Record a state change unless a newer request already owns the state
    fn set_state(&self, generation: u64, state: LoadState) {
        let mut current = lock(&self.state);
        if generation >= current.0 {
            *current = (generation, state);
        }
    }

    fn state(&self) -> LoadState {
        lock(&self.state).1.clone()
    }

    /// Queue disposal of the applied resource behind any in-flight step
    fn release(self: &Arc<Self>) -> Sequenced<()> {
        let this = self.clone();
        self.sequencer.enqueue(move || async move {
            if let Some(resource) = this.slot.take() {
                resource.dispose().await;
                debug!(kind = %this.kind, "Released resource");
            }
        })
    }
}

/// Kind-specific parts of a load step
trait LoadPlan<E: SceneEngine>: Send + 'static {
    type Resource: Disposable;

    fn url(&self) -> Option<&str>;

    fn import(
        &mut self,
        shared: &Shared<E>,
    ) -> impl Future<Output = anyhow::Result<Self::Resource>> + Send;

    /// Put the new resource into the scene before it replaces the old one
    fn install(&self, shared: &Shared<E>, resource: &Self::Resource);

    /// Follow-up once the previous resource is gone
    fn settle(&self, shared: &Shared<E>);
}

struct ModelPlan {
    url: String,
}

impl<E: SceneEngine> LoadPlan<E> for ModelPlan {
    type Resource = E::Model;

    fn url(&self) -> Option<&str> {
        Some(&self.url)
    }

    fn import(
        &mut self,
        shared: &Shared<E>,
    ) -> impl Future<Output = anyhow::Result<E::Model>> + Send {
        shared.engine.import_model(&self.url)
    }

    fn install(&self, shared: &Shared<E>, model: &E::Model) {
        shared.engine.add_model_to_scene(model);
    }

    fn settle(&self, shared: &Shared<E>) {
        shared.reframe();
    }
}

struct EnvironmentPlan {
    url: Option<String>,
    request: Option<EnvironmentRequest>,
}

impl<E: SceneEngine> LoadPlan<E> for EnvironmentPlan {
    type Resource = E::Environment;

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn import(
        &mut self,
        shared: &Shared<E>,
    ) -> impl Future<Output = anyhow::Result<E::Environment>> + Send {
        // Skybox size follows the camera at the time the step runs
        let request = EnvironmentRequest::for_url(self.url.as_deref(), &shared.framing());
        let request = self.request.insert(request);
        shared.engine.import_environment(request)
    }

    fn install(&self, shared: &Shared<E>, environment: &E::Environment) {
        shared.engine.attach_environment(environment);
    }

    fn settle(&self, shared: &Shared<E>) {
        let auto_clear = self
            .request
            .as_ref()
            .map(EnvironmentRequest::auto_clear)
            .unwrap_or(true);
        shared.engine.set_auto_clear(auto_clear);
    }
}

/// Marks a step `Failed` if it is dropped before settling, which happens
/// when an engine call panics and the sequencer abandons the step.
struct StepGuard<R: Disposable> {
    kind_state: Arc<KindState<R>>,
    generation: u64,
    settled: bool,
}

impl<R: Disposable> StepGuard<R> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl<R: Disposable> Drop for StepGuard<R> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(kind = %self.kind_state.kind, generation = self.generation, "Load step abandoned");
        self.kind_state.set_state(
            self.generation,
            LoadState::Failed {
                error: "load step was abandoned before completing".to_string(),
            },
        );
    }
}

async fn run_step<E, P>(
    shared: Arc<Shared<E>>,
    kind_state: Arc<KindState<P::Resource>>,
    token: LoadToken,
    signal: CancelSignal,
    plan: P,
) -> Result<LoadOutcome, ViewerError>
where
    E: SceneEngine,
    P: LoadPlan<E>,
{
    let guard = StepGuard {
        kind_state: kind_state.clone(),
        generation: token.generation(),
        settled: false,
    };
    let result = execute_step(shared, kind_state, token, signal, plan).await;
    guard.settle();
    result
}

async fn execute_step<E, P>(
    shared: Arc<Shared<E>>,
    kind_state: Arc<KindState<P::Resource>>,
    token: LoadToken,
    signal: CancelSignal,
    mut plan: P,
) -> Result<LoadOutcome, ViewerError>
where
    E: SceneEngine,
    P: LoadPlan<E>,
{
    let kind = kind_state.kind;
    let generation = token.generation();
    let url = plan.url().map(str::to_string);
    let label = url.as_deref().unwrap_or("<default>");

    let is_canceled = || {
        token.is_canceled()
            || signal.is_canceled()
            || shared.is_disposed()
            || !kind_state.slot.is_current(&token)
    };

    if is_canceled() {
        debug!(kind = %kind, url = label, generation, "Load superseded before import");
        kind_state.set_state(generation, LoadState::Canceled);
        return Ok(LoadOutcome::Superseded);
    }

    let resource = match plan.import(&shared).await {
        Ok(resource) => resource,
        Err(e) if is_canceled() => {
            debug!(kind = %kind, url = label, error = %e, "Superseded load failed, ignoring");
            kind_state.set_state(generation, LoadState::Canceled);
            return Ok(LoadOutcome::Superseded);
        }
        Err(e) => {
            warn!(kind = %kind, url = label, error = %e, "Load failed");
            kind_state.set_state(generation, LoadState::Failed { error: format!("{:#}", e) });
            return Err(ViewerError::LoadFailed {
                kind,
                url: label.to_string(),
                source: e,
            });
        }
    };

    if is_canceled() {
        debug!(kind = %kind, url = label, generation, "Load superseded during import, discarding result");
        resource.dispose().await;
        kind_state.set_state(generation, LoadState::Canceled);
        return Ok(LoadOutcome::Superseded);
    }

    plan.install(&shared, &resource);
    if let Some(previous) = kind_state.slot.replace(resource) {
        previous.dispose().await;
    }
    plan.settle(&shared);

    kind_state.set_state(generation, LoadState::Applied { url: url.clone() });
    info!(kind = %kind, url = label, generation, "Load applied");
    Ok(LoadOutcome::Applied)
}

/// Mini viewer bound to one engine instance
pub struct Viewer<E: SceneEngine> {
    shared: Arc<Shared<E>>,
    options: ViewerOptions,
    model: Arc<KindState<E::Model>>,
    environment: Arc<KindState<E::Environment>>,
}

impl<E: SceneEngine> Viewer<E> {
    /// Set up the scene and start rendering.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(engine: E, options: ViewerOptions) -> Self {
        Self::from_shared_engine(Arc::new(engine), options)
    }

    pub fn from_shared_engine(engine: Arc<E>, options: ViewerOptions) -> Self {
        engine.set_clear_color(options.background_color);

        let shared = Arc::new(Shared {
            engine,
            disposed: AtomicBool::new(false),
            framing: Mutex::new(CameraFraming::default()),
        });
        // Default camera values for the empty scene
        shared.reframe();
        shared.engine.run_render_loop();

        debug!(?options, "Viewer created");

        Self {
            shared,
            options,
            model: Arc::new(KindState::new(ResourceKind::Model)),
            environment: Arc::new(KindState::new(ResourceKind::Environment)),
        }
    }

    pub fn engine(&self) -> &E {
        &self.shared.engine
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    /// Camera framing applied by the most recent model load
    pub fn framing(&self) -> CameraFraming {
        self.shared.framing()
    }

    pub fn load_model(&self, url: impl Into<String>) -> LoadRequest {
        self.load_model_with_signal(url, CancelSignal::never())
    }

    pub fn load_model_with_signal(&self, url: impl Into<String>, signal: CancelSignal) -> LoadRequest {
        let url = url.into();
        if url.trim().is_empty() && !self.is_disposed() {
            return LoadRequest::rejected(
                ResourceKind::Model,
                ViewerError::LoadFailed {
                    kind: ResourceKind::Model,
                    url,
                    source: anyhow::anyhow!("no model url given"),
                },
            );
        }
        self.submit(&self.model, ModelPlan { url }, signal)
    }

    /// Load an environment; `None` installs the default hemispheric light
    pub fn load_environment(&self, url: Option<&str>) -> LoadRequest {
        self.load_environment_with_signal(url, CancelSignal::never())
    }

    pub fn load_environment_with_signal(&self, url: Option<&str>, signal: CancelSignal) -> LoadRequest {
        let plan = EnvironmentPlan {
            url: url.map(str::to_string),
            request: None,
        };
        self.submit(&self.environment, plan, signal)
    }

    /// Dispatch a load by kind
    pub fn load(&self, kind: ResourceKind, url: Option<&str>, signal: CancelSignal) -> LoadRequest {
        match kind {
            ResourceKind::Model => self.load_model_with_signal(url.unwrap_or_default(), signal),
            ResourceKind::Environment => self.load_environment_with_signal(url, signal),
        }
    }

    pub fn load_state(&self, kind: ResourceKind) -> LoadState {
        match kind {
            ResourceKind::Model => self.model.state(),
            ResourceKind::Environment => self.environment.state(),
        }
    }

    /// Steps queued or running for a kind
    pub fn pending(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Model => self.model.sequencer.pending(),
            ResourceKind::Environment => self.environment.sequencer.pending(),
        }
    }

    pub fn inspect_model<T>(&self, f: impl FnOnce(Option<&E::Model>) -> T) -> T {
        self.model.slot.inspect(f)
    }

    pub fn inspect_environment<T>(&self, f: impl FnOnce(Option<&E::Environment>) -> T) -> T {
        self.environment.slot.inspect(f)
    }

    /// Stop accepting loads, release both slots once in-flight steps have
    /// settled, then dispose the engine. Later calls are no-ops.
    pub async fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.model.slot.cancel_current();
        self.environment.slot.cancel_current();

        let (model, environment) = tokio::join!(self.model.release(), self.environment.release());
        if model.is_err() || environment.is_err() {
            warn!("Resource release did not complete during dispose");
        }

        self.shared.engine.dispose();
        info!("Viewer disposed");
    }

    fn submit<P>(&self, kind_state: &Arc<KindState<P::Resource>>, plan: P, signal: CancelSignal) -> LoadRequest
    where
        P: LoadPlan<E>,
    {
        let kind = kind_state.kind;
        if self.is_disposed() {
            warn!(kind = %kind, url = ?plan.url(), "Load requested on a disposed viewer");
            return LoadRequest::rejected(kind, ViewerError::Disposed);
        }

        let token = kind_state.slot.issue_token();
        let generation = token.generation();
        kind_state.set_state(
            generation,
            LoadState::Loading {
                url: plan.url().map(str::to_string),
            },
        );
        debug!(kind = %kind, url = ?plan.url(), generation, "Load requested");

        let shared = self.shared.clone();
        let state = kind_state.clone();
        let handle = kind_state
            .sequencer
            .enqueue(move || run_step(shared, state, token, signal, plan));

        LoadRequest {
            kind,
            generation: Some(generation),
            inner: RequestInner::Queued(handle),
        }
    }
}

enum RequestInner {
    Rejected(Option<ViewerError>),
    Queued(Sequenced<Result<LoadOutcome, ViewerError>>),
}

/// Pending result of a load call.
///
/// The request is already queued when this is returned; awaiting it only
/// observes the outcome.
#[must_use = "a load request reports failures only through its result"]
pub struct LoadRequest {
    kind: ResourceKind,
    generation: Option<u64>,
    inner: RequestInner,
}

impl LoadRequest {
    fn rejected(kind: ResourceKind, error: ViewerError) -> Self {
        Self {
            kind,
            generation: None,
            inner: RequestInner::Rejected(Some(error)),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Token generation, or `None` if the request was rejected up front
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }
}

impl Future for LoadRequest {
    type Output = Result<LoadOutcome, ViewerError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            RequestInner::Rejected(error) => {
                Poll::Ready(Err(error.take().unwrap_or(ViewerError::Disposed)))
            }
            RequestInner::Queued(handle) => Pin::new(handle)
                .poll(cx)
                .map(|result| result.map_err(ViewerError::from).and_then(|outcome| outcome)),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
