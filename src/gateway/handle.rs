use std::{collections::VecDeque, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::{
    action::{Action, Control, ControlKind},
    admin::{AdminState, SyncStatus},
    container::{Container, Reducer},
    persist::{PersistError, PersistResult, SnapshotRecord, persister::StatePersister},
};

use super::{config::GatewayConfig, events::GatewayEvent};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway channel closed")]
    ChannelClosed,
    #[error("gateway is already shutting down")]
    ShuttingDown,
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// What the gateway did with a dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Domain action applied; a save was scheduled.
    Applied,
    /// Domain action lost because the gateway was not writable.
    Dropped { status: SyncStatus },
    /// Control action moved the admin status.
    Control { before: SyncStatus, after: SyncStatus },
    /// Control action refused by a guard; status untouched.
    Ignored { status: SyncStatus },
}

/// The dispatched action handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched<S, A> {
    pub action: Action<S, A>,
    pub disposition: Disposition,
}

type GatewayAction<R> = Action<<R as Reducer>::State, <R as Reducer>::Action>;
type GatewayDispatched<R> = Dispatched<<R as Reducer>::State, <R as Reducer>::Action>;

pub struct GatewayHandle<R: Reducer> {
    cmd_tx: mpsc::Sender<Command<R>>,
    events_tx: broadcast::Sender<GatewayEvent>,
}

impl<R: Reducer> Clone for GatewayHandle<R> {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command<R: Reducer> {
    Dispatch {
        action: GatewayAction<R>,
        resp: oneshot::Sender<GatewayDispatched<R>>,
    },
    State {
        resp: oneshot::Sender<R::State>,
    },
    Status {
        resp: oneshot::Sender<SyncStatus>,
    },
    Settled {
        resp: oneshot::Sender<()>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), GatewayError>>,
    },
}

enum Completion {
    Load(PersistResult<Option<serde_json::Value>>),
    Save(PersistResult<SnapshotRecord>),
    RetryLoad,
}

/// Starts the gateway task and bootstraps it with `Load`.
pub fn spawn_gateway<R: Reducer>(
    reducer: R,
    persister: StatePersister,
    config: GatewayConfig,
) -> GatewayHandle<R> {
    spawn_gateway_with_events(reducer, persister, config).0
}

/// Like [`spawn_gateway`], plus a receiver subscribed before the bootstrap
/// `Load`, so no event is missed.
pub fn spawn_gateway_with_events<R: Reducer>(
    reducer: R,
    persister: StatePersister,
    config: GatewayConfig,
) -> (GatewayHandle<R>, broadcast::Receiver<GatewayEvent>) {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command<R>>(config.command_queue_bound.max(1));
    let (events_tx, events_rx) = broadcast::channel::<GatewayEvent>(config.event_capacity.max(1));
    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel::<Completion>();

    let mut gateway = Gateway {
        primary: Container::new(reducer),
        admin: AdminState::new(),
        persister: Arc::new(Mutex::new(persister)),
        config,
        events_tx: events_tx.clone(),
        completion_tx,
        follow_ups: VecDeque::new(),
        load_in_flight: false,
        save_in_flight: false,
        save_queued: false,
        settle_waiters: Vec::new(),
        shutdown: None,
        handles_dropped: false,
    };

    tokio::spawn(async move {
        gateway.dispatch(Control::Load.into());

        loop {
            tokio::select! {
                cmd = cmd_rx.recv(), if !gateway.handles_dropped => match cmd {
                    Some(cmd) => gateway.handle_command(cmd),
                    None => {
                        debug!("all gateway handles dropped; draining backend calls");
                        gateway.handles_dropped = true;
                    }
                },
                Some(done) = completion_rx.recv() => {
                    gateway.handle_completion(done);
                }
            }

            gateway.notify_settled();
            if gateway.stopping() && gateway.is_idle() {
                let persister = Arc::clone(&gateway.persister);
                let result = close_backend(persister, gateway.config.save_timeout()).await;
                match gateway.shutdown.take() {
                    Some(resp) => {
                        let _ = resp.send(result);
                    }
                    None => {
                        if let Err(err) = result {
                            warn!(error = %err, "closing backend failed");
                        }
                    }
                }
                info!("gateway stopped");
                break;
            }
        }
    });

    (GatewayHandle { cmd_tx, events_tx }, events_rx)
}

impl<R: Reducer> GatewayHandle<R> {
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events_tx.subscribe()
    }

    /// Evaluates `action` against the current status. Resolves once the
    /// synchronous part is done; backend effects surface only via
    /// [`Self::sync_status`] and [`Self::subscribe`].
    pub async fn dispatch(
        &self,
        action: GatewayAction<R>,
    ) -> Result<GatewayDispatched<R>, GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Dispatch { action, resp: tx })
            .await
            .map_err(|_| GatewayError::ChannelClosed)?;
        rx.await.map_err(|_| GatewayError::ChannelClosed)
    }

    pub async fn dispatch_domain(
        &self,
        action: R::Action,
    ) -> Result<GatewayDispatched<R>, GatewayError> {
        self.dispatch(Action::Domain(action)).await
    }

    pub async fn state(&self) -> Result<R::State, GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::State { resp: tx })
            .await
            .map_err(|_| GatewayError::ChannelClosed)?;
        rx.await.map_err(|_| GatewayError::ChannelClosed)
    }

    pub async fn sync_status(&self) -> Result<SyncStatus, GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Status { resp: tx })
            .await
            .map_err(|_| GatewayError::ChannelClosed)?;
        rx.await.map_err(|_| GatewayError::ChannelClosed)
    }

    /// Resolves once no load or save is in flight or queued.
    pub async fn settled(&self) -> Result<(), GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Settled { resp: tx })
            .await
            .map_err(|_| GatewayError::ChannelClosed)?;
        rx.await.map_err(|_| GatewayError::ChannelClosed)
    }

    /// Lets in-flight backend calls finish, closes the backend and stops the task.
    pub async fn shutdown(&self) -> Result<(), GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| GatewayError::ChannelClosed)?;
        rx.await.map_err(|_| GatewayError::ChannelClosed)?
    }
}

struct Gateway<R: Reducer> {
    primary: Container<R>,
    admin: AdminState,
    persister: Arc<Mutex<StatePersister>>,
    config: GatewayConfig,
    events_tx: broadcast::Sender<GatewayEvent>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    follow_ups: VecDeque<Control<R::State>>,
    load_in_flight: bool,
    save_in_flight: bool,
    save_queued: bool,
    settle_waiters: Vec<oneshot::Sender<()>>,
    shutdown: Option<oneshot::Sender<Result<(), GatewayError>>>,
    handles_dropped: bool,
}

impl<R: Reducer> Gateway<R> {
    fn handle_command(&mut self, cmd: Command<R>) {
        match cmd {
            Command::Dispatch { action, resp } => {
                let out = match action {
                    Action::Control(
                        control @ (Control::LoadFailed(_) | Control::UpdateFailed(_)),
                    ) => {
                        let disposition = self.ignore(control.kind(), "raised by the gateway only");
                        Dispatched {
                            action: Action::Control(control),
                            disposition,
                        }
                    }
                    action => self.dispatch(action),
                };
                let _ = resp.send(out);
            }
            Command::State { resp } => {
                let _ = resp.send(self.primary.state().clone());
            }
            Command::Status { resp } => {
                let _ = resp.send(self.admin.status());
            }
            Command::Settled { resp } => {
                self.settle_waiters.push(resp);
            }
            Command::Shutdown { resp } => {
                if self.shutdown.is_some() {
                    let _ = resp.send(Err(GatewayError::ShuttingDown));
                } else {
                    info!("gateway shutdown requested");
                    self.shutdown = Some(resp);
                }
            }
        }
    }

    /// Runs `action`, then any control actions it scheduled, before returning.
    fn dispatch(&mut self, action: GatewayAction<R>) -> GatewayDispatched<R> {
        let out = self.step(action);
        while let Some(next) = self.follow_ups.pop_front() {
            let _ = self.step(Action::Control(next));
        }
        out
    }

    fn step(&mut self, action: GatewayAction<R>) -> GatewayDispatched<R> {
        let kind = action.kind();
        let before = self.admin.status();
        let disposition = match &action {
            Action::Domain(domain) => self.on_domain(domain),
            Action::Control(control) => self.on_control(control),
        };
        let after = self.admin.status();

        let _ = self.events_tx.send(GatewayEvent::Transition {
            action: kind,
            before,
            after,
        });
        trace!(action = %kind, %before, %after, state = ?self.primary.state(), "dispatched");

        Dispatched { action, disposition }
    }

    fn on_domain(&mut self, action: &R::Action) -> Disposition {
        let status = self.admin.status();
        if !status.accepts_domain_actions() {
            warn!(%status, ?action, "dropping domain action");
            let _ = self.events_tx.send(GatewayEvent::Dropped { status });
            return Disposition::Dropped { status };
        }

        self.primary.apply(action);
        let _ = self.events_tx.send(GatewayEvent::Applied);
        self.follow_ups.push_back(Control::Update);
        Disposition::Applied
    }

    fn on_control(&mut self, control: &Control<R::State>) -> Disposition {
        let kind = control.kind();
        match control {
            Control::Create | Control::Delete => {
                let (before, after) = self.admin.apply(kind);
                warn!(action = %kind, "backend create/delete is not implemented");
                let _ = self.events_tx.send(GatewayEvent::Unsupported { kind });
                Disposition::Control { before, after }
            }
            Control::Load => {
                if self.load_in_flight {
                    return self.ignore(kind, "load already in flight");
                }
                let (before, after) = self.admin.apply(kind);
                self.start_load();
                Disposition::Control { before, after }
            }
            Control::Loaded(snapshot) => {
                let found = snapshot.is_some();
                self.primary.hydrate(snapshot.clone());
                let (before, after) = self.admin.apply(kind);
                info!(found, "state hydrated");
                let _ = self.events_tx.send(GatewayEvent::Loaded { found });
                Disposition::Control { before, after }
            }
            Control::Update => {
                if !self.admin.status().accepts_domain_actions() {
                    // An unhydrated state must never shadow the stored snapshot.
                    return self.ignore(kind, "state not hydrated");
                }
                let (before, after) = self.admin.apply(kind);
                if self.save_in_flight {
                    self.save_queued = true;
                    debug!("save in flight; coalescing");
                    let _ = self.events_tx.send(GatewayEvent::SaveCoalesced);
                } else {
                    self.start_save();
                }
                Disposition::Control { before, after }
            }
            Control::Created
            | Control::Updated
            | Control::Deleted
            | Control::LoadFailed(_)
            | Control::UpdateFailed(_) => {
                let (before, after) = self.admin.apply(kind);
                Disposition::Control { before, after }
            }
        }
    }

    fn ignore(&self, kind: ControlKind, reason: &str) -> Disposition {
        let status = self.admin.status();
        debug!(action = %kind, %status, reason, "ignoring control action");
        let _ = self.events_tx.send(GatewayEvent::Ignored { kind, status });
        Disposition::Ignored { status }
    }

    fn start_load(&mut self) {
        self.load_in_flight = true;
        let persister = Arc::clone(&self.persister);
        let tx = self.completion_tx.clone();
        let budget = self.config.load_timeout();
        debug!(?budget, "loading state");
        tokio::spawn(async move {
            let result = with_persister(persister, budget, StatePersister::load_state).await;
            let _ = tx.send(Completion::Load(result));
        });
    }

    fn start_save(&mut self) {
        self.save_in_flight = true;
        let snapshot = match serde_json::to_value(self.primary.state()) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let _ = self.completion_tx.send(Completion::Save(Err(err.into())));
                return;
            }
        };
        let persister = Arc::clone(&self.persister);
        let tx = self.completion_tx.clone();
        let budget = self.config.save_timeout();
        tokio::spawn(async move {
            let result =
                with_persister(persister, budget, move |persister| persister.save_state(snapshot))
                    .await;
            let _ = tx.send(Completion::Save(result));
        });
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Load(result) => {
                self.load_in_flight = false;
                let decoded = result.and_then(|snapshot| {
                    snapshot
                        .map(serde_json::from_value::<R::State>)
                        .transpose()
                        .map_err(PersistError::from)
                });
                match decoded {
                    Ok(snapshot) => {
                        self.dispatch(Control::Loaded(snapshot).into());
                    }
                    Err(err) => {
                        let message = err.to_string();
                        error!(error = %message, "load failed");
                        let _ = self.events_tx.send(GatewayEvent::LoadFailed {
                            error: message.clone(),
                        });
                        self.dispatch(Control::LoadFailed(message).into());
                        self.schedule_retry();
                    }
                }
            }
            Completion::Save(result) => {
                self.save_in_flight = false;
                // A reload started meanwhile owns the status and replaces the state.
                let reloading = self.load_in_flight;
                match result {
                    Ok(record) => {
                        let _ = self.events_tx.send(GatewayEvent::Saved {
                            sequence: record.sequence,
                        });
                        if !reloading {
                            self.dispatch(Control::Updated.into());
                        }
                    }
                    Err(err) => {
                        let message = err.to_string();
                        warn!(error = %message, "save failed");
                        let _ = self.events_tx.send(GatewayEvent::SaveFailed {
                            error: message.clone(),
                        });
                        if !reloading {
                            self.dispatch(Control::UpdateFailed(message).into());
                        }
                    }
                }
                if std::mem::take(&mut self.save_queued) && !reloading {
                    self.dispatch(Control::Update.into());
                }
            }
            Completion::RetryLoad => {
                if !self.stopping() && self.admin.status() == SyncStatus::IsEmpty {
                    info!("retrying load");
                    self.dispatch(Control::Load.into());
                }
            }
        }
    }

    fn schedule_retry(&self) {
        if self.stopping() {
            return;
        }
        let Some(delay) = self.config.load_retry() else {
            return;
        };
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Completion::RetryLoad);
        });
    }

    fn stopping(&self) -> bool {
        self.shutdown.is_some() || self.handles_dropped
    }

    fn is_idle(&self) -> bool {
        !self.load_in_flight && !self.save_in_flight && !self.save_queued
    }

    fn notify_settled(&mut self) {
        if !self.is_idle() {
            return;
        }
        for waiter in self.settle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

async fn close_backend(
    persister: Arc<Mutex<StatePersister>>,
    budget: Duration,
) -> Result<(), GatewayError> {
    with_persister(persister, budget, StatePersister::close)
        .await
        .map_err(GatewayError::from)
}

/// Runs `f` against the persister on the blocking pool, bounded by `budget`.
///
/// The lock is awaited inside the budget, so calls queued behind a hung one
/// expire without occupying a blocking thread. Only the hung call itself keeps
/// its thread (and the lock) until the store returns.
async fn with_persister<T, F>(
    persister: Arc<Mutex<StatePersister>>,
    budget: Duration,
    f: F,
) -> PersistResult<T>
where
    F: FnOnce(&mut StatePersister) -> PersistResult<T> + Send + 'static,
    T: Send + 'static,
{
    let call = async move {
        let mut guard = persister.lock_owned().await;
        tokio::task::spawn_blocking(move || f(&mut *guard)).await
    };
    match tokio::time::timeout(budget, call).await {
        Ok(Ok(inner)) => inner,
        Ok(Err(join)) => Err(PersistError::Message(format!("join error: {join}"))),
        Err(_) => Err(PersistError::Timeout(budget)),
    }
}
