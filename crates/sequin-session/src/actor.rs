//! Async driver for one session.
//!
//! [`SessionActor`] owns the [`Session`] and its [`Playback`] on a tokio
//! task. Front ends talk to it through a cloneable [`SessionHandle`]:
//! commands go in over `mpsc`, replies come back over `oneshot`, and render
//! updates are broadcast as [`ViewEvent`]s.
//!
//! Engine work never runs on the actor task. A single attack is solved on a
//! blocking thread while the actor keeps serving commands and ticks; the
//! result is committed with the epoch check, so an undo or reset that lands
//! first turns it stale. Strategies, metrics, summaries and case loads are
//! also solved on blocking threads but awaited in place.

use std::path::PathBuf;

use sequin_core::BranchId;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SequinConfig;
use crate::engine::SolveContext;
use crate::error::{AttackError, Result, SolveStage};
use crate::events::{SessionEvent, ViewEvent};
use crate::history::AttackMode;
use crate::metrics::{self, DerivedMetric, Metric, MetricContext};
use crate::playback::Playback;
use crate::replay::ReplayState;
use crate::session::{AttackRecord, Session, SessionId, SolvedAttack};
use crate::strategy::{self, Strategy, StrategyOutcome};
use crate::summary::{self, StepSeries, SummaryContext, SummaryKind};

type Reply<T> = oneshot::Sender<T>;

/// Requests handled by the actor.
#[derive(Debug)]
pub enum Command {
    Attack {
        branch: BranchId,
        reply: Reply<std::result::Result<(), AttackError>>,
    },
    Undo {
        reply: Reply<Option<BranchId>>,
    },
    Reset {
        reply: Reply<Vec<BranchId>>,
    },
    RunStrategy {
        strategy: Strategy,
        reply: Reply<StrategyOutcome>,
    },
    Metric {
        metric: Metric,
        step: usize,
        mode: Option<AttackMode>,
        reply: Reply<Result<DerivedMetric>>,
    },
    Summarize {
        kind: SummaryKind,
        reply: Reply<Result<StepSeries>>,
    },
    SetMode {
        mode: AttackMode,
        reply: Reply<()>,
    },
    SetBudget {
        budget: usize,
        reply: Reply<std::result::Result<(), AttackError>>,
    },
    SetRampBound {
        ramp_bound: f64,
        reply: Reply<std::result::Result<(), AttackError>>,
    },
    Records {
        reply: Reply<Vec<AttackRecord>>,
    },
    Status {
        reply: Reply<SessionStatus>,
    },
    Play {
        reply: Reply<SessionStatus>,
    },
    Stop {
        reply: Reply<SessionStatus>,
    },
    Step {
        reply: Reply<SessionStatus>,
    },
    Back {
        reply: Reply<SessionStatus>,
    },
    Seek {
        cursor: usize,
        reply: Reply<SessionStatus>,
    },
    LoadCase {
        path: PathBuf,
        reply: Reply<Result<SessionId>>,
    },
    Shutdown,
}

/// Point-in-time view of the session and its playback.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub id: SessionId,
    pub case: String,
    pub sequence: Vec<BranchId>,
    pub budget: usize,
    pub mode: AttackMode,
    pub cursor: usize,
    pub playback: ReplayState,
}

impl SessionStatus {
    pub fn step_count(&self) -> usize {
        self.sequence.len()
    }
}

struct Solved {
    result: std::result::Result<SolvedAttack, AttackError>,
    reply: Reply<std::result::Result<(), AttackError>>,
}

fn join_failure(err: JoinError) -> AttackError {
    AttackError::Solver {
        stage: SolveStage::Task,
        source: anyhow::anyhow!("{err}"),
    }
}

/// Owns a session and serves commands until shut down.
pub struct SessionActor {
    session: Session,
    session_events: broadcast::Receiver<SessionEvent>,
    playback: Playback,
    config: SequinConfig,
    commands: mpsc::Receiver<Command>,
    solved_tx: mpsc::UnboundedSender<Solved>,
    solved_rx: mpsc::UnboundedReceiver<Solved>,
    views: broadcast::Sender<ViewEvent>,
    started: Instant,
}

impl SessionActor {
    fn new(
        session: Session,
        config: SequinConfig,
        commands: mpsc::Receiver<Command>,
        views: broadcast::Sender<ViewEvent>,
    ) -> Self {
        let (solved_tx, solved_rx) = mpsc::unbounded_channel();
        Self {
            session_events: session.subscribe(),
            playback: Playback::new(&config.playback),
            session,
            config,
            commands,
            solved_tx,
            solved_rx,
            views,
            started: Instant::now(),
        }
    }

    /// Serve commands, solver completions and timer ticks until shut down.
    pub async fn run(mut self) {
        info!(session = %self.session.id(), "session actor started");
        loop {
            let deadline = self.playback.next_deadline().map(|d| self.started + d);
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd).await,
                },
                Some(done) = self.solved_rx.recv() => self.finish_attack(done),
                _ = sleep_until(deadline), if deadline.is_some() => self.sync_clock(),
            }
            self.forward_session_events();
        }
        info!(session = %self.session.id(), "session actor stopped");
    }

    fn publish(&self, events: Vec<ViewEvent>) {
        for event in events {
            // Ignore send errors (no subscribers)
            let _ = self.views.send(event);
        }
    }

    fn forward_session_events(&mut self) {
        loop {
            match self.session_events.try_recv() {
                Ok(event) => {
                    let _ = self.views.send(ViewEvent::Session(event));
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "session events dropped");
                }
                Err(_) => break,
            }
        }
    }

    /// Bring the virtual playback clock up to real elapsed time.
    fn sync_clock(&mut self) {
        let events = self
            .playback
            .advance_to(self.started.elapsed(), self.session.sequence().as_slice());
        self.publish(events);
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            id: self.session.id(),
            case: self.session.network().name().to_string(),
            sequence: self.session.sequence().as_slice().to_vec(),
            budget: self.session.budget(),
            mode: self.session.mode(),
            cursor: self.playback.cursor(),
            playback: self.playback.state(),
        }
    }

    async fn handle(&mut self, cmd: Command) {
        self.sync_clock();
        match cmd {
            Command::Attack { branch, reply } => self.start_attack(branch, reply),
            Command::Undo { reply } => {
                let undone = self.session.undo();
                if let Some(branch) = undone {
                    let events = self
                        .playback
                        .on_undo(branch, self.session.sequence().as_slice());
                    self.publish(events);
                }
                let _ = reply.send(undone);
            }
            Command::Reset { reply } => {
                let removed = self.session.reset();
                let events = self.playback.on_reset(&removed);
                self.publish(events);
                let _ = reply.send(removed);
            }
            Command::RunStrategy { strategy, reply } => {
                let outcome = self.run_strategy(strategy).await;
                let _ = reply.send(outcome);
            }
            Command::Metric {
                metric,
                step,
                mode,
                reply,
            } => {
                let result = self.derive_metric(metric, step, mode).await;
                let _ = reply.send(result);
            }
            Command::Summarize { kind, reply } => {
                let result = self.summarize(kind).await;
                let _ = reply.send(result);
            }
            Command::SetMode { mode, reply } => {
                self.session.set_mode(mode);
                let _ = reply.send(());
            }
            Command::SetBudget { budget, reply } => {
                let _ = reply.send(self.session.set_budget(budget));
            }
            Command::SetRampBound { ramp_bound, reply } => {
                let _ = reply.send(self.session.set_ramp_bound(ramp_bound));
            }
            Command::Records { reply } => {
                let _ = reply.send(self.session.records());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Play { reply } => {
                let events = self.playback.run(self.session.sequence().as_slice());
                self.publish(events);
                let _ = reply.send(self.status());
            }
            Command::Stop { reply } => {
                let events = self.playback.stop();
                self.publish(events);
                let _ = reply.send(self.status());
            }
            Command::Step { reply } => {
                let events = self.playback.step(self.session.sequence().as_slice());
                self.publish(events);
                let _ = reply.send(self.status());
            }
            Command::Back { reply } => {
                let events = self.playback.back(self.session.sequence().as_slice());
                self.publish(events);
                let _ = reply.send(self.status());
            }
            Command::Seek { cursor, reply } => {
                let events = self
                    .playback
                    .seek(cursor, self.session.sequence().as_slice());
                self.publish(events);
                let _ = reply.send(self.status());
            }
            Command::LoadCase { path, reply } => {
                let result = self.load_case(path).await;
                let _ = reply.send(result);
            }
            Command::Shutdown => {}
        }
    }

    fn start_attack(&mut self, branch: BranchId, reply: Reply<std::result::Result<(), AttackError>>) {
        let pending = match self.session.prepare_push(branch) {
            Ok(pending) => pending,
            Err(err) => {
                warn!(%branch, error = %err, "attack rejected");
                let _ = reply.send(Err(err));
                return;
            }
        };
        let engine = self.session.engine().clone();
        let solved_tx = self.solved_tx.clone();
        debug!(%branch, "dispatching attack to blocking pool");
        tokio::task::spawn_blocking(move || {
            let result = pending.solve(engine.as_ref());
            let _ = solved_tx.send(Solved { result, reply });
        });
    }

    fn finish_attack(&mut self, done: Solved) {
        let result = done.result.and_then(|solved| self.session.commit_push(solved));
        match &result {
            Ok(()) => {
                let events = self.playback.on_attack(self.session.sequence().as_slice());
                self.publish(events);
            }
            Err(err) => warn!(error = %err, "attack not applied"),
        }
        let _ = done.reply.send(result);
    }

    /// Attack `branch` and wait for the result.
    async fn attack_now(&mut self, branch: BranchId) -> std::result::Result<(), AttackError> {
        let pending = self.session.prepare_push(branch)?;
        let engine = self.session.engine().clone();
        let solved = tokio::task::spawn_blocking(move || pending.solve(engine.as_ref()))
            .await
            .map_err(|e| join_failure(e))??;
        self.session.commit_push(solved)?;
        let events = self.playback.on_attack(self.session.sequence().as_slice());
        self.publish(events);
        Ok(())
    }

    async fn run_strategy(&mut self, strategy: Strategy) -> StrategyOutcome {
        info!(session = %self.session.id(), %strategy, "running strategy");
        let candidates = if strategy.uses_engine() {
            let engine = self.session.engine().clone();
            let network = self.session.network().clone();
            let args = self.session.args().clone();
            let current = self.session.sequence().as_slice().to_vec();
            tokio::task::spawn_blocking(move || {
                let ctx = SolveContext::new(&network, &args);
                strategy::request_candidates(engine.as_ref(), strategy, &ctx, &current)
            })
            .await
            .unwrap_or_else(|e| Err(join_failure(e)))
        } else {
            self.session.generate_candidates(strategy)
        };

        let candidates = match candidates {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(%strategy, error = %err, "strategy failed");
                return self
                    .session
                    .finish_strategy(strategy, Vec::new(), Vec::new(), Some(err));
            }
        };

        let mut applied = Vec::with_capacity(candidates.len());
        let mut failure = None;
        for branch in &candidates {
            match self.attack_now(*branch).await {
                Ok(()) => applied.push(*branch),
                Err(err) => {
                    warn!(%strategy, %branch, error = %err, "strategy attack failed");
                    failure = Some(err);
                    break;
                }
            }
        }
        self.session
            .finish_strategy(strategy, candidates, applied, failure)
    }

    async fn derive_metric(
        &mut self,
        metric: Metric,
        step: usize,
        mode: Option<AttackMode>,
    ) -> Result<DerivedMetric> {
        let mode = mode.unwrap_or_else(|| self.session.mode());
        let engine = self.session.engine().clone();
        let network = self.session.network().clone();
        let history = self.session.history(mode).clone();
        let sequence = self.session.sequence().as_slice().to_vec();
        let args = self.session.args().clone();
        tokio::task::spawn_blocking(move || {
            let ctx = MetricContext {
                engine: engine.as_ref(),
                network: &network,
                history: &history,
                sequence: &sequence,
                args: &args,
            };
            metrics::derive_metric(&ctx, metric, step)
        })
        .await?
    }

    async fn summarize(&mut self, kind: SummaryKind) -> Result<StepSeries> {
        let engine = self.session.engine().clone();
        let network = self.session.network().clone();
        let sequential = self.session.sequential().clone();
        let simultaneous = self.session.simultaneous().clone();
        let sequence = self.session.sequence().as_slice().to_vec();
        let args = self.session.args().clone();
        tokio::task::spawn_blocking(move || {
            let ctx = SummaryContext {
                engine: engine.as_ref(),
                network: &network,
                sequential: &sequential,
                simultaneous: &simultaneous,
                sequence: &sequence,
                args: &args,
            };
            summary::summarize(&ctx, kind)
        })
        .await?
    }

    async fn load_case(&mut self, path: PathBuf) -> Result<SessionId> {
        let engine = self.session.engine().clone();
        let attack = self.config.attack.clone();
        let opened = tokio::task::spawn_blocking(move || Session::open(engine, path, &attack))
            .await?;
        let session = match opened {
            Ok(session) => session,
            Err(err) => {
                error!(error = %err, "case load failed; keeping current session");
                return Err(err);
            }
        };

        // drain events of the old session before switching subscriptions
        self.forward_session_events();
        self.session_events = session.subscribe();
        let id = session.id();
        let stats = session.network().stats();
        self.session = session;
        let events = self.playback.on_case_loaded();
        self.publish(events);
        let _ = self.views.send(ViewEvent::Session(SessionEvent::CaseLoaded {
            session: id,
            path: self.session.source_path().map(|p| p.to_path_buf()),
            n_bus: stats.num_buses,
            n_branch: stats.num_branches,
        }));
        Ok(id)
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Cloneable front end of a running [`SessionActor`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    views: broadcast::Sender<ViewEvent>,
}

impl SessionHandle {
    /// Spawn an actor for `session` on the current runtime.
    pub fn spawn(session: Session, config: SequinConfig) -> (Self, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (views, _) = broadcast::channel(256);
        let actor = SessionActor::new(session, config, commands_rx, views.clone());
        let join = tokio::spawn(actor.run());
        (
            Self {
                commands: commands_tx,
                views,
            },
            join,
        )
    }

    /// Subscribe to render updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.views.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(make(tx)).await?;
        Ok(rx.await?)
    }

    pub async fn attack(&self, branch: BranchId) -> Result<()> {
        self.request(|reply| Command::Attack { branch, reply }).await??;
        Ok(())
    }

    pub async fn undo(&self) -> Result<Option<BranchId>> {
        self.request(|reply| Command::Undo { reply }).await
    }

    pub async fn reset(&self) -> Result<Vec<BranchId>> {
        self.request(|reply| Command::Reset { reply }).await
    }

    pub async fn run_strategy(&self, strategy: Strategy) -> Result<StrategyOutcome> {
        self.request(|reply| Command::RunStrategy { strategy, reply })
            .await
    }

    /// Derive a metric; `mode` defaults to the session's current mode.
    pub async fn metric(
        &self,
        metric: Metric,
        step: usize,
        mode: Option<AttackMode>,
    ) -> Result<DerivedMetric> {
        self.request(|reply| Command::Metric {
            metric,
            step,
            mode,
            reply,
        })
        .await?
    }

    pub async fn summarize(&self, kind: SummaryKind) -> Result<StepSeries> {
        self.request(|reply| Command::Summarize { kind, reply })
            .await?
    }

    pub async fn set_mode(&self, mode: AttackMode) -> Result<()> {
        self.request(|reply| Command::SetMode { mode, reply }).await
    }

    pub async fn set_budget(&self, budget: usize) -> Result<()> {
        self.request(|reply| Command::SetBudget { budget, reply })
            .await??;
        Ok(())
    }

    pub async fn set_ramp_bound(&self, ramp_bound: f64) -> Result<()> {
        self.request(|reply| Command::SetRampBound { ramp_bound, reply })
            .await??;
        Ok(())
    }

    pub async fn records(&self) -> Result<Vec<AttackRecord>> {
        self.request(|reply| Command::Records { reply }).await
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    pub async fn play(&self) -> Result<SessionStatus> {
        self.request(|reply| Command::Play { reply }).await
    }

    pub async fn stop(&self) -> Result<SessionStatus> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn step(&self) -> Result<SessionStatus> {
        self.request(|reply| Command::Step { reply }).await
    }

    pub async fn back(&self) -> Result<SessionStatus> {
        self.request(|reply| Command::Back { reply }).await
    }

    pub async fn seek(&self, cursor: usize) -> Result<SessionStatus> {
        self.request(|reply| Command::Seek { cursor, reply }).await
    }

    /// Replace the session with a freshly loaded case.
    pub async fn load_case(&self, path: impl Into<PathBuf>) -> Result<SessionId> {
        let path = path.into();
        self.request(|reply| Command::LoadCase { path, reply })
            .await?
    }

    /// Ask the actor to stop. Pending commands are dropped.
    pub async fn shutdown(&self) -> Result<()> {
        self.commands.send(Command::Shutdown).await?;
        Ok(())
    }
}
