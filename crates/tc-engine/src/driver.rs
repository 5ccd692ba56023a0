//! Async event loop around a [`Session`].
//!
//! One task owns the session. UI events arrive on a bounded channel;
//! keystrokes are debounced per input; an interval polls for idle inputs;
//! removal timers and generation tasks report back into the same loop.
//! After every step the canvas is reconciled and the node list published on
//! a watch channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tc_core::{MemoryItem, MemoryKind, Point, Thought, VisualNode};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;
use tokio_util::time::delay_queue;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result, ServiceError};
use crate::scheduler::RemovalScheduler;
use crate::service::ThoughtService;
use crate::session::{Effect, GenerationJob, Session};

const EVENT_BUFFER: usize = 64;

#[derive(Debug)]
pub enum UiEvent {
    OpenInput { id: Uuid, position: Option<Point> },
    CloseInput { id: Uuid },
    Input { id: Uuid, text: String },
    Click { input: Uuid, at: Point },
    Like(Uuid),
    Dislike(Uuid),
    Pin(Uuid),
    Unpin(Uuid),
    React { id: Uuid, reaction: String },
    Delete(Uuid),
    Drag { entity: Uuid, to: Point },
    Remember { kind: MemoryKind, text: String },
    Articulate { reply: oneshot::Sender<Option<String>> },
    Export { reply: oneshot::Sender<tc_core::Result<String>> },
    Reset,
    SetMaxThoughts(usize),
}

/// Client side of a running driver.
#[derive(Clone)]
pub struct DriverHandle {
    events: mpsc::Sender<UiEvent>,
    frames: watch::Receiver<Vec<VisualNode>>,
    shutdown: CancellationToken,
}

impl DriverHandle {
    pub async fn send(&self, event: UiEvent) -> Result<()> {
        self.events.send(event).await.map_err(|_| EngineError::Closed)
    }

    pub fn frames(&self) -> watch::Receiver<Vec<VisualNode>> {
        self.frames.clone()
    }

    /// Latest published canvas.
    pub fn nodes(&self) -> Vec<VisualNode> {
        self.frames.borrow().clone()
    }

    pub async fn articulate(&self) -> Result<Option<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(UiEvent::Articulate { reply }).await?;
        rx.await.map_err(|_| EngineError::Closed)
    }

    pub async fn export_json(&self) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.send(UiEvent::Export { reply }).await?;
        Ok(rx.await.map_err(|_| EngineError::Closed)??)
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Unix milliseconds derived from the tokio clock, so paused-time tests
/// see virtual time.
#[derive(Clone, Copy, Debug)]
struct Clock {
    base_ms: u64,
    start: Instant,
}

impl Clock {
    fn new(base_ms: u64) -> Self {
        Self {
            base_ms,
            start: Instant::now(),
        }
    }

    fn now(&self) -> u64 {
        self.base_ms + self.start.elapsed().as_millis() as u64
    }
}

type Generated = (GenerationJob, std::result::Result<Thought, ServiceError>);

pub struct Driver {
    session: Session,
    service: Arc<dyn ThoughtService>,
    clock: Clock,
    debounce_delay: Duration,
    idle_poll: Duration,
    debounce: DelayQueue<Uuid>,
    debounce_keys: HashMap<Uuid, delay_queue::Key>,
    scheduler: RemovalScheduler,
    due: mpsc::UnboundedReceiver<Uuid>,
    generations: JoinSet<Generated>,
    memories: JoinSet<std::result::Result<MemoryItem, ServiceError>>,
    frames: watch::Sender<Vec<VisualNode>>,
    shutdown: CancellationToken,
}

impl Driver {
    pub fn new(
        session: Session,
        service: Arc<dyn ThoughtService>,
        base_ms: u64,
        shutdown: CancellationToken,
    ) -> (Self, watch::Receiver<Vec<VisualNode>>) {
        let trigger = &session.config().trigger;
        let debounce_delay = Duration::from_millis(trigger.debounce_ms);
        let idle_poll = Duration::from_millis(trigger.idle_poll_ms.max(1));
        let removal_delay = Duration::from_millis(session.config().removal_delay_ms);
        let (scheduler, due) = RemovalScheduler::new(removal_delay, shutdown.child_token());
        let (frames, frames_rx) = watch::channel(session.nodes().to_vec());
        let driver = Self {
            session,
            service,
            clock: Clock::new(base_ms),
            debounce_delay,
            idle_poll,
            debounce: DelayQueue::new(),
            debounce_keys: HashMap::new(),
            scheduler,
            due,
            generations: JoinSet::new(),
            memories: JoinSet::new(),
            frames,
            shutdown,
        };
        (driver, frames_rx)
    }

    /// Build a session from `config` and run it on a new task. The task
    /// returns the session once shut down.
    pub fn spawn(
        config: &EngineConfig,
        service: Arc<dyn ThoughtService>,
        base_ms: u64,
        seed: u64,
    ) -> Result<(DriverHandle, JoinHandle<Session>)> {
        let session = Session::new(config.lifecycle.clone(), config.canvas.bounds(), seed)?;
        Ok(Self::spawn_session(session, service, base_ms))
    }

    pub fn spawn_session(
        session: Session,
        service: Arc<dyn ThoughtService>,
        base_ms: u64,
    ) -> (DriverHandle, JoinHandle<Session>) {
        let shutdown = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (driver, frames) = Self::new(session, service, base_ms, shutdown.clone());
        let task = tokio::spawn(driver.run(events_rx));
        let handle = DriverHandle {
            events: events_tx,
            frames,
            shutdown,
        };
        (handle, task)
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<UiEvent>) -> Session {
        tracing::info!(service = self.service.name(), "event loop started");
        let mut idle = tokio::time::interval(self.idle_poll);
        idle.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.publish();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                Some(expired) = self.debounce.next(), if !self.debounce.is_empty() => {
                    let id = expired.into_inner();
                    self.debounce_keys.remove(&id);
                    let now = self.clock.now();
                    if let Some(effect) = self.session.check_input(id, now) {
                        self.apply(vec![effect]);
                    }
                }
                _ = idle.tick() => {
                    let effects = self.session.poll_idle(self.clock.now());
                    self.apply(effects);
                }
                Some(id) = self.due.recv() => {
                    if self.scheduler.complete(id) {
                        self.session.finalize_removal(id);
                    }
                }
                Some(joined) = self.generations.join_next(), if !self.generations.is_empty() => {
                    let effects = match joined {
                        Ok((job, result)) => {
                            self.session.generation_finished(job, result, self.clock.now()).effects
                        }
                        Err(e) => {
                            tracing::warn!("generation task failed: {e}");
                            self.session.generation_aborted().into_iter().collect()
                        }
                    };
                    self.apply(effects);
                }
                Some(joined) = self.memories.join_next(), if !self.memories.is_empty() => {
                    match joined {
                        Ok(Ok(item)) => self.session.add_memory(item),
                        Ok(Err(e)) => tracing::warn!("memory creation failed: {e}"),
                        Err(e) => tracing::warn!("memory task failed: {e}"),
                    }
                }
            }
            self.publish();
        }

        self.scheduler.cancel_all();
        self.generations.abort_all();
        self.memories.abort_all();
        tracing::info!("event loop stopped");
        self.session
    }

    fn handle_event(&mut self, event: UiEvent) {
        let now = self.clock.now();
        let result: tc_core::Result<Vec<Effect>> = match event {
            UiEvent::OpenInput { id, position } => {
                self.session.open_input(id, position, now);
                Ok(Vec::new())
            }
            UiEvent::CloseInput { id } => {
                if let Some(key) = self.debounce_keys.remove(&id) {
                    self.debounce.remove(&key);
                }
                self.session.close_input(id);
                Ok(Vec::new())
            }
            UiEvent::Input { id, text } => self.session.record_input(id, &text, now).map(|()| {
                self.debounce_input(id);
                Vec::new()
            }),
            UiEvent::Click { input, at } => {
                self.session.click(input, at).map(|e| e.into_iter().collect())
            }
            UiEvent::Like(id) => self.session.like(id, now).map(|_| Vec::new()),
            UiEvent::Dislike(id) => self.session.dislike(id, now).map(|_| Vec::new()),
            UiEvent::Pin(id) => self.session.pin(id, now).map(|()| Vec::new()),
            UiEvent::Unpin(id) => self.session.unpin(id, now).map(|()| Vec::new()),
            UiEvent::React { id, reaction } => {
                self.session.react(id, &reaction, now).map(|_| Vec::new())
            }
            UiEvent::Delete(id) => self.session.delete(id, now).map(|e| e.into_iter().collect()),
            UiEvent::Drag { entity, to } => self.session.move_node(entity, to).map(|_| Vec::new()),
            UiEvent::Remember { kind, text } => {
                let service = Arc::clone(&self.service);
                self.memories
                    .spawn(async move { service.create_memory(kind, &text).await });
                Ok(Vec::new())
            }
            UiEvent::Articulate { reply } => {
                let (thoughts, memory) = self.session.articulation_context();
                let service = Arc::clone(&self.service);
                tokio::spawn(async move {
                    let response = match service.articulate_thoughts(&thoughts, &memory).await {
                        Ok(a) => Some(a.response),
                        Err(e) => {
                            tracing::warn!("articulation failed: {e}");
                            None
                        }
                    };
                    let _ = reply.send(response);
                });
                Ok(Vec::new())
            }
            UiEvent::Export { reply } => {
                let _ = reply.send(self.session.export_json());
                Ok(Vec::new())
            }
            UiEvent::Reset => Ok(self.session.reset(now)),
            UiEvent::SetMaxThoughts(max) => self.session.set_max_thought_count(max, now),
        };
        match result {
            Ok(effects) => self.apply(effects),
            Err(e) => tracing::warn!("event rejected: {e}"),
        }
    }

    fn debounce_input(&mut self, id: Uuid) {
        match self.debounce_keys.get(&id) {
            Some(key) => self.debounce.reset(key, self.debounce_delay),
            None => {
                let key = self.debounce.insert(id, self.debounce_delay);
                self.debounce_keys.insert(id, key);
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Generate { job, request } => {
                    let service = Arc::clone(&self.service);
                    self.generations.spawn(async move {
                        let result = service.generate_thought(request).await;
                        (job, result)
                    });
                }
                Effect::ScheduleRemoval(id) => {
                    self.scheduler.schedule(id);
                }
            }
        }
    }

    fn publish(&mut self) {
        let diff = self.session.sync();
        if !diff.is_empty() {
            tracing::debug!(
                created = diff.created.len(),
                updated = diff.updated.len(),
                deleted = diff.deleted.len(),
                "canvas reconciled"
            );
        }
        let nodes = self.session.nodes();
        self.frames.send_if_modified(|current| {
            if current.as_slice() == nodes {
                return false;
            }
            *current = nodes.to_vec();
            true
        });
    }
}
