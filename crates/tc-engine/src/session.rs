//! Synchronous session state machine.
//!
//! A `Session` owns every domain container for one canvas: thoughts, inputs,
//! the canvas projection and memory. It never performs I/O or sleeps.
//! Anything that has to happen later or elsewhere comes back as an
//! [`Effect`] for the caller (the async driver or the replay runner) to carry
//! out.
//!
//! Generation is coalesced: at most one request is in flight. A trigger that
//! fires meanwhile takes the single pending slot, replacing any earlier
//! pending trigger, and is dispatched with fresh context once the in-flight
//! request settles.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tc_core::{
    Bounds, CanvasSync, CoreError, CycleOutcome, Disposition, EntitySnapshot, InputSession,
    InputStore, Lifecycle, LifecycleConfig, Memory, MemoryItem, Point, Snapshot, SyncDiff,
    Thought, TriggerDetector, TriggerKind, VisualNode, export_json,
};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::service::GenerationRequest;

/// A fired trigger, before it becomes a request.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerEvent {
    pub input_id: Uuid,
    pub kind: TriggerKind,
    pub event_text: String,
    /// Click point; an inserted thought is placed here.
    pub anchor: Option<Point>,
}

/// Identifies a dispatched generation when its result comes back.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationJob {
    pub ticket: u64,
    /// Session epoch at dispatch; results from before a reset are dropped.
    pub epoch: u64,
    pub trigger: TriggerEvent,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Generate {
        job: GenerationJob,
        request: GenerationRequest,
    },
    /// Hard-remove this thought after the removal delay.
    ScheduleRemoval(Uuid),
}

/// Result of feeding a generation result back in.
#[derive(Debug, Default)]
pub struct Completion {
    pub cycle: Option<CycleOutcome>,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Default)]
struct GenerationGate {
    in_flight: Option<u64>,
    pending: Option<TriggerEvent>,
    next_ticket: u64,
}

impl GenerationGate {
    /// Start `trigger` now if nothing is in flight; otherwise park it,
    /// replacing any earlier parked trigger.
    fn submit(&mut self, trigger: TriggerEvent) -> Option<(u64, TriggerEvent)> {
        if self.in_flight.is_some() {
            if let Some(replaced) = self.pending.replace(trigger) {
                tracing::debug!(kind = replaced.kind.as_str(), "pending trigger replaced");
            }
            return None;
        }
        Some((self.start(), trigger))
    }

    fn start(&mut self) -> u64 {
        self.next_ticket += 1;
        self.in_flight = Some(self.next_ticket);
        self.next_ticket
    }

    /// Settle `ticket`. Returns the parked trigger to dispatch next, if any.
    fn settle(&mut self, ticket: u64) -> Option<(u64, TriggerEvent)> {
        if self.in_flight != Some(ticket) {
            return None;
        }
        self.in_flight = None;
        let next = self.pending.take()?;
        Some((self.start(), next))
    }

    /// The in-flight task died without reporting back.
    fn abort(&mut self) -> Option<(u64, TriggerEvent)> {
        let ticket = self.in_flight?;
        self.settle(ticket)
    }
}

#[derive(Debug)]
pub struct Session {
    lifecycle: Lifecycle,
    inputs: InputStore,
    detector: TriggerDetector,
    canvas: CanvasSync,
    memory: Memory,
    bounds: Bounds,
    rng: SmallRng,
    gate: GenerationGate,
    epoch: u64,
}

impl Session {
    pub fn new(config: LifecycleConfig, bounds: Bounds, seed: u64) -> tc_core::Result<Self> {
        let detector = TriggerDetector::new(config.trigger.clone());
        Ok(Self {
            lifecycle: Lifecycle::new(config)?,
            inputs: InputStore::new(),
            detector,
            canvas: CanvasSync::new(),
            memory: Memory::new(),
            bounds,
            rng: SmallRng::seed_from_u64(seed),
            gate: GenerationGate::default(),
            epoch: 0,
        })
    }

    /// Rebuild a session from a snapshot. The canvas is re-projected on the
    /// next `sync`.
    pub fn restore(
        config: LifecycleConfig,
        bounds: Bounds,
        seed: u64,
        snapshot: Snapshot,
    ) -> tc_core::Result<Self> {
        let (store, inputs, memory) = snapshot.into_parts();
        let mut session = Self::new(config.clone(), bounds, seed)?;
        session.lifecycle = Lifecycle::with_store(config, store)?;
        session.inputs = inputs;
        let keep = session.config().recent_memory_limit;
        session.memory = memory;
        session.memory.trim_short_term(keep);
        tracing::info!(
            thoughts = session.lifecycle.store().len(),
            inputs = session.inputs.len(),
            "session restored"
        );
        Ok(session)
    }

    pub fn config(&self) -> &LifecycleConfig {
        self.lifecycle.config()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn inputs(&self) -> &InputStore {
        &self.inputs
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn nodes(&self) -> &[VisualNode] {
        self.canvas.nodes()
    }

    pub fn is_generating(&self) -> bool {
        self.gate.in_flight.is_some()
    }

    pub fn has_pending_trigger(&self) -> bool {
        self.gate.pending.is_some()
    }

    pub fn export_json(&self) -> tc_core::Result<String> {
        export_json(self.lifecycle.store(), &self.inputs, &self.memory)
    }

    // --- inputs and triggers ---------------------------------------------

    pub fn open_input(&mut self, id: Uuid, position: Option<Point>, now: u64) {
        let mut input = InputSession::new(id, now);
        input.position = position;
        self.inputs.insert(input);
    }

    pub fn close_input(&mut self, id: Uuid) -> bool {
        self.inputs.remove(id).is_some()
    }

    /// A keystroke. Trigger evaluation happens later, after the debounce.
    pub fn record_input(&mut self, id: Uuid, text: &str, now: u64) -> tc_core::Result<()> {
        self.inputs.require_mut(id)?.record_input(text, now);
        Ok(())
    }

    /// Debounced check of one input: sentence-end, word-count, then idle.
    pub fn check_input(&mut self, id: Uuid, now: u64) -> Option<Effect> {
        let input = self.inputs.get(id)?;
        let kind = self.detector.evaluate(input, now)?;
        self.fire(id, kind, None)
    }

    /// Periodic idle check over every input.
    pub fn poll_idle(&mut self, now: u64) -> Vec<Effect> {
        let idle: Vec<Uuid> = self
            .inputs
            .iter()
            .filter(|s| self.detector.evaluate_idle(s, now).is_some())
            .map(|s| s.id)
            .collect();
        idle.into_iter()
            .filter_map(|id| self.fire(id, TriggerKind::IdleTime, None))
            .collect()
    }

    /// Explicit click on the canvas for `input`. Always fires.
    pub fn click(&mut self, input: Uuid, at: Point) -> tc_core::Result<Option<Effect>> {
        if self.inputs.get(input).is_none() {
            return Err(CoreError::UnknownInput(input));
        }
        Ok(self.fire(input, TriggerKind::Click, Some(at)))
    }

    fn fire(&mut self, input_id: Uuid, kind: TriggerKind, anchor: Option<Point>) -> Option<Effect> {
        let input = self.inputs.get_mut(input_id)?;
        let event_text = input.event_text();
        input.activate(kind);
        if event_text.is_empty() {
            tracing::debug!(%input_id, kind = kind.as_str(), "trigger with no text ignored");
            return None;
        }
        tracing::info!(%input_id, kind = kind.as_str(), "trigger fired");

        let trigger = TriggerEvent {
            input_id,
            kind,
            event_text,
            anchor,
        };
        match self.gate.submit(trigger) {
            Some((ticket, trigger)) => Some(self.dispatch(ticket, trigger)),
            None => {
                tracing::debug!("generation in flight, trigger coalesced");
                None
            }
        }
    }

    fn dispatch(&mut self, ticket: u64, trigger: TriggerEvent) -> Effect {
        let request = GenerationRequest {
            event_text: trigger.event_text.clone(),
            event_type: trigger.kind,
            thoughts: self.lifecycle.active_thoughts(),
            memory: self.memory.recent(self.config().recent_memory_limit),
        };
        tracing::debug!(ticket, kind = trigger.kind.as_str(), "generation dispatched");
        Effect::Generate {
            job: GenerationJob {
                ticket,
                epoch: self.epoch,
                trigger,
            },
            request,
        }
    }

    // --- generation results ----------------------------------------------

    /// Feed back the result of a dispatched job.
    pub fn generation_finished(
        &mut self,
        job: GenerationJob,
        result: Result<Thought, ServiceError>,
        now: u64,
    ) -> Completion {
        let mut completion = Completion::default();
        match result {
            Ok(candidate) if job.epoch == self.epoch => {
                let (cycle, effects) = self.absorb(&job.trigger, candidate, now);
                completion.cycle = Some(cycle);
                completion.effects = effects;
            }
            Ok(_) => tracing::debug!(ticket = job.ticket, "stale generation discarded"),
            Err(e) => tracing::warn!(
                kind = job.trigger.kind.as_str(),
                "thought generation failed: {e}"
            ),
        }
        if let Some((ticket, next)) = self.gate.settle(job.ticket) {
            completion.effects.push(self.dispatch(ticket, next));
        }
        completion
    }

    /// The generation task vanished (panicked or was aborted).
    pub fn generation_aborted(&mut self) -> Option<Effect> {
        tracing::warn!("generation task aborted");
        let (ticket, next) = self.gate.abort()?;
        Some(self.dispatch(ticket, next))
    }

    fn absorb(
        &mut self,
        trigger: &TriggerEvent,
        mut candidate: Thought,
        now: u64,
    ) -> (CycleOutcome, Vec<Effect>) {
        candidate.trigger = trigger.kind;
        candidate.created_at = now;
        candidate.updated_at = now;
        if trigger.anchor.is_some() {
            candidate.position = trigger.anchor;
        }

        let cycle = self.lifecycle.absorb(candidate, now);
        match cycle.disposition {
            Disposition::Merged { id, similarity, weight } => {
                tracing::info!(%id, similarity, weight, "candidate merged into existing thought");
            }
            Disposition::Inserted { id } => {
                tracing::info!(%id, "thought inserted");
            }
        }
        for id in &cycle.evicted {
            tracing::info!(%id, "thought evicted");
        }
        let effects = cycle
            .evicted
            .iter()
            .map(|id| Effect::ScheduleRemoval(*id))
            .collect();
        (cycle, effects)
    }

    // --- thought operations ----------------------------------------------

    pub fn like(&mut self, id: Uuid, now: u64) -> tc_core::Result<f64> {
        self.lifecycle.like(id, now)
    }

    pub fn dislike(&mut self, id: Uuid, now: u64) -> tc_core::Result<f64> {
        self.lifecycle.dislike(id, now)
    }

    pub fn pin(&mut self, id: Uuid, now: u64) -> tc_core::Result<()> {
        self.lifecycle.pin(id, now)
    }

    pub fn unpin(&mut self, id: Uuid, now: u64) -> tc_core::Result<()> {
        self.lifecycle.unpin(id, now)
    }

    pub fn react(&mut self, id: Uuid, reaction: &str, now: u64) -> tc_core::Result<f64> {
        self.lifecycle.react(id, reaction, now)
    }

    pub fn delete(&mut self, id: Uuid, now: u64) -> tc_core::Result<Option<Effect>> {
        let marked = self.lifecycle.delete(id, now)?;
        Ok(marked.then_some(Effect::ScheduleRemoval(id)))
    }

    /// Mark every thought for removal and drop any parked or in-flight
    /// generation.
    pub fn reset(&mut self, now: u64) -> Vec<Effect> {
        self.epoch += 1;
        self.gate.pending = None;
        let marked = self.lifecycle.reset(now);
        tracing::info!(count = marked.len(), "session reset");
        marked.into_iter().map(Effect::ScheduleRemoval).collect()
    }

    pub fn set_max_thought_count(&mut self, max: usize, now: u64) -> tc_core::Result<Vec<Effect>> {
        let evicted = self.lifecycle.set_max_thought_count(max, now)?;
        Ok(evicted.into_iter().map(Effect::ScheduleRemoval).collect())
    }

    /// Second phase of removal. False when the thought was not marked.
    pub fn finalize_removal(&mut self, id: Uuid) -> bool {
        let removed = self.lifecycle.finalize_removal(id).is_some();
        if removed {
            self.canvas.finish_removal(id);
            tracing::debug!(%id, "removal finalized");
        }
        removed
    }

    // --- memory ----------------------------------------------------------

    /// Short-term memory only keeps what a request can carry.
    pub fn add_memory(&mut self, item: MemoryItem) {
        let keep = self.config().recent_memory_limit;
        self.memory.push(item);
        self.memory.trim_short_term(keep);
    }

    /// Thoughts and memory to hand to the articulator.
    pub fn articulation_context(&self) -> (Vec<Thought>, Memory) {
        (
            self.lifecycle.active_thoughts(),
            self.memory.recent(self.config().recent_memory_limit),
        )
    }

    // --- canvas ----------------------------------------------------------

    /// A canvas drag. Returns whether the domain position changed.
    pub fn move_node(&mut self, entity_id: Uuid, to: Point) -> tc_core::Result<bool> {
        let Some(edit) = self.canvas.move_node(entity_id, to) else {
            return Ok(false);
        };
        self.write_position(edit.entity_id, edit.position)
    }

    fn write_position(&mut self, entity_id: Uuid, position: Point) -> tc_core::Result<bool> {
        if self.lifecycle.get(entity_id).is_some() {
            self.lifecycle.set_position(entity_id, position)
        } else {
            self.inputs.set_position(entity_id, position)
        }
    }

    /// Reconcile the canvas with the domain and write computed placements
    /// back.
    pub fn sync(&mut self) -> SyncDiff {
        let entities: Vec<EntitySnapshot> = self
            .lifecycle
            .thoughts()
            .map(EntitySnapshot::from)
            .chain(self.inputs.iter().map(EntitySnapshot::from))
            .collect();
        let layout = self.lifecycle.config().layout.clone();
        let diff = self
            .canvas
            .reconcile(&entities, &self.bounds, &layout, &mut self.rng);
        for edit in &diff.placements {
            if let Err(e) = self.write_position(edit.entity_id, edit.position) {
                tracing::warn!("placement write-back failed: {e}");
            }
        }
        diff
    }
}
