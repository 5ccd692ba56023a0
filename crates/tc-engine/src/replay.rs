//! Deterministic replay of a scripted canvas session.
//!
//! A script is a JSON list of timed UI events. Inputs are referred to by
//! label and thoughts by production index (the n-th thought inserted during
//! the run). The runner advances a virtual millisecond clock through script
//! events, keystroke debounces, idle polls and removal timers, and awaits
//! the generation service inline, so the same script, config and seed
//! always produce the same report.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tc_core::{Disposition, MemoryKind, Point, Thought, VisualNode};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::service::ThoughtService;
use crate::session::{Effect, Session};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub events: Vec<ScriptEvent>,
    /// Virtual time to keep running after the last event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_ms: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptEvent {
    pub at: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Open {
        input: String,
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
    },
    Close { input: String },
    Type { input: String, text: String },
    Click { input: String, x: f64, y: f64 },
    Like { thought: usize },
    Dislike { thought: usize },
    Pin { thought: usize },
    Unpin { thought: usize },
    React { thought: usize, reaction: String },
    Delete { thought: usize },
    Drag { thought: usize, x: f64, y: f64 },
    Remember { kind: MemoryKind, text: String },
    Articulate,
    Reset,
    SetMaxThoughts { max: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub at: u64,
    pub event: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub end_ms: u64,
    pub generations: usize,
    pub inserted: usize,
    pub merged: usize,
    pub evicted: usize,
    pub failed: usize,
    pub articulations: Vec<String>,
    pub timeline: Vec<TimelineEntry>,
    pub thoughts: Vec<Thought>,
    pub nodes: Vec<VisualNode>,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut script: Script =
            serde_json::from_str(json).map_err(|e| EngineError::Script(e.to_string()))?;
        script.events.sort_by_key(|e| e.at);
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    fn last_at(&self) -> u64 {
        self.events.last().map_or(0, |e| e.at)
    }
}

/// Replay `script` against a fresh session. Returns the report and the final
/// session.
pub async fn run_script(
    script: &Script,
    config: &EngineConfig,
    service: Arc<dyn ThoughtService>,
    seed: u64,
) -> Result<(ReplayReport, Session)> {
    let session = Session::new(config.lifecycle.clone(), config.canvas.bounds(), seed)?;
    let mut runner = Runner {
        session,
        service,
        now: 0,
        inputs: HashMap::new(),
        produced: Vec::new(),
        debounce: Vec::new(),
        removals: Vec::new(),
        report: ReplayReport::default(),
    };
    runner.run(script).await?;

    let Runner {
        mut session,
        mut report,
        ..
    } = runner;
    session.sync();
    report.thoughts = session.lifecycle().thoughts().cloned().collect();
    report.nodes = session.nodes().to_vec();
    tracing::info!(
        generations = report.generations,
        inserted = report.inserted,
        merged = report.merged,
        evicted = report.evicted,
        "replay finished"
    );
    Ok((report, session))
}

struct Runner {
    session: Session,
    service: Arc<dyn ThoughtService>,
    now: u64,
    inputs: HashMap<String, Uuid>,
    /// Inserted thought ids in production order.
    produced: Vec<Uuid>,
    /// (id, due) timers in arming order.
    debounce: Vec<(Uuid, u64)>,
    removals: Vec<(Uuid, u64)>,
    report: ReplayReport,
}

impl Runner {
    async fn run(&mut self, script: &Script) -> Result<()> {
        let trigger = self.session.config().trigger.clone();
        let idle_poll = trigger.idle_poll_ms.max(1);
        let settle = script.settle_ms.unwrap_or(
            trigger.debounce_ms
                + trigger.idle_threshold_ms
                + idle_poll
                + self.session.config().removal_delay_ms,
        );
        let until = script.last_at() + settle;
        let mut next_idle = 0;
        let mut cursor = 0;

        loop {
            let next = [
                script.events.get(cursor).map(|e| e.at),
                self.debounce.iter().map(|&(_, at)| at).min(),
                self.removals.iter().map(|&(_, at)| at).min(),
                Some(next_idle),
            ]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(until);
            if next > until {
                break;
            }
            self.now = next;

            while let Some(event) = script.events.get(cursor).filter(|e| e.at <= self.now) {
                self.apply_action(&event.action).await?;
                cursor += 1;
            }

            let due: Vec<Uuid> = take_due(&mut self.debounce, self.now);
            for id in due {
                let effects = self.session.check_input(id, self.now).into_iter().collect();
                self.run_effects(effects).await;
            }

            for id in take_due(&mut self.removals, self.now) {
                if self.session.finalize_removal(id) {
                    self.log(format!("removed {}", self.label(id)));
                }
            }

            if next_idle <= self.now {
                let effects = self.session.poll_idle(self.now);
                self.run_effects(effects).await;
                next_idle = self.now + idle_poll;
            }

            self.session.sync();
        }
        self.report.end_ms = self.now;
        Ok(())
    }

    async fn apply_action(&mut self, action: &Action) -> Result<()> {
        let now = self.now;
        let outcome: tc_core::Result<Vec<Effect>> = match action {
            Action::Open { input, x, y } => {
                let id = Uuid::new_v4();
                let position = (*x).zip(*y).map(|(x, y)| Point::new(x, y));
                self.session.open_input(id, position, now);
                self.inputs.insert(input.clone(), id);
                self.log(format!("opened input {input}"));
                Ok(Vec::new())
            }
            Action::Close { input } => {
                let id = self.input(input)?;
                self.debounce.retain(|&(d, _)| d != id);
                self.session.close_input(id);
                self.inputs.remove(input);
                Ok(Vec::new())
            }
            Action::Type { input, text } => {
                let id = self.input(input)?;
                let due = now + self.session.config().trigger.debounce_ms;
                self.debounce.retain(|&(d, _)| d != id);
                self.debounce.push((id, due));
                self.session.record_input(id, text, now).map(|()| Vec::new())
            }
            Action::Click { input, x, y } => {
                let id = self.input(input)?;
                self.session
                    .click(id, Point::new(*x, *y))
                    .map(|e| e.into_iter().collect())
            }
            Action::Like { thought } => {
                let id = self.thought(*thought)?;
                self.session.like(id, now).map(|_| Vec::new())
            }
            Action::Dislike { thought } => {
                let id = self.thought(*thought)?;
                self.session.dislike(id, now).map(|_| Vec::new())
            }
            Action::Pin { thought } => {
                let id = self.thought(*thought)?;
                self.session.pin(id, now).map(|()| Vec::new())
            }
            Action::Unpin { thought } => {
                let id = self.thought(*thought)?;
                self.session.unpin(id, now).map(|()| Vec::new())
            }
            Action::React { thought, reaction } => {
                let id = self.thought(*thought)?;
                self.session.react(id, reaction, now).map(|_| Vec::new())
            }
            Action::Delete { thought } => {
                let id = self.thought(*thought)?;
                self.session.delete(id, now).map(|e| e.into_iter().collect())
            }
            Action::Drag { thought, x, y } => {
                let id = self.thought(*thought)?;
                self.session.sync();
                self.session.move_node(id, Point::new(*x, *y)).map(|_| Vec::new())
            }
            Action::Remember { kind, text } => {
                match self.service.create_memory(*kind, text).await {
                    Ok(item) => self.session.add_memory(item),
                    Err(e) => tracing::warn!("memory creation failed: {e}"),
                }
                Ok(Vec::new())
            }
            Action::Articulate => {
                let (thoughts, memory) = self.session.articulation_context();
                match self.service.articulate_thoughts(&thoughts, &memory).await {
                    Ok(a) => self.report.articulations.push(a.response),
                    Err(e) => tracing::warn!("articulation failed: {e}"),
                }
                Ok(Vec::new())
            }
            Action::Reset => {
                self.debounce.clear();
                self.log("reset".to_string());
                Ok(self.session.reset(now))
            }
            Action::SetMaxThoughts { max } => self.session.set_max_thought_count(*max, now),
        };
        match outcome {
            Ok(effects) => self.run_effects(effects).await,
            Err(e) => self.log(format!("rejected: {e}")),
        }
        Ok(())
    }

    /// Carry out effects until none are left. Generations resolve at the
    /// current virtual time.
    async fn run_effects(&mut self, effects: Vec<Effect>) {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::ScheduleRemoval(id) => {
                    let due = self.now + self.session.config().removal_delay_ms;
                    if self.removals.iter().all(|&(r, _)| r != id) {
                        self.removals.push((id, due));
                    }
                }
                Effect::Generate { job, request } => {
                    self.report.generations += 1;
                    let kind = job.trigger.kind;
                    let result = self.service.generate_thought(request).await;
                    if result.is_err() {
                        self.report.failed += 1;
                    }
                    let completion = self.session.generation_finished(job, result, self.now);
                    if let Some(cycle) = &completion.cycle {
                        match cycle.disposition {
                            Disposition::Inserted { id } => {
                                self.produced.push(id);
                                self.report.inserted += 1;
                                self.log(format!("{} inserted {}", kind.as_str(), self.label(id)));
                            }
                            Disposition::Merged { id, .. } => {
                                self.report.merged += 1;
                                let label = self.label(id);
                                self.log(format!("{} merged into {label}", kind.as_str()));
                            }
                        }
                        self.report.evicted += cycle.evicted.len();
                    }
                    queue.extend(completion.effects);
                }
            }
        }
    }

    fn input(&self, label: &str) -> Result<Uuid> {
        self.inputs
            .get(label)
            .copied()
            .ok_or_else(|| EngineError::Script(format!("unknown input label: {label}")))
    }

    fn thought(&self, index: usize) -> Result<Uuid> {
        self.produced.get(index).copied().ok_or_else(|| {
            EngineError::Script(format!(
                "thought #{index} referenced at {}ms but only {} produced",
                self.now,
                self.produced.len()
            ))
        })
    }

    fn label(&self, id: Uuid) -> String {
        match self.produced.iter().position(|p| *p == id) {
            Some(i) => format!("thought #{i}"),
            None => id.to_string(),
        }
    }

    fn log(&mut self, event: String) {
        tracing::debug!(at = self.now, "{event}");
        self.report.timeline.push(TimelineEntry { at: self.now, event });
    }
}

fn take_due(timers: &mut Vec<(Uuid, u64)>, now: u64) -> Vec<Uuid> {
    let mut due = Vec::new();
    timers.retain(|&(id, at)| {
        if at <= now {
            due.push(id);
            return false;
        }
        true
    });
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalThoughtService;

    async fn replay(json: &str) -> (ReplayReport, Session) {
        let script = Script::from_json(json).unwrap();
        run_script(
            &script,
            &EngineConfig::default(),
            Arc::new(LocalThoughtService::new()),
            42,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_sentence_then_like() {
        let (report, session) = replay(
            r#"{"events": [
                {"at": 0, "type": "open", "input": "main"},
                {"at": 10, "type": "type", "input": "main", "text": "Boats drift past the harbour wall."},
                {"at": 2000, "type": "like", "thought": 0}
            ]}"#,
        )
        .await;
        assert_eq!(report.inserted, 1);
        assert_eq!(report.generations, 1);
        assert_eq!(report.thoughts.len(), 1);
        // Input node plus one thought node.
        assert_eq!(report.nodes.len(), 2);
        let weight = session.lifecycle().thoughts().next().unwrap().score.weight;
        assert!(weight > 0.5);
    }

    #[tokio::test]
    async fn test_repeated_text_merges() {
        let (report, _) = replay(
            r#"{"events": [
                {"at": 0, "type": "open", "input": "a"},
                {"at": 0, "type": "open", "input": "b"},
                {"at": 10, "type": "type", "input": "a", "text": "Gulls circle over the old pier."},
                {"at": 20, "type": "type", "input": "b", "text": "Gulls circle over the old pier."}
            ]}"#,
        )
        .await;
        assert_eq!(report.generations, 2);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.merged, 1);
    }

    #[tokio::test]
    async fn test_delete_finalizes_after_delay() {
        let (report, session) = replay(
            r#"{"events": [
                {"at": 0, "type": "open", "input": "main", "x": 40.0, "y": 40.0},
                {"at": 0, "type": "type", "input": "main", "text": "Lanterns along the quay."},
                {"at": 1000, "type": "delete", "thought": 0}
            ]}"#,
        )
        .await;
        assert!(session.lifecycle().store().is_empty());
        assert!(report.timeline.iter().any(|e| e.event == "removed thought #0" && e.at == 2000));
        assert_eq!(report.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_idle_trigger_in_virtual_time() {
        let (report, _) = replay(
            r#"{"events": [
                {"at": 0, "type": "open", "input": "main"},
                {"at": 0, "type": "type", "input": "main", "text": "unfinished idea"}
            ], "settleMs": 5000}"#,
        )
        .await;
        assert_eq!(report.inserted, 1);
        assert!(report.timeline.iter().any(|e| e.event.starts_with("IDLE_TIME inserted")));
    }

    #[tokio::test]
    async fn test_unknown_thought_reference() {
        let script = Script::from_json(
            r#"{"events": [{"at": 0, "type": "like", "thought": 3}]}"#,
        )
        .unwrap();
        let err = run_script(
            &script,
            &EngineConfig::default(),
            Arc::new(LocalThoughtService::new()),
            42,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Script(_)));
    }

    #[test]
    fn test_bad_script() {
        assert!(matches!(
            Script::from_json(r#"{"events": [{"at": 0, "type": "dance"}]}"#),
            Err(EngineError::Script(_))
        ));
    }

    #[tokio::test]
    async fn test_same_seed_same_layout() {
        let json = r#"{"events": [
            {"at": 0, "type": "open", "input": "main"},
            {"at": 0, "type": "type", "input": "main", "text": "First thought goes here."},
            {"at": 500, "type": "type", "input": "main", "text": "First thought goes here. Then another one arrives."}
        ]}"#;
        let (a, _) = replay(json).await;
        let (b, _) = replay(json).await;
        let positions =
            |r: &ReplayReport| -> Vec<Point> { r.nodes.iter().map(|n| n.position).collect() };
        assert_eq!(positions(&a), positions(&b));
    }
}
