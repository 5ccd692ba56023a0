//! Live session over stdio.
//!
//! Each stdin line is one JSON request. Every canvas change is written to
//! stdout as `{"frame": [...]}`; articulations as `{"articulation": ...}`;
//! malformed requests as `{"error": ...}`. The session ends on EOF or
//! Ctrl-C.
//!
//! Inputs are addressed by the label given at `open`. Inputs restored from a
//! snapshot are addressed by their id. Opening a label that is already in use
//! closes the input it pointed to.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tc_core::time::now_millis;
use tc_core::{MemoryKind, Point, import_json};
use tc_engine::{Driver, DriverHandle, EngineConfig, Session, UiEvent, build_service};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Request {
    Open {
        input: String,
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
    },
    Close { input: String },
    Input { input: String, text: String },
    Click { input: String, x: f64, y: f64 },
    Like { id: Uuid },
    Dislike { id: Uuid },
    Pin { id: Uuid },
    Unpin { id: Uuid },
    React { id: Uuid, reaction: String },
    Delete { id: Uuid },
    /// `id` is the entity id of a thought or input node.
    Drag { id: Uuid, x: f64, y: f64 },
    Remember { kind: MemoryKind, text: String },
    Articulate,
    Reset,
    SetMaxThoughts { max: usize },
}

pub async fn run(
    config: &EngineConfig,
    seed: u64,
    out: Option<&Path>,
    restore: Option<&Path>,
) -> Result<()> {
    let service = build_service(&config.service).context("failed to build generation service")?;
    let session = match restore {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let snapshot = import_json(&text).context("failed to parse snapshot")?;
            Session::restore(config.lifecycle.clone(), config.canvas.bounds(), seed, snapshot)?
        }
        None => Session::new(config.lifecycle.clone(), config.canvas.bounds(), seed)?,
    };
    let mut inputs: HashMap<String, Uuid> = session
        .inputs()
        .iter()
        .map(|input| (input.id.to_string(), input.id))
        .collect();
    let (handle, task) = Driver::spawn_session(session, service, now_millis());
    tracing::info!("serving canvas session on stdio");

    let mut frames = handle.frames();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(raw) = line.context("failed to read stdin")? else {
                    tracing::info!("stdin closed");
                    break;
                };
                let raw = raw.trim();
                if raw.is_empty() {
                    continue;
                }
                let reply = match serde_json::from_str::<Request>(raw) {
                    Ok(request) => dispatch(&handle, &mut inputs, request).await?,
                    Err(e) => Some(json!({ "error": format!("bad request: {e}") })),
                };
                if let Some(reply) = reply {
                    write_line(&mut stdout, &reply).await?;
                }
            }
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let nodes = frames.borrow_and_update().clone();
                write_line(&mut stdout, &json!({ "frame": nodes })).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    if let Some(path) = out {
        let snapshot = handle.export_json().await.context("failed to export session")?;
        std::fs::write(path, snapshot)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("snapshot written to {}", path.display());
    }
    handle.shutdown();
    task.await.context("event loop panicked")?;
    Ok(())
}

/// Forward one request. Returns a line to print, if any.
async fn dispatch(
    handle: &DriverHandle,
    inputs: &mut HashMap<String, Uuid>,
    request: Request,
) -> Result<Option<serde_json::Value>> {
    let event = match request {
        Request::Open { input, x, y } => {
            let id = Uuid::new_v4();
            if let Some(previous) = inputs.insert(input, id) {
                handle.send(UiEvent::CloseInput { id: previous }).await?;
            }
            UiEvent::OpenInput {
                id,
                position: x.zip(y).map(|(x, y)| Point::new(x, y)),
            }
        }
        Request::Close { input } => match inputs.remove(&input) {
            Some(id) => UiEvent::CloseInput { id },
            None => return Ok(Some(json!({ "error": format!("unknown input: {input}") }))),
        },
        Request::Input { input, text } => match lookup(inputs, &input) {
            Ok(id) => UiEvent::Input { id, text },
            Err(e) => return Ok(Some(e)),
        },
        Request::Click { input, x, y } => match lookup(inputs, &input) {
            Ok(id) => UiEvent::Click {
                input: id,
                at: Point::new(x, y),
            },
            Err(e) => return Ok(Some(e)),
        },
        Request::Like { id } => UiEvent::Like(id),
        Request::Dislike { id } => UiEvent::Dislike(id),
        Request::Pin { id } => UiEvent::Pin(id),
        Request::Unpin { id } => UiEvent::Unpin(id),
        Request::React { id, reaction } => UiEvent::React { id, reaction },
        Request::Delete { id } => UiEvent::Delete(id),
        Request::Drag { id, x, y } => UiEvent::Drag {
            entity: id,
            to: Point::new(x, y),
        },
        Request::Remember { kind, text } => UiEvent::Remember { kind, text },
        Request::Articulate => {
            let response = handle.articulate().await?;
            return Ok(Some(json!({ "articulation": response })));
        }
        Request::Reset => UiEvent::Reset,
        Request::SetMaxThoughts { max } => UiEvent::SetMaxThoughts(max),
    };
    handle.send(event).await?;
    Ok(None)
}

fn lookup(
    inputs: &HashMap<String, Uuid>,
    label: &str,
) -> std::result::Result<Uuid, serde_json::Value> {
    inputs
        .get(label)
        .copied()
        .ok_or_else(|| json!({ "error": format!("unknown input: {label}") }))
}

async fn write_line(stdout: &mut tokio::io::Stdout, value: &serde_json::Value) -> Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    stdout.flush().await?;
    Ok(())
}
