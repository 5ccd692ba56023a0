//! Offline generator.
//!
//! Produces templated thoughts with a hashed bag-of-words embedding, so
//! similar event texts yield similar embeddings and dedup behaves the way it
//! would against a real backend. Fully deterministic.

use async_trait::async_trait;
use tc_core::time::now_millis;
use tc_core::{Interactivity, Memory, MemoryItem, MemoryKind, Thought, TriggerKind, word_count};

use crate::error::ServiceError;
use crate::service::{Articulation, GenerationRequest, ThoughtService};

const EMBEDDING_DIM: usize = 64;
const MAX_EXCERPT_CHARS: usize = 60;
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Default)]
pub struct LocalThoughtService;

impl LocalThoughtService {
    pub fn new() -> Self {
        Self
    }
}

/// 64-bit FNV-1a. Stable across builds and platforms.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |h, &b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

/// Lowercase alphanumeric tokens hashed into a fixed-size, L2-normalized
/// vector. `None` when the text has no tokens.
pub fn hashed_embedding(text: &str) -> Option<Vec<f64>> {
    let mut v = vec![0.0; EMBEDDING_DIM];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let h = fnv1a(token.to_lowercase().as_bytes());
        v[(h % EMBEDDING_DIM as u64) as usize] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm == 0.0 {
        return None;
    }
    Some(v.into_iter().map(|x| x / norm).collect())
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}

fn template(kind: TriggerKind, text: &str) -> String {
    let e = excerpt(text);
    match kind {
        TriggerKind::Click => format!("Looking closer at \"{e}\""),
        TriggerKind::IdleTime => format!("Still turning over \"{e}\""),
        TriggerKind::WordCountChange => format!("Picking up on \"{e}\""),
        TriggerKind::SentenceEnd => format!("Following \"{e}\" to its next step"),
    }
}

#[async_trait]
impl ThoughtService for LocalThoughtService {
    async fn generate_thought(&self, request: GenerationRequest) -> Result<Thought, ServiceError> {
        if request.event_text.trim().is_empty() {
            return Err(ServiceError::Invalid("nothing to think about".to_string()));
        }
        // Longer events seed heavier thoughts.
        let words = word_count(&request.event_text).min(10) as f64;
        let mut builder = Thought::builder(&template(request.event_type, &request.event_text))
            .trigger(request.event_type)
            .weight(0.4 + 0.03 * words)
            .interactivity(Interactivity::Comment)
            .created_at(now_millis());
        if let Some(embedding) = hashed_embedding(&request.event_text) {
            builder = builder.embedding(embedding);
        }
        Ok(builder.build())
    }

    async fn articulate_thoughts(
        &self,
        thoughts: &[Thought],
        _memory: &Memory,
    ) -> Result<Articulation, ServiceError> {
        let mut ranked: Vec<&Thought> = thoughts.iter().collect();
        ranked.sort_by(|a, b| b.score.priority().total_cmp(&a.score.priority()));
        let response = if ranked.is_empty() {
            "Nothing on my mind yet.".to_string()
        } else {
            let parts: Vec<&str> = ranked.iter().map(|t| t.text()).collect();
            format!("Putting it together: {}.", parts.join("; "))
        };
        Ok(Articulation { response })
    }

    async fn create_memory(
        &self,
        kind: MemoryKind,
        text: &str,
    ) -> Result<MemoryItem, ServiceError> {
        let mut item = MemoryItem::new(kind, text, now_millis());
        item.embedding = hashed_embedding(text);
        Ok(item)
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_core::cosine_similarity;

    fn request(text: &str) -> GenerationRequest {
        GenerationRequest {
            event_text: text.to_string(),
            event_type: TriggerKind::SentenceEnd,
            thoughts: Vec::new(),
            memory: Memory::new(),
        }
    }

    #[test]
    fn test_embedding_is_deterministic_and_normalized() {
        let a = hashed_embedding("Boats at dusk").unwrap();
        let b = hashed_embedding("boats AT dusk!").unwrap();
        assert_eq!(a, b);
        let norm: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        assert!(hashed_embedding("  ... ").is_none());
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), FNV_OFFSET);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn test_similar_text_similar_embedding() {
        let a = hashed_embedding("gulls over the harbour pier");
        let b = hashed_embedding("gulls over the harbour");
        let c = hashed_embedding("quarterly tax filing deadline");
        let close = cosine_similarity(a.as_deref(), b.as_deref());
        let far = cosine_similarity(a.as_deref(), c.as_deref());
        assert!(close > 0.7, "{close}");
        assert!(far < close);
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "word ".repeat(40);
        let e = excerpt(&long);
        assert!(e.ends_with('…'));
        assert!(e.chars().count() <= MAX_EXCERPT_CHARS + 1);
    }

    #[tokio::test]
    async fn test_generate() {
        let service = LocalThoughtService::new();
        let t = service
            .generate_thought(request("The harbour is quiet tonight."))
            .await
            .unwrap();
        assert!(t.text().contains("The harbour is quiet tonight."));
        assert_eq!(t.trigger, TriggerKind::SentenceEnd);
        assert!(t.embedding().is_some());
        assert!((0.0..=1.0).contains(&t.score.weight));
    }

    #[tokio::test]
    async fn test_generate_rejects_blank() {
        let service = LocalThoughtService::new();
        assert!(service.generate_thought(request("  ")).await.is_err());
    }

    #[tokio::test]
    async fn test_articulate_orders_by_priority() {
        let service = LocalThoughtService::new();
        let thoughts = vec![
            Thought::builder("minor").weight(0.2).build(),
            Thought::builder("major").weight(0.9).build(),
        ];
        let reply = service
            .articulate_thoughts(&thoughts, &Memory::new())
            .await
            .unwrap();
        assert_eq!(reply.response, "Putting it together: major; minor.");
    }
}
