//! Core data model (spec.md §3): objects, stream chunks, object references
//! and resource requests. These types are shared by every layer of the
//! core, from the object store up to the wire protocol.

use serde::{Deserialize, Serialize};

/// Language tag carried by an [`Object`]/[`EncodedObject`], per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Unknown,
    Json,
    Go,
    Python,
}

impl Language {
    /// Key this language resolves to in a Component Service's image map
    /// (spec.md §4.3 `runtime_env`).
    pub fn runtime_env(&self) -> &'static str {
        match self {
            Language::Unknown => "unknown",
            Language::Json => "json",
            Language::Go => "go",
            Language::Python => "python",
        }
    }
}

/// An immutable, content-addressed payload (spec.md §3 "Object").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub id: String,
    pub language: Language,
    pub data: Vec<u8>,
}

/// Locates an object without inlining it: `{id, source_store_id}`
/// (spec.md §3, §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: String,
    pub source: String,
}

/// An inlined payload the client sends when the object has no source store
/// yet (spec.md GLOSSARY "Encoded Object").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedObject {
    pub id: String,
    pub language: Language,
    pub data: Vec<u8>,
}

impl From<EncodedObject> for Object {
    fn from(e: EncodedObject) -> Self {
        Object {
            id: e.id,
            language: e.language,
            data: e.data,
        }
    }
}

/// An ordered slice of an object's stream (spec.md §3 "Stream Chunk").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub object_id: String,
    pub offset: u64,
    pub data: Vec<u8>,
    pub terminal: bool,
}

/// Resource request/availability shape used by both `AppendPyFunc` and
/// `ComponentProvider::available` (spec.md §4.3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu: u64,
    pub memory: u64,
    pub gpu: u64,
}

impl Resources {
    /// Whether `self` (typically a provider's `Available()`) dominates
    /// `request` in every dimension, per spec.md §4.3 step 4.
    pub fn dominates(&self, request: &Resources) -> bool {
        self.cpu >= request.cpu && self.memory >= request.memory && self.gpu >= request.gpu
    }
}

/// Per-actor latency sample reported by a worker on completion
/// (spec.md §3 "Actor", §4.5 `Complete`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorInfo {
    pub calc_latency_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominates_requires_every_dimension() {
        let available = Resources {
            cpu: 1000,
            memory: 1 << 30,
            gpu: 0,
        };
        assert!(available.dominates(&Resources {
            cpu: 100,
            memory: 1 << 20,
            gpu: 0
        }));
        assert!(!available.dominates(&Resources {
            cpu: 100,
            memory: 1 << 20,
            gpu: 1
        }));
    }
}
