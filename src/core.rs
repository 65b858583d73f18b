//! Shared primitives used throughout the crate: the type-erased task output
//! container and the 128-bit content hash used for fingerprints and artifact
//! paths.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// A type-erased, thread-safe container for a task's return value.
pub type Dynamic = Arc<dyn Any + Send + Sync>;

/// A 128-bit BLAKE3-derived hash used as a task's [`Fingerprint`](crate::fingerprint::Fingerprint).
///
/// Only the low 16 bytes of the underlying BLAKE3 digest are kept: the spec
/// calls for a 128-bit identifier, which is plenty of collision resistance
/// for a per-project cache key while keeping hex-encoded paths short.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash128([u8; 16]);

impl Hash128 {
    pub(crate) fn from_hasher(hasher: blake3::Hasher) -> Self {
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest.as_bytes()[..16]);
        Hash128(bytes)
    }

    pub fn hash(buffer: impl AsRef<[u8]>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(buffer.as_ref());
        Self::from_hasher(hasher)
    }

    /// Renders the hash as a lowercase hex string, used verbatim as a path
    /// component on disk.
    pub fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = vec![0u8; 32];

        for (i, &byte) in self.0.iter().enumerate() {
            acc[i * 2] = HEX[(byte >> 4) as usize];
            acc[i * 2 + 1] = HEX[(byte & 0xF) as usize];
        }

        String::from_utf8(acc).expect("hex alphabet is always valid UTF-8")
    }
}

impl Debug for Hash128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash128({})", self.to_hex())
    }
}

impl std::fmt::Display for Hash128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Whether persisted artifacts are keyed by fingerprint (the default) or by
/// the owning config's name.
///
/// See spec §6 "Parameter-mode toggle". With parameter mode off, users must
/// avoid config renames and must not rely on contexts for persistence
/// correctness — the engine cannot enforce that, so it is documented here
/// rather than checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Artifact filenames are derived from the task's fingerprint.
    Fingerprint,
    /// Artifact filenames are derived from the owning config's name.
    ConfigName,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Fingerprint
    }
}
