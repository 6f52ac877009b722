//! Persistent point emitters of water and lava.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard cap on simultaneously registered sources.
pub const MAX_SOURCES: usize = 128;

#[derive(Debug, Error, PartialEq)]
pub enum SourceError {
    #[error("Source limit of {max} reached; source {0} rejected", max = MAX_SOURCES)]
    CapacityReached(u32),
    #[error("Source {id} has a non-finite position ({x}, {z})")]
    InvalidPosition { id: u32, x: f32, z: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Water,
    Lava,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Source {
    pub id: u32,
    pub kind: SourceKind,
    /// Normalized grid position, `[0, 1]` on both axes.
    pub position: Vec2,
    /// Emitted volume (m^3/s).
    pub rate: f32,
}

/// Registered sources in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source, or updates it in place when `id` is already known.
    ///
    /// Positions are clamped into the unit square and negative rates to 0.
    pub fn upsert(&mut self, id: u32, kind: SourceKind, x: f32, z: f32, rate: f32) -> Result<(), SourceError> {
        if !x.is_finite() || !z.is_finite() {
            return Err(SourceError::InvalidPosition { id, x, z });
        }
        let source = Source {
            id,
            kind,
            position: Vec2::new(x, z).clamp(Vec2::ZERO, Vec2::ONE),
            rate: if rate.is_finite() { rate.max(0.0) } else { 0.0 },
        };

        if let Some(existing) = self.sources.iter_mut().find(|s| s.id == id) {
            *existing = source;
            return Ok(());
        }
        if self.sources.len() >= MAX_SOURCES {
            return Err(SourceError::CapacityReached(id));
        }
        self.sources.push(source);
        Ok(())
    }

    /// Removes a source. Returns whether it existed.
    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        self.sources.len() != before
    }

    pub fn get(&self, id: u32) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn as_slice(&self) -> &[Source] {
        &self.sources
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_rejects_only_new_ids() {
        let mut reg = SourceRegistry::new();
        for id in 0..MAX_SOURCES as u32 {
            reg.upsert(id, SourceKind::Water, 0.5, 0.5, 1.0).unwrap();
        }
        assert_eq!(
            reg.upsert(999, SourceKind::Lava, 0.1, 0.1, 1.0),
            Err(SourceError::CapacityReached(999))
        );
        assert_eq!(reg.len(), MAX_SOURCES);

        reg.upsert(7, SourceKind::Lava, 0.2, 0.3, 4.0).unwrap();
        let updated = reg.get(7).unwrap();
        assert_eq!(updated.kind, SourceKind::Lava);
        assert_eq!(updated.rate, 4.0);
        assert_eq!(reg.len(), MAX_SOURCES);

        assert!(reg.remove(7));
        assert!(!reg.remove(7));
        reg.upsert(999, SourceKind::Water, 0.1, 0.1, 1.0).unwrap();
    }

    #[test]
    fn test_inputs_sanitized() {
        let mut reg = SourceRegistry::new();
        reg.upsert(1, SourceKind::Water, 1.5, -0.2, -3.0).unwrap();
        let s = reg.get(1).unwrap();
        assert_eq!(s.position, Vec2::new(1.0, 0.0));
        assert_eq!(s.rate, 0.0);
        assert!(matches!(
            reg.upsert(2, SourceKind::Water, f32::NAN, 0.0, 1.0),
            Err(SourceError::InvalidPosition { id: 2, .. })
        ));
        assert!(!reg.is_empty() && reg.len() == 1);
    }
}
