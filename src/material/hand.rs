//! The hand: carried material shared between the engine and transfer kernels.
//!
//! Mass is kept as integer grams so concurrently running cells can claim
//! from a per-dispatch budget with plain atomics.

use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

use super::Material;

/// Grams per kilogram; the fixed-point scale of the ledger.
pub const GRAMS_PER_KG: f32 = 1000.0;

const KIND_NONE: u8 = u8::MAX;

/// Snapshot of the hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandState {
    pub kind: Option<Material>,
    pub mass_kg: f32,
    pub cap_kg: f32,
}

impl HandState {
    pub fn is_empty(&self) -> bool {
        self.mass_kg <= 0.0
    }

    /// Mass that can still be picked up (kg).
    pub fn remaining_kg(&self) -> f32 {
        (self.cap_kg - self.mass_kg).max(0.0)
    }
}

/// Authoritative hand state.
#[derive(Debug)]
pub struct HandLedger {
    kind: AtomicU8,
    mass_g: AtomicI64,
    cap_g: i64,
}

impl HandLedger {
    pub fn new(cap_kg: f32) -> Self {
        Self {
            kind: AtomicU8::new(KIND_NONE),
            mass_g: AtomicI64::new(0),
            cap_g: to_grams(cap_kg),
        }
    }

    pub fn state(&self) -> HandState {
        HandState {
            kind: self.kind(),
            mass_kg: self.mass_g() as f32 / GRAMS_PER_KG,
            cap_kg: self.cap_g as f32 / GRAMS_PER_KG,
        }
    }

    pub fn kind(&self) -> Option<Material> {
        Material::from_index(self.kind.load(Ordering::Acquire))
    }

    pub fn mass_g(&self) -> i64 {
        self.mass_g.load(Ordering::Acquire)
    }

    pub fn cap_g(&self) -> i64 {
        self.cap_g
    }

    pub fn reset(&self) {
        self.mass_g.store(0, Ordering::Release);
        self.kind.store(KIND_NONE, Ordering::Release);
    }

    /// Grams still free for a pickup of `material`, or `None` when the hand
    /// already carries a different material.
    pub(crate) fn begin_pickup(&self, material: Material) -> Option<i64> {
        let mass = self.mass_g();
        if mass > 0 && self.kind() != Some(material) {
            return None;
        }
        Some((self.cap_g - mass).max(0))
    }

    /// Material and grams available for a deposit, if the hand holds any.
    pub(crate) fn begin_deposit(&self) -> Option<(Material, i64)> {
        let mass = self.mass_g();
        match self.kind() {
            Some(kind) if mass > 0 => Some((kind, mass)),
            _ => None,
        }
    }

    /// Adds picked-up `grams`; the hand takes on the material with the
    /// first gram it receives.
    pub(crate) fn credit(&self, material: Material, grams: i64) {
        if grams <= 0 {
            return;
        }
        self.kind.store(material.index(), Ordering::Release);
        self.mass_g.fetch_add(grams, Ordering::AcqRel);
    }

    /// Removes `grams`; an emptied hand forgets its material.
    pub(crate) fn debit(&self, grams: i64) {
        let before = self.mass_g.fetch_sub(grams, Ordering::AcqRel);
        if before - grams <= 0 {
            self.mass_g.store(0, Ordering::Release);
            self.kind.store(KIND_NONE, Ordering::Release);
        }
    }

    #[cfg(test)]
    pub(crate) fn fill(&self, material: Material, kg: f32) {
        self.kind.store(material.index(), Ordering::Release);
        self.mass_g.store(to_grams(kg).min(self.cap_g), Ordering::Release);
    }
}

/// Shared remaining capacity of one transfer dispatch.
#[derive(Debug)]
pub struct TransferBudget {
    remaining: AtomicI64,
}

impl TransferBudget {
    pub fn new(grams: i64) -> Self {
        Self {
            remaining: AtomicI64::new(grams.max(0)),
        }
    }

    /// Claims up to `request` grams; returns what was granted.
    pub fn claim(&self, request: i64) -> i64 {
        if request <= 0 {
            return 0;
        }
        let mut granted = 0;
        let result = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                granted = request.min(left);
                (granted > 0).then_some(left - granted)
            });
        if result.is_ok() {
            granted
        } else {
            0
        }
    }

    pub fn remaining(&self) -> i64 {
        self.remaining.load(Ordering::Acquire)
    }
}

/// Rounds kilograms to whole grams.
pub fn to_grams(kg: f32) -> i64 {
    (kg as f64 * GRAMS_PER_KG as f64).round() as i64
}
