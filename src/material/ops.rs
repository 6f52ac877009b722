//! Brush strokes and the queued operations they turn into.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::Material;

/// What a brush stroke does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushMode {
    Pickup,
    Deposit,
    Smooth,
    SmoothRaise,
    SmoothLower,
    Flatten,
}

impl BrushMode {
    pub const ALL: [BrushMode; 6] = [
        BrushMode::Pickup,
        BrushMode::Deposit,
        BrushMode::Smooth,
        BrushMode::SmoothRaise,
        BrushMode::SmoothLower,
        BrushMode::Flatten,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BrushMode::Pickup => "pickup",
            BrushMode::Deposit => "deposit",
            BrushMode::Smooth => "smooth",
            BrushMode::SmoothRaise => "smooth_raise",
            BrushMode::SmoothLower => "smooth_lower",
            BrushMode::Flatten => "flatten",
        }
    }
}

impl std::str::FromStr for BrushMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(BrushMode::Pickup),
            "deposit" => Ok(BrushMode::Deposit),
            "smooth" => Ok(BrushMode::Smooth),
            "smooth_raise" => Ok(BrushMode::SmoothRaise),
            "smooth_lower" => Ok(BrushMode::SmoothLower),
            "flatten" => Ok(BrushMode::Flatten),
            other => Err(format!("unknown brush mode '{other}'")),
        }
    }
}

/// One brush input as delivered by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushStroke {
    pub mode: BrushMode,
    /// Material for pickups; deposits use the hand's material.
    pub material: Material,
    /// World position in meters.
    pub world_x: f32,
    pub world_z: f32,
    /// Brush radius in meters.
    pub radius: f32,
    /// kg/s for pickup and deposit, raw UI strength for sculpting.
    pub strength: f32,
    pub dt: f32,
    /// Target height for flatten; the height under the brush center otherwise.
    pub height_hint: Option<f32>,
}

impl BrushStroke {
    pub fn new(mode: BrushMode, material: Material, world_x: f32, world_z: f32) -> Self {
        Self {
            mode,
            material,
            world_x,
            world_z,
            radius: 4.0,
            strength: 100.0,
            dt: 1.0 / 60.0,
            height_hint: None,
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_dt(mut self, dt: f32) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_height_hint(mut self, height: f32) -> Self {
        self.height_hint = Some(height);
        self
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.world_x, self.world_z)
    }

    /// Finite position, positive radius, strength and dt.
    pub(crate) fn is_well_formed(&self) -> bool {
        let finite = self.world_x.is_finite()
            && self.world_z.is_finite()
            && self.radius.is_finite()
            && self.strength.is_finite()
            && self.dt.is_finite()
            && self.height_hint.map_or(true, f32::is_finite);
        finite && self.radius > 0.0 && self.strength > 0.0 && self.dt > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Pickup,
    Deposit,
}

/// A queued pickup or deposit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferOp {
    pub mode: TransferMode,
    /// Requested material; deposits resolve the hand's material when they run.
    pub material: Material,
    pub center: Vec2,
    pub radius: f32,
    pub strength_kg_per_s: f32,
    pub dt: f32,
}

impl TransferOp {
    /// Total mass the op asks for (kg).
    pub fn requested_kg(&self) -> f32 {
        self.strength_kg_per_s * self.dt
    }
}

/// Which way a directional smooth may move the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    RaiseOnly,
    LowerOnly,
    Both,
}

impl Direction {
    #[inline]
    pub fn allows(self, change: f32) -> bool {
        match self {
            Direction::RaiseOnly => change > 0.0,
            Direction::LowerOnly => change < 0.0,
            Direction::Both => true,
        }
    }
}

/// What a sculpt pass blends toward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SculptTarget {
    /// 3x3 neighborhood average, restricted by direction.
    LocalAverage(Direction),
    /// A fixed height, or the height under the center when `None`.
    Flatten(Option<f32>),
}

/// A queued smooth, directional smooth or flatten.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SculptOp {
    pub target: SculptTarget,
    pub center: Vec2,
    pub radius: f32,
    /// Normalized to `[0, 1]`.
    pub strength: f32,
    pub dt: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_strokes() {
        let base = BrushStroke::new(BrushMode::Smooth, Material::Soil, 1.0, 1.0);
        assert!(base.is_well_formed());
        assert!(!base.with_radius(0.0).is_well_formed());
        assert!(!base.with_strength(-1.0).is_well_formed());
        assert!(!base.with_dt(0.0).is_well_formed());
        assert!(!base.with_height_hint(f32::NAN).is_well_formed());
        assert!(!BrushStroke { world_x: f32::INFINITY, ..base }.is_well_formed());
    }

    #[test]
    fn test_mode_names_parse_back() {
        for mode in BrushMode::ALL {
            assert_eq!(mode.name().parse::<BrushMode>(), Ok(mode));
        }
        assert!("carve".parse::<BrushMode>().is_err());
    }

    #[test]
    fn test_direction_filter() {
        assert!(Direction::RaiseOnly.allows(0.1));
        assert!(!Direction::RaiseOnly.allows(-0.1));
        assert!(Direction::LowerOnly.allows(-0.1));
        assert!(Direction::Both.allows(-0.1));
    }
}
