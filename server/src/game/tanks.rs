//! Tank archetype definitions

use rand::Rng;
use shared::protocol::TankLoadout;
use std::f32::consts::{FRAC_PI_6, PI};

/// Movement speed shared by every archetype, world units per second
pub const TANK_SPEED: f32 = 300.0;

/// Combat stats plus the cosmetic loadout sent to clients.
/// Barrels are [length, width, forward offset, side offset, direction radians].
#[derive(Debug, Clone, Copy)]
pub struct TankDef {
    pub name: &'static str,
    /// 0 = circle, otherwise regular polygon side count
    pub shape: u8,
    /// Circumscribed radius
    pub size: f32,
    pub max_health: f32,
    pub barrels: &'static [[f32; 5]],
}

impl TankDef {
    /// Contact damage per second, proportional to footprint
    pub fn body_damage(&self) -> f32 {
        self.size * 2.0
    }

    pub fn loadout(&self) -> TankLoadout {
        TankLoadout {
            name: self.name.to_string(),
            shape: self.shape,
            size: self.size,
            barrels: self.barrels.to_vec(),
        }
    }
}

pub static TANK_DEFS: [TankDef; 5] = [
    TankDef {
        name: "Scout",
        shape: 0,
        size: 14.0,
        max_health: 120.0,
        barrels: &[[22.0, 6.0, 10.0, 0.0, 0.0]],
    },
    TankDef {
        name: "Square",
        shape: 4,
        size: 18.0,
        max_health: 180.0,
        barrels: &[[20.0, 6.0, 12.0, 0.0, 0.0]],
    },
    TankDef {
        name: "Triad",
        shape: 3,
        size: 16.0,
        max_health: 160.0,
        barrels: &[
            [18.0, 6.0, 10.0, 0.0, 0.0],
            [18.0, 6.0, 10.0, 0.0, 2.0 * PI / 3.0],
            [18.0, 6.0, 10.0, 0.0, 4.0 * PI / 3.0],
        ],
    },
    TankDef {
        name: "Hex",
        shape: 6,
        size: 20.0,
        max_health: 220.0,
        barrels: &[
            [16.0, 6.0, 12.0, 0.0, FRAC_PI_6],
            [16.0, 6.0, 12.0, 0.0, FRAC_PI_6 + PI],
        ],
    },
    TankDef {
        name: "Rammer",
        shape: 5,
        size: 22.0,
        max_health: 260.0,
        barrels: &[[26.0, 8.0, 14.0, 0.0, 0.0]],
    },
];

/// Picks a random archetype. Callers supply the rng so matches can be
/// seeded deterministically in tests.
pub fn choose_archetype<R: Rng>(rng: &mut R) -> &'static TankDef {
    &TANK_DEFS[rng.gen_range(0..TANK_DEFS.len())]
}

/// Looks up an archetype by display name.
pub fn archetype_by_name(name: &str) -> Option<&'static TankDef> {
    TANK_DEFS.iter().find(|def| def.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn shapes_are_circles_or_real_polygons() {
        for def in &TANK_DEFS {
            assert!(def.shape == 0 || def.shape >= 3, "{} has bad shape", def.name);
            assert!(def.size > 0.0);
            assert!(def.max_health > 0.0);
            assert!(!def.barrels.is_empty());
        }
    }

    #[test]
    fn body_damage_scales_with_size() {
        let rammer = archetype_by_name("Rammer").unwrap();
        assert_eq!(rammer.body_damage(), 44.0);
        let scout = archetype_by_name("Scout").unwrap();
        assert_eq!(scout.body_damage(), 28.0);
    }

    #[test]
    fn seeded_selection_is_deterministic() {
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(choose_archetype(&mut a).name, choose_archetype(&mut b).name);
        }
    }

    #[test]
    fn loadout_carries_the_barrel_layout() {
        let triad = archetype_by_name("Triad").unwrap();
        let loadout = triad.loadout();
        assert_eq!(loadout.name, "Triad");
        assert_eq!(loadout.shape, 3);
        assert_eq!(loadout.barrels.len(), 3);
        assert!((loadout.barrels[1][4] - 2.0 * PI / 3.0).abs() < 1e-6);
    }
}
