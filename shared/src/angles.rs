//! Angle math shared by the simulation and the renderer.
//! All angles are radians. Normalized form is (-pi, pi].

use std::f32::consts::{PI, TAU};

/// Normalizes an angle into (-pi, pi].
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle.rem_euclid(TAU);
    if a > PI {
        a -= TAU;
    }
    a
}

/// Signed shortest rotation from `from` to `to`, in (-pi, pi].
pub fn angle_delta(from: f32, to: f32) -> f32 {
    normalize_angle(to - from)
}

/// Interpolates along the shortest arc between two angles.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    normalize_angle(from + angle_delta(from, to) * t)
}
