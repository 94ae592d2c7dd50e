//! Shape descriptors and separating-axis collision tests
//!
//! Pure functions over circles and regular polygons. The simulation builds a
//! shape from each entity every tick and asks for the minimum translation
//! vector between pairs.

use glam::Vec2;
use std::f32::consts::TAU;

/// Collision shape for one entity at one instant
#[derive(Debug, Clone)]
pub enum Shape {
    Circle { center: Vec2, radius: f32 },
    Polygon { verts: Vec<Vec2> },
}

impl Shape {
    pub fn circle(center: Vec2, radius: f32) -> Self {
        Shape::Circle { center, radius }
    }

    /// Regular polygon with vertex i at angle `rotation + i * TAU / sides`.
    pub fn regular_polygon(center: Vec2, sides: u8, circumradius: f32, rotation: f32) -> Self {
        let verts = (0..sides)
            .map(|i| {
                let angle = rotation + i as f32 * TAU / sides as f32;
                center + Vec2::new(angle.cos(), angle.sin()) * circumradius
            })
            .collect();
        Shape::Polygon { verts }
    }

    /// Builds the shape for a body. Shape kind 0 is a circle, any other
    /// value is the side count of a regular polygon.
    pub fn for_body(center: Vec2, rotation: f32, shape_kind: u8, size: f32) -> Self {
        if shape_kind == 0 {
            Shape::circle(center, size)
        } else {
            Shape::regular_polygon(center, shape_kind, size, rotation)
        }
    }
}

/// Minimum translation vector separating two overlapping shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mtv {
    /// Unit axis pointing from shape A toward shape B
    pub axis: Vec2,
    /// Penetration depth along the axis
    pub depth: f32,
}

/// Computes the MTV between two shapes, or None if any separating axis
/// exists. The axis always points from `a` toward `b`, so resolution moves
/// `a` by `-axis * depth / 2` and `b` by `+axis * depth / 2`.
pub fn compute_mtv(a: &Shape, b: &Shape) -> Option<Mtv> {
    match (a, b) {
        (Shape::Circle { center: ca, radius: ra }, Shape::Circle { center: cb, radius: rb }) => {
            circle_circle(*ca, *ra, *cb, *rb)
        }
        (Shape::Polygon { verts: va }, Shape::Polygon { verts: vb }) => polygon_polygon(va, vb),
        (Shape::Polygon { verts }, Shape::Circle { center, radius }) => {
            polygon_circle(verts, *center, *radius)
        }
        (Shape::Circle { center, radius }, Shape::Polygon { verts }) => {
            polygon_circle(verts, *center, *radius).map(|mtv| Mtv {
                axis: -mtv.axis,
                depth: mtv.depth,
            })
        }
    }
}

fn circle_circle(ca: Vec2, ra: f32, cb: Vec2, rb: f32) -> Option<Mtv> {
    let delta = cb - ca;
    let dist = delta.length();
    let total = ra + rb;
    if dist >= total {
        return None;
    }
    if dist < 1e-4 {
        // Coincident centers, any axis separates them
        return Some(Mtv {
            axis: Vec2::X,
            depth: total,
        });
    }
    Some(Mtv {
        axis: delta / dist,
        depth: total - dist,
    })
}

fn polygon_polygon(a: &[Vec2], b: &[Vec2]) -> Option<Mtv> {
    let mut best_depth = f32::INFINITY;
    let mut best_axis = Vec2::X;

    for axis in edge_normals(a).chain(edge_normals(b)) {
        let (amin, amax) = project(a, axis);
        let (bmin, bmax) = project(b, axis);
        let overlap = amax.min(bmax) - amin.max(bmin);
        if overlap <= 0.0 {
            return None;
        }
        if overlap < best_depth {
            best_depth = overlap;
            best_axis = axis;
        }
    }

    Some(orient(best_axis, best_depth, centroid(a), centroid(b)))
}

fn polygon_circle(verts: &[Vec2], center: Vec2, radius: f32) -> Option<Mtv> {
    let mut best_depth = f32::INFINITY;
    let mut best_axis = Vec2::X;

    // Edge normals alone miss corner contacts, so add the axis from the
    // circle center to the nearest vertex.
    let nearest = verts
        .iter()
        .copied()
        .min_by(|a, b| a.distance_squared(center).total_cmp(&b.distance_squared(center)))?;
    let vertex_axis = (nearest - center).normalize_or_zero();

    let extra = (vertex_axis != Vec2::ZERO).then_some(vertex_axis);
    for axis in edge_normals(verts).chain(extra) {
        let (pmin, pmax) = project(verts, axis);
        let c = center.dot(axis);
        let overlap = pmax.min(c + radius) - pmin.max(c - radius);
        if overlap <= 0.0 {
            return None;
        }
        if overlap < best_depth {
            best_depth = overlap;
            best_axis = axis;
        }
    }

    Some(orient(best_axis, best_depth, centroid(verts), center))
}

/// Flips the axis if needed so it points from A's centroid toward B's.
fn orient(axis: Vec2, depth: f32, from: Vec2, toward: Vec2) -> Mtv {
    let axis = if (toward - from).dot(axis) < 0.0 {
        -axis
    } else {
        axis
    };
    Mtv { axis, depth }
}

fn edge_normals(verts: &[Vec2]) -> impl Iterator<Item = Vec2> + '_ {
    (0..verts.len()).filter_map(move |i| {
        let edge = verts[(i + 1) % verts.len()] - verts[i];
        let normal = edge.perp().normalize_or_zero();
        (normal != Vec2::ZERO).then_some(normal)
    })
}

fn project(verts: &[Vec2], axis: Vec2) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for v in verts {
        let d = v.dot(axis);
        min = min.min(d);
        max = max.max(d);
    }
    (min, max)
}

fn centroid(verts: &[Vec2]) -> Vec2 {
    verts.iter().copied().sum::<Vec2>() / verts.len() as f32
}
