//! Arena rendering.
//!
//! The camera transform is applied by hand: world points map to screen as
//! `(p - camera.center) * zoom + view / 2`. Stroke widths and font sizes stay
//! in screen pixels at every zoom level.

use macroquad::prelude::*;

use shared::protocol::PlayerSnapshot;

use crate::state::{Camera, MatchView};

pub const BACKGROUND: Color = Color::new(0.020, 0.031, 0.059, 1.0); // #05080f
const ARENA_FILL: Color = Color::new(0.043, 0.071, 0.125, 1.0); // #0b1220
const ARENA_BORDER: Color = Color::new(1.0, 1.0, 1.0, 0.06);
const GRID_LINE: Color = Color::new(1.0, 1.0, 1.0, 0.12);

const BODY_SELF: Color = Color::new(0.204, 0.827, 0.600, 1.0); // #34d399
const BODY_OTHER: Color = Color::new(0.376, 0.647, 0.980, 1.0); // #60a5fa
const BODY_DEAD: Color = Color::new(0.294, 0.333, 0.388, 1.0); // #4b5563
const BARREL_FILL: Color = Color::new(0.612, 0.639, 0.686, 1.0); // #9ca3af
const BARREL_STROKE: Color = BODY_DEAD;

const BAR_TRACK: Color = Color::new(0.0, 0.0, 0.0, 0.45);
const BAR_EMPTY: Color = Color::new(0.725, 0.110, 0.110, 1.0); // #b91c1c
const BAR_FILL: Color = Color::new(0.133, 0.773, 0.369, 1.0); // #22c55e
const BAR_OUTLINE: Color = Color::new(0.0, 0.0, 0.0, 0.6);

const LABEL_SELF: Color = Color::new(0.902, 1.0, 0.957, 1.0); // #e6fff4
const LABEL_OTHER: Color = Color::new(0.953, 0.969, 1.0, 1.0); // #f3f7ff
const LABEL_SHADOW: Color = Color::new(0.0, 0.0, 0.0, 0.35);

const OVERLAY: Color = Color::new(0.0, 0.0, 0.0, 0.55);
const DEATH_TEXT: Color = Color::new(1.0, 0.867, 0.867, 1.0); // #ffdddd
const FADED_TEXT: Color = Color::new(1.0, 1.0, 1.0, 0.85);
const COUNTDOWN_TEXT: Color = Color::new(1.0, 1.0, 1.0, 0.9);

/// Outline width for tank bodies and barrels, screen pixels.
const STROKE_WIDTH: f32 = 4.0;
/// Grid spacing in world units.
const GRID_STEP: f32 = 100.0;
/// Tanks never render smaller than this radius, world units.
const MIN_RENDER_RADIUS: f32 = 8.0;

pub fn world_to_screen(p: Vec2, camera: &Camera, view: Vec2) -> Vec2 {
    (p - camera.center) * camera.zoom + view * 0.5
}

pub fn screen_to_world(p: Vec2, camera: &Camera, view: Vec2) -> Vec2 {
    (p - view * 0.5) / camera.zoom + camera.center
}

fn darken(c: Color, factor: f32) -> Color {
    Color::new(c.r * factor, c.g * factor, c.b * factor, c.a)
}

fn draw_text_centered(text: &str, cx: f32, baseline: f32, size: f32, color: Color) {
    let dims = measure_text(text, None, size as u16, 1.0);
    draw_text(text, cx - dims.width * 0.5, baseline, size, color);
}

fn draw_text_shadowed(text: &str, cx: f32, baseline: f32, size: f32, color: Color) {
    let dims = measure_text(text, None, size as u16, 1.0);
    let x = cx - dims.width * 0.5;
    draw_text(text, x + 1.0, baseline + 1.0, size, LABEL_SHADOW);
    draw_text(text, x, baseline, size, color);
}

/// Idle screen between matches.
pub fn draw_menu(note: &str, queue_len: u32, view: Vec2) {
    clear_background(BACKGROUND);
    draw_text_centered("TANK ARENA", view.x * 0.5, view.y * 0.35, 64.0, WHITE);
    if !note.is_empty() {
        draw_text_centered(note, view.x * 0.5, view.y * 0.35 + 48.0, 26.0, FADED_TEXT);
    }
    draw_text_centered(
        "Press ENTER to join the queue",
        view.x * 0.5,
        view.y * 0.55,
        28.0,
        WHITE,
    );
    draw_text_centered(
        &format!("{queue_len} waiting"),
        view.x * 0.5,
        view.y * 0.55 + 36.0,
        22.0,
        FADED_TEXT,
    );
}

/// Shown while enqueued and waiting for an opponent.
pub fn draw_searching(queue_len: u32, view: Vec2) {
    clear_background(BACKGROUND);
    draw_text_centered(
        "Searching for an opponent...",
        view.x * 0.5,
        view.y * 0.45,
        32.0,
        WHITE,
    );
    draw_text_centered(
        &format!("{queue_len} in queue"),
        view.x * 0.5,
        view.y * 0.45 + 40.0,
        24.0,
        FADED_TEXT,
    );
    draw_text_centered(
        "Press ESC to leave",
        view.x * 0.5,
        view.y * 0.45 + 76.0,
        22.0,
        FADED_TEXT,
    );
}

/// Draws one frame of the running match. `players` is the interpolated view
/// and `now_ms` the local render clock used for banner and countdown timing.
pub fn draw_match(match_view: &MatchView, players: &[PlayerSnapshot], view: Vec2, now_ms: f64) {
    clear_background(BACKGROUND);

    draw_arena(match_view, view);
    for p in players {
        draw_tank(match_view, p, view);
    }

    if match_view.spectating() {
        draw_death_overlay(view);
    }
    if let Some(banner) = &match_view.banner {
        if now_ms < banner.until_ms {
            draw_banner(&banner.text, view);
        }
    }
    if let Some(cd) = &match_view.countdown {
        if let Some(remain) = cd.remaining(now_ms) {
            draw_text_centered(
                &format!("Exiting battle in {remain}s..."),
                view.x * 0.5,
                view.y - 20.0,
                22.0,
                COUNTDOWN_TEXT,
            );
        }
    }
}

fn draw_arena(match_view: &MatchView, view: Vec2) {
    let camera = &match_view.camera;
    let zoom = camera.zoom;
    let bounds = match_view.bounds;
    let top_left = world_to_screen(Vec2::ZERO, camera, view);
    let size = bounds * zoom;

    draw_rectangle(top_left.x, top_left.y, size.x, size.y, ARENA_FILL);

    let mut x = 0.0;
    while x <= bounds.x {
        let a = world_to_screen(Vec2::new(x, 0.0), camera, view);
        let b = world_to_screen(Vec2::new(x, bounds.y), camera, view);
        draw_line(a.x, a.y, b.x, b.y, 1.0, GRID_LINE);
        x += GRID_STEP;
    }
    let mut y = 0.0;
    while y <= bounds.y {
        let a = world_to_screen(Vec2::new(0.0, y), camera, view);
        let b = world_to_screen(Vec2::new(bounds.x, y), camera, view);
        draw_line(a.x, a.y, b.x, b.y, 1.0, GRID_LINE);
        y += GRID_STEP;
    }

    draw_rectangle_lines(top_left.x, top_left.y, size.x, size.y, 2.0, ARENA_BORDER);
}

fn draw_tank(match_view: &MatchView, p: &PlayerSnapshot, view: Vec2) {
    let camera = &match_view.camera;
    let zoom = camera.zoom;
    let center = world_to_screen(Vec2::new(p.x, p.y), camera, view);
    let radius = p.size.max(MIN_RENDER_RADIUS) * zoom;

    // Barrels sit under the body so only their outer length shows.
    if let Some(tank) = match_view.tanks.get(&p.id) {
        for barrel in &tank.barrels {
            draw_barrel(center, p.rot, barrel, zoom);
        }
    }

    let fill = if !p.alive {
        BODY_DEAD
    } else if p.id == match_view.you {
        BODY_SELF
    } else {
        BODY_OTHER
    };
    let stroke = darken(fill, 0.6);

    if p.shape == 0 {
        draw_circle(center.x, center.y, radius, fill);
        draw_circle_lines(center.x, center.y, radius, STROKE_WIDTH, stroke);
    } else {
        let rotation = p.rot.to_degrees();
        draw_poly(center.x, center.y, p.shape, radius, rotation, fill);
        draw_poly_lines(center.x, center.y, p.shape, radius, rotation, STROKE_WIDTH, stroke);
    }

    draw_health_bar(center, radius, p.health, p.max_health);

    let label = if p.id == match_view.you {
        LABEL_SELF
    } else {
        LABEL_OTHER
    };
    let bar_y = center.y - radius - 14.0;
    draw_text_shadowed(match_view.name_of(p.id), center.x, bar_y - 4.0, 20.0, label);
}

/// Barrels are rectangles in tank-local space: `[length, width, forward
/// offset, side offset, direction]`, rotated by the tank's facing.
fn draw_barrel(center: Vec2, rot: f32, barrel: &[f32; 5], zoom: f32) {
    let (sin, cos) = (rot + barrel[4]).sin_cos();
    let forward = Vec2::new(cos, sin);
    let side = Vec2::new(-sin, cos);

    let root = center + forward * (barrel[2] * zoom) + side * (barrel[3] * zoom);
    let tip = root + forward * (barrel[0] * zoom);
    let half = side * (barrel[1] * zoom * 0.5);

    let c1 = root + half;
    let c2 = tip + half;
    let c3 = tip - half;
    let c4 = root - half;

    draw_triangle(c1, c2, c3, BARREL_FILL);
    draw_triangle(c1, c3, c4, BARREL_FILL);
    draw_line(c1.x, c1.y, c2.x, c2.y, STROKE_WIDTH, BARREL_STROKE);
    draw_line(c2.x, c2.y, c3.x, c3.y, STROKE_WIDTH, BARREL_STROKE);
    draw_line(c3.x, c3.y, c4.x, c4.y, STROKE_WIDTH, BARREL_STROKE);
    draw_line(c4.x, c4.y, c1.x, c1.y, STROKE_WIDTH, BARREL_STROKE);
}

fn draw_health_bar(center: Vec2, radius: f32, health: f32, max_health: f32) {
    let bar_w = (radius * 2.0).max(30.0);
    let bar_h = 6.0;
    let x = center.x - bar_w * 0.5;
    let y = center.y - radius - 14.0;
    let pct = if max_health > 0.0 {
        (health / max_health).clamp(0.0, 1.0)
    } else {
        0.0
    };

    draw_rectangle(x - 1.0, y - 1.0, bar_w + 2.0, bar_h + 2.0, BAR_TRACK);
    draw_rectangle(x, y, bar_w, bar_h, BAR_EMPTY);
    draw_rectangle(x, y, bar_w * pct, bar_h, BAR_FILL);
    draw_rectangle_lines(x, y, bar_w, bar_h, 1.0, BAR_OUTLINE);
}

fn draw_banner(text: &str, view: Vec2) {
    let size = 28.0;
    let dims = measure_text(text, None, size as u16, 1.0);
    let box_w = dims.width + 32.0;
    let box_h = size + 16.0;
    let box_x = view.x * 0.5 - box_w * 0.5;
    let box_y = 18.0;

    draw_rectangle(box_x, box_y, box_w, box_h, OVERLAY);
    draw_text(
        text,
        box_x + 16.0,
        box_y + 8.0 + dims.offset_y,
        size,
        WHITE,
    );
}

fn draw_death_overlay(view: Vec2) {
    draw_rectangle(0.0, 0.0, view.x, view.y, OVERLAY);
    draw_text_shadowed("YOU DIED", view.x * 0.5, view.y * 0.5 - 12.0, 72.0, DEATH_TEXT);
    draw_text_centered(
        "Spectating until the battle ends...",
        view.x * 0.5,
        view.y * 0.5 + 40.0,
        20.0,
        FADED_TEXT,
    );
}
