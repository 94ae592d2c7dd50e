//! Client-side match state.
//!
//! The server is authoritative. This module buffers its snapshots and renders
//! the world slightly in the past, blending between the two frames that
//! bracket the render time so movement stays smooth between ticks.

use std::collections::{HashMap, VecDeque};

use macroquad::math::Vec2;
use shared::angles::lerp_angle;
use shared::protocol::{PlayerSnapshot, RosterEntry, TankAssignment, TankLoadout};
use uuid::Uuid;

/// How far in the past the world is rendered, in milliseconds. Roughly three
/// ticks at the server rate, so a bracketing snapshot pair is almost always
/// available.
pub const INTERP_DELAY_MS: f64 = 120.0;

/// Upper bound on buffered snapshots (about three seconds of history).
pub const SNAPSHOT_CAPACITY: usize = 90;

/// Smoothing factor folded into the server clock offset per observation.
pub const OFFSET_SMOOTHING: f64 = 0.12;

/// Per-frame exponential smoothing for the camera position.
pub const CAMERA_SMOOTHING: f32 = 0.2;

/// How long announcement banners stay on screen, in milliseconds.
pub const BANNER_DURATION_MS: f64 = 4000.0;

/// Spectator free-camera pan speed, in screen pixels per second.
pub const SPECTATOR_PAN_SPEED: f32 = 1000.0;

pub const ZOOM_MIN: f32 = 0.5;
pub const ZOOM_MAX: f32 = 3.0;
pub const ZOOM_SMOOTHING: f32 = 0.22;
/// Multiplicative zoom change per +/- key press.
pub const ZOOM_STEP_KEYS: f32 = 1.12;
/// Base raised to the wheel delta for scroll zoom.
pub const ZOOM_WHEEL_BASE: f32 = 1.0015;

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// One authoritative state frame, keyed by entity id.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub ts: u64,
    pub players: HashMap<Uuid, PlayerSnapshot>,
}

/// Rolling window of the most recent server snapshots.
#[derive(Debug, Default)]
pub struct SnapshotBuffer {
    frames: VecDeque<Snapshot>,
}

impl SnapshotBuffer {
    pub fn push(&mut self, ts: u64, players: Vec<PlayerSnapshot>) {
        let players = players.into_iter().map(|p| (p.id, p)).collect();
        self.frames.push_back(Snapshot { ts, players });
        while self.frames.len() > SNAPSHOT_CAPACITY {
            self.frames.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The newest raw snapshot, unblended.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.frames.back()
    }

    /// Players interpolated at `render_ts` (unix milliseconds).
    ///
    /// Position, size and rotation blend linearly between the bracketing
    /// snapshots; rotation takes the shortest arc. Discrete fields (health,
    /// alive, shape) come from the later snapshot. Outside the buffered range
    /// the nearest snapshot is returned unmodified, never extrapolated.
    pub fn sample(&self, render_ts: f64) -> Vec<PlayerSnapshot> {
        let len = self.frames.len();
        if len == 0 {
            return Vec::new();
        }
        if len == 1 {
            let mut players: Vec<_> = self.frames[0].players.values().cloned().collect();
            players.sort_unstable_by_key(|p| p.id);
            return players;
        }

        let mut i = len as isize - 2;
        while i >= 0 && self.frames[i as usize].ts as f64 > render_ts {
            i -= 1;
        }
        let a = i.max(0) as usize;
        let b = (a + 1).min(len - 1);
        let s0 = &self.frames[a];
        let s1 = &self.frames[b];
        let t0 = s0.ts as f64;
        let t1 = s1.ts as f64;
        let t = if t1 == t0 {
            1.0
        } else {
            ((render_ts - t0) / (t1 - t0)).clamp(0.0, 1.0) as f32
        };

        // Stable id order keeps the draw order from flickering frame to frame.
        let mut ids: Vec<Uuid> = s0.players.keys().chain(s1.players.keys()).copied().collect();
        ids.sort_unstable();
        ids.dedup();

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let p0 = s0.players.get(&id).or_else(|| s1.players.get(&id));
            let p1 = s1.players.get(&id).or_else(|| s0.players.get(&id));
            let (Some(p0), Some(p1)) = (p0, p1) else {
                continue;
            };
            out.push(PlayerSnapshot {
                id,
                x: lerp(p0.x, p1.x, t),
                y: lerp(p0.y, p1.y, t),
                rot: lerp_angle(p0.rot, p1.rot, t),
                size: lerp(p0.size, p1.size, t),
                health: p1.health,
                max_health: p1.max_health,
                alive: p1.alive,
                shape: p1.shape,
            });
        }
        out
    }
}

/// Estimate of the difference between the local clock and the server clock.
#[derive(Debug, Default)]
pub struct ClockSync {
    offset_ms: Option<f64>,
}

impl ClockSync {
    /// Folds one server timestamp into the offset estimate.
    pub fn observe(&mut self, server_ts: u64, local_now_ms: f64) {
        let sample = local_now_ms - server_ts as f64;
        self.offset_ms = Some(match self.offset_ms {
            None => sample,
            Some(prev) => prev + (sample - prev) * OFFSET_SMOOTHING,
        });
    }

    /// The timestamp the renderer should sample the snapshot buffer at.
    pub fn render_ts(&self, local_now_ms: f64) -> f64 {
        local_now_ms - self.offset_ms.unwrap_or(0.0) - INTERP_DELAY_MS
    }

    pub fn offset_ms(&self) -> Option<f64> {
        self.offset_ms
    }
}

/// Render camera. In normal play it tracks the local tank at zoom 1; while
/// spectating it pans freely and zooms within [ZOOM_MIN, ZOOM_MAX].
#[derive(Debug)]
pub struct Camera {
    pub center: Vec2,
    pub zoom: f32,
    pub target_zoom: f32,
}

impl Camera {
    pub fn new(center: Vec2) -> Self {
        Self {
            center,
            zoom: 1.0,
            target_zoom: 1.0,
        }
    }

    /// Eases toward `target`, keeping the center inside the arena.
    pub fn follow(&mut self, target: Vec2, bounds: Vec2) {
        self.center += (target - self.center) * CAMERA_SMOOTHING;
        self.clamp_to(bounds);
    }

    /// Free pan in screen pixels, converted to world units by the zoom.
    pub fn pan(&mut self, dir: Vec2, dt: f32, bounds: Vec2) {
        if dir == Vec2::ZERO {
            return;
        }
        self.center += dir.normalize() * SPECTATOR_PAN_SPEED * dt / self.zoom;
        self.clamp_to(bounds);
    }

    pub fn zoom_step(&mut self, steps: f32) {
        self.target_zoom = (self.target_zoom * ZOOM_STEP_KEYS.powf(steps)).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    pub fn zoom_wheel(&mut self, delta: f32) {
        self.target_zoom = (self.target_zoom * ZOOM_WHEEL_BASE.powf(delta)).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    /// Per-frame zoom easing. Outside spectator mode the zoom pins to 1.
    pub fn ease_zoom(&mut self, spectating: bool) {
        if !spectating {
            self.zoom = 1.0;
            self.target_zoom = 1.0;
            return;
        }
        self.zoom += (self.target_zoom - self.zoom) * ZOOM_SMOOTHING;
    }

    fn clamp_to(&mut self, bounds: Vec2) {
        self.center.x = self.center.x.clamp(0.0, bounds.x);
        self.center.y = self.center.y.clamp(0.0, bounds.y);
    }
}

/// Announcement banner with an expiry time.
#[derive(Debug, Clone)]
pub struct Banner {
    pub text: String,
    pub until_ms: f64,
}

/// Exit countdown shown once the match outcome is decided.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    pub seconds: u32,
    pub started_ms: f64,
}

impl Countdown {
    /// Whole seconds left, or None once expired.
    pub fn remaining(&self, now_ms: f64) -> Option<u32> {
        let elapsed = ((now_ms - self.started_ms) / 1000.0).floor() as i64;
        let remain = self.seconds as i64 - elapsed;
        (remain > 0).then_some(remain as u32)
    }
}

/// Everything the client tracks about the match in progress.
pub struct MatchView {
    pub game_id: Uuid,
    pub you: Uuid,
    pub bounds: Vec2,
    pub names: HashMap<Uuid, String>,
    pub tanks: HashMap<Uuid, TankLoadout>,
    pub snapshots: SnapshotBuffer,
    pub clock: ClockSync,
    pub camera: Camera,
    pub banner: Option<Banner>,
    pub countdown: Option<Countdown>,
    spectating: bool,
}

impl MatchView {
    pub fn new(
        game_id: Uuid,
        you: Uuid,
        w: f32,
        h: f32,
        roster: Vec<RosterEntry>,
        tanks: Vec<TankAssignment>,
    ) -> Self {
        let bounds = Vec2::new(w, h);
        Self {
            game_id,
            you,
            bounds,
            names: roster.into_iter().map(|r| (r.id, r.name)).collect(),
            tanks: tanks.into_iter().map(|t| (t.id, t.tank)).collect(),
            snapshots: SnapshotBuffer::default(),
            clock: ClockSync::default(),
            camera: Camera::new(bounds * 0.5),
            banner: None,
            countdown: None,
            spectating: false,
        }
    }

    /// Feeds one authoritative state frame into the view.
    ///
    /// Spectator status follows the newest raw snapshot rather than the
    /// delayed render view, so the death overlay appears without the
    /// interpolation lag.
    pub fn ingest_state(&mut self, ts: u64, players: Vec<PlayerSnapshot>, local_now_ms: f64) {
        self.clock.observe(ts, local_now_ms);

        let alive_now = players.iter().find(|p| p.id == self.you).map(|p| p.alive);
        let was_spectating = self.spectating;
        self.spectating = !alive_now.unwrap_or(false);
        if was_spectating && !self.spectating {
            self.camera.zoom = 1.0;
            self.camera.target_zoom = 1.0;
        }

        self.snapshots.push(ts, players);
    }

    pub fn spectating(&self) -> bool {
        self.spectating
    }

    pub fn show_banner(&mut self, text: String, now_ms: f64) {
        self.banner = Some(Banner {
            text,
            until_ms: now_ms + BANNER_DURATION_MS,
        });
    }

    pub fn start_countdown(&mut self, seconds: u32, now_ms: f64) {
        self.countdown = Some(Countdown {
            seconds,
            started_ms: now_ms,
        });
    }

    pub fn name_of(&self, id: Uuid) -> &str {
        self.names.get(&id).map(String::as_str).unwrap_or("Tank")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn player(id: Uuid, x: f32, y: f32) -> PlayerSnapshot {
        PlayerSnapshot {
            id,
            x,
            y,
            rot: 0.0,
            size: 14.0,
            health: 120.0,
            max_health: 120.0,
            alive: true,
            shape: 0,
        }
    }

    #[test]
    fn interpolation_blends_between_bracketing_snapshots() {
        let id = Uuid::new_v4();
        let mut buf = SnapshotBuffer::default();
        buf.push(1000, vec![player(id, 0.0, 0.0)]);
        buf.push(1033, vec![player(id, 33.0, 0.0)]);

        let players = buf.sample(1016.5);
        assert_eq!(players.len(), 1);
        assert_approx_eq!(players[0].x, 16.5, 1e-3);
        assert_approx_eq!(players[0].y, 0.0, 1e-6);
    }

    #[test]
    fn sampling_outside_the_buffer_clamps_to_the_nearest_snapshot() {
        let id = Uuid::new_v4();
        let mut buf = SnapshotBuffer::default();
        buf.push(1000, vec![player(id, 0.0, 5.0)]);
        buf.push(1033, vec![player(id, 33.0, 5.0)]);

        let before = buf.sample(900.0);
        assert_approx_eq!(before[0].x, 0.0, 1e-6);

        let after = buf.sample(5000.0);
        assert_approx_eq!(after[0].x, 33.0, 1e-6);
    }

    #[test]
    fn a_single_snapshot_is_returned_as_is() {
        let id = Uuid::new_v4();
        let mut buf = SnapshotBuffer::default();
        buf.push(1000, vec![player(id, 7.0, 9.0)]);

        let players = buf.sample(500.0);
        assert_eq!(players.len(), 1);
        assert_approx_eq!(players[0].x, 7.0, 1e-6);
        assert_approx_eq!(players[0].y, 9.0, 1e-6);
    }

    #[test]
    fn discrete_fields_come_from_the_later_snapshot() {
        let id = Uuid::new_v4();
        let mut buf = SnapshotBuffer::default();
        let mut p0 = player(id, 0.0, 0.0);
        p0.health = 100.0;
        let mut p1 = player(id, 10.0, 0.0);
        p1.health = 60.0;
        p1.alive = false;
        buf.push(1000, vec![p0]);
        buf.push(1033, vec![p1]);

        let players = buf.sample(1016.0);
        assert_approx_eq!(players[0].health, 60.0, 1e-6);
        assert!(!players[0].alive);
        // Position still blends even while health snaps.
        assert!(players[0].x > 0.0 && players[0].x < 10.0);
    }

    #[test]
    fn rotation_interpolates_across_the_pi_seam() {
        let id = Uuid::new_v4();
        let mut buf = SnapshotBuffer::default();
        let mut p0 = player(id, 0.0, 0.0);
        p0.rot = 3.0;
        let mut p1 = player(id, 0.0, 0.0);
        p1.rot = -3.0;
        buf.push(1000, vec![p0]);
        buf.push(1033, vec![p1]);

        let mid = buf.sample(1016.5);
        // Short arc passes through pi, not through zero.
        assert!(mid[0].rot.abs() > 3.0);
    }

    #[test]
    fn the_buffer_is_bounded() {
        let id = Uuid::new_v4();
        let mut buf = SnapshotBuffer::default();
        for i in 0..(SNAPSHOT_CAPACITY as u64 + 25) {
            buf.push(i, vec![player(id, i as f32, 0.0)]);
        }
        assert_eq!(buf.len(), SNAPSHOT_CAPACITY);
        assert_eq!(buf.latest().map(|s| s.ts), Some(SNAPSHOT_CAPACITY as u64 + 24));
    }

    #[test]
    fn entities_missing_from_one_snapshot_fall_back_to_the_other() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut buf = SnapshotBuffer::default();
        buf.push(1000, vec![player(a, 0.0, 0.0)]);
        buf.push(1033, vec![player(a, 10.0, 0.0), player(b, 50.0, 50.0)]);

        let players = buf.sample(1016.5);
        assert_eq!(players.len(), 2);
        let late_joiner = players.iter().find(|p| p.id == b).unwrap();
        // No pair to blend, so the one known position is used verbatim.
        assert_approx_eq!(late_joiner.x, 50.0, 1e-6);
    }

    #[test]
    fn clock_offset_smooths_toward_new_samples() {
        let mut clock = ClockSync::default();
        clock.observe(1000, 1500.0);
        assert_approx_eq!(clock.offset_ms().unwrap(), 500.0, 1e-9);

        clock.observe(1000, 1600.0);
        // 500 + (600 - 500) * 0.12
        assert_approx_eq!(clock.offset_ms().unwrap(), 512.0, 1e-9);
        assert_approx_eq!(clock.render_ts(2000.0), 2000.0 - 512.0 - INTERP_DELAY_MS, 1e-9);
    }

    #[test]
    fn the_camera_center_stays_inside_the_arena() {
        let bounds = Vec2::new(1200.0, 800.0);
        let mut cam = Camera::new(Vec2::new(10.0, 10.0));
        for _ in 0..200 {
            cam.follow(Vec2::new(-500.0, -500.0), bounds);
        }
        assert!(cam.center.x >= 0.0 && cam.center.y >= 0.0);

        for _ in 0..200 {
            cam.pan(Vec2::new(1.0, 1.0), 0.1, bounds);
        }
        assert!(cam.center.x <= bounds.x && cam.center.y <= bounds.y);
    }

    #[test]
    fn zoom_is_clamped_and_pinned_outside_spectator_mode() {
        let mut cam = Camera::new(Vec2::ZERO);
        for _ in 0..100 {
            cam.zoom_step(1.0);
        }
        assert_approx_eq!(cam.target_zoom, ZOOM_MAX, 1e-6);

        for _ in 0..500 {
            cam.zoom_wheel(-100.0);
        }
        assert_approx_eq!(cam.target_zoom, ZOOM_MIN, 1e-6);

        cam.ease_zoom(true);
        assert!(cam.zoom < 1.0);

        cam.ease_zoom(false);
        assert_approx_eq!(cam.zoom, 1.0, 1e-6);
        assert_approx_eq!(cam.target_zoom, 1.0, 1e-6);
    }

    #[test]
    fn countdown_counts_whole_seconds() {
        let cd = Countdown {
            seconds: 5,
            started_ms: 1000.0,
        };
        assert_eq!(cd.remaining(1000.0), Some(5));
        assert_eq!(cd.remaining(5999.0), Some(1));
        assert_eq!(cd.remaining(6000.0), None);
    }

    #[test]
    fn losing_your_tank_switches_to_spectating() {
        let you = Uuid::new_v4();
        let opp = Uuid::new_v4();
        let mut view = MatchView::new(you, you, 1200.0, 800.0, Vec::new(), Vec::new());

        view.ingest_state(1000, vec![player(you, 0.0, 0.0), player(opp, 5.0, 5.0)], 1000.0);
        assert!(!view.spectating());

        let mut dead = player(you, 0.0, 0.0);
        dead.alive = false;
        view.ingest_state(1033, vec![dead, player(opp, 5.0, 5.0)], 1033.0);
        assert!(view.spectating());

        // Missing entirely also counts as spectating.
        view.ingest_state(1066, vec![player(opp, 5.0, 5.0)], 1066.0);
        assert!(view.spectating());

        // Coming back resets the spectator zoom.
        view.camera.target_zoom = 2.0;
        view.camera.zoom = 2.0;
        view.ingest_state(1100, vec![player(you, 0.0, 0.0)], 1100.0);
        assert!(!view.spectating());
        assert_approx_eq!(view.camera.zoom, 1.0, 1e-6);
    }
}
