//! Arena match state and authoritative tick loop

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::f32::consts::PI;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::info;
use uuid::Uuid;

use shared::angles::normalize_angle;
use shared::protocol::{
    ClientMsg, EndReason, PlayerSnapshot, RosterEntry, ServerMsg, TankAssignment,
};

use crate::util::time::{tick_delta, unix_millis, SIMULATION_TPS};

use super::geometry::{compute_mtv, Shape};
use super::tanks::{choose_archetype, TankDef, TANK_SPEED};
use super::{MoveState, PlayerEvent, PlayerEventKind};

/// Seconds between a decided match and its teardown
const EXIT_COUNTDOWN_SECS: u32 = 5;

/// One connected participant of a match
pub struct Participant {
    pub id: Uuid,
    pub name: String,
    /// Outbound channel to this participant's socket writer
    pub tx: mpsc::Sender<ServerMsg>,
}

/// Authoritative combat state for one tank
#[derive(Debug, Clone)]
pub struct TankEntity {
    pub id: Uuid,
    pub pos: Vec2,
    /// Facing angle in radians, normalized to (-pi, pi]
    pub rotation: f32,
    /// 0 = circle, otherwise regular polygon side count
    pub shape: u8,
    /// Circumscribed radius
    pub size: f32,
    pub health: f32,
    pub max_health: f32,
    /// Damage per second dealt to an overlapping tank
    pub body_damage: f32,
    pub alive: bool,
}

/// Handle for routing connection events into a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub match_id: Uuid,
    pub events: mpsc::Sender<PlayerEvent>,
}

/// Final result reported to the lifecycle manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub reason: EndReason,
    pub winner: Option<Uuid>,
}

struct PendingEnd {
    at: tokio::time::Instant,
    reason: EndReason,
    winner: Option<Uuid>,
}

/// The authoritative match for exactly two tanks
pub struct ArenaMatch {
    id: Uuid,
    bounds: Vec2,
    participants: Vec<Participant>,
    entities: HashMap<Uuid, TankEntity>,
    inputs: HashMap<Uuid, MoveState>,
    loadouts: Vec<TankAssignment>,
    events_rx: mpsc::Receiver<PlayerEvent>,
    /// Latched once a terminal condition is detected
    finishing: bool,
    /// Latched once the match has ended; guards double teardown
    closed: bool,
    pending_end: Option<PendingEnd>,
    outcome: Option<MatchOutcome>,
}

impl ArenaMatch {
    /// Create a match, rolling a random archetype for each participant.
    pub fn new(
        id: Uuid,
        seed: u64,
        bounds: Vec2,
        participants: Vec<Participant>,
    ) -> (Self, MatchHandle) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let defs = participants
            .iter()
            .map(|_| choose_archetype(&mut rng))
            .collect();
        Self::with_archetypes(id, bounds, participants, defs)
    }

    /// Create a match with fixed archetypes, one per participant in order.
    /// Tests use this directly for deterministic matchups.
    pub fn with_archetypes(
        id: Uuid,
        bounds: Vec2,
        participants: Vec<Participant>,
        defs: Vec<&'static TankDef>,
    ) -> (Self, MatchHandle) {
        let (events_tx, events_rx) = mpsc::channel(256);

        // Facing each other across the arena midline
        let spawns = [
            (Vec2::new(bounds.x * 0.25, bounds.y * 0.5), 0.0),
            (Vec2::new(bounds.x * 0.75, bounds.y * 0.5), PI),
        ];

        let mut entities = HashMap::new();
        let mut inputs = HashMap::new();
        let mut loadouts = Vec::new();

        for (i, p) in participants.iter().enumerate() {
            let (pos, rotation) = spawns[i % spawns.len()];
            let def = defs[i];
            entities.insert(
                p.id,
                TankEntity {
                    id: p.id,
                    pos,
                    rotation,
                    shape: def.shape,
                    size: def.size,
                    health: def.max_health,
                    max_health: def.max_health,
                    body_damage: def.body_damage(),
                    alive: true,
                },
            );
            inputs.insert(p.id, MoveState::default());
            loadouts.push(TankAssignment {
                id: p.id,
                tank: def.loadout(),
            });
        }

        let handle = MatchHandle {
            match_id: id,
            events: events_tx,
        };

        let arena = Self {
            id,
            bounds,
            participants,
            entities,
            inputs,
            loadouts,
            events_rx,
            finishing: false,
            closed: false,
            pending_end: None,
            outcome: None,
        };

        (arena, handle)
    }

    /// Run the authoritative tick loop until the match ends.
    pub async fn run(mut self) -> MatchOutcome {
        info!(match_id = %self.id, "Match started");

        self.send_match_start();

        let tick_duration = Duration::from_micros(1_000_000 / SIMULATION_TPS as u64);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while !self.closed {
            tick_interval.tick().await;

            // Queued events apply before this tick simulates
            self.process_events();
            if self.closed {
                break;
            }

            if let Some(pending) = &self.pending_end {
                if tokio::time::Instant::now() >= pending.at {
                    let (reason, winner) = (pending.reason, pending.winner);
                    self.end(reason, winner);
                    break;
                }
            }

            self.run_tick();
        }

        info!(match_id = %self.id, "Match ended");
        self.outcome.unwrap_or(MatchOutcome {
            reason: EndReason::Draw,
            winner: None,
        })
    }

    fn send_match_start(&self) {
        let roster: Vec<RosterEntry> = self
            .participants
            .iter()
            .map(|p| RosterEntry {
                id: p.id,
                name: p.name.clone(),
            })
            .collect();

        for p in &self.participants {
            let msg = ServerMsg::MatchStart {
                game_id: self.id,
                you: p.id,
                w: self.bounds.x,
                h: self.bounds.y,
                roster: roster.clone(),
                tanks: self.loadouts.clone(),
            };
            let _ = p.tx.try_send(msg);
        }
    }

    /// Drain all queued connection events.
    fn process_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event.kind {
                PlayerEventKind::Msg(msg) => self.handle_msg(event.conn_id, msg),
                PlayerEventKind::Disconnected => {
                    info!(match_id = %self.id, conn_id = %event.conn_id, "Participant disconnected");
                    self.end(EndReason::Dc, None);
                }
            }
            if self.closed {
                break;
            }
        }
    }

    fn handle_msg(&mut self, conn_id: Uuid, msg: ClientMsg) {
        match msg {
            ClientMsg::Input { w, a, s, d } => {
                // Dead tanks keep their last input, which no longer matters
                let alive = self.entities.get(&conn_id).is_some_and(|e| e.alive);
                if alive {
                    if let Some(state) = self.inputs.get_mut(&conn_id) {
                        *state = MoveState {
                            up: w,
                            left: a,
                            down: s,
                            right: d,
                        };
                    }
                }
            }
            ClientMsg::Aim { angle } => {
                if angle.is_finite() {
                    if let Some(entity) = self.entities.get_mut(&conn_id) {
                        if entity.alive {
                            entity.rotation = normalize_angle(angle);
                        }
                    }
                }
            }
            ClientMsg::LeaveGame => {
                info!(match_id = %self.id, conn_id = %conn_id, "Participant left the game");
                self.end(EndReason::Left, None);
            }
            // Queue traffic is meaningless mid-match
            ClientMsg::JoinQueue | ClientMsg::LeaveQueue => {}
        }
    }

    /// Run a single simulation tick
    fn run_tick(&mut self) {
        let dt = tick_delta();

        self.apply_movement(dt);
        self.resolve_collisions(dt);
        self.sweep_deaths();
        if !self.finishing {
            self.check_terminal();
        }
        self.broadcast_state();
    }

    fn apply_movement(&mut self, dt: f32) {
        for entity in self.entities.values_mut() {
            if !entity.alive {
                continue;
            }
            let Some(input) = self.inputs.get(&entity.id) else {
                continue;
            };
            let dir = input.direction();
            if dir != Vec2::ZERO {
                entity.pos += dir * TANK_SPEED * dt;
            }
            entity.pos = clamp_to_bounds(entity.pos, entity.size, self.bounds);
        }
    }

    fn resolve_collisions(&mut self, dt: f32) {
        let ids: Vec<Uuid> = self
            .entities
            .values()
            .filter(|e| e.alive)
            .map(|e| e.id)
            .collect();

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                self.resolve_pair(ids[i], ids[j], dt);
            }
        }
    }

    fn resolve_pair(&mut self, id_a: Uuid, id_b: Uuid, dt: f32) {
        let (Some(a), Some(b)) = (self.entities.get(&id_a), self.entities.get(&id_b)) else {
            return;
        };

        let shape_a = Shape::for_body(a.pos, a.rotation, a.shape, a.size);
        let shape_b = Shape::for_body(b.pos, b.rotation, b.shape, b.size);
        let Some(mtv) = compute_mtv(&shape_a, &shape_b) else {
            return;
        };

        // Read both sides before writing anything so contact damage is
        // simultaneous rather than order-dependent
        let push = mtv.axis * (mtv.depth / 2.0);
        let damage_to_a = b.body_damage * dt;
        let damage_to_b = a.body_damage * dt;

        let bounds = self.bounds;
        if let Some(a) = self.entities.get_mut(&id_a) {
            a.pos = clamp_to_bounds(a.pos - push, a.size, bounds);
            a.health -= damage_to_a;
        }
        if let Some(b) = self.entities.get_mut(&id_b) {
            b.pos = clamp_to_bounds(b.pos + push, b.size, bounds);
            b.health -= damage_to_b;
        }
    }

    fn sweep_deaths(&mut self) {
        for entity in self.entities.values_mut() {
            if entity.alive && entity.health <= 0.0 {
                entity.health = 0.0;
                entity.alive = false;
                info!(match_id = %self.id, entity_id = %entity.id, "Tank destroyed");
            }
        }
    }

    /// Detect a winner or a draw. Runs at most once per match thanks to
    /// the `finishing` latch.
    fn check_terminal(&mut self) {
        let alive: Vec<Uuid> = self
            .entities
            .values()
            .filter(|e| e.alive)
            .map(|e| e.id)
            .collect();

        match alive.len() {
            1 => {
                let winner = alive[0];
                let name = self
                    .participants
                    .iter()
                    .find(|p| p.id == winner)
                    .map(|p| p.name.as_str())
                    .unwrap_or("Unknown");
                self.send_to_all(ServerMsg::Announcement {
                    text: format!("{} wins!", name),
                });
                self.schedule_end(EndReason::Victory, Some(winner));
            }
            0 => {
                self.send_to_all(ServerMsg::Announcement {
                    text: "Draw!".to_string(),
                });
                self.schedule_end(EndReason::Draw, None);
            }
            _ => {}
        }
    }

    fn schedule_end(&mut self, reason: EndReason, winner: Option<Uuid>) {
        self.finishing = true;
        self.send_to_all(ServerMsg::ExitCountdown {
            seconds: EXIT_COUNTDOWN_SECS,
        });
        self.pending_end = Some(PendingEnd {
            at: tokio::time::Instant::now() + Duration::from_secs(EXIT_COUNTDOWN_SECS as u64),
            reason,
            winner,
        });
        info!(match_id = %self.id, reason = ?reason, "Match finishing");
    }

    fn broadcast_state(&self) {
        let players: Vec<PlayerSnapshot> = self
            .entities
            .values()
            .map(|e| PlayerSnapshot {
                id: e.id,
                x: e.pos.x,
                y: e.pos.y,
                rot: e.rotation,
                size: e.size,
                health: e.health,
                max_health: e.max_health,
                alive: e.alive,
                shape: e.shape,
            })
            .collect();

        self.send_to_all(ServerMsg::State {
            ts: unix_millis(),
            players,
        });
    }

    /// Ends the match once. Later calls are no-ops.
    fn end(&mut self, reason: EndReason, winner: Option<Uuid>) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.outcome = Some(MatchOutcome { reason, winner });
        self.send_to_all(ServerMsg::MatchEnd {
            reason,
            winner_id: winner,
        });
        info!(match_id = %self.id, reason = ?reason, "Match closed");
    }

    /// A participant whose outbox is full or gone just misses the message;
    /// delivery to the other participant is unaffected.
    fn send_to_all(&self, msg: ServerMsg) {
        for p in &self.participants {
            let _ = p.tx.try_send(msg.clone());
        }
    }
}

/// Keeps an entity's bounding radius inside the arena.
fn clamp_to_bounds(pos: Vec2, radius: f32, bounds: Vec2) -> Vec2 {
    Vec2::new(
        pos.x.clamp(radius, bounds.x - radius),
        pos.y.clamp(radius, bounds.y - radius),
    )
}
