//! Wire protocol message definitions
//! These are the JSON text frames exchanged over the WebSocket connection.
//! Tags and field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Enter the matchmaking queue
    JoinQueue,

    /// Leave the matchmaking queue
    LeaveQueue,

    /// Movement key state, sent on change only
    Input { w: bool, a: bool, s: bool, d: bool },

    /// Facing direction in radians, throttled client-side
    Aim { angle: f32 },

    /// Voluntarily exit the active match
    LeaveGame,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Connection acknowledged
    Hello,

    /// Current queue size, broadcast to every connection on change
    QueueCount { n: u32 },

    /// Acknowledges this connection's own enqueue
    Queued,

    /// A match has been formed for this connection
    #[serde(rename_all = "camelCase")]
    MatchStart {
        game_id: Uuid,
        /// The recipient's own entity id
        you: Uuid,
        /// Arena dimensions
        w: f32,
        h: f32,
        roster: Vec<RosterEntry>,
        /// Visual loadout per participant
        tanks: Vec<TankAssignment>,
    },

    /// Authoritative world snapshot, sent every simulation tick
    State {
        /// Server timestamp in unix milliseconds
        ts: u64,
        players: Vec<PlayerSnapshot>,
    },

    /// Banner text shown for a fixed duration client-side
    Announcement { text: String },

    /// Countdown until the match is torn down
    ExitCountdown { seconds: u32 },

    /// The match is over; the client returns to the menu
    #[serde(rename_all = "camelCase")]
    MatchEnd {
        reason: EndReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner_id: Option<Uuid>,
    },
}

/// Why a match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// A participant sent leaveGame
    Left,
    /// A participant disconnected
    Dc,
    /// Exactly one entity survived
    Victory,
    /// Both entities died in the same tick
    Draw,
}

/// Name roster entry carried by matchStart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: Uuid,
    pub name: String,
}

/// Cosmetic tank description carried by matchStart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankLoadout {
    pub name: String,
    /// 0 = circle, otherwise regular polygon side count (>= 3)
    pub shape: u8,
    /// Circumscribed radius, world units
    pub size: f32,
    /// Barrel rectangles as [length, width, forward offset, side offset, direction radians]
    pub barrels: Vec<[f32; 5]>,
}

/// Pairs an entity id with its tank loadout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankAssignment {
    pub id: Uuid,
    pub tank: TankLoadout,
}

/// Per-entity state inside a state message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    /// Rotation in radians, normalized to (-pi, pi]
    pub rot: f32,
    pub size: f32,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    /// 0 = circle, otherwise regular polygon side count
    pub shape: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_camel_case_tags() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"input","w":true,"a":false,"s":false,"d":true}"#)
                .unwrap();
        match msg {
            ClientMsg::Input { w, a, s, d } => {
                assert!(w && d);
                assert!(!a && !s);
            }
            other => panic!("unexpected variant: {:?}", other),
        }

        assert!(matches!(
            serde_json::from_str::<ClientMsg>(r#"{"type":"joinQueue"}"#).unwrap(),
            ClientMsg::JoinQueue
        ));
        assert!(matches!(
            serde_json::from_str::<ClientMsg>(r#"{"type":"leaveGame"}"#).unwrap(),
            ClientMsg::LeaveGame
        ));
    }

    #[test]
    fn unknown_or_malformed_frames_fail_to_parse() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport","x":0}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>("not json at all").is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"w":true}"#).is_err());
    }

    #[test]
    fn match_start_serializes_camel_case_fields() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let msg = ServerMsg::MatchStart {
            game_id: Uuid::new_v4(),
            you: a,
            w: 1200.0,
            h: 800.0,
            roster: vec![
                RosterEntry { id: a, name: "alice".into() },
                RosterEntry { id: b, name: "bob".into() },
            ],
            tanks: vec![TankAssignment {
                id: a,
                tank: TankLoadout {
                    name: "Scout".into(),
                    shape: 0,
                    size: 14.0,
                    barrels: vec![[22.0, 8.0, 0.0, 0.0, 0.0]],
                },
            }],
        };

        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "matchStart");
        assert!(v.get("gameId").is_some());
        assert!(v.get("you").is_some());
        assert_eq!(v["roster"][0]["name"], "alice");
        assert_eq!(v["tanks"][0]["tank"]["barrels"][0][0], 22.0);
        assert!(v.get("game_id").is_none());
    }

    #[test]
    fn state_snapshot_round_trips_with_max_health_spelling() {
        let msg = ServerMsg::State {
            ts: 1234,
            players: vec![PlayerSnapshot {
                id: Uuid::new_v4(),
                x: 1.0,
                y: 2.0,
                rot: 0.5,
                size: 14.0,
                health: 90.0,
                max_health: 120.0,
                alive: true,
                shape: 0,
            }],
        };

        let text = serde_json::to_string(&msg).unwrap();
        assert!(text.contains("\"maxHealth\""));
        assert!(!text.contains("max_health"));

        match serde_json::from_str::<ServerMsg>(&text).unwrap() {
            ServerMsg::State { ts, players } => {
                assert_eq!(ts, 1234);
                assert_eq!(players[0].max_health, 120.0);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn match_end_omits_winner_for_draws() {
        let draw = serde_json::to_value(&ServerMsg::MatchEnd {
            reason: EndReason::Draw,
            winner_id: None,
        })
        .unwrap();
        assert_eq!(draw["reason"], "draw");
        assert!(draw.get("winnerId").is_none());

        let win_id = Uuid::new_v4();
        let victory = serde_json::to_value(&ServerMsg::MatchEnd {
            reason: EndReason::Victory,
            winner_id: Some(win_id),
        })
        .unwrap();
        assert_eq!(victory["reason"], "victory");
        assert_eq!(victory["winnerId"], win_id.to_string());
    }
}
