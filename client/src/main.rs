use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use macroquad::prelude::*;
use tracing::info;
use uuid::Uuid;

use client::input::{InputTracker, MoveKeys};
use client::net::{self, NetEvent, NetHandle};
use client::render;
use client::state::MatchView;
use shared::protocol::{ClientMsg, EndReason, ServerMsg};

#[derive(Parser, Debug)]
#[command(name = "tank-arena-client", about = "Native client for the tank arena server")]
struct Args {
    /// WebSocket endpoint of the arena server
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
    server: String,

    /// Session id from /api/login, to play under an account name
    #[arg(long)]
    sid: Option<String>,
}

enum Phase {
    Menu,
    Searching,
    InMatch(Box<MatchView>),
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Tank Arena".to_string(),
        window_width: 1280,
        window_height: 720,
        ..Default::default()
    }
}

/// Wall-clock milliseconds, comparable with server snapshot timestamps.
fn unix_now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let url = match &args.sid {
        Some(sid) => format!("{}?sid={}", args.server, sid),
        None => args.server.clone(),
    };
    info!("Connecting to {url}");
    let mut net = net::connect(url);

    let mut phase = Phase::Menu;
    let mut tracker = InputTracker::default();
    let mut queue_len: u32 = 0;
    let mut note = String::from("Connecting...");
    let mut connected = false;

    loop {
        let now_ms = get_time() * 1000.0;
        let unix_ms = unix_now_ms();
        let view = Vec2::new(screen_width(), screen_height());
        let dt = get_frame_time();

        while let Some(event) = net.poll() {
            match event {
                NetEvent::Open => {
                    connected = true;
                    note.clear();
                }
                NetEvent::Closed => {
                    connected = false;
                    note = "Connection lost".into();
                    phase = Phase::Menu;
                }
                NetEvent::Message(msg) => handle_server_msg(
                    msg,
                    &mut phase,
                    &mut queue_len,
                    &mut note,
                    &mut tracker,
                    now_ms,
                    unix_ms,
                ),
            }
        }

        match &mut phase {
            Phase::Menu => {
                if connected && is_key_pressed(KeyCode::Enter) {
                    net.send(ClientMsg::JoinQueue);
                    phase = Phase::Searching;
                }
                render::draw_menu(&note, queue_len, view);
            }
            Phase::Searching => {
                if is_key_pressed(KeyCode::Escape) {
                    net.send(ClientMsg::LeaveQueue);
                    phase = Phase::Menu;
                }
                render::draw_searching(queue_len, view);
            }
            Phase::InMatch(match_view) => {
                // The server answers leaveGame with a matchEnd frame, which
                // is what actually returns us to the menu.
                if is_key_pressed(KeyCode::Escape) {
                    net.send(ClientMsg::LeaveGame);
                }
                update_match(match_view, &net, &mut tracker, view, dt, unix_ms, now_ms);
            }
        }

        next_frame().await;
    }
}

fn handle_server_msg(
    msg: ServerMsg,
    phase: &mut Phase,
    queue_len: &mut u32,
    note: &mut String,
    tracker: &mut InputTracker,
    now_ms: f64,
    unix_ms: f64,
) {
    match msg {
        ServerMsg::Hello => {}
        ServerMsg::QueueCount { n } => *queue_len = n,
        ServerMsg::Queued => {
            if matches!(phase, Phase::Menu) {
                *phase = Phase::Searching;
            }
        }
        ServerMsg::MatchStart {
            game_id,
            you,
            w,
            h,
            roster,
            tanks,
        } => {
            tracker.reset();
            *phase = Phase::InMatch(Box::new(MatchView::new(game_id, you, w, h, roster, tanks)));
        }
        ServerMsg::State { ts, players } => {
            if let Phase::InMatch(view) = phase {
                view.ingest_state(ts, players, unix_ms);
            }
        }
        ServerMsg::Announcement { text } => {
            if let Phase::InMatch(view) = phase {
                view.show_banner(text, now_ms);
            }
        }
        ServerMsg::ExitCountdown { seconds } => {
            if let Phase::InMatch(view) = phase {
                view.start_countdown(seconds, now_ms);
            }
        }
        ServerMsg::MatchEnd { reason, winner_id } => {
            *note = end_note(phase, reason, winner_id);
            *phase = Phase::Menu;
        }
    }
}

fn end_note(phase: &Phase, reason: EndReason, winner_id: Option<Uuid>) -> String {
    let you = match phase {
        Phase::InMatch(view) => Some(view.you),
        _ => None,
    };
    match reason {
        EndReason::Victory => {
            if winner_id.is_some() && winner_id == you {
                "Victory!".into()
            } else {
                "Defeat".into()
            }
        }
        EndReason::Draw => "Draw - both tanks fell together".into(),
        EndReason::Left => "The battle ended - a player left".into(),
        EndReason::Dc => "The battle ended - a player disconnected".into(),
    }
}

fn update_match(
    match_view: &mut MatchView,
    net: &NetHandle,
    tracker: &mut InputTracker,
    view: Vec2,
    dt: f32,
    unix_ms: f64,
    now_ms: f64,
) {
    let players = match_view.snapshots.sample(match_view.clock.render_ts(unix_ms));
    let me = players.iter().find(|p| p.id == match_view.you);
    let spectating = match_view.spectating();
    let bounds = match_view.bounds;

    if !spectating {
        let keys = MoveKeys {
            w: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            a: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            s: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            d: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
        };
        if let Some(msg) = tracker.movement(keys) {
            net.send(msg);
        }

        if let Some(me) = me {
            let (mx, my) = mouse_position();
            let world = render::screen_to_world(Vec2::new(mx, my), &match_view.camera, view);
            let angle = (world.y - me.y).atan2(world.x - me.x);
            if let Some(msg) = tracker.aim(angle, now_ms) {
                net.send(msg);
            }
            match_view.camera.follow(Vec2::new(me.x, me.y), bounds);
        }
    } else {
        let mut dir = Vec2::ZERO;
        if is_key_down(KeyCode::W) || is_key_down(KeyCode::Up) {
            dir.y -= 1.0;
        }
        if is_key_down(KeyCode::S) || is_key_down(KeyCode::Down) {
            dir.y += 1.0;
        }
        if is_key_down(KeyCode::A) || is_key_down(KeyCode::Left) {
            dir.x -= 1.0;
        }
        if is_key_down(KeyCode::D) || is_key_down(KeyCode::Right) {
            dir.x += 1.0;
        }
        match_view.camera.pan(dir, dt, bounds);

        if is_key_pressed(KeyCode::Equal) || is_key_pressed(KeyCode::KpAdd) {
            match_view.camera.zoom_step(1.0);
        }
        if is_key_pressed(KeyCode::Minus) || is_key_pressed(KeyCode::KpSubtract) {
            match_view.camera.zoom_step(-1.0);
        }
        // Wheel deltas map onto browser-style deltaY, one notch ~ 100.
        let wheel = mouse_wheel().1;
        if wheel != 0.0 {
            match_view.camera.zoom_wheel(-wheel * 100.0);
        }
    }

    match_view.camera.ease_zoom(spectating);

    render::draw_match(match_view, &players, view, now_ms);
}
