//! Session state-machine walks driven through the in-memory transport.

use picocraft_net::mem::{MemListener, MemTransport};
use picocraft_net::{ids, peek_varint, Reader, Writer, PROTOCOL_VERSION};
use picocraft_server::{Server, ServerConfig, SessionState};
use picocraft_world::BLOCK_AIR;

fn test_config(name: &str) -> ServerConfig {
    ServerConfig {
        view_distance: 1,
        save_path: std::env::temp_dir().join(format!("picocraft-test-{name}.dat")),
        registry_dir: "/nonexistent/registries".into(),
        network_timeout_ms: 200,
        ..ServerConfig::default()
    }
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(payload.len() as i32);
    w.raw(payload);
    w.into_inner()
}

fn client_handshake(next_state: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::handshake::INTENTION);
    w.varint(PROTOCOL_VERSION);
    w.string("localhost");
    w.u16(25565);
    w.varint(next_state);
    frame(w.as_slice())
}

fn client_login_start(name: &str, uuid: u128) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::login::SB_START);
    w.string(name);
    w.u128(uuid);
    frame(w.as_slice())
}

fn client_login_ack() -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::login::SB_ACKNOWLEDGED);
    frame(w.as_slice())
}

fn client_finish_ack() -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::config::SB_FINISH_ACK);
    frame(w.as_slice())
}

fn client_dig(x: i32, y: i32, z: i32, sequence: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_sb::PLAYER_ACTION);
    w.varint(2); // finished digging
    w.position(x, y, z);
    w.u8(1);
    w.varint(sequence);
    frame(w.as_slice())
}

/// Split a raw outbound byte stream into packet payloads.
fn split_frames(mut bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let (len, width) = peek_varint(bytes)
            .expect("valid length prefix")
            .expect("complete length prefix");
        let len = len as usize;
        assert!(bytes.len() >= width + len, "truncated outbound frame");
        frames.push(bytes[width..width + len].to_vec());
        bytes = &bytes[width + len..];
    }
    frames
}

fn packet_id(frame: &[u8]) -> i32 {
    Reader::new(frame).varint().expect("packet id")
}

/// Stage a client that walks straight to the play state.
fn playing_server(config: ServerConfig) -> Server<MemListener> {
    let mut transport = MemTransport::new();
    transport.push_inbound(&client_handshake(2));
    transport.push_inbound(&client_login_start("Tester", 0xCAFE));
    transport.push_inbound(&client_login_ack());
    transport.push_inbound(&client_finish_ack());

    let mut listener = MemListener::new();
    listener.push_connection(transport);
    let mut server = Server::with_listener(listener, config).expect("server boots");
    server.poll_once().expect("poll");
    server
}

#[test]
fn handshake_walks_to_play_with_exactly_one_login_packet() {
    let mut server = playing_server(test_config("handshake"));
    assert_eq!(server.sessions().len(), 1);
    assert_eq!(server.sessions()[0].state, SessionState::Play);
    assert_eq!(server.sessions()[0].username, "Tester");
    assert_eq!(server.sessions()[0].uuid, 0xCAFE);

    let outbound = server.sessions_mut()[0].conn.transport_mut().take_outbound();
    let frames = split_frames(&outbound);

    let login_success = frames
        .iter()
        .filter(|f| packet_id(f) == ids::login::CB_SUCCESS)
        .count();
    // Login success and configuration finish precede play.
    assert_eq!(login_success, 1);
    assert!(frames
        .iter()
        .any(|f| packet_id(f) == ids::config::CB_FINISH));

    let login_play = frames
        .iter()
        .filter(|f| packet_id(f) == ids::play_cb::LOGIN)
        .count();
    assert_eq!(login_play, 1, "exactly one login-play packet");

    // The initial position sync is part of the same burst.
    assert!(frames
        .iter()
        .any(|f| packet_id(f) == ids::play_cb::SYNC_PLAYER_POSITION));
}

#[test]
fn status_request_and_ping_echo() {
    let mut transport = MemTransport::new();
    transport.push_inbound(&client_handshake(1));
    let mut w = Writer::new();
    w.varint(ids::status::SB_REQUEST);
    transport.push_inbound(&frame(w.as_slice()));
    let mut w = Writer::new();
    w.varint(ids::status::SB_PING);
    w.i64(0x1234_5678);
    transport.push_inbound(&frame(w.as_slice()));

    let mut listener = MemListener::new();
    listener.push_connection(transport);
    let mut server =
        Server::with_listener(listener, test_config("status")).expect("server boots");
    server.poll_once().expect("poll");

    // The ping concludes the exchange and the session is reaped.
    assert!(server.sessions().is_empty());
}

#[test]
fn dig_applies_overlay_and_acknowledges() {
    let mut server = playing_server(test_config("dig"));
    let (sx, sy, sz) = server.world.spawn;
    let target_y = sy - 1; // the block under the player's feet

    // Pretend the spawn chunk already streamed so broadcasts apply.
    server.sessions_mut()[0]
        .loaded_chunks
        .insert((sx.div_euclid(16), sz.div_euclid(16)));
    server.sessions_mut()[0].conn.transport_mut().take_outbound();

    let before = server.world.engine.block_at(sx, target_y, sz);
    assert_ne!(before, BLOCK_AIR, "expected solid ground under spawn");

    server.sessions_mut()[0]
        .conn
        .transport_mut()
        .push_inbound(&client_dig(sx, target_y, sz, 41));
    server.poll_once().expect("poll");

    assert_eq!(server.world.engine.block_at(sx, target_y, sz), BLOCK_AIR);

    let outbound = server.sessions_mut()[0].conn.transport_mut().take_outbound();
    let frames = split_frames(&outbound);
    assert!(frames
        .iter()
        .any(|f| packet_id(f) == ids::play_cb::ACK_BLOCK_CHANGE));
    assert!(frames
        .iter()
        .any(|f| packet_id(f) == ids::play_cb::BLOCK_UPDATE));

    // The surface block's drop landed in the inventory.
    let non_empty = server.sessions()[0]
        .inventory
        .slots()
        .iter()
        .filter(|s| !s.is_empty())
        .count();
    assert_eq!(non_empty, 1);
}

#[test]
fn keepalive_timeout_moves_session_to_closing_and_reaps() {
    let mut config = test_config("keepalive");
    config.keepalive_timeout_ms = 0;
    let mut server = playing_server(config);
    assert_eq!(server.sessions().len(), 1);

    std::thread::sleep(std::time::Duration::from_millis(5));
    server.world_tick();
    assert!(server.sessions()[0].is_closing());

    server.poll_once().expect("poll");
    assert!(server.sessions().is_empty(), "closing session is reaped");
}

#[test]
fn overflowing_the_block_change_index_kicks_with_world_full() {
    let mut config = test_config("worldfull");
    config.max_block_changes = 1;
    let mut server = playing_server(config);
    let (sx, sy, sz) = server.world.spawn;

    // One unrelated change fills the single-entry index.
    server
        .world
        .engine
        .set_block(1000, 10, 1000, picocraft_world::BLOCK_STONE)
        .expect("first change fits");

    server.sessions_mut()[0].conn.transport_mut().take_outbound();
    server.sessions_mut()[0]
        .conn
        .transport_mut()
        .push_inbound(&client_dig(sx, sy - 1, sz, 7));
    server.poll_once().expect("poll");

    // The offending session is gone; the server lives on.
    assert!(server.sessions().is_empty());
    assert_eq!(
        server.world.engine.changes().len(),
        1,
        "the overflowing edit was not applied"
    );
}

#[test]
fn chunk_streaming_marks_columns_loaded() {
    let mut server = playing_server(test_config("streaming"));
    // Two ticks stream a few columns of the 3x3 view window.
    server.world_tick();
    server.world_tick();

    let session = &server.sessions()[0];
    assert!(
        !session.loaded_chunks.is_empty(),
        "columns should be marked loaded after ticks"
    );
    let outbound = server.sessions_mut()[0].conn.transport_mut().take_outbound();
    let frames = split_frames(&outbound);
    assert!(frames
        .iter()
        .any(|f| packet_id(f) == ids::play_cb::CHUNK_DATA));
}
