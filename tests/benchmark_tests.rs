//! Performance benchmarks for critical game systems

use server::collision::{resolve_collisions, CollisionRules};
use server::config::MatchConfig;
use server::game::GameState;
use shared::{
    decode_line, encode_line, Asteroid, ClientPacket, ControlState, Laser, PlayField,
    ServerPacket, Ship, Vec2,
};
use std::time::Instant;

fn busy_world() -> GameState {
    let mut world = GameState::new(
        MatchConfig {
            max_asteroids: 10,
            seed: Some(3),
            ..Default::default()
        },
        0.0,
    );
    world.start_match(0.0);
    world
}

/// Benchmarks collision resolution with a crowded field
#[test]
fn benchmark_collision_resolution() {
    let field = PlayField::default();
    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let mut ships = [Ship::new(0, &field, 0.0), Ship::new(1, &field, 0.0)];
        let mut asteroids: Vec<Asteroid> = (0..10)
            .map(|n| Asteroid::new(Vec2::new(n as f32 * 70.0, 300.0), Vec2::new(1.0, 1.0), 30.0))
            .collect();
        let mut lasers: Vec<Laser> = (0..20)
            .map(|n| Laser::fire(Vec2::new(n as f32 * 40.0, 100.0 + (i % 400) as f32), 0.0, n % 2))
            .collect();
        let mut scores = [0, 0];

        resolve_collisions(
            &mut ships,
            &mut asteroids,
            &mut lasers,
            &mut scores,
            CollisionRules { ship_collisions: true },
            10.0,
        );
    }

    let duration = start.elapsed();
    println!(
        "Collision resolution: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks full simulation ticks
#[test]
fn benchmark_game_tick() {
    let mut world = busy_world();
    let iterations = 3_000;
    let start = Instant::now();

    for i in 0..iterations {
        let now = i as f64 / 60.0;
        if i % 15 == 0 {
            world.apply_command(0, ClientPacket::Shoot {}, now);
            world.apply_command(1, ClientPacket::Shoot {}, now);
        }
        world.tick(now);
    }

    let duration = start.elapsed();
    println!(
        "Game tick: {} ticks in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // 50 seconds of match time should simulate in well under a second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks snapshot encoding, done once per tick on the server
#[test]
fn benchmark_snapshot_encoding() {
    let mut world = busy_world();
    for i in 0..30 {
        world.apply_command(i % 2, ClientPacket::Shoot {}, i as f64);
        world.tick(i as f64 / 60.0);
    }
    let snapshot = world.snapshot(1.0, 2);

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let line = encode_line(&snapshot).unwrap();
        assert!(line.ends_with('\n'));
    }

    let duration = start.elapsed();
    println!(
        "Snapshot encoding: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks decoding of the per-frame client message
#[test]
fn benchmark_intent_decoding() {
    let line = encode_line(&ClientPacket::UpdatePosition {
        pos: Vec2::new(321.5, 123.25),
        angle: 275.0,
    })
    .unwrap();

    let iterations = 50_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let packet: ClientPacket = decode_line(&line).unwrap();
        assert!(matches!(packet, ClientPacket::UpdatePosition { .. }));
    }

    let duration = start.elapsed();
    println!(
        "Intent decoding: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks client-side prediction and reconciliation
#[test]
fn benchmark_client_prediction() {
    use client::game::ClientGameState;

    let mut client_state = ClientGameState::new(0, 0.0);
    let world = busy_world();
    let snapshot = world.snapshot(0.5, 2);
    assert!(matches!(snapshot, ServerPacket::UpdateState { .. }));

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let now = i as f64 / 60.0;
        let controls = ControlState {
            forward: i % 2 == 0,
            turn_left: i % 3 == 0,
            turn_right: i % 5 == 0,
            ..Default::default()
        };
        client_state.predict(&controls, now);

        if i % 4 == 0 {
            client_state.apply_server_packet(snapshot.clone(), now);
        }
    }

    let duration = start.elapsed();
    println!(
        "Client prediction: {} frames in {:?} ({:.2} μs/frame)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}
