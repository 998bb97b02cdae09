use ghostrun::core::{distance, path_length, Coordinate};
use ghostrun::playback::{PlaybackConfig, PlaybackEngine, PlaybackState};
use ghostrun::telemetry::{
    BroadcastPublisher, MockPositionSink, RunEvent, SerializedSink, SessionRegistry,
};
use std::sync::Arc;
use std::time::Duration;

fn square() -> Vec<Coordinate> {
    vec![
        Coordinate::new(31.2300, 121.4700),
        Coordinate::new(31.2300, 121.4710),
        Coordinate::new(31.2309, 121.4710),
        Coordinate::new(31.2309, 121.4700),
        Coordinate::new(31.2300, 121.4700),
    ]
}

fn quick(loop_count: u32) -> PlaybackConfig {
    PlaybackConfig {
        base_speed_kmh: 20.0,
        speed_variance_kmh: 2.0,
        route_offset_meters: 3.0,
        loop_count,
        update_interval_ms: 500,
    }
}

#[tokio::test(start_paused = true)]
async fn test_two_loops_end_to_end() {
    let registry = Arc::new(SessionRegistry::new());
    let mock = Arc::new(MockPositionSink::new("phone"));
    let sink = Arc::new(SerializedSink::new(mock.clone(), registry.clone()));
    let publisher = Arc::new(BroadcastPublisher::new(100_000));
    let mut events = publisher.subscribe();
    let engine = PlaybackEngine::new(sink, publisher.clone());

    let stats = engine.prepare_route(&square(), 5.0).await.unwrap();
    let length = path_length(&square());
    assert!((stats.distance_meters - length).abs() < 1e-6);
    assert!(stats.points > square().len());

    engine.configure(quick(2)).await.unwrap();
    engine.start("phone-1").await.unwrap();

    let mut loops = Vec::new();
    let mut completed = None;
    let mut last_progress = (1, 0usize);
    while completed.is_none() {
        let (topic, event) = events.recv().await.unwrap();
        assert_eq!(topic, event.topic());
        match event {
            RunEvent::Update(snapshot) => {
                assert_eq!(snapshot.state, PlaybackState::Running);
                assert!((0.0..=1.0).contains(&snapshot.segment_progress));
                assert!(snapshot.point_index < snapshot.total_points);
                let speed = snapshot.current_speed_kmh;
                assert!((18.9..=21.1).contains(&speed), "speed {}", speed);
                // position never strays far from the route corners' box
                let p = snapshot.current_position.unwrap();
                assert!(distance(p, Coordinate::new(31.23045, 121.4705)) < 120.0);

                let progress = (snapshot.current_loop, snapshot.point_index);
                assert!(progress >= last_progress || snapshot.current_loop > last_progress.0);
                last_progress = progress;
            }
            RunEvent::LoopStarted { current_loop } => loops.push(current_loop),
            RunEvent::Completed(snapshot) => completed = Some(snapshot),
            RunEvent::Error { message, .. } => panic!("unexpected error: {}", message),
            RunEvent::Stopped(_) => panic!("run was not stopped"),
        }
    }

    let done = completed.unwrap();
    assert_eq!(done.state, PlaybackState::Idle);
    assert_eq!(loops, vec![2]);
    // jitter adds a little on top of the geometric length
    let travelled = done.total_distance_meters;
    assert!(travelled > 2.0 * length - 1.0 && travelled < 2.0 * length * 1.1, "{}", travelled);

    // pushes are spaced by the update interval
    let session = registry.get("phone-1").await.unwrap().info().await;
    let run_secs = done.elapsed_time_ms as f64 / 1000.0;
    assert!(session.positions_set as f64 <= run_secs / 0.5 + 2.0);
    assert!(session.positions_set as f64 >= run_secs / 0.5 * 0.8);
    assert_eq!(session.failures, 0);
    assert_eq!(mock.max_in_flight(), 1);

    assert_eq!(engine.status().await.state, PlaybackState::Idle);
    engine.start("phone-1").await.unwrap();
    engine.stop().await.unwrap();
    assert_eq!(mock.reset_count("phone-1").await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_route_swap_while_running() {
    let mock = Arc::new(MockPositionSink::new("phone"));
    let publisher = Arc::new(BroadcastPublisher::default());
    let engine = PlaybackEngine::new(mock.clone(), publisher);

    engine.prepare_route(&square(), 5.0).await.unwrap();
    engine.configure(PlaybackConfig { route_offset_meters: 0.0, ..quick(0) }).await.unwrap();
    engine.start("phone-1").await.unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;
    let before = engine.status().await;

    let elsewhere = vec![Coordinate::new(40.0, 116.0), Coordinate::new(40.001, 116.0)];
    let stats = engine.prepare_route(&elsewhere, 5.0).await.unwrap();
    assert_eq!(engine.status().await.total_points, before.total_points);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let after = engine.status().await;
    assert_eq!(after.total_points, stats.points);
    assert!(distance(after.current_position.unwrap(), elsewhere[0]) < 120.0);
    // the jump to the new route is not counted as travel
    assert!(after.total_distance_meters - before.total_distance_meters < 20.0);

    engine.stop().await.unwrap();
    assert_eq!(engine.status().await.state, PlaybackState::Idle);
}
