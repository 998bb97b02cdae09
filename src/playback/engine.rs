use crate::core::Coordinate;
use crate::error::{EngineError, EngineResult};
use crate::playback::clock::RunClock;
use crate::playback::cursor::{RunCursor, Tick};
use crate::playback::{PlaybackConfig, PlaybackSnapshot, PlaybackState};
use crate::route::{densify, Route, RouteStats};
use crate::telemetry::{EventPublisher, PositionSink, RunEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fixed internal tick, independent of how often the device is updated
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on a single sink call before it is reported as failed
pub const SINK_TIMEOUT: Duration = Duration::from_secs(2);

/// Largest reported segment progress; progress is a half-open [0, 1)
const MAX_SEGMENT_PROGRESS: f64 = 1.0 - f64::EPSILON;

/// How often a running engine writes a progress line to the debug log
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Playback engine for simulated movement along a route
///
/// Owns one run at a time. The run is driven by a background tick task and a
/// separate reporter task that forwards the latest position to the sink, so
/// a slow device never holds back the simulation.
///
/// Lock order is `task` before `shared`; the background tasks only ever take
/// `shared`.
pub struct PlaybackEngine {
    shared: Arc<Mutex<Shared>>,
    sink: Arc<dyn PositionSink>,
    publisher: Arc<dyn EventPublisher>,
    task: Mutex<Option<RunTask>>,
}

/// State guarded by the engine lock
struct Shared {
    state: PlaybackState,
    route: Option<Route>,
    config: PlaybackConfig,
    /// Replacements requested mid-run, applied at the next tick boundary
    pending_route: Option<Route>,
    pending_config: Option<PlaybackConfig>,
    cursor: Option<RunCursor>,
    clock: Option<RunClock>,
}

/// Handles for the tasks of one run
struct RunTask {
    device_id: String,
    cancel: CancellationToken,
    ticker: JoinHandle<()>,
    reporter: JoinHandle<()>,
}

impl RunTask {
    /// Cancel both tasks and wait until neither can run again
    async fn shutdown(self) -> String {
        self.cancel.cancel();
        if let Err(e) = self.ticker.await {
            warn!(device = %self.device_id, "Tick task ended abnormally: {}", e);
        }
        if let Err(e) = self.reporter.await {
            warn!(device = %self.device_id, "Reporter task ended abnormally: {}", e);
        }
        self.device_id
    }
}

/// Position handed from the tick task to the reporter
#[derive(Debug, Clone, Copy)]
struct Report {
    position: Coordinate,
    min_spacing: Duration,
}

/// What the tick task must do after releasing the lock
enum TickEffects {
    Nothing,
    Moved {
        report: Report,
        snapshot: PlaybackSnapshot,
        loop_started: Option<u32>,
        log_progress: bool,
    },
    RouteEnd {
        loop_started: Option<u32>,
    },
    Completed(PlaybackSnapshot),
    Faulted(String),
}

impl Shared {
    fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            route: None,
            config: PlaybackConfig::default(),
            pending_route: None,
            pending_config: None,
            cursor: None,
            clock: None,
        }
    }

    fn snapshot(&self, now: Instant) -> PlaybackSnapshot {
        let route_len = self.route.as_ref().map(Route::len).unwrap_or(0);
        let elapsed = self.clock.map(|c| c.elapsed(now)).unwrap_or_default();

        match &self.cursor {
            Some(cursor) => {
                // past the last segment means "at the end of the last segment"
                let last_segment = route_len.saturating_sub(2);
                let (point_index, progress) = if cursor.point_index > last_segment {
                    (last_segment, 1.0)
                } else {
                    (cursor.point_index, cursor.progress)
                };
                PlaybackSnapshot {
                    state: self.state,
                    current_loop: cursor.current_loop,
                    point_index,
                    total_points: route_len,
                    segment_progress: progress.clamp(0.0, MAX_SEGMENT_PROGRESS),
                    current_position: cursor.position,
                    current_speed_kmh: cursor.speed_kmh,
                    total_distance_meters: cursor.total_distance,
                    elapsed_time_ms: elapsed.as_millis() as u64,
                }
            }
            None => PlaybackSnapshot {
                state: self.state,
                total_points: route_len,
                ..PlaybackSnapshot::default()
            },
        }
    }

    /// One tick under the lock
    fn tick(&mut self, rng: &mut fastrand::Rng, last_progress_log: &mut Duration) -> TickEffects {
        if self.state != PlaybackState::Running {
            return TickEffects::Nothing;
        }

        if let Some(config) = self.pending_config.take() {
            debug!(speed_kmh = config.base_speed_kmh, "Applying queued config");
            self.config = config;
        }
        if let Some(route) = self.pending_route.take() {
            debug!(points = route.len(), "Applying queued route");
            if let Some(cursor) = self.cursor.as_mut() {
                cursor.restart_at(route.first());
            }
            self.route = Some(route);
        }

        let now = Instant::now();
        let elapsed = self.clock.map(|c| c.elapsed(now)).unwrap_or_default();

        let (Some(route), Some(cursor)) = (self.route.as_ref(), self.cursor.as_mut()) else {
            self.finish(now);
            return TickEffects::Faulted("run has no route".to_string());
        };

        let loop_before = cursor.current_loop;
        let outcome = cursor.advance(route, &self.config, elapsed, TICK_INTERVAL, rng);
        let loop_started = (cursor.current_loop != loop_before).then_some(cursor.current_loop);

        match outcome {
            Ok(Tick::Moved(position)) => {
                let log_progress = elapsed.saturating_sub(*last_progress_log) >= PROGRESS_LOG_INTERVAL;
                if log_progress {
                    *last_progress_log = elapsed;
                }
                TickEffects::Moved {
                    report: Report {
                        position,
                        min_spacing: self.config.update_interval(),
                    },
                    snapshot: self.snapshot(now),
                    loop_started,
                    log_progress,
                }
            }
            Ok(Tick::RouteEnd) => TickEffects::RouteEnd { loop_started },
            Ok(Tick::Completed) => {
                self.finish(now);
                TickEffects::Completed(self.snapshot(now))
            }
            Err(fault) => {
                self.finish(now);
                TickEffects::Faulted(fault.to_string())
            }
        }
    }

    /// End the run but keep its counters readable
    fn finish(&mut self, now: Instant) {
        self.state = PlaybackState::Idle;
        if let Some(clock) = self.clock.as_mut() {
            clock.finish(now);
        }
    }
}

impl PlaybackEngine {
    pub fn new(sink: Arc<dyn PositionSink>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::new())),
            sink,
            publisher,
            task: Mutex::new(None),
        }
    }

    /// Densify `points` and make the result the route for the next run
    ///
    /// While a run is active the route is queued and swapped in at the next
    /// tick; traversal restarts at its first point, counters carry on.
    pub async fn prepare_route(&self, points: &[Coordinate], max_segment_meters: f64) -> EngineResult<RouteStats> {
        let route = densify(points, max_segment_meters)?;
        info!(
            raw_points = points.len(),
            points = route.len(),
            length_m = %format!("{:.0}", route.length_meters()),
            "Route prepared"
        );
        self.set_route(route).await
    }

    /// Use an already prepared route
    pub async fn set_route(&self, route: Route) -> EngineResult<RouteStats> {
        let stats = route.stats();
        let mut shared = self.shared.lock().await;
        if shared.state == PlaybackState::Idle {
            shared.route = Some(route);
        } else {
            shared.pending_route = Some(route);
        }
        Ok(stats)
    }

    /// Replace the playback config
    ///
    /// Validation errors are returned immediately. While a run is active the
    /// config is queued and applied atomically at the next tick.
    pub async fn configure(&self, config: PlaybackConfig) -> EngineResult<()> {
        config.validate()?;
        info!(
            speed_kmh = config.base_speed_kmh,
            variance_kmh = config.speed_variance_kmh,
            offset_m = config.route_offset_meters,
            loops = config.loop_count,
            "Playback config updated"
        );

        let mut shared = self.shared.lock().await;
        if shared.state == PlaybackState::Idle {
            shared.config = config;
        } else {
            shared.pending_config = Some(config);
        }
        Ok(())
    }

    /// Config the engine will use from the next tick on
    pub async fn config(&self) -> PlaybackConfig {
        let shared = self.shared.lock().await;
        shared.pending_config.clone().unwrap_or_else(|| shared.config.clone())
    }

    /// Start a run that drives `device_id`
    pub async fn start(&self, device_id: &str) -> EngineResult<()> {
        let mut task = self.task.lock().await;

        {
            let shared = self.shared.lock().await;
            if shared.state != PlaybackState::Idle {
                return Err(EngineError::AlreadyRunning);
            }
            if shared.route.is_none() {
                return Err(EngineError::NoRouteConfigured);
            }
            shared.config.validate()?;
        }

        // a previous run that completed on its own still has joined tasks to reap
        if let Some(previous) = task.take() {
            previous.shutdown().await;
        }

        let mut shared = self.shared.lock().await;
        let Some(start) = shared.route.as_ref().map(Route::first) else {
            return Err(EngineError::NoRouteConfigured);
        };
        shared.state = PlaybackState::Running;
        shared.cursor = Some(RunCursor::new(start));
        shared.clock = Some(RunClock::start(Instant::now()));
        shared.pending_config = None;
        shared.pending_route = None;

        info!(
            device = device_id,
            speed_kmh = shared.config.base_speed_kmh,
            points = shared.route.as_ref().map(Route::len).unwrap_or(0),
            "Playback started"
        );
        drop(shared);

        let cancel = CancellationToken::new();
        let (positions_tx, positions_rx) = watch::channel(None);

        let reporter = tokio::spawn(report_positions(
            self.sink.clone(),
            self.publisher.clone(),
            device_id.to_string(),
            positions_rx,
            cancel.clone(),
        ));
        let ticker = tokio::spawn(run_ticks(
            self.shared.clone(),
            self.publisher.clone(),
            positions_tx,
            cancel.clone(),
        ));

        *task = Some(RunTask {
            device_id: device_id.to_string(),
            cancel,
            ticker,
            reporter,
        });
        Ok(())
    }

    /// Freeze the run; paused time does not count as elapsed
    pub async fn pause(&self) -> EngineResult<()> {
        let mut shared = self.shared.lock().await;
        if shared.state != PlaybackState::Running {
            return Err(EngineError::InvalidStateTransition {
                from: shared.state,
                action: "pause",
            });
        }
        shared.state = PlaybackState::Paused;
        if let Some(clock) = shared.clock.as_mut() {
            clock.pause(Instant::now());
        }
        info!("Playback paused");
        Ok(())
    }

    pub async fn resume(&self) -> EngineResult<()> {
        let mut shared = self.shared.lock().await;
        if shared.state != PlaybackState::Paused {
            return Err(EngineError::InvalidStateTransition {
                from: shared.state,
                action: "resume",
            });
        }
        shared.state = PlaybackState::Running;
        if let Some(clock) = shared.clock.as_mut() {
            clock.resume(Instant::now());
        }
        info!("Playback resumed");
        Ok(())
    }

    /// Cancel the run and hand the device back its real location
    ///
    /// Safe to call in any state and more than once. When this returns, no
    /// tick or position push of the cancelled run will happen again. A failed
    /// reset is logged; the engine is idle either way.
    pub async fn stop(&self) -> EngineResult<()> {
        let mut task = self.task.lock().await;
        let Some(run) = task.take() else {
            return Ok(());
        };
        let device_id = run.shutdown().await;

        let snapshot = {
            let mut shared = self.shared.lock().await;
            let now = Instant::now();
            shared.finish(now);
            let snapshot = shared.snapshot(now);
            shared.cursor = None;
            shared.clock = None;
            shared.pending_config = None;
            shared.pending_route = None;
            snapshot
        };

        match tokio::time::timeout(SINK_TIMEOUT, self.sink.reset_position(&device_id)).await {
            Ok(Ok(())) => info!(device = %device_id, "Device location reset"),
            Ok(Err(e)) => warn!(device = %device_id, "Failed to reset device location: {}", e),
            Err(_) => warn!(device = %device_id, "Timed out resetting device location"),
        }

        info!(
            distance_m = %format!("{:.0}", snapshot.total_distance_meters),
            elapsed_ms = snapshot.elapsed_time_ms,
            "Playback stopped"
        );
        self.publisher.emit(RunEvent::Stopped(snapshot));
        Ok(())
    }

    /// Consistent view of the current or last run
    pub async fn status(&self) -> PlaybackSnapshot {
        self.shared.lock().await.snapshot(Instant::now())
    }

    pub async fn state(&self) -> PlaybackState {
        self.shared.lock().await.state
    }

    /// Put the device at a single fixed position; only while idle
    pub async fn set_single_location(&self, device_id: &str, position: Coordinate) -> EngineResult<()> {
        self.ensure_idle().await?;
        match tokio::time::timeout(SINK_TIMEOUT, self.sink.set_position(device_id, position)).await {
            Ok(Ok(())) => {
                info!(device = device_id, %position, "Single location set");
                Ok(())
            }
            Ok(Err(e)) => Err(EngineError::SinkUnavailable(e.to_string())),
            Err(_) => Err(EngineError::SinkUnavailable("timed out".to_string())),
        }
    }

    /// Restore the device's real location; only while idle
    pub async fn reset_location(&self, device_id: &str) -> EngineResult<()> {
        self.ensure_idle().await?;
        match tokio::time::timeout(SINK_TIMEOUT, self.sink.reset_position(device_id)).await {
            Ok(Ok(())) => {
                info!(device = device_id, "Device location reset to real position");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(device = device_id, "Failed to reset location: {}", e);
                Err(EngineError::SinkUnavailable(e.to_string()))
            }
            Err(_) => Err(EngineError::SinkUnavailable("timed out".to_string())),
        }
    }

    async fn ensure_idle(&self) -> EngineResult<()> {
        if self.shared.lock().await.state != PlaybackState::Idle {
            return Err(EngineError::AlreadyRunning);
        }
        Ok(())
    }
}

/// Tick loop of one run
///
/// Exits on cancellation, completion, or a fault. Dropping `positions` on
/// exit lets the reporter flush the last position and finish.
async fn run_ticks(
    shared: Arc<Mutex<Shared>>,
    publisher: Arc<dyn EventPublisher>,
    positions: watch::Sender<Option<Report>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
    let mut rng = fastrand::Rng::new();
    let mut last_progress_log = Duration::ZERO;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let effects = shared.lock().await.tick(&mut rng, &mut last_progress_log);

        match effects {
            TickEffects::Nothing => {}
            TickEffects::Moved { report, snapshot, loop_started, log_progress } => {
                if let Some(current_loop) = loop_started {
                    info!(current_loop, "Starting loop");
                    publisher.emit(RunEvent::LoopStarted { current_loop });
                }
                positions.send_replace(Some(report));
                if log_progress {
                    debug!(
                        distance_m = %format!("{:.0}", snapshot.total_distance_meters),
                        speed_kmh = %format!("{:.1}", snapshot.current_speed_kmh),
                        position = %report.position,
                        current_loop = snapshot.current_loop,
                        "Running"
                    );
                }
                publisher.emit(RunEvent::Update(snapshot));
            }
            TickEffects::RouteEnd { loop_started } => {
                if let Some(current_loop) = loop_started {
                    publisher.emit(RunEvent::LoopStarted { current_loop });
                }
            }
            TickEffects::Completed(snapshot) => {
                info!(
                    distance_m = %format!("{:.0}", snapshot.total_distance_meters),
                    loops = snapshot.current_loop,
                    "Playback completed"
                );
                publisher.emit(RunEvent::Completed(snapshot));
                break;
            }
            TickEffects::Faulted(message) => {
                error!("Playback aborted: {}", message);
                publisher.emit(RunEvent::Error { message, fatal: true });
                break;
            }
        }
    }
}

/// Forwards the newest position to the sink, at most once per `min_spacing`
///
/// Positions produced while a push is in flight are coalesced; only the
/// latest one is sent.
async fn report_positions(
    sink: Arc<dyn PositionSink>,
    publisher: Arc<dyn EventPublisher>,
    device_id: String,
    mut positions: watch::Receiver<Option<Report>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = positions.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let Some(report) = *positions.borrow_and_update() else {
            continue;
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = tokio::time::timeout(SINK_TIMEOUT, sink.set_position(&device_id, report.position)) => result,
        };
        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("Failed to set location: {}", e)),
            Err(_) => Some(format!("Setting location timed out after {:?}", SINK_TIMEOUT)),
        };
        if let Some(message) = failure {
            warn!(device = %device_id, "{}", message);
            publisher.emit(RunEvent::Error { message, fatal: false });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(report.min_spacing) => {}
        }
    }
}
