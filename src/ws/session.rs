//! Per-connection session controller and the autonomous tick loop

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::game::{ConnectionId, GameEvent, SessionId, SessionRegistry, SharedEngine};
use crate::gesture::{GestureExtractor, GestureLabel};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Everything a controller needs for one live connection
pub struct SessionContext {
    pub session_id: SessionId,
    pub connection_id: ConnectionId,
    pub engine: SharedEngine,
    pub registry: Arc<SessionRegistry>,
    pub gestures: Arc<dyn GestureExtractor>,
    pub outbound: mpsc::Sender<ServerMsg>,
    pub tick_period: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Outbound channel closed")]
    OutboundClosed,
}

/// Bridges one connection to one engine. Owns at most one tick-loop task.
pub struct SessionController {
    ctx: SessionContext,
    accepts_frames: bool,
    gesture_tx: watch::Sender<GestureLabel>,
    tick_loop: Option<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(ctx: SessionContext) -> Self {
        let accepts_frames = ctx.registry.config().accepts_frames;
        let (gesture_tx, _) = watch::channel(GestureLabel::None);
        Self {
            ctx,
            accepts_frames,
            gesture_tx,
            tick_loop: None,
        }
    }

    #[cfg(test)]
    pub fn tick_loop_running(&self) -> bool {
        self.tick_loop.as_ref().map_or(false, |handle| !handle.is_finished())
    }

    /// Apply one inbound message. Only a closed outbound channel is an error.
    pub async fn handle(&mut self, msg: ClientMsg) -> Result<(), SessionError> {
        match msg {
            ClientMsg::Start => self.start(false).await,
            ClientMsg::Restart => self.start(true).await,
            ClientMsg::Command { command } => {
                if !command.is_empty() {
                    self.ctx.engine.lock().apply_command(&command);
                }
                Ok(())
            }
            ClientMsg::Frame { frame } => self.handle_frame(&frame).await,
            ClientMsg::Update => {
                let (events, state) = {
                    let mut engine = self.ctx.engine.lock();
                    (engine.tick(), engine.snapshot())
                };
                log_events(self.ctx.session_id, &events);
                self.send(ServerMsg::GameState {
                    state,
                    gesture: self.held_gesture(),
                })
                .await
            }
            ClientMsg::Ping => self.send(ServerMsg::Pong).await,
            ClientMsg::StopCamera => {
                info!(session_id = %self.ctx.session_id, "Camera stop requested");
                self.gesture_tx.send_replace(GestureLabel::None);
                self.send(ServerMsg::CameraStopped).await
            }
            ClientMsg::Unknown => {
                warn!(session_id = %self.ctx.session_id, "Unknown message type");
                Ok(())
            }
        }
    }

    /// `start` and `restart`: stop the old loop, reset, reply, then start a
    /// new loop so the reply always precedes the first pushed state.
    async fn start(&mut self, restart: bool) -> Result<(), SessionError> {
        self.cancel_tick_loop().await;

        let state = {
            let mut engine = self.ctx.engine.lock();
            engine.start();
            engine.snapshot()
        };
        self.gesture_tx.send_replace(GestureLabel::None);

        let reply = if restart {
            ServerMsg::GameRestarted { state }
        } else {
            ServerMsg::GameStarted { state }
        };
        self.send(reply).await?;

        info!(session_id = %self.ctx.session_id, restart, "Game started, launching tick loop");
        self.spawn_tick_loop();
        Ok(())
    }

    async fn handle_frame(&mut self, frame: &str) -> Result<(), SessionError> {
        if !self.accepts_frames {
            debug!(session_id = %self.ctx.session_id, "Frame ignored by this variant");
            return Ok(());
        }
        if frame.is_empty() {
            return Ok(());
        }

        let reading = self.ctx.gestures.extract(frame);

        if let Some(annotated) = reading.annotated_frame.clone() {
            self.send(ServerMsg::VideoFrame {
                frame: annotated,
                gesture: reading.label,
                hand_detected: reading.hand_detected,
                description: reading.description.clone(),
            })
            .await?;
        }

        // Every labelled frame moves again, so a held gesture keeps moving
        if let Some(direction) = reading.label.direction() {
            let moved = self.ctx.engine.lock().apply_direction(direction);
            if moved && *self.gesture_tx.borrow() != reading.label {
                info!(session_id = %self.ctx.session_id, "{}", reading.description);
            }
        }
        self.gesture_tx.send_replace(reading.label);

        Ok(())
    }

    fn held_gesture(&self) -> Option<GestureLabel> {
        self.accepts_frames.then(|| *self.gesture_tx.borrow())
    }

    async fn send(&self, msg: ServerMsg) -> Result<(), SessionError> {
        self.ctx
            .outbound
            .send(msg)
            .await
            .map_err(|_| SessionError::OutboundClosed)
    }

    fn spawn_tick_loop(&mut self) {
        let tick_loop = TickLoop {
            session_id: self.ctx.session_id,
            connection_id: self.ctx.connection_id,
            engine: self.ctx.engine.clone(),
            registry: self.ctx.registry.clone(),
            outbound: self.ctx.outbound.clone(),
            gesture_rx: self.accepts_frames.then(|| self.gesture_tx.subscribe()),
            period: self.ctx.tick_period,
        };
        self.tick_loop = Some(tokio::spawn(tick_loop.run()));
    }

    /// Abort the loop and wait until its task is gone
    async fn cancel_tick_loop(&mut self) {
        if let Some(handle) = self.tick_loop.take() {
            handle.abort();
            match handle.await {
                Err(e) if e.is_panic() => {
                    error!(session_id = %self.ctx.session_id, error = %e, "Tick loop panicked");
                }
                _ => debug!(session_id = %self.ctx.session_id, "Tick loop cancelled"),
            }
        }
    }

    /// Connection teardown: stop ticking and drop the session's engine
    pub async fn close(mut self) {
        self.cancel_tick_loop().await;
        self.ctx
            .registry
            .release(&self.ctx.session_id, self.ctx.connection_id);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(handle) = self.tick_loop.take() {
            handle.abort();
        }
    }
}

/// Session-scoped log lines for what a tick did
fn log_events(session_id: SessionId, events: &[GameEvent]) {
    for event in events {
        match *event {
            GameEvent::Spawned { obstacle_id } => {
                trace!(session_id = %session_id, obstacle_id, "Obstacle spawned");
            }
            GameEvent::Cleared { obstacle_id, score } => {
                debug!(session_id = %session_id, obstacle_id, score, "Obstacle cleared");
            }
            GameEvent::DifficultyRaised { multiplier } => {
                info!(session_id = %session_id, multiplier, "Difficulty increased");
            }
            GameEvent::Collision { obstacle_id, final_score } => {
                info!(session_id = %session_id, obstacle_id, final_score, "Collision, game over");
            }
        }
    }
}

/// State moved into the tick-loop task
struct TickLoop {
    session_id: SessionId,
    connection_id: ConnectionId,
    engine: SharedEngine,
    registry: Arc<SessionRegistry>,
    outbound: mpsc::Sender<ServerMsg>,
    gesture_rx: Option<watch::Receiver<GestureLabel>>,
    period: Duration,
}

impl TickLoop {
    async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let per_second = Duration::from_secs(1).as_micros() / self.period.as_micros().max(1);
        let heartbeat_every = per_second.max(1) as u64;
        let mut frames: u64 = 0;

        loop {
            ticker.tick().await;

            if !self.registry.is_attached(&self.session_id, self.connection_id) {
                debug!(session_id = %self.session_id, "Connection gone, stopping tick loop");
                break;
            }

            // Lock scope ends before the send; each tick is atomic
            let (events, state) = {
                let mut engine = self.engine.lock();
                (engine.tick(), engine.snapshot())
            };
            log_events(self.session_id, &events);

            if frames % heartbeat_every == 0 {
                debug!(
                    session_id = %self.session_id,
                    frame = frames,
                    score = state.score,
                    obstacles = state.obstacles.len(),
                    x = state.avatar.x,
                    y = state.avatar.y,
                    "Tick loop heartbeat"
                );
            }

            let gesture = self.gesture_rx.as_ref().map(|rx| *rx.borrow());
            if self.outbound.send(ServerMsg::GameState { state, gesture }).await.is_err() {
                debug!(session_id = %self.session_id, "Outbound closed, stopping tick loop");
                break;
            }
            frames += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameVariant, SessionRegistry};
    use crate::gesture::GestureReading;
    use tokio::time::timeout;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    struct StubExtractor(GestureReading);

    impl GestureExtractor for StubExtractor {
        fn extract(&self, _frame: &str) -> GestureReading {
            self.0.clone()
        }
    }

    fn reading(label: GestureLabel, annotated: Option<&str>) -> GestureReading {
        GestureReading {
            label,
            hand_detected: label != GestureLabel::None,
            annotated_frame: annotated.map(str::to_string),
            description: format!("{:?}", label),
        }
    }

    struct Harness {
        controller: SessionController,
        rx: mpsc::Receiver<ServerMsg>,
        registry: Arc<SessionRegistry>,
        engine: SharedEngine,
        session_id: SessionId,
    }

    fn harness(variant: GameVariant, reading: GestureReading) -> Harness {
        let registry = Arc::new(SessionRegistry::for_variant(variant));
        let session_id = Uuid::new_v4();
        let (connection_id, engine) = registry.attach(&session_id).unwrap();
        let (outbound, rx) = mpsc::channel(1024);

        let controller = SessionController::new(SessionContext {
            session_id,
            connection_id,
            engine: engine.clone(),
            registry: registry.clone(),
            gestures: Arc::new(StubExtractor(reading)),
            outbound,
            tick_period: Duration::from_millis(10),
        });

        Harness {
            controller,
            rx,
            registry,
            engine,
            session_id,
        }
    }

    async fn next(rx: &mut mpsc::Receiver<ServerMsg>) -> ServerMsg {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("outbound closed")
    }

    async fn next_matching(
        rx: &mut mpsc::Receiver<ServerMsg>,
        pred: impl Fn(&ServerMsg) -> bool,
    ) -> ServerMsg {
        loop {
            let msg = next(rx).await;
            if pred(&msg) {
                return msg;
            }
        }
    }

    #[tokio::test]
    async fn test_start_reply_precedes_loop_states() {
        let mut h = harness(GameVariant::Voice, reading(GestureLabel::None, None));

        assert_ok!(h.controller.handle(ClientMsg::Start).await);

        match next(&mut h.rx).await {
            ServerMsg::GameStarted { state } => {
                assert!(state.game_started);
                assert!(!state.game_over);
                assert_eq!(state.score, 0);
            }
            other => panic!("expected game_started, got {:?}", other),
        }
        for _ in 0..3 {
            assert!(matches!(next(&mut h.rx).await, ServerMsg::GameState { gesture: None, .. }));
        }
        assert!(h.controller.tick_loop_running());
    }

    #[tokio::test]
    async fn test_command_before_start_is_ignored() {
        let mut h = harness(GameVariant::Voice, reading(GestureLabel::None, None));
        let before = h.engine.lock().snapshot();

        h.controller
            .handle(ClientMsg::Command { command: "up".to_string() })
            .await
            .unwrap();

        assert_eq!(h.engine.lock().snapshot(), before);
        assert!(h.rx.try_recv().is_err());
        assert!(!h.controller.tick_loop_running());
    }

    #[tokio::test]
    async fn test_command_moves_avatar() {
        let mut h = harness(GameVariant::Voice, reading(GestureLabel::None, None));
        assert_ok!(h.controller.handle(ClientMsg::Start).await);

        h.controller
            .handle(ClientMsg::Command { command: "move up".to_string() })
            .await
            .unwrap();

        assert_eq!(h.engine.lock().snapshot().avatar.y, 235.0);
    }

    #[tokio::test]
    async fn test_unknown_command_changes_nothing() {
        let mut h = harness(GameVariant::Voice, reading(GestureLabel::None, None));
        assert_ok!(h.controller.handle(ClientMsg::Start).await);
        h.controller.cancel_tick_loop().await;

        let before = serde_json::to_string(&h.engine.lock().snapshot()).unwrap();
        h.controller
            .handle(ClientMsg::Command { command: "fly sideways".to_string() })
            .await
            .unwrap();
        let after = serde_json::to_string(&h.engine.lock().snapshot()).unwrap();

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_restart_replaces_the_loop() {
        let mut h = harness(GameVariant::Voice, reading(GestureLabel::None, None));
        assert_ok!(h.controller.handle(ClientMsg::Start).await);
        h.controller
            .handle(ClientMsg::Command { command: "down".to_string() })
            .await
            .unwrap();
        next_matching(&mut h.rx, |m| matches!(m, ServerMsg::GameState { .. })).await;

        // registry + harness + controller + one running loop
        assert_eq!(Arc::strong_count(&h.engine), 4);

        assert_ok!(h.controller.handle(ClientMsg::Restart).await);

        let restarted =
            next_matching(&mut h.rx, |m| matches!(m, ServerMsg::GameRestarted { .. })).await;
        let ServerMsg::GameRestarted { state } = restarted else { unreachable!() };
        assert_eq!(state.score, 0);
        assert!(state.obstacles.is_empty());
        assert!(state.game_started);
        assert!(!state.game_over);
        assert_eq!(state.avatar.y, 250.0);

        // the previous loop released its handle before the new one started
        assert_eq!(Arc::strong_count(&h.engine), 4);
        assert!(matches!(next(&mut h.rx).await, ServerMsg::GameState { .. }));
    }

    #[tokio::test]
    async fn test_held_gesture_moves_every_frame() {
        let mut h = harness(GameVariant::Gesture, reading(GestureLabel::Up, None));
        assert_ok!(h.controller.handle(ClientMsg::Start).await);

        for _ in 0..3 {
            h.controller
                .handle(ClientMsg::Frame { frame: "palm:0.5,0.1".to_string() })
                .await
                .unwrap();
        }

        assert_eq!(h.engine.lock().snapshot().avatar.y, 175.0);
        let msg = next_matching(&mut h.rx, |m| {
            matches!(m, ServerMsg::GameState { gesture: Some(GestureLabel::Up), .. })
        })
        .await;
        assert!(matches!(msg, ServerMsg::GameState { .. }));
    }

    #[tokio::test]
    async fn test_frame_echoes_annotated_image() {
        let mut h = harness(
            GameVariant::Gesture,
            reading(GestureLabel::Left, Some("data:image/jpeg;base64,AAAA")),
        );

        h.controller
            .handle(ClientMsg::Frame { frame: "raw".to_string() })
            .await
            .unwrap();

        match next(&mut h.rx).await {
            ServerMsg::VideoFrame { frame, gesture, hand_detected, .. } => {
                assert_eq!(frame, "data:image/jpeg;base64,AAAA");
                assert_eq!(gesture, GestureLabel::Left);
                assert!(hand_detected);
            }
            other => panic!("expected video_frame, got {:?}", other),
        }
        // not started, so no movement
        assert_eq!(h.engine.lock().snapshot().avatar.x, 100.0);
    }

    #[tokio::test]
    async fn test_voice_variant_ignores_frames() {
        let mut h = harness(GameVariant::Voice, reading(GestureLabel::Up, Some("img")));
        h.engine.lock().start();

        h.controller
            .handle(ClientMsg::Frame { frame: "palm:0.5,0.1".to_string() })
            .await
            .unwrap();

        assert_eq!(h.engine.lock().snapshot().avatar.y, 250.0);
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_ticks_once_and_replies() {
        let mut h = harness(GameVariant::Voice, reading(GestureLabel::None, None));
        h.engine.lock().start();

        h.controller.handle(ClientMsg::Update).await.unwrap();

        match next(&mut h.rx).await {
            ServerMsg::GameState { state, gesture } => {
                assert!(state.game_started);
                assert_eq!(gesture, None);
            }
            other => panic!("expected game_state, got {:?}", other),
        }
        assert!(!h.controller.tick_loop_running());
    }

    #[tokio::test]
    async fn test_ping_and_stop_camera() {
        let mut h = harness(GameVariant::Gesture, reading(GestureLabel::None, None));

        h.controller.handle(ClientMsg::Ping).await.unwrap();
        h.controller.handle(ClientMsg::StopCamera).await.unwrap();
        h.controller.handle(ClientMsg::Unknown).await.unwrap();

        assert_eq!(next(&mut h.rx).await, ServerMsg::Pong);
        assert_eq!(next(&mut h.rx).await, ServerMsg::CameraStopped);
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_loop_stops_when_connection_deregistered() {
        let mut h = harness(GameVariant::Voice, reading(GestureLabel::None, None));
        assert_ok!(h.controller.handle(ClientMsg::Start).await);
        next_matching(&mut h.rx, |m| matches!(m, ServerMsg::GameState { .. })).await;

        assert!(h.registry.delete(&h.session_id));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!h.controller.tick_loop_running());
    }

    #[tokio::test]
    async fn test_loop_stops_when_outbound_closes() {
        let Harness {
            mut controller, rx, ..
        } = harness(GameVariant::Voice, reading(GestureLabel::None, None));
        controller.handle(ClientMsg::Start).await.unwrap();

        drop(rx);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!controller.tick_loop_running());
        let err = assert_err!(controller.handle(ClientMsg::Ping).await);
        assert!(matches!(err, SessionError::OutboundClosed));
    }

    #[tokio::test]
    async fn test_close_deletes_session() {
        let mut h = harness(GameVariant::Gesture, reading(GestureLabel::None, None));
        assert_ok!(h.controller.handle(ClientMsg::Start).await);
        assert_eq!(h.registry.session_count(), 1);

        h.controller.close().await;

        assert_eq!(h.registry.session_count(), 0);
        // only the harness still holds the engine
        assert_eq!(Arc::strong_count(&h.engine), 1);
    }
}
