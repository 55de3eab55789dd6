//! Top-level wiring: the accept loop, the matchmaking supervisor, and
//! global shutdown. A `tokio::spawn` fan-out with a
//! `tokio::select!`-based shutdown, using `crate::tasks::{TaskControl,
//! upgrade_oneshot}` to stop both tasks cleanly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use battleship_common::{GameError, Payload};
use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{interval, sleep, Instant};

use crate::broadcast::broadcast;
use crate::config::ConfigProvider;
use crate::credentials::CredentialStore;
use crate::game::match_state::{run_match, Match, MatchOutcome};
use crate::handler::{handle_connection, AppState};
use crate::queue::Queue;
use crate::session::Session;
use crate::tasks::{upgrade_oneshot, TaskControl};

/// Supervisor tick: how often the queue is inspected for a fresh,
/// ready front pair.
const SUPERVISOR_TICK: Duration = Duration::from_millis(250);

/// Runs the server until an OS shutdown signal arrives. This is the
/// binary's entry point; tests instead call [`spawn_server_task`]
/// directly so they control the stop signal themselves.
pub async fn run(config: Arc<dyn ConfigProvider>) -> Result<(), GameError> {
    let (state, control) = spawn_server_task(config).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| GameError::ConnectionLost(e.to_string()))?;
    info!("received shutdown signal");

    broadcast(&state.queue, Payload::shutdown("server is shutting down"), None, false).await;
    control.stop().await;

    Ok(())
}

/// Binds the listener, spawns the accept loop and the matchmaking
/// supervisor, and returns the shared [`AppState`] plus a [`TaskControl`]
/// that stops both tasks.
pub async fn spawn_server_task(
    config: Arc<dyn ConfigProvider>,
) -> Result<(Arc<AppState>, ServerHandle), GameError> {
    let state = Arc::new(AppState {
        queue: Arc::new(Queue::new()),
        credentials: Arc::new(CredentialStore::new()),
        config: config.clone(),
    });

    let listener = TcpListener::bind(state.config.bind_addr())
        .await
        .map_err(GameError::from)?;
    info!("listening on {}", state.config.bind_addr());

    let (accept_stop_tx, accept_stop_rx) = oneshot::channel();
    let mut accept_shutdown = upgrade_oneshot(accept_stop_rx);
    let accept_state = state.clone();
    let accept_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = accept_shutdown.recv() => {
                    info!("accept loop shutting down");
                    return;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!("accepted connection from {peer}");
                            let state = accept_state.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, state).await;
                            });
                        }
                        Err(e) => warn!("accept failed: {e}"),
                    }
                }
            }
        }
    });
    let accept_control = TaskControl::new(accept_stop_tx, accept_handle);

    let (supervisor_stop_tx, supervisor_stop_rx) = oneshot::channel();
    let mut supervisor_shutdown = upgrade_oneshot(supervisor_stop_rx);
    let supervisor_state = state.clone();
    let supervisor_handle = tokio::spawn(async move {
        tokio::select! {
            _ = supervisor_shutdown.recv() => {
                info!("supervisor shutting down");
            }
            _ = supervisor_loop(supervisor_state) => {}
        }
    });
    let supervisor_control = TaskControl::new(supervisor_stop_tx, supervisor_handle);

    Ok((state, ServerHandle::new(accept_control, supervisor_control)))
}

/// Bundles the accept loop's and supervisor's [`TaskControl`]s so the
/// caller has a single handle to stop both.
pub struct ServerHandle {
    accept: TaskControl,
    supervisor: TaskControl,
}

impl ServerHandle {
    fn new(accept: TaskControl, supervisor: TaskControl) -> Self {
        ServerHandle { accept, supervisor }
    }

    pub async fn stop(self) {
        self.accept.stop().await;
        self.supervisor.stop().await;
    }
}

async fn supervisor_loop(state: Arc<AppState>) {
    let mut tick = interval(SUPERVISOR_TICK);
    let mut active: Option<(Match, HashMap<String, Arc<Session>>)> = None;

    loop {
        tick.tick().await;

        if active.is_none() {
            if let Some((a, b)) = state.queue.front_pair().await {
                let name_a = a.username().unwrap().to_string();
                let name_b = b.username().unwrap().to_string();
                let mut sessions = HashMap::new();
                sessions.insert(name_a.clone(), a);
                sessions.insert(name_b.clone(), b);
                info!("starting match: {name_a} vs {name_b}");
                active = Some((Match::new(name_a, name_b), sessions));
            } else {
                continue;
            }
        }

        let (mut m, sessions) = active.take().unwrap();
        let outcome = run_match(&mut m, &sessions, &state.queue, state.config.as_ref()).await;

        match outcome {
            MatchOutcome::Done { winner } => {
                let loser = m.opponent_of(&winner);
                info!("match finished: {winner} beat {loser}");
                state.queue.rotate_after_match(&winner, &loser).await;
                broadcast(
                    &state.queue,
                    Payload::s_msg(format!("{winner} won! Rotating the queue for the next match.")),
                    None,
                    false,
                )
                .await;
                sleep(state.config.post_match_pause()).await;
            }
            MatchOutcome::ConnectionLost { survivor } => {
                let loser = m.opponent_of(&survivor);
                let loser_index = if loser == m.player_a { 0 } else { 1 };
                state.queue.remove_username(&loser).await;

                broadcast(
                    &state.queue,
                    Payload::waiting(format!(
                        "{loser} disconnected. Waiting up to {}s for them to reconnect...",
                        state.config.reconnect_window().as_secs()
                    )),
                    None,
                    false,
                )
                .await;

                if let Some(returned) = wait_for_reconnect(&state, &loser).await {
                    info!("{loser} reconnected, resuming match");
                    state.queue.remove_username(&loser).await;
                    state.queue.insert_at(loser_index, returned.clone()).await;
                    let mut resumed_sessions = sessions.clone();
                    resumed_sessions.insert(loser, returned);
                    active = Some((m, resumed_sessions));
                } else {
                    error!("{loser} failed to reconnect within the window; forfeiting to {survivor}");
                    state.queue.rotate_after_match(&survivor, &loser).await;
                    broadcast(
                        &state.queue,
                        Payload::s_msg(format!("{survivor} wins by forfeit.")),
                        None,
                        false,
                    )
                    .await;
                }
            }
        }
    }
}

/// Polls the queue once per second for a session re-authenticated under
/// `username`, for up to the configured reconnect window.
async fn wait_for_reconnect(state: &AppState, username: &str) -> Option<Arc<Session>> {
    let deadline = Instant::now() + state.config.reconnect_window();
    while Instant::now() < deadline {
        sleep(Duration::from_secs(1)).await;
        if let Some(pos) = state.queue.position(username).await {
            let snapshot = state.queue.snapshot().await;
            if let Some(session) = snapshot.get(pos) {
                return Some(session.clone());
            }
        }
    }
    None
}
