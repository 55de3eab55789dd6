//! Per-connection client handler: the authentication handshake, then
//! chat-vs-gameplay routing into the session's single-slot mailbox.
//! Exits on connection loss or global shutdown, removing the session
//! from the queue either way.

use std::sync::Arc;

use battleship_common::{crypto, FrameCodec, GameError, Payload};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::broadcast::{broadcast, refresh_spectator_ranks};
use crate::config::ConfigProvider;
use crate::credentials::CredentialStore;
use crate::queue::Queue;
use crate::session::Session;

pub struct AppState {
    pub queue: Arc<Queue>,
    pub credentials: Arc<CredentialStore>,
    pub config: Arc<dyn ConfigProvider>,
}

pub async fn handle_connection(stream: TcpStream, state: Arc<AppState>) {
    let peer = stream.peer_addr().ok();
    let key = crypto::derive_key(&state.config.passphrase());

    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, FrameCodec::new(key));
    let writer = FramedWrite::new(write_half, FrameCodec::new(key));
    let session = Arc::new(Session::new(writer));

    if let Err(e) = authenticate(&mut reader, &session, &state).await {
        warn!("authentication failed for {peer:?}: {e}");
        return;
    }

    info!(
        "{} authenticated from {peer:?}",
        session.username().unwrap_or("<unknown>")
    );

    state.queue.push(session.clone()).await;
    announce_queue_position(&session, &state).await;

    main_loop(&mut reader, &session, &state.queue).await;

    session.set_connected(false);
    if let Some(username) = session.username() {
        state.queue.remove_username(username).await;
        info!("{username} disconnected");
    }
    refresh_spectator_ranks(&state.queue).await;
}

async fn announce_queue_position(session: &Session, state: &AppState) {
    let position = state.queue.position(session.username().unwrap_or("")).await;
    let text = match position {
        Some(0) | Some(1) => "You are in the active match.".to_string(),
        Some(p) => format!("You are spectating. Position in queue: {}", p - 1),
        None => "Waiting for a match...".to_string(),
    };
    let _ = session.send(Payload::waiting(text)).await;
}

/// Reads inbound `command` frames until the connection either
/// registers or logs in a username, or fails outright.
async fn authenticate(
    reader: &mut FramedRead<tokio::net::tcp::OwnedReadHalf, FrameCodec>,
    session: &Session,
    state: &AppState,
) -> Result<(), GameError> {
    loop {
        let coord = match next_command(reader).await? {
            Some(coord) => coord,
            None => {
                let _ = session
                    .send(Payload::s_msg("you must login or register first"))
                    .await;
                continue;
            }
        };

        let mut parts = coord.trim().splitn(2, char::is_whitespace);
        let verb = parts.next().unwrap_or("").to_ascii_uppercase();
        let arg = parts.next().unwrap_or("").trim();

        match verb.as_str() {
            "REGISTER" => {
                if state.credentials.exists(arg).await {
                    session.send(Payload::s_msg("USERNAME_TAKEN")).await?;
                    continue;
                }
                session.send(Payload::s_msg("USERNAME_OK")).await?;

                let pin_line = match next_command(reader).await? {
                    Some(line) => line,
                    None => continue,
                };
                let mut pin_parts = pin_line.trim().splitn(2, char::is_whitespace);
                let pin_verb = pin_parts.next().unwrap_or("").to_ascii_uppercase();
                let pin = pin_parts.next().unwrap_or("").trim();

                if pin_verb != "SETPIN" || !valid_pin(pin, &state.config) {
                    session
                        .send(Payload::s_msg("invalid PIN, please REGISTER again"))
                        .await?;
                    continue;
                }

                state.credentials.register(arg, pin).await;
                session.send(Payload::s_msg("REGISTRATION_SUCCESS")).await?;
                session.bind_username(arg.to_string());
                return Ok(());
            }
            "LOGIN" => {
                if !state.credentials.exists(arg).await {
                    session.send(Payload::s_msg("USER_NOT_FOUND")).await?;
                    continue;
                }
                session.send(Payload::s_msg("USERNAME_OK")).await?;

                let mut attempts = 0;
                loop {
                    if attempts >= state.config.max_pin_attempts() {
                        session.send(Payload::s_msg("LOGIN_FAILURE")).await?;
                        return Err(GameError::User(
                            "exhausted login attempts".to_string(),
                        ));
                    }

                    let pin_line = match next_command(reader).await? {
                        Some(line) => line,
                        None => continue,
                    };
                    let mut pin_parts = pin_line.trim().splitn(2, char::is_whitespace);
                    let pin_verb = pin_parts.next().unwrap_or("").to_ascii_uppercase();
                    let pin = pin_parts.next().unwrap_or("").trim();

                    if pin_verb != "PIN" {
                        session
                            .send(Payload::s_msg("expected PIN <code>"))
                            .await?;
                        continue;
                    }

                    attempts += 1;
                    if state.credentials.check_pin(arg, pin).await {
                        session.send(Payload::s_msg("LOGIN_SUCCESS")).await?;
                        session.bind_username(arg.to_string());
                        return Ok(());
                    }
                }
            }
            _ => {
                session
                    .send(Payload::s_msg("you must login or register first"))
                    .await?;
            }
        }
    }
}

fn valid_pin(pin: &str, config: &dyn ConfigProvider) -> bool {
    config.pin_length().contains(&pin.len()) && pin.chars().all(|c| c.is_ascii_digit())
}

/// Reads the next inbound frame, returning the raw text of a `command`
/// payload. A `chat` frame (or anything else) is not expected here and
/// yields `None` so the caller can re-prompt.
async fn next_command(
    reader: &mut FramedRead<tokio::net::tcp::OwnedReadHalf, FrameCodec>,
) -> Result<Option<String>, GameError> {
    match reader.next().await {
        Some(Ok(Payload::Command { coord })) => Ok(Some(coord)),
        Some(Ok(_)) => Ok(None),
        Some(Err(e)) => Err(e),
        None => Err(GameError::ConnectionLost(
            "connection closed by peer".to_string(),
        )),
    }
}

/// Main loop: chat fans out immediately; non-chat is admitted into the
/// session's mailbox only while the match driver has granted this
/// session the turn gate.
async fn main_loop(
    reader: &mut FramedRead<tokio::net::tcp::OwnedReadHalf, FrameCodec>,
    session: &Arc<Session>,
    queue: &Queue,
) {
    loop {
        match reader.next().await {
            Some(Ok(Payload::Chat { msg })) => {
                let username = session.username().unwrap_or("<unknown>").to_string();
                broadcast(
                    queue,
                    Payload::chat(format!("{username}: {msg}")),
                    None,
                    false,
                )
                .await;
            }
            Some(Ok(Payload::Command { coord })) => {
                if session.my_turn() {
                    debug!("{}: accepted command {coord:?}", session.username().unwrap_or("<unknown>"));
                    session.offer_input(coord).await;
                } else {
                    let _ = session
                        .send(Payload::s_msg("please wait, it isn't your turn"))
                        .await;
                }
            }
            Some(Ok(_)) => {
                let _ = session
                    .send(Payload::s_msg("unexpected message for this phase"))
                    .await;
            }
            Some(Err(e)) => {
                warn!("{}: {e}", session.username().unwrap_or("<unknown>"));
                return;
            }
            None => return,
        }
    }
}
