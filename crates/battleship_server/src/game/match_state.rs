//! The match driver: placement phase, turn loop, timeouts, win/forfeit
//! resolution over the full five-ship
//! [`SHIP_CATALOGUE`](super::board::SHIP_CATALOGUE).

use std::collections::HashMap;
use std::sync::Arc;

use battleship_common::{GameError, Payload};
use log::info;

use crate::broadcast::{broadcast, notify_spectators, refresh_spectator_ranks};
use crate::config::ConfigProvider;
use crate::game::board::{self, Board, FireOutcome, SHIP_CATALOGUE};
use crate::queue::Queue;
use crate::session::Session;

pub struct Match {
    pub player_a: String,
    pub player_b: String,
    pub boards: HashMap<String, Board>,
    pub current_player: String,
}

impl Match {
    pub fn new(player_a: String, player_b: String) -> Self {
        Match {
            current_player: player_a.clone(),
            player_a,
            player_b,
            boards: HashMap::new(),
        }
    }

    pub fn opponent_of(&self, username: &str) -> String {
        if username == self.player_a {
            self.player_b.clone()
        } else {
            self.player_a.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Done { winner: String },
    ConnectionLost { survivor: String },
}

/// Internal control-flow error: a send/receive failed with
/// `ConnectionLost` against one side, so the other side is the survivor.
struct Lost {
    survivor: String,
}

async fn send_or_lost(session: &Session, payload: Payload, survivor: &str) -> Result<(), Lost> {
    session.send(payload).await.map_err(|_| Lost {
        survivor: survivor.to_string(),
    })
}

pub async fn run_match(
    m: &mut Match,
    sessions: &HashMap<String, Arc<Session>>,
    queue: &Queue,
    config: &dyn ConfigProvider,
) -> MatchOutcome {
    match run_match_inner(m, sessions, queue, config).await {
        Ok(outcome) => outcome,
        Err(Lost { survivor }) => MatchOutcome::ConnectionLost { survivor },
    }
}

async fn run_match_inner(
    m: &mut Match,
    sessions: &HashMap<String, Arc<Session>>,
    queue: &Queue,
    config: &dyn ConfigProvider,
) -> Result<MatchOutcome, Lost> {
    for username in [m.player_a.clone(), m.player_b.clone()] {
        if !m.boards.contains_key(&username) {
            let board = place_ships(&username, sessions, queue, config).await?;
            m.boards.insert(username.clone(), board);
            info!("{username} finished placing ships");
        }
    }

    loop {
        let attacker_name = m.current_player.clone();
        let defender_name = m.opponent_of(&attacker_name);
        let attacker = sessions
            .get(&attacker_name)
            .expect("attacker session must exist for the duration of the match");
        let defender = sessions
            .get(&defender_name)
            .expect("defender session must exist for the duration of the match");

        send_or_lost(
            attacker,
            Payload::prompt_with_timeout(
                "Enter coordinate to fire at, or type 'quit' to forfeit",
                config.turn_timeout().as_secs(),
            ),
            &defender_name,
        )
        .await?;
        send_or_lost(
            defender,
            Payload::waiting(format!("Waiting for {attacker_name} to fire...")),
            &attacker_name,
        )
        .await?;
        attacker.set_my_turn(true);
        broadcast(
            queue,
            Payload::s_msg(format!("It is {attacker_name}'s turn.")),
            None,
            true,
        )
        .await;

        let wait_result = attacker.wait_for_message(Some(config.turn_timeout())).await;
        attacker.set_my_turn(false);
        let input = match wait_result {
            Ok(line) => line,
            Err(GameError::Timeout) => {
                send_or_lost(
                    attacker,
                    Payload::s_msg("You took too long. Skipping your turn."),
                    &defender_name,
                )
                .await?;
                send_or_lost(
                    defender,
                    Payload::s_msg("Opponent time out. It is now your turn."),
                    &attacker_name,
                )
                .await?;
                let defender_board = &m.boards[&defender_name];
                notify_spectators(queue, defender_board, &attacker_name, "timed out").await;
                refresh_spectator_ranks(queue).await;
                m.current_player = defender_name;
                continue;
            }
            Err(_) => return Err(Lost { survivor: defender_name }),
        };

        if input.trim().eq_ignore_ascii_case("quit") {
            return Ok(MatchOutcome::Done {
                winner: defender_name,
            });
        }

        let (row, col) = match board::parse_coordinate(&input) {
            Ok(coord) => coord,
            Err(e) => {
                send_or_lost(attacker, Payload::s_msg(format!("[!] {e}")), &defender_name).await?;
                continue;
            }
        };

        let defender_board = m
            .boards
            .get_mut(&defender_name)
            .expect("defender board must exist once placement is complete");
        let outcome = defender_board.fire(row, col);

        match outcome {
            FireOutcome::AlreadyShot => {
                send_or_lost(
                    attacker,
                    Payload::s_msg("You've already fired there."),
                    &defender_name,
                )
                .await?;
                continue;
            }
            FireOutcome::Miss => {
                let rendered = defender_board.render(false);
                send_or_lost(attacker, Payload::board(rendered, false), &defender_name).await?;
                send_or_lost(attacker, Payload::result("Miss!"), &defender_name).await?;
                send_or_lost(
                    defender,
                    Payload::result(format!("{attacker_name} fired and missed.")),
                    &attacker_name,
                )
                .await?;
                notify_spectators(queue, defender_board, &attacker_name, "fired and missed").await;
                refresh_spectator_ranks(queue).await;
                m.current_player = defender_name;
            }
            FireOutcome::Hit { sunk } => {
                let rendered = defender_board.render(false);
                send_or_lost(attacker, Payload::board(rendered, false), &defender_name).await?;

                let attacker_text = match &sunk {
                    Some(name) => format!("Hit! You sank the {name}!"),
                    None => "Hit!".to_string(),
                };
                send_or_lost(attacker, Payload::result(attacker_text), &defender_name).await?;

                let defender_text = match &sunk {
                    Some(name) => format!("{attacker_name} hit and sank your {name}!"),
                    None => format!("{attacker_name} hit one of your ships."),
                };
                send_or_lost(defender, Payload::result(defender_text), &attacker_name).await?;

                if defender_board.all_sunk() {
                    send_or_lost(attacker, Payload::result("You win!"), &defender_name).await?;
                    send_or_lost(defender, Payload::result("You lost."), &attacker_name).await?;
                    notify_spectators(queue, defender_board, &attacker_name, "won the match").await;
                    return Ok(MatchOutcome::Done {
                        winner: attacker_name,
                    });
                }

                notify_spectators(queue, defender_board, &attacker_name, "scored a hit").await;
                refresh_spectator_ranks(queue).await;
                m.current_player = defender_name;
            }
        }
    }
}

async fn place_ships(
    username: &str,
    sessions: &HashMap<String, Arc<Session>>,
    queue: &Queue,
    _config: &dyn ConfigProvider,
) -> Result<Board, Lost> {
    let placer = sessions
        .get(username)
        .expect("placing session must exist for the duration of placement");
    let opponent_name = sessions
        .keys()
        .find(|k| k.as_str() != username)
        .cloned()
        .unwrap_or_default();
    let opponent = sessions.get(&opponent_name);

    let mut board = Board::new();

    if let Some(opponent) = opponent {
        send_or_lost(
            opponent,
            Payload::waiting(format!("{username} is placing their ships...")),
            username,
        )
        .await?;
    }
    broadcast(
        queue,
        Payload::s_msg(format!("{username} is placing their ships.")),
        None,
        true,
    )
    .await;

    for ship in SHIP_CATALOGUE.iter() {
        loop {
            send_or_lost(
                placer,
                Payload::prompt(format!(
                    "Place your {} (size {}): enter starting coordinate followed by orientation (e.g. A1 V)",
                    ship.name, ship.len
                )),
                &opponent_name,
            )
            .await?;

            placer.set_my_turn(true);
            let wait_result = placer.wait_for_message(None).await;
            placer.set_my_turn(false);
            let input = wait_result.map_err(|_| Lost {
                survivor: opponent_name.clone(),
            })?;

            let (row, col, orientation) = match board::parse_placement(&input) {
                Ok(parsed) => parsed,
                Err(e) => {
                    send_or_lost(placer, Payload::s_msg(format!("[!] {e}")), &opponent_name)
                        .await?;
                    continue;
                }
            };

            if !board.can_place(row, col, ship.len, orientation) {
                send_or_lost(
                    placer,
                    Payload::s_msg(format!(
                        "[!] Cannot place {} there, try again.",
                        ship.name
                    )),
                    &opponent_name,
                )
                .await?;
                continue;
            }

            board.place(ship.name, row, col, ship.len, orientation);
            break;
        }
    }

    send_or_lost(
        placer,
        Payload::s_msg("All ships placed.".to_string()),
        &opponent_name,
    )
    .await?;
    broadcast(
        queue,
        Payload::s_msg(format!("{username} has finished placing their ships.")),
        None,
        true,
    )
    .await;

    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_of_resolves_either_player() {
        let m = Match::new("alice".to_string(), "bob".to_string());
        assert_eq!(m.opponent_of("alice"), "bob");
        assert_eq!(m.opponent_of("bob"), "alice");
    }

    #[test]
    fn new_match_starts_with_player_a_to_move() {
        let m = Match::new("alice".to_string(), "bob".to_string());
        assert_eq!(m.current_player, "alice");
    }
}
