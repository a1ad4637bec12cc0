use tokio::io::{self, AsyncBufReadExt, BufReader};

use protocol::{race_first, Either, Frame, GameStatus, GameType, ServerControlFrame};

use crate::error::ClientError;
use crate::stub::GameStub;

/// The controller's local UI state (§4.9), grounded on
/// `original_source/client/game_controller.py`'s `GameControllerState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    WaitingForServer,
    WaitingForSecondUser,
    Playing,
    Idle,
}

/// What the main menu loop should do once a game's controller returns.
pub enum Outcome {
    ReturnedToMenu,
    ExitRequested,
}

/// Drives one game from `start_game` through to its `idle` terminal state,
/// racing a line of terminal input against the next frame from the server
/// each turn (§4.9: "two cooperative tasks"). Translating the original's
/// two always-running tasks into a per-turn race keeps `state` free of
/// concurrent mutation under Rust's real (non-cooperative) scheduling.
pub struct Controller<'a> {
    stub: &'a GameStub,
    state: ControllerState,
}

impl<'a> Controller<'a> {
    pub fn new(stub: &'a GameStub) -> Self {
        Controller { stub, state: ControllerState::Idle }
    }

    pub async fn run(&mut self, game_type: GameType) -> Result<Outcome, ClientError> {
        self.state = ControllerState::WaitingForServer;
        self.stub.start_game(game_type).await?;

        let mut lines = BufReader::new(io::stdin()).lines();

        loop {
            self.print_banner();

            match race_first(lines.next_line(), self.stub.transport().receive()).await {
                Either::Left(line) => {
                    let line = match line? {
                        Some(line) => line,
                        None => return Ok(Outcome::ExitRequested),
                    };
                    if self.handle_command(line.trim()).await? {
                        return Ok(Outcome::ExitRequested);
                    }
                }
                Either::Right(frame) => {
                    let frame = frame?;
                    self.handle_frame(&frame)?;
                }
            }

            if self.state == ControllerState::Idle {
                return Ok(Outcome::ReturnedToMenu);
            }
        }
    }

    fn print_banner(&self) {
        match self.state {
            ControllerState::WaitingForServer => {
                println!("{}", " Waiting for a free server to start game... ".to_string())
            }
            ControllerState::WaitingForSecondUser => {
                println!("{}", " Waiting for second player... ".to_string())
            }
            ControllerState::Playing | ControllerState::Idle => {}
        }
    }

    /// Parses and dispatches one line of terminal input (§4.8 step 4,
    /// §4.9 dispatch table). Returns `true` on `/exit`.
    async fn handle_command(&mut self, command: &str) -> Result<bool, ClientError> {
        if let Some((row, col)) = parse_place_mark(command) {
            self.stub.place_mark(row, col).await?;
        } else if command == "cancel" {
            self.stub.cancel_game().await?;
        } else if let Some(text) = command.strip_prefix("chat:") {
            self.stub.chat(text).await?;
        } else if command == "/change" {
            self.stub.change_game().await?;
            self.state = ControllerState::Idle;
        } else if command == "/exit" {
            return Ok(true);
        } else {
            eprintln!("{}", ClientError::InvalidCommand(command.to_string()));
        }
        Ok(false)
    }

    /// Applies one server frame (§6.3).
    fn handle_frame(&mut self, frame: &Frame) -> Result<(), ClientError> {
        let message: ServerControlFrame = frame.parse()?;
        match message {
            ServerControlFrame::ServerAssigned { game_type } => {
                if matches!(game_type, Some(GameType::Multi)) {
                    println!("{}", " A free server has been found ".to_string());
                    self.state = ControllerState::WaitingForSecondUser;
                } else {
                    self.state = ControllerState::Playing;
                }
            }
            ServerControlFrame::ShowGameStatus { game_status, game_board, your_mark, current_user, winner, .. } => {
                self.state = ControllerState::Playing;
                println!("game_status = {:?}", game_status);
                println!("game_board:");
                for row in &game_board {
                    println!("{:?}", row);
                }
                println!("your mark = {}", your_mark);
                if game_status == GameStatus::Finished {
                    match winner {
                        Some(0) | None => println!("{}", " WITHDRAW ".to_string()),
                        Some(mark) if mark == your_mark => println!("{}", " YOU WIN ".to_string()),
                        Some(_) => println!("{}", " YOU LOSE ".to_string()),
                    }
                    self.state = ControllerState::Idle;
                } else {
                    println!("is your turn = {}", current_user == your_mark);
                }
            }
            ServerControlFrame::ServerCrashed => {
                println!("Server crashed. Returning to main menu.");
                self.state = ControllerState::Idle;
            }
            ServerControlFrame::Chat { text_message } => {
                println!("#### Start of Chat Message ####");
                println!("{}", text_message);
                println!("#### End of Chat Message ####");
            }
            ServerControlFrame::OpponentEscaped { .. } => {
                println!("!!! Opponent has been disconnected !!!");
                self.state = ControllerState::Idle;
            }
            ServerControlFrame::GameChanged { .. } => {
                self.state = ControllerState::Idle;
            }
        }
        Ok(())
    }
}

/// Matches `"<row> <col>"`, the only shape the original's `^(\d+ \d+)$`
/// regex accepts.
fn parse_place_mark(command: &str) -> Option<(usize, usize)> {
    let mut parts = command.split_whitespace();
    let row = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((row, col))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_place_mark_accepts_two_numbers() {
        assert_eq!(parse_place_mark("1 2"), Some((1, 2)));
    }

    #[test]
    fn parse_place_mark_rejects_extra_tokens() {
        assert_eq!(parse_place_mark("1 2 3"), None);
    }

    #[test]
    fn parse_place_mark_rejects_non_numeric_tokens() {
        assert_eq!(parse_place_mark("a b"), None);
    }
}
