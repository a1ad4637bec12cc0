use std::time::Duration;

use structopt::StructOpt;
use tokio::io::{self, AsyncBufReadExt, BufReader};

use client::{ClientError, Controller, GameStub, Outcome, Params};
use protocol::{GameType, Transport};

const BROKER_RECONNECT_SCHEDULE: [Duration; 3] =
    [Duration::from_secs(1), Duration::from_secs(3), Duration::from_secs(10)];

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let params = Params::from_args();
    let mut lines = BufReader::new(io::stdin()).lines();

    println!("Welcome!\nEnter your username:");
    let username = match lines.next_line().await? {
        Some(line) => line.trim().to_string(),
        None => return Ok(()),
    };

    let transport = match Transport::connect_with_backoff(params.broker_addr, &BROKER_RECONNECT_SCHEDULE).await {
        Ok(transport) => transport,
        Err(_) => {
            println!("Broker is not available. Try again later.");
            return Ok(());
        }
    };
    println!("Connected to broker at {}", params.broker_addr);

    let stub = GameStub::new(username, transport);

    loop {
        println!("{}", " Main Menu ".to_string());
        println!("1. Training\n2. Multiplayer\n3. Exit");

        let command = match lines.next_line().await? {
            Some(line) => line.trim().to_lowercase(),
            None => return Ok(()),
        };

        let game_type = match command.as_str() {
            "1" | "train" | "training" => GameType::Single,
            "2" | "multi" | "multiplayer" => GameType::Multi,
            "3" | "exit" | "/exit" => return Ok(()),
            _ => {
                println!("Unrecognized command.");
                continue;
            }
        };

        let mut controller = Controller::new(&stub);
        match controller.run(game_type).await? {
            Outcome::ReturnedToMenu => continue,
            Outcome::ExitRequested => return Ok(()),
        }
    }
}
