use std::sync::atomic::{AtomicI64, Ordering};

use channel_snake::{
    app::{AppConfig, SnakeApp},
    display::{ChatDisplay, DisplayContent, DisplayError, DisplayHandle},
    models::snake::vote_tally::VoterId,
};
use log::{debug, error, info};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prints display traffic to stdout in place of a chat client.
#[derive(Default)]
struct ConsoleDisplay {
    next_handle: AtomicI64,
}

impl ChatDisplay for ConsoleDisplay {
    async fn send_display(&self, content: &DisplayContent) -> Result<DisplayHandle, DisplayError> {
        let handle = DisplayHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        println!("--- message {} ---\n{}", handle.0, render(content));
        Ok(handle)
    }

    async fn edit_display(
        &self,
        handle: DisplayHandle,
        content: &DisplayContent,
    ) -> Result<(), DisplayError> {
        if handle.0 > self.next_handle.load(Ordering::SeqCst) {
            return Err(DisplayError::StaleHandle(handle));
        }
        println!("--- edit {} ---\n{}", handle.0, render(content));
        Ok(())
    }
}

fn render(content: &DisplayContent) -> String {
    let mut out = content.text.clone();
    for row in content.buttons.iter().flatten() {
        let labels: Vec<String> = row
            .iter()
            .map(|b| format!("[{} -> {}]", b.label, b.token))
            .collect();
        out.push('\n');
        out.push_str(&labels.join(" "));
    }
    out
}

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "channel_snake=debug");
    }
    env_logger::init();

    let config = AppConfig::from_env();
    let channel = config.channel;
    let app = match SnakeApp::new(config, ConsoleDisplay::default()) {
        Ok(app) => app,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    info!("Channel snake is running. Commands: /start, /stop, vote <voter> <direction>, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Error reading stdin: {e}");
                break;
            }
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        let reply = match words.as_slice() {
            ["/start"] => app.on_start_command(channel).await,
            ["/stop"] => app.on_stop_command(channel).await,
            ["vote", voter, token] => match voter.parse() {
                Ok(id) => Some(app.on_vote_event(channel, VoterId(id), token).await),
                Err(_) => Some(format!("Not a voter id: {voter}")),
            },
            ["quit"] => break,
            [] => None,
            _ => {
                debug!("Unrecognised input {line:?}");
                Some("Unknown command".to_string())
            }
        };
        if let Some(reply) = reply {
            println!("> {reply}");
        }
    }
    app.shutdown().await;
}
