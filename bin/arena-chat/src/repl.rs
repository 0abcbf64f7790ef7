//! Line-oriented chat loop on stdin/stdout.

use std::io::Write;

use arena_chat_core::{ChatError, ChatSession, HttpInferenceClient, TranscriptEntry, TurnOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(session: &ChatSession<HttpInferenceClient>) -> anyhow::Result<()> {
    for entry in session.transcript() {
        print_entry(&entry);
    }
    println!("Type a message, /clear to erase history, /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear_history().await;
                println!("Chat history cleared.");
                continue;
            }
            _ => {}
        }

        println!("loading...");
        match session.send_turn(&line).await {
            Ok(TurnOutcome::NothingToPersist) => println!("(no reply)"),
            Ok(_) => {
                if let Some(reply) = session.transcript().last() {
                    print_entry(reply);
                }
            }
            Err(ChatError::Unauthenticated) => {
                println!("Not signed in. Restart with --token or set ARENA_TOKEN.");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn print_entry(entry: &TranscriptEntry) {
    if entry.is_user() {
        println!("you: {}", entry.text);
    } else {
        println!("ai:  {}", entry.text);
    }
}
