//! `rose chat`: interactive conversation in the terminal.
//!
//! Every reply is spoken too: synthesized audio is saved under the audio
//! directory and its path printed next to the text.

use rose_core::message::SessionId;
use rose_workflow::UserInput;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{build_orchestrator, load_config, print_reply, require_api_key};

pub async fn run(session: Option<String>) -> anyhow::Result<()> {
    let config = load_config()?;
    require_api_key(&config)?;

    let orchestrator = build_orchestrator(&config).await?;
    let session = session
        .map(|s| SessionId::from(s.as_str()))
        .unwrap_or_default();

    let history = orchestrator
        .session(&session)
        .await?
        .map(|state| state.messages().len())
        .unwrap_or(0);

    println!();
    println!("  Chatting with {}", config.character_name);
    println!("  Session:   {session}");
    if history > 0 {
        println!("  History:   {history} messages");
    }
    println!("  Model:     {}", config.models.text_model);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type '/end' to forget this session, 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/end" => {
                orchestrator.end_session(&session).await?;
                println!("  Session ended.");
                break;
            }
            _ => {}
        }

        eprint!("  ...");
        let reply = orchestrator
            .run_turn(&session, UserInput::Text(line.to_string()))
            .await;
        eprint!("\r     \r");
        println!();
        print_reply(&config, &session, &reply).await?;
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
