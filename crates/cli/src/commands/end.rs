//! `rose end`: discard a session.

use rose_core::checkpoint::CheckpointStore;
use rose_core::message::SessionId;

use super::{checkpoint_store, load_config};

pub async fn run(session: String) -> anyhow::Result<()> {
    let config = load_config()?;
    let store = checkpoint_store(&config).await?;
    let session = SessionId::from(session.as_str());

    if store.delete(&session).await? {
        println!("  Session {session} ended.");
    } else {
        println!("  No session named {session}.");
    }
    Ok(())
}
