//! Command-line surface: interactive chat, one-shot health probe, history dump.

use rustyline::error::ReadlineError;

use crate::agent::{Agent, Reply, ReplyOutcome};
use crate::db::ConversationStore;
use crate::health::check_health;
use crate::llm::ModelClient;
use crate::tenant::TenantId;

/// Run the chat surface: one-shot when `message` is given, otherwise an
/// interactive read-eval-print loop.
pub async fn run_chat(
    agent: &Agent,
    tenant: &TenantId,
    message: Option<String>,
) -> anyhow::Result<()> {
    if let Some(message) = message {
        let reply = agent.handle_message(tenant, &message).await?;
        print_reply(&reply);
        return Ok(());
    }

    let mut editor = rustyline::DefaultEditor::new()?;
    let history_path = dirs::data_local_dir().map(|d| d.join("parley").join("chat_history.txt"));
    if let Some(path) = &history_path {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let _ = editor.load_history(path);
    }

    println!("Chatting as tenant {tenant}. Ctrl-D to exit.");

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                match agent.handle_message(tenant, line).await {
                    Ok(reply) => print_reply(&reply),
                    // Display only the top-level message; source chains may
                    // carry endpoint details that do not belong on screen.
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }

    Ok(())
}

fn print_reply(reply: &Reply) {
    match reply.outcome {
        ReplyOutcome::Answered => println!("{}", reply.text),
        ReplyOutcome::Refused => println!("[refused] {}", reply.text),
    }
    if let Some(warning) = &reply.warning {
        eprintln!("warning: {warning}");
    }
}

/// One-shot health check. Prints a per-component pass/fail list and returns
/// the process exit code: 0 on all-pass, 1 otherwise.
pub async fn run_health(store: &dyn ConversationStore, model: &ModelClient) -> i32 {
    let report = check_health(store, model).await;

    println!("store: {}", report.store);
    println!("model: {}", report.model);

    if report.healthy() {
        println!("status: ok");
        0
    } else {
        println!("status: fail");
        1
    }
}

/// Print a tenant's most recent turns, oldest first.
pub async fn run_history(
    store: &dyn ConversationStore,
    tenant: &TenantId,
    limit: usize,
) -> anyhow::Result<()> {
    let turns = store.fetch_recent_turns(tenant, limit).await?;

    if turns.is_empty() {
        println!("no turns recorded for tenant {tenant}");
        return Ok(());
    }

    for turn in turns {
        println!(
            "{:>6}  {}  [{}] {}",
            turn.seq,
            turn.created_at.format("%Y-%m-%d %H:%M:%S"),
            turn.role,
            turn.content
        );
    }

    Ok(())
}
