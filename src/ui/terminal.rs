//! Terminal front-end: reads lines, dispatches them to the store, and
//! renders store changes as they happen.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinHandle, JoinSet};

use super::input::{Command, HELP_TEXT, InputBox};
use super::progress::render_status;
use super::transcript::{EMPTY_HINT, TranscriptView};
use crate::conversation::{ConversationStore, StoreEvent};

/// Run an interactive session on stdin/stdout until `/quit` or EOF.
pub async fn run(store: Arc<ConversationStore>) -> std::io::Result<()> {
    run_with(store, BufReader::new(tokio::io::stdin())).await
}

/// Run a session reading lines from `reader`.
///
/// Sends are dispatched in the background so the next line can be typed
/// while a reply is pending. On EOF pending operations are allowed to finish;
/// `/quit` closes the session and drops them.
pub async fn run_with<R>(store: Arc<ConversationStore>, reader: R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    eprintln!("🤖 Anton - Your AI Companion");
    eprintln!("   Complete 7 days of onboarding to help us understand you better");
    eprintln!("   {HELP_TEXT}\n");
    eprintln!("{}\n", render_status(store.status().await.as_ref()));
    if store.is_empty().await {
        eprintln!("{EMPTY_HINT}");
    }

    let renderer = spawn_renderer(Arc::clone(&store));
    let mut tasks = JoinSet::new();
    let mut input = InputBox::new();
    let mut lines = reader.lines();
    let mut quit = false;

    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        input.set(line);
        let Some(command) = input.submission() else {
            eprint!("> ");
            continue;
        };

        match command {
            Command::Say(text) => {
                let store = Arc::clone(&store);
                tasks.spawn(async move {
                    store.send_message(&text).await;
                });
            }
            Command::MarkDayComplete => {
                let store = Arc::clone(&store);
                tasks.spawn(async move {
                    if let Err(e) = store.mark_day_complete().await {
                        eprintln!("⚠️  Could not mark the day complete ({e}). Please try again.");
                    }
                });
            }
            Command::RefreshStatus => {
                let store = Arc::clone(&store);
                tasks.spawn(async move {
                    // Success is rendered by the StatusReplaced event.
                    if store.fetch_user_status().await.is_err() && !store.is_closed() {
                        eprintln!("⚠️  Could not refresh status; showing last known values.");
                        eprintln!("{}\n", render_status(store.status().await.as_ref()));
                    }
                });
            }
            Command::Export => {
                let store = Arc::clone(&store);
                tasks.spawn(async move {
                    match store.export_data().await {
                        Ok(doc) => match serde_json::to_string_pretty(&doc) {
                            Ok(pretty) => println!("{pretty}"),
                            Err(e) => tracing::warn!(error = %e, "Export document not printable"),
                        },
                        Err(e) => eprintln!("⚠️  Export failed ({e})."),
                    }
                });
            }
            Command::Help => eprintln!("{HELP_TEXT}"),
            Command::Quit => {
                quit = true;
                break;
            }
        }

        // Cleared once dispatched; the reply may still be pending.
        input.clear();
        eprint!("> ");
    }

    if quit {
        store.shutdown();
    }
    while tasks.join_next().await.is_some() {}
    store.shutdown();

    renderer.await.ok();
    Ok(())
}

/// Print new messages and status changes until the session closes.
fn spawn_renderer(store: Arc<ConversationStore>) -> JoinHandle<()> {
    let mut rx = store.subscribe();
    tokio::spawn(async move {
        let mut view = TranscriptView::new();
        loop {
            match rx.recv().await {
                Ok(StoreEvent::MessageAppended { .. }) | Err(RecvError::Lagged(_)) => {
                    for line in view.render_new(&store.transcript().await) {
                        println!("{line}");
                    }
                }
                Ok(StoreEvent::StatusReplaced(status)) => {
                    eprintln!("\n{}\n", render_status(Some(&status)));
                }
                Ok(StoreEvent::Closed) | Err(RecvError::Closed) => break,
            }
        }
    })
}
