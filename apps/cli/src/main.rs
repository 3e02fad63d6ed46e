use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{
    config::load_config, ApiClient, ChatController, ClientConfig, SessionEvent, WebSocketTransport,
};
use shared::{domain::UserId, protocol::StreamEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Backend base URL; falls back to client.toml / environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
    /// Create the account before signing in.
    #[arg(long)]
    register: bool,
    #[arg(long)]
    display_name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let config = match args.server_url {
        Some(url) => ClientConfig::new(url),
        None => load_config(),
    };

    let mut api = ApiClient::new(&config);
    let auth = if args.register {
        api.register(&args.username, &args.password, args.display_name.as_deref())
            .await?
    } else {
        api.login(&args.username, &args.password).await?
    };
    println!("Signed in as {}", auth.user.display_label());

    let mut controller = ChatController::new(&config, auth, Arc::new(WebSocketTransport));
    if let Err(err) = controller.start().await {
        warn!(error = %err, "startup sync failed; /retry to try again");
    }
    print_contacts(&controller);
    println!("Commands: /contacts, /open <user-id>, /retry, /quit. Anything else sends to the open chat.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = controller.next_session_event() => {
                let Some(event) = event else { break };
                notify(&event);
                controller.handle_session_event(event);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim().to_string();
                match line.as_str() {
                    "" => {}
                    "/quit" => {
                        controller.logout().await;
                        break;
                    }
                    "/contacts" => print_contacts(&controller),
                    "/retry" => {
                        let result = if controller.directory().is_empty() {
                            controller.start().await
                        } else {
                            controller.reconnect().await
                        };
                        if let Err(err) = result {
                            warn!(error = %err, "retry failed");
                        }
                    }
                    _ if line.starts_with("/open ") => {
                        let peer: UserId = line["/open ".len()..].trim().into();
                        match controller.open_conversation(&peer).await {
                            Ok(()) => print_conversation(&controller),
                            Err(err) => warn!(error = %err, peer = %peer, "conversation fetch failed"),
                        }
                    }
                    _ => {
                        if controller.send(&line).await {
                            print_conversation(&controller);
                        } else {
                            println!("(cannot send: open a chat and stay connected)");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn notify(event: &SessionEvent) {
    match event {
        SessionEvent::Connected => println!("(stream connected)"),
        SessionEvent::Disconnected => println!("(stream disconnected; /retry to reconnect)"),
        SessionEvent::ConnectError(reason) => println!("(stream error: {reason})"),
        SessionEvent::Stream(StreamEvent::Message(message)) => {
            println!("[{}] {}", message.sender, message.content);
        }
        SessionEvent::Stream(_) => {}
    }
}

fn print_contacts(controller: &ChatController) {
    let local_id = &controller.local().id;
    for user in controller.directory().users() {
        if user.id == *local_id {
            continue;
        }
        let presence = if user.online { "online" } else { "offline" };
        let preview = user
            .last_message
            .as_ref()
            .map(|m| format!(" | {}", m.content))
            .unwrap_or_default();
        println!("  {} ({}) [{presence}]{preview}", user.display_label(), user.id);
    }
}

fn print_conversation(controller: &ChatController) {
    for message in controller.conversation().messages() {
        let check = if message.read { " *" } else { "" };
        println!(
            "  {} {}: {}{check}",
            message.created_at.format("%H:%M"),
            message.sender,
            message.content
        );
    }
}
