use std::io::Write;

use anyhow::Result;
use clap::Args;

use crate::{
    channels::http::models::chat::ChatRequest,
    client::{ChatClient, credentials::CredentialStore, message::Conversation},
    config::MystraConfig,
    error::ChatError,
    extract,
};

#[derive(Debug, Args, Clone)]
pub struct ChatArgs {
    #[arg(
        short,
        long,
        value_name = "PATH",
        value_hint = clap::ValueHint::DirPath,
        help = "path to mystra config file",
    )]
    config: Option<std::path::PathBuf>,

    #[arg(long, help = "forget the stored api key and prompt again")]
    reset_key: bool,
}

pub async fn chat(args: ChatArgs) -> Result<()> {
    let config = MystraConfig::load(args.config.clone())?;
    let client = ChatClient::new(config.client_base_url());

    let store = CredentialStore::new();
    if args.reset_key {
        store.clear()?;
    }

    let api_key = match store.get() {
        Some(key) => key,
        None => {
            let key = prompt_line("api key: ")?;
            store.set(&key)?;
            key
        }
    };

    if !client.validate_api_key(&api_key).await {
        anyhow::bail!("api key rejected, run again with --reset-key to enter a new one");
    }

    let mut conversation = Conversation::new();
    let mut thread_id: Option<String> = None;

    loop {
        let line = prompt_line("> ")?;
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        conversation.push_user(line.clone());

        let request = ChatRequest {
            thread_id: thread_id.clone(),
            message: Some(line),
            ..Default::default()
        };

        let mut session = match client.send_message(&api_key, &request).await {
            Ok(session) => session,
            Err(ChatError::Auth(message)) => {
                log::error!("{} (run again with --reset-key)", message);
                continue;
            }
            Err(err) => {
                log::error!("{}", err);
                continue;
            }
        };

        thread_id = Some(session.thread_id.clone());
        let id = conversation.begin_bot();

        loop {
            match session.reader.read().await {
                Ok(Some(fragment)) => {
                    print!("{}", fragment);
                    std::io::stdout().flush()?;
                    conversation.append(id, &fragment)?;
                }
                Ok(None) => break,
                Err(err) => {
                    log::error!("stream error: {}", err);
                    break;
                }
            }
        }
        println!();

        let text = conversation.freeze(id)?.text.clone();

        // preview is offered whenever a fence exists, even if everything in
        // it was shell and the file list comes out empty
        if extract::has_code(&text) {
            let files = extract::extract_files(&text);
            println!("-- preview files ({}) --", files.len());
            for (name, file) in &files {
                println!("  {} [{}]", name, file.language);
            }
        }
    }

    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    std::io::stdout().flush()?;

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line)? == 0 {
        // EOF behaves like an explicit quit
        return Ok("/quit".into());
    }

    Ok(line.trim().to_string())
}
