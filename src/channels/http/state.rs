use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{config::UpstreamConfig, upstream::request::Message};

/// In-memory per-thread conversation histories. Touched only at request
/// start and at clean stream end, so a mid-stream failure never records a
/// half reply.
#[derive(Debug, Clone, Default)]
pub struct ThreadStore {
    threads: Arc<Mutex<HashMap<String, Vec<Message>>>>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing thread id or a fresh one, plus a snapshot of its history.
    pub async fn resolve(&self, thread_id: Option<String>) -> (String, Vec<Message>) {
        let mut threads = self.threads.lock().await;
        match thread_id {
            Some(id) => {
                let history = threads.entry(id.clone()).or_default().clone();
                (id, history)
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                threads.insert(id.clone(), Vec::new());
                (id, Vec::new())
            }
        }
    }

    pub async fn append(&self, thread_id: &str, message: Message) {
        let mut threads = self.threads.lock().await;
        threads.entry(thread_id.to_string()).or_default().push(message);
    }
}

#[derive(Debug, Clone)]
pub struct HTTPState {
    pub upstream: UpstreamConfig,
    pub threads: ThreadStore,
}
