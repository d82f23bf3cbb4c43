//! Scripted in-memory transport for unit tests

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ProvisionError, Result};
use crate::ssh::deploy::Mirror;
use crate::ssh::transport::{ChannelEvent, ChannelInput, Connection, RemoteChannel};

/// Canned response for commands matching a prefix
#[derive(Debug, Clone)]
pub struct Reply {
    accepted: bool,
    stdout: Vec<u8>,
    status: Option<u32>,
    signal: Option<String>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            accepted: true,
            stdout: Vec::new(),
            status: Some(0),
            signal: None,
        }
    }

    pub fn status(status: u32) -> Self {
        Self {
            status: Some(status),
            ..Self::ok()
        }
    }

    pub fn signal(name: &str) -> Self {
        Self {
            status: None,
            signal: Some(name.to_string()),
            ..Self::ok()
        }
    }

    pub fn rejected() -> Self {
        Self {
            accepted: false,
            status: None,
            ..Self::ok()
        }
    }

    pub fn with_status(mut self, status: Option<u32>) -> Self {
        self.status = status;
        self
    }

    pub fn stdout(mut self, out: &str) -> Self {
        self.stdout = out.as_bytes().to_vec();
        self
    }

    fn events(&self) -> VecDeque<ChannelEvent> {
        let mut events = VecDeque::new();
        if !self.accepted {
            events.push_back(ChannelEvent::Rejected);
            events.push_back(ChannelEvent::Close);
            return events;
        }
        events.push_back(ChannelEvent::Accepted);
        if !self.stdout.is_empty() {
            events.push_back(ChannelEvent::Stdout(self.stdout.clone()));
        }
        events.push_back(ChannelEvent::Eof);
        if let Some(status) = self.status {
            events.push_back(ChannelEvent::ExitStatus(status));
        }
        if let Some(ref signal) = self.signal {
            events.push_back(ChannelEvent::ExitSignal(signal.clone()));
        }
        events.push_back(ChannelEvent::Close);
        events
    }
}

#[derive(Debug, Default)]
struct MockState {
    replies: Vec<(String, Reply)>,
    commands: Vec<String>,
    stdin: Vec<(String, Vec<u8>)>,
    opened: usize,
}

impl MockState {
    /// Longest registered prefix wins; unknown commands succeed silently
    fn reply_for(&self, command: &str) -> Reply {
        self.replies
            .iter()
            .filter(|(prefix, _)| command.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(Reply::ok)
    }
}

/// Connection that answers from a script and records what it was asked
#[derive(Debug, Clone)]
pub struct MockConnection {
    host: String,
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn reply(&self, prefix: &str, reply: Reply) {
        self.state
            .lock()
            .unwrap()
            .replies
            .push((prefix.to_string(), reply));
    }

    /// Every command exec'd so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn count_matching(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Stdin uploaded to the first command starting with `prefix`
    pub fn stdin_for(&self, prefix: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .stdin
            .iter()
            .find(|(command, _)| command.starts_with(prefix))
            .map(|(_, bytes)| bytes.clone())
    }

    /// Number of channels opened so far
    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn host(&self) -> &str {
        &self.host
    }

    async fn open_channel(&self) -> Result<Box<dyn RemoteChannel>> {
        self.state.lock().unwrap().opened += 1;
        Ok(Box::new(MockChannel {
            state: Arc::clone(&self.state),
            command: None,
            events: VecDeque::new(),
            stdin: Vec::new(),
        }))
    }
}

struct MockChannel {
    state: Arc<Mutex<MockState>>,
    command: Option<String>,
    events: VecDeque<ChannelEvent>,
    stdin: Vec<u8>,
}

#[async_trait]
impl ChannelInput for MockChannel {
    async fn data(&mut self, bytes: &[u8]) -> Result<()> {
        self.stdin.extend_from_slice(bytes);
        Ok(())
    }

    async fn eof(&mut self) -> Result<()> {
        let command = self.command.clone().unwrap_or_default();
        let stdin = std::mem::take(&mut self.stdin);
        self.state.lock().unwrap().stdin.push((command, stdin));
        Ok(())
    }
}

#[async_trait]
impl RemoteChannel for MockChannel {
    async fn request_exec(&mut self, command: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_string());
        self.events = state.reply_for(command).events();
        self.command = Some(command.to_string());
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.pop_front()
    }

    fn as_input(&mut self) -> &mut dyn ChannelInput {
        self
    }
}

/// Mirror backend that records calls and returns a fixed rsync status
#[derive(Debug, Clone, Default)]
pub struct MockMirror {
    status: i32,
    calls: Arc<Mutex<Vec<(PathBuf, String, String)>>>,
}

impl MockMirror {
    pub fn failing(status: i32) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// (source, hostname, remote dir) per call
    pub fn calls(&self) -> Vec<(PathBuf, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mirror for MockMirror {
    async fn mirror(
        &self,
        source: &Path,
        hostname: &str,
        remote_dir: &str,
        _ssh_options: &[String],
    ) -> Result<()> {
        self.calls.lock().unwrap().push((
            source.to_path_buf(),
            hostname.to_string(),
            remote_dir.to_string(),
        ));
        if self.status == 0 {
            Ok(())
        } else {
            Err(ProvisionError::Sync {
                status: Some(self.status),
                command: format!("rsync . {}:{}", hostname, remote_dir),
            })
        }
    }
}
