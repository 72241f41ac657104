//! Scripted fakes for driving sessions and batches without Steam.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::batch::SessionRunner;
use crate::core::entry::GameEntry;
use crate::core::types::{AppId, ProgressSnapshot, SessionOutcome, SourceKind};
use crate::io::clock::Clock;
use crate::io::presence::{GamePresenceSession, PresenceError, PresenceProvider};
use crate::io::progress::{ProgressError, ProgressSource};

/// Clock whose `sleep` advances time instantly.
#[derive(Debug)]
pub struct FakeClock {
    base: Instant,
    offset: Cell<Duration>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
    }
}

/// Progress source replaying a fixed list of results.
///
/// Once the script runs out, the last successful count repeats.
#[derive(Debug)]
pub struct ScriptedProgress {
    kind: SourceKind,
    script: VecDeque<Result<u32, ProgressError>>,
    last: u32,
    pub calls: u32,
    pub begun: bool,
}

impl ScriptedProgress {
    pub fn inventory(script: Vec<Result<u32, ProgressError>>) -> Self {
        Self::new(SourceKind::Inventory, script)
    }

    pub fn elapsed_time(script: Vec<Result<u32, ProgressError>>) -> Self {
        Self::new(SourceKind::ElapsedTime, script)
    }

    fn new(kind: SourceKind, script: Vec<Result<u32, ProgressError>>) -> Self {
        Self {
            kind,
            script: script.into(),
            last: 0,
            calls: 0,
            begun: false,
        }
    }
}

impl ProgressSource for ScriptedProgress {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn begin(&mut self, _at: Instant) {
        self.begun = true;
    }

    fn snapshot(&mut self, _app_id: AppId, now: Instant) -> Result<ProgressSnapshot, ProgressError> {
        self.calls += 1;
        let count = match self.script.pop_front() {
            Some(step) => step?,
            None => self.last,
        };
        self.last = count;
        Ok(ProgressSnapshot {
            absolute_count: count,
            observed_at: now,
        })
    }
}

/// Everything the scripted presence saw.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PresenceLog {
    pub checks: u32,
    pub acquired: Vec<AppId>,
    pub keep_alives: u32,
    pub releases: u32,
}

/// Presence provider with scripted failures and a shared call log.
#[derive(Debug, Default, Clone)]
pub struct ScriptedPresence {
    pub environment: Option<PresenceError>,
    pub acquire_error: Option<PresenceError>,
    /// Keep-alive fails after this many successful calls.
    pub lost_after: Option<u32>,
    pub log: Rc<RefCell<PresenceLog>>,
}

impl ScriptedPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> PresenceLog {
        self.log.borrow().clone()
    }
}

impl PresenceProvider for ScriptedPresence {
    type Session = ScriptedPresenceSession;

    fn check_environment(&self) -> Result<(), PresenceError> {
        self.log.borrow_mut().checks += 1;
        match &self.environment {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn acquire(&self, app_id: AppId) -> Result<ScriptedPresenceSession, PresenceError> {
        if let Some(err) = &self.acquire_error {
            return Err(err.clone());
        }
        self.log.borrow_mut().acquired.push(app_id);
        Ok(ScriptedPresenceSession {
            log: Rc::clone(&self.log),
            lost_after: self.lost_after,
            keep_alives: 0,
            released: false,
        })
    }
}

#[derive(Debug)]
pub struct ScriptedPresenceSession {
    log: Rc<RefCell<PresenceLog>>,
    lost_after: Option<u32>,
    keep_alives: u32,
    released: bool,
}

impl GamePresenceSession for ScriptedPresenceSession {
    fn keep_alive(&mut self) -> Result<(), PresenceError> {
        if self.lost_after.is_some_and(|limit| self.keep_alives >= limit) {
            return Err(PresenceError::Lost("scripted helper exit".to_string()));
        }
        self.keep_alives += 1;
        self.log.borrow_mut().keep_alives += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<(), PresenceError> {
        if !self.released {
            self.released = true;
            self.log.borrow_mut().releases += 1;
        }
        Ok(())
    }
}

/// Session runner replaying outcomes in order and recording what it ran.
#[derive(Debug, Default)]
pub struct ScriptedSessionRunner {
    outcomes: VecDeque<SessionOutcome>,
    pub ran: Vec<GameEntry>,
}

impl ScriptedSessionRunner {
    pub fn new(outcomes: Vec<SessionOutcome>) -> Self {
        Self {
            outcomes: outcomes.into(),
            ran: Vec::new(),
        }
    }

    pub fn ran_app_ids(&self) -> Vec<u32> {
        self.ran.iter().map(|entry| entry.app_id.0).collect()
    }
}

impl SessionRunner for ScriptedSessionRunner {
    fn run(&mut self, entry: &GameEntry) -> Result<SessionOutcome> {
        self.ran.push(entry.clone());
        Ok(self
            .outcomes
            .pop_front()
            .unwrap_or(SessionOutcome::Completed))
    }
}

/// Write a batch list file into `dir`.
pub fn write_list(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("games.txt");
    std::fs::write(&path, contents).expect("write batch list");
    path
}

/// One-shot HTTP server answering canned responses in order.
pub struct FixtureServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FixtureServer {
    pub fn serve(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fixture server");
        let addr = listener.local_addr().expect("fixture server addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        thread::spawn(move || {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let Ok(read_half) = stream.try_clone() else {
                    return;
                };
                let mut reader = BufReader::new(read_half);
                let mut request_line = String::new();
                let _ = reader.read_line(&mut request_line);
                loop {
                    let mut header = String::new();
                    match reader.read_line(&mut header) {
                        Ok(0) | Err(_) => break,
                        Ok(_) if header == "\r\n" => break,
                        Ok(_) => {}
                    }
                }
                if let Ok(mut seen) = seen.lock() {
                    seen.push(request_line.trim_end().to_string());
                }

                let reason = match status {
                    200 => "OK",
                    403 => "Forbidden",
                    429 => "Too Many Requests",
                    _ => "Error",
                };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        Self { addr, requests }
    }

    /// Base URL of a port nothing listens on.
    pub fn closed_base_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        format!("http://{addr}")
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request lines (`GET /path?query HTTP/1.1`) in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

/// Inventory page JSON holding `cards` trading cards for `app_id`.
pub fn card_page(app_id: u32, cards: u32, last_assetid: Option<&str>) -> String {
    let classid = format!("c{app_id}");
    let assets: Vec<serde_json::Value> = (0..cards)
        .map(|i| {
            serde_json::json!({
                "assetid": format!("{}", 1000 + i),
                "classid": classid,
                "amount": "1",
            })
        })
        .collect();
    let mut page = serde_json::json!({
        "success": 1,
        "assets": assets,
        "descriptions": [{
            "classid": classid,
            "market_fee_app": app_id,
            "tags": [{
                "category": "item_class",
                "internal_name": "item_class_2",
                "localized_tag_name": "Trading Card",
            }],
        }],
        "total_inventory_count": cards,
    });
    if let Some(last) = last_assetid {
        page["more_items"] = serde_json::json!(1);
        page["last_assetid"] = serde_json::json!(last);
    }
    page.to_string()
}
