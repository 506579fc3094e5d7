//! Background tab opening through the host window collaborator.

use log::{debug, error, info};
use std::sync::mpsc::{self, Receiver, SendError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use url::Url;

/// Opaque host window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(u64);

impl WindowHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Host capability for window discovery and tab creation.
pub trait TabHost: Send + Sync {
    /// Currently active browser window, if any.
    fn active_window(&self) -> Option<WindowHandle>;

    /// Opens `url` in `window` without activating the new tab.
    fn open_background_tab(&self, window: WindowHandle, url: &Url);
}

/// Keeps strings that parse as absolute URLs, in input order.
pub fn parse_tab_urls(urls: &[String]) -> Vec<Url> {
    urls.iter()
        .filter_map(|raw| match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(err) => {
                debug!("event=tab_url_rejected module=relay status=skipped reason={err}");
                None
            }
        })
        .collect()
}

enum RelayJob {
    Open(Vec<String>),
    /// Reports tabs opened since the previous drain, then resets the count.
    Drain(Sender<usize>),
}

/// Fire-and-forget relay for `openUrls` requests.
///
/// All background requests share one worker thread, spawned on first use and
/// fed through a FIFO queue, so tabs open in submission order across requests.
pub struct TabOpenRelay {
    host: Arc<dyn TabHost>,
    queue: Mutex<Option<Sender<RelayJob>>>,
}

impl TabOpenRelay {
    pub fn new(host: Arc<dyn TabHost>) -> Self {
        Self {
            host,
            queue: Mutex::new(None),
        }
    }

    /// Queues `urls` for the relay worker and returns immediately.
    pub fn open_tabs(&self, urls: Vec<String>) {
        if !self.submit(RelayJob::Open(urls)) {
            error!("event=open_tabs module=relay status=error reason=worker_unavailable");
        }
    }

    /// Opens `urls` on the calling thread; returns the number of tabs opened.
    pub fn open_now(&self, urls: &[String]) -> usize {
        open_with(self.host.as_ref(), urls)
    }

    /// Waits until every queued request has been handled.
    ///
    /// Returns the tabs opened by background requests since the last drain.
    pub fn drain(&self) -> usize {
        let (reply, settled) = mpsc::channel();
        {
            let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(sender) = queue.as_ref() else {
                return 0;
            };
            if sender.send(RelayJob::Drain(reply)).is_err() {
                return 0;
            }
        }
        settled.recv().unwrap_or_else(|_| {
            error!("event=tab_relay_drain module=relay status=error reason=worker_exited");
            0
        })
    }

    /// Hands `job` to the worker, restarting it if it is gone.
    fn submit(&self, job: RelayJob) -> bool {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let job = match queue.as_ref() {
            Some(sender) => match sender.send(job) {
                Ok(()) => return true,
                Err(SendError(job)) => {
                    error!("event=tab_relay_worker module=relay status=restarting");
                    job
                }
            },
            None => job,
        };

        match spawn_worker(Arc::clone(&self.host)) {
            Ok(sender) => {
                let delivered = sender.send(job).is_ok();
                *queue = Some(sender);
                delivered
            }
            Err(err) => {
                error!("event=tab_relay_spawn module=relay status=error error={err}");
                *queue = None;
                false
            }
        }
    }
}

fn spawn_worker(host: Arc<dyn TabHost>) -> std::io::Result<Sender<RelayJob>> {
    let (sender, jobs) = mpsc::channel();
    thread::Builder::new()
        .name("tab-relay".to_string())
        .spawn(move || run_worker(host.as_ref(), jobs))?;
    Ok(sender)
}

/// Exits once the owning relay drops its sender.
fn run_worker(host: &dyn TabHost, jobs: Receiver<RelayJob>) {
    let mut opened = 0;
    for job in jobs {
        match job {
            RelayJob::Open(urls) => opened += open_with(host, &urls),
            RelayJob::Drain(reply) => {
                let _ = reply.send(opened);
                opened = 0;
            }
        }
    }
}

fn open_with(host: &dyn TabHost, urls: &[String]) -> usize {
    let valid = parse_tab_urls(urls);
    if valid.is_empty() {
        return 0;
    }
    let Some(window) = host.active_window() else {
        info!(
            "event=open_tabs module=relay status=skipped reason=no_active_window requested={}",
            valid.len()
        );
        return 0;
    };

    for url in &valid {
        host.open_background_tab(window, url);
    }
    info!(
        "event=open_tabs module=relay status=ok requested={} opened={} window={}",
        urls.len(),
        valid.len(),
        window.id()
    );
    valid.len()
}
