// Infinite Scroll Attachment - retry / debounce / cooldown pagination trigger
//
// A grid container may mount late, so attachment polls for it on a fixed
// retry budget, then finds the scrollable surface inside it and reacts to
// scroll events. When the user gets close to the bottom, the registered
// pagination callback fires once; a busy window blocks re-entry until one
// second after the load settles.
//
// All timing is injected (`Instant` parameters), so the state machine is
// deterministic: the UI event loop supplies real time, tests supply a
// hand-stepped clock.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Attachment retry budget.
pub const MAX_ATTACH_ATTEMPTS: u32 = 10;

/// Delay between attachment attempts.
pub const ATTACH_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Quiet period required after the last scroll event before it is handled.
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(150);

/// Distance from the bottom (scroll units) that triggers a page load.
pub const BOTTOM_THRESHOLD: f64 = 300.0;

/// Hold-off after a load settles before the next trigger may fire.
/// Carried over from the source verbatim; see DESIGN.md.
pub const LOAD_COOLDOWN: Duration = Duration::from_millis(1000);

/// Geometry of a scrollable surface, mirroring DOM scroll metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - (self.scroll_top + self.client_height)
    }

    pub fn is_scrollable(&self) -> bool {
        self.scroll_height > self.client_height
    }
}

/// What a watcher attaches to. The TUI grid implements this; tests use mocks.
pub trait ScrollHost {
    /// Whether the outer container exists yet (it may mount late).
    fn has_container(&self, container_id: &str) -> bool;

    /// Metrics of the scrollable element inside the container, once rendered.
    /// `None` while the container exists but its scrollable child does not.
    fn scroll_metrics(&self, container_id: &str) -> Option<ScrollMetrics>;

    /// Programmatic scroll, used by the manual diagnostic.
    fn scroll_to(&mut self, container_id: &str, scroll_top: f64);
}

/// Pagination callback, invoked by method name. Mirrors the remote-invoke
/// handle + method pair the attachment contract is written in terms of.
pub trait ScrollCallback {
    fn invoke(&mut self, method: &str) -> Result<()>;
}

/// Attachment lifecycle of a single watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachPhase {
    /// Still polling for the container / scrollable child.
    Searching,
    /// Listener live, reacting to scroll events.
    Attached,
    /// Retry budget exhausted; watcher is inert.
    Failed,
}

struct Watcher {
    method: String,
    callback: Box<dyn ScrollCallback>,
    phase: AttachPhase,
    attempts: u32,
    next_attempt: Instant,
    /// Armed by scroll events; the event is handled once `now` passes it.
    debounce_deadline: Option<Instant>,
    /// While `now` is before this, pagination triggers are suppressed.
    busy_until: Option<Instant>,
}

impl Watcher {
    fn new(method: &str, callback: Box<dyn ScrollCallback>, now: Instant) -> Self {
        Self {
            method: method.to_string(),
            callback,
            phase: AttachPhase::Searching,
            attempts: 0,
            next_attempt: now,
            debounce_deadline: None,
            busy_until: None,
        }
    }

    fn on_scroll(&mut self, now: Instant) {
        if self.phase == AttachPhase::Attached {
            self.debounce_deadline = Some(now + SCROLL_DEBOUNCE);
        }
    }

    fn tick(&mut self, container_id: &str, now: Instant, host: &mut dyn ScrollHost) {
        match self.phase {
            AttachPhase::Searching => self.try_attach(container_id, now, host),
            AttachPhase::Attached => self.handle_scroll(container_id, now, host),
            AttachPhase::Failed => {}
        }
    }

    fn try_attach(&mut self, container_id: &str, now: Instant, host: &dyn ScrollHost) {
        if now < self.next_attempt {
            return;
        }

        self.attempts += 1;

        if !host.has_container(container_id) {
            self.retry_or_fail(container_id, now, "container not found");
            return;
        }

        match host.scroll_metrics(container_id) {
            Some(metrics) => {
                info!(
                    "[scroll] attached to {container_id} (attempt {}/{})",
                    self.attempts, MAX_ATTACH_ATTEMPTS
                );
                if !metrics.is_scrollable() {
                    warn!(
                        "[scroll] {container_id} is not scrollable yet: scroll_height {} <= client_height {}",
                        metrics.scroll_height, metrics.client_height
                    );
                }
                self.phase = AttachPhase::Attached;
            }
            None => self.retry_or_fail(container_id, now, "scrollable element not found"),
        }
    }

    fn retry_or_fail(&mut self, container_id: &str, now: Instant, what: &str) {
        if self.attempts < MAX_ATTACH_ATTEMPTS {
            debug!(
                "[scroll] {what} in {container_id} (attempt {}/{}), retrying",
                self.attempts, MAX_ATTACH_ATTEMPTS
            );
            self.next_attempt = now + ATTACH_RETRY_DELAY;
        } else {
            error!("[scroll] {what} in {container_id} after {MAX_ATTACH_ATTEMPTS} attempts, giving up");
            self.phase = AttachPhase::Failed;
        }
    }

    fn handle_scroll(&mut self, container_id: &str, now: Instant, host: &dyn ScrollHost) {
        let Some(deadline) = self.debounce_deadline else {
            return;
        };
        if now < deadline {
            return;
        }
        self.debounce_deadline = None;

        if let Some(busy_until) = self.busy_until {
            if now < busy_until {
                debug!("[scroll] {container_id} still loading, ignoring scroll");
                return;
            }
            self.busy_until = None;
        }

        let Some(metrics) = host.scroll_metrics(container_id) else {
            warn!("[scroll] scrollable element for {container_id} went away");
            return;
        };

        if metrics.distance_from_bottom() <= BOTTOM_THRESHOLD {
            info!(
                "[scroll] {container_id} near bottom ({:.0} units), invoking {}",
                metrics.distance_from_bottom(),
                self.method
            );

            match self.callback.invoke(&self.method) {
                Ok(()) => debug!("[scroll] {} completed", self.method),
                Err(e) => error!("[scroll] error calling {}: {e:#}", self.method),
            }

            // Hold off further triggers until the cooldown after settlement
            // passes, whether the load succeeded or not.
            self.busy_until = Some(now + LOAD_COOLDOWN);
        }
    }
}

/// Owned registry of scroll watchers, keyed by container id.
/// Created at startup, entries removed on disposal.
#[derive(Default)]
pub struct ScrollRegistry {
    watchers: HashMap<String, Watcher>,
}

impl ScrollRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watcher for `container_id`. Any existing watcher for the
    /// same id is disposed first, so re-attachment never stacks listeners.
    pub fn setup(
        &mut self,
        container_id: &str,
        callback: Box<dyn ScrollCallback>,
        method: &str,
        now: Instant,
    ) {
        if self.watchers.remove(container_id).is_some() {
            info!("[scroll] disposing existing watcher for {container_id}");
        }

        info!("[scroll] setting up {container_id}, method {method}");
        self.watchers
            .insert(container_id.to_string(), Watcher::new(method, callback, now));
    }

    /// Record a scroll event for a container. No-op for unknown ids or
    /// watchers that are not attached yet.
    pub fn on_scroll(&mut self, container_id: &str, now: Instant) {
        if let Some(watcher) = self.watchers.get_mut(container_id) {
            watcher.on_scroll(now);
        }
    }

    /// Advance every watcher: attachment retries and debounced scroll
    /// handling both happen here. Call once per event-loop iteration.
    pub fn tick_all(&mut self, now: Instant, host: &mut dyn ScrollHost) {
        for (id, watcher) in self.watchers.iter_mut() {
            watcher.tick(id, now, host);
        }
    }

    /// Remove a watcher and its pending timers. Returns false for unknown ids.
    pub fn dispose(&mut self, container_id: &str) -> bool {
        let removed = self.watchers.remove(container_id).is_some();
        if removed {
            info!("[scroll] disposed watcher for {container_id}");
        }
        removed
    }

    pub fn dispose_all(&mut self) {
        let count = self.watchers.len();
        self.watchers.clear();
        info!("[scroll] all {count} watchers disposed");
    }

    pub fn phase(&self, container_id: &str) -> Option<AttachPhase> {
        self.watchers.get(container_id).map(|w| w.phase)
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

/// Manual diagnostic: log the surface geometry of a container and try
/// scrolling it to the middle.
pub fn test_scroll(host: &mut dyn ScrollHost, container_id: &str) {
    if !host.has_container(container_id) {
        error!("[scroll] container {container_id} not found");
        return;
    }

    let Some(metrics) = host.scroll_metrics(container_id) else {
        error!("[scroll] no scrollable element in {container_id}");
        return;
    };

    info!(
        "[scroll] {container_id}: scroll_top={:.0} scroll_height={:.0} client_height={:.0} can_scroll={}",
        metrics.scroll_top,
        metrics.scroll_height,
        metrics.client_height,
        metrics.is_scrollable()
    );

    host.scroll_to(container_id, metrics.scroll_height / 2.0);

    if let Some(after) = host.scroll_metrics(container_id) {
        info!(
            "[scroll] scrolled {container_id} to middle, new scroll_top={:.0}",
            after.scroll_top
        );
    }
}
