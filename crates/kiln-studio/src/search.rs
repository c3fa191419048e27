use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use kiln_catalog::{SingleInstanceTracker, TypeCatalog, TypeDescriptor};

use crate::events::{EventBus, StudioEvent, Subscription, Topic};
use crate::settings::{Setting, SettingsView, Visibility};

/// Input must stay quiet this long before a filter pass runs.
pub const QUIET_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    /// Blank filter text; the whole catalog is listed.
    Listing,
    Filtering,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub descriptor: TypeDescriptor,
    /// Instantiated single-instance type shown under the `Disabled` policy.
    pub disabled: bool,
}

/// Debounced free-text filter over the type catalog.
///
/// Keystrokes only record the text; the filter runs from [`SearchEngine::tick`]
/// once the input has been quiet for the configured interval. A catalog
/// rebuild or a visibility change forces one extra pass on the next tick.
#[derive(Debug)]
pub struct SearchEngine {
    text: String,
    last_keystroke: Option<Instant>,
    executed: bool,
    quiet_interval: Duration,
    results: Vec<SearchHit>,
    generation: Option<u64>,
    passes: u64,
    settings: SettingsView,
    refresh_requested: Rc<Cell<bool>>,
    _visibility: Subscription,
}

impl SearchEngine {
    pub fn new(bus: &EventBus, settings: SettingsView) -> Self {
        Self::with_quiet_interval(bus, settings, QUIET_INTERVAL)
    }

    pub fn with_quiet_interval(bus: &EventBus, settings: SettingsView, quiet_interval: Duration) -> Self {
        let refresh_requested = Rc::new(Cell::new(false));
        let flag = Rc::clone(&refresh_requested);
        let visibility = bus.subscribe(Topic::SettingChanged, move |event| {
            if let StudioEvent::SettingChanged(Setting::SingleInstanceVisibility) = event {
                flag.set(true);
            }
        });
        Self {
            text: String::new(),
            last_keystroke: None,
            executed: false,
            quiet_interval,
            results: Vec::new(),
            generation: None,
            passes: 0,
            settings,
            refresh_requested,
            _visibility: visibility,
        }
    }

    pub fn on_keystroke(&mut self, text: impl Into<String>, now: Instant) {
        self.text = text.into();
        self.last_keystroke = Some(now);
        self.executed = false;
    }

    /// Requests one re-filter on the next tick.
    pub fn invalidate(&self) {
        self.refresh_requested.set(true);
    }

    /// Runs at most one filter pass. Returns whether the results were rebuilt.
    pub fn tick(&mut self, now: Instant, catalog: &TypeCatalog, tracker: &SingleInstanceTracker) -> bool {
        let quiet = self
            .last_keystroke
            .map_or(true, |marker| now.saturating_duration_since(marker) > self.quiet_interval);
        let debounce_due = !self.executed && quiet;
        let forced = self.refresh_requested.get() || self.generation != Some(catalog.generation());
        if !debounce_due && !(forced && self.executed) {
            return false;
        }
        self.run(catalog, tracker);
        true
    }

    /// Runs a pending pass immediately, ignoring the quiet interval.
    pub fn flush(&mut self, catalog: &TypeCatalog, tracker: &SingleInstanceTracker) -> bool {
        let forced = self.refresh_requested.get() || self.generation != Some(catalog.generation());
        if self.executed && !forced {
            return false;
        }
        self.run(catalog, tracker);
        true
    }

    fn run(&mut self, catalog: &TypeCatalog, tracker: &SingleInstanceTracker) {
        let snapshot = catalog.snapshot();
        let query = self.text.trim().to_lowercase();
        let visibility = self.settings.visibility();
        self.results = snapshot
            .iter()
            .filter(|descriptor| query.is_empty() || descriptor.matches_lowercase(&query))
            .filter_map(|descriptor| {
                let locked = descriptor.is_single_instance() && tracker.is_instantiated(descriptor);
                if locked && visibility == Visibility::Hidden {
                    return None;
                }
                Some(SearchHit {
                    descriptor: descriptor.clone(),
                    disabled: locked,
                })
            })
            .collect();
        self.executed = true;
        self.refresh_requested.set(false);
        self.generation = Some(snapshot.generation());
        self.passes += 1;
        tracing::trace!(query = %query, hits = self.results.len(), "search pass");
    }

    pub fn state(&self) -> SearchState {
        if self.text.trim().is_empty() {
            SearchState::Listing
        } else {
            SearchState::Filtering
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn results(&self) -> &[SearchHit] {
        &self.results
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Number of filter passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }
}
