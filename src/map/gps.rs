use std::mem;

use super::ReadyListener;
use crate::core::point::MapPoint;

enum GpsState {
    /// No fix yet; listeners wait for the first one.
    Waiting(Vec<ReadyListener>),
    Located(MapPoint),
}

/// Tracks the latest location fix and the callers waiting for one.
pub struct GpsTracker {
    state: GpsState,
    provider: Option<String>,
}

impl Default for GpsTracker {
    fn default() -> Self {
        Self {
            state: GpsState::Waiting(Vec::new()),
            provider: None,
        }
    }
}

impl GpsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_fix(&self) -> Option<MapPoint> {
        match &self.state {
            GpsState::Located(fix) => Some(*fix),
            GpsState::Waiting(_) => None,
        }
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn pending(&self) -> usize {
        match &self.state {
            GpsState::Waiting(listeners) => listeners.len(),
            GpsState::Located(_) => 0,
        }
    }

    /// Queues `listener` until the first fix. When a fix already exists the
    /// listener is handed back for the caller to run now.
    pub fn run_when_located(&mut self, listener: ReadyListener) -> Option<ReadyListener> {
        match &mut self.state {
            GpsState::Waiting(listeners) => {
                listeners.push(listener);
                None
            }
            GpsState::Located(_) => Some(listener),
        }
    }

    /// Records a fix and returns the listeners that were waiting for it, in
    /// the order they were queued.
    pub fn on_fix(&mut self, fix: MapPoint, provider: Option<String>) -> Vec<ReadyListener> {
        if provider.is_some() {
            self.provider = provider;
        }
        match mem::replace(&mut self.state, GpsState::Located(fix)) {
            GpsState::Waiting(listeners) => listeners,
            GpsState::Located(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_listeners_wait_for_first_fix() {
        let mut gps = GpsTracker::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for n in 0..2 {
            let order = order.clone();
            let listener: ReadyListener = Box::new(move |_| order.borrow_mut().push(n));
            assert!(gps.run_when_located(listener).is_none());
        }
        assert_eq!(gps.pending(), 2);
        assert_eq!(gps.last_fix(), None);

        let fix = MapPoint::with_altitude(1.0, 2.0, 3.0, 4.0);
        let waiting = gps.on_fix(fix, Some("gps".into()));
        assert_eq!(waiting.len(), 2);
        assert_eq!(gps.last_fix(), Some(fix));
        assert_eq!(gps.provider(), Some("gps"));
        assert_eq!(gps.pending(), 0);

        // Later fixes release nobody and run new listeners straight away.
        assert!(gps.on_fix(MapPoint::new(5.0, 6.0), None).is_empty());
        assert_eq!(gps.provider(), Some("gps"));
        assert!(gps.run_when_located(Box::new(|_| {})).is_some());
    }
}
