//! Subscriber list for path recalculation notifications.

use std::fmt;

use tower_path_core::PathRecalculated;

/// Handle returned by `PathEngine::subscribe`, used to unsubscribe later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

type Observer = Box<dyn FnMut(&PathRecalculated)>;

/// Ordered list of notification callbacks.
#[derive(Default)]
pub(crate) struct PathObservers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Observer)>,
}

impl PathObservers {
    pub(crate) fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(position) = self.entries.iter().position(|(entry, _)| *entry == id) else {
            return false;
        };
        let _ = self.entries.remove(position);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn notify(&mut self, event: &PathRecalculated) {
        for (_, observer) in &mut self.entries {
            observer(event);
        }
    }
}

impl fmt::Debug for PathObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathObservers")
            .field("next_id", &self.next_id)
            .field("subscribers", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use tower_path_core::{CellCoord, Path};

    fn event() -> PathRecalculated {
        PathRecalculated {
            path: Path::from_cells(vec![CellCoord::new(0, 0)]),
            cost: 0.0,
            divergence_index: 0,
        }
    }

    #[test]
    fn notifies_in_subscription_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut observers = PathObservers::default();

        for label in ["first", "second"] {
            let log = Rc::clone(&log);
            let _ = observers.subscribe(Box::new(move |_| log.borrow_mut().push(label)));
        }
        observers.notify(&event());

        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribed_observers_stop_receiving() {
        let count = Rc::new(RefCell::new(0));
        let mut observers = PathObservers::default();
        let counter = Rc::clone(&count);
        let id = observers.subscribe(Box::new(move |_| *counter.borrow_mut() += 1));

        observers.notify(&event());
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.notify(&event());

        assert_eq!(*count.borrow(), 1);
        assert_eq!(observers.len(), 0);
    }
}
