use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use camino::Utf8Path;
use serde::Serialize;

use crate::DocumentKey;
use crate::ProjectKey;
use crate::ProjectSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    ProjectAdded,
    ProjectRemoved,
    ProjectChanged,
    DocumentAdded,
    DocumentRemoved,
    DocumentChanged,
}

/// One successful store mutation.
///
/// `older` is the project snapshot before the mutation and `newer` the one
/// after it. Document events carry both because adding or removing a
/// document replaces the owning project.
#[derive(Debug, Clone)]
pub enum ProjectChange {
    ProjectAdded {
        newer: ProjectSnapshot,
    },
    ProjectRemoved {
        older: ProjectSnapshot,
    },
    ProjectChanged {
        older: ProjectSnapshot,
        newer: ProjectSnapshot,
    },
    DocumentAdded {
        document: DocumentKey,
        older: ProjectSnapshot,
        newer: ProjectSnapshot,
    },
    DocumentRemoved {
        document: DocumentKey,
        older: ProjectSnapshot,
        newer: ProjectSnapshot,
    },
    DocumentChanged {
        document: DocumentKey,
        older: ProjectSnapshot,
        newer: ProjectSnapshot,
    },
}

impl ProjectChange {
    #[must_use]
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::ProjectAdded { .. } => ChangeKind::ProjectAdded,
            Self::ProjectRemoved { .. } => ChangeKind::ProjectRemoved,
            Self::ProjectChanged { .. } => ChangeKind::ProjectChanged,
            Self::DocumentAdded { .. } => ChangeKind::DocumentAdded,
            Self::DocumentRemoved { .. } => ChangeKind::DocumentRemoved,
            Self::DocumentChanged { .. } => ChangeKind::DocumentChanged,
        }
    }

    #[must_use]
    pub fn project_key(&self) -> &ProjectKey {
        match self {
            Self::ProjectAdded { newer } => newer.key(),
            Self::ProjectRemoved { older } => older.key(),
            Self::ProjectChanged { newer, .. } => newer.key(),
            Self::DocumentAdded { document, .. }
            | Self::DocumentRemoved { document, .. }
            | Self::DocumentChanged { document, .. } => document.project(),
        }
    }

    #[must_use]
    pub fn document_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::DocumentAdded { document, .. }
            | Self::DocumentRemoved { document, .. }
            | Self::DocumentChanged { document, .. } => Some(document.path()),
            _ => None,
        }
    }

    #[must_use]
    pub fn older(&self) -> Option<&ProjectSnapshot> {
        match self {
            Self::ProjectAdded { .. } => None,
            Self::ProjectRemoved { older }
            | Self::ProjectChanged { older, .. }
            | Self::DocumentAdded { older, .. }
            | Self::DocumentRemoved { older, .. }
            | Self::DocumentChanged { older, .. } => Some(older),
        }
    }

    #[must_use]
    pub fn newer(&self) -> Option<&ProjectSnapshot> {
        match self {
            Self::ProjectRemoved { .. } => None,
            Self::ProjectAdded { newer }
            | Self::ProjectChanged { newer, .. }
            | Self::DocumentAdded { newer, .. }
            | Self::DocumentRemoved { newer, .. }
            | Self::DocumentChanged { newer, .. } => Some(newer),
        }
    }
}

pub trait ProjectChangeListener: Send + Sync {
    fn on_change(&self, change: &ProjectChange);
}

impl<F> ProjectChangeListener for F
where
    F: Fn(&ProjectChange) + Send + Sync,
{
    fn on_change(&self, change: &ProjectChange) {
        self(change);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Subscribers = Arc<Vec<(SubscriptionId, Arc<dyn ProjectChangeListener>)>>;

/// Synchronous fan-out of [`ProjectChange`]s.
///
/// Publishing iterates a snapshot of the subscriber list, so listeners may
/// subscribe or unsubscribe from inside a callback. Changes made that way
/// take effect from the next publish.
#[derive(Default)]
pub struct ChangeBus {
    next_id: AtomicU64,
    subscribers: RwLock<Subscribers>,
}

impl ChangeBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn ProjectChangeListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::with_capacity(subscribers.len() + 1);
        next.extend(subscribers.iter().cloned());
        next.push((id, listener));
        *subscribers = Arc::new(next);
        id
    }

    /// Returns `false` if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !subscribers.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        let next = subscribers
            .iter()
            .filter(|(existing, _)| *existing != id)
            .cloned()
            .collect();
        *subscribers = Arc::new(next);
        true
    }

    /// Delivers `change` to every current subscriber in registration order.
    pub fn publish(&self, change: &ProjectChange) {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        tracing::trace!(
            kind = ?change.kind(),
            project = %change.project_key(),
            subscribers = subscribers.len(),
            "publishing change"
        );
        for (_, listener) in subscribers.iter() {
            listener.on_change(change);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeBus")
            .field("subscribers", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::HostProject;
    use crate::ProjectConfiguration;

    fn added() -> ProjectChange {
        ProjectChange::ProjectAdded {
            newer: ProjectSnapshot::new(HostProject::new("/p", ProjectConfiguration::default())),
        }
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let bus = ChangeBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(Arc::new(move |_: &ProjectChange| {
                seen.lock().unwrap().push(name);
            }));
        }
        bus.publish(&added());

        assert_eq!(*seen.lock().unwrap(), ["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = ChangeBus::new();
        let count = Arc::new(AtomicU64::new(0));
        let id = {
            let count = Arc::clone(&count);
            bus.subscribe(Arc::new(move |_: &ProjectChange| {
                count.fetch_add(1, Ordering::SeqCst);
            }))
        };

        bus.publish(&added());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&added());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_subscribe_during_delivery() {
        let bus = Arc::new(ChangeBus::new());
        let weak = Arc::downgrade(&bus);
        bus.subscribe(Arc::new(move |_: &ProjectChange| {
            if let Some(bus) = weak.upgrade() {
                bus.subscribe(Arc::new(|_: &ProjectChange| {}));
            }
        }));

        bus.publish(&added());
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn test_change_accessors() {
        let change = added();
        assert_eq!(change.kind(), ChangeKind::ProjectAdded);
        assert_eq!(change.project_key().path(), Utf8Path::new("/p"));
        assert!(change.older().is_none());
        assert!(change.newer().is_some());
        assert!(change.document_path().is_none());
    }
}
