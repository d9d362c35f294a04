//! List persistence: the [`ListStore`] contract and an in-memory implementation.

use crate::error::StoreError;
use crate::list::{AddressEntry, Cidr, ListKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Abstract storage interface for the allow and deny lists.
///
/// Every operation is keyed on the exact [`Cidr`] pair; no method performs CIDR
/// containment. Implementations must make `add` atomic with respect to the
/// exclusivity rule: a pair may live in at most one list at a time.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Insert `subnet` into `list` and return its new id.
    ///
    /// Fails with [`StoreError::Conflict`] when the exact pair is already
    /// present in either list; the stored state is left unchanged.
    async fn add(&self, list: ListKind, subnet: Cidr) -> Result<u64, StoreError>;

    /// Remove the exact pair, failing with [`StoreError::NotFound`] if absent.
    async fn remove(&self, list: ListKind, subnet: Cidr) -> Result<(), StoreError>;

    /// Exact-pair membership.
    async fn contains_exact(&self, list: ListKind, subnet: Cidr) -> Result<bool, StoreError>;

    /// All entries of `list`, ordered by id.
    async fn enumerate(&self, list: ListKind) -> Result<Vec<AddressEntry>, StoreError>;
}

#[derive(Debug, Default)]
struct ListTable {
    entries: HashMap<Cidr, AddressEntry>,
    // last id handed out; ids start at 1
    next_id: u64,
}

#[derive(Debug, Default)]
struct Lists {
    allow: ListTable,
    deny: ListTable,
}

impl Lists {
    fn table(&self, list: ListKind) -> &ListTable {
        match list {
            ListKind::Allow => &self.allow,
            ListKind::Deny => &self.deny,
        }
    }

    fn table_mut(&mut self, list: ListKind) -> &mut ListTable {
        match list {
            ListKind::Allow => &mut self.allow,
            ListKind::Deny => &mut self.deny,
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("list store lock poisoned".into())
}

/// In-memory list store guarded by a reader/writer lock.
///
/// Clones share the same lists.
#[derive(Default, Clone, Debug)]
pub struct InMemoryListStore {
    inner: Arc<RwLock<Lists>>,
}

impl InMemoryListStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListStore for InMemoryListStore {
    async fn add(&self, list: ListKind, subnet: Cidr) -> Result<u64, StoreError> {
        let mut lists = self.inner.write().map_err(|_| poisoned())?;
        for held_by in [list, list.opposite()] {
            if lists.table(held_by).entries.contains_key(&subnet) {
                return Err(StoreError::Conflict { list: held_by, subnet });
            }
        }
        let table = lists.table_mut(list);
        table.next_id += 1;
        let id = table.next_id;
        table.entries.insert(subnet, AddressEntry { subnet, id });
        Ok(id)
    }

    async fn remove(&self, list: ListKind, subnet: Cidr) -> Result<(), StoreError> {
        let mut lists = self.inner.write().map_err(|_| poisoned())?;
        match lists.table_mut(list).entries.remove(&subnet) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound { list, subnet }),
        }
    }

    async fn contains_exact(&self, list: ListKind, subnet: Cidr) -> Result<bool, StoreError> {
        let lists = self.inner.read().map_err(|_| poisoned())?;
        Ok(lists.table(list).entries.contains_key(&subnet))
    }

    async fn enumerate(&self, list: ListKind) -> Result<Vec<AddressEntry>, StoreError> {
        let mut entries: Vec<AddressEntry> = {
            let lists = self.inner.read().map_err(|_| poisoned())?;
            lists.table(list).entries.values().copied().collect()
        };
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> Cidr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn ids_are_per_list_and_never_reused() {
        let store = InMemoryListStore::new();
        assert_eq!(store.add(ListKind::Allow, cidr("10.0.0.0/8")).await, Ok(1));
        assert_eq!(store.add(ListKind::Allow, cidr("11.0.0.0/8")).await, Ok(2));
        assert_eq!(store.add(ListKind::Deny, cidr("12.0.0.0/8")).await, Ok(1));

        store.remove(ListKind::Allow, cidr("11.0.0.0/8")).await.unwrap();
        assert_eq!(store.add(ListKind::Allow, cidr("11.0.0.0/8")).await, Ok(3));
    }

    #[tokio::test]
    async fn add_rejects_pair_held_by_either_list() {
        let store = InMemoryListStore::new();
        store.add(ListKind::Allow, cidr("192.168.64.0/24")).await.unwrap();

        let err = store.add(ListKind::Deny, cidr("192.168.64.0/24")).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict { list: ListKind::Allow, subnet: cidr("192.168.64.0/24") }
        );
        let err = store.add(ListKind::Allow, cidr("192.168.64.0/24")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { list: ListKind::Allow, .. }));

        assert!(store.enumerate(ListKind::Deny).await.unwrap().is_empty());
        assert_eq!(store.enumerate(ListKind::Allow).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overlapping_subnets_are_not_conflicts() {
        let store = InMemoryListStore::new();
        store.add(ListKind::Allow, cidr("192.168.64.0/24")).await.unwrap();
        assert!(store.add(ListKind::Deny, cidr("192.168.0.0/16")).await.is_ok());
    }

    #[tokio::test]
    async fn remove_missing_pair_is_not_found() {
        let store = InMemoryListStore::new();
        let err = store.remove(ListKind::Allow, cidr("10.0.0.0/8")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { list: ListKind::Allow, .. }));
    }

    #[tokio::test]
    async fn enumerate_is_ordered_by_id() {
        let store = InMemoryListStore::new();
        for net in ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "100.64.0.0/10"] {
            store.add(ListKind::Deny, cidr(net)).await.unwrap();
        }
        store.remove(ListKind::Deny, cidr("172.16.0.0/12")).await.unwrap();
        let ids: Vec<u64> =
            store.enumerate(ListKind::Deny).await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn contains_exact_ignores_containment() {
        let store = InMemoryListStore::new();
        store.add(ListKind::Allow, cidr("10.0.0.0/8")).await.unwrap();
        assert!(store.contains_exact(ListKind::Allow, cidr("10.0.0.0/8")).await.unwrap());
        assert!(!store.contains_exact(ListKind::Allow, cidr("10.0.0.0/9")).await.unwrap());
        assert!(!store.contains_exact(ListKind::Deny, cidr("10.0.0.0/8")).await.unwrap());
    }
}
