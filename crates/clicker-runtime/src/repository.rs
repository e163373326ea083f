use crate::DispatchError;
use clicker_core::{ProductionSite, SiteId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Durable storage of production sites.
///
/// `transact` must give the closure exclusive access to the site for its whole
/// duration and persist the modified copy only when the closure returns `Ok`.
pub trait SiteRepository: Send + Sync {
    /// Allocate an id and store the site built from it.
    fn create<F>(&self, build: F) -> Result<ProductionSite, DispatchError>
    where
        F: FnOnce(SiteId) -> ProductionSite;

    /// Current state of one site.
    fn load(&self, id: SiteId) -> Result<ProductionSite, DispatchError>;

    /// Current state of every site, ordered by id.
    fn list(&self) -> Result<Vec<ProductionSite>, DispatchError>;

    /// Run `f` against the site under its lock, committing on success.
    fn transact<T, E, F>(&self, id: SiteId, f: F) -> Result<T, DispatchError>
    where
        F: FnOnce(&mut ProductionSite) -> Result<T, E>,
        DispatchError: From<E>;
}

type Slot = Arc<Mutex<ProductionSite>>;

/// In-process repository: a map of per-site mutexes.
#[derive(Debug, Default)]
pub struct InMemorySites {
    sites: RwLock<BTreeMap<SiteId, Slot>>,
    next_id: AtomicU64,
}

fn poisoned<T>(_: T) -> DispatchError {
    DispatchError::Storage("lock poisoned".into())
}

impl InMemorySites {
    /// Empty repository; ids start at 1.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: SiteId) -> Result<Slot, DispatchError> {
        let map = self.sites.read().map_err(poisoned)?;
        map.get(&id).cloned().ok_or(DispatchError::NotFound(id))
    }
}

impl SiteRepository for InMemorySites {
    fn create<F>(&self, build: F) -> Result<ProductionSite, DispatchError>
    where
        F: FnOnce(SiteId) -> ProductionSite,
    {
        let id = SiteId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let site = build(id);
        if site.id != id {
            return Err(DispatchError::Storage(format!(
                "built site carries {} instead of {}",
                site.id, id
            )));
        }
        let mut map = self.sites.write().map_err(poisoned)?;
        map.insert(id, Arc::new(Mutex::new(site.clone())));
        Ok(site)
    }

    fn load(&self, id: SiteId) -> Result<ProductionSite, DispatchError> {
        let slot = self.slot(id)?;
        let site = slot.lock().map_err(poisoned)?;
        Ok(site.clone())
    }

    fn list(&self) -> Result<Vec<ProductionSite>, DispatchError> {
        let slots: Vec<Slot> = self.sites.read().map_err(poisoned)?.values().cloned().collect();
        slots
            .iter()
            .map(|s| s.lock().map(|g| g.clone()).map_err(poisoned))
            .collect()
    }

    fn transact<T, E, F>(&self, id: SiteId, f: F) -> Result<T, DispatchError>
    where
        F: FnOnce(&mut ProductionSite) -> Result<T, E>,
        DispatchError: From<E>,
    {
        let slot = self.slot(id)?;
        let mut guard = slot.lock().map_err(poisoned)?;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        *guard = draft;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use clicker_core::RateTable;
    use clicker_econ::EconError;

    fn repo_with_one() -> (InMemorySites, SiteId) {
        let repo = InMemorySites::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let site = repo
            .create(|id| ProductionSite::new(id, "Kong", t0, &RateTable::default()))
            .unwrap();
        (repo, site.id)
    }

    #[test]
    fn ids_are_sequential() {
        let (repo, first) = repo_with_one();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let second = repo
            .create(|id| ProductionSite::new(id, "Bonzo", t0, &RateTable::default()))
            .unwrap();
        assert_eq!(first, SiteId(1));
        assert_eq!(second.id, SiteId(2));
        let names: Vec<String> = repo.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Kong", "Bonzo"]);
    }

    #[test]
    fn missing_site_is_not_found() {
        let repo = InMemorySites::new();
        assert_eq!(repo.load(SiteId(9)), Err(DispatchError::NotFound(SiteId(9))));
        let r: Result<(), _> = repo.transact(SiteId(9), |_| Ok::<_, EconError>(()));
        assert_eq!(r, Err(DispatchError::NotFound(SiteId(9))));
    }

    #[test]
    fn failed_transaction_is_not_committed() {
        let (repo, id) = repo_with_one();
        let r: Result<(), _> = repo.transact(id, |s| {
            s.resource_balance = 999;
            Err(EconError::RateLimit { amount: 1, ceiling: 0 })
        });
        assert!(r.is_err());
        assert_eq!(repo.load(id).unwrap().resource_balance, 0);

        repo.transact(id, |s| {
            s.resource_balance = 5;
            Ok::<_, EconError>(())
        })
        .unwrap();
        assert_eq!(repo.load(id).unwrap().resource_balance, 5);
    }

    #[test]
    fn mismatched_build_is_rejected() {
        let repo = InMemorySites::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let r = repo.create(|_| ProductionSite::new(SiteId(42), "X", t0, &RateTable::default()));
        assert!(matches!(r, Err(DispatchError::Storage(_))));
    }
}
