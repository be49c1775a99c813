use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::{OwnerType, Profile, StoreError};

/// Read access to the external job/candidate record store.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn get_profile(
        &self,
        owner_type: OwnerType,
        id: &str,
    ) -> Result<Option<Profile>, StoreError>;

    /// Every profile of the given type, inactive ones included.
    async fn list_profiles(&self, owner_type: OwnerType) -> Result<Vec<Profile>, StoreError>;
}

/// Profile source held in memory, ordered by id within each type.
#[derive(Default)]
pub struct InMemoryProfiles {
    profiles: RwLock<BTreeMap<(OwnerType, String), Profile>>,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let source = Self::new();
        for profile in profiles {
            source.upsert(profile);
        }
        source
    }

    pub fn upsert(&self, profile: Profile) {
        let mut guard = self
            .profiles
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert((profile.owner_type, profile.id.clone()), profile);
    }

    pub fn remove(&self, owner_type: OwnerType, id: &str) -> Option<Profile> {
        let mut guard = self
            .profiles
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.remove(&(owner_type, id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.profiles
            .read()
            .map(|guard| guard.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProfileSource for InMemoryProfiles {
    async fn get_profile(
        &self,
        owner_type: OwnerType,
        id: &str,
    ) -> Result<Option<Profile>, StoreError> {
        let guard = self
            .profiles
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(guard.get(&(owner_type, id.to_string())).cloned())
    }

    async fn list_profiles(&self, owner_type: OwnerType) -> Result<Vec<Profile>, StoreError> {
        let guard = self
            .profiles
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(guard
            .iter()
            .filter(|((kind, _), _)| *kind == owner_type)
            .map(|(_, profile)| profile.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_only_requested_type_in_id_order() {
        let source = InMemoryProfiles::with_profiles([
            Profile::new("j-2", OwnerType::Job, "B"),
            Profile::new("c-1", OwnerType::Candidate, "C"),
            Profile::new("j-1", OwnerType::Job, "A"),
        ]);

        let jobs = source.list_profiles(OwnerType::Job).await.unwrap();
        let ids: Vec<_> = jobs.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["j-1", "j-2"]);
        assert_eq!(source.len(), 3);
    }

    #[tokio::test]
    async fn get_distinguishes_owner_type() {
        let source = InMemoryProfiles::with_profiles([Profile::new("1", OwnerType::Job, "Chef")]);
        assert!(source.get_profile(OwnerType::Job, "1").await.unwrap().is_some());
        assert!(source
            .get_profile(OwnerType::Candidate, "1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_and_remove_deletes() {
        let source = InMemoryProfiles::new();
        source.upsert(Profile::new("1", OwnerType::Job, "Chef"));
        source.upsert(Profile::new("1", OwnerType::Job, "Head Chef"));
        let p = source.get_profile(OwnerType::Job, "1").await.unwrap().unwrap();
        assert_eq!(p.title, "Head Chef");
        assert!(source.remove(OwnerType::Job, "1").is_some());
        assert!(source.is_empty());
    }
}
