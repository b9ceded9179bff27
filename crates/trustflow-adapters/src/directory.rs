// crates/trustflow-adapters/src/directory.rs

use std::collections::HashMap;
use std::path::Path;

use trustflow_core::{SubjectDirectory, SubjectProfile, TrustflowError};

/// Fixed set of subject profiles held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSubjectDirectory {
    profiles: HashMap<String, SubjectProfile>,
}

impl StaticSubjectDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = SubjectProfile>) -> Self {
        let mut directory = Self::new();
        for profile in profiles {
            directory.insert(profile);
        }
        directory
    }

    /// Parse a JSON array of profiles.
    pub fn from_json(json: &str) -> Result<Self, TrustflowError> {
        let profiles: Vec<SubjectProfile> = serde_json::from_str(json)?;
        Ok(Self::from_profiles(profiles))
    }

    /// Load a JSON array of profiles from disk.
    pub fn load(path: &Path) -> Result<Self, TrustflowError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TrustflowError::Storage(format!("failed to read {}: {}", path.display(), e))
        })?;
        let directory = Self::from_json(&contents)?;
        tracing::info!(
            "Loaded {} subject profiles from {}",
            directory.len(),
            path.display()
        );
        Ok(directory)
    }

    /// Insert or replace a profile.
    pub fn insert(&mut self, profile: SubjectProfile) {
        self.profiles.insert(profile.subject_id.clone(), profile);
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl SubjectDirectory for StaticSubjectDirectory {
    fn lookup(&self, subject_id: &str) -> Option<SubjectProfile> {
        self.profiles.get(subject_id).cloned()
    }
}
