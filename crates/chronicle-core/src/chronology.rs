// crates/chronicle-core/src/chronology.rs
//
// The generic chronology container shared by concepts, patterns and stamps:
// a fixed identity owning a non-empty, time-ordered list of versions.
//
// Chronologies are values. "Updating" one produces a new chronology with the
// extra version inserted; the registry swaps it in atomically, so a reader
// holding the previous value never observes a half-applied append.

use serde::{Deserialize, Serialize};

use crate::error::ChronicleError;
use crate::identity::{Nid, PublicId};
use crate::version::VersionData;

/// Identity-bearing, append-only history of versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chronology<V> {
    nid: Nid,
    public_id: PublicId,
    versions: Vec<V>,
}

impl<V: VersionData> Chronology<V> {
    /// Create a chronology holding its first version.
    pub fn new(nid: Nid, public_id: PublicId, first: V) -> Result<Self, ChronicleError> {
        Self::from_versions(nid, public_id, vec![first])
    }

    /// Create a chronology from already-ordered versions.
    pub fn from_versions(
        nid: Nid,
        public_id: PublicId,
        versions: Vec<V>,
    ) -> Result<Self, ChronicleError> {
        if versions.is_empty() {
            return Err(ChronicleError::EmptyChronology(nid));
        }
        if let Some(foreign) = versions.iter().find(|v| v.chronology_nid() != nid) {
            return Err(ChronicleError::ForeignVersion {
                chronology: nid,
                owner: foreign.chronology_nid(),
            });
        }
        Ok(Self {
            nid,
            public_id,
            versions,
        })
    }

    pub fn nid(&self) -> Nid {
        self.nid
    }

    pub fn public_id(&self) -> &PublicId {
        &self.public_id
    }

    /// Versions ordered by ascending stamp time, ties in insertion order.
    pub fn versions(&self) -> &[V] {
        &self.versions
    }

    pub fn version(&self, index: usize) -> Option<&V> {
        self.versions.get(index)
    }

    /// The most recent version. A chronology is never empty.
    pub fn latest(&self) -> &V {
        &self.versions[self.versions.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Position at which a version stamped at `time` belongs.
    ///
    /// Scans from the end: appends in time order hit the first comparison.
    /// Equal times land after existing versions.
    pub fn insertion_index(&self, time: i64, mut time_of: impl FnMut(&V) -> i64) -> usize {
        let mut index = self.versions.len();
        while index > 0 && time_of(&self.versions[index - 1]) > time {
            index -= 1;
        }
        index
    }

    /// Return a copy of this chronology with `version` inserted at `index`.
    pub fn with_version_at(&self, index: usize, version: V) -> Result<Self, ChronicleError> {
        if version.chronology_nid() != self.nid {
            return Err(ChronicleError::ForeignVersion {
                chronology: self.nid,
                owner: version.chronology_nid(),
            });
        }
        let mut versions = Vec::with_capacity(self.versions.len() + 1);
        let index = index.min(self.versions.len());
        versions.extend_from_slice(&self.versions[..index]);
        versions.push(version);
        versions.extend_from_slice(&self.versions[index..]);
        Ok(Self {
            nid: self.nid,
            public_id: self.public_id.clone(),
            versions,
        })
    }

    /// Return a copy with a widened public id (alias merge).
    pub fn with_public_id(&self, public_id: PublicId) -> Self {
        Self {
            nid: self.nid,
            public_id,
            versions: self.versions.clone(),
        }
    }
}
