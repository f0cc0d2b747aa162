// crates/chronicle-core/src/identity.rs
//
// Identity types: the dense native identifier (nid) and the UUID set it
// stands in for within one running process.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChronicleError;

/// Dense native identifier for an identity within one process.
///
/// Allocation starts at 1 and is monotonic. A nid is never reused or
/// reassigned to another identity for the lifetime of its identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Nid(u32);

impl Nid {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Nid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nid:{}", self.0)
    }
}

/// The set of UUIDs denoting one real-world term.
///
/// The first UUID is the primary; the remainder are aliases. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicId {
    uuids: Vec<Uuid>,
}

impl PublicId {
    /// Build a public id from one or more UUIDs. Duplicates are dropped,
    /// keeping first-seen order.
    pub fn new(uuids: &[Uuid]) -> Result<Self, ChronicleError> {
        if uuids.is_empty() {
            return Err(ChronicleError::EmptyIdentity);
        }
        let mut deduped: Vec<Uuid> = Vec::with_capacity(uuids.len());
        for uuid in uuids {
            if !deduped.contains(uuid) {
                deduped.push(*uuid);
            }
        }
        Ok(Self { uuids: deduped })
    }

    pub fn single(uuid: Uuid) -> Self {
        Self { uuids: vec![uuid] }
    }

    pub fn primary(&self) -> Uuid {
        self.uuids[0]
    }

    pub fn uuids(&self) -> &[Uuid] {
        &self.uuids
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.uuids.contains(uuid)
    }

    /// Add an alias if not already present. Returns `true` if the set grew.
    pub fn widen(&mut self, uuid: Uuid) -> bool {
        if self.contains(&uuid) {
            return false;
        }
        self.uuids.push(uuid);
        true
    }
}

impl From<Uuid> for PublicId {
    fn from(uuid: Uuid) -> Self {
        Self::single(uuid)
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary())?;
        if self.uuids.len() > 1 {
            write!(f, " (+{} aliases)", self.uuids.len() - 1)?;
        }
        Ok(())
    }
}

/// Derive the UUID for a SNOMED CT identifier (SCTID) under a namespace.
pub fn uuid_for_sctid(namespace: &Uuid, sctid: &str) -> Uuid {
    Uuid::new_v5(namespace, sctid.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_id_rejects_empty() {
        assert!(matches!(
            PublicId::new(&[]),
            Err(ChronicleError::EmptyIdentity)
        ));
    }

    #[test]
    fn test_public_id_dedupes_keeping_primary() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let id = PublicId::new(&[a, b, a]).unwrap();
        assert_eq!(id.primary(), a);
        assert_eq!(id.uuids(), &[a, b]);
    }

    #[test]
    fn test_widen_is_idempotent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut id = PublicId::single(a);
        assert!(id.widen(b));
        assert!(!id.widen(b));
        assert_eq!(id.uuids().len(), 2);
    }

    #[test]
    fn test_sctid_uuid_is_deterministic() {
        let ns = Uuid::parse_str("48b004d4-6457-4648-8d58-e3287126d96b").unwrap();
        assert_eq!(
            uuid_for_sctid(&ns, "900000000000207008"),
            uuid_for_sctid(&ns, "900000000000207008")
        );
        assert_ne!(
            uuid_for_sctid(&ns, "900000000000207008"),
            uuid_for_sctid(&ns, "731000124108")
        );
    }
}
