// crates/chronicle-core/src/well_known.rs
//
// Bootstrap concepts that must resolve before any release row is ingested:
// status values, default author/module/path, and the stated/inferred
// relationship patterns the classifier reads.

use uuid::Uuid;

/// Namespace from which every well-known concept UUID is derived.
pub const WELL_KNOWN_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_52a4_1e0b_4e7a_9b4f_7c3e_2d8a_0b51);

/// Default namespace for SCTID-derived concept and stamp UUIDs.
pub const SNOMED_NAMESPACE: Uuid = Uuid::from_u128(0x48b0_04d4_6457_4648_8d58_e328_7126_d96b);

/// Concepts pre-seeded into every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnown {
    Active,
    Inactive,
    /// Author recorded on stamps built from terminology release rows.
    TerminologyAuthor,
    DevelopmentPath,
    /// Module typically configured as the override for release-row stamps.
    TextModule,
    StarterDataAuthor,
    StarterDataModule,
    StatedPattern,
    InferredPattern,
}

impl WellKnown {
    pub const ALL: [WellKnown; 9] = [
        WellKnown::Active,
        WellKnown::Inactive,
        WellKnown::TerminologyAuthor,
        WellKnown::DevelopmentPath,
        WellKnown::TextModule,
        WellKnown::StarterDataAuthor,
        WellKnown::StarterDataModule,
        WellKnown::StatedPattern,
        WellKnown::InferredPattern,
    ];

    /// Stable name, also the UUIDv5 seed.
    pub fn name(self) -> &'static str {
        match self {
            WellKnown::Active => "Active state",
            WellKnown::Inactive => "Inactive state",
            WellKnown::TerminologyAuthor => "SNOMED CT author",
            WellKnown::DevelopmentPath => "Development path",
            WellKnown::TextModule => "SNOMED CT text module",
            WellKnown::StarterDataAuthor => "Starter data author",
            WellKnown::StarterDataModule => "SNOMED CT starter data module",
            WellKnown::StatedPattern => "EL++ stated axioms pattern",
            WellKnown::InferredPattern => "EL++ inferred axioms pattern",
        }
    }

    pub fn uuid(self) -> Uuid {
        Uuid::new_v5(&WELL_KNOWN_NAMESPACE, self.name().as_bytes())
    }

    /// Resolve a starter-data label such as `"Active"` to a well-known concept.
    pub fn from_label(label: &str) -> Option<WellKnown> {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "active" | "active state" => Some(WellKnown::Active),
            "inactive" | "inactive state" => Some(WellKnown::Inactive),
            _ => WellKnown::ALL
                .into_iter()
                .find(|wk| wk.name().eq_ignore_ascii_case(label.trim())),
        }
    }

    /// Status concept for an RF2 `active` flag.
    pub fn status_for_active(active: bool) -> WellKnown {
        if active {
            WellKnown::Active
        } else {
            WellKnown::Inactive
        }
    }
}
