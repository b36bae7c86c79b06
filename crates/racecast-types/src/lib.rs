//! Shared type definitions for the Racecast timing overlay.
//!
//! This crate is the single source of truth for the values that flow between
//! the reconciliation core, the engine binary, and the rendering layer. View
//! types are exported to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for card identifiers
//! - [`enums`] -- Card kinds and stages, race flags, reconcile outcomes
//! - [`structs`] -- Standings rows, snapshots, derived events, overlay view

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{CardKind, CardStage, PositionDirection, RaceFlag, ReconcileOutcome};
pub use ids::CardId;
pub use structs::{
    Announcement, BannerView, CachedSnapshot, CardView, DerivedEvent, FastestLap, IdentityKey,
    LapFinish, OverlayView, PositionChange, Snapshot, StandingsRow,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the rendering layer.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        let _ = crate::ids::CardId::export_all();

        let _ = crate::enums::CardKind::export_all();
        let _ = crate::enums::CardStage::export_all();
        let _ = crate::enums::PositionDirection::export_all();
        let _ = crate::enums::ReconcileOutcome::export_all();
        let _ = crate::enums::RaceFlag::export_all();

        let _ = crate::structs::StandingsRow::export_all();
        let _ = crate::structs::IdentityKey::export_all();
        let _ = crate::structs::Announcement::export_all();
        let _ = crate::structs::CachedSnapshot::export_all();
        let _ = crate::structs::PositionChange::export_all();
        let _ = crate::structs::FastestLap::export_all();
        let _ = crate::structs::LapFinish::export_all();
        let _ = crate::structs::DerivedEvent::export_all();
        let _ = crate::structs::CardView::export_all();
        let _ = crate::structs::BannerView::export_all();
        let _ = crate::structs::OverlayView::export_all();
    }
}
