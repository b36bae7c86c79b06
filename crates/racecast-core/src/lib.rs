//! Standings reconciliation, event derivation, and card scheduling for the
//! Racecast broadcast overlay.
//!
//! Raw timing-feed snapshots flow through ingest, the reconciler, the
//! event deriver, and the card scheduler, producing a read-only
//! [`OverlayView`] for the rendering layer.
//!
//! # Modules
//!
//! - [`banner`] -- Race flag parsing and the transient/persistent banner
//!   state machine.
//! - [`cache`] -- [`SnapshotCache`] trait with memory and file backends for
//!   the last-good snapshot blob.
//! - [`clock`] -- Injectable monotonic millisecond clock.
//! - [`config`] -- Configuration loading from `racecast-config.yaml` into
//!   strongly-typed structs.
//! - [`derive`] -- Position, fastest-lap, and lap-finish event derivation.
//! - [`identity`] -- Competitor identity keys and surname extraction.
//! - [`ingest`] -- Defensive coercion of loosely-typed feed JSON.
//! - [`laptime`] -- Lap time grammar, formatting, and deltas.
//! - [`reconcile`] -- Hold/accept/reset decisions and lap hysteresis.
//! - [`runner`] -- The async control loop.
//! - [`scheduler`] -- Priority queue and single active card slot.
//! - [`source`] -- [`SnapshotSource`] trait and fetch sequencing.
//! - [`tick`] -- The per-snapshot pipeline.
//!
//! [`OverlayView`]: racecast_types::OverlayView
//! [`SnapshotCache`]: cache::SnapshotCache
//! [`SnapshotSource`]: source::SnapshotSource

pub mod banner;
pub mod cache;
pub mod clock;
pub mod config;
pub mod derive;
pub mod identity;
pub mod ingest;
pub mod laptime;
pub mod reconcile;
pub mod runner;
pub mod scheduler;
pub mod source;
pub mod tick;
