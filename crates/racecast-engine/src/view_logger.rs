//! Logs what goes on air.
//!
//! Rendering lives outside the engine, so the published view is followed
//! here and every card or banner change is written to the log. The view
//! channel republishes on every poll; only transitions are logged.

use racecast_types::OverlayView;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A visible change between two published views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewChange {
    /// A card took the slot.
    CardOnAir {
        /// Card heading.
        title: String,
        /// Competitor line.
        competitor: String,
        /// Main value.
        value: String,
    },
    /// A card moved to a new stage.
    CardStage {
        /// Card heading.
        title: String,
        /// New stage name.
        stage: String,
    },
    /// The slot emptied.
    CardOff,
    /// A banner appeared or changed.
    BannerOn {
        /// Banner heading.
        title: String,
        /// Banner detail.
        detail: Option<String>,
    },
    /// The banner disappeared.
    BannerOff,
    /// The lap label changed.
    Lap {
        /// New label.
        label: String,
    },
}

/// Transitions from `prev` to `next`, cards first.
pub fn diff_views(prev: &OverlayView, next: &OverlayView) -> Vec<ViewChange> {
    let mut changes = Vec::new();

    match (&prev.active_card, &next.active_card) {
        (None, Some(card)) => changes.push(ViewChange::CardOnAir {
            title: card.title.clone(),
            competitor: card.competitor.clone(),
            value: card.value.clone(),
        }),
        (Some(old), Some(card)) if old.id != card.id => changes.push(ViewChange::CardOnAir {
            title: card.title.clone(),
            competitor: card.competitor.clone(),
            value: card.value.clone(),
        }),
        (Some(old), Some(card)) if old.stage != card.stage => changes.push(ViewChange::CardStage {
            title: card.title.clone(),
            stage: format!("{:?}", card.stage),
        }),
        (Some(_), None) => changes.push(ViewChange::CardOff),
        _ => {}
    }

    match (&prev.banner, &next.banner) {
        (old, Some(banner))
            if old.as_ref().is_none_or(|o| o.title != banner.title || o.detail != banner.detail) =>
        {
            changes.push(ViewChange::BannerOn {
                title: banner.title.clone(),
                detail: banner.detail.clone(),
            });
        }
        (Some(_), None) => changes.push(ViewChange::BannerOff),
        _ => {}
    }

    if prev.lap_label != next.lap_label && !next.lap_label.is_empty() {
        changes.push(ViewChange::Lap {
            label: next.lap_label.clone(),
        });
    }
    changes
}

/// Follow the view channel until its sender is dropped.
pub fn spawn_view_logger(mut views: watch::Receiver<OverlayView>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = views.borrow_and_update().clone();
        while views.changed().await.is_ok() {
            let next = views.borrow_and_update().clone();
            for change in diff_views(&last, &next) {
                match change {
                    ViewChange::CardOnAir { title, competitor, value } => {
                        info!(%title, %competitor, %value, queued = next.queued, "Card on air");
                    }
                    ViewChange::CardStage { title, stage } => {
                        debug!(%title, %stage, "Card stage changed");
                    }
                    ViewChange::CardOff => debug!("Card off air"),
                    ViewChange::BannerOn { title, detail } => {
                        info!(%title, detail = detail.as_deref().unwrap_or(""), "Banner shown");
                    }
                    ViewChange::BannerOff => debug!("Banner hidden"),
                    ViewChange::Lap { label } => info!(%label, "Lap counter"),
                }
            }
            last = next;
        }
        debug!("View channel closed");
    })
}
