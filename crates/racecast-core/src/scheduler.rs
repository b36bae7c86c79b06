//! Card scheduling: a priority queue feeding a single on-screen slot.
//!
//! At most one card is active. Every poll first advances or expires the
//! active card by its absolute deadlines, then lets a waiting FASTEST card
//! preempt an active FINISH card, and otherwise fills an empty slot from
//! the queue by kind priority and arrival order.
//!
//! # Card lifecycles
//!
//! | Kind | Stages | Default durations |
//! |------|--------|-------------------|
//! | FASTEST | showing | 10 s |
//! | FINISH | timer running, result | 5 s + 7 s |
//! | POSITION | showing | 5 s |

use racecast_types::{CardId, CardKind, CardStage, CardView, DerivedEvent, PositionDirection};
use tracing::{debug, info};

use crate::clock::remaining_ms;
use crate::config::{CardConfig, FeatureToggles};
use crate::identity::competitor_label;
use crate::laptime::{format_delta, format_lap_time, signed_delta};

/// A card waiting for the slot.
#[derive(Debug, Clone)]
struct QueuedCard {
    id: CardId,
    event: DerivedEvent,
    arrival: u64,
}

/// The card occupying the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCard {
    /// Card identifier, stable from enqueue to expiry.
    pub id: CardId,
    /// The event being presented.
    pub event: DerivedEvent,
    /// Current stage.
    pub stage: CardStage,
    /// When the card took the slot (ms).
    pub started_at: u64,
    /// When a FINISH card's timer stops running (ms).
    pub timer_end: Option<u64>,
    /// When the card leaves the slot (ms).
    pub expires_at: u64,
}

impl ScheduledCard {
    /// The card's kind.
    pub const fn kind(&self) -> CardKind {
        self.event.kind()
    }
}

/// What changed during one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// A card that reached its deadline and left the slot.
    pub expired: Option<CardId>,
    /// A FINISH card discarded in favour of a FASTEST card.
    pub preempted: Option<CardId>,
    /// A card that took the slot.
    pub started: Option<CardId>,
}

/// Priority queue plus the single active slot.
#[derive(Debug, Clone)]
pub struct Scheduler {
    queue: Vec<QueuedCard>,
    active: Option<ScheduledCard>,
    next_arrival: u64,
    cards: CardConfig,
    toggles: FeatureToggles,
}

impl Scheduler {
    /// An empty scheduler.
    pub const fn new(cards: CardConfig, toggles: FeatureToggles) -> Self {
        Self {
            queue: Vec::new(),
            active: None,
            next_arrival: 0,
            cards,
            toggles,
        }
    }

    /// Queue an event. Events of disabled kinds are dropped and yield `None`.
    pub fn enqueue(&mut self, event: DerivedEvent) -> Option<CardId> {
        let kind = event.kind();
        if !self.toggles.allows(kind) {
            debug!(?kind, "card kind disabled, dropping event");
            return None;
        }
        let id = CardId::new();
        let arrival = self.next_arrival;
        self.next_arrival = self.next_arrival.saturating_add(1);
        debug!(card_id = %id, ?kind, queued = self.queue.len(), "card queued");
        self.queue.push(QueuedCard { id, event, arrival });
        Some(id)
    }

    /// Advance the slot to `now`.
    pub fn poll(&mut self, now: u64) -> PollReport {
        let mut report = PollReport::default();

        // 1. Advance or expire the active card.
        if let Some(active) = &mut self.active {
            if active.stage == CardStage::TimerRunning
                && active.timer_end.is_some_and(|end| now >= end)
            {
                active.stage = CardStage::Result;
            }
            if now >= active.expires_at {
                debug!(card_id = %active.id, kind = ?active.kind(), "card expired");
                report.expired = Some(active.id);
                self.active = None;
            }
        }

        // 2. A waiting FASTEST preempts an active FINISH for good.
        let finish_active = self
            .active
            .as_ref()
            .is_some_and(|active| active.kind() == CardKind::Finish);
        if finish_active {
            if let Some(fastest) = self.take_next(|kind| kind == CardKind::Fastest) {
                if let Some(finish) = self.active.take() {
                    info!(
                        preempted = %finish.id,
                        card_id = %fastest.id,
                        "fastest lap preempted lap finish card"
                    );
                    report.preempted = Some(finish.id);
                }
                report.started = Some(self.start(fastest, now));
                return report;
            }
        }

        // 3. Fill an empty slot by priority.
        if self.active.is_none() {
            if let Some(next) = self.take_next(|_| true) {
                report.started = Some(self.start(next, now));
            }
        }

        report
    }

    /// Remove the highest-priority queued card matching `filter`.
    fn take_next(&mut self, filter: impl Fn(CardKind) -> bool) -> Option<QueuedCard> {
        let index = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, card)| filter(card.event.kind()))
            .min_by_key(|(_, card)| (card.event.kind().priority(), card.arrival))
            .map(|(index, _)| index)?;
        Some(self.queue.remove(index))
    }

    fn start(&mut self, card: QueuedCard, now: u64) -> CardId {
        let kind = card.event.kind();
        let (stage, timer_end, visible_ms) = match kind {
            CardKind::Fastest => (CardStage::Showing, None, self.cards.fastest_visible_ms),
            CardKind::Position => (CardStage::Showing, None, self.cards.position_visible_ms),
            CardKind::Finish => (
                CardStage::TimerRunning,
                Some(now.saturating_add(self.cards.finish_timer_ms)),
                self.cards
                    .finish_timer_ms
                    .saturating_add(self.cards.finish_result_ms),
            ),
        };
        let expires_at = now.saturating_add(visible_ms);
        info!(card_id = %card.id, ?kind, expires_at, "card started");
        self.active = Some(ScheduledCard {
            id: card.id,
            event: card.event,
            stage,
            started_at: now,
            timer_end,
            expires_at,
        });
        card.id
    }

    /// Drop every queued and active card.
    pub fn clear(&mut self) {
        if self.active.is_some() || !self.queue.is_empty() {
            debug!(queued = self.queue.len(), "clearing all cards");
        }
        self.queue.clear();
        self.active = None;
    }

    /// Drop every queued and active card of `kind`.
    pub fn purge_kind(&mut self, kind: CardKind) {
        let before = self.queue.len();
        self.queue.retain(|card| card.event.kind() != kind);
        let active_purged = self.active.as_ref().is_some_and(|card| card.kind() == kind);
        if active_purged {
            self.active = None;
        }
        let purged = before.saturating_sub(self.queue.len());
        if purged > 0 || active_purged {
            debug!(?kind, purged, active_purged, "purged cards");
        }
    }

    /// Apply new feature toggles, purging newly disabled kinds.
    pub fn set_toggles(&mut self, toggles: FeatureToggles) {
        self.toggles = toggles;
        if !toggles.overlay {
            self.clear();
            return;
        }
        for kind in [CardKind::Fastest, CardKind::Finish, CardKind::Position] {
            if !toggles.allows(kind) {
                self.purge_kind(kind);
            }
        }
    }

    /// Number of cards waiting.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// The active card, if any.
    pub const fn active(&self) -> Option<&ScheduledCard> {
        self.active.as_ref()
    }

    /// Clock value shown by a FINISH card's running timer.
    ///
    /// Interpolates linearly from `final - timer` (floored at zero) to the
    /// final lap time over the timer duration, then holds the final time.
    pub fn timer_display_ms(&self, card: &ScheduledCard, now: u64) -> u64 {
        let DerivedEvent::LapFinish(lap) = &card.event else {
            return 0;
        };
        let final_ms = lap.lap_time_ms;
        let timer_ms = self.cards.finish_timer_ms;
        if timer_ms == 0 {
            return final_ms;
        }
        let start_ms = final_ms.saturating_sub(timer_ms);
        let elapsed = now.saturating_sub(card.started_at).min(timer_ms);
        let span = u128::from(final_ms.saturating_sub(start_ms));
        let progressed = span
            .saturating_mul(u128::from(elapsed))
            .checked_div(u128::from(timer_ms))
            .unwrap_or(span);
        start_ms.saturating_add(u64::try_from(progressed).unwrap_or(u64::MAX))
    }

    /// Display strings for the active card at `now`.
    pub fn card_view(&self, now: u64) -> Option<CardView> {
        let card = self.active.as_ref()?;
        let (title, competitor, value, detail) = match &card.event {
            DerivedEvent::FastestLap(lap) => (
                "FASTEST LAP".to_owned(),
                competitor_label(&lap.number, &lap.name),
                lap.lap_time.clone(),
                lap.previous_ms
                    .map(|previous| format_delta(signed_delta(lap.lap_time_ms, previous))),
            ),
            DerivedEvent::LapFinish(lap) => {
                let (value, detail) = if card.stage == CardStage::TimerRunning {
                    (format_lap_time(self.timer_display_ms(card, now)), None)
                } else {
                    (lap.lap_time.clone(), Some(self.result_delta(lap.lap_time_ms, lap.personal_best_ms)))
                };
                (
                    format!("LAP {}", lap.lap),
                    competitor_label(&lap.number, &lap.name),
                    value,
                    detail,
                )
            }
            DerivedEvent::PositionUp(change) | DerivedEvent::PositionDown(change) => {
                let sign = match change.direction() {
                    PositionDirection::Up => '+',
                    PositionDirection::Down => '-',
                };
                let places = change.magnitude();
                let noun = if places == 1 { "POSITION" } else { "POSITIONS" };
                (
                    format!("{sign}{places} {noun}"),
                    competitor_label(&change.number, &change.name),
                    format!("P{}", change.to_position),
                    Some(format!("from P{}", change.from_position)),
                )
            }
        };

        Some(CardView {
            id: card.id,
            kind: card.kind(),
            stage: card.stage,
            title,
            competitor,
            value,
            detail,
            remaining_ms: remaining_ms(card.expires_at, now),
        })
    }

    /// Result-stage detail: the delta to the personal best, or "no delta"
    /// when there is none or it is too large to be meaningful.
    fn result_delta(&self, lap_ms: u64, personal_best_ms: Option<u64>) -> String {
        personal_best_ms
            .map(|best| signed_delta(lap_ms, best))
            .filter(|delta| delta.unsigned_abs() < self.cards.delta_display_limit_ms)
            .map_or_else(|| "no delta".to_owned(), format_delta)
    }
}
