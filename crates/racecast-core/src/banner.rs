//! Race flag parsing and the banner state machine.
//!
//! GREEN shows a short transient banner, but only when it follows a plain
//! condition: a green after a black/meatball/penalty flag, or a repeated
//! green, stays silent. Every other flag shows a persistent banner for as
//! long as the feed keeps reporting it.

use racecast_types::{BannerView, RaceFlag};
use tracing::debug;

use crate::clock::remaining_ms;

/// Parse raw flag text. Empty text means no flag.
///
/// Matching is case-insensitive and ignores a trailing `FLAG` word.
/// Parameterized flags carry colon-separated payloads read positionally
/// (`BLACK:12`, `PENALTY:12:5s`); a missing or malformed payload leaves
/// the field empty rather than rejecting the flag.
pub fn parse_flag(text: &str) -> Option<RaceFlag> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut parts = text.split(':').map(str::trim);
    let head = parts.next().unwrap_or_default().to_ascii_lowercase();
    let head = head.strip_suffix(" flag").unwrap_or(&head).trim();
    let number = parts.next().and_then(competitor_number);
    // Penalty times may themselves contain colons (`PENALTY:12:0:30`).
    let time = Some(parts.collect::<Vec<_>>().join(":")).filter(|t| !t.is_empty());

    let flag = match head {
        "green" => RaceFlag::Green,
        "yellow" => RaceFlag::Yellow,
        "red" => RaceFlag::Red,
        "sc" | "safety car" | "safety_car" | "safetycar" => RaceFlag::SafetyCar,
        "vsc" | "virtual safety car" | "virtual_safety_car" => RaceFlag::VirtualSafetyCar,
        "slow" | "slow zone" => RaceFlag::Slow,
        "blue" => RaceFlag::Blue,
        "white" => RaceFlag::White,
        "finish" | "chequered" | "checkered" => RaceFlag::Finish,
        "black" => RaceFlag::Black { number },
        "meatball" => RaceFlag::Meatball { number },
        "penalty" => RaceFlag::Penalty { number, time },
        _ => RaceFlag::Other {
            text: text.to_owned(),
        },
    };
    Some(flag)
}

/// A competitor number payload: non-empty, letters and digits only.
fn competitor_number(raw: &str) -> Option<String> {
    let raw = raw.trim_start_matches('#');
    (!raw.is_empty() && raw.chars().all(char::is_alphanumeric)).then(|| raw.to_owned())
}

/// Banner heading and optional detail line for a flag.
pub fn describe(flag: &RaceFlag) -> (String, Option<String>) {
    let title = match flag {
        RaceFlag::Green => "GREEN FLAG",
        RaceFlag::Yellow => "YELLOW FLAG",
        RaceFlag::Red => "RED FLAG",
        RaceFlag::SafetyCar => "SAFETY CAR",
        RaceFlag::VirtualSafetyCar => "VIRTUAL SAFETY CAR",
        RaceFlag::Slow => "SLOW ZONE",
        RaceFlag::Blue => "BLUE FLAG",
        RaceFlag::White => "WHITE FLAG",
        RaceFlag::Finish => "CHEQUERED FLAG",
        RaceFlag::Black { .. } => "BLACK FLAG",
        RaceFlag::Meatball { .. } => "MEATBALL FLAG",
        RaceFlag::Penalty { .. } => "PENALTY",
        RaceFlag::Other { text } => return (text.clone(), None),
    };

    let detail = match flag {
        RaceFlag::Black { number } | RaceFlag::Meatball { number } => {
            number.as_ref().map(|n| format!("#{n}"))
        }
        RaceFlag::Penalty { number, time } => match (number, time) {
            (Some(n), Some(t)) => Some(format!("#{n} {t}")),
            (Some(n), None) => Some(format!("#{n}")),
            (None, Some(t)) => Some(t.clone()),
            (None, None) => None,
        },
        _ => None,
    };
    (title.to_owned(), detail)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveBanner {
    flag: RaceFlag,
    /// Absolute hide time for transient banners.
    expires_at: Option<u64>,
}

/// Flag-to-banner state machine.
#[derive(Debug, Clone)]
pub struct BannerState {
    previous: Option<RaceFlag>,
    active: Option<ActiveBanner>,
    green_visible_ms: u64,
}

impl BannerState {
    /// No flag seen yet.
    pub const fn new(green_visible_ms: u64) -> Self {
        Self {
            previous: None,
            active: None,
            green_visible_ms,
        }
    }

    /// Feed the raw flag text of one snapshot. Returns whether the
    /// displayed banner changed.
    pub fn update(&mut self, raw: &str, now: u64) -> bool {
        let flag = parse_flag(raw);
        if flag == self.previous {
            return false;
        }

        let before = self.active.clone();
        self.active = match &flag {
            None => None,
            Some(RaceFlag::Green) => {
                let announce = self
                    .previous
                    .as_ref()
                    .is_none_or(|prev| !prev.is_special() && *prev != RaceFlag::Green);
                announce.then(|| ActiveBanner {
                    flag: RaceFlag::Green,
                    expires_at: Some(now.saturating_add(self.green_visible_ms)),
                })
            }
            Some(other) => Some(ActiveBanner {
                flag: other.clone(),
                expires_at: None,
            }),
        };
        debug!(previous = ?self.previous, flag = ?flag, "race flag changed");
        self.previous = flag;
        before != self.active
    }

    /// Hide a transient banner whose time is up.
    pub fn expire(&mut self, now: u64) {
        if self
            .active
            .as_ref()
            .and_then(|banner| banner.expires_at)
            .is_some_and(|deadline| now >= deadline)
        {
            self.active = None;
        }
    }

    /// The flag most recently reported.
    pub const fn current_flag(&self) -> Option<&RaceFlag> {
        self.previous.as_ref()
    }

    /// Display strings for the banner at `now`.
    pub fn view(&self, now: u64) -> Option<BannerView> {
        let banner = self.active.as_ref()?;
        if banner.expires_at.is_some_and(|deadline| now >= deadline) {
            return None;
        }
        let (title, detail) = describe(&banner.flag);
        Some(BannerView {
            flag: banner.flag.clone(),
            title,
            detail,
            transient: banner.expires_at.is_some(),
            remaining_ms: banner.expires_at.map(|deadline| remaining_ms(deadline, now)),
        })
    }
}
