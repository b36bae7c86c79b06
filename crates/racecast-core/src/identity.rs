//! Competitor identity keys and surname extraction.
//!
//! Rows are matched across ticks by `(number, normalized surname)`. Feeds
//! switch between "Last, First", "First Last", and bare single-token names,
//! so the surname is pulled out before normalizing.

use racecast_types::{IdentityKey, StandingsRow};

/// Lowercase particles that belong to the surname in "First Last" names.
const SURNAME_PARTICLES: &[&str] = &[
    "da", "das", "de", "del", "della", "den", "der", "di", "do", "dos", "du", "la", "le", "st",
    "ten", "ter", "van", "von",
];

/// Extract the surname as written, without normalizing case.
///
/// - `"Smith, John"` -> `"Smith"`
/// - `"John Smith"` -> `"Smith"`
/// - `"Max Van Der Berg"` -> `"Van Der Berg"`
/// - `"Smith"` -> `"Smith"`
///
/// In the "First Last" form the last token is extended backwards over
/// name particles, so both forms of a multi-word surname agree. A surname
/// without particles (`"Max Lloyd Webber"`) still yields only its last token.
pub fn display_surname(name: &str) -> &str {
    let name = name.trim();
    if let Some((last, _first)) = name.split_once(',') {
        let last = last.trim();
        if !last.is_empty() {
            return last;
        }
    }

    let mut starts = Vec::new();
    let mut after_space = true;
    for (index, c) in name.char_indices() {
        let space = c.is_whitespace();
        if after_space && !space {
            starts.push(index);
        }
        after_space = space;
    }
    let tokens: Vec<&str> = name.split_whitespace().collect();

    let mut first = tokens.len().saturating_sub(1);
    while let Some(previous) = first.checked_sub(1) {
        let is_particle = tokens
            .get(previous)
            .is_some_and(|token| SURNAME_PARTICLES.contains(&token.to_lowercase().as_str()));
        if !is_particle || previous == 0 {
            break;
        }
        first = previous;
    }
    starts
        .get(first)
        .and_then(|&start| name.get(start..))
        .unwrap_or(name)
}

/// Lowercased surname with everything but letters and digits removed.
pub fn normalized_surname(name: &str) -> String {
    display_surname(name)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// The identity key of a standings row.
pub fn identity_key(row: &StandingsRow) -> IdentityKey {
    IdentityKey {
        number: row.number.trim().to_owned(),
        surname: normalized_surname(&row.name),
    }
}

/// Short competitor label for cards: `"#7 Smith"`.
pub fn competitor_label(number: &str, name: &str) -> String {
    let surname = display_surname(name);
    match (number.trim().is_empty(), surname.is_empty()) {
        (true, true) => String::new(),
        (true, false) => surname.to_owned(),
        (false, true) => format!("#{}", number.trim()),
        (false, false) => format!("#{} {surname}", number.trim()),
    }
}
