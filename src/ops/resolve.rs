//! Name resolution against a workspace snapshot.
//!
//! Remote entity names are human-typed ("Fix login bug") while spoken
//! references are looser ("the login bug"), so resolution runs a fixed
//! cascade: exact match, substring containment, ordinal position (checklist
//! scopes only), similarity ratio, and finally a single-candidate fallback
//! for checklist scopes. Resolution is pure; callers decide whether a miss
//! is a failure or a create trigger.

use std::sync::OnceLock;

use regex::Regex;

/// What kind of entity a reference is being resolved against. Checklist and
/// item scopes allow positional references and the single-candidate
/// fallback; task/user/label/section scopes never do, since acting on the
/// wrong task is much worse than failing to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Task,
    User,
    Label,
    Section,
    Checklist,
    Item,
}

impl Scope {
    fn positional(self) -> bool {
        matches!(self, Scope::Checklist | Scope::Item)
    }

    fn threshold(self) -> f64 {
        match self {
            Scope::Checklist => 0.7,
            _ => 0.6,
        }
    }
}

const ORDINAL_WORDS: [&str; 10] = [
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

fn suffixed_ordinal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)(?:st|nd|rd|th)\b").unwrap())
}

fn trailing_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z\s]*\s(\d+)$").unwrap())
}

/// Parse an ordinal reference ("first", "2nd item", "checklist 3", bare "2"
/// for items) into a 0-based index. Returns `None` when the reference does
/// not use the positional grammar at all.
pub fn ordinal_index(reference: &str, scope: Scope) -> Option<usize> {
    let r = reference.trim().to_lowercase();
    for (i, word) in ORDINAL_WORDS.iter().enumerate() {
        if r == *word || r.starts_with(&format!("{word} ")) {
            return Some(i);
        }
    }
    if let Some(caps) = suffixed_ordinal_re().captures(&r) {
        let n: usize = caps[1].parse().ok()?;
        // The grammar stops at "tenth"; larger numbers are not ordinals.
        if !(1..=10).contains(&n) {
            return None;
        }
        return Some(n - 1);
    }
    if let Some(caps) = trailing_number_re().captures(&r) {
        let n: usize = caps[1].parse().ok()?;
        return n.checked_sub(1);
    }
    if scope == Scope::Item {
        if let Ok(n) = r.parse::<usize>() {
            return n.checked_sub(1);
        }
    }
    None
}

/// True when the reference identifies an entity by position rather than
/// name. Used by appliers to gate auto-creation leniencies on plain names.
pub fn is_positional(reference: &str) -> bool {
    ordinal_index(reference, Scope::Item).is_some()
}

/// Resolve `reference` to an index into `candidates`, or `None`.
pub fn resolve<S: AsRef<str>>(reference: &str, candidates: &[S], scope: Scope) -> Option<usize> {
    let reference = reference.trim();
    if reference.is_empty() || candidates.is_empty() {
        return None;
    }
    let lower = reference.to_lowercase();

    for (i, candidate) in candidates.iter().enumerate() {
        if candidate.as_ref().to_lowercase() == lower {
            return Some(i);
        }
    }

    for (i, candidate) in candidates.iter().enumerate() {
        let c = candidate.as_ref().to_lowercase();
        if c.is_empty() {
            continue;
        }
        if c.contains(&lower) || lower.contains(&c) {
            return Some(i);
        }
    }

    if scope.positional() {
        if let Some(idx) = ordinal_index(reference, scope) {
            // Out of range means no match, never wraparound or clamping.
            return (idx < candidates.len()).then_some(idx);
        }
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        let score = similarity(reference, candidate.as_ref());
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    if let Some((i, score)) = best {
        if score >= scope.threshold() {
            return Some(i);
        }
    }

    if scope.positional() && candidates.len() == 1 {
        return Some(0);
    }

    None
}

/// Similarity ratio in `[0.0, 1.0]`: twice the number of characters covered
/// by common blocks over the combined length, case-insensitive. Matches the
/// familiar sequence-matcher ratio so thresholds carry over.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Total characters in common blocks: find the longest common substring,
/// then recurse on the pieces to its left and right.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut best_len = 0usize;
    let mut best_a = 0usize;
    let mut best_b = 0usize;
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut row = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                row[j + 1] = len;
                if len > best_len {
                    best_len = len;
                    best_a = i + 1 - len;
                    best_b = j + 1 - len;
                }
            }
        }
        prev = row;
    }
    if best_len == 0 {
        return 0;
    }
    best_len
        + matching_chars(&a[..best_a], &b[..best_b])
        + matching_chars(&a[best_a + best_len..], &b[best_b + best_len..])
}
