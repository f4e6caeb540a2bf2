//! Goal-text similarity and the shared query helpers.

use ghosthand_contracts::execution::RunRecord;

use crate::entry::HistoryEntry;

/// Lowercase and collapse whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Jaro-Winkler similarity of two goals in `[0.0, 1.0]`.
///
/// Identical goals (after normalization) score exactly 1.0. Empty goals
/// never match anything.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    strsim::jaro_winkler(&a, &b)
}

/// Records for `user`, most recent first.
pub(crate) fn by_user(entries: &[HistoryEntry], user: &str) -> Vec<RunRecord> {
    entries
        .iter()
        .rev()
        .filter(|e| e.record.user == user)
        .map(|e| e.record.clone())
        .collect()
}

/// Records for `user` scoring at least `threshold` against `goal_text`,
/// best first, ties most recent first.
pub(crate) fn rank(
    entries: &[HistoryEntry],
    goal_text: &str,
    user: &str,
    threshold: f64,
) -> Vec<RunRecord> {
    let mut scored: Vec<(f64, u64, &RunRecord)> = entries
        .iter()
        .filter(|e| e.record.user == user)
        .map(|e| (similarity(goal_text, &e.record.goal_text), e.sequence, &e.record))
        .filter(|(score, _, _)| *score >= threshold)
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));
    scored.into_iter().map(|(_, _, record)| record.clone()).collect()
}

/// Distinct users in first-seen order.
pub(crate) fn users(entries: &[HistoryEntry]) -> Vec<String> {
    let mut users: Vec<String> = Vec::new();
    for entry in entries {
        if !users.contains(&entry.record.user) {
            users.push(entry.record.user.clone());
        }
    }
    users
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_case_and_spacing() {
        assert_eq!(normalize("  Take a   SCREENSHOT\n"), "take a screenshot");
        assert_eq!(similarity("Take a screenshot", "take  a screenshot"), 1.0);
    }

    #[test]
    fn similar_goals_outscore_unrelated_ones() {
        let close = similarity("email the screenshot to bob", "email the screenshot to alice");
        let far = similarity("email the screenshot to bob", "click at 10, 20");
        assert!(close > 0.8, "close = {close}");
        assert!(far < close);
    }

    #[test]
    fn empty_goals_never_match() {
        assert_eq!(similarity("", "anything"), 0.0);
        assert_eq!(similarity("   ", "   "), 0.0);
    }
}
