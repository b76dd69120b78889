//! Nearby-name suggestions for not-found diagnostics

use std::collections::BTreeSet;

/// Levenshtein edit distance between two strings, compared by `char`
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Rank `names` against `query` and return at most `limit` suggestions
///
/// Names containing the query (case-insensitive) come first, in name order.
/// Then names within `max_distance` edits, closest first. Exact matches are
/// never suggested.
pub fn suggest_names<I, S>(query: &str, names: I, limit: usize, max_distance: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let distinct: BTreeSet<String> = names
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .collect();

    let mut substring = Vec::new();
    let mut nearby = Vec::new();
    for name in distinct {
        let lowered = name.to_lowercase();
        if lowered == needle {
            continue;
        }
        if lowered.contains(&needle) {
            substring.push(name);
            continue;
        }
        let distance = levenshtein(&lowered, &needle);
        if distance <= max_distance {
            nearby.push((distance, name));
        }
    }
    nearby.sort();

    substring
        .into_iter()
        .chain(nearby.into_iter().map(|(_, name)| name))
        .take(limit)
        .collect()
}
