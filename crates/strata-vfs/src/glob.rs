//! Glob pattern matching for single path components.
//!
//! Pattern language:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from the set or range
//! - `[!abc]` or `[^abc]` match one character NOT in the set
//! - `(a|b)` or `(a,b)` match any of the alternatives, groups may nest
//! - `\` escapes the next character
//!
//! A leading `.` in the input is never matched by `*`, `?` or a bracket
//! class. It has to be spelled out in the pattern, so `*.txt` does not match
//! `.hidden.txt`.

use std::cell::Cell;

/// Upper bound on recursive match calls. Patterns like `*a*a*a*a*b` would
/// otherwise backtrack exponentially.
const MAX_MATCH_CALLS: usize = 100_000;

/// Match a single name (one path component) against a glob pattern.
///
/// The whole name must be consumed by the pattern.
pub fn matches(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let calls = Cell::new(0usize);
    match_at(&pattern, 0, &name, 0, &calls)
}

fn is_leading_period(name: &[char], ni: usize) -> bool {
    ni == 0 && name.first() == Some(&'.')
}

/// Matches from `pi`/`ni` onward. Single-character steps loop in place;
/// only `*` and groups recurse, so depth is bounded by the pattern.
fn match_at(
    pattern: &[char],
    mut pi: usize,
    name: &[char],
    mut ni: usize,
    calls: &Cell<usize>,
) -> bool {
    let count = calls.get() + 1;
    calls.set(count);
    if count > MAX_MATCH_CALLS {
        return false;
    }

    loop {
        if pi >= pattern.len() {
            return ni >= name.len();
        }

        let step = match pattern[pi] {
            '*' => {
                if is_leading_period(name, ni) {
                    return false;
                }

                let mut next_pi = pi;
                while next_pi < pattern.len() && pattern[next_pi] == '*' {
                    next_pi += 1;
                }
                if next_pi >= pattern.len() {
                    return true;
                }

                // zero-length first, then one more character per retry
                return (ni..=name.len()).any(|start| match_at(pattern, next_pi, name, start, calls));
            }

            '?' => {
                if ni >= name.len() || is_leading_period(name, ni) {
                    return false;
                }
                1
            }

            '[' => match parse_class(&pattern[pi..]) {
                Some(class) => {
                    if ni >= name.len() || is_leading_period(name, ni) || !class.contains(name[ni]) {
                        return false;
                    }
                    class.len
                }
                None => literal_step('[', name, ni, 1),
            },

            '(' => match split_group(&pattern[pi..]) {
                Some((alternatives, len)) => {
                    let rest = &pattern[pi + len..];
                    return alternatives.into_iter().any(|alt| {
                        let mut expanded = alt;
                        expanded.extend_from_slice(rest);
                        match_at(&expanded, 0, name, ni, calls)
                    });
                }
                None => literal_step('(', name, ni, 1),
            },

            '\\' if pi + 1 < pattern.len() => literal_step(pattern[pi + 1], name, ni, 2),

            c => literal_step(c, name, ni, 1),
        };

        if step == 0 {
            return false;
        }
        pi += step;
        ni += 1;
    }
}

/// Pattern characters consumed when `name[ni]` equals `c`, or 0 on mismatch.
fn literal_step(c: char, name: &[char], ni: usize, consumed: usize) -> usize {
    if ni < name.len() && name[ni] == c {
        consumed
    } else {
        0
    }
}

/// A parsed bracket expression.
struct CharClass {
    negated: bool,
    singles: Vec<char>,
    ranges: Vec<(char, char)>,
    /// Pattern characters consumed, brackets included.
    len: usize,
}

impl CharClass {
    fn contains(&self, ch: char) -> bool {
        let hit = self.singles.contains(&ch)
            || self.ranges.iter().any(|&(lo, hi)| lo <= ch && ch <= hi);
        hit != self.negated
    }
}

/// Parse `[...]` at the start of `pattern`. Returns `None` when unclosed.
fn parse_class(pattern: &[char]) -> Option<CharClass> {
    let mut idx = 1;
    let mut negated = false;
    if idx < pattern.len() && (pattern[idx] == '!' || pattern[idx] == '^') {
        negated = true;
        idx += 1;
    }

    let first = idx;
    let mut singles = Vec::new();
    let mut ranges = Vec::new();

    while idx < pattern.len() {
        let mut c = pattern[idx];

        // ] as the first member is literal
        if c == ']' && idx > first {
            return Some(CharClass {
                negated,
                singles,
                ranges,
                len: idx + 1,
            });
        }

        if c == '\\' && idx + 1 < pattern.len() {
            idx += 1;
            c = pattern[idx];
        }

        if idx + 2 < pattern.len() && pattern[idx + 1] == '-' && pattern[idx + 2] != ']' {
            let mut hi_idx = idx + 2;
            if pattern[hi_idx] == '\\' && hi_idx + 1 < pattern.len() {
                hi_idx += 1;
            }
            ranges.push((c, pattern[hi_idx]));
            idx = hi_idx + 1;
            continue;
        }

        singles.push(c);
        idx += 1;
    }

    None
}

/// Split `(a|b,c)` at the start of `pattern` into its alternatives.
///
/// Returns the alternatives and the number of pattern characters consumed,
/// or `None` when the group is unclosed.
fn split_group(pattern: &[char]) -> Option<(Vec<Vec<char>>, usize)> {
    let mut alternatives = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;
    let mut idx = 1;

    while idx < pattern.len() {
        let c = pattern[idx];
        match c {
            '\\' if idx + 1 < pattern.len() => {
                current.push(c);
                current.push(pattern[idx + 1]);
                idx += 2;
                continue;
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' if depth == 0 => {
                alternatives.push(current);
                return Some((alternatives, idx + 1));
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            '|' | ',' if depth == 0 => {
                alternatives.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
        idx += 1;
    }

    None
}
