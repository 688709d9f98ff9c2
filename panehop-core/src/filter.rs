use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use serde::Deserialize;
use std::ops::Range;

use crate::model::SessionId;
use crate::tree::{EntityRef, Row};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    /// Case-insensitive contiguous substring.
    #[default]
    Substring,
    /// Skim-style subsequence matching.
    Fuzzy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub matcher: MatcherKind,
    /// Show a header whose own label matches, along with everything beneath it.
    pub match_headers: bool,
}

/// A row that survived filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    /// Index into the flattened rows.
    pub index: usize,
    /// Byte ranges of the match inside the row label.
    pub highlights: Vec<Range<usize>>,
}

/// Filters flattened rows by a query and tracks the selection across edits.
pub struct FilterEngine {
    rows: Vec<Row>,
    query: String,
    options: FilterOptions,
    visible: Vec<VisibleRow>,
    selected: Option<usize>,
}

impl FilterEngine {
    /// Builds an engine showing every row, with the current session selected.
    pub fn new(rows: Vec<Row>, options: FilterOptions) -> Self {
        let mut engine = Self {
            rows,
            query: String::new(),
            options,
            visible: Vec::new(),
            selected: None,
        };
        engine.recompute(None);
        let current = engine
            .visible
            .iter()
            .position(|v| engine.rows[v.index].is_session() && engine.rows[v.index].is_current);
        if current.is_some() {
            engine.selected = current;
        }
        engine
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = (&Row, &VisibleRow)> {
        self.visible.iter().map(|v| (&self.rows[v.index], v))
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    /// Position of the selection within the visible rows.
    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.selected
            .and_then(|sel| self.visible.get(sel))
            .map(|v| &self.rows[v.index])
    }

    pub fn set_query(&mut self, text: &str) -> &[VisibleRow] {
        let previous = self.selected_entity();
        self.query = text.to_string();
        self.recompute(previous);
        &self.visible
    }

    /// Replaces the rows after a snapshot change, keeping query and selection.
    pub fn set_rows(&mut self, rows: Vec<Row>) {
        let previous = self.selected_entity();
        self.rows = rows;
        self.recompute(previous);
    }

    /// Select the visible row for `entity`. Returns false when it is hidden.
    pub fn select_entity(&mut self, entity: &EntityRef) -> bool {
        match self.position_of(entity) {
            Some(pos) => {
                self.selected = Some(pos);
                true
            }
            None => false,
        }
    }

    /// Move selection by delta, clamping to bounds
    pub fn move_selection(&mut self, delta: i32) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let current = self.selected.unwrap_or(0);
        let step = delta.unsigned_abs() as usize;
        self.selected = Some(if delta > 0 {
            current.saturating_add(step).min(len - 1)
        } else {
            current.saturating_sub(step)
        });
    }

    pub fn move_to_top(&mut self) {
        if !self.visible.is_empty() {
            self.selected = Some(0);
        }
    }

    pub fn move_to_bottom(&mut self) {
        if !self.visible.is_empty() {
            self.selected = Some(self.visible.len() - 1);
        }
    }

    /// The session an activation of the selected row targets.
    ///
    /// Headers resolve to the current session among their visible descendants,
    /// falling back to the first visible descendant.
    pub fn resolve_selected_session(&self) -> Option<SessionId> {
        let sel = self.selected?;
        let header = &self.rows[self.visible.get(sel)?.index];
        if let Some(id) = header.entity.session_id() {
            return Some(id.clone());
        }

        let descendants: Vec<&Row> = self.visible[sel + 1..]
            .iter()
            .map(|v| &self.rows[v.index])
            .take_while(|r| r.depth > header.depth)
            .filter(|r| r.is_session())
            .collect();
        descendants
            .iter()
            .find(|r| r.is_current)
            .or_else(|| descendants.first())
            .and_then(|r| r.entity.session_id().cloned())
    }

    fn position_of(&self, entity: &EntityRef) -> Option<usize> {
        self.visible
            .iter()
            .position(|v| &self.rows[v.index].entity == entity)
    }

    fn selected_entity(&self) -> Option<EntityRef> {
        self.selected_row().map(|r| r.entity.clone())
    }

    fn recompute(&mut self, previous: Option<EntityRef>) {
        self.visible = self.compute_visible();

        self.selected = previous
            .and_then(|entity| self.position_of(&entity))
            .or_else(|| {
                self.visible
                    .iter()
                    .position(|v| self.rows[v.index].is_session())
            })
            .or(if self.visible.is_empty() { None } else { Some(0) });
    }

    fn compute_visible(&self) -> Vec<VisibleRow> {
        let needle = self.query.trim();
        if needle.is_empty() {
            return (0..self.rows.len())
                .map(|index| VisibleRow {
                    index,
                    highlights: Vec::new(),
                })
                .collect();
        }

        let fuzzy = (self.options.matcher == MatcherKind::Fuzzy).then(SkimMatcherV2::default);
        let match_label = |label: &str| match &fuzzy {
            Some(matcher) => fuzzy_ranges(matcher, label, needle),
            None => substring_ranges(label, needle),
        };

        // Forward pass: own matches, and whether a header above matched.
        let mut header_matched = [false; 2];
        let mut matches: Vec<(Option<Vec<Range<usize>>>, bool)> = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let depth = usize::from(row.depth);
            let forced = header_matched.iter().take(depth).any(|m| *m);
            let own = if row.is_session() || self.options.match_headers {
                match_label(&row.label)
            } else {
                None
            };
            if let Some(flag) = header_matched.get_mut(depth) {
                *flag = !row.is_session() && own.is_some();
                for deeper in header_matched.iter_mut().skip(depth + 1) {
                    *deeper = false;
                }
            }
            matches.push((own, forced));
        }

        // Reverse pass: headers are shown when something beneath them is.
        let mut shown = vec![false; self.rows.len()];
        let mut below = [false; 3];
        for (i, row) in self.rows.iter().enumerate().rev() {
            let depth = usize::from(row.depth).min(2);
            let (own, forced) = &matches[i];
            let visible = own.is_some() || *forced || (!row.is_session() && below[depth]);
            for flag in below.iter_mut().skip(depth) {
                *flag = false;
            }
            if visible {
                for flag in below.iter_mut().take(depth) {
                    *flag = true;
                }
            }
            shown[i] = visible;
        }

        matches
            .into_iter()
            .enumerate()
            .filter(|(i, _)| shown[*i])
            .map(|(index, (own, _))| VisibleRow {
                index,
                highlights: own.unwrap_or_default(),
            })
            .collect()
    }
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Non-overlapping case-insensitive occurrences of `needle`, as byte ranges.
/// `None` when there is no occurrence.
fn substring_ranges(haystack: &str, needle: &str) -> Option<Vec<Range<usize>>> {
    let needle: Vec<char> = needle.chars().collect();
    let chars: Vec<(usize, char)> = haystack.char_indices().collect();
    if needle.is_empty() || needle.len() > chars.len() {
        return None;
    }

    let mut ranges = Vec::new();
    let mut i = 0;
    while i + needle.len() <= chars.len() {
        let window = &chars[i..i + needle.len()];
        if window
            .iter()
            .zip(&needle)
            .all(|((_, c), n)| chars_eq_ignore_case(*c, *n))
        {
            let start = chars[i].0;
            let end = chars
                .get(i + needle.len())
                .map_or(haystack.len(), |(b, _)| *b);
            ranges.push(start..end);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    (!ranges.is_empty()).then_some(ranges)
}

fn fuzzy_ranges(
    matcher: &SkimMatcherV2,
    haystack: &str,
    needle: &str,
) -> Option<Vec<Range<usize>>> {
    let (_, char_indices) = matcher.fuzzy_indices(haystack, needle)?;
    let offsets: Vec<(usize, char)> = haystack.char_indices().collect();

    let mut ranges: Vec<Range<usize>> = Vec::new();
    for idx in char_indices {
        let Some(&(start, c)) = offsets.get(idx) else {
            continue;
        };
        let end = start + c.len_utf8();
        match ranges.last_mut() {
            Some(last) if last.end == start => last.end = end,
            _ => ranges.push(start..end),
        }
    }
    Some(ranges)
}
