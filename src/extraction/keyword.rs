//! Lexicon-driven recognizer.
//!
//! Finds spans by matching the catalog's own vocabulary against the
//! question. Every matched region is masked before the next pass, so a
//! word is claimed at most once:
//!
//! 1. comparison phrases ("vs previous period", "yoy")
//! 2. time expressions
//! 3. `top N` / `bottom N`
//! 4. known filter values, with an optional negation word in front
//! 5. metric and dimension names and aliases, longest first
//! 6. leftover words after "by" (dimension) or "show"/"total" (metric)

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::recognizer::{ExtractionError, RawEntity, RawEntityKind, RawEntityRecognizer};
use crate::knowledge::Catalog;
use crate::model::{Comparison, DimensionKind, SortDirection, TimeRange};

const MASK: &str = "#";

/// Confidence for spans guessed from position rather than vocabulary.
const GUESS_CONFIDENCE: f64 = 0.5;

/// Default row count for a bare "top" or "bottom".
const DEFAULT_TOP_N: u64 = 10;

static COMPARISON_PATTERNS: LazyLock<Vec<(Regex, Comparison)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"\b(?:year[\s-]over[\s-]year|yoy)\b").unwrap(),
            Comparison::YearOverYear,
        ),
        (
            Regex::new(r"\b(?:month[\s-]over[\s-]month|mom)\b").unwrap(),
            Comparison::MonthOverMonth,
        ),
        (
            Regex::new(
                r"\b(?:(?:vs\.?|versus|compared\s+(?:to|with))\s+(?:the\s+)?(?:previous|prior|last)\s+period|period[\s-]over[\s-]period)\b",
            )
            .unwrap(),
            Comparison::PreviousPeriod,
        ),
    ]
});

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:(?:from|between)\s+\d{4}-\d{2}-\d{2}\s+(?:to|and|until|through)\s+\d{4}-\d{2}-\d{2}|today|yesterday|year\s+to\s+date|ytd|(?:this|last|previous)\s+(?:week|month|quarter|year)|(?:last|past|previous)\s+\d{1,4}\s+(?:days?|weeks?))\b",
    )
    .unwrap()
});

static TOP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(top|bottom)\b(?:\s+(\d{1,6})\b)?").unwrap());

static NEGATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:not|excluding|exclude|except|without)\s+(?:in\s+|from\s+|on\s+)?$").unwrap()
});

static AFTER_BY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bby\s+([a-z][a-z0-9_]*)").unwrap());

static AFTER_VERB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:show|total|how\s+many|what\s+(?:is|are|was|were))\s+(?:me\s+)?(?:the\s+)?(?:total\s+)?([a-z][a-z0-9_]*)",
    )
    .unwrap()
});

const STOPWORDS: &[&str] = &[
    "a", "all", "an", "and", "by", "each", "for", "from", "in", "me", "my", "of", "on", "or",
    "our", "per", "the", "to", "top", "total", "with",
];

#[derive(Debug)]
struct Phrase {
    pattern: Regex,
    kind: RawEntityKind,
    len: usize,
}

#[derive(Debug)]
struct ValuePhrase {
    pattern: Regex,
    dimension: DimensionKind,
    value: String,
    len: usize,
}

/// Recognizer built from a catalog's names, aliases and known values.
#[derive(Debug)]
pub struct KeywordRecognizer {
    phrases: Vec<Phrase>,
    values: Vec<ValuePhrase>,
}

impl KeywordRecognizer {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut seen: HashSet<(String, bool)> = HashSet::new();
        let mut phrases = Vec::new();

        let metric_words = catalog.metrics.iter().flat_map(|m| {
            vocabulary(m.kind.id(), &m.name, &m.aliases).map(|w| (w, true))
        });
        let dimension_words = catalog.dimensions.iter().flat_map(|d| {
            vocabulary(d.kind.id(), &d.name, &d.aliases).map(|w| (w, false))
        });

        for (word, is_metric) in metric_words.chain(dimension_words) {
            if !seen.insert((word.clone(), is_metric)) {
                continue;
            }
            let Some(pattern) = word_pattern(&word) else {
                continue;
            };
            phrases.push(Phrase {
                pattern,
                kind: if is_metric {
                    RawEntityKind::Metric
                } else {
                    RawEntityKind::Dimension
                },
                len: word.len(),
            });
        }
        phrases.sort_by(|a, b| b.len.cmp(&a.len));

        let mut values = Vec::new();
        for dimension in &catalog.dimensions {
            for known in &dimension.values {
                let words = std::iter::once(known.value.to_lowercase())
                    .chain(known.aliases.iter().map(|a| a.to_lowercase()));
                let mut own: HashSet<String> = HashSet::new();
                for word in words {
                    if !own.insert(word.clone()) {
                        continue;
                    }
                    let Some(pattern) = word_pattern(&word) else {
                        continue;
                    };
                    values.push(ValuePhrase {
                        pattern,
                        dimension: dimension.kind,
                        value: known.value.clone(),
                        len: word.len(),
                    });
                }
            }
        }
        values.sort_by(|a, b| b.len.cmp(&a.len));

        Self { phrases, values }
    }

    /// Synchronous scan used by the async trait method.
    pub fn scan(&self, text: &str) -> Vec<RawEntity> {
        let mut work = text.to_ascii_lowercase();
        let mut found = Vec::new();

        for (pattern, comparison) in COMPARISON_PATTERNS.iter() {
            for (start, end) in find_all(pattern, &work) {
                found.push(RawEntity::new(
                    RawEntityKind::Comparison {
                        comparison: *comparison,
                    },
                    &text[start..end],
                    start,
                    end,
                    1.0,
                ));
                mask(&mut work, start, end);
            }
        }

        for (start, end) in find_all(&TIME_RE, &work) {
            let phrase = &text[start..end];
            if TimeRange::parse(phrase).is_none() {
                continue;
            }
            found.push(RawEntity::new(
                RawEntityKind::TimeExpression,
                phrase,
                start,
                end,
                1.0,
            ));
            mask(&mut work, start, end);
        }

        let tops: Vec<_> = TOP_RE
            .captures_iter(&work)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let descending = caps.get(1)?.as_str() == "top";
                let count = caps
                    .get(2)
                    .and_then(|n| n.as_str().parse::<u64>().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(DEFAULT_TOP_N);
                Some((whole.start(), whole.end(), descending, count))
            })
            .collect();
        for (start, end, descending, count) in tops {
            let phrase = &text[start..end];
            found.push(RawEntity::new(
                RawEntityKind::Limit { count },
                phrase,
                start,
                end,
                1.0,
            ));
            let direction = if descending {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            found.push(RawEntity::new(
                RawEntityKind::Sort { direction },
                phrase,
                start,
                end,
                1.0,
            ));
            mask(&mut work, start, end);
        }

        for value in &self.values {
            for (start, end) in find_all(&value.pattern, &work) {
                let negation = NEGATION_RE.find(&work[..start]);
                let span_start = negation.map_or(start, |m| m.start());
                found.push(RawEntity::new(
                    RawEntityKind::FilterValue {
                        dimension: value.dimension,
                        value: value.value.clone(),
                        negated: negation.is_some(),
                    },
                    &text[start..end],
                    span_start,
                    end,
                    1.0,
                ));
                mask(&mut work, span_start, end);
            }
        }

        for phrase in &self.phrases {
            for (start, end) in find_all(&phrase.pattern, &work) {
                found.push(RawEntity::new(
                    phrase.kind.clone(),
                    &text[start..end],
                    start,
                    end,
                    1.0,
                ));
                mask(&mut work, start, end);
            }
        }

        for (pattern, kind) in [
            (&*AFTER_BY_RE, RawEntityKind::Dimension),
            (&*AFTER_VERB_RE, RawEntityKind::Metric),
        ] {
            let guesses: Vec<_> = pattern
                .captures_iter(&work)
                .filter_map(|caps| caps.get(1))
                .filter(|m| !STOPWORDS.contains(&m.as_str()))
                .map(|m| (m.start(), m.end()))
                .collect();
            for (start, end) in guesses {
                found.push(RawEntity::new(
                    kind.clone(),
                    &text[start..end],
                    start,
                    end,
                    GUESS_CONFIDENCE,
                ));
                mask(&mut work, start, end);
            }
        }

        found.sort_by_key(|e| e.start);
        found
    }
}

#[async_trait]
impl RawEntityRecognizer for KeywordRecognizer {
    async fn recognize(&self, text: &str) -> Result<Vec<RawEntity>, ExtractionError> {
        Ok(self.scan(text))
    }
}

/// Lowercased words that name one metric or dimension.
fn vocabulary<'a>(
    id: &'a str,
    name: &'a str,
    aliases: &'a [String],
) -> impl Iterator<Item = String> + 'a {
    [id.to_string(), id.replace('_', " "), name.to_lowercase()]
        .into_iter()
        .chain(aliases.iter().map(|a| a.to_lowercase()))
}

fn word_pattern(word: &str) -> Option<Regex> {
    let word = word.trim();
    if word.is_empty() {
        return None;
    }
    let escaped = regex::escape(word).replace(' ', r"\s+");
    Regex::new(&format!(r"\b{}\b", escaped)).ok()
}

fn find_all(pattern: &Regex, work: &str) -> Vec<(usize, usize)> {
    pattern.find_iter(work).map(|m| (m.start(), m.end())).collect()
}

/// Overwrite `start..end` with mask characters of the same byte length.
fn mask(work: &mut String, start: usize, end: usize) {
    work.replace_range(start..end, &MASK.repeat(end - start));
}
