//! Pattern location in semi-structured text.
//!
//! Two modes, matching how the patches are written:
//!
//! - **Whole-string**: an exact multi-line block must occur verbatim exactly
//!   once; the match is replaced as a single unit, which sidesteps line-index
//!   drift entirely.
//! - **Line-scan**: find the first line containing a marker, optionally
//!   constrained to lie after a floor index to skip an earlier unrelated
//!   occurrence of the same text.
//!
//! A failed locate aborts the patch before anything is modified.

use strsim::normalized_levenshtein;
use thiserror::Error;

/// A located byte span within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub byte_start: usize,
    pub byte_end: usize,
}

/// A located line: its zero-based index and the byte span of its content
/// (excluding the trailing newline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineHit {
    pub line_index: usize,
    pub byte_start: usize,
    pub byte_end: usize,
}

impl LineHit {
    /// Byte offset just past this line's newline, i.e. the start of the next
    /// line. For the last line without a trailing newline this is the
    /// document end.
    pub fn insertion_point_after(&self, document: &str) -> usize {
        if document[self.byte_end..].starts_with('\n') {
            self.byte_end + 1
        } else {
            self.byte_end
        }
    }
}

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("pattern not found{}", suggestion_suffix(.suggestion))]
    NoMatch {
        /// Closest line in the document by normalized edit distance, when
        /// one is similar enough to be worth reporting.
        suggestion: Option<String>,
    },

    #[error("pattern matched {count} locations (expected 1)")]
    Ambiguous { count: usize },
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(line) => format!("; closest line: {:?}", line),
        None => String::new(),
    }
}

/// Locate a multi-line block that must occur exactly once.
///
/// Zero occurrences is `NoMatch` (with a nearest-line hint against the
/// block's first non-empty line); more than one is `Ambiguous` because a
/// blind replace could hit the wrong one.
pub fn find_block(document: &str, search: &str) -> Result<Span, LocateError> {
    let mut occurrences = document.match_indices(search);
    let first = occurrences.next();

    let Some((byte_start, _)) = first else {
        return Err(LocateError::NoMatch {
            suggestion: nearest_line(document, search),
        });
    };

    if occurrences.next().is_some() {
        return Err(LocateError::Ambiguous {
            count: document.matches(search).count(),
        });
    }

    Ok(Span {
        byte_start,
        byte_end: byte_start + search.len(),
    })
}

/// Locate the first line containing `marker` whose index is strictly greater
/// than `floor` (when given). The floor skips earlier false positives of the
/// same marker text higher in the file.
pub fn find_line(
    document: &str,
    marker: &str,
    floor: Option<usize>,
) -> Result<LineHit, LocateError> {
    let mut byte_pos = 0usize;

    for (line_index, line) in document.split('\n').enumerate() {
        let past_floor = floor.map_or(true, |f| line_index > f);
        if past_floor && line.contains(marker) {
            return Ok(LineHit {
                line_index,
                byte_start: byte_pos,
                byte_end: byte_pos + line.len(),
            });
        }
        byte_pos += line.len() + 1;
    }

    Err(LocateError::NoMatch {
        suggestion: nearest_line(document, marker),
    })
}

/// Minimum similarity before a line is offered as a "closest line" hint.
const SUGGESTION_THRESHOLD: f64 = 0.6;

/// Find the document line most similar to the (first meaningful line of the)
/// search text. Used purely for diagnostics when a locate fails, so the
/// operator can see how the file drifted from the expected shape.
fn nearest_line(document: &str, search: &str) -> Option<String> {
    let needle = search
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())?;

    let mut best: Option<(f64, &str)> = None;
    for line in document.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let score = normalized_levenshtein(needle, trimmed);
        if best.map_or(true, |(best_score, _)| score > best_score) {
            best = Some((score, trimmed));
        }
    }

    best.and_then(|(score, line)| (score >= SUGGESTION_THRESHOLD).then(|| line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
const a = 1;
{chartView === 'timeline' && (
  <div className=\"relative\">
)}
{chartView === 'timeline' && (
  <div className=\"absolute\">
)}
";

    #[test]
    fn test_find_block_unique() {
        let span = find_block(DOC, "const a = 1;").unwrap();
        assert_eq!(span.byte_start, 0);
        assert_eq!(&DOC[span.byte_start..span.byte_end], "const a = 1;");
    }

    #[test]
    fn test_find_block_absent() {
        let err = find_block(DOC, "no such text anywhere").unwrap_err();
        assert!(matches!(err, LocateError::NoMatch { .. }));
    }

    #[test]
    fn test_find_block_ambiguous() {
        let err = find_block(DOC, "chartView === 'timeline'").unwrap_err();
        assert!(matches!(err, LocateError::Ambiguous { count: 2 }));
    }

    #[test]
    fn test_find_block_multiline() {
        let search = "  <div className=\"relative\">\n)}";
        let span = find_block(DOC, search).unwrap();
        assert_eq!(&DOC[span.byte_start..span.byte_end], search);
    }

    #[test]
    fn test_find_line_first_occurrence() {
        let hit = find_line(DOC, "chartView === 'timeline'", None).unwrap();
        assert_eq!(hit.line_index, 1);
    }

    #[test]
    fn test_find_line_floor_skips_first() {
        let hit = find_line(DOC, "chartView === 'timeline'", Some(1)).unwrap();
        assert_eq!(hit.line_index, 4);
        assert_eq!(
            &DOC[hit.byte_start..hit.byte_end],
            "{chartView === 'timeline' && ("
        );
    }

    #[test]
    fn test_find_line_floor_exhausts() {
        let err = find_line(DOC, "chartView === 'timeline'", Some(10)).unwrap_err();
        assert!(matches!(err, LocateError::NoMatch { .. }));
    }

    #[test]
    fn test_insertion_point_after_line() {
        let hit = find_line(DOC, "const a = 1;", None).unwrap();
        let pos = hit.insertion_point_after(DOC);
        assert!(DOC[pos..].starts_with("{chartView"));
    }

    #[test]
    fn test_nearest_line_suggestion() {
        let err = find_block(DOC, "{chartView === 'timeLine' && (").unwrap_err();
        match err {
            LocateError::NoMatch { suggestion } => {
                assert_eq!(
                    suggestion.as_deref(),
                    Some("{chartView === 'timeline' && (")
                );
            }
            other => panic!("expected NoMatch, got {other:?}"),
        }
    }

    #[test]
    fn test_no_suggestion_when_nothing_close() {
        let err = find_block("alpha\nbeta\n", "zzzzzzzzzzzzzzz").unwrap_err();
        match err {
            LocateError::NoMatch { suggestion } => assert!(suggestion.is_none()),
            other => panic!("expected NoMatch, got {other:?}"),
        }
    }
}
