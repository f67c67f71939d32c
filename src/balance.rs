//! Fragment-wrapper balance: counting and close-token placement.
//!
//! A wrapper pair is an opening/closing pair of structural markers (for JSX
//! fragments, `<>` and `</>`) that must appear in matched counts around a
//! group of sibling elements. Patches that introduce an opening token declare
//! the pair so the applicator can verify the counts balance after the splice,
//! and a dedicated fixup operation places a missing close token at the
//! correct boundary.

use crate::splice::Splice;
use serde::Deserialize;
use thiserror::Error;

/// An opening/closing wrapper token pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WrapperPair {
    pub open: String,
    pub close: String,
}

impl WrapperPair {
    /// JSX fragment tokens, the pair the chart patches use.
    pub fn jsx_fragment() -> Self {
        Self {
            open: "<>".to_string(),
            close: "</>".to_string(),
        }
    }

    /// Opening-token count minus closing-token count over a region.
    ///
    /// The close token is counted first and its occurrences masked out, so an
    /// open token embedded in the close token (as with `<>` inside `</>`)
    /// is not double counted.
    pub fn delta(&self, region: &str) -> i64 {
        let closes = region.matches(&self.close).count() as i64;
        let masked = region.replace(&self.close, "\u{0}");
        let opens = masked.matches(&self.open).count() as i64;
        opens - closes
    }

    /// Verify a region's wrapper tokens balance to zero.
    pub fn verify(&self, region: &str) -> Result<(), BalanceError> {
        let delta = self.delta(region);
        if delta == 0 {
            Ok(())
        } else {
            Err(BalanceError::Unbalanced {
                open: self.open.clone(),
                close: self.close.clone(),
                delta,
            })
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum BalanceError {
    #[error("wrapper tokens {open:?}/{close:?} unbalanced: open-close delta is {delta}")]
    Unbalanced {
        open: String,
        close: String,
        delta: i64,
    },

    #[error(
        "no closing boundary found within {window} lines of line {from_line}: \
         expected a line containing {close_marker:?} followed by one containing {boundary_marker:?}"
    )]
    BoundaryNotFound {
        from_line: usize,
        window: usize,
        close_marker: String,
        boundary_marker: String,
    },
}

/// Where a missing close token belongs.
///
/// Scans a bounded window of lines forward from `from_line` for a line
/// containing `close_marker` immediately followed by a line containing
/// `boundary_marker`, and plans a splice that inserts `token_line` (plus a
/// newline) immediately before the boundary line. Window exhaustion is a hard
/// error; a fixup that cannot find its boundary must be reported, not
/// silently skipped.
pub fn plan_close_insertion(
    document: &str,
    from_line: usize,
    window: usize,
    close_marker: &str,
    boundary_marker: &str,
    token_line: &str,
) -> Result<Splice, BalanceError> {
    let mut byte_pos = 0usize;
    let mut line_starts = Vec::new();
    for line in document.split('\n') {
        line_starts.push(byte_pos);
        byte_pos += line.len() + 1;
    }

    let lines: Vec<&str> = document.split('\n').collect();
    let end = (from_line + window).min(lines.len().saturating_sub(1));

    for i in from_line..end {
        if lines[i].contains(close_marker) && lines[i + 1].contains(boundary_marker) {
            let boundary_start = line_starts[i + 1];
            let mut inserted = String::with_capacity(token_line.len() + 1);
            inserted.push_str(token_line);
            inserted.push('\n');
            return Ok(Splice::insert_at(boundary_start, inserted));
        }
    }

    Err(BalanceError::BoundaryNotFound {
        from_line,
        window,
        close_marker: close_marker.to_string(),
        boundary_marker: boundary_marker.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_balanced() {
        let pair = WrapperPair::jsx_fragment();
        assert_eq!(pair.delta("<>\n  <div/>\n</>"), 0);
    }

    #[test]
    fn test_delta_missing_close() {
        let pair = WrapperPair::jsx_fragment();
        assert_eq!(pair.delta("<>\n  <div/>\n"), 1);
    }

    #[test]
    fn test_delta_extra_close() {
        let pair = WrapperPair::jsx_fragment();
        assert_eq!(pair.delta("  <div/>\n</>\n</>"), -2);
    }

    #[test]
    fn test_delta_close_not_counted_as_open() {
        // `</>` contains no standalone `<>` once masked
        let pair = WrapperPair::jsx_fragment();
        assert_eq!(pair.delta("</>"), -1);
    }

    #[test]
    fn test_verify_reports_unbalanced() {
        let pair = WrapperPair::jsx_fragment();
        let err = pair.verify("<>").unwrap_err();
        assert!(matches!(err, BalanceError::Unbalanced { delta: 1, .. }));
    }

    const DOC: &str = "\
{chartView === 'timeline' && (
   <>
   <div className=\"controls\">
   </div>
   <div className=\"relative\">
   </div>
)}
<button/>
";

    #[test]
    fn test_plan_close_insertion_places_before_boundary() {
        let splice = plan_close_insertion(DOC, 0, 50, "</div>", ")}", "   </>").unwrap();
        let out = splice.apply_to(DOC).unwrap().into_document();
        assert!(out.contains("   </div>\n   </>\n)}"));
        // Wrapper now balances across the whole region
        assert_eq!(WrapperPair::jsx_fragment().delta(&out), 0);
    }

    #[test]
    fn test_plan_close_insertion_window_exhausted() {
        let err = plan_close_insertion(DOC, 0, 2, "</div>", ")}", "   </>").unwrap_err();
        assert!(matches!(err, BalanceError::BoundaryNotFound { .. }));
    }

    #[test]
    fn test_plan_close_insertion_no_boundary_pair() {
        let err = plan_close_insertion(DOC, 0, 50, "</span>", ")}", "   </>").unwrap_err();
        assert!(matches!(
            err,
            BalanceError::BoundaryNotFound { window: 50, .. }
        ));
    }
}
