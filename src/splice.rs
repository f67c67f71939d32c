use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental patch primitive: a verified byte-span replacement applied
/// to an in-memory document.
///
/// All high-level operations (block replace, line insertion, wrapper fixup)
/// compile down to this single primitive. Intelligence lives in span
/// acquisition, not in application, and application is pure: the document
/// goes in as a `&str` and comes out as a new `String`. File I/O happens
/// once at the boundary, never here.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Splice does nothing until apply_to() is called"]
pub struct Splice {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to place at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: SpliceVerification,
}

/// Verification strategy for splice safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl SpliceVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            SpliceVerification::ExactMatch(expected) => text == expected,
            SpliceVerification::Hash(expected_hash) => {
                xxh3_64(text.as_bytes()) == *expected_hash
            }
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            SpliceVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            SpliceVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum SpliceError {
    #[error("Before-text verification failed at byte {byte_start}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in document of length {doc_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        doc_len: usize,
    },

    #[error("Byte range [{byte_start}, {byte_end}) splits a UTF-8 code point")]
    SplitsCodePoint { byte_start: usize, byte_end: usize },
}

/// Result of applying a splice to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "SpliceOutcome should be checked for applied/already-applied"]
pub enum SpliceOutcome {
    /// The document was changed
    Applied(String),
    /// The span already holds the new text; document returned unchanged
    AlreadyApplied(String),
}

impl SpliceOutcome {
    /// The resulting document, regardless of whether it changed.
    pub fn into_document(self) -> String {
        match self {
            SpliceOutcome::Applied(doc) | SpliceOutcome::AlreadyApplied(doc) => doc,
        }
    }
}

impl Splice {
    /// Create a new splice with automatic verification generation.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl Into<String>,
    ) -> Self {
        let expected = expected_before.into();
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: SpliceVerification::from_text(&expected),
        }
    }

    /// Create a splice with an explicit verification strategy.
    pub fn with_verification(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        verification: SpliceVerification,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: verification,
        }
    }

    /// A splice that inserts text at a position without replacing anything.
    pub fn insert_at(byte_pos: usize, new_text: impl Into<String>) -> Self {
        Self::new(byte_pos, byte_pos, new_text, "")
    }

    /// Validate this splice against the document.
    ///
    /// Returns the current text at [byte_start, byte_end) if validation
    /// succeeds. Never modifies anything.
    fn validate<'a>(&self, document: &'a str) -> Result<&'a str, SpliceError> {
        if self.byte_start > self.byte_end || self.byte_end > document.len() {
            return Err(SpliceError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                doc_len: document.len(),
            });
        }

        if !document.is_char_boundary(self.byte_start) || !document.is_char_boundary(self.byte_end)
        {
            return Err(SpliceError::SplitsCodePoint {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
            });
        }

        let current_text = &document[self.byte_start..self.byte_end];

        // Already applied counts as valid (idempotency)
        if current_text == self.new_text {
            return Ok(current_text);
        }

        if !self.expected_before.matches(current_text) {
            return Err(SpliceError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current_text.to_string(),
            });
        }

        Ok(current_text)
    }

    /// Apply this splice to a document, producing a new document.
    ///
    /// On any error the input is left untouched and no partial result
    /// escapes; the document either transforms completely or not at all.
    pub fn apply_to(&self, document: &str) -> Result<SpliceOutcome, SpliceError> {
        let current_text = self.validate(document)?;

        if current_text == self.new_text {
            return Ok(SpliceOutcome::AlreadyApplied(document.to_string()));
        }

        let mut output = String::with_capacity(
            document.len() + self.new_text.len() - (self.byte_end - self.byte_start),
        );
        output.push_str(&document[..self.byte_start]);
        output.push_str(&self.new_text);
        output.push_str(&document[self.byte_end..]);

        Ok(SpliceOutcome::Applied(output))
    }
}

/// Prefix every line of a payload with the caller-supplied indentation.
///
/// Indentation is always explicit, never inferred from the surrounding
/// document. Blank lines stay blank.
pub fn indent_block(payload: &str, indent: &str) -> String {
    if indent.is_empty() {
        return payload.to_string();
    }
    let mut out = String::with_capacity(payload.len() + indent.len() * 8);
    for (i, line) in payload.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if !line.is_empty() {
            out.push_str(indent);
            out.push_str(line);
        }
    }
    out
}
