//! Patch applicator: runs patch definitions against target files.
//!
//! Each target file is read once, its patches are applied sequentially
//! against the evolving in-memory document, the declared wrapper pairs are
//! verified to balance, and only then is the file written back atomically.
//! Every patch re-locates its target against the current content, so an
//! earlier insertion can never leave a later patch holding stale offsets.
//! Any failure aborts before the write, leaving the file byte-identical to
//! its input.

use crate::balance::{plan_close_insertion, BalanceError, WrapperPair};
use crate::config::schema::{Operation, PatchConfig, PatchDefinition, Query, Verify};
use crate::document::Document;
use crate::locate::{find_block, find_line, LocateError};
use crate::safety::WorkspaceGuard;
use crate::splice::{indent_block, Splice, SpliceError, SpliceOutcome, SpliceVerification};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result of applying a single patch
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchResult should be checked for success/failure"]
pub enum PatchResult {
    /// Patch was successfully applied
    Applied { file: PathBuf },
    /// Patch was already applied (idempotent check passed)
    AlreadyApplied { file: PathBuf },
    /// Patch failed to apply
    Failed { file: PathBuf, reason: String },
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchResult::Applied { file } => {
                write!(f, "Applied patch to {}", file.display())
            }
            PatchResult::AlreadyApplied { file } => {
                write!(f, "Already applied to {}", file.display())
            }
            PatchResult::Failed { file, reason } => {
                write!(f, "Failed on {}: {}", file.display(), reason)
            }
        }
    }
}

/// Errors during patch application
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("locate failed in {file}: {source}")]
    Locate {
        file: PathBuf,
        source: LocateError,
    },

    #[error("splice failed in {file}: {source}")]
    Splice {
        file: PathBuf,
        source: SpliceError,
    },

    #[error("balance check failed in {file}: {source}")]
    Balance {
        file: PathBuf,
        source: BalanceError,
    },

    #[error("file-level failure on {path}: {reason}")]
    File { path: PathBuf, reason: String },

    #[error("patch '{patch_id}' has invalid verification hash {value:?}")]
    InvalidHash { patch_id: String, value: String },

    #[error("patch '{patch_id}' unsupported: {reason}")]
    Unsupported { patch_id: String, reason: String },
}

/// Run mode: apply writes back on success, check never writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Apply,
    Check,
}

/// Apply a patch configuration against a workspace.
///
/// Returns one result per patch, in config order.
pub fn apply_patches(
    config: &PatchConfig,
    workspace_root: &Path,
) -> Vec<(String, Result<PatchResult, ApplicationError>)> {
    run_patches(config, workspace_root, Mode::Apply)
}

/// Evaluate patch status without mutating any file.
///
/// Mirrors `apply_patches` result semantics (`Applied` means "would apply").
pub fn check_patches(
    config: &PatchConfig,
    workspace_root: &Path,
) -> Vec<(String, Result<PatchResult, ApplicationError>)> {
    run_patches(config, workspace_root, Mode::Check)
}

fn run_patches(
    config: &PatchConfig,
    workspace_root: &Path,
    mode: Mode,
) -> Vec<(String, Result<PatchResult, ApplicationError>)> {
    let guard = match WorkspaceGuard::new(workspace_root) {
        Ok(guard) => guard,
        Err(e) => {
            let reason = format!("workspace guard: {e}");
            return config
                .patches
                .iter()
                .map(|patch| {
                    (
                        patch.id.clone(),
                        Err(ApplicationError::File {
                            path: workspace_root.to_path_buf(),
                            reason: reason.clone(),
                        }),
                    )
                })
                .collect();
        }
    };

    // Group patches by resolved file path; config order within a file is
    // preserved because patches on the same file are order sensitive.
    let mut patches_by_file: HashMap<PathBuf, Vec<&PatchDefinition>> = HashMap::new();
    for patch in &config.patches {
        let file_path = if config.meta.workspace_relative {
            workspace_root.join(&patch.file)
        } else {
            PathBuf::from(&patch.file)
        };
        patches_by_file.entry(file_path).or_default().push(patch);
    }

    let mut all_results = Vec::new();
    for (file_path, patches) in patches_by_file {
        all_results.extend(run_file_patches(&guard, &file_path, &patches, mode));
    }

    // Restore config.patches order — HashMap iteration is unordered.
    let patch_order: HashMap<&str, usize> = config
        .patches
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.as_str(), i))
        .collect();
    all_results.sort_by_key(|(id, _)| patch_order.get(id.as_str()).copied().unwrap_or(usize::MAX));

    all_results
}

/// What a patch computation decided for the current document state.
enum Computed {
    Splice(Splice),
    AlreadyApplied,
}

fn run_file_patches(
    guard: &WorkspaceGuard,
    file_path: &Path,
    patches: &[&PatchDefinition],
    mode: Mode,
) -> Vec<(String, Result<PatchResult, ApplicationError>)> {
    let fan_out = |reason: String| -> Vec<(String, Result<PatchResult, ApplicationError>)> {
        patches
            .iter()
            .map(|patch| {
                (
                    patch.id.clone(),
                    Err(ApplicationError::File {
                        path: file_path.to_path_buf(),
                        reason: reason.clone(),
                    }),
                )
            })
            .collect()
    };

    let canonical = match guard.validate_path(file_path) {
        Ok(path) => path,
        Err(e) => return fan_out(e.to_string()),
    };

    let mut document = match Document::read(&canonical) {
        Ok(doc) => doc,
        Err(e) => return fan_out(e.to_string()),
    };

    let original = document.content().to_string();
    let mut current = original.clone();
    let mut results = Vec::with_capacity(patches.len());
    let mut balance_pairs: Vec<WrapperPair> = Vec::new();
    let mut aborted = false;

    for patch in patches {
        if aborted {
            results.push((
                patch.id.clone(),
                Ok(PatchResult::Failed {
                    file: file_path.to_path_buf(),
                    reason: "skipped: earlier patch on this file failed".to_string(),
                }),
            ));
            continue;
        }

        if let Some(pair) = &patch.balance {
            if !balance_pairs.contains(pair) {
                balance_pairs.push(pair.clone());
            }
        }

        match compute_patch(patch, file_path, &current) {
            Ok(Computed::AlreadyApplied) => {
                results.push((
                    patch.id.clone(),
                    Ok(PatchResult::AlreadyApplied {
                        file: file_path.to_path_buf(),
                    }),
                ));
            }
            Ok(Computed::Splice(splice)) => match splice.apply_to(&current) {
                Ok(SpliceOutcome::Applied(next)) => {
                    current = next;
                    results.push((
                        patch.id.clone(),
                        Ok(PatchResult::Applied {
                            file: file_path.to_path_buf(),
                        }),
                    ));
                }
                Ok(SpliceOutcome::AlreadyApplied(next)) => {
                    current = next;
                    results.push((
                        patch.id.clone(),
                        Ok(PatchResult::AlreadyApplied {
                            file: file_path.to_path_buf(),
                        }),
                    ));
                }
                Err(source) => {
                    aborted = true;
                    results.push((
                        patch.id.clone(),
                        Err(ApplicationError::Splice {
                            file: file_path.to_path_buf(),
                            source,
                        }),
                    ));
                }
            },
            Err(e) => {
                aborted = true;
                results.push((patch.id.clone(), Err(e)));
            }
        }
    }

    if aborted {
        return results;
    }

    // Post-transform validity check: declared wrapper pairs must balance
    // over the final document or nothing is written.
    for pair in &balance_pairs {
        if let Err(source) = pair.verify(&current) {
            return patches
                .iter()
                .map(|patch| {
                    (
                        patch.id.clone(),
                        Err(ApplicationError::Balance {
                            file: file_path.to_path_buf(),
                            source: source.clone(),
                        }),
                    )
                })
                .collect();
        }
    }

    if mode == Mode::Apply && current != original {
        document.set_content(current);
        if let Err(e) = document.write_back() {
            return fan_out(e.to_string());
        }
    }

    results
}

/// Compute the splice for a patch against the current document content, or
/// decide the patch is already applied. Pure; never touches disk.
fn compute_patch(
    patch: &PatchDefinition,
    file_path: &Path,
    content: &str,
) -> Result<Computed, ApplicationError> {
    let locate_err = |source: LocateError| ApplicationError::Locate {
        file: file_path.to_path_buf(),
        source,
    };

    match (&patch.query, &patch.operation) {
        (Query::Block { search }, Operation::Replace { text }) => {
            // Idempotency: the search block is gone but the replacement is
            // present, so a previous run already applied this patch.
            if !content.contains(search.as_str()) && content.contains(text.as_str()) {
                return Ok(Computed::AlreadyApplied);
            }

            let span = find_block(content, search).map_err(locate_err)?;
            let verification = build_verification(patch, search)?;
            Ok(Computed::Splice(Splice::with_verification(
                span.byte_start,
                span.byte_end,
                text.clone(),
                verification,
            )))
        }

        (Query::Block { search }, Operation::InsertAfter { text, indent }) => {
            let payload = indent_block(text, indent);
            if content.contains(&payload) {
                return Ok(Computed::AlreadyApplied);
            }
            let span = find_block(content, search).map_err(locate_err)?;
            Ok(Computed::Splice(Splice::insert_at(
                span.byte_end,
                format!("\n{payload}"),
            )))
        }

        (Query::Block { search }, Operation::InsertBefore { text, indent }) => {
            let payload = indent_block(text, indent);
            if content.contains(&payload) {
                return Ok(Computed::AlreadyApplied);
            }
            let span = find_block(content, search).map_err(locate_err)?;
            Ok(Computed::Splice(Splice::insert_at(
                span.byte_start,
                format!("{payload}\n"),
            )))
        }

        (Query::Line { marker, floor }, Operation::InsertAfter { text, indent }) => {
            let payload = indent_block(text, indent);
            if content.contains(&payload) {
                return Ok(Computed::AlreadyApplied);
            }
            let hit = find_line(content, marker, *floor).map_err(locate_err)?;
            let pos = hit.insertion_point_after(content);
            // A final line without a trailing newline needs the break first,
            // or the payload would be glued onto the matched line.
            let inserted = if pos == content.len() && !content.ends_with('\n') {
                format!("\n{payload}")
            } else {
                format!("{payload}\n")
            };
            Ok(Computed::Splice(Splice::insert_at(pos, inserted)))
        }

        (Query::Line { marker, floor }, Operation::InsertBefore { text, indent }) => {
            let payload = indent_block(text, indent);
            if content.contains(&payload) {
                return Ok(Computed::AlreadyApplied);
            }
            let hit = find_line(content, marker, *floor).map_err(locate_err)?;
            Ok(Computed::Splice(Splice::insert_at(
                hit.byte_start,
                format!("{payload}\n"),
            )))
        }

        (
            Query::Line { marker, floor },
            Operation::CloseWrapper {
                close_marker,
                boundary_marker,
                text,
                window,
            },
        ) => {
            let hit = find_line(content, marker, *floor).map_err(locate_err)?;

            if close_token_present(content, hit.line_index, *window, text, boundary_marker) {
                return Ok(Computed::AlreadyApplied);
            }

            let splice = plan_close_insertion(
                content,
                hit.line_index,
                *window,
                close_marker,
                boundary_marker,
                text,
            )
            .map_err(|source| ApplicationError::Balance {
                file: file_path.to_path_buf(),
                source,
            })?;
            Ok(Computed::Splice(splice))
        }

        (Query::Line { .. }, Operation::Replace { .. }) => Err(ApplicationError::Unsupported {
            patch_id: patch.id.clone(),
            reason: "replace requires a block query".to_string(),
        }),

        (Query::Block { .. }, Operation::CloseWrapper { .. }) => {
            Err(ApplicationError::Unsupported {
                patch_id: patch.id.clone(),
                reason: "close-wrapper requires a line query".to_string(),
            })
        }
    }
}

/// Idempotency probe for close-wrapper: within the window past the start
/// line, is the close token already sitting on its own line immediately
/// before a boundary line?
fn close_token_present(
    content: &str,
    from_line: usize,
    window: usize,
    token_line: &str,
    boundary_marker: &str,
) -> bool {
    let lines: Vec<&str> = content.split('\n').collect();
    let end = (from_line + window).min(lines.len().saturating_sub(1));
    (from_line..end).any(|i| {
        lines[i].trim() == token_line.trim() && lines[i + 1].contains(boundary_marker)
    })
}

/// Build the before-text verification for a patch, defaulting to an exact
/// match on the located search text.
fn build_verification(
    patch: &PatchDefinition,
    default_expected: &str,
) -> Result<SpliceVerification, ApplicationError> {
    match &patch.verify {
        Some(Verify::ExactMatch { expected_text }) => {
            Ok(SpliceVerification::ExactMatch(expected_text.clone()))
        }
        Some(Verify::Hash { expected }) => {
            let hash = u64::from_str_radix(expected.trim_start_matches("0x"), 16).map_err(|_| {
                ApplicationError::InvalidHash {
                    patch_id: patch.id.clone(),
                    value: expected.clone(),
                }
            })?;
            Ok(SpliceVerification::Hash(hash))
        }
        None => Ok(SpliceVerification::ExactMatch(default_expected.to_string())),
    }
}
