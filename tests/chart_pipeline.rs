//! End-to-end pipeline test for the averaging-controls insertion.
//!
//! A known "before" component goes through the insert + balance pipeline and
//! must come out with the opening fragment token after the timeline
//! conditional, the controls block before the original `<div>`, and the
//! matching closing token before the conditional's `)}` — all verified by
//! exact substring checks.

use fragment_patcher::config::{apply_patches, load_from_str, PatchResult};
use std::fs;
use tempfile::TempDir;

const CHART_BEFORE: &str = r#"export const HistoricalChart = (props) => {
    return (
        <div className="chart-root">
               <div className="flex justify-end items-center gap-4 mt-4">
                    {hasChartData && <button onClick={onResetView} className="text-sm text-secondary hover:underline">Reset View</button>}
                    {chartView === 'timeline' && (
                       <div className="relative" ref={metricConfigRef}>
                           <button>Configure Metrics</button>
                           {metricConfigOpen && (
                               <div className="menu">
                                   <span>metric list</span>
                               </div>
                           )}
                       </div>
                    )}
                    <button onClick={onGenerate}>Generate</button>
               </div>
        </div>
    );
};
"#;

/// Two whole-string replaces: splice in the controls plus the opening
/// fragment token, then rebalance the close at the conditional boundary.
/// Both declare the fragment pair so an unbalanced result can never be
/// written.
const PIPELINE_CONFIG: &str = r#"
[meta]
name = "chart-averaging-controls"
description = "Insert data-averaging controls into the timeline toolbar"
workspace_relative = true

[[patches]]
id = "insert-controls"
file = "components/HistoricalChart.tsx"

[patches.query]
type = "block"
search = """
                    {chartView === 'timeline' && (
                       <div className="relative" ref={metricConfigRef}>"""

[patches.operation]
type = "replace"
text = """
                    {chartView === 'timeline' && (
                       <>
                           {/* Data Averaging Controls */}
                           <div className="flex items-center gap-3 border-r border-gray-600 pr-4">
                               <label className="flex items-center space-x-2 text-sm text-gray-300 cursor-pointer">
                                   <input type="checkbox" checked={averagingEnabled} />
                                   <span>Data Averaging</span>
                               </label>
                               {averagingEnabled && (
                                   <select value={manualBucketSize || 'auto'}>
                                       <option value="auto">Auto (Zoom-based)</option>
                                       <option value="raw">No Averaging</option>
                                   </select>
                               )}
                           </div>
                           <div className="relative" ref={metricConfigRef}>"""

[patches.balance]
open = "<>"
close = "</>"

[[patches]]
id = "close-fragment"
file = "components/HistoricalChart.tsx"

[patches.query]
type = "block"
search = """
                       </div>
                    )}
                    <button onClick={onGenerate}"""

[patches.operation]
type = "replace"
text = """
                       </div>
                       </>
                    )}
                    <button onClick={onGenerate}"""

[patches.balance]
open = "<>"
close = "</>"
"#;

/// The exact document the pipeline must produce from `CHART_BEFORE`.
const CHART_AFTER: &str = r#"export const HistoricalChart = (props) => {
    return (
        <div className="chart-root">
               <div className="flex justify-end items-center gap-4 mt-4">
                    {hasChartData && <button onClick={onResetView} className="text-sm text-secondary hover:underline">Reset View</button>}
                    {chartView === 'timeline' && (
                       <>
                           {/* Data Averaging Controls */}
                           <div className="flex items-center gap-3 border-r border-gray-600 pr-4">
                               <label className="flex items-center space-x-2 text-sm text-gray-300 cursor-pointer">
                                   <input type="checkbox" checked={averagingEnabled} />
                                   <span>Data Averaging</span>
                               </label>
                               {averagingEnabled && (
                                   <select value={manualBucketSize || 'auto'}>
                                       <option value="auto">Auto (Zoom-based)</option>
                                       <option value="raw">No Averaging</option>
                                   </select>
                               )}
                           </div>
                           <div className="relative" ref={metricConfigRef}>
                           <button>Configure Metrics</button>
                           {metricConfigOpen && (
                               <div className="menu">
                                   <span>metric list</span>
                               </div>
                           )}
                       </div>
                       </>
                    )}
                    <button onClick={onGenerate}>Generate</button>
               </div>
        </div>
    );
};
"#;

fn setup_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let component = dir.path().join("components/HistoricalChart.tsx");
    fs::create_dir_all(component.parent().unwrap()).unwrap();
    fs::write(&component, CHART_BEFORE).unwrap();
    dir
}

#[test]
fn test_pipeline_inserts_controls_and_balances_fragment() {
    let dir = setup_workspace();
    let config = load_from_str(PIPELINE_CONFIG).unwrap();

    let results = apply_patches(&config, dir.path());
    for (id, result) in &results {
        assert!(
            matches!(result, Ok(PatchResult::Applied { .. })),
            "patch {id} did not apply: {result:?}"
        );
    }

    let after = fs::read_to_string(dir.path().join("components/HistoricalChart.tsx")).unwrap();

    // Opening fragment token immediately after the conditional
    assert!(after.contains("{chartView === 'timeline' && (\n                       <>"));

    // Controls block sits before the original relative div
    let controls_pos = after.find("Data Averaging Controls").unwrap();
    let relative_div_pos = after
        .find("<div className=\"relative\" ref={metricConfigRef}>")
        .unwrap();
    assert!(controls_pos < relative_div_pos);

    // Closing token immediately before the conditional's `)}`
    assert!(after.contains(
        "                       </>\n                    )}\n                    <button onClick={onGenerate}"
    ));

    // Fragment tokens balance over the whole document
    let opens = after.replace("</>", "\u{0}").matches("<>").count();
    let closes = after.matches("</>").count();
    assert_eq!(opens, closes);
    assert_eq!(opens, 1);

    // Untouched surroundings survive verbatim
    assert!(after.contains("Reset View"));
    assert!(after.contains("<button onClick={onGenerate}>Generate</button>"));

    // The net effect on the fixed input is a deterministic function: the
    // whole output matches the expected document byte for byte
    assert_eq!(after, CHART_AFTER);
}

#[test]
fn test_pipeline_is_deterministic_and_idempotent() {
    let dir = setup_workspace();
    let config = load_from_str(PIPELINE_CONFIG).unwrap();

    let first = apply_patches(&config, dir.path());
    assert!(first
        .iter()
        .all(|(_, r)| matches!(r, Ok(PatchResult::Applied { .. }))));
    let after_first =
        fs::read_to_string(dir.path().join("components/HistoricalChart.tsx")).unwrap();

    let second = apply_patches(&config, dir.path());
    assert!(second
        .iter()
        .all(|(_, r)| matches!(r, Ok(PatchResult::AlreadyApplied { .. }))));
    let after_second =
        fs::read_to_string(dir.path().join("components/HistoricalChart.tsx")).unwrap();

    assert_eq!(after_first, after_second);
}

#[test]
fn test_pipeline_aborts_cleanly_on_drifted_component() {
    let dir = TempDir::new().unwrap();
    let component = dir.path().join("components/HistoricalChart.tsx");
    fs::create_dir_all(component.parent().unwrap()).unwrap();

    // The component drifted: the metric-config div was renamed
    let drifted = CHART_BEFORE.replace("ref={metricConfigRef}", "ref={configRef}");
    fs::write(&component, &drifted).unwrap();

    let config = load_from_str(PIPELINE_CONFIG).unwrap();
    let results = apply_patches(&config, dir.path());

    assert!(results[0].1.is_err());
    // The document must be byte-identical to the input
    assert_eq!(fs::read_to_string(&component).unwrap(), drifted);
}
