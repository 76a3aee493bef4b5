use super::support::{hash, manifest_text, rows, write_manifest, RemovedItems, Script, ScriptedAcquirer};
use super::IntegrationHarness;
use anyhow::Result;
use modverify::acquisition::ExistenceCheck;
use modverify::manifest::{ManifestResolver, ManifestStore};
use modverify::verification::{RunOptions, RunState, VerificationRunner, VerificationStatus};
use modverify::VerificationSummary;
use serde_json::{json, Value};
use std::fs;

fn run_with(
    harness: &IntegrationHarness,
    acquirer: &ScriptedAcquirer,
    existence: &dyn ExistenceCheck,
    status: &VerificationStatus,
    options: RunOptions,
) -> Result<VerificationSummary> {
    let resolver = ManifestResolver::new(
        ManifestStore::open(harness.depot_dir()),
        acquirer,
        existence,
        harness.options(),
    );
    let mut runner = VerificationRunner::new(resolver, status.clone(), options);
    runner.run_file(&harness.job_path())
}

fn run(harness: &IntegrationHarness, acquirer: &ScriptedAcquirer) -> Result<VerificationSummary> {
    run_with(
        harness,
        acquirer,
        &RemovedItems::default(),
        &VerificationStatus::new(),
        RunOptions::default(),
    )
}

fn verification(job: &Value, idx: usize) -> &Value {
    &job["entries"][idx]["verification"]
}

fn percentage(value: &Value) -> f64 {
    value["matchPercentage"].as_f64().expect("matchPercentage is a number")
}

#[test]
fn half_of_original_found_in_suspect() {
    let harness = IntegrationHarness::new();
    harness.write_job(&json!({
        "trackedMods": [{ "modId": "modA", "workshopId": "8001" }],
        "entries": [{ "workshopId": "9001", "title": "Reupload", "containsModIds": ["modA"] }]
    }));
    let acquirer = ScriptedAcquirer::new(&harness.depot_dir())
        .script(
            "8001",
            Script::Manifest(rows(&[(hash('a', 'a'), "one.lua"), (hash('b', 'b'), "two.lua")])),
        )
        .script(
            "9001",
            Script::Manifest(rows(&[(hash('a', 'a'), "renamed.lua"), (hash('f', 'f'), "new.lua")])),
        );

    let summary = run(&harness, &acquirer).unwrap();
    assert_eq!(summary.verified, 1);
    assert_eq!(summary.medium, 1);

    let job = harness.read_job();
    let v = verification(&job, 0);
    assert_eq!(v["verified"], true);
    assert_eq!(percentage(v), 50.0);
    assert_eq!(v["matchedFiles"], 1);
    assert_eq!(v["totalFiles"], 2);
    assert!(v["verifiedDate"].is_string());
    let per_mod = &v["modResults"]["modA"];
    assert_eq!(percentage(per_mod), 50.0);
    assert_eq!(per_mod["sampleMatches"], json!(["one.lua"]));
    assert_eq!(acquirer.calls(), vec!["8001".to_string(), "9001".to_string()]);
}

#[test]
fn overall_percentage_is_weighted_by_files() {
    let harness = IntegrationHarness::new();
    harness.write_job(&json!({
        "trackedMods": [
            { "modId": "modA", "workshopId": "8001" },
            { "modId": "modB", "workshopId": "8002" }
        ],
        "entries": [{ "workshopId": "9001", "containsModIds": ["modA", "modB", "modA"] }]
    }));
    let acquirer = ScriptedAcquirer::new(&harness.depot_dir())
        .script(
            "8001",
            Script::Manifest(rows(&[(hash('a', 'a'), "a1"), (hash('a', 'b'), "a2")])),
        )
        .script(
            "8002",
            Script::Manifest(rows(&[
                (hash('b', 'a'), "b1"),
                (hash('b', 'b'), "b2"),
                (hash('b', 'c'), "b3"),
            ])),
        )
        .script(
            "9001",
            Script::Manifest(rows(&[(hash('a', 'a'), "x"), (hash('b', 'a'), "y")])),
        );

    run(&harness, &acquirer).unwrap();

    let job = harness.read_job();
    let v = verification(&job, 0);
    assert_eq!(percentage(v), 40.0);
    assert_eq!(v["matchedFiles"], 2);
    assert_eq!(v["totalFiles"], 5);
    assert_eq!(percentage(&v["modResults"]["modA"]), 50.0);
    assert_eq!(percentage(&v["modResults"]["modB"]), 33.3);
    assert_eq!(v["modResults"].as_object().unwrap().len(), 2);
}

#[test]
fn unresolved_original_contributes_nothing() {
    let harness = IntegrationHarness::new();
    harness.write_job(&json!({
        "trackedMods": [{ "modId": "modA", "workshopId": "8001" }],
        "entries": [{ "workshopId": "9001", "containsModIds": ["modA", "modUntracked"] }]
    }));
    let acquirer = ScriptedAcquirer::new(&harness.depot_dir())
        .script("8001", Script::Timeout)
        .script("9001", Script::Manifest(rows(&[(hash('a', 'a'), "x")])));

    let summary = run(&harness, &acquirer).unwrap();
    assert_eq!(summary.none, 1);

    let job = harness.read_job();
    let v = verification(&job, 0);
    assert_eq!(v["verified"], true);
    assert_eq!(percentage(v), 0.0);
    assert_eq!(v["totalFiles"], 0);
    assert_eq!(v["modResults"], json!({}));
}

#[test]
fn unusable_suspects_are_reported_per_entry() {
    let harness = IntegrationHarness::new();
    harness.write_job(&json!({
        "trackedMods": [{ "modId": "modA", "workshopId": "8001" }],
        "entries": [
            { "workshopId": "9001", "containsModIds": ["modA"] },
            { "workshopId": "9002", "containsModIds": ["modA"] },
            { "workshopId": "9003", "containsModIds": ["modA"] },
            { "workshopId": "9004", "containsModIds": ["modA"] }
        ]
    }));
    let acquirer = ScriptedAcquirer::new(&harness.depot_dir())
        .script("8001", Script::Manifest(rows(&[(hash('a', 'a'), "x")])))
        .script("9001", Script::Manifest(Vec::new()))
        .script("9002", Script::Silent)
        .script("9004", Script::NotSubscribed);
    let existence = RemovedItems::new(&["9003"]);

    let summary = run_with(
        &harness,
        &acquirer,
        &existence,
        &VerificationStatus::new(),
        RunOptions::default(),
    )
    .unwrap();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.verified, 0);
    assert_eq!(summary.unverified, 3);
    assert_eq!(summary.taken_down, 1);

    let job = harness.read_job();
    assert_eq!(verification(&job, 0), &json!({ "verified": false, "error": "No manifest" }));
    assert_eq!(verification(&job, 1)["error"], "Unknown error");
    assert_eq!(
        verification(&job, 2),
        &json!({ "verified": false, "error": "Item removed", "takenDown": true })
    );
    assert_eq!(verification(&job, 3)["error"], "Not subscribed");
    assert!(!acquirer.calls().contains(&"9003".to_string()));
}

#[test]
fn second_run_is_served_from_cache() {
    let harness = IntegrationHarness::new();
    harness.write_job(&json!({
        "trackedMods": [{ "modId": "modA", "workshopId": "8001" }],
        "entries": [{ "workshopId": "9001", "containsModIds": ["modA"] }]
    }));
    let first = ScriptedAcquirer::new(&harness.depot_dir())
        .script("8001", Script::Manifest(rows(&[(hash('a', 'a'), "x"), (hash('b', 'b'), "y")])))
        .script("9001", Script::Manifest(rows(&[(hash('b', 'b'), "y")])));
    run(&harness, &first).unwrap();
    let before = harness.read_job();

    let second = ScriptedAcquirer::new(&harness.depot_dir());
    run(&harness, &second).unwrap();
    let after = harness.read_job();

    assert_eq!(second.call_count(), 0);
    assert_eq!(percentage(verification(&before, 0)), percentage(verification(&after, 0)));
    assert_eq!(
        verification(&before, 0)["modResults"],
        verification(&after, 0)["modResults"]
    );
}

#[test]
fn repeated_suspect_is_acquired_once() {
    let harness = IntegrationHarness::new();
    harness.write_job(&json!({
        "trackedMods": [{ "modId": "modA", "workshopId": "8001" }],
        "entries": [
            { "workshopId": "9001", "title": "First report", "containsModIds": ["modA"] },
            { "workshopId": "9001", "title": "Second report", "containsModIds": ["modA"] }
        ]
    }));
    let acquirer = ScriptedAcquirer::new(&harness.depot_dir())
        .script("8001", Script::Manifest(rows(&[(hash('a', 'a'), "x")])))
        .script("9001", Script::Manifest(rows(&[(hash('a', 'a'), "x")])));

    let summary = run(&harness, &acquirer).unwrap();
    assert_eq!(summary.high, 2);
    assert_eq!(acquirer.calls(), vec!["8001".to_string(), "9001".to_string()]);
}

#[test]
fn pending_only_leaves_filed_entries_untouched() {
    let harness = IntegrationHarness::new();
    harness.write_job(&json!({
        "exportVersion": 2,
        "trackedMods": [{ "modId": "modA", "workshopId": "8001", "name": "Mod A" }],
        "entries": [
            {
                "workshopId": "9001",
                "containsModIds": ["modA"],
                "filedDate": "2024-03-01T10:00:00Z",
                "takenDownDate": null
            },
            {
                "workshopId": "9002",
                "containsModIds": ["modA"],
                "filedDate": null,
                "takenDownDate": null,
                "notes": "check again"
            }
        ]
    }));
    let acquirer = ScriptedAcquirer::new(&harness.depot_dir())
        .script("8001", Script::Manifest(rows(&[(hash('a', 'a'), "x")])))
        .script("9002", Script::Manifest(rows(&[(hash('c', 'c'), "z")])));

    let summary = run_with(
        &harness,
        &acquirer,
        &RemovedItems::default(),
        &VerificationStatus::new(),
        RunOptions { pending_only: true },
    )
    .unwrap();
    assert_eq!(summary.total, 1);

    let job = harness.read_job();
    assert_eq!(job["exportVersion"], 2);
    assert_eq!(job["trackedMods"][0]["name"], "Mod A");
    assert!(job["entries"][0].get("verification").is_none());
    assert_eq!(job["entries"][0]["filedDate"], "2024-03-01T10:00:00Z");
    assert_eq!(job["entries"][1]["notes"], "check again");
    assert!(job["entries"][1]["filedDate"].is_null());
    assert_eq!(verification(&job, 1)["verified"], true);
    assert!(!acquirer.calls().contains(&"9001".to_string()));
}

#[test]
fn empty_job_fails_and_leaves_record_alone() {
    let harness = IntegrationHarness::new();
    let path = harness.write_job(&json!({ "trackedMods": [], "entries": [] }));
    let original = fs::read(&path).unwrap();
    let acquirer = ScriptedAcquirer::new(&harness.depot_dir());
    let status = VerificationStatus::new();

    let err = run_with(
        &harness,
        &acquirer,
        &RemovedItems::default(),
        &status,
        RunOptions::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("No DMCA entries provided"));

    let snapshot = status.snapshot();
    assert_eq!(snapshot.state, RunState::Failed);
    assert!(snapshot.error.is_some());
    assert_eq!(fs::read(&path).unwrap(), original);
}

#[test]
fn missing_tool_is_fatal() {
    let harness = IntegrationHarness::new();
    harness.write_job(&json!({
        "trackedMods": [{ "modId": "modA", "workshopId": "8001" }],
        "entries": [{ "workshopId": "9001", "containsModIds": ["modA"] }]
    }));
    let acquirer = ScriptedAcquirer::new(&harness.depot_dir()).unavailable();

    assert!(run(&harness, &acquirer).is_err());
    assert_eq!(acquirer.call_count(), 0);
    assert!(harness.read_job()["entries"][0].get("verification").is_none());
}

#[test]
fn stop_request_halts_further_acquisitions() {
    let harness = IntegrationHarness::new();
    write_manifest(
        &harness.depot_dir(),
        "build_cached",
        "manifest_cached.txt",
        &manifest_text("9002", &rows(&[(hash('a', 'a'), "x")])),
    );
    harness.write_job(&json!({
        "trackedMods": [{ "modId": "modA", "workshopId": "8001" }],
        "entries": [
            { "workshopId": "9001", "containsModIds": ["modA"] },
            { "workshopId": "9002", "containsModIds": ["modA"] }
        ]
    }));
    let status = VerificationStatus::new();
    let acquirer = ScriptedAcquirer::new(&harness.depot_dir())
        .script("8001", Script::Manifest(rows(&[(hash('a', 'a'), "x")])))
        .script("9001", Script::Manifest(rows(&[(hash('a', 'a'), "x")])))
        .stopping(&status);

    run_with(
        &harness,
        &acquirer,
        &RemovedItems::default(),
        &status,
        RunOptions::default(),
    )
    .unwrap();

    assert_eq!(acquirer.calls(), vec!["8001".to_string()]);
    let job = harness.read_job();
    assert_eq!(verification(&job, 0)["error"], "Stopped before acquisition");
    assert_eq!(percentage(verification(&job, 1)), 100.0);
    assert_eq!(status.snapshot().state, RunState::Complete);
}

#[test]
fn unreferenced_tracked_mods_are_not_resolved() {
    let harness = IntegrationHarness::new();
    harness.write_job(&json!({
        "trackedMods": [
            { "modId": "modA", "workshopId": "8001" },
            { "modId": "modZ", "workshopId": "8009" },
            { "modId": "modNull", "workshopId": null }
        ],
        "entries": [{ "workshopId": "9001", "containsModIds": ["modA"] }]
    }));
    let acquirer = ScriptedAcquirer::new(&harness.depot_dir())
        .script("8001", Script::Manifest(rows(&[(hash('a', 'a'), "x")])))
        .script("9001", Script::Manifest(rows(&[(hash('a', 'a'), "x")])));

    run(&harness, &acquirer).unwrap();
    assert!(!acquirer.calls().contains(&"8009".to_string()));
    assert_eq!(acquirer.call_count(), 2);
}
