//! Artifact store: write modes, queries and report round-trip.

use sentinel_core::{
    config::GeneratorConfig,
    edge_cases::EdgeCaseTable,
    engine::{Generator, RunOutput, RunRequest},
    store::{ArtifactCounts, ArtifactStore, WriteMode},
};

fn store() -> ArtifactStore {
    let store = ArtifactStore::in_memory().expect("in-memory db");
    store.migrate().expect("migrate");
    store
}

fn output(seed: u64, population: usize) -> (Generator, RunOutput) {
    let generator = Generator::new(GeneratorConfig::default()).expect("default registry");
    let output = generator.run(&RunRequest::new(seed, population)).expect("run");
    (generator, output)
}

fn write(store: &mut ArtifactStore, run_id: &str, seed: u64, mode: WriteMode) -> ArtifactCounts {
    let (generator, out) = output(seed, 120);
    store
        .write_run(run_id, generator.registry().config(), &out.dataset, out.report.as_ref(), mode)
        .expect("write run")
}

#[test]
fn full_rebuild_stores_every_artifact() {
    let mut store = store();
    let (generator, out) = output(42, 150);
    let counts = store
        .write_run("run-a", generator.registry().config(), &out.dataset, out.report.as_ref(), WriteMode::FullRebuild)
        .expect("write");

    assert_eq!(counts.players, 150);
    assert_eq!(counts.bets, out.dataset.bets.len());
    assert_eq!(counts.assessments, out.dataset.assessments.len());
    assert_eq!(store.counts("run-a").expect("counts"), counts);
    assert_eq!(store.run_seed("run-a").expect("seed"), Some(42));
    assert_eq!(store.players("run-a").expect("players").len(), 150);
}

#[test]
fn append_keeps_earlier_runs_and_rebuild_wipes_them() {
    let mut store = store();
    write(&mut store, "run-1", 1, WriteMode::FullRebuild);
    write(&mut store, "run-2", 2, WriteMode::Append);
    assert_eq!(store.run_ids().expect("ids"), vec!["run-1".to_string(), "run-2".to_string()]);

    write(&mut store, "run-3", 3, WriteMode::FullRebuild);
    assert_eq!(store.run_ids().expect("ids"), vec!["run-3".to_string()]);
    assert_eq!(store.counts("run-1").expect("counts"), ArtifactCounts::default());
}

#[test]
fn appending_an_existing_run_id_fails_and_leaves_it_intact() {
    let mut store = store();
    let before = write(&mut store, "run-x", 5, WriteMode::FullRebuild);

    let (generator, out) = output(6, 120);
    let result = store.write_run(
        "run-x",
        generator.registry().config(),
        &out.dataset,
        out.report.as_ref(),
        WriteMode::Append,
    );
    assert!(result.is_err());
    assert_eq!(store.counts("run-x").expect("counts"), before);
    assert_eq!(store.run_seed("run-x").expect("seed"), Some(5));
}

#[test]
fn bets_come_back_in_timestamp_order() {
    let mut store = store();
    let (generator, out) = output(11, 120);
    store
        .write_run("run-o", generator.registry().config(), &out.dataset, None, WriteMode::FullRebuild)
        .expect("write");

    let pid = &out.dataset.players[7].player_id;
    let rows = store.bets_for_player("run-o", pid).expect("bets");
    assert_eq!(rows.len(), out.dataset.bets_for(pid).count());
    assert!(rows.windows(2).all(|w| w[0].bet_timestamp <= w[1].bet_timestamp));
    assert!(rows.iter().all(|r| &r.player_id == pid));
    assert!(store.validation_report("run-o").expect("report").is_none());
}

#[test]
fn validation_report_round_trips() {
    let mut store = store();
    let (generator, out) = output(21, 120);
    store
        .write_run("run-r", generator.registry().config(), &out.dataset, out.report.as_ref(), WriteMode::FullRebuild)
        .expect("write");
    let stored = store.validation_report("run-r").expect("query").expect("report stored");
    let original = out.report.expect("validated run");

    assert_eq!(stored.passed(), original.passed());
    assert_eq!(stored.null_sport_count, original.null_sport_count);
    assert_eq!(stored.render(), original.render());
    assert_eq!(stored.correlations.len(), original.correlations.len());
    for (a, b) in stored.correlations.iter().zip(&original.correlations) {
        assert_eq!((a.trait_dim, a.metric, a.sample_size), (b.trait_dim, b.metric, b.sample_size));
    }
}

#[test]
fn missing_assessment_reads_back_as_none() {
    let mut store = store();
    let (generator, out) = output(8, 400);
    store
        .write_run("run-m", generator.registry().config(), &out.dataset, None, WriteMode::FullRebuild)
        .expect("write");

    let table = EdgeCaseTable::standard();
    let absent = table.find("NO_ASSESSMENT").expect("entry").player_id();
    let present = table.find("ALWAYS_WIN").expect("entry").player_id();
    assert!(store.assessment("run-m", &absent).expect("query").is_none());
    assert!(store.assessment("run-m", &present).expect("query").is_some());
    assert!(store.assessment("run-m", "PLR_9999_MA").expect("query").is_none());
}

#[test]
fn file_backed_store_opens_in_wal_mode() {
    let path = std::env::temp_dir().join(format!("sentinel-store-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let path_str = path.to_str().expect("utf-8 temp path");

    let mut store = ArtifactStore::open(path_str).expect("open file db");
    store.migrate().expect("migrate");
    let counts = write(&mut store, "run-f", 13, WriteMode::FullRebuild);
    assert_eq!(counts.players, 120);
    drop(store);

    let reopened = ArtifactStore::open(path_str).expect("reopen file db");
    assert_eq!(reopened.counts("run-f").expect("counts"), counts);
    drop(reopened);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path_str}{suffix}"));
    }
}
