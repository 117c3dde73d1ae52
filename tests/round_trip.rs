use goalkeeper::io::store_io::GoalFile;
use goalkeeper::model::{Goal, GoalStore, UserOptions};
use goalkeeper::parse::{FormatError, parse_goals, serialize_goals};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Helper: load a fixture file, parse it, serialize it, and assert byte-for-byte equality
fn assert_goal_round_trip(fixture_name: &str) {
    let source = fs::read_to_string(fixture(fixture_name))
        .unwrap_or_else(|e| panic!("Could not read fixture {}: {}", fixture_name, e));

    let parsed = parse_goals(&source);
    assert_eq!(parsed.error, None, "fixture {} did not parse", fixture_name);
    let output = serialize_goals(&parsed.goals).unwrap();

    assert_eq!(
        output, source,
        "Round-trip failed for fixture: {}",
        fixture_name
    );
}

fn live_goals(store: &GoalStore) -> Vec<Goal> {
    store.active().map(|(_, g)| g.clone()).collect()
}

fn listing(store: &GoalStore) -> String {
    let mut out = Vec::new();
    store.print_range(&mut out, 0, usize::MAX, false).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_canonical_round_trip() {
    assert_goal_round_trip("canonical.xml");
}

#[test]
fn test_sample_loads_without_duplicates() {
    let mut store = GoalStore::new();
    let report = GoalFile::new(fixture("sample.xml")).load(&mut store);
    assert!(report.is_complete());
    assert_eq!(report.loaded, 3);
    assert_eq!(store.size(), 3);

    store.refresh(&UserOptions::default());
    assert_eq!(
        listing(&store),
        concat!(
            "                             Sample goal      100          50       0.01\n",
            "                        Create Goals app      100          10       0.1\n",
            "                  Pass All tests at 100%      100         100       0.01\n",
        )
    );
}

#[test]
fn test_sample_normalizes_to_canonical() {
    let tmp = tempfile::TempDir::new().unwrap();
    let mut store = GoalStore::new();
    GoalFile::new(fixture("sample.xml")).load(&mut store);

    // Saving only writes when something changed
    store.mark_dirty();
    let target = GoalFile::new(tmp.path().join("goals.xml"));
    target.save(&mut store).unwrap();

    let written = fs::read_to_string(target.path()).unwrap();
    let canonical = fs::read_to_string(fixture("canonical.xml")).unwrap();
    assert_eq!(written, canonical);
}

#[test]
fn test_save_reload_keeps_order() {
    let tmp = tempfile::TempDir::new().unwrap();
    let file = GoalFile::new(tmp.path().join("goals.xml"));

    let mut store = GoalStore::new();
    for (name, p, c, u) in [
        ("zeta", 3, 30, 0.5),
        ("alpha", 1, 10, 2.25),
        ("mid", 2, 20, 1e-3),
    ] {
        store.insert(Goal::new(name, p, c, u)).unwrap();
    }
    file.save(&mut store).unwrap();

    let mut reloaded = GoalStore::new();
    assert_eq!(file.load(&mut reloaded).loaded, 3);
    assert_eq!(live_goals(&reloaded), live_goals(&store));
}

#[test]
fn test_unterminated_second_block_keeps_first() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("goals.xml");
    let canonical = fs::read_to_string(fixture("canonical.xml")).unwrap();
    // Drop the second block's closing tag
    let broken = canonical.replacen("\t</goal>\n\t<goal>\n\t\t<name>Pass", "\t<goal>\n\t\t<name>Pass", 1);
    fs::write(&path, &broken).unwrap();

    let mut store = GoalStore::new();
    let report = GoalFile::new(&path).load(&mut store);
    assert_eq!(report.loaded, 1);
    assert!(report.error.is_some());
    assert_eq!(
        live_goals(&store),
        vec![Goal::new("Sample goal", 100, 50, 0.01)]
    );

    let parsed = parse_goals(&broken);
    // The stray <goal> is read as a field of the open block
    assert!(matches!(
        parsed.error,
        Some(FormatError::UnknownField { line: 14, .. })
    ));
}

#[test]
fn test_delete_save_reload_frees_name() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("goals.xml");
    fs::copy(fixture("canonical.xml"), &path).unwrap();
    let file = GoalFile::new(&path);

    let mut store = GoalStore::new();
    file.load(&mut store);
    let mut opts = UserOptions::default();
    opts.set_sort_prefs("na").unwrap();
    store.refresh(&opts);

    // "Create Goals app" sorts first by name
    let removed = store.delete(0).unwrap();
    assert_eq!(removed.name, "Create Goals app");
    file.save(&mut store).unwrap();

    let mut reloaded = GoalStore::new();
    assert_eq!(file.load(&mut reloaded).loaded, 2);
    assert_eq!(reloaded.find_name("Create Goals app"), None);
    reloaded
        .insert(Goal::new("Create Goals app", 10, 0, 0.2))
        .unwrap();
    assert_eq!(reloaded.active_count(), 3);
}

#[test]
fn test_duplicate_insert_after_load() {
    let mut store = GoalStore::new();
    GoalFile::new(fixture("canonical.xml")).load(&mut store);
    assert!(store.insert(Goal::new("Sample goal", 1, 1, 1.0)).is_err());
    assert_eq!(store.size(), 3);
    assert_eq!(store.active_count(), 3);
    assert!(!store.is_dirty());
}
