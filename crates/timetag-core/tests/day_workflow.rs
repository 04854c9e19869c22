use chrono::{Duration, NaiveDate, NaiveDateTime};
use tempfile::TempDir;
use timetag_core::tagging::{clamp_candidate, fill_gap};
use timetag_core::{Database, Interval, ProbeResult, Settings, TimeTagError, Viewport};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 1).expect("valid date")
}

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    date().and_hms_opt(h, m, s).expect("valid time")
}

fn setup() -> (TempDir, Database) {
    let dir = TempDir::new().expect("temp dir");
    let db = Database::open(&dir.path().join("timetag.db")).expect("open database");
    (dir, db)
}

fn sample(db: &mut Database, settings: &Settings, probe: &ProbeResult, now: NaiveDateTime) {
    let window = db
        .get_or_create_window(&probe.identity(settings.log_application_path))
        .expect("window");
    db.record_window_sample(window.id, now, settings.max_delta())
        .expect("logged sample");
    db.record_activity_sample(
        settings.is_active(probe.idle_seconds, probe.locked),
        now,
        settings.max_delta(),
    )
    .expect("activity sample");
}

fn editor() -> ProbeResult {
    ProbeResult {
        window_title: Some("main.rs - editor".to_owned()),
        application_name: Some("editor".to_owned()),
        application_path: Some("/usr/bin/editor".to_owned()),
        idle_seconds: 0,
        locked: false,
    }
}

#[test]
fn watcher_samples_produce_gapless_day() {
    let (_dir, mut db) = setup();
    let settings = Settings::default();
    let browser = ProbeResult {
        window_title: Some("docs".to_owned()),
        application_name: Some("browser".to_owned()),
        application_path: None,
        ..editor()
    };
    let locked = ProbeResult {
        locked: true,
        ..browser.clone()
    };

    for secs in 0..5 {
        sample(&mut db, &settings, &editor(), at(9, 0, secs));
    }
    for secs in 5..8 {
        sample(&mut db, &settings, &browser, at(9, 0, secs));
    }
    sample(&mut db, &settings, &locked, at(9, 0, 9));

    let day = db.entries_for_date(date()).expect("entries");
    assert_eq!(day.logged.len(), 2);
    assert_eq!(day.logged[0].stop, day.logged[1].start);
    assert_eq!(day.logged[1].application_window.application.path.path, "N/A");

    assert_eq!(day.activity.len(), 2);
    assert!(day.activity[0].active);
    assert!(!day.activity[1].active);
    assert_eq!(day.activity[0].stop, day.activity[1].start);
}

#[test]
fn drawn_tags_merge_into_one_block() {
    let (_dir, mut db) = setup();
    let viewport = Viewport::full_day(date(), 1000.0, 20.0);

    db.tag(
        Interval::new(at(9, 0, 0), at(10, 0, 0)).expect("interval"),
        "Coding",
        None,
    )
    .expect("tag");
    db.tag(
        Interval::new(at(11, 0, 0), at(12, 0, 0)).expect("interval"),
        "Coding",
        None,
    )
    .expect("tag");

    let existing: Vec<Interval> = db
        .tagged_by_date(date())
        .expect("tagged")
        .iter()
        .map(|entry| entry.interval())
        .collect();

    // dragging from inside the first block across the second one
    let drawn = clamp_candidate(at(9, 55, 0), at(11, 30, 0), &existing);
    assert_eq!(drawn, Interval::new(at(10, 0, 0), at(11, 0, 0)).unwrap());

    let gap = fill_gap(at(10, 30, 0), &existing, &viewport.interval()).expect("gap");
    assert_eq!(gap, drawn);

    let merged = db.tag(drawn, "Coding", None).expect("tag");
    assert_eq!((merged.start, merged.stop), (at(9, 0, 0), at(12, 0, 0)));
    assert_eq!(db.tagged_by_date(date()).expect("tagged").len(), 1);
    assert_eq!(db.category_statistics("Coding", None).expect("stats"), 3 * 3600);
}

#[test]
fn second_handle_sees_committed_rows() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("timetag.db");
    let mut watcher = Database::open(&path).expect("open watcher");
    let reader = Database::open(&path).expect("open reader");

    watcher
        .record_activity_sample(true, at(8, 0, 0), Duration::seconds(10))
        .expect("sample");

    let latest = reader
        .latest_activity_entry()
        .expect("latest")
        .expect("present");
    assert_eq!(latest.start, at(8, 0, 0));
}

#[test]
fn hierarchy_guards_leave_store_untouched() {
    let (_dir, mut db) = setup();
    let review = db
        .get_or_create_category("Work", Some("Review"))
        .expect("category");
    let work_id = review.parent_id.expect("sub category");
    let before = db.category_tree().expect("tree");

    assert!(matches!(
        db.delete_category(work_id),
        Err(TimeTagError::CategoryHasChildren(_))
    ));
    let after = db.category_tree().expect("tree");
    assert_eq!(before.len(), after.len());
    assert_eq!(after[0].children.len(), 1);
}
