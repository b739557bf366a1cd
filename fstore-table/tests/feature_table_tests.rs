use std::sync::Arc;

use fstore_remote::objects::ORIGINAL_FILE;
use fstore_remote::{MemSession, Permissions, RemoteTable, TableService};
use fstore_result::Error;
use fstore_table::{FeatureTable, MetaMatch, MetaQuery, MetadataColumn};
use fstore_types::{ColumnHeader, ColumnKind, FileId, Value};

mod common;
use common::{
    ALICE, BOB, FT_SPACE, create_example, example_features, example_meta, session, session_for,
    unopened,
};

fn row(image: i64, roi: i64, x1: f64, x2: f64) -> Vec<Value> {
    vec![
        Value::Long(image),
        Value::Long(roi),
        Value::List(vec![Value::Double(x1), Value::Double(x2)]),
    ]
}

#[test]
fn replace_overwrites_the_matching_row() {
    let session = session();
    let mut table = create_example(&session, "replace");
    let file = table.file().expect("file");

    table
        .store(&[12i64.into(), (-1i64).into()], &[10.0, 20.0], true)
        .expect("first store");
    table
        .store(&[12i64.into(), (-1i64).into()], &[30.0, 40.0], true)
        .expect("replace");

    assert_eq!(
        session.table_rows(file.id).expect("rows"),
        vec![row(12, -1, 30.0, 40.0)]
    );
}

#[test]
fn replace_false_appends() {
    let session = session();
    let mut table = create_example(&session, "append");
    let file = table.file().expect("file");

    table
        .store(&[12i64.into(), (-1i64).into()], &[10.0, 20.0], true)
        .expect("first store");
    table
        .store(&[12i64.into(), (-1i64).into()], &[30.0, 40.0], false)
        .expect("append");

    assert_eq!(
        session.table_rows(file.id).expect("rows"),
        vec![row(12, -1, 10.0, 20.0), row(12, -1, 30.0, 40.0)]
    );
}

#[test]
fn replace_updates_the_last_of_several_matches() {
    let session = session();
    let mut table = create_example(&session, "last-match");
    let file = table.file().expect("file");
    let key = [Value::Long(1), Value::Long(2)];

    table.store(&key, &[1.0, 1.0], false).expect("store");
    table.store(&[3i64.into(), 4i64.into()], &[0.0, 0.0], false).expect("store");
    table.store(&key, &[2.0, 2.0], false).expect("store");
    table.store(&key, &[9.0, 9.0], true).expect("replace");

    assert_eq!(
        session.table_rows(file.id).expect("rows"),
        vec![row(1, 2, 1.0, 1.0), row(3, 4, 0.0, 0.0), row(1, 2, 9.0, 9.0)]
    );
}

#[test]
fn store_then_fetch_round_trips() {
    let session = session();
    let mut table = create_example(&session, "roundtrip");
    table
        .store(&[12i64.into(), (-1i64).into()], &[0.25, -7.5], true)
        .expect("store");
    table
        .store(&[13i64.into(), (-1i64).into()], &[1.0, 2.0], true)
        .expect("store");

    let rows = table
        .fetch_by_metadata(&MetaQuery::positional([12i64, -1]))
        .expect("fetch");
    assert_eq!(rows.len(), 1);
    let fetched = &rows[0];
    assert_eq!(fetched.values(), Some(&[0.25, -7.5][..]));
    assert_eq!(fetched.names(), Some(&example_features()[..]));
    assert_eq!(fetched.get("ImageID").expect("ImageID"), Value::Long(12));
    assert_eq!(fetched.get("x2").expect("x2"), Value::Double(-7.5));
}

#[test]
fn fetch_with_wildcards_and_alternatives() {
    let session = session();
    let mut table = create_example(&session, "queries");
    for (image, roi) in [(1, 1), (1, 2), (2, 1), (3, 3)] {
        table
            .store(&[Value::Long(image), Value::Long(roi)], &[image as f64, roi as f64], false)
            .expect("store");
    }

    let by_image = table
        .fetch_by_metadata_raw(&MetaQuery::named([("ImageID", 1i64)]))
        .expect("named");
    assert_eq!(by_image.len(), 2);

    let positional_wildcard = table
        .fetch_by_metadata_raw(&MetaQuery::Positional(vec![
            MetaMatch::Eq(Value::Null),
            1i64.into(),
        ]))
        .expect("positional");
    assert_eq!(positional_wildcard, vec![row(1, 1, 1.0, 1.0), row(2, 1, 2.0, 1.0)]);

    let any_of = table
        .fetch_by_metadata_raw(&MetaQuery::named([(
            "ImageID",
            vec![Value::Long(2), Value::Null, Value::Long(3)],
        )]))
        .expect("any of");
    assert_eq!(any_of, vec![row(2, 1, 2.0, 1.0), row(3, 3, 3.0, 3.0)]);

    let everything = table
        .fetch_by_metadata(&MetaQuery::positional([Value::Null, Value::Null]))
        .expect("all");
    assert_eq!(everything.len(), 4);

    assert!(matches!(
        table.fetch_by_metadata(&MetaQuery::positional([1i64])),
        Err(Error::Usage(_))
    ));
    assert!(matches!(
        table.fetch_by_metadata(&MetaQuery::named([("Nope", 1i64)])),
        Err(Error::Usage(_))
    ));
}

#[test]
fn filter_accepts_raw_conditions() {
    let session = session();
    let mut table = create_example(&session, "filter");
    for image in 0..5i64 {
        table
            .store(&[Value::Long(image), Value::Long(0)], &[0.0, 0.0], false)
            .expect("store");
    }
    let rows = table.filter("(ImageID>=3) | (ImageID==0)").expect("filter");
    let ids: Vec<Value> = rows
        .iter()
        .map(|r| r.get("ImageID").expect("ImageID"))
        .collect();
    assert_eq!(ids, vec![Value::Long(0), Value::Long(3), Value::Long(4)]);

    assert_eq!(table.filter_raw("").expect("all").len(), 5);
}

#[test]
fn string_metadata_is_escaped_in_conditions() {
    let session = session();
    let mut table = unopened(&session, "strings");
    table
        .create(
            &[(ColumnKind::String, "Label", 16usize).into()],
            &["score".to_string()],
        )
        .expect("create");

    table.store(&["a\"b".into()], &[1.0], true).expect("store");
    table.store(&["plain".into()], &[2.0], true).expect("store");
    table.store(&["a\"b".into()], &[3.0], true).expect("replace");

    let rows = table
        .fetch_by_metadata(&MetaQuery::positional(["a\"b"]))
        .expect("fetch");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values(), Some(&[3.0][..]));

    assert!(matches!(
        table.store(&["much too long for the column".into()], &[0.0], false),
        Err(Error::Usage(_))
    ));
}

#[test]
fn float_metadata_replaces_and_fetches() {
    let session = session();
    let mut table = unopened(&session, "floats");
    table
        .create(
            &[MetadataColumn::new(ColumnKind::Float, "Scale")],
            &["x1".to_string()],
        )
        .expect("create");
    let file = table.file().expect("file");

    table.store(&[0.1f32.into()], &[1.0], true).expect("store");
    table.store(&[0.1f32.into()], &[2.0], true).expect("replace");
    assert_eq!(session.table_rows(file.id).expect("rows").len(), 1);

    let rows = table
        .fetch_by_metadata(&MetaQuery::positional([0.1f32]))
        .expect("fetch");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values(), Some(&[2.0][..]));

    // A double query value is narrowed to the column kind.
    let rows = table
        .fetch_by_metadata(&MetaQuery::named([("Scale", 0.1f64)]))
        .expect("fetch as double");
    assert_eq!(rows.len(), 1);
}

#[test]
fn metadata_names_with_spaces_and_punctuation_are_queryable() {
    let session = session();
    let mut table = unopened(&session, "spaced");
    table
        .create(
            &[
                MetadataColumn::new(ColumnKind::Long, "Image ID"),
                MetadataColumn::new(ColumnKind::Long, "roi-id (v2)"),
            ],
            &["x1".to_string()],
        )
        .expect("create");
    let file = table.file().expect("file");

    table
        .store(&[1i64.into(), 7i64.into()], &[1.0], true)
        .expect("store");
    table
        .store(&[1i64.into(), 7i64.into()], &[2.0], true)
        .expect("replace");
    table
        .store(&[2i64.into(), 7i64.into()], &[3.0], true)
        .expect("store second key");
    assert_eq!(session.table_rows(file.id).expect("rows").len(), 2);

    let rows = table
        .fetch_by_metadata(&MetaQuery::named([("Image ID", 1i64)]))
        .expect("fetch");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values(), Some(&[2.0][..]));

    let rows = table
        .fetch_by_metadata(&MetaQuery::positional([Value::Null, 7i64.into()]))
        .expect("fetch by second column");
    assert_eq!(rows.len(), 2);

    assert_eq!(table.filter_raw("(`Image ID`==2)").expect("filter").len(), 1);
}

#[test]
fn string_width_counts_characters() {
    let session = session();
    let mut table = unopened(&session, "unicode");
    table
        .create(
            &[(ColumnKind::String, "Label", 3usize).into()],
            &["score".to_string()],
        )
        .expect("create");

    table.store(&["héé".into()], &[1.0], false).expect("three characters fit");
    table
        .store_pending(&["日本語".into()], &[2.0])
        .expect("buffer");
    assert_eq!(table.store_flush().expect("flush"), 1);
    assert!(matches!(
        table.store(&["héél".into()], &[0.0], false),
        Err(Error::Usage(_))
    ));

    let rows = table
        .fetch_by_metadata(&MetaQuery::positional(["héé"]))
        .expect("fetch");
    assert_eq!(rows.len(), 1);
}

#[test]
fn pending_rows_flush_in_one_call() {
    let session = session();
    let mut batched = create_example(&session, "batched");
    let mut single = create_example(&session, "single");

    let rows: Vec<([Value; 2], [f64; 2])> = (0..4)
        .map(|i| ([Value::Long(i), Value::Long(i * 10)], [i as f64, -(i as f64)]))
        .collect();

    session.reset_stats();
    for (meta, features) in &rows {
        batched.store_pending(meta, features).expect("pending");
    }
    assert_eq!(batched.pending_rows(), 4);
    assert_eq!(session.stats().table_writes(), 0);
    assert_eq!(batched.store_flush().expect("flush"), 4);
    assert_eq!(session.stats().add_data, 1);
    assert_eq!(batched.pending_rows(), 0);

    for (meta, features) in &rows {
        single.store(meta, features, false).expect("store");
    }

    let batched_rows = session
        .table_rows(batched.file().expect("file").id)
        .expect("rows");
    let single_rows = session
        .table_rows(single.file().expect("file").id)
        .expect("rows");
    assert_eq!(batched_rows.len(), 4);
    assert_eq!(batched_rows, single_rows);
}

#[test]
fn empty_flush_does_not_contact_the_backend() {
    let session = session();
    let mut table = create_example(&session, "empty-flush");
    session.reset_stats();
    assert_eq!(table.store_flush().expect("flush"), 0);
    assert_eq!(session.stats(), Default::default());
}

#[test]
fn non_owner_cannot_write_or_delete() {
    let session = session();
    let mut owned = create_example(&session, "owned");
    owned
        .store(&[1i64.into(), 1i64.into()], &[1.0, 1.0], false)
        .expect("owner store");
    let file = owned.file().expect("file");

    let bob_session = session_for(&session, BOB);
    let mut theirs = FeatureTable::new(
        Arc::clone(&bob_session),
        BOB,
        "owned",
        FT_SPACE,
        common::ANN_SPACE,
    );
    theirs.open(None, Some(ALICE)).expect("open as reader");
    assert_eq!(theirs.filter_raw("").expect("read").len(), 1);

    session.reset_stats();
    assert!(matches!(
        theirs.store(&[2i64.into(), 2i64.into()], &[2.0, 2.0], false),
        Err(Error::Permission(_))
    ));
    assert!(matches!(
        theirs.store_pending(&[2i64.into(), 2i64.into()], &[2.0, 2.0]),
        Err(Error::Permission(_))
    ));
    assert!(matches!(theirs.delete(), Err(Error::Permission(_))));
    assert_eq!(session.stats().table_writes(), 0);
    assert_eq!(session.stats().delete_object, 0);
    assert_eq!(session.table_rows(file.id).expect("rows").len(), 1);
}

#[test]
fn owner_without_edit_acl_cannot_write() {
    let session = session();
    let mut table = create_example(&session, "read-only");
    let file = table.file().expect("file");
    session
        .set_permissions(file.id.0, Permissions::READ_ONLY)
        .expect("permissions");

    assert!(matches!(
        table.store(&[1i64.into(), 1i64.into()], &[1.0, 1.0], true),
        Err(Error::Permission(_))
    ));
    assert!(session.table_rows(file.id).expect("rows").is_empty());
}

#[test]
fn invalid_definitions_are_rejected_before_any_remote_call() {
    let session = session();
    let features = example_features();
    let cases: Vec<(Vec<MetadataColumn>, Vec<String>)> = vec![
        (vec![(ColumnKind::Long, "bad,name").into()], features.clone()),
        (example_meta(), vec!["_x".to_string()]),
        (vec![(ColumnKind::String, "Label").into()], features.clone()),
        (vec![(ColumnKind::DoubleArray, "Vec", 2usize).into()], features.clone()),
        (Vec::new(), features.clone()),
        (example_meta(), Vec::new()),
    ];
    for (meta, names) in cases {
        let mut table = unopened(&session, "invalid");
        assert!(
            matches!(table.create(&meta, &names), Err(Error::Usage(_))),
            "{meta:?} {names:?}"
        );
        assert!(!table.is_open());
    }
    assert_eq!(session.stats().new_table, 0);
    assert_eq!(session.count_objects(ORIGINAL_FILE), 0);
}

#[test]
fn value_counts_must_match_the_schema() {
    let session = session();
    let mut table = create_example(&session, "counts");
    assert!(matches!(
        table.store(&[1i64.into()], &[1.0, 2.0], false),
        Err(Error::Usage(_))
    ));
    assert!(matches!(
        table.store(&[1i64.into(), 2i64.into()], &[1.0], false),
        Err(Error::Usage(_))
    ));
    assert!(matches!(
        table.store(&["x".into(), 2i64.into()], &[1.0, 2.0], false),
        Err(Error::Usage(_))
    ));
}

#[test]
fn open_and_create_errors() {
    let session = session();
    let mut missing = unopened(&session, "missing");
    assert!(matches!(missing.open(None, None), Err(Error::NotFound(_))));
    assert!(matches!(
        missing.open(Some(FileId(12345)), None),
        Err(Error::NotFound(_))
    ));

    let mut table = create_example(&session, "dup");
    assert!(matches!(table.open(None, None), Err(Error::Usage(_))));
    assert!(matches!(
        table.create(&example_meta(), &example_features()),
        Err(Error::Usage(_))
    ));

    let meta = example_meta();
    let features = example_features();
    let mut again = unopened(&session, "dup");
    assert!(matches!(
        again.open_or_create(Some(ALICE), Some((meta.as_slice(), features.as_slice())), None),
        Err(Error::TooManyMatches(_))
    ));

    let mut for_bob = unopened(&session, "for-bob");
    assert!(matches!(
        for_bob.open_or_create(Some(BOB), Some((meta.as_slice(), features.as_slice())), None),
        Err(Error::Usage(_))
    ));

    // A second owner with the same table name makes an unqualified lookup
    // ambiguous.
    let bob_session = session_for(&session, BOB);
    create_example(&bob_session, "dup");
    let mut ambiguous = unopened(&session, "dup");
    assert!(matches!(
        ambiguous.open(None, None),
        Err(Error::TooManyMatches(_))
    ));
    ambiguous.open(None, Some(BOB)).expect("owner qualified open");

    let file = table.file().expect("file");
    let mut by_id = unopened(&session, "ignored-name");
    by_id
        .open_or_create(None, None, Some(file.id))
        .expect("open by file id");
    assert_eq!(by_id.metadata_names().expect("names"), &["ImageID", "RoiID"]);
}

#[test]
fn failed_initialize_deletes_the_file() {
    let session = session();
    session.set_fail_initialize(true);
    let mut table = unopened(&session, "broken");
    assert!(matches!(
        table.create(&example_meta(), &example_features()),
        Err(Error::Backend(_))
    ));
    assert!(!table.is_open());
    assert_eq!(session.count_objects(ORIGINAL_FILE), 0);
    assert_eq!(session.stats().delete_object, 1);

    session.set_fail_initialize(false);
    table
        .create(&example_meta(), &example_features())
        .expect("create after failure");
}

#[test]
fn created_file_path_is_corrected() {
    let session = session();
    session.set_raw_table_paths(true);
    let mut table = create_example(&session, "fixup");

    let file = table.file().expect("file");
    assert_eq!(file.name, "fixup");
    assert_eq!(file.path, FT_SPACE);
    assert_eq!(session.stats().save_file, 1);

    table
        .store(&[1i64.into(), 2i64.into()], &[3.0, 4.0], true)
        .expect("store");
    let mut reopened = unopened(&session, "fixup");
    reopened.open(None, Some(ALICE)).expect("open by name");
    assert_eq!(reopened.filter_raw("").expect("rows"), vec![row(1, 2, 3.0, 4.0)]);
}

#[test]
fn close_discards_state_and_is_idempotent() {
    let session = session();
    let mut table = create_example(&session, "closing");
    table
        .store_pending(&[1i64.into(), 1i64.into()], &[1.0, 1.0])
        .expect("pending");

    table.close().expect("close");
    table.close().expect("close again");
    assert!(!table.is_open());
    assert_eq!(table.pending_rows(), 0);
    assert!(matches!(table.metadata_names(), Err(Error::Usage(_))));
    assert!(matches!(
        table.store(&[1i64.into(), 1i64.into()], &[1.0, 1.0], true),
        Err(Error::Usage(_))
    ));
    assert!(matches!(table.filter_raw(""), Err(Error::Usage(_))));

    table.open(None, None).expect("reopen");
    assert!(table.filter_raw("").expect("rows").is_empty());
}

#[test]
fn dropping_an_open_table_closes_it() {
    let session = session();
    let table = create_example(&session, "dropped");
    let before = session.stats().close;
    drop(table);
    assert_eq!(session.stats().close, before + 1);
}

#[test]
fn legacy_headers_are_classified_by_kind() {
    let session = session();
    let raw = session
        .new_table(0, &format!("{FT_SPACE}/legacy"))
        .expect("new table");
    raw.initialize(&[
        ColumnHeader::new(ColumnKind::Long, "ImageID"),
        ColumnHeader::new(ColumnKind::DoubleArray, "a,b,c").with_width(3),
    ])
    .expect("initialize");
    raw.close().expect("close");

    let mut table = unopened(&session, "legacy");
    table.open(None, None).expect("open");
    assert_eq!(table.metadata_names().expect("meta"), &["ImageID"]);
    assert_eq!(table.feature_names().expect("features"), &["a", "b", "c"]);
    assert_eq!(table.layout().expect("layout").multi_ft_cols(), &[1]);
    assert_eq!(
        table.column("a,b,c").expect("column").feature_count(),
        3
    );
    assert!(matches!(table.column("a"), Err(Error::NotFound(_))));

    table
        .store(&[5i64.into()], &[1.0, 2.0, 3.0], true)
        .expect("store");
    let rows = table
        .fetch_by_metadata(&MetaQuery::positional([5i64]))
        .expect("fetch");
    assert_eq!(rows[0].get("c").expect("c"), Value::Double(3.0));
}

#[test]
fn tables_of_other_sessions_are_shared() {
    let session = session();
    let mut table = create_example(&session, "shared");
    table
        .store(&[1i64.into(), 1i64.into()], &[1.0, 1.0], false)
        .expect("store");

    let other: Arc<MemSession> = session_for(&session, BOB);
    let mut view = FeatureTable::new(other, BOB, "shared", FT_SPACE, common::ANN_SPACE);
    view.open(None, None).expect("open");
    assert_eq!(view.filter_raw("").expect("rows").len(), 1);
}
