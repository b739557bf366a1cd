use std::sync::Arc;

use arrow::array::{FixedSizeListArray, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use fstore_remote::objects::{FILE_ANNOTATION, ORIGINAL_FILE, fields};
use fstore_remote::{
    Criteria, MemSession, ObjectRepository, Permissions, RemoteTable, TableService,
};
use fstore_result::Error;
use fstore_test_utils::init_tracing_for_tests;
use fstore_types::{ColumnHeader, ColumnKind, UserId, Value};

fn headers() -> Vec<ColumnHeader> {
    vec![
        ColumnHeader::new(ColumnKind::Long, "ImageID"),
        ColumnHeader::new(ColumnKind::DoubleArray, "x1,x2").with_width(2),
    ]
}

fn batch(ids: &[i64], features: &[[f64; 2]]) -> RecordBatch {
    let item = Arc::new(Field::new("item", DataType::Float64, false));
    let flat: Vec<f64> = features.iter().flat_map(|f| f.iter().copied()).collect();
    let list = FixedSizeListArray::try_new(
        Arc::clone(&item),
        2,
        Arc::new(Float64Array::from(flat)),
        None,
    )
    .expect("list array");
    let schema = Arc::new(Schema::new(vec![
        Field::new("ImageID", DataType::Int64, true),
        Field::new("x1,x2", DataType::FixedSizeList(item, 2), true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![Arc::new(Int64Array::from(ids.to_vec())), Arc::new(list)],
    )
    .expect("record batch")
}

#[test]
fn table_lifecycle_round_trip() {
    init_tracing_for_tests();
    let session = MemSession::new(UserId(7));
    let table = session.new_table(0, "ns/features/t1").expect("new table");

    let file = table.file().expect("file");
    assert_eq!(file.name, "t1");
    assert_eq!(file.path, "ns/features");
    assert_eq!(file.details.owner, UserId(7));
    assert!(table.headers().expect("headers").is_empty());

    table.initialize(&headers()).expect("initialize");
    assert_eq!(table.headers().expect("headers"), headers());
    assert!(table.initialize(&headers()).is_err());

    table
        .add_data(&batch(&[1, 2, 3], &[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]))
        .expect("add data");
    assert_eq!(table.number_of_rows().expect("rows"), 3);

    table
        .update(&[1], &batch(&[2], &[[30.0, 40.0]]))
        .expect("update");

    let out = table.read_coordinates(&[2, 1]).expect("read");
    assert_eq!(out.num_rows(), 2);
    let rows = session.table_rows(file.id).expect("rows");
    assert_eq!(
        rows[1],
        vec![
            Value::Long(2),
            Value::List(vec![Value::Double(30.0), Value::Double(40.0)])
        ]
    );

    let hits = table
        .where_list("(ImageID>=2)", 0, 3, 0)
        .expect("where_list");
    assert_eq!(hits, vec![1, 2]);
    assert_eq!(
        table.where_list("(ImageID>=2)", 0, 3, 1).expect("limit"),
        vec![1]
    );
    assert_eq!(
        table.where_list("(ImageID>=1)", 1, 2, 0).expect("range"),
        vec![1]
    );

    table.close().expect("close");
    assert!(matches!(table.number_of_rows(), Err(Error::Backend(_))));

    let reopened = session.open_table(&file).expect("reopen");
    assert_eq!(reopened.number_of_rows().expect("rows"), 3);
}

#[test]
fn failed_initialize_leaves_table_uninitialized() {
    let session = MemSession::new(UserId(1));
    session.set_fail_initialize(true);
    let table = session.new_table(0, "a/b").expect("new table");
    assert!(matches!(table.initialize(&headers()), Err(Error::Backend(_))));
    assert!(table.headers().expect("headers").is_empty());
    assert_eq!(session.stats().initialize, 1);
}

#[test]
fn raw_table_paths_put_the_path_into_the_name() {
    let session = MemSession::new(UserId(1));
    session.set_raw_table_paths(true);
    let table = session.new_table(0, "a/b").expect("new table");
    let mut file = table.file().expect("file");
    assert_eq!(file.name, "a/b");
    assert_eq!(file.path, "");

    file.name = "b".into();
    file.path = "a".into();
    let saved = session.save_file(&file).expect("save");
    assert_eq!(saved.full_path(), "a/b");
}

#[test]
fn find_objects_applies_every_criterion() {
    let session = MemSession::new(UserId(5));
    let other = session.for_user(UserId(6));
    session.new_table(0, "space/t").expect("mine");
    other.new_table(0, "space/t").expect("theirs");

    let both = session
        .find_objects(
            ORIGINAL_FILE,
            &Criteria::new().eq(fields::NAME, "t").eq(fields::PATH, "space"),
        )
        .expect("find");
    assert_eq!(both.len(), 2);

    let mine = session
        .find_objects(
            ORIGINAL_FILE,
            &Criteria::new()
                .eq(fields::NAME, "t")
                .eq(fields::OWNER, 5i64),
        )
        .expect("find");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].details.owner, UserId(5));
}

#[test]
fn file_annotation_links_and_deletes() {
    let session = MemSession::new(UserId(1));
    let table = session.new_table(0, "space/t").expect("table");
    let file = table.file().expect("file");
    let image = session
        .create_object("Image", vec![("name", Value::from("img"))])
        .expect("image");

    let link = session
        .link_file_annotation("Image", image, "space/source", file.id)
        .expect("link");
    assert_eq!(link.kind, "ImageAnnotationLink");
    assert_eq!(link.field(fields::PARENT), Some(&Value::Long(image)));
    assert_eq!(session.count_objects(FILE_ANNOTATION), 1);

    assert!(matches!(
        session.link_file_annotation("Image", 9999, "ns", file.id),
        Err(Error::NotFound(_))
    ));

    session
        .delete_object("ImageAnnotationLink", link.id)
        .expect("delete link");
    session
        .delete_object(ORIGINAL_FILE, file.id.0)
        .expect("delete file");
    assert!(session.open_table(&file).is_err());
    assert!(matches!(
        session.delete_object(ORIGINAL_FILE, file.id.0),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn permissions_can_be_overridden() {
    let session = MemSession::new(UserId(1));
    let table = session.new_table(0, "space/t").expect("table");
    let file = table.file().expect("file");
    assert_eq!(file.details.permissions, Permissions::READ_WRITE);

    session
        .set_permissions(file.id.0, Permissions::READ_ONLY)
        .expect("set permissions");
    assert_eq!(
        table.file().expect("file").details.permissions,
        Permissions::READ_ONLY
    );
}

#[test]
fn stats_count_calls() {
    let session = MemSession::new(UserId(1));
    let table = session.new_table(0, "s/t").expect("table");
    table.initialize(&headers()).expect("init");
    table.add_data(&batch(&[1], &[[0.0, 0.0]])).expect("add");
    table.where_list("", 0, 1, 0).expect("where");

    let stats = session.stats();
    assert_eq!(stats.new_table, 1);
    assert_eq!(stats.add_data, 1);
    assert_eq!(stats.where_list, 1);
    assert_eq!(stats.table_writes(), 1);

    session.reset_stats();
    assert_eq!(session.stats().table_calls(), 0);
}
