//! Shared fixtures for feature table tests.

#![allow(dead_code)]

use std::sync::Arc;

use fstore_remote::MemSession;
use fstore_table::{FeatureTable, MetadataColumn};
use fstore_test_utils::init_tracing_for_tests;
use fstore_types::{ColumnKind, UserId};

pub const ALICE: UserId = UserId(1);
pub const BOB: UserId = UserId(2);
pub const FT_SPACE: &str = "fstore.features/0.1/features";
pub const ANN_SPACE: &str = "fstore.features/0.1/source";

pub fn session() -> Arc<MemSession> {
    init_tracing_for_tests();
    Arc::new(MemSession::new(ALICE))
}

/// A session for `user` over the same stored objects as `session`.
pub fn session_for(session: &MemSession, user: UserId) -> Arc<MemSession> {
    Arc::new(session.for_user(user))
}

pub fn example_meta() -> Vec<MetadataColumn> {
    vec![
        (ColumnKind::Long, "ImageID").into(),
        (ColumnKind::Long, "RoiID").into(),
    ]
}

pub fn example_features() -> Vec<String> {
    vec!["x1".to_string(), "x2".to_string()]
}

pub fn unopened(session: &Arc<MemSession>, name: &str) -> FeatureTable<MemSession> {
    let user = session.user();
    FeatureTable::new(Arc::clone(session), user, name, FT_SPACE, ANN_SPACE)
}

/// Create a table with `ImageID`/`RoiID` metadata and features `x1`, `x2`.
pub fn create_example(session: &Arc<MemSession>, name: &str) -> FeatureTable<MemSession> {
    let mut table = unopened(session, name);
    table
        .create(&example_meta(), &example_features())
        .expect("create example table");
    table
}
