// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn payload_joins_records_into_array() {
    let (payload, count) = payload_from_lines(["{\"a\":1}", "{\"b\":\"x\"}"]).unwrap();
    assert_eq!(payload, "[{\"a\":1},{\"b\":\"x\"}]");
    assert_eq!(count, 2);
}

#[test]
fn payload_rejects_non_json_record() {
    assert!(payload_from_lines(["{\"a\":1}", "not json"]).is_err());
}

#[test]
fn handle_display_names_the_batch() {
    let handle = BatchHandle::Rows {
        batch_id: 3,
        last_row: 17,
    };
    assert_eq!(handle.to_string(), "batch 3 (rows <= 17)");
    assert_eq!(BatchHandle::Memory(4).to_string(), "memory batch 4");
}

#[test]
fn backend_kind_display() {
    assert_eq!(BackendKind::File.to_string(), "file");
    assert_eq!(BackendKind::Database.to_string(), "database");
}
