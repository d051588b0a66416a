// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Range-cache coherence, video tail prefetch, byte-admission behavior,
//! and upload abort semantics.

mod common;

use common::*;
use futures::StreamExt;
use object_io::{ObjectIoError, ReadParams, UploadParams};
use object_io_domain::value_objects::ids::NodeId;
use std::time::Duration;

#[tokio::test]
async fn test_overwritten_object_is_not_served_from_cache() {
    let cluster = cluster(4, 1);
    let before = pseudo_bytes(61, 100 * 1024);
    let after = pseudo_bytes(62, 80 * 1024);

    cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "k", &before, 8_000))
        .await
        .unwrap();
    let read = cluster
        .engine
        .clone()
        .read_entire_object("b", "k")
        .await
        .unwrap();
    assert_eq!(read, before);
    assert!(cluster.engine.range_cache().len() > 0);
    let hits_before = cluster.engine.metrics().cache_hits_total();

    // overwrite under the same key: prior entries must not be served
    cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "k", &after, 8_000))
        .await
        .unwrap();
    let read = cluster
        .engine
        .clone()
        .read_entire_object("b", "k")
        .await
        .unwrap();
    assert_eq!(read, after);
    assert_eq!(cluster.engine.metrics().cache_hits_total(), hits_before);
}

#[tokio::test]
async fn test_repeated_read_hits_cache() {
    let cluster = cluster(4, 1);
    let data = pseudo_bytes(63, 100 * 1024);
    cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "k", &data, 8_000))
        .await
        .unwrap();

    cluster
        .engine
        .clone()
        .read_entire_object("b", "k")
        .await
        .unwrap();
    let reads_after_first = cluster.engine.metrics().blocks_read_total();
    assert!(cluster.engine.metrics().cache_misses_total() > 0);

    cluster
        .engine
        .clone()
        .read_entire_object("b", "k")
        .await
        .unwrap();
    // second pass served from cache: no further block reads
    assert_eq!(
        cluster.engine.metrics().blocks_read_total(),
        reads_after_first
    );
    assert!(cluster.engine.metrics().cache_hits_total() > 0);
}

#[tokio::test]
async fn test_video_read_prefetches_tail() {
    let cluster = cluster(4, 1);
    let data = pseudo_bytes(64, 2 * 1024 * 1024);
    let md = cluster
        .engine
        .clone()
        .upload_object(UploadParams {
            bucket: "b".into(),
            key: "movie.mp4".into(),
            content_type: "video/mp4".into(),
            size: Some(data.len() as u64),
            source: byte_source(&data, 64 * 1024),
        })
        .await
        .unwrap();

    let mut stream = cluster.engine.clone().read_object_stream(ReadParams {
        bucket: "b".into(),
        key: "movie.mp4".into(),
        start: Some(0),
        end: None,
        requested_size: Some(64 * 1024),
    });
    // first pull triggers the speculative tail fetch
    let first = stream.next().await.unwrap().unwrap();
    assert!(!first.is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let cache = cluster.engine.range_cache();
    assert!(cache.contains(md.obj_id, 0));
    assert!(cache.contains(md.obj_id, md.size - 1024));
}

#[tokio::test]
async fn test_non_video_read_does_not_prefetch_tail() {
    let cluster = cluster(4, 1);
    let data = pseudo_bytes(65, 2 * 1024 * 1024);
    let md = cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "blob", &data, 64 * 1024))
        .await
        .unwrap();

    let mut stream = cluster.engine.clone().read_object_stream(ReadParams {
        bucket: "b".into(),
        key: "blob".into(),
        start: Some(0),
        end: None,
        requested_size: Some(64 * 1024),
    });
    stream.next().await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!cluster
        .engine
        .range_cache()
        .contains(md.obj_id, md.size - 1024));
}

#[tokio::test]
async fn test_declared_size_beyond_cap_still_uploads() {
    // admission clamps to the per-stream cap; the upload must still finish
    let mut config = test_config();
    config.semaphore_cap = 2 * 1024 * 1024;
    config.stream_semaphore_size_cap = 512 * 1024;
    config.stream_minimal_size_lock = 64 * 1024;
    let cluster = cluster_with(config, 4, 1);

    let data = pseudo_bytes(66, 3 * 1024 * 1024);
    let md = cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "big", &data, 32 * 1024))
        .await
        .unwrap();
    assert_eq!(md.size, data.len() as u64);

    let read = cluster
        .engine
        .clone()
        .read_entire_object("b", "big")
        .await
        .unwrap();
    assert_eq!(read, data);
    assert_eq!(
        cluster.engine.stream_semaphore().available(),
        cluster.engine.config().semaphore_cap
    );
}

#[tokio::test]
async fn test_admission_timeout_reports_stress_and_aborts() {
    let mut config = test_config();
    config.stream_semaphore_timeout_ms = 100;
    let cluster = cluster_with(config, 2, 1);

    // exhaust the admission pool
    let cap = cluster.engine.config().semaphore_cap;
    let _hold = cluster
        .engine
        .stream_semaphore()
        .acquire(cap, Duration::from_secs(1))
        .await
        .unwrap();

    let data = pseudo_bytes(67, 64 * 1024);
    let result = cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "stuck", &data, 8_000))
        .await;
    assert!(matches!(result, Err(ObjectIoError::StreamItemTimeout(_))));

    tokio::time::sleep(Duration::from_millis(100)).await;
    // one stress report, and the created upload was aborted
    assert_eq!(cluster.meta.stress_reports().len(), 1);
    assert_eq!(cluster.meta.aborted_uploads().len(), 1);

    // a second timeout within the hour does not report again
    let result = cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "stuck2", &data, 8_000))
        .await;
    assert!(result.is_err());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(cluster.meta.stress_reports().len(), 1);
    assert_eq!(cluster.meta.aborted_uploads().len(), 2);
}

#[tokio::test]
async fn test_failed_upload_aborts_and_reraises_original_error() {
    let cluster = cluster(2, 1);
    // every write fails: the durability floor cannot be met
    cluster.blocks.fail_writes_on_node(&NodeId::new("node-0"));
    cluster.blocks.fail_writes_on_node(&NodeId::new("node-1"));

    let data = pseudo_bytes(68, 40 * 1024);
    let result = cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "doomed", &data, 8_000))
        .await;
    assert!(matches!(result, Err(ObjectIoError::UploadMap(_))));

    assert_eq!(cluster.meta.aborted_uploads().len(), 1);
    // and the object never came into existence
    assert!(cluster
        .engine
        .clone()
        .read_entire_object("b", "doomed")
        .await
        .is_err());
}
