// /////////////////////////////////////////////////////////////////////////////
// Object IO Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end upload/read tests over the in-memory adapters: round trips,
//! deduplication, zero-byte copies, multipart assembly, and the
//! chunked-transfer source.

mod common;

use common::*;
use futures::StreamExt;
use object_io::{
    CopySource, MetadataService, MultipartParams, ReadParams, UploadParams, UploadSource,
};
use object_io_domain::services::metadata_service::{CompleteUploadParams, CreateUploadParams};

#[tokio::test]
async fn test_upload_read_round_trip() {
    let cluster = cluster(4, 2);
    let data = pseudo_bytes(42, 300 * 1024);

    let md = cluster
        .engine
        .clone()
        .upload_object(upload_params("photos", "a.bin", &data, 7_000))
        .await
        .unwrap();

    assert_eq!(md.size, data.len() as u64);
    assert_eq!(md.etag, md5_hex(&data));
    assert!(md.num_parts > 1, "300 KiB must split into many chunks");

    let read = cluster
        .engine
        .clone()
        .read_entire_object("photos", "a.bin")
        .await
        .unwrap();
    assert_eq!(read, data);

    // all admission bytes returned once both pipelines finished
    assert_eq!(
        cluster.engine.stream_semaphore().available(),
        cluster.engine.config().semaphore_cap
    );
}

#[tokio::test]
async fn test_empty_object_round_trip() {
    let cluster = cluster(2, 1);
    let md = cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "empty", &[], 1))
        .await
        .unwrap();
    assert_eq!(md.size, 0);
    assert_eq!(md.num_parts, 0);
    // md5 of the empty string
    assert_eq!(md.etag, "d41d8cd98f00b204e9800998ecf8427e");

    let read = cluster
        .engine
        .clone()
        .read_entire_object("b", "empty")
        .await
        .unwrap();
    assert!(read.is_empty());
}

#[tokio::test]
async fn test_ranged_read() {
    let cluster = cluster(4, 1);
    let data = pseudo_bytes(7, 200 * 1024);
    cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "r.bin", &data, 9_000))
        .await
        .unwrap();

    // a range crossing several chunks and one alignment boundary
    let (start, end) = (60_000u64, 150_000u64);
    let mut stream = cluster.engine.clone().read_object_stream(ReadParams {
        bucket: "b".into(),
        key: "r.bin".into(),
        start: Some(start),
        end: Some(end),
        requested_size: Some(32 * 1024),
    });
    let mut read = Vec::new();
    while let Some(buffer) = stream.next().await {
        read.extend_from_slice(&buffer.unwrap());
    }
    assert_eq!(read, &data[start as usize..end as usize]);
}

#[tokio::test]
async fn test_identical_objects_dedup() {
    let cluster = cluster(4, 1);
    let data = pseudo_bytes(9, 120 * 1024);

    cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "one", &data, 8_000))
        .await
        .unwrap();
    let blocks_after_first = cluster.blocks.block_count();
    let chunks_after_first = cluster.meta.chunk_count();

    // the same bytes under another key write nothing new
    cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "two", &data, 3_000))
        .await
        .unwrap();
    assert_eq!(cluster.blocks.block_count(), blocks_after_first);
    assert_eq!(cluster.meta.chunk_count(), chunks_after_first);

    let read = cluster
        .engine
        .clone()
        .read_entire_object("b", "two")
        .await
        .unwrap();
    assert_eq!(read, data);
}

#[tokio::test]
async fn test_same_bucket_copy_is_zero_byte() {
    let cluster = cluster(4, 1);
    let data = pseudo_bytes(11, 90 * 1024);
    let src = cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "src", &data, 6_000))
        .await
        .unwrap();
    let blocks_before = cluster.blocks.block_count();

    let dst = cluster
        .engine
        .clone()
        .upload_object(UploadParams {
            bucket: "b".into(),
            key: "dst".into(),
            content_type: "application/octet-stream".into(),
            size: None,
            source: UploadSource::Copy(CopySource {
                bucket: "b".into(),
                key: "src".into(),
                range: None,
            }),
        })
        .await
        .unwrap();

    // no data moved, identity differs, content and md5 match
    assert_eq!(cluster.blocks.block_count(), blocks_before);
    assert_ne!(dst.obj_id, src.obj_id);
    assert_eq!(dst.etag, src.etag);
    assert_eq!(dst.size, src.size);

    let read = cluster
        .engine
        .clone()
        .read_entire_object("b", "dst")
        .await
        .unwrap();
    assert_eq!(read, data);
}

#[tokio::test]
async fn test_ranged_copy_streams_through_pipeline() {
    let cluster = cluster(4, 1);
    let data = pseudo_bytes(13, 100 * 1024);
    cluster
        .engine
        .clone()
        .upload_object(upload_params("b", "src", &data, 6_000))
        .await
        .unwrap();

    let range = object_io::ByteRange::new(10_000, 50_000).unwrap();
    let dst = cluster
        .engine
        .clone()
        .upload_object(UploadParams {
            bucket: "b".into(),
            key: "slice".into(),
            content_type: "application/octet-stream".into(),
            size: None,
            source: UploadSource::Copy(CopySource {
                bucket: "b".into(),
                key: "src".into(),
                range: Some(range),
            }),
        })
        .await
        .unwrap();
    assert_eq!(dst.size, range.len());

    let read = cluster
        .engine
        .clone()
        .read_entire_object("b", "slice")
        .await
        .unwrap();
    assert_eq!(read, &data[10_000..50_000]);
}

#[tokio::test]
async fn test_multipart_assembles_in_order() {
    let cluster = cluster(4, 1);
    let part_one = pseudo_bytes(21, 70 * 1024);
    let part_two = pseudo_bytes(22, 50 * 1024);
    let part_three = pseudo_bytes(23, 30 * 1024);

    let info = cluster
        .meta
        .create_object_upload(CreateUploadParams {
            bucket: "b".into(),
            key: "mp".into(),
            size: None,
            content_type: "application/octet-stream".into(),
        })
        .await
        .unwrap();

    let mut num_parts = 0;
    for (num, part) in [&part_one, &part_two, &part_three].iter().enumerate() {
        let uploaded = cluster
            .engine
            .upload_multipart(MultipartParams {
                obj_id: info.obj_id,
                num: num as u64 + 1,
                size: Some(part.len() as u64),
                source: byte_source(part, 5_000),
            })
            .await
            .unwrap();
        assert_eq!(uploaded.size, part.len() as u64);
        assert_eq!(uploaded.md5, md5_hex(part));
        num_parts += uploaded.num_parts;
    }

    let mut whole = part_one.clone();
    whole.extend_from_slice(&part_two);
    whole.extend_from_slice(&part_three);

    let md = cluster
        .meta
        .complete_object_upload(CompleteUploadParams {
            obj_id: info.obj_id,
            size: whole.len() as u64,
            etag: md5_hex(&whole),
            sha256: None,
            num_parts,
        })
        .await
        .unwrap();
    assert_eq!(md.size, whole.len() as u64);

    let read = cluster
        .engine
        .clone()
        .read_entire_object("b", "mp")
        .await
        .unwrap();
    assert_eq!(read, whole);
}

#[tokio::test]
async fn test_chunked_transfer_source() {
    let cluster = cluster(3, 1);
    let data = pseudo_bytes(31, 80 * 1024);
    let envelope = chunked_envelope(&data, 7_777);

    let md = cluster
        .engine
        .clone()
        .upload_object(UploadParams {
            bucket: "b".into(),
            key: "chunked".into(),
            content_type: "application/octet-stream".into(),
            // chunked sources typically have no declared length
            size: None,
            source: match byte_source(&envelope, 4_096) {
                UploadSource::Stream(stream) => UploadSource::ChunkedStream(stream),
                _ => unreachable!(),
            },
        })
        .await
        .unwrap();

    assert_eq!(md.size, data.len() as u64);
    assert_eq!(md.etag, md5_hex(&data));
    let read = cluster
        .engine
        .clone()
        .read_entire_object("b", "chunked")
        .await
        .unwrap();
    assert_eq!(read, data);
}
