// Orphan sweep.

mod common;

use bytes::Bytes;
use chunkvault_catalog::RevisionRepo;
use chunkvault_core::{FileId, RevisionSelector, UploadOptions};
use common::TestBucket;

#[tokio::test]
async fn test_sweep_clean_bucket() {
    let t = TestBucket::new(4);
    t.bucket
        .write("f", b"ABCDEFGHI", UploadOptions::default())
        .await
        .unwrap();

    let stats = t.bucket.sweep_orphans(false).await.unwrap();
    assert_eq!(stats.files_scanned, 1);
    assert_eq!(stats.orphans_found, 0);
    assert_eq!(stats.chunks_deleted, 0);
    assert_eq!(stats.damaged, 0);
}

#[tokio::test]
async fn test_sweep_removes_uncatalogued_chunks() {
    let t = TestBucket::new(4);
    t.bucket
        .write("keep", b"ABCDEFGHI", UploadOptions::default())
        .await
        .unwrap();

    // Chunks written by an upload that crashed before its catalog insert.
    let orphan = FileId::new();
    for index in 0..3 {
        t.bucket
            .chunks()
            .put_chunk(orphan, index, Bytes::from_static(b"zz"))
            .await
            .unwrap();
    }

    let dry = t.bucket.sweep_orphans(true).await.unwrap();
    assert_eq!(dry.files_scanned, 2);
    assert_eq!(dry.orphans_found, 1);
    assert_eq!(dry.chunks_deleted, 0);
    assert_eq!(dry.orphan_ids, vec![orphan]);
    assert_eq!(t.stored_chunks().await, 6);

    let stats = t.bucket.sweep_orphans(false).await.unwrap();
    assert_eq!(stats.orphans_found, 1);
    assert_eq!(stats.chunks_deleted, 3);
    assert_eq!(t.stored_chunks().await, 3);
    assert_eq!(t.bucket.read("keep").await.unwrap().as_ref(), b"ABCDEFGHI");
}

#[tokio::test]
async fn test_sweep_spares_in_flight_upload() {
    let t = TestBucket::new(4);
    let mut upload = t.bucket.begin_upload("f", UploadOptions::default()).unwrap();
    upload.write(b"ABCDEFGH").await.unwrap();

    let stats = t.bucket.sweep_orphans(false).await.unwrap();
    assert_eq!(stats.files_scanned, 1);
    assert_eq!(stats.orphans_found, 0);
    assert_eq!(stats.in_flight_skipped, 1);
    assert_eq!(t.stored_chunks().await, 2);

    upload.write(b"I").await.unwrap();
    upload.commit().await.unwrap();
    assert_eq!(t.bucket.read("f").await.unwrap().as_ref(), b"ABCDEFGHI");
}

#[tokio::test]
async fn test_sweep_collects_abandoned_upload() {
    let t = TestBucket::new(4);
    {
        let mut upload = t.bucket.begin_upload("f", UploadOptions::default()).unwrap();
        upload.write(b"ABCDEFGH").await.unwrap();
        // Dropped without commit or abort.
    }
    assert!(t.bucket.in_flight_uploads().is_empty());
    assert_eq!(t.stored_chunks().await, 2);

    let stats = t.bucket.sweep_orphans(false).await.unwrap();
    assert_eq!(stats.orphans_found, 1);
    assert_eq!(stats.chunks_deleted, 2);
    assert_eq!(t.stored_chunks().await, 0);
}

#[tokio::test]
async fn test_sweep_reports_damaged_revisions() {
    let t = TestBucket::new(4);
    t.bucket
        .write("f", b"ABCDEFGHI", UploadOptions::default())
        .await
        .unwrap();
    t.bucket.write("empty", b"", UploadOptions::default()).await.unwrap();
    let revision = t.bucket.resolve("f", RevisionSelector::Latest).await.unwrap();

    let key = chunkvault_core::ChunkRef::new(revision.id, 2).to_object_key("fs");
    chunkvault_storage::ObjectStore::delete(t.store.as_ref(), &key)
        .await
        .unwrap();

    let stats = t.bucket.sweep_orphans(false).await.unwrap();
    assert_eq!(stats.damaged, 1);
    assert_eq!(stats.damaged_ids, vec![revision.id]);
    assert_eq!(stats.orphans_found, 0);
    // Damaged revisions are reported, not removed.
    assert!(t.catalog.find_by_id(revision.id).await.unwrap().is_some());
}
