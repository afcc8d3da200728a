// Revision catalog behaviour shared by the SQLite and memory catalogs.

mod common;

use chunkvault_catalog::{CatalogError, RevisionRepo, SqliteCatalog};
use chunkvault_core::FileId;
use common::{catalogs, new_revision};
use std::time::Duration;

#[tokio::test]
async fn test_insert_assigns_increasing_revisions() {
    let (_dir, catalogs) = catalogs().await;
    for catalog in catalogs {
        let name = catalog.backend_name();
        let first = catalog.insert(new_revision("f", b"one")).await.unwrap();
        let second = catalog.insert(new_revision("f", b"two")).await.unwrap();
        let other = catalog.insert(new_revision("g", b"x")).await.unwrap();

        assert_eq!(first.revision, 0, "{name}");
        assert_eq!(second.revision, 1, "{name}");
        assert_eq!(other.revision, 0, "{name}");

        let latest = catalog.find_latest("f").await.unwrap().unwrap();
        assert_eq!(latest.id, second.id, "{name}");
        let explicit = catalog.find_revision("f", 0).await.unwrap().unwrap();
        assert_eq!(explicit, first, "{name}");
        assert!(catalog.find_revision("f", 2).await.unwrap().is_none(), "{name}");
        assert_eq!(catalog.find_by_id(first.id).await.unwrap(), Some(first), "{name}");
    }
}

#[tokio::test]
async fn test_revision_fields_roundtrip() {
    let (_dir, catalogs) = catalogs().await;
    for catalog in catalogs {
        let name = catalog.backend_name();
        let mut revision = new_revision("doc.txt", b"ABCDEFGHI");
        revision.metadata = Some(serde_json::json!({"owner": "ci", "n": 3}));
        let committed = catalog.insert(revision.clone()).await.unwrap();

        let loaded = catalog.find_by_id(revision.id).await.unwrap().unwrap();
        assert_eq!(loaded, committed, "{name}");
        assert_eq!(loaded.length, 9, "{name}");
        assert_eq!(loaded.chunk_count(), 3, "{name}");
        assert_eq!(loaded.checksum, revision.checksum, "{name}");
        assert_eq!(loaded.metadata.unwrap()["owner"], "ci", "{name}");
    }
}

#[tokio::test]
async fn test_duplicate_id_rejected() {
    let (_dir, catalogs) = catalogs().await;
    for catalog in catalogs {
        let name = catalog.backend_name();
        let revision = new_revision("f", b"x");
        catalog.insert(revision.clone()).await.unwrap();
        let err = catalog.insert(revision).await.unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists(_)), "{name}: {err}");
    }
}

#[tokio::test]
async fn test_remove() {
    let (_dir, catalogs) = catalogs().await;
    for catalog in catalogs {
        let name = catalog.backend_name();
        let first = catalog.insert(new_revision("f", b"1")).await.unwrap();
        let second = catalog.insert(new_revision("f", b"2")).await.unwrap();

        catalog.remove(second.id).await.unwrap();
        assert_eq!(catalog.find_latest("f").await.unwrap().unwrap().id, first.id, "{name}");

        catalog.remove(first.id).await.unwrap();
        assert!(catalog.find_latest("f").await.unwrap().is_none(), "{name}");
        assert!(catalog.list_filenames(None).await.unwrap().is_empty(), "{name}");

        let err = catalog.remove(first.id).await.unwrap_err();
        assert!(err.is_not_found(), "{name}: {err}");
    }
}

#[tokio::test]
async fn test_rename_moves_revision_to_head_of_target() {
    let (_dir, catalogs) = catalogs().await;
    for catalog in catalogs {
        let name = catalog.backend_name();
        let a = catalog.insert(new_revision("a", b"aaaa")).await.unwrap();
        catalog.insert(new_revision("b", b"b0")).await.unwrap();
        catalog.insert(new_revision("b", b"b1")).await.unwrap();

        let renamed = catalog.rename(a.id, "b").await.unwrap();
        assert_eq!(renamed.filename, "b", "{name}");
        assert_eq!(renamed.revision, 2, "{name}");
        assert_eq!(renamed.checksum, a.checksum, "{name}");
        assert_eq!(renamed.length, a.length, "{name}");
        assert_eq!(renamed.uploaded_at, a.uploaded_at, "{name}");

        assert!(catalog.find_latest("a").await.unwrap().is_none(), "{name}");
        assert_eq!(catalog.find_latest("b").await.unwrap().unwrap().id, a.id, "{name}");
        assert_eq!(catalog.list_revisions("b").await.unwrap().len(), 3, "{name}");

        let same = catalog.rename(a.id, "b").await.unwrap();
        assert_eq!(same.revision, 2, "{name}");

        let err = catalog.rename(FileId::new(), "c").await.unwrap_err();
        assert!(err.is_not_found(), "{name}: {err}");
    }
}

#[tokio::test]
async fn test_list_filenames_sorted_and_case_insensitive() {
    let (_dir, catalogs) = catalogs().await;
    for catalog in catalogs {
        let name = catalog.backend_name();
        for filename in ["abc.txt", "ABD.txt", "zeta", "ab/nested", "abc.txt"] {
            catalog.insert(new_revision(filename, b"x")).await.unwrap();
        }

        assert_eq!(
            catalog.list_filenames(None).await.unwrap(),
            vec!["ABD.txt", "ab/nested", "abc.txt", "zeta"],
            "{name}"
        );
        assert_eq!(
            catalog.list_filenames(Some("ab")).await.unwrap(),
            vec!["ABD.txt", "ab/nested", "abc.txt"],
            "{name}"
        );
        assert_eq!(
            catalog.list_filenames(Some("ABC")).await.unwrap(),
            vec!["abc.txt"],
            "{name}"
        );
        assert_eq!(
            catalog.list_filenames(Some("")).await.unwrap().len(),
            4,
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_list_revisions_ids_and_clear() {
    let (_dir, catalogs) = catalogs().await;
    for catalog in catalogs {
        let name = catalog.backend_name();
        for i in 0..3u8 {
            catalog.insert(new_revision("f", &[i])).await.unwrap();
        }
        catalog.insert(new_revision("g", b"g")).await.unwrap();

        let revisions: Vec<u64> = catalog
            .list_revisions("f")
            .await
            .unwrap()
            .iter()
            .map(|r| r.revision)
            .collect();
        assert_eq!(revisions, vec![0, 1, 2], "{name}");
        assert_eq!(catalog.list_ids().await.unwrap().len(), 4, "{name}");

        assert_eq!(catalog.clear().await.unwrap(), 4, "{name}");
        assert!(catalog.list_ids().await.unwrap().is_empty(), "{name}");
        assert!(catalog.list_revisions("f").await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_sqlite_buckets_share_database_without_interference() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("shared.db");
    let photos = SqliteCatalog::new(&path, "photos", Duration::from_secs(5))
        .await
        .unwrap();

    let photo = photos.insert(new_revision("x", b"photo")).await.unwrap();
    drop(photos);

    let docs = SqliteCatalog::new(&path, "docs", Duration::from_secs(5))
        .await
        .unwrap();
    let doc = docs.insert(new_revision("x", b"doc")).await.unwrap();
    assert_eq!(doc.revision, 0);
    assert!(docs.find_by_id(photo.id).await.unwrap().is_none());
    assert_eq!(docs.clear().await.unwrap(), 1);
    drop(docs);

    let photos = SqliteCatalog::new(&path, "photos", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(photos.find_latest("x").await.unwrap().unwrap().id, photo.id);
}

#[tokio::test]
async fn test_sqlite_catalog_survives_reopen() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("catalog.db");

    let id = {
        let catalog = SqliteCatalog::new(&path, "fs", Duration::from_secs(5))
            .await
            .unwrap();
        catalog.insert(new_revision("f", b"persist")).await.unwrap().id
    };

    let catalog = SqliteCatalog::new(&path, "fs", Duration::from_secs(5))
        .await
        .unwrap();
    let next = catalog.insert(new_revision("f", b"again")).await.unwrap();
    assert_eq!(next.revision, 1);
    assert_eq!(catalog.find_revision("f", 0).await.unwrap().unwrap().id, id);
}
