//! The transfer manager: tracks in-progress upload, update and download
//! flows. Each transfer is single-owner — only the connection that created
//! it ever touches it again — so the registry itself only needs a lock
//! around insert/remove, which `dashmap` gives for free.

pub mod package;

use crate::catalog::{Catalog, CatalogError};
use base64::Engine;
use dashmap::DashMap;
use package::PackageError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("unknown transfer id")]
    NotFound,
    #[error("transfer is not in the expected direction")]
    WrongDirection,
    #[error("uploaded size {written} does not match declared size {declared}")]
    SizeMismatch { written: u64, declared: u64 },
    #[error("checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("invalid base64 chunk: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blocking task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
enum Direction {
    Upload,
    Update { game_id: String, new_version: String },
    Download { game_id: String },
}

struct Transfer {
    username: String,
    direction: Direction,
    temp_path: PathBuf,
    declared_size: u64,
    cursor: u64,
}

pub struct TransferManager {
    transfers: DashMap<String, Transfer>,
    next_id: AtomicU64,
    temp_dir: PathBuf,
    storage_root: PathBuf,
    pub chunk_size: usize,
}

impl TransferManager {
    pub fn new(temp_dir: PathBuf, storage_root: PathBuf, chunk_size: usize) -> Self {
        Self {
            transfers: DashMap::new(),
            next_id: AtomicU64::new(1),
            temp_dir,
            storage_root,
            chunk_size,
        }
    }

    /// The root directory under which every game's version subdirectories live,
    /// e.g. for a deleted game's on-disk cleanup.
    pub fn storage_root(&self) -> &std::path::Path {
        &self.storage_root
    }

    fn allocate_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    async fn ensure_temp_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.temp_dir).await
    }

    pub async fn init_upload(
        &self,
        username: &str,
        declared_size: u64,
    ) -> Result<String, TransferError> {
        self.ensure_temp_dir().await?;
        let id = self.allocate_id();
        let temp_path = package::temp_file_path(&self.temp_dir, &format!("upload-{id}"));
        tokio::fs::File::create(&temp_path).await?;
        self.transfers.insert(
            id.clone(),
            Transfer {
                username: username.to_string(),
                direction: Direction::Upload,
                temp_path,
                declared_size,
                cursor: 0,
            },
        );
        Ok(id)
    }

    pub async fn init_update(
        &self,
        catalog: &Catalog,
        username: &str,
        game_id: &str,
        new_version: &str,
        declared_size: u64,
    ) -> Result<String, TransferError> {
        catalog
            .verify_update_eligibility(game_id, username, new_version)
            .await?;
        self.ensure_temp_dir().await?;
        let id = self.allocate_id();
        let temp_path = package::temp_file_path(&self.temp_dir, &format!("update-{id}"));
        tokio::fs::File::create(&temp_path).await?;
        self.transfers.insert(
            id.clone(),
            Transfer {
                username: username.to_string(),
                direction: Direction::Update {
                    game_id: game_id.to_string(),
                    new_version: new_version.to_string(),
                },
                temp_path,
                declared_size,
                cursor: 0,
            },
        );
        Ok(id)
    }

    pub async fn init_download(
        &self,
        catalog: &Catalog,
        game_id: &str,
    ) -> Result<(String, u64, String), TransferError> {
        let game = catalog.get_game(game_id).await?;
        let package_dir = self
            .storage_root
            .join(game_id)
            .join(&game.version);
        self.ensure_temp_dir().await?;
        let id = self.allocate_id();
        let temp_path = package::temp_file_path(&self.temp_dir, &format!("download-{id}"));

        let zip_path = temp_path.clone();
        tokio::task::spawn_blocking(move || package::zip_dir(&package_dir, &zip_path)).await??;
        let size = tokio::fs::metadata(&temp_path).await?.len();

        self.transfers.insert(
            id.clone(),
            Transfer {
                username: String::new(),
                direction: Direction::Download {
                    game_id: game_id.to_string(),
                },
                temp_path,
                declared_size: size,
                cursor: 0,
            },
        );
        Ok((id, size, game.version))
    }

    /// Decodes and appends one base64 chunk to an upload/update transfer's
    /// temp file. No-op on success; callers reply only on error.
    pub async fn append_chunk(
        &self,
        transfer_id: &str,
        chunk_b64: &str,
    ) -> Result<(), TransferError> {
        let (temp_path, is_write_direction) = {
            let transfer = self
                .transfers
                .get(transfer_id)
                .ok_or(TransferError::NotFound)?;
            (
                transfer.temp_path.clone(),
                !matches!(transfer.direction, Direction::Download { .. }),
            )
        };
        if !is_write_direction {
            return Err(TransferError::WrongDirection);
        }
        let bytes = base64::engine::general_purpose::STANDARD.decode(chunk_b64)?;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&temp_path)
            .await?;
        file.write_all(&bytes).await?;

        let mut transfer = self
            .transfers
            .get_mut(transfer_id)
            .ok_or(TransferError::NotFound)?;
        transfer.cursor += bytes.len() as u64;
        Ok(())
    }

    /// Reads up to `chunk_size` bytes of a download transfer, in order.
    /// Returns `None` once the whole file has been streamed.
    pub async fn next_download_chunk(
        &self,
        transfer_id: &str,
    ) -> Result<Option<Vec<u8>>, TransferError> {
        let (temp_path, cursor, declared_size, is_download) = {
            let transfer = self
                .transfers
                .get(transfer_id)
                .ok_or(TransferError::NotFound)?;
            (
                transfer.temp_path.clone(),
                transfer.cursor,
                transfer.declared_size,
                matches!(transfer.direction, Direction::Download { .. }),
            )
        };
        if !is_download {
            return Err(TransferError::WrongDirection);
        }
        if cursor >= declared_size {
            return Ok(None);
        }
        let mut file = tokio::fs::File::open(&temp_path).await?;
        file.seek(std::io::SeekFrom::Start(cursor)).await?;
        let remaining = (declared_size - cursor).min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; remaining];
        file.read_exact(&mut buf).await?;

        let mut transfer = self
            .transfers
            .get_mut(transfer_id)
            .ok_or(TransferError::NotFound)?;
        transfer.cursor += buf.len() as u64;
        Ok(Some(buf))
    }

    /// Verifies the declared size and checksum, unpacks, registers a new
    /// game in the catalog, and moves the package into permanent storage.
    /// Returns the new game id. Rolls back the catalog insert if the move
    /// fails after it succeeded.
    pub async fn finish_upload(
        &self,
        catalog: &Catalog,
        transfer_id: &str,
        expected_md5: &str,
    ) -> Result<String, TransferError> {
        let (_, transfer) = self
            .transfers
            .remove(transfer_id)
            .ok_or(TransferError::NotFound)?;
        if !matches!(transfer.direction, Direction::Upload) {
            return Err(TransferError::WrongDirection);
        }
        let result = self
            .finish_upload_inner(catalog, &transfer, expected_md5)
            .await;
        let _ = tokio::fs::remove_file(&transfer.temp_path).await;
        result
    }

    async fn finish_upload_inner(
        &self,
        catalog: &Catalog,
        transfer: &Transfer,
        expected_md5: &str,
    ) -> Result<String, TransferError> {
        verify_size(transfer.cursor, transfer.declared_size)?;
        verify_checksum(&transfer.temp_path, expected_md5).await?;

        let extract_dir = self.temp_dir.join(format!(
            "extract-upload-{}",
            transfer.temp_path.file_stem().unwrap().to_string_lossy()
        ));
        let extract_target = extract_dir.clone();
        let archive_path = transfer.temp_path.clone();
        tokio::task::spawn_blocking(move || package::unzip_to(&archive_path, &extract_target))
            .await??;

        let validate_dir = extract_dir.clone();
        tokio::task::spawn_blocking(move || package::validate_package_dir(&validate_dir))
            .await??;
        let config_dir = extract_dir.clone();
        let config =
            tokio::task::spawn_blocking(move || package::read_config(&config_dir)).await??;

        let game_id = catalog
            .add_game(
                &transfer.username,
                &config.name,
                &config.description,
                &config.version,
                config.max_players,
            )
            .await;

        let dest = self.storage_root.join(&game_id).join(&config.version);
        let move_src = extract_dir.clone();
        let move_dest = dest.clone();
        let move_result =
            tokio::task::spawn_blocking(move || package::move_dir(&move_src, &move_dest)).await?;
        if let Err(err) = move_result {
            error!(%game_id, %err, "failed to move uploaded package, rolling back catalog entry");
            catalog.remove_game_unconditionally(&game_id).await;
            let _ = tokio::fs::remove_dir_all(&extract_dir).await;
            return Err(err.into());
        }
        Ok(game_id)
    }

    /// Re-verifies ownership/version-newness, unpacks directly into
    /// `storage/<game_id>/<new_version>/`, and commits the version bump.
    pub async fn finish_update(
        &self,
        catalog: &Catalog,
        transfer_id: &str,
        expected_md5: &str,
    ) -> Result<(), TransferError> {
        let (_, transfer) = self
            .transfers
            .remove(transfer_id)
            .ok_or(TransferError::NotFound)?;
        let (game_id, new_version) = match &transfer.direction {
            Direction::Update {
                game_id,
                new_version,
            } => (game_id.clone(), new_version.clone()),
            _ => return Err(TransferError::WrongDirection),
        };
        let result = self
            .finish_update_inner(catalog, &transfer, &game_id, &new_version, expected_md5)
            .await;
        let _ = tokio::fs::remove_file(&transfer.temp_path).await;
        result
    }

    async fn finish_update_inner(
        &self,
        catalog: &Catalog,
        transfer: &Transfer,
        game_id: &str,
        new_version: &str,
        expected_md5: &str,
    ) -> Result<(), TransferError> {
        catalog
            .verify_update_eligibility(game_id, &transfer.username, new_version)
            .await?;
        verify_size(transfer.cursor, transfer.declared_size)?;
        verify_checksum(&transfer.temp_path, expected_md5).await?;

        let dest = self.storage_root.join(game_id).join(new_version);
        let archive_path = transfer.temp_path.clone();
        let dest_for_task = dest.clone();
        tokio::task::spawn_blocking(move || package::unzip_to(&archive_path, &dest_for_task))
            .await??;

        catalog
            .apply_update(game_id, &transfer.username, new_version)
            .await?;
        Ok(())
    }

    /// Computes the checksum of a finished download, records the download
    /// in the catalog, and deletes the temp zip. The client independently
    /// verifies the checksum against the FINISH packet.
    pub async fn finish_download(
        &self,
        catalog: &Catalog,
        transfer_id: &str,
    ) -> Result<String, TransferError> {
        let (_, transfer) = self
            .transfers
            .remove(transfer_id)
            .ok_or(TransferError::NotFound)?;
        let game_id = match &transfer.direction {
            Direction::Download { game_id } => game_id.clone(),
            _ => return Err(TransferError::WrongDirection),
        };
        let path = transfer.temp_path.clone();
        let checksum =
            tokio::task::spawn_blocking(move || package::compute_md5(&path)).await??;
        catalog.increment_download_count(&game_id).await?;
        let _ = tokio::fs::remove_file(&transfer.temp_path).await;
        Ok(checksum)
    }

    /// Drops a transfer and deletes its temp artifacts without touching the
    /// catalog. Used for an explicit client abort.
    pub async fn abandon(&self, transfer_id: &str) {
        if let Some((_, transfer)) = self.transfers.remove(transfer_id) {
            let _ = tokio::fs::remove_file(&transfer.temp_path).await;
        }
    }

    /// Abandons every transfer owned by `username`. Called during disconnect
    /// reconciliation; download transfers have no fixed owner recorded
    /// (they are driven entirely by the lobby handler loop) so this only
    /// affects uploads/updates in progress.
    pub async fn abandon_all_owned_by(&self, username: &str) {
        let ids: Vec<String> = self
            .transfers
            .iter()
            .filter(|entry| entry.username == username)
            .map(|entry| entry.key().clone())
            .collect();
        for id in ids {
            if self.transfers.remove(&id).is_none() {
                warn!(transfer_id = %id, "transfer vanished during disconnect cleanup");
            }
        }
    }
}

fn verify_size(written: u64, declared: u64) -> Result<(), TransferError> {
    if written != declared {
        return Err(TransferError::SizeMismatch { written, declared });
    }
    Ok(())
}

async fn verify_checksum(path: &std::path::Path, expected: &str) -> Result<(), TransferError> {
    let path = path.to_path_buf();
    let actual = tokio::task::spawn_blocking(move || package::compute_md5(&path)).await??;
    if actual != expected {
        return Err(TransferError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Role;
    use base64::Engine;
    use md5::Digest;

    async fn setup() -> (tempfile::TempDir, TransferManager, std::sync::Arc<Catalog>) {
        let root = tempfile::tempdir().unwrap();
        let manager = TransferManager::new(
            root.path().join("tmp"),
            root.path().join("storage"),
            4096,
        );
        let catalog = Catalog::new(root.path().join("data")).await;
        (root, manager, catalog)
    }

    fn sample_zip_bytes() -> Vec<u8> {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("client")).unwrap();
        std::fs::create_dir_all(src.path().join("server")).unwrap();
        std::fs::write(src.path().join("server/server.py"), b"# server").unwrap();
        std::fs::write(
            src.path().join("config.json"),
            br#"{"name":"Pong","description":"classic","version":"1.0.0","max_players":2}"#,
        )
        .unwrap();
        let archive = src.path().join("out.zip");
        package::zip_dir(src.path(), &archive).unwrap();
        std::fs::read(&archive).unwrap()
    }

    #[tokio::test]
    async fn upload_lifecycle_registers_a_game() {
        let (_root, manager, catalog) = setup().await;
        catalog.register("alice", "pw", Role::Developer).await.unwrap();

        let bytes = sample_zip_bytes();
        let id = manager.init_upload("alice", bytes.len() as u64).await.unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        manager.append_chunk(&id, &encoded).await.unwrap();

        let md5 = format!("{:x}", md5::Md5::digest(&bytes));

        let game_id = manager.finish_upload(&catalog, &id, &md5).await.unwrap();
        let game = catalog.get_game(&game_id).await.unwrap();
        assert_eq!(game.name, "Pong");
        assert_eq!(game.version, "1.0.0");
    }

    #[tokio::test]
    async fn finish_upload_rejects_checksum_mismatch() {
        let (_root, manager, catalog) = setup().await;
        let bytes = sample_zip_bytes();
        let id = manager.init_upload("alice", bytes.len() as u64).await.unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        manager.append_chunk(&id, &encoded).await.unwrap();

        let err = manager
            .finish_upload(&catalog, &id, "0000000000000000000000000000000")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn update_requires_authorship_before_accepting_chunks() {
        let (_root, manager, catalog) = setup().await;
        let game_id = catalog.add_game("alice", "Pong", "classic", "1.0.0", 2).await;

        let err = manager
            .init_update(&catalog, "mallory", &game_id, "2.0.0", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Catalog(CatalogError::NotAuthor)));
    }

    #[tokio::test]
    async fn download_round_trip_increments_count() {
        let (_root, manager, catalog) = setup().await;
        let game_id = catalog.add_game("alice", "Pong", "classic", "1.0.0", 2).await;
        let pkg_dir = manager.storage_root.join(&game_id).join("1.0.0");
        std::fs::create_dir_all(pkg_dir.join("client")).unwrap();
        std::fs::create_dir_all(pkg_dir.join("server")).unwrap();
        std::fs::write(pkg_dir.join("server/server.py"), b"# server").unwrap();

        let (transfer_id, size, version) = manager.init_download(&catalog, &game_id).await.unwrap();
        assert_eq!(version, "1.0.0");
        assert!(size > 0);

        let mut total = 0u64;
        while let Some(chunk) = manager.next_download_chunk(&transfer_id).await.unwrap() {
            total += chunk.len() as u64;
        }
        assert_eq!(total, size);

        manager.finish_download(&catalog, &transfer_id).await.unwrap();
        let game = catalog.get_game(&game_id).await.unwrap();
        assert_eq!(game.download_count, 1);
    }
}
