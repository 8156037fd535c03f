//! Blocking filesystem work for a transfer: zip/unzip, checksums, and the
//! small `config.json` manifest every game package carries. Every function
//! here does synchronous I/O and is meant to be run through
//! `tokio::task::spawn_blocking`.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("config.json is missing or unreadable: {0}")]
    MissingConfig(std::io::Error),
    #[error("config.json is not valid: {0}")]
    InvalidConfig(#[from] serde_json::Error),
    #[error("package is missing a required '{0}/' directory")]
    MissingDirectory(&'static str),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageConfig {
    pub name: String,
    pub description: String,
    pub version: String,
    pub max_players: u32,
}

/// Reads and parses `<dir>/config.json`.
pub fn read_config(dir: &Path) -> Result<PackageConfig, PackageError> {
    let path = dir.join("config.json");
    let contents = std::fs::read_to_string(&path).map_err(PackageError::MissingConfig)?;
    Ok(serde_json::from_str(&contents)?)
}

/// A package directory must provide both a `client/` and a `server/`
/// subdirectory; the latter is what the supervisor launches.
pub fn validate_package_dir(dir: &Path) -> Result<(), PackageError> {
    if !dir.join("client").is_dir() {
        return Err(PackageError::MissingDirectory("client"));
    }
    if !dir.join("server").is_dir() {
        return Err(PackageError::MissingDirectory("server"));
    }
    Ok(())
}

/// Recursively extracts `archive_path` into `dest_dir`, creating it if needed.
pub fn unzip_to(archive_path: &Path, dest_dir: &Path) -> Result<(), PackageError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    std::fs::create_dir_all(dest_dir)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest_dir.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;
    }
    Ok(())
}

/// Recursively zips the contents of `src_dir` into `archive_path`, with
/// entry names relative to `src_dir`.
pub fn zip_dir(src_dir: &Path, archive_path: &Path) -> Result<(), PackageError> {
    let file = File::create(archive_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut stack = vec![src_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let relative = path.strip_prefix(src_dir).expect("walked from src_dir");
            if path.is_dir() {
                writer.add_directory(relative.to_string_lossy(), options)?;
                stack.push(path);
            } else {
                writer.start_file(relative.to_string_lossy(), options)?;
                let mut contents = Vec::new();
                File::open(&path)?.read_to_end(&mut contents)?;
                writer.write_all(&contents)?;
            }
        }
    }
    writer.finish()?;
    Ok(())
}

/// md5 of an entire file, hex-encoded.
pub fn compute_md5(path: &Path) -> Result<String, PackageError> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Moves every entry of `src_dir` into `dest_dir`, creating `dest_dir` and
/// any missing parents. Falls back to a recursive copy-then-delete when
/// `src_dir` and `dest_dir` live on different filesystems.
pub fn move_dir(src_dir: &Path, dest_dir: &Path) -> Result<(), PackageError> {
    if let Some(parent) = dest_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if std::fs::rename(src_dir, dest_dir).is_ok() {
        return Ok(());
    }
    copy_dir_recursive(src_dir, dest_dir)?;
    std::fs::remove_dir_all(src_dir)?;
    Ok(())
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let target = dest.join(entry.file_name());
        if path.is_dir() {
            copy_dir_recursive(&path, &target)?;
        } else {
            std::fs::copy(&path, &target)?;
        }
    }
    Ok(())
}

pub fn temp_file_path(temp_dir: &Path, label: &str) -> PathBuf {
    temp_dir.join(format!("{label}.zip"))
}
