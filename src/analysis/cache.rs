use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::TrackAnalysis;

/// Head/tail window hashed per file.
const HASH_CHUNK_BYTES: u64 = 1024 * 1024;

/// Content hash for the analysis cache: file size plus the first and last
/// 1 MiB, so renames and metadata edits still hit the cache while any byte
/// change near either end misses it.
pub(crate) fn content_hash(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    let mut hasher = Sha256::new();
    hasher.update(size.to_string().as_bytes());

    let mut chunk = vec![0u8; HASH_CHUNK_BYTES as usize];
    let read = read_up_to(&mut file, &mut chunk)?;
    hasher.update(&chunk[..read]);

    if size > HASH_CHUNK_BYTES {
        file.seek(SeekFrom::End(-(HASH_CHUNK_BYTES as i64)))?;
        let read = read_up_to(&mut file, &mut chunk)?;
        hasher.update(&chunk[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        let read = file.read(&mut buf[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

pub(crate) fn cache_path(cache_dir: &Path, hash: &str) -> PathBuf {
    cache_dir.join(format!("{hash}_analysis.json"))
}

/// Load a cached analysis; any read or parse failure is treated as a miss.
/// Unknown JSON fields from newer writers are ignored.
pub(crate) fn load(path: &Path) -> Option<TrackAnalysis> {
    let data = std::fs::read(path).ok()?;
    serde_json::from_slice(&data).ok()
}

pub(crate) fn store(path: &Path, analysis: &TrackAnalysis) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| format!("Create cache dir {} failed: {err}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(analysis)
        .map_err(|err| format!("Serialize analysis failed: {err}"))?;
    std::fs::write(path, data)
        .map_err(|err| format!("Write cache {} failed: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_analysis() -> TrackAnalysis {
        TrackAnalysis {
            filepath: "a.mp3".to_string(),
            hash: "deadbeef".to_string(),
            duration: 180.0,
            bpm: 128.0,
            loudness_db: -12.3,
            key: "A Minor".to_string(),
            beat_times: vec![0.0, 0.469, 0.938],
            phrases: vec![0.0],
            segments: Vec::new(),
            energy: vec![0.4, 1.0, 0.7],
            highlights: Vec::new(),
            bpm_source: Default::default(),
        }
    }

    #[test]
    fn identical_bytes_hash_identically_regardless_of_name() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("one.bin");
        let b = dir.path().join("two.bin");
        let payload = vec![7u8; 3 * 1024 * 1024];
        std::fs::write(&a, &payload).unwrap();
        std::fs::write(&b, &payload).unwrap();
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn tail_changes_change_the_hash() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("one.bin");
        let b = dir.path().join("two.bin");
        let mut payload = vec![7u8; 3 * 1024 * 1024];
        std::fs::write(&a, &payload).unwrap();
        *payload.last_mut().unwrap() = 8;
        std::fs::write(&b, &payload).unwrap();
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn files_under_one_chunk_hash_head_only_once() {
        let dir = tempdir().unwrap();
        let small = dir.path().join("small.bin");
        std::fs::write(&small, b"tiny").unwrap();
        assert!(content_hash(&small).is_ok());
    }

    #[test]
    fn store_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let path = cache_path(dir.path(), "deadbeef");
        let analysis = sample_analysis();
        store(&path, &analysis).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, analysis);
    }

    #[test]
    fn unknown_fields_are_ignored_on_load() {
        let dir = tempdir().unwrap();
        let path = cache_path(dir.path(), "deadbeef");
        let analysis = sample_analysis();
        let mut value = serde_json::to_value(&analysis).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("future_field".to_string(), serde_json::json!(42));
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();
        assert_eq!(load(&path).unwrap(), analysis);
    }

    #[test]
    fn corrupt_cache_is_a_miss() {
        let dir = tempdir().unwrap();
        let path = cache_path(dir.path(), "deadbeef");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(load(&path).is_none());
    }
}
