//! JSON artifact persistence.
//!
//! Artifacts are written once by the training pipeline and only read
//! afterwards. Every failure surfaces as `FraudError::Persistence` naming the
//! offending path.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FraudError, Result};

pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const MODEL_FILE: &str = "model.json";

pub fn save_object<T: Serialize, P: AsRef<Path>>(path: P, obj: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| FraudError::persistence(dir, e))?;
        }
    }
    let file = File::create(path).map_err(|e| FraudError::persistence(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, obj).map_err(|e| FraudError::persistence(path, e))?;
    writer.flush().map_err(|e| FraudError::persistence(path, e))?;
    log::debug!("Saved artifact to {}", path.display());
    Ok(())
}

pub fn load_object<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| FraudError::persistence(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| FraudError::persistence(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn round_trip_keeps_floats_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("obj.json");
        let mut obj = BTreeMap::new();
        obj.insert("mean".to_string(), 94813.85957508067_f64);
        obj.insert("std".to_string(), 0.1_f64 + 0.2_f64);

        save_object(&path, &obj).unwrap();
        let back: BTreeMap<String, f64> = load_object(&path).unwrap();
        assert_eq!(back, obj);
    }

    #[test]
    fn missing_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_object::<BTreeMap<String, f64>, _>(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, FraudError::Persistence { .. }));
    }
}
