use std::path::{Path, PathBuf};

use tankd_control::Params;

use crate::error::StoreError;

const PARAMS_HEADER: &str = "\
# Loaded on startup of the supervisor.
# Change params through the API while the control loop is stopped;
# API updates keep this file in sync.
";

/// Persists the last-accepted [`Params`] so a restarted supervisor reuses
/// them for the next `start`.
#[derive(Debug, Clone)]
pub struct ParamsStore {
    path: PathBuf,
}

impl ParamsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the persisted params.
    pub fn load(&self) -> Result<Params, StoreError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let params: Params =
            serde_yaml::from_str(&text).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        params.validate()?;
        Ok(params)
    }

    /// Persist params, keeping the explanatory header.
    pub fn save(&self, params: &Params) -> Result<(), StoreError> {
        let body = serde_yaml::to_string(params).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, format!("{PARAMS_HEADER}{body}")).map_err(|source| {
            StoreError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Params {
        Params {
            low: 20.0,
            high: 24.0,
            fan_retain: 30.0,
            tick_time: 5.0,
        }
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir should be creatable");
        let store = ParamsStore::new(dir.path().join("params.yaml"));

        store.save(&params()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, params());
    }

    #[test]
    fn saved_file_keeps_header_comment() {
        let dir = tempfile::tempdir().expect("tempdir should be creatable");
        let store = ParamsStore::new(dir.path().join("params.yaml"));

        store.save(&params()).unwrap();
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.starts_with("# Loaded on startup"));
        assert!(text.contains("fan_retain"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir should be creatable");
        let store = ParamsStore::new(dir.path().join("absent.yaml"));

        assert!(matches!(store.load(), Err(StoreError::Io { .. })));
    }

    #[test]
    fn unparsable_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir should be creatable");
        let path = dir.path().join("params.yaml");
        std::fs::write(&path, "low: [not a number\n").unwrap();

        let store = ParamsStore::new(path);
        assert!(matches!(store.load(), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn invalid_params_rejected_at_load() {
        let dir = tempfile::tempdir().expect("tempdir should be creatable");
        let path = dir.path().join("params.yaml");
        std::fs::write(
            &path,
            "low: 24.0\nhigh: 20.0\nfan_retain: 30.0\ntick_time: 5.0\n",
        )
        .unwrap();

        let store = ParamsStore::new(path);
        assert!(matches!(store.load(), Err(StoreError::Invalid(_))));
    }
}
