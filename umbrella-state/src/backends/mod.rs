//! Backend implementations for state storage

mod local;

pub use local::LocalBackend;

use std::path::PathBuf;

use umbrella_core::parser::BackendConfig;

use crate::backend::{BackendError, BackendResult, StateBackend};

/// Create a backend from the `backend` block, if any
///
/// Without a block the local backend with its default path is used.
/// `path_override` (the `--state` flag) wins over the configured path.
pub fn create_backend(
    config: Option<&BackendConfig>,
    path_override: Option<PathBuf>,
) -> BackendResult<Box<dyn StateBackend>> {
    let backend = match config {
        None => LocalBackend::new(),
        Some(config) => match config.backend_type.as_str() {
            "local" => LocalBackend::from_config(config)?,
            other => return Err(BackendError::unsupported_backend(other)),
        },
    };

    Ok(match path_override {
        Some(path) => Box::new(LocalBackend::with_path(path)),
        None => Box::new(backend),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_unsupported_backend() {
        let config = BackendConfig {
            backend_type: "s3".to_string(),
            attributes: HashMap::new(),
        };

        match create_backend(Some(&config), None) {
            Err(BackendError::UnsupportedBackend(name)) => assert_eq!(name, "s3"),
            Err(other) => panic!("Expected UnsupportedBackend error, got {other:?}"),
            Ok(_) => panic!("Expected UnsupportedBackend error"),
        }
    }

    #[test]
    fn test_default_and_override() {
        let backend = create_backend(None, None).unwrap();
        assert_eq!(backend.location(), LocalBackend::DEFAULT_STATE_FILE);

        let backend = create_backend(None, Some(PathBuf::from("prod.state.json"))).unwrap();
        assert_eq!(backend.location(), "prod.state.json");
    }
}
