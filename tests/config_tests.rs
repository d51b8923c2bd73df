//! Tests for loading pool policy from files and applying it

use std::{fs, sync::Arc};

use framepool::{
    allocators::{megabytes, AlignedBufferAllocator, Allocator},
    config::{ENV_ENABLE_REUSE, ENV_MAX_MEMORY_MB},
    FramePoolConfig, FramePoolError, FrameType, PoolRegistry, RawFrame,
};
use tempfile::TempDir;

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("framepool.toml");
        fs::write(&path, "max_total_memory_mb = 256\nenable_reuse = false\n").unwrap();

        let config = FramePoolConfig::from_file(&path).unwrap();
        assert_eq!(config.max_total_memory_mb, 256);
        assert!(!config.enable_reuse);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = FramePoolConfig::from_file(temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, FramePoolError::Io { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "max_total_memory_mb = -3").unwrap();

        let err = FramePoolConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, FramePoolError::Config { .. }));
    }

    #[test]
    fn test_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("saved.toml");
        let config = FramePoolConfig {
            max_total_memory_mb: 48,
            enable_reuse: true,
        };
        fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(FramePoolConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_overrides_on_top_of_file() {
        let config = FramePoolConfig::from_toml_str("max_total_memory_mb = 8")
            .unwrap()
            .with_overrides(|name| (name == ENV_ENABLE_REUSE).then(|| "no".to_string()))
            .unwrap();
        assert_eq!(config.max_total_memory_mb, 8);
        assert!(!config.enable_reuse);

        let err = FramePoolConfig::default()
            .with_overrides(|name| (name == ENV_ENABLE_REUSE).then(|| "sometimes".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_ENABLE_REUSE));
        assert_ne!(ENV_MAX_MEMORY_MB, ENV_ENABLE_REUSE);
    }

    #[test]
    fn test_apply_config_to_registry() {
        let allocator = Arc::new(AlignedBufferAllocator::new());
        let registry = PoolRegistry::new(allocator.clone());
        let config = FramePoolConfig::from_toml_str("max_total_memory_mb = 3\nenable_reuse = false").unwrap();

        registry.apply_config(&config);
        assert_eq!(allocator.max_size(), megabytes(3));
        assert!(!registry.reuse_enabled());

        let a = registry.get_or_create::<RawFrame>(FrameType::Depth, 1024).unwrap();
        let b = registry.get_or_create::<RawFrame>(FrameType::Depth, 1024).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.registered_count(), 0);
    }
}
