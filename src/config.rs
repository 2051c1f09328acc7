use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::buffer::MAX_BUFFER_SIZE;
use crate::thread::ThreadPriority;

/// Top-level configuration for the demo pipeline
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub producer: ProducerConfig,
}

/// Ring buffer configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct BufferConfig {
    /// Initial capacity in bytes
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Grow on overflow instead of overwriting the oldest bytes
    #[serde(default = "default_auto_grow")]
    pub auto_grow: bool,
}

/// Consumer worker configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Thread name for the drain worker
    #[serde(default = "default_worker_name")]
    pub name: String,

    /// Scheduling hint for the drain worker
    #[serde(default)]
    pub priority: ThreadPriority,

    /// Predicate polling interval for bounded suspends, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Synthetic producer configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct ProducerConfig {
    /// Bytes pushed into the buffer per cycle
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,

    /// Pause between production cycles, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_capacity() -> usize {
    64 * 1024
}

fn default_auto_grow() -> bool {
    true
}

fn default_worker_name() -> String {
    "conveyor-drain".to_string()
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_chunk_bytes() -> usize {
    4096
}

fn default_interval_ms() -> u64 {
    5
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            auto_grow: default_auto_grow(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: default_worker_name(),
            priority: ThreadPriority::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: default_chunk_bytes(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.buffer.capacity == 0 {
            anyhow::bail!("Buffer capacity must be > 0");
        }

        if self.buffer.capacity > MAX_BUFFER_SIZE {
            anyhow::bail!(
                "Buffer capacity must be <= {} bytes, got {}",
                MAX_BUFFER_SIZE,
                self.buffer.capacity
            );
        }

        if self.worker.name.is_empty() {
            anyhow::bail!("Worker name must not be empty");
        }

        if self.worker.poll_interval_ms == 0 {
            anyhow::bail!("Worker poll interval must be > 0 ms");
        }

        if self.producer.chunk_bytes == 0 {
            anyhow::bail!("Producer chunk size must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer.capacity, 64 * 1024);
        assert!(config.buffer.auto_grow);
        assert_eq!(config.worker.poll_interval_ms, 10);
    }

    #[test]
    fn test_parse_partial_yaml_fills_defaults() {
        let yaml = "buffer:\n  capacity: 1024\nworker:\n  priority: high\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.buffer.capacity, 1024);
        assert!(config.buffer.auto_grow);
        assert_eq!(config.worker.priority, ThreadPriority::High);
        assert_eq!(config.worker.name, "conveyor-drain");
        assert_eq!(config.producer.chunk_bytes, 4096);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let yaml = "buffer:\n  capacity: 0\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_capacity_rejected() {
        let config = Config {
            buffer: BufferConfig {
                capacity: MAX_BUFFER_SIZE + 1,
                auto_grow: false,
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let yaml = "worker:\n  poll_interval_ms: 0\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }
}
