use crate::source::Source;
use std::collections::{BTreeMap, HashMap};

/// Device and partition used when neither the request nor the environment
/// name one.
pub const FALLBACK_DEVICE_PARTITION: &str = "0:1";

/// Read-only view of the bootloader environment.
pub trait Environment {
    fn get(&self, key: &str) -> Option<String>;

    /// Reads a hexadecimal variable. A leading `0x` is optional.
    fn get_hex(&self, key: &str) -> Option<u64> {
        let value = self.get(key)?;
        let value = value.trim();
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .unwrap_or(value);
        u64::from_str_radix(digits, 16).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl Environment for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

/// Device:partition configured for `source` in the environment.
pub fn default_device_partition(source: Source, env: &dyn Environment) -> Option<String> {
    match source {
        Source::Mmc => {
            let dev = env.get("mmcdev")?;
            let part = env.get("mmcpart").unwrap_or_else(|| "1".to_string());
            Some(format!("{}:{}", dev, part))
        }
        // TODO: usbdev/satadev once the boards define them
        _ => None,
    }
}

pub fn device_partition_or_fallback(source: Source, env: &dyn Environment) -> String {
    default_device_partition(source, env).unwrap_or_else(|| {
        log::debug!(
            "No default device for {}, using {}",
            source,
            FALLBACK_DEVICE_PARTITION
        );
        FALLBACK_DEVICE_PARTITION.to_string()
    })
}
