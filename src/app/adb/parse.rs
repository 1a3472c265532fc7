use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::app::models::DeviceRecord;

fn device_line_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\S+)\s+device(?:\s+(.*))?$").ok())
        .as_ref()
}

fn property_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\w+):(\S+)$").ok()).as_ref()
}

/// Parses `adb devices -l` output.
///
/// Only lines whose status word is exactly `device` produce a record; headers,
/// daemon banners and `unauthorized`/`offline` devices are skipped. Each
/// `key:value` token after the status becomes a property, last one wins.
pub fn parse_device_list(output: &str) -> Vec<DeviceRecord> {
    let (Some(line_re), Some(prop_re)) = (device_line_re(), property_re()) else {
        return Vec::new();
    };
    output
        .lines()
        .map(|line| line.trim_end_matches('\r').trim_end())
        .filter_map(|line| {
            let caps = line_re.captures(line)?;
            let device_id = caps.get(1)?.as_str().to_string();
            let mut properties = BTreeMap::new();
            if let Some(rest) = caps.get(2) {
                for token in rest.as_str().split_whitespace() {
                    if let Some(prop) = prop_re.captures(token) {
                        properties.insert(prop[1].to_string(), prop[2].to_string());
                    }
                }
            }
            Some(DeviceRecord {
                device_id,
                properties,
            })
        })
        .collect()
}
