// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::Value;

/// Deep-merge two JSON values.
/// `base` is existing file content, `overlay` is the serialized settings.
/// Overlay values take priority; keys only present in `base` survive.
pub(super) fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_base, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_keeps_unknown_keys() {
        let base = json!({"defaults": {"model": "old", "legacy": 1}, "extra": true});
        let overlay = json!({"defaults": {"model": "new"}});
        let merged = deep_merge(base, overlay);
        assert_eq!(merged["defaults"]["model"], "new");
        assert_eq!(merged["defaults"]["legacy"], 1);
        assert_eq!(merged["extra"], true);
    }

    #[test]
    fn test_deep_merge_overlay_replaces_scalars() {
        let merged = deep_merge(json!(1), json!({"a": 2}));
        assert_eq!(merged, json!({"a": 2}));
    }
}
