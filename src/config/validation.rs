//! Config validation: unknown-key detection with Levenshtein suggestions
//! and registry/range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for VesselConfig.
///
/// Entries of the `[[devices]]` array share the `devices.` prefix.
/// Any new field added to VesselConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [vessel]
        "vessel",
        "vessel.name",
        // [data]
        "data",
        "data.dir",
        "data.time_column",
        "data.timestamp_format",
        "data.unreadable_token",
        // [audit]
        "audit",
        "audit.angle_mismatch_tolerance_deg",
        // [[devices]]
        "devices",
        "devices.name",
        "devices.aliases",
        "devices.table",
        "devices.current_channels",
        "devices.angle_port",
        "devices.angle_starboard",
        "devices.power_channel",
        "devices.steady_threshold",
        "devices.steady_window",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields
/// `["a", "a.b", "a.c"]`. Tables inside arrays are walked under the array's
/// own path, so `[[devices]] name = ".."` yields `devices.name`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            match v {
                toml::Value::Table(_) => keys.extend(walk_toml_keys(v, &path)),
                toml::Value::Array(items) => {
                    for item in items.iter().filter(|i| i.is_table()) {
                        for nested in walk_toml_keys(item, &path) {
                            if !keys.contains(&nested) {
                                keys.push(nested);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        // ties resolve alphabetically so suggestions are stable across runs
        let better = match best {
            None => true,
            Some((best_key, best_dist)) => dist < best_dist || (dist == best_dist && k < best_key),
        };
        if better {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Registry and Range Validation
// ============================================================================

/// Validate the device registry and numeric ranges of a parsed VesselConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must reject
/// the file; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(
    config: &super::VesselConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if config.data.time_column.trim().is_empty() {
        errors.push("data.time_column must not be empty".to_string());
    }

    let tol = config.audit.angle_mismatch_tolerance_deg;
    if !(tol >= 0.0) {
        errors.push(format!(
            "audit.angle_mismatch_tolerance_deg = {tol:.1} must be >= 0"
        ));
    } else if tol > 90.0 {
        warnings.push(ValidationWarning {
            field: "audit.angle_mismatch_tolerance_deg".to_string(),
            message: format!(
                "angle_mismatch_tolerance_deg = {tol:.1} is wider than any plausible sensor disagreement"
            ),
            suggestion: None,
        });
    }

    let mut seen_ids: HashSet<String> = HashSet::new();
    for (i, device) in config.devices.iter().enumerate() {
        let label = if device.name.is_empty() {
            format!("devices[{i}]")
        } else {
            format!("devices[{i}] ({})", device.name)
        };

        if device.name.trim().is_empty() {
            errors.push(format!("{label}: name must not be empty"));
        }
        if device.table.trim().is_empty() {
            errors.push(format!("{label}: table must not be empty"));
        }
        if device.current_channels.len() > 2 {
            errors.push(format!(
                "{label}: {} current channels configured, at most 2 are supported",
                device.current_channels.len()
            ));
        }
        if !(device.steady_threshold >= 0.0) {
            errors.push(format!(
                "{label}: steady_threshold = {:.1} must be >= 0 (current magnitude is never negative)",
                device.steady_threshold
            ));
        }
        if device.steady_window == 0 {
            errors.push(format!("{label}: steady_window must be >= 1"));
        }
        if device.all_channels().is_empty() {
            warnings.push(ValidationWarning {
                field: format!("devices.{}", device.name),
                message: format!("{label}: no channels configured, every query will be rejected"),
                suggestion: None,
            });
        }

        for id in std::iter::once(&device.name).chain(device.aliases.iter()) {
            let key = id.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            if !seen_ids.insert(key) {
                errors.push(format!("{label}: identifier '{id}' is already used by another device"));
            }
        }
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("steady_treshold", "steady_threshold"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [data]
            dir = "tables"
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"data".to_string()));
        assert!(keys.contains(&"data.dir".to_string()));
    }

    #[test]
    fn test_walk_toml_keys_array_of_tables() {
        let toml: toml::Value = r#"
            [[devices]]
            name = "a"
            table = "t1"

            [[devices]]
            name = "b"
            table = "t2"
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert_eq!(
            keys.iter().filter(|k| k.as_str() == "devices.name").count(),
            1
        );
        assert!(keys.contains(&"devices.table".to_string()));
    }

    #[test]
    fn test_default_config_has_no_errors() {
        let (errors, _) = validate_physical_ranges(&super::super::VesselConfig::default());
        assert!(errors.is_empty(), "{errors:?}");
    }
}
