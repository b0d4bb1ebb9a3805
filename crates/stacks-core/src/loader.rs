//! Centralized environment-variable loading.
//!
//! Keeps fallback-alias chains and `.env` parsing in one place rather than
//! scattered `or_else` calls across business code.

use std::env;
use std::sync::Once;

/// Load `.env` from the current directory into the process environment,
/// without overwriting variables already set. Safe to call repeatedly;
/// only the first call has effect.
pub fn load_dotenv() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let path = env::current_dir()
            .map(|d| d.join(".env"))
            .unwrap_or_else(|_| std::path::PathBuf::from(".env"));
        if let Ok(content) = std::fs::read_to_string(&path) {
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some(eq_pos) = line.find('=') {
                    let key = line[..eq_pos].trim();
                    let mut value = line[eq_pos + 1..].trim();
                    if let Some(hash_pos) = value.find('#') {
                        let before_hash = value[..hash_pos].trim_end();
                        if !before_hash.contains('"') && !before_hash.contains('\'') {
                            value = before_hash;
                        }
                    }
                    if (value.starts_with('"') && value.ends_with('"'))
                        || (value.starts_with('\'') && value.ends_with('\''))
                    {
                        value = &value[1..value.len() - 1];
                    }
                    if !key.is_empty() && env::var(key).is_err() {
                        set_env_var(key, value);
                    }
                }
            }
        }
    });
}

/// Read from the primary variable or an alias chain, falling back to a
/// default thunk when none are set or the value is empty.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Read from the primary variable or an alias chain; empty values are
/// treated as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() { None } else { Some(s) }
        })
}

/// Parse a boolean environment variable: `0/false/no/off` is `false`,
/// anything else set is `true`; unset falls back to `default`.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// Centralized `env::set_var` wrapper; the only place `unsafe` appears for
/// environment mutation in this workspace.
///
/// Caller must ensure this runs before any other thread reads the
/// environment concurrently (i.e. before a multi-threaded runtime starts).
#[allow(unsafe_code)]
pub fn set_env_var(key: &str, value: &str) {
    unsafe { env::set_var(key, value) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_to_default() {
        let v = env_or("STACKS_DOES_NOT_EXIST_XYZ", &[], || "fallback".into());
        assert_eq!(v, "fallback");
    }

    #[test]
    fn env_bool_default_passthrough_when_unset() {
        assert!(env_bool("STACKS_UNSET_BOOL_XYZ2", &[], true));
        assert!(!env_bool("STACKS_UNSET_BOOL_XYZ3", &[], false));
    }
}
