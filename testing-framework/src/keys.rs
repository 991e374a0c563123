//! BLS key management for scenarios
//!
//! Key generation itself lives in `staking_common::crypto`; this module
//! decides which keys a validator edit adds and removes.

use serde::{Deserialize, Serialize};
use staking_common::crypto::{BlsError, BlsKey};
use std::fmt;
use thiserror::Error;

/// What a validator edit does to the registered BLS keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Leave the keys alone, edit other fields only
    #[default]
    FieldsOnly,
    AddBlsKey,
    RemoveBlsKey,
    /// Remove one registered key and add a fresh one in the same edit
    RotateBlsKey,
}

impl EditMode {
    pub fn adds_key(&self) -> bool {
        matches!(self, Self::AddBlsKey | Self::RotateBlsKey)
    }

    pub fn removes_key(&self) -> bool {
        matches!(self, Self::RemoveBlsKey | Self::RotateBlsKey)
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FieldsOnly => "fields_only",
            Self::AddBlsKey => "add_bls_key",
            Self::RemoveBlsKey => "remove_bls_key",
            Self::RotateBlsKey => "rotate_bls_key",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyManagementError {
    #[error("edit mode {0} needs a registered bls key to remove, none are registered")]
    NothingToRemove(EditMode),

    #[error(transparent)]
    Bls(#[from] BlsError),
}

/// Keys to apply in one edit transaction: at most one removal and one addition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyChange {
    pub remove: Option<BlsKey>,
    pub add: Option<BlsKey>,
}

impl KeyChange {
    pub fn is_empty(&self) -> bool {
        self.remove.is_none() && self.add.is_none()
    }

    /// Registered key set after this change is applied to `current`
    pub fn apply_to(&self, current: &[BlsKey]) -> Vec<BlsKey> {
        let mut keys: Vec<BlsKey> = current
            .iter()
            .filter(|key| Some(*key) != self.remove.as_ref())
            .cloned()
            .collect();
        if let Some(add) = &self.add {
            keys.push(add.clone());
        }
        keys
    }
}

/// Picks the key to remove (the most recently registered one) and generates
/// the key to add, as `mode` requires.
pub fn manage_bls_keys(
    current: &[BlsKey],
    mode: EditMode,
    message: &str,
) -> Result<KeyChange, KeyManagementError> {
    let remove = if mode.removes_key() {
        let key = current
            .last()
            .ok_or(KeyManagementError::NothingToRemove(mode))?;
        Some(key.clone())
    } else {
        None
    };

    let add = if mode.adds_key() {
        Some(BlsKey::generate(message)?)
    } else {
        None
    };

    Ok(KeyChange { remove, add })
}

/// Generates `count` fresh keys signing `message`
pub fn generate_keys(count: usize, message: &str) -> Result<Vec<BlsKey>, BlsError> {
    (0..count).map(|_| BlsKey::generate(message)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_only_changes_nothing() {
        let keys = generate_keys(2, "").unwrap();
        let change = manage_bls_keys(&keys, EditMode::FieldsOnly, "").unwrap();
        assert!(change.is_empty());
        assert_eq!(change.apply_to(&keys), keys);
    }

    #[test]
    fn test_rotate_removes_last_and_adds_fresh_key() {
        let keys = generate_keys(2, "").unwrap();
        let change = manage_bls_keys(&keys, EditMode::RotateBlsKey, "").unwrap();

        assert_eq!(change.remove.as_ref(), Some(&keys[1]));
        let added = change.add.clone().unwrap();
        assert!(!keys.contains(&added));

        let after = change.apply_to(&keys);
        assert_eq!(after, vec![keys[0].clone(), added]);
    }

    #[test]
    fn test_add_only_generates() {
        let keys = generate_keys(1, "").unwrap();
        let change = manage_bls_keys(&keys, EditMode::AddBlsKey, "msg").unwrap();
        assert!(change.remove.is_none());
        let added = change.add.unwrap();
        assert!(added
            .shard_signature()
            .verify("msg", added.shard_public_key().as_bytes()));
    }

    #[test]
    fn test_remove_without_registered_keys_fails() {
        assert_eq!(
            manage_bls_keys(&[], EditMode::RemoveBlsKey, ""),
            Err(KeyManagementError::NothingToRemove(EditMode::RemoveBlsKey))
        );
    }

    #[test]
    fn test_edit_mode_from_yaml() {
        let mode: EditMode = serde_yaml::from_str("rotate_bls_key").unwrap();
        assert_eq!(mode, EditMode::RotateBlsKey);
        assert_eq!(mode.to_string(), "rotate_bls_key");
    }
}
