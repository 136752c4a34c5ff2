use serde_json::Value;

use crate::storage::StorageError;

type MigrationFn = fn(Value) -> Result<Value, StorageError>;

fn get_migrations() -> Vec<MigrationFn> {
    vec![
        // v1 -> v2 goes here once the proposal document changes shape
    ]
}

/// Returns 1 if the version field is missing (v1 is the first schema).
pub fn detect_version(value: &Value) -> Result<u32, StorageError> {
    match value.get("version") {
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| StorageError::InvalidVersion(v.to_string())),
        None => Ok(1),
    }
}

/// Migrations are applied sequentially: v1→v2→v3→...→target
pub fn apply_migrations(
    mut data: Value,
    from_version: u32,
    to_version: u32,
) -> Result<Value, StorageError> {
    if from_version == to_version {
        return Ok(data);
    }

    if from_version > to_version {
        return Err(StorageError::FutureVersion(from_version));
    }

    let migrations = get_migrations();

    for version in from_version..to_version {
        let migration_idx = (version - 1) as usize;

        let Some(migration) = migrations.get(migration_idx) else {
            return Err(StorageError::UnsupportedVersion(version));
        };

        data = migration(data)?;
    }

    Ok(data)
}
