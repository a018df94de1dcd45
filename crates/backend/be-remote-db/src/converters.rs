use ota_core::{BundleRecord, ContentHash, Platform};

use crate::error::DbError;
use crate::types::BundleRow;

impl TryFrom<BundleRow> for BundleRecord {
    type Error = DbError;

    fn try_from(row: BundleRow) -> Result<Self, Self::Error> {
        let platform = row
            .platform
            .parse::<Platform>()
            .map_err(|e| DbError::corrupt_row(row.id, e.to_string()))?;
        let content_hash = row
            .content_hash
            .parse::<ContentHash>()
            .map_err(|e| DbError::corrupt_row(row.id, e.to_string()))?;
        let size = u64::try_from(row.size)
            .map_err(|_| DbError::corrupt_row(row.id, format!("negative size {}", row.size)))?;

        Ok(BundleRecord {
            id: row.id,
            app_version: row.app_version,
            platform,
            deployment_key: row.deployment_key,
            content_hash,
            label: row.label,
            storage_ref: row.storage_ref,
            size,
            is_mandatory: row.is_mandatory,
            update_app_version: row.update_app_version,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn row() -> BundleRow {
        BundleRow {
            id: Uuid::now_v7(),
            app_version: "1.0.0".to_string(),
            platform: "android".to_string(),
            deployment_key: "prod".to_string(),
            content_hash: ContentHash::compute(b"bundle").to_string(),
            label: "v1".to_string(),
            storage_ref: "bundles/x.bundle".to_string(),
            size: 6,
            is_mandatory: false,
            update_app_version: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_into_record() {
        let record = BundleRecord::try_from(row()).unwrap();
        assert_eq!(record.platform, Platform::Android);
        assert_eq!(record.content_hash, ContentHash::compute(b"bundle"));
        assert_eq!(record.size, 6);
    }

    #[test]
    fn test_corrupt_rows_are_encoding_errors() {
        let mut bad_platform = row();
        bad_platform.platform = "palm".to_string();
        assert!(matches!(
            BundleRecord::try_from(bad_platform),
            Err(DbError::CorruptRow { .. })
        ));

        let mut bad_size = row();
        bad_size.size = -1;
        assert!(matches!(
            BundleRecord::try_from(bad_size),
            Err(DbError::CorruptRow { .. })
        ));
    }
}
