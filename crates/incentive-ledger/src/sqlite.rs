//! SQLite fact store
//!
//! One append-only `performance_records` table with a unique natural key,
//! a `performance_rewards` child table, and three aggregate views filtered
//! on `is_historical = 0`. Amounts used by the views are stored as integer
//! fen; the full record is kept as JSON so reads return exactly what was
//! written.

use incentive_common::{
    dedup_key, is_whole_fen, ActivityStats, HousekeeperStats, IncentiveError, OrderType,
    PerformanceRecord, ProjectStats, Result, StoreError,
};
use parking_lot::Mutex;
use rusqlite::ffi::ErrorCode;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::store::FactStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS performance_records (
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    activity_code            TEXT    NOT NULL,
    contract_id              TEXT    NOT NULL,
    housekeeper              TEXT    NOT NULL,
    service_provider         TEXT    NOT NULL,
    order_type               TEXT    NOT NULL,
    project_id               TEXT,
    project_address          TEXT,
    is_historical            INTEGER NOT NULL,
    contract_amount_fen      INTEGER NOT NULL,
    performance_amount_fen   INTEGER NOT NULL,
    activity_sequence        INTEGER NOT NULL,
    housekeeper_sequence     INTEGER NOT NULL,
    created_at               TEXT    NOT NULL,
    record_json              TEXT    NOT NULL,
    UNIQUE (activity_code, contract_id)
);

CREATE TABLE IF NOT EXISTS performance_rewards (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id     INTEGER NOT NULL REFERENCES performance_records (id),
    activity_code TEXT    NOT NULL,
    housekeeper   TEXT    NOT NULL,
    order_type    TEXT    NOT NULL,
    reward_type   TEXT    NOT NULL,
    reward_name   TEXT    NOT NULL,
    value         TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rewards_housekeeper
    ON performance_rewards (activity_code, housekeeper, reward_type);
CREATE INDEX IF NOT EXISTS idx_records_housekeeper
    ON performance_records (activity_code, housekeeper);
CREATE INDEX IF NOT EXISTS idx_records_project
    ON performance_records (activity_code, project_id);

CREATE VIEW IF NOT EXISTS housekeeper_performance AS
SELECT activity_code,
       housekeeper,
       COUNT(*)                                                                         AS contract_count,
       COALESCE(SUM(contract_amount_fen), 0)                                            AS total_amount_fen,
       COALESCE(SUM(performance_amount_fen), 0)                                         AS performance_amount_fen,
       COALESCE(SUM(CASE WHEN order_type = 'platform' THEN 1 ELSE 0 END), 0)            AS platform_count,
       COALESCE(SUM(CASE WHEN order_type = 'platform' THEN performance_amount_fen ELSE 0 END), 0)      AS platform_amount_fen,
       COALESCE(SUM(CASE WHEN order_type = 'self_referral' THEN 1 ELSE 0 END), 0)       AS self_referral_count,
       COALESCE(SUM(CASE WHEN order_type = 'self_referral' THEN performance_amount_fen ELSE 0 END), 0) AS self_referral_amount_fen
FROM performance_records
WHERE is_historical = 0
GROUP BY activity_code, housekeeper;

CREATE VIEW IF NOT EXISTS project_performance AS
SELECT activity_code,
       project_id,
       COUNT(*)                                 AS contract_count,
       COALESCE(SUM(contract_amount_fen), 0)    AS total_amount_fen,
       COALESCE(SUM(performance_amount_fen), 0) AS performance_amount_fen
FROM performance_records
WHERE is_historical = 0 AND project_id IS NOT NULL
GROUP BY activity_code, project_id;

CREATE VIEW IF NOT EXISTS activity_performance AS
SELECT activity_code,
       COUNT(*)                                                                   AS contract_count,
       COALESCE(SUM(CASE WHEN order_type = 'platform' THEN 1 ELSE 0 END), 0)      AS platform_count,
       COALESCE(SUM(CASE WHEN order_type = 'self_referral' THEN 1 ELSE 0 END), 0) AS self_referral_count,
       COALESCE(SUM(contract_amount_fen), 0)                                      AS total_amount_fen,
       COALESCE(SUM(performance_amount_fen), 0)                                   AS performance_amount_fen,
       COUNT(DISTINCT housekeeper)                                                AS housekeeper_count
FROM performance_records
WHERE is_historical = 0
GROUP BY activity_code;
"#;

/// SQLite-backed fact store
pub struct SqliteFactStore {
    conn: Mutex<Connection>,
}

impl SqliteFactStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(backend)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(backend)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        info!(path = %path.display(), "Opened SQLite fact store");
        Ok(store)
    }

    /// Open an in-memory database (used in tests)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.lock().execute_batch(SCHEMA).map_err(backend)
    }

    fn self_referral_values(
        conn: &Connection,
        column: &str,
        housekeeper: &str,
        activity_code: &str,
    ) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {column} FROM performance_records
             WHERE activity_code = ?1 AND housekeeper = ?2
               AND order_type = 'self_referral' AND is_historical = 0
               AND {column} IS NOT NULL"
        );
        let mut stmt = conn.prepare(&sql).map_err(backend)?;
        let values = stmt
            .query_map(params![activity_code, housekeeper], |row| row.get::<_, String>(0))
            .map_err(backend)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(values
            .iter()
            .filter_map(|value| dedup_key(value))
            .map(str::to_string)
            .collect())
    }

    fn awarded_tiers(
        conn: &Connection,
        housekeeper: &str,
        activity_code: &str,
        stats: &mut HousekeeperStats,
    ) -> Result<()> {
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT order_type, reward_name FROM performance_rewards
                 WHERE activity_code = ?1 AND housekeeper = ?2 AND reward_type = 'tiered'",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![activity_code, housekeeper], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(backend)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(backend)?;
        for (order_type, name) in rows {
            stats.record_tier(order_type_from_str(&order_type)?, &name);
        }
        Ok(())
    }
}

impl FactStore for SqliteFactStore {
    fn exists(&self, contract_id: &str, activity_code: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM performance_records WHERE activity_code = ?1 AND contract_id = ?2",
                params![activity_code, contract_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(backend)?;
        Ok(found.is_some())
    }

    fn stats(&self, housekeeper: &str, activity_code: &str) -> Result<HousekeeperStats> {
        let conn = self.conn.lock();
        let mut stats = HousekeeperStats::empty(housekeeper, activity_code);

        let row = conn
            .query_row(
                "SELECT contract_count, total_amount_fen, performance_amount_fen,
                        platform_count, platform_amount_fen,
                        self_referral_count, self_referral_amount_fen
                 FROM housekeeper_performance
                 WHERE activity_code = ?1 AND housekeeper = ?2",
                params![activity_code, housekeeper],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                },
            )
            .optional()
            .map_err(backend)?;

        if let Some((count, total, performance, platform, platform_amt, self_ref, self_ref_amt)) = row {
            stats.contract_count = count as u64;
            stats.total_amount = from_fen(total);
            stats.performance_amount = from_fen(performance);
            stats.platform_count = platform as u64;
            stats.platform_amount = from_fen(platform_amt);
            stats.self_referral_count = self_ref as u64;
            stats.self_referral_amount = from_fen(self_ref_amt);
            stats.self_referral_addresses = Self::self_referral_values(
                &conn,
                "project_address",
                housekeeper,
                activity_code,
            )?
            .into_iter()
            .collect();
            stats.self_referral_projects =
                Self::self_referral_values(&conn, "project_id", housekeeper, activity_code)?
                    .into_iter()
                    .collect();
            Self::awarded_tiers(&conn, housekeeper, activity_code, &mut stats)?;
        }
        Ok(stats)
    }

    fn project_stats(&self, project_id: &str, activity_code: &str) -> Result<ProjectStats> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT contract_count, total_amount_fen, performance_amount_fen
                 FROM project_performance
                 WHERE activity_code = ?1 AND project_id = ?2",
                params![activity_code, project_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(backend)?;

        let (count, total, performance) = row.unwrap_or((0, 0, 0));
        Ok(ProjectStats {
            project_id: project_id.to_string(),
            activity_code: activity_code.to_string(),
            contract_count: count as u64,
            total_amount: from_fen(total),
            performance_amount: from_fen(performance),
        })
    }

    fn activity_stats(&self, activity_code: &str) -> Result<ActivityStats> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT contract_count, platform_count, self_referral_count,
                        total_amount_fen, performance_amount_fen, housekeeper_count
                 FROM activity_performance
                 WHERE activity_code = ?1",
                params![activity_code],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(backend)?;

        let (count, platform, self_ref, total, performance, housekeepers) =
            row.unwrap_or((0, 0, 0, 0, 0, 0));
        Ok(ActivityStats {
            activity_code: activity_code.to_string(),
            contract_count: count as u64,
            platform_count: platform as u64,
            self_referral_count: self_ref as u64,
            total_amount: from_fen(total),
            performance_amount: from_fen(performance),
            housekeeper_count: housekeepers as u64,
        })
    }

    #[instrument(skip(self, record), fields(activity = %record.activity_code, contract_id = %record.contract_id()))]
    fn persist(&self, record: &PerformanceRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        let contract = &record.contract;
        let order_type = order_type_str(contract.order_type);
        let contract_amount_fen = to_fen(contract.contract_amount)?;
        let performance_amount_fen = to_fen(record.performance_amount)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(backend)?;
        let inserted = tx.execute(
            "INSERT INTO performance_records (
                activity_code, contract_id, housekeeper, service_provider, order_type,
                project_id, project_address, is_historical,
                contract_amount_fen, performance_amount_fen,
                activity_sequence, housekeeper_sequence, created_at, record_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.activity_code,
                contract.contract_id,
                contract.housekeeper,
                contract.service_provider,
                order_type,
                contract.project_id,
                contract.project_address,
                contract.is_historical,
                contract_amount_fen,
                performance_amount_fen,
                record.activity_sequence as i64,
                record.housekeeper_sequence as i64,
                contract.created_at.to_rfc3339(),
                json,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::ConcurrencyViolation {
                    activity_code: record.activity_code.clone(),
                    contract_id: contract.contract_id.clone(),
                }
                .into());
            }
            Err(e) => return Err(backend(e)),
        }

        let record_id = tx.last_insert_rowid();
        for reward in &record.rewards {
            tx.execute(
                "INSERT INTO performance_rewards (
                    record_id, activity_code, housekeeper, order_type,
                    reward_type, reward_name, value
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record_id,
                    record.activity_code,
                    contract.housekeeper,
                    order_type,
                    reward.reward_type.as_str(),
                    reward.reward_name,
                    reward.value.to_string(),
                ],
            )
            .map_err(backend)?;
        }
        tx.commit().map_err(backend)?;

        debug!(rewards = record.rewards.len(), "Persisted performance record");
        Ok(())
    }

    fn records(&self, activity_code: &str) -> Result<Vec<PerformanceRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT record_json FROM performance_records WHERE activity_code = ?1 ORDER BY id ASC")
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![activity_code], |row| row.get::<_, String>(0))
            .map_err(backend)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(backend)?;

        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(IncentiveError::from))
            .collect()
    }

    fn record(&self, contract_id: &str, activity_code: &str) -> Result<Option<PerformanceRecord>> {
        let conn = self.conn.lock();
        let json = conn
            .query_row(
                "SELECT record_json FROM performance_records WHERE activity_code = ?1 AND contract_id = ?2",
                params![activity_code, contract_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(backend)?;
        json.map(|j| serde_json::from_str(&j).map_err(IncentiveError::from))
            .transpose()
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

fn backend(err: rusqlite::Error) -> IncentiveError {
    StoreError::Backend(err.to_string()).into()
}

fn order_type_str(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Platform => "platform",
        OrderType::SelfReferral => "self_referral",
    }
}

fn order_type_from_str(value: &str) -> Result<OrderType> {
    match value {
        "platform" => Ok(OrderType::Platform),
        "self_referral" => Ok(OrderType::SelfReferral),
        other => Err(StoreError::Backend(format!("unknown order_type column value: {}", other)).into()),
    }
}

/// Amount in integer fen (0.01). Sub-fen amounts are refused, never rounded.
fn to_fen(amount: Decimal) -> Result<i64> {
    if !is_whole_fen(amount) {
        return Err(StoreError::Backend(format!("amount finer than one fen: {}", amount)).into());
    }
    (amount * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or_else(|| StoreError::Backend(format!("amount out of range: {}", amount)).into())
}

fn from_fen(fen: i64) -> Decimal {
    Decimal::new(fen, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;
    use incentive_common::{RewardInfo, RewardType};
    use rust_decimal_macros::dec;

    #[test]
    fn test_persist_roundtrip_and_exists() {
        let store = SqliteFactStore::in_memory().unwrap();
        let r = record("bj", "c1", "H", dec!(12500.50), false);

        assert!(!store.exists("c1", "bj").unwrap());
        store.persist(&r).unwrap();
        assert!(store.exists("c1", "bj").unwrap());
        assert_eq!(store.record("c1", "bj").unwrap(), Some(r));
    }

    #[test]
    fn test_unique_key_violation() {
        let store = SqliteFactStore::in_memory().unwrap();
        let r = record("bj", "c1", "H", dec!(1), false);
        store.persist(&r).unwrap();
        let err = store.persist(&r).unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_views_exclude_historical() {
        let store = SqliteFactStore::in_memory().unwrap();
        store.persist(&record("bj", "c1", "H", dec!(100), false)).unwrap();
        store.persist(&record("bj", "h1", "H", dec!(5000), true)).unwrap();
        store.persist(&record("bj", "c2", "H", dec!(200), false)).unwrap();
        store.persist(&record("bj", "h2", "H", dec!(5000), true)).unwrap();
        store.persist(&record("bj", "c3", "H", dec!(300.25), false)).unwrap();

        let stats = store.stats("H", "bj").unwrap();
        assert_eq!(stats.contract_count, 3);
        assert_eq!(stats.performance_amount, dec!(600.25));
        assert_eq!(stats.platform_count, 3);

        let activity = store.activity_stats("bj").unwrap();
        assert_eq!(activity.contract_count, 3);
        assert_eq!(activity.housekeeper_count, 1);

        let ids: Vec<String> = store
            .records("bj")
            .unwrap()
            .into_iter()
            .map(|r| r.contract.contract_id)
            .collect();
        assert_eq!(ids, vec!["c1", "h1", "c2", "h2", "c3"]);
    }

    #[test]
    fn test_self_referral_addresses() {
        let store = SqliteFactStore::in_memory().unwrap();
        let mut r = record("bj", "s1", "H", dec!(100), false);
        r.contract.order_type = OrderType::SelfReferral;
        r.contract.project_address = Some("朝阳区 1 号".into());
        store.persist(&r).unwrap();

        let stats = store.stats("H", "bj").unwrap();
        assert_eq!(stats.self_referral_count, 1);
        assert!(stats.self_referral_addresses.contains("朝阳区 1 号"));
    }

    #[test]
    fn test_padded_dedup_values_are_trimmed() {
        let store = SqliteFactStore::in_memory().unwrap();
        let mut r = record("bj", "s1", "H", dec!(100), false);
        r.contract.order_type = OrderType::SelfReferral;
        r.contract.project_address = Some(" 朝阳区1号 ".into());
        r.contract.project_id = Some("   ".into());
        store.persist(&r).unwrap();

        let stats = store.stats("H", "bj").unwrap();
        assert!(stats.self_referral_addresses.contains("朝阳区1号"));
        assert!(stats.self_referral_projects.is_empty());
    }

    #[test]
    fn test_awarded_tiers_per_channel() {
        let store = SqliteFactStore::in_memory().unwrap();
        let mut r = record("bj", "c1", "H", dec!(60000), false);
        r.rewards.push(RewardInfo::new(RewardType::Tiered, "达标奖", dec!(200)));
        r.rewards.push(RewardInfo::new(RewardType::LuckyNumber, "接好运", dec!(58)));
        store.persist(&r).unwrap();

        let mut s = record("bj", "s1", "H", dec!(30000), false);
        s.contract.order_type = OrderType::SelfReferral;
        s.rewards.push(RewardInfo::new(RewardType::Tiered, "自引达标", dec!(300)));
        store.persist(&s).unwrap();

        let stats = store.stats("H", "bj").unwrap();
        assert!(stats.tier_awarded("达标奖", Some(OrderType::Platform)));
        assert!(!stats.tier_awarded("达标奖", Some(OrderType::SelfReferral)));
        assert!(stats.tier_awarded("自引达标", None));
        assert!(!stats.tier_awarded("接好运", None));
        assert_eq!(stats.platform_tiers.len(), 1);
    }

    #[test]
    fn test_rejected_insert_leaves_no_rewards() {
        let store = SqliteFactStore::in_memory().unwrap();
        let mut r = record("bj", "c1", "H", dec!(60000), false);
        r.rewards.push(RewardInfo::new(RewardType::Tiered, "达标奖", dec!(200)));
        store.persist(&r).unwrap();
        assert!(store.persist(&r).unwrap_err().is_duplicate());

        let count: i64 = store
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM performance_rewards", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_sub_fen_amount_refused() {
        let store = SqliteFactStore::in_memory().unwrap();
        let r = record("bj", "c1", "H", dec!(0.004), false);
        assert!(store.persist(&r).is_err());
        assert!(!store.exists("c1", "bj").unwrap());
        assert_eq!(to_fen(dec!(12.30)).unwrap(), 1230);
    }

    #[test]
    fn test_empty_aggregates() {
        let store = SqliteFactStore::in_memory().unwrap();
        assert_eq!(store.stats("nobody", "bj").unwrap().contract_count, 0);
        assert_eq!(store.project_stats("P", "bj").unwrap().contract_count, 0);
        assert_eq!(store.activity_stats("bj").unwrap().contract_count, 0);
    }
}
