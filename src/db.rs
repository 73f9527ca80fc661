// ==========================================
// 车辆合规管理系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键级联依赖 foreign_keys=ON）
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 幂等建表（CREATE TABLE IF NOT EXISTS）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化 schema（幂等）
///
/// 表:
/// - users / vehicles / stations / compliance_checks / station_ratings / notifications
/// - config_kv（全局配置，scope_id='global'）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            email TEXT,
            role TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS vehicles (
            vehicle_id TEXT PRIMARY KEY,
            plate_number TEXT NOT NULL UNIQUE,
            owner_id TEXT NOT NULL,
            vehicle_type TEXT NOT NULL,
            test_date TEXT,
            expiry_date TEXT,
            compliance_status TEXT NOT NULL DEFAULT 'valid',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_vehicles_owner ON vehicles(owner_id);

        CREATE TABLE IF NOT EXISTS stations (
            station_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_open INTEGER NOT NULL DEFAULT 1,
            is_approved INTEGER NOT NULL DEFAULT 0,
            approved_at TEXT,
            approval_notes TEXT,
            live_load TEXT NOT NULL DEFAULT 'normal',
            availability TEXT NOT NULL DEFAULT 'available',
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS compliance_checks (
            check_id TEXT PRIMARY KEY,
            vehicle_id TEXT NOT NULL REFERENCES vehicles(vehicle_id) ON DELETE CASCADE,
            station_id TEXT NOT NULL REFERENCES stations(station_id),
            actor_id TEXT NOT NULL,
            method TEXT NOT NULL,
            status TEXT NOT NULL,
            note TEXT,
            checked_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_checks_station_time
          ON compliance_checks(station_id, checked_at);

        CREATE INDEX IF NOT EXISTS idx_checks_vehicle_time
          ON compliance_checks(vehicle_id, checked_at);

        CREATE TABLE IF NOT EXISTS station_ratings (
            station_id TEXT NOT NULL REFERENCES stations(station_id) ON DELETE CASCADE,
            rater_id TEXT NOT NULL,
            compliance_strictness INTEGER NOT NULL,
            waiting_time INTEGER NOT NULL,
            service_quality INTEGER NOT NULL,
            overall_rating REAL NOT NULL,
            review TEXT,
            created_at TEXT NOT NULL,
            PRIMARY KEY (station_id, rater_id)
        );

        CREATE TABLE IF NOT EXISTS notifications (
            notification_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            category TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
          ON notifications(user_id, created_at);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}
