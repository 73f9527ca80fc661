// ==========================================
// 合规 API 集成测试
// ==========================================
// 职责: 验证检查登记、到期日维护、状态查询、历史/统计/趋势、删除级联
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod compliance_api_test {
    use chrono::Duration;
    use fuellens_core::api::{ApiError, VehicleStatusView};
    use fuellens_core::domain::{AvailabilityTier, CheckMethod, ComplianceStatus, LoadTier, StatusCounts};
    use fuellens_core::repository::ComplianceCheckRepository;
    use std::sync::Arc;

    use crate::test_helpers::{at, base_day, FailingDispatcher, TestEnv, ADMIN_1, OPERATOR_1, OWNER_1};

    fn env_with_station() -> TestEnv {
        let env = TestEnv::new(at(base_day(), 12, 0));
        env.seed_station("S1", Some((12.97, 77.59)), LoadTier::Free, AvailabilityTier::Available);
        env
    }

    // ==========================================
    // 检查登记
    // ==========================================

    #[test]
    fn test_record_check_snapshots_status_and_keeps_schedule() {
        let env = env_with_station();
        // 入库缓存为 valid，实际 20 天后到期
        let expiry = base_day() + Duration::days(20);
        env.seed_vehicle("V1", "KA03AB0001", Some(expiry));
        env.scheduler.arm("V1", expiry).unwrap();

        let check = env
            .compliance_api
            .record_compliance_check("V1", "S1", OPERATOR_1, CheckMethod::Scanned, Some("前挡风".to_string()))
            .unwrap();
        assert_eq!(check.status, ComplianceStatus::ExpiringSoon);
        assert_eq!(check.actor_id, OPERATOR_1);
        assert_eq!(check.checked_at, at(base_day(), 12, 0));

        assert_eq!(env.vehicle("V1").compliance_status, ComplianceStatus::ExpiringSoon);

        // 检查不改变到期日: 已排期的 15/7/1 原样保留，不产生替换记录
        let offsets: Vec<i64> = env
            .scheduler
            .pending_reminders("V1")
            .unwrap()
            .iter()
            .map(|r| r.offset_days)
            .collect();
        assert_eq!(offsets, vec![15, 7, 1]);
        assert!(env.scheduler.scheduling_conflicts().unwrap().is_empty());

        let history = env.compliance_api.compliance_history("V1", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].check_id, check.check_id);
        assert_eq!(history[0].method, CheckMethod::Scanned);
        assert_eq!(history[0].note.as_deref(), Some("前挡风"));
    }

    #[test]
    fn test_record_check_permissions_and_missing_entities() {
        let env = env_with_station();
        env.seed_vehicle("V1", "KA03AB0002", Some(base_day() + Duration::days(90)));
        let api = &env.compliance_api;

        assert!(matches!(
            api.record_compliance_check("V1", "S1", OWNER_1, CheckMethod::Manual, None),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            api.record_compliance_check("V1", "S1", "GHOST", CheckMethod::Manual, None),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            api.record_compliance_check("NOPE", "S1", OPERATOR_1, CheckMethod::Manual, None),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            api.record_compliance_check("V1", "NOPE", OPERATOR_1, CheckMethod::Manual, None),
            Err(ApiError::NotFound(_))
        ));

        // 管理员可登记
        api.record_compliance_check("V1", "S1", ADMIN_1, CheckMethod::Photographed, None)
            .unwrap();
        assert_eq!(api.compliance_history("V1", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_dispatch_failure_keeps_check_and_status() {
        let failing = Arc::new(FailingDispatcher::default());
        let env = TestEnv::with_dispatcher(at(base_day(), 8, 0), failing.clone());
        env.seed_station("S1", Some((12.97, 77.59)), LoadTier::Free, AvailabilityTier::Available);
        let expiry = base_day() + Duration::days(30);
        env.seed_vehicle("V1", "KA03AB0003", Some(expiry));
        env.scheduler.arm("V1", expiry).unwrap();

        env.compliance_api
            .record_compliance_check("V1", "S1", OPERATOR_1, CheckMethod::Manual, None)
            .unwrap();

        // 30 天提醒 09:00 触发，投递失败
        env.clock.set(at(base_day(), 9, 0));
        let report = env.scheduler.run_pending().unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(report.reminders_delivered, 0);
        assert_eq!(report.failures, 0);
        assert!(failing.attempts() > 0);

        assert_eq!(env.compliance_api.compliance_history("V1", 10).unwrap().len(), 1);
        assert_eq!(env.vehicle("V1").compliance_status, ComplianceStatus::ExpiringSoon);
    }

    #[test]
    fn test_check_does_not_undo_concurrent_expiry_set() {
        let env = env_with_station();
        env.seed_vehicle("V1", "KA03AB0010", None);
        let (interleaving, api, _) = env.interleaved_apis();

        // 检查读到“无到期日”之后、写入之前，到期日被设为 40 天后
        let editor = env.shared_compliance_api();
        interleaving.before_save_check(move || {
            editor
                .set_vehicle_expiry("V1", Some(base_day() + Duration::days(40)))
                .unwrap();
        });

        let check = api
            .record_compliance_check("V1", "S1", OPERATOR_1, CheckMethod::Manual, None)
            .unwrap();
        assert_eq!(check.status, ComplianceStatus::Valid);

        assert_eq!(env.vehicle("V1").expiry_date, Some(base_day() + Duration::days(40)));
        assert_eq!(env.scheduler.pending_reminders("V1").unwrap().len(), 4);
    }

    #[test]
    fn test_check_does_not_overwrite_concurrent_expiry_change() {
        let env = env_with_station();
        // 缓存 valid 已过时（实际 10 天后到期），检查会尝试回写 expiring_soon
        let old_expiry = base_day() + Duration::days(10);
        let new_expiry = base_day() + Duration::days(100);
        env.seed_vehicle("V1", "KA03AB0011", Some(old_expiry));
        env.scheduler.arm("V1", old_expiry).unwrap();
        let (interleaving, api, _) = env.interleaved_apis();

        let editor = env.shared_compliance_api();
        interleaving.before_save_check(move || {
            editor.set_vehicle_expiry("V1", Some(new_expiry)).unwrap();
        });

        let check = api
            .record_compliance_check("V1", "S1", OPERATOR_1, CheckMethod::Manual, None)
            .unwrap();
        assert_eq!(check.status, ComplianceStatus::ExpiringSoon);

        let stored = env.vehicle("V1");
        assert_eq!(stored.expiry_date, Some(new_expiry));
        assert_eq!(stored.compliance_status, ComplianceStatus::Valid);
        let offsets: Vec<i64> = env
            .scheduler
            .pending_reminders("V1")
            .unwrap()
            .iter()
            .map(|r| r.offset_days)
            .collect();
        assert_eq!(offsets, vec![30, 15, 7, 1]);
        assert!(env
            .scheduler
            .pending_reminders("V1")
            .unwrap()
            .iter()
            .all(|r| r.due_at.date() == new_expiry - Duration::days(r.offset_days)));
    }

    // ==========================================
    // 到期日 / 状态
    // ==========================================

    #[test]
    fn test_set_and_clear_expiry() {
        let env = env_with_station();
        env.seed_vehicle("V1", "KA03AB0004", None);

        let vehicle = env
            .compliance_api
            .set_vehicle_expiry("V1", Some(base_day() - Duration::days(2)))
            .unwrap();
        assert_eq!(vehicle.compliance_status, ComplianceStatus::Expired);
        assert!(env.scheduler.pending_reminders("V1").unwrap().is_empty());

        env.compliance_api
            .set_vehicle_expiry("V1", Some(base_day() + Duration::days(60)))
            .unwrap();
        assert_eq!(env.scheduler.pending_reminders("V1").unwrap().len(), 4);

        // 清除到期日: 视为 valid，提醒全部取消
        let cleared = env.compliance_api.set_vehicle_expiry("V1", None).unwrap();
        assert_eq!(cleared.compliance_status, ComplianceStatus::Valid);
        assert_eq!(cleared.expiry_date, None);
        assert!(env.scheduler.pending_reminders("V1").unwrap().is_empty());

        assert!(matches!(
            env.compliance_api.set_vehicle_expiry("NOPE", None),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_vehicle_status_refreshes_stale_cache() {
        let env = env_with_station();
        env.seed_vehicle("V1", "KA03AB0005", Some(base_day() - Duration::days(1)));

        let view = env.compliance_api.vehicle_status("V1").unwrap();
        assert_eq!(view.status, ComplianceStatus::Expired);
        // 已过期的剩余天数截断为 0
        assert_eq!(view.days_to_expiry, Some(0));
        assert!(view.refreshed);
        assert_eq!(env.vehicle("V1").compliance_status, ComplianceStatus::Expired);

        let again = env.compliance_api.vehicle_status("V1").unwrap();
        assert!(!again.refreshed);
        assert_eq!(again.days_to_expiry, Some(0));

        assert!(matches!(
            env.compliance_api.vehicle_status("NOPE"),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_status_boundary_days() {
        let env = env_with_station();
        env.seed_vehicle("V30", "B-30", Some(base_day() + Duration::days(30)));
        env.seed_vehicle("V31", "B-31", Some(base_day() + Duration::days(31)));
        env.seed_vehicle("V0", "B-0", Some(base_day()));

        let api = &env.compliance_api;
        assert_eq!(api.vehicle_status("V30").unwrap().status, ComplianceStatus::ExpiringSoon);
        assert_eq!(api.vehicle_status("V31").unwrap().status, ComplianceStatus::Valid);
        // 到期当天仍未过期
        assert_eq!(api.vehicle_status("V0").unwrap().status, ComplianceStatus::ExpiringSoon);
    }

    // ==========================================
    // 删除级联
    // ==========================================

    #[test]
    fn test_delete_vehicle_cascades_checks() {
        let env = env_with_station();
        env.seed_vehicle("V1", "KA03AB0006", Some(base_day() + Duration::days(45)));
        for _ in 0..2 {
            env.compliance_api
                .record_compliance_check("V1", "S1", OPERATOR_1, CheckMethod::Manual, None)
                .unwrap();
            env.clock.advance(Duration::minutes(3));
        }

        let checks = ComplianceCheckRepository::from_connection(env.conn.clone());
        assert_eq!(checks.count_for_vehicle("V1").unwrap(), 2);

        env.compliance_api.delete_vehicle("V1").unwrap();
        assert_eq!(checks.count_for_vehicle("V1").unwrap(), 0);
        assert!(env.scheduler.pending_reminders("V1").unwrap().is_empty());

        assert!(matches!(
            env.compliance_api.delete_vehicle("V1"),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            env.compliance_api.compliance_history("V1", 10),
            Err(ApiError::NotFound(_))
        ));
    }

    // ==========================================
    // 历史 / 统计 / 趋势
    // ==========================================

    #[test]
    fn test_history_is_newest_first_and_limited() {
        let env = env_with_station();
        env.seed_vehicle("V1", "KA03AB0007", Some(base_day() + Duration::days(120)));

        let mut ids = Vec::new();
        for _ in 0..3 {
            let check = env
                .compliance_api
                .record_compliance_check("V1", "S1", OPERATOR_1, CheckMethod::Manual, None)
                .unwrap();
            ids.push(check.check_id);
            env.clock.advance(Duration::minutes(10));
        }

        let history = env.compliance_api.compliance_history("V1", 2).unwrap();
        let got: Vec<&str> = history.iter().map(|c| c.check_id.as_str()).collect();
        assert_eq!(got, vec![ids[2].as_str(), ids[1].as_str()]);

        assert!(matches!(
            env.compliance_api.compliance_history("V1", 0),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_station_compliance_stats() {
        let env = env_with_station();
        env.seed_vehicle("V1", "STAT-VALID", Some(base_day() + Duration::days(200)));
        env.seed_vehicle("V2", "STAT-SOON", Some(base_day() + Duration::days(5)));
        env.seed_vehicle("V3", "STAT-EXPIRED", Some(base_day() - Duration::days(5)));

        for vehicle_id in ["V1", "V2", "V3"] {
            env.compliance_api
                .record_compliance_check(vehicle_id, "S1", OPERATOR_1, CheckMethod::Manual, None)
                .unwrap();
            env.clock.advance(Duration::minutes(1));
        }

        let stats = env.compliance_api.station_compliance_stats("S1").unwrap();
        assert_eq!(stats.total_checks, 3);
        assert_eq!(
            stats.counts,
            StatusCounts {
                valid: 1,
                expiring_soon: 1,
                expired: 1,
            }
        );
        assert!((stats.compliance_rate_pct - 100.0 / 3.0).abs() < 1e-9);

        assert!(matches!(
            env.compliance_api.station_compliance_stats("NOPE"),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_compliance_trends_by_day() {
        let env = env_with_station();
        env.seed_station("S2", Some((12.90, 77.60)), LoadTier::Free, AvailabilityTier::Available);
        env.seed_vehicle("V1", "TREND-1", Some(base_day() + Duration::days(200)));

        let record = |station_id: &str| {
            env.compliance_api
                .record_compliance_check("V1", station_id, OPERATOR_1, CheckMethod::Manual, None)
                .unwrap();
        };

        // 窗口外
        env.clock.set(at(base_day() - Duration::days(10), 12, 0));
        record("S1");
        // 第 1 天两次
        env.clock.set(at(base_day(), 9, 0));
        record("S1");
        env.clock.set(at(base_day(), 15, 0));
        record("S2");
        // 第 2 天一次
        env.clock.set(at(base_day() + Duration::days(1), 0, 0));
        record("S1");

        let trends = env.compliance_api.compliance_trends(None, 7).unwrap();
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].date, base_day());
        assert_eq!(trends[0].checks, 2);
        assert_eq!(trends[1].date, base_day() + Duration::days(1));
        assert_eq!(trends[1].checks, 1);

        let s2 = env.compliance_api.compliance_trends(Some("S2"), 7).unwrap();
        assert_eq!(s2.len(), 1);
        assert_eq!(s2[0].counts.valid, 1);

        assert!(matches!(
            env.compliance_api.compliance_trends(None, 0),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            env.compliance_api.compliance_trends(None, 366),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_vehicle_status_view_json_round_trip() {
        let env = env_with_station();
        env.seed_vehicle("V1", "KA03AB0012", None);
        env.compliance_api
            .set_vehicle_expiry("V1", Some(base_day() + Duration::days(20)))
            .unwrap();

        let view = env.compliance_api.vehicle_status("V1").unwrap();
        assert_eq!(view.pending_reminders.len(), 3);

        let json = serde_json::to_string(&view).unwrap();
        let parsed: VehicleStatusView = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, view);
    }
}
