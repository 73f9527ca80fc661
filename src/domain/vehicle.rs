// ==========================================
// 车辆合规管理系统 - 车辆领域模型
// ==========================================
// 对齐: vehicles 表
// 红线: compliance_status 为缓存值，读取方需通过 ComplianceStatusEngine 校正
// ==========================================

use crate::domain::types::{ComplianceStatus, VehicleType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Vehicle - 车辆
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    // ===== 主键 =====
    pub vehicle_id: String,

    // ===== 基础信息 =====
    pub plate_number: String, // 车牌号（提醒消息中展示）
    pub owner_id: String,     // 车主用户ID（提醒接收人）
    pub vehicle_type: VehicleType,

    // ===== 证书 =====
    pub test_date: Option<NaiveDate>,   // 最近检测日期
    pub expiry_date: Option<NaiveDate>, // 证书到期日 (null表示无证书要求)

    // ===== 缓存状态 =====
    pub compliance_status: ComplianceStatus,

    // ===== 审计 =====
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// VehicleFilter - 车辆查询条件
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    /// 仅返回有到期日的车辆
    pub with_expiry_only: bool,
    /// 按车主过滤
    pub owner_id: Option<String>,
    /// 按缓存状态过滤
    pub status: Option<ComplianceStatus>,
}

impl VehicleFilter {
    /// 全部车辆
    pub fn all() -> Self {
        Self::default()
    }

    /// 有到期日的车辆（每日巡检使用）
    pub fn with_expiry() -> Self {
        Self {
            with_expiry_only: true,
            ..Self::default()
        }
    }
}
