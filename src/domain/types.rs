// ==========================================
// 车辆合规管理系统 - 领域类型定义
// ==========================================
// 职责: 合规状态、负载等级、供应等级、检查方式等枚举
// 存储: 数据库统一使用小写 snake_case 字符串
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 合规状态 (Compliance Status)
// ==========================================
// 仅由证书到期日与当前日期派生，不可直接设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Valid,        // 有效
    ExpiringSoon, // 即将到期（30天内）
    Expired,      // 已过期
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ComplianceStatus {
    /// 全部状态（用于统计汇总时保证输出顺序稳定）
    pub const ALL: [ComplianceStatus; 3] = [
        ComplianceStatus::Valid,
        ComplianceStatus::ExpiringSoon,
        ComplianceStatus::Expired,
    ];

    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "expiring_soon" => ComplianceStatus::ExpiringSoon,
            "expired" => ComplianceStatus::Expired,
            _ => ComplianceStatus::Valid, // 默认值
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ComplianceStatus::Valid => "valid",
            ComplianceStatus::ExpiringSoon => "expiring_soon",
            ComplianceStatus::Expired => "expired",
        }
    }
}

// ==========================================
// 检查方式 (Check Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckMethod {
    Manual,       // 人工录入
    Scanned,      // 扫码
    Photographed, // 拍照识别
}

impl fmt::Display for CheckMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl CheckMethod {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "scanned" | "qr" => CheckMethod::Scanned,
            "photographed" | "camera" => CheckMethod::Photographed,
            _ => CheckMethod::Manual,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CheckMethod::Manual => "manual",
            CheckMethod::Scanned => "scanned",
            CheckMethod::Photographed => "photographed",
        }
    }
}

// ==========================================
// 站点负载等级 (Load Tier)
// ==========================================
// 由 LoadTracker 根据近一小时检查数派生
// 评分: free=30, normal=15, busy=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadTier {
    Free,   // 空闲
    Normal, // 正常
    Busy,   // 繁忙
}

impl fmt::Display for LoadTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl LoadTier {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "free" => LoadTier::Free,
            "busy" => LoadTier::Busy,
            _ => LoadTier::Normal, // 默认值
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            LoadTier::Free => "free",
            LoadTier::Normal => "normal",
            LoadTier::Busy => "busy",
        }
    }
}

// ==========================================
// 站点供应等级 (Availability Tier)
// ==========================================
// 评分: available=20, limited=10, unavailable=0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityTier {
    Available,   // 充足
    Limited,     // 紧张
    Unavailable, // 断供
}

impl fmt::Display for AvailabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl AvailabilityTier {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "limited" => AvailabilityTier::Limited,
            "unavailable" => AvailabilityTier::Unavailable,
            _ => AvailabilityTier::Available,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AvailabilityTier::Available => "available",
            AvailabilityTier::Limited => "limited",
            AvailabilityTier::Unavailable => "unavailable",
        }
    }
}

// ==========================================
// 用户角色 (User Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,           // 管理员
    StationOperator, // 站点操作员
    VehicleOwner,    // 车主
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl UserRole {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => UserRole::Admin,
            "station_operator" => UserRole::StationOperator,
            _ => UserRole::VehicleOwner,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::StationOperator => "station_operator",
            UserRole::VehicleOwner => "vehicle_owner",
        }
    }
}

// ==========================================
// 通知类别 (Notification Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    ComplianceExpiry, // 到期提醒
    System,           // 系统消息（周报等）
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl NotificationCategory {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "compliance_expiry" => NotificationCategory::ComplianceExpiry,
            _ => NotificationCategory::System,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            NotificationCategory::ComplianceExpiry => "compliance_expiry",
            NotificationCategory::System => "system",
        }
    }
}

// ==========================================
// 车辆类型 (Vehicle Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Car,
    Auto,
    Bus,
    Truck,
    Bike,
}

impl VehicleType {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "auto" => VehicleType::Auto,
            "bus" => VehicleType::Bus,
            "truck" => VehicleType::Truck,
            "bike" => VehicleType::Bike,
            _ => VehicleType::Car,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Auto => "auto",
            VehicleType::Bus => "bus",
            VehicleType::Truck => "truck",
            VehicleType::Bike => "bike",
        }
    }
}
