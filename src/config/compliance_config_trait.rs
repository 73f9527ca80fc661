// ==========================================
// 车辆合规管理系统 - 合规配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::compliance_config::{LoadConfig, RecommendationConfig, SchedulerConfig};
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ComplianceConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ComplianceConfigReader: Send + Sync {
    /// 获取提醒调度配置
    ///
    /// # 默认值
    /// - offsets [30,15,7,1]，提醒 09:00，巡检 09:00，周报 周日 10:00
    async fn get_scheduler_config(&self) -> Result<SchedulerConfig, Box<dyn Error + Send + Sync>>;

    /// 获取站点负载配置
    ///
    /// # 默认值
    /// - 窗口 60 分钟，busy >= 10，normal >= 5
    async fn get_load_config(&self) -> Result<LoadConfig, Box<dyn Error + Send + Sync>>;

    /// 获取站点推荐配置
    ///
    /// # 默认值
    /// - 半径 20km，Top 3
    async fn get_recommendation_config(
        &self,
    ) -> Result<RecommendationConfig, Box<dyn Error + Send + Sync>>;
}
