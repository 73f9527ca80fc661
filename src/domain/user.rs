// ==========================================
// 车辆合规管理系统 - 用户与操作主体
// ==========================================
// 对齐: users 表
// ==========================================

use crate::domain::types::UserRole;
use serde::{Deserialize, Serialize};

/// 用户账户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub role: UserRole,
}

impl User {
    pub fn to_actor(&self) -> Actor {
        Actor {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
        }
    }
}

/// 操作主体（由 IdentityProvider 解析）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub display_name: String,
    pub role: UserRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// 管理员或站点运营人员
    pub fn can_operate_stations(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::StationOperator)
    }
}
