// ==========================================
// 车辆合规管理系统 - 提醒调度服务入口
// ==========================================
// 职责: 初始化日志与应用状态，恢复定时任务，运行计时服务直到 Ctrl-C
// ==========================================

use std::sync::Arc;

use anyhow::{anyhow, Context};
use fuellens_core::app::{get_default_db_path, AppState};
use fuellens_core::engine::SystemClock;
use fuellens_core::logging;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", fuellens_core::APP_NAME);
    tracing::info!("系统版本: {}", fuellens_core::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path, Arc::new(SystemClock))
        .await
        .map_err(|e| anyhow!(e))
        .context("无法初始化AppState")?;
    state
        .restore_timers()
        .map_err(|e| anyhow!(e))
        .context("定时任务恢复失败")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let service = tokio::spawn(state.scheduler.clone().run(shutdown_rx));

    tokio::signal::ctrl_c().await.context("监听退出信号失败")?;
    tracing::info!("收到退出信号，正在停止调度服务...");
    let _ = shutdown_tx.send(true);
    service.await.context("调度服务异常退出")?;

    tracing::info!("已退出");
    Ok(())
}
