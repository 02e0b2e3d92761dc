// HMI面板无头运行入口
//
// 加载配置 → 初始化日志 → 建立通信管理器 → 登记控件 → 轮询直到Ctrl-C

use anyhow::Context;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use hmi_lib::logging::init_logger;
use hmi_lib::utils::config::load_config;
use hmi_lib::{CommunicationManager, ModbusTcpPlcClient, PanelService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 第一个参数可指定配置文件路径
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).await.context("加载配置失败")?;

    if let Err(e) = init_logger(&config.logging_config) {
        eprintln!("初始化日志失败: {}", e);
    }
    info!("🚀 HMI面板启动, PLC端点 {}:{}", config.plc_config.host, config.plc_config.port);

    let client = ModbusTcpPlcClient::new(&config.plc_config);
    let manager = Arc::new(CommunicationManager::from_config(Box::new(client), &config));
    let panel = PanelService::from_config(manager.clone(), &config).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("🛑 收到退出信号"),
            Err(e) => error!("❌ 监听退出信号失败: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    panel.run(shutdown_rx).await;

    let status = manager.connection_status().await;
    if !status.read_write_errors.is_empty() {
        info!("退出时仍处于错误状态的变量: {:?}", status.read_write_errors);
    }
    manager.dispose().await;
    info!("👋 HMI面板已退出");
    Ok(())
}
