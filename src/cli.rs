// src/cli.rs

use clap::{Parser, Subcommand};

use crate::sync::DeviceRegistry;

#[derive(Parser)]
#[command(name = "csync-server")]
#[command(about = "Cross-device continuity sync server and management CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 启动同步服务器 (默认)
    Server,

    /// 设备管理命令
    #[command(subcommand)]
    Device(DeviceCommands),
}

#[derive(Subcommand)]
pub enum DeviceCommands {
    /// 列出某用户的设备及活跃状态
    List {
        /// 用户 ID
        #[arg(short, long)]
        user_id: String,
    },
}

pub struct CliHandler {
    registry: DeviceRegistry,
}

impl CliHandler {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self { registry }
    }

    pub async fn handle_device_command(&self, cmd: DeviceCommands) -> anyhow::Result<()> {
        match cmd {
            DeviceCommands::List { user_id } => {
                let devices = self.registry.get_devices(&user_id).await?;

                if devices.is_empty() {
                    println!("用户 '{}' 没有任何设备", user_id);
                    return Ok(());
                }

                println!(
                    "{:<28} {:<9} {:<20} {:<34} 状态",
                    "设备ID", "类型", "名称", "最后心跳"
                );
                for d in devices {
                    println!(
                        "{:<28} {:<9} {:<20} {:<34} {}",
                        d.device_id,
                        d.device_type.to_string(),
                        d.device_name.as_deref().unwrap_or("-"),
                        d.last_heartbeat.to_rfc3339(),
                        if d.is_active { "在线" } else { "离线" }
                    );
                }
            }
        }
        Ok(())
    }
}
