//! # 粘贴图片转换工具 — 应用入口
//!
//! 本文件仅负责日志初始化与命令分发。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::process::ExitCode;

use clap::Parser;
use paste_image_converter::cli::{self, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    match cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ {}", err);
            eprintln!("错误: {}", err);
            ExitCode::FAILURE
        }
    }
}
