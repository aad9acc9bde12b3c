//! # 粘贴图片转换工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 命令行 (clap)                             │
//! │   paste ── watch ── settings show | set | reset          │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↓ PasteEvent
//! ┌───────┼──────────────────────────────────────────────────┐
//! │  ┌─ clipboard ──── arboard 读取 / infer 识别 / 监听      │
//! │  │                                                       │
//! │  ├─ image_handler                                        │
//! │  │   ├─ service    粘贴拦截 + join_all                   │
//! │  │   ├─ handler    解码 → 询问 → 编码                    │
//! │  │   ├─ naming     路径生成                              │
//! │  │   └─ placement  写盘 + 链接/提示                      │
//! │  │                                                       │
//! │  ├─ settings ───── 扁平 JSON 设置 + RwLock 存储          │
//! │  ├─ storage ────── VaultFs (tokio::fs)                   │
//! │  ├─ workspace ──── EditorHost / Notifier                 │
//! │  └─ error ──────── AppError (统一错误类型)               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，命令行入口的返回类型 |
//! | [`clipboard`] | 粘贴事件模型、系统剪贴板读取、剪贴板监听 |
//! | [`image_handler`] | 单条目转码流水线与粘贴拦截服务 |
//! | [`settings`] | 设置的宽松解析、声明式描述与持久化 |
//! | [`storage`] | 仓库内相对路径的异步读写 |
//! | [`workspace`] | 当前文档、编辑器聚焦、链接插入、用户提示 |
//! | [`cli`] | 命令行参数与子命令实现 |

pub mod error;
pub mod cli;
pub mod clipboard;
pub mod image_handler;
pub mod settings;
pub mod storage;
pub mod workspace;
