//! 命令行入口
//!
//! # 设计思路
//!
//! 命令行充当宿主：仓库目录即 vault，`--note` 指定的笔记即“当前文档”，
//! 笔记聚焦时嵌入链接追加到笔记末尾。
//!
//! - `paste`：处理一次粘贴（系统剪贴板或 `--file` 给出的文件）
//! - `watch`：监听剪贴板，每次变化处理一次
//! - `settings`：查看、修改、重置设置

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::clipboard::listener::{
    CLIPBOARD_EVENT_MIN_INTERVAL_DEFAULT_MS, ChangeDebouncer, start_monitoring,
};
use crate::clipboard::{PasteEvent, capture_system_clipboard, item_from_file};
use crate::error::AppError;
use crate::image_handler::{
    DisabledPrompt, ImageHandler, ItemOutcome, OverridePrompt, PasteReport, PasteService,
    StdinPrompt,
};
use crate::settings::{SettingKind, SettingsStore, settings_schema};
use crate::storage::LocalVault;
use crate::workspace::{ConsoleNotifier, NoteWorkspace};

const APP_DIR_NAME: &str = "paste-image-converter";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// 将粘贴的图片转码为 JPEG / WebP 并嵌入笔记
#[derive(Parser, Debug)]
#[command(name = "paste-image")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// 仓库根目录
    #[arg(long, global = true, default_value = ".")]
    pub vault: PathBuf,

    /// 设置文件路径（默认位于系统配置目录）
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 处理一次粘贴
    Paste(PasteArgs),
    /// 监听剪贴板变化并持续处理
    Watch(WatchArgs),
    /// 查看或修改设置
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Args, Debug, Clone)]
pub struct EditorArgs {
    /// 当前笔记（仓库内相对路径）
    #[arg(long)]
    pub note: Option<String>,

    /// 视为编辑器未聚焦：不插入链接
    #[arg(long)]
    pub unfocused: bool,
}

#[derive(Args, Debug)]
pub struct PasteArgs {
    /// 以文件代替系统剪贴板作为粘贴内容，可重复
    #[arg(long = "file")]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub editor: EditorArgs,

    /// 在终端中询问每张图片的参数
    #[arg(long)]
    pub interactive: bool,

    /// 以 JSON 输出处理报告
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub editor: EditorArgs,

    /// 合并连续剪贴板变化的最小间隔（毫秒）
    #[arg(long, default_value_t = CLIPBOARD_EVENT_MIN_INTERVAL_DEFAULT_MS)]
    pub interval_ms: u64,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// 显示全部设置项
    Show,
    /// 修改一个设置项
    Set { key: String, value: String },
    /// 恢复默认设置
    Reset,
}

/// 默认设置文件位置：`<config_dir>/paste-image-converter/settings.json`。
pub fn default_settings_path() -> Result<PathBuf, AppError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
        .ok_or_else(|| AppError::Settings("无法确定系统配置目录，请使用 --settings 指定".to_string()))
}

fn open_settings(cli_path: Option<&PathBuf>) -> Result<Arc<SettingsStore>, AppError> {
    let path = match cli_path {
        Some(path) => path.clone(),
        None => default_settings_path()?,
    };
    log::debug!("⚙️ 设置文件: {}", path.display());
    Ok(Arc::new(SettingsStore::load(path)?))
}

fn build_service(
    vault_root: &Path,
    settings: Arc<SettingsStore>,
    editor: &EditorArgs,
    interactive: bool,
) -> Result<PasteService, AppError> {
    let vault = LocalVault::open(vault_root)?;
    let host = NoteWorkspace::new(vault.root(), editor.note.clone(), !editor.unfocused);
    let prompt: Arc<dyn OverridePrompt> = if interactive {
        Arc::new(StdinPrompt)
    } else {
        Arc::new(DisabledPrompt)
    };

    let handler = ImageHandler::new(
        settings,
        Arc::new(vault),
        Arc::new(host),
        Arc::new(ConsoleNotifier),
        prompt,
    );
    Ok(PasteService::new(handler))
}

/// 执行命令。
pub async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = open_settings(cli.settings.as_ref())?;

    match cli.command {
        Commands::Paste(args) => run_paste(&cli.vault, settings, args).await,
        Commands::Watch(args) => run_watch(&cli.vault, settings, args).await,
        Commands::Settings { action } => run_settings(&settings, action),
    }
}

async fn run_paste(
    vault_root: &Path,
    settings: Arc<SettingsStore>,
    args: PasteArgs,
) -> Result<(), AppError> {
    let service = build_service(vault_root, settings, &args.editor, args.interactive)?;

    let event = if args.files.is_empty() {
        capture_system_clipboard()?
    } else {
        let items = args
            .files
            .iter()
            .map(|path| item_from_file(path))
            .collect::<Result<Vec<_>, _>>()?;
        PasteEvent::new(items)
    };

    let report = service.handle_paste(&event).await?;
    if report.failed_count() > 0 {
        log::warn!("⚠️ {} 张图片处理失败", report.failed_count());
    }
    if args.json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| AppError::Settings(format!("报告序列化失败: {}", e)))?;
        println!("{}", rendered);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &PasteReport) {
    if !report.suppressed {
        println!("没有需要转换的图片，保持默认粘贴");
        return;
    }
    for item in &report.items {
        match &item.outcome {
            ItemOutcome::Linked { path, link } => {
                println!("#{} {} -> {}  {}", item.index, item.mime, path, link)
            }
            ItemOutcome::SavedWithoutLink { path } => {
                println!("#{} {} -> {}（未插入链接）", item.index, item.mime, path)
            }
            ItemOutcome::Cancelled => println!("#{} {} 已取消", item.index, item.mime),
            ItemOutcome::Failed(error) => println!(
                "#{} {} 失败 [{}:{}] {}",
                item.index, item.mime, error.stage, error.code, error.message
            ),
        }
    }
}

async fn run_watch(
    vault_root: &Path,
    settings: Arc<SettingsStore>,
    args: WatchArgs,
) -> Result<(), AppError> {
    let service = build_service(vault_root, settings, &args.editor, false)?;
    let mut changes = ChangeDebouncer::new(start_monitoring(), args.interval_ms);

    log::info!("👀 正在监听剪贴板，仓库: {}", vault_root.display());
    while changes.next().await.is_some() {
        let event = match capture_system_clipboard() {
            Ok(event) => event,
            Err(e) => {
                log::warn!("读取剪贴板失败: {}", e);
                continue;
            }
        };
        if event.is_empty() {
            continue;
        }

        match service.handle_paste(&event).await {
            Ok(report) => print_report(&report),
            Err(e) => log::error!("处理粘贴失败: {}", e),
        }
    }
    Ok(())
}

fn run_settings(store: &SettingsStore, action: SettingsAction) -> Result<(), AppError> {
    match action {
        SettingsAction::Show => {
            let current = store.snapshot()?;
            for descriptor in settings_schema() {
                let value = current.display_value(descriptor.key).unwrap_or_default();
                let hint = match descriptor.kind {
                    SettingKind::Text { placeholder } if !placeholder.is_empty() => {
                        format!("例如 {}", placeholder)
                    }
                    SettingKind::Text { .. } => String::new(),
                    SettingKind::Dropdown { options } => options
                        .iter()
                        .map(|(value, label)| format!("{}={}", value, label))
                        .collect::<Vec<_>>()
                        .join(", "),
                    SettingKind::Toggle => "true | false".to_string(),
                };
                println!("{:<20} = {:<12} {}", descriptor.key, value, descriptor.label);
                println!("{:<20}   {}", "", descriptor.description);
                if !hint.is_empty() || !descriptor.constraints.is_empty() {
                    println!("{:<20}   {} {}", "", hint, descriptor.constraints);
                }
            }
            if let Some(path) = store.path() {
                println!("\n设置文件: {}", path.display());
            }
        }
        SettingsAction::Set { key, value } => {
            let updated = store.update(|settings| settings.set_field(&key, &value))?;
            println!(
                "{} = {}",
                key,
                updated.display_value(&key).unwrap_or_default()
            );
        }
        SettingsAction::Reset => {
            store.reset()?;
            println!("已恢复默认设置");
        }
    }
    Ok(())
}
