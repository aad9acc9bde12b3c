//! 粘贴转换设置模块
//!
//! # 设计思路
//!
//! 设置是一条扁平的键值记录（JSON 对象），启动时加载，每次变更后立即落盘。
//! 键名沿用旧数据文件的写法（`compression`、`maxdim`、`imgFormat` ……），
//! 旧文件中数值字段以字符串保存，因此读取时同时接受字符串与数字。
//!
//! # 实现思路
//!
//! - `PasteSettings::from_json` 逐键宽松解析：缺失键取默认值，未知键忽略，
//!   非法值记录警告后回退默认值，保证不变量（质量在 (0,1]、尺寸为非负整数）。
//! - `SettingsStore` 以 `RwLock` 持有唯一的可变配置；流水线只读取 `snapshot()`，
//!   写入统一走 `update()`，写完即持久化（并发写入以最后一次为准）。
//! - `settings_schema()` 以声明式列表描述每个设置项，供外部设置界面渲染。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::{Map, Value};

use crate::error::AppError;
use crate::image_handler::{DEFAULT_QUALITY, OutputFormat, TranscodeParams};

pub const KEY_COMPRESSION: &str = "compression";
pub const KEY_MAX_DIMENSION: &str = "maxdim";
pub const KEY_PREFIX: &str = "imgPrefix";
pub const KEY_OUTPUT_DIRECTORY: &str = "imgPath";
pub const KEY_FORMAT: &str = "imgFormat";
pub const KEY_EDITOR_ONLY: &str = "convertInEditorOnly";
pub const KEY_ASK_USER: &str = "askUser";
pub const KEY_SAVE_ASKED: &str = "saveaskUser";

/// 粘贴转换配置。
#[derive(Debug, Clone, PartialEq)]
pub struct PasteSettings {
    /// 压缩质量，取值 (0,1]。
    pub compression_quality: f32,
    /// 长边超过该值时缩放；`<= 49` 表示不缩放。
    pub max_dimension: u32,
    /// 文件名前缀，可包含相对目录（如 `assets/img-`）。
    pub filename_prefix: String,
    /// 输出目录（仓库内绝对路径）；为空时与当前文档同目录。
    pub output_directory: String,
    /// 输出格式。
    pub output_format: OutputFormat,
    /// 仅在编辑器聚焦时转换。
    pub restrict_to_editor_context: bool,
    /// 每次粘贴都弹出参数询问。
    pub prompt_per_paste: bool,
    /// 将询问得到的参数写回配置。
    pub persist_prompted_values: bool,
}

impl Default for PasteSettings {
    fn default() -> Self {
        Self {
            compression_quality: DEFAULT_QUALITY,
            max_dimension: 0,
            filename_prefix: String::new(),
            output_directory: String::new(),
            output_format: OutputFormat::Jpeg,
            restrict_to_editor_context: true,
            prompt_per_paste: false,
            persist_prompted_values: false,
        }
    }
}

/// 解析压缩质量；非有限值或不在 (0,1] 内返回 `None`。
pub fn parse_quality(value: &Value) -> Option<f32> {
    let parsed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let quality = parsed as f32;
    if quality.is_finite() && quality > 0.0 && quality <= 1.0 {
        Some(quality)
    } else {
        None
    }
}

/// 解析尺寸阈值。
///
/// 字符串按前导数字解析（`"1200px"` → 1200），负数与无法解析的值返回 `None`。
pub fn parse_max_dimension(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Some(v.min(u32::MAX as u64) as u32);
            }
            let f = n.as_f64()?;
            if f.is_finite() && f >= 0.0 {
                Some(f.min(u32::MAX as f64) as u32)
            } else {
                None
            }
        }
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return None;
            }
            Some(digits.parse::<u64>().ok()?.min(u32::MAX as u64) as u32)
        }
        _ => None,
    }
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

impl PasteSettings {
    /// 从持久化的 JSON 记录宽松解析。
    pub fn from_json(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(map) = value.as_object() else {
            log::warn!("⚠️ 设置文件不是 JSON 对象，使用默认设置");
            return defaults;
        };

        let compression_quality = match map.get(KEY_COMPRESSION) {
            None => defaults.compression_quality,
            Some(v) => parse_quality(v).unwrap_or_else(|| {
                log::warn!("⚠️ 压缩质量 {} 无效，回退为 {}", v, DEFAULT_QUALITY);
                defaults.compression_quality
            }),
        };

        let max_dimension = match map.get(KEY_MAX_DIMENSION) {
            None => defaults.max_dimension,
            Some(v) => parse_max_dimension(v).unwrap_or_else(|| {
                log::warn!("⚠️ 尺寸阈值 {} 无效，按不缩放处理", v);
                0
            }),
        };

        let output_format = match map.get(KEY_FORMAT).and_then(|v| v.as_str()) {
            None => defaults.output_format,
            Some(mime) => OutputFormat::from_mime(mime).unwrap_or_else(|err| {
                log::warn!("⚠️ {}，回退为 {}", err, defaults.output_format.mime());
                defaults.output_format
            }),
        };

        let text = |key: &str| {
            map.get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_default()
        };
        let flag = |key: &str, default: bool| map.get(key).and_then(parse_bool).unwrap_or(default);

        Self {
            compression_quality,
            max_dimension,
            filename_prefix: text(KEY_PREFIX),
            output_directory: text(KEY_OUTPUT_DIRECTORY),
            output_format,
            restrict_to_editor_context: flag(KEY_EDITOR_ONLY, defaults.restrict_to_editor_context),
            prompt_per_paste: flag(KEY_ASK_USER, defaults.prompt_per_paste),
            persist_prompted_values: flag(KEY_SAVE_ASKED, defaults.persist_prompted_values),
        }
    }

    /// 输出持久化用的 JSON 记录。数值字段写成字符串，与旧数据文件保持一致。
    pub fn to_json(&self) -> Value {
        let mut record = Map::new();
        record.insert(
            KEY_COMPRESSION.to_string(),
            Value::String(self.compression_quality.to_string()),
        );
        record.insert(
            KEY_MAX_DIMENSION.to_string(),
            Value::String(self.max_dimension.to_string()),
        );
        record.insert(KEY_PREFIX.to_string(), Value::String(self.filename_prefix.clone()));
        record.insert(
            KEY_OUTPUT_DIRECTORY.to_string(),
            Value::String(self.output_directory.clone()),
        );
        record.insert(
            KEY_FORMAT.to_string(),
            Value::String(self.output_format.mime().to_string()),
        );
        record.insert(
            KEY_EDITOR_ONLY.to_string(),
            Value::Bool(self.restrict_to_editor_context),
        );
        record.insert(KEY_ASK_USER.to_string(), Value::Bool(self.prompt_per_paste));
        record.insert(KEY_SAVE_ASKED.to_string(), Value::Bool(self.persist_prompted_values));
        Value::Object(record)
    }

    /// 严格地设置单个字段（来自命令行或设置界面）。
    ///
    /// 与 `from_json` 不同，非法输入直接返回错误而不是回退默认值。
    pub fn set_field(&mut self, key: &str, raw: &str) -> Result<(), AppError> {
        let value = Value::String(raw.to_string());
        match key {
            KEY_COMPRESSION => {
                self.compression_quality = parse_quality(&value).ok_or_else(|| {
                    AppError::Settings(format!("压缩质量必须是 (0,1] 之间的小数：{}", raw))
                })?;
            }
            KEY_MAX_DIMENSION => {
                self.max_dimension = parse_max_dimension(&value).ok_or_else(|| {
                    AppError::Settings(format!("尺寸阈值必须是非负整数：{}", raw))
                })?;
            }
            KEY_PREFIX => self.filename_prefix = raw.to_string(),
            KEY_OUTPUT_DIRECTORY => self.output_directory = raw.trim().to_string(),
            KEY_FORMAT => self.output_format = OutputFormat::parse_loose(raw)?,
            KEY_EDITOR_ONLY | KEY_ASK_USER | KEY_SAVE_ASKED => {
                let flag = parse_bool(&value)
                    .ok_or_else(|| AppError::Settings(format!("{} 需要 true/false：{}", key, raw)))?;
                match key {
                    KEY_EDITOR_ONLY => self.restrict_to_editor_context = flag,
                    KEY_ASK_USER => self.prompt_per_paste = flag,
                    _ => self.persist_prompted_values = flag,
                }
            }
            other => {
                return Err(AppError::Settings(format!("未知设置项：{}", other)));
            }
        }
        Ok(())
    }

    /// 读取单个字段的显示值。
    pub fn display_value(&self, key: &str) -> Option<String> {
        let value = self.to_json();
        match value.get(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// 未经询问时的生效参数。
    pub fn transcode_params(&self) -> TranscodeParams {
        TranscodeParams {
            format: self.output_format,
            max_dimension: self.max_dimension,
            quality: self.compression_quality,
        }
    }
}

// ============================================================================
// 设置描述（声明式）
// ============================================================================

/// 设置项的编辑控件类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Text { placeholder: &'static str },
    Dropdown { options: &'static [(&'static str, &'static str)] },
    Toggle,
}

/// 单个设置项的描述。
#[derive(Debug, Clone, Copy)]
pub struct SettingDescriptor {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub kind: SettingKind,
    pub constraints: &'static str,
}

const FORMAT_OPTIONS: &[(&str, &str)] = &[("image/jpeg", "JPEG"), ("image/webp", "WebP")];

static SETTINGS_SCHEMA: [SettingDescriptor; 8] = [
    SettingDescriptor {
        key: KEY_COMPRESSION,
        label: "压缩质量",
        description: "仅作用于 JPEG；WebP 始终无损编码，不受此值影响",
        kind: SettingKind::Text { placeholder: ".6-.95" },
        constraints: "(0, 1]",
    },
    SettingDescriptor {
        key: KEY_MAX_DIMENSION,
        label: "超过此尺寸时缩放",
        description: "长边超过该值时等比缩小；0 表示不缩放",
        kind: SettingKind::Text { placeholder: "0" },
        constraints: "非负整数，<= 49 视为不缩放",
    },
    SettingDescriptor {
        key: KEY_PREFIX,
        label: "图片前缀",
        description: "可包含相对路径，相对于图片目录或当前文档",
        kind: SettingKind::Text { placeholder: "" },
        constraints: "",
    },
    SettingDescriptor {
        key: KEY_OUTPUT_DIRECTORY,
        label: "图片目录",
        description: "仓库内的绝对路径；为空时与当前文档同目录",
        kind: SettingKind::Text { placeholder: "" },
        constraints: "",
    },
    SettingDescriptor {
        key: KEY_FORMAT,
        label: "输出格式",
        description: "在 JPEG 与 WebP 之间选择",
        kind: SettingKind::Dropdown { options: FORMAT_OPTIONS },
        constraints: "image/jpeg | image/webp",
    },
    SettingDescriptor {
        key: KEY_EDITOR_ONLY,
        label: "仅在编辑器中转换",
        description: "开启后，只有编辑器聚焦时才拦截粘贴",
        kind: SettingKind::Toggle,
        constraints: "",
    },
    SettingDescriptor {
        key: KEY_ASK_USER,
        label: "每次询问",
        description: "开启后，每次粘贴都弹出参数询问",
        kind: SettingKind::Toggle,
        constraints: "",
    },
    SettingDescriptor {
        key: KEY_SAVE_ASKED,
        label: "保存询问结果",
        description: "开启后，询问中选择的参数会写回设置",
        kind: SettingKind::Toggle,
        constraints: "",
    },
];

/// 全部设置项描述，顺序即界面展示顺序。
pub fn settings_schema() -> &'static [SettingDescriptor] {
    &SETTINGS_SCHEMA
}

// ============================================================================
// 设置存储
// ============================================================================

/// 唯一的可变配置存储。
pub struct SettingsStore {
    current: RwLock<PasteSettings>,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// 不落盘的内存存储，主要用于测试。
    pub fn in_memory(settings: PasteSettings) -> Self {
        Self {
            current: RwLock::new(settings),
            path: None,
        }
    }

    /// 从文件加载；文件不存在时使用默认设置。
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let settings = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<Value>(&content) {
                Ok(value) => PasteSettings::from_json(&value),
                Err(err) => {
                    log::warn!("⚠️ 解析设置文件失败，使用默认设置: {}", err);
                    PasteSettings::default()
                }
            }
        } else {
            log::info!("📄 设置文件不存在，使用默认设置: {}", path.display());
            PasteSettings::default()
        };

        Ok(Self {
            current: RwLock::new(settings),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次流水线使用一致参数。
    pub fn snapshot(&self) -> Result<PasteSettings, AppError> {
        self.current
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| AppError::Settings("配置读取锁已中毒".to_string()))
    }

    /// 修改配置并立即持久化，返回修改后的快照。
    pub fn update<F>(&self, mutate: F) -> Result<PasteSettings, AppError>
    where
        F: FnOnce(&mut PasteSettings) -> Result<(), AppError>,
    {
        let updated = {
            let mut guard = self
                .current
                .write()
                .map_err(|_| AppError::Settings("配置写入锁已中毒".to_string()))?;
            let mut candidate = guard.clone();
            mutate(&mut candidate)?;
            *guard = candidate.clone();
            candidate
        };

        self.persist(&updated)?;
        Ok(updated)
    }

    /// 恢复默认设置并持久化。
    pub fn reset(&self) -> Result<PasteSettings, AppError> {
        self.update(|settings| {
            *settings = PasteSettings::default();
            Ok(())
        })
    }

    fn persist(&self, settings: &PasteSettings) -> Result<(), AppError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| AppError::Settings(format!("创建设置目录失败: {}", e)))?;
            }
        }

        let content = serde_json::to_string_pretty(&settings.to_json())
            .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;
        fs::write(path, content)?;
        log::debug!("💾 设置已保存: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let settings = PasteSettings::default();
        assert_eq!(settings.compression_quality, 0.95);
        assert_eq!(settings.max_dimension, 0);
        assert_eq!(settings.output_format, OutputFormat::Jpeg);
        assert!(settings.restrict_to_editor_context);
        assert!(!settings.prompt_per_paste);
        assert!(!settings.persist_prompted_values);
    }

    #[test]
    fn from_json_accepts_legacy_string_numbers() {
        let value = json!({
            "compression": "0.6",
            "maxdim": "1200",
            "imgPrefix": "shot-",
            "imgPath": "attachments",
            "imgFormat": "image/webp",
            "convertInEditorOnly": false,
            "askUser": true,
            "saveaskUser": true,
            "someFutureKey": 42
        });
        let settings = PasteSettings::from_json(&value);
        assert_eq!(settings.compression_quality, 0.6);
        assert_eq!(settings.max_dimension, 1200);
        assert_eq!(settings.filename_prefix, "shot-");
        assert_eq!(settings.output_directory, "attachments");
        assert_eq!(settings.output_format, OutputFormat::Webp);
        assert!(!settings.restrict_to_editor_context);
        assert!(settings.prompt_per_paste);
        assert!(settings.persist_prompted_values);
    }

    #[test]
    fn from_json_missing_keys_use_defaults() {
        let settings = PasteSettings::from_json(&json!({ "maxdim": 800 }));
        assert_eq!(settings.max_dimension, 800);
        assert_eq!(settings.compression_quality, DEFAULT_QUALITY);
        assert!(settings.restrict_to_editor_context);
    }

    #[test]
    fn from_json_invalid_values_fall_back() {
        let settings = PasteSettings::from_json(&json!({
            "compression": "1.5",
            "maxdim": "abc",
            "imgFormat": "image/png"
        }));
        assert_eq!(settings.compression_quality, DEFAULT_QUALITY);
        assert_eq!(settings.max_dimension, 0);
        assert_eq!(settings.output_format, OutputFormat::Jpeg);

        let settings = PasteSettings::from_json(&json!({ "compression": "NaN", "maxdim": -5 }));
        assert_eq!(settings.compression_quality, DEFAULT_QUALITY);
        assert_eq!(settings.max_dimension, 0);
    }

    #[test]
    fn quality_that_underflows_to_zero_is_rejected() {
        assert_eq!(parse_quality(&json!("1e-50")), None);
        assert_eq!(parse_quality(&json!(1e-50)), None);

        let settings = PasteSettings::from_json(&json!({ "compression": "1e-50" }));
        assert_eq!(settings.compression_quality, DEFAULT_QUALITY);
        assert!(settings.compression_quality > 0.0);

        let mut settings = PasteSettings::default();
        assert!(settings.set_field(KEY_COMPRESSION, "1e-50").is_err());
        assert_eq!(settings.compression_quality, DEFAULT_QUALITY);
    }

    #[test]
    fn to_json_then_from_json_preserves_settings() {
        let settings = PasteSettings {
            compression_quality: 0.8,
            max_dimension: 1600,
            filename_prefix: "img/".to_string(),
            output_directory: "media".to_string(),
            output_format: OutputFormat::Webp,
            restrict_to_editor_context: false,
            prompt_per_paste: true,
            persist_prompted_values: false,
        };
        assert_eq!(PasteSettings::from_json(&settings.to_json()), settings);
    }

    #[test]
    fn set_field_validates_input() {
        let mut settings = PasteSettings::default();
        settings.set_field(KEY_COMPRESSION, "0.7").unwrap();
        settings.set_field(KEY_MAX_DIMENSION, "2048").unwrap();
        settings.set_field(KEY_FORMAT, "webp").unwrap();
        settings.set_field(KEY_ASK_USER, "true").unwrap();
        assert_eq!(settings.compression_quality, 0.7);
        assert_eq!(settings.max_dimension, 2048);
        assert_eq!(settings.output_format, OutputFormat::Webp);
        assert!(settings.prompt_per_paste);

        assert!(settings.set_field(KEY_COMPRESSION, "0").is_err());
        assert!(settings.set_field(KEY_MAX_DIMENSION, "-1").is_err());
        assert!(settings.set_field(KEY_EDITOR_ONLY, "maybe").is_err());
        assert!(settings.set_field("unknown", "x").is_err());
        assert_eq!(settings.compression_quality, 0.7);
    }

    #[test]
    fn schema_covers_every_persisted_key() {
        let keys: Vec<&str> = settings_schema().iter().map(|d| d.key).collect();
        let record = PasteSettings::default().to_json();
        let object = record.as_object().unwrap();
        assert_eq!(keys.len(), object.len());
        for key in keys {
            assert!(object.contains_key(key), "schema key {key} missing from record");
        }
    }

    #[test]
    fn store_update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = SettingsStore::load(&path).unwrap();
        assert_eq!(store.snapshot().unwrap(), PasteSettings::default());

        store
            .update(|s| {
                s.max_dimension = 1000;
                s.output_format = OutputFormat::Webp;
                Ok(())
            })
            .unwrap();

        let reloaded = SettingsStore::load(&path).unwrap();
        let snapshot = reloaded.snapshot().unwrap();
        assert_eq!(snapshot.max_dimension, 1000);
        assert_eq!(snapshot.output_format, OutputFormat::Webp);

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["maxdim"], json!("1000"));
    }

    #[test]
    fn store_update_error_leaves_settings_untouched() {
        let store = SettingsStore::in_memory(PasteSettings::default());
        let result = store.update(|s| {
            s.max_dimension = 10;
            s.set_field(KEY_COMPRESSION, "2")
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot().unwrap().max_dimension, 0);
    }

    #[test]
    fn store_load_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::load(&path).unwrap();
        assert_eq!(store.snapshot().unwrap(), PasteSettings::default());
    }
}
