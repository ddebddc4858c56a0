//! User-facing text in the supported languages.
//!
//! The language is chosen once at start-up and the resulting [`Texts`] table
//! is handed to whoever prints messages.

use std::process::Command;

use clap::ValueEnum;

use crate::clienv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Language {
    /// English
    En,
    /// Simplified Chinese
    Cn,
}

#[derive(Debug)]
pub struct Texts {
    pub success: &'static str,
    pub restart_hint: &'static str,
    pub completed: &'static str,

    pub reading_config: &'static str,
    pub generating_ids: &'static str,
    pub saving_config: &'static str,
    pub closing_processes: &'static str,
    pub processes_closed: &'static str,

    pub error_prefix: &'static str,
    pub close_failed: &'static str,
    pub privilege_error: &'static str,
    pub requesting_admin: &'static str,

    pub run_as_admin: &'static str,
    pub run_with_sudo: &'static str,
    pub sudo_example: &'static str,
    pub press_enter_to_exit: &'static str,
    pub read_only_warning: &'static str,

    pub config_location: &'static str,
}

static EN: Texts = Texts {
    success: "[√] Configuration file updated successfully!",
    restart_hint: "[!] Please restart Cursor manually for changes to take effect",
    completed: "Operation completed!",

    reading_config: "Reading configuration file...",
    generating_ids: "Generating new identifiers...",
    saving_config: "Saving configuration...",
    closing_processes: "Closing Cursor instances...",
    processes_closed: "All Cursor instances have been closed",

    error_prefix: "Program encountered a serious error:",
    close_failed: "Failed to close Cursor completely. Please close it manually and try again.",
    privilege_error: "[!] Error: Administrator privileges required",
    requesting_admin: "Requesting administrator privileges...",

    run_as_admin: "Please right-click and select 'Run as Administrator'",
    run_with_sudo: "Please run this program with sudo",
    sudo_example: "Example: sudo",
    press_enter_to_exit: "Press Enter to exit...",
    read_only_warning:
        "storage.json is now read-only, which can cause issues such as lost workspace records",

    config_location: "Config file location:",
};

static CN: Texts = Texts {
    success: "[√] 配置文件已成功更新！",
    restart_hint: "[!] 请手动重启 Cursor 以使更新生效",
    completed: "操作完成！",

    reading_config: "正在读取配置文件...",
    generating_ids: "正在生成新的标识符...",
    saving_config: "正在保存配置...",
    closing_processes: "正在关闭 Cursor 实例...",
    processes_closed: "所有 Cursor 实例已关闭",

    error_prefix: "程序发生严重错误:",
    close_failed: "无法完全关闭 Cursor，请手动关闭后重试。",
    privilege_error: "[!] 错误：需要管理员权限",
    requesting_admin: "请求管理员权限...",

    run_as_admin: "请右键点击程序，选择「以管理员身份运行」",
    run_with_sudo: "请使用 sudo 命令运行此程序",
    sudo_example: "示例: sudo",
    press_enter_to_exit: "按回车键退出程序...",
    read_only_warning: "已将 storage.json 设置为只读模式, 这将导致 workspace 记录信息丢失等问题",

    config_location: "配置文件位置:",
};

impl Language {
    pub fn texts(self) -> &'static Texts {
        match self {
            Language::En => &EN,
            Language::Cn => &CN,
        }
    }

    /// `--lang` wins, then locale environment variables, then the OS locale.
    pub fn detect(lang_override: Option<Language>) -> Language {
        if let Some(lang) = lang_override {
            tracing::trace!(lang = ?lang, "Language from --lang flag");
            return lang;
        }

        if clienv::locale_values().iter().any(|v| is_chinese_locale(v)) {
            tracing::trace!("Language from locale environment");
            return Language::Cn;
        }

        if os_locale_is_chinese() {
            tracing::trace!("Language from OS locale");
            return Language::Cn;
        }

        Language::En
    }
}

fn is_chinese_locale(value: &str) -> bool {
    value.to_lowercase().contains("zh")
}

#[cfg(windows)]
fn os_locale_is_chinese() -> bool {
    Command::new("powershell")
        .args([
            "-NoProfile",
            "-Command",
            "[System.Globalization.CultureInfo]::CurrentUICulture.Name",
        ])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_lowercase())
        .is_some_and(|name| name.starts_with("zh"))
}

#[cfg(not(windows))]
fn os_locale_is_chinese() -> bool {
    Command::new("locale")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .is_some_and(|out| String::from_utf8_lossy(&out.stdout).to_lowercase().contains("zh_cn"))
}
