//! 配置管理
//!
//! 配置按以下顺序叠加，后者覆盖前者：
//! 内置默认值 → 配置文件（可选）→ `DENTAL__` 前缀的环境变量 →
//! 约定俗成的 `DATABASE_URL` / `SESSION_SECRET` / `PORT`。

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// 开发环境使用的默认会话密钥，生产环境必须替换
pub const DEFAULT_SESSION_SECRET: &str = "dental-lab-secret-key-change-in-production";

const ENV_PREFIX: &str = "DENTAL";
const ENV_SEPARATOR: &str = "__";

/// 系统完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub uploads: UploadConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 运行环境，`production` 时启用更严格的检查
    pub environment: String,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 连接字符串，未设置时使用内存存储
    pub url: Option<String>,
    /// 最大连接数
    pub max_connections: u32,
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub root_dir: String,
    pub max_file_size_bytes: u64,
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub session_secret: String,
    pub session_ttl_hours: u32,
    /// 未设置时按运行环境决定
    pub secure_cookies: Option<bool>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别，`RUST_LOG` 存在时以其为准
    pub level: String,
    /// 输出 JSON 格式
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            environment: "development".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            root_dir: "uploads".to_string(),
            max_file_size_bytes: 200 * 1024 * 1024, // 200MB
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: DEFAULT_SESSION_SECRET.to_string(),
            session_ttl_hours: 24 * 7,
            secure_cookies: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// 从可选的配置文件和进程环境变量加载配置
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(config_path, env)
    }

    /// 使用给定的环境变量集合加载配置
    pub fn load_with_env(config_path: Option<&Path>, env: HashMap<String, String>) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())
            .context("Failed to build default configuration")?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(Some(env.clone())),
            )
            .set_override_option("database.url", non_empty(&env, "DATABASE_URL"))?
            .set_override_option("auth.session_secret", non_empty(&env, "SESSION_SECRET"))?
            .set_override_option("server.port", non_empty(&env, "PORT"))?;

        let config: AppConfig = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        match config_path {
            Some(path) => info!("Configuration loaded from: {}", path.display()),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, fn(&AppConfig) -> bool, &str); 5] = [
            ("server.port", |c| c.server.port != 0, "Server port cannot be 0"),
            (
                "uploads.root_dir",
                |c| !c.uploads.root_dir.trim().is_empty(),
                "Upload directory cannot be empty",
            ),
            (
                "uploads.max_file_size_bytes",
                |c| c.uploads.max_file_size_bytes > 0,
                "Maximum upload size must be positive",
            ),
            (
                "database.max_connections",
                |c| c.database.max_connections >= 1,
                "Database max connections cannot be 0",
            ),
            (
                "auth.session_secret",
                |c| {
                    !c.is_production()
                        || (!c.auth.session_secret.is_empty()
                            && c.auth.session_secret != DEFAULT_SESSION_SECRET)
                },
                "SESSION_SECRET must be set in production",
            ),
        ];

        for (field, check, message) in checks {
            if !check(self) {
                error!("Configuration validation failed for {}: {}", field, message);
                anyhow::bail!("Invalid configuration ({}): {}", field, message);
            }
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.environment.eq_ignore_ascii_case("production")
    }

    /// 会话 Cookie 是否带 Secure 标记
    pub fn secure_cookies(&self) -> bool {
        self.auth.secure_cookies.unwrap_or_else(|| self.is_production())
    }

    /// 会话有效期
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.auth.session_ttl_hours))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn non_empty(env: &HashMap<String, String>, key: &str) -> Option<String> {
    env.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load_with_env(None, HashMap::new()).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.url, None);
        assert_eq!(config.uploads.root_dir, "uploads");
        assert_eq!(config.uploads.max_file_size_bytes, 200 * 1024 * 1024);
        assert_eq!(config.session_ttl(), chrono::Duration::days(7));
        assert!(!config.secure_cookies());
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 8080\n\n[uploads]\nroot_dir = \"/srv/uploads\"\n\n[logging]\njson = true"
        )
        .unwrap();

        let config = AppConfig::load_with_env(
            Some(file.path()),
            env(&[("DENTAL__SERVER__PORT", "9000"), ("DATABASE_URL", "postgres://lab@db/lab")]),
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.uploads.root_dir, "/srv/uploads");
        assert!(config.logging.json);
        assert_eq!(config.database.url.as_deref(), Some("postgres://lab@db/lab"));
    }

    #[test]
    fn test_port_override() {
        let config = AppConfig::load_with_env(None, env(&[("PORT", "3000")])).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_production_requires_secret() {
        let result = AppConfig::load_with_env(
            None,
            env(&[("DENTAL__SERVER__ENVIRONMENT", "production")]),
        );
        assert!(result.is_err());

        let config = AppConfig::load_with_env(
            None,
            env(&[
                ("DENTAL__SERVER__ENVIRONMENT", "production"),
                ("SESSION_SECRET", "a-real-secret"),
            ]),
        )
        .unwrap();
        assert!(config.secure_cookies());
        assert_eq!(config.auth.session_secret, "a-real-secret");
    }

    #[test]
    fn test_validate() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.uploads.max_file_size_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = AppConfig::load_with_env(Some(Path::new("/nonexistent/dental.toml")), HashMap::new());
        assert!(result.is_err());
    }
}
