//! 牙科订单服务器主程序

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dental_admin::{init_logging, AppConfig};
use dental_database::{InMemoryRepository, OrderRepository, PgRepository, UserRepository};
use dental_storage::UploadStore;
use dental_web::{AppState, AuthSettings, WebServer};
use dental_workflow::OrderService;
use tracing::{error, info, warn};

/// 牙科订单服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "dental-server")]
#[command(about = "牙科技工室订单接收服务器")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 服务器端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_logging(&config.logging)?;

    info!("启动牙科订单服务器...");
    info!("  运行环境: {}", config.server.environment);
    info!("  上传目录: {}", config.uploads.root_dir);

    let (orders, users) = repositories(&config).await?;

    let uploads = UploadStore::new(&config.uploads.root_dir, config.uploads.max_file_size_bytes);
    tokio::fs::create_dir_all(uploads.root())
        .await
        .with_context(|| format!("Failed to create upload directory {}", config.uploads.root_dir))?;

    let auth = AuthSettings {
        session_secret: config.auth.session_secret.clone(),
        session_ttl: config.session_ttl(),
        secure_cookies: config.secure_cookies(),
    };
    let state = AppState::new(Arc::new(OrderService::new(orders)), users, uploads, auth);
    spawn_session_purge(&state);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.bind_address()))?;

    if let Err(e) = WebServer::new(addr, state).run().await {
        error!("服务器运行失败: {}", e);
        return Err(e.into());
    }

    Ok(())
}

/// 有数据库连接串时使用 PostgreSQL，否则使用内存存储
async fn repositories(
    config: &AppConfig,
) -> Result<(Arc<dyn OrderRepository>, Arc<dyn UserRepository>)> {
    match config.database.url.as_deref() {
        Some(url) => {
            let repository = Arc::new(
                PgRepository::connect(url, config.database.max_connections)
                    .await
                    .context("Failed to connect to database")?,
            );
            info!("Using PostgreSQL repository");
            let orders: Arc<dyn OrderRepository> = repository.clone();
            let users: Arc<dyn UserRepository> = repository;
            Ok((orders, users))
        }
        None => {
            warn!("DATABASE_URL not set, orders are kept in memory only");
            let repository = Arc::new(InMemoryRepository::new());
            let orders: Arc<dyn OrderRepository> = repository.clone();
            let users: Arc<dyn UserRepository> = repository;
            Ok((orders, users))
        }
    }
}

/// 定期清理过期会话
fn spawn_session_purge(state: &AppState) {
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(15 * 60));
        loop {
            interval.tick().await;
            let removed = sessions.purge_expired().await;
            if removed > 0 {
                info!("Purged {} expired sessions", removed);
            }
        }
    });
}
