//! 설정 로드.
//!
//! TOML 설정 파일 + `NUNBIT_` 환경변수 오버레이로 [`AppConfig`]를 만든다.
//! 파일이 없으면 기본값으로 동작한다.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::CoreError;

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "nunbit.toml";

/// 환경변수 접두어 (`NUNBIT_WEB__PORT=8080` 형식)
const ENV_PREFIX: &str = "NUNBIT";

/// 설정 로더
pub struct ConfigManager;

impl ConfigManager {
    /// 설정 로드.
    ///
    /// 우선순위: 환경변수 > `path`(또는 기본 경로)의 TOML 파일 > 기본값.
    /// 명시적으로 지정한 파일이 없으면 에러, 기본 경로 파일이 없으면 무시.
    pub fn load(path: Option<&Path>) -> Result<AppConfig, CoreError> {
        let mut builder = config::Config::builder();

        match path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(CoreError::Config(format!(
                        "설정 파일 없음: {}",
                        explicit.display()
                    )));
                }
                info!("설정 파일 로드: {}", explicit.display());
                builder = builder.add_source(config::File::from(explicit));
            }
            None => {
                if let Some(default_path) = Self::default_config_path() {
                    if default_path.exists() {
                        info!("설정 파일 로드: {}", default_path.display());
                        builder = builder.add_source(config::File::from(default_path));
                    } else {
                        debug!("설정 파일 없음, 기본값 사용");
                    }
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let raw = builder
            .build()
            .map_err(|e| CoreError::Config(format!("설정 조립 실패: {e}")))?;

        raw.try_deserialize::<AppConfig>()
            .map_err(|e| CoreError::Config(format!("설정 역직렬화 실패: {e}")))
    }

    /// 플랫폼 기본 설정 파일 경로
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "nunbit", "nunbit")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// 플랫폼 기본 데이터 디렉토리 (상태 파일 등)
    pub fn default_data_dir() -> Option<PathBuf> {
        ProjectDirs::from("io", "nunbit", "nunbit").map(|dirs| dirs.data_dir().to_path_buf())
    }
}
