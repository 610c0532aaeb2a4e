// 設定ファイル管理
//
// プロジェクトの設定ファイル（YAML形式）の読み込みと検証、
// 環境別のソース/ターゲット接続設定の管理を行います。

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// 環境別の接続設定
///
/// 1回の比較実行に必要なソース（期待構造）とターゲット（収束対象）の
/// 接続URLを保持します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// ソースデータベースの接続URL
    pub source_url: String,

    /// ターゲットデータベースの接続URL
    pub target_url: String,

    /// 対象スキーマの限定リスト（空なら全ユーザースキーマ）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<String>,
}

/// プロジェクト設定
///
/// structsync.yaml の内容を表現します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// 環境設定のマップ（環境名 -> EnvironmentConfig）
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

impl ProjectConfig {
    /// YAML文字列から設定を読み込む
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_saphyr::from_str(yaml).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// ファイルから設定を読み込む
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// 指定された環境の設定を取得
    pub fn environment(&self, name: &str) -> Result<&EnvironmentConfig, ConfigError> {
        self.environments
            .get(name)
            .ok_or_else(|| ConfigError::MissingEnvironment {
                name: name.to_string(),
            })
    }
}
