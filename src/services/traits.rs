// サービス境界トレイト定義
//
// カタログの取得と文の適用はこの境界の外側の責務です。
// テストではモック実装に差し替えます。

use std::sync::atomic::AtomicBool;

use async_trait::async_trait;

use crate::core::error::ExecutionError;
use crate::core::schema::Catalog;
use crate::services::statement_emitter::StatementDescriptor;

/// カタログローダーの抽象化
///
/// 実データベースからのイントロスペクションや、宣言ファイルからの
/// 読み込みなど、カタログスナップショットの取得手段を差し替え可能に
/// します。
#[async_trait]
pub trait CatalogLoader: Send + Sync {
    /// カタログスナップショットを取得
    ///
    /// `schemas` が空の場合は全ユーザースキーマが対象です。
    async fn load_catalog(&self, schemas: &[String]) -> anyhow::Result<Catalog>;
}

/// 実行レポート
///
/// 適用済みの文数と失敗情報（あれば）を保持します。
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// 適用に成功した文の数
    pub applied: usize,

    /// 失敗情報（Noneなら全文適用済み、または途中キャンセル）
    pub failure: Option<ExecutionError>,

    /// キャンセル要求により中断したかどうか
    pub cancelled: bool,
}

impl ExecutionReport {
    /// 全文が適用されたかどうか
    pub fn is_complete(&self, total: usize) -> bool {
        self.applied == total && self.failure.is_none() && !self.cancelled
    }
}

/// プラン実行系の抽象化
///
/// 文記述子列を逐次適用します。失敗時は即座に停止し、適用済みの
/// 文数と失敗理由を報告します。ロールバックは行いません。
#[async_trait]
pub trait PlanExecutor: Send + Sync {
    /// 文記述子列を順に適用
    ///
    /// `cancel` は文と文の間でのみ確認されます。実行中の文は中断しません。
    async fn apply(
        &self,
        statements: &[StatementDescriptor],
        cancel: &AtomicBool,
    ) -> anyhow::Result<ExecutionReport>;
}
