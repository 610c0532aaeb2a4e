// コマンドハンドラー
//
// 各サブコマンドの実装と、差分パイプライン（イントロスペクション →
// 差分検出 → プラン構築 → 文記述子生成）の共有部分を提供します。

pub mod apply;
pub mod diff;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::adapters::catalog_introspector::PgCatalogIntrospector;
use crate::core::config::EnvironmentConfig;
use crate::services::plan_builder::{MigrationPlan, PlanBuilderService};
use crate::services::schema_diff_detector::SchemaDiffDetectorService;
use crate::services::statement_emitter::{StatementDescriptor, StatementEmitterService};
use crate::services::traits::CatalogLoader;

/// データベースへ接続
pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("failed to connect to database")
}

/// 差分パイプラインの実行結果
pub struct PipelineOutput {
    /// 実行順のマイグレーションプラン
    pub plan: MigrationPlan,
    /// 実行順の文記述子列
    pub statements: Vec<StatementDescriptor>,
}

/// ソースとターゲットを比較して実行プランを構築
pub async fn run_pipeline(env: &EnvironmentConfig) -> Result<PipelineOutput> {
    let source_pool = connect(&env.source_url).await.context("source database")?;
    let target_pool = connect(&env.target_url).await.context("target database")?;

    let source_loader = PgCatalogIntrospector::new(source_pool);
    let target_loader = PgCatalogIntrospector::new(target_pool);

    let desired = source_loader.load_catalog(&env.schemas).await?;
    let current = target_loader.load_catalog(&env.schemas).await?;
    info!(
        source_tables = desired.table_count(),
        target_tables = current.table_count(),
        "catalogs loaded"
    );

    let diff = SchemaDiffDetectorService::new().detect_diff(&desired, &current)?;
    let plan = PlanBuilderService::new().build_plan(&diff, &desired, &current)?;
    let statements = StatementEmitterService::new().emit_plan(&plan);

    Ok(PipelineOutput { plan, statements })
}
