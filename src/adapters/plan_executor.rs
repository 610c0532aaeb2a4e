// sqlxプラン実行系
//
// 文記述子列をSQLにレンダリングし、ターゲットデータベースへ逐次適用
// します。失敗時は即座に停止し、適用済み文数と失敗理由を報告します。
// ロールバックは行いません（DDLの部分適用は呼び出し側が判断します）。

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::adapters::sql_renderer::SqlRendererService;
use crate::core::error::ExecutionError;
use crate::services::statement_emitter::StatementDescriptor;
use crate::services::traits::{ExecutionReport, PlanExecutor};

/// sqlxプラン実行系
pub struct SqlxPlanExecutor {
    pool: PgPool,
    renderer: SqlRendererService,
}

impl SqlxPlanExecutor {
    /// 接続プールから実行系を作成
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            renderer: SqlRendererService::new(),
        }
    }
}

#[async_trait]
impl PlanExecutor for SqlxPlanExecutor {
    async fn apply(
        &self,
        statements: &[StatementDescriptor],
        cancel: &AtomicBool,
    ) -> Result<ExecutionReport> {
        let mut report = ExecutionReport::default();

        for (index, statement) in statements.iter().enumerate() {
            // キャンセルは文と文の間でのみ確認する
            if cancel.load(Ordering::SeqCst) {
                warn!(applied = report.applied, "execution cancelled");
                report.cancelled = true;
                return Ok(report);
            }

            let sql = self.renderer.render(statement)?;
            info!(index, statement = %statement.describe(), "applying");

            match sqlx::query(&sql).execute(&self.pool).await {
                Ok(_) => {
                    report.applied += 1;
                }
                Err(e) => {
                    warn!(index, error = %e, "statement failed");
                    report.failure = Some(ExecutionError {
                        statement_index: index,
                        reason: e.to_string(),
                    });
                    return Ok(report);
                }
            }
        }

        Ok(report)
    }
}
