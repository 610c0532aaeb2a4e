// applyコマンドハンドラー
//
// マイグレーションプランをターゲットデータベースへ適用します。
// - 差分パイプラインの実行
// - dry-runでのプラン表示
// - 逐次適用と進捗表示
// - Ctrl-Cでの文間キャンセル

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::adapters::plan_executor::SqlxPlanExecutor;
use crate::adapters::sql_renderer::SqlRendererService;
use crate::cli::commands::{connect, run_pipeline};
use crate::core::config::ProjectConfig;
use crate::core::error::ExecutionError;
use crate::services::statement_emitter::StatementDescriptor;
use crate::services::traits::{ExecutionReport, PlanExecutor};

/// applyコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct ApplyCommand {
    /// 設定ファイルのパス
    pub config_path: PathBuf,
    /// 対象環境
    pub env: String,
    /// Dry run - 実行せずにSQLを表示
    pub dry_run: bool,
}

/// applyコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct ApplyCommandHandler {}

impl ApplyCommandHandler {
    /// 新しいApplyCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// applyコマンドを実行
    pub async fn execute(&self, command: &ApplyCommand) -> Result<String> {
        let config = ProjectConfig::load(&command.config_path)?;
        let env = config.environment(&command.env)?;

        let output = run_pipeline(env).await?;
        if output.plan.is_empty() {
            return Ok("Already up to date.".to_string());
        }

        if command.dry_run {
            let renderer = SqlRendererService::new();
            let mut lines = vec![format!(
                "Dry run: {} statements ({})",
                output.plan.len(),
                output.plan.summary()
            )];
            for statement in &output.statements {
                lines.push(format!("{};", renderer.render(statement)?));
            }
            return Ok(lines.join("\n"));
        }

        let target_pool = connect(&env.target_url).await?;
        let executor = SqlxPlanExecutor::new(target_pool);

        // Ctrl-Cで次の文の前に停止
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel_flag.store(true, Ordering::SeqCst);
            }
        });

        let progress = ProgressBar::new(output.statements.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let report =
            apply_with_progress(&executor, &output.statements, &cancel, &progress).await?;
        progress.finish_and_clear();

        if report.cancelled {
            return Ok(format!(
                "{} ({} of {} statements applied)",
                "Cancelled".yellow(),
                report.applied,
                output.statements.len()
            ));
        }

        if let Some(failure) = report.failure {
            let statement = &output.statements[failure.statement_index];
            anyhow::bail!(
                "{} after {} statements: {} ({})",
                "Failed".red(),
                report.applied,
                statement.describe(),
                failure.reason
            );
        }

        Ok(format!(
            "{} {} statements ({})",
            "Applied".green(),
            report.applied,
            output.plan.summary()
        ))
    }
}

/// 文を1つずつ適用し、進捗バーを文単位で進める
///
/// 失敗時の `statement_index` はプラン全体の序数に付け替えます。
async fn apply_with_progress(
    executor: &dyn PlanExecutor,
    statements: &[StatementDescriptor],
    cancel: &AtomicBool,
    progress: &ProgressBar,
) -> Result<ExecutionReport> {
    let mut total = ExecutionReport::default();

    for statement in statements {
        let report = executor
            .apply(std::slice::from_ref(statement), cancel)
            .await?;

        if report.cancelled {
            total.cancelled = true;
            return Ok(total);
        }
        if let Some(failure) = report.failure {
            total.failure = Some(ExecutionError {
                statement_index: total.applied,
                reason: failure.reason,
            });
            return Ok(total);
        }

        total.applied += report.applied;
        progress.set_position(total.applied as u64);
    }

    Ok(total)
}
