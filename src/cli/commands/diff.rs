// diffコマンドハンドラー
//
// ソースとターゲットの構造差分をプラン順に表示します。
// ターゲットには一切書き込みません。

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use crate::adapters::sql_renderer::SqlRendererService;
use crate::cli::commands::run_pipeline;
use crate::core::change_op::ChangeOpKind;
use crate::core::config::ProjectConfig;

/// diffコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct DiffCommand {
    /// 設定ファイルのパス
    pub config_path: PathBuf,
    /// 対象環境
    pub env: String,
}

/// diffコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct DiffCommandHandler {}

impl DiffCommandHandler {
    /// 新しいDiffCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// diffコマンドを実行
    pub async fn execute(&self, command: &DiffCommand) -> Result<String> {
        let config = ProjectConfig::load(&command.config_path)?;
        let env = config.environment(&command.env)?;

        let output = run_pipeline(env).await?;
        if output.plan.is_empty() {
            return Ok("No structural differences.".to_string());
        }

        let renderer = SqlRendererService::new();
        let mut lines = Vec::new();
        for statement in &output.statements {
            let sql = renderer.render(statement)?;
            let line = match statement.verb {
                ChangeOpKind::DropSchema
                | ChangeOpKind::DropTable
                | ChangeOpKind::DropColumn
                | ChangeOpKind::DropConstraint
                | ChangeOpKind::DropIndex => format!("- {}", sql).red().to_string(),
                ChangeOpKind::CreateSchema
                | ChangeOpKind::CreateTable
                | ChangeOpKind::AddColumn
                | ChangeOpKind::AddConstraint
                | ChangeOpKind::AddIndex => format!("+ {}", sql).green().to_string(),
                _ => format!("~ {}", sql).yellow().to_string(),
            };
            lines.push(line);
        }

        lines.push(String::new());
        lines.push(format!(
            "{} statements ({})",
            output.plan.len(),
            output.plan.summary()
        ));
        Ok(lines.join("\n"))
    }
}
