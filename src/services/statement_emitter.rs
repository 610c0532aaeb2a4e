// 文エミッター
//
// 変更オペレーションを実行系向けの文記述子に1対1で変換します。
// ここでは展開や並び替えを一切行いません（プランビルダーの責務）。
// 記述子は「対象 + 動詞 + パラメータ」のセマンティックな表現であり、
// SQLテキストへのレンダリングはアダプタ層が担当します。

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::change_op::{ChangeOp, ChangeOpKind, CommentTarget};
use crate::core::schema::QualifiedName;
use crate::services::plan_builder::MigrationPlan;

/// 文記述子
///
/// 単一のDDL文を実行系が解釈できる形で表現します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementDescriptor {
    /// 対象オブジェクトの修飾名
    pub target: QualifiedName,

    /// 動詞（オペレーション種別と同一の語彙）
    pub verb: ChangeOpKind,

    /// 動詞固有のパラメータ
    pub params: Value,
}

impl StatementDescriptor {
    /// 表示用の1行サマリを取得
    pub fn describe(&self) -> String {
        format!("{} {}", self.verb, self.target)
    }
}

/// 文エミッターサービス
#[derive(Debug, Clone, Default)]
pub struct StatementEmitterService {}

impl StatementEmitterService {
    /// 新しいStatementEmitterServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// 単一オペレーションを文記述子に変換
    ///
    /// 変換は常に1対1です。複数文を要するケース（型変更に伴う依存
    /// オブジェクトの退避など）はプランビルダーが事前に展開しています。
    pub fn emit(&self, op: &ChangeOp) -> StatementDescriptor {
        let target = op.target();
        let verb = op.kind();
        let params = match op {
            ChangeOp::CreateSchema { .. } | ChangeOp::DropSchema { .. } => json!({}),
            ChangeOp::CreateTable { table } => json!({ "table": table }),
            ChangeOp::DropTable { .. } => json!({}),
            ChangeOp::AddColumn { column, .. } => json!({ "column": column }),
            ChangeOp::DropColumn { column, .. } => json!({ "column": column }),
            ChangeOp::AlterColumnType {
                column, from, to, ..
            } => json!({ "column": column, "from": from, "to": to }),
            ChangeOp::AlterColumnNullability {
                column, nullable, ..
            } => json!({ "column": column, "nullable": nullable }),
            ChangeOp::AlterColumnDefault {
                column,
                default_expr,
                ..
            } => json!({ "column": column, "default": default_expr }),
            ChangeOp::AddConstraint { constraint, .. }
            | ChangeOp::DropConstraint { constraint, .. } => {
                json!({ "constraint": constraint })
            }
            ChangeOp::AddIndex { index, .. } | ChangeOp::DropIndex { index, .. } => {
                json!({ "index": index })
            }
            ChangeOp::SetComment { target, text } => {
                json!({ "comment_target": comment_target_params(target), "text": text })
            }
            ChangeOp::ClearComment { target } => {
                json!({ "comment_target": comment_target_params(target) })
            }
        };

        StatementDescriptor {
            target,
            verb,
            params,
        }
    }

    /// プラン全体を実行順の文記述子列に変換
    pub fn emit_plan(&self, plan: &MigrationPlan) -> Vec<StatementDescriptor> {
        plan.ordered_ops().map(|op| self.emit(op)).collect()
    }
}

fn comment_target_params(target: &CommentTarget) -> Value {
    match target {
        CommentTarget::Table { table } => json!({ "kind": "table", "table": table }),
        CommentTarget::Column { table, column } => {
            json!({ "kind": "column", "table": table, "column": column })
        }
    }
}
