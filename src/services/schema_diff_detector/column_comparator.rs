// カラムレベル比較
//
// カラムの追加・削除・型変更・NULL許可変更・デフォルト変更を検出します。
// 序数位置は比較対象外です。型・NULL許可・デフォルトの変更はそれぞれ
// 独立したオペレーションとして生成します。

use std::collections::BTreeSet;

use super::SchemaDiffDetectorService;
use crate::core::change_op::{ChangeOp, CommentTarget};
use crate::core::error::DiffError;
use crate::core::schema::Table;

impl SchemaDiffDetectorService {
    /// カラム差分を検出
    pub(super) fn compare_columns(
        &self,
        desired: &Table,
        current: &Table,
        ops: &mut Vec<ChangeOp>,
    ) -> Result<(), DiffError> {
        let desired_names: BTreeSet<&str> =
            desired.columns.iter().map(|c| c.name.as_str()).collect();
        let current_names: BTreeSet<&str> =
            current.columns.iter().map(|c| c.name.as_str()).collect();

        for name in desired_names.difference(&current_names) {
            if let Some(column) = desired.get_column(name) {
                ops.push(ChangeOp::AddColumn {
                    table: desired.name.clone(),
                    column: column.clone(),
                });
                // 新規カラムのコメントはここで展開（comment_comparatorは
                // 両側に存在するカラムのみを扱う）
                if let Some(comment) = &column.comment {
                    ops.push(ChangeOp::SetComment {
                        target: CommentTarget::Column {
                            table: desired.name.clone(),
                            column: column.name.clone(),
                        },
                        text: comment.clone(),
                    });
                }
            }
        }

        for name in current_names.difference(&desired_names) {
            ops.push(ChangeOp::DropColumn {
                table: desired.name.clone(),
                column: (*name).to_string(),
            });
        }

        for name in desired_names.intersection(&current_names) {
            let desired_column = desired.get_column(name).expect("column present in desired");
            let current_column = current.get_column(name).expect("column present in current");

            if !desired_column.type_descriptor.is_classifiable()
                || !current_column.type_descriptor.is_classifiable()
            {
                return Err(DiffError::IncomparableTypes {
                    table: desired.name.to_string(),
                    column: desired_column.name.clone(),
                    left: desired_column.type_descriptor.render(),
                    right: current_column.type_descriptor.render(),
                });
            }

            if desired_column.type_descriptor != current_column.type_descriptor {
                ops.push(ChangeOp::AlterColumnType {
                    table: desired.name.clone(),
                    column: desired_column.name.clone(),
                    from: current_column.type_descriptor.clone(),
                    to: desired_column.type_descriptor.clone(),
                });
            }

            if desired_column.nullable != current_column.nullable {
                ops.push(ChangeOp::AlterColumnNullability {
                    table: desired.name.clone(),
                    column: desired_column.name.clone(),
                    nullable: desired_column.nullable,
                });
            }

            // デフォルト式は不透明文字列として逐語比較
            if desired_column.default_expr != current_column.default_expr {
                ops.push(ChangeOp::AlterColumnDefault {
                    table: desired.name.clone(),
                    column: desired_column.name.clone(),
                    default_expr: desired_column.default_expr.clone(),
                });
            }
        }

        Ok(())
    }
}
