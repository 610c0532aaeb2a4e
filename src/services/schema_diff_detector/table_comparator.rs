// テーブルレベル比較
//
// 新規テーブルのオペレーション展開と、両スナップショットに存在する
// テーブルの内部比較（カラム・制約・インデックス・コメント）への
// ディスパッチを行います。

use super::SchemaDiffDetectorService;
use crate::core::change_op::{ChangeOp, CommentTarget};
use crate::core::error::DiffError;
use crate::core::schema::Table;

impl SchemaDiffDetectorService {
    /// 新規テーブルのオペレーション群を生成
    ///
    /// CreateTable はカラムと制約を内包しますが、インデックスと
    /// コメントは別オペレーションとして展開します。
    pub(super) fn emit_new_table_ops(&self, table: &Table, ops: &mut Vec<ChangeOp>) {
        ops.push(ChangeOp::CreateTable {
            table: table.clone(),
        });

        for index in &table.indexes {
            ops.push(ChangeOp::AddIndex {
                table: table.name.clone(),
                index: index.clone(),
            });
        }

        if let Some(comment) = &table.comment {
            ops.push(ChangeOp::SetComment {
                target: CommentTarget::Table {
                    table: table.name.clone(),
                },
                text: comment.clone(),
            });
        }

        for column in &table.columns {
            if let Some(comment) = &column.comment {
                ops.push(ChangeOp::SetComment {
                    target: CommentTarget::Column {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    },
                    text: comment.clone(),
                });
            }
        }
    }

    /// 両スナップショットに存在するテーブルの内部差分を検出
    pub(super) fn detect_table_diff(
        &self,
        desired: &Table,
        current: &Table,
        ops: &mut Vec<ChangeOp>,
    ) -> Result<(), DiffError> {
        self.compare_columns(desired, current, ops)?;
        self.compare_constraints(desired, current, ops);
        self.compare_indexes(desired, current, ops);
        self.compare_comments(desired, current, ops);
        Ok(())
    }
}
