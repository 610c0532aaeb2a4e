// コメントレベル比較
//
// テーブルコメントと、両側に存在するカラムのコメントを比較します。
// コメントの不在（None）と空文字列（Some("")）は区別されます。
// 新規テーブル・新規カラムのコメントは、それぞれ table_comparator と
// column_comparator が展開します。

use super::SchemaDiffDetectorService;
use crate::core::change_op::{ChangeOp, CommentTarget};
use crate::core::schema::Table;

impl SchemaDiffDetectorService {
    /// コメント差分を検出
    pub(super) fn compare_comments(
        &self,
        desired: &Table,
        current: &Table,
        ops: &mut Vec<ChangeOp>,
    ) {
        emit_comment_diff(
            &desired.comment,
            &current.comment,
            CommentTarget::Table {
                table: desired.name.clone(),
            },
            ops,
        );

        for desired_column in &desired.columns {
            if let Some(current_column) = current.get_column(&desired_column.name) {
                emit_comment_diff(
                    &desired_column.comment,
                    &current_column.comment,
                    CommentTarget::Column {
                        table: desired.name.clone(),
                        column: desired_column.name.clone(),
                    },
                    ops,
                );
            }
        }
    }
}

fn emit_comment_diff(
    desired: &Option<String>,
    current: &Option<String>,
    target: CommentTarget,
    ops: &mut Vec<ChangeOp>,
) {
    match (desired, current) {
        (Some(text), None) => ops.push(ChangeOp::SetComment {
            target,
            text: text.clone(),
        }),
        (Some(text), Some(existing)) if text != existing => ops.push(ChangeOp::SetComment {
            target,
            text: text.clone(),
        }),
        (None, Some(_)) => ops.push(ChangeOp::ClearComment { target }),
        _ => {}
    }
}
