// スキーマ差分検出サービス
//
// 期待側（desired）と現在側（current）の2つのカタログスナップショットを
// 構造比較し、型付き変更オペレーションの集合を生成します。
// 各レベル（スキーマ、テーブル、カラム、制約、インデックス、コメント）で
// 名前キーの集合比較を行います。出力順は決定的です。

mod column_comparator;
mod comment_comparator;
mod constraint_comparator;
mod index_comparator;
mod table_comparator;

use std::collections::BTreeSet;

use tracing::debug;

use crate::core::change_op::ChangeOp;
use crate::core::error::DiffError;
use crate::core::schema::Catalog;

/// スキーマ差分検出サービス
///
/// 2つの不変スナップショットを比較し、順序なしの変更オペレーション集合を
/// 返します。スナップショットを編集することはありません。
#[derive(Debug, Clone, Default)]
pub struct SchemaDiffDetectorService {}

impl SchemaDiffDetectorService {
    /// 新しいSchemaDiffDetectorServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// カタログ差分を検出
    ///
    /// # Arguments
    ///
    /// * `desired` - 期待する構造（ソース側）
    /// * `current` - 現在の構造（ターゲット側）
    ///
    /// # Returns
    ///
    /// ターゲットを期待構造へ収束させる変更オペレーションの集合。
    /// 正常な入力に対して失敗せず、分類不能な型記述子ペアに遭遇した
    /// 場合のみ `IncomparableTypes` で実行全体を中断します。
    pub fn detect_diff(
        &self,
        desired: &Catalog,
        current: &Catalog,
    ) -> Result<Vec<ChangeOp>, DiffError> {
        let mut ops = Vec::new();

        let desired_schemas: BTreeSet<&String> = desired.schemas.keys().collect();
        let current_schemas: BTreeSet<&String> = current.schemas.keys().collect();

        // 追加されたスキーマ（所属テーブルの作成を含む）
        for schema_name in desired_schemas.difference(&current_schemas) {
            ops.push(ChangeOp::CreateSchema {
                name: (*schema_name).clone(),
            });
            if let Some(schema) = desired.get_schema(schema_name) {
                for table in schema.tables.values() {
                    self.emit_new_table_ops(table, &mut ops);
                }
            }
        }

        // 削除されたスキーマ（所属テーブルの削除を含む）
        for schema_name in current_schemas.difference(&desired_schemas) {
            if let Some(schema) = current.get_schema(schema_name) {
                for table in schema.tables.values() {
                    ops.push(ChangeOp::DropTable {
                        table: table.name.clone(),
                    });
                }
            }
            ops.push(ChangeOp::DropSchema {
                name: (*schema_name).clone(),
            });
        }

        // 両方に存在するスキーマ: テーブルレベルの集合比較
        for schema_name in desired_schemas.intersection(&current_schemas) {
            let desired_schema = desired
                .get_schema(schema_name)
                .expect("schema present in desired");
            let current_schema = current
                .get_schema(schema_name)
                .expect("schema present in current");

            let desired_tables: BTreeSet<&String> = desired_schema.tables.keys().collect();
            let current_tables: BTreeSet<&String> = current_schema.tables.keys().collect();

            for table_name in desired_tables.difference(&current_tables) {
                if let Some(table) = desired_schema.get_table(table_name) {
                    self.emit_new_table_ops(table, &mut ops);
                }
            }

            for table_name in current_tables.difference(&desired_tables) {
                if let Some(table) = current_schema.get_table(table_name) {
                    ops.push(ChangeOp::DropTable {
                        table: table.name.clone(),
                    });
                }
            }

            for table_name in desired_tables.intersection(&current_tables) {
                if let (Some(desired_table), Some(current_table)) = (
                    desired_schema.get_table(table_name),
                    current_schema.get_table(table_name),
                ) {
                    self.detect_table_diff(desired_table, current_table, &mut ops)?;
                }
            }
        }

        // 決定性の保証: 同種オペレーション間は修飾名の辞書順
        ops.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.kind().as_str().cmp(b.kind().as_str()))
        });

        debug!(op_count = ops.len(), "structural diff detected");
        Ok(ops)
    }
}
