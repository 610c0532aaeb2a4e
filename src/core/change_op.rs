// 構造変更オペレーションモデル
//
// 2つのカタログスナップショット間の型付き構造変更を表現します。
// 差分検出が順序なし集合として生成し、プランビルダーが依存関係に
// 従って並び替えます。

use serde::{Deserialize, Serialize};

use crate::core::schema::{Column, Constraint, Index, QualifiedName, Table, TypeDescriptor};

/// コメントの付与先
///
/// コメントはちょうど1つのテーブルまたはカラムに付きます。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentTarget {
    /// テーブルコメント
    Table {
        /// テーブルの修飾名
        table: QualifiedName,
    },

    /// カラムコメント
    Column {
        /// テーブルの修飾名
        table: QualifiedName,
        /// カラム名
        column: String,
    },
}

impl CommentTarget {
    /// 付与先テーブルの修飾名を取得
    pub fn table(&self) -> &QualifiedName {
        match self {
            CommentTarget::Table { table } => table,
            CommentTarget::Column { table, .. } => table,
        }
    }

    /// 決定的な並び替えキーを取得
    pub fn sort_key(&self) -> String {
        match self {
            CommentTarget::Table { table } => table.to_string(),
            CommentTarget::Column { table, column } => format!("{}.{}", table, column),
        }
    }
}

/// 変更オペレーション種別
///
/// 実行系へ渡す文記述子の動詞としても使用します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOpKind {
    CreateSchema,
    DropSchema,
    CreateTable,
    DropTable,
    AddColumn,
    DropColumn,
    AlterColumnType,
    AlterColumnNullability,
    AlterColumnDefault,
    AddConstraint,
    DropConstraint,
    AddIndex,
    DropIndex,
    SetComment,
    ClearComment,
}

impl ChangeOpKind {
    /// snake_case の種別名を返す
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOpKind::CreateSchema => "create_schema",
            ChangeOpKind::DropSchema => "drop_schema",
            ChangeOpKind::CreateTable => "create_table",
            ChangeOpKind::DropTable => "drop_table",
            ChangeOpKind::AddColumn => "add_column",
            ChangeOpKind::DropColumn => "drop_column",
            ChangeOpKind::AlterColumnType => "alter_column_type",
            ChangeOpKind::AlterColumnNullability => "alter_column_nullability",
            ChangeOpKind::AlterColumnDefault => "alter_column_default",
            ChangeOpKind::AddConstraint => "add_constraint",
            ChangeOpKind::DropConstraint => "drop_constraint",
            ChangeOpKind::AddIndex => "add_index",
            ChangeOpKind::DropIndex => "drop_index",
            ChangeOpKind::SetComment => "set_comment",
            ChangeOpKind::ClearComment => "clear_comment",
        }
    }
}

impl std::fmt::Display for ChangeOpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 変更オペレーション
///
/// 単一の型付き構造変更を表現します。型・NULL許可・デフォルトの変更は
/// それぞれ独立したオペレーションであり、1つにまとめることはありません
/// （依存制約のDROPと交互に実行できるようにするため）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeOp {
    /// スキーマを作成
    CreateSchema { name: String },

    /// スキーマを削除
    DropSchema { name: String },

    /// テーブルを作成（カラムと制約を含む。インデックスとコメントは
    /// 別オペレーションとして生成される）
    CreateTable { table: Table },

    /// テーブルを削除（所有オブジェクトは同時に消滅する）
    DropTable { table: QualifiedName },

    /// カラムを追加
    AddColumn { table: QualifiedName, column: Column },

    /// カラムを削除
    DropColumn { table: QualifiedName, column: String },

    /// カラム型を変更
    AlterColumnType {
        table: QualifiedName,
        column: String,
        from: TypeDescriptor,
        to: TypeDescriptor,
    },

    /// カラムのNULL許可を変更
    AlterColumnNullability {
        table: QualifiedName,
        column: String,
        nullable: bool,
    },

    /// カラムのデフォルト式を変更（Noneは DROP DEFAULT）
    AlterColumnDefault {
        table: QualifiedName,
        column: String,
        default_expr: Option<String>,
    },

    /// 制約を追加
    AddConstraint {
        table: QualifiedName,
        constraint: Constraint,
    },

    /// 制約を削除（依存解析のため定義全体を保持する）
    DropConstraint {
        table: QualifiedName,
        constraint: Constraint,
    },

    /// インデックスを追加
    AddIndex { table: QualifiedName, index: Index },

    /// インデックスを削除
    DropIndex { table: QualifiedName, index: Index },

    /// コメントを設定（空文字列もコメントとして有効）
    SetComment { target: CommentTarget, text: String },

    /// コメントを消去
    ClearComment { target: CommentTarget },
}

impl ChangeOp {
    /// オペレーション種別を取得
    pub fn kind(&self) -> ChangeOpKind {
        match self {
            ChangeOp::CreateSchema { .. } => ChangeOpKind::CreateSchema,
            ChangeOp::DropSchema { .. } => ChangeOpKind::DropSchema,
            ChangeOp::CreateTable { .. } => ChangeOpKind::CreateTable,
            ChangeOp::DropTable { .. } => ChangeOpKind::DropTable,
            ChangeOp::AddColumn { .. } => ChangeOpKind::AddColumn,
            ChangeOp::DropColumn { .. } => ChangeOpKind::DropColumn,
            ChangeOp::AlterColumnType { .. } => ChangeOpKind::AlterColumnType,
            ChangeOp::AlterColumnNullability { .. } => ChangeOpKind::AlterColumnNullability,
            ChangeOp::AlterColumnDefault { .. } => ChangeOpKind::AlterColumnDefault,
            ChangeOp::AddConstraint { .. } => ChangeOpKind::AddConstraint,
            ChangeOp::DropConstraint { .. } => ChangeOpKind::DropConstraint,
            ChangeOp::AddIndex { .. } => ChangeOpKind::AddIndex,
            ChangeOp::DropIndex { .. } => ChangeOpKind::DropIndex,
            ChangeOp::SetComment { .. } => ChangeOpKind::SetComment,
            ChangeOp::ClearComment { .. } => ChangeOpKind::ClearComment,
        }
    }

    /// 対象テーブルの修飾名を取得（スキーマオペレーションでは None）
    pub fn table(&self) -> Option<&QualifiedName> {
        match self {
            ChangeOp::CreateSchema { .. } | ChangeOp::DropSchema { .. } => None,
            ChangeOp::CreateTable { table } => Some(&table.name),
            ChangeOp::DropTable { table }
            | ChangeOp::AddColumn { table, .. }
            | ChangeOp::DropColumn { table, .. }
            | ChangeOp::AlterColumnType { table, .. }
            | ChangeOp::AlterColumnNullability { table, .. }
            | ChangeOp::AlterColumnDefault { table, .. }
            | ChangeOp::AddConstraint { table, .. }
            | ChangeOp::DropConstraint { table, .. }
            | ChangeOp::AddIndex { table, .. }
            | ChangeOp::DropIndex { table, .. } => Some(table),
            ChangeOp::SetComment { target, .. } => Some(target.table()),
            ChangeOp::ClearComment { target } => Some(target.table()),
        }
    }

    /// 対象オブジェクトの修飾名を取得
    pub fn target(&self) -> QualifiedName {
        match self {
            ChangeOp::CreateSchema { name } | ChangeOp::DropSchema { name } => {
                QualifiedName::schema_only(name.clone())
            }
            _ => self
                .table()
                .cloned()
                .expect("non-schema op always has a table"),
        }
    }

    /// 決定的な並び替えキーを取得
    ///
    /// 同種オペレーション間のタイブレークは修飾名の辞書順です。
    pub fn sort_key(&self) -> (String, String) {
        let secondary = match self {
            ChangeOp::AddColumn { column, .. } => column.name.clone(),
            ChangeOp::DropColumn { column, .. }
            | ChangeOp::AlterColumnType { column, .. }
            | ChangeOp::AlterColumnNullability { column, .. }
            | ChangeOp::AlterColumnDefault { column, .. } => column.clone(),
            ChangeOp::AddConstraint { constraint, .. }
            | ChangeOp::DropConstraint { constraint, .. } => constraint.name.clone(),
            ChangeOp::AddIndex { index, .. } | ChangeOp::DropIndex { index, .. } => {
                index.name.clone()
            }
            ChangeOp::SetComment { target, .. } => target.sort_key(),
            ChangeOp::ClearComment { target } => target.sort_key(),
            _ => String::new(),
        };
        (self.target().to_string(), secondary)
    }

    /// 外部キー関連オペレーションかどうか
    pub fn is_foreign_key_constraint(&self) -> bool {
        match self {
            ChangeOp::AddConstraint { constraint, .. }
            | ChangeOp::DropConstraint { constraint, .. } => constraint.is_foreign_key(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ConstraintKind, TypeDescriptor};

    #[test]
    fn test_kind_as_str() {
        assert_eq!(ChangeOpKind::CreateTable.as_str(), "create_table");
        assert_eq!(
            ChangeOpKind::AlterColumnNullability.as_str(),
            "alter_column_nullability"
        );
    }

    #[test]
    fn test_op_kind_mapping() {
        let op = ChangeOp::DropColumn {
            table: QualifiedName::new("public", "users"),
            column: "email".to_string(),
        };
        assert_eq!(op.kind(), ChangeOpKind::DropColumn);
    }

    #[test]
    fn test_schema_op_target() {
        let op = ChangeOp::CreateSchema {
            name: "audit".to_string(),
        };
        assert!(op.table().is_none());
        assert_eq!(op.target().to_string(), "audit");
    }

    #[test]
    fn test_sort_key_secondary() {
        let table = QualifiedName::new("public", "users");
        let a = ChangeOp::AddConstraint {
            table: table.clone(),
            constraint: Constraint::new("a_first", vec!["id".into()], ConstraintKind::Unique),
        };
        let b = ChangeOp::AddConstraint {
            table,
            constraint: Constraint::new("b_second", vec!["id".into()], ConstraintKind::Unique),
        };
        assert!(a.sort_key() < b.sort_key());
    }

    #[test]
    fn test_is_foreign_key_constraint() {
        let table = QualifiedName::new("public", "posts");
        let fk = ChangeOp::AddConstraint {
            table: table.clone(),
            constraint: Constraint::new(
                "fk_posts_user",
                vec!["user_id".into()],
                ConstraintKind::ForeignKey {
                    referenced_table: QualifiedName::new("public", "users"),
                    referenced_columns: vec!["id".into()],
                    on_delete: Default::default(),
                    on_update: Default::default(),
                },
            ),
        };
        assert!(fk.is_foreign_key_constraint());

        let unique = ChangeOp::AddConstraint {
            table,
            constraint: Constraint::new("uq_title", vec!["title".into()], ConstraintKind::Unique),
        };
        assert!(!unique.is_foreign_key_constraint());
    }

    #[test]
    fn test_alter_ops_are_independent() {
        // 型・NULL許可・デフォルトの変更は別々のオペレーション
        let table = QualifiedName::new("public", "users");
        let ops = vec![
            ChangeOp::AlterColumnType {
                table: table.clone(),
                column: "age".into(),
                from: TypeDescriptor::new("integer"),
                to: TypeDescriptor::new("bigint"),
            },
            ChangeOp::AlterColumnNullability {
                table: table.clone(),
                column: "age".into(),
                nullable: true,
            },
            ChangeOp::AlterColumnDefault {
                table,
                column: "age".into(),
                default_expr: Some("0".into()),
            },
        ];
        let kinds: Vec<_> = ops.iter().map(|op| op.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ChangeOpKind::AlterColumnType,
                ChangeOpKind::AlterColumnNullability,
                ChangeOpKind::AlterColumnDefault,
            ]
        );
    }
}
