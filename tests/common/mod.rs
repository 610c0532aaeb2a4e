// 統合テスト共通ヘルパー
//
// カタログ構築のビルダーと、変更オペレーションをカタログに模擬適用する
// アプライヤを提供します。アプライヤは収束性テストで使用します。

#![allow(dead_code)]

use structsync::core::change_op::{ChangeOp, CommentTarget};
use structsync::core::schema::{
    Catalog, Column, Constraint, ConstraintKind, QualifiedName, ReferentialAction, SchemaDef,
    Table, TypeDescriptor,
};

/// publicスキーマのテーブルを作成
pub fn table(name: &str) -> Table {
    Table::new(QualifiedName::new("public", name))
}

/// 単純なNOT NULLカラムを作成
pub fn column(name: &str, base_type: &str) -> Column {
    Column::new(name, TypeDescriptor::new(base_type), false)
}

/// 単一カラムの外部キー制約を作成
pub fn foreign_key(name: &str, column: &str, referenced: &str) -> Constraint {
    Constraint::new(
        name,
        vec![column.to_string()],
        ConstraintKind::ForeignKey {
            referenced_table: QualifiedName::new("public", referenced),
            referenced_columns: vec!["id".to_string()],
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        },
    )
}

/// テーブル群からカタログを構築（検証済み）
pub fn catalog(tables: Vec<Table>) -> Catalog {
    let mut catalog = Catalog::new();
    for table in tables {
        catalog.add_table(table);
    }
    catalog.validate().expect("test catalog must be valid");
    catalog
}

/// 変更オペレーションをカタログへ模擬適用
///
/// 実行系と同じ意味論でスナップショットを書き換えます。
/// 収束性（diffをすべて適用すると差分が空になる）の検証に使います。
pub fn apply_op(catalog: &mut Catalog, op: &ChangeOp) {
    match op {
        ChangeOp::CreateSchema { name } => {
            catalog.add_schema(SchemaDef::new(name));
        }
        ChangeOp::DropSchema { name } => {
            catalog.schemas.remove(name);
        }
        ChangeOp::CreateTable { table } => {
            catalog.add_table(table.clone());
        }
        ChangeOp::DropTable { table } => {
            if let Some(schema) = catalog.schemas.get_mut(&table.schema) {
                schema.tables.remove(&table.name);
            }
        }
        ChangeOp::AddColumn { table, column } => {
            with_table(catalog, table, |t| t.add_column(column.clone()));
        }
        ChangeOp::DropColumn { table, column } => {
            with_table(catalog, table, |t| {
                t.columns.retain(|c| &c.name != column);
            });
        }
        ChangeOp::AlterColumnType {
            table, column, to, ..
        } => {
            with_column(catalog, table, column, |c| {
                c.type_descriptor = to.clone();
            });
        }
        ChangeOp::AlterColumnNullability {
            table,
            column,
            nullable,
        } => {
            with_column(catalog, table, column, |c| c.nullable = *nullable);
        }
        ChangeOp::AlterColumnDefault {
            table,
            column,
            default_expr,
        } => {
            with_column(catalog, table, column, |c| {
                c.default_expr = default_expr.clone();
            });
        }
        ChangeOp::AddConstraint { table, constraint } => {
            with_table(catalog, table, |t| t.add_constraint(constraint.clone()));
        }
        ChangeOp::DropConstraint { table, constraint } => {
            let key = constraint.content_key();
            with_table(catalog, table, |t| {
                t.constraints.retain(|c| c.content_key() != key);
            });
        }
        ChangeOp::AddIndex { table, index } => {
            with_table(catalog, table, |t| t.add_index(index.clone()));
        }
        ChangeOp::DropIndex { table, index } => {
            let key = index.content_key();
            with_table(catalog, table, |t| {
                t.indexes.retain(|i| i.content_key() != key);
            });
        }
        ChangeOp::SetComment { target, text } => {
            apply_comment(catalog, target, Some(text.clone()));
        }
        ChangeOp::ClearComment { target } => {
            apply_comment(catalog, target, None);
        }
    }
}

fn with_table<F: FnOnce(&mut Table)>(catalog: &mut Catalog, name: &QualifiedName, f: F) {
    if let Some(table) = catalog
        .schemas
        .get_mut(&name.schema)
        .and_then(|s| s.tables.get_mut(&name.name))
    {
        f(table);
    }
}

fn with_column<F: FnOnce(&mut Column)>(
    catalog: &mut Catalog,
    table: &QualifiedName,
    column: &str,
    f: F,
) {
    with_table(catalog, table, |t| {
        if let Some(c) = t.columns.iter_mut().find(|c| c.name == column) {
            f(c);
        }
    });
}

fn apply_comment(catalog: &mut Catalog, target: &CommentTarget, text: Option<String>) {
    match target {
        CommentTarget::Table { table } => {
            with_table(catalog, table, |t| t.comment = text);
        }
        CommentTarget::Column { table, column } => {
            with_column(catalog, table, column, |c| c.comment = text);
        }
    }
}
