// PostgreSQL用SQLレンダラー
//
// 文記述子からPostgreSQL用のDDL文を生成します。
// 識別子は常に引用符で囲み、コメント本文はリテラルエスケープします。

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::core::change_op::ChangeOpKind;
use crate::core::schema::{
    Column, Constraint, ConstraintKind, Index, IndexKey, QualifiedName, Table, TypeDescriptor,
};
use crate::services::statement_emitter::StatementDescriptor;

/// PostgreSQL用SQLレンダラー
#[derive(Debug, Clone, Default)]
pub struct SqlRendererService {}

impl SqlRendererService {
    /// 新しいSqlRendererServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// 文記述子を単一のDDL文にレンダリング
    pub fn render(&self, statement: &StatementDescriptor) -> Result<String> {
        let target = &statement.target;
        match statement.verb {
            ChangeOpKind::CreateSchema => {
                Ok(format!("CREATE SCHEMA {}", quote_identifier(&target.schema)))
            }
            ChangeOpKind::DropSchema => {
                Ok(format!("DROP SCHEMA {}", quote_identifier(&target.schema)))
            }
            ChangeOpKind::CreateTable => {
                let table: Table = param(&statement.params, "table")?;
                Ok(self.render_create_table(&table))
            }
            ChangeOpKind::DropTable => Ok(format!("DROP TABLE {}", quote_qualified(target))),
            ChangeOpKind::AddColumn => {
                let column: Column = param(&statement.params, "column")?;
                Ok(format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    quote_qualified(target),
                    self.render_column_definition(&column)
                ))
            }
            ChangeOpKind::DropColumn => {
                let column: String = param(&statement.params, "column")?;
                Ok(format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    quote_qualified(target),
                    quote_identifier(&column)
                ))
            }
            ChangeOpKind::AlterColumnType => {
                let column: String = param(&statement.params, "column")?;
                let to: TypeDescriptor = param(&statement.params, "to")?;
                // 暗黙変換できない型の組でも通るようUSING句で明示キャスト
                Ok(format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
                    quote_qualified(target),
                    quote_identifier(&column),
                    to.render(),
                    quote_identifier(&column),
                    to.render()
                ))
            }
            ChangeOpKind::AlterColumnNullability => {
                let column: String = param(&statement.params, "column")?;
                let nullable: bool = param(&statement.params, "nullable")?;
                let action = if nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
                Ok(format!(
                    "ALTER TABLE {} ALTER COLUMN {} {}",
                    quote_qualified(target),
                    quote_identifier(&column),
                    action
                ))
            }
            ChangeOpKind::AlterColumnDefault => {
                let column: String = param(&statement.params, "column")?;
                let default: Option<String> = param(&statement.params, "default")?;
                let action = match default {
                    Some(expr) => format!("SET DEFAULT {}", expr),
                    None => "DROP DEFAULT".to_string(),
                };
                Ok(format!(
                    "ALTER TABLE {} ALTER COLUMN {} {}",
                    quote_qualified(target),
                    quote_identifier(&column),
                    action
                ))
            }
            ChangeOpKind::AddConstraint => {
                let constraint: Constraint = param(&statement.params, "constraint")?;
                let definition = self
                    .render_constraint_definition(&constraint)
                    .context("unsupported constraint payload")?;
                Ok(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} {}",
                    quote_qualified(target),
                    quote_identifier(&constraint.name),
                    definition
                ))
            }
            ChangeOpKind::DropConstraint => {
                let constraint: Constraint = param(&statement.params, "constraint")?;
                Ok(format!(
                    "ALTER TABLE {} DROP CONSTRAINT {}",
                    quote_qualified(target),
                    quote_identifier(&constraint.name)
                ))
            }
            ChangeOpKind::AddIndex => {
                let index: Index = param(&statement.params, "index")?;
                Ok(self.render_create_index(target, &index))
            }
            ChangeOpKind::DropIndex => {
                let index: Index = param(&statement.params, "index")?;
                Ok(format!(
                    "DROP INDEX {}.{}",
                    quote_identifier(&target.schema),
                    quote_identifier(&index.name)
                ))
            }
            ChangeOpKind::SetComment => {
                let text: String = param(&statement.params, "text")?;
                self.render_comment(&statement.params, &quote_literal(&text))
            }
            ChangeOpKind::ClearComment => self.render_comment(&statement.params, "NULL"),
        }
    }

    fn render_create_table(&self, table: &Table) -> String {
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|column| self.render_column_definition(column))
            .collect();

        for constraint in &table.constraints {
            if let Some(definition) = self.render_constraint_definition(constraint) {
                definitions.push(format!(
                    "CONSTRAINT {} {}",
                    quote_identifier(&constraint.name),
                    definition
                ));
            }
        }

        format!(
            "CREATE TABLE {} (\n    {}\n)",
            quote_qualified(&table.name),
            definitions.join(",\n    ")
        )
    }

    fn render_column_definition(&self, column: &Column) -> String {
        let mut parts = vec![
            quote_identifier(&column.name),
            column.type_descriptor.render(),
        ];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default_expr) = &column.default_expr {
            parts.push(format!("DEFAULT {}", default_expr));
        }
        parts.join(" ")
    }

    /// 制約本体をレンダリング（NOT NULLミラーはNone）
    fn render_constraint_definition(&self, constraint: &Constraint) -> Option<String> {
        let columns = quote_identifier_list(&constraint.columns);
        match &constraint.kind {
            ConstraintKind::PrimaryKey => Some(format!("PRIMARY KEY ({})", columns)),
            ConstraintKind::Unique => Some(format!("UNIQUE ({})", columns)),
            ConstraintKind::NotNull => None,
            ConstraintKind::Check { expression } => Some(format!("CHECK ({})", expression)),
            ConstraintKind::ForeignKey {
                referenced_table,
                referenced_columns,
                on_delete,
                on_update,
            } => Some(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
                columns,
                quote_qualified(referenced_table),
                quote_identifier_list(referenced_columns),
                on_delete.as_sql(),
                on_update.as_sql()
            )),
            ConstraintKind::Exclusion { method, elements } => {
                let elements: Vec<String> = elements
                    .iter()
                    .map(|e| format!("{} WITH {}", quote_identifier(&e.column), e.operator))
                    .collect();
                Some(format!(
                    "EXCLUDE USING {} ({})",
                    method.as_sql(),
                    elements.join(", ")
                ))
            }
        }
    }

    fn render_create_index(&self, table: &QualifiedName, index: &Index) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let key = match &index.key {
            IndexKey::Columns(columns) => quote_identifier_list(columns),
            IndexKey::Expression(expression) => format!("({})", expression),
        };
        format!(
            "CREATE {}INDEX {} ON {} USING {} ({})",
            unique,
            quote_identifier(&index.name),
            quote_qualified(table),
            index.method.as_sql(),
            key
        )
    }

    fn render_comment(&self, params: &Value, value: &str) -> Result<String> {
        let target = &params["comment_target"];
        let table: QualifiedName = serde_json::from_value(target["table"].clone())
            .context("comment target missing table")?;
        match target["kind"].as_str() {
            Some("table") => Ok(format!(
                "COMMENT ON TABLE {} IS {}",
                quote_qualified(&table),
                value
            )),
            Some("column") => {
                let column = target["column"]
                    .as_str()
                    .context("comment target missing column")?;
                Ok(format!(
                    "COMMENT ON COLUMN {}.{} IS {}",
                    quote_qualified(&table),
                    quote_identifier(column),
                    value
                ))
            }
            _ => bail!("unknown comment target kind"),
        }
    }
}

/// パラメータを型付きで取り出す
fn param<T: serde::de::DeserializeOwned>(params: &Value, key: &str) -> Result<T> {
    serde_json::from_value(params[key].clone())
        .with_context(|| format!("statement parameter '{}' has unexpected shape", key))
}

/// 識別子を二重引用符で囲む
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// 修飾名を引用符付きでレンダリング
pub fn quote_qualified(name: &QualifiedName) -> String {
    if name.name.is_empty() {
        quote_identifier(&name.schema)
    } else {
        format!(
            "{}.{}",
            quote_identifier(&name.schema),
            quote_identifier(&name.name)
        )
    }
}

fn quote_identifier_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 文字列リテラルをエスケープ
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::change_op::{ChangeOp, CommentTarget};
    use crate::core::schema::{AccessMethod, ExclusionElement, ReferentialAction};
    use crate::services::statement_emitter::StatementEmitterService;

    fn render(op: ChangeOp) -> String {
        let emitter = StatementEmitterService::new();
        SqlRendererService::new().render(&emitter.emit(&op)).unwrap()
    }

    #[test]
    fn test_create_table_with_constraints() {
        let mut table = Table::new(QualifiedName::new("public", "users"));
        table.add_column(Column::new("id", TypeDescriptor::new("integer"), false));
        table.add_column(
            Column::new(
                "email",
                TypeDescriptor::with_params("varchar", vec!["255".into()]),
                true,
            )
            .with_default("''"),
        );
        table.add_constraint(Constraint::new(
            "users_pkey",
            vec!["id".into()],
            ConstraintKind::PrimaryKey,
        ));

        let sql = render(ChangeOp::CreateTable { table });
        assert!(sql.starts_with("CREATE TABLE \"public\".\"users\""));
        assert!(sql.contains("\"id\" integer NOT NULL"));
        assert!(sql.contains("\"email\" varchar(255) DEFAULT ''"));
        assert!(sql.contains("CONSTRAINT \"users_pkey\" PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn test_alter_column_type_uses_explicit_cast() {
        let sql = render(ChangeOp::AlterColumnType {
            table: QualifiedName::new("public", "users"),
            column: "age".into(),
            from: TypeDescriptor::new("integer"),
            to: TypeDescriptor::new("bigint"),
        });
        assert_eq!(
            sql,
            "ALTER TABLE \"public\".\"users\" ALTER COLUMN \"age\" TYPE bigint USING \"age\"::bigint"
        );
    }

    #[test]
    fn test_nullability_directions() {
        let set = render(ChangeOp::AlterColumnNullability {
            table: QualifiedName::new("public", "users"),
            column: "email".into(),
            nullable: false,
        });
        assert!(set.ends_with("SET NOT NULL"));

        let drop = render(ChangeOp::AlterColumnNullability {
            table: QualifiedName::new("public", "users"),
            column: "email".into(),
            nullable: true,
        });
        assert!(drop.ends_with("DROP NOT NULL"));
    }

    #[test]
    fn test_default_directions() {
        let set = render(ChangeOp::AlterColumnDefault {
            table: QualifiedName::new("public", "users"),
            column: "n".into(),
            default_expr: Some("42".into()),
        });
        assert!(set.ends_with("SET DEFAULT 42"));

        let drop = render(ChangeOp::AlterColumnDefault {
            table: QualifiedName::new("public", "users"),
            column: "n".into(),
            default_expr: None,
        });
        assert!(drop.ends_with("DROP DEFAULT"));
    }

    #[test]
    fn test_foreign_key_with_actions() {
        let sql = render(ChangeOp::AddConstraint {
            table: QualifiedName::new("public", "posts"),
            constraint: Constraint::new(
                "fk_posts_user",
                vec!["user_id".into()],
                ConstraintKind::ForeignKey {
                    referenced_table: QualifiedName::new("public", "users"),
                    referenced_columns: vec!["id".into()],
                    on_delete: ReferentialAction::Cascade,
                    on_update: ReferentialAction::NoAction,
                },
            ),
        });
        assert!(sql.contains(
            "FOREIGN KEY (\"user_id\") REFERENCES \"public\".\"users\" (\"id\") ON DELETE CASCADE ON UPDATE NO ACTION"
        ));
    }

    #[test]
    fn test_exclusion_constraint() {
        let sql = render(ChangeOp::AddConstraint {
            table: QualifiedName::new("public", "bookings"),
            constraint: Constraint::new(
                "excl_overlap",
                vec!["room".into(), "during".into()],
                ConstraintKind::Exclusion {
                    method: AccessMethod::Gist,
                    elements: vec![
                        ExclusionElement {
                            column: "room".into(),
                            operator: "=".into(),
                        },
                        ExclusionElement {
                            column: "during".into(),
                            operator: "&&".into(),
                        },
                    ],
                },
            ),
        });
        assert!(sql.contains("EXCLUDE USING gist (\"room\" WITH =, \"during\" WITH &&)"));
    }

    #[test]
    fn test_expression_index() {
        let sql = render(ChangeOp::AddIndex {
            table: QualifiedName::new("public", "articles"),
            index: Index::new(
                "idx_articles_fts",
                AccessMethod::Gin,
                IndexKey::Expression("to_tsvector('english', body)".into()),
                false,
            ),
        });
        assert_eq!(
            sql,
            "CREATE INDEX \"idx_articles_fts\" ON \"public\".\"articles\" USING gin ((to_tsvector('english', body)))"
        );
    }

    #[test]
    fn test_comment_escaping() {
        let sql = render(ChangeOp::SetComment {
            target: CommentTarget::Column {
                table: QualifiedName::new("public", "users"),
                column: "name".into(),
            },
            text: "user's name".into(),
        });
        assert_eq!(
            sql,
            "COMMENT ON COLUMN \"public\".\"users\".\"name\" IS 'user''s name'"
        );
    }

    #[test]
    fn test_clear_comment_is_null() {
        let sql = render(ChangeOp::ClearComment {
            target: CommentTarget::Table {
                table: QualifiedName::new("public", "users"),
            },
        });
        assert_eq!(sql, "COMMENT ON TABLE \"public\".\"users\" IS NULL");
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote_identifier("weird\"name"), "\"weird\"\"name\"");
        assert_eq!(
            quote_qualified(&QualifiedName::new("public", "users")),
            "\"public\".\"users\""
        );
    }
}
