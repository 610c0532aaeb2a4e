// PostgreSQLカタログイントロスペクター
//
// information_schema と pg_catalog からカタログスナップショットを構築します。
// 制約を裏付けるインデックス（PK・UNIQUEの実体）はインデックスとしては
// 取り込みません。構築後に構造不変条件を検証し、違反があればロード自体を
// 失敗させます。

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::core::schema::{
    AccessMethod, Catalog, Column, Constraint, ConstraintKind, ExclusionElement, Index, IndexKey,
    QualifiedName, ReferentialAction, Table, TypeDescriptor,
};
use crate::services::traits::CatalogLoader;

/// 生のカラム情報（information_schema.columnsの行）
#[derive(Debug, Clone)]
struct RawColumnInfo {
    name: String,
    data_type: String,
    udt_name: String,
    is_nullable: bool,
    default_value: Option<String>,
    char_max_length: Option<i32>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
    comment: Option<String>,
}

/// 生の制約情報（pg_constraintの行）
#[derive(Debug, Clone)]
struct RawConstraintInfo {
    name: String,
    contype: String,
    columns: Vec<String>,
    referenced_schema: Option<String>,
    referenced_table: Option<String>,
    referenced_columns: Vec<String>,
    on_delete: Option<String>,
    on_update: Option<String>,
    check_expression: Option<String>,
    exclusion_method: Option<String>,
    exclusion_operators: Vec<String>,
}

/// 生のインデックス情報（pg_indexの行）
#[derive(Debug, Clone)]
struct RawIndexInfo {
    name: String,
    method: String,
    unique: bool,
    columns: Vec<String>,
    expression: Option<String>,
}

/// PostgreSQLカタログイントロスペクター
pub struct PgCatalogIntrospector {
    pool: PgPool,
}

impl PgCatalogIntrospector {
    /// 接続プールからイントロスペクターを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 対象スキーマ名の一覧を取得
    async fn get_schema_names(&self, schemas: &[String]) -> Result<Vec<String>> {
        let sql = r#"
            SELECT nspname
            FROM pg_catalog.pg_namespace
            WHERE nspname NOT LIKE 'pg_%'
              AND nspname <> 'information_schema'
            ORDER BY nspname
        "#;

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .context("failed to list schemas")?;

        let names: Vec<String> = rows
            .iter()
            .map(|row| row.get::<String, _>(0))
            .filter(|name| schemas.is_empty() || schemas.contains(name))
            .collect();
        Ok(names)
    }

    /// スキーマ内のテーブル名一覧を取得
    async fn get_table_names(&self, schema: &str) -> Result<Vec<String>> {
        let sql = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = $1
              AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        let rows = sqlx::query(sql)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to list tables in schema {}", schema))?;

        Ok(rows.iter().map(|row| row.get::<String, _>(0)).collect())
    }

    /// テーブルコメントを取得
    async fn get_table_comment(&self, schema: &str, table: &str) -> Result<Option<String>> {
        let sql = r#"
            SELECT obj_description(c.oid, 'pg_class')
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1 AND c.relname = $2
        "#;

        let row = sqlx::query(sql)
            .bind(schema)
            .bind(table)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch table comment")?;

        Ok(row.and_then(|r| r.get::<Option<String>, _>(0)))
    }

    /// カラム情報を取得（コメント込み）
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<RawColumnInfo>> {
        let sql = r#"
            SELECT
                c.column_name,
                c.data_type,
                c.udt_name,
                c.is_nullable,
                c.column_default,
                c.character_maximum_length,
                c.numeric_precision,
                c.numeric_scale,
                col_description(pc.oid, c.ordinal_position) AS comment
            FROM information_schema.columns c
            JOIN pg_catalog.pg_class pc ON pc.relname = c.table_name
            JOIN pg_catalog.pg_namespace pn
              ON pn.oid = pc.relnamespace AND pn.nspname = c.table_schema
            WHERE c.table_schema = $1 AND c.table_name = $2
            ORDER BY c.ordinal_position
        "#;

        let rows = sqlx::query(sql)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to fetch columns of {}.{}", schema, table))?;

        let columns = rows
            .iter()
            .map(|row| RawColumnInfo {
                name: row.get("column_name"),
                data_type: row.get("data_type"),
                udt_name: row.get("udt_name"),
                is_nullable: row.get::<String, _>("is_nullable") == "YES",
                default_value: row.get("column_default"),
                char_max_length: row.get("character_maximum_length"),
                numeric_precision: row.get("numeric_precision"),
                numeric_scale: row.get("numeric_scale"),
                comment: row.get("comment"),
            })
            .collect();
        Ok(columns)
    }

    /// 制約情報を取得
    async fn get_constraints(&self, schema: &str, table: &str) -> Result<Vec<RawConstraintInfo>> {
        let sql = r#"
            SELECT
                con.conname,
                con.contype::text AS contype,
                ARRAY(
                    SELECT a.attname
                    FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
                    JOIN pg_catalog.pg_attribute a
                      ON a.attrelid = con.conrelid AND a.attnum = k.attnum
                    ORDER BY k.ord
                ) AS columns,
                fn.nspname AS referenced_schema,
                fc.relname AS referenced_table,
                ARRAY(
                    SELECT a.attname
                    FROM unnest(con.confkey) WITH ORDINALITY AS k(attnum, ord)
                    JOIN pg_catalog.pg_attribute a
                      ON a.attrelid = con.confrelid AND a.attnum = k.attnum
                    ORDER BY k.ord
                ) AS referenced_columns,
                con.confdeltype::text AS on_delete,
                con.confupdtype::text AS on_update,
                CASE WHEN con.contype = 'c'
                     THEN pg_get_expr(con.conbin, con.conrelid)
                END AS check_expression,
                am.amname AS exclusion_method,
                ARRAY(
                    SELECT o.oprname
                    FROM unnest(con.conexclop) WITH ORDINALITY AS e(oproid, ord)
                    JOIN pg_catalog.pg_operator o ON o.oid = e.oproid
                    ORDER BY e.ord
                ) AS exclusion_operators
            FROM pg_catalog.pg_constraint con
            JOIN pg_catalog.pg_class c ON c.oid = con.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            LEFT JOIN pg_catalog.pg_class fc ON fc.oid = con.confrelid
            LEFT JOIN pg_catalog.pg_namespace fn ON fn.oid = fc.relnamespace
            LEFT JOIN pg_catalog.pg_class ic ON ic.oid = con.conindid
            LEFT JOIN pg_catalog.pg_am am ON am.oid = ic.relam
            WHERE n.nspname = $1 AND c.relname = $2
              AND con.contype IN ('p', 'u', 'f', 'c', 'x')
            ORDER BY con.conname
        "#;

        let rows = sqlx::query(sql)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to fetch constraints of {}.{}", schema, table))?;

        let constraints = rows
            .iter()
            .map(|row| RawConstraintInfo {
                name: row.get("conname"),
                contype: row.get("contype"),
                columns: row.get("columns"),
                referenced_schema: row.get("referenced_schema"),
                referenced_table: row.get("referenced_table"),
                referenced_columns: row.get("referenced_columns"),
                on_delete: row.get("on_delete"),
                on_update: row.get("on_update"),
                check_expression: row.get("check_expression"),
                exclusion_method: row.get("exclusion_method"),
                exclusion_operators: row.get("exclusion_operators"),
            })
            .collect();
        Ok(constraints)
    }

    /// インデックス情報を取得（制約の実体は除外）
    async fn get_indexes(&self, schema: &str, table: &str) -> Result<Vec<RawIndexInfo>> {
        let sql = r#"
            SELECT
                ic.relname AS index_name,
                am.amname AS method,
                i.indisunique AS is_unique,
                ARRAY(
                    SELECT a.attname
                    FROM unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord)
                    JOIN pg_catalog.pg_attribute a
                      ON a.attrelid = i.indrelid AND a.attnum = k.attnum
                    WHERE k.attnum <> 0
                    ORDER BY k.ord
                ) AS columns,
                pg_get_expr(i.indexprs, i.indrelid) AS expression
            FROM pg_catalog.pg_index i
            JOIN pg_catalog.pg_class ic ON ic.oid = i.indexrelid
            JOIN pg_catalog.pg_class c ON c.oid = i.indrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_catalog.pg_am am ON am.oid = ic.relam
            WHERE n.nspname = $1 AND c.relname = $2
              AND NOT EXISTS (
                  SELECT 1 FROM pg_catalog.pg_constraint con
                  WHERE con.conindid = i.indexrelid
              )
            ORDER BY ic.relname
        "#;

        let rows = sqlx::query(sql)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to fetch indexes of {}.{}", schema, table))?;

        let indexes = rows
            .iter()
            .map(|row| RawIndexInfo {
                name: row.get("index_name"),
                method: row.get("method"),
                unique: row.get("is_unique"),
                columns: row.get("columns"),
                expression: row.get("expression"),
            })
            .collect();
        Ok(indexes)
    }

    /// テーブル全体を構築
    async fn load_table(&self, schema: &str, table_name: &str) -> Result<Table> {
        let mut table = Table::new(QualifiedName::new(schema, table_name));
        table.comment = self.get_table_comment(schema, table_name).await?;

        for raw in self.get_columns(schema, table_name).await? {
            table.add_column(convert_column(&raw));
        }

        for raw in self.get_constraints(schema, table_name).await? {
            if let Some(constraint) = convert_constraint(&raw) {
                table.add_constraint(constraint);
            }
        }

        for raw in self.get_indexes(schema, table_name).await? {
            if let Some(index) = convert_index(&raw) {
                table.add_index(index);
            }
        }

        Ok(table)
    }
}

#[async_trait]
impl CatalogLoader for PgCatalogIntrospector {
    async fn load_catalog(&self, schemas: &[String]) -> Result<Catalog> {
        let mut catalog = Catalog::new();

        for schema in self.get_schema_names(schemas).await? {
            catalog.add_schema(crate::core::schema::SchemaDef::new(&schema));
            for table_name in self.get_table_names(&schema).await? {
                let table = self.load_table(&schema, &table_name).await?;
                catalog.add_table(table);
            }
        }

        catalog.validate().context("introspected catalog is malformed")?;
        debug!(
            schema_count = catalog.schemas.len(),
            table_count = catalog.table_count(),
            "catalog loaded"
        );
        Ok(catalog)
    }
}

/// 生カラム情報を型記述子付きカラムへ変換
fn convert_column(raw: &RawColumnInfo) -> Column {
    let descriptor = convert_type(raw);
    let mut column = Column::new(&raw.name, descriptor, raw.is_nullable);
    column.default_expr = raw.default_value.clone();
    column.comment = raw.comment.clone();
    column
}

/// information_schemaの型情報を閉じた型記述子へ変換
///
/// USER-DEFINED型と配列はudt_nameを基底名に採用します。長さ・精度の
/// パラメータを持つ型のみparamsを埋めます。
fn convert_type(raw: &RawColumnInfo) -> TypeDescriptor {
    let base = match raw.data_type.as_str() {
        "USER-DEFINED" | "ARRAY" => raw.udt_name.clone(),
        "character varying" => "varchar".to_string(),
        "character" => "char".to_string(),
        "timestamp without time zone" => "timestamp".to_string(),
        "timestamp with time zone" => "timestamptz".to_string(),
        "time without time zone" => "time".to_string(),
        "time with time zone" => "timetz".to_string(),
        other => other.to_string(),
    };

    let params = match base.as_str() {
        "varchar" | "char" => raw
            .char_max_length
            .map(|l| vec![l.to_string()])
            .unwrap_or_default(),
        "numeric" | "decimal" => match (raw.numeric_precision, raw.numeric_scale) {
            (Some(p), Some(s)) => vec![p.to_string(), s.to_string()],
            (Some(p), None) => vec![p.to_string()],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    TypeDescriptor::with_params(base, params)
}

/// 生制約情報を制約定義へ変換（未知の種別はNone）
fn convert_constraint(raw: &RawConstraintInfo) -> Option<Constraint> {
    let kind = match raw.contype.as_str() {
        "p" => ConstraintKind::PrimaryKey,
        "u" => ConstraintKind::Unique,
        "c" => ConstraintKind::Check {
            expression: raw.check_expression.clone().unwrap_or_default(),
        },
        "f" => ConstraintKind::ForeignKey {
            referenced_table: QualifiedName::new(
                raw.referenced_schema.clone().unwrap_or_default(),
                raw.referenced_table.clone().unwrap_or_default(),
            ),
            referenced_columns: raw.referenced_columns.clone(),
            on_delete: convert_action(raw.on_delete.as_deref()),
            on_update: convert_action(raw.on_update.as_deref()),
        },
        "x" => ConstraintKind::Exclusion {
            method: raw
                .exclusion_method
                .as_deref()
                .and_then(AccessMethod::parse)
                .unwrap_or(AccessMethod::Gist),
            elements: raw
                .columns
                .iter()
                .zip(raw.exclusion_operators.iter())
                .map(|(column, operator)| ExclusionElement {
                    column: column.clone(),
                    operator: operator.clone(),
                })
                .collect(),
        },
        _ => return None,
    };

    Some(Constraint::new(&raw.name, raw.columns.clone(), kind))
}

/// pg_constraintのアクション文字を参照アクションへ変換
fn convert_action(code: Option<&str>) -> ReferentialAction {
    match code {
        Some("c") => ReferentialAction::Cascade,
        Some("n") => ReferentialAction::SetNull,
        Some("d") => ReferentialAction::SetDefault,
        Some("r") => ReferentialAction::Restrict,
        _ => ReferentialAction::NoAction,
    }
}

/// 生インデックス情報をインデックス定義へ変換
///
/// 未知のアクセスメソッドは取り込みません。式インデックスは式を、
/// それ以外はカラムリストをキーにします。
fn convert_index(raw: &RawIndexInfo) -> Option<Index> {
    let method = AccessMethod::parse(&raw.method)?;
    let key = match &raw.expression {
        Some(expression) => IndexKey::Expression(expression.clone()),
        None => IndexKey::Columns(raw.columns.clone()),
    };
    Some(Index::new(&raw.name, method, key, raw.unique))
}
