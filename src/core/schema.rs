// スキーマドメインモデル
//
// PostgreSQLデータベース構造のスナップショットを表現する型システム。
// Catalog, SchemaDef, Table, Column, Constraint, Index などの構造体を提供します。
// スナップショットは構築時に不変条件を検証し、以降は読み取り専用として扱います。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::core::error::ModelError;

/// 修飾名
///
/// スキーマ修飾された識別子（schema.table）を表現します。
/// スキーマ自体を指す場合は `name` が空になります。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    /// スキーマ名
    pub schema: String,

    /// オブジェクト名（スキーマ自体を指す場合は空）
    pub name: String,
}

impl QualifiedName {
    /// 新しい修飾名を作成
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// スキーマ自体を指す修飾名を作成
    pub fn schema_only(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: String::new(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.schema)
        } else {
            write!(f, "{}.{}", self.schema, self.name)
        }
    }
}

/// 型記述子
///
/// カラム型を「基底型名 + パラメータ列」として表現します。
/// PostgreSQLの膨大な型バリエーション（幾何型、ネットワーク型、JSON、
/// UUID、XML、全文検索、interval など）を型ごとの特殊ケースなしに
/// 構造的等価性で比較するための閉じた表現です。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// 基底型名（小文字正規化済み、例: "varchar", "numeric", "tsvector"）
    pub base: String,

    /// 型パラメータ（例: VARCHAR(255) → ["255"], NUMERIC(10,2) → ["10", "2"]）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
}

impl TypeDescriptor {
    /// 新しい型記述子を作成（基底型名は小文字に正規化）
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim().to_lowercase(),
            params: Vec::new(),
        }
    }

    /// パラメータ付きの型記述子を作成
    pub fn with_params(base: impl Into<String>, params: Vec<String>) -> Self {
        let mut descriptor = Self::new(base);
        descriptor.params = params;
        descriptor
    }

    /// 記述子が分類可能かどうか
    ///
    /// 空の基底型名を持つ記述子は比較不能として扱います。
    pub fn is_classifiable(&self) -> bool {
        !self.base.is_empty()
    }

    /// SQL型表記としてレンダリング（例: "varchar(255)"）
    pub fn render(&self) -> String {
        if self.params.is_empty() {
            self.base.clone()
        } else {
            format!("{}({})", self.base, self.params.join(","))
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// カラム定義
///
/// テーブル内の単一カラムの構造を表現します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// カラム名
    pub name: String,

    /// 型記述子
    #[serde(rename = "type")]
    pub type_descriptor: TypeDescriptor,

    /// NULL許可フラグ
    pub nullable: bool,

    /// デフォルト式（不透明文字列、逐語比較）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_expr: Option<String>,

    /// 序数位置（CREATE TABLE時の並び順、比較では無視）
    #[serde(default)]
    pub ordinal: u32,

    /// コメント（None と Some("") は区別される）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Column {
    /// 新しいカラムを作成
    pub fn new(name: impl Into<String>, type_descriptor: TypeDescriptor, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_descriptor,
            nullable,
            default_expr: None,
            ordinal: 0,
            comment: None,
        }
    }

    /// デフォルト式を設定
    pub fn with_default(mut self, default_expr: impl Into<String>) -> Self {
        self.default_expr = Some(default_expr.into());
        self
    }

    /// コメントを設定
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// 参照アクション
///
/// FOREIGN KEY制約のON DELETE / ON UPDATE句で使用するアクションを表現します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    /// 何もしない（デフォルト）
    #[default]
    NoAction,
    /// 参照先の変更に追従して削除/更新
    Cascade,
    /// 参照先の削除/更新時にNULLに設定
    SetNull,
    /// 参照先の削除/更新時にデフォルト値に設定
    SetDefault,
    /// 参照先の削除/更新を制限
    Restrict,
}

impl ReferentialAction {
    /// SQL句として出力する文字列を返す
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::Restrict => "RESTRICT",
        }
    }
}

/// インデックスアクセスメソッド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMethod {
    Btree,
    Hash,
    Gin,
    Gist,
    Spgist,
    Brin,
}

impl AccessMethod {
    /// SQL上のメソッド名を返す
    pub fn as_sql(&self) -> &'static str {
        match self {
            AccessMethod::Btree => "btree",
            AccessMethod::Hash => "hash",
            AccessMethod::Gin => "gin",
            AccessMethod::Gist => "gist",
            AccessMethod::Spgist => "spgist",
            AccessMethod::Brin => "brin",
        }
    }

    /// メソッド名文字列から変換
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "btree" => Some(AccessMethod::Btree),
            "hash" => Some(AccessMethod::Hash),
            "gin" => Some(AccessMethod::Gin),
            "gist" => Some(AccessMethod::Gist),
            "spgist" => Some(AccessMethod::Spgist),
            "brin" => Some(AccessMethod::Brin),
            _ => None,
        }
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// 排他制約の要素（カラムと演算子のペア）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExclusionElement {
    /// 対象カラム
    pub column: String,

    /// 演算子（例: "&&", "="）
    pub operator: String,
}

/// 制約種別ペイロード
///
/// 制約の種類と種別固有の情報を表現します。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintKind {
    /// プライマリキー制約
    PrimaryKey,

    /// ユニーク制約
    Unique,

    /// NOT NULL制約（カラムのnullableフラグのミラー）
    NotNull,

    /// チェック制約
    Check {
        /// チェック式（不透明文字列）
        expression: String,
    },

    /// 外部キー制約
    ForeignKey {
        /// 参照先テーブル
        referenced_table: QualifiedName,

        /// 参照先カラム
        referenced_columns: Vec<String>,

        /// 参照先レコード削除時のアクション
        #[serde(default)]
        on_delete: ReferentialAction,

        /// 参照先レコード更新時のアクション
        #[serde(default)]
        on_update: ReferentialAction,
    },

    /// 排他制約
    Exclusion {
        /// アクセスメソッド（通常はGiST）
        method: AccessMethod,

        /// (カラム, 演算子) のペア
        elements: Vec<ExclusionElement>,
    },
}

/// 制約定義
///
/// テーブルの制約を表現します。名前は一意性検証にのみ使用し、
/// 差分比較は内容（カラム列 + 種別ペイロード）で行います。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    /// 制約名（テーブル内で一意）
    pub name: String,

    /// 参加カラム（複合キーでは順序が意味を持つ）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,

    /// 種別ペイロード
    #[serde(flatten)]
    pub kind: ConstraintKind,
}

impl Constraint {
    /// 新しい制約を作成
    pub fn new(name: impl Into<String>, columns: Vec<String>, kind: ConstraintKind) -> Self {
        Self {
            name: name.into(),
            columns,
            kind,
        }
    }

    /// 制約の種類を文字列で取得
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            ConstraintKind::PrimaryKey => "primary_key",
            ConstraintKind::Unique => "unique",
            ConstraintKind::NotNull => "not_null",
            ConstraintKind::Check { .. } => "check",
            ConstraintKind::ForeignKey { .. } => "foreign_key",
            ConstraintKind::Exclusion { .. } => "exclusion",
        }
    }

    /// 外部キー制約かどうか
    pub fn is_foreign_key(&self) -> bool {
        matches!(self.kind, ConstraintKind::ForeignKey { .. })
    }

    /// 外部キーの参照先テーブルを取得
    pub fn referenced_table(&self) -> Option<&QualifiedName> {
        match &self.kind {
            ConstraintKind::ForeignKey {
                referenced_table, ..
            } => Some(referenced_table),
            _ => None,
        }
    }

    /// このチェック制約が指定カラムを参照しているかどうか
    pub fn check_references_column(&self, column: &str) -> bool {
        match &self.kind {
            ConstraintKind::Check { expression } => {
                self.columns.iter().any(|c| c == column)
                    || expression_mentions_column(expression, column)
            }
            _ => false,
        }
    }

    /// 構造的内容キーを取得
    ///
    /// 制約名を除いた内容のフィンガープリント。名前が異なっても内容が
    /// 同一なら同じキーになります（リネームを差分として扱わないため）。
    pub fn content_key(&self) -> String {
        // (columns, kind) のJSON表現は決定的
        serde_json::to_string(&(&self.columns, &self.kind))
            .unwrap_or_else(|_| format!("{:?}{:?}", self.columns, self.kind))
    }
}

/// インデックスキー
///
/// 順序付きカラムリスト、または単一式（全文検索・空間インデックス等）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKey {
    /// カラムリスト
    Columns(Vec<String>),

    /// 式（不透明文字列、例: "to_tsvector('english', body)"）
    Expression(String),
}

/// インデックス定義
///
/// テーブルのインデックスを表現します。名前はスキーマ内で一意。
/// 差分比較は内容（メソッド + キー + ユニーク性）で行います。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    /// インデックス名
    pub name: String,

    /// アクセスメソッド
    pub method: AccessMethod,

    /// インデックスキー
    pub key: IndexKey,

    /// ユニークインデックスかどうか
    pub unique: bool,
}

impl Index {
    /// 新しいインデックスを作成
    pub fn new(name: impl Into<String>, method: AccessMethod, key: IndexKey, unique: bool) -> Self {
        Self {
            name: name.into(),
            method,
            key,
            unique,
        }
    }

    /// 構造的内容キーを取得（名前を除く）
    pub fn content_key(&self) -> String {
        serde_json::to_string(&(&self.method, &self.key, self.unique))
            .unwrap_or_else(|_| format!("{:?}{:?}{}", self.method, self.key, self.unique))
    }

    /// このインデックスが指定カラムを参照しているかどうか
    pub fn references_column(&self, column: &str) -> bool {
        match &self.key {
            IndexKey::Columns(columns) => columns.iter().any(|c| c == column),
            IndexKey::Expression(expression) => expression_mentions_column(expression, column),
        }
    }
}

/// 式がカラム名を識別子トークンとして含むかどうか
///
/// 単純な部分文字列一致では "id" が "valid" に誤反応するため、
/// 前後が識別子構成文字でない出現のみを参照とみなします。
fn expression_mentions_column(expression: &str, column: &str) -> bool {
    if column.is_empty() {
        return false;
    }
    let is_ident_char = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    expression.match_indices(column).any(|(start, matched)| {
        let before = expression[..start].chars().next_back();
        let after = expression[start + matched.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

/// テーブル定義
///
/// 単一のテーブルの構造を表現します。
/// カラム、制約、インデックスを排他的に所有します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// 修飾名（schema.table）
    pub name: QualifiedName,

    /// カラム定義のリスト（序数順）
    pub columns: Vec<Column>,

    /// 制約定義のリスト
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,

    /// インデックス定義のリスト
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,

    /// テーブルコメント
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Table {
    /// 新しいテーブルを作成
    pub fn new(name: QualifiedName) -> Self {
        Self {
            name,
            columns: Vec::new(),
            constraints: Vec::new(),
            indexes: Vec::new(),
            comment: None,
        }
    }

    /// カラムを追加（序数は追加順に採番）
    pub fn add_column(&mut self, mut column: Column) {
        column.ordinal = self.columns.len() as u32 + 1;
        self.columns.push(column);
    }

    /// 制約を追加
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// インデックスを追加
    pub fn add_index(&mut self, index: Index) {
        self.indexes.push(index);
    }

    /// 指定されたカラムを取得
    pub fn get_column(&self, column_name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == column_name)
    }

    /// 指定されたカラムが存在するか確認
    pub fn has_column(&self, column_name: &str) -> bool {
        self.get_column(column_name).is_some()
    }

    /// 外部キー制約の一覧を取得
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_foreign_key())
    }
}

/// スキーマ定義
///
/// 単一のPostgreSQLスキーマ（名前空間）を表現します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDef {
    /// スキーマ名
    pub name: String,

    /// テーブル定義のマップ（テーブル名 -> Table）
    #[serde(default)]
    pub tables: BTreeMap<String, Table>,
}

impl SchemaDef {
    /// 新しいスキーマ定義を作成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }

    /// テーブルを追加
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.name.clone(), table);
    }

    /// 指定されたテーブルを取得
    pub fn get_table(&self, table_name: &str) -> Option<&Table> {
        self.tables.get(table_name)
    }
}

/// カタログスナップショット
///
/// ある時点のデータベース全体の構造を表現する不変スナップショット。
/// 比較実行ごとに1回構築され、以降は読み取り専用です。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Catalog {
    /// スキーマ定義のマップ（スキーマ名 -> SchemaDef）
    pub schemas: BTreeMap<String, SchemaDef>,
}

impl Catalog {
    /// 新しい空のカタログを作成
    pub fn new() -> Self {
        Self {
            schemas: BTreeMap::new(),
        }
    }

    /// スキーマを追加
    pub fn add_schema(&mut self, schema: SchemaDef) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    /// テーブルを追加（スキーマが未登録なら作成）
    pub fn add_table(&mut self, table: Table) {
        let schema_name = table.name.schema.clone();
        self.schemas
            .entry(schema_name.clone())
            .or_insert_with(|| SchemaDef::new(schema_name))
            .add_table(table);
    }

    /// 指定されたスキーマを取得
    pub fn get_schema(&self, schema_name: &str) -> Option<&SchemaDef> {
        self.schemas.get(schema_name)
    }

    /// 修飾名でテーブルを取得
    pub fn get_table(&self, name: &QualifiedName) -> Option<&Table> {
        self.schemas.get(&name.schema)?.get_table(&name.name)
    }

    /// 指定されたテーブルが存在するか確認
    pub fn has_table(&self, name: &QualifiedName) -> bool {
        self.get_table(name).is_some()
    }

    /// 全テーブルを走査するイテレータ
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.schemas.values().flat_map(|s| s.tables.values())
    }

    /// テーブル数を取得
    pub fn table_count(&self) -> usize {
        self.schemas.values().map(|s| s.tables.len()).sum()
    }

    /// 構造不変条件を検証
    ///
    /// 以下の違反を `ModelError` として報告します（構築時検証であり、
    /// 差分検出では再検証しません）:
    /// - 同一テーブル内のカラム名・制約名の重複
    /// - 同一スキーマ内のインデックス名の重複
    /// - 制約・インデックスが自テーブルに存在しないカラムを参照
    /// - 外部キーの参照先テーブルがスナップショット内に存在しない
    /// - 外部キーの参照先カラムが参照先テーブルに存在しない
    pub fn validate(&self) -> Result<(), ModelError> {
        for schema in self.schemas.values() {
            let mut index_names: HashSet<&str> = HashSet::new();

            for table in schema.tables.values() {
                let mut column_names: HashSet<&str> = HashSet::new();
                for column in &table.columns {
                    if !column_names.insert(column.name.as_str()) {
                        return Err(ModelError::DuplicateObject {
                            kind: "column",
                            name: column.name.clone(),
                            parent: table.name.to_string(),
                        });
                    }
                }

                let mut constraint_names: HashSet<&str> = HashSet::new();
                for constraint in &table.constraints {
                    if !constraint_names.insert(constraint.name.as_str()) {
                        return Err(ModelError::DuplicateObject {
                            kind: "constraint",
                            name: constraint.name.clone(),
                            parent: table.name.to_string(),
                        });
                    }

                    for column in &constraint.columns {
                        if !table.has_column(column) {
                            return Err(ModelError::UnknownColumn {
                                table: table.name.to_string(),
                                object: constraint.name.clone(),
                                column: column.clone(),
                            });
                        }
                    }

                    if let ConstraintKind::Exclusion { elements, .. } = &constraint.kind {
                        for element in elements {
                            if !table.has_column(&element.column) {
                                return Err(ModelError::UnknownColumn {
                                    table: table.name.to_string(),
                                    object: constraint.name.clone(),
                                    column: element.column.clone(),
                                });
                            }
                        }
                    }

                    if let ConstraintKind::ForeignKey {
                        referenced_table,
                        referenced_columns,
                        ..
                    } = &constraint.kind
                    {
                        let Some(referenced) = self.get_table(referenced_table) else {
                            return Err(ModelError::DanglingReference {
                                table: table.name.to_string(),
                                constraint: constraint.name.clone(),
                                referenced: referenced_table.to_string(),
                            });
                        };
                        for column in referenced_columns {
                            if !referenced.has_column(column) {
                                return Err(ModelError::UnknownColumn {
                                    table: referenced_table.to_string(),
                                    object: constraint.name.clone(),
                                    column: column.clone(),
                                });
                            }
                        }
                    }
                }

                for index in &table.indexes {
                    if !index_names.insert(index.name.as_str()) {
                        return Err(ModelError::DuplicateObject {
                            kind: "index",
                            name: index.name.clone(),
                            parent: schema.name.clone(),
                        });
                    }

                    if let IndexKey::Columns(columns) = &index.key {
                        for column in columns {
                            if !table.has_column(column) {
                                return Err(ModelError::UnknownColumn {
                                    table: table.name.to_string(),
                                    object: index.name.clone(),
                                    column: column.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
