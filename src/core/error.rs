// エラー型定義
//
// コア全体で使用されるカスタムエラー型を提供します。
// thiserrorを使用して、ModelError, DiffError, PlanError, ExecutionError,
// ConfigError を定義します。コア内部のエラーはすべて当該実行に対して
// 終端的であり、部分的な結果を返しません。

use thiserror::Error;

/// スキーマモデル構築エラー（MalformedModel）
///
/// スナップショット構築時の構造不変条件違反を表現します。
/// ロード自体が失敗となり、差分検出には進みません。
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// 同一親の中で同種オブジェクトの名前が重複
    #[error("Duplicate {kind} name '{name}' in {parent}")]
    DuplicateObject {
        /// オブジェクト種別（column / constraint / index）
        kind: &'static str,
        /// 重複した名前
        name: String,
        /// 親オブジェクトの識別子
        parent: String,
    },

    /// 制約・インデックスが存在しないカラムを参照
    #[error("Object '{object}' on {table} references unknown column '{column}'")]
    UnknownColumn {
        /// テーブルの修飾名
        table: String,
        /// 参照元オブジェクト名
        object: String,
        /// 存在しないカラム名
        column: String,
    },

    /// 外部キーの参照先テーブルがスナップショット内に存在しない
    #[error("Foreign key '{constraint}' on {table} references missing table {referenced}")]
    DanglingReference {
        /// テーブルの修飾名
        table: String,
        /// 外部キー制約名
        constraint: String,
        /// 存在しない参照先テーブル
        referenced: String,
    },
}

impl ModelError {
    /// 名前重複エラーかどうか
    pub fn is_duplicate_object(&self) -> bool {
        matches!(self, ModelError::DuplicateObject { .. })
    }

    /// 未知カラム参照エラーかどうか
    pub fn is_unknown_column(&self) -> bool {
        matches!(self, ModelError::UnknownColumn { .. })
    }

    /// 参照先欠落エラーかどうか
    pub fn is_dangling_reference(&self) -> bool {
        matches!(self, ModelError::DanglingReference { .. })
    }
}

/// 差分検出エラー
///
/// 正常な入力に対して差分検出は失敗しません。分類不能な型記述子ペアに
/// 遭遇した場合のみ、部分的な差分を返さずに実行全体を中断します。
#[derive(Debug, Clone, Error)]
pub enum DiffError {
    /// 型記述子ペアを分類できない（防御的検証）
    #[error("Incomparable type descriptors for {table}.{column}: '{left}' vs '{right}'")]
    IncomparableTypes {
        /// テーブルの修飾名
        table: String,
        /// カラム名
        column: String,
        /// 期待側の型表記
        left: String,
        /// 現在側の型表記
        right: String,
    },
}

/// プラン構築エラー
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    /// 遅延FKフェーズ分割後も依存関係グラフに循環が残った
    ///
    /// 致命的・再試行不能。循環に参加する全オブジェクトを列挙します。
    #[error("Unresolvable dependency cycle involving: {}", objects.join(", "))]
    UnresolvableDependencyCycle {
        /// 循環に参加するオブジェクトの修飾名
        objects: Vec<String>,
    },
}

/// 実行エラー
///
/// Executor境界で報告されるエラー。コア自身は生成しません。
/// 呼び出し側は最後に適用済みの序数と失敗した文の記述子を受け取り、
/// 再試行や手動対応を判断できます。
#[derive(Debug, Clone, Error)]
#[error("Statement {statement_index} failed: {reason}")]
pub struct ExecutionError {
    /// 失敗した文の序数（0始まり）
    pub statement_index: usize,
    /// サーバ報告メッセージ等の失敗理由
    pub reason: String,
}

/// 設定エラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 設定ファイルが見つからない
    #[error("Config file not found: {path}")]
    NotFound {
        /// 探索したパス
        path: String,
    },

    /// 設定ファイルの読み込みに失敗
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// YAMLのパースに失敗
    #[error("Failed to parse config file: {message}")]
    Parse {
        /// パーサーのエラーメッセージ
        message: String,
    },

    /// 指定された環境が定義されていない
    #[error("Environment '{name}' is not defined in config")]
    MissingEnvironment {
        /// 環境名
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_display() {
        let err = ModelError::DuplicateObject {
            kind: "column",
            name: "id".to_string(),
            parent: "public.users".to_string(),
        };
        assert_eq!(err.to_string(), "Duplicate column name 'id' in public.users");
        assert!(err.is_duplicate_object());
        assert!(!err.is_unknown_column());
    }

    #[test]
    fn test_dangling_reference_display() {
        let err = ModelError::DanglingReference {
            table: "public.posts".to_string(),
            constraint: "fk_posts_user".to_string(),
            referenced: "public.users".to_string(),
        };
        assert!(err.to_string().contains("fk_posts_user"));
        assert!(err.to_string().contains("public.users"));
        assert!(err.is_dangling_reference());
    }

    #[test]
    fn test_diff_error_display() {
        let err = DiffError::IncomparableTypes {
            table: "public.users".to_string(),
            column: "payload".to_string(),
            left: "".to_string(),
            right: "jsonb".to_string(),
        };
        assert!(err.to_string().contains("public.users.payload"));
    }

    #[test]
    fn test_plan_error_lists_objects() {
        let err = PlanError::UnresolvableDependencyCycle {
            objects: vec!["public.a".to_string(), "public.b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unresolvable dependency cycle involving: public.a, public.b"
        );
    }

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError {
            statement_index: 3,
            reason: "relation already exists".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Statement 3 failed: relation already exists"
        );
    }
}
