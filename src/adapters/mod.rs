// アダプタ層
//
// PostgreSQLへの接続を伴う実装（イントロスペクション、SQL生成、
// プラン実行）を提供します。サービス層のトレイトを実装します。

pub mod catalog_introspector;
pub mod plan_executor;
pub mod sql_renderer;
