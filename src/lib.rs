// structsyncライブラリのエントリーポイント
//
// モジュール構造:
// - cli: CLIレイヤー（ユーザー入力の受付とコマンドルーティング）
// - core: コアドメインロジック（スキーマモデル、変更オペレーション、設定）
// - services: 差分検出、プラン構築、文記述子生成
// - adapters: PostgreSQLへのアクセス（イントロスペクション、SQL生成、実行）

pub mod adapters;
pub mod cli;
pub mod core;
pub mod services;
