// コアドメインモデル
//
// スキーマスナップショット、変更オペレーション、エラー型、設定を提供します。
// このモジュール群は純粋な同期計算のみで構成され、I/Oを行いません。

pub mod change_op;
pub mod config;
pub mod error;
pub mod schema;
