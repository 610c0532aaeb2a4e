// サービス層
//
// 差分検出、プラン構築、文記述子生成の各サービスと、
// 外部境界（カタログ取得・文適用）のトレイトを提供します。

pub mod plan_builder;
pub mod schema_diff_detector;
pub mod statement_emitter;
pub mod traits;
