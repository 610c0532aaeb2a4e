// パイプライン統合テスト
//
// CatalogLoaderをモックに差し替え、イントロスペクションを伴わない
// 形でロード → 差分検出 → プラン構築 → 文記述子生成の全段を通します。

mod common;

use common::{catalog, column, table};
use structsync::core::schema::Catalog;
use structsync::services::plan_builder::PlanBuilderService;
use structsync::services::schema_diff_detector::SchemaDiffDetectorService;
use structsync::services::statement_emitter::StatementEmitterService;
use structsync::services::traits::CatalogLoader;

/// 固定カタログを返すモックローダー
struct StaticCatalogLoader {
    catalog: Catalog,
}

#[async_trait::async_trait]
impl CatalogLoader for StaticCatalogLoader {
    async fn load_catalog(&self, schemas: &[String]) -> anyhow::Result<Catalog> {
        let mut filtered = self.catalog.clone();
        if !schemas.is_empty() {
            filtered.schemas.retain(|name, _| schemas.contains(name));
        }
        Ok(filtered)
    }
}

#[test]
fn full_pipeline_with_mock_loaders() {
    let source = StaticCatalogLoader {
        catalog: catalog(vec![{
            let mut t = table("users");
            t.add_column(column("id", "integer"));
            t
        }]),
    };
    let target = StaticCatalogLoader {
        catalog: catalog(vec![]),
    };

    let (desired, current) = tokio_test::block_on(async {
        let desired = source.load_catalog(&[]).await.unwrap();
        let current = target.load_catalog(&[]).await.unwrap();
        (desired, current)
    });

    let diff = SchemaDiffDetectorService::new()
        .detect_diff(&desired, &current)
        .unwrap();
    let plan = PlanBuilderService::new()
        .build_plan(&diff, &desired, &current)
        .unwrap();
    let statements = StatementEmitterService::new().emit_plan(&plan);

    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0].describe(), "create_schema public");
    assert_eq!(statements[1].describe(), "create_table public.users");
}

#[test]
fn loader_honors_schema_filter() {
    let mut audit = structsync::core::schema::Table::new(
        structsync::core::schema::QualifiedName::new("audit", "log"),
    );
    audit.add_column(column("id", "bigint"));

    let loader = StaticCatalogLoader {
        catalog: catalog(vec![
            {
                let mut t = table("users");
                t.add_column(column("id", "integer"));
                t
            },
            audit,
        ]),
    };

    let filtered = tokio_test::block_on(loader.load_catalog(&["public".to_string()])).unwrap();
    assert_eq!(filtered.schemas.len(), 1);
    assert!(filtered.get_schema("public").is_some());
}
