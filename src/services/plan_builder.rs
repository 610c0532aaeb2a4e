// マイグレーションプランビルダー
//
// 順序なしの変更オペレーション集合を、PostgreSQLが受理する安全な
// 実行順序に並び替えます。外部キーは CreateTable ペイロードから剥離され
// 専用の遅延フェーズで追加されるため、参照循環があってもテーブル作成は
// 常に可能です。組み立て後に依存関係シミュレーションを行い、解決不能な
// 順序を UnresolvableDependencyCycle として検出します。

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::change_op::{ChangeOp, ChangeOpKind};
use crate::core::error::PlanError;
use crate::core::schema::{Catalog, Constraint, ConstraintKind, Index, QualifiedName, Table};

/// プランフェーズ
///
/// 全フェーズは宣言順に実行されます。破壊的フェーズが先行し、
/// 同名オブジェクトの置き換え（DROPしてからCREATE）を可能にします。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanPhase {
    /// 外部キー制約の削除（削除対象テーブルのFK注入を含む）
    DropForeignKeys,
    /// FK以外の制約とインデックスの削除
    DropSecondary,
    /// カラムの削除
    DropColumns,
    /// テーブルの削除(逆依存順)
    DropTables,
    /// スキーマの削除
    DropSchemas,
    /// スキーマの作成
    CreateSchemas,
    /// テーブルの作成（FK剥離済み、依存順）
    CreateTables,
    /// カラム変更・追加、インデックス追加、コメント変更
    AlterAndAdd,
    /// FK以外の制約の追加
    AddConstraints,
    /// 外部キー制約の追加（遅延フェーズ）
    AddForeignKeys,
}

impl PlanPhase {
    /// 実行順の全フェーズ
    pub const ALL: [PlanPhase; 10] = [
        PlanPhase::DropForeignKeys,
        PlanPhase::DropSecondary,
        PlanPhase::DropColumns,
        PlanPhase::DropTables,
        PlanPhase::DropSchemas,
        PlanPhase::CreateSchemas,
        PlanPhase::CreateTables,
        PlanPhase::AlterAndAdd,
        PlanPhase::AddConstraints,
        PlanPhase::AddForeignKeys,
    ];

    /// 表示用ラベルを返す
    pub fn label(&self) -> &'static str {
        match self {
            PlanPhase::DropForeignKeys => "drop foreign keys",
            PlanPhase::DropSecondary => "drop constraints and indexes",
            PlanPhase::DropColumns => "drop columns",
            PlanPhase::DropTables => "drop tables",
            PlanPhase::DropSchemas => "drop schemas",
            PlanPhase::CreateSchemas => "create schemas",
            PlanPhase::CreateTables => "create tables",
            PlanPhase::AlterAndAdd => "alter and add",
            PlanPhase::AddConstraints => "add constraints",
            PlanPhase::AddForeignKeys => "add foreign keys",
        }
    }
}

/// マイグレーションプラン
///
/// フェーズ順に並んだ変更オペレーション列。実行系はこの順序のまま
/// 逐次適用します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    phases: Vec<(PlanPhase, Vec<ChangeOp>)>,
}

impl MigrationPlan {
    /// 実行順の全オペレーションを走査するイテレータ
    pub fn ordered_ops(&self) -> impl Iterator<Item = &ChangeOp> {
        self.phases.iter().flat_map(|(_, ops)| ops.iter())
    }

    /// 指定フェーズのオペレーションを取得
    pub fn ops_in(&self, phase: PlanPhase) -> &[ChangeOp] {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, ops)| ops.as_slice())
            .unwrap_or(&[])
    }

    /// オペレーション総数を取得
    pub fn len(&self) -> usize {
        self.phases.iter().map(|(_, ops)| ops.len()).sum()
    }

    /// プランが空かどうか
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// フェーズ別の件数サマリを取得
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .phases
            .iter()
            .filter(|(_, ops)| !ops.is_empty())
            .map(|(phase, ops)| format!("{}: {}", phase.label(), ops.len()))
            .collect();
        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// プランビルダーサービス
#[derive(Debug, Clone, Default)]
pub struct PlanBuilderService {}

impl PlanBuilderService {
    /// 新しいPlanBuilderServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// 変更オペレーション集合から実行プランを構築
    ///
    /// # Arguments
    ///
    /// * `ops` - 差分検出が生成した順序なしオペレーション集合
    /// * `desired` - 期待側カタログ（依存オブジェクトの展開に使用）
    /// * `current` - 現在側カタログ（依存オブジェクトの展開に使用）
    pub fn build_plan(
        &self,
        ops: &[ChangeOp],
        desired: &Catalog,
        current: &Catalog,
    ) -> Result<MigrationPlan, PlanError> {
        let mut buckets: BTreeMap<PlanPhase, Vec<ChangeOp>> = PlanPhase::ALL
            .iter()
            .map(|phase| (*phase, Vec::new()))
            .collect();

        let dropped_tables: BTreeSet<QualifiedName> = ops
            .iter()
            .filter_map(|op| match op {
                ChangeOp::DropTable { table } => Some(table.clone()),
                _ => None,
            })
            .collect();

        // 注入済みオペレーションの重複排除キー
        let mut injected: HashSet<String> = HashSet::new();

        for op in ops {
            match op {
                ChangeOp::CreateSchema { .. } => {
                    buckets.entry(PlanPhase::CreateSchemas).or_default().push(op.clone());
                }
                ChangeOp::DropSchema { .. } => {
                    buckets.entry(PlanPhase::DropSchemas).or_default().push(op.clone());
                }
                ChangeOp::CreateTable { table } => {
                    // FKを剥離して遅延フェーズへ送る（参照循環の分断）
                    let (stripped, deferred) = strip_foreign_keys(table);
                    buckets
                        .entry(PlanPhase::CreateTables)
                        .or_default()
                        .push(ChangeOp::CreateTable { table: stripped });
                    for constraint in deferred {
                        buckets
                            .entry(PlanPhase::AddForeignKeys)
                            .or_default()
                            .push(ChangeOp::AddConstraint {
                                table: table.name.clone(),
                                constraint,
                            });
                    }
                }
                ChangeOp::DropTable { table } => {
                    // 削除対象テーブル自身のFKを先に削除して削除順の循環を分断
                    if let Some(full) = current.get_table(table) {
                        for fk in full.foreign_keys() {
                            let key = format!("drop:{}:{}", table, fk.content_key());
                            if injected.insert(key) {
                                buckets
                                    .entry(PlanPhase::DropForeignKeys)
                                    .or_default()
                                    .push(ChangeOp::DropConstraint {
                                        table: table.clone(),
                                        constraint: fk.clone(),
                                    });
                            }
                        }
                    }
                    buckets.entry(PlanPhase::DropTables).or_default().push(op.clone());
                }
                ChangeOp::AddColumn { .. }
                | ChangeOp::AlterColumnNullability { .. }
                | ChangeOp::AlterColumnDefault { .. }
                | ChangeOp::AddIndex { .. }
                | ChangeOp::SetComment { .. }
                | ChangeOp::ClearComment { .. } => {
                    buckets.entry(PlanPhase::AlterAndAdd).or_default().push(op.clone());
                }
                ChangeOp::AlterColumnType { table, column, .. } => {
                    // 型変更カラムに依存する現存オブジェクトを
                    // DROP -> ALTER -> 再ADD に展開
                    self.expand_dependents(
                        table,
                        column,
                        desired,
                        current,
                        &dropped_tables,
                        &mut injected,
                        &mut buckets,
                    );
                    buckets.entry(PlanPhase::AlterAndAdd).or_default().push(op.clone());
                }
                ChangeOp::DropColumn { .. } => {
                    buckets.entry(PlanPhase::DropColumns).or_default().push(op.clone());
                }
                ChangeOp::AddConstraint { constraint, .. } => {
                    let phase = if constraint.is_foreign_key() {
                        PlanPhase::AddForeignKeys
                    } else {
                        PlanPhase::AddConstraints
                    };
                    buckets.entry(phase).or_default().push(op.clone());
                }
                ChangeOp::DropConstraint { table, constraint } => {
                    let key = format!("drop:{}:{}", table, constraint.content_key());
                    if injected.insert(key) {
                        let phase = if constraint.is_foreign_key() {
                            PlanPhase::DropForeignKeys
                        } else {
                            PlanPhase::DropSecondary
                        };
                        buckets.entry(phase).or_default().push(op.clone());
                    }
                }
                ChangeOp::DropIndex { .. } => {
                    buckets.entry(PlanPhase::DropSecondary).or_default().push(op.clone());
                }
            }
        }

        // フェーズ内の決定的順序
        for (phase, bucket) in buckets.iter_mut() {
            match phase {
                PlanPhase::CreateTables => {
                    order_tables_dependency_first(bucket, desired);
                }
                PlanPhase::DropTables => {
                    // 参照元を参照先より先に削除（依存順の逆転）
                    order_tables_dependency_first(bucket, current);
                    bucket.reverse();
                }
                PlanPhase::AlterAndAdd => {
                    bucket.sort_by(|a, b| {
                        alter_category(a)
                            .cmp(&alter_category(b))
                            .then_with(|| a.sort_key().cmp(&b.sort_key()))
                    });
                }
                _ => {
                    bucket.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
                }
            }
        }

        let plan = MigrationPlan {
            phases: PlanPhase::ALL
                .iter()
                .map(|phase| (*phase, buckets.remove(phase).unwrap_or_default()))
                .collect(),
        };

        self.verify_dependencies(&plan, current)?;

        debug!(op_count = plan.len(), summary = %plan.summary(), "migration plan built");
        Ok(plan)
    }

    /// 型変更カラムに依存する現存オブジェクトを DROP / 再ADD として注入
    ///
    /// 差分として既に現れている（内容が変わった）依存オブジェクトは
    /// 対象外です。両側で内容が一致し差分に現れないものだけを扱います。
    #[allow(clippy::too_many_arguments)]
    fn expand_dependents(
        &self,
        table: &QualifiedName,
        column: &str,
        desired: &Catalog,
        current: &Catalog,
        dropped_tables: &BTreeSet<QualifiedName>,
        injected: &mut HashSet<String>,
        buckets: &mut BTreeMap<PlanPhase, Vec<ChangeOp>>,
    ) {
        for current_table in current.tables() {
            if dropped_tables.contains(&current_table.name) {
                continue;
            }
            let Some(desired_table) = desired.get_table(&current_table.name) else {
                continue;
            };

            for constraint in &current_table.constraints {
                if !constraint_depends_on(constraint, &current_table.name, table, column) {
                    continue;
                }
                if !survives_constraint(desired_table, constraint) {
                    continue;
                }
                let key = format!("drop:{}:{}", current_table.name, constraint.content_key());
                if !injected.insert(key) {
                    continue;
                }

                let (drop_phase, add_phase) = if constraint.is_foreign_key() {
                    (PlanPhase::DropForeignKeys, PlanPhase::AddForeignKeys)
                } else {
                    (PlanPhase::DropSecondary, PlanPhase::AddConstraints)
                };
                buckets
                    .entry(drop_phase)
                    .or_default()
                    .push(ChangeOp::DropConstraint {
                        table: current_table.name.clone(),
                        constraint: constraint.clone(),
                    });
                buckets
                    .entry(add_phase)
                    .or_default()
                    .push(ChangeOp::AddConstraint {
                        table: current_table.name.clone(),
                        constraint: constraint.clone(),
                    });
            }

            // インデックスは自テーブルのカラムにのみ依存する
            if current_table.name == *table {
                for index in &current_table.indexes {
                    if !index.references_column(column) {
                        continue;
                    }
                    if !survives_index(desired_table, index) {
                        continue;
                    }
                    let key = format!("drop:{}:{}", current_table.name, index.content_key());
                    if !injected.insert(key) {
                        continue;
                    }

                    buckets
                        .entry(PlanPhase::DropSecondary)
                        .or_default()
                        .push(ChangeOp::DropIndex {
                            table: current_table.name.clone(),
                            index: index.clone(),
                        });
                    buckets
                        .entry(PlanPhase::AlterAndAdd)
                        .or_default()
                        .push(ChangeOp::AddIndex {
                            table: current_table.name.clone(),
                            index: index.clone(),
                        });
                }
            }
        }
    }

    /// 組み立て済みプランの依存関係シミュレーション
    ///
    /// 現在側カタログを初期状態として全オペレーションを順に模擬適用し、
    /// どの並びでも満たせない参照を検出します。通常の入力では発生せず、
    /// 発生した場合は致命的・再試行不能です。
    fn verify_dependencies(&self, plan: &MigrationPlan, current: &Catalog) -> Result<(), PlanError> {
        let mut live_schemas: BTreeSet<String> = current.schemas.keys().cloned().collect();
        let mut live_tables: BTreeSet<QualifiedName> =
            current.tables().map(|t| t.name.clone()).collect();
        // (参照元テーブル, 内容キー) -> 参照先テーブル
        let mut live_fks: BTreeMap<(QualifiedName, String), QualifiedName> = BTreeMap::new();
        for table in current.tables() {
            for fk in table.foreign_keys() {
                if let Some(referenced) = fk.referenced_table() {
                    live_fks.insert((table.name.clone(), fk.content_key()), referenced.clone());
                }
            }
        }

        for op in plan.ordered_ops() {
            match op {
                ChangeOp::CreateSchema { name } => {
                    live_schemas.insert(name.clone());
                }
                ChangeOp::DropSchema { name } => {
                    if live_tables.iter().any(|t| &t.schema == name) {
                        let objects: Vec<String> = live_tables
                            .iter()
                            .filter(|t| &t.schema == name)
                            .map(|t| t.to_string())
                            .collect();
                        return Err(PlanError::UnresolvableDependencyCycle { objects });
                    }
                    live_schemas.remove(name);
                }
                ChangeOp::CreateTable { table } => {
                    if !live_schemas.contains(&table.name.schema) {
                        return Err(PlanError::UnresolvableDependencyCycle {
                            objects: vec![table.name.schema.clone(), table.name.to_string()],
                        });
                    }
                    live_tables.insert(table.name.clone());
                    for fk in table.foreign_keys() {
                        if let Some(referenced) = fk.referenced_table() {
                            live_fks.insert(
                                (table.name.clone(), fk.content_key()),
                                referenced.clone(),
                            );
                        }
                    }
                }
                ChangeOp::DropTable { table } => {
                    let blockers: Vec<String> = live_fks
                        .iter()
                        .filter(|((owner, _), referenced)| {
                            owner != table && *referenced == table && live_tables.contains(owner)
                        })
                        .map(|((owner, _), _)| owner.to_string())
                        .collect();
                    if !blockers.is_empty() {
                        let mut objects = blockers;
                        objects.push(table.to_string());
                        return Err(PlanError::UnresolvableDependencyCycle { objects });
                    }
                    live_tables.remove(table);
                    live_fks.retain(|(owner, _), _| owner != table);
                }
                ChangeOp::AddConstraint { table, constraint } => {
                    if let Some(referenced) = constraint.referenced_table() {
                        if !live_tables.contains(referenced) {
                            return Err(PlanError::UnresolvableDependencyCycle {
                                objects: vec![table.to_string(), referenced.to_string()],
                            });
                        }
                        live_fks
                            .insert((table.clone(), constraint.content_key()), referenced.clone());
                    }
                }
                ChangeOp::DropConstraint { table, constraint } => {
                    if constraint.is_foreign_key() {
                        live_fks.remove(&(table.clone(), constraint.content_key()));
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// CreateTableペイロードからFK制約を剥離
fn strip_foreign_keys(table: &Table) -> (Table, Vec<Constraint>) {
    let mut stripped = table.clone();
    let (foreign, rest): (Vec<Constraint>, Vec<Constraint>) = stripped
        .constraints
        .into_iter()
        .partition(|c| c.is_foreign_key());
    stripped.constraints = rest;
    (stripped, foreign)
}

/// 制約が指定カラムに依存しているかどうか
///
/// 自テーブルの制約（参加カラム、チェック式、排他要素）に加えて、
/// 他テーブルからのFKの参照先カラムも依存として扱います。
fn constraint_depends_on(
    constraint: &Constraint,
    owner: &QualifiedName,
    table: &QualifiedName,
    column: &str,
) -> bool {
    if owner == table {
        if constraint.columns.iter().any(|c| c == column) {
            return true;
        }
        if constraint.check_references_column(column) {
            return true;
        }
        if let ConstraintKind::Exclusion { elements, .. } = &constraint.kind {
            if elements.iter().any(|e| e.column == column) {
                return true;
            }
        }
    }
    if let ConstraintKind::ForeignKey {
        referenced_table,
        referenced_columns,
        ..
    } = &constraint.kind
    {
        if referenced_table == table && referenced_columns.iter().any(|c| c == column) {
            return true;
        }
    }
    false
}

fn survives_constraint(desired_table: &Table, constraint: &Constraint) -> bool {
    let key = constraint.content_key();
    desired_table.constraints.iter().any(|c| c.content_key() == key)
}

fn survives_index(desired_table: &Table, index: &Index) -> bool {
    let key = index.content_key();
    desired_table.indexes.iter().any(|i| i.content_key() == key)
}

/// AlterAndAddフェーズ内のカテゴリ順序
///
/// カラム追加が先、次いでカラム変更、インデックス、コメントの順。
/// 新規カラムを参照するインデックスやコメントが常に後になります。
fn alter_category(op: &ChangeOp) -> u8 {
    match op.kind() {
        ChangeOpKind::AddColumn => 0,
        ChangeOpKind::AlterColumnType => 1,
        ChangeOpKind::AlterColumnNullability => 2,
        ChangeOpKind::AlterColumnDefault => 3,
        ChangeOpKind::AddIndex => 4,
        ChangeOpKind::SetComment => 5,
        ChangeOpKind::ClearComment => 6,
        _ => 7,
    }
}

/// テーブルオペレーション列をFK依存順（参照先が先）に並び替え
///
/// Kahnのアルゴリズム。準備キューは名前順で取り出すため決定的です。
/// 循環の残余は名前順で末尾に付加します（FKは遅延されるため作成順の
/// 循環は実行可能性に影響しません）。
fn order_tables_dependency_first(bucket: &mut Vec<ChangeOp>, catalog: &Catalog) {
    let names: Vec<QualifiedName> = bucket
        .iter()
        .filter_map(|op| op.table().cloned())
        .collect();
    let members: BTreeSet<QualifiedName> = names.iter().cloned().collect();

    let mut in_degree: BTreeMap<QualifiedName, usize> =
        members.iter().map(|n| (n.clone(), 0)).collect();
    let mut dependents: BTreeMap<QualifiedName, Vec<QualifiedName>> = BTreeMap::new();

    for name in &members {
        if let Some(table) = catalog.get_table(name) {
            for fk in table.foreign_keys() {
                if let Some(referenced) = fk.referenced_table() {
                    if referenced != name && members.contains(referenced) {
                        if let Some(degree) = in_degree.get_mut(name) {
                            *degree += 1;
                        }
                        dependents
                            .entry(referenced.clone())
                            .or_default()
                            .push(name.clone());
                    }
                }
            }
        }
    }

    let mut ready: BTreeSet<QualifiedName> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| name.clone())
        .collect();
    let mut order: Vec<QualifiedName> = Vec::new();
    let mut placed: BTreeSet<QualifiedName> = BTreeSet::new();

    while let Some(name) = ready.iter().next().cloned() {
        ready.remove(&name);
        placed.insert(name.clone());
        order.push(name.clone());
        if let Some(deps) = dependents.get(&name).cloned() {
            for dep in deps {
                if let Some(degree) = in_degree.get_mut(&dep) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 && !placed.contains(&dep) {
                        ready.insert(dep);
                    }
                }
            }
        }
    }

    for name in &members {
        if !placed.contains(name) {
            order.push(name.clone());
        }
    }

    let mut by_name: BTreeMap<QualifiedName, Vec<ChangeOp>> = BTreeMap::new();
    for op in bucket.drain(..) {
        if let Some(table) = op.table().cloned() {
            by_name.entry(table).or_default().push(op);
        }
    }
    for name in order {
        if let Some(ops) = by_name.remove(&name) {
            bucket.extend(ops);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{
        AccessMethod, Column, IndexKey, ReferentialAction, TypeDescriptor,
    };
    use crate::services::schema_diff_detector::SchemaDiffDetectorService;

    fn foreign_key(name: &str, column: &str, referenced: QualifiedName) -> Constraint {
        Constraint::new(
            name,
            vec![column.to_string()],
            ConstraintKind::ForeignKey {
                referenced_table: referenced,
                referenced_columns: vec!["id".into()],
                on_delete: ReferentialAction::NoAction,
                on_update: ReferentialAction::NoAction,
            },
        )
    }

    fn table_with_fk(name: &str, fk_column: &str, referenced: &str) -> Table {
        let mut table = Table::new(QualifiedName::new("public", name));
        table.add_column(Column::new("id", TypeDescriptor::new("integer"), false));
        table.add_column(Column::new(fk_column, TypeDescriptor::new("integer"), true));
        table.add_constraint(Constraint::new(
            format!("{}_pkey", name),
            vec!["id".into()],
            ConstraintKind::PrimaryKey,
        ));
        table.add_constraint(foreign_key(
            &format!("fk_{}_{}", name, referenced),
            fk_column,
            QualifiedName::new("public", referenced),
        ));
        table
    }

    fn catalog_with(tables: Vec<Table>) -> Catalog {
        let mut catalog = Catalog::new();
        for table in tables {
            catalog.add_table(table);
        }
        catalog
    }

    fn plan_for(desired: &Catalog, current: &Catalog) -> MigrationPlan {
        let diff = SchemaDiffDetectorService::new()
            .detect_diff(desired, current)
            .unwrap();
        PlanBuilderService::new()
            .build_plan(&diff, desired, current)
            .unwrap()
    }

    #[test]
    fn test_empty_diff_yields_empty_plan() {
        let catalog = Catalog::new();
        let plan = plan_for(&catalog, &catalog);
        assert!(plan.is_empty());
        assert_eq!(plan.summary(), "no changes");
    }

    #[test]
    fn test_fk_cycle_is_broken_by_deferral() {
        // a -> b, b -> a の相互参照でもプラン構築は成功する
        let desired = catalog_with(vec![
            table_with_fk("a", "b_id", "b"),
            table_with_fk("b", "a_id", "a"),
        ]);
        let current = catalog_with(vec![]);

        let plan = plan_for(&desired, &current);

        // CreateTableペイロードにFKは残らない
        for op in plan.ops_in(PlanPhase::CreateTables) {
            if let ChangeOp::CreateTable { table } = op {
                assert_eq!(table.foreign_keys().count(), 0);
                // FK以外の制約は残る
                assert!(table
                    .constraints
                    .iter()
                    .any(|c| matches!(c.kind, ConstraintKind::PrimaryKey)));
            }
        }

        // 剥離されたFKは遅延フェーズに2本
        assert_eq!(plan.ops_in(PlanPhase::AddForeignKeys).len(), 2);
    }

    #[test]
    fn test_create_tables_referenced_first() {
        let mut parent = Table::new(QualifiedName::new("public", "users"));
        parent.add_column(Column::new("id", TypeDescriptor::new("integer"), false));
        let child = table_with_fk("posts", "user_id", "users");

        let desired = catalog_with(vec![child, parent]);
        let current = catalog_with(vec![]);

        let plan = plan_for(&desired, &current);
        let creates: Vec<String> = plan
            .ops_in(PlanPhase::CreateTables)
            .iter()
            .map(|op| op.target().to_string())
            .collect();
        assert_eq!(creates, vec!["public.users", "public.posts"]);
    }

    #[test]
    fn test_drop_tables_referencing_first() {
        let mut parent = Table::new(QualifiedName::new("public", "users"));
        parent.add_column(Column::new("id", TypeDescriptor::new("integer"), false));
        let child = table_with_fk("posts", "user_id", "users");

        let desired = catalog_with(vec![]);
        let current = catalog_with(vec![parent, child]);

        let plan = plan_for(&desired, &current);
        let drops: Vec<String> = plan
            .ops_in(PlanPhase::DropTables)
            .iter()
            .map(|op| op.target().to_string())
            .collect();
        assert_eq!(drops, vec!["public.posts", "public.users"]);

        // 削除対象テーブルのFKは先行フェーズで削除される
        assert_eq!(plan.ops_in(PlanPhase::DropForeignKeys).len(), 1);
    }

    #[test]
    fn test_phase_order_drops_before_creates() {
        let mut old_table = Table::new(QualifiedName::new("public", "widgets"));
        old_table.add_column(Column::new("id", TypeDescriptor::new("integer"), false));

        let mut new_table = Table::new(QualifiedName::new("public", "gadgets"));
        new_table.add_column(Column::new("id", TypeDescriptor::new("integer"), false));

        let desired = catalog_with(vec![new_table]);
        let current = catalog_with(vec![old_table]);

        let plan = plan_for(&desired, &current);
        let kinds: Vec<ChangeOpKind> = plan.ordered_ops().map(|op| op.kind()).collect();
        let drop_pos = kinds.iter().position(|k| *k == ChangeOpKind::DropTable);
        let create_pos = kinds.iter().position(|k| *k == ChangeOpKind::CreateTable);
        assert!(drop_pos.unwrap() < create_pos.unwrap());
    }

    #[test]
    fn test_add_column_precedes_add_index() {
        let mut desired_table = Table::new(QualifiedName::new("public", "users"));
        desired_table.add_column(Column::new("id", TypeDescriptor::new("integer"), false));
        desired_table.add_column(Column::new("email", TypeDescriptor::new("text"), true));
        desired_table.add_index(Index::new(
            "idx_users_email",
            AccessMethod::Btree,
            IndexKey::Columns(vec!["email".into()]),
            true,
        ));

        let mut current_table = Table::new(QualifiedName::new("public", "users"));
        current_table.add_column(Column::new("id", TypeDescriptor::new("integer"), false));

        let desired = catalog_with(vec![desired_table]);
        let current = catalog_with(vec![current_table]);

        let plan = plan_for(&desired, &current);
        let kinds: Vec<ChangeOpKind> = plan
            .ops_in(PlanPhase::AlterAndAdd)
            .iter()
            .map(|op| op.kind())
            .collect();
        assert_eq!(kinds, vec![ChangeOpKind::AddColumn, ChangeOpKind::AddIndex]);
    }

    #[test]
    fn test_alter_type_expands_surviving_dependents() {
        // usersのidの型を変更すると、idを参照する現存FKとインデックスが
        // DROP -> ALTER -> 再ADD に展開される
        let make = |id_type: &str| {
            let mut users = Table::new(QualifiedName::new("public", "users"));
            users.add_column(Column::new("id", TypeDescriptor::new(id_type), false));
            users.add_index(Index::new(
                "idx_users_id",
                AccessMethod::Btree,
                IndexKey::Columns(vec!["id".into()]),
                true,
            ));

            let mut posts = Table::new(QualifiedName::new("public", "posts"));
            posts.add_column(Column::new("id", TypeDescriptor::new("integer"), false));
            posts.add_column(Column::new("user_id", TypeDescriptor::new("integer"), true));
            posts.add_constraint(foreign_key(
                "fk_posts_user",
                "user_id",
                QualifiedName::new("public", "users"),
            ));

            catalog_with(vec![users, posts])
        };

        let desired = make("bigint");
        let current = make("integer");

        let plan = plan_for(&desired, &current);

        assert_eq!(plan.ops_in(PlanPhase::DropForeignKeys).len(), 1);
        assert_eq!(plan.ops_in(PlanPhase::DropSecondary).len(), 1);
        assert_eq!(plan.ops_in(PlanPhase::AddForeignKeys).len(), 1);

        // AlterAndAdd内で型変更が再ADDインデックスより先
        let kinds: Vec<ChangeOpKind> = plan
            .ops_in(PlanPhase::AlterAndAdd)
            .iter()
            .map(|op| op.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![ChangeOpKind::AlterColumnType, ChangeOpKind::AddIndex]
        );
    }

    #[test]
    fn test_changed_dependent_is_not_expanded_twice() {
        // 依存インデックス自体の内容も変わっている場合、差分由来の
        // DROP/ADDのみで、展開による重複注入はない
        let mut desired_users = Table::new(QualifiedName::new("public", "users"));
        desired_users.add_column(Column::new("id", TypeDescriptor::new("bigint"), false));
        desired_users.add_index(Index::new(
            "idx_users_id",
            AccessMethod::Hash,
            IndexKey::Columns(vec!["id".into()]),
            false,
        ));

        let mut current_users = Table::new(QualifiedName::new("public", "users"));
        current_users.add_column(Column::new("id", TypeDescriptor::new("integer"), false));
        current_users.add_index(Index::new(
            "idx_users_id",
            AccessMethod::Btree,
            IndexKey::Columns(vec!["id".into()]),
            false,
        ));

        let desired = catalog_with(vec![desired_users]);
        let current = catalog_with(vec![current_users]);

        let plan = plan_for(&desired, &current);
        let drop_indexes = plan
            .ops_in(PlanPhase::DropSecondary)
            .iter()
            .filter(|op| op.kind() == ChangeOpKind::DropIndex)
            .count();
        assert_eq!(drop_indexes, 1);
        let add_indexes = plan
            .ops_in(PlanPhase::AlterAndAdd)
            .iter()
            .filter(|op| op.kind() == ChangeOpKind::AddIndex)
            .count();
        assert_eq!(add_indexes, 1);
    }

    #[test]
    fn test_unsatisfiable_reference_is_terminal() {
        // 存在しないテーブルを参照するFK追加はどの順序でも満たせない
        let current = catalog_with(vec![]);
        let desired = catalog_with(vec![]);
        let ops = vec![ChangeOp::AddConstraint {
            table: QualifiedName::new("public", "posts"),
            constraint: foreign_key(
                "fk_orphan",
                "user_id",
                QualifiedName::new("public", "missing"),
            ),
        }];

        let err = PlanBuilderService::new()
            .build_plan(&ops, &desired, &current)
            .unwrap_err();
        match err {
            PlanError::UnresolvableDependencyCycle { objects } => {
                assert!(objects.iter().any(|o| o == "public.missing"));
            }
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        let desired = catalog_with(vec![
            table_with_fk("b", "a_id", "a"),
            {
                let mut a = Table::new(QualifiedName::new("public", "a"));
                a.add_column(Column::new("id", TypeDescriptor::new("integer"), false));
                a
            },
        ]);
        let current = catalog_with(vec![]);

        let first = plan_for(&desired, &current);
        let second = plan_for(&desired, &current);
        assert_eq!(first, second);
    }
}
