// 制約レベル比較
//
// 制約は名前ではなく内容（カラム列 + 種別ペイロード）で照合します。
// 名前だけが異なり内容が一致する制約ペアは差分になりません。
// NOT NULL制約はカラムのnullableフラグのミラーであり、ここでは
// 比較対象から除外します（column_comparatorが扱います）。

use std::collections::BTreeMap;

use super::SchemaDiffDetectorService;
use crate::core::change_op::ChangeOp;
use crate::core::schema::{Constraint, ConstraintKind, Table};

impl SchemaDiffDetectorService {
    /// 制約差分を検出
    pub(super) fn compare_constraints(
        &self,
        desired: &Table,
        current: &Table,
        ops: &mut Vec<ChangeOp>,
    ) {
        let desired_map = content_map(&desired.constraints);
        let current_map = content_map(&current.constraints);

        for (key, constraint) in &desired_map {
            if !current_map.contains_key(key) {
                ops.push(ChangeOp::AddConstraint {
                    table: desired.name.clone(),
                    constraint: (*constraint).clone(),
                });
            }
        }

        for (key, constraint) in &current_map {
            if !desired_map.contains_key(key) {
                ops.push(ChangeOp::DropConstraint {
                    table: desired.name.clone(),
                    constraint: (*constraint).clone(),
                });
            }
        }
    }
}

/// 内容キー -> 制約のマップを構築（NOT NULLミラーは除外）
fn content_map(constraints: &[Constraint]) -> BTreeMap<String, &Constraint> {
    constraints
        .iter()
        .filter(|c| !matches!(c.kind, ConstraintKind::NotNull))
        .map(|c| (c.content_key(), c))
        .collect()
}
