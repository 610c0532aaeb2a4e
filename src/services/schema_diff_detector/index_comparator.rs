// インデックスレベル比較
//
// インデックスも制約と同様、名前ではなく内容（メソッド + キー +
// ユニーク性）で照合します。リネームのみのペアは差分になりません。

use std::collections::BTreeMap;

use super::SchemaDiffDetectorService;
use crate::core::change_op::ChangeOp;
use crate::core::schema::{Index, Table};

impl SchemaDiffDetectorService {
    /// インデックス差分を検出
    pub(super) fn compare_indexes(
        &self,
        desired: &Table,
        current: &Table,
        ops: &mut Vec<ChangeOp>,
    ) {
        let desired_map = content_map(&desired.indexes);
        let current_map = content_map(&current.indexes);

        for (key, index) in &desired_map {
            if !current_map.contains_key(key) {
                ops.push(ChangeOp::AddIndex {
                    table: desired.name.clone(),
                    index: (*index).clone(),
                });
            }
        }

        for (key, index) in &current_map {
            if !desired_map.contains_key(key) {
                ops.push(ChangeOp::DropIndex {
                    table: desired.name.clone(),
                    index: (*index).clone(),
                });
            }
        }
    }
}

fn content_map(indexes: &[Index]) -> BTreeMap<String, &Index> {
    indexes.iter().map(|i| (i.content_key(), i)).collect()
}
