//! Indented rendering of the stored hierarchy.

use std::{
    collections::{HashMap, HashSet},
    fmt::Write as _,
};

use itertools::Itertools;

use crate::record::{CategoryId, CategoryRecord};

type ChildIndex<'a> = HashMap<Option<CategoryId>, Vec<&'a CategoryRecord>>;

/// One line per category, children indented under their parent and ordered
/// by internal id. Categories whose parent is missing are shown at the top level.
pub fn render_tree(records: &[CategoryRecord]) -> String {
    let known = records.iter().filter_map(|r| r.id).collect::<HashSet<_>>();
    let children: ChildIndex<'_> = records
        .iter()
        .sorted_by_key(|r| r.id)
        .into_group_map_by(|r| r.parent_id);
    let mut output = String::new();
    let mut seen = HashSet::new();
    for record in records
        .iter()
        .filter(|r| r.parent_id.is_none_or(|p| !known.contains(&p)))
        .sorted_by_key(|r| r.id)
    {
        write_branch(&mut output, record, 0, &children, &mut seen);
    }
    output
}

fn write_branch(
    output: &mut String,
    record: &CategoryRecord,
    depth: usize,
    children: &ChildIndex<'_>,
    seen: &mut HashSet<CategoryId>,
) {
    let Some(id) = record.id else {
        return;
    };
    if !seen.insert(id) {
        return;
    }
    let _ = write!(output, "{}{} [{id}]", "  ".repeat(depth), record.name);
    if let Some(external_id) = record.external_id() {
        let _ = write!(output, " old_category_id={external_id}");
    }
    if !record.is_active {
        output.push_str(" (inactive)");
    }
    output.push('\n');
    for child in children.get(&Some(id)).into_iter().flatten() {
        write_branch(output, child, depth + 1, children, seen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::OLD_CATEGORY_ID;

    fn record(id: CategoryId, parent: Option<CategoryId>, name: &str) -> CategoryRecord {
        let mut record = CategoryRecord::blank();
        record.id = Some(id);
        record.parent_id = parent;
        record.name = name.to_string();
        record
    }

    #[test]
    fn renders_nested_categories_in_id_order() {
        let mut shoes = record(3, Some(2), "Shoes");
        shoes.set_attribute(OLD_CATEGORY_ID, "1");
        let mut hidden = record(5, Some(3), "Boots");
        hidden.is_active = false;
        let records = vec![
            hidden,
            record(1, None, "Root Catalog"),
            record(4, Some(3), "Sneakers"),
            record(2, Some(1), "Default Category"),
            shoes,
        ];
        let rendered = render_tree(&records);
        assert_eq!(
            rendered,
            "Root Catalog [1]\n  Default Category [2]\n    Shoes [3] old_category_id=1\n      Sneakers [4]\n      Boots [5] (inactive)\n"
        );
    }

    #[test]
    fn orphans_are_listed_at_top_level() {
        let records = vec![record(1, None, "Root"), record(9, Some(42), "Lost")];
        let rendered = render_tree(&records);
        assert_eq!(rendered, "Root [1]\nLost [9]\n");
    }
}
