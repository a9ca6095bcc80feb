//! Filter-conditions merge: unlike the other entity types, this
//! artifact is a free-text document, not a keyed row set. Blocks are
//! concatenated grouped by dashboard, in dashboard-id order, with no
//! deduplication — two dashboards describing "the same" filter in
//! different words both stay in the document.

pub struct FilterBlock {
    pub dashboard_id: i64,
    pub body: String,
}

pub fn merge(mut blocks: Vec<FilterBlock>) -> String {
    blocks.sort_by_key(|block| block.dashboard_id);
    blocks
        .into_iter()
        .map(|block| format!("=== Dashboard {} ===\n{}\n", block.dashboard_id, block.body.trim_end()))
        .collect::<Vec<_>>()
        .join("\n")
}
