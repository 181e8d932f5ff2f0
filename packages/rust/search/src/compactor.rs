//! Greedy context assembly from ranked search results.

use dealboard_shared::SearchHit;

/// Combine ranked documents into one bounded context string.
///
/// Documents are appended in input order as `[title]\ncontent` blocks,
/// separated by blank lines, until the next block would push the total
/// past `max_chars`; assembly then stops rather than skipping ahead to a
/// smaller later document. A first block that alone exceeds the bound is
/// kept whole so the model always sees at least one document.
pub fn combine(results: &[SearchHit], max_chars: usize) -> String {
    let mut combined = String::new();

    for hit in results {
        let block = format!("[{}]\n{}", hit.title, hit.content);

        if combined.is_empty() {
            combined.push_str(&block);
            continue;
        }

        // +2 for the blank-line separator
        if combined.len() + 2 + block.len() > max_chars {
            break;
        }
        combined.push_str("\n\n");
        combined.push_str(&block);
    }

    combined
}
