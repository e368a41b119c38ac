//! Rendering retrieved documents into prompt context.

use crate::document::{RagContext, RetrievedDocument};

/// Render documents into a [`RagContext`].
///
/// Each document becomes a block labelled with its 1-based position and its
/// similarity to three decimals:
///
/// ```text
/// [Document 1] (similarity: 0.812)
/// Paris is the capital of France.
/// ```
///
/// Blocks are separated by a blank line and keep the input order. An empty
/// input yields an empty `formatted_context`.
pub fn format_context(documents: Vec<RetrievedDocument>) -> RagContext {
    if documents.is_empty() {
        return RagContext { documents, formatted_context: String::new() };
    }

    let formatted_context = documents
        .iter()
        .enumerate()
        .map(|(idx, doc)| {
            format!(
                "[Document {}] (similarity: {})\n{}",
                idx + 1,
                format_similarity(doc.similarity),
                doc.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    RagContext { documents, formatted_context }
}

/// Render a similarity score with three decimals.
///
/// Exact halfway values round away from zero (`0.0625` gives `0.063`) and
/// negative zero prints as `0.000`.
pub fn format_similarity(similarity: f64) -> String {
    if similarity == 0.0 {
        return "0.000".to_string();
    }
    if !similarity.is_finite() {
        return similarity.to_string();
    }

    let sign = if similarity < 0.0 { "-" } else { "" };
    let magnitude = similarity.abs();

    // Wide enough for the exact decimal expansion of any f64.
    let exact = format!("{magnitude:.1100}");
    let (int_part, frac) = exact.split_once('.').unwrap_or((exact.as_str(), "000"));
    let (kept, rest) = frac.split_at(3);
    let is_tie = rest.starts_with('5') && rest[1..].bytes().all(|b| b == b'0');
    if !is_tie {
        return format!("{sign}{magnitude:.3}");
    }

    let mut digits: Vec<u8> = format!("{int_part}{kept}").into_bytes();
    let mut idx = digits.len();
    loop {
        if idx == 0 {
            digits.insert(0, b'1');
            break;
        }
        idx -= 1;
        if digits[idx] == b'9' {
            digits[idx] = b'0';
        } else {
            digits[idx] += 1;
            break;
        }
    }

    let split = digits.len() - 3;
    let digits = String::from_utf8_lossy(&digits);
    format!("{sign}{}.{}", &digits[..split], &digits[split..])
}
