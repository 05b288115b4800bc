//! Fallback cascade across providers.

/// Providers to try, in order, starting with `primary`.
///
/// When `primary` appears in `fallback_order` only the entries after it are
/// candidates; otherwise the whole list is. Duplicates, `primary` itself and
/// providers rejected by `is_registered` are skipped.
pub fn provider_sequence(
    primary: &str,
    fallback_order: &[String],
    is_registered: impl Fn(&str) -> bool,
) -> Vec<String> {
    let rest = match fallback_order.iter().position(|p| p == primary) {
        Some(index) => &fallback_order[index + 1..],
        None => fallback_order,
    };

    let mut sequence = vec![primary.to_string()];
    for provider in rest {
        if !sequence.contains(provider) && is_registered(provider) {
            sequence.push(provider.clone());
        }
    }
    sequence
}
