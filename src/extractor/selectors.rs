//! Safe CSS selector parsing for selectors that come from the database
//! (not a compile-time constant) — a malformed selector degrades
//! gracefully instead of panicking.

use scraper::Selector;

/// Regex matching a functional pseudo-class segment, e.g. `:contains(x)`.
/// `scraper`'s selector parser rejects pseudo-classes it doesn't support;
/// stripping them and retrying once recovers selectors written for a
/// richer dialect (jQuery-style `:contains`, etc.) at the cost of the
/// extra precision the pseudo-class would have added.
static PSEUDO_FN: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r":[a-zA-Z-]+\([^)]*\)").expect("static regex"));

/// Parse a selector, retrying once with functional pseudo-classes
/// stripped if the first parse fails. Returns `None` (not an error) on
/// a second failure — the caller treats the field as absent rather than
/// aborting the whole page.
pub fn parse_lenient(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(selector) => Some(selector),
        Err(_) => {
            let stripped = PSEUDO_FN.replace_all(raw, "");
            if stripped == raw {
                tracing::warn!(selector = %raw, "invalid CSS selector, skipping field");
                return None;
            }
            match Selector::parse(&stripped) {
                Ok(selector) => Some(selector),
                Err(_) => {
                    tracing::warn!(selector = %raw, "invalid CSS selector even after stripping pseudo-classes, skipping field");
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_selector_parses() {
        assert!(parse_lenient(".price").is_some());
    }

    #[test]
    fn selector_with_pseudo_fn_is_stripped_and_retried() {
        // ":contains()" isn't part of CSS and scraper rejects it outright.
        let result = parse_lenient("div.name:contains(Price)");
        assert!(result.is_some());
    }

    #[test]
    fn hopeless_selector_returns_none_not_panic() {
        assert!(parse_lenient("[[[").is_none());
    }
}
